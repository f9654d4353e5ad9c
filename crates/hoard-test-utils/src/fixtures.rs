use std::path::PathBuf;

use rstest::fixture;
use tempfile::TempDir;

/// Temporary directory removed on drop.
#[fixture]
pub fn temp_dir() -> TempDir {
    tempfile::tempdir().unwrap()
}

/// Local, download and temp directories of one runtime under a single root.
pub struct Dirs {
    pub root: TempDir,
    pub local: PathBuf,
    pub download: PathBuf,
    pub temp: PathBuf,
}

#[fixture]
pub fn dirs() -> Dirs {
    let root = tempfile::tempdir().unwrap();
    let local = root.path().join("local");
    let download = root.path().join("download");
    let temp = root.path().join("temp");
    for dir in [&local, &download, &temp] {
        std::fs::create_dir_all(dir).unwrap();
    }
    Dirs {
        root,
        local,
        download,
        temp,
    }
}

/// Route runtime logs to the test writer; `RUST_LOG` overrides the default.
#[fixture]
pub fn tracing_setup() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn,hoard_download=debug")),
        )
        .with_test_writer()
        .try_init();
}
