use std::{collections::HashMap, fmt, sync::Arc};

use hoard_events::{EventBus, ManifestEvent};
use parking_lot::RwLock;
use tracing::info;

use crate::{Manifest, PackageInfo, VersionRecord};

/// Maps an asset path to an extra address it can be requested by.
pub type AddressAlias = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Owning package of an asset and its flattened dependencies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub manifest: String,
    pub main: PackageInfo,
    pub dependencies: Vec<PackageInfo>,
}

#[derive(Default)]
struct State {
    manifests: Vec<Manifest>,
    by_name: HashMap<String, usize>,
    aliases: HashMap<String, String>,
    version_file_name: Option<String>,
}

/// Registered manifests in registration order.
///
/// Append or replace only: a manifest registered under an existing name
/// replaces the contents at the same position.
#[derive(Default)]
pub struct ManifestRegistry {
    state: RwLock<State>,
    alias: Option<AddressAlias>,
    events: Option<EventBus>,
}

impl fmt::Debug for ManifestRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("ManifestRegistry")
            .field("manifests", &state.manifests.len())
            .field("aliases", &state.aliases.len())
            .finish_non_exhaustive()
    }
}

impl ManifestRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_alias(mut self, alias: AddressAlias) -> Self {
        self.alias = Some(alias);
        self
    }

    #[must_use]
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Register `manifest`, overriding in place when the name is known.
    ///
    /// Returns `true` if an existing manifest was overridden.
    pub fn register(&self, manifest: Manifest) -> bool {
        let name = manifest.name().to_string();
        let file_name = manifest.file_name().to_string();

        let mut state = self.state.write();
        if let Some(alias) = &self.alias {
            for path in manifest.asset_paths() {
                if let Some(address) = alias(path) {
                    state.aliases.insert(address, path.to_string());
                }
            }
        }

        let overridden = match state.by_name.get(&name).copied() {
            Some(index) => {
                state.manifests[index].override_with(manifest);
                true
            }
            None => {
                let index = state.manifests.len();
                state.manifests.push(manifest);
                state.by_name.insert(name.clone(), index);
                false
            }
        };
        drop(state);

        info!(manifest = %name, file = %file_name, overridden, "manifest registered");
        if let Some(events) = &self.events {
            if overridden {
                events.publish(ManifestEvent::Overridden { name, file_name });
            } else {
                events.publish(ManifestEvent::Registered { name, file_name });
            }
        }
        overridden
    }

    /// Whether the registered manifest named by `record` is loaded from the
    /// record's file.
    #[must_use]
    pub fn is_effective(&self, record: &VersionRecord) -> bool {
        let state = self.state.read();
        state
            .by_name
            .get(&record.name)
            .is_some_and(|&i| state.manifests[i].file_name() == record.file_name)
    }

    #[must_use]
    pub fn contains_asset(&self, path: &str) -> bool {
        self.state
            .read()
            .manifests
            .iter()
            .any(|m| m.contains_asset(path))
    }

    /// Map a requested address to the asset path it stands for.
    #[must_use]
    pub fn resolve_address(&self, address: &str) -> String {
        self.state
            .read()
            .aliases
            .get(address)
            .cloned()
            .unwrap_or_else(|| address.to_string())
    }

    /// Owning package and direct dependencies of `path`. The first manifest
    /// containing the path wins.
    #[must_use]
    pub fn resolve(&self, path: &str) -> Option<Resolved> {
        let state = self.state.read();
        state.manifests.iter().find_map(|manifest| {
            let main = manifest.package_for_asset(path)?;
            Some(Resolved {
                manifest: manifest.name().to_string(),
                dependencies: manifest.dependencies(main).into_iter().cloned().collect(),
                main: main.clone(),
            })
        })
    }

    #[must_use]
    pub fn package_for_asset(&self, path: &str) -> Option<PackageInfo> {
        self.state
            .read()
            .manifests
            .iter()
            .find_map(|m| m.package_for_asset(path).cloned())
    }

    /// Look a package up by name across manifests.
    #[must_use]
    pub fn package(&self, name: &str) -> Option<PackageInfo> {
        self.state
            .read()
            .manifests
            .iter()
            .find_map(|m| m.package(name).cloned())
    }

    /// Clone of the manifest registered under `name`.
    #[must_use]
    pub fn manifest(&self, name: &str) -> Option<Manifest> {
        let state = self.state.read();
        state.by_name.get(name).map(|&i| state.manifests[i].clone())
    }

    #[must_use]
    pub fn manifest_names(&self) -> Vec<String> {
        self.state
            .read()
            .manifests
            .iter()
            .map(|m| m.name().to_string())
            .collect()
    }

    #[must_use]
    pub fn manifest_file_names(&self) -> Vec<String> {
        self.state
            .read()
            .manifests
            .iter()
            .map(|m| m.file_name().to_string())
            .collect()
    }

    /// Every package of every manifest, registration order.
    #[must_use]
    pub fn packages(&self) -> Vec<PackageInfo> {
        self.state
            .read()
            .manifests
            .iter()
            .flat_map(|m| m.packages().iter().cloned())
            .collect()
    }

    pub fn set_version_file_name(&self, file_name: impl Into<String>) {
        self.state.write().version_file_name = Some(file_name.into());
    }

    /// File name of the version file the registered manifests came from.
    #[must_use]
    pub fn version_file_name(&self) -> Option<String> {
        self.state.read().version_file_name.clone()
    }

    pub fn clear(&self) {
        *self.state.write() = State::default();
    }
}
