mod caching;
mod downloads;
mod encrypted;
mod loading;
mod operations;
mod scenes;
mod updates;
