pub mod file_db;
pub mod memory;
pub mod snapshot_storage;

mod atomic;

/// Default file name of the durable database inside the app data folder.
pub const DB_FILE_NAME: &str = "keyval.json";
