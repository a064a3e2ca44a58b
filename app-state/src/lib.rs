pub mod imaging;
pub mod overlay;
pub mod persist;
pub mod state;
pub mod store;

/// Storage key of the serialized application snapshot.
pub const SNAPSHOT_KEY: &str = "app-state";

/// Try-ons a guest can perform before being asked to sign up.
pub const GUEST_FREE_LIMIT: u32 = 2;
