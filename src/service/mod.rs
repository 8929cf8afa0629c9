//! Service wiring and discovery endpoints

pub mod app;
pub mod discovery;

pub use app::AppState;
pub use discovery::DiscoveryServer;
