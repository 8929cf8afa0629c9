//! Configuration management for the lobby service

pub mod app;

pub use app::{validate_config, AppConfig, HttpSettings, ServiceSettings};
