//! Startup configuration

pub mod credentials;
pub mod settings;
