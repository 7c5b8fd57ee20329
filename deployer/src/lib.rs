//! Image Deployer Library
//!
//! Pushes a dedicated server build through the Multiplay image pipeline:
//! update, diff, version, then wait for the fleet to install it.

pub mod app;
pub mod authn;
pub mod config;
pub mod errors;
pub mod http;
pub mod logs;
pub mod models;
pub mod pipeline;
pub mod upload;
pub mod utils;
