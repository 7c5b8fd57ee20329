//! Image API transport

pub mod client;
pub mod stages;
