//! Domain models

pub mod deployment;
pub mod diff;
pub mod job;
