//! Build artifact upload

pub mod s3;
