//! Wire models for the Multiplay (Clanforge) image API.
//!
//! These types mirror the JSON the backend returns and are deliberately
//! lenient: ids arrive as numbers or strings, empty maps arrive as `[]`.

pub mod models;

pub use models::*;
