//! Request authentication

pub mod sigv4;
