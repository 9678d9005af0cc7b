//! `EduLab` Common Library
//!
//! Shared messaging types and the push-channel protocol, used by the client
//! core and by any service speaking the same wire format.

pub mod protocol;
pub mod types;

pub use types::*;
