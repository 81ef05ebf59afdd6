//! Platform-specific implementations

pub mod android;
