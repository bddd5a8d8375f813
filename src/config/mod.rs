//! Configuration management for ipsift.
//!
//! Provides XDG-compliant settings storage and the immutable settings value
//! each scan runs with.

mod settings;

pub use settings::{AppSettings, Paths, ScanSettings};
