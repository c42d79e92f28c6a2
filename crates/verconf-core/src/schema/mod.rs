//! Config schema generations
//!
//! Each generation is a closed record type decoded strictly: fields the
//! schema does not define are rejected. Only the latest generation is
//! consumed by the rest of the system; older ones are imported into it.

pub mod v1alpha1;
pub mod v1alpha2;

/// The latest version of the config format
pub const LATEST_VERSION: &str = v1alpha2::VERSION;

/// The config representation produced by every successful read
pub type LatestConfig = v1alpha2::Config;
