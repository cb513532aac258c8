#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod config;
mod key;
mod topology;

pub use self::config::Config;
pub use self::key::ObjectKey;
pub use self::topology::{NetInfo, Topology, TopologyParseError};

/// Name of the cluster default network. Secondary networks carry any other
/// name and are managed by their own controllers.
pub const DEFAULT_NETWORK_NAME: &str = "default";
