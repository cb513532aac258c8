use std::fmt;
use std::str::FromStr;

/// Logical-network shape. Selects which controller implementation realizes a
/// network's southbound state.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Topology {
    Layer3,
    Layer2,
    Localnet,
}

impl Topology {
    pub fn as_str(&self) -> &'static str {
        match self {
            Topology::Layer3 => "layer3",
            Topology::Layer2 => "layer2",
            Topology::Localnet => "localnet",
        }
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
#[error("unknown topology {0:?}")]
pub struct TopologyParseError(pub String);

impl FromStr for Topology {
    type Err = TopologyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "layer3" => Ok(Topology::Layer3),
            "layer2" => Ok(Topology::Layer2),
            "localnet" => Ok(Topology::Localnet),
            other => Err(TopologyParseError(other.to_string())),
        }
    }
}

/// Describes one overlay network: its name and topology.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NetInfo {
    pub name: String,
    pub topology: Topology,
}

impl NetInfo {
    pub fn new(name: impl Into<String>, topology: Topology) -> Self {
        Self {
            name: name.into(),
            topology,
        }
    }
}
