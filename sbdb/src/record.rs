use std::collections::BTreeMap;

/// Free-form key/value index carried by every managed record.
pub type ExternalIds = BTreeMap<String, String>;

/// External-ID key naming the overlay network a record belongs to. Present
/// on every secondary-network switch and router.
pub const NETWORK_EXTERNAL_ID_KEY: &str = "fabric.io/network";

/// External-ID key naming the network's topology. Always co-exists with
/// [`NETWORK_EXTERNAL_ID_KEY`].
pub const TOPOLOGY_EXTERNAL_ID_KEY: &str = "fabric.io/topology";

pub const ACL_LOGGING_METER_NAME: &str = "acl-logging";
pub const METER_ACTION_DROP: &str = "drop";
pub const METER_UNIT_PACKETS_PER_SECOND: &str = "pktps";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LogicalSwitch {
    pub name: String,
    pub external_ids: ExternalIds,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LogicalRouter {
    pub name: String,
    pub external_ids: ExternalIds,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AddressSet {
    pub name: String,
    pub addresses: Vec<String>,
    pub external_ids: ExternalIds,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Acl {
    pub name: Option<String>,
    pub priority: i32,
    pub external_ids: ExternalIds,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MeterBand {
    pub action: String,
    pub rate: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Meter {
    pub name: String,
    pub unit: String,
    pub fair: bool,
}
