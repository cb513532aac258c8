//! Southbound data model: the records the controllers manage, the
//! transaction-client contract, and the object-IDs registry used to tag
//! records with stable external identifiers.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod client;
mod ids;
mod record;

pub mod mem;

pub use self::client::{Capability, DbError, Op, SouthboundClient};
pub use self::ids::{
    schema_for_owner, schemas, DbObjType, ExternalIdKey, IdError, ObjectIds, ObjectIdsBuilder,
    ObjectIdsType, OwnerType, ACL_MULTICAST_CLUSTER, ACL_MULTICAST_NAMESPACE, ACL_NETPOL_DEFAULT,
    ADDRESS_SET_EGRESS_FIREWALL_DNS, ADDRESS_SET_EGRESS_IP, ADDRESS_SET_EGRESS_QOS,
    ADDRESS_SET_EGRESS_SERVICE, ADDRESS_SET_HYBRID_NODE_ROUTE, ADDRESS_SET_NAMESPACE,
    ADDRESS_SET_NETWORK_POLICY, ADDRESS_SET_POD_SELECTOR, ADDRESS_SET_IP_FAMILY_KEY,
    EGRESS_FIREWALL_DNS_OWNER, EGRESS_IP_OWNER, EGRESS_QOS_OWNER, EGRESS_SERVICE_OWNER,
    GRESS_IDX_KEY, HYBRID_NODE_ROUTE_OWNER, MULTICAST_CLUSTER_OWNER, MULTICAST_NAMESPACE_OWNER,
    NAMESPACE_OWNER, NETPOL_DEFAULT_OWNER, NETWORK_POLICY_OWNER, OBJECT_NAME_KEY, OWNER_TYPE_KEY,
    POD_SELECTOR_OWNER, POLICY_DIRECTION_KEY, PRIORITY_KEY, TYPE_KEY,
};
pub use self::record::{
    Acl, AddressSet, ExternalIds, LogicalRouter, LogicalSwitch, Meter, MeterBand,
    ACL_LOGGING_METER_NAME, METER_ACTION_DROP, METER_UNIT_PACKETS_PER_SECOND,
    NETWORK_EXTERNAL_ID_KEY, TOPOLOGY_EXTERNAL_ID_KEY,
};
