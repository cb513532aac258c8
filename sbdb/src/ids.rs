//! Object-IDs registry: the static catalog of identifier schemas used to
//! tag southbound records. Schemas are the only way to construct
//! identifiers; the constructor is private so ad-hoc schemas cannot
//! proliferate at runtime.

use crate::record::ExternalIds;
use std::collections::BTreeMap;
use std::fmt;

/// Southbound table a schema's records live in.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DbObjType {
    AddressSet,
    Acl,
}

impl DbObjType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DbObjType::AddressSet => "address-set",
            DbObjType::Acl => "acl",
        }
    }
}

/// Opaque label naming the subsystem that owns a record. Once assigned to a
/// schema the label is immutable and maps to exactly one key list.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct OwnerType(&'static str);

impl OwnerType {
    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for OwnerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

pub const EGRESS_FIREWALL_DNS_OWNER: OwnerType = OwnerType("EgressFirewallDNS");
pub const EGRESS_QOS_OWNER: OwnerType = OwnerType("EgressQoS");
// only used for cleanup now, as the stale owner of network policy address sets
pub const NETWORK_POLICY_OWNER: OwnerType = OwnerType("NetworkPolicy");
pub const NETPOL_DEFAULT_OWNER: OwnerType = OwnerType("NetpolDefault");
pub const POD_SELECTOR_OWNER: OwnerType = OwnerType("PodSelector");
pub const NAMESPACE_OWNER: OwnerType = OwnerType("Namespace");
pub const HYBRID_NODE_ROUTE_OWNER: OwnerType = OwnerType("HybridNodeRoute");
pub const EGRESS_IP_OWNER: OwnerType = OwnerType("EgressIP");
pub const EGRESS_SERVICE_OWNER: OwnerType = OwnerType("EgressService");
pub const MULTICAST_NAMESPACE_OWNER: OwnerType = OwnerType("MulticastNS");
pub const MULTICAST_CLUSTER_OWNER: OwnerType = OwnerType("MulticastCluster");

/// Key in a schema's ordered tuple. Only one `ExternalIdKey` may exist per
/// string value.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExternalIdKey(&'static str);

impl ExternalIdKey {
    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for ExternalIdKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

pub const OBJECT_NAME_KEY: ExternalIdKey = ExternalIdKey("name");
pub const PRIORITY_KEY: ExternalIdKey = ExternalIdKey("priority");
pub const POLICY_DIRECTION_KEY: ExternalIdKey = ExternalIdKey("direction");
pub const GRESS_IDX_KEY: ExternalIdKey = ExternalIdKey("gress-index");
pub const ADDRESS_SET_IP_FAMILY_KEY: ExternalIdKey = ExternalIdKey("ip-family");
pub const TYPE_KEY: ExternalIdKey = ExternalIdKey("type");

/// External-ids map key under which a record's owner label is stored.
pub const OWNER_TYPE_KEY: &str = "fabric.io/owner";

/// Schema for tagging one class of southbound record: the table it lives
/// in, the owning subsystem, and the ordered tuple of required keys.
#[derive(Debug, PartialEq, Eq)]
pub struct ObjectIdsType {
    obj_type: DbObjType,
    owner: OwnerType,
    keys: &'static [ExternalIdKey],
    deprecated: bool,
}

impl ObjectIdsType {
    // Private on purpose: schemas may only be declared in this module.
    const fn new(
        obj_type: DbObjType,
        owner: OwnerType,
        keys: &'static [ExternalIdKey],
        deprecated: bool,
    ) -> Self {
        Self {
            obj_type,
            owner,
            keys,
            deprecated,
        }
    }

    pub fn obj_type(&self) -> DbObjType {
        self.obj_type
    }

    pub fn owner(&self) -> OwnerType {
        self.owner
    }

    pub fn keys(&self) -> &'static [ExternalIdKey] {
        self.keys
    }

    pub fn is_deprecated(&self) -> bool {
        self.deprecated
    }

    pub fn builder(&'static self) -> ObjectIdsBuilder {
        ObjectIdsBuilder {
            ty: self,
            values: BTreeMap::new(),
        }
    }
}

pub static ADDRESS_SET_EGRESS_FIREWALL_DNS: ObjectIdsType = ObjectIdsType::new(
    DbObjType::AddressSet,
    EGRESS_FIREWALL_DNS_OWNER,
    // dnsName
    &[OBJECT_NAME_KEY, ADDRESS_SET_IP_FAMILY_KEY],
    false,
);

pub static ADDRESS_SET_HYBRID_NODE_ROUTE: ObjectIdsType = ObjectIdsType::new(
    DbObjType::AddressSet,
    HYBRID_NODE_ROUTE_OWNER,
    // nodeName
    &[OBJECT_NAME_KEY, ADDRESS_SET_IP_FAMILY_KEY],
    false,
);

pub static ADDRESS_SET_EGRESS_QOS: ObjectIdsType = ObjectIdsType::new(
    DbObjType::AddressSet,
    EGRESS_QOS_OWNER,
    // namespace, rule priority
    &[OBJECT_NAME_KEY, PRIORITY_KEY, ADDRESS_SET_IP_FAMILY_KEY],
    false,
);

pub static ADDRESS_SET_POD_SELECTOR: ObjectIdsType = ObjectIdsType::new(
    DbObjType::AddressSet,
    POD_SELECTOR_OWNER,
    // pod selector string representation
    &[OBJECT_NAME_KEY, ADDRESS_SET_IP_FAMILY_KEY],
    false,
);

// deprecated, kept only so cleanup can recognize records written by old
// versions
pub static ADDRESS_SET_NETWORK_POLICY: ObjectIdsType = ObjectIdsType::new(
    DbObjType::AddressSet,
    NETWORK_POLICY_OWNER,
    // namespace_name, gress direction, gress rule index
    &[
        OBJECT_NAME_KEY,
        POLICY_DIRECTION_KEY,
        GRESS_IDX_KEY,
        ADDRESS_SET_IP_FAMILY_KEY,
    ],
    true,
);

pub static ADDRESS_SET_NAMESPACE: ObjectIdsType = ObjectIdsType::new(
    DbObjType::AddressSet,
    NAMESPACE_OWNER,
    &[OBJECT_NAME_KEY, ADDRESS_SET_IP_FAMILY_KEY],
    false,
);

pub static ADDRESS_SET_EGRESS_IP: ObjectIdsType = ObjectIdsType::new(
    DbObjType::AddressSet,
    EGRESS_IP_OWNER,
    // cluster-wide address set name
    &[OBJECT_NAME_KEY, ADDRESS_SET_IP_FAMILY_KEY],
    false,
);

pub static ADDRESS_SET_EGRESS_SERVICE: ObjectIdsType = ObjectIdsType::new(
    DbObjType::AddressSet,
    EGRESS_SERVICE_OWNER,
    &[OBJECT_NAME_KEY, ADDRESS_SET_IP_FAMILY_KEY],
    false,
);

pub static ACL_NETPOL_DEFAULT: ObjectIdsType = ObjectIdsType::new(
    DbObjType::Acl,
    NETPOL_DEFAULT_OWNER,
    // there is only one acl of this type today; the name is kept in case
    // more are needed
    &[OBJECT_NAME_KEY, POLICY_DIRECTION_KEY],
    false,
);

pub static ACL_MULTICAST_NAMESPACE: ObjectIdsType = ObjectIdsType::new(
    DbObjType::Acl,
    MULTICAST_NAMESPACE_OWNER,
    &[OBJECT_NAME_KEY, POLICY_DIRECTION_KEY],
    false,
);

pub static ACL_MULTICAST_CLUSTER: ObjectIdsType = ObjectIdsType::new(
    DbObjType::Acl,
    MULTICAST_CLUSTER_OWNER,
    // type is DefaultDeny or AllowInterNode
    &[TYPE_KEY, POLICY_DIRECTION_KEY],
    false,
);

static REGISTRY: [&ObjectIdsType; 11] = [
    &ADDRESS_SET_EGRESS_FIREWALL_DNS,
    &ADDRESS_SET_HYBRID_NODE_ROUTE,
    &ADDRESS_SET_EGRESS_QOS,
    &ADDRESS_SET_POD_SELECTOR,
    &ADDRESS_SET_NETWORK_POLICY,
    &ADDRESS_SET_NAMESPACE,
    &ADDRESS_SET_EGRESS_IP,
    &ADDRESS_SET_EGRESS_SERVICE,
    &ACL_NETPOL_DEFAULT,
    &ACL_MULTICAST_NAMESPACE,
    &ACL_MULTICAST_CLUSTER,
];

/// All registered schemas.
pub fn schemas() -> impl Iterator<Item = &'static ObjectIdsType> {
    REGISTRY.iter().copied()
}

/// Resolves an owner label to its schema. Deprecated schemas are consulted
/// only when no current schema claims the label.
pub fn schema_for_owner(label: &str) -> Option<&'static ObjectIdsType> {
    schemas()
        .find(|s| !s.deprecated && s.owner.as_str() == label)
        .or_else(|| schemas().find(|s| s.owner.as_str() == label))
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum IdError {
    #[error("{owner} ids are missing required key {key}")]
    MissingKey { owner: OwnerType, key: ExternalIdKey },

    #[error("{owner} ids do not declare key {key:?}")]
    UnexpectedKey { owner: OwnerType, key: String },

    #[error("tag names owner {actual:?} but schema owner is {expected}")]
    OwnerMismatch { expected: OwnerType, actual: String },

    #[error("malformed object-ids tag {0:?}")]
    Malformed(String),
}

/// A concrete identifier: a schema plus a value for each of its keys.
#[derive(Debug, PartialEq, Eq)]
pub struct ObjectIds {
    ty: &'static ObjectIdsType,
    values: BTreeMap<ExternalIdKey, String>,
}

pub struct ObjectIdsBuilder {
    ty: &'static ObjectIdsType,
    values: BTreeMap<ExternalIdKey, String>,
}

impl ObjectIdsBuilder {
    pub fn set(mut self, key: ExternalIdKey, value: impl Into<String>) -> Self {
        self.values.insert(key, value.into());
        self
    }

    /// Fails unless exactly the schema's declared keys were provided.
    pub fn build(self) -> Result<ObjectIds, IdError> {
        for key in self.ty.keys {
            if !self.values.contains_key(key) {
                return Err(IdError::MissingKey {
                    owner: self.ty.owner,
                    key: *key,
                });
            }
        }
        for key in self.values.keys() {
            if !self.ty.keys.contains(key) {
                return Err(IdError::UnexpectedKey {
                    owner: self.ty.owner,
                    key: key.as_str().to_string(),
                });
            }
        }
        Ok(ObjectIds {
            ty: self.ty,
            values: self.values,
        })
    }
}

impl ObjectIds {
    pub fn schema(&self) -> &'static ObjectIdsType {
        self.ty
    }

    pub fn get(&self, key: ExternalIdKey) -> Option<&str> {
        self.values.get(&key).map(String::as_str)
    }

    /// Serializes to the externally stored tag: the owner label followed by
    /// `key=value` pairs in declared order.
    pub fn to_tag(&self) -> String {
        let mut tag = self.ty.owner.as_str().to_string();
        for key in self.ty.keys {
            tag.push(':');
            tag.push_str(key.as_str());
            tag.push('=');
            if let Some(value) = self.values.get(key) {
                tag.push_str(value);
            }
        }
        tag
    }

    /// Parses a tag back into an identifier. Fails when a declared key is
    /// absent, an undeclared key is present, or the owner does not match.
    pub fn parse(ty: &'static ObjectIdsType, tag: &str) -> Result<Self, IdError> {
        let mut parts = tag.split(':');
        let owner = parts.next().ok_or_else(|| IdError::Malformed(tag.into()))?;
        if owner != ty.owner.as_str() {
            return Err(IdError::OwnerMismatch {
                expected: ty.owner,
                actual: owner.to_string(),
            });
        }

        let mut values = BTreeMap::new();
        for part in parts {
            let (key, value) = part
                .split_once('=')
                .ok_or_else(|| IdError::Malformed(tag.into()))?;
            let key = *ty
                .keys
                .iter()
                .find(|k| k.as_str() == key)
                .ok_or_else(|| IdError::UnexpectedKey {
                    owner: ty.owner,
                    key: key.to_string(),
                })?;
            values.insert(key, value.to_string());
        }

        let ids = ObjectIds { ty, values };
        for key in ty.keys {
            if !ids.values.contains_key(key) {
                return Err(IdError::MissingKey {
                    owner: ty.owner,
                    key: *key,
                });
            }
        }
        Ok(ids)
    }

    /// The external-ids map form: the owner label under [`OWNER_TYPE_KEY`]
    /// plus one entry per declared key.
    pub fn external_ids(&self) -> ExternalIds {
        let mut ids = ExternalIds::new();
        ids.insert(OWNER_TYPE_KEY.to_string(), self.ty.owner.as_str().to_string());
        for (key, value) in &self.values {
            ids.insert(key.as_str().to_string(), value.clone());
        }
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_round_trip() {
        let ids = ADDRESS_SET_EGRESS_QOS
            .builder()
            .set(OBJECT_NAME_KEY, "prod")
            .set(PRIORITY_KEY, "1000")
            .set(ADDRESS_SET_IP_FAMILY_KEY, "v4")
            .build()
            .unwrap();
        let tag = ids.to_tag();
        assert_eq!(tag, "EgressQoS:name=prod:priority=1000:ip-family=v4");
        let parsed = ObjectIds::parse(&ADDRESS_SET_EGRESS_QOS, &tag).unwrap();
        assert_eq!(parsed, ids);
    }

    #[test]
    fn builder_rejects_missing_key() {
        let err = ADDRESS_SET_NAMESPACE
            .builder()
            .set(OBJECT_NAME_KEY, "ns")
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            IdError::MissingKey {
                owner: NAMESPACE_OWNER,
                key: ADDRESS_SET_IP_FAMILY_KEY,
            }
        );
    }

    #[test]
    fn builder_rejects_undeclared_key() {
        let err = ADDRESS_SET_NAMESPACE
            .builder()
            .set(OBJECT_NAME_KEY, "ns")
            .set(ADDRESS_SET_IP_FAMILY_KEY, "v6")
            .set(PRIORITY_KEY, "10")
            .build()
            .unwrap_err();
        assert!(matches!(err, IdError::UnexpectedKey { .. }));
    }

    #[test]
    fn parse_rejects_wrong_owner() {
        let err = ObjectIds::parse(&ADDRESS_SET_NAMESPACE, "EgressQoS:name=x:ip-family=v4")
            .unwrap_err();
        assert!(matches!(err, IdError::OwnerMismatch { .. }));
    }

    #[test]
    fn parse_rejects_extra_pair() {
        let err = ObjectIds::parse(
            &ADDRESS_SET_NAMESPACE,
            "Namespace:name=x:ip-family=v4:priority=3",
        )
        .unwrap_err();
        assert!(matches!(err, IdError::UnexpectedKey { .. }));
    }

    #[test]
    fn owner_lookup_prefers_current_schema() {
        // The deprecated NetworkPolicy owner is still resolvable for
        // cleanup.
        let schema = schema_for_owner("NetworkPolicy").unwrap();
        assert!(schema.is_deprecated());
        assert_eq!(schema.owner(), NETWORK_POLICY_OWNER);

        let schema = schema_for_owner("Namespace").unwrap();
        assert!(!schema.is_deprecated());
    }

    #[test]
    fn schemas_equal_iff_same_tuple() {
        assert_eq!(&ADDRESS_SET_NAMESPACE, &ADDRESS_SET_NAMESPACE);
        assert_ne!(&ADDRESS_SET_NAMESPACE, &ADDRESS_SET_EGRESS_IP);
        assert_ne!(&ACL_MULTICAST_NAMESPACE, &ACL_MULTICAST_CLUSTER);
    }
}
