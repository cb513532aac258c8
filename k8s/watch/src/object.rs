use fabric_controller_core::ObjectKey;
use fabric_controller_k8s_api::{
    CloudPrivateIpConfig, EgressFirewall, EgressIp, EgressQos, EgressService, EndpointSlice,
    MultiNetworkPolicy, Namespace, NetworkAttachmentDefinition, NetworkPolicy, Node, ObjectMeta,
    Pod, Service,
};
use std::fmt;
use std::sync::Arc;

/// Type token for each watched resource kind. Every informer declares
/// exactly one; delivered objects are checked against it at the informer
/// boundary.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Pod,
    Service,
    Namespace,
    Node,
    NetworkPolicy,
    EndpointSlice,
    EgressFirewall,
    EgressIp,
    EgressQos,
    EgressService,
    CloudPrivateIpConfig,
    NetworkAttachmentDefinition,
    MultiNetworkPolicy,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 13] = [
        ResourceKind::Pod,
        ResourceKind::Service,
        ResourceKind::Namespace,
        ResourceKind::Node,
        ResourceKind::NetworkPolicy,
        ResourceKind::EndpointSlice,
        ResourceKind::EgressFirewall,
        ResourceKind::EgressIp,
        ResourceKind::EgressQos,
        ResourceKind::EgressService,
        ResourceKind::CloudPrivateIpConfig,
        ResourceKind::NetworkAttachmentDefinition,
        ResourceKind::MultiNetworkPolicy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Pod => "Pod",
            ResourceKind::Service => "Service",
            ResourceKind::Namespace => "Namespace",
            ResourceKind::Node => "Node",
            ResourceKind::NetworkPolicy => "NetworkPolicy",
            ResourceKind::EndpointSlice => "EndpointSlice",
            ResourceKind::EgressFirewall => "EgressFirewall",
            ResourceKind::EgressIp => "EgressIP",
            ResourceKind::EgressQos => "EgressQoS",
            ResourceKind::EgressService => "EgressService",
            ResourceKind::CloudPrivateIpConfig => "CloudPrivateIPConfig",
            ResourceKind::NetworkAttachmentDefinition => "NetworkAttachmentDefinition",
            ResourceKind::MultiNetworkPolicy => "MultiNetworkPolicy",
        }
    }

    /// Kinds that take the heavy event load run queued informers; the rest
    /// fan out synchronously on the watch task.
    pub(crate) fn queued(&self) -> bool {
        matches!(
            self,
            ResourceKind::Pod | ResourceKind::Node | ResourceKind::Namespace
        )
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A watched object. One variant per resource kind; the informer does the
/// single kind assertion and downstream code matches on the concrete
/// variant.
#[derive(Clone, Debug)]
pub enum KubeObject {
    Pod(Arc<Pod>),
    Service(Arc<Service>),
    Namespace(Arc<Namespace>),
    Node(Arc<Node>),
    NetworkPolicy(Arc<NetworkPolicy>),
    EndpointSlice(Arc<EndpointSlice>),
    EgressFirewall(Arc<EgressFirewall>),
    EgressIp(Arc<EgressIp>),
    EgressQos(Arc<EgressQos>),
    EgressService(Arc<EgressService>),
    CloudPrivateIpConfig(Arc<CloudPrivateIpConfig>),
    NetworkAttachmentDefinition(Arc<NetworkAttachmentDefinition>),
    MultiNetworkPolicy(Arc<MultiNetworkPolicy>),
}

impl KubeObject {
    pub fn kind(&self) -> ResourceKind {
        match self {
            KubeObject::Pod(_) => ResourceKind::Pod,
            KubeObject::Service(_) => ResourceKind::Service,
            KubeObject::Namespace(_) => ResourceKind::Namespace,
            KubeObject::Node(_) => ResourceKind::Node,
            KubeObject::NetworkPolicy(_) => ResourceKind::NetworkPolicy,
            KubeObject::EndpointSlice(_) => ResourceKind::EndpointSlice,
            KubeObject::EgressFirewall(_) => ResourceKind::EgressFirewall,
            KubeObject::EgressIp(_) => ResourceKind::EgressIp,
            KubeObject::EgressQos(_) => ResourceKind::EgressQos,
            KubeObject::EgressService(_) => ResourceKind::EgressService,
            KubeObject::CloudPrivateIpConfig(_) => ResourceKind::CloudPrivateIpConfig,
            KubeObject::NetworkAttachmentDefinition(_) => {
                ResourceKind::NetworkAttachmentDefinition
            }
            KubeObject::MultiNetworkPolicy(_) => ResourceKind::MultiNetworkPolicy,
        }
    }

    pub fn meta(&self) -> &ObjectMeta {
        match self {
            KubeObject::Pod(o) => &o.metadata,
            KubeObject::Service(o) => &o.metadata,
            KubeObject::Namespace(o) => &o.metadata,
            KubeObject::Node(o) => &o.metadata,
            KubeObject::NetworkPolicy(o) => &o.metadata,
            KubeObject::EndpointSlice(o) => &o.metadata,
            KubeObject::EgressFirewall(o) => &o.metadata,
            KubeObject::EgressIp(o) => &o.metadata,
            KubeObject::EgressQos(o) => &o.metadata,
            KubeObject::EgressService(o) => &o.metadata,
            KubeObject::CloudPrivateIpConfig(o) => &o.metadata,
            KubeObject::NetworkAttachmentDefinition(o) => &o.metadata,
            KubeObject::MultiNetworkPolicy(o) => &o.metadata,
        }
    }

    /// The object's `(namespace, name)` routing key.
    pub fn key(&self) -> ObjectKey {
        let meta = self.meta();
        ObjectKey {
            namespace: meta.namespace.clone().unwrap_or_default(),
            name: meta.name.clone().unwrap_or_default(),
        }
    }

    /// Unique per-version id. Distinct ids on an update mean the object was
    /// replaced in place.
    pub fn uid(&self) -> Option<&str> {
        self.meta().uid.as_deref()
    }
}

/// Binds a typed resource to its kind tag so the factory can build watch
/// pumps and typed lookups generically.
pub trait WatchedResource:
    kube::Resource<DynamicType = ()>
    + Clone
    + serde::de::DeserializeOwned
    + fmt::Debug
    + Send
    + Sync
    + 'static
{
    const KIND: ResourceKind;

    fn into_object(this: Arc<Self>) -> KubeObject;
    fn from_object(obj: &KubeObject) -> Option<&Arc<Self>>;
}

macro_rules! watched_resource {
    ($ty:ty, $kind:ident) => {
        impl WatchedResource for $ty {
            const KIND: ResourceKind = ResourceKind::$kind;

            fn into_object(this: Arc<Self>) -> KubeObject {
                KubeObject::$kind(this)
            }

            fn from_object(obj: &KubeObject) -> Option<&Arc<Self>> {
                match obj {
                    KubeObject::$kind(o) => Some(o),
                    _ => None,
                }
            }
        }
    };
}

watched_resource!(Pod, Pod);
watched_resource!(Service, Service);
watched_resource!(Namespace, Namespace);
watched_resource!(Node, Node);
watched_resource!(NetworkPolicy, NetworkPolicy);
watched_resource!(EndpointSlice, EndpointSlice);
watched_resource!(EgressFirewall, EgressFirewall);
watched_resource!(EgressIp, EgressIp);
watched_resource!(EgressQos, EgressQos);
watched_resource!(EgressService, EgressService);
watched_resource!(CloudPrivateIpConfig, CloudPrivateIpConfig);
watched_resource!(NetworkAttachmentDefinition, NetworkAttachmentDefinition);
watched_resource!(MultiNetworkPolicy, MultiNetworkPolicy);
