#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod labels;

mod cloud_private_ip_config;
mod egress_firewall;
mod egress_ip;
mod egress_qos;
mod egress_service;
mod multi_network_policy;
mod network_attachment_definition;

pub use self::cloud_private_ip_config::{
    CloudPrivateIpConfig, CloudPrivateIpConfigSpec, CloudPrivateIpConfigStatus,
};
pub use self::egress_firewall::{
    EgressFirewall, EgressFirewallDestination, EgressFirewallRule, EgressFirewallRuleType,
    EgressFirewallSpec,
};
pub use self::egress_ip::{EgressIp, EgressIpSpec, EgressIpStatus, EgressIpStatusItem};
pub use self::egress_qos::{EgressQos, EgressQosRule, EgressQosSpec};
pub use self::egress_service::{EgressService, EgressServiceSpec, EgressServiceStatus, SourceIpBy};
pub use self::multi_network_policy::{
    MultiNetworkPolicy, MultiNetworkPolicyPeer, MultiNetworkPolicyRule, MultiNetworkPolicySpec,
};
pub use self::network_attachment_definition::{
    NetworkAttachmentDefinition, NetworkAttachmentDefinitionSpec,
};

pub use k8s_openapi::{
    api::{
        core::v1::{
            Namespace, Node, NodeAddress, NodeSpec, NodeStatus, Pod, PodSpec, PodStatus, Service,
            ServicePort, ServiceSpec,
        },
        discovery::v1::EndpointSlice,
        networking::v1::NetworkPolicy,
    },
    apimachinery::pkg::apis::meta::v1::Time,
};
pub use kube::{
    api::{Api, ObjectMeta, Resource, ResourceExt},
    error::ErrorResponse,
    runtime::watcher,
    Client, Error,
};
