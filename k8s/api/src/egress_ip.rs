use crate::labels;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Assigns one or more egress IPs to pods selected across namespaces.
/// Cluster-scoped.
#[derive(Clone, Debug, PartialEq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "fabric.io",
    version = "v1",
    kind = "EgressIp",
    status = "EgressIpStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct EgressIpSpec {
    #[serde(rename = "egressIPs")]
    pub egress_ips: Vec<String>,
    pub namespace_selector: labels::Selector,
    pub pod_selector: Option<labels::Selector>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct EgressIpStatus {
    pub items: Vec<EgressIpStatusItem>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EgressIpStatusItem {
    pub node: String,
    #[serde(rename = "egressIP")]
    pub egress_ip: String,
}
