use crate::labels;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Routes a load-balancer service's egress traffic through a single node.
#[derive(Clone, Debug, PartialEq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "fabric.io",
    version = "v1",
    kind = "EgressService",
    namespaced,
    status = "EgressServiceStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct EgressServiceSpec {
    #[serde(rename = "sourceIPBy")]
    pub source_ip_by: Option<SourceIpBy>,
    pub node_selector: Option<labels::Selector>,
    pub network: Option<String>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum SourceIpBy {
    #[serde(rename = "LoadBalancerIP")]
    LoadBalancerIp,
    Network,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct EgressServiceStatus {
    pub host: String,
}
