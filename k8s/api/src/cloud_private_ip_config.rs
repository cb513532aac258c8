use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Requests assignment of a private IP to a node through the cloud provider.
/// Cluster-scoped; the resource name is the IP address.
#[derive(Clone, Debug, PartialEq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "cloud.fabric.io",
    version = "v1",
    kind = "CloudPrivateIpConfig",
    status = "CloudPrivateIpConfigStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct CloudPrivateIpConfigSpec {
    pub node: String,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CloudPrivateIpConfigStatus {
    pub node: String,
}
