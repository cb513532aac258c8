use crate::labels;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Marks egress traffic from selected pods with a DSCP value.
#[derive(Clone, Debug, PartialEq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(group = "fabric.io", version = "v1", kind = "EgressQos", namespaced)]
#[serde(rename_all = "camelCase")]
pub struct EgressQosSpec {
    pub egress: Vec<EgressQosRule>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EgressQosRule {
    pub dscp: u8,
    #[serde(rename = "dstCIDR")]
    pub dst_cidr: Option<String>,
    pub pod_selector: Option<labels::Selector>,
}
