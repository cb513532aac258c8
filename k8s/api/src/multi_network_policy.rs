use crate::labels;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A network policy applying to pods on a secondary network. The target
/// network is named by the `policy-for` annotation on the resource.
#[derive(Clone, Debug, PartialEq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "k8s.cni.cncf.io",
    version = "v1beta1",
    kind = "MultiNetworkPolicy",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct MultiNetworkPolicySpec {
    pub pod_selector: labels::Selector,
    pub ingress: Option<Vec<MultiNetworkPolicyRule>>,
    pub egress: Option<Vec<MultiNetworkPolicyRule>>,
    pub policy_types: Option<Vec<String>>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MultiNetworkPolicyRule {
    pub from: Option<Vec<MultiNetworkPolicyPeer>>,
    pub to: Option<Vec<MultiNetworkPolicyPeer>>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MultiNetworkPolicyPeer {
    pub pod_selector: Option<labels::Selector>,
    pub namespace_selector: Option<labels::Selector>,
}
