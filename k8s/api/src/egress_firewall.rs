use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Restricts egress traffic leaving a namespace. Rules are evaluated in
/// order; the first match wins.
#[derive(Clone, Debug, PartialEq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "fabric.io",
    version = "v1",
    kind = "EgressFirewall",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct EgressFirewallSpec {
    pub egress: Vec<EgressFirewallRule>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EgressFirewallRule {
    #[serde(rename = "type")]
    pub rule_type: EgressFirewallRuleType,
    pub to: EgressFirewallDestination,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum EgressFirewallRuleType {
    Allow,
    Deny,
}

/// Either a CIDR or a DNS name; exactly one is expected to be set.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EgressFirewallDestination {
    pub cidr_selector: Option<String>,
    pub dns_name: Option<String>,
}
