//! Shared event-handling tables the per-resource controllers consult:
//! which kinds have a dedicated update path, when two revisions of an
//! object are semantically equal, and how to re-fetch an object from the
//! watch caches by kind and key.

use fabric_controller_core::ObjectKey;
use fabric_controller_k8s_api::Pod;
use fabric_controller_k8s_watch::{self as watch, KubeObject, ResourceKind, WatchFactory};

/// Kinds with a dedicated update function. Updates for every other kind are
/// handled as a delete of the old object followed by an add of the new one.
pub fn has_dedicated_update_fn(kind: ResourceKind) -> bool {
    matches!(
        kind,
        ResourceKind::Pod
            | ResourceKind::Node
            | ResourceKind::Namespace
            | ResourceKind::EgressIp
            | ResourceKind::CloudPrivateIpConfig
            | ResourceKind::MultiNetworkPolicy
    )
}

/// Kinds whose retry loops must invoke update even when nothing changed.
pub fn needs_update_during_retry(kind: ResourceKind) -> bool {
    matches!(
        kind,
        ResourceKind::EgressIp
            | ResourceKind::CloudPrivateIpConfig
            | ResourceKind::MultiNetworkPolicy
    )
}

/// Whether the update logic considers two revisions equal, meaning no work
/// is needed. Kinds that force the update path always report unequal.
pub fn resources_equal(a: &KubeObject, b: &KubeObject) -> anyhow::Result<bool> {
    match (a, b) {
        (KubeObject::NetworkPolicy(x), KubeObject::NetworkPolicy(y)) => Ok(x == y),
        (KubeObject::Node(x), KubeObject::Node(y)) => {
            let addresses = |n: &fabric_controller_k8s_api::Node| {
                n.status.as_ref().map(|s| s.addresses.clone())
            };
            Ok(x.metadata.labels == y.metadata.labels && addresses(x) == addresses(y))
        }
        (KubeObject::EgressFirewall(x), KubeObject::EgressFirewall(y)) => Ok(x.spec == y.spec),
        (KubeObject::MultiNetworkPolicy(x), KubeObject::MultiNetworkPolicy(y)) => {
            Ok(x.spec == y.spec && x.metadata.labels == y.metadata.labels)
        }
        // These kinds force the update path: pretend revisions always
        // differ.
        (KubeObject::Pod(_), KubeObject::Pod(_))
        | (KubeObject::Namespace(_), KubeObject::Namespace(_))
        | (KubeObject::EgressIp(_), KubeObject::EgressIp(_))
        | (KubeObject::CloudPrivateIpConfig(_), KubeObject::CloudPrivateIpConfig(_)) => Ok(false),
        _ => anyhow::bail!(
            "no object comparison for types {} and {}",
            a.kind(),
            b.kind()
        ),
    }
}

/// Latest state of an object from the watch caches.
pub fn resource_from_cache(
    factory: &WatchFactory,
    kind: ResourceKind,
    key: &ObjectKey,
) -> Result<KubeObject, watch::Error> {
    match kind {
        ResourceKind::Pod => factory
            .get_pod(&key.namespace, &key.name)
            .map(KubeObject::Pod),
        ResourceKind::Node => factory.get_node(&key.name).map(KubeObject::Node),
        ResourceKind::Namespace => factory.get_namespace(&key.name).map(KubeObject::Namespace),
        ResourceKind::NetworkPolicy => factory
            .get_network_policy(&key.namespace, &key.name)
            .map(KubeObject::NetworkPolicy),
        ResourceKind::EgressFirewall => factory
            .get_egress_firewall(&key.namespace, &key.name)
            .map(KubeObject::EgressFirewall),
        ResourceKind::EgressIp => factory.get_egress_ip(&key.name).map(KubeObject::EgressIp),
        ResourceKind::CloudPrivateIpConfig => factory
            .get_cloud_private_ip_config(&key.name)
            .map(KubeObject::CloudPrivateIpConfig),
        ResourceKind::MultiNetworkPolicy => factory
            .get_multi_network_policy(&key.namespace, &key.name)
            .map(KubeObject::MultiNetworkPolicy),
        _ => Err(watch::Error::UnknownKind(kind)),
    }
}

/// True once the pod has been assigned a node.
pub fn pod_scheduled(pod: &Pod) -> bool {
    pod.spec
        .as_ref()
        .and_then(|s| s.node_name.as_deref())
        .is_some()
}

/// True when the pod reached a terminal phase and will never run again.
pub fn pod_completed(pod: &Pod) -> bool {
    matches!(
        pod.status
            .as_ref()
            .and_then(|s| s.phase.as_deref())
            .unwrap_or_default(),
        "Succeeded" | "Failed"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabric_controller_k8s_api::{ObjectMeta, PodSpec, PodStatus};
    use std::sync::Arc;

    fn mk_pod(node: Option<&str>, phase: Option<&str>) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: Some("p".to_string()),
                namespace: Some("ns".to_string()),
                ..Default::default()
            },
            spec: Some(PodSpec {
                node_name: node.map(str::to_string),
                ..Default::default()
            }),
            status: phase.map(|p| PodStatus {
                phase: Some(p.to_string()),
                ..Default::default()
            }),
        }
    }

    #[test]
    fn pods_always_take_the_update_path() {
        let a = KubeObject::Pod(Arc::new(mk_pod(None, None)));
        let b = a.clone();
        assert!(!resources_equal(&a, &b).unwrap());
    }

    #[test]
    fn mismatched_kinds_are_incomparable() {
        let pod = KubeObject::Pod(Arc::new(mk_pod(None, None)));
        let ns = KubeObject::Namespace(Arc::new(Default::default()));
        assert!(resources_equal(&pod, &ns).is_err());
    }

    #[test]
    fn scheduled_and_terminal_predicates() {
        assert!(!pod_scheduled(&mk_pod(None, None)));
        assert!(pod_scheduled(&mk_pod(Some("node-1"), None)));
        assert!(!pod_completed(&mk_pod(Some("node-1"), Some("Running"))));
        assert!(pod_completed(&mk_pod(Some("node-1"), Some("Succeeded"))));
        assert!(pod_completed(&mk_pod(Some("node-1"), Some("Failed"))));
    }
}
