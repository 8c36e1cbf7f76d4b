//! Pure functions turning Kubernetes pod objects into peers.
//!
//! Kept free of API calls so pod selection and credential lookup can be
//! tested against hand-built `Pod` values.

use k8s_openapi::api::core::v1::{Container, Pod};

use super::PeerRef;
use crate::error::Error;

/// Where a peer's credential comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// Literal `value` in the container environment.
    Literal(String),
    /// `valueFrom.secretKeyRef`.
    SecretRef { name: String, key: String },
    /// Variable not present in any inspected container.
    Absent,
}

/// Extract the ordinal from a pod name of the form `<prefix>-<ordinal>`.
///
/// Returns `None` for any other name, including pods that merely share the
/// prefix (`redis-cluster-metrics-0` does not match prefix `redis-cluster`).
pub fn peer_ordinal(pod_name: &str, prefix: &str) -> Option<u32> {
    let ordinal = pod_name.strip_prefix(prefix)?.strip_prefix('-')?;
    if ordinal.is_empty() || !ordinal.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    ordinal.parse().ok()
}

/// Build the expected peer set from a pod listing.
///
/// With `count == None` the count is the number of pods whose name matches
/// `<prefix>-<ordinal>`. Every ordinal in `0..count` must then exist, be
/// running and have an IP.
pub fn peers_from_pods(
    pods: &[Pod],
    prefix: &str,
    count: Option<u32>,
) -> Result<Vec<PeerRef>, Error> {
    let matching: Vec<(u32, &Pod)> = pods
        .iter()
        .filter_map(|pod| {
            let name = pod.metadata.name.as_deref()?;
            peer_ordinal(name, prefix).map(|ordinal| (ordinal, pod))
        })
        .collect();

    let count = match count {
        Some(n) => n,
        None => u32::try_from(matching.len())
            .map_err(|_| Error::Resolution("Too many matching pods".to_string()))?,
    };

    if count == 0 {
        return Err(Error::Resolution(format!(
            "No pods matching {}-<ordinal>",
            prefix
        )));
    }

    let mut peers = Vec::with_capacity(count as usize);

    for ordinal in 0..count {
        let pod_name = format!("{}-{}", prefix, ordinal);

        let pod = matching
            .iter()
            .find(|(o, _)| *o == ordinal)
            .map(|(_, pod)| *pod)
            .ok_or_else(|| Error::Resolution(format!("Pod {} not found", pod_name)))?;

        let status = pod.status.as_ref();
        let phase = status
            .and_then(|s| s.phase.as_deref())
            .unwrap_or("Unknown");
        if phase != "Running" {
            return Err(Error::Resolution(format!(
                "Pod {} is not running (phase: {})",
                pod_name, phase
            )));
        }

        let ip = status
            .and_then(|s| s.pod_ip.as_deref())
            .filter(|ip| !ip.is_empty())
            .ok_or_else(|| Error::Resolution(format!("Pod {} has no IP", pod_name)))?;

        peers.push(PeerRef::new(ordinal, pod_name, ip));
    }

    Ok(peers)
}

/// Find how the credential variable is defined in a pod's containers.
///
/// When `container` is given only that container is inspected; otherwise
/// the first container defining `var` wins.
pub fn credential_source(pod: &Pod, container: Option<&str>, var: &str) -> CredentialSource {
    let Some(spec) = pod.spec.as_ref() else {
        return CredentialSource::Absent;
    };

    let candidates: Vec<&Container> = spec
        .containers
        .iter()
        .filter(|c| container.is_none_or(|name| c.name == name))
        .collect();

    for c in candidates {
        let Some(env) = c.env.as_ref() else {
            continue;
        };
        let Some(var_def) = env.iter().find(|e| e.name == var) else {
            continue;
        };

        if let Some(value) = var_def.value.as_ref().filter(|v| !v.is_empty()) {
            return CredentialSource::Literal(value.clone());
        }

        if let Some(secret_ref) = var_def
            .value_from
            .as_ref()
            .and_then(|src| src.secret_key_ref.as_ref())
        {
            return CredentialSource::SecretRef {
                name: secret_ref.name.clone(),
                key: secret_ref.key.clone(),
            };
        }
    }

    CredentialSource::Absent
}
