//! Injection policy driven by pod annotations.
//!
//! A pod opts in with `inject: y|yes`. Once patched it carries
//! `status: injected`, which suppresses any further injection so the webhook
//! is idempotent under re-invocation. Both comparisons ignore ASCII case.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

/// Opt-in annotation.
pub const INJECT_ANNOTATION: &str = "sidecar-injector-mesher.io/inject";
/// Set on the pod once sidecars have been injected.
pub const STATUS_ANNOTATION: &str = "sidecar-injector-mesher.io/status";
pub const STATUS_INJECTED: &str = "injected";

/// The parts of a resource's metadata the policy looks at.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceMeta {
    pub namespace: String,
    pub name: String,
    pub annotations: BTreeMap<String, String>,
}

impl From<&ObjectMeta> for ResourceMeta {
    fn from(meta: &ObjectMeta) -> Self {
        Self {
            namespace: meta.namespace.clone().unwrap_or_default(),
            // Pods created through a controller only carry generateName at
            // admission time.
            name: meta
                .name
                .clone()
                .or_else(|| meta.generate_name.clone())
                .unwrap_or_default(),
            annotations: meta.annotations.clone().unwrap_or_default(),
        }
    }
}

impl ResourceMeta {
    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).map(String::as_str)
    }
}

/// Outcome of the annotation policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Already carries `status: injected`.
    AlreadyInjected,
    /// Opted in and not yet injected.
    Inject,
    /// No opt-in, or an opt-in value other than `y`/`yes`.
    Skip,
}

impl Verdict {
    pub fn mutation_required(self) -> bool {
        self == Verdict::Inject
    }
}

/// Evaluate the policy for a resource.
pub fn evaluate(meta: &ResourceMeta) -> Verdict {
    let status = meta.annotation(STATUS_ANNOTATION).unwrap_or_default();
    if status.eq_ignore_ascii_case(STATUS_INJECTED) {
        return Verdict::AlreadyInjected;
    }

    match meta.annotation(INJECT_ANNOTATION) {
        Some(value) if value.eq_ignore_ascii_case("y") || value.eq_ignore_ascii_case("yes") => {
            Verdict::Inject
        }
        _ => Verdict::Skip,
    }
}

/// Evaluate and log the policy decision.
pub fn mutation_required(meta: &ResourceMeta) -> bool {
    let verdict = evaluate(meta);
    tracing::info!(
        namespace = %meta.namespace,
        name = %meta.name,
        status = ?meta.annotation(STATUS_ANNOTATION).unwrap_or_default(),
        required = verdict.mutation_required(),
        "Mutation policy evaluated"
    );
    verdict.mutation_required()
}
