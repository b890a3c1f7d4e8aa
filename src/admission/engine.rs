//! Admission decision and patch generation.
//!
//! Pure functions of (request, sidecar spec). The caller supplies the spec
//! snapshot; nothing in here touches shared state or does I/O.

use thiserror::Error;

use crate::admission::patch::create_patch;
use crate::admission::policy::{self, ResourceMeta, STATUS_ANNOTATION, STATUS_INJECTED};
use crate::admission::review::{AdmissionRequest, AdmissionResponse, AdmissionReview, ADMISSION_V1};
use crate::admission::scheme::{DecodeError, Scheme};
use crate::config::SidecarSpec;
use crate::observability::metrics;

/// Annotations set on every injected pod.
const INJECTED_ANNOTATIONS: &[(&str, &str)] = &[(STATUS_ANNOTATION, STATUS_INJECTED)];

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("could not decode target resource: {0}")]
    Decode(#[from] DecodeError),

    #[error("could not encode patch: {0}")]
    Encode(serde_json::Error),
}

/// Result of evaluating one resource. Policy never denies, so the only
/// variation is whether a patch is attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    /// Serialized JSON Patch, present only when mutation is required.
    pub patch: Option<Vec<u8>>,
}

impl Decision {
    fn unchanged() -> Self {
        Self { patch: None }
    }

    fn into_response(self) -> AdmissionResponse {
        let response = AdmissionResponse::allow();
        match self.patch {
            Some(patch) => response.with_patch(patch),
            None => response,
        }
    }
}

/// Decide whether the serialized resource needs sidecars and build the patch.
///
/// The only failure mode is an undecodable resource; injection itself cannot
/// fail for a spec that passed validation at load time.
pub fn decide(scheme: &Scheme, raw: &[u8], sidecar: &SidecarSpec) -> Result<Decision, EngineError> {
    let pod = scheme.decode_pod(raw)?;
    let meta = ResourceMeta::from(&pod.metadata);

    if !policy::mutation_required(&meta) {
        tracing::info!(
            namespace = %meta.namespace,
            name = %meta.name,
            "Skipping mutation due to policy check"
        );
        return Ok(Decision::unchanged());
    }

    let patch = create_patch(&pod, sidecar, INJECTED_ANNOTATIONS);
    let bytes = patch.to_bytes().map_err(EngineError::Encode)?;

    tracing::debug!(
        namespace = %meta.namespace,
        name = %meta.name,
        operations = patch.len(),
        patch = %String::from_utf8_lossy(&bytes),
        "Patch generated"
    );

    Ok(Decision { patch: Some(bytes) })
}

/// Run the engine for one admission request. The response uid mirrors the
/// request uid on every path.
pub fn mutate(scheme: &Scheme, request: &AdmissionRequest, sidecar: &SidecarSpec) -> AdmissionResponse {
    tracing::info!(
        uid = %request.uid,
        kind = %request.kind.kind,
        namespace = request.namespace.as_deref().unwrap_or_default(),
        name = request.name.as_deref().unwrap_or_default(),
        operation = ?request.operation,
        user = request.user_info.username.as_deref().unwrap_or_default(),
        "AdmissionReview received"
    );

    let response = match request.object.as_deref() {
        None => {
            tracing::error!(uid = %request.uid, "Admission request carries no object");
            metrics::record_admission(metrics::OUTCOME_ERROR);
            AdmissionResponse::invalid("admission request carries no object")
        }
        Some(object) => match decide(scheme, object.get().as_bytes(), sidecar) {
            Ok(decision) => {
                metrics::record_admission(if decision.patch.is_some() {
                    metrics::OUTCOME_PATCHED
                } else {
                    metrics::OUTCOME_SKIPPED
                });
                decision.into_response()
            }
            Err(e) => {
                tracing::error!(uid = %request.uid, error = %e, "Could not process raw object");
                metrics::record_admission(metrics::OUTCOME_ERROR);
                AdmissionResponse::invalid(e.to_string())
            }
        },
    };

    response.with_uid(request.uid.as_str())
}

/// Decode an admission review body, run the engine, and build the reply
/// envelope.
///
/// Decode failures still produce an envelope whose status message explains
/// the problem, so the API server can surface it.
pub fn review(scheme: &Scheme, body: &[u8], sidecar: &SidecarSpec) -> AdmissionReview {
    let review = match scheme.decode_review(body) {
        Ok(review) => review,
        Err(e) => {
            tracing::error!(error = %e, "Can't decode body");
            metrics::record_admission(metrics::OUTCOME_INVALID);
            return AdmissionReview::respond(ADMISSION_V1, AdmissionResponse::invalid(e.to_string()));
        }
    };

    let response = match review.request.as_ref() {
        Some(request) => mutate(scheme, request, sidecar),
        None => {
            tracing::error!("Admission review carries no request");
            metrics::record_admission(metrics::OUTCOME_INVALID);
            AdmissionResponse::invalid("admission review carries no request")
        }
    };

    AdmissionReview::respond(&review.api_version, response)
}
