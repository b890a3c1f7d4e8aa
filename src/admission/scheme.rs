//! Registry of the wire types the webhook accepts.
//!
//! A `Scheme` is built once at startup and shared read-only with every
//! request handler. Decoding goes through it so that an envelope of an
//! unexpected version or kind is rejected with a clear message instead of
//! being half-parsed.

use std::collections::BTreeSet;

use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::Resource;
use serde::Deserialize;
use thiserror::Error;

use crate::admission::review::{
    AdmissionReview, ADMISSION_REVIEW_KIND, ADMISSION_V1, ADMISSION_V1BETA1,
};

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("json parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Object 'Kind' is missing in request body")]
    MissingKind,

    #[error("no kind {kind:?} is registered for version {api_version:?}")]
    UnknownKind { api_version: String, kind: String },
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct TypeMeta {
    api_version: String,
    kind: String,
}

/// Immutable set of `(apiVersion, kind)` pairs this process understands.
#[derive(Debug, Clone, Default)]
pub struct Scheme {
    registered: BTreeSet<(String, String)>,
}

impl Scheme {
    /// An empty scheme; add types with [`Scheme::with`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one type.
    pub fn with(mut self, api_version: &str, kind: &str) -> Self {
        self.registered
            .insert((api_version.to_string(), kind.to_string()));
        self
    }

    /// The scheme the sidecar webhook serves: both admission review versions
    /// and core/v1 pods.
    pub fn admission() -> Self {
        Self::new()
            .with(ADMISSION_V1, ADMISSION_REVIEW_KIND)
            .with(ADMISSION_V1BETA1, ADMISSION_REVIEW_KIND)
            .with(Pod::API_VERSION, Pod::KIND)
    }

    pub fn recognizes(&self, api_version: &str, kind: &str) -> bool {
        self.registered
            .contains(&(api_version.to_string(), kind.to_string()))
    }

    /// Decode an admission review envelope. The envelope must name a
    /// registered version and kind.
    pub fn decode_review(&self, body: &[u8]) -> Result<AdmissionReview, DecodeError> {
        let review: AdmissionReview = serde_json::from_slice(body)?;

        if review.kind.is_empty() {
            return Err(DecodeError::MissingKind);
        }
        if !self.recognizes(&review.api_version, &review.kind) {
            return Err(DecodeError::UnknownKind {
                api_version: review.api_version,
                kind: review.kind,
            });
        }

        Ok(review)
    }

    /// Decode the pod under review.
    ///
    /// Version and kind are optional on embedded objects, but when present
    /// they must be registered.
    pub fn decode_pod(&self, raw: &[u8]) -> Result<Pod, DecodeError> {
        let meta: TypeMeta = serde_json::from_slice(raw)?;
        if !meta.kind.is_empty() && !self.recognizes(&meta.api_version, &meta.kind) {
            return Err(DecodeError::UnknownKind {
                api_version: meta.api_version,
                kind: meta.kind,
            });
        }

        Ok(serde_json::from_slice(raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admission_scheme_registrations() {
        let scheme = Scheme::admission();
        assert!(scheme.recognizes("admission.k8s.io/v1", "AdmissionReview"));
        assert!(scheme.recognizes("admission.k8s.io/v1beta1", "AdmissionReview"));
        assert!(scheme.recognizes("v1", "Pod"));
        assert!(!scheme.recognizes("apps/v1", "Deployment"));
        assert!(!Scheme::new().recognizes("v1", "Pod"));
    }

    #[test]
    fn decode_review_checks_type_meta() {
        let scheme = Scheme::admission();

        let ok = scheme.decode_review(
            br#"{"apiVersion":"admission.k8s.io/v1beta1","kind":"AdmissionReview","request":{"uid":"u1"}}"#,
        );
        assert_eq!(ok.unwrap().request.unwrap().uid, "u1");

        let missing = scheme.decode_review(br#"{"request":{"uid":"u1"}}"#);
        assert!(matches!(missing, Err(DecodeError::MissingKind)));

        let unknown = scheme.decode_review(br#"{"apiVersion":"v1","kind":"ConfigMap"}"#);
        assert!(matches!(unknown, Err(DecodeError::UnknownKind { .. })));

        let garbage = scheme.decode_review(b"{not json");
        assert!(matches!(garbage, Err(DecodeError::Json(_))));
    }

    #[test]
    fn decode_pod_accepts_bare_and_typed_objects() {
        let scheme = Scheme::admission();

        let bare = scheme
            .decode_pod(br#"{"metadata":{"name":"web"},"spec":{"containers":[]}}"#)
            .unwrap();
        assert_eq!(bare.metadata.name.as_deref(), Some("web"));

        let typed = scheme
            .decode_pod(br#"{"apiVersion":"v1","kind":"Pod","metadata":{"name":"web"}}"#)
            .unwrap();
        assert_eq!(typed.metadata.name.as_deref(), Some("web"));

        let wrong = scheme.decode_pod(br#"{"apiVersion":"apps/v1","kind":"Deployment"}"#);
        assert!(matches!(wrong, Err(DecodeError::UnknownKind { .. })));

        assert!(scheme.decode_pod(br#""not a pod""#).is_err());
    }
}
