//! Admission subsystem.
//!
//! # Data Flow
//! ```text
//! request body
//!     → scheme.rs (decode envelope, check version/kind)
//!     → engine.rs (decode pod, run policy)
//!     → policy.rs (annotation decision)
//!     → patch.rs (JSON Patch for containers, volumes, pull secrets, annotations)
//!     → review.rs (response envelope, uid mirrored from request)
//! ```
//!
//! # Design Decisions
//! - The engine never denies on policy grounds; its only refusal is an
//!   undecodable request
//! - Patches are only emitted when mutation is required
//! - Patch values are typed per target, never free-form JSON

pub mod engine;
pub mod patch;
pub mod policy;
pub mod review;
pub mod scheme;

pub use engine::{decide, mutate, review, Decision, EngineError};
pub use review::{AdmissionRequest, AdmissionResponse, AdmissionReview};
pub use scheme::{DecodeError, Scheme};
