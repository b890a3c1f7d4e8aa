//! Configuration validation.
//!
//! Serde handles syntax; this module rejects sidecar configs that would
//! produce a pod the API server refuses. Every problem is reported, not just
//! the first, so a broken config can be fixed in one pass.

use std::collections::HashSet;
use std::fmt;

use crate::config::schema::SidecarConfigFile;

/// A single semantic problem in a sidecar config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    EmptyContainerName { index: usize },
    MissingImage { container: String },
    DuplicateContainer { name: String },
    EmptyVolumeName { index: usize },
    DuplicateVolume { name: String },
    EmptyPullSecretName { index: usize },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptyContainerName { index } => {
                write!(f, "containers[{}] has no name", index)
            }
            ValidationError::MissingImage { container } => {
                write!(f, "container {:?} has no image", container)
            }
            ValidationError::DuplicateContainer { name } => {
                write!(f, "container {:?} is declared more than once", name)
            }
            ValidationError::EmptyVolumeName { index } => {
                write!(f, "volumes[{}] has no name", index)
            }
            ValidationError::DuplicateVolume { name } => {
                write!(f, "volume {:?} is declared more than once", name)
            }
            ValidationError::EmptyPullSecretName { index } => {
                write!(f, "imagePullSecrets[{}] has no name", index)
            }
        }
    }
}

/// Check a parsed sidecar config, collecting every error.
pub fn validate_sidecar_config(config: &SidecarConfigFile) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let mut container_names = HashSet::new();
    for (index, container) in config.containers.iter().enumerate() {
        if container.name.is_empty() {
            errors.push(ValidationError::EmptyContainerName { index });
        } else if !container_names.insert(container.name.as_str()) {
            errors.push(ValidationError::DuplicateContainer {
                name: container.name.clone(),
            });
        }

        if container.image.as_deref().map_or(true, str::is_empty) {
            errors.push(ValidationError::MissingImage {
                container: container.name.clone(),
            });
        }
    }

    let mut volume_names = HashSet::new();
    for (index, volume) in config.volumes.iter().enumerate() {
        if volume.name.is_empty() {
            errors.push(ValidationError::EmptyVolumeName { index });
        } else if !volume_names.insert(volume.name.as_str()) {
            errors.push(ValidationError::DuplicateVolume {
                name: volume.name.clone(),
            });
        }
    }

    // Go through JSON so the check does not depend on whether the generated
    // type models `name` as optional.
    for (index, secret) in config.image_pull_secrets.iter().enumerate() {
        let named = serde_json::to_value(secret)
            .ok()
            .and_then(|value| value.get("name").and_then(|n| n.as_str()).map(|n| !n.is_empty()))
            .unwrap_or(false);
        if !named {
            errors.push(ValidationError::EmptyPullSecretName { index });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
