//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::{SidecarConfigFile, SidecarSpec};
use crate::config::validation::{validate_sidecar_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load, validate and normalize the sidecar config at `path`.
///
/// The file may be YAML or JSON.
pub fn load_sidecar_spec(path: &Path) -> Result<SidecarSpec, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_sidecar_spec(&content)
}

/// Parse sidecar config text that has already been read.
pub fn parse_sidecar_spec(content: &str) -> Result<SidecarSpec, ConfigError> {
    // An empty document deserializes as unit, not as an empty mapping.
    let file: SidecarConfigFile = if content.trim().is_empty() {
        SidecarConfigFile::default()
    } else {
        serde_yaml::from_str(content)?
    };

    validate_sidecar_config(&file).map_err(ConfigError::Validation)?;

    Ok(SidecarSpec::from(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SIDECAR_YAML: &str = r#"
containers:
  - name: sidecar-nginx
    image: nginx:1.25
    ports:
      - containerPort: 80
  - name: sidecar-log
    image: busybox
volumes:
  - name: nginx-conf
    configMap:
      name: nginx-configmap
imagePullSecrets:
  - name: regcred
"#;

    #[test]
    fn parses_yaml_and_applies_defaults() {
        let spec = parse_sidecar_spec(SIDECAR_YAML).unwrap();

        assert_eq!(spec.containers().len(), 2);
        assert_eq!(spec.containers()[0].name, "sidecar-nginx");
        assert_eq!(
            spec.containers()[0].ports.as_ref().unwrap()[0].protocol.as_deref(),
            Some("TCP")
        );
        assert_eq!(spec.containers()[1].image_pull_policy.as_deref(), Some("Always"));
        assert_eq!(
            spec.volumes()[0].config_map.as_ref().unwrap().default_mode,
            Some(0o644)
        );
        assert_eq!(spec.image_pull_secrets().len(), 1);
    }

    #[test]
    fn parses_json() {
        let spec = parse_sidecar_spec(
            r#"{"containers": [{"name": "proxy", "image": "envoy:v1"}], "volumes": []}"#,
        )
        .unwrap();
        assert_eq!(spec.containers()[0].name, "proxy");
        assert!(spec.volumes().is_empty());
        assert!(spec.image_pull_secrets().is_empty());
    }

    #[test]
    fn empty_file_is_an_empty_spec() {
        let spec = parse_sidecar_spec("\n").unwrap();
        assert!(spec.is_empty());
    }

    #[test]
    fn rejects_malformed_and_invalid_configs() {
        assert!(matches!(
            parse_sidecar_spec("containers: [ {name: "),
            Err(ConfigError::Parse(_))
        ));

        let err = parse_sidecar_spec("containers:\n  - name: proxy\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref errors) if errors.len() == 1));
        assert!(err.to_string().contains("has no image"));
    }

    #[test]
    fn loads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SIDECAR_YAML.as_bytes()).unwrap();

        let spec = load_sidecar_spec(file.path()).unwrap();
        assert_eq!(spec.containers().len(), 2);

        let missing = load_sidecar_spec(Path::new("/nonexistent/sidecar.yaml"));
        assert!(matches!(missing, Err(ConfigError::Io(_))));
    }
}
