//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustls::pki_types::PrivateKeyDer;
use rustls::sign::CertifiedKey;
use serde_json::{json, Value};

use sidecar_injector::config::WebhookParameters;

pub const INJECT: &str = "sidecar-injector-mesher.io/inject";
pub const STATUS: &str = "sidecar-injector-mesher.io/status";

pub const SIDECAR_YAML: &str = r#"
containers:
  - name: envoy
    image: envoyproxy/envoy:v1.30.1
    ports:
      - containerPort: 15001
volumes:
  - name: envoy-config
    configMap:
      name: envoy-config
imagePullSecrets:
  - name: registry-creds
"#;

pub const OTHER_SIDECAR_YAML: &str = r#"
containers:
  - name: linkerd-proxy
    image: cr.l5d.io/linkerd/proxy:stable
"#;

/// PEM certificate and key for a throwaway self-signed identity.
pub fn pem_pair(name: &str) -> (String, String) {
    let generated = rcgen::generate_simple_self_signed(vec![name.to_string()]).unwrap();
    (generated.cert.pem(), generated.key_pair.serialize_pem())
}

pub fn certified_key(name: &str) -> Arc<CertifiedKey> {
    let generated = rcgen::generate_simple_self_signed(vec![name.to_string()]).unwrap();
    let key = PrivateKeyDer::Pkcs8(generated.key_pair.serialize_der().into());
    let signing = rustls::crypto::aws_lc_rs::sign::any_supported_type(&key).unwrap();
    Arc::new(CertifiedKey::new(vec![generated.cert.der().clone()], signing))
}

/// A scratch layout mirroring the mounted config and certificate directories.
pub struct Workspace {
    pub dir: tempfile::TempDir,
    pub params: WebhookParameters,
}

impl Workspace {
    pub fn new(sidecar_yaml: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config_dir = dir.path().join("config");
        let certs_dir = dir.path().join("certs");
        std::fs::create_dir_all(&config_dir).unwrap();
        std::fs::create_dir_all(&certs_dir).unwrap();

        let params = WebhookParameters {
            port: 0,
            cert_file: certs_dir.join("cert.pem"),
            key_file: certs_dir.join("key.pem"),
            sidecar_config_file: config_dir.join("sidecarconfig.yaml"),
            ..Default::default()
        };

        let (cert, key) = pem_pair("sidecar-injector.default.svc");
        std::fs::write(&params.cert_file, cert).unwrap();
        std::fs::write(&params.key_file, key).unwrap();
        std::fs::write(&params.sidecar_config_file, sidecar_yaml).unwrap();

        Self { dir, params }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn write(&self, path: &Path, contents: &str) {
        std::fs::write(path, contents).unwrap();
    }
}

pub fn pod(annotations: Value) -> Value {
    json!({
        "apiVersion": "v1",
        "kind": "Pod",
        "metadata": {
            "name": "web-7d4b9c",
            "namespace": "shop",
            "annotations": annotations
        },
        "spec": {
            "containers": [{"name": "web", "image": "shop/web:2.3"}],
            "volumes": [{"name": "data", "emptyDir": {}}]
        }
    })
}

pub fn admission_review(api_version: &str, uid: &str, object: Value) -> Value {
    json!({
        "apiVersion": api_version,
        "kind": "AdmissionReview",
        "request": {
            "uid": uid,
            "kind": {"group": "", "version": "v1", "kind": "Pod"},
            "resource": {"group": "", "version": "v1", "resource": "pods"},
            "namespace": "shop",
            "operation": "CREATE",
            "userInfo": {"username": "system:serviceaccount:kube-system:replicaset-controller"},
            "object": object
        }
    })
}
