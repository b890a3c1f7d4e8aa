//! Admission handler tests driven through the Axum router.

mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use common::{admission_review, certified_key, pod, INJECT, SIDECAR_YAML, STATUS};
use sidecar_injector::admission::Scheme;
use sidecar_injector::config::loader::parse_sidecar_spec;
use sidecar_injector::http::server::MAX_BODY_BYTES;
use sidecar_injector::http::{router, MUTATION_PATH};
use sidecar_injector::lifecycle::{state, ActiveState};

fn app() -> Router {
    let spec = parse_sidecar_spec(SIDECAR_YAML).unwrap();
    let state = state::shared(ActiveState::new(spec, certified_key("localhost")));
    router(state, Arc::new(Scheme::admission()))
}

fn post(content_type: Option<&str>, body: impl Into<Body>) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri(MUTATION_PATH);
    if let Some(content_type) = content_type {
        builder = builder.header(header::CONTENT_TYPE, content_type);
    }
    builder.body(body.into()).unwrap()
}

async fn send(request: Request<Body>) -> (StatusCode, Option<String>, Vec<u8>) {
    let response = app().oneshot(request).await.unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .map(|v| v.to_str().unwrap().to_string());
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec();
    (status, content_type, body)
}

async fn review(body: Value) -> Value {
    let (status, content_type, bytes) = send(post(Some("application/json"), body.to_string())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("application/json"));
    serde_json::from_slice(&bytes).unwrap()
}

fn decode_patch(response: &Value) -> json_patch::Patch {
    use base64::Engine;
    let encoded = response["patch"].as_str().expect("patch present");
    let bytes = base64::engine::general_purpose::STANDARD.decode(encoded).unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn empty_body_is_bad_request() {
    let (status, _, body) = send(post(Some("application/json"), Body::empty())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.is_empty());
}

#[tokio::test]
async fn wrong_content_type_is_unsupported() {
    let body = admission_review("admission.k8s.io/v1", "uid-1", pod(json!({}))).to_string();

    for content_type in [Some("text/plain"), Some("application/json; charset=utf-8"), None] {
        let (status, _, bytes) = send(post(content_type, body.clone())).await;
        assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE, "{:?}", content_type);
        assert!(bytes.is_empty());
    }
}

#[tokio::test]
async fn other_methods_and_paths_are_rejected() {
    let request = Request::builder()
        .method("GET")
        .uri(MUTATION_PATH)
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = send(request).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);

    let request = Request::builder()
        .method("POST")
        .uri("/mutate")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let (status, _, _) = send(request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn opted_in_pod_gets_sidecars() {
    let target = pod(json!({ INJECT: "yes" }));
    let reply = review(admission_review("admission.k8s.io/v1", "4f8a-c3", target.clone())).await;

    assert_eq!(reply["apiVersion"], "admission.k8s.io/v1");
    assert_eq!(reply["kind"], "AdmissionReview");
    let response = &reply["response"];
    assert_eq!(response["uid"], "4f8a-c3");
    assert_eq!(response["allowed"], true);
    assert_eq!(response["patchType"], "JSONPatch");

    let mut patched = target;
    json_patch::patch(&mut patched, &decode_patch(response)).unwrap();

    let containers = patched["spec"]["containers"].as_array().unwrap();
    assert_eq!(containers.len(), 2);
    assert_eq!(containers[0]["name"], "web");
    assert_eq!(containers[1]["name"], "envoy");
    assert_eq!(containers[1]["imagePullPolicy"], "IfNotPresent");
    assert_eq!(containers[1]["terminationMessagePath"], "/dev/termination-log");
    assert_eq!(containers[1]["ports"][0]["protocol"], "TCP");

    let volumes = patched["spec"]["volumes"].as_array().unwrap();
    assert_eq!(volumes.len(), 2);
    assert_eq!(volumes[1]["name"], "envoy-config");
    assert_eq!(volumes[1]["configMap"]["defaultMode"], 420);

    assert_eq!(patched["spec"]["imagePullSecrets"], json!([{"name": "registry-creds"}]));
    assert_eq!(patched["metadata"]["annotations"][STATUS], "injected");
}

#[tokio::test]
async fn v1beta1_review_is_echoed() {
    let reply = review(admission_review(
        "admission.k8s.io/v1beta1",
        "beta-uid",
        pod(json!({ INJECT: "yes" })),
    ))
    .await;

    assert_eq!(reply["apiVersion"], "admission.k8s.io/v1beta1");
    assert_eq!(reply["response"]["uid"], "beta-uid");
    assert!(reply["response"]["patch"].is_string());
}

#[tokio::test]
async fn pods_without_opt_in_are_allowed_unchanged() {
    for annotations in [
        json!({}),
        json!({ INJECT: "no" }),
        json!({ INJECT: "true" }),
        json!({ INJECT: "yes", STATUS: "injected" }),
    ] {
        let reply = review(admission_review("admission.k8s.io/v1", "uid-skip", pod(annotations))).await;
        let response = &reply["response"];
        assert_eq!(response["uid"], "uid-skip");
        assert_eq!(response["allowed"], true);
        assert!(response.get("patch").is_none());
        assert!(response.get("patchType").is_none());
    }
}

#[tokio::test]
async fn undecodable_review_is_answered_with_message() {
    let (status, _, bytes) = send(post(Some("application/json"), "{not json")).await;
    assert_eq!(status, StatusCode::OK);

    let reply: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(reply["response"]["allowed"], false);
    assert!(reply["response"]["status"]["message"].as_str().unwrap().contains("json"));
}

#[tokio::test]
async fn unknown_review_kind_is_rejected() {
    let mut body = admission_review("admission.k8s.io/v1", "uid-x", pod(json!({ INJECT: "y" })));
    body["kind"] = json!("ConfigMap");

    let reply = review(body).await;
    assert_eq!(reply["response"]["allowed"], false);
    assert!(reply["response"].get("patch").is_none());
}

#[tokio::test]
async fn large_update_review_fits_the_body_limit() {
    let mut old_object = pod(json!({}));
    old_object["metadata"]["annotations"]["bulk"] = json!("x".repeat(1400 * 1024));
    let mut object = old_object.clone();
    object["metadata"]["annotations"][INJECT] = json!("yes");

    let mut body = admission_review("admission.k8s.io/v1", "uid-big", object);
    body["request"]["operation"] = json!("UPDATE");
    body["request"]["oldObject"] = old_object;
    assert!(body.to_string().len() > 2 * 1024 * 1024);

    let reply = review(body).await;
    assert_eq!(reply["response"]["uid"], "uid-big");
    assert!(reply["response"]["patch"].is_string());
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let body = vec![b' '; MAX_BODY_BYTES + 1];
    let (status, _, _) = send(post(Some("application/json"), body)).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
}
