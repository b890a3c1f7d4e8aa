//! Orchestrator-equivalent defaulting for injected material.
//!
//! The API server defaults every container and volume it persists. Sidecars
//! injected through a patch bypass that step for the patch body itself, so
//! the same defaults are applied here up front. Otherwise the stored pod and
//! the injected template differ and controllers comparing them see a diff
//! that never converges.
//!
//! Every function is idempotent: only unset fields are filled in.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{
    Container, EmptyDirVolumeSource, HTTPGetAction, ObjectFieldSelector, Probe,
    ResourceRequirements, Volume,
};

const TERMINATION_MESSAGE_PATH: &str = "/dev/termination-log";
const TERMINATION_MESSAGE_POLICY: &str = "File";
const PULL_ALWAYS: &str = "Always";
const PULL_IF_NOT_PRESENT: &str = "IfNotPresent";
const PROTOCOL_TCP: &str = "TCP";
const SCHEME_HTTP: &str = "HTTP";
const HTTP_GET_PATH: &str = "/";
const FIELD_API_VERSION: &str = "v1";
const HOST_PATH_UNSET: &str = "";
/// 0644, the mode projected files get unless a volume says otherwise.
const VOLUME_DEFAULT_MODE: i32 = 0o644;
const TOKEN_EXPIRATION_SECONDS: i64 = 3600;

const PROBE_TIMEOUT_SECONDS: i32 = 1;
const PROBE_PERIOD_SECONDS: i32 = 10;
const PROBE_SUCCESS_THRESHOLD: i32 = 1;
const PROBE_FAILURE_THRESHOLD: i32 = 3;

/// Apply container defaults in place.
pub fn container(container: &mut Container) {
    container
        .termination_message_path
        .get_or_insert_with(|| TERMINATION_MESSAGE_PATH.to_string());
    container
        .termination_message_policy
        .get_or_insert_with(|| TERMINATION_MESSAGE_POLICY.to_string());

    if container.image_pull_policy.is_none() {
        let image = container.image.as_deref().unwrap_or_default();
        container.image_pull_policy = Some(image_pull_policy(image).to_string());
    }

    for port in container.ports.iter_mut().flatten() {
        port.protocol.get_or_insert_with(|| PROTOCOL_TCP.to_string());
    }

    for env in container.env.iter_mut().flatten() {
        if let Some(selector) = env.value_from.as_mut().and_then(|src| src.field_ref.as_mut()) {
            field_selector(selector);
        }
    }

    let probes = [
        &mut container.liveness_probe,
        &mut container.readiness_probe,
        &mut container.startup_probe,
    ];
    for probe in probes.into_iter().flatten() {
        self::probe(probe);
    }

    if let Some(lifecycle) = container.lifecycle.as_mut() {
        for handler in [&mut lifecycle.post_start, &mut lifecycle.pre_stop]
            .into_iter()
            .flatten()
        {
            if let Some(action) = handler.http_get.as_mut() {
                http_get(action);
            }
        }
    }

    if let Some(resources) = container.resources.as_mut() {
        requests_from_limits(resources);
    }
}

/// Apply volume defaults in place.
pub fn volume(volume: &mut Volume) {
    if has_no_source(volume) {
        volume.empty_dir = Some(EmptyDirVolumeSource::default());
    }

    if let Some(secret) = volume.secret.as_mut() {
        secret.default_mode.get_or_insert(VOLUME_DEFAULT_MODE);
    }
    if let Some(config_map) = volume.config_map.as_mut() {
        config_map.default_mode.get_or_insert(VOLUME_DEFAULT_MODE);
    }
    if let Some(projected) = volume.projected.as_mut() {
        projected.default_mode.get_or_insert(VOLUME_DEFAULT_MODE);
        for source in projected.sources.iter_mut().flatten() {
            if let Some(token) = source.service_account_token.as_mut() {
                token.expiration_seconds.get_or_insert(TOKEN_EXPIRATION_SECONDS);
            }
            if let Some(downward) = source.downward_api.as_mut() {
                for item in downward.items.iter_mut().flatten() {
                    if let Some(selector) = item.field_ref.as_mut() {
                        field_selector(selector);
                    }
                }
            }
        }
    }
    if let Some(downward) = volume.downward_api.as_mut() {
        downward.default_mode.get_or_insert(VOLUME_DEFAULT_MODE);
        for item in downward.items.iter_mut().flatten() {
            if let Some(selector) = item.field_ref.as_mut() {
                field_selector(selector);
            }
        }
    }
    if let Some(host_path) = volume.host_path.as_mut() {
        host_path.type_.get_or_insert_with(|| HOST_PATH_UNSET.to_string());
    }
}

/// `Always` for untagged or `:latest` images, `IfNotPresent` otherwise.
fn image_pull_policy(image: &str) -> &'static str {
    if image.contains('@') {
        return PULL_IF_NOT_PRESENT;
    }

    // A colon before the last slash belongs to a registry port, not a tag.
    let name = image.rsplit('/').next().unwrap_or(image);
    match name.rsplit_once(':') {
        Some((_, tag)) if !tag.is_empty() && tag != "latest" => PULL_IF_NOT_PRESENT,
        _ => PULL_ALWAYS,
    }
}

fn probe(probe: &mut Probe) {
    probe.timeout_seconds.get_or_insert(PROBE_TIMEOUT_SECONDS);
    probe.period_seconds.get_or_insert(PROBE_PERIOD_SECONDS);
    probe.success_threshold.get_or_insert(PROBE_SUCCESS_THRESHOLD);
    probe.failure_threshold.get_or_insert(PROBE_FAILURE_THRESHOLD);
    if let Some(action) = probe.http_get.as_mut() {
        http_get(action);
    }
}

fn http_get(action: &mut HTTPGetAction) {
    action.path.get_or_insert_with(|| HTTP_GET_PATH.to_string());
    action.scheme.get_or_insert_with(|| SCHEME_HTTP.to_string());
}

fn field_selector(selector: &mut ObjectFieldSelector) {
    selector
        .api_version
        .get_or_insert_with(|| FIELD_API_VERSION.to_string());
}

fn requests_from_limits(resources: &mut ResourceRequirements) {
    let Some(limits) = resources.limits.as_ref().filter(|limits| !limits.is_empty()) else {
        return;
    };

    let requests = resources.requests.get_or_insert_with(BTreeMap::new);
    for (name, quantity) in limits {
        requests
            .entry(name.clone())
            .or_insert_with(|| quantity.clone());
    }
}

/// A volume that names no source at all is an `emptyDir`.
fn has_no_source(volume: &Volume) -> bool {
    match serde_json::to_value(volume) {
        Ok(serde_json::Value::Object(fields)) => fields.keys().all(|key| key == "name"),
        _ => false,
    }
}
