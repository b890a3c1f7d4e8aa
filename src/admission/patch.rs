//! JSON Patch (RFC 6902) generation for sidecar injection.
//!
//! Only the shapes the injector needs are modelled: `add` and `replace` on
//! the pod's container, volume and pull-secret lists and on its annotations.
//! Values borrow from the sidecar spec for the duration of one request.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{Container, LocalObjectReference, Pod, Volume};
use serde::Serialize;

use crate::config::SidecarSpec;

pub const CONTAINERS_PATH: &str = "/spec/containers";
pub const VOLUMES_PATH: &str = "/spec/volumes";
pub const IMAGE_PULL_SECRETS_PATH: &str = "/spec/imagePullSecrets";
pub const ANNOTATIONS_PATH: &str = "/metadata/annotations";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Op {
    Add,
    Replace,
}

/// One injectable object.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Element<'a> {
    Container(&'a Container),
    Volume(&'a Volume),
    PullSecret(&'a LocalObjectReference),
    Annotations(BTreeMap<&'a str, &'a str>),
}

/// Shape of an operation's value. Which one is used depends on whether the
/// target collection already exists.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PatchValue<'a> {
    Scalar(&'a str),
    Single(Element<'a>),
    List(Vec<Element<'a>>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatchOperation<'a> {
    pub op: Op,
    pub path: String,
    pub value: PatchValue<'a>,
}

impl<'a> PatchOperation<'a> {
    pub fn add(path: impl Into<String>, value: PatchValue<'a>) -> Self {
        Self {
            op: Op::Add,
            path: path.into(),
            value,
        }
    }

    pub fn replace(path: impl Into<String>, value: PatchValue<'a>) -> Self {
        Self {
            op: Op::Replace,
            path: path.into(),
            value,
        }
    }
}

/// Ordered list of operations, serialized as a JSON array.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct PatchDocument<'a>(Vec<PatchOperation<'a>>);

impl<'a> PatchDocument<'a> {
    pub fn operations(&self) -> &[PatchOperation<'a>] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The wire form of the document.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&self.0)
    }
}

/// Types that can be appended to a pod list.
pub trait Injectable {
    fn element(&self) -> Element<'_>;
}

impl Injectable for Container {
    fn element(&self) -> Element<'_> {
        Element::Container(self)
    }
}

impl Injectable for Volume {
    fn element(&self) -> Element<'_> {
        Element::Volume(self)
    }
}

impl Injectable for LocalObjectReference {
    fn element(&self) -> Element<'_> {
        Element::PullSecret(self)
    }
}

/// Operations appending `additions` to the list at `path`.
///
/// JSON Patch cannot append to an absent array, so an empty target gets a
/// single `add` carrying the whole list. A non-empty target gets one
/// `add <path>/-` per item, in order.
pub fn insert<'a, T: Injectable>(
    target: &[T],
    additions: &'a [T],
    path: &str,
) -> Vec<PatchOperation<'a>> {
    if additions.is_empty() {
        return Vec::new();
    }

    if target.is_empty() {
        let items = additions.iter().map(T::element).collect();
        return vec![PatchOperation::add(path, PatchValue::List(items))];
    }

    let append = format!("{}/-", path);
    additions
        .iter()
        .map(|item| PatchOperation::add(append.as_str(), PatchValue::Single(item.element())))
        .collect()
}

/// Operations setting each `(key, value)` annotation, in input order.
///
/// A key that is absent or empty on the target creates the annotations map
/// as a single-key object. Keys already set are replaced in place. After the
/// map has been created, later keys are added as members so they do not
/// overwrite it.
pub fn update_annotations<'a>(
    target: Option<&BTreeMap<String, String>>,
    updates: &[(&'a str, &'a str)],
) -> Vec<PatchOperation<'a>> {
    let mut created = false;

    updates
        .iter()
        .map(|&(key, value)| {
            let present = target
                .and_then(|annotations| annotations.get(key))
                .is_some_and(|current| !current.is_empty());

            if created {
                PatchOperation::add(annotation_path(key), PatchValue::Scalar(value))
            } else if present {
                PatchOperation::replace(annotation_path(key), PatchValue::Scalar(value))
            } else {
                created = true;
                let map = BTreeMap::from([(key, value)]);
                PatchOperation::add(ANNOTATIONS_PATH, PatchValue::Single(Element::Annotations(map)))
            }
        })
        .collect()
}

/// Build the full injection patch for `pod`.
pub fn create_patch<'a>(
    pod: &Pod,
    sidecar: &'a SidecarSpec,
    annotations: &[(&'a str, &'a str)],
) -> PatchDocument<'a> {
    let spec = pod.spec.as_ref();
    let containers = spec.map(|s| s.containers.as_slice()).unwrap_or_default();
    let volumes = spec.and_then(|s| s.volumes.as_deref()).unwrap_or_default();
    let secrets = spec
        .and_then(|s| s.image_pull_secrets.as_deref())
        .unwrap_or_default();

    let mut ops = insert(containers, sidecar.containers(), CONTAINERS_PATH);
    ops.extend(insert(volumes, sidecar.volumes(), VOLUMES_PATH));
    ops.extend(insert(secrets, sidecar.image_pull_secrets(), IMAGE_PULL_SECRETS_PATH));
    ops.extend(update_annotations(pod.metadata.annotations.as_ref(), annotations));

    PatchDocument(ops)
}

/// JSON pointer to one annotation, escaped per RFC 6901.
fn annotation_path(key: &str) -> String {
    format!(
        "{}/{}",
        ANNOTATIONS_PATH,
        key.replace('~', "~0").replace('/', "~1")
    )
}
