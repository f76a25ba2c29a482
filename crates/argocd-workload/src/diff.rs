//! Change detection between a desired and a stored workload
//!
//! [`detect`] runs every field-group predicate from [`crate::merge`] and ORs
//! the results. It never does I/O, so the lifecycle coordinator can call it
//! on every reconcile and only write when something moved.

use std::fmt;

use argocd_common::LABEL_IMAGE_UPGRADED;

use crate::k8s::Container;
use crate::merge::{self, args_eq, env_eq, ordered_eq, resources_eq};
use crate::workload::Workload;

/// Mutable field groups of a workload
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FieldGroup {
    /// `spec.replicas`
    Replicas,
    /// Container count or names
    Containers,
    /// Container images
    Image,
    /// Container command
    Command,
    /// Container args
    Args,
    /// Container environment
    Env,
    /// Pod volumes
    Volumes,
    /// Container volume mounts
    VolumeMounts,
    /// Container resources
    Resources,
    /// Init containers
    InitContainers,
    /// Node selector and tolerations
    NodePlacement,
}

impl fmt::Display for FieldGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Replicas => "replicas",
            Self::Containers => "containers",
            Self::Image => "image",
            Self::Command => "command",
            Self::Args => "args",
            Self::Env => "env",
            Self::Volumes => "volumes",
            Self::VolumeMounts => "volumeMounts",
            Self::Resources => "resources",
            Self::InitContainers => "initContainers",
            Self::NodePlacement => "nodePlacement",
        };
        f.write_str(s)
    }
}

/// Outcome of comparing desired against actual
#[derive(Clone, Debug, PartialEq)]
pub struct ChangeSet {
    /// Whether an update is required
    pub changed: bool,
    /// Object to write when `changed`, otherwise the stored object untouched
    pub merged: Workload,
    /// Groups that differed, in detection order
    pub changed_fields: Vec<FieldGroup>,
}

impl ChangeSet {
    /// Whether a particular group differed
    pub fn touched(&self, group: FieldGroup) -> bool {
        self.changed_fields.contains(&group)
    }
}

/// Compare `desired` against `actual` and compute what to write
///
/// When anything differs the merged object keeps the stored identity (name,
/// namespace, selector, serviceName) and takes every mutable field from
/// `desired`. The `image.upgraded` pod label is carried over from `actual`.
pub fn detect(desired: &Workload, actual: &Workload) -> ChangeSet {
    let mut changed_fields = Vec::new();
    let desired_pod = &desired.spec.template.spec;
    let actual_pod = &actual.spec.template.spec;

    if desired.spec.replicas.unwrap_or(1) != actual.spec.replicas.unwrap_or(1) {
        changed_fields.push(FieldGroup::Replicas);
    }

    compare_containers(
        &desired_pod.containers,
        &actual_pod.containers,
        &mut changed_fields,
    );

    if !ordered_eq(&desired_pod.volumes, &actual_pod.volumes) {
        changed_fields.push(FieldGroup::Volumes);
    }

    let mut init_fields = Vec::new();
    compare_containers(
        &desired_pod.init_containers,
        &actual_pod.init_containers,
        &mut init_fields,
    );
    if !init_fields.is_empty() {
        changed_fields.push(FieldGroup::InitContainers);
    }

    if merge::merge_node_placement(desired_pod, actual_pod).changed {
        changed_fields.push(FieldGroup::NodePlacement);
    }

    if changed_fields.is_empty() {
        return ChangeSet {
            changed: false,
            merged: actual.clone(),
            changed_fields,
        };
    }

    ChangeSet {
        changed: true,
        merged: overlay(desired, actual),
        changed_fields,
    }
}

/// Compare two container lists pairwise, recording every differing group once
fn compare_containers(desired: &[Container], actual: &[Container], fields: &mut Vec<FieldGroup>) {
    let same_shape = desired.len() == actual.len()
        && desired.iter().zip(actual).all(|(d, a)| d.name == a.name);
    if !same_shape {
        fields.push(FieldGroup::Containers);
        return;
    }

    let mut record = |group: FieldGroup, equal: bool| {
        if !equal && !fields.contains(&group) {
            fields.push(group);
        }
    };

    for (d, a) in desired.iter().zip(actual) {
        record(FieldGroup::Image, d.image == a.image);
        record(
            FieldGroup::Command,
            args_eq(d.command.as_ref(), a.command.as_ref()),
        );
        record(FieldGroup::Args, args_eq(d.args.as_ref(), a.args.as_ref()));
        record(FieldGroup::Env, env_eq(&d.env, &a.env));
        record(
            FieldGroup::VolumeMounts,
            ordered_eq(&d.volume_mounts, &a.volume_mounts),
        );
        record(
            FieldGroup::Resources,
            resources_eq(d.resources.as_ref(), a.resources.as_ref()),
        );
    }
}

/// Stored identity with desired mutable state on top
///
/// Metadata is limited to the operator's own labels and owner reference so an
/// apply never claims labels or annotations written by someone else.
fn overlay(desired: &Workload, actual: &Workload) -> Workload {
    let mut merged = actual.clone();

    merged.metadata.labels = desired.metadata.labels.clone();
    merged.metadata.annotations = desired.metadata.annotations.clone();
    merged.metadata.owner_references = desired.metadata.owner_references.clone();

    merged.spec.replicas = desired.spec.replicas;
    merged.spec.template.spec = desired.spec.template.spec.clone();

    let mut labels = desired.spec.template.metadata.labels.clone();
    if let Some(stamp) = actual.spec.template.metadata.labels.get(LABEL_IMAGE_UPGRADED) {
        labels
            .entry(LABEL_IMAGE_UPGRADED.to_string())
            .or_insert_with(|| stamp.clone());
    }
    merged.spec.template.metadata.labels = labels;
    merged
}
