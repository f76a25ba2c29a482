//! Redis HA StatefulSet
//!
//! Exists only while `spec.ha.enabled` is set. Reconciled for image and
//! node-placement drift the same way as the application controller.

use argocd_common::crd::ArgoCDSpec;
use argocd_common::kube_utils::{ObjectMeta, OwnerReference};
use argocd_common::LABEL_NAME;

use crate::builder::{apply_node_placement, component_labels, component_name, REDIS_PORT};
use crate::k8s::{Container, ContainerPort, ResourceRequirements, Volume, VolumeMount};
use crate::workload::{Workload, WorkloadKind, WorkloadRef};

/// Component suffix of the redis HA StatefulSet
pub const REDIS_HA_SERVER_COMPONENT: &str = "redis-ha-server";

/// Redis HA replica count
pub const REDIS_HA_REPLICAS: i32 = 3;

/// Sentinel port
pub const SENTINEL_PORT: u16 = 26379;

const DATA_VOLUME: &str = "data";
const DATA_MOUNT: &str = "/data";

/// Store key of the redis HA StatefulSet
pub fn redis_ha_ref(instance: &str, namespace: &str) -> WorkloadRef {
    WorkloadRef::new(
        WorkloadKind::StatefulSet,
        component_name(instance, REDIS_HA_SERVER_COMPONENT),
        namespace,
    )
}

/// Build the desired redis HA StatefulSet
pub fn build_redis_ha(
    instance: &str,
    namespace: &str,
    spec: &ArgoCDSpec,
    owner: Option<OwnerReference>,
) -> Workload {
    let name = component_name(instance, REDIS_HA_SERVER_COMPONENT);
    let labels = component_labels(instance, REDIS_HA_SERVER_COMPONENT);
    let image = spec.redis_ha_image();
    let resources = spec.ha.resources.as_ref().map(ResourceRequirements::from);

    let mut metadata = ObjectMeta::new(&name, namespace);
    metadata.labels.extend(labels.clone());
    if let Some(owner) = owner {
        metadata = metadata.with_owner(owner);
    }

    let server = |container: &str, binary: &str, config: &str, port: u16, port_name: &str| {
        Container {
            name: container.to_string(),
            image: image.clone(),
            image_pull_policy: Some("IfNotPresent".to_string()),
            command: Some(vec![binary.to_string()]),
            args: Some(vec![format!("{}/conf/{}", DATA_MOUNT, config)]),
            ports: vec![ContainerPort::named(port_name, port)],
            resources: resources.clone(),
            volume_mounts: vec![VolumeMount::new(DATA_VOLUME, DATA_MOUNT)],
            ..Default::default()
        }
    };

    let mut workload = Workload::new(WorkloadKind::StatefulSet, metadata);
    workload.spec.replicas = Some(REDIS_HA_REPLICAS);
    workload.spec.service_name = Some(component_name(instance, "redis-ha"));
    workload
        .spec
        .selector
        .match_labels
        .insert(LABEL_NAME.to_string(), name);
    workload.spec.template.metadata.labels = labels;

    let pod = &mut workload.spec.template.spec;
    pod.service_account_name = Some(component_name(instance, "argocd-redis-ha"));
    pod.containers = vec![
        server("redis", "redis-server", "redis.conf", REDIS_PORT, "redis"),
        server(
            "sentinel",
            "redis-sentinel",
            "sentinel.conf",
            SENTINEL_PORT,
            "sentinel",
        ),
    ];
    pod.volumes = vec![Volume::from_empty_dir(DATA_VOLUME)];
    apply_node_placement(pod, spec.node_placement.as_ref());
    workload
}
