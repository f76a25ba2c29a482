//! Desired state for the application controller StatefulSet
//!
//! The builder is a pure function of the `ArgoCD` spec plus the few facts the
//! operator discovers about the cluster (redis TLS, an import source, the
//! owner reference). It never reads the store.
//!
//! The container command is a wire contract with `argocd-application-controller`:
//! flag order is fixed and the TLS flags sit directly after `--redis`.

use std::collections::BTreeMap;

use argocd_common::crd::{ArgoCDExportSpec, ArgoCDSpec, NodePlacementSpec};
use argocd_common::kube_utils::{ObjectMeta, OwnerReference};
use argocd_common::{
    LABEL_COMPONENT, LABEL_NAME, LABEL_PART_OF, LABEL_PART_OF_ARGOCD, REDIS_TLS_SECRET,
    REPO_SERVER_TLS_SECRET,
};

use crate::k8s::{Container, ContainerPort, ResourceRequirements, Volume, VolumeMount};
use crate::sharding;
use crate::workload::{PodSpec, Workload, WorkloadKind, WorkloadRef};

/// Component suffix of the application controller
pub const APPLICATION_CONTROLLER_COMPONENT: &str = "application-controller";

/// Binary launched in the controller container
pub const APPLICATION_CONTROLLER_BINARY: &str = "argocd-application-controller";

/// Mount path of the repo-server TLS secret
pub const CONTROLLER_TLS_DIR: &str = "/app/config/controller/tls";

/// Mount path of the redis TLS secret
pub const CONTROLLER_REDIS_TLS_DIR: &str = "/app/config/controller/tls/redis";

/// CA bundle passed to `--redis-ca-certificate`
pub const REDIS_CA_CERTIFICATE: &str = "/app/config/controller/tls/redis/tls.crt";

/// Redis service port
pub const REDIS_PORT: u16 = 6379;

/// Repo server gRPC port
pub const REPO_SERVER_PORT: u16 = 8081;

/// Controller metrics port
pub const CONTROLLER_METRICS_PORT: u16 = 8082;

const REPO_SERVER_TLS_VOLUME: &str = "argocd-repo-server-tls";
const IMPORT_CONTAINER: &str = "argocd-import";
const BACKUP_VOLUME: &str = "backup-storage";
const BACKUP_MOUNT: &str = "/backups";
const SECRET_VOLUME: &str = "secret-storage";
const SECRET_MOUNT: &str = "/secrets";

/// `<instance>-<component>`
pub fn component_name(instance: &str, component: &str) -> String {
    format!("{}-{}", instance, component)
}

/// Labels shared by a component's object metadata and pod template
pub fn component_labels(instance: &str, component: &str) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert(LABEL_NAME.to_string(), component_name(instance, component));
    labels.insert(LABEL_PART_OF.to_string(), LABEL_PART_OF_ARGOCD.to_string());
    labels.insert(LABEL_COMPONENT.to_string(), component.to_string());
    labels
}

/// Address the controller uses to reach redis
pub fn redis_address(instance: &str, namespace: &str, spec: &ArgoCDSpec) -> String {
    if let Some(remote) = spec.redis.remote.as_deref().filter(|r| !r.is_empty()) {
        return remote.to_string();
    }
    let service = if spec.ha.enabled {
        component_name(instance, "redis-ha-haproxy")
    } else {
        component_name(instance, "redis")
    };
    format!("{}.{}:{}", service, namespace, REDIS_PORT)
}

/// Address the controller uses to reach the repo server
pub fn repo_server_address(instance: &str, namespace: &str, spec: &ArgoCDSpec) -> String {
    if let Some(remote) = spec.repo.remote.as_deref().filter(|r| !r.is_empty()) {
        return remote.to_string();
    }
    format!(
        "{}.{}:{}",
        component_name(instance, "repo-server"),
        namespace,
        REPO_SERVER_PORT
    )
}

/// Full command line of the application controller container
pub fn application_controller_command(
    instance: &str,
    namespace: &str,
    spec: &ArgoCDSpec,
    redis_tls: bool,
) -> Vec<String> {
    let controller = &spec.controller;
    let mut cmd = vec![
        APPLICATION_CONTROLLER_BINARY.to_string(),
        "--operation-processors".to_string(),
        controller.operation_processors().to_string(),
        "--redis".to_string(),
        redis_address(instance, namespace, spec),
    ];

    if redis_tls {
        cmd.push("--redis-use-tls".to_string());
        cmd.push("--redis-ca-certificate".to_string());
        cmd.push(REDIS_CA_CERTIFICATE.to_string());
    }

    cmd.extend([
        "--repo-server".to_string(),
        repo_server_address(instance, namespace, spec),
        "--status-processors".to_string(),
        controller.status_processors().to_string(),
        "--kubectl-parallelism-limit".to_string(),
        controller.parallelism_limit().to_string(),
        "--loglevel".to_string(),
        controller.log_level().to_string(),
        "--logformat".to_string(),
        controller.log_format().to_string(),
    ]);
    cmd
}

/// TLS volumes attached to every controller pod, whether or not TLS is in use
///
/// Both secrets are optional so a missing secret never blocks scheduling.
pub fn controller_default_volumes() -> Vec<Volume> {
    vec![
        Volume::from_optional_secret(REPO_SERVER_TLS_VOLUME, REPO_SERVER_TLS_SECRET),
        Volume::from_optional_secret(REDIS_TLS_SECRET, REDIS_TLS_SECRET),
    ]
}

/// Mounts matching [`controller_default_volumes`]
pub fn controller_default_volume_mounts() -> Vec<VolumeMount> {
    vec![
        VolumeMount::new(REPO_SERVER_TLS_VOLUME, CONTROLLER_TLS_DIR),
        VolumeMount::new(REDIS_TLS_SECRET, CONTROLLER_REDIS_TLS_DIR),
    ]
}

/// Previous-generation object occupying the controller's logical name
pub fn legacy_controller_ref(instance: &str, namespace: &str) -> WorkloadRef {
    WorkloadRef::new(
        WorkloadKind::Deployment,
        component_name(instance, APPLICATION_CONTROLLER_COMPONENT),
        namespace,
    )
}

/// Copy the instance's node placement into a pod spec
pub(crate) fn apply_node_placement(pod: &mut PodSpec, placement: Option<&NodePlacementSpec>) {
    if let Some(placement) = placement {
        pod.node_selector = placement.node_selector.clone();
        pod.tolerations = placement.tolerations.iter().map(Into::into).collect();
    }
}

/// An export to restore from when the controller first starts
#[derive(Clone, Copy, Debug)]
pub struct ImportSource<'a> {
    /// Name of the ArgoCDExport
    pub name: &'a str,
    /// Its spec
    pub spec: &'a ArgoCDExportSpec,
}

impl ImportSource<'_> {
    fn init_container(&self, resources: Option<ResourceRequirements>) -> Container {
        Container {
            name: IMPORT_CONTAINER.to_string(),
            image: self.spec.util_image(),
            command: Some(vec![
                "uid_entrypoint.sh".to_string(),
                "argocd-operator-util".to_string(),
                "import".to_string(),
                self.spec.backend().to_string(),
            ]),
            resources,
            volume_mounts: vec![
                VolumeMount::new(BACKUP_VOLUME, BACKUP_MOUNT),
                VolumeMount::new(SECRET_VOLUME, SECRET_MOUNT),
            ],
            ..Default::default()
        }
    }

    fn volumes(&self) -> Vec<Volume> {
        let backup = if self.spec.backend() == argocd_common::crd::DEFAULT_EXPORT_BACKEND {
            Volume::from_pvc(BACKUP_VOLUME, self.name)
        } else {
            Volume::from_empty_dir(BACKUP_VOLUME)
        };
        vec![
            backup,
            Volume::from_secret(SECRET_VOLUME, self.spec.secret_name(self.name)),
        ]
    }
}

/// Builds the desired application controller StatefulSet
///
/// ```rust,ignore
/// let desired = ApplicationControllerBuilder::new("argocd", "argocd", &cr.spec)
///     .with_redis_tls(tls)
///     .with_owner(owner)
///     .build();
/// ```
pub struct ApplicationControllerBuilder<'a> {
    instance: &'a str,
    namespace: &'a str,
    spec: &'a ArgoCDSpec,
    redis_tls: bool,
    import: Option<ImportSource<'a>>,
    owner: Option<OwnerReference>,
}

impl<'a> ApplicationControllerBuilder<'a> {
    /// Start a build for the named instance
    pub fn new(instance: &'a str, namespace: &'a str, spec: &'a ArgoCDSpec) -> Self {
        Self {
            instance,
            namespace,
            spec,
            redis_tls: false,
            import: None,
            owner: None,
        }
    }

    /// Talk to redis over TLS
    pub fn with_redis_tls(mut self, enabled: bool) -> Self {
        self.redis_tls = enabled;
        self
    }

    /// Restore from an export before the controller starts
    pub fn with_import(mut self, source: Option<ImportSource<'a>>) -> Self {
        self.import = source;
        self
    }

    /// Set the controlling owner
    pub fn with_owner(mut self, owner: Option<OwnerReference>) -> Self {
        self.owner = owner;
        self
    }

    /// Object name of the StatefulSet
    pub fn name(&self) -> String {
        component_name(self.instance, APPLICATION_CONTROLLER_COMPONENT)
    }

    /// Compile the StatefulSet
    pub fn build(self) -> Workload {
        let name = self.name();
        let labels = component_labels(self.instance, APPLICATION_CONTROLLER_COMPONENT);
        let shards = sharding::plan(&self.spec.controller.sharding);
        let resources = self
            .spec
            .controller
            .resources
            .as_ref()
            .map(ResourceRequirements::from);

        let mut metadata = ObjectMeta::new(&name, self.namespace);
        metadata.labels.extend(labels.clone());
        if let Some(owner) = self.owner.clone() {
            metadata = metadata.with_owner(owner);
        }

        let container = Container {
            name: APPLICATION_CONTROLLER_BINARY.to_string(),
            image: self.spec.argocd_image(),
            image_pull_policy: Some("Always".to_string()),
            command: Some(application_controller_command(
                self.instance,
                self.namespace,
                self.spec,
                self.redis_tls,
            )),
            env: shards.env,
            ports: vec![ContainerPort::named("metrics", CONTROLLER_METRICS_PORT)],
            resources: resources.clone(),
            volume_mounts: controller_default_volume_mounts(),
            ..Default::default()
        };

        let mut workload = Workload::new(WorkloadKind::StatefulSet, metadata);
        workload.spec.replicas = Some(shards.replicas);
        workload.spec.service_name = Some(name.clone());
        workload.spec.selector.match_labels.insert(LABEL_NAME.to_string(), name);
        workload.spec.template.metadata.labels = labels;

        let pod = &mut workload.spec.template.spec;
        pod.service_account_name = Some(component_name(
            self.instance,
            "argocd-application-controller",
        ));
        pod.containers = vec![container];
        pod.volumes = controller_default_volumes();

        if let Some(source) = self.import {
            pod.init_containers = vec![source.init_container(resources)];
            pod.volumes.extend(source.volumes());
        }

        apply_node_placement(pod, self.spec.node_placement.as_ref());
        workload
    }
}
