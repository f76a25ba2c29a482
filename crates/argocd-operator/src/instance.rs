//! Managed workloads of one `ArgoCD` instance

use argocd_common::crd::{ArgoCDExport, ArgoCDSpec};
use argocd_common::kube_utils::OwnerReference;
use argocd_workload::builder::{component_name, APPLICATION_CONTROLLER_COMPONENT};
use argocd_workload::{
    build_redis_ha, legacy_controller_ref, ApplicationControllerBuilder, ImportSource,
};

use crate::lifecycle::ManagedWorkload;

/// Facts discovered in the cluster before building desired state
#[derive(Clone, Debug, Default)]
pub struct ClusterFacts {
    /// Redis TLS secret present and owned by this instance
    pub redis_tls: bool,
    /// Export named by `spec.import`, if it exists
    pub import: Option<ArgoCDExport>,
    /// Controller pod stuck pulling its image
    pub image_pull_failed: bool,
}

/// One `ArgoCD` resource, resolved to name and namespace
pub struct Instance<'a> {
    /// Resource name
    pub name: &'a str,
    /// Resource namespace
    pub namespace: &'a str,
    /// Resource spec
    pub spec: &'a ArgoCDSpec,
    /// Owner reference stamped on managed objects
    pub owner: Option<OwnerReference>,
}

impl Instance<'_> {
    /// Label selector of the application controller pods
    pub fn controller_pod_selector(&self) -> String {
        format!(
            "{}={}",
            argocd_common::LABEL_NAME,
            component_name(self.name, APPLICATION_CONTROLLER_COMPONENT)
        )
    }

    /// The application controller StatefulSet
    pub fn application_controller(&self, facts: &ClusterFacts) -> ManagedWorkload {
        let import = facts.import.as_ref().map(|export| ImportSource {
            name: export.metadata.name.as_deref().unwrap_or_default(),
            spec: &export.spec,
        });

        let desired = ApplicationControllerBuilder::new(self.name, self.namespace, self.spec)
            .with_redis_tls(facts.redis_tls)
            .with_import(import)
            .with_owner(self.owner.clone())
            .build();

        ManagedWorkload::new(desired, self.spec.controller_enabled())
            .with_legacy(legacy_controller_ref(self.name, self.namespace))
            .with_recreate(facts.image_pull_failed)
    }

    /// The redis HA StatefulSet
    pub fn redis_ha(&self) -> ManagedWorkload {
        let desired = build_redis_ha(self.name, self.namespace, self.spec, self.owner.clone());
        ManagedWorkload::new(desired, self.spec.ha.enabled)
    }
}
