//! Instance scope resolution

use cfunc_resource::ResourceDocument;
use tracing::debug;

use crate::config::EngineConfig;
use crate::instance::FunctionInstance;

/// Check whether a resource belongs to the instance
///
/// Namespace must match exactly and the instance label must equal the
/// instance's canonical instance label.
#[must_use]
pub fn is_managed(document: &ResourceDocument, instance: &FunctionInstance, config: &EngineConfig) -> bool {
    document.namespace() == instance.namespace()
        && document.label(&config.instance_label) == Some(instance.labels().instance.as_str())
}

/// Filter a batch to the resources managed by the instance
///
/// An empty result is valid: the instance has not been materialized yet.
#[must_use]
pub fn resolve<'a>(
    batch: &'a [ResourceDocument],
    instance: &FunctionInstance,
    config: &EngineConfig,
) -> Vec<&'a ResourceDocument> {
    batch
        .iter()
        .filter(|document| {
            let managed = is_managed(document, instance, config);
            if !managed {
                debug!(resource = %document.identity(), "out of scope");
            }
            managed
        })
        .collect()
}
