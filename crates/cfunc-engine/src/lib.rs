//! Config Function Engine
//!
//! Synthesizes the resources of one declaratively described service
//! instance from a batch of existing resources and a function config.
//!
//! # Core Concepts
//!
//! - [`FunctionInstance`]: name, namespace and canonical labels of "this" invocation
//! - [`Reconciler`]: defaults, recorded state and overrides folded into a [`CanonicalConfig`]
//! - [`ModuleRegistry`]: gated template modules rendered from the snapshot
//! - [`Correlator`]: contributions to resources elsewhere that request one
//! - [`MetadataPropagator`]: canonical labels and namespace on every synthesized resource
//! - [`Engine`]: one invocation end to end, all or nothing
//!
//! # Example
//!
//! ```rust,ignore
//! use cfunc_engine::{Engine, EngineConfig, FunctionDefinition, Gate, TemplateModule};
//!
//! let definition = FunctionDefinition::new("consul-server")
//!     .with_schema(schema)
//!     .with_module(TemplateModule::template("service", Gate::Always, SERVICE))?;
//! let engine = Engine::new(definition, EngineConfig::default())?;
//! let output = engine.run(&items, &function_config)?;
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod config;
mod correlate;
mod error;
mod instance;
mod pipeline;
mod propagate;
mod reconcile;
mod registry;
mod scope;
mod state;
pub mod template;

pub use config::EngineConfig;
pub use correlate::{Contribution, CorrelationRequest, Correlator, DEFAULT_CONTRIBUTION_KIND};
pub use error::{ConfigurationError, EngineError};
pub use instance::{CanonicalLabels, FunctionInstance};
pub use pipeline::{Engine, FunctionDefinition};
pub use propagate::MetadataPropagator;
pub use reconcile::{
    is_resource_name, parse_toggle, CanonicalConfig, ConfigSchema, DiscoveredFacts, Overrides,
    Reconciler, Setting, WorkloadRule, MAX_REPLICAS,
};
pub use registry::{Gate, ModuleRegistry, Rendered, RenderFn, TemplateModule};
pub use scope::{is_managed, resolve as resolve_scope};
pub use state::{is_state_record, FunctionState, STATE_MODULE_ID};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
