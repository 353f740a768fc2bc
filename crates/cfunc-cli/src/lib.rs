//! ResourceList filter for the Consul server config function
//!
//! Reads a ResourceList, runs the Consul engine against its items and
//! function config, and writes the input items followed by everything
//! synthesized. The function config is echoed back unchanged.

#![warn(missing_docs)]
#![warn(unreachable_pub)]

use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use cfunc_engine::EngineConfig;
use cfunc_resource::ResourceList;
use tracing::{debug, info};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Load engine conventions, falling back to defaults without a file
///
/// # Errors
/// Returns error if the file cannot be read or is not valid YAML
pub fn load_engine_config(path: Option<&Path>) -> Result<EngineConfig> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading engine config {}", path.display()))?;
    serde_yaml::from_str(&text).with_context(|| format!("parsing engine config {}", path.display()))
}

/// Read the input stream from a file or stdin
///
/// # Errors
/// Returns error if the input cannot be read
pub fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => {
            fs::read_to_string(path).with_context(|| format!("reading input {}", path.display()))
        }
        None => {
            let mut text = String::new();
            io::stdin()
                .read_to_string(&mut text)
                .context("reading input from stdin")?;
            Ok(text)
        }
    }
}

/// Write the output stream to a file or stdout
///
/// # Errors
/// Returns error if the output cannot be written
pub fn write_output(path: Option<&Path>, text: &str) -> Result<()> {
    match path {
        Some(path) => {
            fs::write(path, text).with_context(|| format!("writing output {}", path.display()))
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout
                .write_all(text.as_bytes())
                .and_then(|()| stdout.flush())
                .context("writing output to stdout")
        }
    }
}

/// Run the Consul function over one serialized ResourceList
///
/// # Errors
/// Returns error if the input is malformed, carries no function config, or
/// the engine rejects the batch
pub fn process(input: &str, config: EngineConfig) -> Result<String> {
    let list = ResourceList::parse(input).context("parsing ResourceList")?;
    let function_config = list
        .function_config
        .context("ResourceList carries no functionConfig")?;
    debug!(items = list.items.len(), "input parsed");

    let engine = cfunc_consul::engine(config).context("assembling Consul function")?;
    let items = engine.run(&list.items, &function_config)?;
    info!(
        input = list.items.len(),
        output = items.len(),
        "function run complete"
    );

    ResourceList::new(items, Some(function_config))
        .to_yaml()
        .context("serializing ResourceList")
}
