//! `consul-config-function` entry point

use std::path::PathBuf;

use anyhow::Result;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

fn cli() -> Command {
    Command::new("consul-config-function")
        .version(cfunc_cli::VERSION)
        .about("Synthesize a Consul server instance from a ResourceList")
        .arg(
            Arg::new("input")
                .long("input")
                .value_parser(value_parser!(PathBuf))
                .help("ResourceList to read (default: stdin)"),
        )
        .arg(
            Arg::new("output")
                .long("output")
                .value_parser(value_parser!(PathBuf))
                .help("Where to write the result (default: stdout)"),
        )
        .arg(
            Arg::new("engine-config")
                .long("engine-config")
                .value_parser(value_parser!(PathBuf))
                .help("YAML file overriding label and annotation conventions"),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .help("Log filter directive (default: RUST_LOG, then info)"),
        )
        .arg(
            Arg::new("json-logs")
                .long("json-logs")
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
}

/// Logs go to stderr; stdout carries only the output stream.
fn init_logging(matches: &ArgMatches) {
    let filter = match matches.get_one::<String>("log-level") {
        Some(level) => EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info")),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    let registry = tracing_subscriber::registry().with(filter);
    if matches.get_flag("json-logs") {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init();
    }
}

fn run(matches: &ArgMatches) -> Result<()> {
    let config = cfunc_cli::load_engine_config(
        matches.get_one::<PathBuf>("engine-config").map(PathBuf::as_path),
    )?;
    let input = cfunc_cli::read_input(matches.get_one::<PathBuf>("input").map(PathBuf::as_path))?;
    let output = cfunc_cli::process(&input, config)?;
    cfunc_cli::write_output(
        matches.get_one::<PathBuf>("output").map(PathBuf::as_path),
        &output,
    )
}

fn main() {
    let matches = cli().get_matches();
    init_logging(&matches);

    if let Err(err) = run(&matches) {
        eprintln!("consul-config-function: {err:#}");
        std::process::exit(1);
    }
}
