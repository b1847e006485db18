pub mod demo;
pub mod inspect;

use clap::{value_parser, Arg, ArgMatches, Command};
use std::path::PathBuf;

use crate::config::{ConfigError, VMConfig};

// Re-export key components
pub use demo::{hello_command, natives_command, run_hello, run_natives};
pub use inspect::{inspect_command, run_inspect};

/// Build the top-level command
pub fn build_cli() -> Command {
    Command::new("regvm")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Register-based virtual machine with native callbacks and state snapshots")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("JSON file with register_count, memory_size and max_steps")
                .global(true)
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("registers")
                .long("registers")
                .value_name("COUNT")
                .help("Number of registers (overrides the config file)")
                .global(true)
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("memory")
                .long("memory")
                .value_name("BYTES")
                .help("Memory size in bytes (overrides the config file)")
                .global(true)
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Log every executed instruction")
                .global(true)
                .action(clap::ArgAction::SetTrue),
        )
        .subcommand(hello_command())
        .subcommand(natives_command())
        .subcommand(inspect_command())
}

/// Resolve the VM configuration from `--config` and the size overrides
///
/// Takes the subcommand's matches, where global arguments are visible
/// wherever they appeared on the command line.
pub fn resolve_config(matches: &ArgMatches) -> Result<VMConfig, ConfigError> {
    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => VMConfig::from_json_file(path)?,
        None => VMConfig::default(),
    };
    if let Some(count) = matches.get_one::<usize>("registers") {
        config.register_count = *count;
    }
    if let Some(size) = matches.get_one::<usize>("memory") {
        config.memory_size = *size;
    }
    config.validate()?;
    Ok(config)
}
