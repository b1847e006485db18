use clap::{value_parser, Arg, Command};
use std::error::Error;
use std::path::{Path, PathBuf};

use crate::vm::VMState;

pub fn inspect_command() -> Command {
    Command::new("inspect")
        .about("Decode a snapshot file and print it as JSON")
        .arg(
            Arg::new("file")
                .value_name("FILE")
                .help("Snapshot file to decode")
                .required(true)
                .value_parser(value_parser!(PathBuf)),
        )
}

/// Decode `path` and render it as pretty JSON
pub fn run_inspect(path: &Path) -> Result<String, Box<dyn Error>> {
    let state = VMState::read_from_file(path)?;
    Ok(serde_json::to_string_pretty(&state)?)
}
