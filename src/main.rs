use regvm::cli::demo::StateAction;
use regvm::cli::{build_cli, resolve_config, run_hello, run_inspect, run_natives};
use regvm::ConfigError;
use std::path::PathBuf;
use std::process;
use thiserror::Error;

#[derive(Debug, Error)]
enum AppError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Other(String),
}

impl From<Box<dyn std::error::Error>> for AppError {
    fn from(err: Box<dyn std::error::Error>) -> Self {
        AppError::Other(err.to_string())
    }
}

fn main() {
    let matches = build_cli().get_matches();

    let (name, sub_matches) = match matches.subcommand() {
        Some(pair) => pair,
        None => {
            eprintln!("Error: no subcommand given");
            process::exit(2);
        }
    };

    let default_level = if sub_matches.get_flag("verbose") {
        "debug"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    if let Err(err) = run(name, sub_matches) {
        eprintln!("Error: {}", err);
        process::exit(1);
    }
}

fn run(name: &str, matches: &clap::ArgMatches) -> Result<(), AppError> {
    match name {
        "hello" => {
            let vm = run_hello(resolve_config(matches)?)?;
            print!("{}", vm.get_output());
        }
        "natives" => {
            let state_path = matches
                .get_one::<PathBuf>("state")
                .cloned()
                .ok_or_else(|| AppError::Other("missing --state".to_string()))?;
            let (vm, action) = run_natives(resolve_config(matches)?, &state_path)?;
            print!("{}", vm.get_output());
            match action {
                StateAction::Restored => {
                    println!("Restored state from {}", state_path.display())
                }
                StateAction::Saved => println!("Saved state to {}", state_path.display()),
            }
        }
        "inspect" => {
            let path = matches
                .get_one::<PathBuf>("file")
                .ok_or_else(|| AppError::Other("missing snapshot file".to_string()))?;
            println!("{}", run_inspect(path)?);
        }
        other => return Err(AppError::Other(format!("unknown command '{}'", other))),
    }

    Ok(())
}
