//! Reference host scenarios
//!
//! `hello` logs a preloaded string. `natives` calls two host callbacks and
//! keeps its state in a snapshot file: the first run builds and saves the
//! program, later runs restore the file and run it again.

use clap::{value_parser, Arg, Command};
use log::info;
use std::error::Error;
use std::path::{Path, PathBuf};

use crate::config::VMConfig;
use crate::vm::{NativeRegistry, Opcode, VM};

/// Greeting preloaded at address 0
pub const HELLO_WORLD: &[u8] = b"Hello, World!\0";

/// Default snapshot path for the `natives` scenario
pub const DEFAULT_STATE_FILE: &str = "vm_state.bin";

/// What `natives` did with its state file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateAction {
    /// The file existed and was restored and re-run
    Restored,

    /// The program was built, run and saved to the file
    Saved,
}

pub fn hello_command() -> Command {
    Command::new("hello").about("Log \"Hello, World!\" from VM memory")
}

pub fn natives_command() -> Command {
    Command::new("natives")
        .about("Call host functions, then save or restore the VM state")
        .arg(
            Arg::new("state")
                .short('s')
                .long("state")
                .value_name("FILE")
                .help("Snapshot file to restore from, or to create")
                .default_value(DEFAULT_STATE_FILE)
                .value_parser(value_parser!(PathBuf)),
        )
}

/// Build and run the hello-world program
pub fn run_hello(config: VMConfig) -> Result<VM, Box<dyn Error>> {
    let mut vm = VM::with_config(config)?;
    vm.load_memory(HELLO_WORLD, 0)?;
    vm.add_instruction(Opcode::Log, &[0]);
    vm.run()?;
    Ok(vm)
}

/// Host callbacks used by the `natives` scenario
pub fn demo_natives() -> NativeRegistry {
    NativeRegistry::new()
        .with(0, |_| println!("Hello From Native!"))
        .with(1, |value| println!("Value: {}", value))
}

/// Restore and re-run `state_path` if it exists, otherwise build, run and save
pub fn run_natives(
    config: VMConfig,
    state_path: &Path,
) -> Result<(VM, StateAction), Box<dyn Error>> {
    let mut vm = VM::with_config(config)?.with_natives(demo_natives());

    if state_path.exists() {
        info!("Restoring state from {}", state_path.display());
        vm.restore_and_run(state_path)?;
        return Ok((vm, StateAction::Restored));
    }

    vm.add_instruction(Opcode::CallNative, &[0]);
    vm.add_instruction(Opcode::CallNative, &[1, 114514]);
    vm.load_memory(HELLO_WORLD, 0)?;
    vm.add_instruction(Opcode::Log, &[0]);
    vm.run()?;
    vm.save_state_to_file(state_path)?;

    Ok((vm, StateAction::Saved))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::VMError;

    #[test]
    fn test_hello() {
        let vm = run_hello(VMConfig::default()).unwrap();
        assert_eq!(vm.get_output(), "Hello, World!\n");
    }

    #[test]
    fn test_hello_needs_room_for_string() {
        let err = run_hello(VMConfig::new(1, 4)).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<VMError>(),
            Some(VMError::MemoryOutOfBounds { .. })
        ));
    }

    #[test]
    fn test_natives_saves_then_restores() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.bin");

        let (first, action) = run_natives(VMConfig::default(), &path).unwrap();
        assert_eq!(action, StateAction::Saved);
        assert!(path.exists());

        let (second, action) = run_natives(VMConfig::default(), &path).unwrap();
        assert_eq!(action, StateAction::Restored);
        assert_eq!(second.get_output(), "Hello, World!\n");
        assert_eq!(second.program(), first.program());
    }
}
