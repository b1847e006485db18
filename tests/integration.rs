
use regvm::vm::{Flags, StackSlot};
use regvm::{Opcode, VMConfig, VMError, VM};
use test_helpers::{load_program, MULTIPLY, recording_native, vm_with_registers};

#[test]
fn test_add_and_halt() -> Result<(), Box<dyn std::error::Error>> {
    let mut vm = vm_with_registers(&[(0, 5), (1, 10)]);
    load_program(&mut vm, &[(Opcode::Add, &[0, 1, 2]), (Opcode::Hlt, &[])]);

    vm.run()?;

    assert_eq!(vm.get_register(2)?, 15);
    assert!(vm.is_halted());
    assert_eq!(vm.program_counter(), 2);
    Ok(())
}

#[test]
fn test_subroutine_multiply() -> Result<(), Box<dyn std::error::Error>> {
    let mut vm = vm_with_registers(&[(0, 6), (1, 7)]);
    load_program(&mut vm, MULTIPLY);

    vm.run()?;

    assert_eq!(vm.get_register(2)?, 42);
    assert_eq!(vm.get_register(1)?, 0);
    // The return address was consumed by RET
    assert!(vm.get_stack().is_empty());
    assert!(vm.is_halted());
    Ok(())
}

#[test]
fn test_string_built_with_store_then_logged() -> Result<(), Box<dyn std::error::Error>> {
    let mut vm = VM::new(4, 16);
    let mut program: Vec<(Opcode, Vec<u32>)> = Vec::new();
    for (offset, byte) in b"Hi!".iter().enumerate() {
        program.push((Opcode::Lea, vec![0, u32::from(*byte)]));
        program.push((Opcode::Store, vec![0, 8 + offset as u32]));
    }
    program.push((Opcode::Log, vec![8]));
    for (opcode, operands) in &program {
        vm.add_instruction(*opcode, operands);
    }

    vm.run()?;

    assert_eq!(vm.get_output(), "Hi!\n");
    assert_eq!(vm.read_memory(8, 4)?, b"Hi!\0");
    Ok(())
}

#[test]
fn test_stack_reverses_values() -> Result<(), Box<dyn std::error::Error>> {
    let mut vm = vm_with_registers(&[(0, 1), (1, 2), (2, 3)]);
    load_program(
        &mut vm,
        &[
            (Opcode::Push, &[0]),
            (Opcode::Push, &[1]),
            (Opcode::Push, &[2]),
            (Opcode::Pop, &[3]),
            (Opcode::Pop, &[4]),
            (Opcode::Pop, &[5]),
            // Empty stack: no effect
            (Opcode::Pop, &[6]),
        ],
    );

    vm.run()?;

    assert_eq!(vm.get_register(3)?, 3);
    assert_eq!(vm.get_register(4)?, 2);
    assert_eq!(vm.get_register(5)?, 1);
    assert_eq!(vm.get_register(6)?, 0);
    Ok(())
}

#[test]
fn test_signed_compare_drives_jumps() -> Result<(), Box<dyn std::error::Error>> {
    // r0 = -1, r1 = 1: signed less-than, unsigned greater-or-equal
    let mut vm = vm_with_registers(&[(0, u32::MAX), (1, 1)]);
    load_program(
        &mut vm,
        &[
            (Opcode::Cmp, &[0, 1]),
            (Opcode::Js, &[3]),
            (Opcode::Lea, &[2, 99]),
            (Opcode::Jnc, &[5]),
            (Opcode::Lea, &[3, 7]),
        ],
    );

    vm.run()?;

    assert_eq!(vm.get_register(2)?, 0);
    assert_eq!(vm.get_register(3)?, 7);
    assert_eq!(
        vm.flags(),
        Flags {
            sign: true,
            carry: true
        }
    );
    Ok(())
}

#[test]
fn test_natives_receive_arguments() -> Result<(), Box<dyn std::error::Error>> {
    let mut vm = VM::new(2, 8);
    let calls = recording_native(&mut vm, 1);
    load_program(
        &mut vm,
        &[
            (Opcode::CallNative, &[1, 114514]),
            (Opcode::CallNative, &[1]),
            // Unregistered key is logged and skipped
            (Opcode::CallNative, &[9, 1]),
        ],
    );

    vm.run()?;

    assert_eq!(*calls.borrow(), vec![114514, 0]);
    assert_eq!(vm.program_counter(), 3);
    Ok(())
}

#[test]
fn test_ret_onto_data_slot_faults() {
    let mut vm = vm_with_registers(&[(0, 4)]);
    load_program(&mut vm, &[(Opcode::Push, &[0]), (Opcode::Ret, &[])]);

    let err = vm.run().unwrap_err();

    assert!(matches!(err, VMError::StackSlotMismatch { .. }));
    // The data slot stays on the stack
    assert_eq!(vm.get_stack(), vec![StackSlot::Data(4)]);
    assert_eq!(vm.program_counter(), 1);
}

#[test]
fn test_out_of_range_register_faults() {
    let mut vm = VM::new(2, 8);
    load_program(&mut vm, &[(Opcode::Lea, &[0, 1]), (Opcode::Inc, &[5])]);

    let err = vm.run().unwrap_err();

    assert!(matches!(
        err,
        VMError::RegisterOutOfBounds { index: 5, size: 2 }
    ));
    assert_eq!(vm.get_register(0).unwrap(), 1);
}

#[test]
fn test_infinite_loop_hits_step_limit() -> Result<(), Box<dyn std::error::Error>> {
    let mut vm = VM::with_config(VMConfig::default().with_max_steps(50))?;
    load_program(&mut vm, &[(Opcode::Inc, &[0]), (Opcode::Jmp, &[0])]);

    let err = vm.run().unwrap_err();

    assert!(matches!(err, VMError::StepLimitExceeded { limit: 50 }));
    assert_eq!(vm.get_register(0)?, 25);
    Ok(())
}

#[test]
fn test_resume_after_halt() -> Result<(), Box<dyn std::error::Error>> {
    let mut vm = VM::new(2, 8);
    load_program(
        &mut vm,
        &[
            (Opcode::Inc, &[0]),
            (Opcode::Hlt, &[]),
            (Opcode::Inc, &[0]),
        ],
    );

    vm.run()?;
    assert_eq!(vm.get_register(0)?, 1);

    vm.resume()?;
    assert_eq!(vm.get_register(0)?, 2);
    assert!(!vm.is_halted());
    assert_eq!(vm.program_counter(), 3);
    Ok(())
}
