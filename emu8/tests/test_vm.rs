mod common;

use std::{env, fs};

use emu8::{constants::*, prelude::*};

fn new_vm(program: &[u8]) -> Chip8Vm {
    let mut vm = Chip8Vm::new(Chip8Conf {
        rng_seed: Some(42),
        ..Default::default()
    });
    vm.load_bytecode(program).unwrap();
    vm
}

fn lit_pixels(vm: &Chip8Vm) -> usize {
    vm.display_buffer()
        .iter()
        .filter(|px| **px == PIXEL_ON)
        .count()
}

#[test]
fn test_load_index() {
    let mut vm = new_vm(&[0xA2, 0x34]);

    assert_eq!(vm.cycle().unwrap(), Flow::Ok);
    assert_eq!(vm.cpu().address(), 0x234);
    assert_eq!(vm.cpu().pc(), 0x202);
}

#[test]
fn test_self_jump() {
    let mut vm = new_vm(&[0x12, 0x00]);

    for _ in 0..1000 {
        assert_eq!(vm.cycle().unwrap(), Flow::Jump);
        assert_eq!(vm.cpu().pc(), 0x200);
    }
}

#[test]
#[rustfmt::skip]
fn test_call_return_round_trip() {
    let mut vm = new_vm(&[
        0x22, 0x06, // 0200: CALL 0x206
        0x12, 0x02, // 0202: JP 0x202
        0x00, 0x00, // 0204: padding
        0x00, 0xEE, // 0206: RET
    ]);

    vm.cycle().unwrap();
    assert_eq!(vm.cpu().pc(), 0x206);
    assert_eq!(vm.cpu().sp(), 1);

    vm.cycle().unwrap();
    assert_eq!(vm.cpu().pc(), 0x202);
    assert_eq!(vm.cpu().sp(), 0);
    assert!(vm.cpu().stack().is_empty());
}

#[test]
fn test_recursion_overflows_stack() {
    // 0200: CALL 0x200
    let mut vm = new_vm(&[0x22, 0x00]);

    vm.run_steps(STACK_SIZE).unwrap();
    assert_eq!(vm.cpu().sp(), STACK_SIZE);

    for _ in 0..2 {
        match vm.cycle() {
            Err(Chip8Error::StackOverflow { address }) => assert_eq!(address, 0x200),
            other => panic!("expected stack overflow, got {other:?}"),
        }
        assert_eq!(vm.cpu().pc(), 0x200);
        assert_eq!(vm.cpu().sp(), STACK_SIZE);
    }
}

#[test]
fn test_return_on_empty_stack() {
    let mut vm = new_vm(&[0x60, 0x01, 0x00, 0xEE]);

    let err = vm.run_steps(10).unwrap_err();
    assert!(matches!(err, Chip8Error::StackUnderflow { address: 0x202 }));
    assert_eq!(vm.cpu().pc(), 0x202);
    assert_eq!(vm.cpu().register(0), 1);
}

#[test]
fn test_key_wait_round_trip() {
    let mut vm = new_vm(&[0xF3, 0x0A]);

    vm.set_keypad(0);
    assert_eq!(vm.cycle().unwrap(), Flow::KeyWait);
    assert_eq!(vm.cpu().pc(), 0x200);
    assert_eq!(vm.cpu().key_awaited(), None);

    vm.set_keypad(1 << 0xB);
    assert_eq!(vm.cycle().unwrap(), Flow::KeyWait);
    assert_eq!(vm.cpu().pc(), 0x200);
    assert_eq!(vm.cpu().key_awaited(), Some(0xB));

    vm.set_keypad(0);
    assert_eq!(vm.cycle().unwrap(), Flow::Ok);
    assert_eq!(vm.cpu().register(3), 0xB);
    assert_eq!(vm.cpu().key_awaited(), None);
    assert_eq!(vm.cpu().pc(), 0x202);
}

#[test]
#[rustfmt::skip]
fn test_draw_twice_restores_display() {
    let mut vm = new_vm(&[
        0xA2, 0x0A, // 0200: LD I, 0x20A
        0x60, 0x3E, // 0202: LD V0, 62
        0x61, 0x05, // 0204: LD V1, 5
        0xD0, 0x13, // 0206: DRW V0, V1, 3
        0xD0, 0x13, // 0208: DRW V0, V1, 3
        0b1010_0000, 0b0100_0000, 0b1110_0000,
    ]);

    assert_eq!(vm.run_steps(4).unwrap(), Flow::Draw);
    assert_eq!(vm.cpu().register(0xF), 0);
    // The sprite is clipped at the right edge of the display.
    assert_eq!(lit_pixels(&vm), 4);

    vm.consume_frame();
    assert_eq!(vm.cycle().unwrap(), Flow::Draw);
    assert_eq!(vm.cpu().register(0xF), 1);
    assert_eq!(lit_pixels(&vm), 0);
}

#[test]
fn test_draw_waits_for_host() {
    let mut vm = new_vm(&[0xD0, 0x05, 0xD0, 0x05]);

    assert_eq!(vm.cycle().unwrap(), Flow::Draw);
    assert!(vm.display_ready());
    let before = *vm.display_buffer();

    for _ in 0..3 {
        assert_eq!(vm.cycle().unwrap(), Flow::DrawWait);
        assert_eq!(vm.cpu().pc(), 0x202);
        assert_eq!(vm.cpu().address(), 0x000);
        assert_eq!(vm.cpu().register(0xF), 0);
        assert_eq!(vm.display_buffer(), &before);
    }

    vm.consume_frame();
    assert_eq!(vm.cycle().unwrap(), Flow::Draw);
    assert_eq!(vm.cpu().pc(), 0x204);
    assert_eq!(lit_pixels(&vm), 0);
}

#[test]
fn test_maze() {
    let mut vm = new_vm(common::MAZE);
    let mut draws = 0;

    while vm.cpu().pc() != 0x218 {
        if vm.cycle().unwrap() == Flow::Draw {
            draws += 1;
            assert_eq!(vm.cpu().register(0xF), 0);
            vm.consume_frame();
        }
    }

    // 16 columns of 8 rows, each cell a diagonal of 4 pixels.
    assert_eq!(draws, 128);
    assert_eq!(lit_pixels(&vm), 512);

    // Program ends in an infinite loop.
    vm.run_steps(10).unwrap();
    assert_eq!(vm.cpu().pc(), 0x218);
}

#[test]
fn test_machines_are_independent() {
    let mut a = new_vm(&[0x60, 0x01, 0x12, 0x00]);
    let mut b = new_vm(&[0x60, 0x02, 0x12, 0x00]);

    a.run_steps(3).unwrap();
    b.cycle().unwrap();

    assert_eq!(a.cpu().register(0), 1);
    assert_eq!(b.cpu().register(0), 2);
    assert_eq!(a.cpu().pc(), 0x202);
    assert_eq!(b.cpu().pc(), 0x202);
}

#[test]
fn test_timers_count_per_frame() {
    // LD V0, 10; LD DT, V0; LD ST, V0; JP 0x206
    let mut vm = new_vm(&[0x60, 0x0A, 0xF0, 0x15, 0xF0, 0x18, 0x12, 0x06]);

    vm.run_frame().unwrap();
    assert_eq!(vm.cpu().delay_timer(), 10);
    assert!(vm.is_buzzing());

    // Executing instructions does not count down the timers.
    vm.run_steps(1000).unwrap();
    assert_eq!(vm.cpu().delay_timer(), 10);

    for _ in 0..10 {
        vm.tick_timers();
    }
    assert_eq!(vm.cpu().delay_timer(), 0);
    assert_eq!(vm.cpu().sound_timer(), 0);
    assert!(!vm.is_buzzing());

    vm.tick_timers();
    assert_eq!(vm.cpu().delay_timer(), 0);
}

#[test]
fn test_load_file() {
    let path = env::temp_dir().join(format!("emu8-test-{}.ch8", std::process::id()));
    fs::write(&path, [0xA2, 0x34]).unwrap();

    let mut vm = Chip8Vm::new(Chip8Conf::default());
    let result = vm.load_file(&path);
    fs::remove_file(&path).unwrap();
    result.unwrap();

    vm.cycle().unwrap();
    assert_eq!(vm.cpu().address(), 0x234);

    let missing = env::temp_dir().join("emu8-test-missing.ch8");
    assert!(matches!(vm.load_file(missing), Err(Chip8Error::Io(_))));
}

#[test]
fn test_large_program_is_rejected() {
    let mut vm = new_vm(&[0x12, 0x00]);
    let rom = vec![0xFF; PROGRAM_MEMORY_SIZE + 1];

    assert!(matches!(
        vm.load_bytecode(&rom),
        Err(Chip8Error::LargeProgram { .. })
    ));
    assert_eq!(vm.cpu().ram()[MEM_START], 0x12);
    assert_eq!(vm.cpu().ram()[MEM_SIZE - 1], 0x00);
}
