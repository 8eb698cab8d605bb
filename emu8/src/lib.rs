pub mod clock;
pub mod constants;
mod cpu;
mod disasm;
mod error;
mod keypad;
mod opcode;
mod vm;

pub use self::{
    clock::Hz,
    cpu::{Chip8Cpu, Chip8DisplayBuffer},
    error::{Chip8Error, Chip8Result},
};

pub const IMPL_VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod prelude {
    pub use super::{
        cpu::Chip8Cpu,
        disasm::{Disassembler, Mnemonic},
        error::{Chip8Error, Chip8Result},
        keypad::{InvalidKeyCode, KeyCode},
        opcode::Opcode,
        vm::{Chip8Conf, Chip8Vm, Flow},
    };
}
