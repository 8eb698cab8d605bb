//! Result and errors.
use std::{
    fmt::{self, Display, Formatter},
    io,
};

use crate::constants::{Address, PROGRAM_MEMORY_SIZE};

pub type Chip8Result<T> = std::result::Result<T, Chip8Error>;

#[derive(Debug)]
pub enum Chip8Error {
    /// Attempt to load a bytecode program that can't fit in memory.
    LargeProgram { size: usize },
    /// Subroutine call while all stack slots are in use.
    StackOverflow { address: Address },
    /// Subroutine return while the stack is empty.
    StackUnderflow { address: Address },
    Io(io::Error),
    Fmt(fmt::Error),
}

impl Display for Chip8Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::LargeProgram { size } => write!(
                f,
                "program too large for VM memory: {size} bytes, must be less than {PROGRAM_MEMORY_SIZE}"
            ),
            Self::StackOverflow { address } => {
                write!(f, "call stack overflow at 0x{address:04X}")
            }
            Self::StackUnderflow { address } => {
                write!(f, "call stack underflow at 0x{address:04X}")
            }
            Self::Io(err) => write!(f, "{}", err),
            Self::Fmt(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for Chip8Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Fmt(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Chip8Error {
    fn from(err: io::Error) -> Self {
        Chip8Error::Io(err)
    }
}

impl From<fmt::Error> for Chip8Error {
    fn from(err: fmt::Error) -> Self {
        Chip8Error::Fmt(err)
    }
}
