//! Disassembler.
use std::fmt::{self, Write as FmtWrite};

use crate::{constants::MEM_START, opcode::Opcode};

/// Human readable assembly of a single instruction.
///
/// Words that are not valid instructions are printed as data.
pub struct Mnemonic(pub Opcode);

impl fmt::Display for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Opcode {
            code,
            op,
            x,
            y,
            kk,
            n,
            nnn,
        } = self.0;

        match (op, kk, n) {
            (0x0, 0xE0, _) => write!(f, "CLS"),
            (0x0, 0xEE, _) => write!(f, "RET"),
            (0x1, _, _) => write!(f, "JP 0x{nnn:03X}"),
            (0x2, _, _) => write!(f, "CALL 0x{nnn:03X}"),
            (0x3, _, _) => write!(f, "SE V{x:X}, 0x{kk:02X}"),
            (0x4, _, _) => write!(f, "SNE V{x:X}, 0x{kk:02X}"),
            (0x5, _, 0x0) => write!(f, "SE V{x:X}, V{y:X}"),
            (0x6, _, _) => write!(f, "LD V{x:X}, 0x{kk:02X}"),
            (0x7, _, _) => write!(f, "ADD V{x:X}, 0x{kk:02X}"),
            (0x8, _, 0x0) => write!(f, "LD V{x:X}, V{y:X}"),
            (0x8, _, 0x1) => write!(f, "OR V{x:X}, V{y:X}"),
            (0x8, _, 0x2) => write!(f, "AND V{x:X}, V{y:X}"),
            (0x8, _, 0x3) => write!(f, "XOR V{x:X}, V{y:X}"),
            (0x8, _, 0x4) => write!(f, "ADD V{x:X}, V{y:X}"),
            (0x8, _, 0x5) => write!(f, "SUB V{x:X}, V{y:X}"),
            (0x8, _, 0x6) => write!(f, "SHR V{x:X}, V{y:X}"),
            (0x8, _, 0x7) => write!(f, "SUBN V{x:X}, V{y:X}"),
            (0x8, _, 0xE) => write!(f, "SHL V{x:X}, V{y:X}"),
            (0x9, _, 0x0) => write!(f, "SNE V{x:X}, V{y:X}"),
            (0xA, _, _) => write!(f, "LD I, 0x{nnn:03X}"),
            (0xB, _, _) => write!(f, "JP V0, 0x{nnn:03X}"),
            (0xC, _, _) => write!(f, "RND V{x:X}, 0x{kk:02X}"),
            (0xD, _, _) => write!(f, "DRW V{x:X}, V{y:X}, {n}"),
            (0xE, 0x9E, _) => write!(f, "SKP V{x:X}"),
            (0xE, 0xA1, _) => write!(f, "SKNP V{x:X}"),
            (0xF, 0x07, _) => write!(f, "LD V{x:X}, DT"),
            (0xF, 0x0A, _) => write!(f, "LD V{x:X}, K"),
            (0xF, 0x15, _) => write!(f, "LD DT, V{x:X}"),
            (0xF, 0x18, _) => write!(f, "LD ST, V{x:X}"),
            (0xF, 0x1E, _) => write!(f, "ADD I, V{x:X}"),
            (0xF, 0x29, _) => write!(f, "LD F, V{x:X}"),
            (0xF, 0x33, _) => write!(f, "LD B, V{x:X}"),
            (0xF, 0x55, _) => write!(f, "LD [I], V{x:X}"),
            (0xF, 0x65, _) => write!(f, "LD V{x:X}, [I]"),
            _ => write!(f, "DW 0x{code:04X}"),
        }
    }
}

pub struct Disassembler<'a> {
    bytecode: &'a [u8],
}

impl<'a> Disassembler<'a> {
    pub fn new(bytecode: &'a [u8]) -> Self {
        Self { bytecode }
    }

    /// Write every instruction to the given writer, one per line.
    ///
    /// Addresses are those the program occupies once loaded. A trailing
    /// odd byte is printed as a single data byte.
    pub fn disassemble<W: FmtWrite>(&self, w: &mut W) -> fmt::Result {
        for (i, chunk) in self.bytecode.chunks(2).enumerate() {
            let address = MEM_START + i * 2;
            match *chunk {
                [a, b] => {
                    let op = Opcode::from_bytes([a, b]);
                    writeln!(w, "{address:04X}: {a:02X}{b:02X}  {}", Mnemonic(op))?
                }
                [a] => writeln!(w, "{address:04X}: {a:02X}    DB 0x{a:02X}")?,
                _ => unreachable!("chunks are never empty"),
            }
        }

        Ok(())
    }

    pub fn print_bytecode(&self) -> fmt::Result {
        let mut s = String::new();
        self.disassemble(&mut s)?;
        print!("{}", s);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn mnemonic(code: u16) -> String {
        Mnemonic(Opcode::decode(code)).to_string()
    }

    #[test]
    fn test_mnemonics() {
        assert_eq!(mnemonic(0x00E0), "CLS");
        assert_eq!(mnemonic(0x00EE), "RET");
        assert_eq!(mnemonic(0x1228), "JP 0x228");
        assert_eq!(mnemonic(0x2ABC), "CALL 0xABC");
        assert_eq!(mnemonic(0x6142), "LD V1, 0x42");
        assert_eq!(mnemonic(0x8AB6), "SHR VA, VB");
        assert_eq!(mnemonic(0xD014), "DRW V0, V1, 4");
        assert_eq!(mnemonic(0xE39E), "SKP V3");
        assert_eq!(mnemonic(0xF265), "LD V2, [I]");
    }

    #[test]
    fn test_unknown_words_are_data() {
        assert_eq!(mnemonic(0x0000), "DW 0x0000");
        assert_eq!(mnemonic(0x5121), "DW 0x5121");
        assert_eq!(mnemonic(0x800F), "DW 0x800F");
        assert_eq!(mnemonic(0xE000), "DW 0xE000");
        assert_eq!(mnemonic(0xF0FF), "DW 0xF0FF");
    }

    #[test]
    fn test_disassemble_listing() {
        let mut buf = String::new();
        Disassembler::new(&[0xA2, 0x1E, 0x12, 0x00, 0x80])
            .disassemble(&mut buf)
            .unwrap();

        let lines: Vec<&str> = buf.lines().collect();
        assert_eq!(
            lines,
            vec![
                "0200: A21E  LD I, 0x21E",
                "0202: 1200  JP 0x200",
                "0204: 80    DB 0x80",
            ]
        );
    }
}
