//! Instruction decoding.
//!
//! Each instruction is two bytes, stored big-endian, with the opcode
//! class in the first 4-bit nibble. The remaining nibbles are operands
//! whose meaning depends on the class.

/// Decoded instruction word.
///
/// Every field is extracted regardless of whether the instruction uses it,
/// so decoding is total over all 16-bit words. The executor picks the
/// fields relevant to the opcode class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Opcode {
    /// The raw instruction word.
    pub code: u16,
    /// Opcode class, the upper nibble. `0xF000`
    pub op: u8,
    /// Register operand VX. `0x0F00`
    pub x: u8,
    /// Register operand VY. `0x00F0`
    pub y: u8,
    /// Byte operand. `0x00FF`
    pub kk: u8,
    /// Nibble operand, also used as a sub-opcode. `0x000F`
    pub n: u8,
    /// Address operand. `0x0FFF`
    pub nnn: u16,
}

impl Opcode {
    #[inline(always)]
    pub fn decode(code: u16) -> Self {
        Self {
            code,
            op: ((code & 0xF000) >> 12) as u8,
            x: ((code & 0x0F00) >> 8) as u8,
            y: ((code & 0x00F0) >> 4) as u8,
            kk: (code & 0x00FF) as u8,
            n: (code & 0x000F) as u8,
            nnn: code & 0x0FFF,
        }
    }

    /// Decode from the two instruction bytes as they are laid out in memory.
    #[inline(always)]
    pub fn from_bytes(bytes: [u8; 2]) -> Self {
        Self::decode(u16::from_be_bytes(bytes))
    }
}

impl From<u16> for Opcode {
    fn from(code: u16) -> Self {
        Opcode::decode(code)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_decode_fields() {
        let op = Opcode::decode(0xD12F);
        assert_eq!(op.code, 0xD12F);
        assert_eq!(op.op, 0xD);
        assert_eq!(op.x, 0x1);
        assert_eq!(op.y, 0x2);
        assert_eq!(op.n, 0xF);
        assert_eq!(op.kk, 0x2F);
        assert_eq!(op.nnn, 0x12F);
    }

    #[test]
    fn test_decode_big_endian() {
        assert_eq!(Opcode::from_bytes([0xA2, 0x34]), Opcode::decode(0xA234));
        assert_eq!(Opcode::from_bytes([0xA2, 0x34]).nnn, 0x234);
    }

    #[test]
    fn test_decode_is_total() {
        for code in 0..=u16::MAX {
            let op = Opcode::decode(code);
            let rebuilt = ((op.op as u16) << 12) | ((op.x as u16) << 8) | op.kk as u16;
            assert_eq!(rebuilt, code);
            assert_eq!(op.nnn, code & 0xFFF);
            assert_eq!(op.kk, (op.y << 4) | op.n);
        }
    }
}
