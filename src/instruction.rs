//! Instruction word layout (§4.2) and the sixteen function codes (§4.3).

use crate::store::MODULE_MASK;

/// The sixteen function codes, decoded from bits 16..13 of an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    LoadB,
    Add,
    NegateAndAdd,
    StoreQ,
    LoadA,
    StoreA,
    Collate,
    JumpIfZero,
    Jump,
    JumpIfNegative,
    Increment,
    StoreS,
    Multiply,
    Divide,
    Shift,
    Io,
}

impl Function {
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Function::LoadB,
            1 => Function::Add,
            2 => Function::NegateAndAdd,
            3 => Function::StoreQ,
            4 => Function::LoadA,
            5 => Function::StoreA,
            6 => Function::Collate,
            7 => Function::JumpIfZero,
            8 => Function::Jump,
            9 => Function::JumpIfNegative,
            10 => Function::Increment,
            11 => Function::StoreS,
            12 => Function::Multiply,
            13 => Function::Divide,
            14 => Function::Shift,
            15 => Function::Io,
            _ => unreachable!("function code is masked to 4 bits: {code}"),
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}

/// The bit-level fields of a raw 18-bit instruction word, independent of
/// where it was fetched from. `RawInstruction::decode` and `::encode` are
/// exact inverses of each other (§8 property 5); the module-OR'ing and
/// B-register addition that turn the address field into an effective
/// address happen afterwards, in `decode` below.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawInstruction {
    pub b_modified: bool,
    pub function: Function,
    pub address_field: u16,
}

impl RawInstruction {
    pub fn decode(word: u32) -> Self {
        RawInstruction {
            b_modified: word & 0x20000 != 0,
            function: Function::from_code(((word >> 13) & 0xF) as u8),
            address_field: (word & 0x1FFF) as u16,
        }
    }

    pub fn encode(self) -> u32 {
        ((self.b_modified as u32) << 17)
            | ((self.function.code() as u32) << 13)
            | (self.address_field as u32)
    }
}

/// A fully decoded instruction, ready for the function unit: the function
/// code and the effective address `m`, already folded in the current SCR's
/// module bits and (if B-modified) the current B register.
#[derive(Debug, Clone, Copy)]
pub struct Decoded {
    pub function: Function,
    pub m: u16,
    pub b_modified: bool,
}

/// Fetch-time decode (§4.2): `instr` is the word at the current SCR; `b` is
/// the current B register, carried at its full store-cell width so a
/// negative B (top bits set) contributes correctly to the add below even
/// though only the low 16 bits of the sum end up in `m`.
pub fn decode(instr: u32, scr: u16, b: u32) -> Decoded {
    let raw = RawInstruction::decode(instr);
    let a = raw.address_field | (scr & MODULE_MASK);
    let m = if raw.b_modified {
        ((a as u32 + b) & 0xFFFF) as u16
    } else {
        a & 0xFFFF
    };

    Decoded {
        function: raw.function,
        m,
        b_modified: raw.b_modified,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_decode_encode_round_trips_every_word() {
        // Exhaustive over the b-modified bit and function code; sampled
        // over the address field, which is dense enough that the linear
        // bit-packing can't fail for only a subset of values.
        for b_modified in [false, true] {
            for f in 0..16u8 {
                for a in [0u16, 1, 13, 4095, 8191] {
                    let word = ((b_modified as u32) << 17) | ((f as u32) << 13) | (a as u32);
                    let decoded = RawInstruction::decode(word);
                    assert_eq!(decoded.encode(), word);
                }
            }
        }
    }

    #[test]
    fn address_field_inherits_module_bits_of_scr() {
        let instr = RawInstruction {
            b_modified: false,
            function: Function::Jump,
            address_field: 100,
        }
        .encode();

        let decoded = decode(instr, 0x6000 | 5, 0);
        assert_eq!(decoded.m, 0x6000 | 100);
    }

    #[test]
    fn b_modification_adds_current_b() {
        let instr = RawInstruction {
            b_modified: true,
            function: Function::LoadA,
            address_field: 10,
        }
        .encode();

        let decoded = decode(instr, 0, 5);
        assert_eq!(decoded.m, 15);
        assert!(decoded.b_modified);
    }
}
