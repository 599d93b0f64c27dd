//! Mnemonics, registers, and the other small closed vocabularies the decoder
//! and trace engine share.
//!
//! Plain Rust enums (`Copy`, with a handful of helper methods) rather than
//! a thin wrapper over generated FFI bindings — this crate has no FFI layer
//! at all, so these are the full, direct definitions.
#![allow(non_camel_case_types)]

use core::fmt;

#[cfg(feature = "serialization")]
use serde::{Deserialize, Serialize};

/// Instruction mnemonics supported by the built-in opcode table
/// ([`crate::opcode_table`]).
///
/// This is intentionally a small, hand-picked subset of the x86 ISA — enough
/// to exercise every decode-tree and trace-engine behavior in the
/// specification (group-extension disambiguation, mandatory-prefix escapes,
/// register-encoded opcodes, call/jump/return classification) without
/// attempting full ISA coverage, which spec.md explicitly treats as the job
/// of an external opcode-table producer (§1).
#[cfg_attr(feature = "serialization", derive(Deserialize, Serialize))]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Mnemonic {
    Nop,
    Hlt,
    Ret,
    Call,
    Jmp,
    /// Conditional jump; `u8` is the condition code (the low nibble of the
    /// `0x70 + cc` / `0x0F 0x80 + cc` opcode).
    Jcc(u8),
    Push,
    Pop,
    Inc,
    Dec,
    Add,
    Or,
    Adc,
    Sbb,
    And,
    Sub,
    Xor,
    Cmp,
    Mov,
    Movdqa,
    Movq,
    Lea,
    Test,
    Unknown,
}

impl fmt::Display for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mnemonic::Nop => write!(f, "nop"),
            Mnemonic::Hlt => write!(f, "hlt"),
            Mnemonic::Ret => write!(f, "ret"),
            Mnemonic::Call => write!(f, "call"),
            Mnemonic::Jmp => write!(f, "jmp"),
            Mnemonic::Jcc(cc) => write!(f, "j{}", condition_name(*cc)),
            Mnemonic::Push => write!(f, "push"),
            Mnemonic::Pop => write!(f, "pop"),
            Mnemonic::Inc => write!(f, "inc"),
            Mnemonic::Dec => write!(f, "dec"),
            Mnemonic::Add => write!(f, "add"),
            Mnemonic::Or => write!(f, "or"),
            Mnemonic::Adc => write!(f, "adc"),
            Mnemonic::Sbb => write!(f, "sbb"),
            Mnemonic::And => write!(f, "and"),
            Mnemonic::Sub => write!(f, "sub"),
            Mnemonic::Xor => write!(f, "xor"),
            Mnemonic::Cmp => write!(f, "cmp"),
            Mnemonic::Mov => write!(f, "mov"),
            Mnemonic::Movdqa => write!(f, "movdqa"),
            Mnemonic::Movq => write!(f, "movq"),
            Mnemonic::Lea => write!(f, "lea"),
            Mnemonic::Test => write!(f, "test"),
            Mnemonic::Unknown => write!(f, "(unknown)"),
        }
    }
}

fn condition_name(cc: u8) -> &'static str {
    match cc & 0xF {
        0x0 => "o",
        0x1 => "no",
        0x2 => "b",
        0x3 => "ae",
        0x4 => "z",
        0x5 => "nz",
        0x6 => "be",
        0x7 => "a",
        0x8 => "s",
        0x9 => "ns",
        0xA => "p",
        0xB => "np",
        0xC => "l",
        0xD => "ge",
        0xE => "le",
        _ => "g",
    }
}

/// The register class a ModR/M `reg`/`rm` field, or an opcode-encoded
/// register, resolves into. Drives which [`Register`] variant a raw 3-bit
/// (or, with REX, 4-bit) field is turned into.
#[cfg_attr(feature = "serialization", derive(Deserialize, Serialize))]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum RegisterClass {
    Gpr32,
    Xmm,
    Mm,
}

/// A single architectural register.
#[cfg_attr(feature = "serialization", derive(Deserialize, Serialize))]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Register {
    Gpr32(Gpr32),
    Xmm(u8),
    Mm(u8),
}

/// The eight legacy 32-bit general purpose registers, in encoding order.
#[cfg_attr(feature = "serialization", derive(Deserialize, Serialize))]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum Gpr32 {
    Eax = 0,
    Ecx = 1,
    Edx = 2,
    Ebx = 3,
    Esp = 4,
    Ebp = 5,
    Esi = 6,
    Edi = 7,
}

impl Gpr32 {
    pub fn from_id(id: u8) -> Gpr32 {
        match id & 0x7 {
            0 => Gpr32::Eax,
            1 => Gpr32::Ecx,
            2 => Gpr32::Edx,
            3 => Gpr32::Ebx,
            4 => Gpr32::Esp,
            5 => Gpr32::Ebp,
            6 => Gpr32::Esi,
            _ => Gpr32::Edi,
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Register::Gpr32(r) => {
                let name = match r {
                    Gpr32::Eax => "eax",
                    Gpr32::Ecx => "ecx",
                    Gpr32::Edx => "edx",
                    Gpr32::Ebx => "ebx",
                    Gpr32::Esp => "esp",
                    Gpr32::Ebp => "ebp",
                    Gpr32::Esi => "esi",
                    Gpr32::Edi => "edi",
                };
                write!(f, "{name}")
            }
            Register::Xmm(n) => write!(f, "xmm{n}"),
            Register::Mm(n) => write!(f, "mm{n}"),
        }
    }
}

impl RegisterClass {
    /// Builds the register denoted by `id` (0..=7) in this class.
    pub fn encode(self, id: u8) -> Register {
        match self {
            RegisterClass::Gpr32 => Register::Gpr32(Gpr32::from_id(id)),
            RegisterClass::Xmm => Register::Xmm(id & 0x7),
            RegisterClass::Mm => Register::Mm(id & 0x7),
        }
    }
}

/// Segment override prefixes (spec §4.B `Context`: "segment override").
#[cfg_attr(feature = "serialization", derive(Deserialize, Serialize))]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Segment {
    Cs,
    Ss,
    Ds,
    Es,
    Fs,
    Gs,
}

/// Coarse type tag for a decoded [`crate::entity::DataEntry`] (spec §3).
#[cfg_attr(feature = "serialization", derive(Deserialize, Serialize))]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum DataType {
    Byte,
    Word,
    Dword,
    Qword,
    Str,
    Unknown,
}

impl DataType {
    /// Static element size in bytes, or `None` for variable-length types
    /// (e.g. `Str`, which is measured during analysis).
    pub fn fixed_len(self) -> Option<usize> {
        match self {
            DataType::Byte => Some(1),
            DataType::Word => Some(2),
            DataType::Dword => Some(4),
            DataType::Qword => Some(8),
            DataType::Str | DataType::Unknown => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gpr32_round_trips_through_id() {
        for id in 0..8u8 {
            let reg = Gpr32::from_id(id);
            assert_eq!(reg as u8, id);
        }
    }

    #[test]
    fn jcc_display_matches_condition() {
        assert_eq!(Mnemonic::Jcc(0x4).to_string(), "jz");
        assert_eq!(Mnemonic::Jcc(0x5).to_string(), "jnz");
    }
}
