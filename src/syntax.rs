//! Opcode syntax records (spec §3 "Opcode syntax record").
//!
//! A syntax record describes one encodable instruction form: the literal
//! prefix bytes that select it, an optional ModR/M group-extension, whether
//! it is one of eight register-encoded siblings, and the operands the
//! decoder must consume to finish the job. Records are produced once (by
//! [`crate::opcode_table::build`]) and never mutated afterwards — the decode
//! tree only ever hands out shared references to them.

use crate::enums::{Mnemonic, RegisterClass, Segment};
use crate::operand::OperandDesc;

/// What kind of control-flow behavior a syntax's instructions have.
///
/// Drives [`crate::instruction::Instruction::stops_trace`],
/// [`crate::instruction::Instruction::is_call`], and
/// [`crate::instruction::Instruction::is_unconditional_branch`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum InstrClass {
    /// No special control-flow role.
    Generic,
    Call,
    /// Unconditional jump.
    Jump,
    /// Conditional jump; falls through when not taken.
    JumpConditional,
    Return,
    Halt,
}

/// The effect a prefix-only syntax has on decode [`crate::context::Context`]
/// when applied (spec §4.B `apply_prefix`).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PrefixEffect {
    Lock,
    Rep,
    Repne,
    OperandSizeOverride,
    AddressSizeOverride,
    Segment(Segment),
}

/// A single encodable instruction form.
///
/// Construction invariant (spec §3): inserting a syntax whose prefix is
/// `b0 b1 .. bk` into the [`crate::tree::DecodeTree`] descends children for
/// `b0..b_{k-1}`, creating them as needed, and appends the syntax to the
/// leaf list at byte `bk` of the final node.
#[derive(Clone, Debug)]
pub struct OpcodeSyntax {
    pub mnemonic: Mnemonic,
    /// Ordered sequence of 1-3 bytes that must match literally as a path in
    /// the decode tree.
    pub prefix: Vec<u8>,
    /// A 3-bit value in `[0,7]` matched against ModR/M bits 5-3, or `None`
    /// if this syntax does not need group-extension disambiguation.
    pub modrm_extension: Option<u8>,
    /// Set only on one of the 8 siblings produced by expanding a
    /// register-encoded opcode (spec §4.C); records which register id `0..7`
    /// this particular sibling represents.
    pub encoded_register: Option<u8>,
    pub operands: Vec<OperandDesc>,
    pub class: InstrClass,
    /// `Some` exactly when this syntax is a prefix byte rather than a full
    /// instruction (spec §4.D "prefix-only instruction").
    pub prefix_effect: Option<PrefixEffect>,
    /// Register class that ModR/M `reg`/`rm` fields (and any opcode-encoded
    /// register) resolve into for this syntax.
    pub reg_class: RegisterClass,
}

impl OpcodeSyntax {
    pub fn is_prefix_only(&self) -> bool {
        self.prefix_effect.is_some()
    }

    pub fn has_modrm(&self) -> bool {
        self.operands
            .iter()
            .any(|o| matches!(o, OperandDesc::ModRmRm | OperandDesc::ModRmReg))
            || self.modrm_extension.is_some()
    }

    /// Whether this syntax needs the ModR/M-reg-field disambiguation step of
    /// spec §4.D.4 (i.e. it was inserted with a group extension).
    pub fn is_group_extended(&self) -> bool {
        self.modrm_extension.is_some()
    }
}
