//! Per-instruction decoder state (spec §3 "Context", §4.B).

use bitflags::bitflags;
#[cfg(feature = "serialization")]
use serde::{Deserialize, Serialize};

use crate::instruction::Instruction;
use crate::syntax::PrefixEffect;
use crate::Address;

bitflags! {
    /// Prefix-derived decode toggles accumulated on a [`Context`] as
    /// prefix-only instructions are applied (spec §4.B `apply_prefix`).
    ///
    /// One bit per accepted/observed prefix, rather than a handful of
    /// separate bools.
    #[cfg_attr(feature = "serialization", derive(Deserialize, Serialize))]
    pub struct ContextFlags: u8 {
        const LOCK                   = 1 << 0;
        const REP                    = 1 << 1;
        const REPNE                  = 1 << 2;
        const OPERAND_SIZE_OVERRIDE  = 1 << 3;
        const ADDRESS_SIZE_OVERRIDE  = 1 << 4;
    }
}

/// Mutable state threaded through one top-level decode.
///
/// Created fresh (or [`Context::reset`]) before each top-level decode; the
/// decoder mutates it as it walks prefixes and descends the tree, and it is
/// read back by operand decoding (e.g. to know whether a 32-bit or 16-bit
/// immediate is in play, or which segment a memory operand is relative to).
#[derive(Debug, Clone)]
pub struct Context {
    file_offset: usize,
    virtual_address: Address,
    decoded_prefix: Vec<u8>,
    pub flags: ContextFlags,
    pub segment: Option<crate::enums::Segment>,
}

impl Context {
    /// Creates a context for a top-level decode starting at `virtual_address`,
    /// whose bytes begin at `file_offset` within the image.
    pub fn new(file_offset: usize, virtual_address: Address) -> Self {
        Context {
            file_offset,
            virtual_address,
            decoded_prefix: Vec::with_capacity(crate::cursor::MAX_INSTRUCTION_LEN),
            flags: ContextFlags::empty(),
            segment: None,
        }
    }

    pub fn lock(&self) -> bool {
        self.flags.contains(ContextFlags::LOCK)
    }

    pub fn rep(&self) -> bool {
        self.flags.contains(ContextFlags::REP)
    }

    pub fn repne(&self) -> bool {
        self.flags.contains(ContextFlags::REPNE)
    }

    pub fn operand_size_override(&self) -> bool {
        self.flags.contains(ContextFlags::OPERAND_SIZE_OVERRIDE)
    }

    pub fn address_size_override(&self) -> bool {
        self.flags.contains(ContextFlags::ADDRESS_SIZE_OVERRIDE)
    }

    pub fn set_file_offset(&mut self, offset: usize) {
        self.file_offset = offset;
    }

    pub fn file_offset(&self) -> usize {
        self.file_offset
    }

    pub fn virtual_address(&self) -> Address {
        self.virtual_address
    }

    pub fn set_virtual_address(&mut self, addr: Address) {
        self.virtual_address = addr;
    }

    /// Appends a byte to the decoded-prefix trail, tracking the descent path
    /// through the tree during recursion (spec §4.B).
    pub fn add_decoded_prefix(&mut self, byte: u8) {
        self.decoded_prefix.push(byte);
    }

    /// Pops the most recently decoded prefix byte, undoing a failed descent.
    pub fn remove_decoded_prefix_top(&mut self) {
        self.decoded_prefix.pop();
    }

    pub fn decoded_prefix(&self) -> &[u8] {
        &self.decoded_prefix
    }

    /// Merges a prefix-only instruction's effect into this context (spec
    /// §4.B `apply_prefix`): segment override, operand/address size toggles,
    /// lock/rep.
    pub fn apply_prefix(&mut self, prefix_instruction: &Instruction) {
        let Some(effect) = prefix_instruction.syntax.prefix_effect else {
            return;
        };
        match effect {
            PrefixEffect::Lock => self.flags.insert(ContextFlags::LOCK),
            PrefixEffect::Rep => self.flags.insert(ContextFlags::REP),
            PrefixEffect::Repne => self.flags.insert(ContextFlags::REPNE),
            PrefixEffect::OperandSizeOverride => self.flags.insert(ContextFlags::OPERAND_SIZE_OVERRIDE),
            PrefixEffect::AddressSizeOverride => self.flags.insert(ContextFlags::ADDRESS_SIZE_OVERRIDE),
            PrefixEffect::Segment(seg) => self.segment = Some(seg),
        }
    }

    /// Clears all state for the next top-level decode, keeping the allocated
    /// prefix-trail buffer around.
    pub fn reset(&mut self, file_offset: usize, virtual_address: Address) {
        self.file_offset = file_offset;
        self.virtual_address = virtual_address;
        self.decoded_prefix.clear();
        self.flags = ContextFlags::empty();
        self.segment = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_clears_prefix_state() {
        let mut ctx = Context::new(0, 0x1000);
        ctx.flags.insert(ContextFlags::LOCK);
        ctx.add_decoded_prefix(0xF0);
        ctx.reset(4, 0x1004);
        assert!(!ctx.lock());
        assert!(ctx.decoded_prefix().is_empty());
        assert_eq!(ctx.virtual_address(), 0x1004);
    }
}
