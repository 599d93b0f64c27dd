//! Built-in opcode-syntax producer.
//!
//! Spec §1 treats "the opcode-table source format (an XML reference of x86
//! encodings)" as an external, out-of-scope collaborator that yields a
//! finite sequence of [`OpcodeSyntax`] records. This module plays that
//! producer's role with a small, hand-authored table instead of parsing an
//! XML reference — enough instruction forms to exercise every decode-tree
//! and trace-engine behavior this crate supports (group-extension
//! disambiguation, mandatory-prefix escapes, register-encoded opcodes,
//! call/jump/return classification, prefix merging), without attempting
//! full ISA coverage.

use std::sync::Arc;

use crate::enums::{Mnemonic, RegisterClass, Segment};
use crate::operand::OperandDesc;
use crate::syntax::{InstrClass, OpcodeSyntax, PrefixEffect};
use crate::tree::DecodeTree;

/// Builds the decode tree for the built-in table.
pub fn build() -> DecodeTree {
    let mut tree = DecodeTree::new();
    for syntax in all_syntaxes() {
        insert_syntax(&mut tree, syntax);
    }
    tree
}

/// Inserts one syntax, expanding register-encoded forms into the 8 adjacent
/// leaf slots spec §4.C describes.
fn insert_syntax(tree: &mut DecodeTree, mut syntax: OpcodeSyntax) {
    if syntax.operands.contains(&OperandDesc::OpcodeReg) && syntax.encoded_register.is_none() {
        let base = *syntax.prefix.last().expect("prefix is non-empty");
        for id in 0..8u8 {
            let mut variant = syntax.clone();
            *variant.prefix.last_mut().unwrap() = base + id;
            variant.encoded_register = Some(id);
            tree.insert(&variant.prefix.clone(), Arc::new(variant));
        }
    } else {
        let prefix = syntax.prefix.clone();
        tree.insert(&prefix, Arc::new(syntax));
    }
}

fn plain(mnemonic: Mnemonic, prefix: &[u8], operands: Vec<OperandDesc>, class: InstrClass) -> OpcodeSyntax {
    OpcodeSyntax {
        mnemonic,
        prefix: prefix.to_vec(),
        modrm_extension: None,
        encoded_register: None,
        operands,
        class,
        prefix_effect: None,
        reg_class: RegisterClass::Gpr32,
    }
}

fn group(
    mnemonic: Mnemonic,
    prefix: &[u8],
    ext: u8,
    operands: Vec<OperandDesc>,
    class: InstrClass,
) -> OpcodeSyntax {
    OpcodeSyntax {
        modrm_extension: Some(ext),
        ..plain(mnemonic, prefix, operands, class)
    }
}

fn prefix_only(prefix: &[u8], effect: PrefixEffect) -> OpcodeSyntax {
    OpcodeSyntax {
        prefix_effect: Some(effect),
        ..plain(Mnemonic::Unknown, prefix, vec![], InstrClass::Generic)
    }
}

fn all_syntaxes() -> Vec<OpcodeSyntax> {
    let mut v = Vec::new();

    // --- Prefixes ---
    v.push(prefix_only(&[0xF0], PrefixEffect::Lock));
    v.push(prefix_only(&[0xF2], PrefixEffect::Repne));
    v.push(prefix_only(&[0xF3], PrefixEffect::Rep));
    v.push(prefix_only(&[0x66], PrefixEffect::OperandSizeOverride));
    v.push(prefix_only(&[0x67], PrefixEffect::AddressSizeOverride));
    v.push(prefix_only(&[0x2E], PrefixEffect::Segment(Segment::Cs)));
    v.push(prefix_only(&[0x36], PrefixEffect::Segment(Segment::Ss)));
    v.push(prefix_only(&[0x3E], PrefixEffect::Segment(Segment::Ds)));
    v.push(prefix_only(&[0x26], PrefixEffect::Segment(Segment::Es)));
    v.push(prefix_only(&[0x64], PrefixEffect::Segment(Segment::Fs)));
    v.push(prefix_only(&[0x65], PrefixEffect::Segment(Segment::Gs)));

    // --- No-operand forms ---
    v.push(plain(Mnemonic::Nop, &[0x90], vec![], InstrClass::Generic));
    v.push(plain(Mnemonic::Ret, &[0xC3], vec![], InstrClass::Return));
    v.push(plain(Mnemonic::Hlt, &[0xF4], vec![], InstrClass::Halt));

    // --- Direct branches ---
    v.push(plain(Mnemonic::Call, &[0xE8], vec![OperandDesc::Rel32], InstrClass::Call));
    v.push(plain(Mnemonic::Jmp, &[0xE9], vec![OperandDesc::Rel32], InstrClass::Jump));
    v.push(plain(Mnemonic::Jmp, &[0xEB], vec![OperandDesc::Rel8], InstrClass::Jump));
    for cc in 0..16u8 {
        v.push(plain(
            Mnemonic::Jcc(cc),
            &[0x70 + cc],
            vec![OperandDesc::Rel8],
            InstrClass::JumpConditional,
        ));
    }

    // --- Register-encoded single-byte forms (spec §4.C 8-slot expansion) ---
    v.push(plain(Mnemonic::Inc, &[0x40], vec![OperandDesc::OpcodeReg], InstrClass::Generic));
    v.push(plain(Mnemonic::Push, &[0x50], vec![OperandDesc::OpcodeReg], InstrClass::Generic));
    v.push(plain(Mnemonic::Pop, &[0x58], vec![OperandDesc::OpcodeReg], InstrClass::Generic));
    v.push(plain(
        Mnemonic::Mov,
        &[0xB8],
        vec![OperandDesc::OpcodeReg, OperandDesc::Imm32],
        InstrClass::Generic,
    ));

    // --- ModR/M register-to-register/memory forms ---
    v.push(plain(
        Mnemonic::Mov,
        &[0x89],
        vec![OperandDesc::ModRmRm, OperandDesc::ModRmReg],
        InstrClass::Generic,
    ));
    v.push(plain(
        Mnemonic::Mov,
        &[0x8B],
        vec![OperandDesc::ModRmReg, OperandDesc::ModRmRm],
        InstrClass::Generic,
    ));
    v.push(plain(
        Mnemonic::Lea,
        &[0x8D],
        vec![OperandDesc::ModRmReg, OperandDesc::ModRmRm],
        InstrClass::Generic,
    ));
    v.push(plain(
        Mnemonic::Test,
        &[0x85],
        vec![OperandDesc::ModRmRm, OperandDesc::ModRmReg],
        InstrClass::Generic,
    ));

    // --- Group 1: 83 /r ib (ADD/OR/ADC/SBB/AND/SUB/XOR/CMP r/m32, imm8) ---
    let group1 = [
        Mnemonic::Add,
        Mnemonic::Or,
        Mnemonic::Adc,
        Mnemonic::Sbb,
        Mnemonic::And,
        Mnemonic::Sub,
        Mnemonic::Xor,
        Mnemonic::Cmp,
    ];
    for (ext, mnemonic) in group1.into_iter().enumerate() {
        v.push(group(
            mnemonic,
            &[0x83],
            ext as u8,
            vec![OperandDesc::ModRmRm, OperandDesc::Imm8],
            InstrClass::Generic,
        ));
    }

    // --- Group 5: FF /r (INC/DEC/CALL/JMP/PUSH r/m32) ---
    v.push(group(
        Mnemonic::Inc,
        &[0xFF],
        0,
        vec![OperandDesc::ModRmRm],
        InstrClass::Generic,
    ));
    v.push(group(
        Mnemonic::Dec,
        &[0xFF],
        1,
        vec![OperandDesc::ModRmRm],
        InstrClass::Generic,
    ));
    v.push(group(
        Mnemonic::Call,
        &[0xFF],
        2,
        vec![OperandDesc::ModRmRm],
        InstrClass::Call,
    ));
    v.push(group(
        Mnemonic::Jmp,
        &[0xFF],
        4,
        vec![OperandDesc::ModRmRm],
        InstrClass::Jump,
    ));
    v.push(group(
        Mnemonic::Push,
        &[0xFF],
        6,
        vec![OperandDesc::ModRmRm],
        InstrClass::Generic,
    ));

    // --- Two-byte (0F-escaped) forms ---
    v.push(OpcodeSyntax {
        reg_class: RegisterClass::Mm,
        ..plain(Mnemonic::Movq, &[0x0F, 0x6F], vec![OperandDesc::ModRmReg, OperandDesc::ModRmRm], InstrClass::Generic)
    });

    // --- Mandatory-prefix escape: 66 0F 6F (MOVDQA xmm, xmm/m128) ---
    v.push(OpcodeSyntax {
        reg_class: RegisterClass::Xmm,
        ..plain(
            Mnemonic::Movdqa,
            &[0x66, 0x0F, 0x6F],
            vec![OperandDesc::ModRmReg, OperandDesc::ModRmRm],
            InstrClass::Generic,
        )
    });

    v
}
