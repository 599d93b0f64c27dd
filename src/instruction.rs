//! The decoded [`Instruction`] and the operand-consumption logic that
//! finishes a decode once a leaf syntax has been selected (spec §3
//! "Instruction", §4.D final paragraph).

use std::sync::Arc;

use crate::context::Context;
use crate::cursor::Cursor;
use crate::enums::Gpr32;
use crate::error::{DisasmError, Result};
use crate::operand::{MemoryOperand, Operand, OperandDesc};
use crate::syntax::{InstrClass, OpcodeSyntax};
use crate::Address;

/// A successfully decoded instruction.
#[derive(Clone, Debug)]
pub struct Instruction {
    pub address: Address,
    pub syntax: Arc<OpcodeSyntax>,
    pub operands: Vec<Operand>,
    /// Total encoded size in bytes, `cursor.position() - ctx.file_offset()`
    /// at completion (spec §4.D).
    pub size: usize,
}

impl Instruction {
    pub fn is_prefix_only(&self) -> bool {
        self.syntax.is_prefix_only()
    }

    pub fn is_call(&self) -> bool {
        self.syntax.class == InstrClass::Call
    }

    pub fn is_unconditional_branch(&self) -> bool {
        self.syntax.class == InstrClass::Jump
    }

    pub fn is_jump(&self) -> bool {
        matches!(self.syntax.class, InstrClass::Jump | InstrClass::JumpConditional)
    }

    /// Whether this instruction terminates a linear trace: return,
    /// unconditional jump, or halt (spec §3, §4.F step 2).
    pub fn stops_trace(&self) -> bool {
        matches!(self.syntax.class, InstrClass::Return | InstrClass::Jump | InstrClass::Halt)
    }

    /// Memory addresses reachable directly from this instruction (resolved
    /// `Rel8`/`Rel32` operands). Indirect call/jump targets are never
    /// included — resolving them is explicitly out of scope (spec §1).
    pub fn branch_targets(&self) -> Vec<Address> {
        if !matches!(
            self.syntax.class,
            InstrClass::Call | InstrClass::Jump | InstrClass::JumpConditional
        ) {
            return Vec::new();
        }
        self.operands
            .iter()
            .filter_map(|op| match op {
                Operand::Relative(addr) => Some(*addr),
                _ => None,
            })
            .collect()
    }

    /// Memory operands whose effective address is a literal (spec §3
    /// "associated data").
    pub fn associated_data(&self) -> Vec<Address> {
        self.operands
            .iter()
            .filter_map(|op| match op {
                Operand::Memory(m) => m.literal_address(),
                _ => None,
            })
            .collect()
    }

    /// Immediate operands that look like in-image addresses (spec §3
    /// "probable data pointers"). Caller filters by `Image::is_valid_address`.
    pub fn probable_data_pointers(&self) -> Vec<Address> {
        self.operands
            .iter()
            .filter_map(|op| match op {
                Operand::Immediate(v) if *v >= 0 => Some(*v as Address),
                _ => None,
            })
            .collect()
    }
}

struct ModRm {
    reg: u8,
    operand: Operand,
}

fn decode_modrm(cursor: &mut Cursor, ctx: &Context, syntax: &OpcodeSyntax) -> Result<ModRm> {
    let modrm = cursor.read_u8()?;
    let md = modrm >> 6;
    let reg = (modrm >> 3) & 0x7;
    let rm = modrm & 0x7;

    if md == 0b11 {
        return Ok(ModRm {
            reg,
            operand: Operand::Register(syntax.reg_class.encode(rm)),
        });
    }

    let (base, index, mut disp_size) = if rm == 0b100 {
        let sib = cursor.read_u8()?;
        let scale = sib >> 6;
        let idx = (sib >> 3) & 0x7;
        let base_field = sib & 0x7;

        let index = if idx == 0b100 {
            None
        } else {
            Some((crate::enums::Register::Gpr32(Gpr32::from_id(idx)), 1u8 << scale))
        };

        if base_field == 0b101 && md == 0b00 {
            (None, index, 4usize)
        } else {
            (Some(Gpr32::from_id(base_field)), index, 0usize)
        }
    } else if rm == 0b101 && md == 0b00 {
        (None, None, 4usize)
    } else {
        (Some(Gpr32::from_id(rm)), None, 0usize)
    };

    disp_size = match md {
        0b00 => disp_size,
        0b01 => 1,
        0b10 => 4,
        _ => unreachable!(),
    };

    let displacement: i64 = match disp_size {
        0 => 0,
        1 => cursor.read_u8()? as i8 as i64,
        4 => cursor.read_u32()? as i32 as i64,
        _ => unreachable!(),
    };

    let is_literal = base.is_none() && index.is_none();

    Ok(ModRm {
        reg,
        operand: Operand::Memory(MemoryOperand {
            // Spec §4.B: a segment-override prefix merged into `ctx` via
            // `apply_prefix` applies to the memory operand of the
            // instruction that follows it.
            segment: ctx.segment,
            base: base.map(crate::enums::Register::Gpr32),
            index,
            displacement,
            is_literal,
        }),
    })
}

/// Consumes ModR/M, SIB, displacement, and immediate bytes per `syntax`'s
/// operand descriptors, producing the final [`Instruction`] (spec §4.D,
/// last paragraph).
pub fn decode_operands(
    cursor: &mut Cursor,
    ctx: &Context,
    address: Address,
    syntax: Arc<OpcodeSyntax>,
) -> Result<Instruction> {
    let start = ctx.file_offset();
    let mut operands = Vec::with_capacity(syntax.operands.len());
    let mut modrm: Option<ModRm> = None;

    let needs_modrm = syntax.has_modrm();
    if needs_modrm {
        modrm = Some(decode_modrm(cursor, ctx, &syntax).map_err(|e| promote_to_exception(e, address))?);
        if let Some(ext) = syntax.modrm_extension {
            let got = modrm.as_ref().unwrap().reg;
            if got != ext {
                return Err(DisasmError::DecodeException {
                    address,
                    reason: format!("modrm reg field {got} does not match expected extension {ext}"),
                });
            }
        }
    }

    for desc in &syntax.operands {
        let operand = match desc {
            OperandDesc::ModRmRm => modrm
                .as_ref()
                .expect("has_modrm implies modrm decoded")
                .operand
                .clone(),
            OperandDesc::ModRmReg => {
                let reg = modrm.as_ref().expect("has_modrm implies modrm decoded").reg;
                Operand::Register(syntax.reg_class.encode(reg))
            }
            OperandDesc::OpcodeReg => {
                let id = syntax
                    .encoded_register
                    .expect("OpcodeReg operand requires encoded_register");
                Operand::Register(syntax.reg_class.encode(id))
            }
            OperandDesc::Imm8 => {
                let v = cursor.read_u8().map_err(|e| promote_to_exception(e, address))?;
                Operand::Immediate(v as i8 as i64)
            }
            OperandDesc::Imm32 => {
                let v = cursor.read_u32().map_err(|e| promote_to_exception(e, address))?;
                Operand::Immediate(v as i32 as i64)
            }
            OperandDesc::Rel8 => {
                let v = cursor.read_u8().map_err(|e| promote_to_exception(e, address))? as i8;
                // Resolved once the final instruction length is known, below.
                Operand::Immediate(v as i64)
            }
            OperandDesc::Rel32 => {
                let v = cursor.read_u32().map_err(|e| promote_to_exception(e, address))? as i32;
                Operand::Immediate(v as i64)
            }
        };
        operands.push(operand);
    }

    let size = cursor.position() - start;

    // Resolve Rel8/Rel32 immediates into absolute addresses now that `size` is known.
    for (desc, operand) in syntax.operands.iter().zip(operands.iter_mut()) {
        if matches!(desc, OperandDesc::Rel8 | OperandDesc::Rel32) {
            if let Operand::Immediate(delta) = *operand {
                let target = (address as i64 + size as i64 + delta) as u64;
                *operand = Operand::Relative(target);
            }
        }
    }

    Ok(Instruction {
        address,
        syntax,
        operands,
        size,
    })
}

fn promote_to_exception(err: DisasmError, address: Address) -> DisasmError {
    match err {
        DisasmError::EndOfImage => DisasmError::DecodeException {
            address,
            reason: "instruction truncated by end of image".to_string(),
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enums::{Mnemonic, Register, RegisterClass};

    fn add_eax_imm8() -> Arc<OpcodeSyntax> {
        Arc::new(OpcodeSyntax {
            mnemonic: Mnemonic::Add,
            prefix: vec![0x83],
            modrm_extension: Some(0),
            encoded_register: None,
            operands: vec![OperandDesc::ModRmRm, OperandDesc::Imm8],
            class: InstrClass::Generic,
            prefix_effect: None,
            reg_class: RegisterClass::Gpr32,
        })
    }

    #[test]
    fn group_extension_checked_against_modrm_reg() {
        // 83 C0 05 -> ModRM C0 = mod 11, reg 000 (ADD), rm 000 (EAX).
        let mut cursor = Cursor::new(&[0xC0, 0x05]);
        let ctx = Context::new(0, 0x1000);
        let inst = decode_operands(&mut cursor, &ctx, 0x1000, add_eax_imm8()).unwrap();
        assert_eq!(inst.operands[0], Operand::Register(Register::Gpr32(Gpr32::Eax)));
        assert_eq!(inst.operands[1], Operand::Immediate(5));
        assert_eq!(inst.size, 2);
    }

    #[test]
    fn mismatched_extension_is_a_decode_exception() {
        // ModRM F8 = mod 11, reg 111 (CMP, not ADD's 000), rm 000.
        let mut cursor = Cursor::new(&[0xF8, 0x05]);
        let ctx = Context::new(0, 0x1000);
        let err = decode_operands(&mut cursor, &ctx, 0x1000, add_eax_imm8()).unwrap_err();
        assert!(matches!(err, DisasmError::DecodeException { .. }));
    }

    #[test]
    fn literal_memory_operand_detected() {
        // FF /4 with ModRM 0x25 = mod 00, reg 100, rm 101 -> disp32-only memory operand.
        let syntax = Arc::new(OpcodeSyntax {
            mnemonic: Mnemonic::Jmp,
            prefix: vec![0xFF],
            modrm_extension: Some(4),
            encoded_register: None,
            operands: vec![OperandDesc::ModRmRm],
            class: InstrClass::Jump,
            prefix_effect: None,
            reg_class: RegisterClass::Gpr32,
        });
        let mut cursor = Cursor::new(&[0x25, 0x00, 0x20, 0x00, 0x00]);
        let ctx = Context::new(0, 0x1000);
        let inst = decode_operands(&mut cursor, &ctx, 0x1000, syntax).unwrap();
        assert_eq!(inst.associated_data(), vec![0x2000]);
    }

    #[test]
    fn rel32_resolves_relative_to_instruction_end() {
        let syntax = Arc::new(OpcodeSyntax {
            mnemonic: Mnemonic::Call,
            prefix: vec![0xE8],
            modrm_extension: None,
            encoded_register: None,
            operands: vec![OperandDesc::Rel32],
            class: InstrClass::Call,
            prefix_effect: None,
            reg_class: RegisterClass::Gpr32,
        });
        // E8 04 00 00 00 at address 0x1000 -> size 5, target 0x1000 + 5 + 4 = 0x100D.
        let mut cursor = Cursor::new(&[0x04, 0x00, 0x00, 0x00]);
        let ctx = Context::new(0, 0x1000);
        let inst = decode_operands(&mut cursor, &ctx, 0x1000, syntax).unwrap();
        assert_eq!(inst.branch_targets(), vec![0x100D]);
    }

    #[test]
    fn segment_override_threads_into_memory_operand() {
        // MOV [EAX], EAX with a prior CS override merged into ctx.segment:
        // ModRM 0x00 = mod 00, reg 000, rm 000 -> [EAX], no displacement.
        let syntax = Arc::new(OpcodeSyntax {
            mnemonic: Mnemonic::Mov,
            prefix: vec![0x89],
            modrm_extension: None,
            encoded_register: None,
            operands: vec![OperandDesc::ModRmRm, OperandDesc::ModRmReg],
            class: InstrClass::Generic,
            prefix_effect: None,
            reg_class: RegisterClass::Gpr32,
        });
        let mut cursor = Cursor::new(&[0x00]);
        let mut ctx = Context::new(0, 0x1000);
        ctx.segment = Some(crate::enums::Segment::Cs);
        let inst = decode_operands(&mut cursor, &ctx, 0x1000, syntax).unwrap();
        match &inst.operands[0] {
            Operand::Memory(m) => assert_eq!(m.segment, Some(crate::enums::Segment::Cs)),
            other => panic!("expected a memory operand, got {other:?}"),
        }
    }
}
