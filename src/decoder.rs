//! Recursive descent over a byte cursor driven by the decode tree
//! (spec §4.D).

use std::sync::Arc;

use crate::context::Context;
use crate::cursor::Cursor;
use crate::entity::Entity;
use crate::error::{DisasmError, Result};
use crate::instruction::{self, Instruction};
use crate::listener::ListenerSet;
use crate::syntax::OpcodeSyntax;
use crate::tree::{DecodeTree, TreeNode};

/// Owns a built, immutable [`DecodeTree`] and drives [`decode`] against it.
///
/// Cheap to clone (the tree is behind an `Arc`); intended to be built once
/// per process and shared across however many top-level decodes the trace
/// engine performs.
#[derive(Clone)]
pub struct Decoder {
    tree: Arc<DecodeTree>,
}

impl Decoder {
    pub fn new(tree: Arc<DecodeTree>) -> Self {
        Decoder { tree }
    }

    /// Builds a decoder over the crate's built-in opcode table
    /// ([`crate::opcode_table::build`]).
    pub fn with_builtin_table() -> Self {
        Decoder::new(Arc::new(crate::opcode_table::build()))
    }

    /// Decodes one instruction at `ctx`'s current address from `cursor`.
    ///
    /// Returns `Ok(None)` on a clean decode miss (no opcode matched at the
    /// root), per spec §4.D's "Failure" clause — the caller is responsible
    /// for turning that into an "Unknown opcode" pseudo-entity. Returns
    /// `Err(DecodeException)` if a leaf matched but its operands could not
    /// be consumed (truncated immediate, mismatched group extension, ...).
    pub fn decode(&self, cursor: &mut Cursor, ctx: &mut Context) -> Result<Option<Instruction>> {
        loop {
            match descend(cursor, ctx, self.tree.root())? {
                Some(inst) if inst.is_prefix_only() => {
                    ctx.apply_prefix(&inst);
                }
                other => return Ok(other),
            }
        }
    }

    /// The one-shot decode entry point (spec §4.D "Failure" clause; spec §6
    /// notes `on_decode` is "used by one-shot decoders without a data
    /// store"). On a clean root miss, synthesizes a length-1 "Unknown
    /// opcode: XX" pseudo-entity instead of reporting an error, per spec
    /// §7: "DecodeMiss ... surfaces as an 'unknown opcode' pseudo-entity in
    /// one-shot mode" — unlike the trace engine, which has a data store to
    /// leave untouched and instead reports `on_analyze_error` with no
    /// entity inserted (spec scenario 4). A malformed operand past a
    /// matched leaf is a different failure (`DecodeException`) and is
    /// still propagated as `Err`, not folded into the miss case.
    ///
    /// Drives `listeners.on_decode` directly, since a one-shot caller by
    /// definition has no [`crate::store::DisasmStore`] of its own to notify
    /// through.
    pub fn decode_or_unknown(
        &self,
        cursor: &mut Cursor,
        ctx: &mut Context,
        listeners: &ListenerSet,
    ) -> Result<Entity> {
        let address = ctx.virtual_address();
        match self.decode(cursor, ctx)? {
            Some(inst) => {
                let size = inst.size;
                let entity = Entity::Instruction(inst);
                listeners.notify_decode(address, size, &entity);
                Ok(entity)
            }
            None => {
                let byte = cursor.read_u8().unwrap_or(0);
                let miss = DisasmError::DecodeMiss { address };
                tracing::warn!(%miss, address = %format_args!("{address:#x}"), byte, "unknown opcode in one-shot decode");
                let entity = Entity::Unknown { address, byte };
                listeners.notify_decode(address, 1, &entity);
                Ok(entity)
            }
        }
    }
}

/// The recursive step described in spec §4.D.
fn descend(cursor: &mut Cursor, ctx: &mut Context, node: &TreeNode) -> Result<Option<Instruction>> {
    let b = match cursor.read_u8() {
        Ok(b) => b,
        Err(_) => return Ok(None),
    };
    ctx.add_decoded_prefix(b);

    if let Some(child) = node.sub_tree(b) {
        if let Some(inst) = descend(cursor, ctx, child)? {
            return Ok(Some(inst));
        }
        // Deeper descent missed; fall through and try a leaf at this node
        // for the same byte (spec's shared prefix / shorter-encoding case).
    }

    let leaves = match node.leaves(b) {
        Some(l) => l,
        None => {
            cursor.skip(-1);
            ctx.remove_decoded_prefix_top();
            return Ok(None);
        }
    };

    match select_leaf(cursor, leaves)? {
        Some(syntax) => {
            let address = ctx.virtual_address();
            instruction::decode_operands(cursor, ctx, address, syntax).map(Some)
        }
        None => {
            cursor.skip(-1);
            ctx.remove_decoded_prefix_top();
            Ok(None)
        }
    }
}

/// Disambiguates the leaf list for one byte (spec §4.D.4).
fn select_leaf(cursor: &Cursor, leaves: &[Arc<OpcodeSyntax>]) -> Result<Option<Arc<OpcodeSyntax>>> {
    if leaves.iter().any(|s| s.is_group_extended()) {
        let Ok(peek) = cursor.peek_u8() else {
            return Ok(None);
        };
        let ext = (peek >> 3) & 0x07;
        Ok(leaves
            .iter()
            .find(|s| s.modrm_extension == Some(ext))
            .cloned())
    } else {
        // First non-extended leaf wins (spec §9 open question: documented
        // first-match policy, not a bug).
        Ok(leaves.iter().find(|s| !s.is_group_extended()).cloned())
    }
}
