//! The decode tree: a variable-depth prefix trie over opcode bytes with
//! ModR/M extension disambiguation (spec §3 "Decode tree node", §4.C).

use std::collections::HashMap;
use std::sync::Arc;

use crate::syntax::OpcodeSyntax;

/// A single node of the decode tree.
///
/// Invariant (spec §3): a single byte value at a node may simultaneously
/// have a child sub-tree *and* a leaf list — longer and shorter encodings
/// share a prefix (e.g. `0F 6F` vs `66 0F 6F`: at the node reached after
/// `0F`, byte `6F` is a leaf for MOVQ, while at the root, byte `66` both
/// leads to a child (continuing towards `0F 6F`) and never appears as a leaf
/// itself since no syntax's prefix ends at `66` alone).
#[derive(Default)]
pub struct TreeNode {
    children: HashMap<u8, Box<TreeNode>>,
    leaves: HashMap<u8, Vec<Arc<OpcodeSyntax>>>,
}

impl TreeNode {
    fn new() -> Self {
        TreeNode::default()
    }

    /// The child reached by `byte`, if any syntax's prefix continues through it.
    pub fn sub_tree(&self, byte: u8) -> Option<&TreeNode> {
        self.children.get(&byte).map(|b| b.as_ref())
    }

    /// The syntax records that terminate at this node via `byte`, if any.
    pub fn leaves(&self, byte: u8) -> Option<&[Arc<OpcodeSyntax>]> {
        self.leaves.get(&byte).map(|v| v.as_slice())
    }
}

/// The root of a decode tree, built once from a finite opcode-syntax source
/// and never mutated afterwards (spec §1: "records are pre-built and
/// immutable for the life of the disassembler").
#[derive(Default)]
pub struct DecodeTree {
    root: TreeNode,
}

impl DecodeTree {
    pub fn new() -> Self {
        DecodeTree { root: TreeNode::new() }
    }

    pub fn root(&self) -> &TreeNode {
        &self.root
    }

    /// Inserts one syntax record at `prefix_bytes`.
    ///
    /// If `syntax.encoded_register` is set, the caller is expected to have
    /// already produced 8 sibling records (one per register id, with the
    /// corresponding byte of `prefix_bytes` already offset) — construction
    /// of those siblings lives in [`crate::opcode_table`], since it is a
    /// property of the *source* syntax (one logical instruction occupying 8
    /// adjacent leaf slots), not of the tree itself.
    pub fn insert(&mut self, prefix_bytes: &[u8], syntax: Arc<OpcodeSyntax>) {
        assert!(
            !prefix_bytes.is_empty(),
            "opcode syntax must have at least one prefix byte"
        );
        let (last, init) = prefix_bytes.split_last().unwrap();
        let mut node = &mut self.root;
        for &b in init {
            node = node.children.entry(b).or_insert_with(|| Box::new(TreeNode::new()));
        }
        let slot = node.leaves.entry(*last).or_default();
        if !syntax.is_group_extended() && !slot.is_empty() && slot.iter().any(|s| !s.is_group_extended()) {
            // Spec §9 open question: multiple non-extended leaves sharing one
            // prefix is a known ambiguity in the opcode table. Policy is
            // first-match; we only log so the conflict is visible.
            tracing::warn!(
                prefix = ?prefix_bytes,
                new = %syntax.mnemonic,
                "decode tree: non-extended opcode conflict, keeping first match"
            );
        }
        slot.push(syntax);
    }

    /// Enumerates every leaf syntax reachable from the root, in insertion
    /// order within each slot. Used by the round-trip law in spec §8
    /// ("enumerating all reachable leaves yields exactly `S`").
    pub fn enumerate(&self) -> Vec<Arc<OpcodeSyntax>> {
        let mut out = Vec::new();
        Self::enumerate_node(&self.root, &mut out);
        out
    }

    fn enumerate_node(node: &TreeNode, out: &mut Vec<Arc<OpcodeSyntax>>) {
        let mut bytes: Vec<&u8> = node.children.keys().chain(node.leaves.keys()).collect();
        bytes.sort();
        bytes.dedup();
        for &b in bytes {
            if let Some(leaves) = node.leaves.get(&b) {
                out.extend(leaves.iter().cloned());
            }
            if let Some(child) = node.children.get(&b) {
                Self::enumerate_node(child, out);
            }
        }
    }
}
