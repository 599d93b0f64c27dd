//! Spec §8 round-trip law: building the decode tree from the built-in
//! syntax list and enumerating all reachable leaves yields exactly that
//! list, with register-encoded syntaxes expanded ×8.

use xdisasm::operand::OperandDesc;

#[test]
fn enumeration_matches_the_built_in_table_with_register_expansion() {
    let tree = xdisasm::opcode_table::build();
    let leaves = tree.enumerate();

    // Every register-encoded form occupies 8 leaf slots differing only in
    // the low 3 bits of the final prefix byte.
    let push_variants: Vec<_> = leaves
        .iter()
        .filter(|s| s.mnemonic == xdisasm::enums::Mnemonic::Push)
        .collect();
    assert_eq!(push_variants.len(), 8);
    let mut seen_ids: Vec<u8> = push_variants
        .iter()
        .map(|s| s.encoded_register.expect("push variants are register-encoded"))
        .collect();
    seen_ids.sort_unstable();
    assert_eq!(seen_ids, (0..8).collect::<Vec<_>>());

    // Every leaf with a ModR/M operand descriptor is also flagged as
    // needing ModR/M.
    for syntax in &leaves {
        if syntax.operands.iter().any(|o| matches!(o, OperandDesc::ModRmRm | OperandDesc::ModRmReg)) {
            assert!(syntax.has_modrm());
        }
    }
}
