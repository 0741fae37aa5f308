use std::collections::BTreeMap;

use crate::disasm::instruction::Instruction;

/// Renders the swept instructions as a tab-separated listing, in
/// ascending offset order.
pub fn render_listing(instructions: &BTreeMap<u32, Instruction>) -> String {
    let mut res = String::new();

    for inst in instructions.values() {
        // label-only placeholders have no backing code
        if inst.literal.is_empty() {
            continue;
        }

        if !inst.label.is_empty() {
            res.push_str(&format!("{}:\t\t\t\n", inst.label));
        }
        res.push_str(&format!("{}\n", inst));
    }

    res
}
