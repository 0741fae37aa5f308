use std::collections::BTreeMap;

use crate::disasm::error::DecodeError;
use crate::disasm::instruction::Instruction;
use crate::disasm::listing::render_listing;
use crate::disasm::op::OpTable;
use crate::disasm::stream::ByteStream;

#[cfg(test)]
#[path = "./decoder_test.rs"]
mod decoder_test;

/// Linear sweep driver: walks the buffer from offset 0 and records one
/// Instruction per decoded offset.
#[derive(Default)]
pub struct Decoder {
    table: OpTable,
    instructions: BTreeMap<u32, Instruction>,
}

impl Decoder {
    /// the decoded instructions keyed by offset, sorted
    pub fn instructions(&self) -> &BTreeMap<u32, Instruction> {
        &self.instructions
    }

    pub fn present_listing(&self) -> String {
        render_listing(&self.instructions)
    }

    pub fn disassemble_to_str(&mut self, data: &[u8]) -> String {
        self.sweep(data);
        self.present_listing()
    }

    /// Decodes the whole buffer, strictly forward from offset 0.
    pub fn sweep(&mut self, data: &[u8]) {
        self.instructions.clear();
        let mut stream = ByteStream::new(data);
        let mut offset: u32 = 0;

        loop {
            // a forward branch may already have left a label-only
            // placeholder at this offset; merge rather than replace it
            let mut inst = match self.instructions.get(&offset) {
                Some(existing) => existing.clone(),
                None => Instruction::default(),
            };

            let (op, prefix, opcode) = match self.table.get_next(&mut stream) {
                Ok(hit) => hit,
                Err(err) => match &err {
                    DecodeError::Db(b) => {
                        // unknown byte: record a db pseudo-instruction and
                        // resynchronize exactly one byte further on (a
                        // speculatively read ModR/M byte was already unread)
                        inst.offset = offset;
                        inst.mnemonic = err.to_string();
                        inst.literal.push(*b);
                        self.instructions.insert(offset, inst);
                        offset += 1;
                        continue;
                    }
                    // stream exhausted, cleanly or mid-instruction
                    _ => break,
                },
            };

            inst.offset = offset;
            inst.prefix = prefix;
            inst.opcode = opcode;
            if let Some(pre) = &inst.prefix {
                inst.literal.push(pre.literal);
            }
            inst.literal.push(opcode);

            if let Err(err) = op.encode(&mut stream, &mut inst) {
                eprintln!("error encoding instruction at {:08x}: {}", offset, err);
            }

            match op.encoding.stringify(&inst) {
                Ok((operands, target)) => {
                    inst.operands = operands;
                    if let Some(target) = target {
                        // branch target: label the instruction there,
                        // creating a placeholder if it is still undecoded
                        let other = self
                            .instructions
                            .entry(target)
                            .or_insert_with(|| Instruction { offset: target, ..Instruction::default() });
                        other.label = inst.operands.clone();
                    }
                }
                Err(err) => {
                    eprintln!("error stringifying operands at {:08x}: {}", offset, err);
                }
            }

            let len = inst.literal.len() as u32;
            self.instructions.insert(offset, inst);
            offset += len;
        }
    }
}
