use std::collections::HashMap;

use crate::disasm::encoding::Encoding;
use crate::disasm::error::DecodeError;
use crate::disasm::instruction::{Instruction, ModRegRm, Prefix};
use crate::disasm::stream::ByteStream;

#[cfg(test)]
#[path = "./op_test.rs"]
mod op_test;

/// two-byte opcode escape
pub const ESCAPE: Prefix = Prefix { literal: 0x0F, mnemonic: "" };

pub const REPNE: Prefix = Prefix { literal: 0xF2, mnemonic: "repne" };

/// One opcode record: the mnemonic, the operand encoding, and the
/// byte widths the encoder needs.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct OpCode {
    pub literal: u8,
    pub mnemonic: &'static str,
    pub encoding: Encoding,
    pub modrm_req: bool,
    /// resolved through the extension table, keyed by ModR/M reg
    pub ext_req: bool,
    /// resolved through the 0x0F-prefixed table
    pub prefix_req: bool,
    pub extension: u8,
    pub disp_size: usize,
    pub imm_size: usize,
}

impl Default for OpCode {
    fn default() -> Self {
        OpCode {
            literal: 0,
            mnemonic: "",
            encoding: Encoding::NP,
            modrm_req: false,
            ext_req: false,
            prefix_req: false,
            extension: 0,
            disp_size: 0,
            imm_size: 0,
        }
    }
}

impl OpCode {
    /// Stamps the record's widths and mnemonic into the instruction,
    /// then consumes the encoding's trailing bytes.
    pub fn encode(
        &self,
        stream: &mut ByteStream,
        inst: &mut Instruction,
    ) -> Result<(), DecodeError> {
        inst.mnemonic = self.mnemonic.to_string();
        inst.disp_size = self.disp_size;
        inst.imm_size = self.imm_size;
        self.encoding.consume(stream, inst)
    }
}

/// The recognized instruction set.
fn all_ops() -> Vec<OpCode> {
    vec![
        // add
        OpCode { literal: 0x05, mnemonic: "add eax,", encoding: Encoding::I, imm_size: 4, ..OpCode::default() },
        OpCode { literal: 0x81, mnemonic: "add", encoding: Encoding::MI, modrm_req: true, ext_req: true, extension: 0, imm_size: 4, ..OpCode::default() },
        OpCode { literal: 0x01, mnemonic: "add", encoding: Encoding::MR, modrm_req: true, ..OpCode::default() },
        OpCode { literal: 0x03, mnemonic: "add", encoding: Encoding::RM, modrm_req: true, ..OpCode::default() },

        // and
        OpCode { literal: 0x25, mnemonic: "and eax,", encoding: Encoding::I, imm_size: 4, ..OpCode::default() },
        OpCode { literal: 0x81, mnemonic: "and", encoding: Encoding::MI, modrm_req: true, ext_req: true, extension: 4, imm_size: 4, ..OpCode::default() },
        OpCode { literal: 0x21, mnemonic: "and", encoding: Encoding::MR, modrm_req: true, ..OpCode::default() },
        OpCode { literal: 0x23, mnemonic: "and", encoding: Encoding::RM, modrm_req: true, ..OpCode::default() },

        // call
        OpCode { literal: 0xE8, mnemonic: "call", encoding: Encoding::D, disp_size: 4, ..OpCode::default() },
        OpCode { literal: 0xFF, mnemonic: "call", encoding: Encoding::M, modrm_req: true, ext_req: true, extension: 2, ..OpCode::default() },

        // clflush
        OpCode { literal: 0xAE, mnemonic: "clflush", encoding: Encoding::M, modrm_req: true, ext_req: true, prefix_req: true, extension: 7, ..OpCode::default() },

        // cmp
        OpCode { literal: 0x3D, mnemonic: "cmp eax,", encoding: Encoding::I, imm_size: 4, ..OpCode::default() },
        OpCode { literal: 0x81, mnemonic: "cmp", encoding: Encoding::MI, modrm_req: true, ext_req: true, extension: 7, imm_size: 4, ..OpCode::default() },
        OpCode { literal: 0x39, mnemonic: "cmp", encoding: Encoding::MR, modrm_req: true, ..OpCode::default() },
        OpCode { literal: 0x3B, mnemonic: "cmp", encoding: Encoding::RM, modrm_req: true, ..OpCode::default() },

        // dec
        OpCode { literal: 0xFF, mnemonic: "dec", encoding: Encoding::M, modrm_req: true, ext_req: true, extension: 1, ..OpCode::default() },
        OpCode { literal: 0x48, mnemonic: "dec", encoding: Encoding::O, ..OpCode::default() },

        // idiv
        OpCode { literal: 0xF7, mnemonic: "idiv", encoding: Encoding::M, modrm_req: true, ext_req: true, extension: 7, ..OpCode::default() },

        // imul
        OpCode { literal: 0xF7, mnemonic: "imul", encoding: Encoding::M, modrm_req: true, ext_req: true, extension: 5, ..OpCode::default() },
        OpCode { literal: 0xAF, mnemonic: "imul", encoding: Encoding::RM, modrm_req: true, prefix_req: true, ..OpCode::default() },
        OpCode { literal: 0x69, mnemonic: "imul", encoding: Encoding::RMI, modrm_req: true, imm_size: 4, ..OpCode::default() },

        // inc
        OpCode { literal: 0xFF, mnemonic: "inc", encoding: Encoding::M, modrm_req: true, ext_req: true, extension: 0, ..OpCode::default() },
        OpCode { literal: 0x40, mnemonic: "inc", encoding: Encoding::O, ..OpCode::default() },

        // jmp
        OpCode { literal: 0xEB, mnemonic: "jmp", encoding: Encoding::D, disp_size: 1, ..OpCode::default() },
        OpCode { literal: 0xE9, mnemonic: "jmp", encoding: Encoding::D, disp_size: 4, ..OpCode::default() },
        OpCode { literal: 0xFF, mnemonic: "jmp", encoding: Encoding::M, modrm_req: true, ext_req: true, extension: 4, ..OpCode::default() },

        // jz
        OpCode { literal: 0x74, mnemonic: "jz", encoding: Encoding::D, disp_size: 1, ..OpCode::default() },
        OpCode { literal: 0x84, mnemonic: "jz", encoding: Encoding::D, prefix_req: true, disp_size: 4, ..OpCode::default() },

        // jnz
        OpCode { literal: 0x75, mnemonic: "jnz", encoding: Encoding::D, disp_size: 1, ..OpCode::default() },
        OpCode { literal: 0x85, mnemonic: "jnz", encoding: Encoding::D, prefix_req: true, disp_size: 4, ..OpCode::default() },

        // lea
        OpCode { literal: 0x8D, mnemonic: "lea", encoding: Encoding::RM, modrm_req: true, ..OpCode::default() },

        // mov
        OpCode { literal: 0xB8, mnemonic: "mov", encoding: Encoding::OI, imm_size: 4, ..OpCode::default() },
        OpCode { literal: 0xC7, mnemonic: "mov", encoding: Encoding::MI, modrm_req: true, ext_req: true, extension: 0, imm_size: 4, ..OpCode::default() },
        OpCode { literal: 0x89, mnemonic: "mov", encoding: Encoding::MR, modrm_req: true, ..OpCode::default() },
        OpCode { literal: 0x8B, mnemonic: "mov", encoding: Encoding::RM, modrm_req: true, ..OpCode::default() },

        // movsd
        OpCode { literal: 0xA5, mnemonic: "movsd", encoding: Encoding::NP, ..OpCode::default() },

        // mul
        OpCode { literal: 0xF7, mnemonic: "mul", encoding: Encoding::M, modrm_req: true, ext_req: true, extension: 4, ..OpCode::default() },

        // neg
        OpCode { literal: 0xF7, mnemonic: "neg", encoding: Encoding::M, modrm_req: true, ext_req: true, extension: 3, ..OpCode::default() },

        // nop
        OpCode { literal: 0x90, mnemonic: "nop", encoding: Encoding::NP, ..OpCode::default() },

        // not
        OpCode { literal: 0xF7, mnemonic: "not", encoding: Encoding::M, modrm_req: true, ext_req: true, extension: 2, ..OpCode::default() },

        // or
        OpCode { literal: 0x0D, mnemonic: "or eax,", encoding: Encoding::I, imm_size: 4, ..OpCode::default() },
        OpCode { literal: 0x81, mnemonic: "or", encoding: Encoding::MI, modrm_req: true, ext_req: true, extension: 1, imm_size: 4, ..OpCode::default() },
        OpCode { literal: 0x09, mnemonic: "or", encoding: Encoding::MR, modrm_req: true, ..OpCode::default() },
        OpCode { literal: 0x0B, mnemonic: "or", encoding: Encoding::RM, modrm_req: true, ..OpCode::default() },

        // out
        OpCode { literal: 0xE7, mnemonic: "out %s, eax", encoding: Encoding::I, imm_size: 1, ..OpCode::default() },

        // pop
        OpCode { literal: 0x8F, mnemonic: "pop", encoding: Encoding::M, modrm_req: true, ext_req: true, extension: 0, ..OpCode::default() },
        OpCode { literal: 0x58, mnemonic: "pop", encoding: Encoding::O, ..OpCode::default() },

        // push
        OpCode { literal: 0xFF, mnemonic: "push", encoding: Encoding::M, modrm_req: true, ext_req: true, extension: 6, ..OpCode::default() },
        OpCode { literal: 0x50, mnemonic: "push", encoding: Encoding::O, ..OpCode::default() },
        OpCode { literal: 0x68, mnemonic: "push", encoding: Encoding::I, imm_size: 4, ..OpCode::default() },

        // cmpsd
        OpCode { literal: 0xA7, mnemonic: "cmpsd", encoding: Encoding::NP, ..OpCode::default() },

        // retf
        OpCode { literal: 0xCB, mnemonic: "retf", encoding: Encoding::NP, ..OpCode::default() },
        OpCode { literal: 0xCA, mnemonic: "retf", encoding: Encoding::I, imm_size: 2, ..OpCode::default() },

        // retn
        OpCode { literal: 0xC3, mnemonic: "retn", encoding: Encoding::NP, ..OpCode::default() },
        OpCode { literal: 0xC2, mnemonic: "retn", encoding: Encoding::I, imm_size: 2, ..OpCode::default() },

        // sal, sar, shr
        OpCode { literal: 0xD1, mnemonic: "sal %s, 1", encoding: Encoding::M, modrm_req: true, ext_req: true, extension: 4, ..OpCode::default() },
        OpCode { literal: 0xD1, mnemonic: "sar %s, 1", encoding: Encoding::M, modrm_req: true, ext_req: true, extension: 7, ..OpCode::default() },
        OpCode { literal: 0xD1, mnemonic: "shr %s, 1", encoding: Encoding::M, modrm_req: true, ext_req: true, extension: 5, ..OpCode::default() },

        // sbb
        OpCode { literal: 0x1D, mnemonic: "sbb eax,", encoding: Encoding::I, imm_size: 4, ..OpCode::default() },
        OpCode { literal: 0x81, mnemonic: "sbb", encoding: Encoding::MI, modrm_req: true, ext_req: true, extension: 3, imm_size: 4, ..OpCode::default() },
        OpCode { literal: 0x19, mnemonic: "sbb", encoding: Encoding::MR, modrm_req: true, ..OpCode::default() },
        OpCode { literal: 0x1B, mnemonic: "sbb", encoding: Encoding::RM, modrm_req: true, ..OpCode::default() },

        // sub
        OpCode { literal: 0x2D, mnemonic: "sub eax,", encoding: Encoding::I, imm_size: 4, ..OpCode::default() },
        OpCode { literal: 0x81, mnemonic: "sub", encoding: Encoding::MI, modrm_req: true, ext_req: true, extension: 5, imm_size: 4, ..OpCode::default() },
        OpCode { literal: 0x29, mnemonic: "sub", encoding: Encoding::MR, modrm_req: true, ..OpCode::default() },
        OpCode { literal: 0x2B, mnemonic: "sub", encoding: Encoding::RM, modrm_req: true, ..OpCode::default() },

        // test
        OpCode { literal: 0xA9, mnemonic: "test eax,", encoding: Encoding::I, imm_size: 4, ..OpCode::default() },
        OpCode { literal: 0xF7, mnemonic: "test", encoding: Encoding::MI, modrm_req: true, ext_req: true, extension: 0, imm_size: 4, ..OpCode::default() },
        OpCode { literal: 0x85, mnemonic: "test", encoding: Encoding::MR, modrm_req: true, ..OpCode::default() },

        // xor
        OpCode { literal: 0x35, mnemonic: "xor eax,", encoding: Encoding::I, imm_size: 4, ..OpCode::default() },
        OpCode { literal: 0x81, mnemonic: "xor", encoding: Encoding::MI, modrm_req: true, ext_req: true, extension: 6, imm_size: 4, ..OpCode::default() },
        OpCode { literal: 0x31, mnemonic: "xor", encoding: Encoding::MR, modrm_req: true, ..OpCode::default() },
        OpCode { literal: 0x33, mnemonic: "xor", encoding: Encoding::RM, modrm_req: true, ..OpCode::default() },
    ]
}

/// The opcode lookup tables, built once and read-only afterwards.
pub struct OpTable {
    opcodes: HashMap<u8, OpCode>,
    opcodes_ext: HashMap<u8, HashMap<u8, OpCode>>,
    opcodes_prefixed: HashMap<u8, OpCode>,
    prefixes: HashMap<u8, Prefix>,
}

impl Default for OpTable {
    fn default() -> Self {
        Self::new()
    }
}

impl OpTable {
    /// Installs every record into exactly one of the three opcode maps.
    pub fn new() -> Self {
        let mut table = OpTable {
            opcodes: HashMap::new(),
            opcodes_ext: HashMap::new(),
            opcodes_prefixed: HashMap::new(),
            prefixes: HashMap::new(),
        };
        table.prefixes.insert(ESCAPE.literal, ESCAPE);
        table.prefixes.insert(REPNE.literal, REPNE);

        for op in all_ops() {
            if op.ext_req {
                table
                    .opcodes_ext
                    .entry(op.literal)
                    .or_insert_with(HashMap::new)
                    .insert(op.extension, op);
            } else if op.prefix_req {
                table.opcodes_prefixed.insert(op.literal, op);
            } else if op.encoding == Encoding::O || op.encoding == Encoding::OI {
                // register-in-opcode: the record covers a run of 8
                // consecutive bytes, low 3 bits select the register
                for b in op.literal..=op.literal + 7 {
                    table.opcodes.insert(b, op);
                }
            } else {
                table.opcodes.insert(op.literal, op);
            }
        }
        table
    }

    /// Classifies the next byte and resolves it to an opcode record.
    ///
    /// Returns the record, the prefix if one was consumed, and the
    /// primary opcode byte. Unknown bytes and bad extension slots come
    /// back as `Db` errors carrying the byte the sweep should record.
    pub fn get_next(
        &self,
        stream: &mut ByteStream,
    ) -> Result<(OpCode, Option<Prefix>, u8), DecodeError> {
        let next = match stream.read_u8() {
            Some(b) => b,
            None => return Err(DecodeError::Eof),
        };

        let prefix = match self.prefixes.get(&next) {
            Some(prefix) => *prefix,
            None => {
                // not a prefix: the extension table outranks the plain one
                match self.get_extended(next, stream) {
                    Ok(op) => return Ok((op, None, next)),
                    Err(DecodeError::OpNotFound) => {}
                    Err(err) => return Err(err),
                }
                return match self.opcodes.get(&next) {
                    Some(op) => Ok((*op, None, next)),
                    None => Err(DecodeError::Db(next)),
                };
            }
        };

        let code = match stream.read_u8() {
            Some(b) => b,
            None => return Err(DecodeError::UnexpectedEof),
        };

        match prefix.literal {
            0x0F => {
                if let Some(op) = self.opcodes_prefixed.get(&code) {
                    return Ok((*op, Some(prefix), code));
                }
                if code == 0xAE {
                    // clflush is a chimera: escape-prefixed, yet
                    // resolved through the extension table
                    let op = self.get_extended(code, stream)?;
                    return Ok((op, Some(prefix), code));
                }
                stream.unread_byte();
                Err(DecodeError::Db(prefix.literal))
            }
            0xF2 => match self.opcodes.get(&code) {
                Some(op) => Ok((*op, Some(prefix), code)),
                None => Err(DecodeError::Db(code)),
            },
            _ => {
                stream.unread_byte();
                Err(DecodeError::Db(prefix.literal))
            }
        }
    }

    /// Speculatively reads the ModR/M byte to resolve an
    /// extension-bearing opcode, always putting the byte back so the
    /// encoder (or the recovery path) reparses it.
    ///
    /// `OpNotFound` means the opcode has no extension table at all;
    /// `Db` means it has one but the reg slot is empty.
    fn get_extended(&self, opcode: u8, stream: &mut ByteStream) -> Result<OpCode, DecodeError> {
        let ext_map = match self.opcodes_ext.get(&opcode) {
            Some(map) => map,
            None => return Err(DecodeError::OpNotFound),
        };

        let modrm_byte = match stream.read_u8() {
            Some(b) => b,
            None => return Err(DecodeError::UnexpectedEof),
        };
        let modrm = ModRegRm::parse(modrm_byte);
        stream.unread_byte();

        match ext_map.get(&modrm.reg) {
            Some(op) => Ok(*op),
            None => Err(DecodeError::Db(opcode)),
        }
    }
}
