use std::fmt;

use crate::disasm::error::DecodeError;
use crate::disasm::register::{r32, R};
use crate::disasm::stream::ByteStream;
use crate::hex::hex_bytes_separated;

#[cfg(test)]
#[path = "./instruction_test.rs"]
mod instruction_test;

/// ModR/M addressing modes, from bits [7:6] of the byte.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum AddressMode {
    /// mod=00: indirect register, except rm=EBP which is a bare disp32
    Reg,
    /// mod=01: [reg + disp8]
    Byte,
    /// mod=10: [reg + disp32]
    Dword,
    /// mod=11: bare register, no memory operand
    Direct,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ModRegRm {
    pub literal: u8,
    /// "mod" is the correct name, but is a reserved keyword
    pub md: AddressMode,
    pub reg: u8,
    pub rm: u8,
}

impl ModRegRm {
    pub fn parse(literal: u8) -> Self {
        let md = match (literal >> 6) & 3 {
            0 => AddressMode::Reg,
            1 => AddressMode::Byte,
            2 => AddressMode::Dword,
            _ => AddressMode::Direct,
        };
        ModRegRm {
            literal,
            md,
            reg: (literal >> 3) & 7,
            rm: literal & 7,
        }
    }
}

/// Prefix byte ahead of the opcode.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Prefix {
    pub literal: u8,
    pub mnemonic: &'static str,
}

/// Decode result at a given offset. Displacement and immediate are kept
/// as the little-endian bytes consumed from the stream.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Instruction {
    pub offset: u32,
    /// raw bytes consumed, in order: prefix, opcode, modrm, disp, imm
    pub literal: Vec<u8>,
    /// label attached when another instruction branches here; empty = none
    pub label: String,
    pub prefix: Option<Prefix>,
    pub mnemonic: String,
    pub opcode: u8,
    pub modrm: Option<ModRegRm>,
    pub displacement: Vec<u8>,
    pub immediate: Vec<u8>,
    pub disp_size: usize,
    pub imm_size: usize,
    pub operands: String,
}

impl Instruction {
    /// assembles the textual instruction: prefix mnemonic, then either
    /// the `%s` placeholder substituted with the operands, or
    /// mnemonic and operands appended
    pub fn asm(&self) -> String {
        let mut asm = String::new();
        if let Some(pre) = &self.prefix {
            if !pre.mnemonic.is_empty() {
                asm.push_str(pre.mnemonic);
                asm.push(' ');
            }
        }
        if self.mnemonic.contains("%s") {
            asm.push_str(&self.mnemonic.replacen("%s", &self.operands, 1));
        } else {
            asm.push_str(&self.mnemonic);
            asm.push(' ');
            asm.push_str(&self.operands);
        }
        asm
    }

    /// clflush and lea require a memory operand
    pub fn comment(&self) -> &'static str {
        match (self.mnemonic.as_str(), &self.modrm) {
            ("clflush", Some(m)) | ("lea", Some(m)) if m.md == AddressMode::Direct => {
                "; Illegal addressing mode."
            }
            _ => "",
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{:08x}:\t{}\t{}\t{}",
            self.offset,
            hex_bytes_separated(&self.literal, ' '),
            self.asm(),
            self.comment()
        )
    }
}

/// Consumes the displacement bytes called for by the addressing mode,
/// or exactly `fallback` bytes when there is no ModR/M (relative
/// branch displacements).
pub fn parse_displacement(
    modrm: Option<&ModRegRm>,
    stream: &mut ByteStream,
    fallback: usize,
) -> Result<Vec<u8>, DecodeError> {
    let want = match modrm {
        Some(m) => match m.md {
            AddressMode::Reg => {
                if r32(m.rm) == R::EBP {
                    4
                } else {
                    0
                }
            }
            AddressMode::Byte => 1,
            AddressMode::Dword => 4,
            AddressMode::Direct => 0,
        },
        None => fallback,
    };
    parse_immediate(stream, want)
}

/// Consumes exactly `size` bytes.
pub fn parse_immediate(stream: &mut ByteStream, size: usize) -> Result<Vec<u8>, DecodeError> {
    let bytes = stream.next_bytes(size);
    if bytes.len() != size {
        return Err(DecodeError::UnexpectedEof);
    }
    Ok(bytes.to_vec())
}

/// Little-endian byte slice to the unsigned integer it represents.
pub fn bytes_to_int(bytes: &[u8]) -> Result<u32, DecodeError> {
    match bytes.len() {
        1 => Ok(u32::from(bytes[0])),
        2 => Ok(u32::from(u16::from_le_bytes([bytes[0], bytes[1]]))),
        4 => Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])),
        n => Err(DecodeError::BadIntegerWidth(n)),
    }
}

/// Little-endian byte slice to the signed (two's-complement) integer
/// it represents.
pub fn bytes_to_int_signed(bytes: &[u8]) -> Result<i32, DecodeError> {
    match bytes.len() {
        1 => Ok(i32::from(bytes[0] as i8)),
        2 => Ok(i32::from(i16::from_le_bytes([bytes[0], bytes[1]]))),
        4 => Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])),
        n => Err(DecodeError::BadIntegerWidth(n)),
    }
}

/// Hex with fixed zero-padding, regardless of the source width.
pub fn stringify_integer(val: u32) -> String {
    format!("0x{:08x}", val)
}

pub fn stringify_integer_bytes(bytes: &[u8]) -> String {
    match bytes_to_int(bytes) {
        Ok(val) => stringify_integer(val),
        Err(_) => String::new(),
    }
}

/// Renders the rm side of a ModR/M operand for its addressing mode.
pub fn stringify_rm(modrm: Option<&ModRegRm>, disp: &[u8]) -> String {
    let m = match modrm {
        Some(m) => m,
        None => return String::new(),
    };
    let rm = r32(m.rm).as_str();

    match m.md {
        AddressMode::Reg => {
            if r32(m.rm) == R::EBP {
                // no base register: bare 32-bit absolute displacement
                format!("[ {} ]", stringify_integer_bytes(disp))
            } else {
                format!("[ {} ]", rm)
            }
        }
        AddressMode::Byte | AddressMode::Dword => {
            format!("[ {}+{} ]", rm, stringify_integer_bytes(disp))
        }
        AddressMode::Direct => rm.to_string(),
    }
}
