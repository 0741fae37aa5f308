use crate::disasm::error::DecodeError;
use crate::disasm::instruction::{
    bytes_to_int_signed, parse_displacement, parse_immediate, stringify_integer_bytes,
    stringify_rm, Instruction, ModRegRm,
};
use crate::disasm::register::r32;
use crate::disasm::stream::ByteStream;

#[cfg(test)]
#[path = "./encoding_test.rs"]
mod encoding_test;

/// The ten operand-encoding kinds. Each kind knows which auxiliary
/// bytes follow the opcode and how to render the operands.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Encoding {
    M,
    MI,
    MR,
    RM,
    RMI,
    NP,
    O,
    I,
    OI,
    D,
}

impl Encoding {
    /// Advances the stream past the bytes this encoding calls for and
    /// fills the instruction's modrm/displacement/immediate/literal.
    pub fn consume(
        &self,
        stream: &mut ByteStream,
        inst: &mut Instruction,
    ) -> Result<(), DecodeError> {
        match *self {
            // M, MR and RM share the same byte consumption and only
            // diverge in how they render
            Encoding::M | Encoding::MR | Encoding::RM => consume_modrm(stream, inst),
            Encoding::MI | Encoding::RMI => {
                consume_modrm(stream, inst)?;
                consume_immediate(stream, inst, 4)
            }
            Encoding::I => {
                let size = inst.imm_size;
                consume_immediate(stream, inst, size)
            }
            // register lives in the opcode byte; only the immediate follows
            Encoding::OI => consume_immediate(stream, inst, 4),
            Encoding::D => {
                let disp = parse_displacement(inst.modrm.as_ref(), stream, inst.disp_size)?;
                inst.literal.extend_from_slice(&disp);
                inst.displacement = disp;
                Ok(())
            }
            Encoding::NP | Encoding::O => Ok(()),
        }
    }

    /// Renders the operand string, plus the branch target for the D kind.
    pub fn stringify(&self, inst: &Instruction) -> Result<(String, Option<u32>), DecodeError> {
        match *self {
            Encoding::M => Ok((stringify_rm(inst.modrm.as_ref(), &inst.displacement), None)),
            Encoding::MI => {
                let rm = stringify_rm(inst.modrm.as_ref(), &inst.displacement);
                let imm = stringify_integer_bytes(&inst.immediate);
                Ok((format!("{}, {}", rm, imm), None))
            }
            Encoding::MR => {
                let m = modrm(inst)?;
                let rm = stringify_rm(Some(m), &inst.displacement);
                Ok((format!("{}, {}", rm, r32(m.reg).as_str()), None))
            }
            Encoding::RM => {
                let m = modrm(inst)?;
                let rm = stringify_rm(Some(m), &inst.displacement);
                Ok((format!("{}, {}", r32(m.reg).as_str(), rm), None))
            }
            Encoding::RMI => {
                let m = modrm(inst)?;
                let rm = stringify_rm(Some(m), &inst.displacement);
                let imm = stringify_integer_bytes(&inst.immediate);
                Ok((format!("{}, {}, {}", r32(m.reg).as_str(), rm, imm), None))
            }
            Encoding::NP => Ok((String::new(), None)),
            Encoding::O => Ok((r32(inst.opcode & 7).as_str().to_string(), None)),
            Encoding::I => Ok((stringify_integer_bytes(&inst.immediate), None)),
            Encoding::OI => {
                let reg = r32(inst.opcode & 7).as_str();
                let imm = stringify_integer_bytes(&inst.immediate);
                Ok((format!("{}, {}", reg, imm), None))
            }
            Encoding::D => {
                let start = inst.offset.wrapping_add(inst.literal.len() as u32);
                let disp = bytes_to_int_signed(&inst.displacement)?;
                let end = start.wrapping_add(disp as u32);
                Ok((format!("offset_{:08x}h", end), Some(end)))
            }
        }
    }
}

fn modrm(inst: &Instruction) -> Result<&ModRegRm, DecodeError> {
    inst.modrm.as_ref().ok_or(DecodeError::MissingModRm)
}

fn consume_modrm(stream: &mut ByteStream, inst: &mut Instruction) -> Result<(), DecodeError> {
    let b = stream.read_u8().ok_or(DecodeError::UnexpectedEof)?;
    inst.modrm = Some(ModRegRm::parse(b));
    inst.literal.push(b);

    let disp = parse_displacement(inst.modrm.as_ref(), stream, 0)?;
    inst.literal.extend_from_slice(&disp);
    inst.displacement = disp;
    Ok(())
}

fn consume_immediate(
    stream: &mut ByteStream,
    inst: &mut Instruction,
    size: usize,
) -> Result<(), DecodeError> {
    let imm = parse_immediate(stream, size)?;
    inst.literal.extend_from_slice(&imm);
    inst.immediate = imm;
    Ok(())
}
