use pretty_assertions::assert_eq;

use crate::disasm::encoding::Encoding;
use crate::disasm::error::DecodeError;
use crate::disasm::op::{OpTable, ESCAPE, REPNE};
use crate::disasm::stream::ByteStream;

#[test]
fn extension_bearing_opcodes_resolve_only_through_the_extension_table() {
    let table = OpTable::new();
    for literal in &[0x81, 0xFF, 0xAE, 0xF7, 0xC7, 0x8F, 0xD1] {
        assert!(table.opcodes_ext.contains_key(literal));
        assert!(!table.opcodes.contains_key(literal));
    }
    assert_eq!(7, table.opcodes_ext.len());
}

#[test]
fn the_85_byte_is_registered_twice_without_collision() {
    let table = OpTable::new();

    let plain = table.opcodes[&0x85];
    assert_eq!("test", plain.mnemonic);
    assert_eq!(Encoding::MR, plain.encoding);

    let prefixed = table.opcodes_prefixed[&0x85];
    assert_eq!("jnz", prefixed.mnemonic);
    assert_eq!(Encoding::D, prefixed.encoding);
    assert_eq!(4, prefixed.disp_size);
}

#[test]
fn register_in_opcode_records_cover_runs_of_eight() {
    let table = OpTable::new();
    let runs: &[(u8, &str)] = &[
        (0x40, "inc"),
        (0x48, "dec"),
        (0x50, "push"),
        (0x58, "pop"),
        (0xB8, "mov"),
    ];
    for &(base, mnemonic) in runs {
        for b in base..=base + 7 {
            let op = table.opcodes[&b];
            assert_eq!(mnemonic, op.mnemonic);
            assert_eq!(base, op.literal);
        }
    }
}

#[test]
fn resolves_a_plain_opcode() {
    let table = OpTable::new();
    let mut stream = ByteStream::new(&[0x90]);
    let (op, prefix, literal) = table.get_next(&mut stream).unwrap();
    assert_eq!("nop", op.mnemonic);
    assert_eq!(None, prefix);
    assert_eq!(0x90, literal);
}

#[test]
fn resolves_an_escape_prefixed_opcode() {
    let table = OpTable::new();
    let mut stream = ByteStream::new(&[0x0F, 0xAF, 0xC3]);
    let (op, prefix, literal) = table.get_next(&mut stream).unwrap();
    assert_eq!("imul", op.mnemonic);
    assert_eq!(Some(ESCAPE), prefix);
    assert_eq!(0xAF, literal);
    // the modrm byte is still unconsumed for the encoder
    assert_eq!(Some(0xC3), stream.read_u8());
}

#[test]
fn resolves_clflush_through_the_prefixed_extension_path() {
    let table = OpTable::new();
    let mut stream = ByteStream::new(&[0x0F, 0xAE, 0xF8]);
    let (op, prefix, literal) = table.get_next(&mut stream).unwrap();
    assert_eq!("clflush", op.mnemonic);
    assert_eq!(Some(ESCAPE), prefix);
    assert_eq!(0xAE, literal);
    // the probed modrm byte was unread
    assert_eq!(Some(0xF8), stream.read_u8());
}

#[test]
fn escape_miss_unreads_the_second_byte() {
    let table = OpTable::new();
    let mut stream = ByteStream::new(&[0x0F, 0x06]);
    assert_eq!(Err(DecodeError::Db(0x0F)), table.get_next(&mut stream));
    assert_eq!(Some(0x06), stream.read_u8());
}

#[test]
fn repne_resolves_through_the_plain_table() {
    let table = OpTable::new();
    let mut stream = ByteStream::new(&[0xF2, 0xA5]);
    let (op, prefix, literal) = table.get_next(&mut stream).unwrap();
    assert_eq!("movsd", op.mnemonic);
    assert_eq!(Some(REPNE), prefix);
    assert_eq!(0xA5, literal);
}

#[test]
fn repne_miss_keeps_the_prefix_consumed() {
    let table = OpTable::new();
    let mut stream = ByteStream::new(&[0xF2, 0x06, 0x90]);
    assert_eq!(Err(DecodeError::Db(0x06)), table.get_next(&mut stream));
    // both bytes are gone; decode continues after them
    assert_eq!(Some(0x90), stream.read_u8());
}

#[test]
fn extension_resolution_keys_on_the_reg_field() {
    let table = OpTable::new();

    let mut stream = ByteStream::new(&[0x81, 0xC0]);
    let (op, _, _) = table.get_next(&mut stream).unwrap();
    assert_eq!("add", op.mnemonic); // reg=0
    assert_eq!(Some(0xC0), stream.read_u8());

    let mut stream = ByteStream::new(&[0xF7, 0xD8]);
    let (op, _, _) = table.get_next(&mut stream).unwrap();
    assert_eq!("neg", op.mnemonic); // reg=3

    let mut stream = ByteStream::new(&[0xFF, 0xE0]);
    let (op, _, _) = table.get_next(&mut stream).unwrap();
    assert_eq!("jmp", op.mnemonic); // reg=4
}

#[test]
fn empty_extension_slot_surfaces_as_db_and_unreads_the_modrm() {
    let table = OpTable::new();
    // 0xD1 has no record under reg=1
    let mut stream = ByteStream::new(&[0xD1, 0xC8]);
    assert_eq!(Err(DecodeError::Db(0xD1)), table.get_next(&mut stream));
    assert_eq!(Some(0xC8), stream.read_u8());
}

#[test]
fn unknown_byte_surfaces_as_db() {
    let table = OpTable::new();
    let mut stream = ByteStream::new(&[0x06]);
    assert_eq!(Err(DecodeError::Db(0x06)), table.get_next(&mut stream));
}

#[test]
fn end_of_input_is_reported_by_position() {
    let table = OpTable::new();

    let mut stream = ByteStream::new(&[]);
    assert_eq!(Err(DecodeError::Eof), table.get_next(&mut stream));

    // after a prefix
    let mut stream = ByteStream::new(&[0x0F]);
    assert_eq!(Err(DecodeError::UnexpectedEof), table.get_next(&mut stream));

    // at the probed modrm of an extension-bearing opcode
    let mut stream = ByteStream::new(&[0x81]);
    assert_eq!(Err(DecodeError::UnexpectedEof), table.get_next(&mut stream));
}
