use pretty_assertions::assert_eq;

use crate::disasm::ByteStream;

#[test]
fn reads_bytes_in_order() {
    let mut stream = ByteStream::new(&[0x01, 0x02]);
    assert_eq!(Some(0x01), stream.read_u8());
    assert_eq!(Some(0x02), stream.read_u8());
    assert_eq!(None, stream.read_u8());
}

#[test]
fn unread_steps_back_one_byte() {
    let mut stream = ByteStream::new(&[0x0F, 0xAE]);
    assert_eq!(Some(0x0F), stream.read_u8());
    assert_eq!(Some(0xAE), stream.read_u8());
    stream.unread_byte();
    assert_eq!(Some(0xAE), stream.read_u8());
}

#[test]
fn next_bytes_is_short_at_end_of_input() {
    let mut stream = ByteStream::new(&[0x11, 0x22, 0x33]);
    assert_eq!(&[0x11, 0x22][..], stream.next_bytes(2));
    assert_eq!(&[0x33][..], stream.next_bytes(4));
    assert_eq!(0, stream.next_bytes(4).len());
}
