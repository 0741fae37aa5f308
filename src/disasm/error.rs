quick_error! {
    #[derive(Debug, Clone, PartialEq)]
    pub enum DecodeError {
        // buffer exhausted cleanly at an instruction boundary
        Eof {
            display("EOF")
        }
        // buffer exhausted in the middle of an instruction
        UnexpectedEof {
            display("unexpected EOF")
        }
        // unknown opcode or bad extension slot; the display text
        // becomes the pseudo-instruction mnemonic
        Db(b: u8) {
            display("db {:02x}", b)
        }
        // in-band sentinel: the byte is not a key in the extension
        // table at all (never escapes dispatch)
        OpNotFound {
            display("op not found")
        }
        // stringifier asked for ModR/M fields that were never decoded
        MissingModRm {
            display("missing modrm byte")
        }
        BadIntegerWidth(len: usize) {
            display("invalid byte slice length for integer conversion: {}", len)
        }
    }
}
