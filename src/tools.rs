use std::fs::File;
use std::io::{Error, Read};

/// reads a binary file into a byte vector
pub fn read_binary(path: &str) -> Result<Vec<u8>, Error> {
    let mut buffer: Vec<u8> = Vec::new();
    File::open(path)?.read_to_end(&mut buffer)?;
    Ok(buffer)
}
