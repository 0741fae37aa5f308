#[macro_use]
extern crate quick_error;

#[cfg(test)]
extern crate pretty_assertions;

pub mod disasm;
pub mod hex;
pub mod tools;
