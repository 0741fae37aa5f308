// these modules are re-exported as a single module

pub use self::decoder::*;
mod decoder;

pub use self::encoding::*;
mod encoding;

pub use self::error::*;
mod error;

pub use self::instruction::*;
mod instruction;

pub use self::listing::*;
mod listing;

pub use self::op::*;
mod op;

pub use self::register::*;
mod register;

pub use self::stream::*;
mod stream;
