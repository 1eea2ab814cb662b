//! CSV reading and writing of the block master table.

mod read;
mod write;

pub(crate) use read::*;
pub(crate) use write::*;
