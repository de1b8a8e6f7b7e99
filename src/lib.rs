//! Intel 8086 decoder and instruction-level simulator.
//!
//! Bytes flow from a [`ByteStream`] through [`decode()`] into an
//! [`Instruction`], whose operands are resolved against a [`CpuState`] and
//! applied by [`execute()`]. [`Simulator`] drives that loop.

pub mod cpu;
pub mod decode;
pub mod error;
pub mod execute;
pub mod instruction;
pub mod register;
pub mod resolve;
pub mod sim;
pub mod stream;

pub use cpu::{CpuState, Flags};
pub use decode::{decode, decode_all, disassemble};
pub use error::{Error, Result};
pub use execute::{execute, Flow};
pub use instruction::{Instruction, Mnemonic, Operand};
pub use register::{Register, Width};
pub use resolve::{resolve, Location, Resolved};
pub use sim::{simulate, Halt, SimConfig, Simulator, Step};
pub use stream::ByteStream;
