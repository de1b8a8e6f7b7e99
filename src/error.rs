use thiserror::Error;

use crate::instruction::Mnemonic;

pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can stop a decode or a simulation run.
///
/// Offsets are byte offsets into the program image, which is also the value
/// of `ip` for the instruction that failed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
  #[error("read of {wanted} byte(s) at offset {position:#06x} runs past the end of a {len}-byte image")]
  OutOfBounds {
    position: usize,
    wanted: usize,
    len: usize,
  },

  #[error("unknown opcode {byte:#04x} ({byte:08b}) at offset {offset:#06x}")]
  UnknownOpcode { offset: usize, byte: u8 },

  #[error("unknown extension /{extension} for opcode {byte:#04x} at offset {offset:#06x}")]
  UnknownExtension {
    offset: usize,
    byte: u8,
    extension: u8,
  },

  #[error("internal inconsistency: cannot execute `{mnemonic}` decoded at offset {offset:#06x}")]
  InternalInconsistency { offset: usize, mnemonic: Mnemonic },

  #[error("instruction limit of {limit} reached at ip {ip:#06x}")]
  InstructionLimit { limit: u64, ip: u16 },
}

impl Error {
  /// Byte offset the failure is attributed to.
  pub fn offset(&self) -> usize {
    match *self {
      Error::OutOfBounds { position, .. } => position,
      Error::UnknownOpcode { offset, .. }
      | Error::UnknownExtension { offset, .. }
      | Error::InternalInconsistency { offset, .. } => offset,
      Error::InstructionLimit { ip, .. } => ip as usize,
    }
  }

  pub fn is_unknown_opcode(&self) -> bool {
    matches!(
      self,
      Error::UnknownOpcode { .. } | Error::UnknownExtension { .. }
    )
  }
}
