use std::fmt;

use crate::register::{Register, Width};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mnemonic {
  Mov,
  Add,
  Or,
  Adc,
  Sbb,
  And,
  Sub,
  Xor,
  Cmp,
  Test,
  Not,
  Neg,
  Inc,
  Dec,
  Jo,
  Jno,
  Jb,
  Jnb,
  Je,
  Jne,
  Jbe,
  Ja,
  Js,
  Jns,
  Jp,
  Jnp,
  Jl,
  Jnl,
  Jle,
  Jg,
  Loopnz,
  Loopz,
  Loop,
  Jcxz,
  Jmp,
  Clc,
  Stc,
  Cmc,
  Cli,
  Sti,
  Cld,
  Std,
  Lahf,
  Sahf,
  Nop,
  Hlt,
}

/// The eight ALU operations selected by bits 5..3 of the opcode or by the
/// `reg` field of the `100000sw` immediate group.
pub const ALU_OPS: [Mnemonic; 8] = [
  Mnemonic::Add,
  Mnemonic::Or,
  Mnemonic::Adc,
  Mnemonic::Sbb,
  Mnemonic::And,
  Mnemonic::Sub,
  Mnemonic::Xor,
  Mnemonic::Cmp,
];

/// Conditional jumps in `0111cccc` order.
pub const CONDITIONAL_JUMPS: [Mnemonic; 16] = [
  Mnemonic::Jo,
  Mnemonic::Jno,
  Mnemonic::Jb,
  Mnemonic::Jnb,
  Mnemonic::Je,
  Mnemonic::Jne,
  Mnemonic::Jbe,
  Mnemonic::Ja,
  Mnemonic::Js,
  Mnemonic::Jns,
  Mnemonic::Jp,
  Mnemonic::Jnp,
  Mnemonic::Jl,
  Mnemonic::Jnl,
  Mnemonic::Jle,
  Mnemonic::Jg,
];

impl Mnemonic {
  pub fn name(self) -> &'static str {
    use Mnemonic::*;
    match self {
      Mov => "mov",
      Add => "add",
      Or => "or",
      Adc => "adc",
      Sbb => "sbb",
      And => "and",
      Sub => "sub",
      Xor => "xor",
      Cmp => "cmp",
      Test => "test",
      Not => "not",
      Neg => "neg",
      Inc => "inc",
      Dec => "dec",
      Jo => "jo",
      Jno => "jno",
      Jb => "jb",
      Jnb => "jnb",
      Je => "je",
      Jne => "jne",
      Jbe => "jbe",
      Ja => "ja",
      Js => "js",
      Jns => "jns",
      Jp => "jp",
      Jnp => "jnp",
      Jl => "jl",
      Jnl => "jnl",
      Jle => "jle",
      Jg => "jg",
      Loopnz => "loopnz",
      Loopz => "loopz",
      Loop => "loop",
      Jcxz => "jcxz",
      Jmp => "jmp",
      Clc => "clc",
      Stc => "stc",
      Cmc => "cmc",
      Cli => "cli",
      Sti => "sti",
      Cld => "cld",
      Std => "std",
      Lahf => "lahf",
      Sahf => "sahf",
      Nop => "nop",
      Hlt => "hlt",
    }
  }
}

impl fmt::Display for Mnemonic {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
  Register(Register),
  /// `[base + index + displacement]`; with neither register the displacement
  /// is a direct address.
  Memory {
    base: Option<Register>,
    index: Option<Register>,
    displacement: i16,
    width: Width,
  },
  Immediate { value: u16, width: Width },
  /// Jump displacement relative to the next instruction.
  Relative(i16),
}

impl Operand {
  fn fmt_memory(
    f: &mut fmt::Formatter<'_>,
    base: Option<Register>,
    index: Option<Register>,
    displacement: i16,
  ) -> fmt::Result {
    let terms: Vec<&str> = base.iter().chain(index.iter()).map(|reg| reg.name()).collect();
    if terms.is_empty() {
      return write!(f, "[{}]", displacement as u16);
    }
    write!(f, "[{}", terms.join(" + "))?;
    match displacement {
      0 => {}
      d if d < 0 => write!(f, " - {}", (d as i32).unsigned_abs())?,
      d => write!(f, " + {d}")?,
    }
    f.write_str("]")
  }
}

impl fmt::Display for Operand {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match *self {
      Operand::Register(reg) => write!(f, "{reg}"),
      Operand::Memory {
        base,
        index,
        displacement,
        ..
      } => Operand::fmt_memory(f, base, index, displacement),
      Operand::Immediate { value, width } => match width {
        Width::Byte => write!(f, "{}", value as u8 as i8),
        Width::Word => write!(f, "{}", value as i16),
      },
      Operand::Relative(displacement) => write!(f, "{displacement:+}"),
    }
  }
}

/// One decoded instruction. `raw` holds exactly the bytes it was decoded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
  pub offset: usize,
  pub mnemonic: Mnemonic,
  pub operands: Vec<Operand>,
  pub raw: Vec<u8>,
}

impl Instruction {
  pub fn len(&self) -> usize {
    self.raw.len()
  }

  pub fn is_empty(&self) -> bool {
    self.raw.is_empty()
  }

  /// Address of the byte immediately after this instruction.
  pub fn next_ip(&self) -> u16 {
    (self.offset + self.len()) as u16
  }

  /// Memory operands only need an explicit size when no register operand
  /// implies one.
  fn needs_size_keyword(&self) -> bool {
    !self
      .operands
      .iter()
      .any(|operand| matches!(operand, Operand::Register(_)))
  }
}

impl fmt::Display for Instruction {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.mnemonic)?;
    let sized = self.needs_size_keyword();
    for (index, operand) in self.operands.iter().enumerate() {
      f.write_str(if index == 0 { " " } else { ", " })?;
      match operand {
        Operand::Memory { width, .. } if sized => write!(f, "{} {operand}", width.keyword())?,
        Operand::Relative(displacement) => {
          // nasm's `$` is the start of the current instruction
          let from_start = *displacement as i32 + self.len() as i32;
          write!(f, "${from_start:+}")?;
        }
        _ => write!(f, "{operand}")?,
      }
    }
    Ok(())
  }
}
