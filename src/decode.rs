use log::debug;

use crate::error::{Error, Result};
use crate::instruction::{Instruction, Mnemonic, Operand, ALU_OPS, CONDITIONAL_JUMPS};
use crate::register::{Register, Width};
use crate::stream::ByteStream;

pub fn disassemble(program: &[u8]) -> Result<String> {
  let mut lines = vec!["bits 16".to_string()];
  for instruction in decode_all(program, 0)? {
    lines.push(instruction.to_string());
  }
  lines.push("".to_string());
  Ok(lines.join("\n"))
}

/// Decodes every instruction from `origin` to the end of `program`, in order.
pub fn decode_all(program: &[u8], origin: usize) -> Result<Vec<Instruction>> {
  let mut stream = ByteStream::at(program, origin);
  let mut instructions = Vec::new();
  while !stream.at_end() {
    instructions.push(decode(&mut stream)?);
  }
  Ok(instructions)
}

/// Instruction families, each with its own operand layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
  /// `100010dw` and `00ooo0dw`: r/m to/from register.
  RegMemWithReg(Option<Mnemonic>),
  /// `1100011w`: immediate to r/m.
  MovImmToRegMem,
  /// `1011wreg`
  MovImmToReg,
  MovMemToAcc,
  MovAccToMem,
  MovRegMemToSeg,
  MovSegToRegMem,
  /// `00ooo10w`
  AluImmToAcc,
  /// `100000sw`, op in the `reg` field.
  AluImmToRegMem,
  TestRegMemWithReg,
  TestImmToAcc,
  /// `1111011w`: test/not/neg by `reg` field.
  Unary,
  /// `1111111w`: inc/dec by `reg` field.
  IncDecRegMem,
  IncDecReg(Mnemonic),
  ConditionalJump,
  Jump8(Mnemonic),
  Jump16(Mnemonic),
  Bare(Mnemonic),
}

#[derive(Debug, Clone, Copy)]
struct Row {
  mask: u8,
  pattern: u8,
  family: Family,
}

const fn row(mask: u8, pattern: u8, family: Family) -> Row {
  Row {
    mask,
    pattern,
    family,
  }
}

const TABLE: &[Row] = &[
  row(0b1111_1100, 0b100010_00, Family::RegMemWithReg(Some(Mnemonic::Mov))),
  row(0b1111_1110, 0b1100011_0, Family::MovImmToRegMem),
  row(0b1111_0000, 0b1011_0000, Family::MovImmToReg),
  row(0b1111_1110, 0b1010000_0, Family::MovMemToAcc),
  row(0b1111_1110, 0b1010001_0, Family::MovAccToMem),
  row(0b1111_1111, 0b10001110, Family::MovRegMemToSeg),
  row(0b1111_1111, 0b10001100, Family::MovSegToRegMem),
  row(0b1100_0100, 0b00_000_0_00, Family::RegMemWithReg(None)),
  row(0b1100_0110, 0b00_000_10_0, Family::AluImmToAcc),
  row(0b1111_1100, 0b100000_00, Family::AluImmToRegMem),
  row(0b1111_1110, 0b1000010_0, Family::TestRegMemWithReg),
  row(0b1111_1110, 0b1010100_0, Family::TestImmToAcc),
  row(0b1111_1110, 0b1111011_0, Family::Unary),
  row(0b1111_1110, 0b1111111_0, Family::IncDecRegMem),
  row(0b1111_1000, 0b01000_000, Family::IncDecReg(Mnemonic::Inc)),
  row(0b1111_1000, 0b01001_000, Family::IncDecReg(Mnemonic::Dec)),
  row(0b1111_0000, 0b0111_0000, Family::ConditionalJump),
  row(0xff, 0xe0, Family::Jump8(Mnemonic::Loopnz)),
  row(0xff, 0xe1, Family::Jump8(Mnemonic::Loopz)),
  row(0xff, 0xe2, Family::Jump8(Mnemonic::Loop)),
  row(0xff, 0xe3, Family::Jump8(Mnemonic::Jcxz)),
  row(0xff, 0xeb, Family::Jump8(Mnemonic::Jmp)),
  row(0xff, 0xe9, Family::Jump16(Mnemonic::Jmp)),
  row(0xff, 0xf8, Family::Bare(Mnemonic::Clc)),
  row(0xff, 0xf9, Family::Bare(Mnemonic::Stc)),
  row(0xff, 0xf5, Family::Bare(Mnemonic::Cmc)),
  row(0xff, 0xfa, Family::Bare(Mnemonic::Cli)),
  row(0xff, 0xfb, Family::Bare(Mnemonic::Sti)),
  row(0xff, 0xfc, Family::Bare(Mnemonic::Cld)),
  row(0xff, 0xfd, Family::Bare(Mnemonic::Std)),
  row(0xff, 0x9f, Family::Bare(Mnemonic::Lahf)),
  row(0xff, 0x9e, Family::Bare(Mnemonic::Sahf)),
  row(0xff, 0x90, Family::Bare(Mnemonic::Nop)),
  row(0xff, 0xf4, Family::Bare(Mnemonic::Hlt)),
];

fn lookup(opcode: u8) -> Option<Family> {
  TABLE
    .iter()
    .find(|row| opcode & row.mask == row.pattern)
    .map(|row| row.family)
}

/// Base/index pairs for `rm` when `mod` != 11.
const EFFECTIVE_ADDRESS: [(Option<Register>, Option<Register>); 8] = [
  (Some(Register::Bx), Some(Register::Si)),
  (Some(Register::Bx), Some(Register::Di)),
  (Some(Register::Bp), Some(Register::Si)),
  (Some(Register::Bp), Some(Register::Di)),
  (Some(Register::Si), None),
  (Some(Register::Di), None),
  (Some(Register::Bp), None),
  (Some(Register::Bx), None),
];

#[derive(Debug, Clone, Copy)]
struct ModRm {
  r#mod: u8,
  reg: u8,
  rm: u8,
}

impl ModRm {
  fn read(stream: &mut ByteStream) -> Result<Self> {
    let byte = stream.read_u8()?;
    Ok(ModRm {
      r#mod: byte >> 6,
      reg: (byte >> 3) & 0b0000_0111,
      rm: byte & 0b0000_0111,
    })
  }

  fn reg_operand(self, width: Width) -> Operand {
    Operand::Register(Register::from_encoding(self.reg, width))
  }

  /// Reads any displacement bytes and builds the r/m operand.
  fn rm_operand(self, stream: &mut ByteStream, width: Width) -> Result<Operand> {
    let displacement = match (self.r#mod, self.rm) {
      (0b11, rm) => return Ok(Operand::Register(Register::from_encoding(rm, width))),
      (0b00, 0b110) => return Ok(direct(stream.read_u16()?, width)),
      (0b00, _) => 0,
      (0b01, _) => stream.read_i8()? as i16,
      _ => stream.read_u16()? as i16,
    };
    let (base, index) = EFFECTIVE_ADDRESS[self.rm as usize];
    Ok(Operand::Memory {
      base,
      index,
      displacement,
      width,
    })
  }
}

fn direct(address: u16, width: Width) -> Operand {
  Operand::Memory {
    base: None,
    index: None,
    displacement: address as i16,
    width,
  }
}

fn immediate(stream: &mut ByteStream, width: Width) -> Result<Operand> {
  let value = match width {
    Width::Byte => stream.read_u8()? as u16,
    Width::Word => stream.read_u16()?,
  };
  Ok(Operand::Immediate { value, width })
}

/// Decodes exactly one instruction at the stream's position.
pub fn decode(stream: &mut ByteStream) -> Result<Instruction> {
  let offset = stream.position();
  let opcode = stream.read_u8()?;
  let family = lookup(opcode).ok_or(Error::UnknownOpcode {
    offset,
    byte: opcode,
  })?;
  let unknown_extension = |extension: u8| Error::UnknownExtension {
    offset,
    byte: opcode,
    extension,
  };
  let w_bit_set = opcode & 0b0000_0001 == 1;
  let d_bit_set = (opcode >> 1) & 0b0000_0001 == 1;
  let width = Width::from_w_bit(w_bit_set);

  let (mnemonic, operands) = match family {
    Family::RegMemWithReg(mnemonic) => {
      let mnemonic = mnemonic.unwrap_or(ALU_OPS[((opcode >> 3) & 0b111) as usize]);
      let modrm = ModRm::read(stream)?;
      let reg = modrm.reg_operand(width);
      let rm = modrm.rm_operand(stream, width)?;
      if d_bit_set {
        (mnemonic, vec![reg, rm])
      } else {
        (mnemonic, vec![rm, reg])
      }
    }
    Family::MovImmToRegMem => {
      let modrm = ModRm::read(stream)?;
      if modrm.reg != 0b000 {
        return Err(unknown_extension(modrm.reg));
      }
      let rm = modrm.rm_operand(stream, width)?;
      (Mnemonic::Mov, vec![rm, immediate(stream, width)?])
    }
    Family::MovImmToReg => {
      let width = Width::from_w_bit((opcode >> 3) & 0b1 == 1);
      let reg = Operand::Register(Register::from_encoding(opcode, width));
      (Mnemonic::Mov, vec![reg, immediate(stream, width)?])
    }
    Family::MovMemToAcc => {
      let address = stream.read_u16()?;
      let acc = Operand::Register(Register::accumulator(width));
      (Mnemonic::Mov, vec![acc, direct(address, width)])
    }
    Family::MovAccToMem => {
      let address = stream.read_u16()?;
      let acc = Operand::Register(Register::accumulator(width));
      (Mnemonic::Mov, vec![direct(address, width), acc])
    }
    Family::MovRegMemToSeg | Family::MovSegToRegMem => {
      let modrm = ModRm::read(stream)?;
      if modrm.reg & 0b100 != 0 {
        return Err(unknown_extension(modrm.reg));
      }
      let segment = Operand::Register(Register::segment(modrm.reg));
      let rm = modrm.rm_operand(stream, Width::Word)?;
      if family == Family::MovRegMemToSeg {
        (Mnemonic::Mov, vec![segment, rm])
      } else {
        (Mnemonic::Mov, vec![rm, segment])
      }
    }
    Family::AluImmToAcc => {
      let mnemonic = ALU_OPS[((opcode >> 3) & 0b111) as usize];
      let acc = Operand::Register(Register::accumulator(width));
      (mnemonic, vec![acc, immediate(stream, width)?])
    }
    Family::AluImmToRegMem => {
      let modrm = ModRm::read(stream)?;
      let rm = modrm.rm_operand(stream, width)?;
      let s_bit_set = d_bit_set;
      let imm = match width {
        Width::Word if s_bit_set => Operand::Immediate {
          value: stream.read_i8()? as i16 as u16,
          width,
        },
        _ => immediate(stream, width)?,
      };
      (ALU_OPS[modrm.reg as usize], vec![rm, imm])
    }
    Family::TestRegMemWithReg => {
      let modrm = ModRm::read(stream)?;
      let reg = modrm.reg_operand(width);
      let rm = modrm.rm_operand(stream, width)?;
      (Mnemonic::Test, vec![rm, reg])
    }
    Family::TestImmToAcc => {
      let acc = Operand::Register(Register::accumulator(width));
      (Mnemonic::Test, vec![acc, immediate(stream, width)?])
    }
    Family::Unary => {
      let modrm = ModRm::read(stream)?;
      let mnemonic = match modrm.reg {
        0b000 => Mnemonic::Test,
        0b010 => Mnemonic::Not,
        0b011 => Mnemonic::Neg,
        other => return Err(unknown_extension(other)),
      };
      let rm = modrm.rm_operand(stream, width)?;
      if mnemonic == Mnemonic::Test {
        (mnemonic, vec![rm, immediate(stream, width)?])
      } else {
        (mnemonic, vec![rm])
      }
    }
    Family::IncDecRegMem => {
      let modrm = ModRm::read(stream)?;
      let mnemonic = match modrm.reg {
        0b000 => Mnemonic::Inc,
        0b001 => Mnemonic::Dec,
        other => return Err(unknown_extension(other)),
      };
      (mnemonic, vec![modrm.rm_operand(stream, width)?])
    }
    Family::IncDecReg(mnemonic) => (
      mnemonic,
      vec![Operand::Register(Register::from_encoding(opcode, Width::Word))],
    ),
    Family::ConditionalJump => {
      let mnemonic = CONDITIONAL_JUMPS[(opcode & 0b1111) as usize];
      (mnemonic, vec![Operand::Relative(stream.read_i8()? as i16)])
    }
    Family::Jump8(mnemonic) => (mnemonic, vec![Operand::Relative(stream.read_i8()? as i16)]),
    Family::Jump16(mnemonic) => (
      mnemonic,
      vec![Operand::Relative(stream.read_u16()? as i16)],
    ),
    Family::Bare(mnemonic) => (mnemonic, vec![]),
  };

  let instruction = Instruction {
    offset,
    mnemonic,
    operands,
    raw: stream.consumed_since(offset).to_vec(),
  };
  debug!("{offset:#06x}: {instruction}");
  Ok(instruction)
}
