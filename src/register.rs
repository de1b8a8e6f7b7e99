use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Width {
  Byte,
  Word,
}

impl Width {
  pub fn from_w_bit(w_bit_set: bool) -> Self {
    if w_bit_set {
      Width::Word
    } else {
      Width::Byte
    }
  }

  pub fn mask(self) -> u16 {
    match self {
      Width::Byte => 0x00ff,
      Width::Word => 0xffff,
    }
  }

  pub fn sign_bit(self) -> u16 {
    match self {
      Width::Byte => 0x0080,
      Width::Word => 0x8000,
    }
  }

  pub fn keyword(self) -> &'static str {
    match self {
      Width::Byte => "byte",
      Width::Word => "word",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
  Ax,
  Cx,
  Dx,
  Bx,
  Sp,
  Bp,
  Si,
  Di,
  Al,
  Cl,
  Dl,
  Bl,
  Ah,
  Ch,
  Dh,
  Bh,
  Es,
  Cs,
  Ss,
  Ds,
}

/// Where a register's bits live in the register file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
  Word(usize),
  Low(usize),
  High(usize),
  Segment(usize),
}

/// General purpose registers in encoding order.
pub const GENERAL: [Register; 8] = [
  Register::Ax,
  Register::Cx,
  Register::Dx,
  Register::Bx,
  Register::Sp,
  Register::Bp,
  Register::Si,
  Register::Di,
];

pub const SEGMENT: [Register; 4] = [Register::Es, Register::Cs, Register::Ss, Register::Ds];

/// Order used by state dumps and step traces.
pub const DISPLAY_ORDER: [Register; 12] = [
  Register::Ax,
  Register::Bx,
  Register::Cx,
  Register::Dx,
  Register::Sp,
  Register::Bp,
  Register::Si,
  Register::Di,
  Register::Es,
  Register::Cs,
  Register::Ss,
  Register::Ds,
];

impl Register {
  /// Decodes a 3-bit `reg` or `rm` field.
  pub fn from_encoding(reg: u8, width: Width) -> Self {
    match (reg & 0b111, width) {
      (0b_000, Width::Byte) => Register::Al,
      (0b_001, Width::Byte) => Register::Cl,
      (0b_010, Width::Byte) => Register::Dl,
      (0b_011, Width::Byte) => Register::Bl,
      (0b_100, Width::Byte) => Register::Ah,
      (0b_101, Width::Byte) => Register::Ch,
      (0b_110, Width::Byte) => Register::Dh,
      (0b_111, Width::Byte) => Register::Bh,
      (index, Width::Word) => GENERAL[index as usize],
      _ => unreachable!(),
    }
  }

  /// Decodes the 2-bit segment register field (`sr`).
  pub fn segment(sr: u8) -> Self {
    SEGMENT[(sr & 0b11) as usize]
  }

  pub fn accumulator(width: Width) -> Self {
    match width {
      Width::Byte => Register::Al,
      Width::Word => Register::Ax,
    }
  }

  pub fn width(self) -> Width {
    match self.slot() {
      Slot::Low(_) | Slot::High(_) => Width::Byte,
      Slot::Word(_) | Slot::Segment(_) => Width::Word,
    }
  }

  pub fn slot(self) -> Slot {
    use Register::*;
    match self {
      Ax => Slot::Word(0),
      Cx => Slot::Word(1),
      Dx => Slot::Word(2),
      Bx => Slot::Word(3),
      Sp => Slot::Word(4),
      Bp => Slot::Word(5),
      Si => Slot::Word(6),
      Di => Slot::Word(7),
      Al => Slot::Low(0),
      Cl => Slot::Low(1),
      Dl => Slot::Low(2),
      Bl => Slot::Low(3),
      Ah => Slot::High(0),
      Ch => Slot::High(1),
      Dh => Slot::High(2),
      Bh => Slot::High(3),
      Es => Slot::Segment(0),
      Cs => Slot::Segment(1),
      Ss => Slot::Segment(2),
      Ds => Slot::Segment(3),
    }
  }

  /// The 16-bit register that holds this one.
  pub fn full(self) -> Register {
    match self.slot() {
      Slot::Word(index) | Slot::Low(index) | Slot::High(index) => GENERAL[index],
      Slot::Segment(index) => SEGMENT[index],
    }
  }

  pub fn name(self) -> &'static str {
    use Register::*;
    match self {
      Ax => "ax",
      Cx => "cx",
      Dx => "dx",
      Bx => "bx",
      Sp => "sp",
      Bp => "bp",
      Si => "si",
      Di => "di",
      Al => "al",
      Cl => "cl",
      Dl => "dl",
      Bl => "bl",
      Ah => "ah",
      Ch => "ch",
      Dh => "dh",
      Bh => "bh",
      Es => "es",
      Cs => "cs",
      Ss => "ss",
      Ds => "ds",
    }
  }
}

impl fmt::Display for Register {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}
