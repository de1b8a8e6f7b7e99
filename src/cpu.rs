use std::fmt;

use bitflags::bitflags;

use crate::register::{Register, Slot, Width, DISPLAY_ORDER};

pub const MEMORY_SIZE: usize = 0x1_0000;

bitflags! {
  /// Status and control bits at their FLAGS register positions.
  #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
  pub struct Flags: u16 {
    const CARRY = 1 << 0;
    const PARITY = 1 << 2;
    const AUX_CARRY = 1 << 4;
    const ZERO = 1 << 6;
    const SIGN = 1 << 7;
    const TRAP = 1 << 8;
    const INTERRUPT = 1 << 9;
    const DIRECTION = 1 << 10;
    const OVERFLOW = 1 << 11;
  }
}

const FLAG_LETTERS: [(Flags, char); 9] = [
  (Flags::CARRY, 'C'),
  (Flags::PARITY, 'P'),
  (Flags::AUX_CARRY, 'A'),
  (Flags::ZERO, 'Z'),
  (Flags::SIGN, 'S'),
  (Flags::TRAP, 'T'),
  (Flags::INTERRUPT, 'I'),
  (Flags::DIRECTION, 'D'),
  (Flags::OVERFLOW, 'O'),
];

impl Flags {
  /// The six flags written by arithmetic.
  pub const STATUS: Flags = Flags::CARRY
    .union(Flags::PARITY)
    .union(Flags::AUX_CARRY)
    .union(Flags::ZERO)
    .union(Flags::SIGN)
    .union(Flags::OVERFLOW);

  /// Letters in C P A Z S T I D O order.
  pub fn letters(self) -> String {
    FLAG_LETTERS
      .iter()
      .filter(|(flag, _)| self.contains(*flag))
      .map(|(_, letter)| *letter)
      .collect()
  }
}

impl fmt::Display for Flags {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.is_empty() {
      f.write_str("-")
    } else {
      f.write_str(&self.letters())
    }
  }
}

/// Registers, flags and the 64 KiB address space of one run.
///
/// General registers are stored as eight 16-bit cells; the byte registers
/// are views onto the low and high halves of the first four.
#[derive(Clone)]
pub struct CpuState {
  general: [u16; 8],
  segment: [u16; 4],
  pub flags: Flags,
  pub ip: u16,
  memory: Box<[u8]>,
}

impl Default for CpuState {
  fn default() -> Self {
    CpuState {
      general: [0; 8],
      segment: [0; 4],
      flags: Flags::empty(),
      ip: 0,
      memory: vec![0; MEMORY_SIZE].into_boxed_slice(),
    }
  }
}

impl fmt::Debug for CpuState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CpuState")
      .field("general", &self.general)
      .field("segment", &self.segment)
      .field("flags", &self.flags)
      .field("ip", &self.ip)
      .finish_non_exhaustive()
  }
}

impl CpuState {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn reg(&self, reg: Register) -> u16 {
    match reg.slot() {
      Slot::Word(index) => self.general[index],
      Slot::Low(index) => self.general[index] & 0x00ff,
      Slot::High(index) => self.general[index] >> 8,
      Slot::Segment(index) => self.segment[index],
    }
  }

  /// Writes `value` truncated to the register's width. Byte writes leave the
  /// sibling half untouched.
  pub fn set_reg(&mut self, reg: Register, value: u16) {
    match reg.slot() {
      Slot::Word(index) => self.general[index] = value,
      Slot::Low(index) => {
        let cell = &mut self.general[index];
        *cell = (*cell & 0xff00) | (value & 0x00ff);
      }
      Slot::High(index) => {
        let cell = &mut self.general[index];
        *cell = (*cell & 0x00ff) | ((value & 0x00ff) << 8);
      }
      Slot::Segment(index) => self.segment[index] = value,
    }
  }

  pub fn flag(&self, flag: Flags) -> bool {
    self.flags.contains(flag)
  }

  pub fn read_u8(&self, address: u16) -> u8 {
    self.memory[address as usize]
  }

  pub fn write_u8(&mut self, address: u16, value: u8) {
    self.memory[address as usize] = value;
  }

  /// Little-endian; the high byte wraps from 0xffff to 0x0000. No alignment
  /// is required.
  pub fn read_u16(&self, address: u16) -> u16 {
    let low = self.read_u8(address);
    let high = self.read_u8(address.wrapping_add(1));
    u16::from_le_bytes([low, high])
  }

  pub fn write_u16(&mut self, address: u16, value: u16) {
    let [low, high] = value.to_le_bytes();
    self.write_u8(address, low);
    self.write_u8(address.wrapping_add(1), high);
  }

  pub fn read_memory(&self, address: u16, width: Width) -> u16 {
    match width {
      Width::Byte => self.read_u8(address) as u16,
      Width::Word => self.read_u16(address),
    }
  }

  pub fn write_memory(&mut self, address: u16, width: Width, value: u16) {
    match width {
      Width::Byte => self.write_u8(address, value as u8),
      Width::Word => self.write_u16(address, value),
    }
  }

  pub fn memory(&self) -> &[u8] {
    &self.memory
  }

  /// Register values in dump order.
  pub fn registers(&self) -> impl Iterator<Item = (Register, u16)> + '_ {
    DISPLAY_ORDER.iter().map(|&reg| (reg, self.reg(reg)))
  }
}

impl fmt::Display for CpuState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f, "Final registers:")?;
    for (reg, value) in self.registers() {
      writeln!(f, "      {reg}: {value:#06x} ({value})")?;
    }
    writeln!(f, "      ip: {:#06x} ({})", self.ip, self.ip)?;
    writeln!(f, "   flags: {}", self.flags)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  #[test]
  fn test_byte_writes_preserve_sibling_half() {
    let pairs = [
      (Register::Al, Register::Ah, Register::Ax),
      (Register::Bl, Register::Bh, Register::Bx),
      (Register::Cl, Register::Ch, Register::Cx),
      (Register::Dl, Register::Dh, Register::Dx),
    ];
    for (low, high, full) in pairs {
      let mut cpu = CpuState::new();
      cpu.set_reg(full, 0x1234);
      cpu.set_reg(low, 0xab);
      assert_eq!(cpu.reg(full), 0x12ab);
      assert_eq!(cpu.reg(high), 0x12);
      cpu.set_reg(high, 0xcd);
      assert_eq!(cpu.reg(full), 0xcdab);
      assert_eq!(cpu.reg(low), 0xab);
      cpu.set_reg(full, 0x0001);
      assert_eq!(cpu.reg(high), 0x00);
      assert_eq!(cpu.reg(low), 0x01);
    }
  }

  #[test]
  fn test_byte_write_truncates_value() {
    let mut cpu = CpuState::new();
    cpu.set_reg(Register::Ah, 0x1ff);
    assert_eq!(cpu.reg(Register::Ax), 0xff00);
  }

  #[test]
  fn test_index_registers_are_word_only() {
    let mut cpu = CpuState::new();
    cpu.set_reg(Register::Si, 0xbeef);
    cpu.set_reg(Register::Di, 0x0102);
    assert_eq!(cpu.reg(Register::Si), 0xbeef);
    assert_eq!(cpu.reg(Register::Ax), 0);
    assert_eq!(cpu.reg(Register::Bx), 0);
  }

  #[test]
  fn test_word_memory_is_little_endian_and_wraps() {
    let mut cpu = CpuState::new();
    cpu.write_u16(0x1001, 0xbeef);
    assert_eq!(cpu.read_u8(0x1001), 0xef);
    assert_eq!(cpu.read_u8(0x1002), 0xbe);
    cpu.write_u16(0xffff, 0x1234);
    assert_eq!(cpu.read_u8(0xffff), 0x34);
    assert_eq!(cpu.read_u8(0x0000), 0x12);
    assert_eq!(cpu.read_memory(0xffff, Width::Word), 0x1234);
  }

  #[test]
  fn test_flag_letters() {
    assert_eq!(Flags::empty().to_string(), "-");
    assert_eq!(
      (Flags::ZERO | Flags::CARRY | Flags::PARITY).to_string(),
      "CPZ"
    );
    assert_eq!(Flags::STATUS.letters(), "CPAZSO");
  }

  #[test]
  fn test_dump_format() {
    let mut cpu = CpuState::new();
    cpu.set_reg(Register::Ax, 15);
    cpu.set_reg(Register::Bx, 15);
    cpu.ip = 9;
    cpu.flags = Flags::PARITY | Flags::AUX_CARRY;
    assert_eq!(
      cpu.to_string(),
      indoc::indoc! {"
        Final registers:
              ax: 0x000f (15)
              bx: 0x000f (15)
              cx: 0x0000 (0)
              dx: 0x0000 (0)
              sp: 0x0000 (0)
              bp: 0x0000 (0)
              si: 0x0000 (0)
              di: 0x0000 (0)
              es: 0x0000 (0)
              cs: 0x0000 (0)
              ss: 0x0000 (0)
              ds: 0x0000 (0)
              ip: 0x0009 (9)
           flags: PA
      "}
    );
  }
}
