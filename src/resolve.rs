use crate::cpu::CpuState;
use crate::instruction::Operand;
use crate::register::{Register, Width};

/// A concrete place to read or write, after evaluating an operand against
/// the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
  Register(Register),
  Memory(u16),
  Immediate(u16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved {
  pub location: Location,
  pub width: Width,
}

/// `base + index + displacement`, wrapping at 64 KiB.
pub fn effective_address(
  state: &CpuState,
  base: Option<Register>,
  index: Option<Register>,
  displacement: i16,
) -> u16 {
  let base = base.map_or(0, |reg| state.reg(reg));
  let index = index.map_or(0, |reg| state.reg(reg));
  base
    .wrapping_add(index)
    .wrapping_add(displacement as u16)
}

/// Returns `None` for jump displacements, which have no storage location.
pub fn resolve(operand: &Operand, state: &CpuState) -> Option<Resolved> {
  let resolved = match *operand {
    Operand::Register(reg) => Resolved {
      location: Location::Register(reg),
      width: reg.width(),
    },
    Operand::Memory {
      base,
      index,
      displacement,
      width,
    } => Resolved {
      location: Location::Memory(effective_address(state, base, index, displacement)),
      width,
    },
    Operand::Immediate { value, width } => Resolved {
      location: Location::Immediate(value & width.mask()),
      width,
    },
    Operand::Relative(_) => return None,
  };
  Some(resolved)
}

impl Resolved {
  pub fn read(&self, state: &CpuState) -> u16 {
    match self.location {
      Location::Register(reg) => state.reg(reg),
      Location::Memory(address) => state.read_memory(address, self.width),
      Location::Immediate(value) => value,
    }
  }

  /// Returns false when the location is an immediate, which cannot be written.
  pub fn write(&self, state: &mut CpuState, value: u16) -> bool {
    let value = value & self.width.mask();
    match self.location {
      Location::Register(reg) => state.set_reg(reg, value),
      Location::Memory(address) => state.write_memory(address, self.width, value),
      Location::Immediate(_) => return false,
    }
    true
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  fn memory(base: Option<Register>, index: Option<Register>, displacement: i16) -> Operand {
    Operand::Memory {
      base,
      index,
      displacement,
      width: Width::Word,
    }
  }

  #[test]
  fn test_effective_address_sums_base_index_and_displacement() {
    let mut cpu = CpuState::new();
    cpu.set_reg(Register::Bx, 0x1000);
    cpu.set_reg(Register::Si, 0x0020);
    let resolved = resolve(&memory(Some(Register::Bx), Some(Register::Si), -4), &cpu).unwrap();
    assert_eq!(resolved.location, Location::Memory(0x101c));
    assert_eq!(resolved.width, Width::Word);
  }

  #[test]
  fn test_effective_address_wraps() {
    let mut cpu = CpuState::new();
    cpu.set_reg(Register::Bp, 0xfff0);
    let resolved = resolve(&memory(Some(Register::Bp), None, 0x20), &cpu).unwrap();
    assert_eq!(resolved.location, Location::Memory(0x0010));

    cpu.set_reg(Register::Bx, 0x0002);
    let resolved = resolve(&memory(Some(Register::Bx), None, -4), &cpu).unwrap();
    assert_eq!(resolved.location, Location::Memory(0xfffe));
  }

  #[test]
  fn test_direct_address() {
    let cpu = CpuState::new();
    let resolved = resolve(&memory(None, None, 0xfffe_u16 as i16), &cpu).unwrap();
    assert_eq!(resolved.location, Location::Memory(0xfffe));
  }

  #[test]
  fn test_register_access_goes_through_aliasing() {
    let mut cpu = CpuState::new();
    cpu.set_reg(Register::Cx, 0xaa55);
    let resolved = resolve(&Operand::Register(Register::Ch), &cpu).unwrap();
    assert_eq!(resolved.read(&cpu), 0xaa);
    assert!(resolved.write(&mut cpu, 0x1234));
    assert_eq!(cpu.reg(Register::Cx), 0x3455);
  }

  #[test]
  fn test_immediates_are_read_only() {
    let mut cpu = CpuState::new();
    let imm = Operand::Immediate {
      value: 5,
      width: Width::Word,
    };
    let resolved = resolve(&imm, &cpu).unwrap();
    assert_eq!(resolved.read(&cpu), 5);
    assert!(!resolved.write(&mut cpu, 1));
    assert_eq!(resolve(&Operand::Relative(2), &cpu), None);
  }
}
