use log::trace;

use crate::cpu::{CpuState, Flags};
use crate::error::{Error, Result};
use crate::instruction::{Instruction, Mnemonic, Operand};
use crate::register::{Register, Width};
use crate::resolve::{resolve, Resolved};

/// What the loop does with `ip` after an instruction executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
  Next,
  Jump(u16),
  Halt,
}

/// Flags written by `lahf`/`sahf`.
const AH_FLAGS: Flags = Flags::SIGN
  .union(Flags::ZERO)
  .union(Flags::AUX_CARRY)
  .union(Flags::PARITY)
  .union(Flags::CARRY);

fn inconsistent(inst: &Instruction) -> Error {
  Error::InternalInconsistency {
    offset: inst.offset,
    mnemonic: inst.mnemonic,
  }
}

fn operand(inst: &Instruction, index: usize, state: &CpuState) -> Result<Resolved> {
  inst
    .operands
    .get(index)
    .and_then(|operand| resolve(operand, state))
    .ok_or_else(|| inconsistent(inst))
}

fn displacement(inst: &Instruction) -> Result<i16> {
  match inst.operands.first() {
    Some(Operand::Relative(displacement)) => Ok(*displacement),
    _ => Err(inconsistent(inst)),
  }
}

fn store(inst: &Instruction, dst: &Resolved, state: &mut CpuState, value: u16) -> Result<()> {
  if dst.write(state, value) {
    Ok(())
  } else {
    Err(inconsistent(inst))
  }
}

fn parity(value: u16) -> bool {
  (value as u8).count_ones() % 2 == 0
}

/// ZF, SF and PF, which depend only on the result bits.
fn result_flags(result: u16, width: Width) -> Flags {
  let mut flags = Flags::empty();
  flags.set(Flags::ZERO, result & width.mask() == 0);
  flags.set(Flags::SIGN, result & width.sign_bit() != 0);
  flags.set(Flags::PARITY, parity(result));
  flags
}

/// `a + b + carry` in `width`, with all six status flags.
pub fn add(a: u16, b: u16, carry: bool, width: Width) -> (u16, Flags) {
  let mask = width.mask();
  let (a, b) = (a & mask, b & mask);
  let wide = a as u32 + b as u32 + carry as u32;
  let result = wide as u16 & mask;
  let mut flags = result_flags(result, width);
  flags.set(Flags::CARRY, wide > mask as u32);
  flags.set(Flags::AUX_CARRY, (a ^ b ^ result) & 0x10 != 0);
  flags.set(
    Flags::OVERFLOW,
    (a ^ result) & (b ^ result) & width.sign_bit() != 0,
  );
  (result, flags)
}

/// `a - b - borrow` in `width`, with all six status flags.
pub fn sub(a: u16, b: u16, borrow: bool, width: Width) -> (u16, Flags) {
  let mask = width.mask();
  let (a, b) = (a & mask, b & mask);
  let subtrahend = b as u32 + borrow as u32;
  let result = (a as u32).wrapping_sub(subtrahend) as u16 & mask;
  let mut flags = result_flags(result, width);
  flags.set(Flags::CARRY, subtrahend > a as u32);
  flags.set(Flags::AUX_CARRY, (a ^ b ^ result) & 0x10 != 0);
  flags.set(
    Flags::OVERFLOW,
    (a ^ b) & (a ^ result) & width.sign_bit() != 0,
  );
  (result, flags)
}

/// and/or/xor/test: CF, OF and AF cleared.
pub fn logic(result: u16, width: Width) -> (u16, Flags) {
  let result = result & width.mask();
  (result, result_flags(result, width))
}

fn update_flags(state: &mut CpuState, affected: Flags, flags: Flags) {
  let before = state.flags;
  state.flags = (before - affected) | (flags & affected);
  if before != state.flags {
    trace!("flags {} -> {}", before, state.flags);
  }
}

/// Whether a conditional jump is taken. `None` for anything else.
pub fn condition(mnemonic: Mnemonic, flags: Flags) -> Option<bool> {
  let cf = flags.contains(Flags::CARRY);
  let zf = flags.contains(Flags::ZERO);
  let sf = flags.contains(Flags::SIGN);
  let of = flags.contains(Flags::OVERFLOW);
  let pf = flags.contains(Flags::PARITY);
  let taken = match mnemonic {
    Mnemonic::Jo => of,
    Mnemonic::Jno => !of,
    Mnemonic::Jb => cf,
    Mnemonic::Jnb => !cf,
    Mnemonic::Je => zf,
    Mnemonic::Jne => !zf,
    Mnemonic::Jbe => cf || zf,
    Mnemonic::Ja => !(cf || zf),
    Mnemonic::Js => sf,
    Mnemonic::Jns => !sf,
    Mnemonic::Jp => pf,
    Mnemonic::Jnp => !pf,
    Mnemonic::Jl => sf != of,
    Mnemonic::Jnl => sf == of,
    Mnemonic::Jle => zf || sf != of,
    Mnemonic::Jg => !zf && sf == of,
    _ => return None,
  };
  Some(taken)
}

fn jump_if(inst: &Instruction, taken: bool) -> Result<Flow> {
  let displacement = displacement(inst)?;
  if taken {
    Ok(Flow::Jump(inst.next_ip().wrapping_add(displacement as u16)))
  } else {
    Ok(Flow::Next)
  }
}

fn binary(inst: &Instruction, state: &mut CpuState) -> Result<Flow> {
  let dst = operand(inst, 0, state)?;
  let src = operand(inst, 1, state)?;
  let (a, b) = (dst.read(state), src.read(state));
  let width = dst.width;
  let carry = state.flag(Flags::CARRY);
  let (result, flags) = match inst.mnemonic {
    Mnemonic::Add => add(a, b, false, width),
    Mnemonic::Adc => add(a, b, carry, width),
    Mnemonic::Sub | Mnemonic::Cmp => sub(a, b, false, width),
    Mnemonic::Sbb => sub(a, b, carry, width),
    Mnemonic::And | Mnemonic::Test => logic(a & b, width),
    Mnemonic::Or => logic(a | b, width),
    Mnemonic::Xor => logic(a ^ b, width),
    _ => return Err(inconsistent(inst)),
  };
  update_flags(state, Flags::STATUS, flags);
  if !matches!(inst.mnemonic, Mnemonic::Cmp | Mnemonic::Test) {
    store(inst, &dst, state, result)?;
  }
  Ok(Flow::Next)
}

fn unary(inst: &Instruction, state: &mut CpuState) -> Result<Flow> {
  let dst = operand(inst, 0, state)?;
  let value = dst.read(state);
  let width = dst.width;
  let result = match inst.mnemonic {
    Mnemonic::Inc => {
      let (result, flags) = add(value, 1, false, width);
      update_flags(state, Flags::STATUS - Flags::CARRY, flags);
      result
    }
    Mnemonic::Dec => {
      let (result, flags) = sub(value, 1, false, width);
      update_flags(state, Flags::STATUS - Flags::CARRY, flags);
      result
    }
    Mnemonic::Neg => {
      let (result, flags) = sub(0, value, false, width);
      update_flags(state, Flags::STATUS, flags);
      result
    }
    Mnemonic::Not => !value,
    _ => return Err(inconsistent(inst)),
  };
  store(inst, &dst, state, result)?;
  Ok(Flow::Next)
}

fn set_flag(state: &mut CpuState, flag: Flags, value: bool) -> Flow {
  state.flags.set(flag, value);
  Flow::Next
}

/// Applies one instruction to `state`. `ip` is left for the caller to
/// advance according to the returned [`Flow`].
pub fn execute(inst: &Instruction, state: &mut CpuState) -> Result<Flow> {
  use Mnemonic::*;
  match inst.mnemonic {
    Mov => {
      let dst = operand(inst, 0, state)?;
      let value = operand(inst, 1, state)?.read(state);
      store(inst, &dst, state, value)?;
      Ok(Flow::Next)
    }
    Add | Adc | Sub | Sbb | Cmp | And | Or | Xor | Test => binary(inst, state),
    Inc | Dec | Neg | Not => unary(inst, state),
    Jo | Jno | Jb | Jnb | Je | Jne | Jbe | Ja | Js | Jns | Jp | Jnp | Jl | Jnl | Jle | Jg => {
      let taken = condition(inst.mnemonic, state.flags).ok_or_else(|| inconsistent(inst))?;
      jump_if(inst, taken)
    }
    Loop | Loopz | Loopnz => {
      let cx = state.reg(Register::Cx).wrapping_sub(1);
      state.set_reg(Register::Cx, cx);
      let zf = state.flag(Flags::ZERO);
      let taken = cx != 0
        && match inst.mnemonic {
          Loopz => zf,
          Loopnz => !zf,
          _ => true,
        };
      jump_if(inst, taken)
    }
    Jcxz => jump_if(inst, state.reg(Register::Cx) == 0),
    Jmp => jump_if(inst, true),
    Clc => Ok(set_flag(state, Flags::CARRY, false)),
    Stc => Ok(set_flag(state, Flags::CARRY, true)),
    Cmc => {
      let carry = state.flag(Flags::CARRY);
      Ok(set_flag(state, Flags::CARRY, !carry))
    }
    Cli => Ok(set_flag(state, Flags::INTERRUPT, false)),
    Sti => Ok(set_flag(state, Flags::INTERRUPT, true)),
    Cld => Ok(set_flag(state, Flags::DIRECTION, false)),
    Std => Ok(set_flag(state, Flags::DIRECTION, true)),
    Lahf => {
      let ah = (state.flags & AH_FLAGS).bits() | 0b0000_0010;
      state.set_reg(Register::Ah, ah);
      Ok(Flow::Next)
    }
    Sahf => {
      let ah = Flags::from_bits_truncate(state.reg(Register::Ah));
      update_flags(state, AH_FLAGS, ah);
      Ok(Flow::Next)
    }
    Nop => Ok(Flow::Next),
    Hlt => Ok(Flow::Halt),
  }
}
