use std::fmt;

use log::{debug, info, trace, warn};

use crate::cpu::{CpuState, Flags};
use crate::decode::decode;
use crate::error::{Error, Result};
use crate::execute::{execute, Flow};
use crate::instruction::Instruction;
use crate::register::{Register, DISPLAY_ORDER};
use crate::stream::ByteStream;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SimConfig {
  /// Offset in the image where execution starts.
  pub origin: u16,
  /// Abort with [`Error::InstructionLimit`] after this many instructions.
  pub max_instructions: Option<u64>,
}

/// Why a run stopped without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Halt {
  /// `ip` reached or jumped past the end of the image.
  EndOfProgram,
  Hlt,
}

/// The observable effect of one executed instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
  pub instruction: Instruction,
  pub registers: Vec<(Register, u16, u16)>,
  pub ip: (u16, u16),
  pub flags: (Flags, Flags),
}

impl fmt::Display for Step {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} ;", self.instruction)?;
    for (reg, old, new) in &self.registers {
      write!(f, " {reg}:{old:#x}->{new:#x}")?;
    }
    write!(f, " ip:{:#x}->{:#x}", self.ip.0, self.ip.1)?;
    if self.flags.0 != self.flags.1 {
      write!(
        f,
        " flags:{}->{}",
        self.flags.0.letters(),
        self.flags.1.letters()
      )?;
    }
    Ok(())
  }
}

pub struct Simulator<'a> {
  program: &'a [u8],
  state: CpuState,
  config: SimConfig,
  executed: u64,
  halted: Option<Halt>,
}

impl<'a> Simulator<'a> {
  pub fn new(program: &'a [u8], config: SimConfig) -> Self {
    let mut state = CpuState::new();
    state.ip = config.origin;
    Simulator {
      program,
      state,
      config,
      executed: 0,
      halted: None,
    }
  }

  pub fn state(&self) -> &CpuState {
    &self.state
  }

  pub fn state_mut(&mut self) -> &mut CpuState {
    &mut self.state
  }

  pub fn into_state(self) -> CpuState {
    self.state
  }

  pub fn executed(&self) -> u64 {
    self.executed
  }

  pub fn halted(&self) -> Option<Halt> {
    self.halted
  }

  /// Runs one fetch/decode/execute/advance cycle. `Ok(None)` once halted.
  pub fn step(&mut self) -> Result<Option<Step>> {
    if self.halted.is_some() {
      return Ok(None);
    }
    let mut stream = ByteStream::at(self.program, self.state.ip as usize);
    if stream.at_end() {
      debug!("ip {:#06x} is past the end of the image", self.state.ip);
      self.halted = Some(Halt::EndOfProgram);
      return Ok(None);
    }
    if let Some(limit) = self.config.max_instructions {
      if self.executed >= limit {
        return Err(Error::InstructionLimit {
          limit,
          ip: self.state.ip,
        });
      }
    }

    let instruction = decode(&mut stream)?;
    let before = self.snapshot();
    let flags_before = self.state.flags;
    let ip_before = self.state.ip;
    let flow = execute(&instruction, &mut self.state)?;
    self.state.ip = match flow {
      Flow::Next | Flow::Halt => instruction.next_ip(),
      Flow::Jump(target) => target,
    };
    if flow == Flow::Halt {
      self.halted = Some(Halt::Hlt);
    }
    self.executed += 1;

    let registers: Vec<_> = DISPLAY_ORDER
      .iter()
      .zip(before)
      .filter_map(|(&reg, old)| {
        let new = self.state.reg(reg);
        (old != new).then_some((reg, old, new))
      })
      .collect();
    let step = Step {
      instruction,
      registers,
      ip: (ip_before, self.state.ip),
      flags: (flags_before, self.state.flags),
    };
    trace!("{step}");
    Ok(Some(step))
  }

  /// Steps until the program halts, passing every step to `on_step`.
  pub fn run_with(&mut self, mut on_step: impl FnMut(&Step)) -> Result<Halt> {
    loop {
      match self.step() {
        Ok(Some(step)) => on_step(&step),
        Ok(None) => break,
        Err(err) => {
          warn!("simulation stopped after {} instructions: {err}", self.executed);
          return Err(err);
        }
      }
    }
    let halt = self.halted.unwrap_or(Halt::EndOfProgram);
    info!("halted ({halt:?}) after {} instructions", self.executed);
    Ok(halt)
  }

  pub fn run(&mut self) -> Result<Halt> {
    self.run_with(|_| {})
  }

  fn snapshot(&self) -> [u16; 12] {
    DISPLAY_ORDER.map(|reg| self.state.reg(reg))
  }
}

/// Simulates `program` from its start and returns the final state.
pub fn simulate(program: &[u8]) -> Result<CpuState> {
  let mut sim = Simulator::new(program, SimConfig::default());
  sim.run()?;
  Ok(sim.into_state())
}
