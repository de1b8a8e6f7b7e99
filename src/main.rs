use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use sim8086::{decode_all, SimConfig, Simulator};

const DEFAULT_MAX_INSTRUCTIONS: u64 = 1_000_000;

#[derive(Parser, Debug)]
#[command(
  name = "sim8086",
  about = "Disassemble or simulate a raw 8086 binary."
)]
struct Args {
  /// Assembled program image (no header, decoded from its first byte)
  file: PathBuf,

  /// Execute the program and print the final register state
  #[arg(long, action = clap::ArgAction::SetTrue)]
  exec: bool,

  /// With --exec, print every executed instruction and its effect
  #[arg(long, action = clap::ArgAction::SetTrue, requires = "exec")]
  trace: bool,

  /// Offset to start decoding/executing at (decimal or 0x-prefixed hex)
  #[arg(long, value_name = "OFFSET", default_value = "0", value_parser = parse_u16)]
  origin: u16,

  /// Stop with an error after this many instructions (0 disables the guard)
  #[arg(long, value_name = "N", default_value_t = DEFAULT_MAX_INSTRUCTIONS)]
  max_instructions: u64,

  /// With --exec, write the 64 KiB memory image here after the run
  #[arg(long, value_name = "PATH", requires = "exec")]
  dump: Option<PathBuf>,
}

fn parse_u16(input: &str) -> std::result::Result<u16, String> {
  let parsed = match input.strip_prefix("0x").or_else(|| input.strip_prefix("0X")) {
    Some(hex) => u16::from_str_radix(hex, 16),
    None => input.parse(),
  };
  parsed.map_err(|err| format!("`{input}` is not a 16-bit offset: {err}"))
}

fn main() -> Result<()> {
  env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
  let args = Args::parse();

  let data =
    std::fs::read(&args.file).with_context(|| format!("reading {}", args.file.display()))?;

  if !args.exec {
    let instructions = decode_all(&data, args.origin as usize)
      .with_context(|| format!("decoding {}", args.file.display()))?;
    println!("; src: `{}`\nbits 16", args.file.display());
    for instruction in instructions {
      println!("{instruction}");
    }
    return Ok(());
  }

  let config = SimConfig {
    origin: args.origin,
    max_instructions: (args.max_instructions > 0).then_some(args.max_instructions),
  };
  let mut sim = Simulator::new(&data, config);
  println!("--- {} execution ---", args.file.display());
  let trace = args.trace;
  sim
    .run_with(|step| {
      if trace {
        println!("{step}");
      }
    })
    .with_context(|| format!("simulating {}", args.file.display()))?;
  println!();
  print!("{}", sim.state());

  if let Some(path) = &args.dump {
    std::fs::write(path, sim.state().memory())
      .with_context(|| format!("writing memory dump to {}", path.display()))?;
  }
  Ok(())
}
