//! LC-3 Emulator - CLI Entry Point
//!
//! `lc3-emu prog.obj [more.obj ...]` loads the images into one memory in
//! argument order and runs from 0x3000. Exit code 0 on HALT, 1 with a
//! diagnostic on a load failure or a fatal instruction/trap condition.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;
use serde::Serialize;

use lc3::console::RawConsole;
use lc3::cpu::{Cpu, CpuState, Instruction, Memory, Registers};
use lc3::loader;

#[derive(Parser)]
#[command(name = "lc3-emu")]
#[command(version = "0.1.0")]
#[command(about = "An emulator of the LC-3 educational 16-bit computer")]
struct Cli {
    /// LC-3 object images, loaded into memory in argument order
    #[arg(required = true, value_name = "IMAGE")]
    images: Vec<PathBuf>,

    /// Append one JSON record per executed instruction to this file
    #[arg(long, value_name = "FILE")]
    trace: Option<PathBuf>,

    /// Stop after this many instructions (0 = no limit)
    #[arg(long, default_value_t = 0)]
    max_cycles: u64,
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(&cli) {
        eprintln!("lc3-emu: {e}");
        process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut mem = Memory::new();
    for path in &cli.images {
        loader::load_image(path, &mut mem)?;
    }

    let mut tracer = match &cli.trace {
        Some(path) => Some(Tracer::create(path)?),
        None => None,
    };

    // The console holds the terminal in raw mode; dropping it on any
    // return path below restores the terminal before the process exits.
    let console = RawConsole::new()?;
    let mut cpu = Cpu::with_memory(mem, console);

    while cpu.state == CpuState::Running {
        if cli.max_cycles != 0 && cpu.cycles >= cli.max_cycles {
            break;
        }
        let pc = cpu.regs.pc;
        let instr = cpu.step()?;
        if let Some(tracer) = tracer.as_mut() {
            tracer.record(pc, &instr, &cpu.regs)?;
        }
    }

    Ok(())
}

/// One executed step: where it was fetched, what it decoded to, and the
/// register file after it ran.
#[derive(Serialize)]
struct TraceRecord<'a> {
    pc: u16,
    instr: &'a Instruction,
    regs: &'a Registers,
}

/// Append-only diagnostic sink: one JSON line per executed instruction.
/// Output-only; the core never reads it back.
struct Tracer {
    out: BufWriter<File>,
}

impl Tracer {
    fn create(path: &Path) -> io::Result<Self> {
        Ok(Self {
            out: BufWriter::new(File::create(path)?),
        })
    }

    fn record(&mut self, pc: u16, instr: &Instruction, regs: &Registers) -> io::Result<()> {
        let record = TraceRecord { pc, instr, regs };
        serde_json::to_writer(&mut self.out, &record)?;
        self.out.write_all(b"\n")
    }
}
