//! CPU execution engine for the LC-3.
//!
//! Implements the fetch-decode-execute cycle, all instruction behaviors,
//! and the trap routines.

use std::io;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::console::Console;
use crate::cpu::decode::{self, DecodeError, Instruction, Operand, TrapVector};
use crate::cpu::registers::LINK_REG;
use crate::cpu::{Memory, Registers};

/// CPU execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CpuState {
    /// CPU is running normally.
    Running,
    /// CPU has halted (executed TRAP HALT).
    Halted,
}

/// The LC-3 machine: registers, memory, and the console it is wired to.
///
/// The console is injected so the binary can run against the real
/// terminal while tests drive a scripted one.
#[derive(Debug)]
pub struct Cpu<C: Console> {
    /// CPU registers.
    pub regs: Registers,
    /// Main memory.
    pub mem: Memory,
    /// Console for memory-mapped keyboard polls and trap I/O.
    pub console: C,
    /// Current execution state.
    pub state: CpuState,
    /// Instruction count.
    pub cycles: u64,
}

impl<C: Console> Cpu<C> {
    /// Create a CPU with zeroed memory and registers, PC at the start
    /// address.
    pub fn new(console: C) -> Self {
        Self::with_memory(Memory::new(), console)
    }

    /// Create a CPU around an already-populated memory (e.g. after the
    /// loader has placed one or more images).
    pub fn with_memory(mem: Memory, console: C) -> Self {
        Self {
            regs: Registers::new(),
            mem,
            console,
            state: CpuState::Running,
            cycles: 0,
        }
    }

    /// Execute a single instruction.
    ///
    /// Returns the instruction that was executed, for tracing.
    pub fn step(&mut self) -> Result<Instruction, CpuError> {
        if self.state != CpuState::Running {
            return Err(CpuError::NotRunning(self.state));
        }

        // Fetch, then advance PC before execution: offset arithmetic in
        // the handlers sees the incremented PC.
        let word = self.read_mem(self.regs.pc)?;
        self.regs.pc = self.regs.pc.wrapping_add(1);

        let instr = decode::decode(word)?;
        self.execute(instr)?;

        self.cycles += 1;
        Ok(instr)
    }

    /// Run until halt or error. Returns the number of instructions
    /// executed.
    pub fn run(&mut self) -> Result<u64, CpuError> {
        let start_cycles = self.cycles;

        while self.state == CpuState::Running {
            self.step()?;
        }

        Ok(self.cycles - start_cycles)
    }

    /// Run for at most `max_cycles` instructions.
    pub fn run_limited(&mut self, max_cycles: u64) -> Result<u64, CpuError> {
        let start_cycles = self.cycles;
        let limit = self.cycles + max_cycles;

        while self.state == CpuState::Running && self.cycles < limit {
            self.step()?;
        }

        Ok(self.cycles - start_cycles)
    }

    /// Execute a decoded instruction.
    fn execute(&mut self, instr: Instruction) -> Result<(), CpuError> {
        match instr {
            // ==================== Control Flow ====================

            Instruction::Br { mask, pc_offset } => {
                if mask & self.regs.cond.bits() != 0 {
                    self.regs.pc = self.regs.pc.wrapping_add(pc_offset);
                }
            }

            Instruction::Jmp { base } => {
                self.regs.pc = self.regs.r[base as usize];
            }

            Instruction::Jsr { pc_offset } => {
                self.regs.r[LINK_REG] = self.regs.pc;
                self.regs.pc = self.regs.pc.wrapping_add(pc_offset);
            }

            Instruction::Jsrr { base } => {
                self.regs.r[LINK_REG] = self.regs.pc;
                self.regs.pc = self.regs.r[base as usize];
            }

            // ==================== Arithmetic / Logic ====================

            Instruction::Add { dr, sr1, src } => {
                let lhs = self.regs.r[sr1 as usize];
                self.regs.r[dr as usize] = lhs.wrapping_add(self.operand(src));
                self.regs.update_flags(dr);
            }

            Instruction::And { dr, sr1, src } => {
                let lhs = self.regs.r[sr1 as usize];
                self.regs.r[dr as usize] = lhs & self.operand(src);
                self.regs.update_flags(dr);
            }

            Instruction::Not { dr, sr } => {
                self.regs.r[dr as usize] = !self.regs.r[sr as usize];
                self.regs.update_flags(dr);
            }

            // ==================== Loads ====================

            Instruction::Ld { dr, pc_offset } => {
                let addr = self.regs.pc.wrapping_add(pc_offset);
                self.regs.r[dr as usize] = self.read_mem(addr)?;
                self.regs.update_flags(dr);
            }

            Instruction::Ldi { dr, pc_offset } => {
                let ptr = self.regs.pc.wrapping_add(pc_offset);
                let addr = self.read_mem(ptr)?;
                self.regs.r[dr as usize] = self.read_mem(addr)?;
                self.regs.update_flags(dr);
            }

            Instruction::Ldr { dr, base, offset } => {
                let addr = self.regs.r[base as usize].wrapping_add(offset);
                self.regs.r[dr as usize] = self.read_mem(addr)?;
                self.regs.update_flags(dr);
            }

            Instruction::Lea { dr, pc_offset } => {
                self.regs.r[dr as usize] = self.regs.pc.wrapping_add(pc_offset);
                self.regs.update_flags(dr);
            }

            // ==================== Stores ====================

            Instruction::St { sr, pc_offset } => {
                let addr = self.regs.pc.wrapping_add(pc_offset);
                self.mem.write(addr, self.regs.r[sr as usize]);
            }

            Instruction::Sti { sr, pc_offset } => {
                let ptr = self.regs.pc.wrapping_add(pc_offset);
                let addr = self.read_mem(ptr)?;
                self.mem.write(addr, self.regs.r[sr as usize]);
            }

            Instruction::Str { sr, base, offset } => {
                let addr = self.regs.r[base as usize].wrapping_add(offset);
                self.mem.write(addr, self.regs.r[sr as usize]);
            }

            // ==================== Traps ====================

            Instruction::Trap { vector } => self.trap(vector)?,
        }

        Ok(())
    }

    /// Resolve the second operand of ADD/AND.
    fn operand(&self, src: Operand) -> u16 {
        match src {
            Operand::Reg(r) => self.regs.r[r as usize],
            Operand::Imm(imm) => imm,
        }
    }

    /// Execute a trap routine. Traps never touch the condition register.
    fn trap(&mut self, vector: TrapVector) -> Result<(), CpuError> {
        match vector {
            TrapVector::Getc => {
                let ch = self.console.read_char()?;
                self.regs.r[0] = u16::from(ch);
            }

            TrapVector::Out => {
                let ch = self.regs.r[0] as u8;
                self.console.write_char(ch)?;
                self.console.flush()?;
            }

            TrapVector::Puts => {
                let mut addr = self.regs.r[0];
                loop {
                    let word = self.read_mem(addr)?;
                    if word == 0 {
                        break;
                    }
                    self.console.write_char(word as u8)?;
                    addr = addr.wrapping_add(1);
                }
                self.console.flush()?;
            }

            TrapVector::In => {
                self.console.write_str("Enter a character: ")?;
                self.console.flush()?;
                let ch = self.console.read_char()?;
                self.console.write_char(ch)?;
                self.console.flush()?;
                self.regs.r[0] = u16::from(ch);
            }

            TrapVector::Putsp => {
                let mut addr = self.regs.r[0];
                loop {
                    let word = self.read_mem(addr)?;
                    if word == 0 {
                        break;
                    }
                    self.console.write_char(word as u8)?;
                    let high = (word >> 8) as u8;
                    if high != 0 {
                        self.console.write_char(high)?;
                    }
                    addr = addr.wrapping_add(1);
                }
                self.console.flush()?;
            }

            TrapVector::Halt => {
                self.state = CpuState::Halted;
            }
        }

        Ok(())
    }

    /// Memory read routed through the device-interception path.
    fn read_mem(&mut self, addr: u16) -> Result<u16, CpuError> {
        Ok(self.mem.read(addr, &mut self.console)?)
    }

    /// Check if the CPU has halted.
    pub fn is_halted(&self) -> bool {
        self.state == CpuState::Halted
    }

    /// Check if the CPU is running.
    pub fn is_running(&self) -> bool {
        self.state == CpuState::Running
    }
}

/// Errors that stop execution. There are no recoverable errors inside the
/// execute loop: the privileged exception mechanism is deliberately not
/// implemented, so anything that would need it is fatal.
#[derive(Debug, Error)]
pub enum CpuError {
    #[error("CPU not running: {0:?}")]
    NotRunning(CpuState),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("console I/O failed: {0}")]
    Console(#[from] io::Error),
}
