//! CPU emulation for the LC-3 computer.
//!
//! This module implements the complete LC-3 architecture:
//! - 65536 sixteen-bit memory words with memory-mapped keyboard registers
//! - 8 general-purpose registers, program counter, condition register
//! - 16-opcode instruction set with trap-based console I/O

pub mod memory;
pub mod registers;
pub mod decode;
pub mod execute;

pub use memory::{Memory, KBDR, KBSR, MEMORY_SIZE};
pub use registers::{CondFlag, Registers, PC_START};
pub use decode::{decode, encode, sign_extend, DecodeError, Instruction, Opcode, Operand, TrapVector};
pub use execute::{Cpu, CpuError, CpuState};
