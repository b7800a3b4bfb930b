//! # LC-3 Emulator
//!
//! An emulator of the LC-3, the 16-bit von-Neumann computer used to teach
//! computer architecture. It loads big-endian object images into a
//! 65536-word memory and runs the fetch-decode-execute loop until a HALT
//! trap or a fatal condition.

pub mod console;
pub mod cpu;
pub mod loader;

// Re-export commonly used types
pub use console::{Console, RawConsole, ScriptedConsole};
pub use cpu::{CondFlag, Cpu, CpuError, CpuState, Instruction, Memory, Registers};
pub use loader::{load_image, ImageInfo, LoadError};
