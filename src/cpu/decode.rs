//! Instruction decoder for the LC-3.
//!
//! Every instruction is one 16-bit word: the top 4 bits select the opcode,
//! the remaining 12 bits are opcode-specific fields (register indices,
//! immediates, signed PC-relative offsets, mode bits).

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Widen an `nbits`-bit two's-complement field to 16 bits.
///
/// If the field's sign bit is set, all bits from `nbits` upward are set;
/// otherwise the field is returned unchanged.
pub fn sign_extend(x: u16, nbits: u32) -> u16 {
    if (x >> (nbits - 1)) & 1 == 1 {
        x | (0xFFFFu16 << nbits)
    } else {
        x
    }
}

/// The 16 LC-3 opcodes, in encoding order (0 through 15).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Opcode {
    Br,
    Add,
    Ld,
    St,
    Jsr,
    And,
    Ldr,
    Str,
    Rti,
    Not,
    Ldi,
    Sti,
    Jmp,
    Res,
    Lea,
    Trap,
}

impl Opcode {
    /// Extract the opcode from the top 4 bits of an instruction word.
    pub fn from_word(word: u16) -> Self {
        match word >> 12 {
            0 => Opcode::Br,
            1 => Opcode::Add,
            2 => Opcode::Ld,
            3 => Opcode::St,
            4 => Opcode::Jsr,
            5 => Opcode::And,
            6 => Opcode::Ldr,
            7 => Opcode::Str,
            8 => Opcode::Rti,
            9 => Opcode::Not,
            10 => Opcode::Ldi,
            11 => Opcode::Sti,
            12 => Opcode::Jmp,
            13 => Opcode::Res,
            14 => Opcode::Lea,
            15 => Opcode::Trap,
            _ => unreachable!(), // u16 >> 12 is at most 15
        }
    }
}

/// Second operand of ADD/AND: a register, or a sign-extended 5-bit
/// immediate (mode bit 5 of the instruction word).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operand {
    Reg(u16),
    /// Already sign-extended to 16 bits.
    Imm(u16),
}

/// Trap routine selectors, from the low 8 bits of a TRAP instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrapVector {
    /// 0x20: read one character into R0, no echo.
    Getc,
    /// 0x21: write the low byte of R0.
    Out,
    /// 0x22: write a string, one character per word, until a zero word.
    Puts,
    /// 0x23: prompt, read one character, echo it, store in R0.
    In,
    /// 0x24: write a string, two characters per word, until a zero word.
    Putsp,
    /// 0x25: stop execution.
    Halt,
}

impl TrapVector {
    pub fn from_vector(vector: u16) -> Result<Self, DecodeError> {
        match vector {
            0x20 => Ok(TrapVector::Getc),
            0x21 => Ok(TrapVector::Out),
            0x22 => Ok(TrapVector::Puts),
            0x23 => Ok(TrapVector::In),
            0x24 => Ok(TrapVector::Putsp),
            0x25 => Ok(TrapVector::Halt),
            _ => Err(DecodeError::UnknownTrap(vector)),
        }
    }

    pub fn vector(self) -> u16 {
        match self {
            TrapVector::Getc => 0x20,
            TrapVector::Out => 0x21,
            TrapVector::Puts => 0x22,
            TrapVector::In => 0x23,
            TrapVector::Putsp => 0x24,
            TrapVector::Halt => 0x25,
        }
    }
}

/// A decoded LC-3 instruction.
///
/// Register fields are indices 0-7; all offset and immediate fields are
/// stored already sign-extended to 16 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    /// Branch if the N/Z/P mask intersects the condition register:
    /// PC := PC + pc_offset.
    Br { mask: u16, pc_offset: u16 },

    /// DR := SR1 + src; sets flags.
    Add { dr: u16, sr1: u16, src: Operand },

    /// DR := mem[PC + pc_offset]; sets flags.
    Ld { dr: u16, pc_offset: u16 },

    /// mem[PC + pc_offset] := SR.
    St { sr: u16, pc_offset: u16 },

    /// R7 := PC; PC := PC + pc_offset.
    Jsr { pc_offset: u16 },

    /// R7 := PC; PC := base register.
    Jsrr { base: u16 },

    /// DR := SR1 & src; sets flags.
    And { dr: u16, sr1: u16, src: Operand },

    /// DR := mem[base + offset]; sets flags.
    Ldr { dr: u16, base: u16, offset: u16 },

    /// mem[base + offset] := SR.
    Str { sr: u16, base: u16, offset: u16 },

    /// DR := !SR; sets flags.
    Not { dr: u16, sr: u16 },

    /// DR := mem[mem[PC + pc_offset]]; sets flags.
    Ldi { dr: u16, pc_offset: u16 },

    /// mem[mem[PC + pc_offset]] := SR.
    Sti { sr: u16, pc_offset: u16 },

    /// PC := base register (RET when base is R7).
    Jmp { base: u16 },

    /// DR := PC + pc_offset; sets flags.
    Lea { dr: u16, pc_offset: u16 },

    /// Invoke a trap routine.
    Trap { vector: TrapVector },
}

/// Decode one instruction word.
///
/// RTI and the reserved opcode have no handler in this non-privileged
/// emulator and decode to an error, as does a TRAP with a vector outside
/// the six defined routines. The caller treats these as fatal.
pub fn decode(word: u16) -> Result<Instruction, DecodeError> {
    let dr = (word >> 9) & 0x7;
    let sr1 = (word >> 6) & 0x7;

    let instr = match Opcode::from_word(word) {
        Opcode::Br => Instruction::Br {
            mask: (word >> 9) & 0x7,
            pc_offset: sign_extend(word & 0x1FF, 9),
        },
        Opcode::Add => Instruction::Add {
            dr,
            sr1,
            src: decode_operand(word),
        },
        Opcode::Ld => Instruction::Ld {
            dr,
            pc_offset: sign_extend(word & 0x1FF, 9),
        },
        Opcode::St => Instruction::St {
            sr: dr,
            pc_offset: sign_extend(word & 0x1FF, 9),
        },
        Opcode::Jsr => {
            if (word >> 11) & 1 == 1 {
                Instruction::Jsr {
                    pc_offset: sign_extend(word & 0x7FF, 11),
                }
            } else {
                Instruction::Jsrr { base: sr1 }
            }
        }
        Opcode::And => Instruction::And {
            dr,
            sr1,
            src: decode_operand(word),
        },
        Opcode::Ldr => Instruction::Ldr {
            dr,
            base: sr1,
            offset: sign_extend(word & 0x3F, 6),
        },
        Opcode::Str => Instruction::Str {
            sr: dr,
            base: sr1,
            offset: sign_extend(word & 0x3F, 6),
        },
        Opcode::Rti => return Err(DecodeError::PrivilegedOpcode(word)),
        Opcode::Not => Instruction::Not { dr, sr: sr1 },
        Opcode::Ldi => Instruction::Ldi {
            dr,
            pc_offset: sign_extend(word & 0x1FF, 9),
        },
        Opcode::Sti => Instruction::Sti {
            sr: dr,
            pc_offset: sign_extend(word & 0x1FF, 9),
        },
        Opcode::Jmp => Instruction::Jmp { base: sr1 },
        Opcode::Res => return Err(DecodeError::ReservedOpcode(word)),
        Opcode::Lea => Instruction::Lea {
            dr,
            pc_offset: sign_extend(word & 0x1FF, 9),
        },
        Opcode::Trap => Instruction::Trap {
            vector: TrapVector::from_vector(word & 0xFF)?,
        },
    };

    Ok(instr)
}

/// Decode the ADD/AND second operand from mode bit 5.
fn decode_operand(word: u16) -> Operand {
    if (word >> 5) & 1 == 1 {
        Operand::Imm(sign_extend(word & 0x1F, 5))
    } else {
        Operand::Reg(word & 0x7)
    }
}

/// Encode an instruction back to a 16-bit word. Inverse of [`decode`];
/// used to assemble test programs.
pub fn encode(instr: &Instruction) -> u16 {
    match *instr {
        Instruction::Br { mask, pc_offset } => (mask << 9) | (pc_offset & 0x1FF),
        Instruction::Add { dr, sr1, src } => {
            (1 << 12) | (dr << 9) | (sr1 << 6) | encode_operand(src)
        }
        Instruction::Ld { dr, pc_offset } => (2 << 12) | (dr << 9) | (pc_offset & 0x1FF),
        Instruction::St { sr, pc_offset } => (3 << 12) | (sr << 9) | (pc_offset & 0x1FF),
        Instruction::Jsr { pc_offset } => (4 << 12) | (1 << 11) | (pc_offset & 0x7FF),
        Instruction::Jsrr { base } => (4 << 12) | (base << 6),
        Instruction::And { dr, sr1, src } => {
            (5 << 12) | (dr << 9) | (sr1 << 6) | encode_operand(src)
        }
        Instruction::Ldr { dr, base, offset } => {
            (6 << 12) | (dr << 9) | (base << 6) | (offset & 0x3F)
        }
        Instruction::Str { sr, base, offset } => {
            (7 << 12) | (sr << 9) | (base << 6) | (offset & 0x3F)
        }
        Instruction::Not { dr, sr } => (9 << 12) | (dr << 9) | (sr << 6) | 0x3F,
        Instruction::Ldi { dr, pc_offset } => (10 << 12) | (dr << 9) | (pc_offset & 0x1FF),
        Instruction::Sti { sr, pc_offset } => (11 << 12) | (sr << 9) | (pc_offset & 0x1FF),
        Instruction::Jmp { base } => (12 << 12) | (base << 6),
        Instruction::Lea { dr, pc_offset } => (14 << 12) | (dr << 9) | (pc_offset & 0x1FF),
        Instruction::Trap { vector } => (15 << 12) | vector.vector(),
    }
}

fn encode_operand(src: Operand) -> u16 {
    match src {
        Operand::Reg(r) => r,
        Operand::Imm(imm) => (1 << 5) | (imm & 0x1F),
    }
}

/// Errors produced by instruction decoding. All are fatal to execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// RTI requires the privileged exception mechanism, which this
    /// emulator deliberately does not implement.
    #[error("privileged opcode RTI is unsupported (instruction {0:#06x})")]
    PrivilegedOpcode(u16),

    #[error("reserved opcode (instruction {0:#06x})")]
    ReservedOpcode(u16),

    #[error("unknown trap vector {0:#04x}")]
    UnknownTrap(u16),
}
