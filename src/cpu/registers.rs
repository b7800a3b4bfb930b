//! LC-3 register file.
//!
//! The LC-3 has:
//! - R0-R7: 16-bit general-purpose registers (R7 doubles as the link
//!   register for JSR/JSRR)
//! - PC: 16-bit program counter
//! - COND: condition register holding exactly one of N/Z/P

use serde::{Deserialize, Serialize};

/// Number of general-purpose registers.
pub const NUM_GPRS: usize = 8;

/// Execution starts here by convention; the region below is reserved for
/// trap vectors and operating-system code.
pub const PC_START: u16 = 0x3000;

/// The link register written by JSR/JSRR.
pub const LINK_REG: usize = 7;

/// Condition flag: the sign class of the last value written to a
/// general-purpose register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CondFlag {
    Positive,
    Zero,
    Negative,
}

impl CondFlag {
    /// Bit encoding used by the BR condition mask (P=1, Z=2, N=4).
    pub fn bits(self) -> u16 {
        match self {
            CondFlag::Positive => 1,
            CondFlag::Zero => 1 << 1,
            CondFlag::Negative => 1 << 2,
        }
    }

    /// Classify a 16-bit value by its two's-complement sign.
    pub fn from_value(value: u16) -> Self {
        if value == 0 {
            CondFlag::Zero
        } else if value >> 15 == 1 {
            CondFlag::Negative
        } else {
            CondFlag::Positive
        }
    }
}

/// The LC-3 register file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registers {
    /// General-purpose registers R0-R7.
    pub r: [u16; NUM_GPRS],
    /// Program counter.
    pub pc: u16,
    /// Condition register. All registers start zeroed, so Zero is the
    /// consistent initial sign class.
    pub cond: CondFlag,
}

impl Registers {
    /// Create a zeroed register file with PC at the start address.
    pub fn new() -> Self {
        Self {
            r: [0; NUM_GPRS],
            pc: PC_START,
            cond: CondFlag::Zero,
        }
    }

    /// Re-derive the condition register from register `r`.
    ///
    /// Must be called after every instruction that writes a
    /// general-purpose register.
    pub fn update_flags(&mut self, r: u16) {
        self.cond = CondFlag::from_value(self.r[r as usize]);
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_initial_state() {
        let regs = Registers::new();
        assert_eq!(regs.r, [0; NUM_GPRS]);
        assert_eq!(regs.pc, PC_START);
        assert_eq!(regs.cond, CondFlag::Zero);
    }

    #[test]
    fn test_flag_classification() {
        assert_eq!(CondFlag::from_value(0), CondFlag::Zero);
        assert_eq!(CondFlag::from_value(1), CondFlag::Positive);
        assert_eq!(CondFlag::from_value(0x7FFF), CondFlag::Positive);
        assert_eq!(CondFlag::from_value(0x8000), CondFlag::Negative);
        assert_eq!(CondFlag::from_value(0xFFFF), CondFlag::Negative);
    }

    #[test]
    fn test_update_flags_tracks_register() {
        let mut regs = Registers::new();
        regs.r[3] = 0xFFFF;
        regs.update_flags(3);
        assert_eq!(regs.cond, CondFlag::Negative);

        regs.r[3] = 0;
        regs.update_flags(3);
        assert_eq!(regs.cond, CondFlag::Zero);
    }

    proptest! {
        // Exactly one of N/Z/P holds for every value, matching the sign
        // class of the value.
        #[test]
        fn prop_flag_trichotomy(value: u16) {
            let flag = CondFlag::from_value(value);
            let expected = if value == 0 {
                CondFlag::Zero
            } else if value & 0x8000 != 0 {
                CondFlag::Negative
            } else {
                CondFlag::Positive
            };
            prop_assert_eq!(flag, expected);
            // The mask encodings are mutually exclusive single bits.
            prop_assert_eq!(flag.bits().count_ones(), 1);
        }
    }
}
