//! Components describing LS-8 machine code.
//!
//! This module holds:
//! - [`Reg`]: a register index (R0-R7),
//! - [`Opcode`]: the mnemonic table, mapping each instruction byte to its mnemonic,
//! - and [`sim::SimInstr`] (a fully decoded instruction with its operands).
//!
//! # Opcode layout
//!
//! Every LS-8 opcode byte encodes some of its own properties:
//!
//! ```text
//!   operand count
//!   |  ALU operation
//!   |  | sets PC
//!   |  | |  instruction identifier
//!   V  V V  V
//!   AA B C DDDD
//! ```
//!
//! These are exposed as [`Opcode::operand_count`], [`Opcode::is_alu`] and [`Opcode::sets_pc`].
//!
//! ```
//! use ls8_ensemble::ast::Opcode;
//!
//! assert_eq!(Opcode::try_from(0b1000_0010).unwrap(), Opcode::LDI);
//! assert_eq!(Opcode::LDI.operand_count(), 2);
//! assert!(Opcode::ADD.is_alu());
//! assert!(Opcode::JMP.sets_pc());
//! ```

pub mod sim;

use std::num::TryFromIntError;

use crate::sim::SimErr;

/// A register. Must be between 0 and 7.
///
/// This `Reg` struct can either be constructed by selecting a register from [`reg_consts`],
/// or by using [`Reg::try_from`].
///
/// Three registers have architectural roles:
/// - R5 is the interrupt mask ([`reg_consts::IM`]),
/// - R6 is the interrupt status ([`reg_consts::IS`]),
/// - R7 is the stack pointer ([`reg_consts::SP`]).
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub struct Reg(pub(crate) u8);

/// Register constants!
pub mod reg_consts {
    use super::Reg;

    /// The 0th register in the register file.
    pub const R0: Reg = Reg(0);
    /// The 1st register in the register file.
    pub const R1: Reg = Reg(1);
    /// The 2nd register in the register file.
    pub const R2: Reg = Reg(2);
    /// The 3rd register in the register file.
    pub const R3: Reg = Reg(3);
    /// The 4th register in the register file.
    pub const R4: Reg = Reg(4);
    /// The 5th register in the register file.
    pub const R5: Reg = Reg(5);
    /// The 6th register in the register file.
    pub const R6: Reg = Reg(6);
    /// The 7th register in the register file.
    pub const R7: Reg = Reg(7);

    /// Interrupt mask. Each set bit enables the corresponding interrupt line.
    pub const IM: Reg = R5;
    /// Interrupt status. Each set bit is a pending interrupt.
    pub const IS: Reg = R6;
    /// Stack pointer. The stack grows downward.
    pub const SP: Reg = R7;
}
impl Reg {
    /// Gets the register number of this [`Reg`]. This is always between 0 and 7.
    pub fn reg_no(self) -> u8 {
        self.0
    }
}
impl std::fmt::Display for Reg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "R{}", self.0)
    }
}
impl From<Reg> for usize {
    // Used for indexing the reg file in [`crate::sim::mem::RegFile`].
    fn from(value: Reg) -> Self {
        usize::from(value.0)
    }
}
impl TryFrom<u8> for Reg {
    type Error = TryFromIntError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0..=7 => Ok(Reg(value)),
            // HACKy, but there's no other way to create this error
            _     => u8::try_from(256).map(|_| unreachable!("should've been TryFromIntError")),
        }
    }
}

macro_rules! opcode_table {
    ($($(#[$attr:meta])* $name:ident = $value:literal),+ $(,)?) => {
        /// An LS-8 instruction opcode.
        ///
        /// The discriminant of each variant is the byte that encodes it in memory.
        #[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
        #[repr(u8)]
        pub enum Opcode {
            $(
                $(#[$attr])*
                $name = $value
            ),+
        }

        impl Opcode {
            /// Every opcode the simulator can execute.
            pub const ALL: &'static [Opcode] = &[$(Opcode::$name),+];

            /// The assembly mnemonic for this opcode.
            pub fn mnemonic(self) -> &'static str {
                match self {
                    $(Opcode::$name => stringify!($name)),+
                }
            }
        }

        impl TryFrom<u8> for Opcode {
            type Error = SimErr;

            fn try_from(value: u8) -> Result<Self, Self::Error> {
                match value {
                    $($value => Ok(Opcode::$name)),+,
                    b => Err(SimErr::IllegalOpcode(b))
                }
            }
        }
    };
}
opcode_table! {
    /// Halt the machine.
    HLT  = 0b0000_0001,
    /// Return from subroutine.
    RET  = 0b0001_0001,
    /// Return from interrupt handler.
    IRET = 0b0001_0011,
    /// Push a register onto the stack.
    PUSH = 0b0100_0101,
    /// Pop the top of the stack into a register.
    POP  = 0b0100_0110,
    /// Print a register as a decimal number.
    PRN  = 0b0100_0111,
    /// Print a register as a character.
    PRA  = 0b0100_1000,
    /// Call the subroutine whose address is in a register.
    CALL = 0b0101_0000,
    /// Jump to the address in a register.
    JMP  = 0b0101_0100,
    /// Jump to the address in a register if the equal flag is set.
    JEQ  = 0b0101_0101,
    /// Jump to the address in a register if the equal flag is clear.
    JNE  = 0b0101_0110,
    /// Increment a register.
    INC  = 0b0110_0101,
    /// Decrement a register.
    DEC  = 0b0110_0110,
    /// Bitwise-NOT a register.
    NOT  = 0b0110_1001,
    /// Load an immediate into a register.
    LDI  = 0b1000_0010,
    /// Load a register from the memory address held in another register.
    LD   = 0b1000_0011,
    /// Store a register to the memory address held in another register.
    ST   = 0b1000_0100,
    /// Add two registers.
    ADD  = 0b1010_0000,
    /// Multiply two registers.
    MUL  = 0b1010_0010,
    /// Remainder of dividing two registers.
    MOD  = 0b1010_0100,
    /// Compare two registers, setting the flags.
    CMP  = 0b1010_0111,
    /// Bitwise-AND two registers.
    AND  = 0b1010_1000,
    /// Bitwise-OR two registers.
    OR   = 0b1010_1010,
    /// Bitwise-XOR two registers.
    XOR  = 0b1010_1011,
    /// Shift a register left by another register.
    SHL  = 0b1010_1100,
    /// Shift a register right by another register.
    SHR  = 0b1010_1101,
}

impl Opcode {
    /// The byte this opcode is encoded as.
    pub const fn byte(self) -> u8 {
        self as u8
    }
    /// The number of operand bytes following this opcode (`byte[7..8]`).
    pub fn operand_count(self) -> u8 {
        self.byte() >> 6
    }
    /// The number of bytes this instruction occupies (opcode plus operands).
    pub fn width(self) -> u8 {
        self.operand_count() + 1
    }
    /// Whether this opcode is forwarded to the ALU (`byte[5]`).
    pub fn is_alu(self) -> bool {
        (self.byte() >> 5) & 1 != 0
    }
    /// Whether this opcode takes full control of the PC (`byte[4]`).
    ///
    /// If false, the PC is advanced past the instruction once it executes.
    pub fn sets_pc(self) -> bool {
        (self.byte() >> 4) & 1 != 0
    }
}
impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mnemonic())
    }
}

#[cfg(test)]
mod tests {
    use super::Opcode;
    use crate::sim::SimErr;

    #[test]
    fn test_opcode_roundtrip() {
        for &op in Opcode::ALL {
            assert_eq!(Opcode::try_from(op.byte()).unwrap(), op);
        }
        assert!(matches!(Opcode::try_from(0x00), Err(SimErr::IllegalOpcode(0x00))));
        assert!(matches!(Opcode::try_from(0xA1), Err(SimErr::IllegalOpcode(0xA1))));
    }

    #[test]
    fn test_opcode_layout() {
        assert_eq!(Opcode::HLT.operand_count(), 0);
        assert_eq!(Opcode::PRN.operand_count(), 1);
        assert_eq!(Opcode::LDI.operand_count(), 2);
        assert_eq!(Opcode::LDI.width(), 3);

        let alu: Vec<_> = Opcode::ALL.iter().filter(|op| op.is_alu()).collect();
        assert_eq!(alu.len(), 12);

        let sets_pc: Vec<_> = Opcode::ALL.iter()
            .filter(|op| op.sets_pc())
            .map(|op| op.mnemonic())
            .collect();
        assert_eq!(sets_pc, ["RET", "IRET", "CALL", "JMP", "JEQ", "JNE"]);
    }
}
