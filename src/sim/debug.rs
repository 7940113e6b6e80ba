//! Utilities to debug simulation.
//!
//! The key type here is [`Breakpoint`], which can be added to the [`Simulator`]'s
//! breakpoint set to cause the simulator to pause.
//!
//! Breakpoints are checked after each instruction cycle,
//! so they see the machine as the next instruction will.
//!
//! ```
//! use ls8_ensemble::sim::{Simulator, SimFlags};
//! use ls8_ensemble::sim::debug::{Breakpoint, Comparator};
//! use ls8_ensemble::ast::reg_consts::R0;
//!
//! let mut sim = Simulator::new(SimFlags::default());
//! sim.breakpoints.insert(Breakpoint::PC(0x06));
//! sim.breakpoints.insert(Breakpoint::Reg { reg: R0, value: Comparator::Ge(100) });
//!
//! let bp = Breakpoint::Mem { addr: 0xF4, value: Comparator::Ne(0) };
//! assert_eq!(format!("{bp:?}"), "Breakpoint(mem[0xF4] != 0)");
//! ```
use std::fmt::Write;

use crate::ast::{Opcode, Reg};

use super::Simulator;

/// Common breakpoints.
#[derive(PartialEq, Eq, Hash)]
pub enum Breakpoint {
    /// Break when the PC is equal to the given value.
    PC(u8),

    /// Break when the next instruction to run has the given opcode.
    Opcode(Opcode),

    /// Break when the provided register is set to a given value.
    Reg {
        /// Register to check.
        reg: Reg,
        /// Predicate to break against.
        value: Comparator
    },
    /// Break when the provided memory address holds a given value.
    Mem {
        /// Address to check.
        addr: u8,
        /// Predicate to break against.
        value: Comparator
    },
}

impl Breakpoint where Breakpoint: Send + Sync { /* assert Breakpoint is send/sync */ }

impl Breakpoint {
    /// Checks if a break should occur.
    pub fn check(&self, sim: &Simulator) -> bool {
        match self {
            Breakpoint::PC(expected) => expected == &sim.pc,
            Breakpoint::Opcode(op) => op.byte() == sim.mem.read(sim.pc),
            Breakpoint::Reg { reg, value: cmp } => cmp.check(sim.reg_file[*reg]),
            Breakpoint::Mem { addr, value: cmp } => cmp.check(sim.mem.read(*addr)),
        }
    }

    fn fmt_bp(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::PC(expected) => {
                write!(f, "PC == 0x{expected:02X}")?;
            },
            Self::Opcode(op) => {
                write!(f, "next == {op}")?;
            },
            Self::Reg { reg, value } => {
                write!(f, "{reg} ")?;
                value.fmt_cmp(f)?;
            },
            Self::Mem { addr, value } => {
                write!(f, "mem[0x{addr:02X}] ")?;
                value.fmt_cmp(f)?;
            },
        }
        Ok(())
    }
}
impl std::fmt::Debug for Breakpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Breakpoint(")?;
        self.fmt_bp(f)?;
        f.write_char(')')
    }
}
/// Predicate checking whether the current value is equal to the value.
#[derive(PartialEq, Eq, Hash, Debug)]
pub enum Comparator {
    /// Never breaks.
    Never,
    /// Break if the desired value is less than the provided value.
    Lt(u8),
    /// Break if the desired value is equal to the provided value.
    Eq(u8),
    /// Break if the desired value is less than or equal to the provided value.
    Le(u8),
    /// Break if the desired value is greater than the provided value.
    Gt(u8),
    /// Break if the desired value is not equal to the provided value.
    Ne(u8),
    /// Break if the desired value is greater than or equal to the provided value.
    Ge(u8),
    /// Always breaks.
    Always
}
impl Comparator {
    /// Checks if the operand passes the comparator.
    pub fn check(&self, operand: u8) -> bool {
        match *self {
            Comparator::Never  => false,
            Comparator::Lt(r)  => operand < r,
            Comparator::Eq(r)  => operand == r,
            Comparator::Le(r)  => operand <= r,
            Comparator::Gt(r)  => operand > r,
            Comparator::Ne(r)  => operand != r,
            Comparator::Ge(r)  => operand >= r,
            Comparator::Always => true,
        }
    }

    fn fmt_cmp(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Comparator::Never  => f.write_str("never"),
            Comparator::Lt(r)  => write!(f, "< {r}"),
            Comparator::Eq(r)  => write!(f, "== {r}"),
            Comparator::Le(r)  => write!(f, "<= {r}"),
            Comparator::Gt(r)  => write!(f, "> {r}"),
            Comparator::Ne(r)  => write!(f, "!= {r}"),
            Comparator::Ge(r)  => write!(f, ">= {r}"),
            Comparator::Always => f.write_str("always"),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::reg_consts::R3;
    use crate::ast::Opcode;
    use crate::sim::{SimFlags, Simulator};

    use super::{Breakpoint, Comparator};

    #[test]
    fn test_check() {
        let mut sim = Simulator::new(SimFlags::default());
        sim.load_program(&[Opcode::HLT.byte()]).unwrap();
        sim.reg_file[R3] = 40;
        sim.mem.write(0x80, 9);

        assert!(Breakpoint::PC(0).check(&sim));
        assert!(!Breakpoint::PC(1).check(&sim));
        assert!(Breakpoint::Opcode(Opcode::HLT).check(&sim));
        assert!(!Breakpoint::Opcode(Opcode::RET).check(&sim));
        assert!(Breakpoint::Reg { reg: R3, value: Comparator::Le(40) }.check(&sim));
        assert!(!Breakpoint::Reg { reg: R3, value: Comparator::Lt(40) }.check(&sim));
        assert!(Breakpoint::Mem { addr: 0x80, value: Comparator::Eq(9) }.check(&sim));
        assert!(!Breakpoint::Mem { addr: 0x80, value: Comparator::Never }.check(&sim));
    }

    #[test]
    fn test_debug_fmt() {
        assert_eq!(format!("{:?}", Breakpoint::PC(0x1F)), "Breakpoint(PC == 0x1F)");
        assert_eq!(format!("{:?}", Breakpoint::Opcode(Opcode::IRET)), "Breakpoint(next == IRET)");
        assert_eq!(
            format!("{:?}", Breakpoint::Reg { reg: R3, value: Comparator::Always }),
            "Breakpoint(R3 always)"
        );
    }
}
