//! The arithmetic-logic unit.
//!
//! The ALU operates register-to-register.
//! Every operation writes its result into register A, except for [`AluOp::Cmp`],
//! which only updates the [`Flags`].
//!
//! All results are 8 bits wide: arithmetic wraps and shifts discard overflowing bits.
//!
//! ```
//! use ls8_ensemble::ast::reg_consts::{R0, R1};
//! use ls8_ensemble::sim::alu::{self, AluOp};
//! use ls8_ensemble::sim::mem::RegFile;
//! use ls8_ensemble::sim::Flags;
//!
//! let mut regs = RegFile::new(&mut 0u8);
//! let mut fl = Flags::new();
//! regs[R0] = 200;
//! regs[R1] = 100;
//!
//! alu::apply(&mut regs, &mut fl, AluOp::Add, R0, R1).unwrap();
//! assert_eq!(regs[R0], 44);
//! ```
use crate::ast::{Opcode, Reg};

use super::mem::RegFile;
use super::{Flags, SimErr};

/// An operation the ALU can apply.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum AluOp {
    /// `A = A + B`
    Add,
    /// `A = A * B`
    Mul,
    /// `A = A & B`
    And,
    /// `A = A | B`
    Or,
    /// `A = A ^ B`
    Xor,
    /// `A = !A`
    Not,
    /// `A = A << B`
    Shl,
    /// `A = A >> B`
    Shr,
    /// `A = A % B`
    Mod,
    /// `A = A + 1`
    Inc,
    /// `A = A - 1`
    Dec,
    /// Compares A and B, setting the flags.
    Cmp,
}
impl AluOp {
    /// Whether this operation only reads register A.
    pub fn is_unary(self) -> bool {
        matches!(self, AluOp::Not | AluOp::Inc | AluOp::Dec)
    }

    /// The opcode which forwards to this operation.
    pub fn opcode(self) -> Opcode {
        match self {
            AluOp::Add => Opcode::ADD,
            AluOp::Mul => Opcode::MUL,
            AluOp::And => Opcode::AND,
            AluOp::Or  => Opcode::OR,
            AluOp::Xor => Opcode::XOR,
            AluOp::Not => Opcode::NOT,
            AluOp::Shl => Opcode::SHL,
            AluOp::Shr => Opcode::SHR,
            AluOp::Mod => Opcode::MOD,
            AluOp::Inc => Opcode::INC,
            AluOp::Dec => Opcode::DEC,
            AluOp::Cmp => Opcode::CMP,
        }
    }
}
impl TryFrom<u8> for AluOp {
    type Error = SimErr;

    /// Looks up the ALU operation for an opcode byte.
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match Opcode::try_from(value) {
            Ok(Opcode::ADD) => Ok(AluOp::Add),
            Ok(Opcode::MUL) => Ok(AluOp::Mul),
            Ok(Opcode::AND) => Ok(AluOp::And),
            Ok(Opcode::OR)  => Ok(AluOp::Or),
            Ok(Opcode::XOR) => Ok(AluOp::Xor),
            Ok(Opcode::NOT) => Ok(AluOp::Not),
            Ok(Opcode::SHL) => Ok(AluOp::Shl),
            Ok(Opcode::SHR) => Ok(AluOp::Shr),
            Ok(Opcode::MOD) => Ok(AluOp::Mod),
            Ok(Opcode::INC) => Ok(AluOp::Inc),
            Ok(Opcode::DEC) => Ok(AluOp::Dec),
            Ok(Opcode::CMP) => Ok(AluOp::Cmp),
            _ => Err(SimErr::UnsupportedAluOp(value)),
        }
    }
}

/// Applies an ALU operation to registers `a` and `b`.
///
/// Register `b` is ignored for unary operations.
///
/// # Errors
/// [`AluOp::Mod`] with `b == 0` fails with [`SimErr::DivideByZero`]
/// and leaves every register untouched.
pub fn apply(regs: &mut RegFile, fl: &mut Flags, op: AluOp, a: Reg, b: Reg) -> Result<(), SimErr> {
    let lhs = regs[a];
    let rhs = regs[b];

    let result = match op {
        AluOp::Add => lhs.wrapping_add(rhs),
        AluOp::Mul => lhs.wrapping_mul(rhs),
        AluOp::And => lhs & rhs,
        AluOp::Or  => lhs | rhs,
        AluOp::Xor => lhs ^ rhs,
        AluOp::Not => !lhs,
        // Shifting past the width of the register clears it.
        AluOp::Shl => lhs.checked_shl(u32::from(rhs)).unwrap_or(0),
        AluOp::Shr => lhs.checked_shr(u32::from(rhs)).unwrap_or(0),
        AluOp::Mod => lhs.checked_rem(rhs).ok_or(SimErr::DivideByZero)?,
        AluOp::Inc => lhs.wrapping_add(1),
        AluOp::Dec => lhs.wrapping_sub(1),
        AluOp::Cmp => {
            fl.set_cmp(lhs.cmp(&rhs));
            return Ok(());
        }
    };

    regs[a] = result;
    Ok(())
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use crate::ast::reg_consts::{R0, R1, R2};
    use crate::sim::mem::RegFile;
    use crate::sim::{Flags, SimErr};

    use super::{apply, AluOp};

    fn run(op: AluOp, a: u8, b: u8) -> (u8, Flags) {
        let mut regs = RegFile::new(&mut 0u8);
        let mut fl = Flags::new();
        regs[R0] = a;
        regs[R1] = b;
        apply(&mut regs, &mut fl, op, R0, R1).unwrap();
        (regs[R0], fl)
    }

    proptest! {
        #[test]
        fn test_binary_ops_are_masked(a in any::<u8>(), b in any::<u8>()) {
            let (wa, wb) = (u32::from(a), u32::from(b));

            prop_assert_eq!(u32::from(run(AluOp::Add, a, b).0), (wa + wb) & 0xFF);
            prop_assert_eq!(u32::from(run(AluOp::Mul, a, b).0), (wa * wb) & 0xFF);
            prop_assert_eq!(u32::from(run(AluOp::And, a, b).0), (wa & wb) & 0xFF);
            prop_assert_eq!(u32::from(run(AluOp::Or,  a, b).0), (wa | wb) & 0xFF);
            prop_assert_eq!(u32::from(run(AluOp::Xor, a, b).0), (wa ^ wb) & 0xFF);
            prop_assert_eq!(u32::from(run(AluOp::Not, a, b).0), !wa & 0xFF);
            prop_assert_eq!(u32::from(run(AluOp::Inc, a, b).0), (wa + 1) & 0xFF);
            prop_assert_eq!(u32::from(run(AluOp::Dec, a, b).0), wa.wrapping_sub(1) & 0xFF);
        }

        #[test]
        fn test_shifts_are_masked(a in any::<u8>(), b in 0u8..16) {
            let wa = u64::from(a);
            prop_assert_eq!(u64::from(run(AluOp::Shl, a, b).0), (wa << b) & 0xFF);
            prop_assert_eq!(u64::from(run(AluOp::Shr, a, b).0), (wa >> b) & 0xFF);
        }

        #[test]
        fn test_mod_nonzero(a in any::<u8>(), b in 1u8..=255) {
            prop_assert_eq!(run(AluOp::Mod, a, b).0, a % b);
        }

        #[test]
        fn test_cmp_sets_exactly_one_flag(a in any::<u8>(), b in any::<u8>()) {
            let (result, fl) = run(AluOp::Cmp, a, b);

            // CMP does not write to registers
            prop_assert_eq!(result, a);
            prop_assert_eq!(fl.get().count_ones(), 1);
            prop_assert_eq!(fl.is_eq(), a == b);
            prop_assert_eq!(fl.is_gt(), a > b);
            prop_assert_eq!(fl.is_lt(), a < b);
        }
    }

    #[test]
    fn test_cmp_clears_stale_flags() {
        let mut regs = RegFile::new(&mut 0u8);
        let mut fl = Flags::new();

        regs[R0] = 1;
        regs[R1] = 2;
        apply(&mut regs, &mut fl, AluOp::Cmp, R0, R1).unwrap();
        assert!(fl.is_lt());

        regs[R0] = 2;
        apply(&mut regs, &mut fl, AluOp::Cmp, R0, R1).unwrap();
        assert!(fl.is_eq());
        assert!(!fl.is_lt());
        assert!(!fl.is_gt());
    }

    #[test]
    fn test_mod_by_zero() {
        let mut regs = RegFile::new(&mut 0u8);
        let mut fl = Flags::new();
        regs[R0] = 17;
        regs[R1] = 0;
        regs[R2] = 3;

        let result = apply(&mut regs, &mut fl, AluOp::Mod, R0, R1);
        assert!(matches!(result, Err(SimErr::DivideByZero)));
        assert_eq!(regs[R0], 17);
        assert_eq!(regs[R1], 0);
        assert_eq!(regs[R2], 3);
    }

    #[test]
    fn test_unary_ignores_b() {
        let mut regs = RegFile::new(&mut 0u8);
        let mut fl = Flags::new();
        regs[R0] = 0xFF;
        regs[R1] = 0x55;

        apply(&mut regs, &mut fl, AluOp::Inc, R0, R1).unwrap();
        assert_eq!(regs[R0], 0x00);
        apply(&mut regs, &mut fl, AluOp::Dec, R0, R1).unwrap();
        assert_eq!(regs[R0], 0xFF);
        apply(&mut regs, &mut fl, AluOp::Not, R0, R1).unwrap();
        assert_eq!(regs[R0], 0x00);
        assert_eq!(regs[R1], 0x55);
    }

    #[test]
    fn test_unsupported_op() {
        // SUB and DIV are ALU-encoded but not executed by this machine
        assert!(matches!(AluOp::try_from(0b1010_0001), Err(SimErr::UnsupportedAluOp(0xA1))));
        assert!(matches!(AluOp::try_from(0b1010_0011), Err(SimErr::UnsupportedAluOp(0xA3))));
        // non-ALU opcode
        assert!(matches!(AluOp::try_from(0b1000_0010), Err(SimErr::UnsupportedAluOp(0x82))));
        assert_eq!(AluOp::try_from(0b1010_0111).unwrap(), AluOp::Cmp);
    }

    #[test]
    fn test_op_bytes() {
        let ops = [
            (AluOp::Add, 0xA0), (AluOp::Mul, 0xA2), (AluOp::Mod, 0xA4),
            (AluOp::Cmp, 0xA7), (AluOp::And, 0xA8), (AluOp::Or,  0xAA),
            (AluOp::Xor, 0xAB), (AluOp::Shl, 0xAC), (AluOp::Shr, 0xAD),
            (AluOp::Inc, 0x65), (AluOp::Dec, 0x66), (AluOp::Not, 0x69),
        ];
        for (op, byte) in ops {
            assert_eq!(op.opcode().byte(), byte, "{op:?}");
            assert_eq!(AluOp::try_from(byte).unwrap(), op, "0x{byte:02X}");
            assert_eq!(AluOp::try_from(op.opcode().byte()).unwrap(), op);
        }
    }
}
