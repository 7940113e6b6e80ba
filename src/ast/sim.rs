//! Decoded LS-8 instructions.
//!
//! The simulator fetches an opcode byte and its operand bytes from memory
//! and decodes them into a [`SimInstr`] before executing.
//!
//! ```
//! use ls8_ensemble::ast::Opcode;
//! use ls8_ensemble::ast::reg_consts::R0;
//! use ls8_ensemble::ast::sim::SimInstr;
//!
//! let instr = SimInstr::decode(Opcode::LDI, &[0, 8]).unwrap();
//! assert_eq!(instr, SimInstr::LDI(R0, 8));
//! assert_eq!(instr.to_string(), "LDI R0, 8");
//! ```
use crate::sim::alu::AluOp;
use crate::sim::SimErr;

use super::{Opcode, Reg};

/// An instruction, decoded together with its operands.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum SimInstr {
    /// Halt.
    HLT,
    /// Pop the return address into the PC.
    RET,
    /// Restore the context saved on interrupt entry.
    IRET,
    /// Push the register.
    PUSH(Reg),
    /// Pop into the register.
    POP(Reg),
    /// Print the register in decimal.
    PRN(Reg),
    /// Print the register as a character.
    PRA(Reg),
    /// Call the subroutine at the address in the register.
    CALL(Reg),
    /// Jump to the address in the register.
    JMP(Reg),
    /// Jump to the address in the register if equal.
    JEQ(Reg),
    /// Jump to the address in the register if not equal.
    JNE(Reg),
    /// `dr = imm`
    LDI(Reg, u8),
    /// `dr = mem[ar]`
    LD(Reg, Reg),
    /// `mem[ar] = sr`
    ST(Reg, Reg),
    /// An ALU operation on register A (and register B, for binary operations).
    ///
    /// For unary operations, both registers are the same.
    ALU(AluOp, Reg, Reg),
}

impl SimInstr {
    /// Decodes an instruction from its opcode and its operand bytes.
    ///
    /// `operands` must hold at least [`Opcode::operand_count`] bytes.
    /// Register operands outside of R0-R7 raise [`SimErr::InvalidRegister`].
    pub fn decode(opcode: Opcode, operands: &[u8]) -> Result<Self, SimErr> {
        let byte = |i: usize| operands.get(i)
            .copied()
            .ok_or(SimErr::InvalidInstrFormat);
        let reg = |i: usize| {
            let r = byte(i)?;
            Reg::try_from(r).map_err(|_| SimErr::InvalidRegister(r))
        };

        let instr = match opcode {
            Opcode::HLT  => SimInstr::HLT,
            Opcode::RET  => SimInstr::RET,
            Opcode::IRET => SimInstr::IRET,
            Opcode::PUSH => SimInstr::PUSH(reg(0)?),
            Opcode::POP  => SimInstr::POP(reg(0)?),
            Opcode::PRN  => SimInstr::PRN(reg(0)?),
            Opcode::PRA  => SimInstr::PRA(reg(0)?),
            Opcode::CALL => SimInstr::CALL(reg(0)?),
            Opcode::JMP  => SimInstr::JMP(reg(0)?),
            Opcode::JEQ  => SimInstr::JEQ(reg(0)?),
            Opcode::JNE  => SimInstr::JNE(reg(0)?),
            Opcode::LDI  => SimInstr::LDI(reg(0)?, byte(1)?),
            Opcode::LD   => SimInstr::LD(reg(0)?, reg(1)?),
            Opcode::ST   => SimInstr::ST(reg(0)?, reg(1)?),
            op => {
                let alu_op = AluOp::try_from(op.byte())?;
                let a = reg(0)?;
                let b = match alu_op.is_unary() {
                    true  => a,
                    false => reg(1)?,
                };
                SimInstr::ALU(alu_op, a, b)
            }
        };

        Ok(instr)
    }

    /// The opcode of this instruction.
    pub fn opcode(&self) -> Opcode {
        match self {
            SimInstr::HLT     => Opcode::HLT,
            SimInstr::RET     => Opcode::RET,
            SimInstr::IRET    => Opcode::IRET,
            SimInstr::PUSH(_) => Opcode::PUSH,
            SimInstr::POP(_)  => Opcode::POP,
            SimInstr::PRN(_)  => Opcode::PRN,
            SimInstr::PRA(_)  => Opcode::PRA,
            SimInstr::CALL(_) => Opcode::CALL,
            SimInstr::JMP(_)  => Opcode::JMP,
            SimInstr::JEQ(_)  => Opcode::JEQ,
            SimInstr::JNE(_)  => Opcode::JNE,
            SimInstr::LDI(..) => Opcode::LDI,
            SimInstr::LD(..)  => Opcode::LD,
            SimInstr::ST(..)  => Opcode::ST,
            SimInstr::ALU(op, ..) => op.opcode(),
        }
    }
}
impl std::fmt::Display for SimInstr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.opcode().mnemonic())?;
        match *self {
            SimInstr::HLT | SimInstr::RET | SimInstr::IRET => Ok(()),
            SimInstr::PUSH(r)
            | SimInstr::POP(r)
            | SimInstr::PRN(r)
            | SimInstr::PRA(r)
            | SimInstr::CALL(r)
            | SimInstr::JMP(r)
            | SimInstr::JEQ(r)
            | SimInstr::JNE(r) => write!(f, " {r}"),
            SimInstr::LDI(r, imm) => write!(f, " {r}, {imm}"),
            SimInstr::LD(a, b) | SimInstr::ST(a, b) => write!(f, " {a}, {b}"),
            SimInstr::ALU(op, a, _) if op.is_unary() => write!(f, " {a}"),
            SimInstr::ALU(_, a, b) => write!(f, " {a}, {b}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::reg_consts::{R0, R1, R7};
    use crate::ast::Opcode;
    use crate::sim::alu::AluOp;
    use crate::sim::SimErr;

    use super::SimInstr;

    #[test]
    fn test_decode_basic() {
        assert_eq!(SimInstr::decode(Opcode::HLT, &[]).unwrap(), SimInstr::HLT);
        assert_eq!(SimInstr::decode(Opcode::PRN, &[7]).unwrap(), SimInstr::PRN(R7));
        assert_eq!(SimInstr::decode(Opcode::ST, &[0, 1]).unwrap(), SimInstr::ST(R0, R1));
        assert_eq!(SimInstr::decode(Opcode::ADD, &[0, 1]).unwrap(), SimInstr::ALU(AluOp::Add, R0, R1));
        assert_eq!(SimInstr::decode(Opcode::NOT, &[1]).unwrap(), SimInstr::ALU(AluOp::Not, R1, R1));
    }

    #[test]
    fn test_decode_invalid_register() {
        assert!(matches!(SimInstr::decode(Opcode::PRN, &[8]), Err(SimErr::InvalidRegister(8))));
        assert!(matches!(SimInstr::decode(Opcode::ADD, &[0, 0xFF]), Err(SimErr::InvalidRegister(0xFF))));
        // LDI's second operand is an immediate, not a register
        assert_eq!(SimInstr::decode(Opcode::LDI, &[1, 0xFF]).unwrap(), SimInstr::LDI(R1, 0xFF));
    }

    #[test]
    fn test_decode_missing_operands() {
        assert!(matches!(SimInstr::decode(Opcode::LDI, &[0]), Err(SimErr::InvalidInstrFormat)));
    }

    #[test]
    fn test_display() {
        assert_eq!(SimInstr::HLT.to_string(), "HLT");
        assert_eq!(SimInstr::CALL(R1).to_string(), "CALL R1");
        assert_eq!(SimInstr::ALU(AluOp::Mul, R0, R1).to_string(), "MUL R0, R1");
        assert_eq!(SimInstr::ALU(AluOp::Inc, R0, R0).to_string(), "INC R0");
    }
}
