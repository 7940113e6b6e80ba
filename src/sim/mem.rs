//! Memory handling for the LS-8 simulator.
//!
//! This module consists of:
//! - [`Mem`]: The memory.
//! - [`RegFile`]: The register file.
//! - [`MachineInitStrategy`]: How memory and registers are filled before a program is loaded.
//!
//! Every memory cell and every register holds exactly one byte,
//! so every value the machine can store is already masked to 8 bits.

use rand::rngs::StdRng;
use rand::Rng;

use crate::ast::Reg;

use super::SimErr;

/// The number of addressable bytes in memory.
pub const MEM_SIZE: usize = 1 << 8;

/// Trait that describes types that can be used to create the initial contents of memory and registers.
pub trait ByteFiller {
    /// Generate the data.
    fn generate(&mut self) -> u8;
}
impl ByteFiller for () {
    /// This creates unseeded, non-deterministic values.
    fn generate(&mut self) -> u8 {
        rand::random()
    }
}
impl ByteFiller for u8 {
    /// Sets each byte to the given value.
    fn generate(&mut self) -> u8 {
        *self
    }
}
impl ByteFiller for StdRng {
    /// This creates values from the standard random number generator.
    ///
    /// This can be used to create deterministic, seeded values.
    fn generate(&mut self) -> u8 {
        self.gen()
    }
}

/// Strategy used to initialize the `reg_file` and `mem` of the [`Simulator`].
///
/// The LS-8 starts with zeroed memory and registers,
/// which is what the default strategy does.
/// The random strategies are useful to flush out programs
/// which read memory or registers before writing them.
///
/// [`Simulator`]: super::Simulator
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum MachineInitStrategy {
    /// Initializes each byte randomly and non-deterministically.
    Unseeded,

    /// Initializes each byte randomly and deterministically.
    Seeded {
        /// The seed the RNG was initialized with.
        seed: u64
    },

    /// Initializes each byte to a known value.
    Known {
        /// The value to initialize each byte to.
        value: u8
    }
}
impl Default for MachineInitStrategy {
    fn default() -> Self {
        MachineInitStrategy::Known { value: 0 }
    }
}

impl MachineInitStrategy {
    pub(super) fn generator(&self) -> impl ByteFiller {
        use rand::SeedableRng;

        match self {
            MachineInitStrategy::Unseeded => MIGenerator::Unseeded,
            MachineInitStrategy::Seeded { seed } => MIGenerator::Seeded(Box::new(StdRng::seed_from_u64(*seed))),
            MachineInitStrategy::Known { value } => MIGenerator::Known(*value),
        }
    }
}

enum MIGenerator {
    Unseeded,
    Seeded(Box<StdRng>),
    Known(u8)
}
impl ByteFiller for MIGenerator {
    fn generate(&mut self) -> u8 {
        match self {
            MIGenerator::Unseeded  => ().generate(),
            MIGenerator::Seeded(r) => r.generate(),
            MIGenerator::Known(k)  => k.generate(),
        }
    }
}

/// Memory.
///
/// This is addressed with any `u8` (8-bit address), so [`Mem::read`] and [`Mem::write`] cannot fail.
///
/// Addresses computed by the simulator (such as `PC + 2` while fetching operands) can exceed
/// the address space. Those go through [`Mem::read_at`], which raises [`SimErr::AccessViolation`]
/// instead of wrapping around.
///
/// ```
/// use ls8_ensemble::sim::mem::Mem;
///
/// let mut mem = Mem::new(&mut 0u8);
/// mem.write(0xF4, 11);
/// assert_eq!(mem.read(0xF4), 11);
/// assert_eq!(mem.read_at(0x00F4).unwrap(), 11);
/// assert!(mem.read_at(0x0100).is_err());
/// ```
#[derive(Debug, Clone)]
pub struct Mem {
    data: Box<[u8; MEM_SIZE]>
}
impl Mem {
    /// Creates a new memory with a provided byte creation strategy.
    pub fn new(filler: &mut impl ByteFiller) -> Self {
        Self {
            data: Box::new(std::array::from_fn(|_| filler.generate()))
        }
    }

    /// Copies a program image into memory, starting at address 0.
    ///
    /// # Errors
    /// If the image is larger than memory, this fails with [`SimErr::ProgramTooLarge`]
    /// without writing anything.
    pub fn copy_program(&mut self, program: &[u8]) -> Result<(), SimErr> {
        let dest = self.data
            .get_mut(..program.len())
            .ok_or(SimErr::ProgramTooLarge(program.len()))?;

        dest.copy_from_slice(program);
        Ok(())
    }

    /// Reads the byte at the given address.
    pub fn read(&self, addr: u8) -> u8 {
        self.data[usize::from(addr)]
    }

    /// Writes the byte to the given address.
    pub fn write(&mut self, addr: u8, data: u8) {
        self.data[usize::from(addr)] = data;
    }

    /// Fallibly reads the byte at a computed address, erroring if the address is outside of memory.
    pub fn read_at(&self, addr: u16) -> Result<u8, SimErr> {
        self.data.get(usize::from(addr))
            .copied()
            .ok_or(SimErr::AccessViolation(addr))
    }

    /// Gets a view of all of memory.
    pub fn as_slice(&self) -> &[u8] {
        &*self.data
    }
    /// Gets a mutable view of all of memory.
    pub fn as_slice_mut(&mut self) -> &mut [u8] {
        &mut *self.data
    }
}

/// The register file.
///
/// This struct can be indexed with a [`Reg`]
/// (which can be constructed using the [`crate::ast::reg_consts`] module or via [`Reg::try_from`]).
///
/// # Example
///
/// ```
/// use ls8_ensemble::sim::mem::RegFile;
/// use ls8_ensemble::ast::reg_consts::{R0, SP};
///
/// let mut reg = RegFile::new(&mut 0u8);
/// reg[R0] = 11;
/// assert_eq!(reg[R0], 11);
/// assert_eq!(reg[SP], 0);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegFile([u8; 8]);
impl RegFile {
    /// Creates a register file with data from the filler.
    pub fn new(filler: &mut impl ByteFiller) -> Self {
        Self(std::array::from_fn(|_| filler.generate()))
    }

    /// Gets the registers as an array, indexed by register number.
    pub fn as_array(&self) -> &[u8; 8] {
        &self.0
    }
}
impl std::ops::Index<Reg> for RegFile {
    type Output = u8;

    fn index(&self, index: Reg) -> &Self::Output {
        &self.0[usize::from(index)]
    }
}
impl std::ops::IndexMut<Reg> for RegFile {
    fn index_mut(&mut self, index: Reg) -> &mut Self::Output {
        &mut self.0[usize::from(index)]
    }
}

#[cfg(test)]
mod tests {
    use crate::sim::SimErr;

    use super::{Mem, MachineInitStrategy, ByteFiller, MEM_SIZE};

    #[test]
    fn test_copy_program() {
        let mut mem = Mem::new(&mut 0xAAu8);
        mem.copy_program(&[1, 2, 3]).unwrap();
        assert_eq!(&mem.as_slice()[..4], &[1, 2, 3, 0xAA]);

        // A full-size image fits exactly.
        mem.copy_program(&[7; MEM_SIZE]).unwrap();
        assert!(mem.as_slice().iter().all(|&b| b == 7));
    }

    #[test]
    fn test_copy_program_too_large() {
        let mut mem = Mem::new(&mut 0u8);
        let result = mem.copy_program(&[1; MEM_SIZE + 1]);
        assert!(matches!(result, Err(SimErr::ProgramTooLarge(257))));
        // nothing was written
        assert!(mem.as_slice().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_read_at_bounds() {
        let mut mem = Mem::new(&mut 0u8);
        mem.write(0xFF, 9);
        assert_eq!(mem.read_at(0xFF).unwrap(), 9);
        assert!(matches!(mem.read_at(0x100), Err(SimErr::AccessViolation(0x100))));
    }

    #[test]
    fn test_seeded_init_is_deterministic() {
        let strategy = MachineInitStrategy::Seeded { seed: 2110 };
        let a = Mem::new(&mut strategy.generator());
        let b = Mem::new(&mut strategy.generator());
        assert_eq!(a.as_slice(), b.as_slice());

        let mut known = MachineInitStrategy::default().generator();
        assert_eq!(known.generate(), 0);
    }
}
