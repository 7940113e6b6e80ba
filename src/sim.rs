//! Simulating and execution for LS-8 machine code.
//!
//! This module is focused on executing program images (i.e., the bytes produced by [`parse_program`]).
//!
//! This module consists of:
//! - [`Simulator`]: The struct that simulates a program image.
//! - [`mem`]: The module handling memory and the register file.
//! - [`alu`]: The module handling arithmetic and logic operations.
//! - [`device`]: The module handling the timer, keyboard, display, and general handling of external devices.
//! - [`debug`]: The module handling types of breakpoints for the simulator.
//! - [`frame`]: The module handling the frame stack and call frame management.
//!
//! # Usage
//!
//! To simulate some code, you need to instantiate a Simulator and load a program image into it:
//!
//! ```
//! use ls8_ensemble::parse::parse_program;
//! use ls8_ensemble::sim::{Simulator, SimFlags};
//! use ls8_ensemble::sim::device::BufferedDisplay;
//!
//! let src = "
//!     10000010 # LDI R0,8
//!     00000000
//!     00001000
//!     10000010 # LDI R1,9
//!     00000001
//!     00001001
//!     10100000 # ADD R0,R1
//!     00000000
//!     00000001
//!     01000111 # PRN R0
//!     00000000
//!     00000001 # HLT
//! ";
//! let program = parse_program(src).unwrap();
//!
//! let mut sim = Simulator::new(SimFlags::default());
//! let display = BufferedDisplay::default();
//! sim.device_handler.set_display(display.clone());
//! sim.load_program(&program).unwrap();
//!
//! sim.run().unwrap();
//! assert!(sim.hit_halt());
//! assert_eq!(&**display.get_buffer().read().unwrap(), b"17\n");
//! ```
//!
//! ## Flags
//!
//! Here, we define `sim` to have the default flags.
//! We could also configure the simulator by editing the flags. For example,
//! if we wish to fill memory with seeded random bytes instead of zeroes:
//!
//! ```
//! # use ls8_ensemble::sim::{Simulator, SimFlags};
//! use ls8_ensemble::sim::mem::MachineInitStrategy;
//!
//! let sim = Simulator::new(SimFlags {
//!     machine_init: MachineInitStrategy::Seeded { seed: 2110 },
//!     ..Default::default()
//! });
//! ```
//!
//! All of the available flags can be found in [`SimFlags`].
//!
//! ## Execution
//!
//! Beyond the basic [`Simulator::run`] (which runs until halting),
//! there are also:
//! - [`Simulator::step_in`], [`Simulator::step_out`], [`Simulator::step_over`]: manual step-by-step simulation
//! - [`Simulator::run_while`], [`Simulator::run_with_limit`]: more advanced programmatic execution
//!
//! ```
//! use ls8_ensemble::sim::Simulator;
//! use ls8_ensemble::ast::reg_consts::R0;
//!
//! let mut sim = Simulator::new(Default::default());
//! sim.load_program(&[
//!     0b1000_0010, 0, 3, // LDI R0,3
//!     0b0110_0101, 0,    // INC R0
//!     0b0110_0101, 0,    // INC R0
//!     0b0000_0001,       // HLT
//! ]).unwrap();
//!
//! // Running step by step:
//! sim.step_in().unwrap();
//! assert_eq!(sim.reg_file[R0], 3);
//! sim.step_in().unwrap();
//! assert_eq!(sim.reg_file[R0], 4);
//! sim.step_in().unwrap();
//! assert_eq!(sim.reg_file[R0], 5);
//! assert_eq!(sim.pc, 7);
//! ```
//!
//! ## Querying State
//!
//! Most state is exposed directly:
//! - The PC is the `sim.pc` field.
//! - The flags register is the `sim.fl` field. See [`Flags`].
//! - The register file is the `sim.reg_file` field. R5-R7 double as IM, IS, and SP
//!   (see [`crate::ast::reg_consts`]).
//! - Memory is the `sim.mem` field.
//!
//! The interrupt enable state is only changed by the interrupt controller and `IRET`,
//! so it is read-only, through [`Simulator::interrupts_enabled`].
//!
//! ### Frames
//!
//! The simulator also keeps track of call frame information, accessible on the `frame_stack` field of [`Simulator`].
//!
//! **If `debug_frames` is not enabled in [`SimFlags`]**, the only information the [`Simulator`] keeps track of
//! is the number of frames deep the simulator is (via [`FrameStack::len`]):
//! - During a `CALL` instruction or when entering an interrupt handler, the frame count increases by 1.
//! - During a `RET` or `IRET` instruction, the frame count decreases by 1.
//!
//! **If `debug_frames` is enabled in [`SimFlags`]**, the simulator also records
//! each frame's return address, callee address, and stack pointer.
//! These are accessible via the [`FrameStack::frames`] method.
//!
//! ## Debugging with breakpoints
//!
//! Breakpoints are accessible through the `breakpoints` field on [`Simulator`].
//!
//! To add a breakpoint, simply insert a [`Breakpoint`] and
//! it will break if its condition is met during all execution functions (except [`Simulator::step_in`]).
//!
//! ```
//! use ls8_ensemble::sim::Simulator;
//! use ls8_ensemble::sim::debug::Breakpoint;
//!
//! let program = [
//!     0b0110_0101, 0, // INC R0
//!     0b0110_0101, 0, // INC R0
//!     0b0110_0101, 0, // INC R0
//!     0b0000_0001,    // HLT
//! ];
//! let mut sim = Simulator::new(Default::default());
//! sim.load_program(&program).unwrap();
//!
//! // Without breakpoint
//! sim.run().unwrap();
//! assert_eq!(sim.pc, 6);
//!
//! // With breakpoint
//! sim.reset();
//! sim.load_program(&program).unwrap();
//! sim.breakpoints.insert(Breakpoint::PC(4));
//! sim.run().unwrap();
//! assert!(sim.hit_breakpoint());
//! assert_eq!(sim.pc, 4);
//! ```
//!
//! ## Interrupts and external devices
//!
//! At the start of every instruction cycle, the simulator polls its [`DeviceHandler`]:
//! - the timer ([`device::TimerDevice`]) raises line 0 once every interval (1 second by default),
//! - the keyboard writes an available key to [`KEY_BUFFER`] and raises line 1,
//! - and any added [`ExternalDevice`] can raise a line of its own.
//!
//! Raised lines are latched into IS. If interrupts are enabled and a latched line is
//! unmasked by IM, the lowest such line is serviced: the machine state is pushed,
//! and the PC is loaded from the interrupt vector table at [`INT_VECTOR_TABLE`].
//!
//! ```
//! use ls8_ensemble::ast::reg_consts::{IM, R1};
//! use ls8_ensemble::sim::Simulator;
//! use ls8_ensemble::sim::device::{BufferedKeyboard, KEY_BUFFER};
//!
//! let mut sim = Simulator::new(Default::default());
//! sim.device_handler.timer.enabled = false;
//! let keyboard = BufferedKeyboard::default();
//! sim.device_handler.set_keyboard(keyboard.clone());
//!
//! sim.load_program(&[
//!     0b1000_0010, 0, KEY_BUFFER, // LDI R0,0xF4
//!     0b1000_0011, 1, 0,          // LD R1,R0
//!     0b0000_0001,                // HLT
//! ]).unwrap();
//! // no interrupts are unmasked, but the key still lands in the key buffer
//! assert_eq!(sim.reg_file[IM], 0);
//!
//! keyboard.get_buffer().write().unwrap().push_back(b'q');
//! sim.run().unwrap();
//! assert_eq!(sim.mem.read(KEY_BUFFER), b'q');
//! assert_eq!(sim.reg_file[R1], b'q');
//! ```
//!
//! [`parse_program`]: crate::parse::parse_program
//! [`Breakpoint`]: self::debug::Breakpoint
//! [`FrameStack::len`]: self::frame::FrameStack::len
//! [`FrameStack::frames`]: self::frame::FrameStack::frames
//! [`KEY_BUFFER`]: self::device::KEY_BUFFER
//! [`ExternalDevice`]: self::device::ExternalDevice
pub mod mem;
pub mod alu;
pub mod debug;
pub mod frame;
pub mod device;

use std::borrow::Cow;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::ast::reg_consts::{IM, IS, R0, R1, R2, R3, R4, R5, R6, SP};
use crate::ast::sim::SimInstr;
use crate::ast::Opcode;
use debug::Breakpoint;
use device::{DeviceHandler, KEY_BUFFER};

use self::frame::{Frame, FrameStack, FrameType};
use self::mem::{MachineInitStrategy, Mem, RegFile};

/// Errors that can occur during simulation.
///
/// All of these are fatal: the simulator stops on the instruction that raised them.
#[derive(Debug)]
pub enum SimErr {
    /// The byte at the PC is not a recognized opcode.
    IllegalOpcode(u8),
    /// The opcode was recognized, but its operands could not be decoded.
    InvalidInstrFormat,
    /// An ALU operation was requested with an opcode the ALU does not implement.
    UnsupportedAluOp(u8),
    /// `MOD` was executed with a zero divisor.
    DivideByZero,
    /// A register operand was outside of R0-R7.
    InvalidRegister(u8),
    /// An address outside of memory was computed (such as the PC running off the end of memory).
    AccessViolation(u16),
    /// The program image is larger than memory.
    ProgramTooLarge(usize),
}
impl std::fmt::Display for SimErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimErr::IllegalOpcode(b)     => write!(f, "Instruction not recognized: {b}"),
            SimErr::InvalidInstrFormat   => f.write_str("simulator executed invalid instruction"),
            SimErr::UnsupportedAluOp(b)  => write!(f, "ALU operation not supported: 0b{b:08b}"),
            SimErr::DivideByZero         => f.write_str("attempted modulo by zero (division by zero)"),
            SimErr::InvalidRegister(r)   => write!(f, "invalid register R{r}"),
            SimErr::AccessViolation(a)   => write!(f, "access violation at address 0x{a:03X}"),
            SimErr::ProgramTooLarge(len) => write!(f, "program is {len} bytes, which does not fit in memory"),
        }
    }
}
impl std::error::Error for SimErr {}
impl crate::err::Error for SimErr {
    fn help(&self) -> Option<Cow<str>> {
        match self {
            SimErr::IllegalOpcode(_) => Some("the PC may have run into data, check jump and call targets".into()),
            SimErr::InvalidInstrFormat => None,
            SimErr::UnsupportedAluOp(_) => None,
            SimErr::DivideByZero => Some("check the second operand of MOD is nonzero before executing it".into()),
            SimErr::InvalidRegister(_) => Some("register operands must be between 0 and 7".into()),
            SimErr::AccessViolation(_) => Some("the program may be missing a HLT at its end".into()),
            SimErr::ProgramTooLarge(_) => Some(format!("programs can be at most {} bytes", mem::MEM_SIZE).into()),
        }
    }
}

/// Anything that can cause a step to abruptly fail to finish.
enum StepBreak {
    /// A halt was executed.
    Halt,
    /// A simulation error occurred.
    Err(SimErr),
}
impl From<SimErr> for StepBreak {
    fn from(value: SimErr) -> Self {
        Self::Err(value)
    }
}

/// Reason for why execution paused if it wasn't due to an error.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
enum PauseCondition {
    /// Program reached a halt.
    Halt,
    /// MCR was turned off from outside the simulator.
    MCROff,
    /// Program hit a breakpoint.
    Breakpoint,
    /// Program hit a tripwire condition.
    Tripwire,
    /// Program hit an error and did not pause successfully.
    #[default]
    Unsuccessful
}

/// The address of the interrupt vector table.
///
/// The handler for interrupt line `i` starts at the address stored at `INT_VECTOR_TABLE + i`.
pub const INT_VECTOR_TABLE: u8 = 0xF8;

/// Configuration flags for [`Simulator`].
///
/// These can be modified after the `Simulator` is created with [`Simulator::new`],
/// but they only take effect on the next [`Simulator::reset`].
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct SimFlags {
    /// The creation strategy for memory and registers before a program is loaded.
    ///
    /// By default, this flag is [`MachineInitStrategy::default`] (all zeroes).
    pub machine_init: MachineInitStrategy,

    /// The initial value of the stack pointer (R7).
    ///
    /// By default, this is `0xF4`. The stack grows downward from here,
    /// so the first value pushed lands at `0xF3`.
    pub stack_top: u8,

    /// Whether to store debugging information about call frames.
    ///
    /// By default, this flag is `false`.
    pub debug_frames: bool,
}
impl Default for SimFlags {
    fn default() -> Self {
        Self {
            machine_init: Default::default(),
            stack_top: 0xF4,
            debug_frames: false
        }
    }
}

/// Executes LS-8 programs.
#[derive(Debug)]
pub struct Simulator {
    // ------------------ SIMULATION STATE ------------------
    // Calling [`Simulator::reset`] resets these values.

    /// The simulator's memory.
    pub mem: Mem,

    /// The simulator's register file.
    pub reg_file: RegFile,

    /// The program counter.
    pub pc: u8,

    /// The flags register. See [`Flags`] for more details.
    pub fl: Flags,

    /// Whether interrupts can be serviced.
    ///
    /// This is cleared on interrupt entry and set by `IRET`.
    interrupts_enabled: bool,

    /// The frame stack.
    pub frame_stack: FrameStack,

    /// The number of instructions successfully run since this `Simulator` was initialized.
    ///
    /// This can be set to 0 to reset the counter.
    pub instructions_run: u64,

    /// Indicates the reason why the last execution (via [`Simulator::run_while`] and adjacent)
    /// had paused.
    pause_condition: PauseCondition,

    // ------------------ CONFIG/DEBUG STATE ------------------
    // Calling [`Simulator::reset`] does not reset these values.

    /// Machine control.
    /// If unset, the program stops.
    ///
    /// This is publicly accessible via a reference through [`Simulator::mcr`].
    mcr: MCR,

    /// Configuration settings for the simulator.
    ///
    /// These are preserved between resets.
    ///
    /// See [`SimFlags`] for more details on what configuration
    /// settings are available.
    pub flags: SimFlags,

    /// Breakpoints for the simulator.
    pub breakpoints: HashSet<Breakpoint>,

    /// All external devices connected to the system (timer, keyboard, display and interrupting devices).
    pub device_handler: DeviceHandler
}
impl Simulator where Simulator: Send + Sync {}

impl Simulator {
    /// Creates a new simulator with the provided flags and MCR.
    fn new_with_mcr(flags: SimFlags, mcr: MCR) -> Self {
        let mut filler = flags.machine_init.generator();

        let mut sim = Self {
            mem: Mem::new(&mut filler),
            reg_file: RegFile::new(&mut filler),
            pc: 0,
            fl: Flags::new(),
            interrupts_enabled: true,
            frame_stack: FrameStack::new(flags.debug_frames),
            instructions_run: 0,
            pause_condition: Default::default(),

            mcr,
            flags,
            breakpoints: Default::default(),
            device_handler: Default::default()
        };

        sim.reg_file[SP] = flags.stack_top;
        sim
    }

    /// Creates a new simulator with the provided flags, without a loaded program.
    pub fn new(flags: SimFlags) -> Self {
        Self::new_with_mcr(flags, Arc::default())
    }

    /// Resets the simulator.
    ///
    /// This resets the state of the `Simulator` back to before any execution calls,
    /// while preserving configuration and debug state.
    ///
    /// Note that this function preserves:
    /// - Flags
    /// - Breakpoints
    /// - External devices
    /// - MCR reference
    ///
    /// This also resets the external devices (see [`DeviceHandler::io_reset`]).
    pub fn reset(&mut self) {
        let mcr = Arc::clone(&self.mcr);
        let flags = self.flags;
        let breakpoints = std::mem::take(&mut self.breakpoints);
        let dev_handler = std::mem::take(&mut self.device_handler);

        *self = Simulator::new_with_mcr(flags, mcr);
        self.breakpoints = breakpoints;
        self.device_handler = dev_handler;
        self.device_handler.io_reset();
    }

    /// Loads a program image into memory, starting at address 0.
    ///
    /// # Errors
    /// If the image does not fit in memory, this raises [`SimErr::ProgramTooLarge`]
    /// and memory is left unchanged.
    pub fn load_program(&mut self, program: &[u8]) -> Result<(), SimErr> {
        self.mem.copy_program(program)?;
        tracing::debug!(len = program.len(), "loaded program");
        Ok(())
    }

    /// Gets a reference to the MCR.
    ///
    /// Setting this to false from another thread (or a device)
    /// stops [`Simulator::run`] and its relatives before the next instruction.
    pub fn mcr(&self) -> &MCR {
        // The mcr field is not exposed because that allows someone to swap the MCR
        // with another AtomicBool, which would cause the simulator's MCR
        // to be inconsistent with any other component's
        &self.mcr
    }

    /// Whether interrupts can currently be serviced.
    pub fn interrupts_enabled(&self) -> bool {
        self.interrupts_enabled
    }

    /// Pushes a byte onto the stack.
    ///
    /// SP is decremented (wrapping around at 0) and then the byte is written to `mem[SP]`.
    pub fn push(&mut self, data: u8) {
        let sp = self.reg_file[SP].wrapping_sub(1);
        self.reg_file[SP] = sp;
        self.mem.write(sp, data);
    }

    /// Pops a byte off the stack.
    ///
    /// The byte is read from `mem[SP]` and then SP is incremented (wrapping around at 0xFF).
    pub fn pop(&mut self) -> u8 {
        let sp = self.reg_file[SP];
        self.reg_file[SP] = sp.wrapping_add(1);
        self.mem.read(sp)
    }

    /// Computes the PC `n` bytes after the current one.
    fn offset_pc(&self, n: u8) -> Result<u8, SimErr> {
        let addr = u16::from(self.pc) + u16::from(n);
        u8::try_from(addr).map_err(|_| SimErr::AccessViolation(addr))
    }

    /// Polls every device and latches their interrupt lines into IS.
    ///
    /// If the keyboard produced a key, it is written to [`KEY_BUFFER`].
    fn poll_devices(&mut self) {
        let polled = self.device_handler.poll();

        if let Some(key) = polled.key {
            self.mem.write(KEY_BUFFER, key);
        }
        self.reg_file[IS] |= polled.lines;
    }

    /// The interrupt line which should be serviced, if any.
    ///
    /// This is the lowest line which is both latched in IS and unmasked in IM,
    /// provided interrupts are enabled.
    fn pending_interrupt(&self) -> Option<u8> {
        if !self.interrupts_enabled { return None };

        let masked = self.reg_file[IM] & self.reg_file[IS];
        (masked != 0).then(|| masked.trailing_zeros() as u8)
    }

    /// Enters the handler for the given interrupt line.
    ///
    /// This clears the line's IS bit and disables interrupts,
    /// then pushes PC, FL and R0-R6 (in that order)
    /// and jumps to the address in the line's interrupt vector.
    fn handle_interrupt(&mut self, line: u8) {
        self.reg_file[IS] &= !(1 << line);
        self.interrupts_enabled = false;

        let return_addr = self.pc;
        self.push(return_addr);
        self.push(self.fl.get());
        for r in [R0, R1, R2, R3, R4, R5, R6] {
            self.push(self.reg_file[r]);
        }

        let vect = INT_VECTOR_TABLE + line;
        let handler = self.mem.read(vect);
        self.frame_stack.push_frame(Frame {
            return_addr,
            callee_addr: handler,
            frame_type: FrameType::Interrupt { line },
            stack_ptr: self.reg_file[SP],
        });
        self.pc = handler;

        tracing::debug!(line, return_addr, handler, "entering interrupt handler");
    }

    /// Returns from an interrupt handler, restoring everything [`Simulator::handle_interrupt`] saved.
    fn return_from_interrupt(&mut self) {
        for r in [R6, R5, R4, R3, R2, R1, R0] {
            let data = self.pop();
            self.reg_file[r] = data;
        }
        let fl = self.pop();
        self.fl.set(fl);
        self.pc = self.pop();
        self.interrupts_enabled = true;
        self.frame_stack.pop_frame();

        tracing::debug!(pc = self.pc, "returned from interrupt handler");
    }

    /// Renders the current machine state as a single trace line.
    ///
    /// The line consists of the PC, the three bytes starting at the PC,
    /// and then every register, all in hexadecimal:
    ///
    /// ```
    /// use ls8_ensemble::sim::Simulator;
    ///
    /// let mut sim = Simulator::new(Default::default());
    /// sim.load_program(&[0b1000_0010, 0, 8]).unwrap();
    /// assert_eq!(sim.trace_line(), "00 | 82 00 08 | 00 00 00 00 00 00 00 F4");
    /// ```
    pub fn trace_line(&self) -> String {
        use std::fmt::Write;

        let mut line = format!(
            "{:02X} | {:02X} {:02X} {:02X} |",
            self.pc,
            self.mem.read(self.pc),
            self.mem.read(self.pc.wrapping_add(1)),
            self.mem.read(self.pc.wrapping_add(2)),
        );
        for r in self.reg_file.as_array() {
            let _ = write!(line, " {r:02X}");
        }
        line
    }

    /// Checks whether the last execution paused because of a breakpoint.
    pub fn hit_breakpoint(&self) -> bool {
        matches!(self.pause_condition, PauseCondition::Breakpoint)
    }

    /// Checks whether the last execution paused because the program executed `HLT`.
    pub fn hit_halt(&self) -> bool {
        matches!(self.pause_condition, PauseCondition::Halt)
    }

    /// Checks whether the last execution paused because the MCR was turned off from outside.
    pub fn hit_mcr_off(&self) -> bool {
        matches!(self.pause_condition, PauseCondition::MCROff)
    }

    /// Execute the program.
    ///
    /// This blocks until the program halts, the MCR is turned off, a breakpoint is hit,
    /// or the tripwire condition returns false.
    /// If an error occurs, execution stops on the instruction which raised it.
    pub fn run_while(&mut self, mut tripwire: impl FnMut(&mut Simulator) -> bool) -> Result<(), SimErr> {
        std::mem::take(&mut self.pause_condition);
        self.mcr.store(true, Ordering::Relaxed);

        // event loop
        // run until:
        // 1. the MCR is set to false
        // 2. the tripwire condition returns false
        // 3. any of the breakpoints are hit
        let result = loop {
            // MCR turned off:
            if !self.mcr.load(Ordering::Relaxed) {
                break Ok(PauseCondition::MCROff);
            }
            // Tripwire turned off:
            if !tripwire(self) {
                break Ok(PauseCondition::Tripwire);
            }

            // Run a step:
            match self.step() {
                Ok(_) => {},
                Err(StepBreak::Halt) => break Ok(PauseCondition::Halt),
                Err(StepBreak::Err(e)) => break Err(e)
            }

            // After executing, check that any breakpoints were hit.
            if let Some(bp) = self.breakpoints.iter().find(|bp| bp.check(self)) {
                tracing::info!(pc = self.pc, "hit {bp:?}");
                break Ok(PauseCondition::Breakpoint);
            }
        };

        self.mcr.store(false, Ordering::Relaxed);
        match result {
            Ok(PauseCondition::Halt) => tracing::info!(pc = self.pc, instructions_run = self.instructions_run, "halted"),
            Ok(PauseCondition::MCROff) => tracing::info!(pc = self.pc, "machine stopped"),
            Err(ref e) => tracing::debug!(pc = self.pc, "execution failed: {e}"),
            _ => {}
        }
        self.pause_condition = result?;
        Ok(())
    }

    /// Execute the program.
    ///
    /// This blocks until the program halts.
    /// If an error occurs, execution stops on the instruction which raised it.
    pub fn run(&mut self) -> Result<(), SimErr> {
        self.run_while(|_| true)
    }

    /// Execute the program with a limit on how many steps to execute.
    ///
    /// This blocks until the program halts or until the step limit is hit.
    /// If an error occurs, execution stops on the instruction which raised it.
    pub fn run_with_limit(&mut self, max_steps: u64) -> Result<(), SimErr> {
        let i = self.instructions_run;
        self.run_while(|sim| sim.instructions_run.wrapping_sub(i) < max_steps)?;

        if matches!(self.pause_condition, PauseCondition::Tripwire) {
            tracing::warn!(max_steps, pc = self.pc, "step limit reached");
        }
        Ok(())
    }

    /// Simulate one instruction cycle.
    ///
    /// A cycle polls the devices, services at most one interrupt,
    /// and then fetches, decodes, and executes one instruction.
    fn step(&mut self) -> Result<(), StepBreak> {
        self.poll_devices();
        if let Some(line) = self.pending_interrupt() {
            self.handle_interrupt(line);
        }

        tracing::trace!(target: "ls8_ensemble::trace", "{}", self.trace_line());

        let opcode = Opcode::try_from(self.mem.read(self.pc))?;
        let mut operands = [0; 2];
        let operands = &mut operands[..usize::from(opcode.operand_count())];
        for (addr, slot) in (u16::from(self.pc) + 1..).zip(operands.iter_mut()) {
            *slot = self.mem.read_at(addr)?;
        }
        let instr = SimInstr::decode(opcode, operands)?;

        match instr {
            SimInstr::HLT => return Err(StepBreak::Halt),
            SimInstr::RET => {
                self.pc = self.pop();
                self.frame_stack.pop_frame();
            },
            SimInstr::IRET => self.return_from_interrupt(),
            SimInstr::PUSH(r) => self.push(self.reg_file[r]),
            SimInstr::POP(r) => {
                let data = self.pop();
                self.reg_file[r] = data;
            },
            SimInstr::PRN(r) => {
                let text = format!("{}\n", self.reg_file[r]);
                self.device_handler.output(text.as_bytes());
            },
            SimInstr::PRA(r) => {
                let mut buf = [0; 4];
                let text = char::from(self.reg_file[r]).encode_utf8(&mut buf);
                self.device_handler.output(text.as_bytes());
            },
            SimInstr::CALL(r) => {
                let return_addr = self.offset_pc(opcode.width())?;
                let callee_addr = self.reg_file[r];

                self.push(return_addr);
                self.frame_stack.push_frame(Frame {
                    return_addr,
                    callee_addr,
                    frame_type: FrameType::Subroutine,
                    stack_ptr: self.reg_file[SP],
                });
                self.pc = callee_addr;
            },
            SimInstr::JMP(r) => self.pc = self.reg_file[r],
            SimInstr::JEQ(r) => {
                self.pc = match self.fl.is_eq() {
                    true  => self.reg_file[r],
                    false => self.offset_pc(opcode.width())?,
                };
            },
            SimInstr::JNE(r) => {
                self.pc = match self.fl.is_eq() {
                    true  => self.offset_pc(opcode.width())?,
                    false => self.reg_file[r],
                };
            },
            SimInstr::LDI(dr, imm) => self.reg_file[dr] = imm,
            SimInstr::LD(dr, ar) => self.reg_file[dr] = self.mem.read(self.reg_file[ar]),
            SimInstr::ST(ar, sr) => self.mem.write(self.reg_file[ar], self.reg_file[sr]),
            SimInstr::ALU(op, a, b) => alu::apply(&mut self.reg_file, &mut self.fl, op, a, b)?,
        }

        if !opcode.sets_pc() {
            self.pc = self.offset_pc(opcode.width())?;
        }

        self.instructions_run = self.instructions_run.wrapping_add(1);
        Ok(())
    }

    /// Simulate one step, executing one instruction.
    ///
    /// A halt is not an error here: it simply leaves the PC on the `HLT`.
    pub fn step_in(&mut self) -> Result<(), SimErr> {
        match self.step() {
            Ok(()) => Ok(()),
            Err(StepBreak::Halt) => Ok(()),
            Err(StepBreak::Err(e)) => Err(e)
        }
    }

    /// Simulate one step, executing one instruction and running through entire subroutines as a single step.
    pub fn step_over(&mut self) -> Result<(), SimErr> {
        let curr_frame = self.frame_stack.len();
        let mut first = Some(()); // is Some if this is the first instruction executed in this call

        // this function should do at least one step before checking its condition
        // condition: run until we have landed back in the same frame
        self.run_while(|sim| first.take().is_some() || curr_frame < sim.frame_stack.len())
    }

    /// Run through the simulator's execution until the subroutine (or interrupt handler) is exited.
    pub fn step_out(&mut self) -> Result<(), SimErr> {
        let curr_frame = self.frame_stack.len();
        let mut first = Some(()); // is Some if this is the first instruction executed in this call

        // this function should do at least one step before checking its condition
        // condition: run until we've landed in a smaller frame
        if curr_frame != 0 {
            self.run_while(|sim| first.take().is_some() || curr_frame <= sim.frame_stack.len())?;
        }

        Ok(())
    }
}
impl Default for Simulator {
    fn default() -> Self {
        Self::new(Default::default())
    }
}

/// A wrapper over `u8` in order to facilitate the flags register.
///
/// Only the low three bits are used:
/// - `FL[0]`: Equal
/// - `FL[1]`: Greater
/// - `FL[2]`: Less
///
/// ```text
///           less
///           |greater
///           ||equal
///           |||
///           VVV
/// 0b0000_0010
/// ```
///
/// Each of these are exposed as the [`Flags::is_lt`], [`Flags::is_gt`], and [`Flags::is_eq`] values.
/// Only `CMP` sets them, and it always leaves exactly one set.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct Flags(u8);

impl Flags {
    const EQ: u8 = 0b001;
    const GT: u8 = 0b010;
    const LT: u8 = 0b100;

    /// Creates a flags register with no flags set.
    pub fn new() -> Self {
        Flags(0)
    }

    /// Gets the bit-representation of the flags.
    pub fn get(&self) -> u8 {
        self.0
    }
    /// Sets the flags to the provided data value.
    ///
    /// Bits outside of the low three are discarded.
    pub fn set(&mut self, data: u8) {
        self.0 = data & 0b111;
    }
    /// Checks whether the equal flag is set.
    pub fn is_eq(&self) -> bool {
        self.0 & Self::EQ != 0
    }
    /// Checks whether the greater-than flag is set.
    pub fn is_gt(&self) -> bool {
        self.0 & Self::GT != 0
    }
    /// Checks whether the less-than flag is set.
    pub fn is_lt(&self) -> bool {
        self.0 & Self::LT != 0
    }
    /// Sets the flags from the result of comparing register A to register B.
    pub fn set_cmp(&mut self, ord: std::cmp::Ordering) {
        self.0 = match ord {
            std::cmp::Ordering::Less    => Self::LT,
            std::cmp::Ordering::Equal   => Self::EQ,
            std::cmp::Ordering::Greater => Self::GT,
        };
    }
}
impl std::fmt::Debug for Flags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use std::fmt::Write;

        f.write_str("Flags(")?;
        if self.is_lt() { f.write_char('L')?; };
        if self.is_gt() { f.write_char('G')?; };
        if self.is_eq() { f.write_char('E')?; };
        f.write_char(')')
    }
}

/// A type alias for MCR.
pub type MCR = Arc<AtomicBool>;
