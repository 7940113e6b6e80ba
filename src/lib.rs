//! An LS-8 program loader and emulator.
//!
//! The LS-8 is an 8-bit machine with 256 bytes of memory, eight registers,
//! a downward-growing stack, and eight interrupt lines
//! (a timer and a keyboard are wired to the first two).
//!
//! # Usage
//!
//! Programs are distributed as `.ls8` files, which hold one binary byte per line.
//! To convert one into a program image, it must be parsed:
//! ```
//! use ls8_ensemble::parse::parse_program;
//!
//! let src = "
//!     10000010 # LDI R0,72
//!     00000000
//!     01001000
//!     01001000 # PRA R0
//!     00000000
//!     00000001 # HLT
//! ";
//! let program = parse_program(src).unwrap();
//! assert_eq!(program.len(), 6);
//! ```
//!
//! Once a program image has been created, it can be executed with the simulator:
//! ```
//! # use ls8_ensemble::parse::parse_program;
//! # let program = parse_program("10000010\n0\n1001000\n01001000\n0\n00000001").unwrap();
//! use ls8_ensemble::sim::Simulator;
//! use ls8_ensemble::sim::device::BufferedDisplay;
//!
//! let mut simulator = Simulator::new(Default::default());
//! let display = BufferedDisplay::default();
//! simulator.device_handler.set_display(display.clone());
//!
//! simulator.load_program(&program).unwrap();
//! simulator.run().unwrap(); // <-- Result can be handled accordingly
//! assert_eq!(&**display.get_buffer().read().unwrap(), b"H");
//! ```
//!
//! If more granularity is needed for simulation, there are also step-in and step-out functions.
//! See the [`sim`] module for more details.
#![warn(missing_docs)]

pub mod parse;
pub mod ast;
pub mod sim;
pub mod err;
