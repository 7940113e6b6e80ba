//! The frame stack and call frame management.
//!
//! This module exposes:
//! - [`FrameStack`]: The frame stack used by the Simulator.
//! - [`Frame`]: All the data from a given frame.

/// Where this frame came from.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum FrameType {
    /// Frame came from a subroutine call (`CALL`).
    Subroutine,
    /// Frame came from an interrupt on the given line.
    Interrupt {
        /// The interrupt line (0-7).
        line: u8
    }
}
/// A frame entry, which defines all the known information about a frame.
///
/// This information is only exposed by the Simulator if the `debug_frames` flag is enabled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The address execution resumes at once this frame returns.
    ///
    /// For subroutines, this is the address after the `CALL` instruction.
    /// For interrupts, this is the address of the instruction that was preempted.
    pub return_addr: u8,

    /// The memory location of the start of the callee.
    ///
    /// For subroutines, this is the start of the callee subroutine.
    /// For interrupts, this is the start of the handler read from the interrupt vector table.
    pub callee_addr: u8,

    /// Whether this frame is from a subroutine call or an interrupt.
    pub frame_type: FrameType,

    /// The stack pointer once the frame was entered.
    ///
    /// For subroutines this points at the return address.
    /// For interrupts this points at the saved R6.
    pub stack_ptr: u8,
}
/// The stack of call frames.
///
/// This struct is used within the Simulator to keep track of the frames of subroutine calls and interrupts.
/// The amount of information it keeps track of depends on the `debug_frames` flag of the Simulator.
/// - If the `debug_frames` flag is true, this keeps track of a Vec of [`Frame`]s, which contains a large set of information about each frame.
/// - If the `debug_frames` flag is false, this only keeps track of the number of frames traversed.
#[derive(Debug)]
pub struct FrameStack {
    /// The number of frames traversed.
    ///
    /// At top level execution, `frame_no` == 0.
    /// Every `CALL` and every interrupt entry increments this value,
    /// and every `RET` and `IRET` decrements it.
    frame_no: u64,

    /// The frames.
    ///
    /// If `None`, this means frames are not being tracked and frame information is ignored.
    /// If `Some`, frames will be added and removed as subroutines/interrupts are entered and exited.
    frames: Option<Vec<Frame>>
}

impl FrameStack {
    /// Creates a new frame stack.
    pub(super) fn new(debug_frames: bool) -> Self {
        Self {
            frame_no: 0,
            frames: debug_frames.then(Vec::new)
        }
    }

    /// Gets the current number of frames entered.
    pub fn len(&self) -> u64 {
        self.frame_no
    }

    /// Tests whether the frame stack is at top level execution.
    pub fn is_empty(&self) -> bool {
        self.frame_no == 0
    }

    /// Gets the list of current frames (if debug frames are enabled).
    pub fn frames(&self) -> Option<&[Frame]> {
        self.frames.as_deref()
    }

    /// Pushes a new frame to the frame stack.
    ///
    /// This should be called once the call or interrupt entry has completed.
    pub(super) fn push_frame(&mut self, frame: Frame) {
        self.frame_no += 1;
        if let Some(frames) = self.frames.as_mut() {
            frames.push(frame);
        }
    }

    /// Pops a frame from the frame stack.
    ///
    /// A `RET` or `IRET` at top level is not an error (the program may have
    /// built its own return address), so this saturates at zero.
    pub(super) fn pop_frame(&mut self) {
        self.frame_no = self.frame_no.saturating_sub(1);
        if let Some(frames) = self.frames.as_mut() {
            frames.pop();
        }
    }
}
impl Default for FrameStack {
    fn default() -> Self {
        Self::new(false)
    }
}
