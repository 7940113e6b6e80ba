//! Handlers for external devices connected to the Simulator.
//!
//! This handles the keyboard, the display, the timer,
//! and any other device which can raise interrupts.
//!
//! The core types here are:
//! - [`DeviceHandler`]: The hub the Simulator polls once per instruction cycle.
//! - [`ExternalDevice`]: A device which can raise an interrupt line.
//! - [`KeyboardDevice`]: A non-blocking source of key presses.
//! - [`DisplayDevice`]: A sink for the output of `PRN` and `PRA`.
//!
//! This module also provides some devices:
//! - [`NullDevice`]: Does nothing.
//! - [`TimerDevice`]: Raises the timer line on a wall-clock interval.
//! - [`BufferedKeyboard`]: Keyboard device that reads off of an input buffer.
//! - [`ChannelKeyboard`]: Keyboard device fed by a reader thread.
//! - [`TerminalKeyboard`]: Keyboard device that reads raw key presses from the terminal.
//! - [`BufferedDisplay`]: Display device that writes to an output buffer.
//! - [`StdoutDisplay`]: Display device that writes to stdout.
//! - [`InterruptFromFn`]: Raises interrupts from a function.

mod keyboard;
mod display;
mod timer;

pub use keyboard::{BufferedKeyboard, ChannelKeyboard, KeyboardDevice, Stop, TerminalKeyboard};
pub use display::{BufferedDisplay, DisplayDevice, StdoutDisplay};
pub use timer::TimerDevice;

/// The memory address the last key press is written to.
pub const KEY_BUFFER: u8 = 0xF4;
/// The interrupt line raised by the timer.
pub const TIMER_LINE: u8 = 0;
/// The interrupt line raised by the keyboard.
pub const KEYBOARD_LINE: u8 = 1;

/// A device which can raise interrupts.
pub trait ExternalDevice: Send + Sync + 'static {
    /// Resets device.
    fn io_reset(&mut self);

    /// During each instruction cycle, this function is called once to see whether
    /// to raise an interrupt line.
    ///
    /// Of course, in the real world, the devices would send an interrupt signal
    /// which would be detected, but that can't really be done here.
    fn poll_interrupt(&mut self) -> Option<Interrupt>;
}

/// An interrupt.
///
/// This is output by an implementation of [`ExternalDevice::poll_interrupt`] if an interrupt should occur.
/// When it is polled, the Simulator latches the interrupt's line into the IS register.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Interrupt {
    line: u8
}
impl Interrupt {
    /// Creates a new interrupt on the given line.
    ///
    /// Note that the line is truncated to 3 bits.
    pub fn new(line: u8) -> Self {
        Self { line: line & 0b111 }
    }

    /// The interrupt line (0-7).
    pub fn line(&self) -> u8 {
        self.line
    }

    /// The bit this interrupt sets in the IS register.
    pub fn mask(&self) -> u8 {
        1 << self.line
    }
}

/// Everything that was raised while polling devices for one instruction cycle.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub struct Polled {
    /// Interrupt lines raised, one bit per line.
    pub lines: u8,
    /// The key read from the keyboard, if there was one.
    pub key: Option<u8>
}

/// The central hub for all external devices for the Simulator.
pub struct DeviceHandler {
    /// The timer. This is always polled first.
    pub timer: TimerDevice,
    keyboard: Box<dyn KeyboardDevice>,
    display: Box<dyn DisplayDevice>,
    devices: Vec<Option<Box<dyn ExternalDevice>>>
}

impl DeviceHandler {
    /// Creates a new device handler.
    ///
    /// This has an enabled timer (see [`TimerDevice::default`]),
    /// no keyboard, and no display.
    pub fn new() -> Self {
        Self {
            timer: TimerDevice::default(),
            keyboard: Box::new(NullDevice),
            display: Box::new(NullDevice),
            devices: vec![]
        }
    }

    /// Set the keyboard device.
    pub fn set_keyboard(&mut self, kb: impl KeyboardDevice) {
        self.keyboard = Box::new(kb);
    }
    /// Set the display device.
    pub fn set_display(&mut self, ds: impl DisplayDevice) {
        self.display = Box::new(ds);
    }
    /// Add a new interrupting device (which is not the timer or keyboard).
    ///
    /// The ID of the device is returned.
    pub fn add_device(&mut self, dev: impl ExternalDevice) -> usize {
        self.devices.push(Some(Box::new(dev)));
        self.devices.len() - 1
    }
    /// Removes the device at the given device ID.
    pub fn remove_device(&mut self, dev_id: usize) {
        if let Some(slot) = self.devices.get_mut(dev_id) {
            slot.take();
        }
    }

    /// Polls every device once.
    ///
    /// The order is fixed: timer, keyboard, then every added device.
    /// The keyboard is only read if it reports input is available.
    pub fn poll(&mut self) -> Polled {
        let mut polled = Polled::default();

        if let Some(int) = self.timer.poll_interrupt() {
            polled.lines |= int.mask();
        }
        if self.keyboard.has_input() {
            polled.key = self.keyboard.read_one();
            if polled.key.is_some() {
                polled.lines |= Interrupt::new(KEYBOARD_LINE).mask();
            }
        }
        for dev in self.devices.iter_mut().flatten() {
            if let Some(int) = dev.poll_interrupt() {
                polled.lines |= int.mask();
            }
        }

        polled
    }

    /// Sends output to the display.
    pub fn output(&mut self, bytes: &[u8]) {
        if !self.display.send_output(bytes) {
            tracing::warn!(len = bytes.len(), "display did not accept output");
        }
    }

    /// Resets all the devices connected to this handler.
    pub fn io_reset(&mut self) {
        self.timer.io_reset();
        self.keyboard.clear_input();
        self.display.clear_output();
        self.devices.iter_mut()
            .flatten()
            .for_each(|d| d.io_reset());
    }
}
impl Default for DeviceHandler {
    fn default() -> Self {
        Self::new()
    }
}
impl std::fmt::Debug for DeviceHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceHandler")
            .field("timer", &self.timer)
            .field("devices", &self.devices.iter().flatten().count())
            .finish_non_exhaustive()
    }
}

/// Does nothing.
///
/// Never has input, discards all output and never interrupts.
#[derive(Default, Clone, Copy, PartialEq, Eq, Debug)]
pub struct NullDevice;
impl ExternalDevice for NullDevice {
    fn io_reset(&mut self) {}

    fn poll_interrupt(&mut self) -> Option<Interrupt> {
        None
    }
}
impl KeyboardDevice for NullDevice {
    fn has_input(&mut self) -> bool {
        false
    }

    fn read_one(&mut self) -> Option<u8> {
        None
    }

    fn clear_input(&mut self) {}
}
impl DisplayDevice for NullDevice {
    fn send_output(&mut self, _bytes: &[u8]) -> bool {
        true
    }

    fn clear_output(&mut self) {}
}

/// A device that handles interrupts with a function.
#[allow(clippy::type_complexity)]
pub struct InterruptFromFn(Box<dyn FnMut() -> Option<Interrupt> + Send + Sync + 'static>);
impl InterruptFromFn {
    /// Creates a new interrupt from a function.
    pub fn new(f: impl FnMut() -> Option<Interrupt> + Send + Sync + 'static) -> Self {
        Self(Box::new(f))
    }
}
impl std::fmt::Debug for InterruptFromFn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterruptFromFn").finish_non_exhaustive()
    }
}
impl ExternalDevice for InterruptFromFn {
    fn io_reset(&mut self) {}

    fn poll_interrupt(&mut self) -> Option<Interrupt> {
        (self.0)()
    }
}

fn resolve_lock<G>(e: std::sync::TryLockResult<G>) -> Option<G> {
    use std::sync::TryLockError;

    match e {
        Ok(guard) => Some(guard),
        Err(TryLockError::WouldBlock) => None,
        Err(TryLockError::Poisoned(e)) => Some(e.into_inner())
    }
}
impl<D: ExternalDevice> ExternalDevice for std::sync::Arc<std::sync::Mutex<D>> {
    fn io_reset(&mut self) {
        if let Some(mut guard) = resolve_lock(self.try_lock()) {
            guard.io_reset();
        }
    }

    fn poll_interrupt(&mut self) -> Option<Interrupt> {
        resolve_lock(self.try_lock())
            .and_then(|mut g| g.poll_interrupt())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use super::*;

    #[test]
    fn test_poll_keyboard() {
        let mut handler = DeviceHandler::new();
        handler.timer.enabled = false;

        let kb = BufferedKeyboard::default();
        handler.set_keyboard(kb.clone());
        assert_eq!(handler.poll(), Polled::default());

        kb.get_buffer().write().unwrap().extend(b"hi");
        assert_eq!(handler.poll(), Polled { lines: 0b10, key: Some(b'h') });
        assert_eq!(handler.poll(), Polled { lines: 0b10, key: Some(b'i') });
        assert_eq!(handler.poll(), Polled::default());
    }

    #[test]
    fn test_poll_devices() {
        let mut handler = DeviceHandler::new();
        handler.timer.enabled = false;

        let mut fired = false;
        handler.add_device(InterruptFromFn::new(move || {
            let first = !std::mem::replace(&mut fired, true);
            first.then(|| Interrupt::new(5))
        }));
        let id = handler.add_device(InterruptFromFn::new(|| Some(Interrupt::new(3))));

        assert_eq!(handler.poll().lines, 0b0010_1000);
        assert_eq!(handler.poll().lines, 0b0000_1000);

        handler.remove_device(id);
        assert_eq!(handler.poll().lines, 0);
    }

    #[test]
    fn test_shared_device() {
        #[derive(Default)]
        struct Queue(VecDeque<u8>);
        impl ExternalDevice for Queue {
            fn io_reset(&mut self) {
                self.0.clear();
            }
            fn poll_interrupt(&mut self) -> Option<Interrupt> {
                self.0.pop_front().map(Interrupt::new)
            }
        }

        let queue = Arc::new(Mutex::new(Queue::default()));
        let mut handler = DeviceHandler::new();
        handler.timer.enabled = false;
        handler.add_device(Arc::clone(&queue));

        queue.lock().unwrap().0.extend([2, 7, 9]);
        assert_eq!(handler.poll().lines, 0b0000_0100);
        assert_eq!(handler.poll().lines, 0b1000_0000);
        // line 9 is truncated to line 1
        assert_eq!(handler.poll().lines, 0b0000_0010);

        queue.lock().unwrap().0.push_back(4);
        handler.io_reset();
        assert_eq!(handler.poll().lines, 0);
    }

    #[test]
    fn test_output() {
        let mut handler = DeviceHandler::new();
        let display = BufferedDisplay::default();
        handler.set_display(display.clone());

        handler.output(b"17\n");
        assert_eq!(&**display.get_buffer().read().unwrap(), b"17\n");

        handler.io_reset();
        assert!(display.get_buffer().read().unwrap().is_empty());
    }
}
