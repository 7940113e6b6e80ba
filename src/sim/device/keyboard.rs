use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockWriteGuard, TryLockError};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel as cbc;

/// A non-blocking source of key presses.
///
/// The Simulator checks [`KeyboardDevice::has_input`] once per instruction cycle,
/// and only calls [`KeyboardDevice::read_one`] if it returns true.
/// Neither method may block.
pub trait KeyboardDevice: Send + Sync + 'static {
    /// Whether the keyboard has input to take.
    fn has_input(&mut self) -> bool;
    /// Reads and removes a character from the input.
    fn read_one(&mut self) -> Option<u8>;
    /// Clears the input completely.
    fn clear_input(&mut self);
}

/// Keyboard that accesses input from a memory buffer.
#[derive(Default, Clone)]
pub struct BufferedKeyboard {
    buffer: Arc<RwLock<VecDeque<u8>>>
}
impl BufferedKeyboard {
    /// Creates a new keyboard, wrapping it around a given buffer.
    pub fn new(buffer: Arc<RwLock<VecDeque<u8>>>) -> Self {
        Self { buffer }
    }

    /// Gets a reference to the internal buffer of this keyboard.
    pub fn get_buffer(&self) -> &Arc<RwLock<VecDeque<u8>>> {
        &self.buffer
    }

    fn try_input(&self) -> Option<RwLockWriteGuard<'_, VecDeque<u8>>> {
        match self.buffer.try_write() {
            Ok(g) => Some(g),
            Err(TryLockError::Poisoned(e)) => Some(e.into_inner()),
            Err(TryLockError::WouldBlock) => None,
        }
    }
}
impl KeyboardDevice for BufferedKeyboard {
    fn has_input(&mut self) -> bool {
        self.try_input().is_some_and(|buf| !buf.is_empty())
    }

    fn read_one(&mut self) -> Option<u8> {
        self.try_input()?.pop_front()
    }

    fn clear_input(&mut self) {
        if let Some(mut inp) = self.try_input() {
            inp.clear();
        }
    }
}

/// A helper struct for [`ChannelKeyboard::new`],
/// indicating the reader is closed and no more bytes will come from it.
#[derive(Clone, Copy, Default, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Stop;

/// A keyboard that reads from a channel, fed by a reader thread.
///
/// The reader function is allowed to block (for example, on stdin).
/// It runs on its own thread, so the Simulator only ever sees
/// whether a byte is waiting in the channel.
pub struct ChannelKeyboard {
    read_data: cbc::Receiver<u8>,
    #[allow(unused)]
    read_handler: JoinHandle<()>
}
impl ChannelKeyboard {
    /// Creates a new channel keyboard with the given reader.
    ///
    /// The reader function is called every time the reader thread wants a byte.
    /// It should block until a byte is ready, or return Stop
    /// if there are no more bytes to read.
    ///
    /// Since the reader runs on a separate thread,
    /// it continues to collect input even when the simulator is not running.
    pub fn new(mut reader: impl FnMut() -> Result<u8, Stop> + Send + 'static) -> Self {
        let (read_tx, read_rx) = cbc::bounded(16);

        let read_handler = std::thread::spawn(move || loop {
            let Ok(byte) = reader() else { return };
            let Ok(()) = read_tx.send(byte) else { return };
        });

        Self { read_data: read_rx, read_handler }
    }

    /// Creates a channel keyboard which reads from stdin.
    ///
    /// Note that due to how stdin works in terminals, data is only sent once a new line is typed.
    /// For per-key input, see [`TerminalKeyboard`].
    pub fn stdin() -> Self {
        use std::io::{self, BufRead};

        Self::new(|| {
            let mut stdin = io::stdin().lock();
            let Ok(&[byte, ..]) = stdin.fill_buf() else {
                // EOF or a broken stdin, either way there is nothing left to read
                return Err(Stop);
            };

            stdin.consume(1);
            Ok(byte)
        })
    }
}
impl KeyboardDevice for ChannelKeyboard {
    fn has_input(&mut self) -> bool {
        !self.read_data.is_empty()
    }

    fn read_one(&mut self) -> Option<u8> {
        // a disconnected channel only means the reader has stopped
        self.read_data.try_recv().ok()
    }

    fn clear_input(&mut self) {
        while self.read_data.try_recv().is_ok() {}
    }
}

/// A keyboard which reads individual key presses from the terminal.
///
/// Creating this puts the terminal into raw mode, and dropping it restores the terminal.
/// While in raw mode, Ctrl-C does not signal the process,
/// so instead it turns off the machine control flag it was created with
/// (see [`Simulator::mcr`]).
///
/// [`Simulator::mcr`]: crate::sim::Simulator::mcr
pub struct TerminalKeyboard {
    pending: VecDeque<u8>,
    mcr: Arc<AtomicBool>
}
impl TerminalKeyboard {
    /// Enables raw mode and creates the keyboard.
    pub fn new(mcr: Arc<AtomicBool>) -> std::io::Result<Self> {
        crossterm::terminal::enable_raw_mode()?;
        Ok(Self { pending: VecDeque::new(), mcr })
    }

    /// Pulls every key press that is already available, without waiting.
    fn drain_events(&mut self) {
        use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};

        while let Ok(true) = event::poll(Duration::ZERO) {
            let Ok(Event::Key(key)) = event::read() else { continue };
            if key.kind != KeyEventKind::Press { continue };

            let byte = match key.code {
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    self.mcr.store(false, Ordering::Relaxed);
                    continue;
                },
                KeyCode::Char(c) if c.is_ascii() => c as u8,
                KeyCode::Enter => b'\n',
                KeyCode::Tab => b'\t',
                KeyCode::Backspace => 0x08,
                KeyCode::Esc => 0x1B,
                _ => continue
            };
            self.pending.push_back(byte);
        }
    }
}
impl KeyboardDevice for TerminalKeyboard {
    fn has_input(&mut self) -> bool {
        self.drain_events();
        !self.pending.is_empty()
    }

    fn read_one(&mut self) -> Option<u8> {
        self.pending.pop_front()
    }

    fn clear_input(&mut self) {
        self.pending.clear();
    }
}
impl Drop for TerminalKeyboard {
    fn drop(&mut self) {
        let _ = crossterm::terminal::disable_raw_mode();
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::{BufferedKeyboard, ChannelKeyboard, KeyboardDevice, Stop};

    #[test]
    fn test_buffered_keyboard() {
        let mut kb = BufferedKeyboard::default();
        assert!(!kb.has_input());

        kb.get_buffer().write().unwrap().extend(b"ab");
        assert!(kb.has_input());
        assert_eq!(kb.read_one(), Some(b'a'));

        kb.clear_input();
        assert!(!kb.has_input());
        assert_eq!(kb.read_one(), None);
    }

    #[test]
    fn test_channel_keyboard() {
        let mut bytes = b"ls8".iter().copied();
        let mut kb = ChannelKeyboard::new(move || bytes.next().ok_or(Stop));

        let mut read = vec![];
        let start = Instant::now();
        while read.len() < 3 && start.elapsed() < Duration::from_secs(5) {
            if kb.has_input() {
                read.extend(kb.read_one());
            }
        }
        assert_eq!(read, b"ls8");

        // the reader stopped, so there's nothing left
        assert!(!kb.has_input());
        assert_eq!(kb.read_one(), None);
    }
}
