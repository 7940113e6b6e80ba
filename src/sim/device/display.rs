use std::io::{IsTerminal, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockWriteGuard, TryLockError};

/// A sink for program output.
///
/// `PRN` sends the decimal text of a register followed by a newline,
/// and `PRA` sends the UTF-8 encoding of a single character.
pub trait DisplayDevice: Send + Sync + 'static {
    /// Sends output, returns whether the output was successfully accepted.
    fn send_output(&mut self, bytes: &[u8]) -> bool;

    /// Clears all of the current output.
    fn clear_output(&mut self);
}

/// A display that delegates its output to a buffer.
#[derive(Default, Clone)]
pub struct BufferedDisplay {
    buffer: Arc<RwLock<Vec<u8>>>
}
impl BufferedDisplay {
    /// Creates a new display, wrapping it around a given buffer.
    pub fn new(buffer: Arc<RwLock<Vec<u8>>>) -> Self {
        Self { buffer }
    }

    /// Gets a reference to the internal buffer of this display.
    pub fn get_buffer(&self) -> &Arc<RwLock<Vec<u8>>> {
        &self.buffer
    }

    fn try_output(&self) -> Option<RwLockWriteGuard<'_, Vec<u8>>> {
        match self.buffer.try_write() {
            Ok(g) => Some(g),
            Err(TryLockError::Poisoned(e)) => Some(e.into_inner()),
            Err(TryLockError::WouldBlock) => None,
        }
    }
}
impl DisplayDevice for BufferedDisplay {
    fn send_output(&mut self, bytes: &[u8]) -> bool {
        match self.try_output() {
            Some(mut d) => {
                d.extend_from_slice(bytes);
                true
            },
            None => false,
        }
    }

    fn clear_output(&mut self) {
        if let Some(mut out) = self.try_output() {
            out.clear();
        }
    }
}

/// A display that writes directly to stdout, flushing after every write.
#[derive(Default, Clone, Debug)]
pub struct StdoutDisplay {
    crlf: bool,
    mcr: Option<Arc<AtomicBool>>
}
impl StdoutDisplay {
    /// Creates a display for stdout.
    ///
    /// A terminal in raw mode does not return the cursor on a line feed,
    /// so if `raw_mode` is set and stdout is a terminal, every `\n` is written as `\r\n`.
    /// Redirected output is always written unchanged.
    pub fn new(raw_mode: bool) -> Self {
        Self {
            crlf: raw_mode && std::io::stdout().is_terminal(),
            mcr: None
        }
    }

    /// Turns off the given machine control flag if writing to stdout ever fails
    /// (see [`Simulator::mcr`]).
    ///
    /// [`Simulator::mcr`]: crate::sim::Simulator::mcr
    pub fn stop_on_error(mut self, mcr: Arc<AtomicBool>) -> Self {
        self.mcr = Some(mcr);
        self
    }

    fn report(&self, result: std::io::Result<()>) -> bool {
        match result {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("could not write output: {e}");
                if let Some(mcr) = &self.mcr {
                    mcr.store(false, Ordering::Relaxed);
                }
                false
            }
        }
    }
}
impl DisplayDevice for StdoutDisplay {
    fn send_output(&mut self, bytes: &[u8]) -> bool {
        let result = write_output(&mut std::io::stdout().lock(), bytes, self.crlf);
        self.report(result)
    }

    fn clear_output(&mut self) {}
}

fn write_output(out: &mut impl Write, bytes: &[u8], crlf: bool) -> std::io::Result<()> {
    match crlf {
        true => bytes.split_inclusive(|&b| b == b'\n').try_for_each(|chunk| {
            match chunk.strip_suffix(b"\n") {
                Some(line) => out.write_all(line).and_then(|_| out.write_all(b"\r\n")),
                None => out.write_all(chunk),
            }
        })?,
        false => out.write_all(bytes)?,
    }
    out.flush()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use super::{write_output, BufferedDisplay, DisplayDevice, StdoutDisplay};

    #[test]
    fn test_buffered_display() {
        let mut display = BufferedDisplay::default();
        assert!(display.send_output(b"17\n"));
        assert!(display.send_output("é".as_bytes()));
        assert_eq!(&**display.get_buffer().read().unwrap(), "17\né".as_bytes());

        // output is rejected while someone else holds the buffer
        let buffer = display.get_buffer().clone();
        let guard = buffer.write().unwrap();
        assert!(!display.send_output(b"x"));
        drop(guard);

        display.clear_output();
        assert!(display.get_buffer().read().unwrap().is_empty());
    }

    #[test]
    fn test_write_output_line_endings() {
        let mut out = vec![];
        write_output(&mut out, b"17\n", false).unwrap();
        write_output(&mut out, b"H", false).unwrap();
        assert_eq!(out, b"17\nH");

        let mut out = vec![];
        write_output(&mut out, b"17\n", true).unwrap();
        write_output(&mut out, b"a\nb\n\nc", true).unwrap();
        assert_eq!(out, b"17\r\na\r\nb\r\n\r\nc");
    }

    #[test]
    fn test_stdout_display_translation() {
        assert!(!StdoutDisplay::default().crlf);
        // without raw mode, output is never translated, terminal or not
        assert!(!StdoutDisplay::new(false).crlf);
    }

    #[test]
    fn test_stdout_display_stops_on_error() {
        let mcr = Arc::new(AtomicBool::new(true));
        let display = StdoutDisplay::default().stop_on_error(Arc::clone(&mcr));

        assert!(display.report(Ok(())));
        assert!(mcr.load(Ordering::Relaxed));

        let broken = std::io::Error::from(std::io::ErrorKind::BrokenPipe);
        assert!(!display.report(Err(broken)));
        assert!(!mcr.load(Ordering::Relaxed));

        // without a flag, a failed write is only rejected
        let display = StdoutDisplay::default();
        assert!(!display.report(Err(std::io::ErrorKind::BrokenPipe.into())));
    }
}
