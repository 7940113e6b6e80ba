use std::time::{Duration, Instant};

use super::{ExternalDevice, Interrupt, TIMER_LINE};

/// A timer device that raises its interrupt line once a wall-clock interval has elapsed.
///
/// The timer is polled once per instruction cycle, so it fires on the first cycle
/// after strictly more than the interval has passed, not at the exact moment it does.
/// When it fires, the interval restarts from the moment it was polled.
#[derive(Debug, Clone)]
pub struct TimerDevice {
    last_fire: Instant,
    /// The time between interrupts.
    pub interval: Duration,
    /// The interrupt line this timer raises.
    ///
    /// Note that if this exceeds 7, it is truncated to 3 bits.
    pub line: u8,
    /// Whether this timer can raise an interrupt.
    pub enabled: bool,
}
impl TimerDevice {
    /// Creates a new enabled timer with the given interval.
    pub fn new(interval: Duration) -> Self {
        Self {
            last_fire: Instant::now(),
            interval,
            line: TIMER_LINE,
            enabled: true
        }
    }

    /// The amount of time until the timer next fires.
    pub fn remaining(&self) -> Duration {
        self.interval.saturating_sub(self.last_fire.elapsed())
    }
}
impl Default for TimerDevice {
    /// Creates a timer with default parameters.
    ///
    /// The default parameters here are:
    /// - Fires once every second
    /// - Raises interrupt line 0
    /// - Enabled
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}
impl ExternalDevice for TimerDevice {
    fn io_reset(&mut self) {
        self.last_fire = Instant::now();
    }

    fn poll_interrupt(&mut self) -> Option<Interrupt> {
        if !self.enabled { return None };

        let now = Instant::now();
        match now.duration_since(self.last_fire) > self.interval {
            true => {
                self.last_fire = now;
                Some(Interrupt::new(self.line))
            },
            false => None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::sim::device::{ExternalDevice, Interrupt};

    use super::TimerDevice;

    #[test]
    fn test_timer_fires_after_interval() {
        let mut timer = TimerDevice::new(Duration::from_millis(20));
        assert_eq!(timer.poll_interrupt(), None);

        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(timer.poll_interrupt(), Some(Interrupt::new(0)));
        // the interval restarted
        assert_eq!(timer.poll_interrupt(), None);
    }

    #[test]
    fn test_timer_disabled() {
        let mut timer = TimerDevice::new(Duration::ZERO);
        timer.enabled = false;
        std::thread::sleep(Duration::from_millis(2));
        assert_eq!(timer.poll_interrupt(), None);

        timer.enabled = true;
        timer.line = 4;
        assert_eq!(timer.poll_interrupt(), Some(Interrupt::new(4)));
    }

    #[test]
    fn test_timer_default() {
        let timer = TimerDevice::default();
        assert!(timer.enabled);
        assert_eq!(timer.interval, Duration::from_secs(1));
        assert!(timer.remaining() <= Duration::from_secs(1));
    }
}
