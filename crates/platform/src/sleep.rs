//! SoC sleep/wake primitives
//!
//! The deepest standby stage hands the CPU to hardware: the calling
//! execution context blocks inside [`SleepController::enter_deep_sleep`]
//! until a wake interrupt fires. The original firmware spun on a wake flag;
//! here the wake ISR signals an embassy-sync [`Signal`] instead, which is
//! what [`SignalSleepController`] implements.

use core::sync::atomic::{AtomicU32, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::{with_timeout, Duration};

/// Sleep depth selected for the standby ladder.
///
/// `Shallow` gates clocks but skips the application suspend choreography;
/// `Deep` notifies every collaborator to suspend before entering hardware
/// sleep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SleepProfile {
    /// Light sleep: peripherals stay configured, fast resume.
    Shallow,
    /// Deep sleep: applications and services suspended, minimal power.
    Deep,
}

/// Hardware wake-up cause, as reported on return from deep sleep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WakeSource {
    /// On/off or media key edge.
    Key,
    /// Bluetooth controller activity (page/sniff/link event).
    Bluetooth,
    /// RTC alarm.
    Rtc,
    /// External DC power appeared.
    DcPower,
    /// The armed powerdown deadline elapsed before any other wake.
    PowerdownTimer,
    /// Unclassified edge; treated per the wake policy table.
    Unknown,
}

/// Low-level sleep/wake control, one implementation per SoC.
///
/// All methods take `&self`: implementations use interior mutability so the
/// controller can share the instance with the wake interrupt handler.
pub trait SleepController {
    /// Enter the deepest sleep mode and block until a wake event.
    ///
    /// `deadline`, when set, arms a hardware powerdown timer: if nothing
    /// else wakes the system first, the call returns
    /// [`WakeSource::PowerdownTimer`] once the deadline elapses.
    async fn enter_deep_sleep(&self, deadline: Option<Duration>) -> WakeSource;

    /// Raw wake-pending bitmap, valid immediately after
    /// [`enter_deep_sleep`](Self::enter_deep_sleep) returns.
    fn wake_pending(&self) -> u32;

    /// Acknowledge and clear the wake-pending bitmap.
    fn clear_wake_pending(&self);

    /// Early-suspend hook: power down display/touch cooperating
    /// peripherals on the NORMAL→S1 edge.
    fn early_suspend(&self);

    /// Late-resume hook: re-enable what [`early_suspend`](Self::early_suspend)
    /// turned off, on the S1→NORMAL edge.
    fn late_resume(&self);
}

/// [`SleepController`] built over an embassy-sync [`Signal`].
///
/// The wake interrupt handler calls [`wake_from_isr`](Self::wake_from_isr);
/// the sleeping context awaits the signal. Board code supplies the actual
/// enter/exit register sequence around this object; the early-suspend /
/// late-resume hooks are forwarded to a pair of function pointers so the
/// struct itself stays const-constructible in a `static`.
pub struct SignalSleepController {
    wake: Signal<CriticalSectionRawMutex, WakeSource>,
    pending: AtomicU32,
    early_suspend: fn(),
    late_resume: fn(),
}

impl SignalSleepController {
    /// Create a controller with the given peripheral suspend/resume hooks.
    #[must_use]
    pub const fn new(early_suspend: fn(), late_resume: fn()) -> Self {
        Self {
            wake: Signal::new(),
            pending: AtomicU32::new(0),
            early_suspend,
            late_resume,
        }
    }

    /// Report a wake event. Safe to call from interrupt context.
    pub fn wake_from_isr(&self, source: WakeSource, pending_bits: u32) {
        self.pending.fetch_or(pending_bits, Ordering::Relaxed);
        self.wake.signal(source);
    }
}

impl SleepController for SignalSleepController {
    async fn enter_deep_sleep(&self, deadline: Option<Duration>) -> WakeSource {
        self.wake.reset();
        match deadline {
            Some(limit) => match with_timeout(limit, self.wake.wait()).await {
                Ok(source) => source,
                Err(_) => WakeSource::PowerdownTimer,
            },
            None => self.wake.wait().await,
        }
    }

    fn wake_pending(&self) -> u32 {
        self.pending.load(Ordering::Relaxed)
    }

    fn clear_wake_pending(&self) {
        self.pending.store(0, Ordering::Relaxed);
    }

    fn early_suspend(&self) {
        (self.early_suspend)();
    }

    fn late_resume(&self) {
        (self.late_resume)();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::AtomicUsize;

    fn noop() {}

    #[test]
    fn wake_pending_bits_accumulate_until_cleared() {
        let ctl = SignalSleepController::new(noop, noop);
        ctl.wake_from_isr(WakeSource::Key, 0b01);
        ctl.wake_from_isr(WakeSource::Rtc, 0b10);
        assert_eq!(ctl.wake_pending(), 0b11);
        ctl.clear_wake_pending();
        assert_eq!(ctl.wake_pending(), 0);
    }

    #[test]
    fn hooks_are_forwarded() {
        static EARLY: AtomicUsize = AtomicUsize::new(0);
        static LATE: AtomicUsize = AtomicUsize::new(0);
        fn early() {
            EARLY.fetch_add(1, Ordering::Relaxed);
        }
        fn late() {
            LATE.fetch_add(1, Ordering::Relaxed);
        }

        let ctl = SignalSleepController::new(early, late);
        ctl.early_suspend();
        ctl.late_resume();
        ctl.late_resume();
        assert_eq!(EARLY.load(Ordering::Relaxed), 1);
        assert_eq!(LATE.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn wake_signal_ends_sleep_and_reports_source() {
        let ctl = SignalSleepController::new(noop, noop);
        let (wake, ()) = tokio::join!(ctl.enter_deep_sleep(None), async {
            tokio::time::sleep(core::time::Duration::from_millis(5)).await;
            ctl.wake_from_isr(WakeSource::Bluetooth, 0b100);
        });
        assert_eq!(wake, WakeSource::Bluetooth);
        assert_eq!(ctl.wake_pending(), 0b100);
    }

    #[tokio::test]
    async fn deadline_elapses_to_powerdown_wake() {
        let ctl = SignalSleepController::new(noop, noop);
        let wake = ctl.enter_deep_sleep(Some(Duration::from_millis(5))).await;
        assert_eq!(wake, WakeSource::PowerdownTimer);
    }
}
