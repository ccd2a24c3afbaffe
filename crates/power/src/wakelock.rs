//! Reference-counted wakelocks vetoing sleep deepening.
//!
//! The registry is a fixed two-entry table: a FULL lock that vetoes any
//! deepening past NORMAL, and a PARTIAL lock that vetoes only the deepest
//! hardware stage. Any thread or interrupt handler may acquire and release;
//! the read-modify-write runs under a critical section, never a blocking
//! lock.
//!
//! Besides the counts, the registry tracks for each lock how long it has
//! been continuously free — the idle clocks the standby controller measures
//! its timeouts against.

use core::cell::RefCell;
use core::sync::atomic::{AtomicBool, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_time::{Duration, Instant};
use platform::Clock;
use thiserror_no_std::Error;

/// Lock classes, by how much sleep deepening they veto.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WakeLockKind {
    /// Vetoes only the deepest hardware sleep stage. The CPU keeps
    /// running; screen and touch may still be off.
    Partial,
    /// Vetoes all deepening: screen and input stay fully live.
    Full,
}

/// Errors from registry operations.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WakeLockError {
    /// `release` without a matching `acquire`. The count is left at zero;
    /// this is a caller logic error, not an environmental failure.
    #[error("release without matching acquire")]
    NotHeld,
}

#[derive(Clone, Copy)]
struct LockEntry {
    ref_count: u16,
    /// Set while the count is zero; `None` means "currently held".
    free_since: Option<Instant>,
}

/// Process-wide wakelock registry.
///
/// Constructed once by the application root and shared by reference with
/// every subsystem; tests construct a fresh registry per case instead of
/// resetting a global.
pub struct WakeLocks<C: Clock> {
    clock: C,
    entries: Mutex<CriticalSectionRawMutex, RefCell<[LockEntry; 2]>>,
    fast_standby: AtomicBool,
}

impl<C: Clock> WakeLocks<C> {
    /// Create the registry with both locks free as of now.
    pub fn new(clock: C) -> Self {
        let now = clock.now();
        let free = LockEntry {
            ref_count: 0,
            free_since: Some(now),
        };
        Self {
            clock,
            entries: Mutex::new(RefCell::new([free; 2])),
            fast_standby: AtomicBool::new(false),
        }
    }

    /// Hold `kind`, preventing the corresponding sleep deepening.
    ///
    /// Safe from interrupt context. Also cancels any pending fast-standby
    /// request: new activity invalidates a stale force-sleep.
    pub fn acquire(&self, kind: WakeLockKind) {
        self.entries.lock(|cell| {
            let mut entries = cell.borrow_mut();
            let entry = Self::entry_mut(&mut entries, kind);
            debug_assert!(entry.ref_count < u16::MAX);
            entry.ref_count = entry.ref_count.saturating_add(1);
            entry.free_since = None;
        });
        self.fast_standby.store(false, Ordering::Relaxed);
        debug!("wakelock acquired");
    }

    /// Release one hold on `kind`.
    ///
    /// When the count reaches zero the idle clock restarts from now.
    /// Releasing the FULL lock additionally restarts the idle clock of
    /// every other free lock: system-wide activity resets all subsystems'
    /// idle measurement at once.
    ///
    /// # Errors
    ///
    /// [`WakeLockError::NotHeld`] when the count is already zero; the
    /// count is left unchanged rather than wrapped.
    pub fn release(&self, kind: WakeLockKind) -> Result<(), WakeLockError> {
        let now = self.clock.now();
        let result = self.entries.lock(|cell| {
            let mut entries = cell.borrow_mut();
            let entry = Self::entry_mut(&mut entries, kind);
            if entry.ref_count == 0 {
                return Err(WakeLockError::NotHeld);
            }
            entry.ref_count = entry.ref_count.saturating_sub(1);
            match kind {
                WakeLockKind::Full => Self::stamp_free(&mut entries, now),
                WakeLockKind::Partial => {
                    if entry.ref_count == 0 {
                        entry.free_since = Some(now);
                    }
                }
            }
            Ok(())
        });
        match result {
            Ok(()) => debug!("wakelock released"),
            Err(_) => error!("wakelock release without matching acquire"),
        }
        result
    }

    /// Current holder count for `kind`. Zero means free.
    pub fn check(&self, kind: WakeLockKind) -> u16 {
        self.entries
            .lock(|cell| Self::entry_mut(&mut cell.borrow_mut(), kind).ref_count)
    }

    /// How long `kind` has been continuously free; zero while held.
    pub fn free_time(&self, kind: WakeLockKind) -> Duration {
        let now = self.clock.now();
        self.entries.lock(|cell| {
            let mut entries = cell.borrow_mut();
            let entry = Self::entry_mut(&mut entries, kind);
            if entry.ref_count != 0 {
                return Duration::from_ticks(0);
            }
            match entry.free_since {
                Some(since) => {
                    Duration::from_millis(now.as_millis().saturating_sub(since.as_millis()))
                }
                None => Duration::from_ticks(0),
            }
        })
    }

    /// Acquire-then-release poke: restart `kind`'s idle clock without a
    /// net change in holders. Like any acquire, cancels a pending
    /// fast-standby request.
    pub fn reset(&self, kind: WakeLockKind) {
        let now = self.clock.now();
        self.entries.lock(|cell| {
            let mut entries = cell.borrow_mut();
            match kind {
                WakeLockKind::Full => Self::stamp_free(&mut entries, now),
                WakeLockKind::Partial => {
                    let entry = Self::entry_mut(&mut entries, kind);
                    if entry.ref_count == 0 {
                        entry.free_since = Some(now);
                    }
                }
            }
        });
        self.fast_standby.store(false, Ordering::Relaxed);
        debug!("wakelock reset");
    }

    /// Request an immediate standby transition, bypassing the idle
    /// timeout. Cancelled by any subsequent acquire.
    pub fn request_fast_standby(&self) {
        self.fast_standby.store(true, Ordering::Relaxed);
    }

    /// Withdraw a pending fast-standby request.
    pub fn clear_fast_standby(&self) {
        self.fast_standby.store(false, Ordering::Relaxed);
    }

    /// Whether a fast-standby request is pending.
    pub fn fast_standby_requested(&self) -> bool {
        self.fast_standby.load(Ordering::Relaxed)
    }

    fn entry_mut(entries: &mut [LockEntry; 2], kind: WakeLockKind) -> &mut LockEntry {
        let [partial, full] = entries;
        match kind {
            WakeLockKind::Partial => partial,
            WakeLockKind::Full => full,
        }
    }

    /// Restart the idle clock of every currently-free lock.
    fn stamp_free(entries: &mut [LockEntry; 2], now: Instant) {
        for entry in entries.iter_mut() {
            if entry.ref_count == 0 {
                entry.free_since = Some(now);
            }
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]
mod tests {
    use super::*;
    use platform::mocks::MockClock;

    fn registry(clock: &MockClock) -> WakeLocks<&MockClock> {
        WakeLocks::new(clock)
    }

    #[test]
    fn acquire_release_balances() {
        let clock = MockClock::new();
        let locks = registry(&clock);

        locks.acquire(WakeLockKind::Full);
        locks.acquire(WakeLockKind::Full);
        assert_eq!(locks.check(WakeLockKind::Full), 2);

        locks.release(WakeLockKind::Full).unwrap();
        locks.release(WakeLockKind::Full).unwrap();
        assert_eq!(locks.check(WakeLockKind::Full), 0);
    }

    #[test]
    fn extra_release_is_error_and_count_stays_zero() {
        let clock = MockClock::new();
        let locks = registry(&clock);

        locks.acquire(WakeLockKind::Partial);
        locks.release(WakeLockKind::Partial).unwrap();
        assert_eq!(
            locks.release(WakeLockKind::Partial),
            Err(WakeLockError::NotHeld)
        );
        assert_eq!(locks.check(WakeLockKind::Partial), 0);
    }

    #[test]
    fn free_time_tracks_elapsed_since_release() {
        let clock = MockClock::new();
        let locks = registry(&clock);

        locks.acquire(WakeLockKind::Full);
        clock.advance(Duration::from_secs(3));
        assert_eq!(locks.free_time(WakeLockKind::Full), Duration::from_ticks(0));

        locks.release(WakeLockKind::Full).unwrap();
        clock.advance(Duration::from_secs(7));
        assert_eq!(locks.free_time(WakeLockKind::Full), Duration::from_secs(7));
    }

    #[test]
    fn reacquire_resets_free_time_immediately() {
        let clock = MockClock::new();
        let locks = registry(&clock);

        clock.advance(Duration::from_secs(100));
        assert_eq!(
            locks.free_time(WakeLockKind::Full),
            Duration::from_secs(100)
        );

        locks.acquire(WakeLockKind::Full);
        assert_eq!(locks.free_time(WakeLockKind::Full), Duration::from_ticks(0));
    }

    #[test]
    fn full_release_restarts_all_idle_clocks() {
        let clock = MockClock::new();
        let locks = registry(&clock);

        clock.advance(Duration::from_secs(500));
        assert_eq!(
            locks.free_time(WakeLockKind::Partial),
            Duration::from_secs(500)
        );

        locks.acquire(WakeLockKind::Full);
        locks.release(WakeLockKind::Full).unwrap();
        assert_eq!(
            locks.free_time(WakeLockKind::Partial),
            Duration::from_ticks(0)
        );
        assert_eq!(locks.free_time(WakeLockKind::Full), Duration::from_ticks(0));
    }

    #[test]
    fn reset_pokes_idle_clock_without_holding() {
        let clock = MockClock::new();
        let locks = registry(&clock);

        clock.advance(Duration::from_secs(42));
        locks.reset(WakeLockKind::Partial);
        assert_eq!(locks.check(WakeLockKind::Partial), 0);
        assert_eq!(
            locks.free_time(WakeLockKind::Partial),
            Duration::from_ticks(0)
        );
    }

    #[test]
    fn acquire_cancels_fast_standby_request() {
        let clock = MockClock::new();
        let locks = registry(&clock);

        locks.request_fast_standby();
        assert!(locks.fast_standby_requested());

        locks.acquire(WakeLockKind::Partial);
        assert!(!locks.fast_standby_requested());
    }

    #[test]
    fn held_partial_not_stamped_by_full_release() {
        let clock = MockClock::new();
        let locks = registry(&clock);

        locks.acquire(WakeLockKind::Partial);
        locks.acquire(WakeLockKind::Full);
        clock.advance(Duration::from_secs(5));
        locks.release(WakeLockKind::Full).unwrap();

        // Partial is still held: its idle clock only starts at its own
        // release.
        assert_eq!(
            locks.free_time(WakeLockKind::Partial),
            Duration::from_ticks(0)
        );
        clock.advance(Duration::from_secs(2));
        locks.release(WakeLockKind::Partial).unwrap();
        clock.advance(Duration::from_secs(3));
        assert_eq!(
            locks.free_time(WakeLockKind::Partial),
            Duration::from_secs(3)
        );
    }

    #[test]
    fn free_time_starts_at_zero_on_boot() {
        let clock = MockClock::new();
        let locks = registry(&clock);
        assert_eq!(locks.free_time(WakeLockKind::Full), Duration::from_ticks(0));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone, Copy)]
        enum Op {
            Acquire(bool),
            Release(bool),
            Advance(u16),
        }

        fn op_strategy() -> impl Strategy<Value = Op> {
            prop_oneof![
                any::<bool>().prop_map(Op::Acquire),
                any::<bool>().prop_map(Op::Release),
                (1u16..5000).prop_map(Op::Advance),
            ]
        }

        fn kind(full: bool) -> WakeLockKind {
            if full {
                WakeLockKind::Full
            } else {
                WakeLockKind::Partial
            }
        }

        proptest! {
            /// No sequence of operations drives a count negative or makes
            /// free_time nonzero while a lock is held.
            #[test]
            fn counts_never_underflow(ops in proptest::collection::vec(op_strategy(), 1..64)) {
                let clock = MockClock::new();
                let locks = WakeLocks::new(&clock);
                let mut held = [0u16; 2];

                for op in ops {
                    match op {
                        Op::Acquire(full) => {
                            locks.acquire(kind(full));
                            held[usize::from(full)] += 1;
                        }
                        Op::Release(full) => {
                            let expected = held[usize::from(full)];
                            let result = locks.release(kind(full));
                            if expected == 0 {
                                prop_assert_eq!(result, Err(WakeLockError::NotHeld));
                            } else {
                                prop_assert!(result.is_ok());
                                held[usize::from(full)] -= 1;
                            }
                        }
                        Op::Advance(ms) => clock.advance(Duration::from_millis(u64::from(ms))),
                    }
                    for full in [false, true] {
                        prop_assert_eq!(locks.check(kind(full)), held[usize::from(full)]);
                        if held[usize::from(full)] > 0 {
                            prop_assert_eq!(
                                locks.free_time(kind(full)),
                                Duration::from_ticks(0)
                            );
                        }
                    }
                }
            }
        }
    }
}
