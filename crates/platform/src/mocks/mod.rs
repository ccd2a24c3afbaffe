//! Mock implementations for testing
//!
//! This module provides mock implementations of all platform traits
//! for use in unit and integration tests. Everything here is
//! `no_std`-compatible so downstream crates can use the mocks from their
//! own `tests/` directories via the `std` feature.

#![cfg(any(test, feature = "std"))]
#![allow(clippy::unwrap_used)]

use core::cell::{Cell, RefCell};
use core::sync::atomic::{AtomicU64, Ordering};

use embassy_time::{Duration, Instant};

use crate::app::{AppId, AppManager, LifecycleEvent, Suspendable};
use crate::battery::{ChargeStatus, PowerSupply, PowerSupplyError};
use crate::bluetooth::{RoleProvider, TwsRole};
use crate::clock::Clock;
use crate::config::ConfigStore;
use crate::message::{Message, MessageError, MessageSender};
use crate::sleep::{SleepController, WakeSource};

/// Advanceable simulated clock. Share it by reference: every platform
/// component is generic over `C: Clock`, and `&MockClock` implements
/// `Clock` via the blanket impl.
#[derive(Debug, Default)]
pub struct MockClock {
    now_ms: AtomicU64,
}

impl MockClock {
    /// Create a clock at t = 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Move simulated time forward.
    pub fn advance(&self, delta: Duration) {
        self.now_ms.fetch_add(delta.as_millis(), Ordering::Relaxed);
    }

    /// Current simulated uptime in milliseconds.
    pub fn uptime_ms(&self) -> u64 {
        self.now_ms.load(Ordering::Relaxed)
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        Instant::from_millis(self.now_ms.load(Ordering::Relaxed))
    }
}

/// One scripted deep-sleep episode for [`MockSleepController`].
#[derive(Debug, Clone, Copy)]
pub struct SleepOutcome {
    /// Wake source reported on return.
    pub wake: WakeSource,
    /// Simulated time spent asleep before that wake fires.
    pub advance: Duration,
}

/// Scripted sleep controller driving a [`MockClock`].
///
/// Each `enter_deep_sleep` call pops the next [`SleepOutcome`] and advances
/// the clock by its `advance` — clamped to the armed deadline, in which
/// case the wake reports as [`WakeSource::PowerdownTimer`] exactly like the
/// hardware timer would. With an empty plan the controller wakes
/// immediately: on the deadline when one is armed, as a `Key` wake
/// otherwise (so an unscripted test cannot hang).
pub struct MockSleepController<'a> {
    clock: &'a MockClock,
    plan: RefCell<heapless::Deque<SleepOutcome, 8>>,
    sleep_count: Cell<usize>,
    armed_deadlines: RefCell<heapless::Vec<Option<Duration>, 8>>,
    pending: Cell<u32>,
    early_suspend_count: Cell<usize>,
    late_resume_count: Cell<usize>,
}

impl<'a> MockSleepController<'a> {
    /// Create a controller with an empty plan.
    pub fn new(clock: &'a MockClock) -> Self {
        Self {
            clock,
            plan: RefCell::new(heapless::Deque::new()),
            sleep_count: Cell::new(0),
            armed_deadlines: RefCell::new(heapless::Vec::new()),
            pending: Cell::new(0),
            early_suspend_count: Cell::new(0),
            late_resume_count: Cell::new(0),
        }
    }

    /// Script the next sleep episode.
    pub fn push_outcome(&self, wake: WakeSource, advance: Duration) {
        self.plan
            .borrow_mut()
            .push_back(SleepOutcome { wake, advance })
            .unwrap();
    }

    /// Number of deep-sleep entries so far.
    pub fn sleep_count(&self) -> usize {
        self.sleep_count.get()
    }

    /// Deadline passed to the n-th deep-sleep entry.
    pub fn armed_deadline(&self, n: usize) -> Option<Duration> {
        self.armed_deadlines.borrow().get(n).copied().flatten()
    }

    /// Number of early-suspend hook invocations.
    pub fn early_suspend_count(&self) -> usize {
        self.early_suspend_count.get()
    }

    /// Number of late-resume hook invocations.
    pub fn late_resume_count(&self) -> usize {
        self.late_resume_count.get()
    }
}

impl SleepController for MockSleepController<'_> {
    async fn enter_deep_sleep(&self, deadline: Option<Duration>) -> WakeSource {
        self.sleep_count.set(self.sleep_count.get().saturating_add(1));
        let _ = self.armed_deadlines.borrow_mut().push(deadline);

        let outcome = self.plan.borrow_mut().pop_front();
        match (outcome, deadline) {
            (Some(o), Some(limit)) if o.advance >= limit => {
                self.clock.advance(limit);
                WakeSource::PowerdownTimer
            }
            (Some(o), _) => {
                self.clock.advance(o.advance);
                o.wake
            }
            (None, Some(limit)) => {
                self.clock.advance(limit);
                WakeSource::PowerdownTimer
            }
            (None, None) => WakeSource::Key,
        }
    }

    fn wake_pending(&self) -> u32 {
        self.pending.get()
    }

    fn clear_wake_pending(&self) {
        self.pending.set(0);
    }

    fn early_suspend(&self) {
        self.early_suspend_count
            .set(self.early_suspend_count.get().saturating_add(1));
    }

    fn late_resume(&self) {
        self.late_resume_count
            .set(self.late_resume_count.get().saturating_add(1));
    }
}

/// Mock battery/charger supply with settable readings.
pub struct MockPowerSupply {
    voltage_mv: Cell<u32>,
    capacity: Cell<u8>,
    status: Cell<ChargeStatus>,
    dc_present: Cell<bool>,
    fail_reads: Cell<bool>,
}

impl MockPowerSupply {
    /// Create a healthy supply: 4100 mV, 90 %, discharging, no DC.
    pub fn new() -> Self {
        Self {
            voltage_mv: Cell::new(4100),
            capacity: Cell::new(90),
            status: Cell::new(ChargeStatus::Discharging),
            dc_present: Cell::new(false),
            fail_reads: Cell::new(false),
        }
    }

    /// Set the reported battery voltage.
    pub fn set_voltage_mv(&self, mv: u32) {
        self.voltage_mv.set(mv);
    }

    /// Set the reported capacity.
    pub fn set_capacity(&self, percent: u8) {
        self.capacity.set(percent);
    }

    /// Set the reported charger state.
    pub fn set_status(&self, status: ChargeStatus) {
        self.status.set(status);
    }

    /// Set DC presence.
    pub fn set_dc_present(&self, present: bool) {
        self.dc_present.set(present);
    }

    /// Make every subsequent read fail.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.set(fail);
    }

    fn read<T>(&self, value: T) -> Result<T, PowerSupplyError> {
        if self.fail_reads.get() {
            Err(PowerSupplyError::NotResponding)
        } else {
            Ok(value)
        }
    }
}

impl Default for MockPowerSupply {
    fn default() -> Self {
        Self::new()
    }
}

impl PowerSupply for MockPowerSupply {
    fn voltage_mv(&self) -> Result<u32, PowerSupplyError> {
        self.read(self.voltage_mv.get())
    }

    fn capacity_percent(&self) -> Result<u8, PowerSupplyError> {
        self.read(self.capacity.get())
    }

    fn charge_status(&self) -> Result<ChargeStatus, PowerSupplyError> {
        self.read(self.status.get())
    }

    fn dc_present(&self) -> Result<bool, PowerSupplyError> {
        self.read(self.dc_present.get())
    }
}

/// Key/value config store seeded from test code.
#[derive(Default)]
pub struct MockConfigStore {
    ints: RefCell<heapless::Vec<(&'static str, u32), 16>>,
    bools: RefCell<heapless::Vec<(&'static str, bool), 16>>,
}

impl MockConfigStore {
    /// Create an empty store; every read falls back to its default.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an integer key.
    #[must_use]
    pub fn with_u32(self, key: &'static str, value: u32) -> Self {
        self.ints.borrow_mut().push((key, value)).unwrap();
        self
    }

    /// Seed a boolean key.
    #[must_use]
    pub fn with_bool(self, key: &'static str, value: bool) -> Self {
        self.bools.borrow_mut().push((key, value)).unwrap();
        self
    }
}

impl ConfigStore for MockConfigStore {
    fn get_u32(&self, key: &str, default: u32) -> u32 {
        self.ints
            .borrow()
            .iter()
            .find(|(k, _)| *k == key)
            .map_or(default, |(_, v)| *v)
    }

    fn get_bool(&self, key: &str, default: bool) -> bool {
        self.bools
            .borrow()
            .iter()
            .find(|(k, _)| *k == key)
            .map_or(default, |(_, v)| *v)
    }
}

/// Recording message bus.
#[derive(Default)]
pub struct MockMessageBus {
    sent: RefCell<heapless::Vec<(heapless::String<16>, Message), 32>>,
    fail_sends: Cell<bool>,
}

impl MockMessageBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent send fail with `QueueFull`.
    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.set(fail);
    }

    /// All messages sent to `recipient`, in order.
    pub fn sent_to(&self, recipient: &str) -> heapless::Vec<Message, 32> {
        let mut out = heapless::Vec::new();
        for (r, m) in self.sent.borrow().iter() {
            if r.as_str() == recipient {
                let _ = out.push(*m);
            }
        }
        out
    }

    /// Total number of messages sent.
    pub fn sent_count(&self) -> usize {
        self.sent.borrow().len()
    }
}

impl MessageSender for MockMessageBus {
    fn send(&self, recipient: &str, message: Message) -> Result<(), MessageError> {
        if self.fail_sends.get() {
            return Err(MessageError::QueueFull);
        }
        let mut name = heapless::String::new();
        let _ = name.push_str(recipient);
        self.sent
            .borrow_mut()
            .push((name, message))
            .map_err(|_| MessageError::QueueFull)
    }
}

/// Mock application manager with a notification log.
pub struct MockAppManager {
    current: Cell<Option<AppId>>,
    log: RefCell<heapless::Vec<(AppId, LifecycleEvent), 16>>,
}

impl MockAppManager {
    /// Create a manager with `app` focused.
    pub fn with_app(app: AppId) -> Self {
        Self {
            current: Cell::new(Some(app)),
            log: RefCell::new(heapless::Vec::new()),
        }
    }

    /// Change the focused app.
    pub fn set_current(&self, app: Option<AppId>) {
        self.current.set(app);
    }

    /// Notifications delivered so far, in order.
    pub fn notifications(&self) -> heapless::Vec<(AppId, LifecycleEvent), 16> {
        self.log.borrow().clone()
    }

    /// Count of delivered events matching `event`.
    pub fn count(&self, event: LifecycleEvent) -> usize {
        self.log.borrow().iter().filter(|(_, e)| *e == event).count()
    }
}

impl AppManager for MockAppManager {
    fn current_app(&self) -> Option<AppId> {
        self.current.get()
    }

    fn notify_app(&self, app: AppId, event: LifecycleEvent) {
        let _ = self.log.borrow_mut().push((app, event));
    }
}

/// Counting [`Suspendable`] probe, usable as a roster member or as the
/// registered standby notifier.
#[derive(Default)]
pub struct CountingProbe {
    suspends: Cell<usize>,
    resumes: Cell<usize>,
}

impl CountingProbe {
    /// Create a probe with zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `on_suspend` calls.
    pub fn suspend_count(&self) -> usize {
        self.suspends.get()
    }

    /// Number of `on_resume` calls.
    pub fn resume_count(&self) -> usize {
        self.resumes.get()
    }
}

impl Suspendable for CountingProbe {
    fn on_suspend(&self) {
        self.suspends.set(self.suspends.get().saturating_add(1));
    }

    fn on_resume(&self) {
        self.resumes.set(self.resumes.get().saturating_add(1));
    }
}

/// Role provider returning a settable fixed role.
pub struct FixedRole(Cell<TwsRole>);

impl FixedRole {
    /// Create a provider reporting `role`.
    pub fn new(role: TwsRole) -> Self {
        Self(Cell::new(role))
    }

    /// Change the reported role.
    pub fn set(&self, role: TwsRole) {
        self.0.set(role);
    }
}

impl RoleProvider for FixedRole {
    fn tws_role(&self) -> TwsRole {
        self.0.get()
    }
}
