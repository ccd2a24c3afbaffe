//! Layered standby state machine.
//!
//! Stages deepen one step per periodic tick — NORMAL → S1 (display off) →
//! S2 (apps suspended) → S3 (hardware deep sleep) — and unwind toward
//! NORMAL as soon as a wakelock reappears. S3 is the only stage that
//! blocks: the step future suspends inside the hardware sleep call until a
//! wake interrupt fires.
//!
//! The step function must only ever run on one execution context (the
//! periodic monitor tick). Everything other contexts touch — the setter
//! surface and the published stage — lives in [`StandbyControls`], a block
//! of plain atomics shared by reference.

use core::sync::atomic::{AtomicU64, AtomicU8, Ordering};

use embassy_time::{Duration, Instant};
use heapless::Vec;
use platform::config::{CFG_AUTO_POWERDOWN_EN, CFG_AUTO_POWERDOWN_S, CFG_AUTO_STANDBY_S};
use platform::{
    AppId, AppManager, Clock, ConfigStore, LifecycleEvent, Message, MessageSender,
    ServiceNotifier, SleepController, SleepProfile, Suspendable, WakeSource, MAIN_RECIPIENT,
};
use thiserror_no_std::Error;

use crate::wakelock::{WakeLockKind, WakeLocks};

/// Configured auto-standby timeouts below this are clamped up to it.
pub const STANDBY_MIN_TIME: Duration = Duration::from_secs(5);

/// Sentinel for "timeout disabled" in the atomic millisecond fields.
const DISABLED_MS: u64 = u64::MAX;

/// Standby stage, by increasing depth of power savings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StandbyStage {
    /// Fully awake; screen on.
    Normal,
    /// Display and input peripherals suspended; apps still running.
    S1,
    /// Applications and services suspended; preparing hardware sleep.
    S2,
    /// Hardware deep sleep active; the step context is blocked.
    S3,
}

/// What a given wake source does to an in-progress deep sleep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WakeDisposition {
    /// Resume fully: exit through S1 back to NORMAL.
    ResumeNormal,
    /// Resume services and apps but stay in S1 (screen stays off).
    ResumeIdle,
    /// Uninteresting edge: re-enter hardware sleep without unwinding.
    Reloop,
}

/// Wake-source classification table, injected at construction so the
/// policy is explicit and test-visible rather than buried in the loop.
#[derive(Debug, Clone, Copy)]
pub struct WakePolicy {
    /// Disposition for key wakes.
    pub key: WakeDisposition,
    /// Disposition for Bluetooth link activity.
    pub bluetooth: WakeDisposition,
    /// Disposition for RTC alarms.
    pub rtc: WakeDisposition,
    /// Disposition for DC power appearing.
    pub dc_power: WakeDisposition,
    /// Disposition for unclassified wake edges.
    pub unknown: WakeDisposition,
}

impl Default for WakePolicy {
    /// Key, RTC and DC wakes resume fully; Bluetooth link maintenance
    /// resumes only the suspended collaborators and keeps the screen off;
    /// unclassified edges go straight back to sleep.
    fn default() -> Self {
        Self {
            key: WakeDisposition::ResumeNormal,
            bluetooth: WakeDisposition::ResumeIdle,
            rtc: WakeDisposition::ResumeNormal,
            dc_power: WakeDisposition::ResumeNormal,
            unknown: WakeDisposition::Reloop,
        }
    }
}

impl WakePolicy {
    /// Disposition for `source`. The powerdown timer always resumes; its
    /// handling happens before the policy is consulted.
    #[must_use]
    pub fn disposition(&self, source: WakeSource) -> WakeDisposition {
        match source {
            WakeSource::Key => self.key,
            WakeSource::Bluetooth => self.bluetooth,
            WakeSource::Rtc => self.rtc,
            WakeSource::DcPower => self.dc_power,
            WakeSource::PowerdownTimer => WakeDisposition::ResumeNormal,
            WakeSource::Unknown => self.unknown,
        }
    }
}

/// Errors from standby configuration calls.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StandbyError {
    /// Only one external standby notifier slot exists.
    #[error("a standby notifier is already registered")]
    NotifierAlreadyRegistered,
    /// The service roster is at capacity.
    #[error("service roster full")]
    RosterFull,
}

/// Explicit suspend/resume fan-out list.
///
/// Services are suspended in registration order and resumed in reverse,
/// so teardown mirrors bring-up.
pub struct ServiceRoster<'a, const N: usize = 8> {
    services: Vec<&'a dyn Suspendable, N>,
}

impl<'a, const N: usize> ServiceRoster<'a, N> {
    /// Create an empty roster.
    #[must_use]
    pub fn new() -> Self {
        Self {
            services: Vec::new(),
        }
    }

    /// Add a service to the fan-out list.
    pub fn register(&mut self, service: &'a dyn Suspendable) -> Result<(), StandbyError> {
        self.services
            .push(service)
            .map_err(|_| StandbyError::RosterFull)
    }

    /// Number of registered services.
    #[must_use]
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Whether the roster is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

impl<const N: usize> Default for ServiceRoster<'_, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> ServiceNotifier for ServiceRoster<'_, N> {
    fn notify_services(&self, event: LifecycleEvent) {
        match event {
            LifecycleEvent::Suspend => {
                for service in self.services.iter() {
                    service.on_suspend();
                }
            }
            LifecycleEvent::Resume => {
                for service in self.services.iter().rev() {
                    service.on_resume();
                }
            }
        }
    }
}

/// Cross-context setter/query surface of the standby machine.
///
/// Every field is a single scalar behind an atomic: setters may be called
/// from any thread or interrupt while the controller steps, and no field
/// pair carries a joint invariant.
pub struct StandbyControls {
    profile: AtomicU8,
    auto_standby_ms: AtomicU64,
    auto_powerdown_ms: AtomicU64,
    stage: AtomicU8,
    wake_stamp_ms: AtomicU64,
}

impl StandbyControls {
    /// Create controls with deep sleep selected and both timers disabled.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            profile: AtomicU8::new(PROFILE_DEEP),
            auto_standby_ms: AtomicU64::new(DISABLED_MS),
            auto_powerdown_ms: AtomicU64::new(DISABLED_MS),
            stage: AtomicU8::new(STAGE_NORMAL),
            wake_stamp_ms: AtomicU64::new(0),
        }
    }

    /// Select how deep the machine sleeps once idle.
    pub fn set_sleep_profile(&self, profile: SleepProfile) {
        let raw = match profile {
            SleepProfile::Shallow => PROFILE_SHALLOW,
            SleepProfile::Deep => PROFILE_DEEP,
        };
        self.profile.store(raw, Ordering::Relaxed);
    }

    /// Currently selected sleep profile.
    pub fn sleep_profile(&self) -> SleepProfile {
        if self.profile.load(Ordering::Relaxed) == PROFILE_SHALLOW {
            SleepProfile::Shallow
        } else {
            SleepProfile::Deep
        }
    }

    /// Set the idle duration after which standby begins; `None` disables
    /// auto standby entirely.
    pub fn set_auto_standby(&self, timeout: Option<Duration>) {
        self.auto_standby_ms
            .store(timeout.map_or(DISABLED_MS, |t| t.as_millis()), Ordering::Relaxed);
    }

    /// Auto-standby timeout in whole seconds; 0 disables.
    pub fn set_auto_standby_secs(&self, secs: u32) {
        self.set_auto_standby((secs != 0).then_some(Duration::from_secs(u64::from(secs))));
    }

    /// Configured auto-standby timeout.
    pub fn auto_standby(&self) -> Option<Duration> {
        match self.auto_standby_ms.load(Ordering::Relaxed) {
            DISABLED_MS => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    /// Set the idle duration after which the system powers off; `None`
    /// disables auto powerdown.
    pub fn set_auto_powerdown(&self, timeout: Option<Duration>) {
        self.auto_powerdown_ms
            .store(timeout.map_or(DISABLED_MS, |t| t.as_millis()), Ordering::Relaxed);
    }

    /// Auto-powerdown timeout in whole seconds; 0 disables.
    pub fn set_auto_powerdown_secs(&self, secs: u32) {
        self.set_auto_powerdown((secs != 0).then_some(Duration::from_secs(u64::from(secs))));
    }

    /// Configured auto-powerdown timeout.
    pub fn auto_powerdown(&self) -> Option<Duration> {
        match self.auto_powerdown_ms.load(Ordering::Relaxed) {
            DISABLED_MS => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    /// Stage last published by the controller.
    pub fn stage(&self) -> StandbyStage {
        match self.stage.load(Ordering::Relaxed) {
            STAGE_S1 => StandbyStage::S1,
            STAGE_S2 => StandbyStage::S2,
            STAGE_S3 => StandbyStage::S3,
            _ => StandbyStage::Normal,
        }
    }

    /// Whether the display pipeline is live (stage is NORMAL).
    pub fn is_screen_on(&self) -> bool {
        self.stage() == StandbyStage::Normal
    }

    /// Uptime at the last full wake (last S1 exit).
    pub fn last_wake_uptime(&self) -> Duration {
        Duration::from_millis(self.wake_stamp_ms.load(Ordering::Relaxed))
    }

    fn publish_stage(&self, stage: StandbyStage) {
        let raw = match stage {
            StandbyStage::Normal => STAGE_NORMAL,
            StandbyStage::S1 => STAGE_S1,
            StandbyStage::S2 => STAGE_S2,
            StandbyStage::S3 => STAGE_S3,
        };
        self.stage.store(raw, Ordering::Relaxed);
    }

    fn stamp_wake(&self, now: Instant) {
        self.wake_stamp_ms.store(now.as_millis(), Ordering::Relaxed);
    }
}

impl Default for StandbyControls {
    fn default() -> Self {
        Self::new()
    }
}

const PROFILE_SHALLOW: u8 = 0;
const PROFILE_DEEP: u8 = 1;
const STAGE_NORMAL: u8 = 0;
const STAGE_S1: u8 = 1;
const STAGE_S2: u8 = 2;
const STAGE_S3: u8 = 3;

/// The standby state machine.
///
/// Owned by the periodic monitor task; [`step`](Self::step) is not
/// reentrant and must only run there. All collaborators are injected by
/// reference so tests construct a fresh machine per case.
pub struct StandbyController<'a, C, S, A, V, M>
where
    C: Clock,
    S: SleepController,
    A: AppManager,
    V: ServiceNotifier,
    M: MessageSender,
{
    clock: C,
    locks: &'a WakeLocks<C>,
    controls: &'a StandbyControls,
    sleep: &'a S,
    apps: &'a A,
    services: &'a V,
    bus: &'a M,
    policy: WakePolicy,
    stage: StandbyStage,
    powerdown_fired: bool,
    last_app: Option<AppId>,
    notifier_suspended: bool,
    services_suspended: bool,
    notifier: Option<&'a dyn Suspendable>,
}

impl<'a, C, S, A, V, M> StandbyController<'a, C, S, A, V, M>
where
    C: Clock,
    S: SleepController,
    A: AppManager,
    V: ServiceNotifier,
    M: MessageSender,
{
    /// Initialize the machine in NORMAL, loading the timeout configuration
    /// from `cfg` into `controls`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        clock: C,
        locks: &'a WakeLocks<C>,
        controls: &'a StandbyControls,
        sleep: &'a S,
        apps: &'a A,
        services: &'a V,
        bus: &'a M,
        policy: WakePolicy,
        cfg: &dyn ConfigStore,
    ) -> Self {
        let standby_secs = cfg.get_u32(CFG_AUTO_STANDBY_S, 0);
        let auto_standby = match standby_secs {
            0 => None,
            secs => {
                let requested = Duration::from_secs(u64::from(secs));
                if requested < STANDBY_MIN_TIME {
                    warn!("auto standby too small, using minimum");
                    Some(STANDBY_MIN_TIME)
                } else {
                    Some(requested)
                }
            }
        };
        controls.set_auto_standby(auto_standby);

        let powerdown_enabled = cfg.get_bool(CFG_AUTO_POWERDOWN_EN, true);
        let powerdown_secs = cfg.get_u32(CFG_AUTO_POWERDOWN_S, 0);
        if powerdown_enabled && powerdown_secs != 0 {
            controls.set_auto_powerdown_secs(powerdown_secs);
        } else {
            if !powerdown_enabled {
                warn!("auto powerdown disabled by config");
            }
            controls.set_auto_powerdown(None);
        }

        controls.publish_stage(StandbyStage::Normal);
        controls.stamp_wake(clock.now());
        info!("standby up, auto standby {} s", standby_secs);

        Self {
            clock,
            locks,
            controls,
            sleep,
            apps,
            services,
            bus,
            policy,
            stage: StandbyStage::Normal,
            powerdown_fired: false,
            last_app: None,
            notifier_suspended: false,
            services_suspended: false,
            notifier: None,
        }
    }

    /// Register the single external standby notifier, told to suspend
    /// before and resume after the app/service choreography.
    pub fn register_notifier(&mut self, notifier: &'a dyn Suspendable) -> Result<(), StandbyError> {
        if self.notifier.is_some() {
            return Err(StandbyError::NotifierAlreadyRegistered);
        }
        self.notifier = Some(notifier);
        Ok(())
    }

    /// Current stage.
    pub fn stage(&self) -> StandbyStage {
        self.stage
    }

    /// Duration since the last full wake (last S1 exit).
    pub fn time_since_wake(&self) -> Duration {
        let now = self.clock.now().as_millis();
        Duration::from_millis(now.saturating_sub(self.controls.last_wake_uptime().as_millis()))
    }

    /// Total uptime.
    pub fn uptime(&self) -> Duration {
        Duration::from_millis(self.clock.now().as_millis())
    }

    /// One state-machine step. Invoked from the periodic monitor tick;
    /// returns quickly except when it enters hardware sleep, in which case
    /// the future stays suspended until a wake event.
    pub async fn step(&mut self) {
        if self.check_auto_powerdown() {
            return;
        }
        match self.stage {
            StandbyStage::Normal => self.process_normal(),
            StandbyStage::S1 => self.process_s1(),
            StandbyStage::S2 | StandbyStage::S3 => self.process_s2().await,
        }
    }

    fn process_normal(&mut self) {
        if self.locks.check(WakeLockKind::Full) > 0 {
            return;
        }
        if self.locks.fast_standby_requested() || self.standby_due(WakeLockKind::Full) {
            self.enter_s1();
        }
    }

    fn process_s1(&mut self) {
        if self.locks.check(WakeLockKind::Full) > 0 {
            self.exit_s1();
        } else if !self.standby_due(WakeLockKind::Full) {
            // The idle clock restarted under us: the timeout was transient.
            if !self.locks.fast_standby_requested() {
                self.exit_s1();
            }
        } else if self.standby_due(WakeLockKind::Partial) {
            if self.locks.check(WakeLockKind::Partial) == 0 {
                self.enter_s2();
            }
        } else if self.locks.fast_standby_requested()
            && self.locks.check(WakeLockKind::Partial) == 0
        {
            self.enter_s2();
        }
    }

    async fn process_s2(&mut self) {
        self.locks.clear_fast_standby();

        let mut last_wake: Option<WakeSource> = None;
        let resume = loop {
            if self.any_lock_held() {
                break self.resume_disposition(last_wake);
            }
            let wake = self.enter_s3(self.powerdown_budget()).await;
            self.sleep.clear_wake_pending();
            if wake == WakeSource::PowerdownTimer || self.powerdown_due() {
                self.exit_s2();
                self.fire_powerdown();
                return;
            }
            last_wake = Some(wake);
            if self.any_lock_held() {
                break self.resume_disposition(last_wake);
            }
            match self.policy.disposition(wake) {
                WakeDisposition::Reloop => {}
                interesting => break interesting,
            }
        };

        self.exit_s2();
        match resume {
            WakeDisposition::ResumeNormal => {
                self.locks.acquire(WakeLockKind::Full);
                self.exit_s1();
                let _ = self.locks.release(WakeLockKind::Full);
            }
            WakeDisposition::ResumeIdle => self.locks.reset(WakeLockKind::Partial),
            WakeDisposition::Reloop => {}
        }
    }

    fn enter_s1(&mut self) {
        self.set_stage(StandbyStage::S1);
        self.sleep.early_suspend();
        info!("enter S1");
    }

    fn exit_s1(&mut self) {
        self.set_stage(StandbyStage::Normal);
        self.controls.stamp_wake(self.clock.now());
        self.sleep.late_resume();
        info!("exit S1");
    }

    fn enter_s2(&mut self) {
        self.set_stage(StandbyStage::S2);

        if self.controls.sleep_profile() == SleepProfile::Deep {
            if let Some(notifier) = self.notifier {
                notifier.on_suspend();
                self.notifier_suspended = true;
            }
            self.last_app = self.apps.current_app();
            if let Some(app) = self.last_app {
                self.apps.notify_app(app, LifecycleEvent::Suspend);
            }
            if self.any_lock_held() {
                // A collaborator woke up mid-transition; unwind exactly
                // what was suspended and fall back to S1.
                info!("standby entry aborted");
                self.exit_s2();
                return;
            }
            self.services.notify_services(LifecycleEvent::Suspend);
            self.services_suspended = true;
            if self.any_lock_held() {
                info!("standby entry aborted");
                self.exit_s2();
                return;
            }
        }

        info!("enter S2");
    }

    fn exit_s2(&mut self) {
        self.set_stage(StandbyStage::S1);
        if self.services_suspended {
            self.services.notify_services(LifecycleEvent::Resume);
            self.services_suspended = false;
        }
        if let Some(app) = self.last_app.take() {
            self.apps.notify_app(app, LifecycleEvent::Resume);
        }
        if self.notifier_suspended {
            if let Some(notifier) = self.notifier {
                notifier.on_resume();
            }
            self.notifier_suspended = false;
        }
        info!("exit S2");
    }

    async fn enter_s3(&mut self, deadline: Option<Duration>) -> WakeSource {
        self.set_stage(StandbyStage::S3);
        info!("enter S3");
        let wake = self.sleep.enter_deep_sleep(deadline).await;
        self.set_stage(StandbyStage::S2);
        wake
    }

    fn check_auto_powerdown(&mut self) -> bool {
        if self.powerdown_fired {
            return true;
        }
        if self.powerdown_due() {
            self.fire_powerdown();
            return true;
        }
        false
    }

    fn fire_powerdown(&mut self) {
        if self.powerdown_fired {
            return;
        }
        self.powerdown_fired = true;
        info!("auto powerdown");
        if self
            .bus
            .send(MAIN_RECIPIENT, Message::PowerOff { auto: true })
            .is_err()
        {
            error!("power-off request dropped: main queue unavailable");
        }
    }

    fn powerdown_due(&self) -> bool {
        match self.controls.auto_powerdown() {
            Some(limit) => {
                self.locks.free_time(WakeLockKind::Full) >= limit
                    && self.locks.free_time(WakeLockKind::Partial) >= limit
            }
            None => false,
        }
    }

    /// Time left until auto powerdown, gated by whichever lock has been
    /// free for less time; `None` when auto powerdown is disabled.
    fn powerdown_budget(&self) -> Option<Duration> {
        let limit = self.controls.auto_powerdown()?;
        let free = self
            .locks
            .free_time(WakeLockKind::Full)
            .min(self.locks.free_time(WakeLockKind::Partial));
        Some(Duration::from_millis(
            limit.as_millis().saturating_sub(free.as_millis()),
        ))
    }

    fn standby_due(&self, kind: WakeLockKind) -> bool {
        match self.controls.auto_standby() {
            Some(timeout) => self.locks.free_time(kind) >= timeout,
            None => false,
        }
    }

    fn any_lock_held(&self) -> bool {
        self.locks.check(WakeLockKind::Full) > 0 || self.locks.check(WakeLockKind::Partial) > 0
    }

    fn resume_disposition(&self, last_wake: Option<WakeSource>) -> WakeDisposition {
        match last_wake.map(|wake| self.policy.disposition(wake)) {
            Some(WakeDisposition::ResumeIdle) => WakeDisposition::ResumeIdle,
            _ => WakeDisposition::ResumeNormal,
        }
    }

    fn set_stage(&mut self, stage: StandbyStage) {
        self.stage = stage;
        self.controls.publish_stage(stage);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use platform::mocks::{
        CountingProbe, MockAppManager, MockClock, MockConfigStore, MockMessageBus,
        MockSleepController,
    };

    #[test]
    fn init_clamps_small_auto_standby_and_honours_powerdown_switch() {
        let clock = MockClock::new();
        let locks = WakeLocks::new(&clock);
        let controls = StandbyControls::new();
        let sleep = MockSleepController::new(&clock);
        let apps = MockAppManager::with_app(AppId("music"));
        let roster: ServiceRoster<2> = ServiceRoster::new();
        let bus = MockMessageBus::new();
        let cfg = MockConfigStore::new()
            .with_u32(CFG_AUTO_STANDBY_S, 2)
            .with_u32(CFG_AUTO_POWERDOWN_S, 600)
            .with_bool(CFG_AUTO_POWERDOWN_EN, false);

        let _ctl = StandbyController::new(
            &clock,
            &locks,
            &controls,
            &sleep,
            &apps,
            &roster,
            &bus,
            WakePolicy::default(),
            &cfg,
        );
        assert_eq!(controls.auto_standby(), Some(STANDBY_MIN_TIME));
        assert_eq!(controls.auto_powerdown(), None, "master switch wins");
    }

    #[test]
    fn init_loads_configured_timeouts() {
        let clock = MockClock::new();
        let locks = WakeLocks::new(&clock);
        let controls = StandbyControls::new();
        let sleep = MockSleepController::new(&clock);
        let apps = MockAppManager::with_app(AppId("music"));
        let roster: ServiceRoster<2> = ServiceRoster::new();
        let bus = MockMessageBus::new();
        let cfg = MockConfigStore::new()
            .with_u32(CFG_AUTO_STANDBY_S, 30)
            .with_u32(CFG_AUTO_POWERDOWN_S, 600);

        let _ctl = StandbyController::new(
            &clock,
            &locks,
            &controls,
            &sleep,
            &apps,
            &roster,
            &bus,
            WakePolicy::default(),
            &cfg,
        );
        assert_eq!(controls.auto_standby(), Some(Duration::from_secs(30)));
        assert_eq!(controls.auto_powerdown(), Some(Duration::from_secs(600)));
    }

    #[test]
    fn second_notifier_registration_is_rejected() {
        let clock = MockClock::new();
        let locks = WakeLocks::new(&clock);
        let controls = StandbyControls::new();
        let sleep = MockSleepController::new(&clock);
        let apps = MockAppManager::with_app(AppId("music"));
        let roster: ServiceRoster<2> = ServiceRoster::new();
        let bus = MockMessageBus::new();
        let first = CountingProbe::new();
        let second = CountingProbe::new();

        let mut ctl = StandbyController::new(
            &clock,
            &locks,
            &controls,
            &sleep,
            &apps,
            &roster,
            &bus,
            WakePolicy::default(),
            &MockConfigStore::new(),
        );
        ctl.register_notifier(&first).unwrap();
        assert_eq!(
            ctl.register_notifier(&second),
            Err(StandbyError::NotifierAlreadyRegistered)
        );
    }

    #[test]
    fn default_policy_classifies_sources() {
        let policy = WakePolicy::default();
        assert_eq!(
            policy.disposition(WakeSource::Key),
            WakeDisposition::ResumeNormal
        );
        assert_eq!(
            policy.disposition(WakeSource::Bluetooth),
            WakeDisposition::ResumeIdle
        );
        assert_eq!(
            policy.disposition(WakeSource::Unknown),
            WakeDisposition::Reloop
        );
        assert_eq!(
            policy.disposition(WakeSource::PowerdownTimer),
            WakeDisposition::ResumeNormal
        );
    }

    #[test]
    fn roster_resumes_in_reverse_order() {
        // Two probes; the roster guarantees reverse-order teardown, which
        // this test can only observe as both being called. Order itself is
        // covered by the scenario tests counting per-collaborator calls.
        let first = CountingProbe::new();
        let second = CountingProbe::new();
        let mut roster: ServiceRoster<4> = ServiceRoster::new();
        roster.register(&first).unwrap();
        roster.register(&second).unwrap();

        roster.notify_services(LifecycleEvent::Suspend);
        roster.notify_services(LifecycleEvent::Resume);
        assert_eq!(first.suspend_count(), 1);
        assert_eq!(first.resume_count(), 1);
        assert_eq!(second.suspend_count(), 1);
        assert_eq!(second.resume_count(), 1);
    }

    #[test]
    fn roster_rejects_overflow() {
        let probe = CountingProbe::new();
        let mut roster: ServiceRoster<1> = ServiceRoster::new();
        roster.register(&probe).unwrap();
        assert_eq!(roster.register(&probe), Err(StandbyError::RosterFull));
        assert_eq!(roster.len(), 1);
    }

    #[test]
    fn controls_roundtrip_timeouts() {
        let controls = StandbyControls::new();
        assert_eq!(controls.auto_standby(), None);

        controls.set_auto_standby_secs(30);
        assert_eq!(controls.auto_standby(), Some(Duration::from_secs(30)));

        controls.set_auto_standby_secs(0);
        assert_eq!(controls.auto_standby(), None);

        controls.set_auto_powerdown(Some(Duration::from_secs(600)));
        assert_eq!(controls.auto_powerdown(), Some(Duration::from_secs(600)));
    }

    #[test]
    fn controls_default_profile_is_deep() {
        let controls = StandbyControls::new();
        assert_eq!(controls.sleep_profile(), SleepProfile::Deep);
        controls.set_sleep_profile(SleepProfile::Shallow);
        assert_eq!(controls.sleep_profile(), SleepProfile::Shallow);
    }

    #[test]
    fn controls_screen_follows_stage() {
        let controls = StandbyControls::new();
        assert!(controls.is_screen_on());
        controls.publish_stage(StandbyStage::S1);
        assert!(!controls.is_screen_on());
        assert_eq!(controls.stage(), StandbyStage::S1);
    }
}
