//! Integration tests: drives the standby state machine end to end against
//! mock collaborators and a simulated clock.
//!
//! Covers:
//!   1. Idle-timeout entry into S1 at exactly the configured boundary
//!   2. Immediate exit to NORMAL when the FULL lock reappears
//!   3. Aborted deep-sleep entry resumes exactly the collaborators that
//!      were suspended -- no extra resume calls
//!   4. Auto powerdown fires exactly one power-off message, on time
//!   5. Suspend/resume symmetry across a full sleep cycle
//!   6. Disabled timeouts never fire
//!   7. FULL lock held at step time always lands in NORMAL
//!   8. Wake-policy dispositions: resume-to-idle vs full resume
//!
//! Does NOT require physical hardware.
//!
//! Run with: cargo test -p power --test standby_scenarios

// Integration test file -- intentional test patterns permitted.
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]

use embassy_time::Duration;
use platform::mocks::{
    CountingProbe, MockAppManager, MockClock, MockConfigStore, MockMessageBus,
    MockSleepController,
};
use platform::{
    AppId, AppManager, LifecycleEvent, Message, SleepProfile, WakeSource, MAIN_RECIPIENT,
};
use power::{
    ServiceRoster, StandbyController, StandbyControls, StandbyStage, WakeLockKind, WakeLocks,
    WakePolicy,
};

// -- Harness --------------------------------------------------------------

struct Rig {
    clock: MockClock,
    controls: StandbyControls,
    apps: MockAppManager,
    notifier: CountingProbe,
    bus: MockMessageBus,
}

impl Rig {
    fn new() -> Self {
        Self {
            clock: MockClock::new(),
            controls: StandbyControls::new(),
            apps: MockAppManager::with_app(AppId("music")),
            notifier: CountingProbe::new(),
            bus: MockMessageBus::new(),
        }
    }

    fn power_off_count(&self) -> usize {
        self.bus
            .sent_to(MAIN_RECIPIENT)
            .iter()
            .filter(|m| matches!(m, Message::PowerOff { .. }))
            .count()
    }
}

/// Build the machine against the rig. Returns the controller; the sleep
/// controller and roster are constructed by the caller so tests can keep
/// handles to them.
fn controller<'a>(
    rig: &'a Rig,
    locks: &'a WakeLocks<&'a MockClock>,
    sleep: &'a MockSleepController<'a>,
    roster: &'a ServiceRoster<'a, 4>,
) -> StandbyController<
    'a,
    &'a MockClock,
    MockSleepController<'a>,
    MockAppManager,
    ServiceRoster<'a, 4>,
    MockMessageBus,
> {
    let mut ctl = StandbyController::new(
        &rig.clock,
        locks,
        &rig.controls,
        sleep,
        &rig.apps,
        roster,
        &rig.bus,
        WakePolicy::default(),
        &MockConfigStore::new(),
    );
    ctl.register_notifier(&rig.notifier).unwrap();
    ctl
}

/// Step once per simulated second until `deadline_s`, inclusive.
async fn run_ticks(
    ctl: &mut StandbyController<
        '_,
        &MockClock,
        MockSleepController<'_>,
        MockAppManager,
        ServiceRoster<'_, 4>,
        MockMessageBus,
    >,
    clock: &MockClock,
    seconds: u64,
) {
    for _ in 0..seconds {
        ctl.step().await;
        clock.advance(Duration::from_secs(1));
    }
}

// -- Scenario A: idle timeout boundary ------------------------------------

#[tokio::test]
async fn enters_s1_exactly_at_auto_standby_timeout() {
    let rig = Rig::new();
    let locks = WakeLocks::new(&rig.clock);
    let sleep = MockSleepController::new(&rig.clock);
    let roster: ServiceRoster<4> = ServiceRoster::new();
    let mut ctl = controller(&rig, &locks, &sleep, &roster);
    rig.controls.set_auto_standby_secs(5);

    locks.acquire(WakeLockKind::Full);
    locks.release(WakeLockKind::Full).unwrap(); // idle clocks restart at t=0

    // t in [0, 5): stays NORMAL.
    run_ticks(&mut ctl, &rig.clock, 5).await;
    assert_eq!(ctl.stage(), StandbyStage::Normal);

    // t = 5: one more step crosses the boundary.
    ctl.step().await;
    assert_eq!(ctl.stage(), StandbyStage::S1);
    assert!(!rig.controls.is_screen_on());
    assert_eq!(sleep.early_suspend_count(), 1);
}

// -- Scenario B: lock reappears in S1 -------------------------------------

#[tokio::test]
async fn full_lock_in_s1_returns_to_normal_and_stamps_wake() {
    let rig = Rig::new();
    let locks = WakeLocks::new(&rig.clock);
    let sleep = MockSleepController::new(&rig.clock);
    let roster: ServiceRoster<4> = ServiceRoster::new();
    let mut ctl = controller(&rig, &locks, &sleep, &roster);
    rig.controls.set_auto_standby_secs(5);

    rig.clock.advance(Duration::from_secs(5));
    ctl.step().await;
    assert_eq!(ctl.stage(), StandbyStage::S1);

    rig.clock.advance(Duration::from_secs(2));
    locks.acquire(WakeLockKind::Full);
    ctl.step().await;

    assert_eq!(ctl.stage(), StandbyStage::Normal);
    assert!(rig.controls.is_screen_on());
    assert_eq!(rig.controls.last_wake_uptime(), Duration::from_secs(7));
    assert_eq!(sleep.late_resume_count(), 1);
    assert_eq!(ctl.time_since_wake(), Duration::from_secs(0));
}

// -- Scenario C: aborted entry resumes exactly what was suspended ---------

/// App manager that grabs a PARTIAL wakelock while handling its suspend
/// notification -- a collaborator waking up mid-transition.
struct LockGrabbingApps<'a> {
    locks: &'a WakeLocks<&'a MockClock>,
    inner: MockAppManager,
}

impl AppManager for LockGrabbingApps<'_> {
    fn current_app(&self) -> Option<AppId> {
        self.inner.current_app()
    }

    fn notify_app(&self, app: AppId, event: LifecycleEvent) {
        self.inner.notify_app(app, event);
        if event == LifecycleEvent::Suspend {
            self.locks.acquire(WakeLockKind::Partial);
        }
    }
}

#[tokio::test]
async fn aborted_s2_entry_unwinds_symmetrically() {
    let rig = Rig::new();
    let locks = WakeLocks::new(&rig.clock);
    let sleep = MockSleepController::new(&rig.clock);
    let roster_probe = CountingProbe::new();
    let mut roster: ServiceRoster<4> = ServiceRoster::new();
    roster.register(&roster_probe).unwrap();
    let apps = LockGrabbingApps {
        locks: &locks,
        inner: MockAppManager::with_app(AppId("music")),
    };
    let notifier = CountingProbe::new();
    let mut ctl = StandbyController::new(
        &rig.clock,
        &locks,
        &rig.controls,
        &sleep,
        &apps,
        &roster,
        &rig.bus,
        WakePolicy::default(),
        &MockConfigStore::new(),
    );
    ctl.register_notifier(&notifier).unwrap();
    rig.controls.set_auto_standby_secs(5);

    rig.clock.advance(Duration::from_secs(5));
    ctl.step().await; // NORMAL -> S1
    rig.clock.advance(Duration::from_secs(1));
    ctl.step().await; // S1 -> S2 entry, aborted by the injected acquire

    // The app saw suspend + resume; services were never suspended and got
    // no resume; the notifier pair is symmetric. No sleep happened.
    assert_eq!(apps.inner.count(LifecycleEvent::Suspend), 1);
    assert_eq!(apps.inner.count(LifecycleEvent::Resume), 1);
    assert_eq!(roster_probe.suspend_count(), 0);
    assert_eq!(roster_probe.resume_count(), 0);
    assert_eq!(notifier.suspend_count(), 1);
    assert_eq!(notifier.resume_count(), 1);
    assert_eq!(sleep.sleep_count(), 0);
    assert_eq!(ctl.stage(), StandbyStage::S1);
}

// -- Scenario D: auto powerdown -------------------------------------------

#[tokio::test]
async fn auto_powerdown_fires_one_power_off_on_time() {
    let rig = Rig::new();
    let locks = WakeLocks::new(&rig.clock);
    let sleep = MockSleepController::new(&rig.clock);
    let roster: ServiceRoster<4> = ServiceRoster::new();
    let mut ctl = controller(&rig, &locks, &sleep, &roster);
    rig.controls.set_auto_standby_secs(2);
    rig.controls.set_auto_powerdown_secs(10);

    // Ticks: S1 at t=2, S2 entry at t=3, sleep at t=4 with the remaining
    // budget armed as the deadline.
    run_ticks(&mut ctl, &rig.clock, 4).await;
    assert_eq!(rig.power_off_count(), 0);

    ctl.step().await; // blocks in S3, wakes on the powerdown deadline
    assert_eq!(rig.clock.uptime_ms(), 10_000);
    assert_eq!(rig.power_off_count(), 1);
    assert_eq!(
        sleep.armed_deadline(0),
        Some(Duration::from_secs(6)),
        "deadline = configured 10s minus 4s already free"
    );

    // The machine is parked: further ticks neither sleep again nor send
    // another power-off.
    for _ in 0..5 {
        rig.clock.advance(Duration::from_secs(1));
        ctl.step().await;
    }
    assert_eq!(rig.power_off_count(), 1);
    assert_eq!(sleep.sleep_count(), 1);
    assert_eq!(ctl.stage(), StandbyStage::S1);

    // Suspend/resume stayed symmetric through the powerdown path.
    assert_eq!(rig.apps.count(LifecycleEvent::Suspend), 1);
    assert_eq!(rig.apps.count(LifecycleEvent::Resume), 1);
    assert_eq!(rig.notifier.suspend_count(), 1);
    assert_eq!(rig.notifier.resume_count(), 1);
}

// -- P5: symmetry across a completed cycle --------------------------------

#[tokio::test]
async fn full_cycle_delivers_symmetric_notifications() {
    let rig = Rig::new();
    let locks = WakeLocks::new(&rig.clock);
    let sleep = MockSleepController::new(&rig.clock);
    let roster_probe = CountingProbe::new();
    let mut roster: ServiceRoster<4> = ServiceRoster::new();
    roster.register(&roster_probe).unwrap();
    let mut ctl = controller(&rig, &locks, &sleep, &roster);
    rig.controls.set_auto_standby_secs(5);

    rig.clock.advance(Duration::from_secs(5));
    ctl.step().await; // -> S1
    rig.clock.advance(Duration::from_secs(1));
    ctl.step().await; // -> S2, collaborators suspended
    sleep.push_outcome(WakeSource::Key, Duration::from_secs(30));
    ctl.step().await; // S3 cycle, key wake, full resume

    assert_eq!(rig.apps.count(LifecycleEvent::Suspend), 1);
    assert_eq!(rig.apps.count(LifecycleEvent::Resume), 1);
    assert_eq!(roster_probe.suspend_count(), 1);
    assert_eq!(roster_probe.resume_count(), 1);
    assert_eq!(rig.notifier.suspend_count(), 1);
    assert_eq!(rig.notifier.resume_count(), 1);
    assert_eq!(ctl.stage(), StandbyStage::Normal);
    assert_eq!(sleep.late_resume_count(), 1);
}

// -- P6: disabled timeout never fires -------------------------------------

#[tokio::test]
async fn disabled_auto_standby_never_leaves_normal() {
    let rig = Rig::new();
    let locks = WakeLocks::new(&rig.clock);
    let sleep = MockSleepController::new(&rig.clock);
    let roster: ServiceRoster<4> = ServiceRoster::new();
    let mut ctl = controller(&rig, &locks, &sleep, &roster);
    // Timeouts left at the disabled default.

    for _ in 0..500 {
        ctl.step().await;
        rig.clock.advance(Duration::from_secs(3600));
    }
    assert_eq!(ctl.stage(), StandbyStage::Normal);
    assert_eq!(sleep.sleep_count(), 0);
    assert_eq!(rig.power_off_count(), 0);
}

// -- P4: FULL lock held always lands in NORMAL ----------------------------

#[tokio::test]
async fn full_lock_held_steps_to_normal_from_any_stage() {
    // From NORMAL.
    {
        let rig = Rig::new();
        let locks = WakeLocks::new(&rig.clock);
        let sleep = MockSleepController::new(&rig.clock);
        let roster: ServiceRoster<4> = ServiceRoster::new();
        let mut ctl = controller(&rig, &locks, &sleep, &roster);
        rig.controls.set_auto_standby_secs(5);

        locks.acquire(WakeLockKind::Full);
        rig.clock.advance(Duration::from_secs(100));
        ctl.step().await;
        assert_eq!(ctl.stage(), StandbyStage::Normal);
    }

    // From S1.
    {
        let rig = Rig::new();
        let locks = WakeLocks::new(&rig.clock);
        let sleep = MockSleepController::new(&rig.clock);
        let roster: ServiceRoster<4> = ServiceRoster::new();
        let mut ctl = controller(&rig, &locks, &sleep, &roster);
        rig.controls.set_auto_standby_secs(5);

        rig.clock.advance(Duration::from_secs(5));
        ctl.step().await;
        assert_eq!(ctl.stage(), StandbyStage::S1);
        locks.acquire(WakeLockKind::Full);
        ctl.step().await;
        assert_eq!(ctl.stage(), StandbyStage::Normal);
    }

    // From S2: the lock appears between S2 entry and the next tick.
    {
        let rig = Rig::new();
        let locks = WakeLocks::new(&rig.clock);
        let sleep = MockSleepController::new(&rig.clock);
        let roster: ServiceRoster<4> = ServiceRoster::new();
        let mut ctl = controller(&rig, &locks, &sleep, &roster);
        rig.controls.set_sleep_profile(SleepProfile::Shallow);
        rig.controls.set_auto_standby_secs(5);

        rig.clock.advance(Duration::from_secs(5));
        ctl.step().await; // -> S1
        rig.clock.advance(Duration::from_secs(1));
        ctl.step().await; // -> S2
        assert_eq!(ctl.stage(), StandbyStage::S2);

        locks.acquire(WakeLockKind::Full);
        ctl.step().await;
        assert_eq!(ctl.stage(), StandbyStage::Normal);
        assert_eq!(sleep.sleep_count(), 0, "no sleep entry while FULL held");
    }
}

// -- P7: powerdown bound --------------------------------------------------

#[tokio::test]
async fn powerdown_fires_at_configured_bound_not_before() {
    let rig = Rig::new();
    let locks = WakeLocks::new(&rig.clock);
    let sleep = MockSleepController::new(&rig.clock);
    let roster: ServiceRoster<4> = ServiceRoster::new();
    let mut ctl = controller(&rig, &locks, &sleep, &roster);
    rig.controls.set_auto_standby_secs(5);
    rig.controls.set_auto_powerdown_secs(30);

    // One tick per second; the machine reaches the S2 loop at t=7 and
    // sleeps against the remaining 23 s budget.
    run_ticks(&mut ctl, &rig.clock, 7).await;
    assert_eq!(rig.power_off_count(), 0);
    ctl.step().await;

    assert_eq!(rig.clock.uptime_ms(), 30_000);
    assert_eq!(rig.power_off_count(), 1);
}

// -- Wake policy: resume-to-idle vs full resume ---------------------------

#[tokio::test]
async fn bluetooth_wake_resumes_collaborators_but_keeps_screen_off() {
    let rig = Rig::new();
    let locks = WakeLocks::new(&rig.clock);
    let sleep = MockSleepController::new(&rig.clock);
    let roster_probe = CountingProbe::new();
    let mut roster: ServiceRoster<4> = ServiceRoster::new();
    roster.register(&roster_probe).unwrap();
    let mut ctl = controller(&rig, &locks, &sleep, &roster);
    rig.controls.set_auto_standby_secs(5);

    rig.clock.advance(Duration::from_secs(5));
    ctl.step().await; // -> S1
    rig.clock.advance(Duration::from_secs(1));
    ctl.step().await; // -> S2
    sleep.push_outcome(WakeSource::Bluetooth, Duration::from_secs(3));
    ctl.step().await;

    // Collaborators resumed, but the stage stays S1: the screen does not
    // light up for link maintenance.
    assert_eq!(ctl.stage(), StandbyStage::S1);
    assert_eq!(sleep.late_resume_count(), 0);
    assert_eq!(roster_probe.resume_count(), 1);
    assert_eq!(rig.apps.count(LifecycleEvent::Resume), 1);
    // The partial idle clock was poked, restarting the countdown to the
    // next deep-sleep attempt.
    assert_eq!(
        locks.free_time(WakeLockKind::Partial),
        Duration::from_secs(0)
    );
}

#[tokio::test]
async fn spurious_wake_reloops_into_sleep() {
    let rig = Rig::new();
    let locks = WakeLocks::new(&rig.clock);
    let sleep = MockSleepController::new(&rig.clock);
    let roster: ServiceRoster<4> = ServiceRoster::new();
    let mut ctl = controller(&rig, &locks, &sleep, &roster);
    rig.controls.set_auto_standby_secs(5);

    rig.clock.advance(Duration::from_secs(5));
    ctl.step().await; // -> S1
    rig.clock.advance(Duration::from_secs(1));
    ctl.step().await; // -> S2
    sleep.push_outcome(WakeSource::Unknown, Duration::from_secs(1));
    sleep.push_outcome(WakeSource::Unknown, Duration::from_secs(1));
    sleep.push_outcome(WakeSource::Key, Duration::from_secs(1));
    ctl.step().await;

    // Two spurious edges re-entered sleep without unwinding; the key wake
    // finally resumed fully.
    assert_eq!(sleep.sleep_count(), 3);
    assert_eq!(rig.apps.count(LifecycleEvent::Resume), 1);
    assert_eq!(ctl.stage(), StandbyStage::Normal);
}

// -- Fast standby ----------------------------------------------------------

#[tokio::test]
async fn fast_standby_skips_idle_wait() {
    let rig = Rig::new();
    let locks = WakeLocks::new(&rig.clock);
    let sleep = MockSleepController::new(&rig.clock);
    let roster: ServiceRoster<4> = ServiceRoster::new();
    let mut ctl = controller(&rig, &locks, &sleep, &roster);
    rig.controls.set_auto_standby_secs(3600);

    locks.request_fast_standby();
    ctl.step().await;
    assert_eq!(ctl.stage(), StandbyStage::S1);

    ctl.step().await;
    assert_eq!(ctl.stage(), StandbyStage::S2);
}

#[tokio::test]
async fn acquire_cancels_pending_fast_standby() {
    let rig = Rig::new();
    let locks = WakeLocks::new(&rig.clock);
    let sleep = MockSleepController::new(&rig.clock);
    let roster: ServiceRoster<4> = ServiceRoster::new();
    let mut ctl = controller(&rig, &locks, &sleep, &roster);
    rig.controls.set_auto_standby_secs(3600);

    locks.request_fast_standby();
    locks.acquire(WakeLockKind::Full);
    locks.release(WakeLockKind::Full).unwrap();
    ctl.step().await;
    assert_eq!(ctl.stage(), StandbyStage::Normal, "request was cancelled");
}

// -- Shallow profile skips the suspend choreography -----------------------

#[tokio::test]
async fn shallow_profile_sleeps_without_notifications() {
    let rig = Rig::new();
    let locks = WakeLocks::new(&rig.clock);
    let sleep = MockSleepController::new(&rig.clock);
    let roster_probe = CountingProbe::new();
    let mut roster: ServiceRoster<4> = ServiceRoster::new();
    roster.register(&roster_probe).unwrap();
    let mut ctl = controller(&rig, &locks, &sleep, &roster);
    rig.controls.set_sleep_profile(SleepProfile::Shallow);
    rig.controls.set_auto_standby_secs(5);

    rig.clock.advance(Duration::from_secs(5));
    ctl.step().await; // -> S1
    rig.clock.advance(Duration::from_secs(1));
    ctl.step().await; // -> S2, no notifications in shallow mode
    sleep.push_outcome(WakeSource::Key, Duration::from_secs(1));
    ctl.step().await;

    assert_eq!(sleep.sleep_count(), 1);
    assert_eq!(rig.apps.count(LifecycleEvent::Suspend), 0);
    assert_eq!(roster_probe.suspend_count(), 0);
    assert_eq!(ctl.stage(), StandbyStage::Normal);
}
