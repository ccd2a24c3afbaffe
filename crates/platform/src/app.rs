//! Application and service suspend/resume seams
//!
//! During deep standby entry the controller notifies the focused
//! application and every running service to suspend, and notifies them to
//! resume — in reverse order — on the way back out. These traits are that
//! notification surface.

/// Handle naming a registered application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AppId(pub &'static str);

/// Suspend/resume notification delivered to applications and services.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LifecycleEvent {
    /// Stop time-critical work and release wakelocks; deep sleep follows.
    Suspend,
    /// Deep sleep has ended; normal operation may restart.
    Resume,
}

/// The application manager: tracks which app has focus and relays
/// lifecycle notifications to it.
///
/// Notification calls are synchronous: when `notify_app` returns, the app
/// has observed the event.
pub trait AppManager {
    /// Currently focused application, if any.
    fn current_app(&self) -> Option<AppId>;

    /// Deliver `event` to `app`.
    fn notify_app(&self, app: AppId, event: LifecycleEvent);
}

/// A capability object that participates in standby entry/exit.
///
/// Implemented by registered services and by the externally registered
/// standby notifier. A delivered `on_suspend` is always paired with an
/// `on_resume` before the standby controller leaves the suspend path, even
/// when entry is aborted partway.
pub trait Suspendable {
    /// The system is about to enter deep sleep.
    fn on_suspend(&self);

    /// The system has left deep sleep.
    fn on_resume(&self);
}

/// Broadcast seam for "notify all running services".
pub trait ServiceNotifier {
    /// Deliver `event` to every registered service.
    fn notify_services(&self, event: LifecycleEvent);
}
