//! Collaborator seams for the earbud standby / power-state stack
//!
//! This crate defines trait-based abstractions for every external
//! collaborator the power subsystem talks to, enabling development and
//! testing without physical hardware.
//!
//! # Architecture Layers
//!
//! ```text
//! Application Layer (board/firmware crate)
//!         ↓
//! Feature Layers (power, bluetooth)
//!         ↓
//! Platform seams (this crate - trait abstractions)
//!         ↓
//! Hardware Layer (Embassy HAL + PAC)
//! ```
//!
//! # Abstraction Levels
//!
//! - [`Clock`] - monotonic uptime source
//! - [`SleepController`] - SoC sleep/wake primitives
//! - [`AppManager`] / [`Suspendable`] / [`ServiceNotifier`] - suspend/resume
//!   notification targets
//! - [`PowerSupply`] - battery/charger telemetry
//! - [`RoleProvider`] - TWS primary/secondary role query
//! - [`ConfigStore`] - persisted integer configuration
//! - [`MessageSender`] - async message channel to named recipients
//!
//! # Features
//!
//! - `std`: expose the mock implementations outside of `cfg(test)`
//! - `defmt`: enable defmt logging derives on all value types

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // no panic!() in production code
#![deny(unused_must_use)]
// all Results must be handled
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(async_fn_in_trait)] // Embassy no_std: single-threaded, Send bounds not needed

pub mod app;
pub mod battery;
pub mod bluetooth;
pub mod clock;
pub mod config;
pub mod message;
pub mod mocks;
pub mod sleep;

// Re-export main seam traits
pub use app::{AppId, AppManager, LifecycleEvent, ServiceNotifier, Suspendable};
pub use battery::{ChargeEvent, ChargeStatus, PowerSupply, PowerSupplyError};
pub use bluetooth::{RoleProvider, TwsRole};
pub use clock::{Clock, SystemClock};
pub use config::ConfigStore;
pub use message::{BatteryEvent, Message, MessageError, MessageSender, MAIN_RECIPIENT};
pub use sleep::{SignalSleepController, SleepController, SleepProfile, WakeSource};

// Re-export battery classification used in message payloads
pub use battery::BatteryTier;
