//! Battery/charger telemetry classification and publication.
//!
//! The supply driver delivers raw events from interrupt or driver-thread
//! context; the monitor classifies them (voltage tier with hysteresis,
//! one-shot charge transitions) and forwards each classified event to the
//! `"main"` recipient over the message channel — its only output path.
//! While external DC power is present the monitor holds a PARTIAL wakelock
//! so standby logic can tell "idle but powered" from "idle and unpowered".

use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicU8, Ordering};

use embassy_time::Duration;
use platform::{
    BatteryEvent, BatteryTier, ChargeEvent, ChargeStatus, Clock, ConfigStore, Message,
    MessageSender, PowerSupply, PowerSupplyError, RoleProvider, TwsRole, MAIN_RECIPIENT,
};

use crate::wakelock::{WakeLockKind, WakeLocks};

use platform::config::{CFG_LOW_POWER_MV, CFG_SHUTDOWN_POWER_MV};

/// Default low-battery warning threshold.
pub const DEFAULT_LOW_POWER_MV: u32 = 3600;
/// Default medium-battery threshold.
pub const DEFAULT_MEDIUM_POWER_MV: u32 = 4000;
/// Default forced-shutdown threshold.
pub const DEFAULT_SHUTDOWN_MV: u32 = 3400;

/// Minimum spacing between low-battery re-reports.
const REPORT_PERIOD: Duration = Duration::from_secs(60);

/// Ascending voltage→tier thresholds. Anything above `medium_mv` is
/// [`BatteryTier::Normal`].
#[derive(Debug, Clone, Copy)]
pub struct VoltageTiers {
    /// At or below this: [`BatteryTier::Low`].
    pub low_mv: u32,
    /// At or below this (and above `low_mv`): [`BatteryTier::Medium`].
    pub medium_mv: u32,
}

impl VoltageTiers {
    /// Classify a voltage against the table.
    #[must_use]
    pub fn classify(&self, millivolts: u32) -> BatteryTier {
        if millivolts <= self.low_mv {
            BatteryTier::Low
        } else if millivolts <= self.medium_mv {
            BatteryTier::Medium
        } else {
            BatteryTier::Normal
        }
    }
}

/// Read-only snapshot of the published telemetry.
#[derive(Debug, Clone, Copy)]
pub struct PowerSample {
    /// Local battery voltage, millivolts.
    pub voltage_mv: u32,
    /// Pair-level capacity (merged with the peer when Primary), percent.
    pub capacity_percent: u8,
    /// Charger state.
    pub charge_status: ChargeStatus,
    /// External DC power presence.
    pub dc_present: bool,
    /// Peer earbud voltage, millivolts.
    pub peer_voltage_mv: u32,
    /// Peer earbud capacity, percent.
    pub peer_capacity_percent: u8,
    /// Current voltage tier.
    pub tier: BatteryTier,
}

/// Battery/charger monitor.
///
/// All published fields are plain atomics: the event callback may run in
/// interrupt context while the main thread reads accessors, and no field
/// pair carries a cross-field invariant.
pub struct PowerMonitor<'a, C, P, R, M>
where
    C: Clock,
    P: PowerSupply,
    R: RoleProvider,
    M: MessageSender,
{
    clock: C,
    supply: &'a P,
    role: &'a R,
    bus: &'a M,
    locks: &'a WakeLocks<C>,
    tiers: VoltageTiers,
    shutdown_mv: u32,
    voltage_mv: AtomicU32,
    capacity: AtomicU8,
    status: AtomicU8,
    dc_present: AtomicBool,
    peer_voltage_mv: AtomicU32,
    peer_capacity: AtomicU8,
    tier: AtomicU8,
    dc_lock_held: AtomicBool,
    /// Uptime of the last low-battery report, ms; `u64::MAX` = never.
    last_low_report_ms: AtomicU64,
}

impl<'a, C, P, R, M> PowerMonitor<'a, C, P, R, M>
where
    C: Clock,
    P: PowerSupply,
    R: RoleProvider,
    M: MessageSender,
{
    /// Initialize the monitor: load thresholds from `cfg`, take the first
    /// sample from the supply, and (when unpowered) report the initial
    /// voltage tier to `"main"`.
    ///
    /// # Errors
    ///
    /// A supply read failure here is fatal to monitor init and is
    /// propagated; mid-operation read failures are tolerated later.
    pub fn new(
        clock: C,
        supply: &'a P,
        role: &'a R,
        bus: &'a M,
        locks: &'a WakeLocks<C>,
        cfg: &dyn ConfigStore,
    ) -> Result<Self, PowerSupplyError> {
        let tiers = VoltageTiers {
            low_mv: cfg.get_u32(CFG_LOW_POWER_MV, DEFAULT_LOW_POWER_MV),
            medium_mv: DEFAULT_MEDIUM_POWER_MV,
        };
        let shutdown_mv = cfg.get_u32(CFG_SHUTDOWN_POWER_MV, DEFAULT_SHUTDOWN_MV);

        let voltage = supply.voltage_mv()?;
        let capacity = supply.capacity_percent()?;
        let status = supply.charge_status()?;
        let dc = supply.dc_present()?;
        let tier = tiers.classify(voltage);

        let monitor = Self {
            clock,
            supply,
            role,
            bus,
            locks,
            tiers,
            shutdown_mv,
            voltage_mv: AtomicU32::new(voltage),
            capacity: AtomicU8::new(capacity),
            status: AtomicU8::new(status_to_u8(status)),
            dc_present: AtomicBool::new(dc),
            peer_voltage_mv: AtomicU32::new(4200),
            peer_capacity: AtomicU8::new(100),
            tier: AtomicU8::new(tier_to_u8(tier)),
            dc_lock_held: AtomicBool::new(false),
            last_low_report_ms: AtomicU64::new(u64::MAX),
        };

        if !dc {
            // Report the boot-time tier so the UI can show it right away.
            monitor.forward(BatteryEvent::Tier(tier));
        }

        info!("battery monitor up: {} mV, {}%", voltage, capacity);
        Ok(monitor)
    }

    /// Telemetry event callback. Safe from interrupt or driver-thread
    /// context.
    pub fn on_supply_event(&self, event: ChargeEvent) {
        match event {
            ChargeEvent::DcIn => {
                self.dc_present.store(true, Ordering::Relaxed);
                self.forward(BatteryEvent::DcIn);
            }
            ChargeEvent::DcOut => {
                self.dc_present.store(false, Ordering::Relaxed);
                self.forward(BatteryEvent::DcOut);
            }
            ChargeEvent::ChargeStart => self.forward(BatteryEvent::ChargeStart),
            ChargeEvent::ChargeFull => {
                self.status.store(status_to_u8(ChargeStatus::Full), Ordering::Relaxed);
                self.forward(BatteryEvent::ChargeFull);
            }
            ChargeEvent::ChargeStop => {
                self.status
                    .store(status_to_u8(ChargeStatus::Discharging), Ordering::Relaxed);
                // Re-report the stored tier so the display falls back from
                // the charging animation to the battery level.
                self.forward(BatteryEvent::Tier(self.tier()));
            }
            ChargeEvent::VoltageChanged { millivolts } => {
                self.voltage_mv.store(millivolts, Ordering::Relaxed);
                let tier = self.tiers.classify(millivolts);
                if tier != self.tier() {
                    info!("voltage tier change at {} mV", millivolts);
                    self.tier.store(tier_to_u8(tier), Ordering::Relaxed);
                    self.forward(BatteryEvent::Tier(tier));
                }
            }
            ChargeEvent::CapacityChanged { percent } => {
                self.capacity.store(percent, Ordering::Relaxed);
                self.forward(BatteryEvent::CapacityChanged { percent });
            }
        }
    }

    /// Periodic poll: manage the DC wakelock and raise the time-paced
    /// low/critical battery escalations. A supply read failure skips the
    /// cycle.
    pub fn poll(&self) {
        let dc = match self.supply.dc_present() {
            Ok(dc) => dc,
            Err(_) => {
                warn!("supply read failed, skipping poll");
                return;
            }
        };
        self.dc_present.store(dc, Ordering::Relaxed);

        if dc {
            if !self.dc_lock_held.swap(true, Ordering::Relaxed) {
                self.locks.acquire(WakeLockKind::Partial);
                info!("dc in, wake lock");
            }
            return;
        }
        if self.dc_lock_held.swap(false, Ordering::Relaxed) {
            let _ = self.locks.release(WakeLockKind::Partial);
            info!("dc out, wake unlock");
        }

        let voltage = self.voltage_mv.load(Ordering::Relaxed);
        if voltage <= self.shutdown_mv {
            warn!("battery critical at {} mV", voltage);
            self.forward(BatteryEvent::TooLow);
            return;
        }

        if voltage <= self.tiers.low_mv {
            let now_ms = self.clock.now().as_millis();
            let last = self.last_low_report_ms.load(Ordering::Relaxed);
            if last == u64::MAX || now_ms.saturating_sub(last) >= REPORT_PERIOD.as_millis() {
                // The secondary earbud stays quiet: the primary reports
                // low battery for the pair.
                if self.role.tws_role() != TwsRole::Secondary {
                    self.forward(BatteryEvent::Tier(BatteryTier::Low));
                }
                self.last_low_report_ms.store(now_ms, Ordering::Relaxed);
            }
        }
    }

    /// Record the peer earbud's battery state, as relayed over the TWS
    /// link.
    pub fn set_peer_battery(&self, capacity_percent: u8, voltage_mv: u32) {
        self.peer_capacity.store(capacity_percent, Ordering::Relaxed);
        self.peer_voltage_mv.store(voltage_mv, Ordering::Relaxed);
        info!("peer battery {} mV {}%", voltage_mv, capacity_percent);
    }

    /// Local battery voltage in millivolts.
    pub fn voltage_mv(&self) -> u32 {
        self.voltage_mv.load(Ordering::Relaxed)
    }

    /// Pair-level capacity: when this side is Primary, the larger of the
    /// local and peer estimates; otherwise the local one.
    pub fn capacity_percent(&self) -> u8 {
        let local = self.capacity.load(Ordering::Relaxed);
        if self.role.tws_role() == TwsRole::Primary {
            local.max(self.peer_capacity.load(Ordering::Relaxed))
        } else {
            local
        }
    }

    /// Local capacity, ignoring the peer.
    pub fn local_capacity_percent(&self) -> u8 {
        self.capacity.load(Ordering::Relaxed)
    }

    /// Charger state.
    pub fn charge_status(&self) -> ChargeStatus {
        status_from_u8(self.status.load(Ordering::Relaxed))
    }

    /// External DC power presence.
    pub fn dc_present(&self) -> bool {
        self.dc_present.load(Ordering::Relaxed)
    }

    /// Current voltage tier.
    pub fn tier(&self) -> BatteryTier {
        tier_from_u8(self.tier.load(Ordering::Relaxed))
    }

    /// Unpowered with the battery at or below the shutdown threshold.
    pub fn is_battery_critical(&self) -> bool {
        !self.dc_present() && self.voltage_mv() <= self.shutdown_mv
    }

    /// Snapshot of all published fields.
    pub fn sample(&self) -> PowerSample {
        PowerSample {
            voltage_mv: self.voltage_mv(),
            capacity_percent: self.capacity_percent(),
            charge_status: self.charge_status(),
            dc_present: self.dc_present(),
            peer_voltage_mv: self.peer_voltage_mv.load(Ordering::Relaxed),
            peer_capacity_percent: self.peer_capacity.load(Ordering::Relaxed),
            tier: self.tier(),
        }
    }

    fn forward(&self, event: BatteryEvent) {
        if self.bus.send(MAIN_RECIPIENT, Message::Battery(event)).is_err() {
            warn!("battery event dropped: main queue unavailable");
        }
    }
}

fn status_to_u8(status: ChargeStatus) -> u8 {
    match status {
        ChargeStatus::Discharging => 0,
        ChargeStatus::Charging => 1,
        ChargeStatus::Full => 2,
        ChargeStatus::NoBattery => 3,
    }
}

fn status_from_u8(raw: u8) -> ChargeStatus {
    match raw {
        1 => ChargeStatus::Charging,
        2 => ChargeStatus::Full,
        3 => ChargeStatus::NoBattery,
        _ => ChargeStatus::Discharging,
    }
}

fn tier_to_u8(tier: BatteryTier) -> u8 {
    match tier {
        BatteryTier::Low => 0,
        BatteryTier::Medium => 1,
        BatteryTier::Normal => 2,
    }
}

fn tier_from_u8(raw: u8) -> BatteryTier {
    match raw {
        0 => BatteryTier::Low,
        1 => BatteryTier::Medium,
        _ => BatteryTier::Normal,
    }
}
