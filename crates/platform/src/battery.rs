//! Battery/charger telemetry seam
//!
//! The power-supply driver owns the ADC and charger IC; this crate only
//! sees polled property reads plus an asynchronous event stream the driver
//! delivers from interrupt or driver-thread context.

use thiserror_no_std::Error;

/// Charger state as reported by the supply driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChargeStatus {
    /// Running from the battery.
    Discharging,
    /// DC present and the charger is pushing current.
    Charging,
    /// Charge terminated at full capacity.
    Full,
    /// No battery detected.
    NoBattery,
}

/// Asynchronous telemetry event from the supply driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChargeEvent {
    /// External DC power appeared.
    DcIn,
    /// External DC power was removed.
    DcOut,
    /// The charger started pushing current.
    ChargeStart,
    /// The charger stopped.
    ChargeStop,
    /// Charge terminated at full capacity.
    ChargeFull,
    /// Battery voltage moved.
    VoltageChanged {
        /// New battery voltage in millivolts.
        millivolts: u32,
    },
    /// Battery capacity estimate moved.
    CapacityChanged {
        /// New capacity in percent, 0–100.
        percent: u8,
    },
}

/// Battery voltage tier, ordered from most to least depleted.
///
/// Computed by the power monitor from an ascending threshold table; tier
/// changes are reported as one-shot events with hysteresis against ADC
/// noise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BatteryTier {
    /// At or below the low-power warning threshold.
    Low,
    /// Between the low and medium thresholds.
    Medium,
    /// Above the medium threshold.
    Normal,
}

/// Errors from the power-supply driver.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerSupplyError {
    /// The supply device did not answer.
    #[error("power supply device not responding")]
    NotResponding,
    /// The device answered with an out-of-range value.
    #[error("power supply returned an invalid reading")]
    InvalidReading,
}

/// Polled battery/charger property reads.
///
/// A failed read at monitor init is fatal; a failed read mid-operation is
/// tolerated (the sample is skipped).
pub trait PowerSupply {
    /// Battery voltage in millivolts.
    fn voltage_mv(&self) -> Result<u32, PowerSupplyError>;

    /// Battery capacity in percent, 0–100.
    fn capacity_percent(&self) -> Result<u8, PowerSupplyError>;

    /// Charger state.
    fn charge_status(&self) -> Result<ChargeStatus, PowerSupplyError>;

    /// Whether external DC power is present.
    fn dc_present(&self) -> Result<bool, PowerSupplyError>;
}
