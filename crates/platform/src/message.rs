//! Asynchronous message channel seam
//!
//! The power components never call into application logic directly; their
//! only output is messages posted to a named recipient's queue. The main
//! application thread drains the `"main"` queue.

use thiserror_no_std::Error;

use crate::battery::BatteryTier;

/// The well-known recipient draining system-level messages.
pub const MAIN_RECIPIENT: &str = "main";

/// Classified battery/charger event forwarded to the main thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BatteryEvent {
    /// External DC power appeared.
    DcIn,
    /// External DC power was removed.
    DcOut,
    /// Charging started.
    ChargeStart,
    /// Charging stopped.
    ChargeStop,
    /// Charge terminated at full capacity.
    ChargeFull,
    /// Capacity estimate moved.
    CapacityChanged {
        /// New capacity in percent, 0–100.
        percent: u8,
    },
    /// The battery voltage tier changed (or is being re-reported while
    /// low).
    Tier(BatteryTier),
    /// Battery at or below the forced-shutdown threshold with no DC.
    TooLow,
}

/// A message posted to a named recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Message {
    /// Request a system power-off. `auto` marks the idle-timeout path as
    /// opposed to a user action.
    PowerOff {
        /// True when raised by the auto-powerdown timer.
        auto: bool,
    },
    /// Battery/charger event for UI and host reporting.
    Battery(BatteryEvent),
}

/// Errors from posting a message.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MessageError {
    /// No queue is registered under the recipient name.
    #[error("no such recipient")]
    NoSuchRecipient,
    /// The recipient's queue is full.
    #[error("recipient queue full")]
    QueueFull,
}

/// Posting side of the message channel.
pub trait MessageSender {
    /// Post `message` to `recipient`'s queue without blocking.
    fn send(&self, recipient: &str, message: Message) -> Result<(), MessageError>;
}
