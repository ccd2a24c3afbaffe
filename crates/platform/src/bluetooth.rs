//! TWS role query seam
//!
//! Paired earbuds elect one side primary for reporting duties; the power
//! monitor suppresses some low-battery notifications on the secondary so
//! the pair reports once.

/// Role of this earbud within a true-wireless-stereo pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TwsRole {
    /// Not currently part of a pair.
    #[default]
    Unpaired,
    /// Elected primary: owns host link and pair-level reporting.
    Primary,
    /// Elected secondary: defers pair-level reporting to the primary.
    Secondary,
}

/// Query for the current TWS role.
pub trait RoleProvider {
    /// Current role. May change at any time as the pair re-elects.
    fn tws_role(&self) -> TwsRole;
}
