//! TWS role election tracker.

use core::cell::Cell;

use platform::{RoleProvider, TwsRole};

/// Tracks the outcome of the last TWS role election and, while paired,
/// the peer earbud's address.
///
/// Mutators take `&self` so the Bluetooth manager can update the state
/// while the power monitor holds a read handle to it.
pub struct TwsState {
    role: Cell<TwsRole>,
    peer_address: Cell<Option<[u8; 6]>>,
}

impl TwsState {
    /// Create a new, unpaired state.
    pub fn new() -> Self {
        TwsState {
            role: Cell::new(TwsRole::Unpaired),
            peer_address: Cell::new(None),
        }
    }

    /// Record a completed role election against the peer at `address`.
    pub fn on_role_elected(&self, role: TwsRole, address: [u8; 6]) {
        self.role.set(role);
        self.peer_address.set(Some(address));
    }

    /// Record that the pair link has been lost.
    pub fn on_pair_lost(&self) {
        self.role.set(TwsRole::Unpaired);
        self.peer_address.set(None);
    }

    /// Returns the peer's 6-byte Bluetooth address, or `None` when
    /// unpaired.
    #[must_use]
    pub fn peer_address(&self) -> Option<[u8; 6]> {
        self.peer_address.get()
    }
}

impl RoleProvider for TwsState {
    fn tws_role(&self) -> TwsRole {
        self.role.get()
    }
}

impl Default for TwsState {
    fn default() -> Self {
        Self::new()
    }
}
