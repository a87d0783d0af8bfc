//! Device identity
//!
//! The broker client id is `<prefix>_<mac>`, derived once the link reports
//! its hardware address.

use core::cell::RefCell;
use core::fmt::Write;

use critical_section::Mutex;
use hal_abstractions::MacAddress;

use crate::error::Error;

/// Maximum client id length: a short prefix, `_`, and 17 MAC characters
pub const CLIENT_ID_MAX_LEN: usize = 32;

pub type ClientId = heapless::String<CLIENT_ID_MAX_LEN>;

/// Format a client id, e.g. `lihini_02:00:00:12:34:56`
pub fn client_id(prefix: &str, mac: &MacAddress) -> Option<ClientId> {
    let mut id = ClientId::new();
    write!(
        id,
        "{}_{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
        prefix, mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
    )
    .ok()?;
    Some(id)
}

/// Client id shared between the network duty (writer) and the messaging
/// duty (reader)
pub struct IdentityCell {
    id: Mutex<RefCell<Option<ClientId>>>,
}

impl IdentityCell {
    pub const fn new() -> Self {
        Self {
            id: Mutex::new(RefCell::new(None)),
        }
    }

    /// Record the identity for `mac`; later calls with a resolved id are ignored
    pub fn resolve(&self, prefix: &str, mac: &MacAddress) -> Result<(), Error> {
        let id = client_id(prefix, mac).ok_or(Error::IdentityUnresolved)?;
        critical_section::with(|cs| {
            let mut slot = self.id.borrow_ref_mut(cs);
            if slot.is_none() {
                info!("Device identity: {}", id.as_str());
                *slot = Some(id);
            }
        });
        Ok(())
    }

    pub fn get(&self) -> Result<ClientId, Error> {
        critical_section::with(|cs| self.id.borrow_ref(cs).clone()).ok_or(Error::IdentityUnresolved)
    }

    pub fn is_resolved(&self) -> bool {
        critical_section::with(|cs| self.id.borrow_ref(cs).is_some())
    }
}

impl Default for IdentityCell {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAC: MacAddress = [0x02, 0x00, 0x00, 0x12, 0x34, 0xab];

    #[test]
    fn test_client_id_format() {
        let id = client_id("lihini", &MAC).unwrap();
        assert_eq!(id.as_str(), "lihini_02:00:00:12:34:ab");
    }

    #[test]
    fn test_prefix_too_long() {
        assert!(client_id("a-prefix-far-too-long-for-ids", &MAC).is_none());
    }

    #[test]
    fn test_unresolved_until_address_known() {
        let cell = IdentityCell::new();
        assert_eq!(cell.get(), Err(Error::IdentityUnresolved));
        cell.resolve("lihini", &MAC).unwrap();
        assert!(cell.is_resolved());
        assert_eq!(cell.get().map(|id| id.len()), Ok(24));
    }

    #[test]
    fn test_first_identity_sticks() {
        let cell = IdentityCell::new();
        cell.resolve("lihini", &MAC).unwrap();
        cell.resolve("lihini", &[0xff; 6]).unwrap();
        assert_eq!(cell.get().unwrap().as_str(), "lihini_02:00:00:12:34:ab");
    }
}
