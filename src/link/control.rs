//! Link credentials and the connectivity control port.
//!
//! The radio itself (PHY/MAC, supplicant) is outside this crate; the
//! protocol engine drives it through [`LinkControl`]. Credentials cross the
//! link and the flash store as one packed 96-byte blob.

use heapless::String;
use log::info;

use crate::error::{Error, Result};

/// Packed wire/persist size: `ssid[32]` + `password[64]`.
pub const CREDENTIALS_WIRE_LEN: usize = 96;

const SSID_LEN: usize = 32;
const PASSWORD_LEN: usize = 64;

/// Number of secret characters exposed before the mask.
const MASK_VISIBLE_CHARS: usize = 3;

/// SSID + secret for the wireless uplink.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LinkCredentials {
    pub ssid: String<SSID_LEN>,
    pub password: String<PASSWORD_LEN>,
}

impl LinkCredentials {
    pub fn new(ssid: &str, password: &str) -> Self {
        let mut c = Self::default();
        let _ = c.ssid.push_str(ssid);
        let _ = c.password.push_str(password);
        c
    }

    pub fn to_wire(&self) -> [u8; CREDENTIALS_WIRE_LEN] {
        let mut buf = [0u8; CREDENTIALS_WIRE_LEN];
        crate::protocol::wire::put_fixed_str(&mut buf[..SSID_LEN], &self.ssid);
        crate::protocol::wire::put_fixed_str(&mut buf[SSID_LEN..], &self.password);
        buf
    }

    pub fn from_wire(data: &[u8]) -> Result<Self> {
        if data.len() != CREDENTIALS_WIRE_LEN {
            return Err(Error::SizeMismatch {
                expected: CREDENTIALS_WIRE_LEN,
                got: data.len(),
            });
        }
        let ssid = crate::protocol::wire::get_fixed_str(&data[..SSID_LEN]);
        if ssid.is_empty() {
            return Err(Error::InvalidArgument("empty SSID"));
        }
        let password = crate::protocol::wire::get_fixed_str(&data[SSID_LEN..]);
        Ok(Self::new(ssid, password))
    }

    /// A copy safe to send to clients: the secret keeps its first three
    /// characters followed by `***`. An empty secret stays empty.
    pub fn masked(&self) -> Self {
        let mut masked = Self::default();
        let _ = masked.ssid.push_str(&self.ssid);
        if !self.password.is_empty() {
            let visible_end = self
                .password
                .char_indices()
                .nth(MASK_VISIBLE_CHARS)
                .map(|(i, _)| i)
                .unwrap_or(self.password.len());
            let _ = masked.password.push_str(&self.password[..visible_end]);
            let _ = masked.password.push_str("***");
        }
        masked
    }
}

// ---------------------------------------------------------------------------
// Connectivity port
// ---------------------------------------------------------------------------

/// Driven port for the wireless uplink.
pub trait LinkControl {
    fn is_connected(&self) -> bool;

    /// SSID of the network currently associated, if any.
    fn current_ssid(&self) -> Option<&str>;

    /// Apply credentials for the next connection attempt (live, no persist).
    fn configure(&mut self, creds: &LinkCredentials);

    /// Start connecting with the configured credentials. Asynchronous: the
    /// call triggers the attempt and returns.
    fn connect(&mut self) -> Result<()>;

    fn disconnect(&mut self) -> Result<()>;
}

/// Host-side link backend: connects instantly to whatever was configured.
#[derive(Default)]
pub struct SimLinkControl {
    configured: Option<LinkCredentials>,
    connected_ssid: Option<String<SSID_LEN>>,
}

impl SimLinkControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn configured(&self) -> Option<&LinkCredentials> {
        self.configured.as_ref()
    }
}

impl LinkControl for SimLinkControl {
    fn is_connected(&self) -> bool {
        self.connected_ssid.is_some()
    }

    fn current_ssid(&self) -> Option<&str> {
        self.connected_ssid.as_deref()
    }

    fn configure(&mut self, creds: &LinkCredentials) {
        info!("link configured for SSID {}", creds.ssid);
        self.configured = Some(creds.clone());
    }

    fn connect(&mut self) -> Result<()> {
        let creds = self.configured.as_ref().ok_or(Error::NotFound)?;
        self.connected_ssid = Some(creds.ssid.clone());
        info!("link connected to {}", creds.ssid);
        Ok(())
    }

    fn disconnect(&mut self) -> Result<()> {
        if let Some(ssid) = self.connected_ssid.take() {
            info!("link disconnected from {ssid}");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_round_trip_96_bytes() {
        let creds = LinkCredentials::new("home", "abcdef");
        let wire = creds.to_wire();
        assert_eq!(wire.len(), CREDENTIALS_WIRE_LEN);
        assert_eq!(&wire[..4], b"home");
        assert_eq!(wire[4], 0);
        assert_eq!(&wire[32..38], b"abcdef");

        let back = LinkCredentials::from_wire(&wire).unwrap();
        assert_eq!(back, creds);
    }

    #[test]
    fn masking_keeps_three_chars() {
        let creds = LinkCredentials::new("home", "abcdef");
        let masked = creds.masked();
        assert_eq!(masked.ssid.as_str(), "home");
        assert_eq!(masked.password.as_str(), "abc***");
    }

    #[test]
    fn short_secret_still_masked() {
        let creds = LinkCredentials::new("home", "ab");
        assert_eq!(creds.masked().password.as_str(), "ab***");
    }

    #[test]
    fn empty_secret_stays_empty() {
        let creds = LinkCredentials::new("home", "");
        assert_eq!(creds.masked().password.as_str(), "");
    }

    #[test]
    fn empty_ssid_is_invalid() {
        let wire = [0u8; CREDENTIALS_WIRE_LEN];
        assert!(LinkCredentials::from_wire(&wire).is_err());
    }

    #[test]
    fn sim_control_connects_to_configured_network() {
        let mut link = SimLinkControl::new();
        assert!(link.connect().is_err());

        link.configure(&LinkCredentials::new("home", "pw"));
        link.connect().unwrap();
        assert!(link.is_connected());
        assert_eq!(link.current_ssid(), Some("home"));

        link.disconnect().unwrap();
        assert!(!link.is_connected());
    }
}
