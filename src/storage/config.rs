//! Profile, link-credential and timezone persistence.
//!
//! Three items share one NVS namespace. Every blob's persisted size is
//! validated against the packed struct size on load:
//!
//! - plant profile: size mismatch or absence recovers to the factory
//!   default, which is persisted back immediately;
//! - link credentials: absence is the normal "not provisioned yet" signal
//!   and surfaces as `NotFound`; a size mismatch is an error requiring
//!   explicit reprovisioning;
//! - timezone: a plain string, defaulting to the compiled-in zone.
//!
//! The in-memory active profile is only ever replaced wholesale, so readers
//! never observe a partially updated profile.

use log::{info, warn};

use super::Storage;
use crate::clock::{DEFAULT_TIMEZONE, MAX_TIMEZONE_LEN};
use crate::error::{Error, Result};
use crate::link::{LinkCredentials, CREDENTIALS_WIRE_LEN};
use crate::plant::profile::{PlantProfile, PROFILE_WIRE_LEN};
use crate::sample::MoistureKind;

const NAMESPACE: &str = "plant_config";
const KEY_PROFILE: &str = "profile";
const KEY_LINK: &str = "link_cfg";
const KEY_TIMEZONE: &str = "timezone";

/// Owns the storage backend and the in-memory active configuration.
pub struct ConfigStore<S: Storage> {
    storage: S,
    moisture_kind: MoistureKind,
    active_profile: PlantProfile,
    active_credentials: Option<LinkCredentials>,
}

impl<S: Storage> ConfigStore<S> {
    /// Wrap a storage backend. Call [`load_profile`](Self::load_profile)
    /// during boot to populate the active profile from flash.
    pub fn new(storage: S, moisture_kind: MoistureKind) -> Self {
        Self {
            storage,
            moisture_kind,
            active_profile: PlantProfile::factory_default(moisture_kind),
            active_credentials: None,
        }
    }

    // ── Plant profile ─────────────────────────────────────────

    /// Load the persisted profile into the active slot and return a copy.
    ///
    /// Missing, corrupt or size-mismatched blobs recover to the factory
    /// default, which is persisted so the next boot reads it back cleanly.
    pub fn load_profile(&mut self) -> PlantProfile {
        let mut buf = [0u8; PROFILE_WIRE_LEN];
        let loaded = match self.storage.read(NAMESPACE, KEY_PROFILE, &mut buf) {
            Ok(size) if size == PROFILE_WIRE_LEN => match PlantProfile::from_wire(&buf) {
                Ok(profile) => Some(profile),
                Err(e) => {
                    warn!("stored profile is corrupt ({e}), using defaults");
                    None
                }
            },
            Ok(size) => {
                warn!(
                    "profile size mismatch (expected {PROFILE_WIRE_LEN}, got {size}), using defaults"
                );
                None
            }
            Err(Error::NotFound) => {
                info!("no stored profile, using defaults");
                None
            }
            Err(e) => {
                warn!("profile read failed ({e}), using defaults");
                None
            }
        };

        let profile = loaded.unwrap_or_else(|| {
            let default = PlantProfile::factory_default(self.moisture_kind);
            if let Err(e) = self.persist_profile(&default) {
                warn!("failed to persist default profile: {e}");
            }
            default
        });

        info!(
            "profile '{}': dry>={:.0} wet<={:.0} advisory after {} dry days",
            profile.name, profile.soil_dry_threshold, profile.soil_wet_threshold,
            profile.dry_days_for_watering
        );
        self.active_profile = profile.clone();
        profile
    }

    /// Persist a profile. The previous blob stays intact on failure.
    pub fn save_profile(&mut self, profile: &PlantProfile) -> Result<()> {
        self.persist_profile(profile)?;
        info!("profile '{}' saved", profile.name);
        Ok(())
    }

    fn persist_profile(&mut self, profile: &PlantProfile) -> Result<()> {
        self.storage
            .write(NAMESPACE, KEY_PROFILE, &profile.to_wire())
    }

    /// Replace the in-memory copy without touching flash.
    pub fn update_active_profile(&mut self, profile: PlantProfile) {
        info!("active profile updated in memory: {}", profile.name);
        self.active_profile = profile;
    }

    pub fn active_profile(&self) -> &PlantProfile {
        &self.active_profile
    }

    // ── Link credentials ──────────────────────────────────────

    /// Load persisted credentials into the active slot.
    ///
    /// `NotFound` is a normal signal that provisioning is still required; a
    /// size mismatch is surfaced as such and is not auto-recovered.
    pub fn load_credentials(&mut self) -> Result<LinkCredentials> {
        let mut buf = [0u8; CREDENTIALS_WIRE_LEN];
        let size = self.storage.read(NAMESPACE, KEY_LINK, &mut buf)?;
        if size != CREDENTIALS_WIRE_LEN {
            return Err(Error::SizeMismatch {
                expected: CREDENTIALS_WIRE_LEN,
                got: size,
            });
        }
        let creds = LinkCredentials::from_wire(&buf)?;
        info!("link credentials loaded for SSID {}", creds.ssid);
        self.active_credentials = Some(creds.clone());
        Ok(creds)
    }

    /// Set the live credentials without persisting.
    pub fn set_active_credentials(&mut self, creds: LinkCredentials) {
        self.active_credentials = Some(creds);
    }

    pub fn active_credentials(&self) -> Option<&LinkCredentials> {
        self.active_credentials.as_ref()
    }

    /// Persist the live credentials. `NotFound` when nothing is configured.
    pub fn save_credentials(&mut self) -> Result<()> {
        let creds = self.active_credentials.as_ref().ok_or(Error::NotFound)?;
        let wire = creds.to_wire();
        self.storage.write(NAMESPACE, KEY_LINK, &wire)?;
        info!("link credentials saved for SSID {}", creds.ssid);
        Ok(())
    }

    // ── Timezone ──────────────────────────────────────────────

    /// The persisted timezone string, or the compiled-in default.
    pub fn load_timezone(&mut self) -> heapless::String<MAX_TIMEZONE_LEN> {
        let mut buf = [0u8; MAX_TIMEZONE_LEN];
        let mut tz = heapless::String::new();

        match self.storage.read(NAMESPACE, KEY_TIMEZONE, &mut buf) {
            Ok(size) if size <= MAX_TIMEZONE_LEN => {
                let s = core::str::from_utf8(&buf[..size])
                    .unwrap_or(DEFAULT_TIMEZONE)
                    .trim_end_matches('\0');
                let _ = tz.push_str(s);
                info!("timezone loaded: {tz}");
            }
            Ok(size) => {
                warn!("timezone blob of {size} bytes ignored, using default");
                let _ = tz.push_str(DEFAULT_TIMEZONE);
            }
            Err(_) => {
                info!("no stored timezone, using default {DEFAULT_TIMEZONE}");
                let _ = tz.push_str(DEFAULT_TIMEZONE);
            }
        }
        tz
    }

    pub fn save_timezone(&mut self, tz: &str) -> Result<()> {
        if tz.is_empty() || tz.len() > MAX_TIMEZONE_LEN {
            return Err(Error::InvalidArgument("timezone length"));
        }
        self.storage.write(NAMESPACE, KEY_TIMEZONE, tz.as_bytes())?;
        info!("timezone saved: {tz}");
        Ok(())
    }

    // ── Backend access ────────────────────────────────────────

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }
}
