//! APRS-IS passcode generation from a callsign.
//!
//! The classic 0x73E2 XOR-fold used by aprs.fi and Direwolf: fold the
//! base callsign (SSID stripped) into a 16-bit accumulator two characters
//! at a time, then mask to 15 bits.

use std::sync::OnceLock;

use anyhow::{Result, bail};
use regex::Regex;

fn callsign_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Z0-9]{1,6}(?:-[0-9A-Z]{1,2})?$").expect("callsign regex is valid")
    })
}

/// Uppercase the callsign and validate its shape (base of up to six
/// alphanumerics, optional `-SSID` suffix).
pub fn validate_callsign(callsign: &str) -> Result<String> {
    let normalized = callsign.trim().to_uppercase();
    if normalized.is_empty() {
        bail!("Callsign cannot be empty");
    }
    if !callsign_pattern().is_match(&normalized) {
        bail!("Invalid callsign format: {:?}", callsign);
    }
    Ok(normalized)
}

/// Generate the APRS-IS passcode for a callsign (SSID ignored).
pub fn generate_passcode(callsign: &str) -> Result<u16> {
    let normalized = validate_callsign(callsign)?;
    let base = normalized.split('-').next().unwrap_or(&normalized);

    let mut code: u16 = 0x73E2;
    let bytes = base.as_bytes();
    for pair in bytes.chunks(2) {
        code ^= (pair[0] as u16) << 8;
        if let Some(&low) = pair.get(1) {
            code ^= low as u16;
        }
    }
    Ok(code & 0x7FFF)
}
