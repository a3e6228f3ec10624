//! Command-line value normalization.

use crate::{Error, Result};

/// Length of a MAC address written without separators.
pub const MAC_LEN: usize = 12;

/// Normalize a MAC address: drop `:` separators and upper-case.
///
/// # Errors
///
/// Returns `Error::InvalidMac` unless the result is exactly 12 characters.
pub fn normalize_mac(raw: &str) -> Result<String> {
    let mac: String = raw.chars().filter(|&c| c != ':').collect::<String>().to_uppercase();
    if mac.chars().count() != MAC_LEN {
        return Err(Error::InvalidMac(mac));
    }
    Ok(mac)
}

/// Listener address for `host` and `port`; an empty host means all interfaces.
pub fn bind_address(host: &str, port: u16) -> String {
    let host = if host.is_empty() { "0.0.0.0" } else { host };
    if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_mac() {
        assert_eq!(normalize_mac("a4:50:46:12:bc:0f").unwrap(), "A4504612BC0F");
        assert_eq!(normalize_mac("A4504612BC0F").unwrap(), "A4504612BC0F");
    }

    #[test]
    fn test_reject_bad_mac() {
        assert!(matches!(normalize_mac(""), Err(Error::InvalidMac(_))));
        assert!(matches!(
            normalize_mac("a4:50:46:12:bc"),
            Err(Error::InvalidMac(m)) if m == "A4504612BC"
        ));
        assert!(normalize_mac("a4-50-46-12-bc-0f").is_err());
    }

    #[test]
    fn test_bind_address() {
        assert_eq!(bind_address("", 32768), "0.0.0.0:32768");
        assert_eq!(bind_address("192.168.1.1", 9000), "192.168.1.1:9000");
        assert_eq!(bind_address("::1", 9000), "[::1]:9000");
    }
}
