//! Transfer tuning configuration

use serde::Deserialize;

use crate::error::Result;

/// Tunables for the client and its transfer engine.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Bytes requested by each pipelined FXP_READ.
    pub read_chunk_size: u32,
    /// Ceiling on the bytes covered by outstanding download requests.
    pub window_bytes: u32,
    /// SFTP protocol version advertised in FXP_INIT.
    pub protocol_version: u32,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            read_chunk_size: 32_768,
            window_bytes: 1_048_576,
            protocol_version: crate::protocol::SFTP_PROTO_VERSION,
        }
    }
}

impl TransferConfig {
    /// Load from a TOML document; missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TransferConfig::default();
        assert_eq!(config.read_chunk_size, 32_768);
        assert_eq!(config.window_bytes, 1_048_576);
        assert_eq!(config.protocol_version, 3);
    }

    #[test]
    fn test_partial_toml() {
        let config = TransferConfig::from_toml_str("window_bytes = 65536").unwrap();
        assert_eq!(config.window_bytes, 65_536);
        assert_eq!(config.read_chunk_size, 32_768);
    }
}
