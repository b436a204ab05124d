/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

use mqtt_gate::{GateError, GateResult, GatewayOptions, GatewayOptionsBuilder, UnknownPacketPolicy};

use serde::Deserialize;
use simplelog::LevelFilter;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_TCP_ADDR : &str = "0.0.0.0:1883";
const DEFAULT_TLS_CERT : &str = "certs/server.pem";
const DEFAULT_TLS_KEY : &str = "certs/server.key";

/// Root of the gateway's TOML configuration file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub common: CommonConfig,
    pub provider: ProviderConfig,
    pub mqtt: MqttConfig,
}

/// Process-wide settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CommonConfig {

    /// error, warn, info, debug or trace
    pub log_level: String,

    /// log file; logs go to the terminal when unset
    pub log_path: Option<PathBuf>,
}

impl Default for CommonConfig {
    fn default() -> Self {
        CommonConfig {
            log_level: "info".to_string(),
            log_path: None,
        }
    }
}

/// Listener settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub tcp_addr: String,
    pub enable_tls: bool,
    pub tls_cert: PathBuf,
    pub tls_key: PathBuf,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        ProviderConfig {
            tcp_addr: DEFAULT_TCP_ADDR.to_string(),
            enable_tls: false,
            tls_cert: PathBuf::from(DEFAULT_TLS_CERT),
            tls_key: PathBuf::from(DEFAULT_TLS_KEY),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownPacketSetting {
    #[default]
    Ignore,
    Disconnect,
}

/// Per-connection protocol settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MqttConfig {

    /// keep alive, in seconds, enforced on clients that connect with a keep alive of 0
    pub max_keepalive: u64,
    pub handshake_timeout_secs: u64,
    pub network_delay_allowance_secs: u64,
    pub unknown_packet_policy: UnknownPacketSetting,
    pub ack_queue_size: usize,
}

impl Default for MqttConfig {
    fn default() -> Self {
        let options = GatewayOptions::default();

        MqttConfig {
            max_keepalive: options.default_keep_alive().as_secs(),
            handshake_timeout_secs: options.handshake_timeout().as_secs(),
            network_delay_allowance_secs: options.network_delay_allowance().as_secs(),
            unknown_packet_policy: UnknownPacketSetting::Ignore,
            ack_queue_size: options.ack_queue_size(),
        }
    }
}

impl ServerConfig {

    /// Reads and parses a configuration file
    pub fn load<P>(path: P) -> GateResult<Self> where P : AsRef<Path> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        ServerConfig::parse(&contents)
    }

    /// Parses configuration from TOML text.  Missing sections and fields take their defaults.
    pub fn parse(contents: &str) -> GateResult<Self> {
        let config : ServerConfig = toml::from_str(contents).map_err(GateError::new_other_error)?;
        config.log_level()?;

        Ok(config)
    }

    /// Parsed log level
    pub fn log_level(&self) -> GateResult<LevelFilter> {
        self.common.log_level.parse::<LevelFilter>()
            .map_err(|_| GateError::new_other_error(format!("invalid log level \"{}\"", self.common.log_level)))
    }

    /// Gateway options derived from the `[mqtt]` section
    pub fn gateway_options(&self) -> GatewayOptions {
        let unknown_packet_policy = match self.mqtt.unknown_packet_policy {
            UnknownPacketSetting::Ignore => { UnknownPacketPolicy::Ignore }
            UnknownPacketSetting::Disconnect => { UnknownPacketPolicy::Disconnect }
        };

        GatewayOptionsBuilder::new()
            .with_default_keep_alive(Duration::from_secs(self.mqtt.max_keepalive))
            .with_handshake_timeout(Duration::from_secs(self.mqtt.handshake_timeout_secs))
            .with_network_delay_allowance(Duration::from_secs(self.mqtt.network_delay_allowance_secs))
            .with_unknown_packet_policy(unknown_packet_policy)
            .with_ack_queue_size(self.mqtt.ack_queue_size)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = ServerConfig::parse("").unwrap();

        assert_eq!("0.0.0.0:1883", config.provider.tcp_addr);
        assert!(!config.provider.enable_tls);
        assert_eq!(LevelFilter::Info, config.log_level().unwrap());
        assert_eq!(GatewayOptions::default(), config.gateway_options());
    }

    #[test]
    fn full_file() {
        let contents = r#"
            [common]
            log_level = "debug"
            log_path = "/tmp/gate.log"

            [provider]
            tcp_addr = "127.0.0.1:8883"
            enable_tls = true
            tls_cert = "a.pem"
            tls_key = "a.key"

            [mqtt]
            max_keepalive = 60
            handshake_timeout_secs = 5
            network_delay_allowance_secs = 2
            unknown_packet_policy = "disconnect"
            ack_queue_size = 20
        "#;

        let config = ServerConfig::parse(contents).unwrap();
        assert_eq!(LevelFilter::Debug, config.log_level().unwrap());
        assert_eq!(Some(PathBuf::from("/tmp/gate.log")), config.common.log_path);
        assert!(config.provider.enable_tls);

        let options = config.gateway_options();
        assert_eq!(Duration::from_secs(60), options.default_keep_alive());
        assert_eq!(Duration::from_secs(5), options.handshake_timeout());
        assert_eq!(Duration::from_secs(2), options.network_delay_allowance());
        assert_eq!(UnknownPacketPolicy::Disconnect, options.unknown_packet_policy());
        assert_eq!(32, options.ack_queue_size());
    }

    #[test]
    fn invalid_log_level_is_rejected() {
        assert!(ServerConfig::parse("[common]\nlog_level = \"loud\"\n").is_err());
    }

    #[test]
    fn invalid_policy_is_rejected() {
        assert!(ServerConfig::parse("[mqtt]\nunknown_packet_policy = \"explode\"\n").is_err());
    }
}
