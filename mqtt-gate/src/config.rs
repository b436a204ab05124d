/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

/*!
Module containing types for configuring the gateway's per-connection behavior.
 */

use std::time::Duration;

/// Controls what a connection does with a well-formed packet that a gateway never expects to
/// receive from a client (Connack, Suback, Unsuback, Pingresp, or a second Connect).
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq)]
#[non_exhaustive]
pub enum UnknownPacketPolicy {

    /// The packet is logged and dropped; the connection stays open.
    #[default]
    Ignore,

    /// The connection is closed.
    Disconnect,
}

pub(crate) const DEFAULT_KEEP_ALIVE_SECONDS : u64 = 300;
pub(crate) const DEFAULT_HANDSHAKE_TIMEOUT_SECONDS : u64 = 10;
pub(crate) const DEFAULT_NETWORK_DELAY_ALLOWANCE_SECONDS : u64 = 10;
pub(crate) const DEFAULT_ACK_QUEUE_SIZE : usize = 16;
pub(crate) const DEFAULT_SESSION_PROVIDER : &str = "mem";

/// A structure that holds gateway-level behavioral configuration
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct GatewayOptions {
    pub(crate) default_keep_alive: Duration,
    pub(crate) handshake_timeout: Duration,
    pub(crate) network_delay_allowance: Duration,
    pub(crate) unknown_packet_policy: UnknownPacketPolicy,
    pub(crate) ack_queue_size: usize,
    pub(crate) session_provider: String,
}

impl GatewayOptions {

    /// Keep alive interval substituted when a client connects with a keep alive of zero
    pub fn default_keep_alive(&self) -> Duration { self.default_keep_alive }

    /// Deadline for the first frame of a freshly accepted connection
    pub fn handshake_timeout(&self) -> Duration { self.handshake_timeout }

    /// Slack added to a client's keep alive before its silence is treated as a disconnection
    pub fn network_delay_allowance(&self) -> Duration { self.network_delay_allowance }

    /// What to do with well-formed packets a client should never send
    pub fn unknown_packet_policy(&self) -> UnknownPacketPolicy { self.unknown_packet_policy }

    /// Initial capacity of each session ack queue
    pub fn ack_queue_size(&self) -> usize { self.ack_queue_size }

    /// Name of the session provider sessions are stored in
    pub fn session_provider(&self) -> &str { self.session_provider.as_str() }
}

impl Default for GatewayOptions {
    fn default() -> Self {
        GatewayOptions {
            default_keep_alive: Duration::from_secs(DEFAULT_KEEP_ALIVE_SECONDS),
            handshake_timeout: Duration::from_secs(DEFAULT_HANDSHAKE_TIMEOUT_SECONDS),
            network_delay_allowance: Duration::from_secs(DEFAULT_NETWORK_DELAY_ALLOWANCE_SECONDS),
            unknown_packet_policy: UnknownPacketPolicy::default(),
            ack_queue_size: DEFAULT_ACK_QUEUE_SIZE,
            session_provider: DEFAULT_SESSION_PROVIDER.to_string(),
        }
    }
}

/// A builder for gateway-level behavior configuration options
#[derive(Debug, Default)]
pub struct GatewayOptionsBuilder {
    options: GatewayOptions
}

impl GatewayOptionsBuilder {

    /// Creates a new builder object for GatewayOptions
    pub fn new() -> Self {
        GatewayOptionsBuilder {
            options: GatewayOptions {
                ..Default::default()
            }
        }
    }

    /// Configures the keep alive the gateway enforces on clients that connect with a keep alive
    /// of zero.
    pub fn with_default_keep_alive(&mut self, default_keep_alive: Duration) -> &mut Self {
        self.options.default_keep_alive = default_keep_alive;
        self
    }

    /// Configures how long a freshly accepted connection has to deliver its Connect packet.
    pub fn with_handshake_timeout(&mut self, handshake_timeout: Duration) -> &mut Self {
        self.options.handshake_timeout = handshake_timeout;
        self
    }

    /// Configures the tolerance added to each client's keep alive when computing read deadlines.
    pub fn with_network_delay_allowance(&mut self, network_delay_allowance: Duration) -> &mut Self {
        self.options.network_delay_allowance = network_delay_allowance;
        self
    }

    /// Configures the handling of packets a client should never send.
    pub fn with_unknown_packet_policy(&mut self, unknown_packet_policy: UnknownPacketPolicy) -> &mut Self {
        self.options.unknown_packet_policy = unknown_packet_policy;
        self
    }

    /// Configures the initial ack queue capacity.  Rounded up to a power of two, minimum 1.
    pub fn with_ack_queue_size(&mut self, ack_queue_size: usize) -> &mut Self {
        self.options.ack_queue_size = ack_queue_size.max(1).next_power_of_two();
        self
    }

    /// Configures which registered session provider the gateway stores sessions in.
    pub fn with_session_provider(&mut self, session_provider: &str) -> &mut Self {
        self.options.session_provider = session_provider.to_string();
        self
    }

    /// Creates a new set of gateway options from the builder's internal state
    pub fn build(&self) -> GatewayOptions {
        self.options.clone()
    }
}
