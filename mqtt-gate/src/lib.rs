/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

/*!
Core of an MQTT 3.1/3.1.1 gateway.

The crate contains a bit-exact packet codec, an async frame reader, per-session acknowledgement
tracking for QoS 1 and QoS 2 exchanges, a pluggable session registry and the connection state
machine that ties them together behind [`Gateway::accept`].

Credential checks and topic routing are left to the embedding application through the
[`Authenticator`] and [`RoutingResolver`] traits.
 */

pub mod ackqueue;
pub mod config;
mod decode;
mod encode;
pub mod error;
pub mod features;
pub mod gateway;
mod logging;
pub mod mqtt;
pub mod session;
mod validate;

/* Re-export the packet model at the root level */
pub use mqtt::QualityOfService;
pub use mqtt::ProtocolVersion;
pub use mqtt::ConnectReturnCode;
pub use mqtt::SubackReturnCode;
pub use mqtt::PacketType;
pub use mqtt::MqttPacket;
pub use mqtt::Subscription;

pub use mqtt::ConnackPacket;
pub use mqtt::ConnectPacket;
pub use mqtt::DisconnectPacket;
pub use mqtt::PingreqPacket;
pub use mqtt::PingrespPacket;
pub use mqtt::PubackPacket;
pub use mqtt::PubcompPacket;
pub use mqtt::PublishPacket;
pub use mqtt::PubrecPacket;
pub use mqtt::PubrelPacket;
pub use mqtt::SubackPacket;
pub use mqtt::SubscribePacket;
pub use mqtt::UnsubackPacket;
pub use mqtt::UnsubscribePacket;

pub use decode::{decode_frame, read_packet};
pub use encode::encode_packet;
pub use error::{GateError, GateResult};

pub use ackqueue::{AckCompletion, AckEntry, AckQueue, AckState};
pub use config::{GatewayOptions, GatewayOptionsBuilder, UnknownPacketPolicy};
pub use gateway::{AllowAllAuthenticator, Authenticator, ConnectionHandle, ConnectionState, Gateway, GatewayTransport, RequestedQosResolver, RoutingResolver};
pub use session::{Session, SessionManager, SessionProvider, SessionProviders};
pub use session::memory::MemoryProvider;
