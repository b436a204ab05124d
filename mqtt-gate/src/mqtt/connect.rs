/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

use crate::decode::utils::*;
use crate::encode::utils::*;
use crate::error::{GateError, GateResult};
use crate::logging::*;
use crate::mqtt::*;
use crate::mqtt::utils::*;
use crate::validate::utils::*;

use log::*;
use std::collections::VecDeque;
use std::fmt;

pub(crate) fn compute_connect_flags(packet: &ConnectPacket) -> u8 {
    let mut flags: u8 = 0;
    if packet.clean_session {
        flags |= CONNECT_PACKET_CLEAN_SESSION_FLAG_MASK;
    }

    if let Some(will) = &packet.will {
        flags |= CONNECT_PACKET_HAS_WILL_FLAG_MASK;
        flags |= (will.qos as u8) << CONNECT_PACKET_WILL_QOS_FLAG_SHIFT;
        if will.retain {
            flags |= CONNECT_PACKET_WILL_RETAIN_FLAG_MASK;
        }
    }

    if packet.password.is_some() {
        flags |= CONNECT_PACKET_HAS_PASSWORD_FLAG_MASK;
    }

    if packet.username.is_some() {
        flags |= CONNECT_PACKET_HAS_USERNAME_FLAG_MASK;
    }

    flags
}

pub(crate) fn compute_connect_packet_length(packet: &ConnectPacket) -> GateResult<u32> {

    /* variable header length =
     *    protocol name (2 + name length)
     *  + 1 byte protocol level, 1 byte flags, 2 bytes keep alive
     */
    let variable_header_length = 2 + packet.protocol_version.protocol_name().len() + 4;

    let mut payload_length : usize = 2 + packet.client_id.len();

    if let Some(will) = &packet.will {
        payload_length += 2 + will.topic.len();
        payload_length += 2 + will.payload.len();
    }

    if let Some(username) = &packet.username {
        payload_length += 2 + username.len();
    }

    if let Some(password) = &packet.password {
        payload_length += 2 + password.len();
    }

    let total_remaining_length : usize = payload_length + variable_header_length;

    if total_remaining_length > MAXIMUM_VARIABLE_LENGTH_INTEGER {
        return Err(GateError::new_encoding_failure("compute_connect_packet_length - vli value exceeds the protocol maximum (2 ^ 28 - 1)"));
    }

    Ok(total_remaining_length as u32)
}

fn get_connect_packet_protocol_name(packet: &MqttPacket) -> &str {
    if let MqttPacket::Connect(connect) = packet {
        return connect.protocol_version.protocol_name();
    }

    ""
}

fn get_connect_packet_client_id(packet: &MqttPacket) -> &str {
    if let MqttPacket::Connect(connect) = packet {
        return connect.client_id.as_str();
    }

    ""
}

fn get_connect_packet_will_topic(packet: &MqttPacket) -> &str {
    if let MqttPacket::Connect(connect) = packet {
        if let Some(will) = &connect.will {
            return will.topic.as_str();
        }
    }

    ""
}

fn get_connect_packet_will_payload(packet: &MqttPacket) -> &[u8] {
    if let MqttPacket::Connect(connect) = packet {
        if let Some(will) = &connect.will {
            return will.payload.as_slice();
        }
    }

    &[]
}

fn get_connect_packet_username(packet: &MqttPacket) -> &str {
    if let MqttPacket::Connect(connect) = packet {
        if let Some(username) = &connect.username {
            return username.as_str();
        }
    }

    ""
}

fn get_connect_packet_password(packet: &MqttPacket) -> &[u8] {
    if let MqttPacket::Connect(connect) = packet {
        if let Some(password) = &connect.password {
            return password.as_slice();
        }
    }

    &[]
}

#[rustfmt::skip]
pub(crate) fn write_connect_encoding_steps(packet: &ConnectPacket, steps: &mut VecDeque<EncodingStep>) -> GateResult<()> {
    let total_remaining_length = compute_connect_packet_length(packet)?;

    encode_integral_expression!(steps, Uint8, CONNECT_FIRST_BYTE);
    encode_integral_expression!(steps, Vli, total_remaining_length);

    encode_length_prefixed_string!(steps, get_connect_packet_protocol_name, packet.protocol_version.protocol_name());
    encode_integral_expression!(steps, Uint8, packet.protocol_version.level());
    encode_integral_expression!(steps, Uint8, compute_connect_flags(packet));
    encode_integral_expression!(steps, Uint16, packet.keep_alive_interval_seconds);

    encode_length_prefixed_string!(steps, get_connect_packet_client_id, packet.client_id);

    if let Some(will) = &packet.will {
        encode_length_prefixed_string!(steps, get_connect_packet_will_topic, will.topic);
        encode_length_prefixed_bytes!(steps, get_connect_packet_will_payload, will.payload);
    }

    encode_optional_length_prefixed_string!(steps, get_connect_packet_username, packet.username);
    encode_optional_length_prefixed_bytes!(steps, get_connect_packet_password, packet.password);

    Ok(())
}

fn is_valid_mqtt311_client_id(client_id: &str) -> bool {
    client_id.chars().all(|c| c.is_ascii_alphanumeric())
}

fn reject_connect_flags<T>(message: &str) -> GateResult<T> {
    error!("{}", message);
    Err(GateError::new_malformed_variable_header(PacketType::Connect, message.to_string()))
}

pub(crate) fn decode_connect_packet(first_byte: u8, packet_body: &[u8]) -> GateResult<Box<MqttPacket>> {

    if first_byte != CONNECT_FIRST_BYTE {
        return reject_first_byte(PacketType::Connect, first_byte);
    }

    let mut packet = ConnectPacket { ..Default::default() };
    let mut mutable_body = packet_body;

    let mut protocol_name = String::new();
    mutable_body = decode_length_prefixed_string(mutable_body, &mut protocol_name, PacketType::Connect, "protocol name")?;

    let mut protocol_level : u8 = 0;
    mutable_body = decode_u8(mutable_body, &mut protocol_level, PacketType::Connect)?;
    packet.protocol_version = convert_u8_to_protocol_version(&protocol_name, protocol_level)?;

    let mut connect_flags : u8 = 0;
    mutable_body = decode_u8(mutable_body, &mut connect_flags, PacketType::Connect)?;

    if (connect_flags & CONNECT_PACKET_RESERVED_FLAG_MASK) != 0 {
        return reject_connect_flags("decode_connect_packet - reserved connect flag set");
    }

    packet.clean_session = (connect_flags & CONNECT_PACKET_CLEAN_SESSION_FLAG_MASK) != 0;
    let has_will = (connect_flags & CONNECT_PACKET_HAS_WILL_FLAG_MASK) != 0;
    let will_retain = (connect_flags & CONNECT_PACKET_WILL_RETAIN_FLAG_MASK) != 0;
    let will_qos_bits = (connect_flags >> CONNECT_PACKET_WILL_QOS_FLAG_SHIFT) & QOS_MASK;
    let has_username = (connect_flags & CONNECT_PACKET_HAS_USERNAME_FLAG_MASK) != 0;
    let has_password = (connect_flags & CONNECT_PACKET_HAS_PASSWORD_FLAG_MASK) != 0;

    let will_qos = match convert_u8_to_quality_of_service(will_qos_bits) {
        Ok(qos) => { qos }
        Err(_) => {
            return reject_connect_flags("decode_connect_packet - invalid will qos");
        }
    };

    if !has_will && (will_retain || will_qos != QualityOfService::AtMostOnce) {
        return reject_connect_flags("decode_connect_packet - will qos or retain set without will flag");
    }

    if has_password && !has_username {
        return reject_connect_flags("decode_connect_packet - password flag set without username flag");
    }

    mutable_body = decode_u16(mutable_body, &mut packet.keep_alive_interval_seconds, PacketType::Connect)?;

    mutable_body = match packet.protocol_version {
        ProtocolVersion::Mqtt31 => {
            decode_length_prefixed_lossy_string(mutable_body, &mut packet.client_id, PacketType::Connect, "client id")?
        }
        ProtocolVersion::Mqtt311 => {
            decode_length_prefixed_string(mutable_body, &mut packet.client_id, PacketType::Connect, "client id")?
        }
    };
    if packet.client_id.is_empty() && !packet.clean_session {
        let message = "decode_connect_packet - empty client id requires clean session";
        error!("{}", message);
        return Err(GateError::new_identifier_rejected(message));
    }

    if packet.protocol_version == ProtocolVersion::Mqtt311 && !is_valid_mqtt311_client_id(&packet.client_id) {
        let message = format!("decode_connect_packet - client id \"{}\" contains characters outside [0-9A-Za-z]", packet.client_id);
        error!("{}", message);
        return Err(GateError::new_identifier_rejected(message));
    }

    if has_will {
        let mut will = PublishPacket {
            qos: will_qos,
            retain: will_retain,
            ..Default::default()
        };

        mutable_body = decode_length_prefixed_string(mutable_body, &mut will.topic, PacketType::Connect, "will topic")?;
        if !is_valid_topic(&will.topic) {
            let message = format!("decode_connect_packet - invalid will topic \"{}\"", will.topic);
            error!("{}", message);
            return Err(GateError::new_malformed_variable_header(PacketType::Connect, message));
        }

        mutable_body = decode_length_prefixed_bytes(mutable_body, &mut will.payload, PacketType::Connect, "will message")?;
        packet.will = Some(will);
    }

    if has_username && !mutable_body.is_empty() {
        let mut username = String::new();
        mutable_body = decode_length_prefixed_string(mutable_body, &mut username, PacketType::Connect, "username")?;
        packet.username = Some(username);
    }

    if has_password && !mutable_body.is_empty() {
        let mut password = Vec::new();
        mutable_body = decode_length_prefixed_bytes(mutable_body, &mut password, PacketType::Connect, "password")?;
        packet.password = Some(password);
    }

    if !mutable_body.is_empty() {
        return reject_trailing_bytes(PacketType::Connect, mutable_body.len());
    }

    Ok(Box::new(MqttPacket::Connect(packet)))
}

pub(crate) fn validate_connect_packet_outbound(packet: &ConnectPacket) -> GateResult<()> {

    validate_string_length(&packet.client_id, PacketType::Connect, "client_id")?;

    if packet.client_id.is_empty() && !packet.clean_session {
        let message = "validate_connect_packet_outbound - empty client id requires clean session";
        error!("{}", message);
        return Err(GateError::new_packet_validation(PacketType::Connect, message));
    }

    if packet.protocol_version == ProtocolVersion::Mqtt311 && !is_valid_mqtt311_client_id(&packet.client_id) {
        let message = "validate_connect_packet_outbound - client id contains characters outside [0-9A-Za-z]";
        error!("{}", message);
        return Err(GateError::new_packet_validation(PacketType::Connect, message));
    }

    if let Some(will) = &packet.will {
        if !is_valid_topic(&will.topic) {
            let message = "validate_connect_packet_outbound - invalid will topic";
            error!("{}", message);
            return Err(GateError::new_packet_validation(PacketType::Connect, message));
        }

        if will.payload.len() > crate::validate::MAXIMUM_BINARY_PROPERTY_LENGTH {
            let message = "validate_connect_packet_outbound - will payload too long";
            error!("{}", message);
            return Err(GateError::new_packet_validation(PacketType::Connect, message));
        }
    }

    if packet.password.is_some() && packet.username.is_none() {
        let message = "validate_connect_packet_outbound - password set without username";
        error!("{}", message);
        return Err(GateError::new_packet_validation(PacketType::Connect, message));
    }

    validate_optional_string_length(&packet.username, PacketType::Connect, "username")?;
    validate_optional_binary_length(&packet.password, PacketType::Connect, "password")?;

    Ok(())
}

impl fmt::Display for ConnectPacket {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ConnectPacket {{")?;
        log_enum!(self.protocol_version, f, "protocol_version", ProtocolVersion);
        log_primitive_value!(self.keep_alive_interval_seconds, f, "keep_alive_interval_seconds");
        log_primitive_value!(self.clean_session, f, "clean_session");
        log_string!(self.client_id, f, "client_id");
        log_optional_string_sensitive!(self.username, f, "username");
        log_optional_binary_data_sensitive!(self.password, f, "password");

        if let Some(will) = &self.will {
            write!(f, " will:{}", will)?;
        }

        write!(f, " }}")
    }
}

impl ConnectPacket {

    /// Creates a new builder for a ConnectPacket.
    pub fn builder() -> ConnectPacketBuilder {
        ConnectPacketBuilder::new()
    }
}

/// Builder type for ConnectPacket instances
pub struct ConnectPacketBuilder {
    packet: ConnectPacket
}

impl ConnectPacketBuilder {
    pub(crate) fn new() -> Self {
        ConnectPacketBuilder {
            packet: ConnectPacket { ..Default::default() }
        }
    }

    /// Sets the protocol name/level pair
    pub fn with_protocol_version(mut self, protocol_version: ProtocolVersion) -> Self {
        self.packet.protocol_version = protocol_version;
        self
    }

    /// Sets whether previous session state should be discarded
    pub fn with_clean_session(mut self, clean_session: bool) -> Self {
        self.packet.clean_session = clean_session;
        self
    }

    /// Sets the keep alive interval in seconds
    pub fn with_keep_alive_interval_seconds(mut self, keep_alive: u16) -> Self {
        self.packet.keep_alive_interval_seconds = keep_alive;
        self
    }

    /// Sets the client id
    pub fn with_client_id(mut self, client_id: &str) -> Self {
        self.packet.client_id = client_id.to_string();
        self
    }

    /// Sets the will message.  The publish's QoS and retain flag become the will flags.
    pub fn with_will(mut self, will: PublishPacket) -> Self {
        self.packet.will = Some(will);
        self
    }

    /// Sets the username
    pub fn with_username(mut self, username: &str) -> Self {
        self.packet.username = Some(username.to_string());
        self
    }

    /// Sets the password
    pub fn with_password(mut self, password: &[u8]) -> Self {
        self.packet.password = Some(password.to_vec());
        self
    }

    /// Creates a new ConnectPacket from the builder's internal state
    pub fn build(self) -> ConnectPacket {
        self.packet
    }
}
