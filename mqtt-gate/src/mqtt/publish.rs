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

pub(crate) fn compute_publish_packet_length(packet: &PublishPacket) -> GateResult<u32> {
    let mut total_remaining_length : usize = 2 + packet.topic.len();

    if packet.qos != QualityOfService::AtMostOnce {
        total_remaining_length += 2;
    }

    total_remaining_length += packet.payload.len();

    compute_variable_length_integer_encode_size(total_remaining_length)?;

    Ok(total_remaining_length as u32)
}

fn compute_publish_fixed_header_first_byte(packet: &PublishPacket) -> u8 {
    let mut first_byte: u8 = PACKET_TYPE_PUBLISH << 4;

    if packet.duplicate {
        first_byte |= PUBLISH_PACKET_FIXED_HEADER_DUPLICATE_FLAG;
    }

    first_byte |= (packet.qos as u8) << 1;

    if packet.retain {
        first_byte |= PUBLISH_PACKET_FIXED_HEADER_RETAIN_FLAG;
    }

    first_byte
}

fn get_publish_packet_topic(packet: &MqttPacket) -> &str {
    if let MqttPacket::Publish(publish) = packet {
        return publish.topic.as_str();
    }

    ""
}

fn get_publish_packet_payload(packet: &MqttPacket) -> &[u8] {
    if let MqttPacket::Publish(publish) = packet {
        return publish.payload.as_slice();
    }

    &[]
}

#[rustfmt::skip]
pub(crate) fn write_publish_encoding_steps(packet: &PublishPacket, steps: &mut VecDeque<EncodingStep>) -> GateResult<()> {
    let total_remaining_length = compute_publish_packet_length(packet)?;

    encode_integral_expression!(steps, Uint8, compute_publish_fixed_header_first_byte(packet));
    encode_integral_expression!(steps, Vli, total_remaining_length);

    encode_length_prefixed_string!(steps, get_publish_packet_topic, packet.topic);

    if packet.qos != QualityOfService::AtMostOnce {
        encode_integral_expression!(steps, Uint16, packet.packet_id);
    }

    if !packet.payload.is_empty() {
        encode_raw_bytes!(steps, get_publish_packet_payload);
    }

    Ok(())
}

pub(crate) fn decode_publish_packet(first_byte: u8, packet_body: &[u8]) -> GateResult<Box<MqttPacket>> {

    if first_byte >> 4 != PACKET_TYPE_PUBLISH {
        return reject_first_byte(PacketType::Publish, first_byte);
    }

    let mut packet = PublishPacket { ..Default::default() };

    if (first_byte & PUBLISH_PACKET_FIXED_HEADER_DUPLICATE_FLAG) != 0 {
        packet.duplicate = true;
    }

    if (first_byte & PUBLISH_PACKET_FIXED_HEADER_RETAIN_FLAG) != 0 {
        packet.retain = true;
    }

    packet.qos = match convert_u8_to_quality_of_service((first_byte >> 1) & QOS_MASK) {
        Ok(qos) => { qos }
        Err(_) => { return reject_first_byte(PacketType::Publish, first_byte); }
    };

    let mut mutable_body = packet_body;

    mutable_body = decode_length_prefixed_string(mutable_body, &mut packet.topic, PacketType::Publish, "topic")?;
    if !is_valid_topic(&packet.topic) {
        let message = format!("decode_publish_packet - invalid topic \"{}\"", packet.topic);
        error!("{}", message);
        return Err(GateError::new_malformed_variable_header(PacketType::Publish, message));
    }

    if packet.qos != QualityOfService::AtMostOnce {
        mutable_body = decode_u16(mutable_body, &mut packet.packet_id, PacketType::Publish)?;
        if packet.packet_id == 0 {
            let message = "decode_publish_packet - packet id is zero";
            error!("{}", message);
            return Err(GateError::new_malformed_variable_header(PacketType::Publish, message));
        }
    }

    packet.payload = mutable_body.to_vec();

    Ok(Box::new(MqttPacket::Publish(packet)))
}

pub(crate) fn validate_publish_packet_outbound(packet: &PublishPacket) -> GateResult<()> {

    validate_string_length(&packet.topic, PacketType::Publish, "topic")?;

    if !is_valid_topic(&packet.topic) {
        let message = "validate_publish_packet_outbound - invalid topic";
        error!("{}", message);
        return Err(GateError::new_packet_validation(PacketType::Publish, message));
    }

    if packet.payload.is_empty() {
        let message = "validate_publish_packet_outbound - empty payload";
        error!("{}", message);
        return Err(GateError::new_packet_validation(PacketType::Publish, message));
    }

    if packet.qos == QualityOfService::AtMostOnce {
        if packet.packet_id != 0 {
            let message = "validate_publish_packet_outbound - packet id set on qos 0 publish";
            error!("{}", message);
            return Err(GateError::new_packet_validation(PacketType::Publish, message));
        }
    } else {
        validate_packet_id_non_zero(packet.packet_id, PacketType::Publish)?;
    }

    Ok(())
}

impl fmt::Display for PublishPacket {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "PublishPacket {{")?;
        log_primitive_value!(self.packet_id, f, "packet_id");
        log_string!(self.topic, f, "topic");
        log_enum!(self.qos, f, "qos", QualityOfService);
        log_primitive_value!(self.duplicate, f, "duplicate");
        log_primitive_value!(self.retain, f, "retain");
        log_binary_data!(self.payload, f, "payload");
        write!(f, " }}")
    }
}

// Some convenience constructors
impl PublishPacket {

    /// Common-case constructor for PublishPackets that don't need special configuration
    pub fn new(topic: &str, qos: QualityOfService, payload: &[u8]) -> Self {
        PublishPacket {
            topic: topic.to_string(),
            qos,
            payload: payload.to_vec(),
            ..Default::default()
        }
    }
}
