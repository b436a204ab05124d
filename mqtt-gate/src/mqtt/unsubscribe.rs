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

pub(crate) fn add_topic_filter(packet: &mut UnsubscribePacket, topic_filter: &str) {
    if packet.topic_filters.iter().any(|filter| filter == topic_filter) {
        return;
    }

    packet.topic_filters.push(topic_filter.to_string());
}

pub(crate) fn compute_unsubscribe_packet_length(packet: &UnsubscribePacket) -> GateResult<u32> {
    let mut total_remaining_length : usize = 2;

    total_remaining_length += packet.topic_filters.len() * 2;
    for filter in &packet.topic_filters {
        total_remaining_length += filter.len();
    }

    compute_variable_length_integer_encode_size(total_remaining_length)?;

    Ok(total_remaining_length as u32)
}

fn get_unsubscribe_packet_topic_filter(packet: &MqttPacket, index: usize) -> &str {
    if let MqttPacket::Unsubscribe(unsubscribe) = packet {
        if let Some(filter) = unsubscribe.topic_filters.get(index) {
            return filter.as_str();
        }
    }

    ""
}

#[rustfmt::skip]
pub(crate) fn write_unsubscribe_encoding_steps(packet: &UnsubscribePacket, steps: &mut VecDeque<EncodingStep>) -> GateResult<()> {
    let total_remaining_length = compute_unsubscribe_packet_length(packet)?;

    encode_integral_expression!(steps, Uint8, UNSUBSCRIBE_FIRST_BYTE);
    encode_integral_expression!(steps, Vli, total_remaining_length);

    encode_integral_expression!(steps, Uint16, packet.packet_id);

    for (i, topic_filter) in packet.topic_filters.iter().enumerate() {
        encode_indexed_string!(steps, get_unsubscribe_packet_topic_filter, topic_filter, i);
    }

    Ok(())
}

pub(crate) fn decode_unsubscribe_packet(first_byte: u8, packet_body: &[u8]) -> GateResult<Box<MqttPacket>> {

    if first_byte != UNSUBSCRIBE_FIRST_BYTE {
        return reject_first_byte(PacketType::Unsubscribe, first_byte);
    }

    let mut packet = UnsubscribePacket { ..Default::default() };
    let mut mutable_body = packet_body;

    mutable_body = decode_u16(mutable_body, &mut packet.packet_id, PacketType::Unsubscribe)?;
    if packet.packet_id == 0 {
        let message = "decode_unsubscribe_packet - packet id is zero";
        error!("{}", message);
        return Err(GateError::new_malformed_variable_header(PacketType::Unsubscribe, message));
    }

    while !mutable_body.is_empty() {
        let mut topic_filter = String::new();
        mutable_body = decode_length_prefixed_string(mutable_body, &mut topic_filter, PacketType::Unsubscribe, "topic filter")?;
        add_topic_filter(&mut packet, &topic_filter);
    }

    if packet.topic_filters.is_empty() {
        let message = "decode_unsubscribe_packet - unsubscribe packet contains no topic filters";
        error!("{}", message);
        return Err(GateError::new_malformed_variable_header(PacketType::Unsubscribe, message));
    }

    Ok(Box::new(MqttPacket::Unsubscribe(packet)))
}

pub(crate) fn validate_unsubscribe_packet_outbound(packet: &UnsubscribePacket) -> GateResult<()> {

    validate_packet_id_non_zero(packet.packet_id, PacketType::Unsubscribe)?;

    if packet.topic_filters.is_empty() {
        let message = "validate_unsubscribe_packet_outbound - empty topic filter set";
        error!("{}", message);
        return Err(GateError::new_packet_validation(PacketType::Unsubscribe, message));
    }

    for filter in &packet.topic_filters {
        if !is_valid_topic_filter(filter) {
            let message = format!("validate_unsubscribe_packet_outbound - invalid topic filter \"{}\"", filter);
            error!("{}", message);
            return Err(GateError::new_packet_validation(PacketType::Unsubscribe, message));
        }
    }

    Ok(())
}

impl fmt::Display for UnsubscribePacket {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "UnsubscribePacket {{")?;
        log_primitive_value!(self.packet_id, f, "packet_id");
        write!(f, " topic_filters: [")?;
        for (i, topic_filter) in self.topic_filters.iter().enumerate() {
            write!(f, " {}:\"{}\"", i, topic_filter)?;
        }
        write!(f, " ] }}")
    }
}

impl UnsubscribePacket {

    /// Creates an unsubscribe packet with a single topic filter
    pub fn new(packet_id: u16, topic_filter: &str) -> Self {
        let mut packet = UnsubscribePacket {
            packet_id,
            ..Default::default()
        };

        packet.add_topic_filter(topic_filter);
        packet
    }

    /// Packet id of the unsubscribe
    pub fn packet_id(&self) -> u16 { self.packet_id }
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::decode::decode_frame;
    use crate::decode::testing::*;
    use assert_matches::assert_matches;

    fn create_unsubscribe_packet() -> UnsubscribePacket {
        let mut packet = UnsubscribePacket::new(12, "hello/world");
        packet.add_topic_filter("sport/#");
        packet.add_topic_filter("a/+/c");
        packet
    }

    #[test]
    fn unsubscribe_round_trip_encode_decode_basic() {
        let packet = UnsubscribePacket::new(1, "room/1");

        assert!(do_round_trip_encode_decode_test(&MqttPacket::Unsubscribe(packet)));
    }

    #[test]
    fn unsubscribe_round_trip_encode_decode_multiple() {
        assert!(do_round_trip_encode_decode_test(&MqttPacket::Unsubscribe(create_unsubscribe_packet())));
    }

    #[test]
    fn unsubscribe_add_topic_filter_skips_duplicates() {
        let mut packet = create_unsubscribe_packet();
        packet.add_topic_filter("sport/#");

        assert_eq!(3, packet.topic_filters().len());
    }

    #[test]
    fn unsubscribe_decode_failure_bad_fixed_header() {
        do_fixed_header_flag_decode_failure_test(&MqttPacket::Unsubscribe(create_unsubscribe_packet()), 4);
    }

    #[test]
    fn unsubscribe_decode_failure_no_topic_filters() {
        let bytes = vec!(UNSUBSCRIBE_FIRST_BYTE, 2, 0, 7);
        assert_matches!(decode_frame(&bytes), Err(GateError::MalformedVariableHeader(_)));
    }

    #[test]
    fn unsubscribe_decode_failure_zero_packet_id() {
        let bytes = vec!(UNSUBSCRIBE_FIRST_BYTE, 5, 0, 0, 0, 1, b'a');
        assert_matches!(decode_frame(&bytes), Err(GateError::MalformedVariableHeader(_)));
    }

    #[test]
    fn unsubscribe_decode_failure_truncated_filter() {
        let truncate_filter = | bytes: &[u8] | -> Vec<u8> {
            let mut clone = bytes.to_vec();
            clone[5] += 1;
            clone
        };

        assert_matches!(do_mutated_decode_failure_test(&MqttPacket::Unsubscribe(UnsubscribePacket::new(1, "a/b")), truncate_filter), GateError::MalformedVariableHeader(_));
    }

    #[test]
    fn unsubscribe_validate_failure_packet_id_zero() {
        let packet = UnsubscribePacket::new(0, "a/b");
        assert_matches!(MqttPacket::Unsubscribe(packet).encode(), Err(GateError::PacketValidation(_)));
    }

    #[test]
    fn unsubscribe_validate_failure_empty() {
        let packet = UnsubscribePacket { packet_id: 2, ..Default::default() };
        assert_matches!(MqttPacket::Unsubscribe(packet).encode(), Err(GateError::PacketValidation(_)));
    }

    #[test]
    fn unsubscribe_validate_failure_invalid_topic_filter() {
        let packet = UnsubscribePacket::new(2, "a+/b");
        assert_matches!(MqttPacket::Unsubscribe(packet).encode(), Err(GateError::PacketValidation(_)));
    }
}
