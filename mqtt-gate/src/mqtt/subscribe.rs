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

const SUBSCRIPTION_OPTIONS_RESERVED_BITS_MASK : u8 = 252;

pub(crate) fn add_subscription(packet: &mut SubscribePacket, topic_filter: &str, qos: QualityOfService) {
    if let Some(existing) = packet.subscriptions.iter_mut().find(|subscription| subscription.topic_filter == topic_filter) {
        existing.qos = qos;
        return;
    }

    packet.subscriptions.push(Subscription::new(topic_filter, qos));
}

pub(crate) fn compute_subscribe_packet_length(packet: &SubscribePacket) -> GateResult<u32> {
    let mut total_remaining_length : usize = 2;

    total_remaining_length += packet.subscriptions.len() * 3;
    for subscription in &packet.subscriptions {
        total_remaining_length += subscription.topic_filter.len();
    }

    compute_variable_length_integer_encode_size(total_remaining_length)?;

    Ok(total_remaining_length as u32)
}

fn get_subscribe_packet_topic_filter(packet: &MqttPacket, index: usize) -> &str {
    if let MqttPacket::Subscribe(subscribe) = packet {
        if let Some(subscription) = subscribe.subscriptions.get(index) {
            return subscription.topic_filter.as_str();
        }
    }

    ""
}

#[rustfmt::skip]
pub(crate) fn write_subscribe_encoding_steps(packet: &SubscribePacket, steps: &mut VecDeque<EncodingStep>) -> GateResult<()> {
    let total_remaining_length = compute_subscribe_packet_length(packet)?;

    encode_integral_expression!(steps, Uint8, SUBSCRIBE_FIRST_BYTE);
    encode_integral_expression!(steps, Vli, total_remaining_length);

    encode_integral_expression!(steps, Uint16, packet.packet_id);

    for (i, subscription) in packet.subscriptions.iter().enumerate() {
        encode_indexed_string!(steps, get_subscribe_packet_topic_filter, subscription.topic_filter, i);
        encode_enum!(steps, Uint8, u8, subscription.qos);
    }

    Ok(())
}

pub(crate) fn decode_subscribe_packet(first_byte: u8, packet_body: &[u8]) -> GateResult<Box<MqttPacket>> {

    if first_byte != SUBSCRIBE_FIRST_BYTE {
        return reject_first_byte(PacketType::Subscribe, first_byte);
    }

    let mut packet = SubscribePacket { ..Default::default() };
    let mut mutable_body = packet_body;

    mutable_body = decode_u16(mutable_body, &mut packet.packet_id, PacketType::Subscribe)?;
    if packet.packet_id == 0 {
        let message = "decode_subscribe_packet - packet id is zero";
        error!("{}", message);
        return Err(GateError::new_malformed_variable_header(PacketType::Subscribe, message));
    }

    while !mutable_body.is_empty() {
        let mut topic_filter = String::new();
        mutable_body = decode_length_prefixed_string(mutable_body, &mut topic_filter, PacketType::Subscribe, "topic filter")?;

        let mut requested_qos: u8 = 0;
        mutable_body = decode_u8(mutable_body, &mut requested_qos, PacketType::Subscribe)?;

        if (requested_qos & SUBSCRIPTION_OPTIONS_RESERVED_BITS_MASK) != 0 {
            let message = "decode_subscribe_packet - reserved bits set in requested qos byte";
            error!("{}", message);
            return Err(GateError::new_malformed_variable_header(PacketType::Subscribe, message));
        }

        let qos = match convert_u8_to_quality_of_service(requested_qos) {
            Ok(qos) => { qos }
            Err(_) => {
                let message = "decode_subscribe_packet - invalid requested qos";
                error!("{}", message);
                return Err(GateError::new_malformed_variable_header(PacketType::Subscribe, message));
            }
        };

        packet.subscriptions.push(Subscription::new(&topic_filter, qos));
    }

    if packet.subscriptions.is_empty() {
        let message = "decode_subscribe_packet - subscribe packet contains no subscriptions";
        error!("{}", message);
        return Err(GateError::new_malformed_variable_header(PacketType::Subscribe, message));
    }

    Ok(Box::new(MqttPacket::Subscribe(packet)))
}

pub(crate) fn validate_subscribe_packet_outbound(packet: &SubscribePacket) -> GateResult<()> {

    validate_packet_id_non_zero(packet.packet_id, PacketType::Subscribe)?;

    if packet.subscriptions.is_empty() {
        let message = "validate_subscribe_packet_outbound - empty subscription set";
        error!("{}", message);
        return Err(GateError::new_packet_validation(PacketType::Subscribe, message));
    }

    for subscription in &packet.subscriptions {
        if !is_valid_topic_filter(&subscription.topic_filter) {
            let message = format!("validate_subscribe_packet_outbound - invalid topic filter \"{}\"", subscription.topic_filter);
            error!("{}", message);
            return Err(GateError::new_packet_validation(PacketType::Subscribe, message));
        }
    }

    Ok(())
}

impl fmt::Display for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{{")?;
        log_string!(self.topic_filter, f, "topic_filter");
        log_enum!(self.qos, f, "qos", QualityOfService);
        write!(f, " }}")
    }
}

impl fmt::Display for SubscribePacket {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "SubscribePacket {{")?;
        log_primitive_value!(self.packet_id, f, "packet_id");
        write!(f, " subscriptions: [")?;
        for (i, subscription) in self.subscriptions.iter().enumerate() {
            write!(f, " {}:{}", i, subscription)?;
        }
        write!(f, " ] }}")
    }
}

impl SubscribePacket {

    /// Creates a subscribe packet with a single subscription
    pub fn new(packet_id: u16, topic_filter: &str, qos: QualityOfService) -> Self {
        let mut packet = SubscribePacket {
            packet_id,
            ..Default::default()
        };

        packet.add_subscription(topic_filter, qos);
        packet
    }

    /// Packet id of the subscribe
    pub fn packet_id(&self) -> u16 { self.packet_id }
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::decode::decode_frame;
    use crate::decode::testing::*;
    use assert_matches::assert_matches;

    fn create_subscribe_packet() -> SubscribePacket {
        let mut packet = SubscribePacket::new(123, "hello/world", QualityOfService::AtLeastOnce);
        packet.add_subscription("sport/+/player", QualityOfService::AtMostOnce);
        packet.add_subscription("#", QualityOfService::ExactlyOnce);
        packet
    }

    #[test]
    fn subscribe_round_trip_encode_decode_basic() {
        let packet = SubscribePacket::new(1, "room/1", QualityOfService::AtLeastOnce);

        assert!(do_round_trip_encode_decode_test(&MqttPacket::Subscribe(packet)));
    }

    #[test]
    fn subscribe_round_trip_encode_decode_multiple() {
        assert!(do_round_trip_encode_decode_test(&MqttPacket::Subscribe(create_subscribe_packet())));
    }

    #[test]
    fn subscribe_add_subscription_updates_in_place() {
        let mut packet = create_subscribe_packet();
        packet.add_subscription("sport/+/player", QualityOfService::ExactlyOnce);

        assert_eq!(3, packet.subscriptions().len());
        assert_eq!("sport/+/player", packet.subscriptions()[1].topic_filter());
        assert_eq!(QualityOfService::ExactlyOnce, packet.subscriptions()[1].qos());
    }

    #[test]
    fn subscribe_decode_keeps_duplicate_filters() {
        let bytes = vec!(SUBSCRIBE_FIRST_BYTE, 10, 0, 5, 0, 1, b'a', 0, 0, 1, b'a', 2);
        let (packet, _) = decode_frame(&bytes).unwrap();
        assert_matches!(packet, MqttPacket::Subscribe(subscribe) => {
            assert_eq!(5, subscribe.packet_id());
            assert_eq!(vec!(Subscription::new("a", QualityOfService::AtMostOnce), Subscription::new("a", QualityOfService::ExactlyOnce)), subscribe.subscriptions().to_vec());
        });
    }

    #[test]
    fn subscribe_decode_failure_bad_fixed_header() {
        do_fixed_header_flag_decode_failure_test(&MqttPacket::Subscribe(create_subscribe_packet()), 1);
        do_fixed_header_flag_decode_failure_test(&MqttPacket::Subscribe(create_subscribe_packet()), 8);
    }

    const SUBSCRIBE_PACKET_TEST_QOS_INDEX : usize = 17;

    #[test]
    fn subscribe_decode_failure_subscription_qos3() {
        let invalidate_subscription_qos = | bytes: &[u8] | -> Vec<u8> {
            let mut clone = bytes.to_vec();
            clone[SUBSCRIBE_PACKET_TEST_QOS_INDEX] |= 0x03;
            clone
        };

        assert_matches!(do_mutated_decode_failure_test(&MqttPacket::Subscribe(create_subscribe_packet()), invalidate_subscription_qos), GateError::MalformedVariableHeader(_));
    }

    #[test]
    fn subscribe_decode_failure_subscription_reserved_bits() {
        let set_reserved_bits = | bytes: &[u8] | -> Vec<u8> {
            let mut clone = bytes.to_vec();
            clone[SUBSCRIBE_PACKET_TEST_QOS_INDEX] |= 0x10;
            clone
        };

        assert_matches!(do_mutated_decode_failure_test(&MqttPacket::Subscribe(create_subscribe_packet()), set_reserved_bits), GateError::MalformedVariableHeader(_));
    }

    #[test]
    fn subscribe_decode_failure_no_subscriptions() {
        let bytes = vec!(SUBSCRIBE_FIRST_BYTE, 2, 0, 5);
        assert_matches!(decode_frame(&bytes), Err(GateError::MalformedVariableHeader(_)));
    }

    #[test]
    fn subscribe_decode_failure_zero_packet_id() {
        let bytes = vec!(SUBSCRIBE_FIRST_BYTE, 6, 0, 0, 0, 1, b'a', 1);
        assert_matches!(decode_frame(&bytes), Err(GateError::MalformedVariableHeader(_)));
    }

    #[test]
    fn subscribe_decode_failure_truncated_subscription() {
        let bytes = vec!(SUBSCRIBE_FIRST_BYTE, 5, 0, 5, 0, 1, b'a');
        assert_matches!(decode_frame(&bytes), Err(GateError::MalformedVariableHeader(_)));
    }

    #[test]
    fn subscribe_validate_failure_packet_id_zero() {
        let packet = SubscribePacket::new(0, "a/b", QualityOfService::AtLeastOnce);
        assert_matches!(MqttPacket::Subscribe(packet).encode(), Err(GateError::PacketValidation(_)));
    }

    #[test]
    fn subscribe_validate_failure_empty() {
        let packet = SubscribePacket { packet_id: 3, ..Default::default() };
        assert_matches!(MqttPacket::Subscribe(packet).encode(), Err(GateError::PacketValidation(_)));
    }

    #[test]
    fn subscribe_validate_failure_invalid_topic_filter() {
        let packet = SubscribePacket::new(3, "a/#/b", QualityOfService::AtLeastOnce);
        assert_matches!(MqttPacket::Subscribe(packet).encode(), Err(GateError::PacketValidation(_)));
    }
}
