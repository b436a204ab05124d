/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

/*!
Module containing miscellaneous constants and conversion functions defined by the MQTT 3.1.1 standard.
 */

use crate::error::{GateError, GateResult};
use crate::mqtt::*;

use log::*;

pub(crate) const PACKET_TYPE_CONNECT: u8 = 1;
pub(crate) const PACKET_TYPE_CONNACK: u8 = 2;
pub(crate) const PACKET_TYPE_PUBLISH: u8 = 3;
pub(crate) const PACKET_TYPE_PUBACK: u8 = 4;
pub(crate) const PACKET_TYPE_PUBREC: u8 = 5;
pub(crate) const PACKET_TYPE_PUBREL: u8 = 6;
pub(crate) const PACKET_TYPE_PUBCOMP: u8 = 7;
pub(crate) const PACKET_TYPE_SUBSCRIBE: u8 = 8;
pub(crate) const PACKET_TYPE_SUBACK: u8 = 9;
pub(crate) const PACKET_TYPE_UNSUBSCRIBE: u8 = 10;
pub(crate) const PACKET_TYPE_UNSUBACK: u8 = 11;
pub(crate) const PACKET_TYPE_PINGREQ: u8 = 12;
pub(crate) const PACKET_TYPE_PINGRESP: u8 = 13;
pub(crate) const PACKET_TYPE_DISCONNECT: u8 = 14;

pub(crate) const PUBLISH_PACKET_FIXED_HEADER_DUPLICATE_FLAG : u8 = 8;
pub(crate) const PUBLISH_PACKET_FIXED_HEADER_RETAIN_FLAG : u8 = 1;
pub(crate) const QOS_MASK : u8 = 3;

pub(crate) const CONNECT_PACKET_RESERVED_FLAG_MASK : u8 = 1;
pub(crate) const CONNECT_PACKET_CLEAN_SESSION_FLAG_MASK : u8 = 1 << 1;
pub(crate) const CONNECT_PACKET_HAS_WILL_FLAG_MASK : u8 = 1 << 2;
pub(crate) const CONNECT_PACKET_WILL_QOS_FLAG_SHIFT : u8 = 3;
pub(crate) const CONNECT_PACKET_WILL_RETAIN_FLAG_MASK : u8 = 1 << 5;
pub(crate) const CONNECT_PACKET_HAS_PASSWORD_FLAG_MASK : u8 = 1 << 6;
pub(crate) const CONNECT_PACKET_HAS_USERNAME_FLAG_MASK : u8 = 1 << 7;

pub(crate) const CONNACK_ACKNOWLEDGE_FLAGS_RESERVED_MASK : u8 = 254;

pub(crate) const CONNECT_FIRST_BYTE : u8 = PACKET_TYPE_CONNECT << 4;
pub(crate) const CONNACK_FIRST_BYTE : u8 = PACKET_TYPE_CONNACK << 4;
pub(crate) const UNSUBSCRIBE_FIRST_BYTE : u8 = (PACKET_TYPE_UNSUBSCRIBE << 4) | (0x02u8);
pub(crate) const UNSUBACK_FIRST_BYTE : u8 = PACKET_TYPE_UNSUBACK << 4;
pub(crate) const SUBSCRIBE_FIRST_BYTE : u8 = (PACKET_TYPE_SUBSCRIBE << 4) | (0x02u8);
pub(crate) const SUBACK_FIRST_BYTE : u8 = PACKET_TYPE_SUBACK << 4;
pub(crate) const PUBREL_FIRST_BYTE : u8 = (PACKET_TYPE_PUBREL << 4) | (0x02u8);
pub(crate) const PUBACK_FIRST_BYTE : u8 = PACKET_TYPE_PUBACK << 4;
pub(crate) const PUBREC_FIRST_BYTE : u8 = PACKET_TYPE_PUBREC << 4;
pub(crate) const PUBCOMP_FIRST_BYTE : u8 = PACKET_TYPE_PUBCOMP << 4;
pub(crate) const PINGREQ_FIRST_BYTE : u8 = PACKET_TYPE_PINGREQ << 4;
pub(crate) const PINGRESP_FIRST_BYTE : u8 = PACKET_TYPE_PINGRESP << 4;
pub(crate) const DISCONNECT_FIRST_BYTE : u8 = PACKET_TYPE_DISCONNECT << 4;

pub(crate) fn convert_u8_to_quality_of_service(value: u8) -> GateResult<QualityOfService> {
    match value {
        0 => { Ok(QualityOfService::AtMostOnce) }
        1 => { Ok(QualityOfService::AtLeastOnce) }
        2 => { Ok(QualityOfService::ExactlyOnce) }
        _ => { log_and_reject_value("convert_u8_to_quality_of_service", value, "qos") }
    }
}

pub(crate) fn convert_u8_to_connect_return_code(value: u8) -> GateResult<ConnectReturnCode> {
    match value {
        0 => { Ok(ConnectReturnCode::Accepted) }
        1 => { Ok(ConnectReturnCode::UnacceptableProtocolVersion) }
        2 => { Ok(ConnectReturnCode::IdentifierRejected) }
        3 => { Ok(ConnectReturnCode::ServerUnavailable) }
        4 => { Ok(ConnectReturnCode::BadUsernameOrPassword) }
        5 => { Ok(ConnectReturnCode::NotAuthorized) }
        _ => { log_and_reject_value("convert_u8_to_connect_return_code", value, "connect return code") }
    }
}

pub(crate) fn convert_u8_to_suback_return_code(value: u8) -> GateResult<SubackReturnCode> {
    match value {
        0 => { Ok(SubackReturnCode::GrantedQos0) }
        1 => { Ok(SubackReturnCode::GrantedQos1) }
        2 => { Ok(SubackReturnCode::GrantedQos2) }
        0x80 => { Ok(SubackReturnCode::Failure) }
        _ => { log_and_reject_value("convert_u8_to_suback_return_code", value, "suback return code") }
    }
}

pub(crate) fn convert_u8_to_packet_type(value: u8) -> GateResult<PacketType> {
    match value {
        PACKET_TYPE_CONNECT => { Ok(PacketType::Connect) }
        PACKET_TYPE_CONNACK => { Ok(PacketType::Connack) }
        PACKET_TYPE_PUBLISH => { Ok(PacketType::Publish) }
        PACKET_TYPE_PUBACK => { Ok(PacketType::Puback) }
        PACKET_TYPE_PUBREC => { Ok(PacketType::Pubrec) }
        PACKET_TYPE_PUBREL => { Ok(PacketType::Pubrel) }
        PACKET_TYPE_PUBCOMP => { Ok(PacketType::Pubcomp) }
        PACKET_TYPE_SUBSCRIBE => { Ok(PacketType::Subscribe) }
        PACKET_TYPE_SUBACK => { Ok(PacketType::Suback) }
        PACKET_TYPE_UNSUBSCRIBE => { Ok(PacketType::Unsubscribe) }
        PACKET_TYPE_UNSUBACK => { Ok(PacketType::Unsuback) }
        PACKET_TYPE_PINGREQ => { Ok(PacketType::Pingreq) }
        PACKET_TYPE_PINGRESP => { Ok(PacketType::Pingresp) }
        PACKET_TYPE_DISCONNECT => { Ok(PacketType::Disconnect) }
        _ => { log_and_reject_value("convert_u8_to_packet_type", value, "packet type") }
    }
}

pub(crate) fn convert_u8_to_protocol_version(protocol_name: &str, value: u8) -> GateResult<ProtocolVersion> {
    match (value, protocol_name) {
        (3, "MQIsdp") => { Ok(ProtocolVersion::Mqtt31) }
        (4, "MQTT") => { Ok(ProtocolVersion::Mqtt311) }
        _ => {
            error!("convert_u8_to_protocol_version - unsupported protocol ({}, {})", protocol_name, value);
            Err(GateError::new_unsupported_protocol_version(value))
        }
    }
}

pub(crate) fn mqtt_packet_to_packet_type(packet: &MqttPacket) -> PacketType {
    match packet {
        MqttPacket::Connect(_) => { PacketType::Connect }
        MqttPacket::Connack(_) => { PacketType::Connack }
        MqttPacket::Publish(_) => { PacketType::Publish}
        MqttPacket::Puback(_) => { PacketType::Puback }
        MqttPacket::Pubrec(_) => { PacketType::Pubrec }
        MqttPacket::Pubrel(_) => { PacketType::Pubrel }
        MqttPacket::Pubcomp(_) => { PacketType::Pubcomp }
        MqttPacket::Subscribe(_) => { PacketType::Subscribe }
        MqttPacket::Suback(_) => { PacketType::Suback }
        MqttPacket::Unsubscribe(_) => { PacketType::Unsubscribe }
        MqttPacket::Unsuback(_) => { PacketType::Unsuback }
        MqttPacket::Pingreq(_) => { PacketType::Pingreq }
        MqttPacket::Pingresp(_) => { PacketType::Pingresp }
        MqttPacket::Disconnect(_) => { PacketType::Disconnect }
    }
}

pub(crate) fn packet_type_to_str(packet_type: u8) -> &'static str {
    match packet_type {
        PACKET_TYPE_CONNECT => { "Connect" }
        PACKET_TYPE_CONNACK => { "Connack" }
        PACKET_TYPE_PUBLISH => { "Publish" }
        PACKET_TYPE_PUBACK => { "Puback" }
        PACKET_TYPE_PUBREC => { "Pubrec" }
        PACKET_TYPE_PUBREL => { "Pubrel" }
        PACKET_TYPE_PUBCOMP => { "Pubcomp" }
        PACKET_TYPE_SUBSCRIBE => { "Subscribe" }
        PACKET_TYPE_SUBACK => { "Suback" }
        PACKET_TYPE_UNSUBSCRIBE => { "Unsubscribe" }
        PACKET_TYPE_UNSUBACK => { "Unsuback" }
        PACKET_TYPE_PINGREQ => { "Pingreq" }
        PACKET_TYPE_PINGRESP => { "Pingresp" }
        PACKET_TYPE_DISCONNECT => { "Disconnect" }
        _ => {
            "Unknown"
        }
    }
}

pub(crate) fn mqtt_packet_to_str(packet: &MqttPacket) -> &'static str {
    match packet {
        MqttPacket::Connect(_) => { "CONNECT" }
        MqttPacket::Connack(_) => { "CONNACK" }
        MqttPacket::Publish(_) => { "PUBLISH" }
        MqttPacket::Puback(_) => { "PUBACK" }
        MqttPacket::Pubrec(_) => { "PUBREC" }
        MqttPacket::Pubrel(_) => { "PUBREL" }
        MqttPacket::Pubcomp(_) => { "PUBCOMP" }
        MqttPacket::Subscribe(_) => { "SUBSCRIBE" }
        MqttPacket::Suback(_) => { "SUBACK" }
        MqttPacket::Unsubscribe(_) => { "UNSUBSCRIBE" }
        MqttPacket::Unsuback(_) => { "UNSUBACK" }
        MqttPacket::Pingreq(_) => { "PINGREQ" }
        MqttPacket::Pingresp(_) => { "PINGRESP" }
        MqttPacket::Disconnect(_) => { "DISCONNECT" }
    }
}

pub(crate) fn packet_type_to_description(packet_type: PacketType) -> &'static str {
    match packet_type {
        PacketType::Connect => { "Client request to connect to Server" }
        PacketType::Connack => { "Connect acknowledgment" }
        PacketType::Publish => { "Publish message" }
        PacketType::Puback => { "Publish acknowledgment" }
        PacketType::Pubrec => { "Publish received (assured delivery part 1)" }
        PacketType::Pubrel => { "Publish release (assured delivery part 2)" }
        PacketType::Pubcomp => { "Publish complete (assured delivery part 3)" }
        PacketType::Subscribe => { "Client subscribe request" }
        PacketType::Suback => { "Subscribe acknowledgment" }
        PacketType::Unsubscribe => { "Unsubscribe request" }
        PacketType::Unsuback => { "Unsubscribe acknowledgment" }
        PacketType::Pingreq => { "PING request" }
        PacketType::Pingresp => { "PING response" }
        PacketType::Disconnect => { "Client is disconnecting" }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn protocol_version_pairs() {
        assert_eq!(ProtocolVersion::Mqtt31, convert_u8_to_protocol_version("MQIsdp", 3).unwrap());
        assert_eq!(ProtocolVersion::Mqtt311, convert_u8_to_protocol_version("MQTT", 4).unwrap());
        assert_matches!(convert_u8_to_protocol_version("MQTT", 3), Err(GateError::UnsupportedProtocolVersion(_)));
        assert_matches!(convert_u8_to_protocol_version("MQIsdp", 4), Err(GateError::UnsupportedProtocolVersion(_)));
        assert_matches!(convert_u8_to_protocol_version("MQTT", 5), Err(GateError::UnsupportedProtocolVersion(_)));
    }

    #[test]
    fn packet_type_conversion() {
        for value in 1..15u8 {
            let packet_type = convert_u8_to_packet_type(value).unwrap();
            assert_eq!(value, packet_type as u8);
        }

        assert!(convert_u8_to_packet_type(0).is_err());
        assert!(convert_u8_to_packet_type(15).is_err());
    }

    #[test]
    fn suback_return_code_conversion() {
        assert_eq!(SubackReturnCode::Failure, convert_u8_to_suback_return_code(0x80).unwrap());
        assert!(convert_u8_to_suback_return_code(3).is_err());
        assert!(convert_u8_to_suback_return_code(0x81).is_err());
    }

    #[test]
    fn connect_return_code_conversion() {
        assert_eq!(ConnectReturnCode::NotAuthorized, convert_u8_to_connect_return_code(5).unwrap());
        assert!(convert_u8_to_connect_return_code(6).is_err());
    }
}
