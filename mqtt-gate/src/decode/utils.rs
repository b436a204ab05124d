/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

extern crate log;

use crate::error::{GateError, GateResult};
use crate::mqtt::PacketType;

use log::*;

#[derive(Eq, PartialEq, Debug)]
pub(crate) enum DecodeVliResult<'a> {
    InsufficientData,
    Value(u32, &'a[u8]), /* (decoded value, remaining bytes) */
}

pub(crate) fn decode_vli(buffer: &[u8]) -> GateResult<DecodeVliResult> {
    let mut value: u32 = 0;
    let mut needs_data: bool;
    let mut shift: u32 = 0;
    let data_len = buffer.len();

    for i in 0..4 {
        if i >= data_len {
            return Ok(DecodeVliResult::InsufficientData);
        }

        let byte = buffer[i];
        value |= ((byte & 0x7F) as u32) << shift;
        shift += 7;

        needs_data = (byte & 0x80) != 0;
        if !needs_data {
            return Ok(DecodeVliResult::Value(value, &buffer[(i + 1)..]));
        }
    }

    let message = "decode_vli - invalid variable length integer";
    error!("{}", message);
    Err(GateError::new_malformed_header(message))
}

fn split_length_prefix<'a>(bytes: &'a[u8], packet_type: PacketType, field_name: &str) -> GateResult<(&'a[u8], &'a[u8])> {
    if bytes.len() < 2 {
        let message = format!("{} Decode - {} does not have a full length prefix", packet_type, field_name);
        error!("{}", message);
        return Err(GateError::new_malformed_variable_header(packet_type, message));
    }

    let value_length : usize = u16::from_be_bytes([bytes[0], bytes[1]]) as usize;
    let mutable_bytes = &bytes[2..];
    if value_length > mutable_bytes.len() {
        let message = format!("{} Decode - {} has length larger than remaining packet bytes", packet_type, field_name);
        error!("{}", message);
        return Err(GateError::new_malformed_variable_header(packet_type, message));
    }

    Ok(mutable_bytes.split_at(value_length))
}

pub(crate) fn decode_length_prefixed_string<'a>(bytes: &'a[u8], value: &mut String, packet_type: PacketType, field_name: &str) -> GateResult<&'a[u8]> {
    let (value_bytes, remaining_bytes) = split_length_prefix(bytes, packet_type, field_name)?;

    match std::str::from_utf8(value_bytes) {
        Ok(decoded) => {
            *value = decoded.to_string();
            Ok(remaining_bytes)
        }
        Err(_) => {
            let message = format!("{} Decode - {} is not valid utf-8", packet_type, field_name);
            error!("{}", message);
            Err(GateError::new_malformed_variable_header(packet_type, message))
        }
    }
}

/// Decodes a length-prefixed string without rejecting invalid utf-8; invalid sequences are
/// replaced with U+FFFD.
pub(crate) fn decode_length_prefixed_lossy_string<'a>(bytes: &'a[u8], value: &mut String, packet_type: PacketType, field_name: &str) -> GateResult<&'a[u8]> {
    let (value_bytes, remaining_bytes) = split_length_prefix(bytes, packet_type, field_name)?;

    *value = String::from_utf8_lossy(value_bytes).into_owned();
    Ok(remaining_bytes)
}

pub(crate) fn decode_length_prefixed_bytes<'a>(bytes: &'a[u8], value: &mut Vec<u8>, packet_type: PacketType, field_name: &str) -> GateResult<&'a[u8]> {
    let (value_bytes, remaining_bytes) = split_length_prefix(bytes, packet_type, field_name)?;

    *value = value_bytes.to_vec();
    Ok(remaining_bytes)
}

pub(crate) fn decode_u8<'a>(bytes: &'a[u8], value: &mut u8, packet_type: PacketType) -> GateResult<&'a[u8]> {
    if bytes.is_empty() {
        let message = format!("{} Decode - insufficient packet bytes for u8 field", packet_type);
        error!("{}", message);
        return Err(GateError::new_malformed_variable_header(packet_type, message));
    }

    *value = bytes[0];

    Ok(&bytes[1..])
}

pub(crate) fn decode_u8_as_enum<'a, T>(bytes: &'a[u8], value: &mut T, converter: fn(u8) -> GateResult<T>, packet_type: PacketType) -> GateResult<&'a[u8]> {
    let mut raw_value = 0;
    let remaining_bytes = decode_u8(bytes, &mut raw_value, packet_type)?;

    match converter(raw_value) {
        Ok(converted) => {
            *value = converted;
            Ok(remaining_bytes)
        }
        Err(_) => {
            let message = format!("{} Decode - invalid enum value {}", packet_type, raw_value);
            error!("{}", message);
            Err(GateError::new_malformed_variable_header(packet_type, message))
        }
    }
}

pub(crate) fn decode_u16<'a>(bytes: &'a[u8], value: &mut u16, packet_type: PacketType) -> GateResult<&'a[u8]> {
    if bytes.len() < 2 {
        let message = format!("{} Decode - insufficient packet bytes for u16 field", packet_type);
        error!("{}", message);
        return Err(GateError::new_malformed_variable_header(packet_type, message));
    }

    *value = u16::from_be_bytes([bytes[0], bytes[1]]);

    Ok(&bytes[2..])
}

pub(crate) fn reject_first_byte<T>(packet_type: PacketType, first_byte: u8) -> GateResult<T> {
    let message = format!("{} Decode - invalid first byte {}", packet_type, first_byte);
    error!("{}", message);
    Err(GateError::new_malformed_header(message))
}

pub(crate) fn reject_trailing_bytes<T>(packet_type: PacketType, remaining: usize) -> GateResult<T> {
    let message = format!("{} Decode - {} unexpected trailing bytes", packet_type, remaining);
    error!("{}", message);
    Err(GateError::new_malformed_variable_header(packet_type, message))
}

macro_rules! define_ack_packet_decode_function {
    ($function_name: ident, $mqtt_packet_type:ident, $packet_type: ident, $first_byte: expr) => {
        pub(crate) fn $function_name(first_byte: u8, packet_body: &[u8]) -> GateResult<Box<MqttPacket>> {
            if first_byte != $first_byte {
                return reject_first_byte(PacketType::$mqtt_packet_type, first_byte);
            }

            let mut packet = $packet_type { ..Default::default() };

            let mutable_body = decode_u16(packet_body, &mut packet.packet_id, PacketType::$mqtt_packet_type)?;
            if !mutable_body.is_empty() {
                return reject_trailing_bytes(PacketType::$mqtt_packet_type, mutable_body.len());
            }

            Ok(Box::new(MqttPacket::$mqtt_packet_type(packet)))
        }
    };
}

pub(crate) use define_ack_packet_decode_function;

macro_rules! define_empty_packet_decode_function {
    ($function_name: ident, $mqtt_packet_type:ident, $packet_type: ident, $first_byte: expr) => {
        pub(crate) fn $function_name(first_byte: u8, packet_body: &[u8]) -> GateResult<Box<MqttPacket>> {
            if first_byte != $first_byte {
                return reject_first_byte(PacketType::$mqtt_packet_type, first_byte);
            }

            if !packet_body.is_empty() {
                return reject_trailing_bytes(PacketType::$mqtt_packet_type, packet_body.len());
            }

            Ok(Box::new(MqttPacket::$mqtt_packet_type($packet_type {})))
        }
    };
}

pub(crate) use define_empty_packet_decode_function;
