/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

///
/// Internal utilities to encode MQTT 3.1.1 packets
use crate::error::{GateError, GateResult};
use crate::mqtt::*;

use log::*;

pub(crate) enum EncodingStep {
    Uint8(u8),
    Uint16(u16),
    Vli(u32),
    StringSlice(fn(&MqttPacket) -> &str),
    BytesSlice(fn(&MqttPacket) -> &[u8]),
    IndexedString(fn(&MqttPacket, usize) -> &str, usize),
}

macro_rules! encode_integral_expression {
    ($target: ident, $enum_variant: ident, $value: expr) => {
        $target.push_back(EncodingStep::$enum_variant($value));
    };
}

pub(crate) use encode_integral_expression;

macro_rules! encode_length_prefixed_string {
    ($target: ident, $getter: ident, $value: expr) => {
        $target.push_back(EncodingStep::Uint16($value.len() as u16));
        $target.push_back(EncodingStep::StringSlice(
            $getter as fn(&MqttPacket) -> &str,
        ));
    };
}

pub(crate) use encode_length_prefixed_string;

macro_rules! encode_optional_length_prefixed_string {
    ($target: ident, $getter: ident, $optional_value: expr) => {
        if let Some(val) = &$optional_value {
            $target.push_back(EncodingStep::Uint16(val.len() as u16));
            $target.push_back(EncodingStep::StringSlice(
                $getter as fn(&MqttPacket) -> &str,
            ));
        }
    };
}

pub(crate) use encode_optional_length_prefixed_string;

macro_rules! encode_raw_bytes {
    ($target: ident, $getter: ident) => {
        $target.push_back(EncodingStep::BytesSlice(
            $getter as fn(&MqttPacket) -> &[u8],
        ));
    };
}

pub(crate) use encode_raw_bytes;

macro_rules! encode_length_prefixed_bytes {
    ($target: ident, $getter: ident, $value: expr) => {
        $target.push_back(EncodingStep::Uint16($value.len() as u16));
        $target.push_back(EncodingStep::BytesSlice(
            $getter as fn(&MqttPacket) -> &[u8],
        ));
    };
}

pub(crate) use encode_length_prefixed_bytes;

macro_rules! encode_optional_length_prefixed_bytes {
    ($target: ident, $getter: ident, $optional_value: expr) => {
        if let Some(val) = &$optional_value {
            $target.push_back(EncodingStep::Uint16(val.len() as u16));
            $target.push_back(EncodingStep::BytesSlice(
                $getter as fn(&MqttPacket) -> &[u8],
            ));
        }
    };
}

pub(crate) use encode_optional_length_prefixed_bytes;

macro_rules! encode_indexed_string {
    ($target: ident, $indexed_string_getter: ident, $value: expr, $index: expr) => {{
        $target.push_back(EncodingStep::Uint16($value.len() as u16));
        $target.push_back(EncodingStep::IndexedString(
            $indexed_string_getter as fn(&MqttPacket, usize) -> &str,
            $index,
        ));
    }};
}

pub(crate) use encode_indexed_string;

macro_rules! encode_enum {
    ($target: ident, $enum_variant: ident, $int_type: ty, $value: expr) => {
        $target.push_back(EncodingStep::$enum_variant($value as $int_type));
    };
}

pub(crate) use encode_enum;

/*****************************************************/

macro_rules! define_ack_packet_encoding_impl {
    ($function_name: ident, $packet_type: ident, $first_byte: expr) => {
        pub(crate) fn $function_name(packet: &$packet_type, steps: &mut VecDeque<EncodingStep>) -> GateResult<()> {
            encode_integral_expression!(steps, Uint8, $first_byte);
            encode_integral_expression!(steps, Vli, 2);
            encode_integral_expression!(steps, Uint16, packet.packet_id);

            Ok(())
        }
    };
}

pub(crate) use define_ack_packet_encoding_impl;

macro_rules! define_empty_packet_encoding_impl {
    ($function_name: ident, $packet_type: ident, $first_byte: expr) => {
        pub(crate) fn $function_name(_: &$packet_type, steps: &mut VecDeque<EncodingStep>) -> GateResult<()> {
            encode_integral_expression!(steps, Uint8, $first_byte);
            encode_integral_expression!(steps, Vli, 0);

            Ok(())
        }
    };
}

pub(crate) use define_empty_packet_encoding_impl;

/*****************************************************/

pub static MAXIMUM_VARIABLE_LENGTH_INTEGER: usize = (1 << 28) - 1;

pub fn compute_variable_length_integer_encode_size(value: usize) -> GateResult<usize> {
    if value < 1usize << 7 {
        Ok(1)
    } else if value < 1usize << 14 {
        Ok(2)
    } else if value < 1usize << 21 {
        Ok(3)
    } else if value < 1usize << 28 {
        Ok(4)
    } else {
        let message = format!("compute_variable_length_integer_encode_size - value {} exceeds maximum", value);
        error!("{}", message);
        Err(GateError::new_encoding_failure(message))
    }
}

pub(crate) fn encode_vli(value: u32, dest: &mut Vec<u8>) -> GateResult<()> {
    if value > MAXIMUM_VARIABLE_LENGTH_INTEGER as u32 {
        let message = format!("encode_vli - value {} exceeds maximum", value);
        error!("{}", message);
        return Err(GateError::new_encoding_failure(message));
    }

    let mut done = false;
    let mut val = value;
    while !done {
        let mut byte: u8 = (val & 0x7F) as u8;
        val /= 128;

        if val != 0 {
            byte |= 128;
        }

        dest.push(byte);

        done = val == 0;
    }

    Ok(())
}

pub(crate) fn process_encoding_step(
    step: EncodingStep,
    packet: &MqttPacket,
    dest: &mut Vec<u8>,
) -> GateResult<()> {
    match step {
        EncodingStep::Uint8(val) => {
            dest.push(val);
        }
        EncodingStep::Uint16(val) => {
            dest.extend_from_slice(&val.to_be_bytes());
        }
        EncodingStep::Vli(val) => {
            return encode_vli(val, dest);
        }
        EncodingStep::StringSlice(getter) => {
            dest.extend_from_slice(getter(packet).as_bytes());
        }
        EncodingStep::BytesSlice(getter) => {
            dest.extend_from_slice(getter(packet));
        }
        EncodingStep::IndexedString(getter, index) => {
            dest.extend_from_slice(getter(packet, index).as_bytes());
        }
    }

    Ok(())
}
