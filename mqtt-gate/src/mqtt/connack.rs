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

use log::*;
use std::collections::VecDeque;
use std::fmt;

pub(crate) fn write_connack_encoding_steps(packet: &ConnackPacket, steps: &mut VecDeque<EncodingStep>) -> GateResult<()> {
    encode_integral_expression!(steps, Uint8, CONNACK_FIRST_BYTE);
    encode_integral_expression!(steps, Vli, 2);
    encode_integral_expression!(steps, Uint8, if packet.session_present { 1 } else { 0 });
    encode_enum!(steps, Uint8, u8, packet.return_code);

    Ok(())
}

pub(crate) fn decode_connack_packet(first_byte: u8, packet_body: &[u8]) -> GateResult<Box<MqttPacket>> {

    if first_byte != CONNACK_FIRST_BYTE {
        return reject_first_byte(PacketType::Connack, first_byte);
    }

    if packet_body.len() != 2 {
        let message = "decode_connack_packet - connack packet invalid length";
        error!("{}", message);
        return Err(GateError::new_malformed_variable_header(PacketType::Connack, message));
    }

    let mut packet = ConnackPacket { ..Default::default() };

    let mut flags: u8 = 0;
    let mut mutable_body = decode_u8(packet_body, &mut flags, PacketType::Connack)?;

    if flags & CONNACK_ACKNOWLEDGE_FLAGS_RESERVED_MASK != 0 {
        let message = "decode_connack_packet - reserved bits set in flags field";
        error!("{}", message);
        return Err(GateError::new_malformed_variable_header(PacketType::Connack, message));
    }

    packet.session_present = flags == 1;

    mutable_body = decode_u8_as_enum(mutable_body, &mut packet.return_code, ConnectReturnCode::try_from, PacketType::Connack)?;
    if !mutable_body.is_empty() {
        return reject_trailing_bytes(PacketType::Connack, mutable_body.len());
    }

    Ok(Box::new(MqttPacket::Connack(packet)))
}

impl fmt::Display for ConnackPacket {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ConnackPacket {{")?;
        log_primitive_value!(self.session_present, f, "session_present");
        log_enum!(self.return_code, f, "return_code", ConnectReturnCode);
        write!(f, " }}")
    }
}
