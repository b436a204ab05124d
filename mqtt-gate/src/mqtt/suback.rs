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

pub(crate) fn compute_suback_packet_length(packet: &SubackPacket) -> GateResult<u32> {
    let total_remaining_length : usize = 2 + packet.return_codes.len();

    compute_variable_length_integer_encode_size(total_remaining_length)?;

    Ok(total_remaining_length as u32)
}

#[rustfmt::skip]
pub(crate) fn write_suback_encoding_steps(packet: &SubackPacket, steps: &mut VecDeque<EncodingStep>) -> GateResult<()> {
    let total_remaining_length = compute_suback_packet_length(packet)?;

    encode_integral_expression!(steps, Uint8, SUBACK_FIRST_BYTE);
    encode_integral_expression!(steps, Vli, total_remaining_length);

    encode_integral_expression!(steps, Uint16, packet.packet_id);

    for return_code in &packet.return_codes {
        encode_enum!(steps, Uint8, u8, *return_code);
    }

    Ok(())
}

pub(crate) fn decode_suback_packet(first_byte: u8, packet_body: &[u8]) -> GateResult<Box<MqttPacket>> {

    if first_byte != SUBACK_FIRST_BYTE {
        return reject_first_byte(PacketType::Suback, first_byte);
    }

    let mut packet = SubackPacket { ..Default::default() };
    let mut mutable_body = decode_u16(packet_body, &mut packet.packet_id, PacketType::Suback)?;

    let return_code_count = mutable_body.len();
    packet.return_codes.reserve(return_code_count);

    for _ in 0..return_code_count {
        let mut return_code = SubackReturnCode::Failure;
        mutable_body = decode_u8_as_enum(mutable_body, &mut return_code, SubackReturnCode::try_from, PacketType::Suback)?;
        packet.return_codes.push(return_code);
    }

    if packet.return_codes.is_empty() {
        let message = "decode_suback_packet - suback packet contains no return codes";
        error!("{}", message);
        return Err(GateError::new_malformed_variable_header(PacketType::Suback, message));
    }

    Ok(Box::new(MqttPacket::Suback(packet)))
}

pub(crate) fn validate_suback_packet_outbound(packet: &SubackPacket) -> GateResult<()> {

    validate_packet_id_non_zero(packet.packet_id, PacketType::Suback)?;

    if packet.return_codes.is_empty() {
        let message = "validate_suback_packet_outbound - empty return code set";
        error!("{}", message);
        return Err(GateError::new_packet_validation(PacketType::Suback, message));
    }

    Ok(())
}

impl fmt::Display for SubackPacket {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "SubackPacket {{")?;
        log_primitive_value!(self.packet_id, f, "packet_id");
        write!(f, " return_codes: [")?;
        for (i, return_code) in self.return_codes.iter().enumerate() {
            write!(f, " {}:{}", i, return_code)?;
        }
        write!(f, " ] }}")
    }
}

impl SubackPacket {

    /// Creates a suback from the per-subscription results, in request order
    pub fn new(packet_id: u16, return_codes: Vec<SubackReturnCode>) -> Self {
        SubackPacket {
            packet_id,
            return_codes,
        }
    }

    /// Packet id of the subscribe this suback answers
    pub fn packet_id(&self) -> u16 { self.packet_id }
}
