/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

/*!
The fixed header shared by every MQTT control packet: one type/flags byte followed by the
remaining length, encoded as a 1-4 byte variable length integer.
 */

use crate::decode::utils::*;
use crate::encode::utils::*;
use crate::error::{GateError, GateResult};
use crate::mqtt::*;
use crate::mqtt::utils::*;

use log::*;

/// Decoded form of an MQTT fixed header.
///
/// Construction does not validate the type nibble or flags; `decode` does.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct FixedHeader {
    first_byte: u8,
    remaining_length: u32,
}

/// Fixed flag nibble required for every packet type other than Publish
pub fn default_flags(packet_type: PacketType) -> u8 {
    match packet_type {
        PacketType::Pubrel | PacketType::Subscribe | PacketType::Unsubscribe => { 2 }
        _ => { 0 }
    }
}

/// Number of bytes a fixed header with the given remaining length occupies, type byte included.
pub fn compute_fixed_header_length(remaining_length: u32) -> GateResult<usize> {
    Ok(1 + compute_variable_length_integer_encode_size(remaining_length as usize)?)
}

impl FixedHeader {

    /// Creates a header for a packet type, using that type's default flags
    pub fn new(packet_type: PacketType, remaining_length: u32) -> Self {
        FixedHeader {
            first_byte: ((packet_type as u8) << 4) | default_flags(packet_type),
            remaining_length,
        }
    }

    /// Creates a header from a raw type/flags byte
    pub fn from_first_byte(first_byte: u8, remaining_length: u32) -> Self {
        FixedHeader {
            first_byte,
            remaining_length,
        }
    }

    /// The raw type/flags byte
    pub fn first_byte(&self) -> u8 { self.first_byte }

    /// The packet type nibble, unvalidated
    pub fn type_nibble(&self) -> u8 { self.first_byte >> 4 }

    /// The packet type, if the type nibble names one
    pub fn packet_type(&self) -> Option<PacketType> {
        PacketType::try_from(self.type_nibble()).ok()
    }

    /// The flags nibble
    pub fn flags(&self) -> u8 { self.first_byte & 0x0F }

    pub fn remaining_length(&self) -> u32 { self.remaining_length }

    /// Sets the remaining length.  Fails for values outside 0..=268,435,455.
    pub fn set_remaining_length(&mut self, remaining_length: i64) -> GateResult<()> {
        if remaining_length < 0 || remaining_length > MAXIMUM_VARIABLE_LENGTH_INTEGER as i64 {
            let message = format!("FixedHeader::set_remaining_length - value {} out of range", remaining_length);
            error!("{}", message);
            return Err(GateError::new_encoding_failure(message));
        }

        self.remaining_length = remaining_length as u32;
        Ok(())
    }

    /// Number of bytes this header occupies on the wire
    pub fn wire_length(&self) -> usize {
        match self.remaining_length {
            0..=127 => { 2 }
            128..=16383 => { 3 }
            16384..=2097151 => { 4 }
            _ => { 5 }
        }
    }

    /// Appends the encoded header to `dest`
    pub fn encode(&self, dest: &mut Vec<u8>) -> GateResult<()> {
        dest.push(self.first_byte);
        encode_vli(self.remaining_length, dest)
    }

    /// Decodes a fixed header from the front of `bytes`, returning the header and the number of
    /// header bytes consumed.  Fails if the type or flags are invalid, if the remaining length is
    /// malformed, or if fewer than remaining-length bytes follow the header.
    pub fn decode(bytes: &[u8]) -> GateResult<(FixedHeader, usize)> {
        if bytes.is_empty() {
            let message = "FixedHeader::decode - empty buffer";
            error!("{}", message);
            return Err(GateError::new_malformed_header(message));
        }

        let first_byte = bytes[0];
        validate_first_byte(first_byte)?;

        match decode_vli(&bytes[1..]) {
            Ok(DecodeVliResult::Value(remaining_length, remaining_bytes)) => {
                if remaining_length as usize > remaining_bytes.len() {
                    let message = format!("FixedHeader::decode - remaining length {} exceeds available bytes {}", remaining_length, remaining_bytes.len());
                    error!("{}", message);
                    return Err(GateError::new_malformed_header(message));
                }

                let consumed = bytes.len() - remaining_bytes.len();
                Ok((FixedHeader::from_first_byte(first_byte, remaining_length), consumed))
            }
            Ok(DecodeVliResult::InsufficientData) => {
                let message = "FixedHeader::decode - truncated remaining length";
                error!("{}", message);
                Err(GateError::new_malformed_header(message))
            }
            Err(error) => { Err(error) }
        }
    }
}

/// Checks a type/flags byte against the packet type table.
pub(crate) fn validate_first_byte(first_byte: u8) -> GateResult<PacketType> {
    let packet_type = match PacketType::try_from(first_byte >> 4) {
        Ok(packet_type) => { packet_type }
        Err(_) => {
            let message = format!("validate_first_byte - invalid packet type {}", first_byte >> 4);
            error!("{}", message);
            return Err(GateError::new_malformed_header(message));
        }
    };

    let flags = first_byte & 0x0F;
    if packet_type == PacketType::Publish {
        if (flags >> 1) & QOS_MASK == QOS_MASK {
            let message = "validate_first_byte - publish qos 3 is invalid";
            error!("{}", message);
            return Err(GateError::new_malformed_header(message));
        }
    } else if flags != default_flags(packet_type) {
        let message = format!("validate_first_byte - invalid flags {} for {}", flags, packet_type);
        error!("{}", message);
        return Err(GateError::new_malformed_header(message));
    }

    Ok(packet_type)
}
