/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

pub(crate) mod utils;

extern crate log;

use crate::error::{GateError, GateResult};
use crate::logging::*;
use crate::mqtt::*;
use crate::mqtt::header::*;
use crate::mqtt::utils::*;

use crate::mqtt::connack::*;
use crate::mqtt::connect::*;
use crate::mqtt::disconnect::*;
use crate::mqtt::pingreq::*;
use crate::mqtt::pingresp::*;
use crate::mqtt::puback::*;
use crate::mqtt::pubcomp::*;
use crate::mqtt::publish::*;
use crate::mqtt::pubrec::*;
use crate::mqtt::pubrel::*;
use crate::mqtt::suback::*;
use crate::mqtt::subscribe::*;
use crate::mqtt::unsuback::*;
use crate::mqtt::unsubscribe::*;

use log::*;
use tokio::io::{AsyncRead, AsyncReadExt};

const MAXIMUM_REMAINING_LENGTH_BYTES : usize = 4;

/// Decodes a packet body (variable header and payload) given the packet's type/flags byte.
pub(crate) fn decode_packet(first_byte: u8, packet_body: &[u8]) -> GateResult<Box<MqttPacket>> {
    let packet_type = first_byte >> 4;

    debug!("Decoding a packet of type {}", packet_type_to_str(packet_type));

    match packet_type {
        PACKET_TYPE_CONNECT => { decode_connect_packet(first_byte, packet_body) }
        PACKET_TYPE_CONNACK => { decode_connack_packet(first_byte, packet_body) }
        PACKET_TYPE_PUBLISH => { decode_publish_packet(first_byte, packet_body) }
        PACKET_TYPE_PUBACK => { decode_puback_packet(first_byte, packet_body) }
        PACKET_TYPE_PUBREC => { decode_pubrec_packet(first_byte, packet_body) }
        PACKET_TYPE_PUBREL => { decode_pubrel_packet(first_byte, packet_body) }
        PACKET_TYPE_PUBCOMP => { decode_pubcomp_packet(first_byte, packet_body) }
        PACKET_TYPE_SUBSCRIBE => { decode_subscribe_packet(first_byte, packet_body) }
        PACKET_TYPE_SUBACK => { decode_suback_packet(first_byte, packet_body) }
        PACKET_TYPE_UNSUBSCRIBE => { decode_unsubscribe_packet(first_byte, packet_body) }
        PACKET_TYPE_UNSUBACK => { decode_unsuback_packet(first_byte, packet_body) }
        PACKET_TYPE_PINGREQ => { decode_pingreq_packet(first_byte, packet_body) }
        PACKET_TYPE_PINGRESP => { decode_pingresp_packet(first_byte, packet_body) }
        PACKET_TYPE_DISCONNECT => { decode_disconnect_packet(first_byte, packet_body) }
        _ => {
            let message = format!("decode_packet - no decoder for packet type {}", packet_type);
            error!("{}", message);
            Err(GateError::new_malformed_header(message))
        }
    }
}

/// Decodes one complete packet from the front of `bytes`, returning the packet and the number of
/// bytes it occupied.  Bytes after the packet are left untouched.
pub fn decode_frame(bytes: &[u8]) -> GateResult<(MqttPacket, usize)> {
    let (header, header_length) = FixedHeader::decode(bytes)?;
    let frame_length = header_length + header.remaining_length() as usize;

    let packet = decode_packet(header.first_byte(), &bytes[header_length..frame_length])?;
    log_packet("Successfully decoded incoming packet: ", &packet);

    Ok((*packet, frame_length))
}

/// Reads exactly one packet from a byte stream and decodes it.
///
/// The remaining length is read one byte at a time so that no bytes belonging to the next packet
/// are consumed.  Short reads and transport errors surface as the converted I/O error.
pub async fn read_packet<R>(reader: &mut R) -> GateResult<MqttPacket> where R : AsyncRead + Unpin + ?Sized {
    let mut frame = Vec::with_capacity(MAXIMUM_REMAINING_LENGTH_BYTES + 1);
    frame.push(reader.read_u8().await?);

    loop {
        let byte = reader.read_u8().await?;
        frame.push(byte);

        if byte & 0x80 == 0 {
            break;
        }

        if frame.len() > MAXIMUM_REMAINING_LENGTH_BYTES {
            let message = "read_packet - remaining length exceeds four bytes";
            error!("{}", message);
            return Err(GateError::new_malformed_header(message));
        }
    }

    let remaining_length = match utils::decode_vli(&frame[1..])? {
        utils::DecodeVliResult::Value(value, _) => { value as usize }
        utils::DecodeVliResult::InsufficientData => {
            let message = "read_packet - truncated remaining length";
            error!("{}", message);
            return Err(GateError::new_malformed_header(message));
        }
    };

    // the body grows as bytes arrive rather than trusting the declared length up front
    let body_length = (&mut *reader).take(remaining_length as u64).read_to_end(&mut frame).await?;
    if body_length < remaining_length {
        let message = format!("read_packet - stream ended after {} of {} body bytes", body_length, remaining_length);
        info!("{}", message);
        return Err(GateError::new_transport_closed(message));
    }

    let (packet, _) = decode_frame(&frame)?;
    Ok(packet)
}
