/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

pub(crate) mod utils;

use crate::encode::utils::*;
use crate::error::{GateResult};
use crate::logging::*;
use crate::mqtt::*;
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
use crate::validate::*;

use std::collections::VecDeque;

fn write_encoding_steps(mqtt_packet: &MqttPacket, steps: &mut VecDeque<EncodingStep>) -> GateResult<()> {
    log_packet("Writing encode steps for packet: ", mqtt_packet);

    match mqtt_packet {
        MqttPacket::Connect(packet) => { write_connect_encoding_steps(packet, steps) }
        MqttPacket::Connack(packet) => { write_connack_encoding_steps(packet, steps) }
        MqttPacket::Publish(packet) => { write_publish_encoding_steps(packet, steps) }
        MqttPacket::Puback(packet) => { write_puback_encoding_steps(packet, steps) }
        MqttPacket::Pubrec(packet) => { write_pubrec_encoding_steps(packet, steps) }
        MqttPacket::Pubrel(packet) => { write_pubrel_encoding_steps(packet, steps) }
        MqttPacket::Pubcomp(packet) => { write_pubcomp_encoding_steps(packet, steps) }
        MqttPacket::Subscribe(packet) => { write_subscribe_encoding_steps(packet, steps) }
        MqttPacket::Suback(packet) => { write_suback_encoding_steps(packet, steps) }
        MqttPacket::Unsubscribe(packet) => { write_unsubscribe_encoding_steps(packet, steps) }
        MqttPacket::Unsuback(packet) => { write_unsuback_encoding_steps(packet, steps) }
        MqttPacket::Pingreq(packet) => { write_pingreq_encoding_steps(packet, steps) }
        MqttPacket::Pingresp(packet) => {  write_pingresp_encoding_steps(packet, steps) }
        MqttPacket::Disconnect(packet) => { write_disconnect_encoding_steps(packet, steps) }
    }
}

/// Byte count of the variable header plus payload of a packet
pub(crate) fn compute_remaining_length(mqtt_packet: &MqttPacket) -> GateResult<usize> {
    let length = match mqtt_packet {
        MqttPacket::Connect(packet) => { compute_connect_packet_length(packet)? }
        MqttPacket::Connack(_) => { 2 }
        MqttPacket::Publish(packet) => { compute_publish_packet_length(packet)? }
        MqttPacket::Puback(_) | MqttPacket::Pubrec(_) | MqttPacket::Pubrel(_) | MqttPacket::Pubcomp(_) | MqttPacket::Unsuback(_) => { 2 }
        MqttPacket::Subscribe(packet) => { compute_subscribe_packet_length(packet)? }
        MqttPacket::Suback(packet) => { compute_suback_packet_length(packet)? }
        MqttPacket::Unsubscribe(packet) => { compute_unsubscribe_packet_length(packet)? }
        MqttPacket::Pingreq(_) | MqttPacket::Pingresp(_) | MqttPacket::Disconnect(_) => { 0 }
    };

    Ok(length as usize)
}

pub(crate) struct Encoder {
    steps: VecDeque<EncodingStep>,
}

impl Encoder {
    pub fn new() -> Encoder {
        Encoder {
            steps: VecDeque::new(),
        }
    }

    pub fn reset(&mut self, packet: &MqttPacket) -> GateResult<()> {
        self.steps.clear();

        write_encoding_steps(packet, &mut self.steps)
    }

    pub fn encode(
        &mut self,
        packet: &MqttPacket,
        dest: &mut Vec<u8>,
    ) -> GateResult<()> {
        while let Some(step) = self.steps.pop_front() {
            process_encoding_step(step, packet, dest)?;
        }

        Ok(())
    }
}

/// Validates a packet against the protocol's outbound rules and encodes it, fixed header
/// included.
pub fn encode_packet(packet: &MqttPacket) -> GateResult<Vec<u8>> {
    validate_packet_outbound(packet)?;

    encode_packet_unchecked(packet)
}

/// Encodes a packet without running outbound validation.  Used to snapshot packets that were
/// already accepted off the wire, some of which (an empty-payload publish) are legal inbound but
/// not outbound.
pub(crate) fn encode_packet_unchecked(packet: &MqttPacket) -> GateResult<Vec<u8>> {
    let mut encoder = Encoder::new();
    encoder.reset(packet)?;

    let mut dest = Vec::with_capacity(compute_remaining_length(packet)? + 5);
    encoder.encode(packet, &mut dest)?;

    Ok(dest)
}
