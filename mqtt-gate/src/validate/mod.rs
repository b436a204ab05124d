/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

pub(crate) mod utils;

use crate::error::{GateResult};
use crate::mqtt::*;
use crate::mqtt::connect::*;
use crate::mqtt::puback::*;
use crate::mqtt::pubcomp::*;
use crate::mqtt::publish::*;
use crate::mqtt::pubrec::*;
use crate::mqtt::pubrel::*;
use crate::mqtt::suback::*;
use crate::mqtt::subscribe::*;
use crate::mqtt::unsuback::*;
use crate::mqtt::unsubscribe::*;

pub(crate) const MAXIMUM_STRING_PROPERTY_LENGTH : usize = 65535;
pub(crate) const MAXIMUM_BINARY_PROPERTY_LENGTH : usize = 65535;

/// Validates outbound packets against the MQTT 3.1.1 requirements.
///
/// Called on every packet right before it is encoded, so that invalid wire data is never
/// emitted.  Utf-8 codepoints are not currently checked by any validation function.
pub(crate) fn validate_packet_outbound(packet: &MqttPacket) -> GateResult<()> {
    match packet {
        MqttPacket::Connect(connect) => { validate_connect_packet_outbound(connect) }
        MqttPacket::Connack(_) => { Ok(()) }
        MqttPacket::Publish(publish) => { validate_publish_packet_outbound(publish) }
        MqttPacket::Puback(puback) => { validate_puback_packet_outbound(puback) }
        MqttPacket::Pubrec(pubrec) => { validate_pubrec_packet_outbound(pubrec) }
        MqttPacket::Pubrel(pubrel) => { validate_pubrel_packet_outbound(pubrel) }
        MqttPacket::Pubcomp(pubcomp) => { validate_pubcomp_packet_outbound(pubcomp) }
        MqttPacket::Subscribe(subscribe) => { validate_subscribe_packet_outbound(subscribe) }
        MqttPacket::Suback(suback) => { validate_suback_packet_outbound(suback) }
        MqttPacket::Unsubscribe(unsubscribe) => { validate_unsubscribe_packet_outbound(unsubscribe) }
        MqttPacket::Unsuback(unsuback) => { validate_unsuback_packet_outbound(unsuback) }
        MqttPacket::Pingreq(_) | MqttPacket::Pingresp(_) | MqttPacket::Disconnect(_) => { Ok(()) }
    }
}
