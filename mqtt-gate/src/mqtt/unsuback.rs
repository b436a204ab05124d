/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

use crate::decode::utils::*;
use crate::encode::utils::*;
use crate::error::{GateResult};
use crate::logging::*;
use crate::mqtt::*;
use crate::mqtt::utils::*;
use crate::validate::utils::*;

use std::collections::VecDeque;
use std::fmt;

define_ack_packet_encoding_impl!(write_unsuback_encoding_steps, UnsubackPacket, UNSUBACK_FIRST_BYTE);

define_ack_packet_decode_function!(decode_unsuback_packet, Unsuback, UnsubackPacket, UNSUBACK_FIRST_BYTE);

validate_ack_outbound!(validate_unsuback_packet_outbound, UnsubackPacket, PacketType::Unsuback);

define_ack_packet_display_trait!(UnsubackPacket, "UnsubackPacket");
