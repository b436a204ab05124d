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

use std::collections::VecDeque;
use std::fmt;

define_empty_packet_encoding_impl!(write_disconnect_encoding_steps, DisconnectPacket, DISCONNECT_FIRST_BYTE);

define_empty_packet_decode_function!(decode_disconnect_packet, Disconnect, DisconnectPacket, DISCONNECT_FIRST_BYTE);

define_empty_packet_display_trait!(DisconnectPacket, "DisconnectPacket");

#[cfg(test)]
mod tests {

    use super::*;
    use crate::decode::testing::*;

    #[test]
    fn disconnect_round_trip_encode_decode() {
        let packet = DisconnectPacket {};
        assert!(do_round_trip_encode_decode_test(&MqttPacket::Disconnect(packet)));
    }

    #[test]
    fn disconnect_encoding() {
        let encoded = encode_packet_for_test(&MqttPacket::Disconnect(DisconnectPacket {}));
        assert_eq!(vec!(DISCONNECT_FIRST_BYTE, 0), encoded);
    }

    #[test]
    fn disconnect_decode_failure_bad_fixed_header() {
        let packet = DisconnectPacket {};
        do_fixed_header_flag_decode_failure_test(&MqttPacket::Disconnect(packet), 9);
    }

    #[test]
    fn disconnect_decode_failure_non_empty_body() {
        let packet = DisconnectPacket {};

        let add_body = | bytes: &[u8] | -> Vec<u8> {
            let mut clone = bytes.to_vec();
            clone[1] = 1;
            clone.push(0);
            clone
        };

        do_mutated_decode_failure_test(&MqttPacket::Disconnect(packet), add_body);
    }
}
