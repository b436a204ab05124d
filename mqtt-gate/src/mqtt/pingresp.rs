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

define_empty_packet_encoding_impl!(write_pingresp_encoding_steps, PingrespPacket, PINGRESP_FIRST_BYTE);

define_empty_packet_decode_function!(decode_pingresp_packet, Pingresp, PingrespPacket, PINGRESP_FIRST_BYTE);

define_empty_packet_display_trait!(PingrespPacket, "PingrespPacket");

#[cfg(test)]
mod tests {

    use super::*;
    use crate::decode::testing::*;

    #[test]
    fn pingresp_round_trip_encode_decode() {
        let packet = PingrespPacket {};
        assert!(do_round_trip_encode_decode_test(&MqttPacket::Pingresp(packet)));
    }

    #[test]
    fn pingresp_encoding() {
        let encoded = encode_packet_for_test(&MqttPacket::Pingresp(PingrespPacket {}));
        assert_eq!(vec!(PINGRESP_FIRST_BYTE, 0), encoded);
    }

    #[test]
    fn pingresp_decode_failure_bad_fixed_header() {
        let packet = PingrespPacket {};
        do_fixed_header_flag_decode_failure_test(&MqttPacket::Pingresp(packet), 5);
    }

    #[test]
    fn pingresp_decode_failure_non_empty_body() {
        let packet = PingrespPacket {};

        let add_body = | bytes: &[u8] | -> Vec<u8> {
            let mut clone = bytes.to_vec();
            clone[1] = 1;
            clone.push(0);
            clone
        };

        do_mutated_decode_failure_test(&MqttPacket::Pingresp(packet), add_body);
    }
}
