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

define_ack_packet_encoding_impl!(write_pubcomp_encoding_steps, PubcompPacket, PUBCOMP_FIRST_BYTE);

define_ack_packet_decode_function!(decode_pubcomp_packet, Pubcomp, PubcompPacket, PUBCOMP_FIRST_BYTE);

validate_ack_outbound!(validate_pubcomp_packet_outbound, PubcompPacket, PacketType::Pubcomp);

define_ack_packet_display_trait!(PubcompPacket, "PubcompPacket");

#[cfg(test)]
mod tests {

    use super::*;
    use crate::decode::testing::*;
    use crate::error::GateError;
    use assert_matches::assert_matches;

    #[test]
    fn pubcomp_round_trip_encode_decode() {
        let packet = PubcompPacket {
            packet_id: 123,
        };

        assert!(do_round_trip_encode_decode_test(&MqttPacket::Pubcomp(packet)));
    }

    #[test]
    fn pubcomp_round_trip_encode_decode_maximum_packet_id() {
        let packet = PubcompPacket {
            packet_id: 65535,
        };

        assert!(do_round_trip_encode_decode_test(&MqttPacket::Pubcomp(packet)));
    }

    #[test]
    fn pubcomp_decode_failure_bad_fixed_header() {
        let packet = PubcompPacket {
            packet_id: 16384,
        };

        do_fixed_header_flag_decode_failure_test(&MqttPacket::Pubcomp(packet), 8);
    }

    #[test]
    fn pubcomp_decode_failure_trailing_bytes() {
        let packet = PubcompPacket {
            packet_id: 1025,
        };

        let extend_body = | bytes: &[u8] | -> Vec<u8> {
            let mut clone = bytes.to_vec();
            clone[1] += 1;
            clone.push(0);
            clone
        };

        assert_matches!(do_mutated_decode_failure_test(&MqttPacket::Pubcomp(packet), extend_body), GateError::MalformedVariableHeader(_));
    }

    #[test]
    fn pubcomp_decode_failure_truncated() {
        let packet = PubcompPacket {
            packet_id: 1025,
        };

        let shrink_body = | bytes: &[u8] | -> Vec<u8> {
            let mut clone = bytes.to_vec();
            clone[1] -= 1;
            clone.pop();
            clone
        };

        assert_matches!(do_mutated_decode_failure_test(&MqttPacket::Pubcomp(packet), shrink_body), GateError::MalformedVariableHeader(_));
    }

    #[test]
    fn pubcomp_encode_failure_packet_id_zero() {
        let packet = PubcompPacket {
            packet_id: 0,
        };

        assert_matches!(MqttPacket::Pubcomp(packet).encode(), Err(GateError::PacketValidation(_)));
    }
}
