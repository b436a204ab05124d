/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

extern crate log;

use crate::error::{GateError, GateResult};
use crate::mqtt::PacketType;
use crate::validate::*;

use log::*;

pub(crate) fn validate_string_length(value: &str, packet_type: PacketType, field_name: &str) -> GateResult<()> {
    if value.len() > MAXIMUM_STRING_PROPERTY_LENGTH {
        let message = format!("{} Validation - {} string field too long", packet_type, field_name);
        error!("{}", message);
        return Err(GateError::new_packet_validation(packet_type, message));
    }

    Ok(())
}

pub(crate) fn validate_optional_string_length(optional_string: &Option<String>, packet_type: PacketType, field_name: &str) -> GateResult<()> {
    if let Some(value) = &optional_string {
        validate_string_length(value, packet_type, field_name)?;
    }

    Ok(())
}

pub(crate) fn validate_optional_binary_length(optional_data: &Option<Vec<u8>>, packet_type: PacketType, field_name: &str) -> GateResult<()> {
    if let Some(value) = &optional_data {
        if value.len() > MAXIMUM_BINARY_PROPERTY_LENGTH {
            let message = format!("{} Validation - {} binary field too long", packet_type, field_name);
            error!("{}", message);
            return Err(GateError::new_packet_validation(packet_type, message));
        }
    }

    Ok(())
}

pub(crate) fn validate_packet_id_non_zero(packet_id: u16, packet_type: PacketType) -> GateResult<()> {
    if packet_id == 0 {
        let message = format!("{} Validation - packet id is zero", packet_type);
        error!("{}", message);
        return Err(GateError::new_packet_validation(packet_type, message));
    }

    Ok(())
}

macro_rules! validate_ack_outbound {
    ($function_name: ident, $packet_type_name: ident, $packet_type: expr) => {
        pub(crate) fn $function_name(packet: &$packet_type_name) -> GateResult<()> {
            validate_packet_id_non_zero(packet.packet_id, $packet_type)
        }
    };
}

pub(crate) use validate_ack_outbound;

/// A topic name a message can be published to: non-empty and free of wildcard characters
pub(crate) fn is_valid_topic(topic: &str) -> bool {
    if topic.is_empty() || topic.len() > MAXIMUM_STRING_PROPERTY_LENGTH {
        return false;
    }

    if topic.contains(['#', '+']) {
        return false;
    }

    true
}

/// A subscription filter: single-level wildcards must fill a whole level and the multi-level
/// wildcard may only appear as the final level.
pub(crate) fn is_valid_topic_filter(filter: &str) -> bool {
    if filter.is_empty() || filter.len() > MAXIMUM_STRING_PROPERTY_LENGTH {
        return false;
    }

    let mut seen_mlw = false;
    for segment in filter.split('/') {
        if seen_mlw {
            return false;
        }

        if segment.len() == 1 {
            if segment == "#" {
                seen_mlw = true;
            }
        } else if segment.contains(['#', '+']) {
            return false;
        }
    }

    true
}
