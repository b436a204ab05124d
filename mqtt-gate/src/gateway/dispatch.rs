/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

use crate::config::UnknownPacketPolicy;
use crate::error::{GateError, GateResult};
use crate::gateway::connection::ConnectionShared;
use crate::gateway::GatewayContext;
use crate::mqtt::*;
use crate::session::Session;
use crate::validate::utils::is_valid_topic_filter;

use log::*;
use std::sync::Arc;

/// What the receive loop should do after a packet has been dispatched
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum Disposition {
    Continue,
    Disconnect,
    Close,
}

pub(crate) async fn dispatch_packet(context: &GatewayContext, connection: &ConnectionShared, session: &Arc<Session>, packet: MqttPacket) -> GateResult<Disposition> {
    match &packet {
        MqttPacket::Publish(publish) => {
            handle_publish(context, connection, session, &packet, publish).await
        }
        MqttPacket::Puback(_) | MqttPacket::Pubcomp(_) => {
            if session.outbound().ack(&packet) {
                complete_outbound(session);
            }
            Ok(Disposition::Continue)
        }
        MqttPacket::Pubrec(pubrec) => {
            if !session.outbound().ack(&packet) {
                warn!("gateway - connection {} - pubrec {} matches no outbound publish", connection.id(), pubrec.packet_id);
            }

            connection.write_packet(&MqttPacket::Pubrel(PubrelPacket::new(pubrec.packet_id))).await?;
            Ok(Disposition::Continue)
        }
        MqttPacket::Pubrel(pubrel) => {
            if session.inbound().ack(&packet) {
                complete_inbound(context, session);
            } else {
                debug!("gateway - connection {} - pubrel {} matches no inbound publish", connection.id(), pubrel.packet_id);
            }

            connection.write_packet(&MqttPacket::Pubcomp(PubcompPacket::new(pubrel.packet_id))).await?;
            Ok(Disposition::Continue)
        }
        MqttPacket::Subscribe(subscribe) => {
            let return_codes = subscribe.subscriptions.iter()
                .map(|subscription| resolve_subscription(context, connection, session, subscription))
                .collect();

            connection.write_packet(&MqttPacket::Suback(SubackPacket::new(subscribe.packet_id, return_codes))).await?;
            Ok(Disposition::Continue)
        }
        MqttPacket::Unsubscribe(unsubscribe) => {
            for topic_filter in &unsubscribe.topic_filters {
                if !session.remove_topic(topic_filter) {
                    debug!("gateway - connection {} - unsubscribe from unknown filter \"{}\"", connection.id(), topic_filter);
                }
            }

            connection.write_packet(&MqttPacket::Unsuback(UnsubackPacket::new(unsubscribe.packet_id))).await?;
            Ok(Disposition::Continue)
        }
        MqttPacket::Pingreq(_) => {
            connection.write_packet(&MqttPacket::Pingresp(PingrespPacket {})).await?;
            Ok(Disposition::Continue)
        }
        MqttPacket::Disconnect(_) => {
            Ok(Disposition::Disconnect)
        }
        MqttPacket::Connect(_) | MqttPacket::Connack(_) | MqttPacket::Suback(_) | MqttPacket::Unsuback(_) | MqttPacket::Pingresp(_) => {
            handle_unexpected(context, connection, &packet)
        }
    }
}

async fn handle_publish(context: &GatewayContext, connection: &ConnectionShared, session: &Arc<Session>, packet: &MqttPacket, publish: &PublishPacket) -> GateResult<Disposition> {
    match publish.qos {
        QualityOfService::AtMostOnce => {
            forward_publish(context, session, publish);
        }
        QualityOfService::AtLeastOnce => {
            forward_publish(context, session, publish);
            connection.write_packet(&MqttPacket::Puback(PubackPacket::new(publish.packet_id))).await?;
        }
        QualityOfService::ExactlyOnce => {
            match session.inbound().wait(packet, None) {
                Ok(()) => {}
                Err(GateError::DuplicatePacketId(_)) => {
                    debug!("gateway - connection {} - qos 2 publish {} already awaiting release", connection.id(), publish.packet_id);
                }
                Err(error) => {
                    return Err(error);
                }
            }

            connection.write_packet(&MqttPacket::Pubrec(PubrecPacket::new(publish.packet_id))).await?;
        }
    }

    Ok(Disposition::Continue)
}

fn forward_publish(context: &GatewayContext, session: &Session, publish: &PublishPacket) {
    if publish.retain {
        session.retain_message(publish);
    }

    context.resolver.forward(session.client_id(), publish);
}

fn resolve_subscription(context: &GatewayContext, connection: &ConnectionShared, session: &Session, subscription: &Subscription) -> SubackReturnCode {
    if !is_valid_topic_filter(&subscription.topic_filter) {
        warn!("gateway - connection {} - rejecting invalid topic filter \"{}\"", connection.id(), subscription.topic_filter);
        return SubackReturnCode::Failure;
    }

    match context.resolver.resolve(&subscription.topic_filter, subscription.qos) {
        Ok(granted_qos) => {
            session.add_topic(&subscription.topic_filter, granted_qos);
            SubackReturnCode::from(granted_qos)
        }
        Err(error) => {
            warn!("gateway - connection {} - resolving \"{}\" failed: {}", connection.id(), subscription.topic_filter, error);
            SubackReturnCode::Failure
        }
    }
}

fn complete_outbound(session: &Session) {
    for entry in session.outbound().acked() {
        debug!("gateway - outbound {} {} finished with {}", entry.message_type(), entry.packet_id(), entry.ack_state());
        entry.complete();
    }
}

fn complete_inbound(context: &GatewayContext, session: &Session) {
    for entry in session.inbound().acked() {
        if let MqttPacket::Publish(publish) = entry.request() {
            forward_publish(context, session, publish);
        }

        entry.complete();
    }
}

fn handle_unexpected(context: &GatewayContext, connection: &ConnectionShared, packet: &MqttPacket) -> GateResult<Disposition> {
    match context.options.unknown_packet_policy() {
        UnknownPacketPolicy::Ignore => {
            warn!("gateway - connection {} - ignoring unexpected {} packet", connection.id(), packet.packet_type());
            Ok(Disposition::Continue)
        }
        UnknownPacketPolicy::Disconnect => {
            warn!("gateway - connection {} - closing after unexpected {} packet", connection.id(), packet.packet_type());
            Ok(Disposition::Close)
        }
    }
}
