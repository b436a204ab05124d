/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

/*!
Module containing a set of structured data types that model the MQTT 3.1 and 3.1.1 control packets.
 */

use std::fmt;
use log::error;
use crate::error::{GateError, GateResult};

pub(crate) mod connack;
pub(crate) mod connect;
pub(crate) mod disconnect;
pub mod header;
pub(crate) mod pingreq;
pub(crate) mod pingresp;
pub(crate) mod puback;
pub(crate) mod pubcomp;
pub(crate) mod publish;
pub(crate) mod pubrec;
pub(crate) mod pubrel;
pub(crate) mod suback;
pub(crate) mod subscribe;
pub(crate) mod unsuback;
pub(crate) mod unsubscribe;
pub mod utils;

/// MQTT message delivery quality of service.
///
/// Enum values match [MQTT 3.1.1](https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718099) encoding values.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum QualityOfService {

    /// The message is delivered according to the capabilities of the underlying network. No response is sent by the
    /// receiver and no retry is performed by the sender. The message arrives at the receiver either once or not at all.
    #[default]
    AtMostOnce = 0,

    /// A level of service that ensures that the message arrives at the receiver at least once.
    AtLeastOnce = 1,

    /// A level of service that ensures that the message arrives at the receiver exactly once.
    ExactlyOnce = 2,
}

impl TryFrom<u8> for QualityOfService {
    type Error = GateError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        utils::convert_u8_to_quality_of_service(value)
    }
}

/// Protocol name/level pairs the gateway accepts in a Connect packet.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum ProtocolVersion {

    /// MQTT 3.1, protocol name "MQIsdp"
    Mqtt31 = 3,

    /// MQTT 3.1.1, protocol name "MQTT"
    #[default]
    Mqtt311 = 4,
}

impl ProtocolVersion {

    /// Protocol name string that must accompany this protocol level on the wire
    pub fn protocol_name(&self) -> &'static str {
        match self {
            ProtocolVersion::Mqtt31 => { "MQIsdp" }
            ProtocolVersion::Mqtt311 => { "MQTT" }
        }
    }

    /// Protocol level byte
    pub fn level(&self) -> u8 {
        *self as u8
    }
}

/// Server return code for a connection attempt.
///
/// Enum values match [MQTT 3.1.1](https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718035) encoding values.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum ConnectReturnCode {

    /// Connection accepted
    #[default]
    Accepted = 0,

    /// The server does not support the level of the MQTT protocol requested by the client
    UnacceptableProtocolVersion = 1,

    /// The client identifier is correct UTF-8 but not allowed by the server
    IdentifierRejected = 2,

    /// The network connection has been made but the MQTT service is unavailable
    ServerUnavailable = 3,

    /// The data in the user name or password is malformed
    BadUsernameOrPassword = 4,

    /// The client is not authorized to connect
    NotAuthorized = 5,
}

impl TryFrom<u8> for ConnectReturnCode {
    type Error = GateError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        utils::convert_u8_to_connect_return_code(value)
    }
}

/// Per-subscription return code in a Suback packet.
///
/// Enum values match [MQTT 3.1.1](https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718071) encoding values.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum SubackReturnCode {

    /// Subscription granted at QoS 0
    #[default]
    GrantedQos0 = 0,

    /// Subscription granted at QoS 1
    GrantedQos1 = 1,

    /// Subscription granted at QoS 2
    GrantedQos2 = 2,

    /// Subscription failed
    Failure = 0x80,
}

impl From<QualityOfService> for SubackReturnCode {
    fn from(qos: QualityOfService) -> Self {
        match qos {
            QualityOfService::AtMostOnce => { SubackReturnCode::GrantedQos0 }
            QualityOfService::AtLeastOnce => { SubackReturnCode::GrantedQos1 }
            QualityOfService::ExactlyOnce => { SubackReturnCode::GrantedQos2 }
        }
    }
}

impl TryFrom<u8> for SubackReturnCode {
    type Error = GateError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        utils::convert_u8_to_suback_return_code(value)
    }
}

/// Data model of an [MQTT CONNECT](https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718028) packet.
///
/// The connect flags byte is not stored; it is derived from the other fields when encoding.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ConnectPacket {
    pub(crate) protocol_version: ProtocolVersion,
    pub(crate) clean_session: bool,
    pub(crate) keep_alive_interval_seconds: u16,
    pub(crate) client_id: String,
    pub(crate) will: Option<PublishPacket>,
    pub(crate) username: Option<String>,
    pub(crate) password: Option<Vec<u8>>,
}

impl ConnectPacket {

    /// Protocol level requested by the client
    pub fn protocol_version(&self) -> ProtocolVersion { self.protocol_version }

    /// Whether the client asked to discard any previous session state
    pub fn clean_session(&self) -> bool { self.clean_session }

    /// Maximum silence interval, in seconds, the client promised to honor.  Zero means no keep alive.
    pub fn keep_alive_interval_seconds(&self) -> u16 { self.keep_alive_interval_seconds }

    /// Client identifier
    pub fn client_id(&self) -> &str { self.client_id.as_str() }

    /// Will message, modeled as the publish the gateway would emit on the client's behalf
    pub fn will(&self) -> Option<&PublishPacket> { self.will.as_ref() }

    /// Username, if present
    pub fn username(&self) -> Option<&str> { self.username.as_deref() }

    /// Password, if present
    pub fn password(&self) -> Option<&[u8]> { self.password.as_deref() }

    /// Bit-packed connect flags byte derived from the packet's fields
    pub fn connect_flags(&self) -> u8 {
        connect::compute_connect_flags(self)
    }
}

/// Data model of an [MQTT CONNACK](https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718033) packet.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ConnackPacket {
    pub(crate) session_present: bool,
    pub(crate) return_code: ConnectReturnCode,
}

impl ConnackPacket {

    /// Whether the server resumed existing session state for the client
    pub fn session_present(&self) -> bool { self.session_present }

    /// Result of the connection attempt
    pub fn return_code(&self) -> ConnectReturnCode { self.return_code }
}

/// Data model of an [MQTT PUBLISH](https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718037) packet
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PublishPacket {
    pub(crate) packet_id: u16,
    pub(crate) topic: String,
    pub(crate) qos: QualityOfService,
    pub(crate) duplicate: bool,
    pub(crate) retain: bool,
    pub(crate) payload: Vec<u8>,
}

impl PublishPacket {

    /// Creates a new builder for a PublishPacket.
    pub fn builder(topic: String, qos: QualityOfService) -> PublishPacketBuilder {
        PublishPacketBuilder::new(topic, qos)
    }

    /// Packet id of the publish.  Zero for QoS 0 publishes.
    pub fn packet_id(&self) -> u16 { self.packet_id }

    /// Topic this message was (or will be) published to.
    pub fn topic(&self) -> &str { self.topic.as_str() }

    /// Delivery quality of service
    pub fn qos(&self) -> QualityOfService { self.qos }

    /// Returns whether this packet is a resend of a previously-submitted Publish
    pub fn duplicate(&self) -> bool { self.duplicate }

    /// Returns true if this is a retained message, false otherwise.
    pub fn retain(&self) -> bool { self.retain }

    /// Returns the payload of the publish message.
    pub fn payload(&self) -> &[u8] { self.payload.as_slice() }
}

/// Builder type for PublishPacket instances
pub struct PublishPacketBuilder {
    packet: PublishPacket
}

impl PublishPacketBuilder {
    pub(crate) fn new(topic: String, qos: QualityOfService) -> Self {
        PublishPacketBuilder {
            packet: PublishPacket {
                topic,
                qos,
                ..Default::default()
            }
        }
    }

    /// Sets the packet id.  Outbound deliveries with a zero id get one assigned by the connection.
    pub fn with_packet_id(mut self, packet_id: u16) -> Self {
        self.packet.packet_id = packet_id;
        self
    }

    /// Sets if this should be a retained message
    pub fn with_retain(mut self, retain: bool) -> Self {
        self.packet.retain = retain;
        self
    }

    /// Marks the publish as a re-delivery
    pub fn with_duplicate(mut self, duplicate: bool) -> Self {
        self.packet.duplicate = duplicate;
        self
    }

    /// Sets the message payload
    pub fn with_payload(mut self, payload: Vec<u8>) -> Self {
        self.packet.payload = payload;
        self
    }

    /// Creates a new PublishPacket from the builder's internal state
    pub fn build(self) -> PublishPacket {
        self.packet
    }
}

/// Data model of an [MQTT PUBACK](https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718043) packet
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PubackPacket {
    pub(crate) packet_id: u16,
}

/// Data model of an [MQTT PUBREC](https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718048) packet
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PubrecPacket {
    pub(crate) packet_id: u16,
}

/// Data model of an [MQTT PUBREL](https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718053) packet
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PubrelPacket {
    pub(crate) packet_id: u16,
}

/// Data model of an [MQTT PUBCOMP](https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718058) packet
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PubcompPacket {
    pub(crate) packet_id: u16,
}

/// A single (topic filter, requested QoS) entry within a Subscribe packet
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Subscription {
    pub(crate) topic_filter: String,
    pub(crate) qos: QualityOfService,
}

impl Subscription {

    /// Creates a new subscription entry
    pub fn new(topic_filter: &str, qos: QualityOfService) -> Self {
        Subscription {
            topic_filter: topic_filter.to_string(),
            qos,
        }
    }

    /// Topic filter to subscribe to
    pub fn topic_filter(&self) -> &str { self.topic_filter.as_str() }

    /// Maximum QoS the client wants to receive matching messages at
    pub fn qos(&self) -> QualityOfService { self.qos }
}

/// Data model of an [MQTT SUBSCRIBE](https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718063) packet
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SubscribePacket {
    pub(crate) packet_id: u16,
    pub(crate) subscriptions: Vec<Subscription>,
}

impl SubscribePacket {

    /// Subscriptions in request order
    pub fn subscriptions(&self) -> &[Subscription] { self.subscriptions.as_slice() }

    /// Adds a subscription.  A filter that is already present has its QoS updated in place.
    pub fn add_subscription(&mut self, topic_filter: &str, qos: QualityOfService) {
        subscribe::add_subscription(self, topic_filter, qos);
    }
}

/// Data model of an [MQTT SUBACK](https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718068) packet
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SubackPacket {
    pub(crate) packet_id: u16,
    pub(crate) return_codes: Vec<SubackReturnCode>,
}

impl SubackPacket {

    /// Per-subscription results, in the order of the originating Subscribe
    pub fn return_codes(&self) -> &[SubackReturnCode] { self.return_codes.as_slice() }
}

/// Data model of an [MQTT UNSUBSCRIBE](https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718072) packet
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct UnsubscribePacket {
    pub(crate) packet_id: u16,
    pub(crate) topic_filters: Vec<String>,
}

impl UnsubscribePacket {

    /// Topic filters to remove
    pub fn topic_filters(&self) -> &[String] { self.topic_filters.as_slice() }

    /// Adds a topic filter.  Filters that are already present are skipped.
    pub fn add_topic_filter(&mut self, topic_filter: &str) {
        unsubscribe::add_topic_filter(self, topic_filter);
    }
}

/// Data model of an [MQTT UNSUBACK](https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718077) packet
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct UnsubackPacket {
    pub(crate) packet_id: u16,
}

macro_rules! define_ack_packet_accessors {
    ($packet_type: ident) => {
        impl $packet_type {

            /// Creates an acknowledgement for the given packet id
            pub fn new(packet_id: u16) -> Self {
                $packet_type {
                    packet_id
                }
            }

            /// Packet id being acknowledged
            pub fn packet_id(&self) -> u16 { self.packet_id }
        }
    };
}

define_ack_packet_accessors!(PubackPacket);
define_ack_packet_accessors!(PubrecPacket);
define_ack_packet_accessors!(PubrelPacket);
define_ack_packet_accessors!(PubcompPacket);
define_ack_packet_accessors!(UnsubackPacket);

/// Data model of an [MQTT PINGREQ](https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718081) packet
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PingreqPacket {}

/// Data model of an [MQTT PINGRESP](https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718086) packet
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PingrespPacket {}

/// Data model of an [MQTT DISCONNECT](https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718090) packet
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DisconnectPacket {}

/// Algebraic union of all MQTT 3.1.1 control packet types.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MqttPacket {
    Connect(ConnectPacket),
    Connack(ConnackPacket),
    Publish(PublishPacket),
    Puback(PubackPacket),
    Pubrec(PubrecPacket),
    Pubrel(PubrelPacket),
    Pubcomp(PubcompPacket),
    Subscribe(SubscribePacket),
    Suback(SubackPacket),
    Unsubscribe(UnsubscribePacket),
    Unsuback(UnsubackPacket),
    Pingreq(PingreqPacket),
    Pingresp(PingrespPacket),
    Disconnect(DisconnectPacket),
}

impl MqttPacket {

    /// Kind of control packet
    pub fn packet_type(&self) -> PacketType {
        utils::mqtt_packet_to_packet_type(self)
    }

    /// Upper-case protocol name of the packet, e.g. "PUBLISH"
    pub fn name(&self) -> &'static str {
        utils::mqtt_packet_to_str(self)
    }

    /// Short human-readable description of the packet's role in the protocol
    pub fn description(&self) -> &'static str {
        utils::packet_type_to_description(self.packet_type())
    }

    /// Packet id of packet types that carry one.  Publishes only carry an id when QoS > 0.
    pub fn packet_id(&self) -> Option<u16> {
        match self {
            MqttPacket::Publish(packet) => {
                if packet.qos != QualityOfService::AtMostOnce {
                    Some(packet.packet_id)
                } else {
                    None
                }
            }
            MqttPacket::Puback(packet) => { Some(packet.packet_id) }
            MqttPacket::Pubrec(packet) => { Some(packet.packet_id) }
            MqttPacket::Pubrel(packet) => { Some(packet.packet_id) }
            MqttPacket::Pubcomp(packet) => { Some(packet.packet_id) }
            MqttPacket::Subscribe(packet) => { Some(packet.packet_id) }
            MqttPacket::Suback(packet) => { Some(packet.packet_id) }
            MqttPacket::Unsubscribe(packet) => { Some(packet.packet_id) }
            MqttPacket::Unsuback(packet) => { Some(packet.packet_id) }
            _ => { None }
        }
    }

    /// Validates the packet and encodes it, fixed header included.
    pub fn encode(&self) -> GateResult<Vec<u8>> {
        crate::encode::encode_packet(self)
    }

    /// Decodes exactly one packet from the front of `bytes`, returning the packet and the number
    /// of bytes it occupied.
    pub fn decode(bytes: &[u8]) -> GateResult<(MqttPacket, usize)> {
        crate::decode::decode_frame(bytes)
    }

    /// Total number of bytes the packet occupies on the wire, fixed header included.
    pub fn wire_length(&self) -> GateResult<usize> {
        let remaining_length = crate::encode::compute_remaining_length(self)?;
        Ok(header::compute_fixed_header_length(remaining_length as u32)? + remaining_length)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
/// An enum indicating the kind of MQTT packet
pub enum PacketType {
    /// A [Connect](https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718028) packet
    Connect = 1,

    /// A [Connack](https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718033) packet
    Connack = 2,

    /// A [Publish](https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718037) packet
    Publish = 3,

    /// A [Puback](https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718043) packet
    Puback = 4,

    /// A [Pubrec](https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718048) packet
    Pubrec = 5,

    /// A [Pubrel](https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718053) packet
    Pubrel = 6,

    /// A [Pubcomp](https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718058) packet
    Pubcomp = 7,

    /// A [Subscribe](https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718063) packet
    Subscribe = 8,

    /// A [Suback](https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718068) packet
    Suback = 9,

    /// An [Unsubscribe](https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718072) packet
    Unsubscribe = 10,

    /// An [Unsuback](https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718077) packet
    Unsuback = 11,

    /// A [Pingreq](https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718081) packet
    Pingreq = 12,

    /// A [Pingresp](https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718086) packet
    Pingresp = 13,

    /// A [Disconnect](https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718090) packet
    Disconnect = 14,
}

impl TryFrom<u8> for PacketType {
    type Error = GateError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        utils::convert_u8_to_packet_type(value)
    }
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PacketType::Connect => { write!(f, "ConnectPacket") }
            PacketType::Connack => { write!(f, "ConnackPacket") }
            PacketType::Publish => { write!(f, "PublishPacket") }
            PacketType::Puback => { write!(f, "PubackPacket") }
            PacketType::Pubrec => { write!(f, "PubrecPacket") }
            PacketType::Pubrel => { write!(f, "PubrelPacket") }
            PacketType::Pubcomp => { write!(f, "PubcompPacket") }
            PacketType::Subscribe => { write!(f, "SubscribePacket") }
            PacketType::Suback => { write!(f, "SubackPacket") }
            PacketType::Unsubscribe => { write!(f, "UnsubscribePacket") }
            PacketType::Unsuback => { write!(f, "UnsubackPacket") }
            PacketType::Pingreq => { write!(f, "PingreqPacket") }
            PacketType::Pingresp => { write!(f, "PingrespPacket") }
            PacketType::Disconnect => { write!(f, "DisconnectPacket") }
        }
    }
}

impl fmt::Display for QualityOfService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QualityOfService::AtMostOnce => { write!(f, "AtMostOnce") }
            QualityOfService::AtLeastOnce => { write!(f, "AtLeastOnce") }
            QualityOfService::ExactlyOnce => { write!(f, "ExactlyOnce") }
        }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolVersion::Mqtt31 => { write!(f, "MQIsdp(3)") }
            ProtocolVersion::Mqtt311 => { write!(f, "MQTT(4)") }
        }
    }
}

impl fmt::Display for ConnectReturnCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectReturnCode::Accepted => { write!(f, "Accepted") }
            ConnectReturnCode::UnacceptableProtocolVersion => { write!(f, "UnacceptableProtocolVersion") }
            ConnectReturnCode::IdentifierRejected => { write!(f, "IdentifierRejected") }
            ConnectReturnCode::ServerUnavailable => { write!(f, "ServerUnavailable") }
            ConnectReturnCode::BadUsernameOrPassword => { write!(f, "BadUsernameOrPassword") }
            ConnectReturnCode::NotAuthorized => { write!(f, "NotAuthorized") }
        }
    }
}

impl fmt::Display for SubackReturnCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubackReturnCode::GrantedQos0 => { write!(f, "GrantedQos0") }
            SubackReturnCode::GrantedQos1 => { write!(f, "GrantedQos1") }
            SubackReturnCode::GrantedQos2 => { write!(f, "GrantedQos2") }
            SubackReturnCode::Failure => { write!(f, "Failure") }
        }
    }
}

pub(crate) fn log_and_reject_value<T>(function_name: &str, value: u8, description: &str) -> GateResult<T> {
    let message = format!("{} - invalid {} value ({})", function_name, description, value);
    error!("{}", message);
    Err(GateError::new_malformed_header(message))
}
