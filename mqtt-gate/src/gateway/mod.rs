/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

/*!
The gateway: accepts transports, runs one connection task per transport and exposes the live
connection table for push delivery.

Credential checks and topic routing are delegated to an [`Authenticator`] and a
[`RoutingResolver`] supplied at construction time.
 */

mod connection;
mod dispatch;
mod transport;

pub use connection::{ConnectionHandle, ConnectionState, ConnectionTable};
pub use transport::GatewayTransport;

use crate::config::GatewayOptions;
use crate::error::GateResult;
use crate::mqtt::{PublishPacket, QualityOfService};
use crate::session::{SessionManager, SessionProviders};

use log::*;
use std::fmt;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Pluggable credential check, invoked once per handshake
pub trait Authenticator : Send + Sync {

    /// Returns true if the supplied credentials may connect
    fn validate(&self, username: Option<&str>, password: Option<&[u8]>) -> bool;
}

/// Authenticator that accepts every client
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAllAuthenticator {}

impl Authenticator for AllowAllAuthenticator {
    fn validate(&self, _: Option<&str>, _: Option<&[u8]>) -> bool {
        true
    }
}

/// Pluggable routing collaborator
pub trait RoutingResolver : Send + Sync {

    /// Decides the QoS granted for a subscription request.  An error becomes a Failure return
    /// code for that single topic filter.
    fn resolve(&self, topic_filter: &str, requested_qos: QualityOfService) -> GateResult<QualityOfService>;

    /// Receives publishes accepted from a client, and the will of a client whose connection was
    /// lost.  QoS 2 publishes arrive once their release has been received.
    fn forward(&self, _client_id: &str, _publish: &PublishPacket) {}
}

/// Resolver that grants every subscription at the requested QoS and drops forwarded publishes
#[derive(Debug, Default, Clone, Copy)]
pub struct RequestedQosResolver {}

impl RoutingResolver for RequestedQosResolver {
    fn resolve(&self, _: &str, requested_qos: QualityOfService) -> GateResult<QualityOfService> {
        Ok(requested_qos)
    }
}

pub(crate) struct GatewayContext {
    pub(crate) options: GatewayOptions,
    pub(crate) authenticator: Arc<dyn Authenticator>,
    pub(crate) resolver: Arc<dyn RoutingResolver>,
    pub(crate) sessions: SessionManager,
    pub(crate) connections: ConnectionTable,
}

/// Entry point handing accepted transports to connection tasks
#[derive(Clone)]
pub struct Gateway {
    context: Arc<GatewayContext>,
}

impl Gateway {

    /// Creates a gateway storing sessions in the provider named by `options`.
    ///
    /// Fails if that provider is not registered in `providers`.
    pub fn new(options: GatewayOptions, authenticator: Arc<dyn Authenticator>, resolver: Arc<dyn RoutingResolver>, providers: &SessionProviders) -> GateResult<Self> {
        let sessions = SessionManager::new(providers, options.session_provider())?;
        info!("gateway - created with session provider \"{}\"", sessions.provider_name());

        Ok(Gateway {
            context: Arc::new(GatewayContext {
                options,
                authenticator,
                resolver,
                sessions,
                connections: ConnectionTable::new(),
            })
        })
    }

    /// Starts a connection task for a freshly accepted transport.  Must be called from within a
    /// tokio runtime.  The returned handle resolves once the connection is closed.
    pub fn accept<T>(&self, transport: T) -> JoinHandle<()> where T : GatewayTransport {
        let context = self.context.clone();
        tokio::spawn(connection::run_connection(context, transport))
    }

    /// Looks up a live connection by its numeric id
    pub fn find_connection(&self, id: u64) -> Option<ConnectionHandle> {
        self.context.connections.get(id)
    }

    /// Looks up the active connection of a client
    pub fn find_client_connection(&self, client_id: &str) -> Option<ConnectionHandle> {
        self.context.connections.find_by_client_id(client_id)
    }

    /// Table of live connections
    pub fn connections(&self) -> &ConnectionTable { &self.context.connections }

    /// Session store used by the gateway
    pub fn sessions(&self) -> &SessionManager { &self.context.sessions }

    /// Options the gateway was created with
    pub fn options(&self) -> &GatewayOptions { &self.context.options }
}

impl fmt::Debug for Gateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Gateway {{ session_provider: {}, connections: {} }}", self.context.sessions.provider_name(), self.context.connections.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ackqueue::{AckCompletion, AckEntry, AckState};
    use crate::config::{GatewayOptionsBuilder, UnknownPacketPolicy};
    use crate::decode::read_packet;
    use crate::encode::encode_packet;
    use crate::error::GateError;
    use crate::mqtt::*;
    use crate::session::memory::MemoryProvider;
    use assert_matches::assert_matches;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::io::{duplex, AsyncWriteExt, DuplexStream};

    const TEST_TIMEOUT : Duration = Duration::from_secs(5);

    struct ScriptedAuthenticator {
        username: &'static str,
    }

    impl Authenticator for ScriptedAuthenticator {
        fn validate(&self, username: Option<&str>, _: Option<&[u8]>) -> bool {
            username.is_none() || username == Some(self.username)
        }
    }

    #[derive(Default)]
    struct RecordingResolver {
        rejected_filters: Vec<&'static str>,
        forwarded: Mutex<Vec<(String, PublishPacket)>>,
    }

    impl RecordingResolver {
        fn forwarded(&self) -> Vec<(String, PublishPacket)> {
            self.forwarded.lock().unwrap().clone()
        }
    }

    impl RoutingResolver for RecordingResolver {
        fn resolve(&self, topic_filter: &str, requested_qos: QualityOfService) -> GateResult<QualityOfService> {
            if self.rejected_filters.contains(&topic_filter) {
                return Err(GateError::new_other_error("filter not routable"));
            }

            Ok(requested_qos)
        }

        fn forward(&self, client_id: &str, publish: &PublishPacket) {
            self.forwarded.lock().unwrap().push((client_id.to_string(), publish.clone()));
        }
    }

    struct TestClient {
        stream: DuplexStream,
    }

    impl TestClient {
        async fn send(&mut self, packet: MqttPacket) {
            let bytes = encode_packet(&packet).unwrap();
            self.send_bytes(&bytes).await;
        }

        async fn send_bytes(&mut self, bytes: &[u8]) {
            self.stream.write_all(bytes).await.unwrap();
        }

        async fn receive(&mut self) -> GateResult<MqttPacket> {
            tokio::time::timeout(TEST_TIMEOUT, read_packet(&mut self.stream)).await.unwrap()
        }

        async fn connect(&mut self, connect: ConnectPacket) -> ConnackPacket {
            self.send(MqttPacket::Connect(connect)).await;
            match self.receive().await.unwrap() {
                MqttPacket::Connack(connack) => { connack }
                other => { panic!("expected connack, received {}", other) }
            }
        }
    }

    struct TestFixture {
        gateway: Gateway,
        resolver: Arc<RecordingResolver>,
    }

    impl TestFixture {
        fn new(options: GatewayOptions) -> Self {
            let resolver = Arc::new(RecordingResolver {
                rejected_filters: vec!("blocked/#"),
                ..Default::default()
            });

            let providers = SessionProviders::new();
            providers.register("mem", Arc::new(MemoryProvider::new(options.ack_queue_size()))).unwrap();

            let gateway = Gateway::new(options, Arc::new(ScriptedAuthenticator { username: "admin" }), resolver.clone(), &providers).unwrap();

            TestFixture {
                gateway,
                resolver,
            }
        }

        fn start_connection(&self) -> (TestClient, JoinHandle<()>) {
            let (client, server) = duplex(64 * 1024);
            let task = self.gateway.accept(server);

            (TestClient { stream: client }, task)
        }
    }

    fn default_fixture() -> TestFixture {
        TestFixture::new(GatewayOptionsBuilder::new().build())
    }

    fn create_connect(client_id: &str, keep_alive: u16, clean_session: bool) -> ConnectPacket {
        ConnectPacket::builder()
            .with_client_id(client_id)
            .with_keep_alive_interval_seconds(keep_alive)
            .with_clean_session(clean_session)
            .build()
    }

    async fn wait_for_close(task: JoinHandle<()>) {
        tokio::time::timeout(TEST_TIMEOUT, task).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn end_to_end_connect_subscribe_publish_disconnect() {
        let fixture = default_fixture();
        let (mut client, task) = fixture.start_connection();

        let connack = client.connect(create_connect("abc123", 0, true)).await;
        assert!(!connack.session_present());
        assert_eq!(ConnectReturnCode::Accepted, connack.return_code());

        let connection = fixture.gateway.find_connection(1).unwrap();
        assert_eq!(Duration::from_secs(300), connection.keep_alive());
        assert_eq!("abc123", connection.client_id());

        client.send(MqttPacket::Subscribe(SubscribePacket::new(1, "room/1", QualityOfService::AtLeastOnce))).await;
        assert_eq!(MqttPacket::Suback(SubackPacket::new(1, vec!(SubackReturnCode::GrantedQos1))), client.receive().await.unwrap());

        let publish = PublishPacket::builder("room/1".to_string(), QualityOfService::AtLeastOnce)
            .with_packet_id(2)
            .with_payload("hi".as_bytes().to_vec())
            .build();
        client.send(MqttPacket::Publish(publish.clone())).await;
        assert_eq!(MqttPacket::Puback(PubackPacket::new(2)), client.receive().await.unwrap());

        client.send(MqttPacket::Disconnect(DisconnectPacket {})).await;
        assert_matches!(client.receive().await, Err(GateError::TransportClosed(_)));

        wait_for_close(task).await;
        assert!(fixture.gateway.connections().is_empty());
        assert_eq!(ConnectionState::Closed, connection.state());
        assert_eq!(4, connection.packets_received());
        assert_eq!(3, connection.packets_sent());

        assert_eq!(vec!(("abc123".to_string(), publish)), fixture.resolver.forwarded());
    }

    #[tokio::test]
    async fn handshake_rejects_non_connect_first_packet() {
        let fixture = default_fixture();
        let (mut client, task) = fixture.start_connection();

        client.send(MqttPacket::Pingreq(PingreqPacket {})).await;
        assert_matches!(client.receive().await, Err(GateError::TransportClosed(_)));

        wait_for_close(task).await;
        assert!(fixture.gateway.connections().is_empty());
    }

    #[tokio::test]
    async fn handshake_unsupported_protocol_version_gets_connack() {
        let fixture = default_fixture();
        let (mut client, task) = fixture.start_connection();

        client.send_bytes(&[16, 13, 0, 4, 77, 81, 84, 84, 5, 2, 0, 30, 0, 1, 97]).await;
        let connack = client.receive().await.unwrap();
        assert_matches!(connack, MqttPacket::Connack(ConnackPacket { return_code: ConnectReturnCode::UnacceptableProtocolVersion, .. }));
        assert_matches!(client.receive().await, Err(GateError::TransportClosed(_)));

        wait_for_close(task).await;
    }

    #[tokio::test]
    async fn handshake_invalid_client_id_gets_identifier_rejected() {
        let fixture = default_fixture();
        let (mut client, task) = fixture.start_connection();

        client.send_bytes(&[16, 15, 0, 4, 77, 81, 84, 84, 4, 2, 0, 30, 0, 3, 97, 45, 98]).await;
        let connack = client.receive().await.unwrap();
        assert_matches!(connack, MqttPacket::Connack(ConnackPacket { return_code: ConnectReturnCode::IdentifierRejected, .. }));

        wait_for_close(task).await;
    }

    #[tokio::test]
    async fn handshake_malformed_connect_closes_without_connack() {
        let fixture = default_fixture();
        let (mut client, task) = fixture.start_connection();

        // will qos set without the will flag
        client.send_bytes(&[16, 13, 0, 4, 77, 81, 84, 84, 4, 10, 0, 30, 0, 1, 97]).await;
        assert_matches!(client.receive().await, Err(GateError::TransportClosed(_)));

        wait_for_close(task).await;
    }

    #[tokio::test]
    async fn handshake_authentication_failure() {
        let fixture = default_fixture();
        let (mut client, task) = fixture.start_connection();

        let connect = ConnectPacket::builder()
            .with_client_id("abc123")
            .with_username("mallory")
            .with_password("secret".as_bytes())
            .build();

        let connack = client.connect(connect).await;
        assert_eq!(ConnectReturnCode::IdentifierRejected, connack.return_code());
        assert_matches!(client.receive().await, Err(GateError::TransportClosed(_)));

        wait_for_close(task).await;
        assert_eq!(0, fixture.gateway.sessions().count());
    }

    #[tokio::test]
    async fn handshake_timeout_closes_connection() {
        let fixture = TestFixture::new(GatewayOptionsBuilder::new()
            .with_handshake_timeout(Duration::from_millis(50))
            .build());
        let (mut client, task) = fixture.start_connection();

        wait_for_close(task).await;
        assert_matches!(client.receive().await, Err(GateError::TransportClosed(_)));
    }

    #[tokio::test]
    async fn empty_client_id_gets_generated_session_id() {
        let fixture = default_fixture();
        let (mut client, _task) = fixture.start_connection();

        client.connect(create_connect("", 30, true)).await;

        let session = fixture.gateway.find_connection(1).unwrap().session().unwrap();
        assert_eq!(20, session.client_id().len());
    }

    #[tokio::test]
    async fn subscribe_failures_are_per_filter() {
        let fixture = default_fixture();
        let (mut client, _task) = fixture.start_connection();
        client.connect(create_connect("abc123", 30, true)).await;

        let mut bytes = encode_packet(&MqttPacket::Subscribe(SubscribePacket::new(5, "blocked/#", QualityOfService::AtLeastOnce))).unwrap();
        // append the remaining two filters by hand since the invalid one cannot be encoded
        let extra : Vec<u8> = [
            &[0u8, 14][..], "sensors/+/temp".as_bytes(), &[2u8][..],
            &[0u8, 12][..], "bad/#/filter".as_bytes(), &[0u8][..],
        ].concat();
        bytes[1] += extra.len() as u8;
        bytes.extend_from_slice(&extra);
        client.send_bytes(&bytes).await;

        assert_eq!(
            MqttPacket::Suback(SubackPacket::new(5, vec!(SubackReturnCode::Failure, SubackReturnCode::GrantedQos2, SubackReturnCode::Failure))),
            client.receive().await.unwrap());

        let session = fixture.gateway.find_connection(1).unwrap().session().unwrap();
        assert_eq!(1, session.topics().len());
        assert_eq!(Some(QualityOfService::ExactlyOnce), session.topic_qos("sensors/+/temp"));
    }

    #[tokio::test]
    async fn unsubscribe_and_ping() {
        let fixture = default_fixture();
        let (mut client, _task) = fixture.start_connection();
        client.connect(create_connect("abc123", 30, true)).await;

        client.send(MqttPacket::Subscribe(SubscribePacket::new(1, "a/b", QualityOfService::AtMostOnce))).await;
        client.receive().await.unwrap();

        client.send(MqttPacket::Unsubscribe(UnsubscribePacket::new(2, "a/b"))).await;
        assert_eq!(MqttPacket::Unsuback(UnsubackPacket::new(2)), client.receive().await.unwrap());

        client.send(MqttPacket::Unsubscribe(UnsubscribePacket::new(3, "never/subscribed"))).await;
        assert_eq!(MqttPacket::Unsuback(UnsubackPacket::new(3)), client.receive().await.unwrap());

        client.send(MqttPacket::Pingreq(PingreqPacket {})).await;
        assert_eq!(MqttPacket::Pingresp(PingrespPacket {}), client.receive().await.unwrap());

        let session = fixture.gateway.find_connection(1).unwrap().session().unwrap();
        assert!(session.topics().is_empty());
    }

    #[tokio::test]
    async fn inbound_qos2_forwards_once_on_release() {
        let fixture = default_fixture();
        let (mut client, _task) = fixture.start_connection();
        client.connect(create_connect("abc123", 30, true)).await;

        let publish = PublishPacket::builder("room/1".to_string(), QualityOfService::ExactlyOnce)
            .with_packet_id(7)
            .with_payload("exactly".as_bytes().to_vec())
            .build();

        client.send(MqttPacket::Publish(publish.clone())).await;
        assert_eq!(MqttPacket::Pubrec(PubrecPacket::new(7)), client.receive().await.unwrap());

        let redelivery = PublishPacket { duplicate: true, ..publish.clone() };
        client.send(MqttPacket::Publish(redelivery)).await;
        assert_eq!(MqttPacket::Pubrec(PubrecPacket::new(7)), client.receive().await.unwrap());
        assert!(fixture.resolver.forwarded().is_empty());

        client.send(MqttPacket::Pubrel(PubrelPacket::new(7))).await;
        assert_eq!(MqttPacket::Pubcomp(PubcompPacket::new(7)), client.receive().await.unwrap());

        client.send(MqttPacket::Pubrel(PubrelPacket::new(7))).await;
        assert_eq!(MqttPacket::Pubcomp(PubcompPacket::new(7)), client.receive().await.unwrap());

        let forwarded = fixture.resolver.forwarded();
        assert_eq!(1, forwarded.len());
        assert_eq!("exactly".as_bytes(), forwarded[0].1.payload());
    }

    #[tokio::test]
    async fn outbound_qos1_delivery_completes_on_puback() {
        let fixture = default_fixture();
        let (mut client, _task) = fixture.start_connection();
        client.connect(create_connect("abc123", 30, true)).await;

        let connection = fixture.gateway.find_connection(1).unwrap();
        let (sender, receiver) = tokio::sync::oneshot::channel();
        let completion : AckCompletion = Box::new(move |entry: &AckEntry| {
            let _ = sender.send(entry.ack_state());
        });

        connection.deliver(PublishPacket::new("room/1", QualityOfService::AtLeastOnce, "pushed".as_bytes()), Some(completion)).await.unwrap();

        let packet_id = match client.receive().await.unwrap() {
            MqttPacket::Publish(publish) => {
                assert_eq!("pushed".as_bytes(), publish.payload());
                publish.packet_id()
            }
            other => { panic!("expected publish, received {}", other) }
        };
        assert_ne!(0, packet_id);

        client.send(MqttPacket::Puback(PubackPacket::new(packet_id))).await;
        assert_eq!(AckState::Puback, tokio::time::timeout(TEST_TIMEOUT, receiver).await.unwrap().unwrap());
        assert!(connection.session().unwrap().outbound().is_empty());
    }

    #[tokio::test]
    async fn outbound_qos2_delivery_runs_full_handshake() {
        let fixture = default_fixture();
        let (mut client, _task) = fixture.start_connection();
        client.connect(create_connect("abc123", 30, true)).await;

        let connection = fixture.gateway.find_connection(1).unwrap();
        let (sender, receiver) = tokio::sync::oneshot::channel();
        let completion : AckCompletion = Box::new(move |entry: &AckEntry| {
            let _ = sender.send(entry.ack_state());
        });

        connection.deliver(PublishPacket::new("room/1", QualityOfService::ExactlyOnce, "once".as_bytes()), Some(completion)).await.unwrap();

        let packet_id = match client.receive().await.unwrap() {
            MqttPacket::Publish(publish) => { publish.packet_id() }
            other => { panic!("expected publish, received {}", other) }
        };

        client.send(MqttPacket::Pubrec(PubrecPacket::new(packet_id))).await;
        assert_eq!(MqttPacket::Pubrel(PubrelPacket::new(packet_id)), client.receive().await.unwrap());
        assert!(connection.session().unwrap().outbound().contains(packet_id));

        client.send(MqttPacket::Pubcomp(PubcompPacket::new(packet_id))).await;
        assert_eq!(AckState::Pubcomp, tokio::time::timeout(TEST_TIMEOUT, receiver).await.unwrap().unwrap());
    }

    #[tokio::test]
    async fn unexpected_packet_ignored_by_default() {
        let fixture = default_fixture();
        let (mut client, _task) = fixture.start_connection();
        client.connect(create_connect("abc123", 30, true)).await;

        client.send(MqttPacket::Pingresp(PingrespPacket {})).await;
        client.send(MqttPacket::Pingreq(PingreqPacket {})).await;
        assert_eq!(MqttPacket::Pingresp(PingrespPacket {}), client.receive().await.unwrap());
    }

    #[tokio::test]
    async fn unexpected_packet_disconnect_policy() {
        let fixture = TestFixture::new(GatewayOptionsBuilder::new()
            .with_unknown_packet_policy(UnknownPacketPolicy::Disconnect)
            .build());
        let (mut client, task) = fixture.start_connection();
        client.connect(create_connect("abc123", 30, true)).await;

        client.send(MqttPacket::Pingresp(PingrespPacket {})).await;
        assert_matches!(client.receive().await, Err(GateError::TransportClosed(_)));

        wait_for_close(task).await;
    }

    #[tokio::test]
    async fn malformed_packet_closes_active_connection() {
        let fixture = default_fixture();
        let (mut client, task) = fixture.start_connection();
        client.connect(create_connect("abc123", 30, true)).await;

        client.send_bytes(&[0xF0, 0]).await;
        assert_matches!(client.receive().await, Err(GateError::TransportClosed(_)));

        wait_for_close(task).await;
        assert!(fixture.gateway.connections().is_empty());
    }

    #[tokio::test]
    async fn keep_alive_expiry_closes_and_forwards_will() {
        let fixture = TestFixture::new(GatewayOptionsBuilder::new()
            .with_network_delay_allowance(Duration::ZERO)
            .build());
        let (mut client, task) = fixture.start_connection();

        let will = PublishPacket::new("clients/abc123/status", QualityOfService::AtLeastOnce, "gone".as_bytes());
        let connect = ConnectPacket::builder()
            .with_client_id("abc123")
            .with_keep_alive_interval_seconds(1)
            .with_will(will)
            .build();
        client.connect(connect).await;

        wait_for_close(task).await;
        assert_matches!(client.receive().await, Err(GateError::TransportClosed(_)));

        let forwarded = fixture.resolver.forwarded();
        assert_eq!(1, forwarded.len());
        assert_eq!("clients/abc123/status", forwarded[0].1.topic());
    }

    #[tokio::test]
    async fn graceful_disconnect_drops_will() {
        let fixture = default_fixture();
        let (mut client, task) = fixture.start_connection();

        let will = PublishPacket::new("clients/abc123/status", QualityOfService::AtLeastOnce, "gone".as_bytes());
        client.connect(ConnectPacket::builder().with_client_id("abc123").with_will(will).build()).await;

        client.send(MqttPacket::Disconnect(DisconnectPacket {})).await;
        wait_for_close(task).await;

        assert!(fixture.resolver.forwarded().is_empty());
    }

    #[tokio::test]
    async fn stop_closes_connection() {
        let fixture = default_fixture();
        let (mut client, task) = fixture.start_connection();
        client.connect(create_connect("abc123", 30, true)).await;

        fixture.gateway.find_connection(1).unwrap().stop();

        wait_for_close(task).await;
        assert_matches!(client.receive().await, Err(GateError::TransportClosed(_)));
    }

    #[tokio::test]
    async fn persistent_session_survives_reconnect() {
        let fixture = default_fixture();

        let (mut client, task) = fixture.start_connection();
        let connack = client.connect(create_connect("sticky", 30, false)).await;
        assert!(!connack.session_present());

        client.send(MqttPacket::Subscribe(SubscribePacket::new(1, "room/#", QualityOfService::AtLeastOnce))).await;
        client.receive().await.unwrap();
        client.send(MqttPacket::Disconnect(DisconnectPacket {})).await;
        wait_for_close(task).await;

        let (mut client, _task) = fixture.start_connection();
        let connack = client.connect(create_connect("sticky", 30, false)).await;
        assert!(connack.session_present());

        let session = fixture.gateway.sessions().get("sticky").unwrap();
        assert_eq!(Some(QualityOfService::AtLeastOnce), session.topic_qos("room/#"));
    }

    #[tokio::test]
    async fn clean_session_is_removed_on_close() {
        let fixture = default_fixture();

        let (mut client, task) = fixture.start_connection();
        client.connect(create_connect("transient", 30, true)).await;
        assert!(fixture.gateway.sessions().get("transient").is_some());

        client.send(MqttPacket::Disconnect(DisconnectPacket {})).await;
        wait_for_close(task).await;

        assert!(fixture.gateway.sessions().get("transient").is_none());
    }

    #[tokio::test]
    async fn second_connection_takes_over_client_id() {
        let fixture = default_fixture();

        let (mut first, first_task) = fixture.start_connection();
        first.connect(create_connect("abc123", 30, false)).await;

        let (mut second, _second_task) = fixture.start_connection();
        let connack = second.connect(create_connect("abc123", 30, false)).await;
        assert!(connack.session_present());

        wait_for_close(first_task).await;
        assert!(fixture.gateway.find_connection(1).is_none());
        assert_eq!("abc123", fixture.gateway.find_connection(2).unwrap().client_id());
    }

    #[tokio::test]
    async fn persistent_reconnect_does_not_resume_clean_session() {
        let fixture = default_fixture();

        let (mut first, first_task) = fixture.start_connection();
        first.connect(create_connect("abc123", 30, true)).await;
        let first_session = fixture.gateway.find_connection(1).unwrap().session().unwrap();

        let (mut second, _second_task) = fixture.start_connection();
        let connack = second.connect(create_connect("abc123", 30, false)).await;
        assert!(!connack.session_present());

        wait_for_close(first_task).await;

        let stored = fixture.gateway.sessions().get("abc123").unwrap();
        let second_session = fixture.gateway.find_connection(2).unwrap().session().unwrap();
        assert!(Arc::ptr_eq(&stored, &second_session));
        assert!(!Arc::ptr_eq(&stored, &first_session));
    }

    #[tokio::test]
    async fn takeover_forwards_will_of_replaced_connection() {
        let fixture = default_fixture();

        let old_will = PublishPacket::new("will/old", QualityOfService::AtMostOnce, "old".as_bytes());
        let (mut first, first_task) = fixture.start_connection();
        first.connect(ConnectPacket::builder().with_client_id("abc123").with_keep_alive_interval_seconds(30).with_clean_session(false).with_will(old_will).build()).await;

        let new_will = PublishPacket::new("will/new", QualityOfService::AtMostOnce, "new".as_bytes());
        let (mut second, second_task) = fixture.start_connection();
        second.connect(ConnectPacket::builder().with_client_id("abc123").with_keep_alive_interval_seconds(30).with_clean_session(false).with_will(new_will).build()).await;

        wait_for_close(first_task).await;
        let topics : Vec<String> = fixture.resolver.forwarded().iter().map(|(_, will)| will.topic().to_string()).collect();
        assert_eq!(vec!("will/old".to_string()), topics);

        second.send(MqttPacket::Disconnect(DisconnectPacket {})).await;
        wait_for_close(second_task).await;

        assert_eq!(1, fixture.resolver.forwarded().len());
        assert!(fixture.gateway.sessions().get("abc123").unwrap().will().is_none());
    }

    #[tokio::test]
    async fn duplicate_filters_get_one_return_code_each() {
        let fixture = default_fixture();
        let (mut client, _task) = fixture.start_connection();
        client.connect(create_connect("abc123", 30, true)).await;

        client.send_bytes(&[0x82, 14, 0, 9, 0, 3, b'a', b'/', b'b', 0, 0, 3, b'a', b'/', b'b', 1]).await;
        assert_eq!(
            MqttPacket::Suback(SubackPacket::new(9, vec!(SubackReturnCode::GrantedQos0, SubackReturnCode::GrantedQos1))),
            client.receive().await.unwrap());

        let session = fixture.gateway.find_connection(1).unwrap().session().unwrap();
        assert_eq!(1, session.topics().len());
        assert_eq!(Some(QualityOfService::AtLeastOnce), session.topic_qos("a/b"));
    }

    #[tokio::test]
    async fn failed_delivery_leaves_outbound_queue_clear() {
        let fixture = default_fixture();
        let (mut client, _task) = fixture.start_connection();
        client.connect(create_connect("abc123", 30, true)).await;

        let connection = fixture.gateway.find_connection(1).unwrap();
        let outbound_len = || connection.session().unwrap().outbound().len();

        let empty = PublishPacket::new("room/1", QualityOfService::AtLeastOnce, &[]);
        assert_matches!(connection.deliver(empty, None).await, Err(GateError::PacketValidation(_)));
        assert_eq!(0, outbound_len());

        let (sender, receiver) = tokio::sync::oneshot::channel();
        let completion : AckCompletion = Box::new(move |entry: &AckEntry| {
            let _ = sender.send(entry.packet_id());
        });
        connection.deliver(PublishPacket::new("room/1", QualityOfService::AtLeastOnce, "ok".as_bytes()), Some(completion)).await.unwrap();

        let packet_id = match client.receive().await.unwrap() {
            MqttPacket::Publish(publish) => { publish.packet_id() }
            other => { panic!("expected publish, received {}", other) }
        };

        client.send(MqttPacket::Puback(PubackPacket::new(packet_id))).await;
        assert_eq!(packet_id, tokio::time::timeout(TEST_TIMEOUT, receiver).await.unwrap().unwrap());
        assert_eq!(0, outbound_len());
    }

    #[tokio::test]
    async fn retained_qos2_publish_stored_on_release() {
        let fixture = default_fixture();
        let (mut client, _task) = fixture.start_connection();
        client.connect(create_connect("abc123", 30, true)).await;
        let session = fixture.gateway.find_connection(1).unwrap().session().unwrap();

        let publish = PublishPacket::builder("room/1".to_string(), QualityOfService::ExactlyOnce)
            .with_packet_id(4)
            .with_retain(true)
            .with_payload("kept".as_bytes().to_vec())
            .build();

        client.send(MqttPacket::Publish(publish)).await;
        assert_eq!(MqttPacket::Pubrec(PubrecPacket::new(4)), client.receive().await.unwrap());
        assert!(session.retained().is_empty());

        client.send(MqttPacket::Pubrel(PubrelPacket::new(4))).await;
        assert_eq!(MqttPacket::Pubcomp(PubcompPacket::new(4)), client.receive().await.unwrap());

        let retained = session.retained();
        assert_eq!(1, retained.len());
        assert_eq!("kept".as_bytes(), retained[0].payload());
    }

    #[test]
    fn gateway_requires_registered_provider() {
        let options = GatewayOptionsBuilder::new().with_session_provider("redis").build();
        let result = Gateway::new(options, Arc::new(AllowAllAuthenticator {}), Arc::new(RequestedQosResolver {}), &SessionProviders::new());

        assert_matches!(result, Err(GateError::SessionFailure(_)));
    }
}
