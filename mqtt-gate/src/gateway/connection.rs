/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

/*!
The per-connection state machine and the table of live connections.

Each accepted transport is driven by a single task through
`Accepting -> Handshaking -> Active -> Closing -> Closed`.  The task owns the read half of the
transport.  The write half sits behind an async lock shared with every [`ConnectionHandle`] so
that external push delivery and packet dispatch never interleave bytes.
 */

use crate::ackqueue::AckCompletion;
use crate::decode::read_packet;
use crate::encode::encode_packet;
use crate::error::{GateError, GateResult};
use crate::gateway::dispatch::{dispatch_packet, Disposition};
use crate::gateway::transport::GatewayTransport;
use crate::gateway::GatewayContext;
use crate::logging::*;
use crate::mqtt::*;
use crate::session::Session;

use log::*;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};
use tokio::io::{split, AsyncWrite, AsyncWriteExt, ReadHalf};

/// Lifecycle stage of a connection
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum ConnectionState {

    /// The transport has been accepted but nothing has been read yet
    #[default]
    Accepting,

    /// Waiting for, or processing, the Connect packet
    Handshaking,

    /// The handshake succeeded and packets are being dispatched
    Active,

    /// Teardown is in progress
    Closing,

    /// The transport is released and the connection is out of the table
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

struct ConnectionInfo {
    state: ConnectionState,
    client_id: String,
    keep_alive: Duration,
    clean_session: bool,
    will: Option<PublishPacket>,
    last_activity: Instant,
}

type ConnectionWriter = Box<dyn AsyncWrite + Send + Unpin>;

pub(crate) struct ConnectionShared {
    id: u64,
    info: RwLock<ConnectionInfo>,
    session: RwLock<Option<Arc<Session>>>,
    writer: tokio::sync::Mutex<ConnectionWriter>,
    stopped: AtomicBool,
    stop_signal: tokio::sync::Notify,
    closed: AtomicBool,
    packets_received: AtomicU64,
    packets_sent: AtomicU64,
}

impl ConnectionShared {

    fn new(id: u64, writer: ConnectionWriter) -> Self {
        ConnectionShared {
            id,
            info: RwLock::new(ConnectionInfo {
                state: ConnectionState::Accepting,
                client_id: String::new(),
                keep_alive: Duration::ZERO,
                clean_session: true,
                will: None,
                last_activity: Instant::now(),
            }),
            session: RwLock::new(None),
            writer: tokio::sync::Mutex::new(writer),
            stopped: AtomicBool::new(false),
            stop_signal: tokio::sync::Notify::new(),
            closed: AtomicBool::new(false),
            packets_received: AtomicU64::new(0),
            packets_sent: AtomicU64::new(0),
        }
    }

    fn read_info(&self) -> RwLockReadGuard<'_, ConnectionInfo> {
        self.info.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_info(&self) -> RwLockWriteGuard<'_, ConnectionInfo> {
        self.info.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn id(&self) -> u64 { self.id }

    pub(crate) fn client_id(&self) -> String {
        self.read_info().client_id.clone()
    }

    fn state(&self) -> ConnectionState {
        self.read_info().state
    }

    fn set_state(&self, state: ConnectionState) {
        let mut info = self.write_info();
        if info.state != state {
            debug!("gateway - connection {} - {} -> {}", self.id, info.state, state);
            info.state = state;
        }
    }

    fn session(&self) -> Option<Arc<Session>> {
        self.session.read().unwrap_or_else(|poisoned| poisoned.into_inner()).clone()
    }

    fn mark_activity(&self) {
        self.write_info().last_activity = Instant::now();
        self.packets_received.fetch_add(1, Ordering::Relaxed);
    }

    fn read_deadline(&self, network_delay_allowance: Duration) -> Instant {
        let info = self.read_info();
        info.last_activity + info.keep_alive + network_delay_allowance
    }

    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    fn stop(&self) {
        if !self.stopped.swap(true, Ordering::AcqRel) {
            info!("gateway - connection {} - stop requested", self.id);
        }

        self.stop_signal.notify_one();
    }

    /// Encodes and writes a packet under the writer lock
    pub(crate) async fn write_packet(&self, packet: &MqttPacket) -> GateResult<()> {
        let bytes = encode_packet(packet)?;
        self.write_encoded(packet, &bytes).await
    }

    async fn write_encoded(&self, packet: &MqttPacket, bytes: &[u8]) -> GateResult<()> {
        self.write_bytes(bytes).await?;

        log_packet("Sent packet: ", packet);
        self.packets_sent.fetch_add(1, Ordering::Relaxed);

        Ok(())
    }

    async fn write_bytes(&self, bytes: &[u8]) -> GateResult<()> {
        let mut writer = self.writer.lock().await;
        writer.write_all(bytes).await?;
        writer.flush().await?;

        Ok(())
    }

    async fn shutdown_writer(&self) {
        let mut writer = self.writer.lock().await;
        if let Err(error) = writer.shutdown().await {
            debug!("gateway - connection {} - transport shutdown failed: {}", self.id, error);
        }
    }
}

/// Shared reference to a live connection, used for push delivery and external control.
#[derive(Clone)]
pub struct ConnectionHandle {
    shared: Arc<ConnectionShared>,
}

impl ConnectionHandle {

    /// Numeric id the connection was registered under
    pub fn id(&self) -> u64 { self.shared.id }

    /// Client id of the session bound to the connection.  Empty until the handshake completes.
    pub fn client_id(&self) -> String { self.shared.client_id() }

    /// Current lifecycle stage
    pub fn state(&self) -> ConnectionState { self.shared.state() }

    /// Negotiated keep alive, with the gateway default substituted for a client keep alive of 0
    pub fn keep_alive(&self) -> Duration { self.shared.read_info().keep_alive }

    /// Instant of the last successfully read packet
    pub fn last_activity(&self) -> Instant { self.shared.read_info().last_activity }

    /// Number of packets read from the client
    pub fn packets_received(&self) -> u64 { self.shared.packets_received.load(Ordering::Relaxed) }

    /// Number of packets written to the client
    pub fn packets_sent(&self) -> u64 { self.shared.packets_sent.load(Ordering::Relaxed) }

    /// Session bound to the connection, once the handshake completes
    pub fn session(&self) -> Option<Arc<Session>> { self.shared.session() }

    /// Whether a stop has been requested
    pub fn is_stopped(&self) -> bool { self.shared.is_stopped() }

    /// Asks the connection to close.  The owning task notices at its next suspension point.
    pub fn stop(&self) {
        self.shared.stop()
    }

    /// Pushes a publish to the client.
    ///
    /// A QoS 1 or 2 publish with a packet id of zero is assigned a free id from the session's
    /// outbound ack queue, and is tracked there until the client finishes the exchange.
    /// `on_complete` runs when the exchange finishes; it is dropped unused for QoS 0.
    ///
    /// The publish is validated and encoded before it is tracked.  A publish that fails to encode
    /// or to be written is not left in the queue, apart from a duplicate of an exchange that was
    /// already in flight.
    pub async fn deliver(&self, mut publish: PublishPacket, on_complete: Option<AckCompletion>) -> GateResult<()> {
        if self.shared.state() != ConnectionState::Active {
            let message = format!("ConnectionHandle::deliver - connection {} is not active", self.shared.id);
            warn!("{}", message);
            return Err(GateError::new_transport_closed(message));
        }

        let session = match self.shared.session() {
            Some(session) => { session }
            None => {
                let message = format!("ConnectionHandle::deliver - connection {} has no session", self.shared.id);
                warn!("{}", message);
                return Err(GateError::new_session_failure(message));
            }
        };

        if publish.qos == QualityOfService::AtMostOnce {
            publish.packet_id = 0;
            return self.shared.write_packet(&MqttPacket::Publish(publish)).await;
        }

        if publish.packet_id == 0 {
            publish.packet_id = session.outbound().acquire_packet_id()?;
        }

        let packet_id = publish.packet_id;
        let packet = MqttPacket::Publish(publish);
        let bytes = encode_packet(&packet)?;

        let already_tracked = session.outbound().contains(packet_id);
        session.outbound().wait(&packet, on_complete)?;

        if let Err(error) = self.shared.write_encoded(&packet, &bytes).await {
            if !already_tracked {
                session.outbound().remove(packet_id);
            }
            return Err(error);
        }

        Ok(())
    }
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let info = self.shared.read_info();
        write!(f, "ConnectionHandle {{ id: {}, client_id: {}, state: {} }}", self.shared.id, info.client_id, info.state)
    }
}

/// Table of live connections keyed by a monotonically increasing numeric id
#[derive(Default)]
pub struct ConnectionTable {
    next_id: AtomicU64,
    connections: RwLock<HashMap<u64, ConnectionHandle>>,
}

impl ConnectionTable {

    /// Creates an empty table
    pub fn new() -> Self {
        ConnectionTable::default()
    }

    fn allocate_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn insert(&self, handle: ConnectionHandle) {
        let mut connections = self.connections.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        connections.insert(handle.id(), handle);
    }

    fn remove(&self, id: u64) -> Option<ConnectionHandle> {
        let mut connections = self.connections.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        connections.remove(&id)
    }

    /// Looks up a connection by id
    pub fn get(&self, id: u64) -> Option<ConnectionHandle> {
        let connections = self.connections.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        connections.get(&id).cloned()
    }

    /// Looks up the active connection bound to a client id
    pub fn find_by_client_id(&self, client_id: &str) -> Option<ConnectionHandle> {
        let connections = self.connections.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        connections.values()
            .find(|handle| handle.state() == ConnectionState::Active && handle.client_id() == client_id)
            .cloned()
    }

    /// Ids of all registered connections
    pub fn ids(&self) -> Vec<u64> {
        let connections = self.connections.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut ids : Vec<u64> = connections.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Number of registered connections
    pub fn len(&self) -> usize {
        let connections = self.connections.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        connections.len()
    }

    /// Whether no connections are registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

enum HandshakeOutcome {
    Accepted(Arc<Session>),
    Rejected,
}

struct Connection<T> where T : GatewayTransport {
    context: Arc<GatewayContext>,
    shared: Arc<ConnectionShared>,
    reader: ReadHalf<T>,
}

/// Drives an accepted transport through its whole lifecycle.
pub(crate) async fn run_connection<T>(context: Arc<GatewayContext>, transport: T) where T : GatewayTransport {
    let id = context.connections.allocate_id();
    let (reader, writer) = split(transport);

    let shared = Arc::new(ConnectionShared::new(id, Box::new(writer)));
    context.connections.insert(ConnectionHandle { shared: shared.clone() });
    info!("gateway - connection {} - accepted", id);

    let mut connection = Connection {
        context,
        shared,
        reader,
    };

    let graceful = connection.run().await;
    connection.teardown(graceful).await;
}

impl<T> Connection<T> where T : GatewayTransport {

    async fn run(&mut self) -> bool {
        self.shared.set_state(ConnectionState::Handshaking);

        let session = match self.handshake().await {
            Ok(HandshakeOutcome::Accepted(session)) => { session }
            Ok(HandshakeOutcome::Rejected) => { return false; }
            Err(error) => {
                info!("gateway - connection {} - handshake failed: {}", self.shared.id, error);
                if let Some(return_code) = error.connack_return_code() {
                    self.write_connack(false, return_code).await;
                }
                return false;
            }
        };

        self.shared.set_state(ConnectionState::Active);

        match self.process_active(&session).await {
            Ok(graceful) => { graceful }
            Err(GateError::Timeout(_)) => {
                info!("gateway - connection {} - keep alive exceeded", self.shared.id);
                false
            }
            Err(GateError::TransportClosed(_)) => {
                info!("gateway - connection {} - transport closed by peer", self.shared.id);
                false
            }
            Err(error) => {
                warn!("gateway - connection {} - closing after error: {}", self.shared.id, error);
                false
            }
        }
    }

    async fn write_connack(&self, session_present: bool, return_code: ConnectReturnCode) {
        let connack = MqttPacket::Connack(ConnackPacket {
            session_present,
            return_code,
        });

        if let Err(error) = self.shared.write_packet(&connack).await {
            info!("gateway - connection {} - failed to write connack: {}", self.shared.id, error);
        }
    }

    async fn handshake(&mut self) -> GateResult<HandshakeOutcome> {
        let handshake_timeout = self.context.options.handshake_timeout();

        let packet = tokio::time::timeout(handshake_timeout, read_packet(&mut self.reader)).await??;
        self.shared.mark_activity();
        log_packet("Received packet: ", &packet);

        let connect = match packet {
            MqttPacket::Connect(connect) => { connect }
            _ => {
                warn!("gateway - connection {} - first packet was {} rather than Connect", self.shared.id, packet.packet_type());
                return Ok(HandshakeOutcome::Rejected);
            }
        };

        if !self.context.authenticator.validate(connect.username(), connect.password()) {
            info!("gateway - connection {} - authentication failed for client \"{}\"", self.shared.id, connect.client_id());
            self.write_connack(false, ConnectReturnCode::IdentifierRejected).await;
            return Ok(HandshakeOutcome::Rejected);
        }

        let (session, session_present) = match self.bind_session(&connect) {
            Ok(result) => { result }
            Err(error) => {
                warn!("gateway - connection {} - session binding failed: {}", self.shared.id, error);
                self.write_connack(false, ConnectReturnCode::ServerUnavailable).await;
                return Ok(HandshakeOutcome::Rejected);
            }
        };

        let keep_alive = match connect.keep_alive_interval_seconds() {
            0 => { self.context.options.default_keep_alive() }
            seconds => { Duration::from_secs(seconds as u64) }
        };

        if let Some(existing) = self.context.connections.find_by_client_id(session.client_id()) {
            info!("gateway - connection {} - taking over client \"{}\" from connection {}", self.shared.id, session.client_id(), existing.id());
            existing.stop();
        }

        {
            let mut info = self.shared.write_info();
            info.client_id = session.client_id().to_string();
            info.keep_alive = keep_alive;
            info.clean_session = connect.clean_session();
            info.will = connect.will().cloned();
        }
        *self.shared.session.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(session.clone());

        self.shared.write_packet(&MqttPacket::Connack(ConnackPacket {
            session_present,
            return_code: ConnectReturnCode::Accepted,
        })).await?;

        info!("gateway - connection {} - handshake accepted for client \"{}\" with keep alive {:?}", self.shared.id, session.client_id(), keep_alive);

        Ok(HandshakeOutcome::Accepted(session))
    }

    fn bind_session(&self, connect: &ConnectPacket) -> GateResult<(Arc<Session>, bool)> {
        let sessions = &self.context.sessions;

        if !connect.clean_session() {
            if let Some(session) = sessions.get(connect.client_id()) {
                let resumable = session.connect().map(|stored| !stored.clean_session()).unwrap_or(false);
                if resumable {
                    session.update(connect)?;
                    return Ok((session, true));
                }

                debug!("gateway - connection {} - discarding clean session of client \"{}\"", self.shared.id, connect.client_id());
                sessions.delete(connect.client_id());
            }
        }

        let session = sessions.new_session(connect.client_id())?;
        session.init(connect)?;

        Ok((session, false))
    }

    async fn process_active(&mut self, session: &Arc<Session>) -> GateResult<bool> {
        let network_delay_allowance = self.context.options.network_delay_allowance();

        loop {
            trace!("gateway - connection {} - process_active loop", self.shared.id);

            if self.shared.is_stopped() {
                return Ok(false);
            }

            let deadline = tokio::time::Instant::from_std(self.shared.read_deadline(network_delay_allowance));
            let shared = self.shared.clone();

            let packet = tokio::select! {
                _ = shared.stop_signal.notified() => {
                    continue;
                }
                read_result = tokio::time::timeout_at(deadline, read_packet(&mut self.reader)) => {
                    read_result??
                }
            };

            self.shared.mark_activity();
            log_packet("Received packet: ", &packet);

            match dispatch_packet(&self.context, &self.shared, session, packet).await? {
                Disposition::Continue => {}
                Disposition::Disconnect => {
                    info!("gateway - connection {} - client disconnected", self.shared.id);
                    return Ok(true);
                }
                Disposition::Close => {
                    return Ok(false);
                }
            }
        }
    }

    async fn teardown(&self, graceful: bool) {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        self.shared.set_state(ConnectionState::Closing);

        self.context.connections.remove(self.shared.id);

        if let Some(session) = self.shared.session() {
            let will = self.shared.write_info().will.take();
            if graceful {
                if self.context.connections.find_by_client_id(session.client_id()).is_none() {
                    session.clear_will();
                }
            } else if let Some(will) = will {
                debug!("gateway - connection {} - handing will on \"{}\" to the resolver", self.shared.id, will.topic());
                self.context.resolver.forward(session.client_id(), &will);
            }

            let clean_session = self.shared.read_info().clean_session;
            if clean_session {
                if let Some(stored) = self.context.sessions.get(session.client_id()) {
                    if Arc::ptr_eq(&stored, &session) {
                        self.context.sessions.delete(session.client_id());
                    }
                }
            }
        }

        self.shared.shutdown_writer().await;
        self.shared.set_state(ConnectionState::Closed);

        info!("gateway - connection {} - closed after {} packets received and {} sent",
            self.shared.id,
            self.shared.packets_received.load(Ordering::Relaxed),
            self.shared.packets_sent.load(Ordering::Relaxed));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tokio::io::duplex;

    fn create_handle(table: &ConnectionTable) -> (ConnectionHandle, tokio::io::DuplexStream) {
        let (client, server) = duplex(1024);
        let (_, writer) = split(server);

        let handle = ConnectionHandle {
            shared: Arc::new(ConnectionShared::new(table.allocate_id(), Box::new(writer))),
        };
        table.insert(handle.clone());

        (handle, client)
    }

    #[test]
    fn table_ids_are_monotonic() {
        let table = ConnectionTable::new();
        let (first, _c1) = create_handle(&table);
        let (second, _c2) = create_handle(&table);

        assert_eq!(1, first.id());
        assert_eq!(2, second.id());
        assert_eq!(vec!(1, 2), table.ids());

        table.remove(1);
        let (third, _c3) = create_handle(&table);
        assert_eq!(3, third.id());
    }

    #[test]
    fn table_remove_happens_once() {
        let table = ConnectionTable::new();
        let (handle, _client) = create_handle(&table);

        assert!(table.remove(handle.id()).is_some());
        assert!(table.remove(handle.id()).is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn table_find_by_client_id_only_sees_active() {
        let table = ConnectionTable::new();
        let (handle, _client) = create_handle(&table);
        handle.shared.write_info().client_id = "abc123".to_string();

        assert!(table.find_by_client_id("abc123").is_none());

        handle.shared.set_state(ConnectionState::Active);
        assert_eq!(handle.id(), table.find_by_client_id("abc123").unwrap().id());
        assert!(table.find_by_client_id("other").is_none());
    }

    #[test]
    fn read_deadline_adds_keep_alive_and_allowance() {
        let table = ConnectionTable::new();
        let (handle, _client) = create_handle(&table);
        handle.shared.write_info().keep_alive = Duration::from_secs(30);

        let last_activity = handle.last_activity();
        assert_eq!(last_activity + Duration::from_secs(40), handle.shared.read_deadline(Duration::from_secs(10)));
    }

    #[test]
    fn stop_sets_flag() {
        let table = ConnectionTable::new();
        let (handle, _client) = create_handle(&table);

        assert!(!handle.is_stopped());
        handle.stop();
        handle.stop();
        assert!(handle.is_stopped());
    }

    #[tokio::test]
    async fn deliver_requires_active_connection() {
        let table = ConnectionTable::new();
        let (handle, _client) = create_handle(&table);

        let publish = PublishPacket::new("a/b", QualityOfService::AtLeastOnce, "hello".as_bytes());
        assert_matches!(handle.deliver(publish, None).await, Err(GateError::TransportClosed(_)));
    }

    #[tokio::test]
    async fn deliver_write_failure_untracks_publish() {
        let table = ConnectionTable::new();
        let (handle, client) = create_handle(&table);
        let session = Arc::new(Session::new("abc123", 16));
        *handle.shared.session.write().unwrap() = Some(session.clone());
        handle.shared.set_state(ConnectionState::Active);

        drop(client);

        let publish = PublishPacket::new("a/b", QualityOfService::AtLeastOnce, "hello".as_bytes());
        assert!(handle.deliver(publish, None).await.is_err());
        assert!(session.outbound().is_empty());
        assert_eq!(0, handle.packets_sent());
    }
}
