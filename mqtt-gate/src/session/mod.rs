/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

/*!
Durable per-client state and the pluggable stores it lives in.

A [`Session`] outlives any single network connection.  Sessions are created and looked up through
a [`SessionProvider`], and providers are registered by name in a [`SessionProviders`] registry so
that the backend can be swapped without touching the gateway.
 */

pub mod memory;

use crate::ackqueue::AckQueue;
use crate::decode::decode_frame;
use crate::encode::encode_packet;
use crate::error::{GateError, GateResult};
use crate::mqtt::*;

use base64::Engine;
use log::*;
use rand::RngCore;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

const SESSION_ID_RANDOM_BYTES : usize = 15;

struct SessionState {
    connect: Option<ConnectPacket>,
    will: Option<PublishPacket>,
    retained: Vec<PublishPacket>,
    topics: HashMap<String, QualityOfService>,
}

/// Durable per-client identity, subscriptions and in-flight exchanges.
pub struct Session {
    client_id: String,
    state: RwLock<SessionState>,
    inbound: AckQueue,
    outbound: AckQueue,
}

/// Copies a connect packet through an encode/decode cycle so the stored snapshot shares nothing
/// with the caller's instance.
fn snapshot_connect(connect: &ConnectPacket) -> GateResult<ConnectPacket> {
    let bytes = encode_packet(&MqttPacket::Connect(connect.clone()))?;
    let (packet, _) = decode_frame(&bytes)?;

    match packet {
        MqttPacket::Connect(snapshot) => { Ok(snapshot) }
        _ => {
            let message = "snapshot_connect - connect packet did not decode as a connect packet";
            error!("{}", message);
            Err(GateError::new_session_failure(message))
        }
    }
}

impl Session {

    /// Creates an empty session whose ack queues start at `ack_queue_size` entries.
    pub fn new(client_id: &str, ack_queue_size: usize) -> Self {
        Session {
            client_id: client_id.to_string(),
            state: RwLock::new(SessionState {
                connect: None,
                will: None,
                retained: Vec::new(),
                topics: HashMap::new(),
            }),
            inbound: AckQueue::new(ack_queue_size),
            outbound: AckQueue::new(ack_queue_size),
        }
    }

    fn read_state(&self) -> RwLockReadGuard<'_, SessionState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Stores a private copy of the connect packet and its will, discarding any subscriptions
    /// and retained messages from a previous life of the session.
    pub fn init(&self, connect: &ConnectPacket) -> GateResult<()> {
        let snapshot = snapshot_connect(connect)?;

        let mut state = self.write_state();
        state.will = snapshot.will.clone();
        state.connect = Some(snapshot);
        state.topics.clear();
        state.retained.clear();

        Ok(())
    }

    /// Replaces the stored connect packet and will on reconnect, keeping subscriptions.
    pub fn update(&self, connect: &ConnectPacket) -> GateResult<()> {
        let snapshot = snapshot_connect(connect)?;

        let mut state = self.write_state();
        state.will = snapshot.will.clone();
        state.connect = Some(snapshot);

        Ok(())
    }

    /// Identifier the session is stored under
    pub fn client_id(&self) -> &str { self.client_id.as_str() }

    /// Copy of the last accepted connect packet
    pub fn connect(&self) -> Option<ConnectPacket> {
        self.read_state().connect.clone()
    }

    /// Will message derived from the last accepted connect packet
    pub fn will(&self) -> Option<PublishPacket> {
        self.read_state().will.clone()
    }

    /// Drops the will, e.g. after a graceful disconnect
    pub fn clear_will(&self) {
        self.write_state().will = None;
    }

    /// Records a subscription, replacing the QoS of an existing one
    pub fn add_topic(&self, topic_filter: &str, qos: QualityOfService) {
        self.write_state().topics.insert(topic_filter.to_string(), qos);
    }

    /// Removes a subscription, returning whether it existed
    pub fn remove_topic(&self, topic_filter: &str) -> bool {
        self.write_state().topics.remove(topic_filter).is_some()
    }

    /// QoS of a subscription, if present
    pub fn topic_qos(&self, topic_filter: &str) -> Option<QualityOfService> {
        self.read_state().topics.get(topic_filter).copied()
    }

    /// Snapshot of all subscriptions
    pub fn topics(&self) -> HashMap<String, QualityOfService> {
        self.read_state().topics.clone()
    }

    /// Stores a retained message.  A message for an already-retained topic replaces it, and an
    /// empty payload removes the topic's retained message.
    pub fn retain_message(&self, publish: &PublishPacket) {
        let mut state = self.write_state();
        state.retained.retain(|retained| retained.topic != publish.topic);

        if !publish.payload.is_empty() {
            state.retained.push(publish.clone());
        }
    }

    /// Snapshot of retained messages in storage order
    pub fn retained(&self) -> Vec<PublishPacket> {
        self.read_state().retained.clone()
    }

    /// Client-originated QoS 2 publishes waiting for their Pubrel
    pub fn inbound(&self) -> &AckQueue { &self.inbound }

    /// Gateway-originated publishes waiting for their Puback or Pubcomp
    pub fn outbound(&self) -> &AckQueue { &self.outbound }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.read_state();
        write!(f, "Session {{ client_id: {}, topics: {}, retained: {}, has_will: {}, inbound: {:?}, outbound: {:?} }}",
            self.client_id, state.topics.len(), state.retained.len(), state.will.is_some(), self.inbound, self.outbound)
    }
}

/// A store of sessions keyed by client id
pub trait SessionProvider : Send + Sync {

    /// Creates a session under `id`, replacing any existing one
    fn new_session(&self, id: &str) -> GateResult<Arc<Session>>;

    /// Looks up a session
    fn get(&self, id: &str) -> Option<Arc<Session>>;

    /// Removes a session, if present
    fn delete(&self, id: &str);

    /// Number of stored sessions
    fn count(&self) -> usize;

    /// Releases all sessions
    fn close(&self);
}

impl fmt::Debug for dyn SessionProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionProvider {{ count: {} }}", self.count())
    }
}

/// Named registry of session providers
#[derive(Default)]
pub struct SessionProviders {
    providers: RwLock<HashMap<String, Arc<dyn SessionProvider>>>,
}

impl SessionProviders {

    /// Creates an empty registry
    pub fn new() -> Self {
        SessionProviders::default()
    }

    /// Registers a provider under a name.  Fails if the name is already taken.
    pub fn register(&self, name: &str, provider: Arc<dyn SessionProvider>) -> GateResult<()> {
        let mut providers = self.providers.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        if providers.contains_key(name) {
            let message = format!("SessionProviders::register - provider \"{}\" is already registered", name);
            error!("{}", message);
            return Err(GateError::new_session_failure(message));
        }

        info!("session - registered provider \"{}\"", name);
        providers.insert(name.to_string(), provider);
        Ok(())
    }

    /// Removes a provider, returning it if it was registered
    pub fn unregister(&self, name: &str) -> Option<Arc<dyn SessionProvider>> {
        let mut providers = self.providers.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        providers.remove(name)
    }

    /// Looks up a provider by name
    pub fn get(&self, name: &str) -> GateResult<Arc<dyn SessionProvider>> {
        let providers = self.providers.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        match providers.get(name) {
            Some(provider) => { Ok(provider.clone()) }
            None => {
                let message = format!("SessionProviders::get - unknown provider \"{}\"", name);
                error!("{}", message);
                Err(GateError::new_session_failure(message))
            }
        }
    }
}

/// Front end over the provider selected by name
#[derive(Clone)]
pub struct SessionManager {
    provider_name: String,
    provider: Arc<dyn SessionProvider>,
}

impl SessionManager {

    /// Binds to the named provider in `providers`
    pub fn new(providers: &SessionProviders, provider_name: &str) -> GateResult<Self> {
        Ok(SessionManager {
            provider_name: provider_name.to_string(),
            provider: providers.get(provider_name)?,
        })
    }

    /// Name of the provider the manager is bound to
    pub fn provider_name(&self) -> &str { self.provider_name.as_str() }

    /// Generates a random session identifier: 15 random bytes, URL-safe base64 encoded
    pub fn generate_session_id() -> String {
        let mut bytes = [0u8; SESSION_ID_RANDOM_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);

        base64::engine::general_purpose::URL_SAFE.encode(bytes)
    }

    /// Creates a session.  An empty id gets a generated one.
    pub fn new_session(&self, id: &str) -> GateResult<Arc<Session>> {
        if id.is_empty() {
            let generated = SessionManager::generate_session_id();
            debug!("session - generated session id {}", generated);
            return self.provider.new_session(&generated);
        }

        self.provider.new_session(id)
    }

    /// Looks up a session
    pub fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.provider.get(id)
    }

    /// Removes a session
    pub fn delete(&self, id: &str) {
        self.provider.delete(id)
    }

    /// Number of stored sessions
    pub fn count(&self) -> usize {
        self.provider.count()
    }

    /// Releases all sessions in the provider
    pub fn close(&self) {
        self.provider.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::memory::MemoryProvider;
    use assert_matches::assert_matches;

    fn create_connect() -> ConnectPacket {
        let will = PublishPacket::builder("clients/abc/status".to_string(), QualityOfService::AtLeastOnce)
            .with_retain(true)
            .with_payload("offline".as_bytes().to_vec())
            .build();

        ConnectPacket::builder()
            .with_client_id("abc123")
            .with_keep_alive_interval_seconds(30)
            .with_clean_session(true)
            .with_will(will)
            .with_username("user")
            .build()
    }

    #[test]
    fn init_stores_private_copy() {
        let session = Session::new("abc123", 16);
        let mut connect = create_connect();
        session.init(&connect).unwrap();

        connect.client_id = "mutated".to_string();
        connect.will = None;

        let stored = session.connect().unwrap();
        assert_eq!("abc123", stored.client_id());
        assert_eq!(Some("user"), stored.username());
        assert_eq!("clients/abc/status", session.will().unwrap().topic());
    }

    #[test]
    fn init_resets_topics_update_keeps_them() {
        let session = Session::new("abc123", 16);
        session.init(&create_connect()).unwrap();
        session.add_topic("room/+", QualityOfService::AtLeastOnce);

        session.update(&create_connect()).unwrap();
        assert_eq!(Some(QualityOfService::AtLeastOnce), session.topic_qos("room/+"));

        session.init(&create_connect()).unwrap();
        assert!(session.topics().is_empty());
    }

    #[test]
    fn topics_add_and_remove() {
        let session = Session::new("abc123", 16);
        session.add_topic("a/b", QualityOfService::AtMostOnce);
        session.add_topic("a/b", QualityOfService::ExactlyOnce);

        assert_eq!(1, session.topics().len());
        assert_eq!(Some(QualityOfService::ExactlyOnce), session.topic_qos("a/b"));
        assert!(session.remove_topic("a/b"));
        assert!(!session.remove_topic("a/b"));
    }

    #[test]
    fn retained_messages_replace_and_clear() {
        let session = Session::new("abc123", 16);
        session.retain_message(&PublishPacket::new("a", QualityOfService::AtMostOnce, "1".as_bytes()));
        session.retain_message(&PublishPacket::new("b", QualityOfService::AtMostOnce, "2".as_bytes()));
        session.retain_message(&PublishPacket::new("a", QualityOfService::AtMostOnce, "3".as_bytes()));

        let retained = session.retained();
        assert_eq!(2, retained.len());
        assert_eq!("3".as_bytes(), retained.iter().find(|p| p.topic() == "a").unwrap().payload());

        session.retain_message(&PublishPacket::new("b", QualityOfService::AtMostOnce, &[]));
        assert_eq!(1, session.retained().len());
    }

    #[test]
    fn providers_register_and_lookup() {
        let providers = SessionProviders::new();
        providers.register("mem", Arc::new(MemoryProvider::new(16))).unwrap();

        assert_matches!(providers.register("mem", Arc::new(MemoryProvider::new(16))), Err(GateError::SessionFailure(_)));
        assert!(providers.get("mem").is_ok());
        assert_matches!(providers.get("redis"), Err(GateError::SessionFailure(_)));

        assert!(providers.unregister("mem").is_some());
        assert!(providers.get("mem").is_err());
    }

    #[test]
    fn manager_generates_ids_for_empty_client_id() {
        let providers = SessionProviders::new();
        providers.register("mem", Arc::new(MemoryProvider::new(16))).unwrap();
        let manager = SessionManager::new(&providers, "mem").unwrap();

        let session = manager.new_session("").unwrap();
        assert_eq!(20, session.client_id().len());
        assert!(manager.get(session.client_id()).is_some());
        assert_eq!(1, manager.count());
    }

    #[test]
    fn generated_ids_are_url_safe() {
        for _ in 0..32 {
            let id = SessionManager::generate_session_id();
            assert!(id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        }
    }
}
