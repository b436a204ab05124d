/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

/*!
In-memory session provider.
 */

use crate::error::GateResult;
use crate::session::{Session, SessionProvider};

use log::*;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Session provider backed by a read-write-locked map.  Lookups share the read lock; creation and
/// removal take the write lock.
pub struct MemoryProvider {
    ack_queue_size: usize,
    sessions: RwLock<HashMap<String, Arc<Session>>>,
}

impl MemoryProvider {

    /// Creates an empty provider whose sessions get ack queues of `ack_queue_size` entries
    pub fn new(ack_queue_size: usize) -> Self {
        MemoryProvider {
            ack_queue_size,
            sessions: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryProvider {
    fn default() -> Self {
        MemoryProvider::new(crate::config::DEFAULT_ACK_QUEUE_SIZE)
    }
}

impl SessionProvider for MemoryProvider {

    fn new_session(&self, id: &str) -> GateResult<Arc<Session>> {
        let session = Arc::new(Session::new(id, self.ack_queue_size));

        let mut sessions = self.sessions.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        if sessions.insert(id.to_string(), session.clone()).is_some() {
            debug!("session - memory provider replaced session {}", id);
        }

        Ok(session)
    }

    fn get(&self, id: &str) -> Option<Arc<Session>> {
        let sessions = self.sessions.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        sessions.get(id).cloned()
    }

    fn delete(&self, id: &str) {
        let mut sessions = self.sessions.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        sessions.remove(id);
    }

    fn count(&self) -> usize {
        let sessions = self.sessions.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        sessions.len()
    }

    fn close(&self) {
        let mut sessions = self.sessions.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        info!("session - memory provider closing with {} sessions", sessions.len());
        sessions.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn random_client_id() -> String {
        uuid::Uuid::new_v4().simple().to_string()
    }

    #[test]
    fn new_get_delete_count() {
        let provider = MemoryProvider::new(8);
        let id = random_client_id();

        assert!(provider.get(&id).is_none());
        let session = provider.new_session(&id).unwrap();
        assert_eq!(id, session.client_id());
        assert_eq!(8, session.inbound().capacity());
        assert_eq!(1, provider.count());

        assert!(Arc::ptr_eq(&session, &provider.get(&id).unwrap()));

        provider.delete(&id);
        assert!(provider.get(&id).is_none());
        assert_eq!(0, provider.count());
    }

    #[test]
    fn new_session_replaces_existing() {
        let provider = MemoryProvider::default();
        let id = random_client_id();

        let first = provider.new_session(&id).unwrap();
        let second = provider.new_session(&id).unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(1, provider.count());
    }

    #[test]
    fn close_releases_everything() {
        let provider = MemoryProvider::default();
        for _ in 0..5 {
            provider.new_session(&random_client_id()).unwrap();
        }

        provider.close();
        assert_eq!(0, provider.count());
    }

    #[test]
    fn concurrent_access() {
        let provider = Arc::new(MemoryProvider::default());
        let mut handles = Vec::new();

        for _ in 0..8 {
            let provider = provider.clone();
            handles.push(thread::spawn(move || {
                for _ in 0..50 {
                    let id = random_client_id();
                    provider.new_session(&id).unwrap();
                    assert!(provider.get(&id).is_some());
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(400, provider.count());
    }
}
