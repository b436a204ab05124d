/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

/*!
Tracking for packets whose protocol exchange has not finished yet.

An [`AckQueue`] is a power-of-two ring of [`AckEntry`] values with an index from packet id to
ring slot, plus one extra slot for an in-flight ping.  Completed entries are only ever surfaced
from the head of the ring, so consumers see completions in the order the requests were issued.
 */

use crate::encode::encode_packet_unchecked;
use crate::error::{GateError, GateResult};
use crate::mqtt::*;

use log::*;
use std::collections::{hash_map, HashMap};
use std::fmt;
use std::sync::{Mutex, MutexGuard};

/// Callback invoked once when a completed entry is drained and handed to
/// [`AckEntry::complete`].
pub type AckCompletion = Box<dyn FnOnce(&AckEntry) + Send + 'static>;

/// Progress of a tracked exchange.  Every variant other than `Waiting` names the last
/// acknowledgement packet type applied to the entry.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum AckState {

    /// No acknowledgement has been received yet
    #[default]
    Waiting,

    /// A QoS 1 publish was acknowledged
    Puback,

    /// A QoS 2 publish was received by the peer; a Pubcomp is still outstanding
    Pubrec,

    /// A QoS 2 publish sent by the peer was released
    Pubrel,

    /// A QoS 2 publish sent to the peer finished its exchange
    Pubcomp,

    /// A subscribe was acknowledged
    Suback,

    /// An unsubscribe was acknowledged
    Unsuback,

    /// A ping was answered
    Pingresp,
}

impl AckState {

    /// Whether the exchange this state belongs to is finished
    pub fn is_complete(&self) -> bool {
        !matches!(self, AckState::Waiting | AckState::Pubrec)
    }
}

impl fmt::Display for AckState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// One tracked exchange
pub struct AckEntry {
    message_type: PacketType,
    ack_state: AckState,
    packet_id: u16,
    request: MqttPacket,
    request_bytes: Vec<u8>,
    ack_bytes: Option<Vec<u8>>,
    completion: Option<AckCompletion>,
}

impl AckEntry {

    /// Type of the packet that started the exchange
    pub fn message_type(&self) -> PacketType { self.message_type }

    /// Last acknowledgement applied to the entry
    pub fn ack_state(&self) -> AckState { self.ack_state }

    /// Packet id of the exchange.  Zero for pings.
    pub fn packet_id(&self) -> u16 { self.packet_id }

    /// The packet that started the exchange
    pub fn request(&self) -> &MqttPacket { &self.request }

    /// Encoding of the packet that started the exchange
    pub fn request_bytes(&self) -> &[u8] { self.request_bytes.as_slice() }

    /// Encoding of the most recent acknowledgement, if any
    pub fn ack_bytes(&self) -> Option<&[u8]> { self.ack_bytes.as_deref() }

    /// Whether the exchange is finished
    pub fn is_complete(&self) -> bool { self.ack_state.is_complete() }

    /// Consumes the entry, invoking its completion callback if one was supplied.
    pub fn complete(mut self) {
        if let Some(completion) = self.completion.take() {
            completion(&self);
        }
    }
}

impl fmt::Debug for AckEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AckEntry {{ ")?;
        write!(f, "message_type: {}, ", self.message_type)?;
        write!(f, "ack_state: {}, ", self.ack_state)?;
        write!(f, "packet_id: {}, ", self.packet_id)?;
        write!(f, "request_bytes: {} bytes, ", self.request_bytes.len())?;
        match &self.ack_bytes {
            Some(bytes) => { write!(f, "ack_bytes: {} bytes, ", bytes.len())?; }
            None => { write!(f, "ack_bytes: None, ")?; }
        }
        if self.completion.is_some() {
            write!(f, "completion: Some(...) ")?;
        } else {
            write!(f, "completion: None ")?;
        }

        write!(f, "}}")
    }
}

struct AckQueueState {
    slots: Vec<Option<AckEntry>>,
    head: usize,
    length: usize,
    slot_index: HashMap<u16, usize>,
    ping: Option<AckEntry>,
    next_packet_id: u16,
}

impl AckQueueState {

    fn mask(&self) -> usize {
        self.slots.len() - 1
    }

    fn grow(&mut self) {
        let old_capacity = self.slots.len();
        let new_capacity = old_capacity * 2;

        let mut slots : Vec<Option<AckEntry>> = Vec::with_capacity(new_capacity);
        for i in 0..self.length {
            let old_slot = (self.head + i) & self.mask();
            slots.push(self.slots[old_slot].take());
        }
        slots.resize_with(new_capacity, || None);

        self.slots = slots;
        self.head = 0;

        self.slot_index.clear();
        for (slot, entry) in self.slots.iter().enumerate().take(self.length) {
            if let Some(entry) = entry {
                self.slot_index.insert(entry.packet_id, slot);
            }
        }

        debug!("ack_queue - grew capacity from {} to {}", old_capacity, new_capacity);
    }

    fn push(&mut self, entry: AckEntry) {
        if self.length == self.slots.len() {
            self.grow();
        }

        let slot = (self.head + self.length) & self.mask();
        self.slot_index.insert(entry.packet_id, slot);
        self.slots[slot] = Some(entry);
        self.length += 1;
    }

    fn remove(&mut self, packet_id: u16) -> Option<AckEntry> {
        let slot = self.slot_index.remove(&packet_id)?;
        let entry = self.slots[slot].take();

        // close the gap so the ring stays contiguous from head
        let offset = slot.wrapping_sub(self.head) & self.mask();
        for i in offset..(self.length - 1) {
            let to = (self.head + i) & self.mask();
            let from = (self.head + i + 1) & self.mask();
            let moved = self.slots[from].take();
            if let Some(moved_entry) = moved.as_ref() {
                self.slot_index.insert(moved_entry.packet_id, to);
            }
            self.slots[to] = moved;
        }

        self.length -= 1;
        entry
    }

    fn pop_completed_head(&mut self) -> Option<AckEntry> {
        if self.length == 0 {
            return None;
        }

        let head = self.head;
        let is_complete = self.slots[head].as_ref().map(|entry| entry.is_complete()).unwrap_or(false);
        if !is_complete {
            return None;
        }

        let entry = self.slots[head].take()?;
        self.slot_index.remove(&entry.packet_id);
        self.head = (head + 1) & self.mask();
        self.length -= 1;

        Some(entry)
    }
}

/// A mutex-guarded, auto-growing ring of in-flight exchanges keyed by packet id.
pub struct AckQueue {
    state: Mutex<AckQueueState>,
}

fn get_wait_target_packet_id(packet: &MqttPacket) -> GateResult<u16> {
    let packet_id = match packet {
        MqttPacket::Publish(publish) => {
            if publish.qos == QualityOfService::AtMostOnce {
                0
            } else {
                publish.packet_id
            }
        }
        MqttPacket::Subscribe(subscribe) => { subscribe.packet_id }
        MqttPacket::Unsubscribe(unsubscribe) => { unsubscribe.packet_id }
        _ => { 0 }
    };

    if packet_id == 0 {
        warn!("ack_queue - {} is not a valid wait target", packet.packet_type());
        return Err(GateError::new_invalid_wait_target(packet.packet_type()));
    }

    Ok(packet_id)
}

fn is_ack_applicable(message_type: PacketType, ack_type: PacketType) -> bool {
    match message_type {
        PacketType::Publish => {
            matches!(ack_type, PacketType::Puback | PacketType::Pubrec | PacketType::Pubrel | PacketType::Pubcomp)
        }
        PacketType::Subscribe => { ack_type == PacketType::Suback }
        PacketType::Unsubscribe => { ack_type == PacketType::Unsuback }
        _ => { false }
    }
}

fn ack_state_for_packet(packet: &MqttPacket) -> Option<AckState> {
    match packet {
        MqttPacket::Puback(_) => { Some(AckState::Puback) }
        MqttPacket::Pubrec(_) => { Some(AckState::Pubrec) }
        MqttPacket::Pubrel(_) => { Some(AckState::Pubrel) }
        MqttPacket::Pubcomp(_) => { Some(AckState::Pubcomp) }
        MqttPacket::Suback(_) => { Some(AckState::Suback) }
        MqttPacket::Unsuback(_) => { Some(AckState::Unsuback) }
        MqttPacket::Pingresp(_) => { Some(AckState::Pingresp) }
        _ => { None }
    }
}

impl AckQueue {

    /// Creates a queue whose ring starts with room for `initial_capacity` entries, rounded up
    /// to a power of two.
    pub fn new(initial_capacity: usize) -> Self {
        let capacity = initial_capacity.max(1).next_power_of_two();

        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);

        AckQueue {
            state: Mutex::new(AckQueueState {
                slots,
                head: 0,
                length: 0,
                slot_index: HashMap::new(),
                ping: None,
                next_packet_id: 1,
            })
        }
    }

    fn lock(&self) -> MutexGuard<'_, AckQueueState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Starts tracking an exchange.
    ///
    /// Publishes with QoS > 0, subscribes and unsubscribes are keyed by packet id.  A ping
    /// occupies the dedicated ping slot.  A packet id that is already in flight is only accepted
    /// for a publish carrying the duplicate flag, in which case the existing entry keeps its
    /// place and callback and only its request snapshot is refreshed.
    pub fn wait(&self, packet: &MqttPacket, completion: Option<AckCompletion>) -> GateResult<()> {
        let request_bytes = encode_packet_unchecked(packet)?;

        if let MqttPacket::Pingreq(_) = packet {
            let mut state = self.lock();
            if state.ping.is_some() {
                debug!("ack_queue - replacing pending ping");
            }

            state.ping = Some(AckEntry {
                message_type: PacketType::Pingreq,
                ack_state: AckState::Waiting,
                packet_id: 0,
                request: packet.clone(),
                request_bytes,
                ack_bytes: None,
                completion,
            });

            return Ok(());
        }

        let packet_id = get_wait_target_packet_id(packet)?;

        let mut state = self.lock();
        if let Some(slot) = state.slot_index.get(&packet_id).copied() {
            if let MqttPacket::Publish(publish) = packet {
                if publish.duplicate {
                    if let Some(existing) = state.slots[slot].as_mut() {
                        existing.request = packet.clone();
                        existing.request_bytes = request_bytes;
                    }

                    debug!("ack_queue - duplicate publish {} left in place", packet_id);
                    return Ok(());
                }
            }

            warn!("ack_queue - packet id {} is already in flight", packet_id);
            return Err(GateError::new_duplicate_packet_id(packet_id));
        }

        state.push(AckEntry {
            message_type: packet.packet_type(),
            ack_state: AckState::Waiting,
            packet_id,
            request: packet.clone(),
            request_bytes,
            ack_bytes: None,
            completion,
        });

        Ok(())
    }

    /// Applies an acknowledgement to the matching entry.
    ///
    /// Returns false, without changing anything, when no entry matches (a late or duplicate
    /// ack) or when the ack type does not belong to the entry's exchange.
    pub fn ack(&self, packet: &MqttPacket) -> bool {
        let ack_state = match ack_state_for_packet(packet) {
            Some(ack_state) => { ack_state }
            None => {
                warn!("ack_queue - {} is not an acknowledgement", packet.packet_type());
                return false;
            }
        };

        let ack_bytes = encode_packet_unchecked(packet).ok();
        let mut state = self.lock();

        if ack_state == AckState::Pingresp {
            return match state.ping.as_mut() {
                Some(ping) => {
                    ping.ack_state = AckState::Pingresp;
                    ping.ack_bytes = ack_bytes;
                    true
                }
                None => {
                    debug!("ack_queue - pingresp without a pending ping");
                    false
                }
            };
        }

        let packet_id = packet.packet_id().unwrap_or(0);
        let slot = match state.slot_index.get(&packet_id) {
            Some(slot) => { *slot }
            None => {
                debug!("ack_queue - no in-flight entry for {} {}", packet.packet_type(), packet_id);
                return false;
            }
        };

        match state.slots[slot].as_mut() {
            Some(entry) => {
                if !is_ack_applicable(entry.message_type, packet.packet_type()) {
                    warn!("ack_queue - {} cannot acknowledge {} {}", packet.packet_type(), entry.message_type, packet_id);
                    return false;
                }

                entry.ack_state = ack_state;
                entry.ack_bytes = ack_bytes;
                true
            }
            None => { false }
        }
    }

    /// Removes and returns completed entries: the answered ping, if any, followed by the
    /// contiguous run of completed entries at the head of the ring, in submission order.
    pub fn acked(&self) -> Vec<AckEntry> {
        let mut state = self.lock();
        let mut completed = Vec::new();

        let ping_answered = state.ping.as_ref().map(|ping| ping.is_complete()).unwrap_or(false);
        if ping_answered {
            if let Some(ping) = state.ping.take() {
                completed.push(ping);
            }
        }

        while let Some(entry) = state.pop_completed_head() {
            completed.push(entry);
        }

        completed
    }

    /// Stops tracking the exchange with the given packet id, without invoking its callback.
    /// Entries behind it keep their order.
    pub fn remove(&self, packet_id: u16) -> Option<AckEntry> {
        let removed = self.lock().remove(packet_id);
        if removed.is_some() {
            debug!("ack_queue - removed in-flight entry {}", packet_id);
        }

        removed
    }

    /// Allocates a packet id that is not currently in flight, cycling through 1..=65535.
    pub fn acquire_packet_id(&self) -> GateResult<u16> {
        let mut state = self.lock();
        let start_id = state.next_packet_id;
        let mut check_id = start_id;

        loop {
            if state.next_packet_id == u16::MAX {
                state.next_packet_id = 1;
            } else {
                state.next_packet_id += 1;
            }

            if let hash_map::Entry::Vacant(_) = state.slot_index.entry(check_id) {
                return Ok(check_id);
            }

            if state.next_packet_id == start_id {
                let message = "acquire_packet_id - packet id space exhausted";
                error!("{}", message);
                return Err(GateError::new_other_error(message));
            }

            check_id = state.next_packet_id;
        }
    }

    /// Whether an entry with the packet id is in flight
    pub fn contains(&self, packet_id: u16) -> bool {
        self.lock().slot_index.contains_key(&packet_id)
    }

    /// Whether a ping is waiting for its response
    pub fn ping_pending(&self) -> bool {
        self.lock().ping.is_some()
    }

    /// Number of in-flight entries, the ping slot excluded
    pub fn len(&self) -> usize {
        self.lock().length
    }

    /// Whether no entries are in flight, the ping slot excluded
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current ring capacity; always a power of two
    pub fn capacity(&self) -> usize {
        self.lock().slots.len()
    }

    /// Packet ids of in-flight entries from head to tail
    pub fn pending_packet_ids(&self) -> Vec<u16> {
        let state = self.lock();
        (0..state.length)
            .filter_map(|i| state.slots[(state.head + i) & state.mask()].as_ref())
            .map(|entry| entry.packet_id)
            .collect()
    }
}

impl Default for AckQueue {
    fn default() -> Self {
        AckQueue::new(crate::config::DEFAULT_ACK_QUEUE_SIZE)
    }
}

impl fmt::Debug for AckQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        write!(f, "AckQueue {{ capacity: {}, length: {}, head: {}, ping_pending: {} }}", state.slots.len(), state.length, state.head, state.ping.is_some())
    }
}
