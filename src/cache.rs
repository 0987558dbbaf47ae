//! Append-only store of every handshake message sent or received.
//!
//! Flights pull the messages they wait for out of the cache, and the
//! Finished, CertificateVerify and extended master secret computations
//! concatenate cached messages into the transcript.

use std::collections::HashMap;

use crate::message::{Body, Handshake, MessageType};

#[derive(Debug)]
struct CacheEntry {
    is_local: bool,
    epoch: u16,
    message_seq: u16,
    msg_type: MessageType,
    /// Full message, unfragmented header included.
    data: Vec<u8>,
}

/// Which message a pull expects.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PullRule {
    pub msg_type: MessageType,
    pub epoch: u16,
    pub is_local: bool,
    pub optional: bool,
}

impl PullRule {
    pub const fn new(msg_type: MessageType, epoch: u16, is_local: bool, optional: bool) -> Self {
        PullRule {
            msg_type,
            epoch,
            is_local,
            optional,
        }
    }
}

/// Result of a successful [`HandshakeCache::full_pull_map`].
#[derive(Debug)]
pub(crate) struct Pulled<'a> {
    /// Highest message sequence matched. `None` if only optional rules were given
    /// and none matched.
    pub max_sequence: Option<u16>,
    pub messages: HashMap<MessageType, Body<'a>>,
}

#[derive(Debug, Default)]
pub(crate) struct HandshakeCache {
    entries: Vec<CacheEntry>,
}

impl HandshakeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a full handshake message. Returns false if an entry with the
    /// same direction, epoch and sequence already exists.
    pub fn push(
        &mut self,
        data: Vec<u8>,
        epoch: u16,
        message_seq: u16,
        msg_type: MessageType,
        is_local: bool,
    ) -> bool {
        let exists = self
            .entries
            .iter()
            .any(|e| e.is_local == is_local && e.epoch == epoch && e.message_seq == message_seq);
        if exists {
            return false;
        }

        trace!(
            "Cache {} {:?} epoch {} message_seq {}",
            if is_local { "local" } else { "remote" },
            msg_type,
            epoch,
            message_seq
        );

        self.entries.push(CacheEntry {
            is_local,
            epoch,
            message_seq,
            msg_type,
            data,
        });
        true
    }

    fn find(&self, rule: &PullRule, message_seq: u16) -> Option<&CacheEntry> {
        self.entries.iter().find(|e| {
            e.is_local == rule.is_local
                && e.epoch == rule.epoch
                && e.msg_type == rule.msg_type
                && e.message_seq == message_seq
        })
    }

    /// Pull the messages matching `rules`, in order, at consecutive sequence
    /// numbers starting from `floor`.
    ///
    /// An optional rule with no message at the expected sequence is skipped.
    /// Returns `None` if a required message is missing. A matched message that
    /// does not parse is left out of the map.
    pub fn full_pull_map(&self, floor: u16, rules: &[PullRule]) -> Option<Pulled<'_>> {
        let mut expected = floor;
        let mut max_sequence = None;
        let mut messages = HashMap::new();

        for rule in rules {
            let Some(entry) = self.find(rule, expected) else {
                if rule.optional {
                    continue;
                }
                return None;
            };

            match Handshake::parse(&entry.data) {
                Ok((_, handshake)) => {
                    messages.insert(rule.msg_type, handshake.body);
                }
                Err(e) => {
                    debug!("Cached {:?} failed to parse: {:?}", rule.msg_type, e);
                }
            }

            max_sequence = Some(expected);
            expected = expected.checked_add(1)?;
        }

        Some(Pulled {
            max_sequence,
            messages,
        })
    }

    /// Concatenate the newest message matching each rule. Absent messages are skipped.
    pub fn pull_and_merge(&self, rules: &[PullRule]) -> Vec<u8> {
        let mut out = Vec::new();
        for rule in rules {
            let newest = self
                .entries
                .iter()
                .filter(|e| {
                    e.is_local == rule.is_local
                        && e.epoch == rule.epoch
                        && e.msg_type == rule.msg_type
                })
                .max_by_key(|e| e.message_seq);
            if let Some(entry) = newest {
                out.extend_from_slice(&entry.data);
            }
        }
        out
    }

    /// Whether any message from the peer has a sequence at or above `floor`.
    pub fn has_remote_at_or_above(&self, floor: u16) -> bool {
        self.entries
            .iter()
            .any(|e| !e.is_local && e.message_seq >= floor)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
