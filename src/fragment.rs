//! Reassembly of fragmented handshake messages.
//!
//! Fragments of one message may arrive in any order, overlap, or repeat.
//! Coverage is tracked as merged byte ranges. The first fragment seen for a
//! message sequence fixes its type and total length.

use std::collections::{BTreeMap, BTreeSet};

use nom::bytes::complete::take;

use crate::message::{Header, MessageType, HANDSHAKE_HEADER_LEN};
use crate::Error;

/// Largest handshake message we are willing to reassemble.
const MAX_MESSAGE_LEN: u32 = 1 << 17;

/// Outcome of pushing one handshake fragment.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Pushed {
    /// More fragments are needed.
    Incomplete,
    /// The fragment completed the message. Contains the whole message with
    /// an unfragmented header.
    Complete(Vec<u8>),
    /// The fragment belongs to a message that was already completed.
    Retransmit,
}

#[derive(Debug)]
struct Pending {
    msg_type: MessageType,
    length: u32,
    data: Vec<u8>,
    /// Sorted, non-overlapping, non-adjacent covered ranges.
    covered: Vec<(u32, u32)>,
}

impl Pending {
    fn new(msg_type: MessageType, length: u32) -> Self {
        Pending {
            msg_type,
            length,
            data: vec![0; length as usize],
            covered: Vec::new(),
        }
    }

    fn insert(&mut self, offset: u32, body: &[u8]) {
        let start = offset;
        let end = offset + body.len() as u32;
        self.data[start as usize..end as usize].copy_from_slice(body);

        let mut merged = (start, end);
        let mut ranges = Vec::with_capacity(self.covered.len() + 1);
        for &(s, e) in &self.covered {
            if e < merged.0 || s > merged.1 {
                ranges.push((s, e));
            } else {
                merged = (merged.0.min(s), merged.1.max(e));
            }
        }
        ranges.push(merged);
        ranges.sort_unstable();
        self.covered = ranges;
    }

    fn is_complete(&self) -> bool {
        self.covered == [(0, self.length)]
    }

    fn into_message(self, message_seq: u16) -> Vec<u8> {
        let header = Header {
            msg_type: self.msg_type,
            length: self.length,
            message_seq,
            fragment_offset: 0,
            fragment_length: self.length,
        };
        let mut out = Vec::with_capacity(HANDSHAKE_HEADER_LEN + self.data.len());
        header.serialize(&mut out);
        out.extend_from_slice(&self.data);
        out
    }
}

/// Buffer of partially received handshake messages, keyed by message sequence.
#[derive(Debug)]
pub(crate) struct FragmentBuffer {
    max_messages: usize,
    pending: BTreeMap<u16, Pending>,
    completed: BTreeSet<u16>,
}

impl FragmentBuffer {
    pub fn new(max_messages: usize) -> Self {
        FragmentBuffer {
            max_messages,
            pending: BTreeMap::new(),
            completed: BTreeSet::new(),
        }
    }

    /// Push the handshake fragment at the start of `input`.
    ///
    /// Returns the unconsumed input, since a record may carry several
    /// fragments back to back.
    pub fn push<'a>(&mut self, input: &'a [u8]) -> Result<(&'a [u8], Pushed), Error> {
        let (rest, header) = Header::parse(input)?;
        let (rest, body) =
            take::<_, _, nom::error::Error<&[u8]>>(header.fragment_length as usize)(rest)?;

        let end = header
            .fragment_offset
            .checked_add(header.fragment_length)
            .ok_or(Error::FragmentLengthMismatch)?;
        if end > header.length || header.length > MAX_MESSAGE_LEN {
            return Err(Error::FragmentLengthMismatch);
        }

        let seq = header.message_seq;

        if self.completed.contains(&seq) {
            trace!("Fragment of completed message_seq {}", seq);
            return Ok((rest, Pushed::Retransmit));
        }

        if let Some(pending) = self.pending.get(&seq) {
            if pending.length != header.length || pending.msg_type != header.msg_type {
                return Err(Error::FragmentLengthMismatch);
            }
        } else if header.is_fragment() && self.pending.len() >= self.max_messages {
            debug!(
                "Fragment buffer full ({} messages), rejecting message_seq {}",
                self.max_messages, seq
            );
            return Err(Error::FragmentBufferFull);
        }

        let pending = self
            .pending
            .entry(seq)
            .or_insert_with(|| Pending::new(header.msg_type, header.length));
        pending.insert(header.fragment_offset, body);

        if !pending.is_complete() {
            trace!(
                "Buffered fragment {}..{} of {} for message_seq {}",
                header.fragment_offset,
                end,
                header.length,
                seq
            );
            return Ok((rest, Pushed::Incomplete));
        }

        let Some(pending) = self.pending.remove(&seq) else {
            return Ok((rest, Pushed::Incomplete));
        };
        self.completed.insert(seq);

        Ok((rest, Pushed::Complete(pending.into_message(seq))))
    }

    #[cfg(test)]
    /// Number of messages currently being reassembled.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}
