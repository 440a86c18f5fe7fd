// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sortable job identifiers.
//!
//! A [`JobId`] is 12 bytes: 4 bytes of big-endian unix seconds, 5 bytes
//! derived from the host and process, and a 3-byte rolling counter. Byte
//! order therefore equals creation order (up to clock skew between hosts),
//! which the claim scan relies on for enqueue-time tiebreaking.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

const RAW_LEN: usize = 12;
const HEX_LEN: usize = 24;

/// Unique, creation-time-sortable identifier for a job.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JobId([u8; RAW_LEN]);

/// Process-wide machine bytes and counter, initialized on first use.
struct IdState {
    machine: [u8; 5],
    counter: AtomicU32,
}

fn id_state() -> &'static IdState {
    static STATE: OnceLock<IdState> = OnceLock::new();
    STATE.get_or_init(|| {
        let host = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "localhost".to_string());
        let digest = Sha256::digest(host.as_bytes());
        let pid = std::process::id() as u16;
        let mut machine = [0u8; 5];
        machine[..3].copy_from_slice(&digest[..3]);
        machine[3..].copy_from_slice(&pid.to_be_bytes());
        // Seed the counter from sub-second nanos so restarts within the
        // same second do not replay the same sequence.
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.subsec_nanos())
            .unwrap_or(0);
        IdState {
            machine,
            counter: AtomicU32::new(seed),
        }
    })
}

impl JobId {
    /// Generate a fresh id stamped with the given wall-clock time.
    pub fn generate(epoch_ms: u64) -> Self {
        let state = id_state();
        let count = state.counter.fetch_add(1, Ordering::SeqCst);
        Self::from_parts((epoch_ms / 1000) as u32, state.machine, count)
    }

    /// Assemble an id from its raw components (tests fabricate orderings).
    pub fn from_parts(secs: u32, machine: [u8; 5], counter: u32) -> Self {
        let mut raw = [0u8; RAW_LEN];
        raw[..4].copy_from_slice(&secs.to_be_bytes());
        raw[4..9].copy_from_slice(&machine);
        raw[9..].copy_from_slice(&counter.to_be_bytes()[1..]);
        Self(raw)
    }

    /// Parse a 24-character hex string.
    pub fn parse(s: &str) -> Option<Self> {
        if s.len() != HEX_LEN {
            return None;
        }
        let mut raw = [0u8; RAW_LEN];
        for (i, chunk) in raw.iter_mut().enumerate() {
            *chunk = u8::from_str_radix(s.get(2 * i..2 * i + 2)?, 16).ok()?;
        }
        Some(Self(raw))
    }

    /// Creation time in unix seconds (the id's leading bytes).
    pub fn created_secs(&self) -> u32 {
        u32::from_be_bytes([self.0[0], self.0[1], self.0[2], self.0[3]])
    }

    /// Hex rendering, 24 lowercase characters.
    pub fn to_hex(&self) -> String {
        let mut out = String::with_capacity(HEX_LEN);
        for b in &self.0 {
            out.push_str(&format!("{:02x}", b));
        }
        out
    }

    /// True when the hex rendering starts with `prefix` (CLI convenience,
    /// like abbreviated commit hashes).
    pub fn matches_prefix(&self, prefix: &str) -> bool {
        self.to_hex().starts_with(prefix)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JobId({})", self.to_hex())
    }
}

impl Serialize for JobId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for JobId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        JobId::parse(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid job id: {}", s)))
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
