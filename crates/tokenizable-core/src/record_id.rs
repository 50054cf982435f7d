use crate::error::{CoreError, Result};
use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::OnceLock;

/// Number of hex characters in the canonical rendering of a [`RecordId`].
pub const RECORD_ID_HEX_LENGTH: usize = 24;

const COUNTER_MASK: u32 = (1 << 24) - 1;

/// The primary identifier of a record.
///
/// Layout (12 bytes, rendered as 24 lowercase hex characters):
/// - 4 bytes: seconds since the unix epoch, big-endian
/// - 5 bytes: random value chosen once per process
/// - 3 bytes: counter, big-endian, starting at a random value
///
/// Ids created later in a process sort after earlier ones, which gives stores
/// a natural order for scans.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId([u8; 12]);

fn process_unique() -> &'static [u8; 5] {
    static PROCESS_UNIQUE: OnceLock<[u8; 5]> = OnceLock::new();
    PROCESS_UNIQUE.get_or_init(rand::random::<[u8; 5]>)
}

fn counter() -> &'static AtomicU32 {
    static COUNTER: OnceLock<AtomicU32> = OnceLock::new();
    COUNTER.get_or_init(|| AtomicU32::new(rand::random::<u32>() & COUNTER_MASK))
}

impl RecordId {
    /// Generates a fresh id stamped with the current time.
    pub fn generate() -> Self {
        Self::generate_at(Timestamp::now())
    }

    /// Generates a fresh id stamped with `at`.
    pub fn generate_at(at: Timestamp) -> Self {
        let seconds = at.as_second().clamp(0, i64::from(u32::MAX)) as u32;
        let count = counter().fetch_add(1, Ordering::SeqCst) & COUNTER_MASK;
        Self::from_parts(seconds, *process_unique(), count)
    }

    fn from_parts(seconds: u32, unique: [u8; 5], count: u32) -> Self {
        let mut bytes = [0_u8; 12];
        bytes[0..4].copy_from_slice(&seconds.to_be_bytes());
        bytes[4..9].copy_from_slice(&unique);
        bytes[9..12].copy_from_slice(&count.to_be_bytes()[1..4]);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 12] {
        &self.0
    }

    /// Returns the creation second encoded in the id.
    pub fn timestamp(&self) -> Option<Timestamp> {
        let seconds = u32::from_be_bytes([self.0[0], self.0[1], self.0[2], self.0[3]]);
        Timestamp::from_second(i64::from(seconds)).ok()
    }

    /// Parses the 24-character hex rendering of an id.
    pub fn parse(value: &str) -> Result<Self> {
        if value.len() != RECORD_ID_HEX_LENGTH {
            return Err(CoreError::InvalidRecordId(format!(
                "expected {} hex characters, got {}",
                RECORD_ID_HEX_LENGTH,
                value.len()
            )));
        }

        let mut bytes = [0_u8; 12];
        hex::decode_to_slice(value, &mut bytes).map_err(|e| {
            CoreError::InvalidRecordId(format!("not a hex string: '{}': {e}", value))
        })?;

        Ok(Self(bytes))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RecordId").field(&self.to_hex()).finish()
    }
}

impl FromStr for RecordId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for RecordId {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
