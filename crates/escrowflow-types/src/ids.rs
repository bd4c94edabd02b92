//! Identifiers and fixed-width byte values used throughout EscrowFlow.
//!
//! Addresses, blockhashes and signatures are raw byte arrays rendered as hex.
//! Run identifiers use UUIDv7 so log lines sort by start time.

use std::{fmt, str::FromStr};

use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::EscrowFlowError;

/// Serde adapter rendering fixed-size byte arrays as lowercase hex strings.
mod hex_array {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer, const N: usize>(
        bytes: &[u8; N],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>, const N: usize>(
        deserializer: D,
    ) -> Result<[u8; N], D::Error> {
        let text = String::deserialize(deserializer)?;
        let raw = hex::decode(&text).map_err(D::Error::custom)?;
        raw.try_into()
            .map_err(|raw: Vec<u8>| D::Error::invalid_length(raw.len(), &"a fixed-size hex string"))
    }
}

fn parse_hex<const N: usize>(text: &str) -> Result<[u8; N], EscrowFlowError> {
    let raw = hex::decode(text.trim_start_matches("0x"))
        .map_err(|e| EscrowFlowError::Serialization(format!("invalid hex: {e}")))?;
    raw.try_into().map_err(|raw: Vec<u8>| {
        EscrowFlowError::Serialization(format!("expected {N} bytes, got {}", raw.len()))
    })
}

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

/// A 32-byte ledger address: a party's public key, an asset class, a program
/// identity, or a derived (off-curve) address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct Address(#[serde(with = "hex_array")] pub [u8; 32]);

impl Address {
    #[must_use]
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// First four bytes as hex, for compact log fields.
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }

    /// A fresh address that is distinct from every other one produced in this
    /// process. Not a valid public key.
    #[cfg(any(test, feature = "test-helpers"))]
    #[must_use]
    pub fn new_unique() -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        let mut bytes = [0u8; 32];
        bytes[..8].copy_from_slice(&n.to_le_bytes());
        bytes[31] = 0xEF;
        Self(bytes)
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.short())
    }
}

impl FromStr for Address {
    type Err = EscrowFlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_hex::<32>(s).map(Self)
    }
}

// ---------------------------------------------------------------------------
// EscrowId
// ---------------------------------------------------------------------------

/// Caller-chosen escrow identifier. Only ever used as a derivation seed.
///
/// Uniqueness per (maker, maker asset) pair is the caller's responsibility;
/// reusing one makes the initialize step fail on-ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct EscrowId(pub u64);

impl EscrowId {
    /// Wall-clock milliseconds plus a random offset below 10 000.
    #[must_use]
    pub fn generate() -> Self {
        let now_ms = u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or_default();
        let jitter: u64 = rand::thread_rng().gen_range(0..10_000);
        Self(now_ms.wrapping_add(jitter))
    }

    /// Little-endian seed bytes, as consumed by address derivation.
    #[must_use]
    pub fn to_le_bytes(self) -> [u8; 8] {
        self.0.to_le_bytes()
    }
}

impl fmt::Display for EscrowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Signature
// ---------------------------------------------------------------------------

/// A 64-byte ed25519 transaction signature. The first signature of a
/// transaction identifies it on the ledger.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature(#[serde(with = "hex_array")] pub [u8; 64]);

impl Signature {
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..6])
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", self.short())
    }
}

impl FromStr for Signature {
    type Err = EscrowFlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_hex::<64>(s).map(Self)
    }
}

// ---------------------------------------------------------------------------
// Blockhash
// ---------------------------------------------------------------------------

/// Recent blockhash a transaction commits to. Bounds its validity window.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Blockhash(#[serde(with = "hex_array")] pub [u8; 32]);

impl fmt::Display for Blockhash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Blockhash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Blockhash({})", hex::encode(&self.0[..4]))
    }
}

// ---------------------------------------------------------------------------
// FlowRunId
// ---------------------------------------------------------------------------

/// Identifies one orchestrator run, for log correlation and receipts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct FlowRunId(pub Uuid);

impl FlowRunId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for FlowRunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FlowRunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run:{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_hex_roundtrip() {
        let addr = Address::new([7u8; 32]);
        let text = addr.to_string();
        assert_eq!(text.len(), 64);
        let back: Address = text.parse().unwrap();
        assert_eq!(addr, back);
    }

    #[test]
    fn address_parse_rejects_wrong_length() {
        let err = "abcd".parse::<Address>().unwrap_err();
        assert!(matches!(err, EscrowFlowError::Serialization(_)));
    }

    #[test]
    fn address_serializes_as_hex_string() {
        let addr = Address::new([0xAB; 32]);
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, format!("\"{}\"", "ab".repeat(32)));
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(addr, back);
    }

    #[test]
    fn unique_addresses_differ() {
        assert_ne!(Address::new_unique(), Address::new_unique());
    }

    #[test]
    fn escrow_id_generate_is_time_based() {
        let before = u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap();
        let id = EscrowId::generate();
        assert!(id.0 >= before);
        assert!(id.0 < before + 10_000 + 60_000);
    }

    #[test]
    fn escrow_id_seed_bytes_are_little_endian() {
        assert_eq!(EscrowId(12345).to_le_bytes(), [0x39, 0x30, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn signature_serde_roundtrip() {
        let sig = Signature([3u8; 64]);
        let json = serde_json::to_string(&sig).unwrap();
        let back: Signature = serde_json::from_str(&json).unwrap();
        assert_eq!(sig, back);
    }

    #[test]
    fn run_ids_are_time_ordered() {
        let a = FlowRunId::new();
        let b = FlowRunId::new();
        assert!(a < b);
    }
}
