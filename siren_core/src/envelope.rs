//! Binary envelope codec.
//!
//! Push envelopes and geometry payloads travel as MessagePack maps with named fields.
//! The relay never looks inside a payload; decoding happens at the subscriber.

use serde::{Deserialize, Serialize};

use crate::topology::{Topology, TopologyError};

/// What happened to an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    /// First CAP message of a phenomenon.
    New,
    /// A later revision.
    Update,
    /// The phenomenon was cancelled.
    Cancel,
}

/// The live broadcast message. Carries just enough to notify and to trigger a lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PushEnvelope {
    /// Phenomenon identifier.
    pub identifier: String,
    /// Kind of change.
    pub action: Action,
    /// Event name, e.g. "Severe Thunderstorm Warning".
    pub event: String,
    /// NWS event code.
    #[serde(default)]
    pub event_code: String,
    /// Sender display name.
    #[serde(default)]
    pub sender: String,
}

/// Errors raised by the codec.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The payload isn't a valid MessagePack message of the expected shape.
    #[error("Malformed payload: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
    /// The value couldn't be encoded.
    #[error("Failed to encode payload: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
    /// The topology decoded but can't be expanded.
    #[error("Invalid topology: {0}")]
    Topology(#[from] TopologyError),
}

impl PushEnvelope {
    /// Encodes the envelope.
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        Ok(rmp_serde::to_vec_named(self)?)
    }

    /// Decodes an envelope received from the live channel.
    pub fn decode(payload: &[u8]) -> Result<Self, CodecError> {
        Ok(rmp_serde::from_slice(payload)?)
    }
}

impl Topology {
    /// Encodes the topology as the geometry service does.
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        Ok(rmp_serde::to_vec_named(self)?)
    }

    /// Decodes a geometry response.
    pub fn decode(payload: &[u8]) -> Result<Self, CodecError> {
        Ok(rmp_serde::from_slice(payload)?)
    }
}
