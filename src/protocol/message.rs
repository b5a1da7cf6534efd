//! Wire messages and the vote delivered to the host.

use crate::error::{Result, VotifierError};
use crate::protocol::signature;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outer JSON object of a request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Base64 HMAC-SHA256 of `payload`
    #[serde(default)]
    pub signature: Option<String>,
    /// Inner payload as a JSON string
    #[serde(default)]
    pub payload: Option<String>,
}

impl Envelope {
    /// Parse envelope JSON located in a frame.
    pub fn parse(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| VotifierError::EnvelopeParseFailure(e.to_string()))
    }

    /// Sign a serialized payload with `key` and wrap it in an envelope.
    pub fn signed(payload_json: impl Into<String>, key: &[u8]) -> Result<Self> {
        let payload = payload_json.into();
        let signature = signature::sign_base64(payload.as_bytes(), key)?;
        Ok(Self {
            signature: Some(signature),
            payload: Some(payload),
        })
    }

    /// Both fields, or [`VotifierError::InvalidPayloadFields`] if either is missing or empty.
    pub fn fields(&self) -> Result<(&str, &str)> {
        match (self.signature.as_deref(), self.payload.as_deref()) {
            (Some(sig), Some(payload)) if !sig.is_empty() && !payload.is_empty() => {
                Ok((sig, payload))
            }
            _ => Err(VotifierError::InvalidPayloadFields),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Vote timestamp as sent by the listing service, either a number or a string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VoteTimestamp {
    Number(serde_json::Number),
    Text(String),
}

impl fmt::Display for VoteTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoteTimestamp::Number(n) => write!(f, "{n}"),
            VoteTimestamp::Text(s) => f.write_str(s),
        }
    }
}

impl From<u64> for VoteTimestamp {
    fn from(value: u64) -> Self {
        VoteTimestamp::Number(value.into())
    }
}

impl From<&str> for VoteTimestamp {
    fn from(value: &str) -> Self {
        VoteTimestamp::Text(value.to_string())
    }
}

/// Inner JSON payload of a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VotePayload {
    pub service_name: String,
    pub username: String,
    pub address: String,
    pub timestamp: VoteTimestamp,
    pub challenge: String,
}

impl VotePayload {
    pub fn parse(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| VotifierError::PayloadParseFailure(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Drop the challenge and keep the fields the host cares about.
    pub fn into_vote(self) -> Vote {
        Vote {
            username: self.username,
            service_name: self.service_name,
            timestamp: self.timestamp,
            address: self.address,
        }
    }
}

/// A validated vote, delivered to the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vote {
    pub username: String,
    pub service_name: String,
    pub timestamp: VoteTimestamp,
    pub address: String,
}
