//! Request validation: everything between "a frame arrived" and "a vote is accepted".

use crate::core::frame;
use crate::error::{Result, VotifierError};
use crate::protocol::challenge::Challenge;
use crate::protocol::message::{Envelope, Vote, VotePayload};
use crate::protocol::signature;
use crate::service::tokens::TokenStore;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Validates request frames against the server challenge and token store.
///
/// Immutable once built, so a single instance is shared by every connection.
#[derive(Debug, Clone)]
pub struct VoteValidator {
    challenge: Arc<Challenge>,
    tokens: Arc<TokenStore>,
}

impl VoteValidator {
    pub fn new(challenge: Arc<Challenge>, tokens: Arc<TokenStore>) -> Self {
        Self { challenge, tokens }
    }

    pub fn challenge(&self) -> &Challenge {
        &self.challenge
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    /// Turn a raw frame into a [`Vote`].
    ///
    /// The signature is checked over the payload string exactly as the client sent it.
    ///
    /// # Errors
    /// Each step fails with its own variant: `FrameTooShort`,
    /// `UnsupportedProtocolVersion`, `EnvelopeParseFailure`, `InvalidPayloadFields`,
    /// `PayloadParseFailure`, `ChallengeMismatch`, `PlatformNotFound` or
    /// `SignatureVerificationFailure`.
    #[instrument(skip_all, fields(frame_len = frame.len()))]
    pub fn validate(&self, frame: &[u8]) -> Result<Vote> {
        let envelope_json = frame::extract_envelope(frame)?;
        let envelope = Envelope::parse(&envelope_json)?;
        let (encoded_signature, raw_payload) = envelope.fields()?;

        let payload = VotePayload::parse(raw_payload)?;
        if !self.challenge.matches(&payload.challenge) {
            return Err(VotifierError::ChallengeMismatch);
        }

        let token = self
            .tokens
            .lookup(&payload.service_name)
            .ok_or_else(|| VotifierError::PlatformNotFound(payload.service_name.clone()))?;
        if token.platform() != payload.service_name {
            warn!(
                service = %payload.service_name,
                "Platform not found in tokens, using default token"
            );
        }

        let signature_bytes = signature::decode_signature(encoded_signature, &payload.service_name)?;
        if !signature::verify(&signature_bytes, raw_payload.as_bytes(), token.key()) {
            return Err(VotifierError::SignatureVerificationFailure(
                payload.service_name,
            ));
        }

        debug!(service = %payload.service_name, username = %payload.username, "Vote verified");
        Ok(payload.into_vote())
    }
}
