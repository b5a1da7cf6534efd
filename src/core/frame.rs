//! Frame detection for incoming Votifier v2 requests.
//!
//! A request is a single chunk of bytes:
//!
//! ```text
//! [Magic(2, big-endian 0x733A)] [optional Length(2)] [UTF-8 envelope JSON]
//! ```
//!
//! Anything between the magic and the first `{` is treated as framing and skipped.

use crate::error::{constants, Result, VotifierError};
use std::borrow::Cow;

/// Magic selecting protocol version 2
pub const PROTOCOL_2_MAGIC: u16 = 0x733A;

/// Frames shorter than this are rejected before any parsing
pub const MIN_FRAME_LEN: usize = 10;

/// Size of the magic prefix in bytes
pub const MAGIC_LEN: usize = 2;

/// Read the leading big-endian magic of a frame.
///
/// Returns `None` when the frame is shorter than the magic itself.
#[inline]
pub fn read_magic(frame: &[u8]) -> Option<u16> {
    match frame {
        [hi, lo, ..] => Some(u16::from_be_bytes([*hi, *lo])),
        _ => None,
    }
}

/// Check the length and magic of a frame and return the bytes after the magic.
pub fn check_frame(frame: &[u8]) -> Result<&[u8]> {
    if frame.len() < MIN_FRAME_LEN {
        return Err(VotifierError::FrameTooShort(frame.len()));
    }

    // Length was checked above, so the magic is always present
    let magic = read_magic(frame).ok_or(VotifierError::FrameTooShort(frame.len()))?;
    if magic != PROTOCOL_2_MAGIC {
        return Err(VotifierError::UnsupportedProtocolVersion(magic));
    }

    Ok(&frame[MAGIC_LEN..])
}

/// Strip a big-endian length prefix when it exactly describes the remaining bytes.
fn strip_length_prefix(body: &[u8]) -> &[u8] {
    match body {
        [hi, lo, rest @ ..] if usize::from(u16::from_be_bytes([*hi, *lo])) == rest.len() => rest,
        _ => body,
    }
}

/// Whether `text`, which begins with `{`, can be the start of a JSON object.
///
/// After the opening brace an object continues with whitespace then `"` or `}`.
fn opens_object(text: &str) -> bool {
    matches!(text[1..].trim_start().chars().next(), Some('"' | '}'))
}

/// Locate the envelope JSON inside a frame.
///
/// Validates the frame, decodes the remainder as UTF-8 (invalid sequences are
/// replaced), trims surrounding whitespace and returns everything from the first
/// `{` that opens an object. A length byte equal to `{` is skipped this way even
/// when the length does not match the rest of the frame.
pub fn extract_envelope(frame: &[u8]) -> Result<String> {
    let body = strip_length_prefix(check_frame(frame)?);
    let text: Cow<'_, str> = String::from_utf8_lossy(body);
    let trimmed = text.trim();

    let mut braces = trimmed.match_indices('{').map(|(i, _)| i);
    let first = braces.clone().next();
    match braces.find(|&i| opens_object(&trimmed[i..])).or(first) {
        Some(start) => Ok(trimmed[start..].to_string()),
        None => Err(VotifierError::EnvelopeParseFailure(
            constants::ERR_NO_ENVELOPE.to_string(),
        )),
    }
}

/// Build a client frame around an envelope: magic, u16 length, then the JSON.
///
/// Envelopes longer than `u16::MAX` bytes are written with a saturated length,
/// which the server treats as ordinary framing bytes.
pub fn encode_frame(envelope_json: &str) -> Vec<u8> {
    let body = envelope_json.as_bytes();
    let length = u16::try_from(body.len()).unwrap_or(u16::MAX);

    let mut frame = Vec::with_capacity(MAGIC_LEN + 2 + body.len());
    frame.extend_from_slice(&PROTOCOL_2_MAGIC.to_be_bytes());
    frame.extend_from_slice(&length.to_be_bytes());
    frame.extend_from_slice(body);
    frame
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_short_frame_rejected_before_magic() {
        // Valid magic but only 9 bytes
        let mut frame = PROTOCOL_2_MAGIC.to_be_bytes().to_vec();
        frame.extend_from_slice(b"{\"a\":1}");
        assert_eq!(frame.len(), 9);
        assert!(matches!(
            check_frame(&frame),
            Err(VotifierError::FrameTooShort(9))
        ));
        assert!(matches!(
            check_frame(&[]),
            Err(VotifierError::FrameTooShort(0))
        ));
    }

    #[test]
    fn test_wrong_magic_rejected() {
        let frame = b"\x00\x01{\"signature\":\"x\"}";
        assert!(matches!(
            check_frame(frame),
            Err(VotifierError::UnsupportedProtocolVersion(0x0001))
        ));
    }

    #[test]
    fn test_extract_skips_length_prefix() {
        let json = r#"{"signature":"abc","payload":"{}"}"#;
        let frame = encode_frame(json);
        assert_eq!(extract_envelope(&frame).unwrap(), json);
    }

    #[test]
    fn test_length_prefix_that_looks_like_brace() {
        // 123 == b'{', so a naive search would start inside the length prefix
        let json = format!("{{\"a\":\"{}\"}}", "x".repeat(115));
        assert_eq!(json.len(), 123);
        let frame = encode_frame(&json);
        assert_eq!(frame[3], b'{');
        assert_eq!(extract_envelope(&frame).unwrap(), json);
    }

    #[test]
    fn test_brace_length_byte_with_trailing_newline() {
        // The length no longer matches the remainder, so the prefix stays in place
        let json = format!("{{\"a\":\"{}\"}}", "x".repeat(371));
        assert_eq!(json.len(), 0x017B);
        let mut frame = encode_frame(&json);
        frame.push(b'\n');
        assert_eq!(frame[3], b'{');
        assert_eq!(extract_envelope(&frame).unwrap(), json);
    }

    #[test]
    fn test_empty_object_is_an_envelope_start() {
        let mut frame = PROTOCOL_2_MAGIC.to_be_bytes().to_vec();
        frame.extend_from_slice(b"\x01{{ }     ");
        assert_eq!(extract_envelope(&frame).unwrap(), "{ }");
    }

    #[test]
    fn test_extract_tolerates_leading_bytes_and_whitespace() {
        let mut frame = PROTOCOL_2_MAGIC.to_be_bytes().to_vec();
        frame.extend_from_slice(b"\xFF\xFE  junk {\"k\":\"v\"}\n\r ");
        assert_eq!(extract_envelope(&frame).unwrap(), "{\"k\":\"v\"}");
    }

    #[test]
    fn test_missing_brace_is_envelope_failure() {
        let mut frame = PROTOCOL_2_MAGIC.to_be_bytes().to_vec();
        frame.extend_from_slice(b"no json in here");
        assert!(matches!(
            extract_envelope(&frame),
            Err(VotifierError::EnvelopeParseFailure(_))
        ));
    }

    #[test]
    fn test_read_magic() {
        assert_eq!(read_magic(&[0x73, 0x3A, 0x00]), Some(PROTOCOL_2_MAGIC));
        assert_eq!(read_magic(&[0x73]), None);
    }
}
