#![no_main]

use libfuzzer_sys::fuzz_target;
use votifier_protocol::protocol::message::{Envelope, VotePayload};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(envelope) = Envelope::parse(text) {
        let _ = envelope.fields();
    }

    // Re-serializing a parsed payload must parse again
    if let Ok(payload) = VotePayload::parse(text) {
        let json = payload.to_json().unwrap();
        assert!(VotePayload::parse(&json).is_ok());
    }
});
