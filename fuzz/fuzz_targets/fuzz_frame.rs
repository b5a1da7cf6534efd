#![no_main]

use libfuzzer_sys::fuzz_target;
use std::sync::{Arc, OnceLock};
use votifier_protocol::core::frame::extract_envelope;
use votifier_protocol::{Challenge, TokenStore, VoteValidator};

static VALIDATOR: OnceLock<(VoteValidator, tempfile::TempDir)> = OnceLock::new();

fuzz_target!(|data: &[u8]| {
    let (validator, _dir) = VALIDATOR.get_or_init(|| {
        let dir = tempfile::tempdir().unwrap();
        let tokens =
            TokenStore::initialize(dir.path().join("tokens.json"), &["alpha"], true).unwrap();
        let challenge = Challenge::from_value("0123456789abcdef0123456789abcdef");
        (VoteValidator::new(Arc::new(challenge), Arc::new(tokens)), dir)
    });

    // Random input must never verify
    let _ = extract_envelope(data);
    assert!(validator.validate(data).is_err());
});
