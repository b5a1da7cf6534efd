//! # Votifier v2 Protocol
//!
//! Greeting, message types, challenge, signatures and request validation.
//!
//! ## Flow
//! ```text
//! server: VOTIFIER 1.9\n
//! server: VOTIFIER 2 <challenge>\n
//! client: [magic][envelope {"signature", "payload"}]
//! server: closes the connection
//! ```

pub mod challenge;
pub mod handshake;
pub mod message;
pub mod signature;
pub mod validator;
