//! Greeting lines sent on connect.
//!
//! The server speaks first: a legacy `VOTIFIER 1.9` line for protocol-1 clients,
//! then `VOTIFIER 2 <challenge>`. Protocol-1 payloads are never parsed; the line
//! only keeps old clients from hanging.

use crate::error::{Result, VotifierError};
use crate::protocol::challenge::Challenge;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, instrument};

/// Compatibility greeting for protocol-1 clients
pub const LEGACY_GREETING: &str = "VOTIFIER 1.9\n";

/// Greeting prefix for protocol 2
pub const PROTOCOL_2_GREETING_PREFIX: &str = "VOTIFIER 2 ";

/// Build the protocol-2 greeting line for `challenge`.
pub fn protocol_2_greeting(challenge: &Challenge) -> String {
    format!("{PROTOCOL_2_GREETING_PREFIX}{challenge}\n")
}

/// Parse the challenge out of a protocol-2 greeting line, as a client would.
pub fn parse_protocol_2_greeting(line: &str) -> Option<Challenge> {
    line.trim_end()
        .strip_prefix(PROTOCOL_2_GREETING_PREFIX)
        .filter(|challenge| !challenge.is_empty())
        .map(Challenge::from_value)
}

/// Write both greeting lines.
///
/// # Errors
/// Any write or flush failure is reported as [`VotifierError::GreetingSendFailure`].
#[instrument(skip_all, level = "debug")]
pub async fn send_greetings<W>(writer: &mut W, challenge: &Challenge) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let greeting = protocol_2_greeting(challenge);

    async {
        writer.write_all(LEGACY_GREETING.as_bytes()).await?;
        writer.write_all(greeting.as_bytes()).await?;
        writer.flush().await
    }
    .await
    .map_err(|e| VotifierError::GreetingSendFailure(e.to_string()))?;

    debug!("Greetings sent");
    Ok(())
}
