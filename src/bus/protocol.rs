//! Wire format of the relay interface.
//!
//! Every message is a single line of JSON followed by `\n`, tagged with a
//! `"type"` field:
//!
//! ```json
//! {"type":"echo_signal","fingers":3,"direction":0}
//! {"type":"quit"}
//! {"type":"ping"}
//! {"type":"subscribe"}
//! ```
//!
//! Each request gets exactly one [`Reply`] line.  After a `subscribe`
//! request is answered with `subscribed`, the connection only carries
//! [`Signal`] lines from relay to client.

use serde::{Deserialize, Serialize};

/// Method calls accepted by the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Broadcast one `TouchpadEvent` with this payload.
    EchoSignal { fingers: u32, direction: u32 },
    /// Stop the relay and release the name.
    Quit,
    /// Liveness check.
    Ping,
    /// Turn this connection into a signal stream.
    Subscribe,
}

/// Method replies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Reply {
    Ok,
    Pong,
    Subscribed,
    Error { message: String },
}

/// Broadcast signals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Signal {
    TouchpadEvent { fingers: u32, direction: u32 },
}

/// Serialize `msg` as one newline-terminated line.
pub fn encode_line<T: Serialize>(msg: &T) -> Result<String, serde_json::Error> {
    let mut line = serde_json::to_string(msg)?;
    line.push('\n');
    Ok(line)
}
