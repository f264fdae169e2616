//! The token-exchange rendezvous protocol. Both peers bind the same UDP port
//! number, fire datagrams at each other, and treat an echoed token pair as
//! proof that traffic flows in both directions.

use std::fmt::{Display, Formatter};
use std::time::Duration;
use uuid::Uuid;

pub mod engine;
pub mod puncher;

pub use puncher::UdpPinholePuncher;

/// Which end of the control channel this instance runs on. Decided once at
/// the process boundary and handed in; the protocol itself is symmetric.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Role {
    Initiator,
    Remote,
}

impl Role {
    pub fn is_initiator(self) -> bool {
        self == Role::Initiator
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Initiator => write!(f, "initiator"),
            Role::Remote => write!(f, "remote"),
        }
    }
}

/// Per-run random identifier exchanged to prove mutual receipt. Any
/// sufficiently random printable value works; the engine never interprets it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().as_simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Token {
    fn from(raw: &str) -> Self {
        Self(raw.to_owned())
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The remote endpoint of a punch run. `port` doubles as the local bind port:
/// the protocol uses the same number on both sides. `host` may carry a
/// `user@` prefix for the ssh control channel.
#[derive(Clone, Debug)]
pub struct PunchTarget {
    pub host: String,
    pub port: u16,
}

impl PunchTarget {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// The host as the UDP layer sees it, with any `user@` ssh prefix
    /// stripped.
    pub fn udp_host(&self) -> &str {
        self.host
            .split_once('@')
            .map(|(_, host)| host)
            .unwrap_or(&self.host)
    }
}

impl Display for PunchTarget {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.udp_host(), self.port)
    }
}

/// Pacing knobs for one engine run. The interval is the sole pacing source;
/// there is no backoff.
#[derive(Copy, Clone, Debug)]
pub struct PunchConfig {
    pub attempts: usize,
    pub interval: Duration,
}

impl Default for PunchConfig {
    fn default() -> Self {
        Self {
            attempts: 10,
            interval: Duration::from_secs(1),
        }
    }
}

/// What one engine run observed. `succeeded()` is deliberately the lenient
/// "considered something from remote" condition rather than `synced`;
/// external tooling depends on that weaker contract.
#[derive(Clone, Debug)]
pub struct PunchOutcome {
    pub remote_token: Option<String>,
    pub synced: bool,
}

impl PunchOutcome {
    pub fn succeeded(&self) -> bool {
        self.remote_token.is_some()
    }
}

pub mod payloads {
    /// Placeholder sent while the peer's token is still unknown.
    pub const UNKNOWN: &str = "NULL";
    /// Trailing field appended once the peer's token is known.
    pub const ACK: &str = "ack";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn udp_host_strips_control_channel_user() {
        let target = PunchTarget::new("mosh@relay.example.com", 60001);
        assert_eq!(target.udp_host(), "relay.example.com");
        assert_eq!(target.to_string(), "relay.example.com:60001");

        let bare = PunchTarget::new("relay.example.com", 60001);
        assert_eq!(bare.udp_host(), "relay.example.com");
    }

    #[test]
    fn generated_tokens_are_printable_and_distinct() {
        let a = Token::generate();
        let b = Token::generate();
        assert_ne!(a, b);
        assert!(!a.as_str().contains(char::is_whitespace));
    }
}
