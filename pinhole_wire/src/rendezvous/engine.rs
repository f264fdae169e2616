use std::io::ErrorKind;
use std::net::SocketAddr;

use tokio::net::UdpSocket;

use crate::rendezvous::{payloads, PunchConfig, PunchOutcome, Token};

const RECV_BUFFER_LEN: usize = 1024;

/// One run of the token-exchange state machine. Owns the bound socket for the
/// lifetime of the run; the peer runs the identical machine from the opposite
/// perspective, and the two negotiate over nothing but lossy datagrams.
pub struct RendezvousEngine {
    socket: UdpSocket,
    peer: SocketAddr,
    token: Token,
    config: PunchConfig,
    state: PeerState,
}

#[derive(Default)]
struct PeerState {
    // first-seen token; never overwritten once set
    remote_token: Option<String>,
    // monotone: never reset once true
    synced: bool,
}

impl RendezvousEngine {
    pub fn new(socket: UdpSocket, peer: SocketAddr, token: Token, config: PunchConfig) -> Self {
        Self {
            socket,
            peer,
            token,
            config,
            state: PeerState::default(),
        }
    }

    /// Drives the bounded attempt loop to completion. The socket is dropped
    /// when this returns; no punch state outlives the run.
    ///
    /// Each attempt receives before it sends, so an acknowledgement composed
    /// in the send half already reflects a token learned moments earlier in
    /// the same attempt. Sync is noticed at the top of the *next* attempt,
    /// which means one extra send/receive cycle always runs after the
    /// condition is first met.
    pub async fn run(mut self) -> PunchOutcome {
        for attempt in 0..self.config.attempts {
            if self.state.synced {
                log::info!(target: "pinhole", "Hole was punched from both ends");
                break;
            }

            log::info!(target: "pinhole", "====== Attempt #{attempt}");
            self.poll_receive();
            self.poll_send();

            tokio::time::sleep(self.config.interval).await;
        }

        if !self.state.synced {
            log::info!(
                target: "pinhole",
                "No token sync after {} attempts; giving up",
                self.config.attempts
            );
        }

        PunchOutcome {
            remote_token: self.state.remote_token,
            synced: self.state.synced,
        }
    }

    /// Zero-timeout readability check: take at most one datagram if one is
    /// already queued, never wait for one.
    fn poll_receive(&mut self) {
        let mut buf = [0u8; RECV_BUFFER_LEN];
        match self.socket.try_recv_from(&mut buf) {
            Ok((len, _from)) => {
                let datagram = &buf[..len];
                log::info!(target: "pinhole", "Receive: {:?}", String::from_utf8_lossy(datagram));
                self.on_datagram(datagram);
            }
            Err(err) if err.kind() == ErrorKind::WouldBlock => {}
            Err(err) => {
                log::warn!(target: "pinhole", "Error receiving datagram: {err:?}");
            }
        }
    }

    /// Applies one datagram to the peer state. Anything that does not decode
    /// is a no-op receive for this attempt, never a crash.
    fn on_datagram(&mut self, datagram: &[u8]) {
        let Ok(text) = std::str::from_utf8(datagram) else {
            log::warn!(target: "pinhole", "Discarding non-UTF-8 datagram");
            return;
        };

        let fields: Vec<&str> = text.split_whitespace().collect();
        let Some(&claimed_token) = fields.first() else {
            log::warn!(target: "pinhole", "Discarding blank datagram");
            return;
        };

        if self.state.remote_token.is_none() {
            self.state.remote_token = Some(claimed_token.to_owned());
            log::info!(target: "pinhole", "Remote token changed: {claimed_token}");
        }

        // proof of mutual receipt: the peer echoed its own token plus ours.
        // The third field's content is deliberately not inspected.
        if fields.len() == 3
            && fields[1] == self.token.as_str()
            && Some(fields[0]) == self.state.remote_token.as_deref()
        {
            self.state.synced = true;
        }
    }

    /// Zero-timeout writability check: fire one datagram if the socket will
    /// take it, composed from the *current* remote token.
    fn poll_send(&mut self) {
        let payload = self.outgoing_payload();
        match self.socket.try_send_to(payload.as_bytes(), self.peer) {
            Ok(_) => {
                log::info!(target: "pinhole", "Sent: {payload:?}");
            }
            Err(err) if err.kind() == ErrorKind::WouldBlock => {}
            Err(err) => {
                log::warn!(target: "pinhole", "Error sending datagram to {}: {err:?}", self.peer);
            }
        }
    }

    /// `"<myToken> <remoteTokenOrNULL>"`, with a trailing ` ack` once the
    /// remote token is known.
    fn outgoing_payload(&self) -> String {
        match &self.state.remote_token {
            Some(remote) => format!("{} {} {}", self.token, remote, payloads::ACK),
            None => format!("{} {}", self.token, payloads::UNKNOWN),
        }
    }
}
