use futures::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::error::PunchError;
use crate::rendezvous::engine::RendezvousEngine;
use crate::rendezvous::{PunchConfig, PunchOutcome, PunchTarget, Role, Token};
use crate::socket_helpers;

/// One complete punch run against a single target: resolve, bind the agreed
/// port on all interfaces, then negotiate until synced or out of attempts.
pub struct UdpPinholePuncher {
    driver: Pin<Box<dyn Future<Output = Result<PunchOutcome, PunchError>> + Send>>,
}

impl UdpPinholePuncher {
    pub fn new(role: Role, target: PunchTarget) -> Self {
        Self::with_config(role, target, PunchConfig::default())
    }

    pub fn with_config(role: Role, target: PunchTarget, config: PunchConfig) -> Self {
        Self {
            driver: Box::pin(async move { driver(role, target, config).await }),
        }
    }
}

impl Future for UdpPinholePuncher {
    type Output = Result<PunchOutcome, PunchError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.driver.as_mut().poll(cx)
    }
}

async fn driver(
    role: Role,
    target: PunchTarget,
    config: PunchConfig,
) -> Result<PunchOutcome, PunchError> {
    log::info!(
        target: "pinhole",
        "Attempting to punch to host: {} on port: {} ({role} side)",
        target.udp_host(),
        target.port
    );

    let peer = socket_helpers::resolve_first((target.udp_host(), target.port))
        .map_err(|err| PunchError::Resolve(err.to_string()))?;

    log::info!(target: "pinhole", "Binding local socket");
    // both sides bind the same port number the datagrams target
    let socket = socket_helpers::get_udp_socket(("0.0.0.0", target.port))
        .map_err(|err| PunchError::Bind(err.to_string()))?;

    let token = Token::generate();
    log::info!(target: "pinhole", "Generated random token: {token}");

    Ok(RendezvousEngine::new(socket, peer, token, config).run().await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::socket_helpers::get_udp_socket;

    #[tokio::test]
    async fn occupied_port_is_a_fatal_bind_error() {
        pinhole_logging::setup_log_no_panic_hook();
        let holder = get_udp_socket("0.0.0.0:0").unwrap();
        let taken = holder.local_addr().unwrap().port();

        let result =
            UdpPinholePuncher::new(Role::Initiator, PunchTarget::new("127.0.0.1", taken)).await;
        assert!(matches!(result, Err(PunchError::Bind(_))));
    }

    #[tokio::test]
    async fn unresolvable_host_is_a_resolve_error() {
        pinhole_logging::setup_log_no_panic_hook();
        let result = UdpPinholePuncher::new(
            Role::Initiator,
            PunchTarget::new("host.that.does.not.resolve.invalid", 60001),
        )
        .await;
        assert!(matches!(result, Err(PunchError::Resolve(_))));
    }
}
