use anyhow::{anyhow, bail, Context};
use pinhole_wire::rendezvous::{PunchTarget, Role};

/// The resolved launch context: who we are and where to punch. Derived once
/// here at the boundary; nothing below this layer re-inspects argv or env.
#[derive(Clone, Debug)]
pub struct Invocation {
    pub role: Role,
    pub target: PunchTarget,
}

impl Invocation {
    /// Three accepted forms:
    /// - `<host> <port>`: initiate against host:port.
    /// - `- <host> <port>`: this instance was launched over a control
    ///   channel and fed its own logic on stdin; explicit host.
    /// - lone `<port>` with `SSH_CLIENT` present: remote side, with the
    ///   connecting client's address as the host.
    pub fn resolve(args: &[String], ssh_client: Option<&str>) -> anyhow::Result<Self> {
        match args {
            [dash, host, port] if dash == "-" => Ok(Self {
                role: Role::Remote,
                target: PunchTarget::new(host.clone(), parse_port(port)?),
            }),
            [host, port] if host != "-" => Ok(Self {
                role: Role::Initiator,
                target: PunchTarget::new(host.clone(), parse_port(port)?),
            }),
            [port] => {
                let client = ssh_client.ok_or_else(|| {
                    anyhow!("a lone port argument only works inside an ssh session (SSH_CLIENT is unset)")
                })?;
                let host = client
                    .split_whitespace()
                    .next()
                    .ok_or_else(|| anyhow!("SSH_CLIENT is present but empty"))?;
                let port = parse_port(port)?;
                log::info!(target: "pinhole", "Using port: {port}");

                Ok(Self {
                    role: Role::Remote,
                    target: PunchTarget::new(host, port),
                })
            }
            _ => bail!("usage: pinhole [-] <host> <port>  |  pinhole <port>"),
        }
    }
}

fn parse_port(raw: &str) -> anyhow::Result<u16> {
    raw.parse::<u16>()
        .with_context(|| format!("bad port {raw:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|arg| arg.to_string()).collect()
    }

    #[test]
    fn host_port_initiates() {
        let invocation =
            Invocation::resolve(&args(&["mosh@relay.example.com", "60001"]), None).unwrap();
        assert_eq!(invocation.role, Role::Initiator);
        assert_eq!(invocation.target.host, "mosh@relay.example.com");
        assert_eq!(invocation.target.port, 60001);
    }

    #[test]
    fn dash_form_is_the_streamed_remote_instance() {
        let invocation =
            Invocation::resolve(&args(&["-", "203.0.113.7", "60001"]), None).unwrap();
        assert_eq!(invocation.role, Role::Remote);
        assert_eq!(invocation.target.host, "203.0.113.7");
        assert_eq!(invocation.target.port, 60001);
    }

    #[test]
    fn lone_port_derives_host_from_ssh_client() {
        let invocation =
            Invocation::resolve(&args(&["60001"]), Some("203.0.113.7 53122 22")).unwrap();
        assert_eq!(invocation.role, Role::Remote);
        assert_eq!(invocation.target.host, "203.0.113.7");
        assert_eq!(invocation.target.port, 60001);
    }

    #[test]
    fn lone_port_without_ssh_client_is_a_usage_error() {
        assert!(Invocation::resolve(&args(&["60001"]), None).is_err());
    }

    #[rstest]
    #[case::no_args(&[])]
    #[case::too_many(&["-", "a", "b", "c"])]
    #[case::dash_without_host(&["-", "60001"])]
    #[case::unparsable_port(&["relay.example.com", "sixty"])]
    #[case::port_out_of_range(&["relay.example.com", "70000"])]
    fn malformed_invocations_are_rejected(#[case] list: &[&str]) {
        assert!(Invocation::resolve(&args(list), Some("203.0.113.7 53122 22")).is_err());
    }
}
