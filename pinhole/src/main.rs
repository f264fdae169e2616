use clap::Parser;

use pinhole_wire::bootstrap::RemoteBootstrap;
use pinhole_wire::rendezvous::UdpPinholePuncher;

mod invocation;

use invocation::Invocation;

/// Punches a bidirectional UDP pinhole between this host and a remote peer,
/// bootstrapping the identical logic on the far side over ssh.
#[derive(Parser)]
#[command(name = "pinhole", version, about)]
struct Cli {
    /// `<host> <port>` to initiate, `- <host> <port>` when fed over a
    /// control channel, or a lone `<port>` on the remote side
    #[arg(required = true, allow_hyphen_values = true, num_args = 1..=3, value_name = "TARGET")]
    target: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pinhole_logging::setup_log();
    let cli = Cli::parse();

    let ssh_client = std::env::var("SSH_CLIENT").ok();
    let invocation = Invocation::resolve(&cli.target, ssh_client.as_deref())?;

    run(invocation).await;
    Ok(())
}

/// Each task logs its own outcome; this driver only tracks liveness and
/// prints the closing line. The interrupt arm returns without joining the
/// background tasks: shutdown is best-effort by policy.
async fn run(invocation: Invocation) {
    let Invocation { role, target } = invocation;

    let punch_target = target.clone();
    let puncher = tokio::spawn(async move {
        match UdpPinholePuncher::new(role, punch_target.clone()).await {
            Ok(outcome) if outcome.succeeded() => {
                log::info!(target: "pinhole", "Punched UDP hole to {punch_target} successfully!");
            }
            Ok(_) => {
                log::warn!(target: "pinhole", "Punch failed: nothing heard from {punch_target}");
            }
            Err(err) => {
                log::error!(target: "pinhole", "Punch aborted: {err}");
            }
        }
    });

    let bootstrap = role.is_initiator().then(|| {
        log::info!(target: "pinhole", "Attempting to start reverse punch on remote ...");
        tokio::spawn(async move {
            if let Err(err) = RemoteBootstrap::new(target).execute().await {
                log::error!(target: "pinhole", "Reverse punch bootstrap failed: {err}");
            }
        })
    });

    let all_tasks = async move {
        let _ = puncher.await;
        if let Some(bootstrap) = bootstrap {
            let _ = bootstrap.await;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            log::info!(target: "pinhole", "Caught interrupt, exiting ...");
        }
        _ = all_tasks => {
            log::info!(target: "pinhole", "All tasks done ...");
        }
    }
}
