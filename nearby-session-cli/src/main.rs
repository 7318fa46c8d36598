use clap::{Parser, Subcommand};
use nearby_session_cli::application::{run_demo, DemoOptions, HandshakeChoice, PolicyChoice};
use nearby_session_p2p::application::DEFAULT_SERVICE_TYPE;
use nearby_session_cli::{LogConfig, Result};
use std::time::Duration;
use tracing::info;

#[derive(Parser)]
#[command(name = "nearby-session")]
#[command(
    version,
    about = "Nearby Session - discover peers, exchange invitations and watch the roster"
)]
struct Cli {
    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, default_value_t = tracing::Level::INFO)]
    log_level: tracing::Level,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate a neighbourhood of peers on an in-memory network
    Demo {
        /// Local display name
        #[arg(short = 'n', long, default_value = "Alice")]
        name: String,

        /// Number of simulated neighbours
        #[arg(short = 'p', long, default_value_t = 3)]
        peers: usize,

        /// Service type shared by all peers
        #[arg(short = 's', long, default_value = DEFAULT_SERVICE_TYPE)]
        service_type: String,

        /// How long to run before shutting down
        #[arg(short = 'd', long, default_value_t = 10)]
        duration_secs: u64,

        /// Print the roster as JSON instead of a table
        #[arg(long)]
        json: bool,

        /// How the local peer answers invitations
        #[arg(long, value_enum, default_value_t = PolicyChoice::Accept)]
        policy: PolicyChoice,

        /// When handshakes complete after an invitation is accepted
        #[arg(long, value_enum, default_value_t = HandshakeChoice::Immediate)]
        handshake: HandshakeChoice,

        /// Milliseconds between controller turns
        #[arg(long, default_value_t = 100)]
        poll_interval_ms: u64,

        /// Milliseconds before a send gives up
        #[arg(long, default_value_t = 5000)]
        send_timeout_ms: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut log_config = LogConfig::default().with_level(cli.log_level);
    if cli.log_json {
        log_config = log_config.with_json();
    }
    log_config.init()?;

    match cli.command {
        Commands::Demo {
            name,
            peers,
            service_type,
            duration_secs,
            json,
            policy,
            handshake,
            poll_interval_ms,
            send_timeout_ms,
        } => {
            let options = DemoOptions {
                name,
                peers,
                service_type,
                duration: Duration::from_secs(duration_secs),
                json,
                policy,
                handshake,
                poll_interval_ms,
                send_timeout: Duration::from_millis(send_timeout_ms),
            };

            info!(
                "Starting demo as '{}' with {} neighbour(s)",
                options.name, options.peers
            );
            run_demo(options).await?;
        }
    }

    Ok(())
}
