use crate::infrastructure::{CliError, Result};
use crate::presentation::roster_view;
use nearby_session_p2p::application::{AutoAccept, AutoReject, DeferToOwner, DEFAULT_SERVICE_TYPE};
use nearby_session_p2p::{
    ChannelObserver, HandshakeMode, MemoryNetwork, MemoryTransport, ObserverEvent, Reliability,
    SessionConfig, SessionController, SessionRuntime,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// How the local peer answers invitations
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum PolicyChoice {
    Accept,
    Reject,
    /// Surface each invitation and answer it from the demo loop
    Ask,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum HandshakeChoice {
    Immediate,
    /// Handshakes finish a moment after the invitation is accepted
    Manual,
}

impl From<HandshakeChoice> for HandshakeMode {
    fn from(choice: HandshakeChoice) -> Self {
        match choice {
            HandshakeChoice::Immediate => HandshakeMode::Immediate,
            HandshakeChoice::Manual => HandshakeMode::Manual,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DemoOptions {
    pub name: String,
    pub peers: usize,
    pub service_type: String,
    pub duration: Duration,
    pub json: bool,
    pub policy: PolicyChoice,
    pub handshake: HandshakeChoice,
    pub poll_interval_ms: u64,
    pub send_timeout: Duration,
}

impl Default for DemoOptions {
    fn default() -> Self {
        Self {
            name: "Alice".to_string(),
            peers: 3,
            service_type: DEFAULT_SERVICE_TYPE.to_string(),
            duration: Duration::from_secs(10),
            json: false,
            policy: PolicyChoice::Accept,
            handshake: HandshakeChoice::Immediate,
            poll_interval_ms: 100,
            send_timeout: Duration::from_secs(5),
        }
    }
}

impl DemoOptions {
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::new(self.service_type.clone())
            .with_poll_interval(self.poll_interval_ms)
            .with_send_timeout(self.send_timeout)
    }

    /// Name of the `index`-th simulated neighbour (1-based)
    pub fn neighbour_name(index: usize) -> String {
        format!("Peer {}", index)
    }
}

/// Demo milestones, reached in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    WaitingForPeers,
    Greeted,
    Severed,
}

/// One local controller plus simulated neighbours on a memory network
pub struct Neighbourhood {
    options: DemoOptions,
    network: Arc<MemoryNetwork>,
    local: SessionRuntime<MemoryTransport>,
    neighbours: Vec<SessionRuntime<MemoryTransport>>,
    events: mpsc::UnboundedReceiver<ObserverEvent>,
    // Held for the controller's weak reference
    _observer: Arc<ChannelObserver>,
    stage: Stage,
}

impl Neighbourhood {
    /// Build every controller and start discovery everywhere
    pub fn start(options: DemoOptions) -> Result<Self> {
        if options.peers == 0 {
            return Err(CliError::InvalidConfig(
                "at least one neighbour is needed".to_string(),
            ));
        }

        let network = MemoryNetwork::with_handshake(options.handshake.into());
        let config = options.session_config();

        let (observer, events) = ChannelObserver::new();
        let observer = Arc::new(observer);

        let builder = SessionController::<MemoryTransport>::builder()
            .config(config.clone())
            .observer(&observer);
        let builder = match options.policy {
            PolicyChoice::Accept => builder.policy(AutoAccept),
            PolicyChoice::Reject => builder.policy(AutoReject),
            PolicyChoice::Ask => builder.policy(DeferToOwner),
        };

        let local = builder.build(network.join(&options.name)?)?;
        info!("🏠 Local peer: {}", local.local_identity());

        let mut neighbours = Vec::with_capacity(options.peers);
        for index in 1..=options.peers {
            let name = DemoOptions::neighbour_name(index);
            let controller = SessionController::new(network.join(&name)?, config.clone())?;
            controller.start_services()?;
            neighbours.push(SessionRuntime::spawn(Arc::new(controller)));
        }

        local.start_services()?;
        let local = SessionRuntime::spawn(Arc::new(local));

        Ok(Self {
            options,
            network,
            local,
            neighbours,
            events,
            _observer: observer,
            stage: Stage::WaitingForPeers,
        })
    }

    fn controller(&self) -> &Arc<SessionController<MemoryTransport>> {
        self.local.controller()
    }

    /// Drive the demo until `duration` passes, Ctrl-C, or the event stream
    /// ends
    pub async fn run(&mut self) -> Result<()> {
        let deadline = tokio::time::sleep(self.options.duration);
        tokio::pin!(deadline);

        self.print_roster()?;

        loop {
            tokio::select! {
                event = self.events.recv() => match event {
                    Some(event) => self.handle(event).await?,
                    None => break,
                },
                _ = &mut deadline => {
                    info!("⏱️  Demo time is up");
                    break;
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutting down...");
                    break;
                }
            }
        }

        Ok(())
    }

    async fn handle(&mut self, event: ObserverEvent) -> Result<()> {
        match event {
            ObserverEvent::RosterChanged => {
                self.print_roster()?;
                self.finish_handshakes();
                self.advance().await?;
            }

            ObserverEvent::DataReceived { from, payload } => {
                info!(
                    "📥 {}: {}",
                    from.display_name(),
                    String::from_utf8_lossy(&payload)
                );
            }

            ObserverEvent::InvitationReceived(invitation) => {
                println!(
                    "✉️  {} wants to connect, accepting",
                    invitation.from().display_name()
                );
                if let Err(e) = self.controller().accept(&invitation) {
                    warn!("Could not accept invitation: {}", e);
                }
            }

            ObserverEvent::DiscoveryFailed { channel, reason } => {
                warn!("❌ {} failed: {}", channel, reason);
            }
        }

        Ok(())
    }

    fn print_roster(&self) -> Result<()> {
        let controller = self.controller();
        let snapshot = controller.roster();

        if self.options.json {
            println!(
                "{}",
                roster_view::render_json(controller.display_name(), &snapshot)?
            );
        } else {
            println!("{}", roster_view::render(controller.display_name(), &snapshot));
        }
        Ok(())
    }

    /// In manual mode nothing connects until someone completes the
    /// handshake; the demo plays that part
    fn finish_handshakes(&self) {
        if self.options.handshake != HandshakeChoice::Manual {
            return;
        }

        let local_id = self.controller().local_identity().id();
        for peer in self.controller().connecting_peers() {
            let network = self.network.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(300)).await;
                network.complete_handshake(&local_id, &peer.id());
            });
        }
    }

    async fn advance(&mut self) -> Result<()> {
        let controller = self.controller().clone();

        match self.stage {
            Stage::WaitingForPeers if controller.connected_peers().len() == self.options.peers => {
                let greeting = format!("Hello from {}!", controller.display_name());
                let summary = controller
                    .broadcast(greeting.into_bytes(), Reliability::Reliable, |peer, result| {
                        match result {
                            Ok(()) => println!("📤 Greeted {}", peer.display_name()),
                            Err(e) => println!("⚠️  Could not greet {}: {}", peer.display_name(), e),
                        }
                    })
                    .await?;
                info!(
                    "📢 Greeting delivered to {}/{} peers",
                    summary.delivered,
                    summary.total()
                );
                self.stage = Stage::Greeted;

                // Take the first neighbour out of range
                if let Some(first) = controller.connected_peers().first() {
                    println!("📴 {} moves out of range", first.display_name());
                    self.network
                        .sever(&controller.local_identity().id(), &first.id());
                    self.stage = Stage::Severed;
                }
            }
            _ => {}
        }

        Ok(())
    }

    /// Stop every runtime and shut all controllers down
    pub async fn shutdown(self) {
        self.local.stop().await;
        for neighbour in self.neighbours {
            neighbour.stop().await;
        }
        info!("👋 Neighbourhood shut down");
    }
}

/// Run the whole demo
pub async fn run_demo(options: DemoOptions) -> Result<()> {
    let mut neighbourhood = Neighbourhood::start(options)?;
    let outcome = neighbourhood.run().await;
    neighbourhood.shutdown().await;
    outcome
}
