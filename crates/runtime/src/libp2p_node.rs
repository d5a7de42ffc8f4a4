//! libp2p-backed node runtime.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use futures::StreamExt;
use libp2p::{
    Swarm, SwarmBuilder, identify,
    identity::{Keypair, PublicKey},
    noise, ping,
    swarm::{NetworkBehaviour, SwarmEvent},
    tcp, yamux,
};
use p2pd_primitives::{Multiaddr, NodeId, PeerId};
use p2pd_tasks::TaskExecutor;
use parking_lot::RwLock;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{Instrument, debug, info, info_span, warn};

use crate::{NodeInstance, NodeRuntime, RuntimeError};

/// Default idle timeout for peer connections.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Default identify protocol version.
pub const DEFAULT_PROTOCOL_VERSION: &str = "/p2pd/1.0.0";

/// Interval between keep-alive pings.
const PING_INTERVAL: Duration = Duration::from_secs(15);

/// Capacity of a node's command channel.
const COMMAND_CHANNEL_CAPACITY: usize = 16;

/// Configuration shared by every node the runtime creates.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Connection idle timeout.
    pub idle_timeout: Duration,

    /// Protocol version announced through identify.
    pub protocol_version: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            protocol_version: DEFAULT_PROTOCOL_VERSION.to_string(),
        }
    }
}

/// Combined network behaviour of a managed node.
#[derive(NetworkBehaviour)]
struct NodeBehaviour {
    /// Identify protocol - exchange peer info.
    identify: identify::Behaviour,

    /// Ping protocol - keep connections alive.
    ping: ping::Behaviour,
}

impl NodeBehaviour {
    fn new(local_public_key: PublicKey, protocol_version: String) -> Self {
        Self {
            identify: identify::Behaviour::new(identify::Config::new(
                protocol_version,
                local_public_key,
            )),
            ping: ping::Behaviour::new(ping::Config::new().with_interval(PING_INTERVAL)),
        }
    }
}

/// [`NodeRuntime`] producing libp2p swarms.
#[derive(Debug, Clone)]
pub struct Libp2pRuntime {
    config: RuntimeConfig,
    executor: TaskExecutor,
}

impl Libp2pRuntime {
    /// Create a runtime spawning node tasks on `executor`.
    pub fn new(config: RuntimeConfig, executor: TaskExecutor) -> Self {
        Self { config, executor }
    }

    fn build_swarm(&self, keypair: Keypair) -> Result<Swarm<NodeBehaviour>, RuntimeError> {
        let protocol_version = self.config.protocol_version.clone();
        let idle_timeout = self.config.idle_timeout;

        let swarm = SwarmBuilder::with_existing_identity(keypair)
            .with_tokio()
            .with_tcp(
                tcp::Config::default(),
                noise::Config::new,
                yamux::Config::default,
            )
            .map_err(|e| RuntimeError::Transport(e.to_string()))?
            .with_dns()
            .map_err(|e| RuntimeError::Transport(e.to_string()))?
            .with_behaviour(|keypair| NodeBehaviour::new(keypair.public(), protocol_version))
            .map_err(|e| RuntimeError::Transport(e.to_string()))?
            .with_swarm_config(|cfg| cfg.with_idle_connection_timeout(idle_timeout))
            .build();

        Ok(swarm)
    }
}

#[async_trait]
impl NodeRuntime for Libp2pRuntime {
    type Instance = Libp2pNode;

    async fn start_node(
        &self,
        id: &NodeId,
        private_key: &[u8],
    ) -> Result<Libp2pNode, RuntimeError> {
        let keypair = Keypair::from_protobuf_encoding(private_key).map_err(RuntimeError::Key)?;
        let swarm = self.build_swarm(keypair)?;
        let peer_id = *swarm.local_peer_id();

        let listen_addrs = Arc::new(RwLock::new(Vec::new()));
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = SwarmTask {
            swarm,
            commands: command_rx,
            shutdown: shutdown_rx,
            listen_addrs: listen_addrs.clone(),
        };
        let span = info_span!("node", node_id = %id, %peer_id);
        self.executor.spawn("node-swarm", task.run().instrument(span));

        info!(node_id = %id, %peer_id, "Node instance started");

        Ok(Libp2pNode {
            peer_id,
            private_key: private_key.to_vec(),
            listen_addrs,
            commands: command_tx,
            shutdown: shutdown_tx,
        })
    }
}

/// Requests from a [`Libp2pNode`] handle to its swarm task.
enum Command {
    Listen {
        addr: Multiaddr,
        reply: oneshot::Sender<Result<(), RuntimeError>>,
    },
}

/// Handle to a running libp2p node.
///
/// The swarm itself lives in a task; the handle forwards commands to it.
/// Dropping the handle closes both channels, which stops the task.
pub struct Libp2pNode {
    peer_id: PeerId,
    private_key: Vec<u8>,
    listen_addrs: Arc<RwLock<Vec<Multiaddr>>>,
    commands: mpsc::Sender<Command>,
    shutdown: watch::Sender<bool>,
}

impl std::fmt::Debug for Libp2pNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Libp2pNode")
            .field("peer_id", &self.peer_id)
            .field("listen_addrs", &*self.listen_addrs.read())
            .finish_non_exhaustive()
    }
}

impl Libp2pNode {
    /// Whether [`NodeInstance::close`] has been called or the task has exited.
    pub fn is_closed(&self) -> bool {
        *self.shutdown.borrow() || self.commands.is_closed()
    }
}

#[async_trait]
impl NodeInstance for Libp2pNode {
    fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    fn private_key(&self) -> &[u8] {
        &self.private_key
    }

    async fn add_listen_addr(&self, addr: Multiaddr) -> Result<(), RuntimeError> {
        if *self.shutdown.borrow() {
            return Err(RuntimeError::Closed);
        }

        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Listen { addr, reply })
            .await
            .map_err(|_| RuntimeError::Closed)?;
        response.await.map_err(|_| RuntimeError::Closed)?
    }

    fn listen_addrs(&self) -> Vec<Multiaddr> {
        self.listen_addrs.read().clone()
    }

    fn close(&self) {
        // send_replace never fails, even if the task already exited
        let was_closed = self.shutdown.send_replace(true);
        if !was_closed {
            debug!(peer_id = %self.peer_id, "Closing node instance");
        }
    }
}

/// Drives one node's swarm and serves its handle's commands.
struct SwarmTask {
    swarm: Swarm<NodeBehaviour>,
    commands: mpsc::Receiver<Command>,
    shutdown: watch::Receiver<bool>,
    listen_addrs: Arc<RwLock<Vec<Multiaddr>>>,
}

impl SwarmTask {
    async fn run(mut self) {
        loop {
            tokio::select! {
                // Shutdown wins over queued commands, so nothing binds after close
                biased;

                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        break;
                    }
                }
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                event = self.swarm.select_next_some() => self.handle_swarm_event(event),
            }
        }

        info!("Node instance stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Listen { addr, reply } => {
                let result = self.listen(addr);
                let _ = reply.send(result);
            }
        }
    }

    fn listen(&mut self, addr: Multiaddr) -> Result<(), RuntimeError> {
        if self.listen_addrs.read().contains(&addr) {
            debug!(%addr, "Already listening");
            return Ok(());
        }

        match self.swarm.listen_on(addr.clone()) {
            Ok(listener) => {
                debug!(%addr, ?listener, "Listening on address");
                self.listen_addrs.write().push(addr);
                Ok(())
            }
            Err(e) => {
                warn!(%addr, %e, "Failed to listen on address");
                Err(RuntimeError::Listen {
                    addr,
                    reason: e.to_string(),
                })
            }
        }
    }

    fn handle_swarm_event(&mut self, event: SwarmEvent<NodeBehaviourEvent>) {
        match event {
            SwarmEvent::NewListenAddr { address, .. } => {
                info!(%address, "New listen address");
            }
            SwarmEvent::ExpiredListenAddr { address, .. } => {
                debug!(%address, "Listen address expired");
            }
            SwarmEvent::ListenerError { error, .. } => {
                warn!(%error, "Listener error");
            }
            SwarmEvent::ListenerClosed {
                addresses, reason, ..
            } => {
                warn!(?addresses, ?reason, "Listener closed");
            }
            SwarmEvent::ConnectionEstablished {
                peer_id,
                endpoint,
                num_established,
                ..
            } => {
                debug!(
                    %peer_id,
                    endpoint = %endpoint.get_remote_address(),
                    num_established,
                    "Connection established"
                );
            }
            SwarmEvent::ConnectionClosed {
                peer_id,
                cause,
                num_established,
                ..
            } => {
                debug!(%peer_id, num_established, cause = ?cause, "Connection closed");
            }
            SwarmEvent::Behaviour(NodeBehaviourEvent::Identify(identify::Event::Received {
                peer_id,
                info,
                ..
            })) => {
                debug!(
                    %peer_id,
                    protocol_version = %info.protocol_version,
                    agent_version = %info.agent_version,
                    "Received identify info"
                );
            }
            SwarmEvent::Behaviour(NodeBehaviourEvent::Ping(ping::Event {
                peer,
                result: Err(e),
                ..
            })) => {
                debug!(%peer, %e, "Ping failed");
            }
            _ => {}
        }
    }
}
