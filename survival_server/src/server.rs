//! Server implementation.
//!
//! A single loop task owns the [`Game`] and is the only mutator. It
//! multiplexes:
//! - new TCP connections
//! - decoded commands forwarded by per-connection reader tasks
//! - the fixed-rate tick (which also broadcasts the `gameState` snapshot)
//! - the background resource replenishment timer
//! - operator console lines
//!
//! Each connection gets a reader task (frames -> `Inbound`) and a writer task
//! draining a bounded queue of outbound events. A client whose queue fills up
//! is disconnected. Commands from one connection are applied in arrival
//! order; no ordering holds across connections.

use std::{
    collections::BTreeMap,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    sync::Arc,
};

use anyhow::Context;
use survival_shared::{
    config::ServerConfig,
    entity::EntityId,
    model::AttackOutcome,
    net::{ClientMsg, ReliableConn, ReliableListener, ServerMsg},
};
use tokio::{
    sync::mpsc,
    time::{self, Instant, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use crate::{
    game::{Game, Rejected, TickReport},
    player::Player,
};

/// Capacity of the shared inbound command queue.
const INBOUND_QUEUE: usize = 1024;
/// Per-connection outbound capacity; about 12 s of snapshots at 20 Hz.
pub const OUTBOX_QUEUE: usize = 256;
/// Upper bound for one console `spawn`.
const MAX_CONSOLE_SPAWN: usize = 1000;

/// Event from a connection task to the server loop.
#[derive(Debug)]
enum Inbound {
    Command { id: EntityId, msg: ClientMsg },
    Disconnected { id: EntityId },
}

/// Outbound event queue of one connection.
pub type Outbox = mpsc::Sender<Arc<ServerMsg>>;

/// Connected client state.
struct Session {
    peer: SocketAddr,
    outbox: Outbox,
}

/// Game server.
pub struct GameServer {
    pub cfg: ServerConfig,
    game: Game,
    sessions: BTreeMap<EntityId, Session>,
    /// Sessions whose outbox overflowed or closed; dropped by `reap_stalled`.
    stalled: Vec<EntityId>,

    listener: ReliableListener,
    inbound_tx: mpsc::Sender<Inbound>,
    inbound_rx: mpsc::Receiver<Inbound>,

    /// Channel for console commands from stdin.
    console_rx: Option<mpsc::Receiver<String>>,
    shutdown: bool,
}

impl GameServer {
    /// Binds the listener and generates the world.
    pub async fn bind(cfg: ServerConfig) -> anyhow::Result<Self> {
        let addr: SocketAddr = cfg.server_addr.parse().context("parse server_addr")?;
        let listener = ReliableListener::bind(addr).await?;
        let game = Game::new(&cfg);
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_QUEUE);

        info!(
            resources = game.world().resource_count(),
            width = cfg.world_width,
            height = cfg.world_height,
            "World generated"
        );

        Ok(Self {
            cfg,
            game,
            sessions: BTreeMap::new(),
            stalled: Vec::new(),
            listener,
            inbound_tx,
            inbound_rx,
            console_rx: None,
            shutdown: false,
        })
    }

    /// Sets the console input receiver.
    pub fn set_console_input(&mut self, rx: mpsc::Receiver<String>) {
        self.console_rx = Some(rx);
    }

    /// Returns the local address (after binding).
    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn game(&self) -> &Game {
        &self.game
    }

    pub fn game_mut(&mut self) -> &mut Game {
        &mut self.game
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Runs the server loop until `quit` is entered on the console.
    pub async fn run(mut self) -> anyhow::Result<()> {
        let mut tick = time::interval(self.cfg.tick_interval());
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let replenish_every = self.cfg.replenish_interval();
        let mut replenish = time::interval_at(Instant::now() + replenish_every, replenish_every);

        info!(tick_hz = self.cfg.effective_tick_hz(), "Server loop started");
        while !self.shutdown {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((conn, peer)) => {
                        let _ = self.accept_connection(conn, peer);
                    }
                    Err(e) => warn!(error = %e, "Accept failed"),
                },
                Some(inbound) = self.inbound_rx.recv() => self.on_inbound(inbound),
                _ = tick.tick() => {
                    let _ = self.step();
                }
                _ = replenish.tick() => self.replenish(),
                line = next_console_line(&mut self.console_rx) => match line {
                    Some(line) => {
                        for out in self.exec_console(&line) {
                            println!("{out}");
                        }
                    }
                    None => self.console_rx = None,
                },
            }
        }
        info!("Server shutting down");
        Ok(())
    }

    /// Wires a fresh TCP connection to the loop and returns its player id.
    pub fn accept_connection(&mut self, conn: ReliableConn, peer: SocketAddr) -> EntityId {
        let (mut reader, mut writer) = conn.into_split();
        let (outbox, mut queue) = mpsc::channel::<Arc<ServerMsg>>(OUTBOX_QUEUE);
        let id = self.register_session(peer, outbox);

        tokio::spawn(async move {
            while let Some(msg) = queue.recv().await {
                if let Err(e) = writer.send(msg.as_ref()).await {
                    debug!(client = %id, error = %e, "Write failed; dropping outbox");
                    break;
                }
            }
        });

        let inbound = self.inbound_tx.clone();
        tokio::spawn(async move {
            loop {
                let payload = match reader.recv_raw().await {
                    Ok(payload) => payload,
                    Err(e) => {
                        debug!(client = %id, error = %e, "Connection closed");
                        break;
                    }
                };
                match serde_json::from_slice::<ClientMsg>(&payload) {
                    Ok(msg) => {
                        if inbound.send(Inbound::Command { id, msg }).await.is_err() {
                            return;
                        }
                    }
                    Err(e) => debug!(client = %id, error = %e, "Ignoring malformed command"),
                }
            }
            let _ = inbound.send(Inbound::Disconnected { id }).await;
        });

        id
    }

    /// Registers a connection's outbound queue and sends it `init`.
    pub fn register_session(&mut self, peer: SocketAddr, outbox: Outbox) -> EntityId {
        let id = self.game.allocate_id();
        let bounds = self.game.world().bounds();
        let init = ServerMsg::Init {
            you: id,
            width: bounds.width,
            height: bounds.height,
            resources: self.game.world().resources().cloned().collect(),
            buildings: self.game.world().buildings().cloned().collect(),
        };
        let _ = outbox.try_send(Arc::new(init));
        self.sessions.insert(id, Session { peer, outbox });
        info!(client = %id, %peer, "Client connected");
        id
    }

    fn on_inbound(&mut self, inbound: Inbound) {
        match inbound {
            Inbound::Command { id, msg } => self.handle_command(id, msg),
            Inbound::Disconnected { id } => self.disconnect(id),
        }
    }

    /// Applies one client command and fans out the resulting events.
    /// Commands from connections that are no longer registered are dropped.
    pub fn handle_command(&mut self, id: EntityId, msg: ClientMsg) {
        if !self.sessions.contains_key(&id) {
            debug!(client = %id, "Command from closed session ignored");
            return;
        }
        self.apply_command(id, msg);
        self.reap_stalled();
    }

    fn apply_command(&mut self, id: EntityId, msg: ClientMsg) {
        match msg {
            ClientMsg::Join { name } => {
                let rejoin = self.game.player(id).is_some();
                let player = self.game.add_player(id, name.as_deref().unwrap_or_default());
                self.send_to(id, ServerMsg::PlayerData(player.clone()));
                if rejoin {
                    return;
                }
                self.broadcast(ServerMsg::PlayerJoined { id, player });
                let players = self.game.players().map(Player::view).collect();
                self.broadcast(ServerMsg::Players { players });
            }
            ClientMsg::Move(input) => {
                if let Some(moved) = self.game.apply_move(id, &input) {
                    self.broadcast_except(
                        id,
                        ServerMsg::PlayerMoved {
                            id,
                            x: moved.position.x,
                            y: moved.position.y,
                            angle: moved.angle,
                        },
                    );
                }
            }
            ClientMsg::Gather { resource_id } => match self.game.gather(id, resource_id) {
                Ok(gathered) => {
                    self.send_to(
                        id,
                        ServerMsg::ResourceGathered {
                            kind: gathered.kind,
                            amount: gathered.amount,
                        },
                    );
                    self.broadcast(ServerMsg::ResourceRemoved {
                        id: gathered.removed,
                    });
                    self.broadcast(ServerMsg::ResourceAdded {
                        resource: gathered.replacement,
                    });
                }
                Err(e) => rejected(id, "gather", &e),
            },
            ClientMsg::Build(req) => match self.game.build(id, &req) {
                Ok(built) => {
                    self.broadcast(ServerMsg::BuildingPlaced {
                        building: built.building,
                    });
                    self.send_to(
                        id,
                        ServerMsg::InventoryUpdate {
                            inventory: built.inventory,
                        },
                    );
                }
                Err(e) => rejected(id, "build", &e),
            },
            ClientMsg::Attack { target_id } => match self.game.attack(id, target_id) {
                Ok(outcome) => self.announce_hit(id, outcome),
                Err(e) => rejected(id, "attack", &e),
            },
            ClientMsg::Craft { item_type } => match self.game.craft(id, &item_type) {
                Ok(crafted) => self.send_to(
                    id,
                    ServerMsg::ItemCrafted {
                        item: crafted.item,
                        inventory: crafted.inventory,
                    },
                ),
                Err(e) => rejected(id, "craft", &e),
            },
            ClientMsg::Shoot { angle } => match self.game.fire_projectile(id, angle) {
                Ok(projectile) => debug!(client = %id, projectile = %projectile.id, "Projectile fired"),
                Err(e) => rejected(id, "shoot", &e),
            },
        }
    }

    fn announce_hit(&mut self, attacker: EntityId, outcome: AttackOutcome) {
        if !outcome.is_hit() {
            return;
        }
        let killed = match &outcome {
            AttackOutcome::PlayerKilled { target, .. } => Some(*target),
            _ => None,
        };
        self.broadcast(ServerMsg::PlayerHit { attacker, outcome });
        if let Some(victim) = killed {
            self.broadcast(ServerMsg::PlayerKilled {
                killer: attacker,
                victim,
            });
        }
    }

    /// Tears down a connection. The player's buildings are left in place.
    pub fn disconnect(&mut self, id: EntityId) {
        self.drop_session(id);
        self.reap_stalled();
    }

    fn drop_session(&mut self, id: EntityId) {
        if self.sessions.remove(&id).is_none() {
            return;
        }
        let _ = self.game.remove_player(id);
        self.broadcast(ServerMsg::PlayerLeft { id });
        info!(client = %id, "Client disconnected");
    }

    /// Disconnects every session whose outbox overflowed or closed.
    /// Announcing one departure can stall another client, hence the loop.
    fn reap_stalled(&mut self) {
        while let Some(id) = self.stalled.pop() {
            if self.sessions.contains_key(&id) {
                warn!(client = %id, "Outbound queue full or closed; dropping client");
                self.drop_session(id);
            }
        }
    }

    /// Executes one fixed simulation step and broadcasts the snapshot.
    pub fn step(&mut self) -> TickReport {
        let report = self.game.tick();
        for hit in &report.hits {
            self.announce_hit(hit.owner, hit.outcome.clone());
        }
        for (player, gold) in &report.income {
            debug!(player = %player, gold, "Passive income");
        }
        let snapshot = self.game.snapshot();
        self.broadcast(ServerMsg::GameState(snapshot));
        self.reap_stalled();
        report
    }

    /// Background replenishment: one random resource, announced to everyone.
    pub fn replenish(&mut self) {
        let resource = self.game.replenish();
        debug!(resource = %resource.id, source = resource.source.name(), "Resource replenished");
        self.broadcast(ServerMsg::ResourceAdded { resource });
        self.reap_stalled();
    }

    /// Executes a console command.
    pub fn exec_console(&mut self, line: &str) -> Vec<String> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some(&cmd) = tokens.first() else {
            return Vec::new();
        };

        match cmd {
            "status" => {
                let world = self.game.world();
                let mut out = vec![
                    format!("Tick: {}", self.game.tick_count()),
                    format!("Clients: {}", self.sessions.len()),
                    format!(
                        "Resources: {}  Buildings: {}  Projectiles: {}",
                        world.resource_count(),
                        world.building_count(),
                        self.game.projectiles().len()
                    ),
                ];
                for (id, session) in &self.sessions {
                    match self.game.player(*id) {
                        Some(p) => out.push(format!(
                            "  {id} {}: name={} hp={}/{} dead={} windmills={} inv={:?}",
                            session.peer,
                            p.name,
                            p.health,
                            p.max_health,
                            p.is_dead(),
                            p.windmills(),
                            p.inventory
                        )),
                        None => out.push(format!("  {id} {}: not joined", session.peer)),
                    }
                }
                out
            }
            "spawn" => {
                let Some(&kind) = tokens.get(1) else {
                    return vec!["Usage: spawn <tree|rock|bush|gold-ore> [count]".to_string()];
                };
                let count: usize = tokens
                    .get(2)
                    .and_then(|c| c.parse().ok())
                    .unwrap_or(1)
                    .min(MAX_CONSOLE_SPAWN);
                let mut spawned = 0;
                for _ in 0..count {
                    let Some(resource) = self.game.world_mut().spawn_resource_named(kind) else {
                        break;
                    };
                    self.broadcast(ServerMsg::ResourceAdded { resource });
                    spawned += 1;
                }
                self.reap_stalled();
                if spawned == 0 {
                    vec![format!("Unknown resource kind '{kind}'")]
                } else {
                    vec![format!("Spawned {spawned} {kind}")]
                }
            }
            "quit" | "exit" => {
                self.shutdown = true;
                vec!["Shutting down".to_string()]
            }
            other => vec![format!("Unknown command: {other}")],
        }
    }

    fn send_to(&mut self, id: EntityId, msg: ServerMsg) {
        if let Some(session) = self.sessions.get(&id) {
            if session.outbox.try_send(Arc::new(msg)).is_err() {
                self.stalled.push(id);
            }
        }
    }

    fn broadcast(&mut self, msg: ServerMsg) {
        let msg = Arc::new(msg);
        for (id, session) in &self.sessions {
            if session.outbox.try_send(Arc::clone(&msg)).is_err() {
                self.stalled.push(*id);
            }
        }
    }

    fn broadcast_except(&mut self, skip: EntityId, msg: ServerMsg) {
        let msg = Arc::new(msg);
        for (id, session) in &self.sessions {
            if *id != skip && session.outbox.try_send(Arc::clone(&msg)).is_err() {
                self.stalled.push(*id);
            }
        }
    }
}

fn rejected(id: EntityId, command: &str, err: &Rejected) {
    debug!(client = %id, command, reason = %err, "Command rejected");
}

async fn next_console_line(rx: &mut Option<mpsc::Receiver<String>>) -> Option<String> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Helper for tests: bind to an ephemeral localhost port with a fixed seed.
pub async fn bind_ephemeral(seed: u64) -> anyhow::Result<(GameServer, ServerConfig)> {
    let cfg = ServerConfig {
        server_addr: format!("{}:{}", IpAddr::V4(Ipv4Addr::LOCALHOST), 0),
        seed: Some(seed),
        ..Default::default()
    };
    let mut server = GameServer::bind(cfg).await?;
    let addr = server.local_addr()?;
    server.cfg.server_addr = addr.to_string();
    let cfg = server.cfg.clone();
    Ok((server, cfg))
}
