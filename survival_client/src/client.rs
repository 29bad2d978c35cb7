//! Client implementation.
//!
//! The client maintains:
//! - A reliable stream to the server, split into a writer and a background
//!   reader task that queues decoded events
//! - A local mirror of the world built from `init` and later events
//! - The latest `gameState` snapshot

use std::{collections::BTreeMap, net::SocketAddr, time::Duration};

use anyhow::Context;
use survival_shared::{
    config::ServerConfig,
    entity::EntityId,
    math::Vec2,
    model::{AttackOutcome, Building, BuildingKind, PlayerView, Resource, Snapshot},
    net::{BuildRequest, ClientMsg, FrameWriter, MoveInput, ReliableConn, ServerMsg},
};
use tokio::{sync::mpsc, time};
use tracing::{debug, info};

/// How long `connect` waits for the server's `init`.
const INIT_TIMEOUT: Duration = Duration::from_secs(5);

/// High-level game client.
pub struct GameClient {
    /// Identity the server assigned to this connection.
    pub id: EntityId,
    pub width: f32,
    pub height: f32,
    pub resources: BTreeMap<EntityId, Resource>,
    pub buildings: BTreeMap<EntityId, Building>,
    /// Own player, once joined.
    pub me: Option<PlayerView>,
    pub last_state: Option<Snapshot>,

    writer: FrameWriter,
    events: mpsc::UnboundedReceiver<ServerMsg>,
}

impl GameClient {
    /// Connects to a server and waits for its `init` message.
    pub async fn connect(cfg: &ServerConfig) -> anyhow::Result<Self> {
        let server_addr: SocketAddr = cfg.server_addr.parse().context("parse server_addr")?;
        info!(server = %server_addr, "Connecting to server");

        let (mut reader, writer) = ReliableConn::connect(server_addr).await?.into_split();
        let (tx, mut events) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            loop {
                match reader.recv::<ServerMsg>().await {
                    Ok(msg) => {
                        if tx.send(msg).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        debug!(error = %e, "Server stream ended");
                        break;
                    }
                }
            }
        });

        let first = time::timeout(INIT_TIMEOUT, events.recv())
            .await
            .context("timed out waiting for init")?
            .context("connection closed before init")?;
        let ServerMsg::Init {
            you,
            width,
            height,
            resources,
            buildings,
        } = first
        else {
            anyhow::bail!("expected Init, got {first:?}");
        };

        info!(client_id = %you, resources = resources.len(), "Connected to server");
        Ok(Self {
            id: you,
            width,
            height,
            resources: resources.into_iter().map(|r| (r.id, r)).collect(),
            buildings: buildings.into_iter().map(|b| (b.id, b)).collect(),
            me: None,
            last_state: None,
            writer,
            events,
        })
    }

    pub async fn send(&mut self, msg: &ClientMsg) -> anyhow::Result<()> {
        self.writer.send(msg).await
    }

    pub async fn join(&mut self, name: &str) -> anyhow::Result<()> {
        self.send(&ClientMsg::Join {
            name: Some(name.to_string()),
        })
        .await
    }

    pub async fn move_to(&mut self, x: f32, y: f32, angle: f32) -> anyhow::Result<()> {
        self.send(&ClientMsg::Move(MoveInput {
            x: Some(x),
            y: Some(y),
            angle: Some(angle),
            selected_tool: None,
        }))
        .await
    }

    pub async fn gather(&mut self, resource_id: EntityId) -> anyhow::Result<()> {
        self.send(&ClientMsg::Gather { resource_id }).await
    }

    pub async fn build(&mut self, kind: BuildingKind, x: f32, y: f32) -> anyhow::Result<()> {
        self.send(&ClientMsg::Build(BuildRequest { kind, x, y })).await
    }

    pub async fn attack(&mut self, target_id: EntityId) -> anyhow::Result<()> {
        self.send(&ClientMsg::Attack { target_id }).await
    }

    pub async fn craft(&mut self, item_type: &str) -> anyhow::Result<()> {
        self.send(&ClientMsg::Craft {
            item_type: item_type.to_string(),
        })
        .await
    }

    pub async fn shoot(&mut self, angle: f32) -> anyhow::Result<()> {
        self.send(&ClientMsg::Shoot { angle }).await
    }

    /// Next event within `timeout`, folded into the local mirror.
    /// `Ok(None)` on timeout; an error once the server has gone away.
    pub async fn next_event(&mut self, timeout: Duration) -> anyhow::Result<Option<ServerMsg>> {
        match time::timeout(timeout, self.events.recv()).await {
            Ok(Some(msg)) => {
                self.apply(&msg);
                Ok(Some(msg))
            }
            Ok(None) => anyhow::bail!("server connection closed"),
            Err(_) => Ok(None),
        }
    }

    /// Consumes events until one satisfies `pred`, failing after `timeout`.
    pub async fn wait_for<F>(&mut self, timeout: Duration, mut pred: F) -> anyhow::Result<ServerMsg>
    where
        F: FnMut(&ServerMsg) -> bool,
    {
        let deadline = time::Instant::now() + timeout;
        loop {
            let left = deadline.saturating_duration_since(time::Instant::now());
            match self.next_event(left).await? {
                Some(msg) if pred(&msg) => return Ok(msg),
                Some(_) => {}
                None => anyhow::bail!("timed out after {timeout:?}"),
            }
        }
    }

    fn apply(&mut self, msg: &ServerMsg) {
        match msg {
            ServerMsg::PlayerData(view) => self.me = Some(view.clone()),
            ServerMsg::ResourceAdded { resource } => {
                let _ = self.resources.insert(resource.id, resource.clone());
            }
            ServerMsg::ResourceRemoved { id } => {
                let _ = self.resources.remove(id);
            }
            ServerMsg::BuildingPlaced { building } => {
                let _ = self.buildings.insert(building.id, building.clone());
            }
            ServerMsg::InventoryUpdate { inventory }
            | ServerMsg::ItemCrafted { inventory, .. } => {
                if let Some(me) = &mut self.me {
                    me.inventory = *inventory;
                }
            }
            ServerMsg::PlayerHit {
                outcome: AttackOutcome::BuildingDestroyed { target, .. },
                ..
            } => {
                let _ = self.buildings.remove(target);
            }
            ServerMsg::GameState(snapshot) => {
                if let Some(view) = snapshot.players.iter().find(|p| p.id == self.id) {
                    self.me = Some(view.clone());
                }
                self.buildings = snapshot
                    .buildings
                    .iter()
                    .map(|b| (b.id, b.clone()))
                    .collect();
                self.last_state = Some(snapshot.clone());
            }
            _ => {}
        }
    }

    /// Nearest known resource to `from`; ties go to the lowest id.
    pub fn nearest_resource(&self, from: Vec2) -> Option<&Resource> {
        self.resources.values().min_by(|a, b| {
            a.position
                .distance(from)
                .total_cmp(&b.position.distance(from))
                .then(a.id.cmp(&b.id))
        })
    }
}
