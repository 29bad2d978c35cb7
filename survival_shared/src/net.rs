//! Networking primitives.
//!
//! Goals:
//! - One reliable ordered channel (TCP) per connection.
//! - Provide the command and event message types used by client/server.
//! - Keep serialization explicit and versionable.
//!
//! Frames are a big-endian `u32` length followed by a JSON payload.

use std::net::SocketAddr;

use anyhow::Context;
use bytes::{BufMut, Bytes, BytesMut};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpListener, TcpStream,
    },
};

use crate::{
    entity::EntityId,
    model::{
        AttackOutcome, Building, BuildingKind, Inventory, ItemKind, PlayerView, Resource,
        ResourceKind, Snapshot,
    },
};

/// Upper bound on a single frame payload.
pub const MAX_FRAME_LEN: usize = 8 * 1024 * 1024;

/// Partial pose update; absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MoveInput {
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub angle: Option<f32>,
    pub selected_tool: Option<String>,
}

/// Placement request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildRequest {
    #[serde(rename = "type")]
    pub kind: BuildingKind,
    pub x: f32,
    pub y: f32,
}

/// Client -> server commands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum ClientMsg {
    Join {
        #[serde(default)]
        name: Option<String>,
    },
    Move(MoveInput),
    #[serde(rename_all = "camelCase")]
    Gather { resource_id: EntityId },
    Build(BuildRequest),
    #[serde(rename_all = "camelCase")]
    Attack { target_id: EntityId },
    #[serde(rename_all = "camelCase")]
    Craft { item_type: String },
    /// Fires a projectile along `angle`.
    Shoot { angle: f32 },
}

/// Server -> client events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum ServerMsg {
    /// Sent once per connection, before anything else.
    Init {
        you: EntityId,
        width: f32,
        height: f32,
        resources: Vec<Resource>,
        buildings: Vec<Building>,
    },
    PlayerData(PlayerView),
    PlayerJoined {
        id: EntityId,
        player: PlayerView,
    },
    Players {
        players: Vec<PlayerView>,
    },
    PlayerMoved {
        id: EntityId,
        x: f32,
        y: f32,
        angle: f32,
    },
    ResourceGathered {
        kind: ResourceKind,
        amount: u32,
    },
    ResourceRemoved {
        id: EntityId,
    },
    ResourceAdded {
        resource: Resource,
    },
    BuildingPlaced {
        building: Building,
    },
    InventoryUpdate {
        inventory: Inventory,
    },
    PlayerHit {
        attacker: EntityId,
        outcome: AttackOutcome,
    },
    PlayerKilled {
        killer: EntityId,
        victim: EntityId,
    },
    ItemCrafted {
        item: ItemKind,
        inventory: Inventory,
    },
    GameState(Snapshot),
    PlayerLeft {
        id: EntityId,
    },
}

/// Serializes one message into a length-prefixed frame.
pub fn encode_frame<T: Serialize>(msg: &T) -> anyhow::Result<Bytes> {
    let payload = serde_json::to_vec(msg).context("serialize msg")?;
    anyhow::ensure!(
        payload.len() <= MAX_FRAME_LEN,
        "frame too large: {} bytes",
        payload.len()
    );
    let mut buf = BytesMut::with_capacity(4 + payload.len());
    buf.put_u32(payload.len() as u32);
    buf.extend_from_slice(&payload);
    Ok(buf.freeze())
}

pub async fn write_frame<W, T>(w: &mut W, msg: &T) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let frame = encode_frame(msg)?;
    w.write_all(&frame).await.context("tcp write")?;
    Ok(())
}

/// Reads one frame payload without decoding it.
pub async fn read_frame_bytes<R>(r: &mut R) -> anyhow::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    r.read_exact(&mut len_buf).await.context("tcp read len")?;
    let len = u32::from_be_bytes(len_buf) as usize;
    anyhow::ensure!(len <= MAX_FRAME_LEN, "frame too large: {len} bytes");
    let mut payload = vec![0u8; len];
    r.read_exact(&mut payload)
        .await
        .context("tcp read payload")?;
    Ok(payload)
}

pub async fn read_frame<R, T>(r: &mut R) -> anyhow::Result<T>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let payload = read_frame_bytes(r).await?;
    serde_json::from_slice(&payload).context("deserialize msg")
}

/// Reliable connection over TCP with length-prefixed frames.
#[derive(Debug)]
pub struct ReliableConn {
    stream: TcpStream,
}

impl ReliableConn {
    pub fn new(stream: TcpStream) -> Self {
        Self { stream }
    }

    pub async fn connect(addr: SocketAddr) -> anyhow::Result<Self> {
        let stream = TcpStream::connect(addr).await.context("tcp connect")?;
        stream.set_nodelay(true).context("tcp nodelay")?;
        Ok(Self::new(stream))
    }

    pub async fn send<T: Serialize>(&mut self, msg: &T) -> anyhow::Result<()> {
        write_frame(&mut self.stream, msg).await
    }

    pub async fn recv<T: DeserializeOwned>(&mut self) -> anyhow::Result<T> {
        read_frame(&mut self.stream).await
    }

    pub fn peer_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.stream.peer_addr()?)
    }

    /// Splits into independently owned read and write halves.
    pub fn into_split(self) -> (FrameReader, FrameWriter) {
        let (r, w) = self.stream.into_split();
        (FrameReader { half: r }, FrameWriter { half: w })
    }
}

/// Read half of a [`ReliableConn`].
#[derive(Debug)]
pub struct FrameReader {
    half: OwnedReadHalf,
}

impl FrameReader {
    pub async fn recv<T: DeserializeOwned>(&mut self) -> anyhow::Result<T> {
        read_frame(&mut self.half).await
    }

    /// Reads one payload; decoding is left to the caller so a bad payload
    /// does not have to end the stream.
    pub async fn recv_raw(&mut self) -> anyhow::Result<Vec<u8>> {
        read_frame_bytes(&mut self.half).await
    }
}

/// Write half of a [`ReliableConn`].
#[derive(Debug)]
pub struct FrameWriter {
    half: OwnedWriteHalf,
}

impl FrameWriter {
    pub async fn send<T: Serialize>(&mut self, msg: &T) -> anyhow::Result<()> {
        write_frame(&mut self.half, msg).await
    }
}

/// TCP server listener.
pub struct ReliableListener {
    listener: TcpListener,
}

impl ReliableListener {
    pub async fn bind(addr: SocketAddr) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(addr).await.context("tcp bind")?;
        Ok(Self { listener })
    }

    pub async fn accept(&self) -> anyhow::Result<(ReliableConn, SocketAddr)> {
        let (stream, addr) = self.listener.accept().await.context("tcp accept")?;
        stream.set_nodelay(true).context("tcp nodelay")?;
        Ok((ReliableConn::new(stream), addr))
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }
}
