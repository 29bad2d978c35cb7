//! Headless bot binary.
//!
//! Usage:
//!   cargo run -p survival_client --bin bot -- [--addr 127.0.0.1:40000] [--name Bot] [--seed 7]
//!
//! The bot connects, joins, walks to the nearest resource, gathers it, and
//! now and then spends wood on a wall.
//!
//! Console commands:
//!   status - Show bot status
//!   quit   - Exit bot

use std::env;
use std::io::{BufRead, Write};
use std::time::Duration;

use anyhow::Context;
use rand::{rngs::StdRng, Rng, SeedableRng};
use survival_client::client::GameClient;
use survival_shared::{
    config::ServerConfig,
    math::Vec2,
    model::{BuildingKind, ResourceKind},
    net::ServerMsg,
};
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Distance covered per step; the server accepts any in-bounds position.
const STEP: f32 = 20.0;
/// Close enough to gather (the server allows up to 100).
const GATHER_AT: f32 = 90.0;

fn parse_args() -> (ServerConfig, Option<u64>) {
    let mut cfg = ServerConfig::default();
    let mut seed = None;
    let args: Vec<String> = env::args().collect();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--addr" if i + 1 < args.len() => {
                cfg.server_addr = args[i + 1].clone();
                i += 2;
            }
            "--name" if i + 1 < args.len() => {
                cfg.player_name = args[i + 1].clone();
                i += 2;
            }
            "--seed" if i + 1 < args.len() => {
                seed = args[i + 1].parse().ok();
                i += 2;
            }
            _ => i += 1,
        }
    }
    (cfg, seed)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let (cfg, seed) = parse_args();
    info!(server = %cfg.server_addr, name = %cfg.player_name, "Starting bot");

    let mut rng = match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };

    let mut client = GameClient::connect(&cfg).await.context("connect")?;
    client.join(&cfg.player_name).await.context("join")?;

    let (console_tx, mut console_rx) = mpsc::channel::<String>(32);
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut stdout = std::io::stdout();
        loop {
            print!("] ");
            let _ = stdout.flush();
            let mut line = String::new();
            match stdin.lock().read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
            let line = line.trim().to_string();
            if !line.is_empty() && console_tx.blocking_send(line).is_err() {
                break;
            }
        }
    });

    let tick_interval = cfg.tick_interval();

    loop {
        while let Ok(line) = console_rx.try_recv() {
            match line.as_str() {
                "quit" | "exit" => return Ok(()),
                "status" => match &client.me {
                    Some(me) => println!(
                        "id={} pos=({:.0}, {:.0}) hp={}/{} dead={} inv={:?} windmills={}",
                        me.id,
                        me.position.x,
                        me.position.y,
                        me.health,
                        me.max_health,
                        me.dead,
                        me.inventory,
                        me.windmills
                    ),
                    None => println!("id={} (not joined yet)", client.id),
                },
                other => println!("Unknown command: {other}"),
            }
        }

        // Drain whatever arrived since the last step.
        while let Some(msg) = client.next_event(Duration::from_millis(1)).await? {
            match &msg {
                ServerMsg::ResourceGathered { kind, amount } => {
                    debug!(?kind, amount, "Gathered")
                }
                ServerMsg::PlayerKilled { killer, victim } if *victim == client.id => {
                    info!(%killer, "Killed")
                }
                ServerMsg::BuildingPlaced { building } => {
                    debug!(id = %building.id, kind = ?building.kind, "Building placed")
                }
                _ => {}
            }
        }

        if let Some(me) = client.me.clone().filter(|me| !me.dead) {
            let target = client
                .nearest_resource(me.position)
                .map(|r| (r.id, r.position));
            match target {
                Some((id, pos)) if pos.distance(me.position) <= GATHER_AT => {
                    client.gather(id).await?;
                }
                Some((_, pos)) => {
                    let to = pos - me.position;
                    let angle = to.y.atan2(to.x);
                    let step = Vec2::from_angle(angle).scale(STEP.min(to.len()));
                    let next = me.position + step;
                    client.move_to(next.x, next.y, angle).await?;
                }
                None => {
                    let angle = rng.gen_range(0.0..std::f32::consts::TAU);
                    let next = me.position + Vec2::from_angle(angle).scale(STEP);
                    client.move_to(next.x, next.y, angle).await?;
                }
            }

            if me.inventory.get(ResourceKind::Wood) >= 10 && rng.gen_bool(0.05) {
                let spot = me.position + Vec2::from_angle(me.angle).scale(60.0);
                client.build(BuildingKind::Wall, spot.x, spot.y).await?;
            }
        }

        tokio::time::sleep(tick_interval).await;
    }
}
