//! Standalone server binary.
//!
//! Usage:
//!   cargo run -p survival_server -- [--config server.json] [--addr 127.0.0.1:40000] [--tick-hz 20] [--seed 42]
//!
//! The server listens for client connections, runs the fixed-rate
//! simulation, and broadcasts a snapshot every tick.
//!
//! Console commands:
//!   status               - Show server status
//!   spawn <kind> [count] - Spawn resources (tree, rock, bush, gold-ore)
//!   quit                 - Shutdown server

use std::env;
use std::io::{BufRead, Write};

use anyhow::Context;
use survival_server::server::GameServer;
use survival_shared::config::ServerConfig;
use tokio::sync::mpsc;
use tracing::{info, warn};

fn parse_args() -> anyhow::Result<ServerConfig> {
    let args: Vec<String> = env::args().collect();

    // The config file is the base layer; explicit flags override it.
    let mut cfg = match args.iter().position(|a| a == "--config") {
        Some(i) if i + 1 < args.len() => {
            let path = &args[i + 1];
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("read config {path}"))?;
            ServerConfig::from_json_str(&text).with_context(|| format!("parse config {path}"))?
        }
        _ => ServerConfig::default(),
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--addr" if i + 1 < args.len() => {
                cfg.server_addr = args[i + 1].clone();
                i += 2;
            }
            "--tick-hz" if i + 1 < args.len() => {
                cfg.tick_hz = args[i + 1].parse().unwrap_or(20);
                i += 2;
            }
            "--seed" if i + 1 < args.len() => {
                cfg.seed = args[i + 1].parse().ok();
                i += 2;
            }
            _ => i += 1,
        }
    }
    Ok(cfg)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let mut cfg = parse_args()?;
    if cfg.effective_tick_hz() != cfg.tick_hz {
        warn!(
            requested = cfg.tick_hz,
            using = cfg.effective_tick_hz(),
            "Tick rate out of range; clamped"
        );
        cfg.tick_hz = cfg.effective_tick_hz();
    }
    info!(addr = %cfg.server_addr, tick_hz = cfg.tick_hz, seed = ?cfg.seed, "Starting server");

    let mut server = GameServer::bind(cfg).await.context("create server")?;
    let local = server.local_addr()?;
    info!(%local, "Server listening");

    // Set up console input channel.
    let (console_tx, console_rx) = mpsc::channel::<String>(32);
    server.set_console_input(console_rx);

    // Spawn stdin reader thread.
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

    println!("Server ready. Type 'status' for info, 'spawn <kind> [count]', 'quit' to exit.");
    println!();

    server.run().await
}
