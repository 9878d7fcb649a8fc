mod arena;
mod config;
mod events;

use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;

use hitscan::{HostSession, Transport, UdpEndpoint};

#[derive(Parser)]
#[command(name = "hitscan-server")]
#[command(about = "Authoritative hitscan combat host")]
pub struct Args {
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: String,

    #[arg(short, long, default_value_t = hitscan::DEFAULT_PORT)]
    port: u16,

    #[arg(short, long, help = "Host configuration file (TOML)")]
    config: Option<PathBuf>,

    #[arg(short, long)]
    tick_rate: Option<u32>,

    #[arg(short, long)]
    max_peers: Option<usize>,

    #[arg(long, help = "Seed for spread and simulated loss")]
    seed: Option<u64>,

    #[arg(long, help = "Drop outgoing packets at random")]
    simulate_packet_loss: bool,

    #[arg(long, default_value_t = 0.0, help = "Packet loss percentage (0-100)")]
    loss_percent: f32,

    #[arg(long, help = "Stop after this many seconds")]
    duration: Option<f64>,

    #[arg(long, help = "Start with an empty world")]
    no_arena: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = config::load(&args)?;
    let bind_addr = format!("{}:{}", args.bind, args.port);
    let endpoint =
        UdpEndpoint::bind(&bind_addr).with_context(|| format!("binding {}", bind_addr))?;

    let mut host = HostSession::new(endpoint, config);
    events::subscribe(host.notifications_mut());
    if !args.no_arena {
        arena::populate(&mut host)?;
    }

    log::info!(
        "Server started on {} at {} Hz",
        host.local_addr(),
        host.config().tick_rate
    );
    run(&mut host, args.duration);

    log::info!("Server shutting down");
    host.shutdown();
    let stats = host.stats();
    log::info!(
        "sent {} packets ({} bytes), received {} packets ({} bytes)",
        stats.packets_sent,
        stats.bytes_sent,
        stats.packets_received,
        stats.bytes_received
    );
    Ok(())
}

fn run<T: Transport>(host: &mut HostSession<T>, duration: Option<f64>) {
    let start = Instant::now();
    let mut last = start;

    loop {
        let now = Instant::now();
        host.update((now - last).as_secs_f32());
        last = now;

        for event in host.drain_events() {
            events::log_session_event(&event);
        }

        if duration.is_some_and(|limit| start.elapsed().as_secs_f64() >= limit) {
            break;
        }
        thread::sleep(Duration::from_millis(1));
    }
}
