mod bot;

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;

use hitscan::{HealthChanged, HitResolved, ObserverConfig, ObserverSession, UdpEndpoint};

use bot::{Bot, Script};

#[derive(Parser)]
#[command(name = "hitscan-client")]
#[command(about = "Scripted observer that joins a host, arms itself and shoots")]
struct Args {
    #[arg(short, long, default_value_t = SocketAddr::from(([127, 0, 0, 1], hitscan::DEFAULT_PORT)))]
    server: SocketAddr,

    #[arg(short, long, default_value = "0.0.0.0:0")]
    bind: String,

    #[arg(short, long, help = "Observer configuration file (TOML)")]
    config: Option<PathBuf>,

    #[arg(long, default_value_t = 0.5, help = "Seconds of each burst")]
    burst: f64,

    #[arg(long, default_value_t = 1.0, help = "Seconds between bursts")]
    pause: f64,

    #[arg(short, long, help = "Leave after this many seconds")]
    duration: Option<f64>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => ObserverConfig::default(),
    };
    let endpoint =
        UdpEndpoint::bind(&args.bind).with_context(|| format!("binding {}", args.bind))?;

    let mut session = ObserverSession::new(endpoint, args.server, config);
    session
        .notifications_mut()
        .health_changed
        .subscribe(|change: &HealthChanged| {
            log::info!(
                "{} health {:.1} ({:+.1})",
                change.entity,
                change.health,
                change.delta
            );
        });
    session
        .notifications_mut()
        .hit_resolved
        .subscribe(|hit: &HitResolved| {
            log::debug!("trail from weapon {} to {:?}", hit.weapon, hit.trail_end);
        });

    log::info!("joining {} from {}", args.server, session.local_addr());
    let mut bot = Bot::new(
        session,
        Script {
            burst_secs: args.burst,
            pause_secs: args.pause,
        },
    );

    let start = Instant::now();
    let mut last = start;
    while !bot.is_finished() {
        let now = Instant::now();
        bot.update((now - last).as_secs_f32());
        last = now;

        for event in bot.session_mut().drain_events() {
            log::info!("{:?}", event);
        }

        if args
            .duration
            .is_some_and(|limit| start.elapsed().as_secs_f64() >= limit)
        {
            bot.quit();
        }
        thread::sleep(Duration::from_millis(1));
    }

    let session = bot.session();
    log::info!(
        "done: rtt {:.1} ms, {} packets sent, {} received",
        session.rtt_ms(),
        session.stats().packets_sent,
        session.stats().packets_received
    );
    Ok(())
}

fn load_config(path: &Path) -> Result<ObserverConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
}
