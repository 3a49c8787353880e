mod bot;
mod config;

use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::{Parser, Subcommand};

use bot::Bot;
use config::PeerConfig;
use hotball::{FixedTimestep, LobbyDirectory, Session, SessionEvent, World};

const STATS_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(name = "hotball-peer")]
#[command(about = "Hosts or joins a replicated hot-ball session")]
struct Args {
    #[arg(short, long, help = "JSON config file")]
    config: Option<PathBuf>,

    #[arg(short, long)]
    port: Option<u16>,

    #[arg(long, help = "Snapshot broadcast interval in ms")]
    interval_ms: Option<u64>,

    #[arg(short, long)]
    tick_rate: Option<u32>,

    #[arg(long, help = "Address to embed in the lobby code")]
    advertise: Option<Ipv4Addr>,

    #[arg(long, help = "Exit after this many seconds")]
    duration_secs: Option<u64>,

    #[arg(long, help = "Let a bot play the local player")]
    bot: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Host a session and print its lobby code
    Host {
        #[arg(long, help = "Level announced to clients as they join")]
        level: Option<String>,
    },
    /// Join the session behind a lobby code
    Join { code: String },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = load_config(&args)?;

    let mut world = World::new(config.world.clone());
    let mut session = Session::new(config.session.clone(), LobbyDirectory::new());

    let level = match &args.command {
        Command::Host { level } => {
            let code = session.start_hosting(&mut world)?;
            log::info!("Lobby code: {}", code);
            level.clone()
        }
        Command::Join { code } => {
            let host = session.join_by_code(code)?;
            log::info!("Joining host at {}", host);
            None
        }
    };

    let bot = args.bot.then(Bot::default);
    let deadline = args
        .duration_secs
        .map(|secs| Instant::now() + Duration::from_secs(secs));

    run(&mut session, &mut world, config.tick_rate, bot, level, deadline);

    session.disconnect();
    log::info!("Final stats: {:?}", session.stats());
    Ok(())
}

fn load_config(args: &Args) -> Result<PeerConfig> {
    let mut config = match &args.config {
        Some(path) => PeerConfig::load(path)?,
        None => PeerConfig::default(),
    };

    if let Some(port) = args.port {
        config.session.port = port;
    }
    if let Some(interval) = args.interval_ms {
        config.session.broadcast_interval_ms = interval;
    }
    if let Some(tick_rate) = args.tick_rate {
        config.tick_rate = tick_rate;
    }
    if let Some(addr) = args.advertise {
        config.session.advertise_addr = Some(addr);
    }

    Ok(config)
}

fn run(
    session: &mut Session,
    world: &mut World,
    tick_rate: u32,
    mut bot: Option<Bot>,
    level: Option<String>,
    deadline: Option<Instant>,
) {
    let mut timestep = FixedTimestep::new(tick_rate);
    let mut last_frame = Instant::now();
    let mut last_stats = Instant::now();

    while deadline.is_none_or(|deadline| Instant::now() < deadline) {
        let now = Instant::now();
        timestep.accumulate((now - last_frame).as_secs_f32());
        last_frame = now;

        while timestep.consume_tick() {
            if let Some(bot) = &mut bot {
                bot.drive(session, world, timestep.dt());
            }
            session.update(world, timestep.dt());

            let events: Vec<SessionEvent> = session.drain_events().collect();
            for event in events {
                handle_event(session, world, event, level.as_deref());
            }
        }

        if last_stats.elapsed() >= STATS_INTERVAL {
            last_stats = Instant::now();
            log::info!(
                "{} players, {} entities, {:?}",
                session.player_count(),
                world.registry().len(),
                session.stats()
            );
        }

        thread::sleep(Duration::from_millis(1));
    }
}

fn handle_event(session: &mut Session, world: &mut World, event: SessionEvent, level: Option<&str>) {
    match event {
        SessionEvent::ClientJoined { addr, player } => {
            log::info!("{} joined from {}", player, addr);
            if let Some(level) = level {
                if let Err(e) = session.start_game(level) {
                    log::warn!("Could not announce level: {}", e);
                }
            }
        }
        SessionEvent::IdentityAssigned { player } => {
            log::info!("Playing as {}", player);
        }
        SessionEvent::EntitySpawned { id } => log::debug!("Spawned {}", id),
        SessionEvent::EntityDestroyed { id } => log::debug!("Destroyed {}", id),
        SessionEvent::PlayerEliminated { player, ball } => {
            log::info!("{} was hit by {}", player, ball);
            if let Some(position) = world.respawn_player(&player) {
                log::debug!("{} respawned at {:?}", player, position);
            }
        }
        SessionEvent::Chat { from, text } => match from {
            Some(from) => log::info!("<{}> {}", from, text),
            None => log::info!("<chat> {}", text),
        },
        SessionEvent::GameStarted { level } => log::info!("Level {} started", level),
        SessionEvent::Disconnected => log::info!("Session closed"),
    }
}
