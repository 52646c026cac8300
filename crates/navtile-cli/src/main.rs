//! CLI driver for the navigation tile cache

mod demo_world;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use glam::Vec3;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use demo_world::DemoWorld;
use navtile::{
    AgentProfileRegistry, AgentType, NavTileCache, NavTileConfig, PathRequest, PathResult,
    SchedulerEvent,
};

/// Runs the navigation tile cache against a small demonstration world
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Log at debug level unless RUST_LOG says otherwise
    #[clap(long, short, global = true)]
    verbose: bool,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tick the cache until a path is found, then idle until the tiles are evicted
    Simulate {
        /// Start position (x,y,z)
        #[clap(long, value_parser = parse_vector, default_value = "4,0,4")]
        from: Vec3,

        /// End position (x,y,z)
        #[clap(long, value_parser = parse_vector, default_value = "60,0,10")]
        to: Vec3,

        /// Agent type (humanoid, small, large, aquatic)
        #[clap(long, default_value = "humanoid")]
        agent: AgentType,

        /// Simulated seconds per tick
        #[clap(long, default_value = "0.25")]
        dt: f64,

        /// Maximum number of ticks to run
        #[clap(long, default_value = "2000")]
        max_ticks: usize,

        /// Wall-clock milliseconds each bake takes
        #[clap(long, default_value = "20")]
        bake_ms: u64,

        /// Wall-clock milliseconds to sleep between ticks
        #[clap(long, default_value = "5")]
        tick_ms: u64,

        /// Reject partial paths
        #[clap(long)]
        require_full_path: bool,

        /// Cache configuration (JSON)
        #[clap(long, value_parser)]
        config: Option<PathBuf>,

        /// Agent profile table (JSON)
        #[clap(long, value_parser)]
        profiles: Option<PathBuf>,
    },

    /// Print the agent profile table as JSON
    Profiles {
        /// Agent profile table to validate and print instead of the defaults
        #[clap(long, value_parser)]
        profiles: Option<PathBuf>,
    },

    /// Print the default cache configuration as JSON
    Config,
}

/// Parse a comma-separated vector
fn parse_vector(s: &str) -> Result<Vec3, String> {
    let parts: Vec<&str> = s.split(',').collect();

    if parts.len() != 3 {
        return Err(format!(
            "Vector must have 3 components, got {}",
            parts.len()
        ));
    }

    let x = parts[0].trim().parse::<f32>().map_err(|e| e.to_string())?;
    let y = parts[1].trim().parse::<f32>().map_err(|e| e.to_string())?;
    let z = parts[2].trim().parse::<f32>().map_err(|e| e.to_string())?;

    Ok(Vec3::new(x, y, z))
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .target(env_logger::Target::Stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<NavTileConfig> {
    let Some(path) = path else {
        return Ok(NavTileConfig::default());
    };
    let json = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    NavTileConfig::from_json(&json)
        .with_context(|| format!("Invalid config file: {}", path.display()))
}

fn load_profiles(path: Option<&Path>) -> Result<AgentProfileRegistry> {
    let Some(path) = path else {
        return Ok(AgentProfileRegistry::with_defaults());
    };
    let json = fs::read_to_string(path)
        .with_context(|| format!("Failed to read profile table: {}", path.display()))?;
    AgentProfileRegistry::from_json(&json)
        .with_context(|| format!("Invalid profile table: {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    match args.command {
        Commands::Simulate {
            from,
            to,
            agent,
            dt,
            max_ticks,
            bake_ms,
            tick_ms,
            require_full_path,
            config,
            profiles,
        } => {
            let config = load_config(config.as_deref())?;
            let registry = load_profiles(profiles.as_deref())?;
            let request = PathRequest::new(from, to, agent).with_require_full_path(require_full_path);
            let options = SimulationOptions {
                dt,
                max_ticks,
                bake_delay: Duration::from_millis(bake_ms),
                tick_pause: Duration::from_millis(tick_ms),
            };
            simulate(config, registry, request, options).await
        }
        Commands::Profiles { profiles } => {
            let registry = load_profiles(profiles.as_deref())?;
            println!("{}", registry.to_json()?);
            Ok(())
        }
        Commands::Config => {
            let json = serde_json::to_string_pretty(&NavTileConfig::default())
                .context("Failed to serialize config")?;
            println!("{}", json);
            Ok(())
        }
    }
}

struct SimulationOptions {
    dt: f64,
    max_ticks: usize,
    bake_delay: Duration,
    tick_pause: Duration,
}

/// Drive the cache until a path comes back, then stop querying and let the
/// evictor tear everything down
async fn simulate(
    config: NavTileConfig,
    registry: AgentProfileRegistry,
    request: PathRequest,
    options: SimulationOptions,
) -> Result<()> {
    let world = DemoWorld::new(tokio::runtime::Handle::current(), options.bake_delay);
    let mut cache = NavTileCache::new(config, registry, world)?;

    println!(
        "Finding path for {} from {:?} to {:?}...",
        request.agent, request.from, request.to
    );

    let mut now = 0.0;
    let mut path_found = false;
    let mut ticks = 0;

    while ticks < options.max_ticks {
        ticks += 1;
        now += options.dt;

        let report = cache.tick(now);
        if let SchedulerEvent::Installed(key, stitch) = report.scheduler {
            println!(
                "[{:7.2}s] installed tile {} ({} links created)",
                now, key, stitch.links_created
            );
        }
        if let Some(key) = report.evicted {
            println!("[{:7.2}s] evicted tile {}", now, key);
        }

        if !path_found {
            match cache.find_path_with(request) {
                Ok(PathResult::NotReady) => {}
                Ok(PathResult::Complete(points)) => {
                    print_path("Complete", now, &points);
                    path_found = true;
                }
                Ok(PathResult::Partial(points)) => {
                    print_path("Partial", now, &points);
                    path_found = true;
                }
                Err(e) if e.is_recoverable() => {
                    log::debug!("Path query failed, retrying: {}", e);
                }
                Err(e) => {
                    println!("[{:7.2}s] no path: {}", now, e);
                    path_found = true;
                }
            }
        } else if cache.store().is_empty() && cache.queues().is_empty() {
            break;
        }

        tokio::time::sleep(options.tick_pause).await;
    }

    let stats = cache.statistics();
    println!("Simulation stopped after {} ticks ({:.2}s)", ticks, now);
    println!(
        "Tiles: {} total, {} built, {} building, {} unbuilt",
        stats.total_tiles, stats.built_tiles, stats.building_tiles, stats.unbuilt_tiles
    );
    println!(
        "Builds: {} installed, {} discarded; {} tiles evicted",
        stats.builds_installed, stats.builds_discarded, stats.tiles_evicted
    );
    println!(
        "Backend: {} links, {} data handles; {} link and {} data removals queued",
        cache.backend().link_count(),
        cache.backend().installed_count(),
        stats.queued_link_removals,
        stats.queued_data_removals
    );

    Ok(())
}

fn print_path(kind: &str, now: f64, points: &[Vec3]) {
    println!("[{:7.2}s] {} path with {} waypoints:", now, kind, points.len());
    for (i, point) in points.iter().enumerate() {
        println!("{}: {},{},{}", i, point.x, point.y, point.z);
    }
}
