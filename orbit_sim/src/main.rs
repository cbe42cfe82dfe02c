mod sim_config;

use chrono::Utc;
use position_engine::catalog::parse_catalog_json;
use position_engine::{
    parse_tle_catalog, CameraOrientation, ConfigError, EngineConfig, EngineError, EntityId,
    ObjectId, PositionEngine, TrackedObject,
};
use sim_config::SimConfig;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Error)]
enum SimError {
    #[error("usage: orbit_sim <catalog.tle|catalog.json> [sim_config.json]")]
    Usage,
    #[error("failed to read catalog {path}: {source}")]
    Catalog {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

fn load_catalog(path: &Path) -> Result<Vec<TrackedObject>, SimError> {
    let text = std::fs::read_to_string(path).map_err(|source| SimError::Catalog {
        path: path.to_path_buf(),
        source,
    })?;
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        Ok(parse_catalog_json(&text)?)
    } else {
        Ok(parse_tle_catalog(&text))
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    fmt().with_env_filter(filter).init();
}

fn run() -> Result<(), SimError> {
    let mut args = std::env::args().skip(1);
    let catalog_path = PathBuf::from(args.next().ok_or(SimError::Usage)?);
    let sim = match args.next() {
        Some(path) => SimConfig::load_from(Path::new(&path))?,
        None => SimConfig::default(),
    };

    let engine_config = EngineConfig::load_or_default()?;
    init_logging(&engine_config.log_level);

    let mut engine = PositionEngine::new(&engine_config);
    let report = engine.update_catalog(load_catalog(&catalog_path)?);
    info!(
        added = report.added.len(),
        unresolvable = report.unresolvable.len(),
        "loaded catalog from {}",
        catalog_path.display()
    );

    let started = Instant::now();
    let sim_start = sim.start_time.unwrap_or_else(Utc::now);
    let mut camera = CameraOrientation::default();
    let mut last_summary = started;
    let mut last_reload = started;
    let mut following = false;

    loop {
        let now = Instant::now();
        let elapsed = now.duration_since(started);
        if sim.run_duration().is_some_and(|limit| elapsed >= limit) {
            break;
        }
        let Some(sim_time) = sim.sim_time(sim_start, elapsed) else {
            warn!("simulated time left the representable range, stopping");
            break;
        };

        if let Some(interval) = sim.reload_interval() {
            if now.duration_since(last_reload) >= interval {
                last_reload = now;
                match load_catalog(&catalog_path) {
                    Ok(objects) => {
                        engine.update_catalog(objects);
                    }
                    Err(e) => warn!("catalog reload failed, keeping previous: {e}"),
                }
            }
        }

        if let Some(report) = engine.on_clock_tick(now, sim_time) {
            debug!(
                sim_time = %report.sim_time,
                samples = report.alignment.sample_count,
                selection = ?report.selection,
                "tick committed"
            );
            if let Some(nudge) = engine.camera_nudge(camera) {
                camera = nudge.orientation;
                debug!(
                    heading_deg = camera.heading_deg,
                    pitch_deg = camera.pitch_deg,
                    "camera nudged"
                );
            }
        }

        if !following {
            if let Some(number) = sim.follow {
                following = true;
                match engine.select(&ObjectId::Catalog(number)) {
                    Ok(state) => info!(
                        "following {} at {:.3}, {:.3}",
                        state.snapshot.name,
                        state.snapshot.position.latitude_deg,
                        state.snapshot.position.longitude_deg
                    ),
                    Err(e) => warn!("cannot follow {number}: {e}"),
                }
            }
        }

        // Render pass: every entity is positioned at the frame's time
        let ids: Vec<EntityId> = engine.entities().map(|e| e.id).collect();
        let mut positioned = 0usize;
        for id in ids {
            if engine.position_at(id, sim_time)?.is_some() {
                positioned += 1;
            }
        }

        if now.duration_since(last_summary) >= sim.summary_interval() {
            last_summary = now;
            let summary = engine.summary();
            info!(
                catalog = summary.catalog_objects,
                propagatable = summary.propagatable,
                unresolvable = summary.unresolvable,
                "updated positions for {positioned} objects"
            );
            if let Some(state) = engine.selection() {
                info!(
                    "{}: lat {:.3} lon {:.3} alt {:.1} km",
                    state.snapshot.name,
                    state.snapshot.position.latitude_deg,
                    state.snapshot.position.longitude_deg,
                    state.snapshot.position.altitude_km
                );
            }
        }

        thread::sleep(sim.frame_interval());
    }

    let (hits, misses) = engine.memo().stats();
    info!(hits, misses, "simulation finished");
    Ok(())
}

fn main() {
    if let Err(e) = run() {
        eprintln!("orbit_sim: {e}");
        std::process::exit(1);
    }
}
