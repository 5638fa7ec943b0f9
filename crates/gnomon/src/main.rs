//! # GNOMON
//!
//! Headless demo of the scene synchronization layer.
//!
//! A render thread owns the [`FrameLoop`] and a headless engine; the main
//! thread owns the scene tree and plays a scripted UI session against it:
//! create every primitive, edit parameters, select, drag a gizmo, pick,
//! import, delete and clear.
//!
//! ```bash
//! gnomon --config gnomon.toml --log-level debug
//! RUST_LOG=gnomon_sync=trace gnomon
//! ```

use std::cell::Cell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, ValueEnum};
use gnomon_core::{FrameConfig, GnomonConfig, ObjectId, ParamField, ShapeKind};
use gnomon_engine::{
    command_channel, ui_channel, FrameLoop, FrameLoopStats, GizmoMode, HeadlessBackend,
    HeadlessProbe, Modifiers, MouseButton,
};
use gnomon_sync::SceneCoordinator;
use tracing::{debug, info, warn};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Sleep between UI pumps while waiting on the render thread.
const POLL_INTERVAL: Duration = Duration::from_millis(2);

/// Viewport the scripted session resizes to.
const VIEWPORT: (u32, u32) = (1024, 768);

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    log_level: LogLevel,

    /// Seconds to wait for any single engine confirmation
    #[arg(long, default_value_t = 2.0)]
    timeout: f32,

    /// Mesh file imported during the session
    #[arg(long, value_name = "PATH", default_value = "assets/teapot.obj")]
    import: PathBuf,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from(cli.log_level).into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = match &cli.config {
        Some(path) => GnomonConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => GnomonConfig::default(),
    };
    config.validate().context("invalid configuration")?;
    if !cli.timeout.is_finite() || cli.timeout <= 0.0 {
        bail!("--timeout must be a positive number of seconds");
    }
    let timeout = Duration::from_secs_f32(cli.timeout);

    let (backend, probe) = HeadlessBackend::new();
    let (queue, commands) = command_channel();
    let (poster, inbox) = ui_channel();
    let frames = FrameLoop::new(Box::new(backend), commands, poster.clone(), &config);
    let mut scene = SceneCoordinator::new(queue, poster, inbox, config.tolerances);

    let stop = Arc::new(AtomicBool::new(false));
    let render = spawn_render_thread(frames, config.frame.clone(), Arc::clone(&stop))?;

    let outcome = run_session(&mut scene, &probe, &cli.import, timeout);

    stop.store(true, Ordering::Release);
    let stats = render
        .join()
        .map_err(|_| anyhow!("render thread panicked"))?;
    info!(
        frames = stats.total_frames,
        skipped = stats.skipped_frames,
        jobs = stats.jobs_executed,
        failed = stats.jobs_failed,
        notifications = stats.notifications,
        avg_us = stats.avg_frame_time_us,
        worst_us = stats.worst_frame_time_us,
        "render thread finished"
    );
    outcome
}

fn no_loader(_: &str) -> Option<usize> {
    None
}

fn spawn_render_thread(
    mut frames: FrameLoop,
    pacing: FrameConfig,
    stop: Arc<AtomicBool>,
) -> Result<JoinHandle<FrameLoopStats>> {
    thread::Builder::new()
        .name("gnomon-render".to_string())
        .spawn(move || {
            if let Err(err) = frames.open_session(&no_loader) {
                warn!(error = %err, "engine session failed to open");
            }
            let budget = pacing.frame_budget();
            while !stop.load(Ordering::Acquire) {
                let started = Instant::now();
                if let Some(result) = frames.wait_and_run(pacing.idle_wait()) {
                    if result.jobs_failed > 0 {
                        debug!(
                            frame = result.frame_number,
                            failed = result.jobs_failed,
                            "frame had failing jobs"
                        );
                    }
                }
                if let Some(rest) = budget.checked_sub(started.elapsed()) {
                    thread::sleep(rest);
                }
            }
            let discarded = frames.close_session();
            debug!(discarded, "render thread stopping");
            frames.stats()
        })
        .context("spawning render thread")
}

/// Pumps until `done` holds or `timeout` elapses.
fn wait_until(
    scene: &mut SceneCoordinator,
    timeout: Duration,
    done: impl Fn(&SceneCoordinator) -> bool,
) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        scene.pump();
        if done(&*scene) {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn settle(scene: &mut SceneCoordinator, duration: Duration) {
    wait_until(scene, duration, |_| false);
}

fn engine_scale(probe: &HeadlessProbe, id: ObjectId) -> Option<[f32; 3]> {
    probe.object(id).map(|object| object.transform.scale)
}

fn edit_param(
    scene: &SceneCoordinator,
    id: ObjectId,
    field: ParamField,
    value: f64,
) -> Result<()> {
    let node = scene
        .node(id)
        .with_context(|| format!("node {id} is not in the tree"))?;
    let params = node
        .params()
        .with_context(|| format!("node {id} has no parameters"))?;
    params
        .set_field(field, value)
        .with_context(|| format!("setting {field:?} on node {id}"))?;
    Ok(())
}

fn created_id(created: &[(ShapeKind, ObjectId)], kind: ShapeKind) -> Result<ObjectId> {
    created
        .iter()
        .find(|(k, _)| *k == kind)
        .map(|(_, id)| *id)
        .with_context(|| format!("no {} was created", kind.label()))
}

fn run_session(
    scene: &mut SceneCoordinator,
    probe: &HeadlessProbe,
    import: &Path,
    timeout: Duration,
) -> Result<()> {
    if !wait_until(scene, timeout, SceneCoordinator::is_engine_ready) {
        bail!("engine never became ready");
    }
    scene.resize_viewport(VIEWPORT.0, VIEWPORT.1);

    // === Create every primitive ===
    let mut created = Vec::new();
    for kind in ShapeKind::PRIMITIVES {
        let ticket = scene.create_primitive(kind);
        let id = scene
            .pump_until(ticket, timeout)
            .with_context(|| format!("creating a {}", kind.label()))?;
        let name = scene.node(id).map(|node| node.name()).unwrap_or_default();
        info!(%id, %name, scale = ?engine_scale(probe, id), "created");
        created.push((kind, id));
    }

    // === Parameters drive scale ===
    let cube = created_id(&created, ShapeKind::Cube)?;
    let sphere = created_id(&created, ShapeKind::Sphere)?;
    edit_param(scene, cube, ParamField::Edge, 2.0)?;
    edit_param(scene, sphere, ParamField::Radius, 1.0)?;
    let rescaled = wait_until(scene, timeout, |_| {
        engine_scale(probe, cube) == Some([2.0; 3])
            && engine_scale(probe, sphere) == Some([2.0; 3])
    });
    if !rescaled {
        warn!("parameter edits did not reach the engine in time");
    }
    info!(
        cube = ?engine_scale(probe, cube),
        sphere = ?engine_scale(probe, sphere),
        "parameter-driven scale applied"
    );

    // === Select and drag ===
    scene.select(sphere);
    scene.set_gizmo_mode(GizmoMode::Translate);
    if !wait_until(scene, timeout, |_| probe.selection() == sphere) {
        bail!("engine did not follow the UI selection");
    }

    let drag_frames = Rc::new(Cell::new(0_u32));
    let sink = Rc::clone(&drag_frames);
    let subscription = scene.signals().transform_polled.subscribe(move |polled| {
        if polled.dragging {
            sink.set(sink.get() + 1);
        }
    });
    if probe.begin_drag() {
        for step in 1..=5_u8 {
            if let Some(object) = probe.object(sphere) {
                let mut pose = object.transform;
                pose.position[0] = f32::from(step) * 0.5;
                probe.drag_to(pose);
            }
            settle(scene, Duration::from_millis(20));
        }
        probe.end_drag();
    }
    settle(scene, Duration::from_millis(20));
    scene.signals().transform_polled.unsubscribe(subscription);
    info!(
        drag_frames = drag_frames.get(),
        position = ?scene.node(sphere).map(|node| node.pose().position),
        "gizmo drag mirrored into the tree"
    );

    // === Click to pick ===
    probe.set_pick_result(cube);
    scene.pointer_released(MouseButton::Left, 200.0, 150.0, Modifiers::NONE);
    if wait_until(scene, timeout, |s| s.selected_id() == cube) {
        info!(%cube, "picked");
    } else {
        warn!(%cube, "pick did not select the cube");
    }

    // === Import ===
    let ticket = scene.import_mesh(import, true);
    match scene.pump_until(ticket, timeout) {
        Some(id) => info!(%id, path = %import.display(), "imported"),
        None => warn!(path = %import.display(), "import failed"),
    }

    scene.root().walk(&mut |node| {
        debug!(id = %node.id(), name = %node.name(), key = %node.param_key(), "tree");
    });

    // === Delete and clear ===
    let ticket = scene.delete_selected();
    let removed = scene.pump_until(ticket, timeout).unwrap_or(false);
    info!(removed, remaining = scene.node_count(), "deleted selection");

    let ticket = scene.clear_scene();
    if scene.pump_until(ticket, timeout) != Some(true) {
        bail!("clearing the scene was not confirmed");
    }
    info!(remaining = scene.node_count(), "scene cleared");
    Ok(())
}
