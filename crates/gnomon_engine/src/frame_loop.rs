//! Frame Loop - per-frame reconciliation on the render thread
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         FRAME TIMELINE                          │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  1. Drain CommandReceiver (FIFO, each job isolated)             │
//! │     └── set_framebuffer                                         │
//! │  2. Resize if the viewport changed since last sent              │
//! │  3. advance(dt) → render()                                      │
//! │  4. Pending pick (skipped while a gizmo drag is active)         │
//! │  5. Selection diff  ──► UiMessage::SelectionChanged             │
//! │  6. Transform poll  ──► UiMessage::TransformPolled              │
//! │       (always while dragging, otherwise only beyond epsilon)    │
//! │  7. Request next frame                                          │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Without a ready session a frame only drops the queued commands.
//!
//! The loop never blocks and never mutates UI-owned state; everything it
//! learns leaves through the [`UiPoster`].

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use gnomon_core::{GnomonConfig, ObjectId, Transform};

use crate::command::{Command, CommandReceiver, FrameScheduler};
use crate::engine::{Engine, EngineBackend, FramebufferId, ProcLoader};
use crate::error::EngineResult;
use crate::session::EngineSession;
use crate::ui_post::{UiMessage, UiPoster};

/// Result of a single frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameResult {
    /// Frame number (counts skipped frames too).
    pub frame_number: u64,
    /// True if the session was not ready and nothing ran.
    pub skipped: bool,
    /// Commands dropped because the session was not ready.
    pub discarded: u32,
    /// Jobs that ran to completion.
    pub jobs_executed: u32,
    /// Jobs that returned an error or panicked.
    pub jobs_failed: u32,
    /// Non-job commands applied (pick, viewport, input, gizmo).
    pub commands_applied: u32,
    /// True if `resize` was issued.
    pub resized: bool,
    /// Object hit by this frame's pick, if any.
    pub picked: Option<ObjectId>,
    /// UI messages posted.
    pub notifications: u32,
    /// Total frame time (microseconds).
    pub frame_time_us: u32,
}

/// Statistics for the frame loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameLoopStats {
    /// Frames run, including skipped ones.
    pub total_frames: u64,
    /// Frames skipped because the session was not ready.
    pub skipped_frames: u64,
    /// Jobs run to completion.
    pub jobs_executed: u64,
    /// Jobs that failed or panicked.
    pub jobs_failed: u64,
    /// UI messages posted.
    pub notifications: u64,
    /// Average frame time (microseconds).
    pub avg_frame_time_us: u32,
    /// Worst frame time (microseconds).
    pub worst_frame_time_us: u32,
}

/// Render-thread state that survives between frames.
#[derive(Debug, Default)]
struct FrameCache {
    viewport: (u32, u32),
    sent_viewport: Option<(u32, u32)>,
    pending_pick: Option<(f32, f32)>,
    last_selection: ObjectId,
    selection_pending: bool,
    last_transform: Option<Transform>,
}

/// Owns the engine session and runs one reconciliation pass per frame.
pub struct FrameLoop {
    session: EngineSession,
    commands: CommandReceiver,
    poster: UiPoster,
    poll_epsilon: f32,
    framebuffer: FramebufferId,
    cache: FrameCache,
    frame_count: u64,
    last_frame: Option<Instant>,
    total_time_us: u64,
    stats: FrameLoopStats,
}

impl FrameLoop {
    /// Creates a loop whose session is not open yet.
    #[must_use]
    pub fn new(
        backend: Box<dyn EngineBackend>,
        commands: CommandReceiver,
        poster: UiPoster,
        config: &GnomonConfig,
    ) -> Self {
        let cache = FrameCache {
            viewport: (config.engine.width, config.engine.height),
            ..FrameCache::default()
        };
        Self {
            session: EngineSession::new(backend, config.engine.clone(), poster.clone()),
            commands,
            poster,
            poll_epsilon: config.tolerances.poll_epsilon,
            framebuffer: FramebufferId::default(),
            cache,
            frame_count: 0,
            last_frame: None,
            total_time_us: 0,
            stats: FrameLoopStats::default(),
        }
    }

    /// Opens the engine session for a fresh frame context.
    ///
    /// # Errors
    ///
    /// The backend's creation error; the loop keeps skipping frames.
    pub fn open_session(&mut self, loader: &ProcLoader<'_>) -> EngineResult<()> {
        self.session.open(loader)?;
        self.cache = FrameCache {
            viewport: self.cache.viewport,
            ..FrameCache::default()
        };
        self.last_frame = None;
        self.commands.scheduler().request();
        Ok(())
    }

    /// Closes the session after context loss. Queued commands are
    /// discarded and their tickets resolve to `None`.
    pub fn close_session(&mut self) -> usize {
        let discarded = self.commands.discard();
        if discarded > 0 {
            tracing::debug!(discarded, "discarded queued commands at teardown");
        }
        self.session.close();
        discarded
    }

    /// True while the session has a live engine.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.session.is_ready()
    }

    /// Framebuffer the host wants frames drawn into.
    pub fn set_framebuffer(&mut self, target: FramebufferId) {
        self.framebuffer = target;
    }

    /// Scheduler that signals frame requests.
    #[must_use]
    pub fn scheduler(&self) -> Arc<FrameScheduler> {
        Arc::clone(self.commands.scheduler())
    }

    /// Running statistics.
    #[must_use]
    pub fn stats(&self) -> FrameLoopStats {
        self.stats
    }

    /// Waits up to `timeout` for a frame request, then runs a frame with
    /// the wall-clock delta. Returns `None` on timeout.
    pub fn wait_and_run(&mut self, timeout: Duration) -> Option<FrameResult> {
        if !self.commands.scheduler().wait(timeout) {
            return None;
        }
        Some(self.run_frame())
    }

    /// Runs one frame with the wall-clock delta since the previous one.
    pub fn run_frame(&mut self) -> FrameResult {
        let now = Instant::now();
        let dt = self
            .last_frame
            .map_or(0.0, |last| now.duration_since(last).as_secs_f32());
        self.last_frame = Some(now);
        self.frame(dt)
    }

    /// Executes one frame with an explicit delta in seconds.
    pub fn frame(&mut self, dt: f32) -> FrameResult {
        let frame_start = Instant::now();
        self.frame_count += 1;
        let mut result = FrameResult {
            frame_number: self.frame_count,
            ..FrameResult::default()
        };

        let Self {
            session,
            commands,
            poster,
            poll_epsilon,
            framebuffer,
            cache,
            ..
        } = self;

        match session.engine_mut() {
            Ok(engine) => {
                // === PHASE 1: Drain ===
                drain(engine, commands, cache, &mut result);
                engine.set_framebuffer(*framebuffer);

                // === PHASE 2: Resize ===
                if cache.sent_viewport != Some(cache.viewport) {
                    let (width, height) = cache.viewport;
                    engine.resize(width, height);
                    cache.sent_viewport = Some(cache.viewport);
                    result.resized = true;
                }

                // === PHASE 3: Advance + render ===
                engine.advance(dt);
                engine.render();

                // === PHASE 4-6: Pick, selection, transform ===
                reconcile(engine, poster, cache, *poll_epsilon, &mut result);

                // === PHASE 7 ===
                commands.scheduler().request();
            }
            Err(_) => {
                result.skipped = true;
                discard_unready(commands, cache, &mut result);
            }
        }

        result.frame_time_us = u32::try_from(frame_start.elapsed().as_micros()).unwrap_or(u32::MAX);
        self.record(&result);
        result
    }

    fn record(&mut self, result: &FrameResult) {
        let stats = &mut self.stats;
        stats.total_frames += 1;
        if result.skipped {
            stats.skipped_frames += 1;
        }
        stats.jobs_executed += u64::from(result.jobs_executed);
        stats.jobs_failed += u64::from(result.jobs_failed);
        stats.notifications += u64::from(result.notifications);
        stats.worst_frame_time_us = stats.worst_frame_time_us.max(result.frame_time_us);
        self.total_time_us += u64::from(result.frame_time_us);
        stats.avg_frame_time_us =
            u32::try_from(self.total_time_us / stats.total_frames).unwrap_or(u32::MAX);
    }
}

impl std::fmt::Debug for FrameLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameLoop")
            .field("session", &self.session)
            .field("frame_count", &self.frame_count)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

/// Runs every queued command in FIFO order. A failing or panicking job
/// never aborts the ones after it.
fn drain(
    engine: &mut dyn Engine,
    commands: &CommandReceiver,
    cache: &mut FrameCache,
    result: &mut FrameResult,
) {
    for command in commands.drain() {
        match command {
            Command::Job { label, job } => {
                match catch_unwind(AssertUnwindSafe(|| job(&mut *engine))) {
                    Ok(Ok(())) => result.jobs_executed += 1,
                    Ok(Err(err)) => {
                        result.jobs_failed += 1;
                        tracing::warn!(job = label, error = %err, "engine job failed");
                    }
                    Err(_) => {
                        result.jobs_failed += 1;
                        tracing::warn!(job = label, "engine job panicked");
                    }
                }
            }
            Command::Pick { x, y } => {
                cache.pending_pick = Some((x, y));
                result.commands_applied += 1;
            }
            Command::Viewport { width, height } => {
                cache.viewport = (width, height);
                result.commands_applied += 1;
            }
            Command::Input(event) => {
                engine.handle_input(&event);
                result.commands_applied += 1;
            }
            Command::Gizmo(mode) => {
                engine.set_gizmo_mode(mode);
                result.commands_applied += 1;
            }
        }
    }
}

/// Drops queued commands while no engine is ready. Only the viewport size
/// is kept, so the first ready frame still resizes to it.
fn discard_unready(commands: &CommandReceiver, cache: &mut FrameCache, result: &mut FrameResult) {
    for command in commands.drain() {
        if let Command::Viewport { width, height } = command {
            cache.viewport = (width, height);
        } else {
            result.discarded += 1;
        }
    }
    if result.discarded > 0 {
        tracing::debug!(discarded = result.discarded, "engine not ready, commands dropped");
    }
}

/// Pick, selection diff, and transform poll.
fn reconcile(
    engine: &mut dyn Engine,
    poster: &UiPoster,
    cache: &mut FrameCache,
    poll_epsilon: f32,
    result: &mut FrameResult,
) {
    if let Some((x, y)) = cache.pending_pick.take() {
        if engine.is_dragging_gizmo() {
            tracing::trace!(x, y, "pick dropped during gizmo drag");
        } else {
            let hit = engine.ray_pick(x, y);
            if hit.is_some() {
                engine.set_selection(hit);
                cache.selection_pending = true;
                result.picked = Some(hit);
            }
        }
    }

    let selection = engine.selection();
    if selection != cache.last_selection || cache.selection_pending {
        let picked = cache.selection_pending;
        cache.last_selection = selection;
        cache.selection_pending = false;
        cache.last_transform = None;
        if poster.post(UiMessage::SelectionChanged {
            id: selection,
            picked,
        }) {
            result.notifications += 1;
        }
    }

    if selection.is_none() {
        return;
    }
    let transform = match engine.object_transform(selection) {
        Ok(transform) => transform,
        Err(err) => {
            tracing::debug!(id = %selection, error = %err, "transform poll failed");
            return;
        }
    };
    let dragging = engine.is_dragging_gizmo();
    let changed = cache
        .last_transform
        .map_or(true, |last| !last.nearly_equals(&transform, poll_epsilon));
    if dragging || changed {
        cache.last_transform = Some(transform);
        let message = UiMessage::TransformPolled {
            id: selection,
            transform,
            dragging,
        };
        if poster.post(message) {
            result.notifications += 1;
        }
    }
}
