//! # GNOMON Engine
//!
//! Render-context half of the synchronization layer:
//! - The [`Engine`] collaborator surface and its [`EngineBackend`] factory
//! - [`CommandQueue`] / [`CommandReceiver`]: UI → render FIFO with
//!   [`CommandTicket`] completion
//! - [`UiPoster`] / [`UiInbox`]: render → UI messages
//! - [`EngineSession`]: ready / not-ready engine lifetime
//! - [`FrameLoop`]: drain, resize, advance, render, pick, poll, diff
//! - [`HeadlessEngine`]: in-memory engine for tests and the demo binary
//!
//! ## Threading
//!
//! ```text
//! UI thread                                  render thread
//! ─────────                                  ─────────────
//! CommandQueue ──── crossbeam channel ─────► FrameLoop ──► dyn Engine
//! UiInbox      ◄─── crossbeam channel ────── UiPoster
//! ```
//!
//! Everything the render thread owns is `Send`; the queue and poster are
//! the only cross-thread traffic.

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod command;
pub mod engine;
pub mod error;
pub mod frame_loop;
pub mod headless;
pub mod session;
pub mod ui_post;

pub use command::{
    command_channel, Command, CommandQueue, CommandReceiver, CommandTicket, FrameScheduler, Job,
    Reply,
};
pub use engine::{
    Engine, EngineBackend, FramebufferId, GizmoMode, InputEvent, Modifiers, MouseButton,
    ProcLoader,
};
pub use error::{EngineError, EngineResult};
pub use frame_loop::{FrameLoop, FrameLoopStats, FrameResult};
pub use headless::{EngineCall, HeadlessBackend, HeadlessEngine, HeadlessObject, HeadlessProbe};
pub use session::EngineSession;
pub use ui_post::{ui_channel, CreatedFrom, UiInbox, UiMessage, UiPoster};
