//! # GNOMON Sync
//!
//! UI-context half of the synchronization layer:
//! - [`SceneNode`]: folder/leaf tree of observable nodes
//! - [`SceneCoordinator`]: node index, selection, edit writeback, engine
//!   pull, parameter-driven scale derivation and the UI message pump
//!
//! ## Usage
//!
//! ```text
//! let (queue, commands) = command_channel();
//! let (poster, inbox)   = ui_channel();
//! let frames = FrameLoop::new(backend, commands, poster.clone(), &config);  // render thread
//! let mut scene = SceneCoordinator::new(queue, poster, inbox, config.tolerances);
//!
//! let cube = scene.create_cube();
//! let id = scene.pump_until(cube, Duration::from_secs(1));
//! ```
//!
//! Everything here is single-threaded. The coordinator talks to the render
//! thread only through the command queue and the UI inbox.

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod coordinator;
pub mod node;

pub use coordinator::{PolledTransform, SceneCoordinator, SceneSignals, ROOT_NAME};
pub use node::{ScaleMemo, SceneNode};
