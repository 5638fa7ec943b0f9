//! # GNOMON Core
//!
//! Scene model primitives shared by the UI side of the synchronization layer:
//! - Nine-field transforms with per-field change notification
//! - One parameter record per primitive shape kind
//! - Scaler strategies mapping parameters to a canonical non-uniform scale
//! - `ParamKey` fingerprints used to memoize scale derivation
//! - Reentrancy guards separating UI→engine from engine→UI propagation
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        UI CONTEXT                            │
//! ├──────────────────────────────────────────────────────────────┤
//! │  TransformModel ──┐                                          │
//! │                   ├──> Subscribers ──> coordinator handlers  │
//! │  ParamsModel ─────┘          │                               │
//! │        │                     ▼                               │
//! │  ParamKey ── scaler_for(kind) ──> desired scale              │
//! │                                                              │
//! │  SyncGuards { ui_to_engine, engine_to_ui }                   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every observable type here is `Rc`/`Cell` based and therefore `!Send`:
//! the model can only ever be touched from the thread that built it.

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod error;
pub mod guard;
pub mod ids;
pub mod observe;
pub mod param_key;
pub mod scaler;
pub mod shape;
pub mod transform;

pub use config::{EngineConfig, FrameConfig, GnomonConfig, Tolerances};
pub use error::{ConfigError, ConfigResult, ModelError, ModelResult};
pub use guard::{GuardToken, ReentrancyGuard, SyncGuards};
pub use ids::ObjectId;
pub use observe::{Subscribers, SubscriptionId};
pub use param_key::ParamKey;
pub use scaler::{scaler_for, ScalerFn};
pub use shape::{
    CircleParams, ConeParams, CubeParams, CylinderParams, ParamBlob, ParamField, ParamsChange,
    ParamsModel, PlaneParams, PrismParams, ShapeKind, ShapeParams, SphereParams, TorusParams,
};
pub use transform::{Transform, TransformChange, TransformField, TransformModel};
