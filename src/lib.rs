//! Profile-driven colour grading engine.
//!
//! A [`ProfileConfig`] describes a look; [`process`] applies it to an RGBA8
//! image on the CPU, and [`Renderer`] does the same on whichever backend
//! [`EngineConfig`] selects.

pub mod backend;
pub mod cache;
pub mod color;
pub mod config;
pub mod cpu;
pub mod error;
pub mod gpu;
pub mod image_io;
pub mod lut;
pub mod models;
pub mod noise;
pub mod pipeline;
pub mod profile_io;
pub mod stages;

pub use backend::Backend;
pub use config::{BackendKind, EngineConfig};
pub use error::{IoError, PipelineError, PipelineResult};
pub use models::ProfileConfig;
pub use pipeline::{process, Engine, Renderer, Rendered};
