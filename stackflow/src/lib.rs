//! # Stackflow
//!
//! Sequential orchestration of dependent infrastructure stacks.
//!
//! Stackflow drives an ordered list of deployment stacks through a
//! provisioning engine:
//!
//! - **Forward pass**: each stack is resolved, configured with secrets,
//!   refreshed and applied, strictly one after another
//! - **Teardown pass**: in destroy mode, stacks are destroyed in reverse order
//!   once every stack was refreshed
//! - **Streaming progress**: engine output reaches the console line by line
//! - **Event-driven observability**: every lifecycle step is reported to an
//!   [`EventSink`](events::EventSink)
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use stackflow::prelude::*;
//! use std::sync::Arc;
//!
//! let config = PipelineConfig::default();
//! let engine = Arc::new(PulumiCliEngine::new(EngineSettings::from_env()));
//! let runner = EngineStageRunner::new(&config, engine, Arc::new(ProcessEnv));
//!
//! let report = PipelineController::new(config, runner)
//!     .run(RunMode::from_args(std::env::args().skip(1)))
//!     .await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod config;
pub mod context;
pub mod engine;
pub mod errors;
pub mod events;
pub mod observability;
pub mod pipeline;
pub mod progress;
pub mod runner;
pub mod secrets;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{
        EngineSettings, LogFormat, MissingSecretPolicy, PipelineConfig, RunMode,
        SecretBinding, StackDescriptor, StackIdentity,
    };
    pub use crate::context::RunContext;
    pub use crate::engine::{
        ProgressLine, ProgressStream, ProvisioningEngine, PulumiCliEngine, StackHandle,
        StackSource,
    };
    pub use crate::errors::{ConfigError, EngineError, OrchestratorError};
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink, PipelineEvent};
    pub use crate::observability::init_logging;
    pub use crate::pipeline::{
        FailureMode, PipelineController, PipelineReport, RunState, StackStatus,
    };
    pub use crate::progress::{forward_progress, ProgressSink, StdoutProgress};
    pub use crate::runner::{EngineStageRunner, StageRunner};
    pub use crate::secrets::{ProcessEnv, SecretSource, SecretValue};
}
