//! Testing utilities for stackflow pipelines.
//!
//! This module provides:
//! - An in-memory provisioning engine with failure injection
//! - Sample configuration and a wired pipeline harness
//! - Re-exports of the collecting sinks and static secret source

mod engine;
mod fixtures;

pub use engine::{EngineCall, EngineOp, RecordingEngine};
pub use fixtures::{sample_config, TestPipeline, SAMPLE_SOURCE_URL};

pub use crate::events::CollectingEventSink;
pub use crate::progress::CollectingProgress;
pub use crate::secrets::StaticEnv;
