//! Runguard-Engine: Run Engine Contracts
//!
//! This crate defines the boundary between the runguard orchestration
//! layer and the engine that actually owns runs. It carries no policy of
//! its own: authorization and request validation live in `runguard-core`.
//!
//! ## Layer 0 - Engine Contracts
//!
//! Focus: stable value types and an async trait any backend can implement.
//!
//! ## Key Components
//!
//! - `RunEngine`: Run lifecycle, metrics, artifacts and ownership lookups
//! - `ListOptions`: Validated pagination/sort/filter criteria and page tokens
//! - `MemoryRunEngine` (in `fakes`): In-memory engine for tests and local runs

mod error;
pub mod engine_traits;
pub mod fakes;
pub mod list;
pub mod model;

pub use engine_traits::{EngineResult, RunEngine};
pub use error::EngineError;
pub use list::{
    Filter, ListOptions, Predicate, PredicateOp, SortSpec, DEFAULT_PAGE_SIZE, DEFAULT_SORT_FIELD,
    MAX_PAGE_SIZE,
};
pub use model::{
    FilterContext, MetricFormat, MetricItem, NewRun, Parameter, Pipeline, PipelineRuntime,
    PipelineSpec, PipelineVersion, Relationship, ResourceKey, ResourceReference, ResourceType, Run,
    RunDetail, RunPage, RunStatus, StorageState,
};
