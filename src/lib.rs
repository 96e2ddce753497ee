//! GPU hierarchical prefix-sum engine.
//!
//! Given an input sequence of `u32` values resident in device memory, this
//! crate produces the sequence's inclusive or exclusive prefix sum in a
//! companion device buffer, using only compute-shader dispatches submitted
//! to a [`wgpu::CommandEncoder`]. The element count may be known on the host
//! ([`Engine::dispatch_direct`]) or may itself live in a device buffer
//! ([`Engine::dispatch_indirect`]).
//!
//! Four pieces, in dependency order:
//!
//! - [`level_geometry`] — pure arithmetic for the group-size-128 level
//!   recurrence shared by the host and the planner kernel.
//! - [`support_resources::SupportResources`] — owns the six scratch buffers
//!   the hierarchy reuses across dispatches.
//! - [`dispatch_planner`] (crate-private) — the single compute dispatch that
//!   populates the level-offsets table and indirect-dispatch-args from
//!   either a host count or a device-resident one.
//! - [`scan_engine::Engine`] — orchestrates the up-sweep and down-sweep
//!   passes across every level.
pub mod error;
pub mod level_geometry;
pub mod scan_engine;
pub mod support_resources;

mod dispatch_planner;
mod util;

pub use error::EngineError;
pub use scan_engine::{DirectScanRequest, Engine, IndirectScanRequest, ScanVariant};
pub use support_resources::SupportResources;
