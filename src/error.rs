//! Error kinds reported to the caller before any commands are recorded.
//!
//! Every variant here corresponds to a precondition check that happens
//! host-side, ahead of appending anything to a [`wgpu::CommandEncoder`].
//! Device-side failures inside a kernel are not this crate's responsibility
//! (see `ScanEngine::dispatch_direct`/`dispatch_indirect`).

/// Failure reported by the engine's host-side validation or by a fallible
/// allocation in [`crate::support_resources::SupportResources`].
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// `prefix_a`/`prefix_b` are not live: resources were never created, or
    /// have since been disposed.
    #[error("resource buffers are not live (resources were never created, or have been disposed)")]
    InvalidResources,

    /// The caller's input buffer (or, in indirect mode, the count buffer) is
    /// missing.
    #[error("input buffer is missing")]
    InvalidInput,

    /// Direct-mode request whose count exceeds the support's current
    /// capacity.
    #[error("requested count {requested} exceeds support capacity {capacity}")]
    CapacityExceeded { requested: u32, capacity: u32 },

    /// The engine was used before `init()` or after `dispose()`.
    #[error("engine was used before init() or after dispose()")]
    KernelNotLoaded,

    /// A device buffer allocation failed inside an `AllocationErrorScope`.
    #[error("device buffer allocation failed: {0}")]
    AllocationFailed(wgpu::Error),
}
