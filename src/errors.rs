//! Error Types
//!
//! This module defines the error taxonomy used throughout the scene render pipeline.
//!
//! # Overview
//!
//! The main error type [`RenderError`] covers every failure mode the core can produce:
//! capacity exhaustion, invalid handles, upload preconditions, backend failures, and
//! transient swap-chain acquire failures.
//!
//! # Usage
//!
//! All public fallible APIs return [`Result<T>`], an alias for
//! `std::result::Result<T, RenderError>`.

use thiserror::Error;

/// The error type for the scene render pipeline.
///
/// Each variant corresponds to one of the failure policies from the error
/// handling design: some are surfaced synchronously to the caller, some abort
/// only the current frame, and [`RenderError::TransientAcquireFailure`] is
/// swallowed entirely by the frame loop.
#[derive(Error, Debug)]
pub enum RenderError {
    /// A manager, light list, or shadow-map array has no room left.
    #[error("out of capacity: {0}")]
    OutOfCapacity(String),

    /// A `unique_id` does not refer to a live resource, or required
    /// configuration (e.g. a window handle) is missing.
    #[error("invalid handle: {0}")]
    InvalidHandle(String),

    /// An operation was attempted before its precondition was satisfied
    /// (e.g. adding an instance whose mesh has not been uploaded).
    #[error("upload precondition violated: {0}")]
    UploadPrecondition(String),

    /// A GPU backend operation failed (pipeline/shader creation, surface
    /// reconfiguration). The current frame is dropped; the render loop keeps
    /// running.
    #[error("backend failure: {0}")]
    BackendFailure(String),

    /// The swap chain surface was out of date. Swallowed by the frame loop;
    /// the next frame retries.
    #[error("transient acquire failure: {0}")]
    TransientAcquireFailure(String),

    /// Failed to request a compatible GPU adapter.
    #[error("failed to request a GPU adapter: {0}")]
    AdapterRequestFailed(String),

    /// Failed to create the GPU device.
    #[error("failed to create GPU device: {0}")]
    DeviceCreateFailed(#[from] wgpu::RequestDeviceError),

    /// Failed to create a platform surface.
    #[error("failed to create surface: {0}")]
    SurfaceCreateFailed(#[from] wgpu::CreateSurfaceError),
}

/// Alias for `Result<T, RenderError>`.
pub type Result<T> = std::result::Result<T, RenderError>;
