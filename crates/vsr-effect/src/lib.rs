//! Super-resolution effect for video frames.
//!
//! Wires the scale negotiator from `vsr-core` to a device backend from
//! `vsr-compute`:
//!
//! ```text
//! frame ─copy─> input ─> convert_to_fp32 ─> source
//!                                             │ kernel
//! output <─ convert_to_u8 <─────────── destination
//! ```
//!
//! - [`BufferSet`] owns the seven device buffers and reallocates lazily.
//! - [`SuperResolution`] runs the chain per frame and reloads the kernel
//!   only when its topology changed.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use vsr_compute::{CpuAccelerator, CpuTexture, ReferenceKernel};
//! use vsr_effect::{EffectConfig, SuperResolution};
//!
//! let accel = Arc::new(CpuAccelerator::new());
//! let mut effect = SuperResolution::new(accel, ReferenceKernel::new(), EffectConfig::default())?;
//! let frame = CpuTexture::gradient(1280, 720, 0);
//! let upscaled = effect.process(&frame)?;
//! ```

pub mod buffers;
pub mod config;
pub mod effect;

pub use buffers::{BufferRole, BufferSet, ReconcileReport, SlotChange, Stages};
pub use config::EffectConfig;
pub use effect::{EffectState, SuperResolution, TransferStage};

use thiserror::Error;
use vsr_compute::ComputeError;

/// Effect errors.
///
/// Each variant names the step that failed; the device error is kept as
/// the source.
#[derive(Error, Debug)]
pub enum EffectError {
    #[error("Failed to allocate {role} buffer: {source}")]
    Allocation {
        role: BufferRole,
        source: ComputeError,
    },

    #[error("Failed to bind {slot}: {source}")]
    Binding {
        slot: &'static str,
        source: ComputeError,
    },

    #[error("Failed to load kernel: {0}")]
    Load(#[source] ComputeError),

    #[error("Failed to copy frame to input: {0}")]
    Copy(#[source] ComputeError),

    #[error("Transfer {stage} failed: {source}")]
    Transfer {
        stage: TransferStage,
        source: ComputeError,
    },

    #[error("Kernel run failed: {0}")]
    Run(#[source] ComputeError),

    #[error("Failed to enter device context: {0}")]
    Context(#[source] ComputeError),

    #[error("Effect has been destroyed")]
    Destroyed,

    #[error("Buffer {0} is not allocated")]
    NotAllocated(BufferRole),
}

pub type EffectResult<T> = Result<T, EffectError>;
