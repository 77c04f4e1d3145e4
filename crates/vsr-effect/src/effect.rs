//! Frame orchestration.
//!
//! [`SuperResolution`] owns the buffer set and the kernel. Per frame it
//! negotiates sizes, reconciles buffers, reloads the kernel if needed, and
//! runs the fixed conversion chain.
//!
//! # Dirty protocol
//!
//! The kernel bakes its bindings and parameters at load time, so it must be
//! reloaded whenever any of these change:
//!
//! - the strength bucket (see [`Strength`])
//! - the snapped scale
//! - the identity or size of the `source`/`destination` buffers
//!
//! Each of those sets the dirty flag; only a successful load clears it.
//! The reload itself is deferred to the next [`process`] call.
//!
//! [`process`]: SuperResolution::process

use std::fmt;
use std::sync::Arc;

use tracing::{debug, error, warn};
use vsr_compute::{Accelerator, DeviceScope, FrameTexture, ImageHandle, PARAM_STRENGTH, UpscaleKernel};
use vsr_core::{Negotiation, ScaleNegotiator, Size, Strength, snap_scale};

use crate::buffers::{BufferRole, BufferSet};
use crate::config::EffectConfig;
use crate::{EffectError, EffectResult};

/// Minimum change of the snapped scale that counts as a new scale.
const SCALE_EPSILON: f32 = 0.01;

/// Lifecycle of an effect instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectState {
    /// Construction has not finished a load yet.
    Uninitialized,
    /// Kernel matches the current buffers and parameters.
    Ready,
    /// Kernel needs a reload before the next run.
    Dirty,
    /// Buffers released; every operation fails.
    Destroyed,
}

/// Format transfer step of the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStage {
    InputToFp32,
    Fp32ToSource,
    DestinationToU8,
    U8ToOutput,
}

impl fmt::Display for TransferStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::InputToFp32 => "input -> convert_to_fp32",
            Self::Fp32ToSource => "convert_to_fp32 -> source",
            Self::DestinationToU8 => "destination -> convert_to_u8",
            Self::U8ToOutput => "convert_to_u8 -> output",
        })
    }
}

/// Logs a fatal step failure and passes the error through.
fn failed(err: EffectError) -> EffectError {
    error!(error = %err, "super-resolution step failed");
    err
}

fn transfer<A: Accelerator>(
    accel: &A,
    stage: TransferStage,
    src: &dyn ImageHandle,
    dst: &mut dyn ImageHandle,
    scratch: &mut A::Image,
) -> EffectResult<()> {
    accel
        .transfer(src, dst, 1.0, accel.stream(), scratch)
        .map_err(|source| failed(EffectError::Transfer { stage, source }))
}

/// Super-resolution effect.
///
/// One instance per video source. The accelerator may be shared between
/// instances.
pub struct SuperResolution<A, K>
where
    A: Accelerator,
    K: UpscaleKernel<Image = A::Image, Stream = A::Stream>,
{
    accel: Arc<A>,
    kernel: K,
    buffers: BufferSet<A>,
    negotiator: ScaleNegotiator,
    negotiation: Option<Negotiation>,
    strength: Strength,
    scale: f32,
    dirty: bool,
    loaded: bool,
    destroyed: bool,
    frames: u64,
    loads: u64,
}

impl<A, K> SuperResolution<A, K>
where
    A: Accelerator,
    K: UpscaleKernel<Image = A::Image, Stream = A::Stream>,
{
    /// Creates the effect, allocates buffers for the configured initial
    /// size and loads the kernel.
    pub fn new(accel: Arc<A>, kernel: K, config: EffectConfig) -> EffectResult<Self> {
        let mut effect = Self {
            accel,
            kernel,
            buffers: BufferSet::new(),
            negotiator: ScaleNegotiator::new(),
            negotiation: None,
            strength: Strength::from_raw(config.strength),
            scale: snap_scale(config.scale),
            dirty: true,
            loaded: false,
            destroyed: false,
            frames: 0,
            loads: 0,
        };

        let accel = Arc::clone(&effect.accel);
        let _scope = DeviceScope::enter(&*accel).map_err(EffectError::Context)?;
        effect.push_strength();
        let Size { width, height } = config.initial_size;
        effect.resize(width, height)?;
        effect.load()?;
        debug!(
            backend = accel.name(),
            strength = %effect.strength,
            scale = effect.scale,
            "super-resolution ready"
        );
        Ok(effect)
    }

    fn ensure_alive(&self) -> EffectResult<()> {
        if self.destroyed {
            return Err(EffectError::Destroyed);
        }
        Ok(())
    }

    /// Sends the strength bucket to the kernel. Failures are only logged.
    fn push_strength(&mut self) {
        let value = self.strength.as_u32();
        if let Err(e) = self.kernel.set_u32(PARAM_STRENGTH, value) {
            error!(param = PARAM_STRENGTH, value, error = %e, "failed to set kernel parameter");
        }
    }

    /// Sets the strength. Crossing 0.5 marks the effect dirty.
    pub fn set_strength(&mut self, strength: f32) -> EffectResult<()> {
        self.ensure_alive()?;
        let bucket = Strength::from_raw(strength);
        if bucket != self.strength {
            debug!(from = %self.strength, to = %bucket, "strength bucket changed");
            self.dirty = true;
        }
        self.strength = bucket;

        let accel = Arc::clone(&self.accel);
        let _scope = DeviceScope::enter(&*accel).map_err(EffectError::Context)?;
        self.push_strength();
        Ok(())
    }

    /// Strength bucket as a float (0 or 1).
    pub fn strength(&self) -> f32 {
        self.strength.value()
    }

    /// Sets the requested scale. Takes effect on the next resize.
    pub fn set_scale(&mut self, scale: f32) -> EffectResult<()> {
        self.ensure_alive()?;
        let snapped = snap_scale(scale);
        if (snapped - self.scale).abs() > SCALE_EPSILON {
            debug!(from = self.scale, to = snapped, "scale changed");
            self.dirty = true;
        }
        self.scale = snapped;
        Ok(())
    }

    /// Snapped requested scale.
    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Negotiates sizes for a `width` x `height` frame and reconciles the
    /// buffers.
    pub fn resize(&mut self, width: u32, height: u32) -> EffectResult<()> {
        self.ensure_alive()?;
        let accel = Arc::clone(&self.accel);
        let _scope = DeviceScope::enter(&*accel).map_err(EffectError::Context)?;

        let negotiation = self.negotiator.resolve(Size::new(width, height), self.scale);
        if self.negotiation != Some(negotiation) {
            if !negotiation.uniform {
                warn!(%negotiation, "scale is not uniform on both axes");
            } else if negotiation.was_promoted() {
                debug!(
                    requested = negotiation.requested,
                    accepted = negotiation.scale,
                    "scale promoted for exact output size"
                );
            }
            self.negotiation = Some(negotiation);
        }

        match self.buffers.reconcile(&*accel, &mut self.kernel, &negotiation) {
            Ok(report) => {
                if report.rebinds_kernel() {
                    self.dirty = true;
                }
                Ok(())
            }
            Err(e) => {
                // Bindings may be half-updated.
                self.dirty = true;
                Err(failed(e))
            }
        }
    }

    /// Loads the kernel with the current bindings. Clears the dirty flag.
    pub fn load(&mut self) -> EffectResult<()> {
        self.ensure_alive()?;
        let accel = Arc::clone(&self.accel);
        let _scope = DeviceScope::enter(&*accel).map_err(EffectError::Context)?;

        self.kernel
            .load(accel.stream())
            .map_err(|e| failed(EffectError::Load(e)))?;
        self.dirty = false;
        self.loaded = true;
        self.loads += 1;
        debug!(loads = self.loads, "kernel loaded");
        Ok(())
    }

    /// Upscales one frame.
    ///
    /// On failure the remaining steps are skipped and the output buffer
    /// keeps its previous contents.
    pub fn process(&mut self, frame: &A::Texture) -> EffectResult<&A::Texture> {
        self.ensure_alive()?;
        let accel = Arc::clone(&self.accel);
        let _scope = DeviceScope::enter(&*accel).map_err(EffectError::Context)?;

        let (width, height) = frame.dimensions();
        self.resize(width, height)?;
        if self.dirty {
            self.load()?;
        }

        let accel = &*accel;
        let stages = self.buffers.stages().map_err(failed)?;

        accel
            .copy_texture(frame, &mut *stages.input)
            .map_err(|e| failed(EffectError::Copy(e)))?;
        transfer(
            accel,
            TransferStage::InputToFp32,
            &*stages.input,
            &mut *stages.convert_to_fp32,
            &mut *stages.scratch,
        )?;
        transfer(
            accel,
            TransferStage::Fp32ToSource,
            &*stages.convert_to_fp32,
            &mut *stages.source,
            &mut *stages.scratch,
        )?;
        self.kernel
            .run(&*stages.source, &mut *stages.destination, accel.stream())
            .map_err(|e| failed(EffectError::Run(e)))?;
        transfer(
            accel,
            TransferStage::DestinationToU8,
            &*stages.destination,
            &mut *stages.convert_to_u8,
            &mut *stages.scratch,
        )?;
        transfer(
            accel,
            TransferStage::U8ToOutput,
            &*stages.convert_to_u8,
            &mut *stages.output,
            &mut *stages.scratch,
        )?;

        self.frames += 1;
        self.buffers
            .output_texture()
            .ok_or(EffectError::NotAllocated(BufferRole::Output))
    }

    /// Releases every buffer. Later calls are no-ops.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;

        let accel = Arc::clone(&self.accel);
        let scope = DeviceScope::enter(&*accel);
        if let Err(e) = &scope {
            error!(error = %e, "releasing buffers without device context");
        }
        self.buffers.release();
        self.negotiator.invalidate();
        self.negotiation = None;
        drop(scope);
        debug!(frames = self.frames, "super-resolution destroyed");
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn state(&self) -> EffectState {
        if self.destroyed {
            EffectState::Destroyed
        } else if !self.loaded {
            EffectState::Uninitialized
        } else if self.dirty {
            EffectState::Dirty
        } else {
            EffectState::Ready
        }
    }

    /// Sizes from the last resize.
    pub fn negotiation(&self) -> Option<&Negotiation> {
        self.negotiation.as_ref()
    }

    pub fn negotiator(&self) -> &ScaleNegotiator {
        &self.negotiator
    }

    pub fn buffers(&self) -> &BufferSet<A> {
        &self.buffers
    }

    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    pub fn accelerator(&self) -> &Arc<A> {
        &self.accel
    }

    /// Frames that made it through the whole chain.
    pub fn frames_processed(&self) -> u64 {
        self.frames
    }

    /// Successful kernel loads, including the initial one.
    pub fn loads(&self) -> u64 {
        self.loads
    }
}

impl<A, K> Drop for SuperResolution<A, K>
where
    A: Accelerator,
    K: UpscaleKernel<Image = A::Image, Stream = A::Stream>,
{
    fn drop(&mut self) {
        self.destroy();
    }
}
