//! Device buffer set of the upscaling chain.
//!
//! | Role | Sized to | Format |
//! |---|---|---|
//! | input | input size | RGBA8 surface |
//! | convert_to_fp32 | input size | RGBA f32 planar |
//! | source | input size | BGR f32 planar, kernel slot `SrcImage0` |
//! | destination | output size | BGR f32 planar, kernel slot `DstImage0` |
//! | convert_to_u8 | output size | RGBA8 interleaved |
//! | output | output size | RGBA8 surface |
//! | scratch | output size at creation | RGBA8 interleaved, never resized |
//!
//! [`BufferSet::reconcile`] brings every buffer to the sizes of a
//! [`Negotiation`]: absent buffers are allocated, mismatched ones are resized
//! in place (handle identity preserved), matching ones are left alone.

use std::fmt;

use tracing::debug;
use vsr_compute::{
    Accelerator, ComputeResult, INPUT_IMAGE_0, ImageHandle, OUTPUT_IMAGE_0, TextureSurface,
    UpscaleKernel,
};
use vsr_core::{Negotiation, PixelFormat, Size};

use crate::{EffectError, EffectResult};

/// Buffer in the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferRole {
    Input,
    ConvertToFp32,
    Source,
    Destination,
    ConvertToU8,
    Output,
    Scratch,
}

impl BufferRole {
    /// All roles in allocation order.
    pub const ALL: [BufferRole; 7] = [
        Self::Scratch,
        Self::Input,
        Self::ConvertToFp32,
        Self::Source,
        Self::Destination,
        Self::ConvertToU8,
        Self::Output,
    ];

    /// Pixel format of the buffer.
    pub const fn format(self) -> PixelFormat {
        match self {
            Self::ConvertToFp32 => PixelFormat::RGBA_F32_PLANAR,
            Self::Source | Self::Destination => PixelFormat::BGR_F32_PLANAR,
            Self::Input | Self::ConvertToU8 | Self::Output | Self::Scratch => {
                PixelFormat::RGBA8_INTERLEAVED
            }
        }
    }

    /// Whether the buffer follows the output size (else the input size).
    pub const fn is_output_sized(self) -> bool {
        matches!(
            self,
            Self::Destination | Self::ConvertToU8 | Self::Output | Self::Scratch
        )
    }

    /// Kernel slot the buffer is bound to.
    pub const fn kernel_slot(self) -> Option<&'static str> {
        match self {
            Self::Source => Some(INPUT_IMAGE_0),
            Self::Destination => Some(OUTPUT_IMAGE_0),
            _ => None,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::ConvertToFp32 => "convert_to_fp32",
            Self::Source => "source",
            Self::Destination => "destination",
            Self::ConvertToU8 => "convert_to_u8",
            Self::Output => "output",
            Self::Scratch => "scratch",
        }
    }

    const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for BufferRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What reconciliation did to one buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlotChange {
    #[default]
    Unchanged,
    Created,
    Resized,
}

/// Per-role outcome of [`BufferSet::reconcile`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    changes: [SlotChange; 7],
}

impl ReconcileReport {
    /// Change applied to `role`.
    pub fn get(&self, role: BufferRole) -> SlotChange {
        self.changes[role.index()]
    }

    fn set(&mut self, role: BufferRole, change: SlotChange) {
        self.changes[role.index()] = change;
    }

    /// Whether a kernel-bound buffer was created or resized.
    pub fn rebinds_kernel(&self) -> bool {
        self.get(BufferRole::Source) != SlotChange::Unchanged
            || self.get(BufferRole::Destination) != SlotChange::Unchanged
    }

    /// Whether anything changed at all.
    pub fn any_changed(&self) -> bool {
        self.changes.iter().any(|c| *c != SlotChange::Unchanged)
    }

    /// Roles with their changes, in allocation order.
    pub fn iter(&self) -> impl Iterator<Item = (BufferRole, SlotChange)> + '_ {
        BufferRole::ALL.iter().map(|&role| (role, self.get(role)))
    }
}

/// Mutable view of every buffer, used for one pass of the chain.
pub struct Stages<'a, A: Accelerator> {
    pub input: &'a mut A::Surface,
    pub convert_to_fp32: &'a mut A::Image,
    pub source: &'a mut A::Image,
    pub destination: &'a mut A::Image,
    pub convert_to_u8: &'a mut A::Image,
    pub output: &'a mut A::Surface,
    pub scratch: &'a mut A::Image,
}

/// The seven device buffers, exclusively owned.
pub struct BufferSet<A: Accelerator> {
    input: Option<A::Surface>,
    convert_to_fp32: Option<A::Image>,
    source: Option<A::Image>,
    destination: Option<A::Image>,
    convert_to_u8: Option<A::Image>,
    output: Option<A::Surface>,
    scratch: Option<A::Image>,
}

impl<A: Accelerator> Default for BufferSet<A> {
    fn default() -> Self {
        Self {
            input: None,
            convert_to_fp32: None,
            source: None,
            destination: None,
            convert_to_u8: None,
            output: None,
            scratch: None,
        }
    }
}

/// Allocates or resizes one buffer to `size`.
fn ensure<H: ImageHandle>(
    slot: &mut Option<H>,
    role: BufferRole,
    size: Size,
    allocate: impl FnOnce() -> ComputeResult<H>,
) -> EffectResult<SlotChange> {
    let change = match slot {
        Some(handle) if handle.size() == size => return Ok(SlotChange::Unchanged),
        Some(handle) => {
            handle
                .resize(size.width, size.height)
                .map_err(|source| EffectError::Allocation { role, source })?;
            SlotChange::Resized
        }
        None => {
            *slot = Some(allocate().map_err(|source| EffectError::Allocation { role, source })?);
            SlotChange::Created
        }
    };
    debug!(buffer = %role, %size, ?change, "reallocated");
    Ok(change)
}

fn bind<K: UpscaleKernel>(kernel: &mut K, slot: &'static str, image: &K::Image) -> EffectResult<()> {
    kernel
        .set_image(slot, image)
        .map_err(|source| EffectError::Binding { slot, source })
}

impl<A: Accelerator> BufferSet<A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Brings every buffer to the sizes of `negotiation`.
    ///
    /// Re-binds the kernel slot of `source`/`destination` whenever that
    /// buffer is created or resized. Stops at the first failure; buffers
    /// handled before it keep their new state.
    pub fn reconcile<K>(
        &mut self,
        accel: &A,
        kernel: &mut K,
        negotiation: &Negotiation,
    ) -> EffectResult<ReconcileReport>
    where
        K: UpscaleKernel<Image = A::Image>,
    {
        let input_size = negotiation.input;
        let output_size = negotiation.output;
        let mut report = ReconcileReport::default();

        // Scratch is sized once and never tracked again.
        if self.scratch.is_none() {
            let role = BufferRole::Scratch;
            let scratch = accel
                .allocate_image(output_size.width, output_size.height, role.format())
                .map_err(|source| EffectError::Allocation { role, source })?;
            self.scratch = Some(scratch);
            report.set(role, SlotChange::Created);
        }

        let image = |role: BufferRole, size: Size| {
            move || accel.allocate_image(size.width, size.height, role.format())
        };
        let surface = |size: Size| move || accel.allocate_surface(size.width, size.height);

        let role = BufferRole::Input;
        report.set(role, ensure(&mut self.input, role, input_size, surface(input_size))?);

        let role = BufferRole::ConvertToFp32;
        let change = ensure(&mut self.convert_to_fp32, role, input_size, image(role, input_size))?;
        report.set(role, change);

        let role = BufferRole::Source;
        let change = ensure(&mut self.source, role, input_size, image(role, input_size))?;
        report.set(role, change);
        if let (SlotChange::Created | SlotChange::Resized, Some(source)) = (change, &self.source) {
            bind(kernel, INPUT_IMAGE_0, source)?;
        }

        let role = BufferRole::Destination;
        let change = ensure(&mut self.destination, role, output_size, image(role, output_size))?;
        report.set(role, change);
        if let (SlotChange::Created | SlotChange::Resized, Some(dest)) = (change, &self.destination) {
            bind(kernel, OUTPUT_IMAGE_0, dest)?;
        }

        let role = BufferRole::ConvertToU8;
        let change = ensure(&mut self.convert_to_u8, role, output_size, image(role, output_size))?;
        report.set(role, change);

        let role = BufferRole::Output;
        report.set(role, ensure(&mut self.output, role, output_size, surface(output_size))?);

        Ok(report)
    }

    /// Borrows every buffer for one pass of the chain.
    pub fn stages(&mut self) -> EffectResult<Stages<'_, A>> {
        let Self {
            input,
            convert_to_fp32,
            source,
            destination,
            convert_to_u8,
            output,
            scratch,
        } = self;
        let missing = EffectError::NotAllocated;
        Ok(Stages {
            input: input.as_mut().ok_or(missing(BufferRole::Input))?,
            convert_to_fp32: convert_to_fp32
                .as_mut()
                .ok_or(missing(BufferRole::ConvertToFp32))?,
            source: source.as_mut().ok_or(missing(BufferRole::Source))?,
            destination: destination.as_mut().ok_or(missing(BufferRole::Destination))?,
            convert_to_u8: convert_to_u8.as_mut().ok_or(missing(BufferRole::ConvertToU8))?,
            output: output.as_mut().ok_or(missing(BufferRole::Output))?,
            scratch: scratch.as_mut().ok_or(missing(BufferRole::Scratch))?,
        })
    }

    /// Handle of one buffer, if allocated.
    pub fn get(&self, role: BufferRole) -> Option<&dyn ImageHandle> {
        match role {
            BufferRole::Input => self.input.as_ref().map(|s| s as &dyn ImageHandle),
            BufferRole::ConvertToFp32 => self.convert_to_fp32.as_ref().map(|i| i as &dyn ImageHandle),
            BufferRole::Source => self.source.as_ref().map(|i| i as &dyn ImageHandle),
            BufferRole::Destination => self.destination.as_ref().map(|i| i as &dyn ImageHandle),
            BufferRole::ConvertToU8 => self.convert_to_u8.as_ref().map(|i| i as &dyn ImageHandle),
            BufferRole::Output => self.output.as_ref().map(|s| s as &dyn ImageHandle),
            BufferRole::Scratch => self.scratch.as_ref().map(|i| i as &dyn ImageHandle),
        }
    }

    /// Texture view of the output buffer.
    pub fn output_texture(&self) -> Option<&A::Texture> {
        self.output.as_ref().map(TextureSurface::texture)
    }

    /// Whether every buffer is allocated.
    pub fn is_complete(&self) -> bool {
        BufferRole::ALL.iter().all(|&role| self.get(role).is_some())
    }

    /// Device memory held by the set.
    pub fn total_bytes(&self) -> u64 {
        BufferRole::ALL
            .iter()
            .filter_map(|&role| self.get(role))
            .map(|h| h.size_bytes())
            .sum()
    }

    /// Drops every buffer. The caller must hold a device scope.
    pub fn release(&mut self) {
        let bytes = self.total_bytes();
        *self = Self::default();
        debug!(bytes, "released buffers");
    }
}
