//! Scoped entry into device contexts.
//!
//! Every device-side operation must run with both the graphics context and
//! the accelerator (compute) context entered. [`DeviceScope`] enters both and
//! leaves them in reverse order when dropped, including on early return.
//!
//! ```rust
//! use vsr_compute::{CpuAccelerator, DeviceScope};
//!
//! let accel = CpuAccelerator::with_budget(0);
//! {
//!     let _scope = DeviceScope::enter(&accel).unwrap();
//!     assert_eq!(accel.compute().depth(), 1);
//! }
//! assert_eq!(accel.compute().depth(), 0);
//! ```

use tracing::trace;

use crate::ComputeResult;
use crate::backend::Accelerator;

/// A context that must be held while issuing device work.
///
/// Implementations must be re-entrant: nested `acquire` calls are allowed
/// as long as each is matched by a `release`.
pub trait ContextProvider: Send + Sync {
    /// Enters the context.
    fn acquire(&self) -> ComputeResult<()>;

    /// Leaves the context.
    fn release(&self);

    /// Name used in diagnostics.
    fn name(&self) -> &'static str {
        "device"
    }
}

/// Holds one context for its lifetime.
#[must_use = "the context is released as soon as the guard is dropped"]
pub struct ContextGuard<'a> {
    provider: &'a dyn ContextProvider,
}

impl<'a> ContextGuard<'a> {
    /// Acquires `provider`.
    pub fn enter(provider: &'a dyn ContextProvider) -> ComputeResult<Self> {
        provider.acquire()?;
        trace!(context = provider.name(), "entered");
        Ok(Self { provider })
    }
}

impl Drop for ContextGuard<'_> {
    fn drop(&mut self) {
        self.provider.release();
        trace!(context = self.provider.name(), "left");
    }
}

/// Graphics and compute contexts, entered in that order.
#[must_use = "the contexts are released as soon as the scope is dropped"]
pub struct DeviceScope<'a> {
    // Field order is drop order: compute leaves before graphics.
    _compute: ContextGuard<'a>,
    _graphics: ContextGuard<'a>,
}

impl<'a> DeviceScope<'a> {
    /// Enters both contexts of `accel`.
    ///
    /// If the compute context fails, the graphics context is released
    /// before the error is returned.
    pub fn enter<A: Accelerator + ?Sized>(accel: &'a A) -> ComputeResult<Self> {
        let graphics = ContextGuard::enter(accel.graphics_context())?;
        let compute = ContextGuard::enter(accel.compute_context())?;
        Ok(Self {
            _compute: compute,
            _graphics: graphics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ComputeError;
    use std::sync::Mutex;

    struct Recorder {
        name: &'static str,
        log: &'static Mutex<Vec<String>>,
        fail: bool,
    }

    impl ContextProvider for Recorder {
        fn acquire(&self) -> ComputeResult<()> {
            if self.fail {
                return Err(ComputeError::Context(self.name.into()));
            }
            self.log.lock().unwrap().push(format!("+{}", self.name));
            Ok(())
        }

        fn release(&self) {
            self.log.lock().unwrap().push(format!("-{}", self.name));
        }
    }

    #[test]
    fn test_guard_releases_on_drop() {
        static LOG: Mutex<Vec<String>> = Mutex::new(Vec::new());
        let ctx = Recorder { name: "a", log: &LOG, fail: false };
        {
            let _outer = ContextGuard::enter(&ctx).unwrap();
            let _inner = ContextGuard::enter(&ctx).unwrap();
        }
        assert_eq!(*LOG.lock().unwrap(), vec!["+a", "+a", "-a", "-a"]);
    }

    #[test]
    fn test_failed_acquire_has_no_release() {
        static LOG: Mutex<Vec<String>> = Mutex::new(Vec::new());
        let ctx = Recorder { name: "b", log: &LOG, fail: true };
        assert!(ContextGuard::enter(&ctx).is_err());
        assert!(LOG.lock().unwrap().is_empty());
    }
}
