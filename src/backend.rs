//! Backend abstraction - Multi-backend support
//!
//! NdArray (CPU) by default, CUDA (GPU) behind the `cuda` feature.
//! [`Runtime::init`] is called once at startup, before any data loader
//! workers exist, and the device it selects is passed down explicitly.

use burn::tensor::backend::Backend;
use tracing::info;

// --------------------------------------------------------------------------------
// BACKEND SELECTION: CUDA (opt-in) or NdArray (default)
// --------------------------------------------------------------------------------

#[cfg(feature = "cuda")]
pub type DefaultBackend = burn_cuda::Cuda;

#[cfg(all(not(feature = "cuda"), feature = "ndarray"))]
pub type DefaultBackend = burn_ndarray::NdArray;

#[cfg(all(not(feature = "cuda"), not(feature = "ndarray")))]
compile_error!("At least one backend (cuda or ndarray) must be enabled!");

/// Get the default device
pub fn default_device() -> <DefaultBackend as Backend>::Device {
    <DefaultBackend as Backend>::Device::default()
}

/// Get a human-readable name for the current backend
pub fn backend_name() -> &'static str {
    #[cfg(feature = "cuda")]
    {
        "CUDA (GPU)"
    }

    #[cfg(not(feature = "cuda"))]
    {
        "NdArray (CPU)"
    }
}

/// Process-wide execution context, created once at startup
#[derive(Debug, Clone)]
pub struct Runtime<B: Backend> {
    device: B::Device,
    backend_name: &'static str,
}

impl Runtime<DefaultBackend> {
    /// Select the compiled-in backend and its default device
    pub fn init() -> Self {
        let runtime = Self::with_device(default_device(), backend_name());
        info!("Using backend: {}", runtime.backend_name);
        runtime
    }
}

impl<B: Backend> Runtime<B> {
    pub fn with_device(device: B::Device, backend_name: &'static str) -> Self {
        Self {
            device,
            backend_name,
        }
    }

    pub fn device(&self) -> &B::Device {
        &self.device
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend_name
    }
}
