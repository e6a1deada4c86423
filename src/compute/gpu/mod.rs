//! GPU Compute Backend for fitness evaluation
//!
//! Provides a GPU-accelerated fitness evaluator using WebGPU (wgpu).

mod evaluator;

pub use evaluator::GpuFitnessEvaluator;

/// Error type for GPU operations.
#[derive(Debug, thiserror::Error)]
pub enum GpuError {
    #[error("No suitable GPU adapter found")]
    NoAdapter,

    #[error("Failed to request GPU device: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),

    #[error("Buffer mapping failed: {0}")]
    BufferMap(#[from] wgpu::BufferAsyncError),

    #[error("Buffer readback was abandoned before completing")]
    ReadbackLost,

    #[error("Image of {width}x{height} pixels exceeds GPU limits")]
    ImageTooLarge { width: usize, height: usize },
}
