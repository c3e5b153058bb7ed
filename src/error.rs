//! Resource errors.
//!
//! Caller contract violations (mutating a running animation, wrong-kind node
//! access, ...) are panics. Everything here is an environment failure that
//! a caller can only report.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("no suitable GPU adapter: {0}")]
    NoAdapter(#[from] wgpu::RequestAdapterError),

    #[error("failed to create GPU device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),

    #[error("failed to create surface: {0}")]
    CreateSurface(#[from] wgpu::CreateSurfaceError),

    #[error("window handle unavailable: {0}")]
    WindowHandle(#[from] raw_window_handle::HandleError),

    #[error("surface error: {0}")]
    Surface(#[from] wgpu::SurfaceError),

    #[error("failed to decode image: {0}")]
    Image(#[from] image::ImageError),

    #[error("pixel readback failed: {0}")]
    Readback(String),

    #[error("invalid texture data: {0}")]
    InvalidTexture(String),
}

pub type Result<T> = std::result::Result<T, Error>;
