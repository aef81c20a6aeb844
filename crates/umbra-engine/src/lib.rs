//! Umbra engine crate.
//!
//! A deferred renderer on wgpu: G-buffer geometry pass, screen-space ambient
//! occlusion, shadow mapping and a Blinn-Phong lighting composite, driven by
//! a winit runtime.

pub mod core;
pub mod device;
pub mod logging;
pub mod render;
pub mod time;
pub mod window;
