//! # Lumen Core
//!
//! Math aliases, colors, bounding volumes and profiling hooks shared by the
//! Lumen rendering crates.

pub mod bounds;
pub mod color;
pub mod math;
pub mod profiling;

pub use bounds::{Aabb, BoundingSphere, Frustum, FrustumPlane};
pub use color::{Color, LinearColor};

/// Core library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log the crate version once at startup.
pub fn init() {
    log::info!("Lumen Core v{} initialized", VERSION);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
