//! Common types shared across the graphics system.

use bytemuck::{Pod, Zeroable};

// ============================================================================
// Viewport Rectangle
// ============================================================================

/// Rectangle of the render target that rasterization maps to.
///
/// Depth range is `[0, 1]`; origin is the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Default for ViewportRect {
    fn default() -> Self {
        Self::new(0.0, 0.0, 0.0, 0.0)
    }
}

impl ViewportRect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }

    /// Full-target rectangle with origin at (0, 0).
    pub fn from_dimensions(width: u32, height: u32) -> Self {
        Self::new(0.0, 0.0, width as f32, height as f32)
    }

    pub fn with_depth_range(mut self, min_depth: f32, max_depth: f32) -> Self {
        self.min_depth = min_depth;
        self.max_depth = max_depth;
        self
    }

    /// A rectangle with no area is ignored by `set_viewport`.
    pub fn has_area(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }
}

// ============================================================================
// Scissor Rectangle
// ============================================================================

/// Scissor rectangle for clipping rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ScissorRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl ScissorRect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

// ============================================================================
// View Uniforms
// ============================================================================

/// Per-view constants uploaded by `set_view_parameters`.
///
/// Layout matches the `ViewUniforms` struct in the built-in WGSL shaders.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ViewUniforms {
    pub view_projection: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
    /// World-space camera position, w unused.
    pub position: [f32; 4],
    /// Target size in pixels (x, y) and its reciprocal (z, w).
    pub view_size: [f32; 4],
}

impl Default for ViewUniforms {
    fn default() -> Self {
        let identity = [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ];
        Self {
            view_projection: identity,
            view: identity,
            projection: identity,
            position: [0.0; 4],
            view_size: [0.0; 4],
        }
    }
}

static_assertions::const_assert_eq!(std::mem::size_of::<ViewUniforms>(), 224);
