//! Frame rendering on top of the scene: targets, passes and picking.

#[cfg(feature = "hit-proxy")]
mod hit_proxy;
mod render_targets;
mod scene_renderer;
mod screen;
mod viewport_client;

pub use render_targets::{SceneRenderTargets, SceneTargets};
pub use scene_renderer::{RenderStats, SceneRenderer};
pub use screen::{QuadRect, draw_denormalized_quad};
pub use viewport_client::{EditorViewportClient, ViewportType};
