//! Scene-side drawing: materials, meshes, draw lists, depth groups and the scene.
//!
//! Primitives register their mesh batches once into the [`MeshDrawList`]s of
//! their [`SceneDepthGroup`]. Every frame [`Scene::build_view`] culls them
//! against the view and each visible primitive appends one [`InstanceData`]
//! per registered batch. The renderer then draws each list with one instanced
//! draw per batch element, and [`Scene::clear_view`] drops the per-frame
//! state.
//!
//! - [`DrawingPolicy`] - binds a (vertex factory, material) pair for a pass
//! - [`MeshDrawList`] - links keyed by drawing policy identity
//! - [`PrimitiveComponent`] - the cull/draw contract of scene objects
//! - [`SceneView`] - camera, size and [`ShowFlags`] of one frame

mod draw_list;
mod drawing_policy;
#[cfg(feature = "editor")]
mod dynamic;
mod hit_proxy;
mod light;
mod material;
mod mesh;
mod primitive;
#[allow(clippy::module_inception)]
mod scene;
mod sdg;
#[cfg(feature = "editor")]
mod simple_elements;
mod vertex_factory;
mod view;

pub use draw_list::{DrawingPolicyLinkId, DrawingPolicyLinkRef, MeshBatchId, MeshDrawList};
pub use drawing_policy::{
    DrawingPolicy, DrawingPolicyKey, HitProxyDrawingPolicy, MeshDrawingPolicy,
};
#[cfg(feature = "editor")]
pub use dynamic::{DynamicMeshBuilder, DynamicMeshBuilderElement};
pub use hit_proxy::{HitProxyId, HitProxyLayer};
pub use light::{Light, LightKind};
pub use material::{Material, MaterialRef};
pub use mesh::{MeshBatch, MeshBatchElement, StaticMesh, StaticMeshRef, StaticMeshSection};
pub use primitive::{LinkState, MeshPrimitive, PrimitiveComponent};
pub use scene::{LightId, PrimitiveId, Scene, SharedScene, ViewState};
#[cfg(feature = "hit-proxy")]
pub use sdg::HitProxyDrawLists;
pub use sdg::{DepthGroup, SceneDepthGroup, SceneDepthGroups};
#[cfg(feature = "editor")]
pub use simple_elements::SimpleElements;
pub use vertex_factory::{
    INSTANCE_STREAM, InstanceData, InstanceFlags, LocalVertex, SimpleElementVertex,
    VERTEX_STREAM, VertexFactory, VertexFactoryRef, local_vertex_elements,
    simple_element_vertex_elements,
};
pub(crate) use vertex_factory::simple_element_stride;
pub use view::{SceneView, ShowFlags};
