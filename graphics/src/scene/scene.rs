//! The scene: primitives, lights and per-view visibility.

use std::sync::Arc;

use parking_lot::Mutex;
use slotmap::{SlotMap, new_key_type};

use lumen_core::profile_scope;

use crate::error::{GraphicsError, contract_violation};

use super::light::Light;
use super::material::Material;
use super::primitive::PrimitiveComponent;
use super::sdg::{DepthGroup, SceneDepthGroup, SceneDepthGroups};
use super::view::SceneView;

new_key_type! {
    pub struct PrimitiveId;
    pub struct LightId;
}

/// Scene shared between the game thread and the rendering thread.
pub type SharedScene = Arc<Mutex<Scene>>;

/// Per-view visibility state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewState {
    #[default]
    Idle,
    Built,
}

/// Owns the primitives and lights of one world, bucketed into depth groups.
pub struct Scene {
    primitives: SlotMap<PrimitiveId, Box<dyn PrimitiveComponent>>,
    lights: SlotMap<LightId, Light>,
    depth_groups: SceneDepthGroups,
    visible_lights: Vec<Light>,
    view_state: ViewState,
    num_visible_primitives: usize,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    pub fn new() -> Self {
        Self {
            primitives: SlotMap::with_key(),
            lights: SlotMap::with_key(),
            depth_groups: SceneDepthGroups::new(),
            visible_lights: Vec::new(),
            view_state: ViewState::Idle,
            num_visible_primitives: 0,
        }
    }

    pub fn into_shared(self) -> SharedScene {
        Arc::new(Mutex::new(self))
    }

    // ========================================================================
    // Primitives and lights
    // ========================================================================

    /// Attach a primitive and link it into its draw lists.
    pub fn add_primitive(&mut self, mut primitive: Box<dyn PrimitiveComponent>) -> PrimitiveId {
        primitive.link_draw_list(&mut self.depth_groups);
        self.primitives.insert(primitive)
    }

    /// Detach a primitive, unlinking it from every draw list.
    pub fn remove_primitive(&mut self, id: PrimitiveId) -> Option<Box<dyn PrimitiveComponent>> {
        let mut primitive = self.primitives.remove(id)?;
        primitive.unlink_draw_list(&mut self.depth_groups);
        Some(primitive)
    }

    pub fn primitive(&self, id: PrimitiveId) -> Option<&dyn PrimitiveComponent> {
        self.primitives.get(id).map(|p| p.as_ref())
    }

    /// Typed mutable access, for changing materials, meshes or groups.
    pub fn primitive_mut<T: PrimitiveComponent>(&mut self, id: PrimitiveId) -> Option<&mut T> {
        self.primitives.get_mut(id)?.as_any_mut().downcast_mut::<T>()
    }

    pub fn num_primitives(&self) -> usize {
        self.primitives.len()
    }

    pub fn add_light(&mut self, light: Light) -> LightId {
        self.lights.insert(light)
    }

    pub fn remove_light(&mut self, id: LightId) -> Option<Light> {
        self.lights.remove(id)
    }

    pub fn light_mut(&mut self, id: LightId) -> Option<&mut Light> {
        self.lights.get_mut(id)
    }

    /// Relink every primitive drawn with `material` on its next `add_to_draw_list`.
    ///
    /// Call after changing a material's shaders or raster state in place.
    pub fn invalidate_material(&mut self, material: &Material) -> usize {
        let count = self.depth_groups.invalidate_material(material.id());
        log::debug!("Scene: {count} links invalidated by material {}", material.id());
        count
    }

    pub fn num_lights(&self) -> usize {
        self.lights.len()
    }

    // ========================================================================
    // Views
    // ========================================================================

    /// Cull against `view` and fill this frame's draw lists and visible lights.
    ///
    /// Must be paired with exactly one [`clear_view`](Self::clear_view).
    pub fn build_view(&mut self, view: &SceneView) -> Result<usize, GraphicsError> {
        profile_scope!("Scene::build_view");
        if self.view_state == ViewState::Built {
            return Err(contract_violation!("build_view called twice without clear_view"));
        }
        self.view_state = ViewState::Built;

        let frustum = view.frustum();
        let mut visible = 0;
        for primitive in self.primitives.values_mut() {
            let bounds = primitive.bounds();
            if !bounds.is_empty() && !frustum.intersects_aabb(&bounds) {
                continue;
            }
            if let Err(err) = primitive.add_to_draw_list(view, &mut self.depth_groups) {
                log::warn!("Scene: build_view aborted: {err}");
                self.release_frame();
                return Err(err);
            }
            visible += 1;
        }

        self.visible_lights.clear();
        self.visible_lights.extend(
            self.lights
                .values()
                .filter(|light| light.is_visible(frustum))
                .copied(),
        );
        self.num_visible_primitives = visible;
        log::trace!(
            "Scene: {} of {} primitives and {} lights visible",
            visible,
            self.primitives.len(),
            self.visible_lights.len()
        );
        Ok(visible)
    }

    /// Release per-frame state gathered by [`build_view`](Self::build_view).
    pub fn clear_view(&mut self) -> Result<(), GraphicsError> {
        if self.view_state == ViewState::Idle {
            return Err(contract_violation!("clear_view without build_view"));
        }
        self.release_frame();
        Ok(())
    }

    /// Drop everything gathered for the current view and return to idle.
    fn release_frame(&mut self) {
        self.depth_groups.clear_frame();
        for primitive in self.primitives.values_mut() {
            primitive.end_frame();
        }
        self.visible_lights.clear();
        self.num_visible_primitives = 0;
        self.view_state = ViewState::Idle;
    }

    pub fn view_state(&self) -> ViewState {
        self.view_state
    }

    pub fn is_view_built(&self) -> bool {
        self.view_state == ViewState::Built
    }

    pub fn num_visible_primitives(&self) -> usize {
        self.num_visible_primitives
    }

    pub fn get_sdg(&self, group: DepthGroup) -> &SceneDepthGroup {
        self.depth_groups.get(group)
    }

    pub fn get_sdg_mut(&mut self, group: DepthGroup) -> &mut SceneDepthGroup {
        self.depth_groups.get_mut(group)
    }

    pub fn depth_groups(&self) -> &SceneDepthGroups {
        &self.depth_groups
    }

    pub(crate) fn depth_groups_mut(&mut self) -> &mut SceneDepthGroups {
        &mut self.depth_groups
    }

    /// Lights collected by the last `build_view`; empty while idle.
    pub fn visible_lights(&self) -> &[Light] {
        &self.visible_lights
    }
}

impl std::fmt::Debug for Scene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scene")
            .field("primitives", &self.primitives.len())
            .field("lights", &self.lights.len())
            .field("view_state", &self.view_state)
            .finish()
    }
}

static_assertions::assert_impl_all!(Scene: Send, Sync);

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use lumen_core::LinearColor;
    use lumen_core::math::{Mat4, Vec3, look_at_rh, mat4_from_translation, perspective_rh};

    use super::*;
    use crate::backend::DummyBackend;
    use crate::config::RhiParameters;
    use crate::device::Rhi;
    use crate::scene::{LinkState, Material, MeshPrimitive, ShowFlags, StaticMesh, StaticMeshRef};
    use crate::shaders::BuiltinShaders;

    fn mesh() -> (Rhi, StaticMeshRef) {
        let rhi = Rhi::with_backend(Arc::new(DummyBackend::new()), RhiParameters::default()).unwrap();
        let shaders = BuiltinShaders::new(&rhi).unwrap();
        let material = Material::default_mesh(&rhi, &shaders).into_ref();
        let mesh = StaticMesh::unit_quad(&rhi, &shaders, material).unwrap();
        (rhi, mesh)
    }

    fn view() -> SceneView {
        let eye = Vec3::new(0.0, 0.0, 5.0);
        SceneView::new(
            eye,
            perspective_rh(1.0, 1.0, 0.1, 100.0),
            look_at_rh(&eye, &Vec3::zeros(), &Vec3::y()),
            32,
            32,
            LinearColor::BLACK,
            ShowFlags::DEFAULT_GAME,
        )
    }

    #[test]
    fn test_build_view_culls_primitives() {
        let (_rhi, mesh) = mesh();
        let mut scene = Scene::new();
        scene.add_primitive(Box::new(MeshPrimitive::static_mesh(mesh.clone(), Mat4::identity())));
        scene.add_primitive(Box::new(MeshPrimitive::static_mesh(
            mesh,
            mat4_from_translation(Vec3::new(0.0, 0.0, 50.0)),
        )));

        assert_eq!(scene.build_view(&view()).unwrap(), 1);
        let list = &scene.get_sdg(DepthGroup::World).static_mesh_draw_list;
        assert_eq!(list.total_instances(), 1);
        scene.clear_view().unwrap();
        assert_eq!(
            scene.get_sdg(DepthGroup::World).static_mesh_draw_list.total_instances(),
            0
        );
    }

    #[test]
    fn test_visible_lights_reset_by_clear_view() {
        let mut scene = Scene::new();
        scene.add_light(Light::point(Vec3::zeros(), 2.0, LinearColor::WHITE));
        scene.add_light(Light::point(Vec3::new(0.0, 0.0, 80.0), 2.0, LinearColor::WHITE));
        scene.build_view(&view()).unwrap();
        assert_eq!(scene.visible_lights().len(), 1);
        scene.clear_view().unwrap();
        assert!(scene.visible_lights().is_empty());
    }

    #[test]
    #[should_panic(expected = "build_view called twice")]
    fn test_double_build_view_is_violation() {
        let mut scene = Scene::new();
        scene.build_view(&view()).unwrap();
        let _ = scene.build_view(&view());
    }

    /// Fails its first `add_to_draw_list`, succeeds afterwards.
    struct FlakyPrimitive {
        failures_left: u32,
    }

    impl PrimitiveComponent for FlakyPrimitive {
        fn link_draw_list(&mut self, _sdgs: &mut SceneDepthGroups) {}

        fn unlink_draw_list(&mut self, _sdgs: &mut SceneDepthGroups) {}

        fn add_to_draw_list(
            &mut self,
            _view: &SceneView,
            _sdgs: &mut SceneDepthGroups,
        ) -> Result<(), GraphicsError> {
            if self.failures_left > 0 {
                self.failures_left -= 1;
                return Err(GraphicsError::OutOfMemory);
            }
            Ok(())
        }

        fn bounds(&self) -> lumen_core::Aabb {
            lumen_core::Aabb::from_min_max(Vec3::repeat(-0.5), Vec3::repeat(0.5))
        }

        fn as_any(&self) -> &dyn std::any::Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
            self
        }
    }

    #[test]
    fn test_failed_build_view_returns_to_idle() {
        let (_rhi, mesh) = mesh();
        let mut scene = Scene::new();
        scene.add_primitive(Box::new(MeshPrimitive::static_mesh(mesh, Mat4::identity())));
        scene.add_primitive(Box::new(FlakyPrimitive { failures_left: 1 }));
        scene.add_light(Light::point(Vec3::zeros(), 2.0, LinearColor::WHITE));

        assert_eq!(scene.build_view(&view()), Err(GraphicsError::OutOfMemory));
        assert_eq!(scene.view_state(), ViewState::Idle);
        assert!(scene.visible_lights().is_empty());
        assert_eq!(
            scene.get_sdg(DepthGroup::World).static_mesh_draw_list.total_instances(),
            0
        );

        assert_eq!(scene.build_view(&view()).unwrap(), 2);
        assert_eq!(
            scene.get_sdg(DepthGroup::World).static_mesh_draw_list.total_instances(),
            1
        );
        scene.clear_view().unwrap();
    }

    #[test]
    fn test_invalidated_material_relinks_holders() {
        let (_rhi, mesh) = mesh();
        let material = mesh.material(0, &[]).unwrap();
        let mut scene = Scene::new();
        let a = scene.add_primitive(Box::new(MeshPrimitive::static_mesh(
            mesh.clone(),
            Mat4::identity(),
        )));
        let b = scene.add_primitive(Box::new(MeshPrimitive::static_mesh(
            mesh,
            mat4_from_translation(Vec3::new(0.5, 0.0, 0.0)),
        )));
        let list = &scene.get_sdg(DepthGroup::World).static_mesh_draw_list;
        assert_eq!(list.num_links(), 1);

        assert!(scene.invalidate_material(&material) >= 1);
        assert_eq!(scene.build_view(&view()).unwrap(), 2);
        assert_eq!(scene.primitive(a).unwrap().link_state(), LinkState::Relinked);
        assert_eq!(scene.primitive(b).unwrap().link_state(), LinkState::Relinked);
        let list = &scene.get_sdg(DepthGroup::World).static_mesh_draw_list;
        assert_eq!(list.num_links(), 1);
        assert_eq!(list.total_instances(), 2);
        scene.clear_view().unwrap();
        assert_eq!(scene.primitive(a).unwrap().link_state(), LinkState::Clean);
    }

    #[test]
    fn test_remove_primitive_unlinks() {
        let (_rhi, mesh) = mesh();
        let mut scene = Scene::new();
        let id = scene.add_primitive(Box::new(MeshPrimitive::static_mesh(mesh, Mat4::identity())));
        assert!(!scene.get_sdg(DepthGroup::World).is_empty());
        assert!(scene.remove_primitive(id).is_some());
        assert!(scene.get_sdg(DepthGroup::World).is_empty());
        assert!(scene.remove_primitive(id).is_none());
    }

    #[test]
    fn test_relinked_state_settles_at_clear_view() {
        let (rhi, mesh) = mesh();
        let shaders = BuiltinShaders::new(&rhi).unwrap();
        let mut scene = Scene::new();
        let id = scene.add_primitive(Box::new(MeshPrimitive::static_mesh(mesh, Mat4::identity())));

        let other = Material::default_mesh(&rhi, &shaders).into_ref();
        scene
            .primitive_mut::<MeshPrimitive>(id)
            .unwrap()
            .set_material(0, Some(other));
        scene.build_view(&view()).unwrap();
        assert_eq!(scene.primitive(id).unwrap().link_state(), LinkState::Relinked);
        scene.clear_view().unwrap();
        assert_eq!(scene.primitive(id).unwrap().link_state(), LinkState::Clean);
    }
}
