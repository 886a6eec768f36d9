//! Drawable primitives and their draw-list registration.

use std::any::Any;

use lumen_core::Aabb;
use lumen_core::math::Mat4;

use crate::device::Rhi;
use crate::error::GraphicsError;
use crate::resources::Texture2DRef;
use crate::shaders::BuiltinShaders;

#[cfg(feature = "hit-proxy")]
use super::HitProxyLayer;
use super::draw_list::{DrawingPolicyLinkRef, MeshDrawList};
use super::drawing_policy::MeshDrawingPolicy;
use super::hit_proxy::HitProxyId;
use super::material::{Material, MaterialRef};
use super::mesh::{StaticMesh, StaticMeshRef};
use super::sdg::{DepthGroup, SceneDepthGroup, SceneDepthGroups};
use super::vertex_factory::{InstanceData, InstanceFlags};
use super::view::{SceneView, ShowFlags};

/// Registration state of a primitive in its draw lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LinkState {
    /// Registered links match the primitive's mesh, materials and group.
    #[default]
    Clean,
    /// A change invalidated the registration; relinked on the next `add_to_draw_list`.
    Dirty,
    /// Relinked this frame; settles to `Clean` at the end of the frame.
    Relinked,
}

/// Something the scene can cull and draw.
pub trait PrimitiveComponent: Send + Sync + 'static {
    /// Register into the draw lists of the primitive's depth group.
    fn link_draw_list(&mut self, sdgs: &mut SceneDepthGroups);

    /// Drop every registration made by [`link_draw_list`](Self::link_draw_list).
    fn unlink_draw_list(&mut self, sdgs: &mut SceneDepthGroups);

    /// Append this frame's instances, relinking first when dirty.
    fn add_to_draw_list(
        &mut self,
        view: &SceneView,
        sdgs: &mut SceneDepthGroups,
    ) -> Result<(), GraphicsError>;

    /// World-space bounds used for frustum culling.
    fn bounds(&self) -> Aabb;

    fn link_state(&self) -> LinkState {
        LinkState::Clean
    }

    /// Called by `Scene::clear_view` for every primitive.
    fn end_frame(&mut self) {}

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Which list of the depth group a mesh primitive registers in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MeshList {
    StaticMesh,
    Sprite,
}

impl MeshList {
    fn show_flag(self) -> ShowFlags {
        match self {
            Self::StaticMesh => ShowFlags::STATIC_MESH,
            Self::Sprite => ShowFlags::SPRITE,
        }
    }

    fn select(self, group: &mut SceneDepthGroup) -> &mut MeshDrawList<MeshDrawingPolicy> {
        match self {
            Self::StaticMesh => &mut group.static_mesh_draw_list,
            Self::Sprite => &mut group.sprite_draw_list,
        }
    }
}

/// Where the current registration lives.
#[derive(Debug, Clone)]
struct Registration {
    group: DepthGroup,
    links: Vec<DrawingPolicyLinkRef>,
    #[cfg(feature = "hit-proxy")]
    hit_proxy_layer: HitProxyLayer,
    #[cfg(feature = "hit-proxy")]
    hit_proxy_links: Vec<DrawingPolicyLinkRef>,
}

/// A static mesh (or camera-facing sprite) placed in the world.
#[derive(Debug)]
pub struct MeshPrimitive {
    mesh: StaticMeshRef,
    overrides: Vec<Option<MaterialRef>>,
    transform: Mat4,
    hit_proxy_id: HitProxyId,
    selected: bool,
    depth_group: DepthGroup,
    #[cfg(feature = "hit-proxy")]
    hit_proxy_layer: HitProxyLayer,
    list: MeshList,
    registration: Option<Registration>,
    state: LinkState,
}

impl MeshPrimitive {
    pub fn static_mesh(mesh: StaticMeshRef, transform: Mat4) -> Self {
        Self::with_list(mesh, transform, MeshList::StaticMesh)
    }

    /// Camera-facing textured quad drawn from the sprite list.
    pub fn sprite(
        rhi: &Rhi,
        shaders: &BuiltinShaders,
        texture: Option<Texture2DRef>,
        transform: Mat4,
    ) -> Result<Self, GraphicsError> {
        let material = Material::sprite(rhi, shaders, texture).into_ref();
        let quad = StaticMesh::unit_quad(rhi, shaders, material)?;
        Ok(Self::with_list(quad, transform, MeshList::Sprite))
    }

    fn with_list(mesh: StaticMeshRef, transform: Mat4, list: MeshList) -> Self {
        Self {
            mesh,
            overrides: Vec::new(),
            transform,
            hit_proxy_id: HitProxyId::NONE,
            selected: false,
            depth_group: DepthGroup::World,
            #[cfg(feature = "hit-proxy")]
            hit_proxy_layer: HitProxyLayer::World,
            list,
            registration: None,
            state: LinkState::Clean,
        }
    }

    pub fn with_hit_proxy_id(mut self, id: HitProxyId) -> Self {
        self.hit_proxy_id = id;
        self
    }

    pub fn with_depth_group(mut self, group: DepthGroup) -> Self {
        self.depth_group = group;
        self
    }

    #[cfg(feature = "hit-proxy")]
    pub fn with_hit_proxy_layer(mut self, layer: HitProxyLayer) -> Self {
        self.hit_proxy_layer = layer;
        self
    }

    pub fn mesh(&self) -> &StaticMeshRef {
        &self.mesh
    }

    pub fn transform(&self) -> &Mat4 {
        &self.transform
    }

    pub fn hit_proxy_id(&self) -> HitProxyId {
        self.hit_proxy_id
    }

    pub fn depth_group(&self) -> DepthGroup {
        self.depth_group
    }

    pub fn is_selected(&self) -> bool {
        self.selected
    }

    /// Material drawn for `slot`, overrides included.
    pub fn material(&self, slot: usize) -> Option<MaterialRef> {
        self.mesh.material(slot, &self.overrides)
    }

    /// Transforms only touch instance data and never dirty the links.
    pub fn set_transform(&mut self, transform: Mat4) {
        self.transform = transform;
    }

    pub fn set_selected(&mut self, selected: bool) {
        self.selected = selected;
    }

    /// Override (or restore with `None`) the material of a slot.
    pub fn set_material(&mut self, slot: usize, material: Option<MaterialRef>) {
        if self.overrides.len() <= slot {
            self.overrides.resize(slot + 1, None);
        }
        self.overrides[slot] = material;
        self.mark_dirty();
    }

    pub fn set_mesh(&mut self, mesh: StaticMeshRef) {
        self.mesh = mesh;
        self.mark_dirty();
    }

    pub fn set_depth_group(&mut self, group: DepthGroup) {
        if self.depth_group != group {
            self.depth_group = group;
            self.mark_dirty();
        }
    }

    fn mark_dirty(&mut self) {
        if self.registration.is_some() {
            self.state = LinkState::Dirty;
        }
    }

    fn instance_flags(&self) -> InstanceFlags {
        if self.selected {
            InstanceFlags::SELECTED
        } else {
            InstanceFlags::empty()
        }
    }

    /// True when a registered link was invalidated from the outside.
    fn has_stale_links(&self, sdgs: &SceneDepthGroups) -> bool {
        let Some(registration) = &self.registration else {
            return false;
        };
        let group = sdgs.get(registration.group);
        let list = match self.list {
            MeshList::StaticMesh => &group.static_mesh_draw_list,
            MeshList::Sprite => &group.sprite_draw_list,
        };
        registration
            .links
            .iter()
            .any(|r| !list.contains(*r) || list.is_link_dirty(*r))
    }
}

impl PrimitiveComponent for MeshPrimitive {
    fn link_draw_list(&mut self, sdgs: &mut SceneDepthGroups) {
        if self.registration.is_some() {
            self.unlink_draw_list(sdgs);
        }
        let group = sdgs.get_mut(self.depth_group);
        let links = self
            .mesh
            .link_draw_list(self.list.select(group), &self.overrides);
        #[cfg(feature = "hit-proxy")]
        let hit_proxy_links = self.mesh.link_draw_list(
            &mut group
                .hit_proxy_layer_mut(self.hit_proxy_layer)
                .hit_proxy_draw_list,
            &self.overrides,
        );
        self.registration = Some(Registration {
            group: self.depth_group,
            links,
            #[cfg(feature = "hit-proxy")]
            hit_proxy_layer: self.hit_proxy_layer,
            #[cfg(feature = "hit-proxy")]
            hit_proxy_links,
        });
    }

    fn unlink_draw_list(&mut self, sdgs: &mut SceneDepthGroups) {
        let Some(registration) = self.registration.take() else {
            return;
        };
        let group = sdgs.get_mut(registration.group);
        let list = self.list.select(group);
        for link in registration.links {
            list.remove_item(link);
        }
        #[cfg(feature = "hit-proxy")]
        {
            let hit_proxy_list = &mut group
                .hit_proxy_layer_mut(registration.hit_proxy_layer)
                .hit_proxy_draw_list;
            for link in registration.hit_proxy_links {
                hit_proxy_list.remove_item(link);
            }
        }
    }

    fn add_to_draw_list(
        &mut self,
        view: &SceneView,
        sdgs: &mut SceneDepthGroups,
    ) -> Result<(), GraphicsError> {
        if self.state == LinkState::Dirty || self.has_stale_links(sdgs) {
            log::trace!("MeshPrimitive: relinking {}", self.mesh.name());
            self.link_draw_list(sdgs);
            self.state = LinkState::Relinked;
        }
        if !view.show_flags().contains(self.list.show_flag()) {
            return Ok(());
        }
        let Some(registration) = &self.registration else {
            return Ok(());
        };

        let instance = InstanceData::new(&self.transform, self.hit_proxy_id, self.instance_flags());
        let group = sdgs.get_mut(registration.group);
        let list = self.list.select(group);
        for link in &registration.links {
            list.add_instance(*link, instance);
        }
        #[cfg(feature = "hit-proxy")]
        {
            let hit_proxy_list = &mut group
                .hit_proxy_layer_mut(registration.hit_proxy_layer)
                .hit_proxy_draw_list;
            for link in &registration.hit_proxy_links {
                hit_proxy_list.add_instance(*link, instance);
            }
        }
        Ok(())
    }

    fn bounds(&self) -> Aabb {
        self.mesh.bounds().transformed(&self.transform)
    }

    fn link_state(&self) -> LinkState {
        self.state
    }

    fn end_frame(&mut self) {
        if self.state == LinkState::Relinked {
            self.state = LinkState::Clean;
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use lumen_core::LinearColor;
    use lumen_core::math::{Vec3, look_at_rh, perspective_rh};

    use super::*;
    use crate::backend::DummyBackend;
    use crate::config::RhiParameters;

    struct Fixture {
        rhi: Rhi,
        shaders: Arc<BuiltinShaders>,
        mesh: StaticMeshRef,
    }

    fn fixture() -> Fixture {
        let rhi = Rhi::with_backend(Arc::new(DummyBackend::new()), RhiParameters::default()).unwrap();
        let shaders = BuiltinShaders::new(&rhi).unwrap();
        let material = Material::default_mesh(&rhi, &shaders).into_ref();
        let mesh = StaticMesh::unit_quad(&rhi, &shaders, material).unwrap();
        Fixture { rhi, shaders, mesh }
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
            ShowFlags::DEFAULT_EDITOR,
        )
    }

    #[test]
    fn test_material_change_relinks() {
        let f = fixture();
        let mut sdgs = SceneDepthGroups::new();
        let mut a = MeshPrimitive::static_mesh(f.mesh.clone(), Mat4::identity());
        let mut b = MeshPrimitive::static_mesh(f.mesh.clone(), Mat4::identity());
        a.link_draw_list(&mut sdgs);
        b.link_draw_list(&mut sdgs);

        let list = &sdgs.get(DepthGroup::World).static_mesh_draw_list;
        assert_eq!(list.num_links(), 1);
        let shared = a.registration.as_ref().unwrap().links[0];
        assert_eq!(list.link_registrations(shared), Some(2));

        let other = Material::default_mesh(&f.rhi, &f.shaders).into_ref();
        a.set_material(0, Some(other));
        assert_eq!(a.link_state(), LinkState::Dirty);

        a.add_to_draw_list(&view(), &mut sdgs).unwrap();
        assert_eq!(a.link_state(), LinkState::Relinked);
        let list = &sdgs.get(DepthGroup::World).static_mesh_draw_list;
        assert_eq!(list.num_links(), 2);
        assert_eq!(list.link_registrations(shared), Some(1));
        assert_eq!(list.total_instances(), 1);

        a.end_frame();
        assert_eq!(a.link_state(), LinkState::Clean);
    }

    #[test]
    fn test_depth_group_change_moves_registration() {
        let f = fixture();
        let mut sdgs = SceneDepthGroups::new();
        let mut p = MeshPrimitive::static_mesh(f.mesh.clone(), Mat4::identity());
        p.link_draw_list(&mut sdgs);
        p.set_depth_group(DepthGroup::Foreground);
        p.add_to_draw_list(&view(), &mut sdgs).unwrap();

        assert!(sdgs.get(DepthGroup::World).is_empty());
        assert!(!sdgs.get(DepthGroup::Foreground).is_empty());
    }

    #[test]
    fn test_unlink_empties_group() {
        let f = fixture();
        let mut sdgs = SceneDepthGroups::new();
        let mut p = MeshPrimitive::static_mesh(f.mesh.clone(), Mat4::identity());
        p.link_draw_list(&mut sdgs);
        assert!(!sdgs.get(DepthGroup::World).is_empty());
        p.unlink_draw_list(&mut sdgs);
        assert!(sdgs.get(DepthGroup::World).is_empty());
    }

    #[test]
    fn test_hidden_category_adds_no_instances() {
        let f = fixture();
        let mut sdgs = SceneDepthGroups::new();
        let mut sprite = MeshPrimitive::sprite(&f.rhi, &f.shaders, None, Mat4::identity()).unwrap();
        sprite.link_draw_list(&mut sdgs);

        let mut hidden = view();
        hidden.set_show_flags(ShowFlags::STATIC_MESH);
        sprite.add_to_draw_list(&hidden, &mut sdgs).unwrap();
        assert_eq!(sdgs.get(DepthGroup::World).sprite_draw_list.total_instances(), 0);

        sprite.add_to_draw_list(&view(), &mut sdgs).unwrap();
        assert_eq!(sdgs.get(DepthGroup::World).sprite_draw_list.total_instances(), 1);
    }

    #[test]
    fn test_bounds_follow_transform() {
        let f = fixture();
        let p = MeshPrimitive::static_mesh(
            f.mesh.clone(),
            lumen_core::math::mat4_from_translation(Vec3::new(10.0, 0.0, 0.0)),
        );
        assert!((p.bounds().center() - Vec3::new(10.0, 0.0, 0.0)).norm() < 1e-5);
    }
}
