//! Scene depth groups.
//!
//! Every primitive draws into exactly one [`DepthGroup`]. Groups are rendered
//! in [`DepthGroup::ALL`] order, each owning one draw list per element
//! category.

use crate::resources::ResourceId;

#[cfg(feature = "hit-proxy")]
use super::HitProxyLayer;
use super::draw_list::MeshDrawList;
#[cfg(feature = "hit-proxy")]
use super::drawing_policy::HitProxyDrawingPolicy;
use super::drawing_policy::MeshDrawingPolicy;
#[cfg(feature = "editor")]
use super::dynamic::DynamicMeshBuilderElement;
#[cfg(feature = "editor")]
use super::simple_elements::SimpleElements;

/// Ordered render bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub enum DepthGroup {
    #[default]
    World,
    Translucent,
    /// Drawn over the world without depth testing (UI).
    Foreground,
    /// Selection highlight, drawn in editor mode only.
    Highlight,
}

impl DepthGroup {
    pub const COUNT: usize = 4;
    pub const ALL: [DepthGroup; Self::COUNT] = [
        Self::World,
        Self::Translucent,
        Self::Foreground,
        Self::Highlight,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Hit-proxy draw lists of one layer.
#[cfg(feature = "hit-proxy")]
#[derive(Debug)]
pub struct HitProxyDrawLists {
    pub hit_proxy_draw_list: MeshDrawList<HitProxyDrawingPolicy>,
    #[cfg(feature = "editor")]
    pub simple_hit_proxy_elements: SimpleElements,
    #[cfg(feature = "editor")]
    pub dynamic_hit_proxy_mesh_builders: Vec<DynamicMeshBuilderElement>,
}

#[cfg(feature = "hit-proxy")]
impl HitProxyDrawLists {
    fn new() -> Self {
        Self {
            hit_proxy_draw_list: MeshDrawList::new("HitProxies"),
            #[cfg(feature = "editor")]
            simple_hit_proxy_elements: SimpleElements::new(),
            #[cfg(feature = "editor")]
            dynamic_hit_proxy_mesh_builders: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        let empty = self.hit_proxy_draw_list.is_empty();
        #[cfg(feature = "editor")]
        let empty = empty
            && self.simple_hit_proxy_elements.is_empty()
            && self.dynamic_hit_proxy_mesh_builders.is_empty();
        empty
    }

    fn invalidate_material(&mut self, material: ResourceId) -> usize {
        self.hit_proxy_draw_list.invalidate_material(material)
    }

    fn clear_frame(&mut self) {
        self.hit_proxy_draw_list.clear_instances();
        #[cfg(feature = "editor")]
        {
            self.simple_hit_proxy_elements.clear();
            self.dynamic_hit_proxy_mesh_builders.clear();
        }
    }
}

/// Draw lists of one depth group.
#[derive(Debug)]
pub struct SceneDepthGroup {
    pub static_mesh_draw_list: MeshDrawList<MeshDrawingPolicy>,
    pub sprite_draw_list: MeshDrawList<MeshDrawingPolicy>,
    /// Registrations made for the current frame only; emptied by `clear_view`.
    pub dynamic_mesh_elements: MeshDrawList<MeshDrawingPolicy>,
    #[cfg(feature = "editor")]
    pub simple_elements: SimpleElements,
    #[cfg(feature = "editor")]
    pub gizmo_draw_list: MeshDrawList<MeshDrawingPolicy>,
    #[cfg(feature = "editor")]
    pub dynamic_mesh_builders: Vec<DynamicMeshBuilderElement>,
    #[cfg(feature = "hit-proxy")]
    hit_proxy_layers: [HitProxyDrawLists; HitProxyLayer::COUNT],
}

impl Default for SceneDepthGroup {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneDepthGroup {
    pub fn new() -> Self {
        Self {
            static_mesh_draw_list: MeshDrawList::new("StaticMeshes"),
            sprite_draw_list: MeshDrawList::new("Sprites"),
            dynamic_mesh_elements: MeshDrawList::new("DynamicMeshElements"),
            #[cfg(feature = "editor")]
            simple_elements: SimpleElements::new(),
            #[cfg(feature = "editor")]
            gizmo_draw_list: MeshDrawList::new("Gizmos"),
            #[cfg(feature = "editor")]
            dynamic_mesh_builders: Vec::new(),
            #[cfg(feature = "hit-proxy")]
            hit_proxy_layers: [HitProxyDrawLists::new(), HitProxyDrawLists::new()],
        }
    }

    #[cfg(feature = "hit-proxy")]
    pub fn hit_proxy_layer(&self, layer: HitProxyLayer) -> &HitProxyDrawLists {
        &self.hit_proxy_layers[layer.index()]
    }

    #[cfg(feature = "hit-proxy")]
    pub fn hit_proxy_layer_mut(&mut self, layer: HitProxyLayer) -> &mut HitProxyDrawLists {
        &mut self.hit_proxy_layers[layer.index()]
    }

    /// True when no list holds a link or element, hit-proxy layers included.
    pub fn is_empty(&self) -> bool {
        let empty = self.static_mesh_draw_list.is_empty()
            && self.sprite_draw_list.is_empty()
            && self.dynamic_mesh_elements.is_empty();
        #[cfg(feature = "editor")]
        let empty = empty
            && self.simple_elements.is_empty()
            && self.gizmo_draw_list.is_empty()
            && self.dynamic_mesh_builders.is_empty();
        #[cfg(feature = "hit-proxy")]
        let empty = empty && self.hit_proxy_layers.iter().all(HitProxyDrawLists::is_empty);
        empty
    }

    /// Dirty every persistent link drawn with `material`. Returns the number of links.
    pub fn invalidate_material(&mut self, material: ResourceId) -> usize {
        let mut count = self.static_mesh_draw_list.invalidate_material(material)
            + self.sprite_draw_list.invalidate_material(material);
        #[cfg(feature = "editor")]
        {
            count += self.gizmo_draw_list.invalidate_material(material);
        }
        #[cfg(feature = "hit-proxy")]
        for layer in &mut self.hit_proxy_layers {
            count += layer.invalidate_material(material);
        }
        count
    }

    /// Release per-frame state: dynamic elements, builders and instance arrays.
    pub(crate) fn clear_frame(&mut self) {
        self.static_mesh_draw_list.clear_instances();
        self.sprite_draw_list.clear_instances();
        self.dynamic_mesh_elements.clear();
        #[cfg(feature = "editor")]
        {
            self.simple_elements.clear();
            self.gizmo_draw_list.clear_instances();
            self.dynamic_mesh_builders.clear();
        }
        #[cfg(feature = "hit-proxy")]
        for layer in &mut self.hit_proxy_layers {
            layer.clear_frame();
        }
    }
}

/// All depth groups of a scene, indexed by [`DepthGroup`].
#[derive(Debug)]
pub struct SceneDepthGroups {
    groups: [SceneDepthGroup; DepthGroup::COUNT],
}

impl Default for SceneDepthGroups {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneDepthGroups {
    pub fn new() -> Self {
        Self {
            groups: std::array::from_fn(|_| SceneDepthGroup::new()),
        }
    }

    pub fn get(&self, group: DepthGroup) -> &SceneDepthGroup {
        &self.groups[group.index()]
    }

    pub fn get_mut(&mut self, group: DepthGroup) -> &mut SceneDepthGroup {
        &mut self.groups[group.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (DepthGroup, &SceneDepthGroup)> {
        DepthGroup::ALL.into_iter().zip(self.groups.iter())
    }

    pub fn invalidate_material(&mut self, material: ResourceId) -> usize {
        self.groups
            .iter_mut()
            .map(|group| group.invalidate_material(material))
            .sum()
    }

    pub(crate) fn clear_frame(&mut self) {
        for group in &mut self.groups {
            group.clear_frame();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::backend::DummyBackend;
    use crate::config::RhiParameters;
    use crate::device::Rhi;
    use crate::scene::{Material, StaticMesh};
    use crate::shaders::BuiltinShaders;

    #[test]
    fn test_new_group_is_empty() {
        let groups = SceneDepthGroups::new();
        assert!(groups.iter().all(|(_, g)| g.is_empty()));
    }

    #[test]
    fn test_one_item_flips_is_empty() {
        let rhi = Rhi::with_backend(Arc::new(DummyBackend::new()), RhiParameters::default()).unwrap();
        let shaders = BuiltinShaders::new(&rhi).unwrap();
        let material = Material::default_mesh(&rhi, &shaders).into_ref();
        let mesh = StaticMesh::unit_quad(&rhi, &shaders, material).unwrap();

        let mut group = SceneDepthGroup::new();
        let refs = mesh.link_draw_list(&mut group.static_mesh_draw_list, &[]);
        assert!(!group.is_empty());
        for r in refs {
            group.static_mesh_draw_list.remove_item(r);
        }
        assert!(group.is_empty());
    }

    #[cfg(feature = "editor")]
    #[test]
    fn test_clear_frame_drops_simple_elements() {
        use lumen_core::Color;
        use lumen_core::math::Vec3;

        use crate::scene::HitProxyId;

        let mut group = SceneDepthGroup::new();
        group
            .simple_elements
            .add_line(Vec3::zeros(), Vec3::x(), Color::WHITE, HitProxyId::NONE);
        assert!(!group.is_empty());
        group.clear_frame();
        assert!(group.is_empty());
    }

    #[test]
    fn test_depth_groups_are_ordered() {
        assert!(DepthGroup::World < DepthGroup::Translucent);
        assert_eq!(DepthGroup::ALL[DepthGroup::Highlight.index()], DepthGroup::Highlight);
    }
}
