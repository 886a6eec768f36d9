//! Instanced mesh draw lists.
//!
//! A [`MeshDrawList`] groups registered mesh batches by drawing policy
//! identity (vertex factory, material). Every link owns the batches
//! registered under it; primitives append one [`InstanceData`] per frame to
//! each batch of their link, and [`MeshDrawList::draw`] issues one instanced
//! draw per batch element covering all accumulated instances.

use std::collections::HashMap;

use lumen_core::profile_scope;
use slotmap::{SlotMap, new_key_type};

use crate::context::DeviceContext;
use crate::device::Rhi;
use crate::error::GraphicsError;
use crate::resources::{BoundShaderStateRef, ResourceId, VertexBufferRef};
use crate::types::{BufferDescriptor, BufferUsage, LockMode};

use super::drawing_policy::{DrawingPolicy, DrawingPolicyKey};
use super::mesh::{MeshBatch, MeshBatchKey};
use super::vertex_factory::{INSTANCE_STREAM, InstanceData, instance_stride};
use super::view::SceneView;

new_key_type! {
    /// Key of a link inside one [`MeshDrawList`].
    pub struct DrawingPolicyLinkId;
    /// Key of a registered batch inside one link.
    pub struct MeshBatchId;
}

/// Handle returned by [`MeshDrawList::add_item`], held until the item detaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DrawingPolicyLinkRef {
    link: DrawingPolicyLinkId,
    batch: MeshBatchId,
}

impl DrawingPolicyLinkRef {
    pub fn link(&self) -> DrawingPolicyLinkId {
        self.link
    }
}

#[derive(Debug)]
struct RegisteredBatch {
    batch: MeshBatch,
    key: MeshBatchKey,
    registrations: u32,
    instances: Vec<InstanceData>,
}

/// Batches sharing one drawing policy.
#[derive(Debug)]
struct DrawingPolicyLink<P> {
    policy: P,
    batches: SlotMap<MeshBatchId, RegisteredBatch>,
    batch_index: HashMap<MeshBatchKey, MeshBatchId>,
    registrations: u32,
    bound_shader_state: Option<BoundShaderStateRef>,
    dirty: bool,
}

impl<P: DrawingPolicy> DrawingPolicyLink<P> {
    fn new(policy: P) -> Self {
        Self {
            policy,
            batches: SlotMap::with_key(),
            batch_index: HashMap::new(),
            registrations: 0,
            bound_shader_state: None,
            dirty: false,
        }
    }

    fn num_instances(&self) -> usize {
        self.batches.values().map(|b| b.instances.len()).sum()
    }
}

/// Draw list of mesh batches grouped by drawing policy.
#[derive(Debug)]
pub struct MeshDrawList<P: DrawingPolicy> {
    label: &'static str,
    links: SlotMap<DrawingPolicyLinkId, DrawingPolicyLink<P>>,
    index: HashMap<DrawingPolicyKey, DrawingPolicyLinkId>,
    instance_buffer: Option<VertexBufferRef>,
}

impl<P: DrawingPolicy> MeshDrawList<P> {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            links: SlotMap::with_key(),
            index: HashMap::new(),
            instance_buffer: None,
        }
    }

    /// Number of links.
    pub fn num_links(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Registration count of the link `link_ref` belongs to.
    pub fn link_registrations(&self, link_ref: DrawingPolicyLinkRef) -> Option<u32> {
        self.links.get(link_ref.link).map(|l| l.registrations)
    }

    /// Instances accumulated this frame on the batch of `link_ref`.
    pub fn num_instances(&self, link_ref: DrawingPolicyLinkRef) -> Option<usize> {
        self.links
            .get(link_ref.link)?
            .batches
            .get(link_ref.batch)
            .map(|b| b.instances.len())
    }

    pub fn total_instances(&self) -> usize {
        self.links.values().map(DrawingPolicyLink::num_instances).sum()
    }

    /// Link currently registered for a policy identity.
    pub fn find_link(&self, key: &DrawingPolicyKey) -> Option<DrawingPolicyLinkId> {
        self.index.get(key).copied()
    }

    pub fn contains(&self, link_ref: DrawingPolicyLinkRef) -> bool {
        self.links
            .get(link_ref.link)
            .is_some_and(|l| l.batches.contains_key(link_ref.batch))
    }

    /// True when the link was invalidated and holders must relink.
    pub fn is_link_dirty(&self, link_ref: DrawingPolicyLinkRef) -> bool {
        self.links.get(link_ref.link).is_some_and(|l| l.dirty)
    }

    /// Find or create the link for `policy` and register `batch` under it.
    pub fn add_item(&mut self, policy: P, batch: MeshBatch) -> DrawingPolicyLinkRef {
        let key = policy.key();
        let link_id = match self.index.get(&key) {
            Some(&id) => id,
            None => {
                let id = self.links.insert(DrawingPolicyLink::new(policy));
                self.index.insert(key, id);
                log::trace!("{}: created link {:?} for {:?}", self.label, id, key);
                id
            }
        };
        let link = &mut self.links[link_id];
        link.registrations += 1;

        let batch_key = batch.key();
        let batch_id = match link.batch_index.get(&batch_key) {
            Some(&id) => id,
            None => {
                let id = link.batches.insert(RegisteredBatch {
                    batch,
                    key: batch_key.clone(),
                    registrations: 0,
                    instances: Vec::new(),
                });
                link.batch_index.insert(batch_key, id);
                id
            }
        };
        link.batches[batch_id].registrations += 1;

        DrawingPolicyLinkRef {
            link: link_id,
            batch: batch_id,
        }
    }

    /// Drop one registration; links and batches go away when their count reaches zero.
    ///
    /// Returns `false` for a stale reference.
    pub fn remove_item(&mut self, link_ref: DrawingPolicyLinkRef) -> bool {
        let Some(link) = self.links.get_mut(link_ref.link) else {
            log::warn!("{}: remove of unknown link {:?}", self.label, link_ref.link);
            return false;
        };
        let Some(batch) = link.batches.get_mut(link_ref.batch) else {
            log::warn!("{}: remove of unknown batch {:?}", self.label, link_ref.batch);
            return false;
        };

        batch.registrations -= 1;
        if batch.registrations == 0 {
            let key = batch.key.clone();
            link.batch_index.remove(&key);
            link.batches.remove(link_ref.batch);
        }

        link.registrations -= 1;
        if link.registrations == 0 {
            let key = link.policy.key();
            if self.index.get(&key) == Some(&link_ref.link) {
                self.index.remove(&key);
            }
            self.links.remove(link_ref.link);
            log::trace!("{}: removed link {:?}", self.label, link_ref.link);
        }
        true
    }

    /// Append one instance to the batch of `link_ref`.
    pub fn add_instance(&mut self, link_ref: DrawingPolicyLinkRef, instance: InstanceData) -> bool {
        match self
            .links
            .get_mut(link_ref.link)
            .and_then(|l| l.batches.get_mut(link_ref.batch))
        {
            Some(batch) => {
                batch.instances.push(instance);
                true
            }
            None => false,
        }
    }

    /// Mark every link using `material` dirty so its holders relink.
    ///
    /// Dirty links stop accepting new registrations and drain as holders move away.
    pub fn invalidate_material(&mut self, material: ResourceId) -> usize {
        let mut count = 0;
        for (id, link) in self.links.iter_mut() {
            if link.policy.material().id() == material && !link.dirty {
                link.dirty = true;
                link.bound_shader_state = None;
                let key = link.policy.key();
                if self.index.get(&key) == Some(&id) {
                    self.index.remove(&key);
                }
                count += 1;
            }
        }
        count
    }

    pub fn clear_instances(&mut self) {
        for link in self.links.values_mut() {
            for batch in link.batches.values_mut() {
                batch.instances.clear();
            }
        }
    }

    /// Remove every link, as done for per-frame lists.
    pub fn clear(&mut self) {
        self.links.clear();
        self.index.clear();
    }

    fn upload_instances(
        &mut self,
        rhi: &Rhi,
        ctx: &mut DeviceContext,
        total: usize,
    ) -> Result<VertexBufferRef, GraphicsError> {
        let stride = instance_stride() as u64;
        let needed = total as u64 * stride;
        let buffer = match &self.instance_buffer {
            Some(buffer) if buffer.size() >= needed => buffer.clone(),
            _ => {
                let capacity = (total.max(64).next_power_of_two()) as u64 * stride;
                log::debug!(
                    "{}: growing instance buffer to {} bytes",
                    self.label,
                    capacity
                );
                let buffer = rhi.create_vertex_buffer(
                    BufferDescriptor::new(capacity, BufferUsage::DYNAMIC)
                        .with_label(format!("{} instances", self.label)),
                    None,
                )?;
                self.instance_buffer = Some(buffer.clone());
                buffer
            }
        };

        let mut locked = rhi.lock_vertex_buffer(ctx, &buffer, 0, needed, LockMode::WriteDiscard)?;
        let mut offset = 0;
        for link in self.links.values() {
            for batch in link.batches.values() {
                offset += locked.write_pod(offset, &batch.instances);
            }
        }
        rhi.unlock_vertex_buffer(ctx, &buffer, locked)?;
        Ok(buffer)
    }

    /// Draw every batch with instances, then clear the instance arrays.
    ///
    /// Returns the number of draw calls issued.
    pub fn draw(
        &mut self,
        rhi: &Rhi,
        ctx: &mut DeviceContext,
        view: &SceneView,
    ) -> Result<u32, GraphicsError> {
        profile_scope!("MeshDrawList::draw");
        let total = self.total_instances();
        if total == 0 {
            return Ok(0);
        }
        let result = self.draw_instances(rhi, ctx, view, total);
        self.clear_instances();
        result
    }

    fn draw_instances(
        &mut self,
        rhi: &Rhi,
        ctx: &mut DeviceContext,
        view: &SceneView,
        total: usize,
    ) -> Result<u32, GraphicsError> {
        let buffer = self.upload_instances(rhi, ctx, total)?;
        let stride = instance_stride();

        let mut draws = 0;
        let mut first_instance = 0u64;
        for link in self.links.values_mut() {
            let link_instances = link.num_instances();
            if link_instances == 0 {
                continue;
            }

            let bound_shader_state = match &link.bound_shader_state {
                Some(state) => state.clone(),
                None => {
                    let state = link.policy.create_bound_shader_state(rhi)?;
                    link.bound_shader_state = Some(state.clone());
                    state
                }
            };
            ctx.set_bound_shader_state(&bound_shader_state);
            link.policy.vertex_factory().set_streams(ctx)?;
            link.policy.set_render_state(rhi, ctx, view)?;

            for batch in link.batches.values() {
                let num_instances = batch.instances.len() as u32;
                if num_instances == 0 {
                    continue;
                }
                ctx.set_stream_source(
                    INSTANCE_STREAM,
                    Some(&buffer),
                    first_instance * stride as u64,
                    stride,
                )?;
                for element in &batch.batch.elements {
                    rhi.draw_indexed_primitive(
                        ctx,
                        &element.index_buffer,
                        batch.batch.primitive_type,
                        element.base_vertex_index,
                        element.first_index,
                        element.num_primitives,
                        num_instances,
                    )?;
                    draws += 1;
                }
                first_instance += num_instances as u64;
            }
        }

        log::trace!(
            "{}: {} draws for {} instances",
            self.label,
            draws,
            total
        );
        Ok(draws)
    }
}
