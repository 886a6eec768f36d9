//! Vertex and index buffers with an exclusive lock contract.

use parking_lot::Mutex;

use crate::backend::GpuBuffer;
use crate::error::{GraphicsError, contract_violation};
use crate::types::{BufferDescriptor, BufferUsage, IndexFormat, LockMode};

use super::ResourceId;

/// CPU-side view of a locked buffer or texture range.
///
/// Returned by the `lock_*` calls of the [`Rhi`](crate::Rhi) and handed back
/// to the matching `unlock_*` call, which publishes written bytes.
#[derive(Debug)]
pub struct LockedData {
    resource: ResourceId,
    lock_id: u64,
    offset: u64,
    row_pitch: u32,
    mode: LockMode,
    data: Vec<u8>,
}

impl LockedData {
    pub(crate) fn new(
        resource: ResourceId,
        lock_id: u64,
        offset: u64,
        row_pitch: u32,
        mode: LockMode,
        data: Vec<u8>,
    ) -> Self {
        Self {
            resource,
            lock_id,
            offset,
            row_pitch,
            mode,
            data,
        }
    }

    /// Resource this lock belongs to.
    pub fn resource(&self) -> ResourceId {
        self.resource
    }

    pub(crate) fn lock_id(&self) -> u64 {
        self.lock_id
    }

    /// Byte offset of the locked range inside the resource.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Bytes per row. For buffers this is the locked size.
    pub fn row_pitch(&self) -> u32 {
        self.row_pitch
    }

    pub fn mode(&self) -> LockMode {
        self.mode
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Copy plain-old-data values into the locked range at `byte_offset`.
    ///
    /// Writes past the end of the range are truncated.
    pub fn write_pod<T: bytemuck::Pod>(&mut self, byte_offset: usize, values: &[T]) -> usize {
        let bytes: &[u8] = bytemuck::cast_slice(values);
        let end = (byte_offset + bytes.len()).min(self.data.len());
        if byte_offset >= end {
            return 0;
        }
        let count = end - byte_offset;
        self.data[byte_offset..end].copy_from_slice(&bytes[..count]);
        count
    }

    pub(crate) fn into_data(self) -> Vec<u8> {
        self.data
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ActiveLock {
    pub id: u64,
    pub offset: u64,
    pub size: u64,
    pub mode: LockMode,
}

/// Shared state of vertex and index buffers.
pub(crate) struct BufferCore {
    id: ResourceId,
    descriptor: BufferDescriptor,
    gpu: GpuBuffer,
    lock: Mutex<Option<ActiveLock>>,
}

impl BufferCore {
    fn new(id: ResourceId, descriptor: BufferDescriptor, gpu: GpuBuffer) -> Self {
        Self {
            id,
            descriptor,
            gpu,
            lock: Mutex::new(None),
        }
    }

    pub(crate) fn id(&self) -> ResourceId {
        self.id
    }

    pub(crate) fn gpu(&self) -> &GpuBuffer {
        &self.gpu
    }

    pub(crate) fn size(&self) -> u64 {
        self.descriptor.size
    }

    pub(crate) fn is_locked(&self) -> bool {
        self.lock.lock().is_some()
    }

    /// Start an exclusive lock over `[offset, offset + size)`.
    pub(crate) fn begin_lock(
        &self,
        lock_id: u64,
        offset: u64,
        size: u64,
        mode: LockMode,
    ) -> Result<(), GraphicsError> {
        let end = offset.checked_add(size);
        if size == 0 || end.is_none_or(|end| end > self.descriptor.size) {
            return Err(contract_violation!(
                "lock range {offset}+{size} outside buffer {} of {} bytes",
                self.id,
                self.descriptor.size
            ));
        }
        let mut lock = self.lock.lock();
        if let Some(active) = lock.as_ref() {
            return Err(contract_violation!(
                "buffer {} locked twice (outstanding lock {})",
                self.id,
                active.id
            ));
        }
        *lock = Some(ActiveLock {
            id: lock_id,
            offset,
            size,
            mode,
        });
        Ok(())
    }

    /// Release the lock that produced `data`.
    pub(crate) fn end_lock(&self, data: &LockedData) -> Result<ActiveLock, GraphicsError> {
        let mut lock = self.lock.lock();
        match *lock {
            None => Err(contract_violation!(
                "unlock of buffer {} without a matching lock",
                self.id
            )),
            Some(active) if active.id != data.lock_id() || data.resource() != self.id => {
                Err(contract_violation!(
                    "unlock of buffer {} with data from lock {} on {}",
                    self.id,
                    data.lock_id(),
                    data.resource()
                ))
            }
            Some(active) => {
                *lock = None;
                Ok(active)
            }
        }
    }
}

impl std::fmt::Debug for BufferCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("id", &self.id)
            .field("size", &self.descriptor.size)
            .field("usage", &self.descriptor.usage)
            .field("label", &self.descriptor.label)
            .finish()
    }
}

/// A vertex buffer.
///
/// Created by [`Rhi::create_vertex_buffer`](crate::Rhi::create_vertex_buffer).
#[derive(Debug)]
pub struct VertexBuffer {
    core: BufferCore,
}

impl VertexBuffer {
    pub(crate) fn new(id: ResourceId, descriptor: BufferDescriptor, gpu: GpuBuffer) -> Self {
        Self {
            core: BufferCore::new(id, descriptor, gpu),
        }
    }

    pub fn id(&self) -> ResourceId {
        self.core.id
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        self.core.descriptor.size
    }

    pub fn usage(&self) -> BufferUsage {
        self.core.descriptor.usage
    }

    pub fn label(&self) -> Option<&str> {
        self.core.descriptor.label.as_deref()
    }

    /// Whether a lock is outstanding.
    pub fn is_locked(&self) -> bool {
        self.core.is_locked()
    }

    pub(crate) fn core(&self) -> &BufferCore {
        &self.core
    }

    pub(crate) fn gpu(&self) -> &GpuBuffer {
        &self.core.gpu
    }
}

/// An index buffer with a fixed index stride.
///
/// Created by [`Rhi::create_index_buffer`](crate::Rhi::create_index_buffer).
#[derive(Debug)]
pub struct IndexBuffer {
    core: BufferCore,
    format: IndexFormat,
}

impl IndexBuffer {
    pub(crate) fn new(
        id: ResourceId,
        descriptor: BufferDescriptor,
        format: IndexFormat,
        gpu: GpuBuffer,
    ) -> Self {
        Self {
            core: BufferCore::new(id, descriptor, gpu),
            format,
        }
    }

    pub fn id(&self) -> ResourceId {
        self.core.id
    }

    pub fn size(&self) -> u64 {
        self.core.descriptor.size
    }

    pub fn usage(&self) -> BufferUsage {
        self.core.descriptor.usage
    }

    pub fn label(&self) -> Option<&str> {
        self.core.descriptor.label.as_deref()
    }

    pub fn format(&self) -> IndexFormat {
        self.format
    }

    /// Bytes per index.
    pub fn stride(&self) -> u32 {
        self.format.stride()
    }

    /// Number of whole indices the buffer holds.
    pub fn num_indices(&self) -> u32 {
        (self.core.descriptor.size / self.format.stride() as u64) as u32
    }

    pub fn is_locked(&self) -> bool {
        self.core.is_locked()
    }

    pub(crate) fn core(&self) -> &BufferCore {
        &self.core
    }

    pub(crate) fn gpu(&self) -> &GpuBuffer {
        &self.core.gpu
    }
}

static_assertions::assert_impl_all!(VertexBuffer: Send, Sync);
static_assertions::assert_impl_all!(IndexBuffer: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;

    fn test_buffer(size: u64) -> VertexBuffer {
        VertexBuffer::new(
            ResourceId(1),
            BufferDescriptor::new(size, BufferUsage::VERTEX).with_label("test"),
            GpuBuffer::dummy(size),
        )
    }

    #[test]
    fn test_lock_and_unlock() {
        let buffer = test_buffer(64);
        buffer.core().begin_lock(5, 16, 16, LockMode::WriteDiscard).unwrap();
        assert!(buffer.is_locked());

        let data = LockedData::new(buffer.id(), 5, 16, 16, LockMode::WriteDiscard, vec![0; 16]);
        let active = buffer.core().end_lock(&data).unwrap();
        assert_eq!(active.offset, 16);
        assert_eq!(active.size, 16);
        assert!(!buffer.is_locked());
    }

    #[test]
    #[cfg_attr(debug_assertions, should_panic(expected = "locked twice"))]
    fn test_double_lock_is_violation() {
        let buffer = test_buffer(64);
        buffer.core().begin_lock(1, 0, 64, LockMode::ReadWrite).unwrap();
        let result = buffer.core().begin_lock(2, 0, 64, LockMode::ReadWrite);
        assert!(matches!(result, Err(GraphicsError::ContractViolation(_))));
        assert!(buffer.is_locked());
    }

    #[test]
    #[cfg_attr(debug_assertions, should_panic(expected = "outside buffer"))]
    fn test_lock_out_of_range_is_violation() {
        let buffer = test_buffer(64);
        let result = buffer.core().begin_lock(1, 60, 8, LockMode::ReadWrite);
        assert!(result.is_err());
        assert!(!buffer.is_locked());
    }

    #[test]
    #[cfg_attr(debug_assertions, should_panic(expected = "with data from lock"))]
    fn test_unlock_with_foreign_data_is_violation() {
        let buffer = test_buffer(64);
        buffer.core().begin_lock(1, 0, 64, LockMode::ReadWrite).unwrap();
        let foreign = LockedData::new(buffer.id(), 99, 0, 64, LockMode::ReadWrite, vec![0; 64]);
        assert!(buffer.core().end_lock(&foreign).is_err());
        assert!(buffer.is_locked());
    }

    #[test]
    fn test_write_pod_truncates() {
        let mut data = LockedData::new(ResourceId(1), 1, 0, 8, LockMode::WriteDiscard, vec![0; 8]);
        let written = data.write_pod(4, &[1u32, 2u32]);
        assert_eq!(written, 4);
        assert_eq!(&data.as_slice()[4..8], &1u32.to_ne_bytes());
    }

    #[test]
    fn test_index_buffer_counts() {
        let buffer = IndexBuffer::new(
            ResourceId(2),
            BufferDescriptor::new(12, BufferUsage::INDEX),
            IndexFormat::Uint16,
            GpuBuffer::dummy(12),
        );
        assert_eq!(buffer.stride(), 2);
        assert_eq!(buffer.num_indices(), 6);
    }
}
