//! 2D texture and render surface resource.

use parking_lot::Mutex;

use crate::backend::GpuTexture;
use crate::error::{GraphicsError, contract_violation};
use crate::types::{LockMode, PixelFormat, TextureCreateFlags, TextureDescriptor};

use super::{LockedData, ResourceId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ActiveTextureLock {
    pub id: u64,
    pub mip: u32,
    pub mode: LockMode,
}

/// A 2D texture. Render targets and viewport surfaces are textures too.
///
/// Created by [`Rhi::create_texture_2d`](crate::Rhi::create_texture_2d).
pub struct Texture2D {
    id: ResourceId,
    descriptor: TextureDescriptor,
    gpu: GpuTexture,
    lock: Mutex<Option<ActiveTextureLock>>,
}

impl Texture2D {
    pub(crate) fn new(id: ResourceId, descriptor: TextureDescriptor, gpu: GpuTexture) -> Self {
        Self {
            id,
            descriptor,
            gpu,
            lock: Mutex::new(None),
        }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn descriptor(&self) -> &TextureDescriptor {
        &self.descriptor
    }

    pub fn width(&self) -> u32 {
        self.descriptor.width
    }

    pub fn height(&self) -> u32 {
        self.descriptor.height
    }

    pub fn size(&self) -> (u32, u32) {
        (self.descriptor.width, self.descriptor.height)
    }

    pub fn format(&self) -> PixelFormat {
        self.descriptor.format
    }

    pub fn flags(&self) -> TextureCreateFlags {
        self.descriptor.flags
    }

    pub fn mip_levels(&self) -> u32 {
        self.descriptor.mip_levels
    }

    pub fn label(&self) -> Option<&str> {
        self.descriptor.label.as_deref()
    }

    /// Tightly packed row pitch of a mip level.
    pub fn row_pitch(&self, mip: u32) -> u32 {
        let (width, _) = self.descriptor.mip_size(mip);
        self.descriptor.format.row_pitch(width)
    }

    pub fn is_locked(&self) -> bool {
        self.lock.lock().is_some()
    }

    pub(crate) fn gpu(&self) -> &GpuTexture {
        &self.gpu
    }

    pub(crate) fn begin_lock(
        &self,
        lock_id: u64,
        mip: u32,
        mode: LockMode,
    ) -> Result<(), GraphicsError> {
        if mip >= self.descriptor.mip_levels {
            return Err(contract_violation!(
                "lock of mip {mip} on texture {} with {} mips",
                self.id,
                self.descriptor.mip_levels
            ));
        }
        if mode.reads() && !self.descriptor.flags.contains(TextureCreateFlags::CPU_READBACK) {
            return Err(contract_violation!(
                "read lock of texture {} created without CPU_READBACK",
                self.id
            ));
        }
        let mut lock = self.lock.lock();
        if let Some(active) = lock.as_ref() {
            return Err(contract_violation!(
                "texture {} locked twice (outstanding lock {})",
                self.id,
                active.id
            ));
        }
        *lock = Some(ActiveTextureLock {
            id: lock_id,
            mip,
            mode,
        });
        Ok(())
    }

    pub(crate) fn end_lock(&self, data: &LockedData) -> Result<ActiveTextureLock, GraphicsError> {
        let mut lock = self.lock.lock();
        match *lock {
            None => Err(contract_violation!(
                "unlock of texture {} without a matching lock",
                self.id
            )),
            Some(active) if active.id != data.lock_id() || data.resource() != self.id => {
                Err(contract_violation!(
                    "unlock of texture {} with data from lock {} on {}",
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

impl std::fmt::Debug for Texture2D {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Texture2D")
            .field("id", &self.id)
            .field("size", &(self.descriptor.width, self.descriptor.height))
            .field("format", &self.descriptor.format)
            .field("label", &self.descriptor.label)
            .finish()
    }
}

static_assertions::assert_impl_all!(Texture2D: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;

    fn readback_texture() -> Texture2D {
        let desc = TextureDescriptor::new_2d(
            4,
            4,
            PixelFormat::A8R8G8B8,
            TextureCreateFlags::RENDER_TARGET | TextureCreateFlags::CPU_READBACK,
        );
        let gpu = GpuTexture::dummy(&desc);
        Texture2D::new(ResourceId(3), desc, gpu)
    }

    #[test]
    fn test_texture_debug() {
        let texture = readback_texture();
        let debug = format!("{texture:?}");
        assert!(debug.contains("Texture2D"));
        assert_eq!(texture.row_pitch(0), 16);
    }

    #[test]
    fn test_texture_lock_cycle() {
        let texture = readback_texture();
        texture.begin_lock(1, 0, LockMode::ReadOnly).unwrap();
        let data = LockedData::new(texture.id(), 1, 0, 16, LockMode::ReadOnly, vec![0; 64]);
        assert_eq!(texture.end_lock(&data).unwrap().mip, 0);
        assert!(!texture.is_locked());
    }

    #[test]
    #[cfg_attr(debug_assertions, should_panic(expected = "without a matching lock"))]
    fn test_unlock_without_lock_is_violation() {
        let texture = readback_texture();
        let data = LockedData::new(texture.id(), 1, 0, 16, LockMode::ReadOnly, vec![0; 64]);
        assert!(texture.end_lock(&data).is_err());
    }
}
