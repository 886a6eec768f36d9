//! Buffer types and descriptors.

use bitflags::bitflags;

bitflags! {
    /// Usage flags for vertex and index buffers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        /// Contents are written once at creation.
        const STATIC = 1 << 0;
        /// Contents are rewritten often through write-discard locks.
        const DYNAMIC = 1 << 1;
        /// Buffer can be bound as a vertex stream.
        const VERTEX = 1 << 2;
        /// Buffer can be bound as an index buffer.
        const INDEX = 1 << 3;
        /// Contents can be read back through a read lock.
        const READBACK = 1 << 4;
    }
}

impl Default for BufferUsage {
    fn default() -> Self {
        Self::STATIC
    }
}

/// Descriptor for creating a buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct BufferDescriptor {
    /// Debug label for the buffer.
    pub label: Option<String>,
    /// Size in bytes.
    pub size: u64,
    /// Usage flags.
    pub usage: BufferUsage,
}

impl BufferDescriptor {
    pub fn new(size: u64, usage: BufferUsage) -> Self {
        Self {
            label: None,
            size,
            usage,
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Width of the elements of an index buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IndexFormat {
    #[default]
    Uint16,
    Uint32,
}

impl IndexFormat {
    /// Size of one index in bytes.
    pub fn stride(self) -> u32 {
        match self {
            Self::Uint16 => 2,
            Self::Uint32 => 4,
        }
    }
}

/// Access requested by a buffer or texture lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockMode {
    /// Read back current contents; the pending command list is flushed first.
    ReadOnly,
    /// Modify current contents; the returned bytes are pre-filled.
    ReadWrite,
    /// Overwrite the locked range; previous contents are discarded.
    WriteDiscard,
}

impl LockMode {
    pub fn reads(self) -> bool {
        matches!(self, Self::ReadOnly | Self::ReadWrite)
    }

    pub fn writes(self) -> bool {
        matches!(self, Self::ReadWrite | Self::WriteDiscard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_stride() {
        assert_eq!(IndexFormat::Uint16.stride(), 2);
        assert_eq!(IndexFormat::Uint32.stride(), 4);
    }

    #[test]
    fn test_lock_mode_access() {
        assert!(LockMode::ReadOnly.reads());
        assert!(!LockMode::ReadOnly.writes());
        assert!(LockMode::WriteDiscard.writes());
        assert!(!LockMode::WriteDiscard.reads());
    }
}
