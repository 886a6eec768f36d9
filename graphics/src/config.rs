//! Device and renderer configuration.

/// Which GPU backend an [`Rhi`](crate::Rhi) should be created on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BackendType {
    /// Use wgpu when compiled in and an adapter is found, else the dummy backend.
    #[default]
    Auto,
    /// In-memory backend with no GPU access.
    Dummy,
    /// wgpu backend (requires the `wgpu-backend` feature).
    Wgpu,
}

/// Parameters for creating an [`Rhi`](crate::Rhi).
///
/// # Example
///
/// ```ignore
/// let params = RhiParameters::new()
///     .with_backend(BackendType::Dummy)
///     .with_editor(true);
/// let rhi = Rhi::new(params)?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RhiParameters {
    /// Backend selection.
    pub backend: BackendType,
    /// Enable API validation layers where the backend supports them.
    pub validation: bool,
    /// Enable debug labels and markers.
    pub debug: bool,
    /// Enable editor-only render paths (highlight pass, gizmos, simple elements).
    pub editor: bool,
    /// Default vsync setting for presents that do not specify one.
    pub vsync: bool,
    /// Device label.
    pub label: String,
}

impl Default for RhiParameters {
    fn default() -> Self {
        Self {
            backend: BackendType::Auto,
            validation: cfg!(debug_assertions),
            debug: cfg!(debug_assertions),
            editor: cfg!(feature = "editor"),
            vsync: true,
            label: "Lumen Device".to_string(),
        }
    }
}

impl RhiParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_backend(mut self, backend: BackendType) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_validation(mut self, enabled: bool) -> Self {
        self.validation = enabled;
        self
    }

    pub fn with_debug(mut self, enabled: bool) -> Self {
        self.debug = enabled;
        self
    }

    pub fn with_editor(mut self, enabled: bool) -> Self {
        self.editor = enabled;
        self
    }

    pub fn with_vsync(mut self, enabled: bool) -> Self {
        self.vsync = enabled;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}

/// Per-renderer switches that do not belong to a single view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RendererSettings {
    /// Run editor passes (highlight) after the world group.
    pub editor_mode: bool,
    /// Allow the deferred light pass to run at all.
    pub enable_lights: bool,
    /// Scale of the unlit albedo when the G-buffer is resolved before lights are added.
    pub ambient_intensity: f32,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            editor_mode: cfg!(feature = "editor"),
            enable_lights: true,
            ambient_intensity: 0.25,
        }
    }
}

impl RendererSettings {
    pub fn with_editor_mode(mut self, enabled: bool) -> Self {
        self.editor_mode = enabled;
        self
    }

    pub fn with_lights(mut self, enabled: bool) -> Self {
        self.enable_lights = enabled;
        self
    }

    pub fn with_ambient_intensity(mut self, intensity: f32) -> Self {
        self.ambient_intensity = intensity;
        self
    }
}
