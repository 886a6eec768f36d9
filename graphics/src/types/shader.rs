//! Shader stage and compiler flag types.

use bitflags::bitflags;

/// Pipeline stage a shader runs at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShaderFrequency {
    Vertex,
    Hull,
    Domain,
    Geometry,
    Pixel,
    Compute,
}

impl ShaderFrequency {
    pub const ALL: [ShaderFrequency; 6] = [
        Self::Vertex,
        Self::Hull,
        Self::Domain,
        Self::Geometry,
        Self::Pixel,
        Self::Compute,
    ];

    /// Shader-model 5 profile name for this stage.
    pub fn profile(self) -> &'static str {
        match self {
            Self::Vertex => "vs_5_0",
            Self::Hull => "hs_5_0",
            Self::Domain => "ds_5_0",
            Self::Geometry => "gs_5_0",
            Self::Pixel => "ps_5_0",
            Self::Compute => "cs_5_0",
        }
    }
}

impl std::fmt::Display for ShaderFrequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.profile())
    }
}

bitflags! {
    /// Flags passed to the shader compiler.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ShaderCompilerFlags: u32 {
        const PREFER_FLOW_CONTROL = 1 << 0;
        const DEBUG = 1 << 1;
        const AVOID_FLOW_CONTROL = 1 << 2;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profiles() {
        let profiles: Vec<_> = ShaderFrequency::ALL.iter().map(|f| f.profile()).collect();
        assert_eq!(
            profiles,
            ["vs_5_0", "hs_5_0", "ds_5_0", "gs_5_0", "ps_5_0", "cs_5_0"]
        );
    }
}
