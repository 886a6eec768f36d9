//! Graphics error types.

use thiserror::Error;

/// Errors that can occur in the graphics system.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphicsError {
    /// Failed to initialize the device, adapter or a required subsystem.
    #[error("initialization failed: {0}")]
    InitializationFailed(String),
    /// Failed to create a resource.
    #[error("resource creation failed: {0}")]
    ResourceCreationFailed(String),
    /// A requested feature is not supported.
    #[error("feature not supported: {0}")]
    FeatureNotSupported(String),
    /// A primitive type has no vertex-count mapping on this device.
    #[error("unsupported primitive type: {0}")]
    UnsupportedPrimitiveType(String),
    /// An API contract was broken by the caller (double lock, missing shader, ...).
    #[error("contract violation: {0}")]
    ContractViolation(String),
    /// Out of GPU memory.
    #[error("out of GPU memory")]
    OutOfMemory,
    /// The GPU device was lost.
    #[error("GPU device lost")]
    DeviceLost,
    /// An invalid parameter was provided.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
    /// The surface was lost and needs to be recreated.
    #[error("surface lost, needs recreation")]
    SurfaceLost,
    /// The rendering thread exited or panicked while commands were pending.
    #[error("rendering thread disconnected")]
    RenderThreadDisconnected,
}

/// Errors produced while compiling shader source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShaderCompileError {
    #[error("failed to read shader source {path}: {message}")]
    SourceNotFound { path: String, message: String },
    #[error("shader frequency {0} is not supported by the WGSL compiler")]
    UnsupportedFrequency(String),
    #[error("failed to parse shader:\n{0}")]
    Parse(String),
    #[error("shader validation failed:\n{0}")]
    Validation(String),
    #[error("entry point '{name}' for {frequency} stage not found")]
    MissingEntryPoint { name: String, frequency: String },
    #[error("failed to emit shader code: {0}")]
    Emit(String),
}

/// Report a broken API contract.
///
/// Panics in debug builds. In release builds it logs and evaluates to a
/// [`GraphicsError::ContractViolation`] the caller returns, leaving state untouched.
macro_rules! contract_violation {
    ($($arg:tt)*) => {{
        let message = format!($($arg)*);
        log::error!("contract violation: {message}");
        debug_assert!(false, "contract violation: {message}");
        $crate::error::GraphicsError::ContractViolation(message)
    }};
}

pub(crate) use contract_violation;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GraphicsError::OutOfMemory;
        assert_eq!(err.to_string(), "out of GPU memory");

        let err = GraphicsError::InitializationFailed("no GPU found".to_string());
        assert_eq!(err.to_string(), "initialization failed: no GPU found");
    }

    #[test]
    fn test_shader_error_display() {
        let err = ShaderCompileError::MissingEntryPoint {
            name: "main".into(),
            frequency: "vs_5_0".into(),
        };
        assert_eq!(
            err.to_string(),
            "entry point 'main' for vs_5_0 stage not found"
        );
    }

    #[test]
    #[cfg_attr(debug_assertions, should_panic(expected = "contract violation"))]
    fn test_contract_violation_macro() {
        let err = contract_violation!("buffer {} locked twice", 7);
        assert_eq!(
            err,
            GraphicsError::ContractViolation("buffer 7 locked twice".into())
        );
    }
}
