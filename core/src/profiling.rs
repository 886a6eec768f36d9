//! Profiling hooks backed by the Tracy profiler.
//!
//! All macros compile to nothing unless the `profiling` feature is enabled:
//!
//! ```toml
//! [dependencies]
//! lumen-core = { version = "0.1", features = ["profiling"] }
//! ```
//!
//! ```ignore
//! use lumen_core::{frame_mark, profile_function, profile_scope};
//!
//! fn render_frame() {
//!     profile_function!();
//!     {
//!         profile_scope!("draw_static_meshes");
//!     }
//!     frame_mark!();
//! }
//! ```

#[cfg(feature = "profiling")]
pub use tracy_client::{frame_mark as tracy_frame_mark, plot as tracy_plot, span};

/// Mark the end of a frame.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! frame_mark {
    () => {
        $crate::profiling::tracy_frame_mark()
    };
}

/// Mark the end of a frame (no-op when profiling disabled).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! frame_mark {
    () => {};
}

/// Open a named span that closes at the end of the enclosing scope.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_scope {
    ($name:expr) => {
        let _profile_span = $crate::profiling::span!($name);
    };
}

/// Open a named span (no-op when profiling disabled).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_scope {
    ($name:expr) => {};
}

/// Open a span named after the enclosing function.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_function {
    () => {
        let _profile_span = $crate::profiling::span!();
    };
}

/// Open a function span (no-op when profiling disabled).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_function {
    () => {};
}

/// Plot a value over time, e.g. draw calls per frame.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_plot {
    ($name:expr, $value:expr) => {
        $crate::profiling::tracy_plot!($name, $value as f64)
    };
}

/// Plot a value (no-op when profiling disabled).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_plot {
    ($name:expr, $value:expr) => {
        let _ = $value;
    };
}

#[cfg(test)]
mod tests {
    #[test]
    fn macros_expand_without_profiler() {
        profile_function!();
        profile_scope!("scope");
        profile_plot!("value", 3u32);
        frame_mark!();
    }
}
