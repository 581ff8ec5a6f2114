//! Profiling support via Tracy.
//!
//! Profiling is enabled via the `profiling` Cargo feature:
//!
//! ```bash
//! cargo run --example frame_demo --features profiling
//! ```
//!
//! Every executed pass opens a span named after its profiling tag, and the
//! frame scheduler marks frame boundaries. When profiling is disabled (the
//! default), all macros compile to no-ops.

#[cfg(feature = "profiling")]
pub use tracy_client::{self, Client, frame_mark as tracy_frame_mark, span};

/// Create a profiling span for the current scope.
///
/// The name must be a string literal.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_scope {
    ($name:expr) => {
        let _profile_span = $crate::profiling::span!($name);
    };
}

/// Create a profiling span (no-op when profiling disabled).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_scope {
    ($name:expr) => {};
}

/// Create a profiling span with a runtime name, such as a pass profiling tag.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_pass {
    ($name:expr) => {
        let _profile_span = $crate::profiling::Client::running()
            .map(|client| client.span_alloc(Some($name), "", file!(), line!(), 0));
    };
}

/// Create a pass span (no-op when profiling disabled).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_pass {
    ($name:expr) => {
        let _ = &$name;
    };
}

/// Mark the end of a frame for Tracy's frame analysis.
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
