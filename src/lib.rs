// Wirebind - Typed HTTP API clients from declarative operation definitions
//
// This library renders requests from per-field wire bindings, classifies
// responses into typed outcomes, retries by failure category and pages
// through list endpoints lazily.

// Re-export the runtime
pub use wirebind_client::*;

// Re-export optional crates
#[cfg(feature = "testing")]
pub use wirebind_testing;

// Prelude for common imports
pub mod prelude {
    pub use wirebind_client::prelude::*;
}
