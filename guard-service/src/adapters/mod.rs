//! Concrete collaborator adapters behind the guard's traits.

pub mod audit;
pub mod memory;
pub mod rate_limit;

pub use audit::TracingAuditSink;
pub use memory::{InMemoryResultStore, InMemorySessionStore, MutationError, ResultPatch};
pub use rate_limit::SlidingWindowRateLimiter;
