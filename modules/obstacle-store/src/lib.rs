//! Persistence collaborators for obstacle reports and reporter identities.
//!
//! The intake and review crates only see the traits. `memory` backs tests and
//! local runs; `postgres` is the production adapter.

pub mod memory;
pub mod postgres;
pub mod traits;

pub use memory::{MemoryIdentityStore, MemoryReportStore};
pub use postgres::{PgIdentityStore, PgReportStore};
pub use traits::{is_allowed_overwrite, IdentityStore, ReportStore, StaleReport};
