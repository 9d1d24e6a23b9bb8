//! Administrator review of obstacle reports: geospatial duplicate detection,
//! the approval state machine with merge-on-approve, and the admin listing.

pub mod dedup;
pub mod locks;
pub mod query;
pub mod workflow;

pub use dedup::{DuplicateDetector, DuplicateMatch};
pub use locks::{ReportLockGuard, ReportLocks};
pub use query::{list_reports, ReportListing, ReportQuery, ReportSort};
pub use workflow::{ApprovalOutcome, ApprovalWorkflow, MergeOutcome};
