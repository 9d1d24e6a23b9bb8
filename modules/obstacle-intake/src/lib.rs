//! Report intake: turns heterogeneous field submissions into canonical
//! obstacle reports.
//!
//! `ReportIngestor` drives the flow: geometry resolution, reporter identity
//! resolution, text clamping, photo decoding, then a single store write.

pub mod geometry;
pub mod identity;
pub mod ingest;
pub mod photo;
pub mod submission;

pub use geometry::{decode_geometry, resolve_geometry, GeometryPayload, ResolvedGeometry};
pub use identity::{IdentityClaims, IdentityResolver, IdentitySource, ResolvedIdentity};
pub use ingest::ReportIngestor;
pub use photo::{decode_photo, PhotoError};
pub use submission::{NumberOrText, Submission};
