//! # berth-id
//!
//! Typed identifiers and document links for the berth placement engine.
//!
//! ## Design Principles
//!
//! - Every stored document is addressed by a [`DocumentLink`]:
//!   `{collection}/{prefix}_{ulid}`
//! - Typed IDs carry both their prefix and the collection they live in, so a
//!   link can be converted back into the ID it was built from
//! - Parsing is strict; formatting and parsing roundtrip
//!
//! ## Examples
//!
//! - `/resources/group-placements/grp_01HV4Z2WQXKJNM8GPQY6VBKC3D`
//! - `/resources/tags/tag_01HV4Z3MXNKPQR9HSTZ7WCLD4E`
//! - `/resources/computes/cmp_01HV4Z4NYPLTRS0JTUA8XDME5F`

mod error;
mod link;
mod macros;
mod types;

pub use error::IdError;
pub use link::DocumentLink;
pub use types::*;

/// Re-export ulid for consumers that need raw ULID operations
pub use ulid::Ulid;
