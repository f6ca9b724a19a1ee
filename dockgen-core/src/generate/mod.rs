//! Generation orchestration.
//!
//! `mutex` serializes end-to-end generations per workspace root;
//! `pipeline` wires the substrate together: scan the tree, hand the
//! result to the (black-box) artifact generator, then persist its output
//! through the atomic writer. The classifier/topology/renderer logic
//! itself lives behind the [`pipeline::ArtifactGenerator`] seam and is
//! deliberately not this crate's business.

pub mod mutex;
pub mod pipeline;
