//! Journey export: assembles a tree with every node, script and email
//! template it references, classifies trees as custom or OOTB, lists a
//! realm's journeys and summarizes exported documents.

pub mod assembler;
pub mod catalog;
pub mod describer;
pub mod detector;
pub mod lister;
pub mod origin;
pub mod types;

#[cfg(test)]
mod fixtures;

pub use assembler::JourneyAssembler;
pub use catalog::{classify_role, is_ootb, NodeRole, VersionFamily};
pub use describer::describe;
pub use detector::CustomizationDetector;
pub use lister::JourneyLister;
pub use origin::origin_fingerprint;
pub use types::{JourneyDocument, JourneyListing, TreeSummary};
