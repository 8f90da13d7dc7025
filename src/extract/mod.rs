//! Item extraction
//!
//! This module turns fetched responses into raw items:
//! - Compiling item specs (selectors, regexes, normalize ops) once per config
//! - Evaluating field candidates against documents or container nodes
//! - Discovering follow-up links through explicit link rules

mod candidate;
mod extractor;
mod links;
mod spec;

pub use candidate::{Candidate, CssCandidate, ExtractionMiss, Mode, Scope, Target};
pub use extractor::{Extraction, Extractor};
pub use links::{discover, resolve_link, LinkRule};
pub use spec::{compile_items, FieldSource, FieldSpec, ItemSpec, ItemSpecs, SourceTag};
