//! Vector index and nearest-neighbor retrieval

mod index;

pub use index::VectorIndex;
