//! GraphLoom Vector — embedding-backed nearest-neighbour memory over node
//! description strings.

pub mod embedder;
pub mod memory;

pub use embedder::{EmbedderBackend, HashEmbedder, RemoteEmbedder};
pub use memory::{SqliteVectorMemory, VectorHit, VectorMemory};
