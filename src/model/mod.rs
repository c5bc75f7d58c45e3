//src/model/mod.rs
pub mod elements;
pub mod embedding;
pub mod resolver;
pub mod structure;

// Re-exports for cleaner imports
pub use embedding::{EmbeddingStore, Partition};
pub use resolver::{PartitionLayout, ResolvedPoint, Resolver};
pub use structure::{Atom, Structure};
