//! Persistent stores, one JSON file each under the working directory.
//!
//! ```text
//! {working_dir}/
//! ├── full_docs.json     # doc-<hash>   -> DocumentRecord
//! ├── text_chunks.json   # chunk-<hash> -> ChunkRecord
//! ├── rephrase.json      # description  -> [(variant, label)]
//! ├── qa.json            # <hash>       -> QaRecord
//! └── graph.json         # nodes + edges
//! ```
//!
//! Stores hold their contents in memory and write only on `flush`.

pub mod graph;
pub mod kv;

use sha2::{Digest, Sha256};

pub use graph::GraphStore;
pub use kv::JsonKvStore;

/// Hex SHA-256 of `content`, prefixed with `prefix` (`"doc-"`, `"chunk-"`, or empty).
pub fn compute_content_hash(content: &str, prefix: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{prefix}{}", hex::encode(hasher.finalize()))
}
