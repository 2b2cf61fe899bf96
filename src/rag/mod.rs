//! Evidence preparation for retrieval
//!
//! # Module Structure
//!
//! - [`rag::chunker`](crate::rag::chunker) - Overlapping word windows over scraped pages
//! - [`rag::embeddings`](crate::rag::embeddings) - Embedding services (HTTP, fastembed)
//!
//! # Flow
//!
//! 1. **Chunking** - Each scraped page is split into 1,000-word windows with 200 words of overlap
//! 2. **Embedding** - Windows are embedded in batches
//! 3. **Storage** - Vectors and chunk metadata go to the evidence store (see [`crate::db::evidence`])
//! 4. **Retrieval** - Queries are embedded and matched by cosine similarity
//!
//! # Example
//!
//! ```ignore
//! use research_loop::rag::{chunker::TextChunker, embeddings::{Embedder, HttpEmbedder}};
//!
//! let chunker = TextChunker::new(1000, 200, 50);
//! let embedder = HttpEmbedder::new("http://localhost:11434/v1", "nomic-embed-text", None, 32, timeout)?;
//!
//! let windows = chunker.chunk(&page.content);
//! let texts: Vec<String> = windows.into_iter().map(|c| c.text).collect();
//! let vectors = embedder.embed(&texts).await?;
//! ```

pub mod chunker;
pub mod embeddings;

pub use chunker::{Chunk, TextChunker};
pub use embeddings::{Embedder, HttpEmbedder};
