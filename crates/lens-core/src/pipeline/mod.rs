//! Request pipeline stages.
//!
//! - **validate**: size and content-type checks before any model runs
//! - **decode**: one full decode per request, shared by all adapters
//! - **assemble**: fold outcomes and enrichment into a response
//! - **cache**: opt-in TTL cache for composite analyses
//! - **hash**: BLAKE3 content hashes (cache keys, model verification)
//! - **discovery**: find image files for the CLI
//! - **analyzer**: orchestrates the stages above

pub mod analyzer;
pub mod assemble;
pub mod cache;
pub mod decode;
pub mod discovery;
pub mod hash;
pub mod validate;

pub use analyzer::{AnalyzeOptions, Analyzer};
pub use assemble::assemble;
pub use cache::ResponseCache;
pub use decode::{header_dimensions, DecodeError, DecodedImage, ImageDecoder};
pub use discovery::{discover, DiscoveredFile};
pub use hash::{content_hash, file_hash};
pub use validate::Validator;
