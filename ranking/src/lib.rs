//! # Resume Ranking
//!
//! Semantic search over stored resumes:
//!
//! - **Ranking Engine**: orders documents by cosine similarity to a query,
//!   reusing cached vectors and batch-encoding the rest
//! - **Search Service**: ties the engine to a document store, writes new
//!   vectors back, and ingests uploads
//! - **Configuration**: environment-driven settings read once at startup
//!
//! ## Usage
//!
//! ```rust,ignore
//! use resume_ranking::{MatchConfig, SearchService};
//!
//! let service = SearchService::open(MatchConfig::from_env()?).await?;
//! let report = service.search("distributed systems backend engineer", Some(10)).await?;
//! for hit in &report.hits {
//!     println!("{:.3} {}", hit.score, hit.filename);
//! }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod service;

pub use config::{DEFAULT_MAX_UPLOAD_BYTES, MatchConfig};
pub use engine::{CacheUpdate, DegradedEncoding, Match, Ranking, RankingEngine};
pub use error::{RankingError, Result};
pub use service::{SearchHit, SearchReport, SearchService};
