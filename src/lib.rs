pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod hamming;
pub mod hash;
pub mod indexer;
pub mod matcher;
pub mod store;
pub mod utils;

pub use config::Opts;
pub use error::{Error, Result};
pub use hash::{Fingerprint, HashKind};
pub use indexer::{CancelToken, IndexOptions, IndexReport};
pub use matcher::{MatchResult, find_similar, find_similar_image};
pub use store::FingerprintDb;
