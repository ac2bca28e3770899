use shared_types::{short_hash, Hash};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndexError {
    #[error("block {} already indexed", short_hash(.0))]
    Duplicate(Hash),

    #[error("parent {} of block {} is not indexed", short_hash(.parent), short_hash(.block))]
    UnknownParent { block: Hash, parent: Hash },

    #[error("best block {} missing from the loaded index", short_hash(.0))]
    MissingBest(Hash),
}
