use std::path::PathBuf;

use thiserror::Error;

use crate::engine::node::NodeId;

#[derive(Debug, Error)]
pub enum VaeError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read archive {path}: {message}")]
    Archive { path: PathBuf, message: String },

    #[error("archive is missing array `{key}`")]
    MissingArray { key: String },

    #[error("array `{key}` has rows of {len} pixels, which is not a square image")]
    NotSquare { key: String, len: usize },

    #[error("array `{key}` has rows of {found} pixels, expected {expected}")]
    PixelCountMismatch {
        key: String,
        expected: usize,
        found: usize,
    },

    #[error("array `{key}` has {available} images, {requested} requested")]
    NotEnoughImages {
        key: String,
        requested: usize,
        available: usize,
    },

    #[error("shape error: {0}")]
    Shape(String),

    #[error("image error on {path}: {message}")]
    Image { path: PathBuf, message: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to record metrics: {0}")]
    Metrics(String),

    #[error("input node {0} was not fed")]
    MissingFeed(NodeId),

    #[error("feed for node {node} has shape {found:?}, expected {expected:?}")]
    FeedShape {
        node: NodeId,
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    #[error("node {0} is not an input and cannot be fed")]
    NotAnInput(NodeId),

    #[error("graph error: {0}")]
    Graph(String),
}

pub type Result<T> = std::result::Result<T, VaeError>;

impl VaeError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        VaeError::Io {
            path: path.into(),
            source,
        }
    }
}
