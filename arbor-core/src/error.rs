use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Node already exists in session {session_id}: {method} {name}")]
    DuplicateNode {
        session_id: i64,
        name: String,
        method: String,
    },

    #[error("Node {node_id} in session {session_id} still has {children} child node(s)")]
    HasChildren {
        session_id: i64,
        node_id: i64,
        children: u64,
    },

    #[error("Invalid node: {0}")]
    InvalidNode(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Connection lock poisoned")]
    Poisoned,
}

pub type Result<T> = std::result::Result<T, IndexError>;
