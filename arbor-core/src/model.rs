use serde::{Deserialize, Serialize};

/// Parent id of every top-level node. Never a valid node id.
pub const ROOT_PARENT: i64 = 0;

pub const MAX_NAME_LEN: usize = 8192;
pub const MAX_URL_LEN: usize = 8192;
pub const MAX_METHOD_LEN: usize = 10;

/// One observed URL + HTTP method pair in a session's site map.
///
/// Nodes are immutable once stored. The only way a node changes is by being
/// deleted, either on its own (`delete_leaf`) or with its descendants
/// (`delete_subtree`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureNode {
    pub id: i64,
    pub session_id: i64,
    pub parent_id: i64,
    pub history_id: Option<i32>,
    pub name: String,
    pub name_hash: i64,
    pub url: String,
    pub method: String,
}

impl StructureNode {
    pub fn is_top_level(&self) -> bool {
        self.parent_id == ROOT_PARENT
    }
}
