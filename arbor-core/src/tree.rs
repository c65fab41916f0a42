// Tree materialisation and rendering for a session

use crate::error::Result;
use crate::index::StructureIndex;
use crate::model::{ROOT_PARENT, StructureNode};
use serde::Serialize;

/// Tree levels drawn with guide columns; deeper levels are folded into a marker.
pub const MAX_RENDER_DEPTH: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeFormat {
    Text,
    Json,
}

impl TreeFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" => Some(TreeFormat::Text),
            "json" => Some(TreeFormat::Json),
            _ => None,
        }
    }
}

/// One node of a materialised tree, in depth-first order.
///
/// Top-level nodes have depth 0. `last` marks the final child of its parent,
/// which is all the text renderer needs to draw the guide lines.
#[derive(Debug, Clone, Serialize)]
pub struct TreeEntry {
    #[serde(flatten)]
    pub node: StructureNode,
    pub depth: usize,
    #[serde(skip)]
    pub last: bool,
}

/// Every node of the session, starting from the top-level nodes.
pub fn build(index: &StructureIndex, session_id: i64) -> Result<Vec<TreeEntry>> {
    build_from(index, session_id, ROOT_PARENT)
}

/// Walks the subtree below `parent_id` with an explicit stack, so the depth of
/// the site map is bounded by storage rather than by the call stack.
pub fn build_from(index: &StructureIndex, session_id: i64, parent_id: i64) -> Result<Vec<TreeEntry>> {
    let mut entries = Vec::new();
    let mut stack: Vec<(StructureNode, usize, bool)> = Vec::new();

    push_children(&mut stack, index.get_children(session_id, parent_id)?, 0);

    while let Some((node, depth, last)) = stack.pop() {
        let children = index.get_children(session_id, node.id)?;
        push_children(&mut stack, children, depth + 1);
        entries.push(TreeEntry { node, depth, last });
    }

    Ok(entries)
}

// Reversed so the first child is popped first
fn push_children(stack: &mut Vec<(StructureNode, usize, bool)>, children: Vec<StructureNode>, depth: usize) {
    let count = children.len();
    stack.extend(
        children
            .into_iter()
            .enumerate()
            .rev()
            .map(|(i, node)| (node, depth, i + 1 == count)),
    );
}

pub fn render_text(entries: &[TreeEntry]) -> String {
    if entries.is_empty() {
        return "  (empty)\n".to_string();
    }

    let mut result = String::new();
    // guides[d] is the column drawn at level d + 1 for the current branch
    let mut guides: Vec<&str> = Vec::new();

    for entry in entries {
        if entry.depth == 0 {
            guides.clear();
            result.push_str(&format!("{}\n", label(&entry.node)));
            continue;
        }

        guides.truncate(entry.depth - 1);
        let shown = guides.len().min(MAX_RENDER_DEPTH);
        for guide in &guides[..shown] {
            result.push_str(guide);
        }
        if guides.len() > shown {
            result.push_str(&format!("┆ +{} ", guides.len() - shown));
        }

        let prefix = if entry.last { "└── " } else { "├── " };
        result.push_str(&format!("{}{}\n", prefix, label(&entry.node)));
        guides.push(if entry.last { "    " } else { "│   " });
    }
    result
}

fn label(node: &StructureNode) -> String {
    let short = node
        .name
        .rsplit_once('/')
        .filter(|(head, tail)| !tail.is_empty() && !head.ends_with('/'))
        .map(|(_, tail)| tail)
        .unwrap_or(&node.name);

    match node.history_id {
        Some(history) => format!("{} {}  [#{} h{}]", node.method, short, node.id, history),
        None => format!("{} {}  [#{}]", node.method, short, node.id),
    }
}

/// Flat JSON array in depth-first order; `parent_id` and `depth` carry the shape.
pub fn render_json(entries: &[TreeEntry]) -> std::result::Result<String, serde_json::Error> {
    serde_json::to_string_pretty(entries)
}
