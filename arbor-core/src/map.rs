// Site map building on top of the structure index

use crate::error::{IndexError, Result};
use crate::index::StructureIndex;
use crate::model::{ROOT_PARENT, StructureNode};
use tracing::debug;
use url::Url;

/// Method recorded for the host and folder nodes created on the way to a leaf.
pub const FOLDER_METHOD: &str = "GET";

/// A session's view of the index that turns observed requests into nodes.
///
/// `http://example.com:8080/api/users?id=1` becomes three nodes:
///
/// ```text
/// http://example.com:8080            (top level, GET)
/// └── http://example.com:8080/api    (GET)
///     └── http://example.com:8080/api/users   (request method, history id)
/// ```
///
/// Nodes that already exist are reused, so replaying the same request is a
/// no-op.
pub struct SiteMap<'a> {
    index: &'a StructureIndex,
    session_id: i64,
}

/// The origin of a URL as a node name, e.g. `https://example.com:8443`.
pub fn origin_name(url: &Url) -> Result<String> {
    let host = url
        .host_str()
        .ok_or_else(|| IndexError::InvalidUrl(format!("{} has no host", url)))?;

    Ok(match url.port() {
        Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
        None => format!("{}://{}", url.scheme(), host),
    })
}

/// Node names from the origin down to the last path segment, without the
/// query or fragment. Empty segments (`//`, trailing `/`) are dropped.
pub fn node_names(url: &Url) -> Result<Vec<String>> {
    let origin = origin_name(url)?;
    let mut names = vec![origin.clone()];
    let mut current = origin;

    if let Some(segments) = url.path_segments() {
        for segment in segments.filter(|s| !s.is_empty()) {
            current = format!("{}/{}", current, segment);
            names.push(current.clone());
        }
    }

    Ok(names)
}

impl<'a> SiteMap<'a> {
    pub fn new(index: &'a StructureIndex, session_id: i64) -> Self {
        SiteMap { index, session_id }
    }

    pub fn session_id(&self) -> i64 {
        self.session_id
    }

    /// Records a request, creating whatever host and folder nodes lead to it,
    /// and returns the node for the request itself.
    pub fn add_request(
        &self,
        history_id: Option<i32>,
        url: &str,
        method: &str,
    ) -> Result<StructureNode> {
        let parsed =
            Url::parse(url).map_err(|e| IndexError::InvalidUrl(format!("{}: {}", url, e)))?;
        let names = node_names(&parsed)?;
        let method = method.to_ascii_uppercase();
        let last = names.len() - 1;

        let mut parent_id = ROOT_PARENT;
        let mut leaf = None;

        for (depth, name) in names.iter().enumerate() {
            let (node, created) = if depth == last {
                self.index.find_or_insert(
                    self.session_id,
                    parent_id,
                    history_id,
                    name,
                    parsed.as_str(),
                    &method,
                )?
            } else {
                self.index.find_or_insert(
                    self.session_id,
                    parent_id,
                    None,
                    name,
                    name,
                    FOLDER_METHOD,
                )?
            };

            if created {
                debug!("Site map session {}: new node {}", self.session_id, name);
            }
            parent_id = node.id;
            leaf = Some(node);
        }

        leaf.ok_or_else(|| IndexError::InvalidUrl(url.to_string()))
    }
}
