// Tests for site map building and tree rendering

use arbor_core::error::IndexError;
use arbor_core::map::{FOLDER_METHOD, SiteMap, node_names, origin_name};
use arbor_core::model::ROOT_PARENT;
use arbor_core::tree::{self, MAX_RENDER_DEPTH, TreeFormat};
use arbor_core::StructureIndex;
use url::Url;

fn create_test_index() -> StructureIndex {
    StructureIndex::open_in_memory().unwrap()
}

// ============================================================================
// Name Derivation Tests
// ============================================================================

#[test]
fn test_origin_name() {
    let url = Url::parse("https://example.com/api").unwrap();
    assert_eq!(origin_name(&url).unwrap(), "https://example.com");

    let url = Url::parse("http://example.com:8080/").unwrap();
    assert_eq!(origin_name(&url).unwrap(), "http://example.com:8080");

    // Default port is not part of the name
    let url = Url::parse("https://example.com:443/").unwrap();
    assert_eq!(origin_name(&url).unwrap(), "https://example.com");
}

#[test]
fn test_origin_name_requires_host() {
    let url = Url::parse("mailto:someone@example.com").unwrap();
    assert!(matches!(origin_name(&url), Err(IndexError::InvalidUrl(_))));
}

#[test]
fn test_node_names() {
    let url = Url::parse("http://a.test/api//users/?id=1#top").unwrap();
    assert_eq!(
        node_names(&url).unwrap(),
        vec![
            "http://a.test".to_string(),
            "http://a.test/api".to_string(),
            "http://a.test/api/users".to_string(),
        ]
    );

    let url = Url::parse("http://a.test/").unwrap();
    assert_eq!(node_names(&url).unwrap(), vec!["http://a.test".to_string()]);
}

// ============================================================================
// SiteMap Tests
// ============================================================================

#[test]
fn test_add_request_builds_path() {
    let index = create_test_index();
    let map = SiteMap::new(&index, 1);

    let leaf = map
        .add_request(Some(17), "http://a.test/api/users?id=1", "post")
        .unwrap();

    assert_eq!(leaf.method, "POST");
    assert_eq!(leaf.history_id, Some(17));
    assert_eq!(leaf.name, "http://a.test/api/users");
    assert_eq!(leaf.url, "http://a.test/api/users?id=1");

    let chain = index.ancestors(1, leaf.id).unwrap();
    assert_eq!(chain.len(), 3);
    assert_eq!(chain[1].name, "http://a.test/api");
    assert_eq!(chain[1].method, FOLDER_METHOD);
    assert_eq!(chain[1].history_id, None);
    assert_eq!(chain[2].name, "http://a.test");
    assert_eq!(chain[2].parent_id, ROOT_PARENT);
}

#[test]
fn test_add_request_reuses_nodes() {
    let index = create_test_index();
    let map = SiteMap::new(&index, 1);

    let first = map.add_request(Some(1), "http://a.test/api/users", "GET").unwrap();
    let again = map.add_request(Some(2), "http://a.test/api/users", "GET").unwrap();
    let sibling = map.add_request(Some(3), "http://a.test/api/orders", "GET").unwrap();

    assert_eq!(first, again);
    assert_eq!(first.parent_id, sibling.parent_id);
    assert_eq!(index.session_node_count(1).unwrap(), 4);
    assert_eq!(index.get_child_count(1, first.parent_id).unwrap(), 2);
}

#[test]
fn test_add_request_method_is_part_of_key() {
    let index = create_test_index();
    let map = SiteMap::new(&index, 1);

    let get = map.add_request(Some(1), "http://a.test/login", "GET").unwrap();
    let post = map.add_request(Some(2), "http://a.test/login", "POST").unwrap();

    assert_ne!(get.id, post.id);
    assert_eq!(get.parent_id, post.parent_id);
}

#[test]
fn test_add_request_origin_only() {
    let index = create_test_index();
    let map = SiteMap::new(&index, 3);

    let leaf = map.add_request(Some(9), "https://a.test/", "GET").unwrap();

    assert_eq!(leaf.name, "https://a.test");
    assert_eq!(leaf.parent_id, ROOT_PARENT);
    assert_eq!(leaf.history_id, Some(9));
    assert_eq!(map.session_id(), 3);
}

#[test]
fn test_add_request_invalid_url() {
    let index = create_test_index();
    let map = SiteMap::new(&index, 1);

    let result = map.add_request(None, "not a url", "GET");
    assert!(matches!(result, Err(IndexError::InvalidUrl(_))));
    assert_eq!(index.session_node_count(1).unwrap(), 0);
}

// ============================================================================
// Tree Tests
// ============================================================================

#[test]
fn test_tree_format_from_str() {
    assert_eq!(TreeFormat::from_str("text"), Some(TreeFormat::Text));
    assert_eq!(TreeFormat::from_str("JSON"), Some(TreeFormat::Json));
    assert_eq!(TreeFormat::from_str("csv"), None);
}

#[test]
fn test_tree_build() {
    let index = create_test_index();
    let map = SiteMap::new(&index, 1);

    map.add_request(None, "http://a.test/api/users", "GET").unwrap();
    map.add_request(None, "http://a.test/login", "GET").unwrap();
    map.add_request(None, "http://b.test/", "GET").unwrap();

    let entries = tree::build(&index, 1).unwrap();
    let names: Vec<(&str, usize)> = entries
        .iter()
        .map(|e| (e.node.name.as_str(), e.depth))
        .collect();
    assert_eq!(
        names,
        vec![
            ("http://a.test", 0),
            ("http://a.test/api", 1),
            ("http://a.test/api/users", 2),
            ("http://a.test/login", 1),
            ("http://b.test", 0),
        ]
    );
    assert!(!entries[1].last);
    assert!(entries[2].last);
    assert!(entries[3].last);

    assert!(tree::build(&index, 2).unwrap().is_empty());
}

#[test]
fn test_render_text() {
    let index = create_test_index();
    let map = SiteMap::new(&index, 1);

    map.add_request(None, "http://a.test/api/users", "GET").unwrap();
    map.add_request(Some(4), "http://a.test/login", "POST").unwrap();

    let text = tree::render_text(&tree::build(&index, 1).unwrap());
    let lines: Vec<&str> = text.lines().collect();

    assert_eq!(lines.len(), 4);
    assert!(lines[0].starts_with("GET http://a.test"));
    assert!(lines[1].starts_with("├── GET api"));
    assert!(lines[2].starts_with("│   └── GET users"));
    assert!(lines[3].starts_with("└── POST login"));
    assert!(lines[3].ends_with("h4]"));
}

#[test]
fn test_render_text_empty() {
    assert_eq!(tree::render_text(&[]), "  (empty)\n");
}

#[test]
fn test_render_json() {
    let index = create_test_index();
    let map = SiteMap::new(&index, 1);

    map.add_request(Some(2), "http://a.test/api", "GET").unwrap();

    let json = tree::render_json(&tree::build(&index, 1).unwrap()).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();

    assert_eq!(value[0]["name"], "http://a.test");
    assert_eq!(value[0]["depth"], 0);
    assert_eq!(value[1]["name"], "http://a.test/api");
    assert_eq!(value[1]["parent_id"], value[0]["id"]);
    assert_eq!(value[1]["history_id"], 2);
    assert_eq!(value[1]["depth"], 1);
    assert!(value[1].get("last").is_none());
}

#[test]
fn test_deep_chain_builds_and_renders() {
    const DEPTH: usize = 2100;
    let index = create_test_index();
    let map = SiteMap::new(&index, 1);

    let url = format!("http://a.test/{}", "x/".repeat(DEPTH));
    let leaf = map.add_request(None, &url, "GET").unwrap();

    let entries = tree::build(&index, 1).unwrap();
    assert_eq!(entries.len(), DEPTH + 1);
    assert_eq!(entries[DEPTH].depth, DEPTH);
    assert_eq!(entries[DEPTH].node.id, leaf.id);

    let text = tree::render_text(&entries);
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), DEPTH + 1);
    assert!(lines[DEPTH].contains(&format!("+{} └── GET x", DEPTH - 1 - MAX_RENDER_DEPTH)));

    // Guide columns stop at the fold, so output grows linearly
    let widest = lines.iter().map(|l| l.chars().count()).max().unwrap();
    assert!(widest < MAX_RENDER_DEPTH * 4 + 64);

    let json = tree::render_json(&entries).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value.as_array().unwrap().len(), DEPTH + 1);
}

#[test]
fn test_render_text_folds_deep_guides() {
    let index = create_test_index();
    let map = SiteMap::new(&index, 1);

    let depth = MAX_RENDER_DEPTH + 3;
    map.add_request(None, &format!("http://a.test/{}", "d/".repeat(depth)), "GET")
        .unwrap();

    let text = tree::render_text(&tree::build(&index, 1).unwrap());
    let lines: Vec<&str> = text.lines().collect();

    assert_eq!(lines.len(), depth + 1);
    assert!(!lines[MAX_RENDER_DEPTH + 1].contains('┆'));
    assert!(lines[MAX_RENDER_DEPTH + 2].contains("┆ +1 └── GET d"));
    assert!(lines[depth].contains("┆ +2 └── GET d"));
}
