use crate::tree::{parent_of, walk, Node, NodeRef, Path};
use serde::Serialize;

/// A place in a document that refers to another document.
///
/// `context` is text a display surface can show around the reference;
/// `path` addresses the matched node in the tree it was computed from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Match {
    pub context: String,
    pub path: Path,
}

/// An outgoing link found in a document, with the id it points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutgoingLink {
    pub target_id: String,
    #[serde(flatten)]
    pub found: Match,
}

/// Find every link element pointing at `target_id` that has visible text.
///
/// Matches follow document order. Context is the rendered text of the link's
/// containing element, or of the link itself when it sits at the top level.
pub fn find_linked_matches(tree: &[NodeRef], target_id: &str) -> Vec<Match> {
    find_outgoing_links(tree)
        .into_iter()
        .filter(|link| link.target_id == target_id)
        .map(|link| link.found)
        .collect()
}

/// Find every link element with visible text, whatever it points at.
pub fn find_outgoing_links(tree: &[NodeRef]) -> Vec<OutgoingLink> {
    let mut links = Vec::new();
    walk(tree, |node, path| {
        let Some(link) = node.as_link() else {
            return;
        };
        let text = node.rendered_text();
        // A link with no visible text cannot be shown as a backlink
        if text.is_empty() {
            return;
        }
        let context = match parent_of(tree, path) {
            Ok(parent) => parent.rendered_text(),
            Err(_) => text,
        };
        links.push(OutgoingLink {
            target_id: link.target_id.clone(),
            found: Match {
                context,
                path: path.to_vec(),
            },
        });
    });
    links
}

/// Find plain-text mentions of `title`, case-insensitively.
///
/// Link subtrees are left out of the search entirely, so a link's own text
/// never counts as a mention. Only the most deeply nested elements whose text
/// contains the title are reported; context is that element's link-free text.
/// An empty title matches nothing.
pub fn find_unlinked_matches(tree: &[NodeRef], title: &str) -> Vec<Match> {
    let needle = title.to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }

    let mut matches = Vec::new();
    let mut path = Vec::new();
    for (index, node) in tree.iter().enumerate() {
        path.push(index);
        collect_unlinked(node, &needle, &mut path, &mut matches);
        path.pop();
    }
    matches
}

/// Returns the link-free rendered text of `node`, recording lowest matches on the way.
fn collect_unlinked(node: &Node, needle: &str, path: &mut Path, out: &mut Vec<Match>) -> String {
    let element = match node {
        Node::Text(text) => return text.text.clone(),
        Node::Element(element) if element.link().is_some() => return String::new(),
        Node::Element(element) => element,
    };

    let matched_below = out.len();
    let mut text = String::new();
    for (index, child) in element.children.iter().enumerate() {
        path.push(index);
        text.push_str(&collect_unlinked(child, needle, path, out));
        path.pop();
    }

    // Descendants already matched: this element is not the lowest match
    if out.len() == matched_below && text.to_lowercase().contains(needle) {
        out.push(Match {
            context: text.clone(),
            path: path.clone(),
        });
    }
    text
}
