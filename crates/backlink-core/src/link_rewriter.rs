use crate::error::TreeError;
use crate::link_matcher::Match;
use crate::tree::{resolve, Element, ElementKind, Node, NodeRef, TextNode};
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Retitle
// ---------------------------------------------------------------------------

/// Set the display title of every matched link to `new_title`.
///
/// Matches that no longer address a link to `target_id` (stale, or computed
/// against other content) and invalid paths are skipped with a warning. Links
/// with a bound title also get every descendant text replaced by `new_title`.
///
/// The input is left untouched; the result shares every subtree that was not
/// on the path to a rewritten link.
pub fn retitle_links(
    tree: &[NodeRef],
    target_id: &str,
    matches: &[Match],
    new_title: &str,
) -> Vec<NodeRef> {
    let mut current = tree.to_vec();

    for found in matches {
        match resolve(&current, &found.path) {
            Ok(node) if node.is_link_to(target_id) => {}
            Ok(_) => {
                tracing::warn!(
                    "Skipping stale match at {:?}: not a link to {}",
                    found.path,
                    target_id
                );
                continue;
            }
            Err(e) => {
                tracing::warn!("Skipping match for {}: {}", target_id, e);
                continue;
            }
        }

        let rewritten = update_at(&current, &found.path, |node| retitled(node, new_title));
        match rewritten {
            Ok(Some(updated)) => current = updated,
            Ok(None) => {}
            Err(e) => tracing::warn!("Skipping match for {}: {}", target_id, e),
        }
    }

    current
}

/// The retitled link, or `None` when it already carries `new_title`.
fn retitled(node: &Node, new_title: &str) -> Option<Node> {
    let element = node.as_element()?;
    let link = element.link()?;

    let mut link = link.clone();
    link.display_title = new_title.to_string();
    let children = if link.title_is_bound {
        element
            .children
            .iter()
            .map(|child| Arc::new(with_text(child, new_title)))
            .collect()
    } else {
        element.children.clone()
    };

    let updated = Node::Element(Element {
        kind: ElementKind::Link(link),
        children,
    });
    (updated != *node).then_some(updated)
}

/// Copy of `node` with every text payload replaced by `text`.
fn with_text(node: &Node, text: &str) -> Node {
    match node {
        Node::Text(t) => Node::Text(TextNode {
            text: text.to_string(),
            marks: t.marks.clone(),
        }),
        Node::Element(element) => Node::Element(Element {
            kind: element.kind.clone(),
            children: element
                .children
                .iter()
                .map(|child| Arc::new(with_text(child, text)))
                .collect(),
        }),
    }
}

/// Rebuild the spine from the root to `path`, replacing the node there with
/// whatever `update` returns. `Ok(None)` means `update` declined to change it.
fn update_at<F>(tree: &[NodeRef], path: &[usize], update: F) -> Result<Option<Vec<NodeRef>>, TreeError>
where
    F: FnOnce(&Node) -> Option<Node>,
{
    rebuild(tree, path, path, update)
}

fn rebuild<F>(
    nodes: &[NodeRef],
    rest: &[usize],
    full_path: &[usize],
    update: F,
) -> Result<Option<Vec<NodeRef>>, TreeError>
where
    F: FnOnce(&Node) -> Option<Node>,
{
    let (&index, rest) = rest
        .split_first()
        .ok_or_else(|| TreeError::invalid(full_path))?;
    let current = nodes.get(index).ok_or_else(|| TreeError::invalid(full_path))?;

    let replacement = if rest.is_empty() {
        match update(&**current) {
            Some(node) => node,
            None => return Ok(None),
        }
    } else {
        let element = current
            .as_element()
            .ok_or_else(|| TreeError::invalid(full_path))?;
        match rebuild(&element.children, rest, full_path, update)? {
            Some(children) => Node::Element(Element {
                kind: element.kind.clone(),
                children,
            }),
            None => return Ok(None),
        }
    };

    let mut siblings = nodes.to_vec();
    siblings[index] = Arc::new(replacement);
    Ok(Some(siblings))
}

// ---------------------------------------------------------------------------
// Unwrap
// ---------------------------------------------------------------------------

/// Replace every link to `target_id` with its own children, spliced in place.
///
/// Works on the whole tree regardless of link text. Nested links to the same
/// target are unwrapped too. Surrounding siblings and all text are preserved.
pub fn unwrap_links(tree: &[NodeRef], target_id: &str) -> Vec<NodeRef> {
    unwrap_children(tree, target_id).unwrap_or_else(|| tree.to_vec())
}

/// `None` when no link to `target_id` occurs anywhere under `nodes`.
fn unwrap_children(nodes: &[NodeRef], target_id: &str) -> Option<Vec<NodeRef>> {
    let mut changed = false;
    let mut out = Vec::with_capacity(nodes.len());

    for node in nodes {
        let Node::Element(element) = node.as_ref() else {
            out.push(Arc::clone(node));
            continue;
        };

        if element.is_link_to(target_id) {
            changed = true;
            match unwrap_children(&element.children, target_id) {
                Some(children) => out.extend(children),
                None => out.extend(element.children.iter().cloned()),
            }
            continue;
        }

        match unwrap_children(&element.children, target_id) {
            Some(children) => {
                changed = true;
                out.push(Arc::new(Node::Element(Element {
                    kind: element.kind.clone(),
                    children,
                })));
            }
            None => out.push(Arc::clone(node)),
        }
    }

    changed.then_some(out)
}
