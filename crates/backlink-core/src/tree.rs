use crate::error::TreeError;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Element type tag of link elements.
pub const LINK_TYPE: &str = "link";

/// Shared handle to an immutable node. Rewrites allocate new handles only
/// along the rewritten path; every other subtree is shared with the input.
pub type NodeRef = Arc<Node>;

/// Child indices applied successively from a document's top-level nodes.
pub type Path = Vec<usize>;

// ---------------------------------------------------------------------------
// Data model
// ---------------------------------------------------------------------------

/// A node of a rich-text document.
///
/// Encoded the way the document store keeps content: elements carry a `type`
/// and `children`, text nodes carry `text` plus any formatting marks.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Node {
    Element(Element),
    Text(TextNode),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextNode {
    pub text: String,
    /// Formatting marks (`bold`, `italic`, ...). Carried through rewrites untouched.
    #[serde(flatten)]
    pub marks: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawElement", into = "RawElement")]
pub struct Element {
    pub kind: ElementKind,
    pub children: Vec<NodeRef>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ElementKind {
    Link(LinkAttrs),
    /// Any non-link element. Only its children matter to link resolution.
    Other {
        tag: String,
        attrs: Map<String, Value>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinkAttrs {
    pub target_id: String,
    pub display_title: String,
    /// When set, the link's visible text always equals `display_title`.
    pub title_is_bound: bool,
    /// Attributes other than the three above, preserved on re-encode.
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    #[serde(rename = "children", default)]
    pub root: Vec<NodeRef>,
}

impl Node {
    pub fn text(text: impl Into<String>) -> Self {
        Node::Text(TextNode {
            text: text.into(),
            marks: Map::new(),
        })
    }

    pub fn element(tag: impl Into<String>, children: Vec<Node>) -> Self {
        Node::Element(Element {
            kind: ElementKind::Other {
                tag: tag.into(),
                attrs: Map::new(),
            },
            children: forest(children),
        })
    }

    pub fn link(
        target_id: impl Into<String>,
        display_title: impl Into<String>,
        title_is_bound: bool,
        children: Vec<Node>,
    ) -> Self {
        Node::Element(Element {
            kind: ElementKind::Link(LinkAttrs {
                target_id: target_id.into(),
                display_title: display_title.into(),
                title_is_bound,
                extra: Map::new(),
            }),
            children: forest(children),
        })
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(element) => Some(element),
            Node::Text(_) => None,
        }
    }

    /// Link attributes, if this node is a link element.
    pub fn as_link(&self) -> Option<&LinkAttrs> {
        self.as_element().and_then(Element::link)
    }

    pub fn is_link_to(&self, target_id: &str) -> bool {
        self.as_link().is_some_and(|link| link.target_id == target_id)
    }

    pub fn rendered_text(&self) -> String {
        let mut out = String::new();
        self.push_rendered_text(&mut out);
        out
    }

    fn push_rendered_text(&self, out: &mut String) {
        match self {
            Node::Text(text) => out.push_str(&text.text),
            Node::Element(element) => {
                for child in &element.children {
                    child.push_rendered_text(out);
                }
            }
        }
    }
}

impl Element {
    pub fn link(&self) -> Option<&LinkAttrs> {
        match &self.kind {
            ElementKind::Link(link) => Some(link),
            ElementKind::Other { .. } => None,
        }
    }

    pub fn tag(&self) -> &str {
        match &self.kind {
            ElementKind::Link(_) => LINK_TYPE,
            ElementKind::Other { tag, .. } => tag,
        }
    }

    pub fn is_link_to(&self, target_id: &str) -> bool {
        self.link().is_some_and(|link| link.target_id == target_id)
    }
}

impl Document {
    pub fn new(id: impl Into<String>, title: impl Into<String>, root: Vec<Node>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            root: forest(root),
        }
    }
}

/// Wrap owned nodes into a shareable forest.
pub fn forest(nodes: Vec<Node>) -> Vec<NodeRef> {
    nodes.into_iter().map(Arc::new).collect()
}

// ---------------------------------------------------------------------------
// Wire shape of elements
// ---------------------------------------------------------------------------

// An object with a `type` key is an element, anything else is text. Decoding
// the chosen variant directly keeps its own error message.
impl<'de> Deserialize<'de> for Node {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let is_element = match &value {
            Value::Object(fields) => fields.contains_key("type"),
            other => {
                return Err(D::Error::custom(format!(
                    "document node must be an object, got {other}"
                )))
            }
        };
        if is_element {
            serde_json::from_value(value)
                .map(Node::Element)
                .map_err(D::Error::custom)
        } else {
            serde_json::from_value(value)
                .map(Node::Text)
                .map_err(D::Error::custom)
        }
    }
}

#[derive(Serialize, Deserialize)]
struct RawElement {
    #[serde(rename = "type")]
    tag: String,
    children: Vec<NodeRef>,
    #[serde(flatten)]
    attrs: Map<String, Value>,
}

impl TryFrom<RawElement> for Element {
    type Error = String;

    fn try_from(raw: RawElement) -> Result<Self, Self::Error> {
        let RawElement {
            tag,
            children,
            mut attrs,
        } = raw;

        if tag != LINK_TYPE {
            return Ok(Element {
                kind: ElementKind::Other { tag, attrs },
                children,
            });
        }

        let target_id = match attrs.remove("targetId") {
            Some(Value::String(id)) => id,
            _ => return Err("link element requires a string `targetId`".to_string()),
        };
        let display_title = match attrs.remove("displayTitle") {
            Some(Value::String(title)) => title,
            None | Some(Value::Null) => String::new(),
            Some(other) => return Err(format!("link `displayTitle` must be a string, got {other}")),
        };
        let title_is_bound = match attrs.remove("titleIsBound") {
            Some(Value::Bool(bound)) => bound,
            None | Some(Value::Null) => false,
            Some(other) => return Err(format!("link `titleIsBound` must be a boolean, got {other}")),
        };

        Ok(Element {
            kind: ElementKind::Link(LinkAttrs {
                target_id,
                display_title,
                title_is_bound,
                extra: attrs,
            }),
            children,
        })
    }
}

impl From<Element> for RawElement {
    fn from(element: Element) -> Self {
        match element.kind {
            ElementKind::Other { tag, attrs } => RawElement {
                tag,
                children: element.children,
                attrs,
            },
            ElementKind::Link(link) => {
                let mut attrs = link.extra;
                attrs.insert("targetId".into(), Value::String(link.target_id));
                attrs.insert("displayTitle".into(), Value::String(link.display_title));
                attrs.insert("titleIsBound".into(), Value::Bool(link.title_is_bound));
                RawElement {
                    tag: LINK_TYPE.to_string(),
                    children: element.children,
                    attrs,
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Navigator
// ---------------------------------------------------------------------------

/// Resolve a non-empty path against a document's top-level nodes.
///
/// Every prefix must address an element and every index must be in range.
pub fn resolve<'a>(tree: &'a [NodeRef], path: &[usize]) -> Result<&'a Node, TreeError> {
    let (&first, rest) = path.split_first().ok_or_else(|| TreeError::invalid(path))?;
    let mut node: &Node = tree
        .get(first)
        .map(|root| &**root)
        .ok_or_else(|| TreeError::invalid(path))?;
    for &index in rest {
        let element = node.as_element().ok_or_else(|| TreeError::invalid(path))?;
        node = element
            .children
            .get(index)
            .map(|child| &**child)
            .ok_or_else(|| TreeError::invalid(path))?;
    }
    Ok(node)
}

/// Concatenated text of every text node under `node`, in child order.
pub fn rendered_text(node: &Node) -> String {
    node.rendered_text()
}

/// The node containing the one at `path`. Top-level nodes have no parent.
pub fn parent_of<'a>(tree: &'a [NodeRef], path: &[usize]) -> Result<&'a Node, TreeError> {
    if path.len() <= 1 {
        return Err(TreeError::invalid(path));
    }
    resolve(tree, &path[..path.len() - 1])
}

/// Visit every node depth-first, pre-order, left to right, with its path.
pub fn walk<'a, F>(tree: &'a [NodeRef], mut visit: F)
where
    F: FnMut(&'a Node, &[usize]),
{
    let mut path = Vec::new();
    walk_nodes(tree, &mut path, &mut visit);
}

fn walk_nodes<'a, F>(nodes: &'a [NodeRef], path: &mut Path, visit: &mut F)
where
    F: FnMut(&'a Node, &[usize]),
{
    for (index, node) in nodes.iter().enumerate() {
        path.push(index);
        let node: &'a Node = node;
        visit(node, path);
        if let Node::Element(element) = node {
            walk_nodes(&element.children, path, visit);
        }
        path.pop();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
