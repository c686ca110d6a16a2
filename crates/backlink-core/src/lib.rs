pub mod backlinks;
pub mod error;
pub mod link_matcher;
pub mod link_rewriter;
pub mod store;
pub mod tree;

pub use backlinks::{compute_backlinks, Backlink, BacklinkService, Backlinks, ForwardLink, PropagationReport};
pub use error::{BacklinkError, DocumentFailure, TreeError};
pub use link_matcher::{find_linked_matches, find_outgoing_links, find_unlinked_matches, Match, OutgoingLink};
pub use link_rewriter::{retitle_links, unwrap_links};
pub use store::{DocumentStore, MemoryStore};
pub use tree::{Document, Element, ElementKind, LinkAttrs, Node, NodeRef, Path, TextNode};
