//! The MIME part tree.
//!
//! Parts live in an arena owned by [`NodeTree`] and refer to each other by
//! [`NodeId`]. Each part moves through `Header -> Body -> Finished`; lines are
//! routed either to a boundary (which opens or closes parts) or to the
//! current part's content decoder.

use tracing::debug;

use crate::decode::ContentDecoder;
use crate::error::{MimeError, Result};
use crate::model::message::{Header, RawHeaderLine};
use crate::parser::header::{
    decode_header_bytes, parse_header_line, parse_structured_header, unfold_lines,
    StructuredHeader,
};

/// Index of a part inside its [`NodeTree`].
pub type NodeId = usize;

/// The root part is always the first node.
pub const ROOT: NodeId = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Header,
    Body,
    Finished,
}

/// One MIME part.
#[derive(Debug)]
pub struct MimeNode {
    pub parent: Option<NodeId>,
    pub depth: u32,
    pub state: NodeState,

    /// Parsed `Content-Type`; `text/plain` unless the part says otherwise.
    pub content_type: StructuredHeader,
    /// Subtype of a `multipart/*` part (`"mixed"`, `"alternative"`, ...).
    pub multipart: Option<String>,
    /// Lowercased `Content-Transfer-Encoding`, `"8bit"` when absent.
    pub transfer_encoding: String,
    pub disposition: Option<StructuredHeader>,
    pub content_id: Option<String>,
    pub description: Option<String>,

    pub headers: Vec<Header>,
    pub header_lines: Vec<RawHeaderLine>,
    pub children: Vec<NodeId>,

    /// Decoded body, set by finalize.
    pub content: Option<Vec<u8>>,

    pending_headers: Vec<String>,
    headers_size: usize,
    decoder: Option<ContentDecoder>,
}

impl MimeNode {
    fn new(parent: Option<NodeId>, depth: u32) -> Self {
        Self {
            parent,
            depth,
            state: NodeState::Header,
            content_type: StructuredHeader {
                value: "text/plain".to_string(),
                ..Default::default()
            },
            multipart: None,
            transfer_encoding: "8bit".to_string(),
            disposition: None,
            content_id: None,
            description: None,
            headers: Vec::new(),
            header_lines: Vec::new(),
            children: Vec::new(),
            content: None,
            pending_headers: Vec::new(),
            headers_size: 0,
            decoder: None,
        }
    }

    /// Lowercased content type value, e.g. `"text/html"`.
    pub fn mime_type(&self) -> &str {
        &self.content_type.value
    }

    /// Lowercased disposition value, if a `Content-Disposition` header was present.
    pub fn disposition_value(&self) -> Option<&str> {
        self.disposition.as_ref().map(|d| d.value.as_str())
    }

    pub fn is_multipart(&self) -> bool {
        self.multipart.is_some()
    }
}

/// An open multipart boundary.
#[derive(Debug, Clone)]
struct Boundary {
    value: Vec<u8>,
    owner: NodeId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BoundaryMatch {
    Delimiter(NodeId),
    Terminator(NodeId),
}

/// Arena of MIME parts plus the parsing cursor.
#[derive(Debug)]
pub struct NodeTree {
    nodes: Vec<MimeNode>,
    /// Open boundaries, innermost last.
    boundaries: Vec<Boundary>,
    current: NodeId,
    max_nesting_depth: u32,
    max_headers_size: usize,
}

impl NodeTree {
    pub fn new(max_nesting_depth: u32, max_headers_size: usize) -> Self {
        Self {
            nodes: vec![MimeNode::new(None, 0)],
            boundaries: Vec::new(),
            current: ROOT,
            max_nesting_depth,
            max_headers_size,
        }
    }

    /// Place the root at `depth`, for a message embedded that deep inside
    /// another one. Child depths and the nesting limit stay global.
    pub fn with_root_depth(mut self, depth: u32) -> Self {
        self.nodes[ROOT].depth = depth;
        self
    }

    pub fn node(&self, id: NodeId) -> &MimeNode {
        &self.nodes[id]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut MimeNode {
        &mut self.nodes[id]
    }

    pub fn root(&self) -> &MimeNode {
        &self.nodes[ROOT]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MimeNode> {
        self.nodes.iter()
    }

    /// Create a child part, enforcing the nesting limit before any byte of it
    /// is processed.
    fn create_child(&mut self, parent: NodeId) -> Result<NodeId> {
        let depth = self.nodes[parent].depth + 1;
        if depth > self.max_nesting_depth {
            return Err(MimeError::NestingTooDeep {
                limit: self.max_nesting_depth,
            });
        }
        let id = self.nodes.len();
        self.nodes.push(MimeNode::new(Some(parent), depth));
        self.nodes[parent].children.push(id);
        debug!(id, parent, depth, "Created MIME part");
        Ok(id)
    }

    /// Route one line (terminator already stripped).
    pub fn feed(&mut self, line: &[u8]) -> Result<()> {
        match self.match_boundary(line) {
            Some(BoundaryMatch::Terminator(owner)) => {
                self.finalize(owner);
                self.current = self.nodes[owner].parent.unwrap_or(ROOT);
                Ok(())
            }
            Some(BoundaryMatch::Delimiter(owner)) => {
                self.finalize_children(owner);
                self.current = self.create_child(owner)?;
                Ok(())
            }
            None => self.feed_node(self.current, line),
        }
    }

    /// Find the innermost open boundary this line belongs to.
    ///
    /// `--boundary` followed by optional whitespace is a delimiter;
    /// `--boundary--` followed by optional whitespace is a terminator.
    fn match_boundary(&self, line: &[u8]) -> Option<BoundaryMatch> {
        let rest = line.strip_prefix(b"--")?;
        for boundary in self.boundaries.iter().rev() {
            let Some(tail) = rest.strip_prefix(boundary.value.as_slice()) else {
                continue;
            };
            if tail.iter().all(u8::is_ascii_whitespace) {
                return Some(BoundaryMatch::Delimiter(boundary.owner));
            }
            if let Some(after) = tail.strip_prefix(b"--") {
                if after.iter().all(u8::is_ascii_whitespace) {
                    return Some(BoundaryMatch::Terminator(boundary.owner));
                }
            }
        }
        None
    }

    fn feed_node(&mut self, id: NodeId, line: &[u8]) -> Result<()> {
        match self.nodes[id].state {
            NodeState::Header => {
                if line.is_empty() {
                    self.process_headers(id);
                    self.nodes[id].state = NodeState::Body;
                    return Ok(());
                }
                let node = &mut self.nodes[id];
                node.headers_size += line.len();
                if node.headers_size > self.max_headers_size {
                    return Err(MimeError::HeadersTooLarge {
                        limit: self.max_headers_size,
                    });
                }
                node.pending_headers.push(decode_header_bytes(line));
                Ok(())
            }
            NodeState::Body => {
                if let Some(decoder) = self.nodes[id].decoder.as_mut() {
                    decoder.update(line);
                }
                Ok(())
            }
            NodeState::Finished => Ok(()),
        }
    }

    /// Parse the accumulated header block and prepare the body decoder.
    fn process_headers(&mut self, id: NodeId) {
        let parent_is_digest = self.nodes[id]
            .parent
            .is_some_and(|p| self.nodes[p].multipart.as_deref() == Some("digest"));

        let node = &mut self.nodes[id];
        let lines = unfold_lines(&std::mem::take(&mut node.pending_headers));

        let mut content_type: Option<StructuredHeader> = None;
        let mut transfer_encoding: Option<String> = None;

        for line in &lines {
            let (raw, header) = parse_header_line(line);
            match header.key.as_str() {
                "content-type" if content_type.is_none() => {
                    content_type = Some(parse_structured_header(&header.value));
                }
                "content-transfer-encoding" if transfer_encoding.is_none() => {
                    let value = parse_structured_header(&header.value).value;
                    transfer_encoding = Some(value);
                }
                "content-disposition" if node.disposition.is_none() => {
                    node.disposition = Some(parse_structured_header(&header.value));
                }
                "content-id" if node.content_id.is_none() => {
                    node.content_id = Some(header.value.clone());
                }
                "content-description" if node.description.is_none() => {
                    node.description = Some(header.value.clone());
                }
                _ => {}
            }
            node.header_lines.push(raw);
            node.headers.push(header);
        }

        match content_type {
            Some(ct) if !ct.value.is_empty() => node.content_type = ct,
            Some(ct) => {
                // Parameters without a type: keep them on the default type.
                node.content_type.params = ct.params;
            }
            None => {}
        }
        if parent_is_digest && !node.headers.iter().any(|h| h.key == "content-type") {
            node.content_type.value = "message/rfc822".to_string();
        }

        if let Some(encoding) = transfer_encoding.filter(|e| !e.is_empty()) {
            node.transfer_encoding = encoding;
        }
        node.decoder = Some(ContentDecoder::for_encoding(&node.transfer_encoding));

        // A multipart type without a boundary cannot be split and stays a leaf.
        let subtype = node
            .content_type
            .value
            .strip_prefix("multipart/")
            .map(str::to_string);
        let boundary = node
            .content_type
            .param("boundary")
            .filter(|b| !b.is_empty())
            .map(|b| b.as_bytes().to_vec());
        let boundary = match (subtype, boundary) {
            (Some(subtype), Some(value)) => {
                node.multipart = Some(subtype);
                Some(value)
            }
            (Some(subtype), None) => {
                debug!(id, subtype = %subtype, "Multipart part has no boundary");
                None
            }
            _ => None,
        };
        if let Some(value) = boundary {
            debug!(
                id,
                boundary = %String::from_utf8_lossy(&value),
                "Registered multipart boundary"
            );
            self.boundaries.push(Boundary { value, owner: id });
        }
    }

    /// Close a part and everything below it. Calling it twice is a no-op.
    pub fn finalize(&mut self, id: NodeId) {
        if self.nodes[id].state == NodeState::Finished {
            return;
        }
        if self.nodes[id].state == NodeState::Header {
            self.process_headers(id);
        }
        self.boundaries.retain(|b| b.owner != id);
        self.finalize_children(id);

        let node = &mut self.nodes[id];
        node.content = Some(node.decoder.take().map(ContentDecoder::finalize).unwrap_or_default());
        node.state = NodeState::Finished;
    }

    fn finalize_children(&mut self, id: NodeId) {
        let children = self.nodes[id].children.clone();
        for child in children {
            self.finalize(child);
        }
    }

    /// Finish parsing: close every open part starting from the root.
    pub fn finish(&mut self) {
        self.finalize(ROOT);
    }
}
