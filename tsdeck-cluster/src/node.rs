use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tsdeck::{ConsoleError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    Https,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            Protocol::Http => 80,
            Protocol::Https => 443,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Protocol {
    type Err = ConsoleError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "http" => Ok(Protocol::Http),
            "https" => Ok(Protocol::Https),
            other => Err(ConsoleError::Config(format!(
                "Unsupported protocol '{}', expected http or https",
                other
            ))),
        }
    }
}

/// One endpoint of the search cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub host: String,
    pub port: u16,
    pub protocol: Protocol,
}

impl Node {
    pub fn new(host: impl Into<String>, port: u16, protocol: Protocol) -> Self {
        Node {
            host: host.into(),
            port,
            protocol,
        }
    }

    /// Parse `https://search.example.com:443`. A bare `host:port` is read as http,
    /// and a missing port takes the protocol's default.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let with_scheme = if s.contains("://") {
            s.to_string()
        } else {
            format!("http://{}", s)
        };
        let parsed = url::Url::parse(&with_scheme)
            .map_err(|e| ConsoleError::Config(format!("Invalid node URL '{}': {}", s, e)))?;

        let protocol: Protocol = parsed.scheme().parse()?;
        let host = parsed
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| ConsoleError::Config(format!("Node URL '{}' has no host", s)))?
            .to_string();
        let port = parsed
            .port_or_known_default()
            .unwrap_or_else(|| protocol.default_port());

        Ok(Node {
            host,
            port,
            protocol,
        })
    }

    /// `protocol://host:port`
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.protocol, self.host, self.port)
    }

    /// Absolute URL for `path`, with exactly one `/` between base and path.
    pub fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url(), path.trim_start_matches('/'))
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base_url())
    }
}

/// Ordered, non-empty list of nodes plus a shared cursor.
///
/// The cursor is a hint for where the next request should start. Each request
/// takes its own [`NodeCursor`] and rotates that during retries; failures are
/// published back with [`record_failure`](Self::record_failure) so later
/// requests skip a node that just failed.
#[derive(Debug)]
pub struct NodePool {
    nodes: Arc<[Node]>,
    cursor: AtomicUsize,
}

impl NodePool {
    pub fn new(nodes: Vec<Node>) -> Result<Self> {
        if nodes.is_empty() {
            return Err(ConsoleError::Config(
                "At least one node is required".to_string(),
            ));
        }
        Ok(NodePool {
            nodes: nodes.into(),
            cursor: AtomicUsize::new(0),
        })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn current_index(&self) -> usize {
        self.cursor.load(Ordering::Acquire)
    }

    pub fn current(&self) -> &Node {
        &self.nodes[self.current_index()]
    }

    /// Move the cursor to the next node (wrapping) and return it.
    pub fn advance(&self) -> &Node {
        let len = self.nodes.len();
        let previous = self
            .cursor
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| Some((c + 1) % len))
            .unwrap_or_else(|c| c);
        &self.nodes[(previous + 1) % len]
    }

    /// A request-local view starting at the current node.
    pub fn snapshot(&self) -> NodeCursor {
        NodeCursor {
            nodes: Arc::clone(&self.nodes),
            index: self.current_index(),
        }
    }

    /// Move the shared cursor past `index`, but only if no other request has
    /// already moved it.
    pub fn record_failure(&self, index: usize) {
        let next = (index + 1) % self.nodes.len();
        if self
            .cursor
            .compare_exchange(index, next, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            tracing::debug!(
                "node pool cursor moved from {} to {}",
                self.nodes[index],
                self.nodes[next]
            );
        }
    }

    /// Point the shared cursor at a node that just answered successfully.
    pub fn record_success(&self, index: usize) {
        self.cursor.store(index % self.nodes.len(), Ordering::Release);
    }
}

/// One request's position in a [`NodePool`] snapshot.
#[derive(Debug, Clone)]
pub struct NodeCursor {
    nodes: Arc<[Node]>,
    index: usize,
}

impl NodeCursor {
    pub fn node(&self) -> &Node {
        &self.nodes[self.index]
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn rotate(&mut self) -> &Node {
        self.index = (self.index + 1) % self.nodes.len();
        self.node()
    }
}
