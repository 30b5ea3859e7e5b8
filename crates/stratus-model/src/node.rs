use crate::error::ModelError;
use crate::metrics::{CacheMetric, RoutingMetric};
use crate::storage::ByteLru;
use crate::topology::{DirectorId, NodeId};

/// Terminal origin node. Always "serves" the requested object at the
/// requested size and counts how often it was asked.
pub struct Backend {
    hostname: String,
    requests: u64,
}

impl Backend {
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            requests: 0,
        }
    }

    pub fn serve(&mut self, size: u64) -> u64 {
        self.requests += 1;
        size
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn requests(&self) -> u64 {
        self.requests
    }
}

/// A caching node: serves from its byte-LRU cache when it can, otherwise
/// delegates to a director-selected peer or a fixed fallback upstream and
/// caches whatever size the upstream served.
///
/// `warmed_up` latches to true on the first eviction — the cache has been
/// full at least once — and gates hit/miss accounting so the cold-fill
/// period is not counted.
pub struct Proxy {
    pub(crate) hostname: String,
    pub(crate) cache: ByteLru,
    pub(crate) director: Option<DirectorId>,
    pub(crate) upstream: Option<NodeId>,
    pub(crate) cache_metric: CacheMetric,
    pub(crate) routing_metric: RoutingMetric,
    pub(crate) warmed_up: bool,
}

impl Proxy {
    pub fn new(hostname: impl Into<String>, cache_size: u64) -> Result<Self, ModelError> {
        Ok(Self {
            hostname: hostname.into(),
            cache: ByteLru::new(cache_size)?,
            director: None,
            upstream: None,
            cache_metric: CacheMetric::default(),
            routing_metric: RoutingMetric::default(),
            warmed_up: false,
        })
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn cache(&self) -> &ByteLru {
        &self.cache
    }

    pub fn cache_metric(&self) -> &CacheMetric {
        &self.cache_metric
    }

    pub fn routing_metric(&self) -> &RoutingMetric {
        &self.routing_metric
    }

    pub fn warmed_up(&self) -> bool {
        self.warmed_up
    }

    pub fn director(&self) -> Option<DirectorId> {
        self.director
    }

    pub fn upstream(&self) -> Option<NodeId> {
        self.upstream
    }
}

/// A node in the simulated topology. The upstream of a proxy is "anything
/// that can serve a sized GET": either another proxy or a terminal backend.
pub enum Node {
    Backend(Backend),
    Proxy(Proxy),
}

impl Node {
    pub fn hostname(&self) -> &str {
        match self {
            Node::Backend(backend) => backend.hostname(),
            Node::Proxy(proxy) => proxy.hostname(),
        }
    }
}
