use crate::directors::Director;
use crate::error::ModelError;
use crate::node::{Backend, Node, Proxy};

/// Stable handle to a node in the topology arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u32);

/// Stable handle to a director in the topology arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DirectorId(u32);

/// The simulation graph: proxies and backends plus the directors that route
/// between them.
///
/// Nodes and directors live in arenas addressed by stable ids, so a
/// second-tier proxy can be shared by many first-tier shard rings without
/// reference cycles — fronts point at backs, backs point at the origin, and
/// the graph stays acyclic.
///
/// The topology has a single mutator: the driver thread. It is not safe for
/// concurrent mutation; a parallel-dispatch variant would have to guard or
/// partition per-proxy state.
pub struct Topology {
    nodes: Vec<Node>,
    directors: Vec<Box<dyn Director>>,
}

impl Topology {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            directors: Vec::new(),
        }
    }

    pub fn add_backend(&mut self, hostname: impl Into<String>) -> NodeId {
        self.nodes.push(Node::Backend(Backend::new(hostname)));
        NodeId(self.nodes.len() as u32 - 1)
    }

    pub fn add_proxy(
        &mut self,
        hostname: impl Into<String>,
        cache_size: u64,
    ) -> Result<NodeId, ModelError> {
        let proxy = Proxy::new(hostname, cache_size)?;
        self.nodes.push(Node::Proxy(proxy));
        Ok(NodeId(self.nodes.len() as u32 - 1))
    }

    pub fn add_director(&mut self, director: Box<dyn Director>) -> DirectorId {
        self.directors.push(director);
        DirectorId(self.directors.len() as u32 - 1)
    }

    /// Register `peer` with a director under the peer's hostname.
    pub fn director_add_backend(&mut self, director: DirectorId, peer: NodeId) {
        let hostname = self.nodes[peer.0 as usize].hostname().to_string();
        self.directors[director.0 as usize].add_backend(peer, &hostname);
    }

    pub fn set_director(&mut self, proxy: NodeId, director: DirectorId) -> Result<(), ModelError> {
        match &mut self.nodes[proxy.0 as usize] {
            Node::Proxy(p) => {
                p.director = Some(director);
                Ok(())
            }
            Node::Backend(b) => Err(ModelError::NotAProxy(b.hostname().to_string())),
        }
    }

    /// Set the fixed fallback upstream: the node consulted when there is no
    /// director, or when the director hashes the request back to the proxy
    /// itself.
    pub fn set_upstream(&mut self, proxy: NodeId, upstream: NodeId) -> Result<(), ModelError> {
        match &mut self.nodes[proxy.0 as usize] {
            Node::Proxy(p) => {
                p.upstream = Some(upstream);
                Ok(())
            }
            Node::Backend(b) => Err(ModelError::NotAProxy(b.hostname().to_string())),
        }
    }

    pub fn hostname(&self, id: NodeId) -> &str {
        self.nodes[id.0 as usize].hostname()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0 as usize]
    }

    pub fn proxy(&self, id: NodeId) -> Option<&Proxy> {
        match &self.nodes[id.0 as usize] {
            Node::Proxy(proxy) => Some(proxy),
            Node::Backend(_) => None,
        }
    }

    pub fn backend(&self, id: NodeId) -> Option<&Backend> {
        match &self.nodes[id.0 as usize] {
            Node::Backend(backend) => Some(backend),
            Node::Proxy(_) => None,
        }
    }

    /// Hostnames a proxy may delegate to: the director's peers in
    /// registration order, then the fallback upstream.
    pub fn routes_to(&self, id: NodeId) -> Vec<String> {
        let mut routes = Vec::new();
        if let Some(proxy) = self.proxy(id) {
            if let Some(director) = proxy.director {
                for peer in self.directors[director.0 as usize].backends() {
                    routes.push(self.hostname(*peer).to_string());
                }
            }
            if let Some(upstream) = proxy.upstream {
                routes.push(self.hostname(upstream).to_string());
            }
        }
        routes
    }

    /// Dispatch a GET for `url` of `size` bytes to a node and return the
    /// size it served.
    ///
    /// For a backend this is the terminal serve. For a proxy it is the
    /// cached-GET protocol: serve from cache on a hit; otherwise pick an
    /// upstream peer (director first, falling back to the fixed upstream
    /// when the director hashes the request back to the proxy itself),
    /// fetch from it, and cache the size it served. A proxy with neither
    /// director nor upstream serves 0 and leaves its cache untouched.
    pub fn request(&mut self, id: NodeId, url: &str, size: u64) -> u64 {
        if let Node::Backend(backend) = &mut self.nodes[id.0 as usize] {
            return backend.serve(size);
        }
        self.proxy_request(id, url, size)
    }

    fn proxy_request(&mut self, id: NodeId, url: &str, size: u64) -> u64 {
        let (director, upstream) = {
            let proxy = self.proxy_state(id);
            if let Some(value) = proxy.cache.get(url) {
                if proxy.warmed_up {
                    proxy.cache_metric.record_hit();
                }
                return value;
            }
            if proxy.warmed_up {
                proxy.cache_metric.record_miss();
            }
            (proxy.director, proxy.upstream)
        };

        let peer = match director {
            Some(director) => {
                match self.directors[director.0 as usize].get_backend(url) {
                    Some(selected) => {
                        // The ring may hand the request back to the proxy
                        // itself; break the cycle by delegating to the fixed
                        // upstream instead. Only the actual delegate is
                        // counted in the routing metric.
                        let target = if selected == id { upstream } else { Some(selected) };
                        match target {
                            Some(target) => {
                                let hostname = self.hostname(target).to_string();
                                self.proxy_state(id).routing_metric.record(&hostname);
                                Some(target)
                            }
                            None => None,
                        }
                    }
                    // A director with no peers behaves like no director
                    None => upstream,
                }
            }
            None => upstream,
        };

        let peer = match peer {
            Some(peer) => peer,
            None => return 0,
        };

        let served = self.request(peer, url, size);

        let proxy = self.proxy_state(id);
        if proxy.cache.store(url, served) {
            proxy.warmed_up = true;
        }

        served
    }

    fn proxy_state(&mut self, id: NodeId) -> &mut Proxy {
        match &mut self.nodes[id.0 as usize] {
            Node::Proxy(proxy) => proxy,
            Node::Backend(_) => unreachable!("proxy path dispatched to a backend"),
        }
    }
}

impl Default for Topology {
    fn default() -> Self {
        Self::new()
    }
}
