use crate::ring::HashRing;
use crate::topology::NodeId;

/// Dispatch strategy over a set of peer nodes.
///
/// A director only ever grows: peers are added during topology setup and
/// never removed during a run.
pub trait Director {
    /// Register a peer. The hostname is the peer's stable identity on
    /// whatever internal structure the director keeps.
    fn add_backend(&mut self, peer: NodeId, hostname: &str);

    /// Pick the peer responsible for `key`, or `None` when no peers are
    /// registered. May advance internal selection state.
    fn get_backend(&mut self, key: &str) -> Option<NodeId>;

    /// All registered peers, in registration order.
    fn backends(&self) -> &[NodeId];
}

/// Consistent-hash director: a request URL always lands on the same peer
/// for a given peer set, and growing the set relocates only a small
/// fraction of the key space.
pub struct ShardDirector {
    peers: Vec<NodeId>,
    ring: HashRing,
}

impl ShardDirector {
    pub fn new() -> Self {
        Self {
            peers: Vec::new(),
            ring: HashRing::new(),
        }
    }
}

impl Default for ShardDirector {
    fn default() -> Self {
        Self::new()
    }
}

impl Director for ShardDirector {
    fn add_backend(&mut self, peer: NodeId, hostname: &str) {
        self.ring.add(hostname);
        self.peers.push(peer);
    }

    fn get_backend(&mut self, key: &str) -> Option<NodeId> {
        self.ring.locate(key).map(|index| self.peers[index])
    }

    fn backends(&self) -> &[NodeId] {
        &self.peers
    }
}

/// Round-robin director: cycles through the peers, ignoring the key.
pub struct RoundRobinDirector {
    peers: Vec<NodeId>,
    cursor: usize,
}

impl RoundRobinDirector {
    pub fn new() -> Self {
        Self {
            peers: Vec::new(),
            cursor: 0,
        }
    }
}

impl Default for RoundRobinDirector {
    fn default() -> Self {
        Self::new()
    }
}

impl Director for RoundRobinDirector {
    fn add_backend(&mut self, peer: NodeId, _hostname: &str) {
        self.peers.push(peer);
    }

    fn get_backend(&mut self, _key: &str) -> Option<NodeId> {
        if self.peers.is_empty() {
            return None;
        }
        let peer = self.peers[self.cursor];
        self.cursor = (self.cursor + 1) % self.peers.len();
        Some(peer)
    }

    fn backends(&self) -> &[NodeId] {
        &self.peers
    }
}
