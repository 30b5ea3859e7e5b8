use anyhow::{bail, Result};
use stratus_model::directors::ShardDirector;
use stratus_model::topology::{NodeId, Topology};

/// Hostname of the shared terminal origin.
const ORIGIN_HOSTNAME: &str = "default";

/// Proxy count and per-proxy cache bytes for one tier.
#[derive(Debug, Clone, Copy)]
pub struct LayerConfig {
    pub amount: usize,
    pub cache_size: u64,
}

impl LayerConfig {
    fn validate(&self, layer: &str) -> Result<()> {
        if self.amount < 1 {
            bail!("{layer} amount must be greater than 0");
        }
        if self.cache_size < 1 {
            bail!("{layer} cache size must be greater than 0");
        }
        Ok(())
    }
}

/// A fully wired topology plus the handles the driver and reporter need.
pub struct CaseSetup {
    pub topology: Topology,
    /// Entry points receiving driver traffic.
    pub fronts: Vec<NodeId>,
    /// Every proxy, in step-snapshot and report order (first tier before
    /// second).
    pub proxies: Vec<NodeId>,
    /// The shared terminal origin.
    pub backend: NodeId,
}

/// N proxies, each falling back directly to the shared origin.
pub fn one_layer(config: LayerConfig) -> Result<CaseSetup> {
    config.validate("layer")?;

    let mut topology = Topology::new();
    let backend = topology.add_backend(ORIGIN_HOSTNAME);

    let mut proxies = Vec::with_capacity(config.amount);
    for i in 0..config.amount {
        let proxy = topology.add_proxy(format!("proxy-{i}"), config.cache_size)?;
        topology.set_upstream(proxy, backend)?;
        proxies.push(proxy);
    }

    Ok(CaseSetup {
        topology,
        fronts: proxies.clone(),
        proxies,
        backend,
    })
}

/// N proxies sharing one consistent-hash ring whose peers are the proxies
/// themselves. A proxy that hashes a request onto itself falls back to the
/// origin instead of recursing.
pub fn one_layer_sharded(config: LayerConfig) -> Result<CaseSetup> {
    config.validate("layer")?;

    let mut topology = Topology::new();
    let backend = topology.add_backend(ORIGIN_HOSTNAME);
    let director = topology.add_director(Box::new(ShardDirector::new()));

    let mut proxies = Vec::with_capacity(config.amount);
    for i in 0..config.amount {
        let proxy = topology.add_proxy(format!("proxy-{i}"), config.cache_size)?;
        topology.set_upstream(proxy, backend)?;
        topology.director_add_backend(director, proxy);
        topology.set_director(proxy, director)?;
        proxies.push(proxy);
    }

    Ok(CaseSetup {
        topology,
        fronts: proxies.clone(),
        proxies,
        backend,
    })
}

/// Two tiers wired pairwise: first-tier proxy i goes through second-tier
/// proxy i; the second tier falls back to the origin. Requires equal
/// amounts, since the pairing is by index.
pub fn two_layer(first: LayerConfig, second: LayerConfig) -> Result<CaseSetup> {
    first.validate("first layer")?;
    second.validate("second layer")?;
    if first.amount != second.amount {
        bail!("two-layer pairing requires equal first and second layer amounts");
    }

    let mut topology = Topology::new();
    let backend = topology.add_backend(ORIGIN_HOSTNAME);

    let seconds = fill_proxies(&mut topology, "2", &second)?;
    for proxy in &seconds {
        topology.set_upstream(*proxy, backend)?;
    }

    let firsts = fill_proxies(&mut topology, "1", &first)?;
    for (front, back) in firsts.iter().zip(seconds.iter()) {
        topology.set_upstream(*front, *back)?;
    }

    let mut proxies = firsts.clone();
    proxies.extend(&seconds);

    Ok(CaseSetup {
        topology,
        fronts: firsts,
        proxies,
        backend,
    })
}

/// Two tiers, the first sharding onto the second: every first-tier proxy
/// gets its own consistent-hash ring over the whole second tier, and the
/// second tier falls back to the origin.
pub fn two_layer_sharded(first: LayerConfig, second: LayerConfig) -> Result<CaseSetup> {
    first.validate("first layer")?;
    second.validate("second layer")?;

    let mut topology = Topology::new();
    let backend = topology.add_backend(ORIGIN_HOSTNAME);

    let seconds = fill_proxies(&mut topology, "2", &second)?;
    for proxy in &seconds {
        topology.set_upstream(*proxy, backend)?;
    }

    let firsts = fill_proxies(&mut topology, "1", &first)?;
    for front in &firsts {
        let director = topology.add_director(Box::new(ShardDirector::new()));
        for back in &seconds {
            topology.director_add_backend(director, *back);
        }
        topology.set_director(*front, director)?;
    }

    let mut proxies = firsts.clone();
    proxies.extend(&seconds);

    Ok(CaseSetup {
        topology,
        fronts: firsts,
        proxies,
        backend,
    })
}

fn fill_proxies(
    topology: &mut Topology,
    prefix: &str,
    config: &LayerConfig,
) -> Result<Vec<NodeId>> {
    let mut proxies = Vec::with_capacity(config.amount);
    for i in 0..config.amount {
        proxies.push(topology.add_proxy(format!("{prefix}-{i}"), config.cache_size)?);
    }
    Ok(proxies)
}
