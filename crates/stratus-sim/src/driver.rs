use std::io::Write;
use std::path::Path;

use anyhow::{ensure, Result};
use stratus_model::directors::{Director, RoundRobinDirector};
use tokio::sync::mpsc;

use crate::cases::CaseSetup;
use crate::provider::Request;

/// Consume the request stream and drive it through the topology.
///
/// Requests are processed strictly in stream order — the driver is the only
/// mutator of topology state and there is exactly one in-flight request at
/// any time. A top-level round-robin director spreads the stream across the
/// front proxies; every `step_interval` processed requests a metric
/// snapshot line is appended for each proxy.
///
/// The stream ends on the provider's `None` sentinel or on channel close,
/// whichever comes first. Returns the number of requests processed.
pub async fn run(
    setup: &mut CaseSetup,
    receiver: &mut mpsc::Receiver<Option<Request>>,
    step_interval: u64,
    steps_dir: &Path,
) -> Result<u64> {
    ensure!(step_interval > 0, "step interval must be greater than 0");
    std::fs::create_dir_all(steps_dir)?;

    // Entry-point load balancer across the front caches
    let mut entry = RoundRobinDirector::new();
    for front in &setup.fronts {
        entry.add_backend(*front, setup.topology.hostname(*front));
    }

    let mut processed = 0u64;
    while let Some(message) = receiver.recv().await {
        let request = match message {
            Some(request) => request,
            // Sentinel: the provider is done even if the channel is still open
            None => break,
        };

        if let Some(front) = entry.get_backend(&request.url) {
            setup.topology.request(front, &request.url, request.size);
        }
        processed += 1;

        if processed % step_interval == 0 {
            write_step_records(setup, steps_dir);
        }
    }

    Ok(processed)
}

/// Append one `"<hit> <miss>"` line per proxy, first tier before second.
/// Step files are diagnostic: every proxy is attempted and each failure is
/// logged to stderr, but none aborts the run.
fn write_step_records(setup: &CaseSetup, steps_dir: &Path) {
    for id in &setup.proxies {
        let proxy = match setup.topology.proxy(*id) {
            Some(proxy) => proxy,
            None => continue,
        };
        let path = steps_dir.join(format!("{}.step", proxy.hostname()));
        if let Err(error) = append_step_line(&path, &proxy.cache_metric().step_line()) {
            tracing::error!(path = %path.display(), %error, "failed to write step record");
        }
    }
}

fn append_step_line(path: &Path, line: &str) -> std::io::Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    writeln!(file, "{line}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cases::{self, LayerConfig};

    fn layer(amount: usize, cache_size: u64) -> LayerConfig {
        LayerConfig { amount, cache_size }
    }

    /// Hand the driver a fixed list of requests over a provider-shaped
    /// channel, with the trailing `None` sentinel.
    fn stream_of(requests: Vec<Request>) -> mpsc::Receiver<Option<Request>> {
        let (tx, rx) = mpsc::channel(256);
        tokio::spawn(async move {
            for request in requests {
                if tx.send(Some(request)).await.is_err() {
                    return;
                }
            }
            let _ = tx.send(None).await;
        });
        rx
    }

    fn request(url: &str, size: u64) -> Request {
        Request {
            url: url.to_string(),
            size,
        }
    }

    #[tokio::test]
    async fn round_robins_the_stream_across_fronts() {
        let mut setup = cases::one_layer(layer(2, 1000)).unwrap();
        let steps = tempfile::tempdir().unwrap();

        // Four distinct cold URLs: two land on each front, all reach the origin
        let mut rx = stream_of(vec![
            request("/a", 10),
            request("/b", 10),
            request("/c", 10),
            request("/d", 10),
        ]);
        let processed = run(&mut setup, &mut rx, 100, steps.path()).await.unwrap();

        assert_eq!(processed, 4);
        let backend = setup.topology.backend(setup.backend).unwrap();
        assert_eq!(backend.requests(), 4);
        for proxy in &setup.proxies {
            assert_eq!(setup.topology.proxy(*proxy).unwrap().cache().len(), 2);
        }
    }

    #[tokio::test]
    async fn plain_channel_close_also_ends_the_run() {
        let mut setup = cases::one_layer(layer(1, 1000)).unwrap();
        let steps = tempfile::tempdir().unwrap();

        let (tx, mut rx) = mpsc::channel(8);
        tx.send(Some(request("/a", 10))).await.unwrap();
        tx.send(Some(request("/b", 10))).await.unwrap();
        drop(tx); // no sentinel

        let processed = run(&mut setup, &mut rx, 100, steps.path()).await.unwrap();
        assert_eq!(processed, 2);
    }

    #[tokio::test]
    async fn empty_stream_completes_with_empty_metrics() {
        let mut setup = cases::one_layer(layer(1, 1000)).unwrap();
        let steps = tempfile::tempdir().unwrap();

        let mut rx = stream_of(Vec::new());
        let processed = run(&mut setup, &mut rx, 100, steps.path()).await.unwrap();

        assert_eq!(processed, 0);
        let proxy = setup.topology.proxy(setup.proxies[0]).unwrap();
        assert_eq!(proxy.cache_metric().total(), 0);
    }

    #[tokio::test]
    async fn step_records_appear_every_interval() {
        let mut setup = cases::one_layer(layer(1, 1000)).unwrap();
        let steps = tempfile::tempdir().unwrap();

        let requests: Vec<Request> = (0..10).map(|i| request(&format!("/{i}"), 1)).collect();
        let mut rx = stream_of(requests);
        run(&mut setup, &mut rx, 3, steps.path()).await.unwrap();

        // 10 requests at interval 3: snapshots after 3, 6, and 9
        let contents = std::fs::read_to_string(steps.path().join("proxy-0.step")).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        for line in lines {
            // Cold cache, nothing counted before warm-up
            assert_eq!(line, "0 0");
        }
    }

    #[tokio::test]
    async fn rejects_zero_step_interval() {
        let mut setup = cases::one_layer(layer(1, 1000)).unwrap();
        let steps = tempfile::tempdir().unwrap();

        let mut rx = stream_of(Vec::new());
        assert!(run(&mut setup, &mut rx, 0, steps.path()).await.is_err());
    }

    #[tokio::test]
    async fn counted_requests_match_post_warm_up_traffic() {
        // Capacity 10, object size 4: at most two entries fit, so cycling
        // three URLs thrashes forever once warm
        let mut setup = cases::one_layer(layer(1, 10)).unwrap();
        let steps = tempfile::tempdir().unwrap();

        let urls = ["/a", "/b", "/c"];
        let requests: Vec<Request> = (0..100).map(|i| request(urls[i % 3], 4)).collect();
        let mut rx = stream_of(requests);
        run(&mut setup, &mut rx, 100, steps.path()).await.unwrap();

        // Warm-up latches on request 3 (storing "/c" evicts "/a"); the 97
        // requests after it are all counted, and all miss
        let metric = setup.topology.proxy(setup.proxies[0]).unwrap().cache_metric();
        assert_eq!(metric.hits(), 0);
        assert_eq!(metric.misses(), 97);
        assert_eq!(metric.total(), 97);
    }

    #[tokio::test]
    async fn sharded_tiers_keep_urls_on_consistent_backs() {
        let mut setup = cases::two_layer_sharded(layer(2, 1_000_000), layer(2, 1_000_000)).unwrap();
        let steps = tempfile::tempdir().unwrap();

        // Each URL twice in a row: round-robin sends the two copies to
        // different fronts, so the second copy only avoids the origin if
        // both fronts shard it to the same (now warm) back
        let mut requests = Vec::new();
        for i in 0..1000 {
            let url = format!("/object/{i}");
            requests.push(request(&url, 10));
            requests.push(request(&url, 10));
        }
        let mut rx = stream_of(requests);
        let processed = run(&mut setup, &mut rx, 1000, steps.path()).await.unwrap();

        assert_eq!(processed, 2000);
        let backend = setup.topology.backend(setup.backend).unwrap();
        assert_eq!(backend.requests(), 1000);

        // Round robin split the stream evenly across the two fronts
        for front in &setup.fronts {
            let routed: u64 = setup
                .topology
                .proxy(*front)
                .unwrap()
                .routing_metric()
                .counts()
                .values()
                .sum();
            assert_eq!(routed, 1000);
        }
    }
}
