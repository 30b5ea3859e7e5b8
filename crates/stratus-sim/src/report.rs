use std::collections::BTreeMap;

use anyhow::Result;
use serde::Serialize;
use serde_json::json;
use stratus_model::topology::NodeId;

use crate::cases::CaseSetup;

/// End-of-run metrics for one proxy, as exported in JSON mode.
#[derive(Debug, Serialize)]
struct ProxyReport {
    cache: CacheReport,
    routing: BTreeMap<String, u64>,
    cache_size: u64,
    cache_used: u64,
    routes_to: Vec<String>,
}

#[derive(Debug, Serialize)]
struct CacheReport {
    hit: u64,
    miss: u64,
    total: u64,
    hit_ratio: f64,
}

#[derive(Debug, Serialize)]
struct BackendReport {
    hostname: String,
    requests: u64,
}

/// Render the end-of-run results to stdout, one table per proxy or one
/// JSON object per line.
pub fn print(setup: &CaseSetup, json: bool) -> Result<()> {
    if json {
        print_json(setup)
    } else {
        print_tables(setup);
        Ok(())
    }
}

fn proxy_report(setup: &CaseSetup, id: NodeId) -> Option<(String, ProxyReport)> {
    let proxy = setup.topology.proxy(id)?;
    let metric = proxy.cache_metric();
    Some((
        proxy.hostname().to_string(),
        ProxyReport {
            cache: CacheReport {
                hit: metric.hits(),
                miss: metric.misses(),
                total: metric.total(),
                hit_ratio: metric.hit_ratio(),
            },
            routing: proxy.routing_metric().counts().clone(),
            cache_size: proxy.cache().size(),
            cache_used: proxy.cache().stored(),
            routes_to: setup.topology.routes_to(id),
        },
    ))
}

fn print_json(setup: &CaseSetup) -> Result<()> {
    for id in &setup.proxies {
        if let Some((hostname, report)) = proxy_report(setup, *id) {
            let mut object = serde_json::Map::new();
            object.insert(hostname, serde_json::to_value(&report)?);
            println!("{}", serde_json::Value::Object(object));
        }
    }

    if let Some(backend) = setup.topology.backend(setup.backend) {
        let report = BackendReport {
            hostname: backend.hostname().to_string(),
            requests: backend.requests(),
        };
        println!("{}", serde_json::to_string(&json!({ "backend": report }))?);
    }

    Ok(())
}

/// Label/value rows of the per-proxy table, one `-> peer` row per
/// routed-to peer.
fn proxy_rows(setup: &CaseSetup, id: NodeId) -> Vec<(String, String)> {
    let proxy = match setup.topology.proxy(id) {
        Some(proxy) => proxy,
        None => return Vec::new(),
    };
    let metric = proxy.cache_metric();

    let mut rows = vec![
        ("Hostname".to_string(), proxy.hostname().to_string()),
        ("Cache Size".to_string(), proxy.cache().size().to_string()),
        ("Cache Used".to_string(), proxy.cache().stored().to_string()),
        (
            "Routes To".to_string(),
            setup.topology.routes_to(id).join(", "),
        ),
        ("Cache hit".to_string(), metric.hits().to_string()),
        ("Cache miss".to_string(), metric.misses().to_string()),
        ("CHR".to_string(), format!("{:.6}", metric.hit_ratio())),
    ];

    for (peer, count) in proxy.routing_metric().counts() {
        rows.push((format!("-> {peer}"), count.to_string()));
    }

    rows
}

fn print_tables(setup: &CaseSetup) {
    for id in &setup.proxies {
        let rows = proxy_rows(setup, *id);
        if !rows.is_empty() {
            println!("{}", render_table(&rows));
        }
    }
}

/// Fixed-width two-column box; widths grow with the longest cell.
fn render_table(rows: &[(String, String)]) -> String {
    let label_width = rows.iter().map(|(label, _)| label.len()).max().unwrap_or(0);
    let value_width = rows.iter().map(|(_, value)| value.len()).max().unwrap_or(0);

    let border = format!(
        "+-{}-+-{}-+",
        "-".repeat(label_width),
        "-".repeat(value_width)
    );

    let mut out = String::new();
    out.push_str(&border);
    out.push('\n');
    for (label, value) in rows {
        out.push_str(&format!(
            "| {label:<label_width$} | {value:<value_width$} |\n"
        ));
    }
    out.push_str(&border);
    out
}
