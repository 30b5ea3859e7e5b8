use std::path::PathBuf;

use anyhow::bail;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

/// One simulated request pulled off the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub url: String,
    pub size: u64,
}

/// Environment variables overriding the default record layout.
pub const FRMT_SEP_ENV: &str = "VSIM_FRMT_SEP";
pub const FRMT_URL_POS_ENV: &str = "VSIM_FRMT_URL_POS";
pub const FRMT_SIZE_POS_ENV: &str = "VSIM_FRMT_SIZE_POS";

const DEFAULT_URL_POS: usize = 1;
const DEFAULT_SIZE_POS: usize = 0;
const FALLBACK_SIZE: u64 = 1000;

/// Bound on the producer channel: file I/O is decoupled from simulation
/// CPU but never runs far ahead of it.
const CHANNEL_CAPACITY: usize = 256;

/// Extracts `(url, size)` from one record line.
#[derive(Debug, Clone)]
pub struct Formatter {
    separator: String,
    url_pos: usize,
    size_pos: usize,
}

impl Formatter {
    pub fn new(separator: impl Into<String>, url_pos: usize, size_pos: usize) -> Self {
        Self {
            separator: separator.into(),
            url_pos,
            size_pos,
        }
    }

    /// Layout from the `VSIM_FRMT_*` environment, defaulting to
    /// space-separated `"<size> <url>"` records.
    pub fn from_env() -> Self {
        let separator = std::env::var(FRMT_SEP_ENV).unwrap_or_else(|_| " ".to_string());
        let url_pos = std::env::var(FRMT_URL_POS_ENV)
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(DEFAULT_URL_POS);
        let size_pos = std::env::var(FRMT_SIZE_POS_ENV)
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(DEFAULT_SIZE_POS);
        Self::new(separator, url_pos, size_pos)
    }

    /// Parse one line, already stripped of its trailing newline. A record
    /// without a url field yields `None`; a size that fails to parse falls
    /// back to 1000 bytes.
    pub fn parse(&self, line: &str) -> Option<Request> {
        let fields: Vec<&str> = line.split(self.separator.as_str()).collect();
        let url = fields.get(self.url_pos)?;
        let size = fields
            .get(self.size_pos)
            .and_then(|field| field.parse().ok())
            .unwrap_or(FALLBACK_SIZE);
        Some(Request {
            url: url.to_string(),
            size,
        })
    }
}

/// Provider names accepted by `--provider`.
pub fn available() -> &'static [&'static str] {
    &["file"]
}

/// Spawn the named provider's producer task and return the receiving end
/// of the request stream. The stream ends with a `None` sentinel followed
/// by channel close; consumers should treat either as termination.
pub fn spawn(
    name: &str,
    sources: Vec<PathBuf>,
    formatter: Formatter,
) -> anyhow::Result<mpsc::Receiver<Option<Request>>> {
    match name {
        "file" => Ok(spawn_file_provider(sources, formatter)),
        other => bail!(
            "provider {other} not found (available: {})",
            available().join(", ")
        ),
    }
}

/// Reads newline-delimited records from each source file in order on a
/// background task. A file that cannot be opened or read is logged and
/// skipped; the stream continues with the remaining files.
fn spawn_file_provider(
    sources: Vec<PathBuf>,
    formatter: Formatter,
) -> mpsc::Receiver<Option<Request>> {
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

    tokio::spawn(async move {
        for path in sources {
            let file = match File::open(&path).await {
                Ok(file) => file,
                Err(error) => {
                    tracing::warn!(path = %path.display(), %error, "skipping unreadable source file");
                    continue;
                }
            };

            let mut lines = BufReader::new(file).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => match formatter.parse(&line) {
                        Some(request) => {
                            if tx.send(Some(request)).await.is_err() {
                                // Receiver is gone; nothing left to produce
                                return;
                            }
                        }
                        None => {
                            tracing::warn!(path = %path.display(), line = %line, "skipping malformed record");
                        }
                    },
                    Ok(None) => break,
                    Err(error) => {
                        tracing::warn!(path = %path.display(), %error, "read failed, skipping rest of file");
                        break;
                    }
                }
            }
        }

        // End-of-stream sentinel; dropping the sender closes the channel
        let _ = tx.send(None).await;
    });

    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_layout_parses_size_then_url() {
        let formatter = Formatter::new(" ", DEFAULT_URL_POS, DEFAULT_SIZE_POS);
        assert_eq!(
            formatter.parse("512 /api/items/7"),
            Some(Request {
                url: "/api/items/7".to_string(),
                size: 512,
            })
        );
    }

    #[test]
    fn unparsable_size_falls_back_to_1000() {
        let formatter = Formatter::new(" ", 1, 0);
        assert_eq!(formatter.parse("n/a /x").unwrap().size, 1000);
    }

    #[test]
    fn missing_url_field_is_skipped() {
        let formatter = Formatter::new(" ", 1, 0);
        assert_eq!(formatter.parse("512"), None);
        assert_eq!(formatter.parse(""), None);
    }

    #[test]
    fn custom_separator_and_positions() {
        let formatter = Formatter::new(",", 0, 2);
        assert_eq!(
            formatter.parse("/y,GET,77"),
            Some(Request {
                url: "/y".to_string(),
                size: 77,
            })
        );
    }

    #[test]
    fn layout_comes_from_environment() {
        std::env::set_var(FRMT_SEP_ENV, ";");
        std::env::set_var(FRMT_URL_POS_ENV, "0");
        std::env::set_var(FRMT_SIZE_POS_ENV, "1");

        let formatter = Formatter::from_env();
        assert_eq!(
            formatter.parse("/z;321"),
            Some(Request {
                url: "/z".to_string(),
                size: 321,
            })
        );

        std::env::remove_var(FRMT_SEP_ENV);
        std::env::remove_var(FRMT_URL_POS_ENV);
        std::env::remove_var(FRMT_SIZE_POS_ENV);
    }

    #[test]
    fn unknown_provider_is_fatal() {
        let result = spawn("carrier-pigeon", Vec::new(), Formatter::new(" ", 1, 0));
        assert!(result.is_err());
    }

    async fn collect(mut rx: mpsc::Receiver<Option<Request>>) -> Vec<Request> {
        let mut requests = Vec::new();
        while let Some(message) = rx.recv().await {
            match message {
                Some(request) => requests.push(request),
                None => break,
            }
        }
        requests
    }

    #[tokio::test]
    async fn file_provider_streams_records_in_order() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "10 /a").unwrap();
        writeln!(file, "20 /b").unwrap();
        writeln!(file, "garbage-size /c").unwrap();
        file.flush().unwrap();

        let rx = spawn(
            "file",
            vec![file.path().to_path_buf()],
            Formatter::new(" ", 1, 0),
        )
        .unwrap();
        let requests = collect(rx).await;

        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].url, "/a");
        assert_eq!(requests[1].size, 20);
        assert_eq!(requests[2].size, 1000);
    }

    #[tokio::test]
    async fn unreadable_file_is_skipped() {
        let mut good = tempfile::NamedTempFile::new().unwrap();
        writeln!(good, "5 /only").unwrap();
        good.flush().unwrap();

        let rx = spawn(
            "file",
            vec![
                PathBuf::from("/definitely/not/here.log"),
                good.path().to_path_buf(),
            ],
            Formatter::new(" ", 1, 0),
        )
        .unwrap();
        let requests = collect(rx).await;

        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].url, "/only");
    }

    #[tokio::test]
    async fn empty_stream_completes_normally() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let rx = spawn(
            "file",
            vec![file.path().to_path_buf()],
            Formatter::new(" ", 1, 0),
        )
        .unwrap();
        assert!(collect(rx).await.is_empty());
    }
}
