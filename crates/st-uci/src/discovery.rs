//! Tunable parameter discovery from an engine's UCI option list.

use st_types::{DiscoveryError, TunableParameter};
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

pub const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Value following `keyword`, searching only at or after `from`.
fn value_after<'a>(tokens: &[&'a str], keyword: &str, from: usize) -> Option<&'a str> {
    let idx = tokens[from..].iter().position(|t| *t == keyword)? + from;
    tokens.get(idx + 1).copied()
}

/// Parse one `option name <N...> type spin default <d> min <lo> max <hi>` line.
fn parse_spin_option(line: &str) -> Result<Option<TunableParameter>, String> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.first() != Some(&"option") {
        return Ok(None);
    }

    let name_idx = tokens
        .iter()
        .position(|t| *t == "name")
        .ok_or("missing name")?;
    let type_idx = tokens[name_idx..]
        .iter()
        .position(|t| *t == "type")
        .ok_or("missing type")?
        + name_idx;

    if tokens.get(type_idx + 1) != Some(&"spin") {
        return Ok(None);
    }

    let name = tokens[name_idx + 1..type_idx].join(" ");
    if name.is_empty() {
        return Err("empty name".into());
    }

    let number = |keyword: &str| -> Result<i64, String> {
        let raw = value_after(&tokens, keyword, type_idx).ok_or(format!("missing {keyword}"))?;
        raw.parse::<i64>()
            .map_err(|_| format!("{keyword} is not an integer: {raw}"))
    };
    let default = number("default")?;
    let min = number("min")?;
    let max = number("max")?;

    TunableParameter::create(name, default, min, max)
        .map(Some)
        .map_err(|e| e.to_string())
}

/// Extract every well-formed spin option from UCI output.
///
/// Non-spin options are ignored; malformed spin lines and repeated names are
/// skipped. Returns an empty vector when nothing is tunable.
pub fn parse_uci_options(output: &str) -> Vec<TunableParameter> {
    let mut seen = HashSet::new();
    let mut params = Vec::new();

    for line in output.lines() {
        match parse_spin_option(line) {
            Ok(Some(param)) => {
                if seen.insert(param.name().to_string()) {
                    params.push(param);
                } else {
                    debug!("Skipping repeated option {}", param.name());
                }
            }
            Ok(None) => {}
            Err(reason) => debug!("Skipping malformed option line {:?}: {}", line, reason),
        }
    }

    params
}

/// Queries an engine binary for its spin options.
#[derive(Debug, Clone)]
pub struct UciDiscovery {
    engine_path: PathBuf,
    engine_args: Vec<String>,
    timeout: Duration,
}

impl UciDiscovery {
    pub fn new(engine_path: impl Into<PathBuf>) -> Self {
        Self {
            engine_path: engine_path.into(),
            engine_args: Vec::new(),
            timeout: DEFAULT_DISCOVERY_TIMEOUT,
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.engine_args = args;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Send `uci` / `quit` and parse whatever the engine prints before it
    /// exits.
    pub async fn discover(&self) -> Result<Vec<TunableParameter>, DiscoveryError> {
        let path = self.engine_path.display().to_string();
        debug!("Querying {} for UCI options", path);

        let mut child = Command::new(&self.engine_path)
            .args(&self.engine_args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| DiscoveryError::Launch {
                path: path.clone(),
                message: e.to_string(),
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            match stdin.write_all(b"uci\nquit\n").await {
                Ok(()) => {}
                // The engine may print its options and exit without reading.
                Err(e) if e.kind() == ErrorKind::BrokenPipe => {}
                Err(e) => return Err(e.into()),
            }
        }

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| DiscoveryError::Timeout {
                timeout_seconds: self.timeout.as_secs(),
            })??;

        if !output.status.success() {
            warn!("Engine {} exited with {}", path, output.status);
        }

        let params = parse_uci_options(&String::from_utf8_lossy(&output.stdout));
        info!("Discovered {} tunable parameters in {}", params.len(), path);
        Ok(params)
    }
}
