// Application configuration, loaded from environment variables and CLI flags.

use std::path::PathBuf;
use std::time::Duration;

/// Backend configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address to bind the HTTP server to.
    pub host: String,
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Base URL used when building fragment links for new teams.
    pub public_url: String,
    /// Path of the JSON store document.
    pub data_path: PathBuf,
    /// Fragment count used when a create request does not give one.
    pub default_fragments: usize,
}

impl Config {
    /// Load configuration from environment variables and CLI arguments.
    ///
    /// Environment variables:
    /// - `HOST` - bind address (default: `0.0.0.0`)
    /// - `PORT` - HTTP server port (default: 4000)
    /// - `PUBLIC_URL` - base for fragment links (default: `http://localhost:<port>`)
    /// - `DATA_PATH` - store document (default: `data.json`)
    /// - `DEFAULT_FRAGMENTS` - fragments per team when unspecified (default: 2)
    ///
    /// CLI flags `--host`, `--port` and `--data` take precedence over the
    /// matching variables.
    pub fn load() -> Self {
        let args: Vec<String> = std::env::args().collect();

        let host = parse_cli_value(&args, "--host")
            .or_else(|| std::env::var("HOST").ok())
            .unwrap_or_else(|| "0.0.0.0".to_string());

        // Port: CLI flag --port takes precedence, then env var, then default
        let port = parse_cli_value(&args, "--port")
            .and_then(|v| v.parse().ok())
            .or_else(|| std::env::var("PORT").ok().and_then(|v| v.parse().ok()))
            .unwrap_or(4000);

        let public_url = std::env::var("PUBLIC_URL")
            .map(|v| v.trim_end_matches('/').to_string())
            .unwrap_or_else(|_| format!("http://localhost:{port}"));

        let data_path = parse_cli_value(&args, "--data")
            .or_else(|| std::env::var("DATA_PATH").ok())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("data.json"));

        let default_fragments = std::env::var("DEFAULT_FRAGMENTS")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|n| *n >= 1)
            .unwrap_or(2);

        Config {
            host,
            port,
            public_url,
            data_path,
            default_fragments,
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// How the device discovers nearby artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// Newline-delimited peer records from a radio adapter on stdin.
    Radio,
    /// Synthetic advertisements of every catalog artifact.
    Simulated,
}

/// Configuration of one runestone device.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Backend base URL, without trailing slash.
    pub api_base: String,
    /// Which fragment this device reveals.
    pub runestone_index: usize,
    /// Delay between active-team polls.
    pub poll_interval: Duration,
    pub scan_mode: ScanMode,
    /// Quiz answer ids, in question order. Missing answers fall back to the
    /// first option.
    pub answers: Vec<String>,
}

impl DeviceConfig {
    /// Environment variables:
    /// - `API_BASE` (default: `http://localhost:4000`)
    /// - `RUNESTONE_INDEX` (default: 0)
    /// - `POLL_INTERVAL_SECS` (default: 3)
    /// - `SCAN_MODE=simulated` - use synthetic advertisements
    ///
    /// CLI flags: `--api <URL>`, `--index <N>`, `--answers a,b,c`, `--simulate`.
    pub fn load() -> Self {
        let args: Vec<String> = std::env::args().collect();

        let api_base = parse_cli_value(&args, "--api")
            .or_else(|| std::env::var("API_BASE").ok())
            .map(|v| v.trim_end_matches('/').to_string())
            .unwrap_or_else(|| "http://localhost:4000".to_string());

        let runestone_index = parse_cli_value(&args, "--index")
            .or_else(|| std::env::var("RUNESTONE_INDEX").ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);

        let poll_interval = std::env::var("POLL_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(3));

        let simulated = args.contains(&"--simulate".to_string())
            || std::env::var("SCAN_MODE")
                .map(|v| v.eq_ignore_ascii_case("simulated"))
                .unwrap_or(false);

        let answers = parse_cli_value(&args, "--answers")
            .map(|v| parse_answers(&v))
            .unwrap_or_default();

        DeviceConfig {
            api_base,
            runestone_index,
            poll_interval,
            scan_mode: if simulated {
                ScanMode::Simulated
            } else {
                ScanMode::Radio
            },
            answers,
        }
    }
}

/// Parse a CLI flag value like `--port 8080`.
fn parse_cli_value(args: &[String], flag: &str) -> Option<String> {
    args.windows(2).find_map(|pair| {
        if pair[0] == flag {
            Some(pair[1].clone())
        } else {
            None
        }
    })
}

fn parse_answers(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
