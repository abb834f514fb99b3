//! Shared test infrastructure for integration tests.
//!
//! Each fixture owns a temp directory holding the mock control-plane CLI,
//! its call log and any demo templates, plus an optional fake proxy that
//! answers every request with 200.

use std::env;
use std::fs;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::thread;
use tempfile::TempDir;

const MOCK_CLI: &str = include_str!("mock-proxy-cli.sh");

/// Provider variables cleared so the host environment cannot leak in.
const PROVIDER_VARS: &[&str] = &[
    "OPENAI_API_KEY",
    "OPENAI_API_ENDPOINT",
    "AZURE_OPENAI_API_KEY",
    "AZURE_OPENAI_ENDPOINT",
    "GOOGLE_VERTEX_API_KEY",
    "GOOGLE_GEMINI_ENDPOINT",
    "LLM_PROXY_CLI",
    "LLM_PROXY_URL",
    "DB_TYPE",
    "DB_DSN",
    "RUST_LOG",
];

pub struct TestFixture {
    pub dir: TempDir,
    pub base_url: String,
    env: Vec<(String, String)>,
}

/// Outcome of one `quickstart` invocation.
#[derive(Debug)]
pub struct RunResult {
    pub success: bool,
    pub stderr: String,
    pub report: Option<serde_json::Value>,
    pub cli_calls: Vec<String>,
}

impl RunResult {
    /// Log lines for one subcommand, e.g. `"connection add"`.
    pub fn calls_to(&self, subcommand: &str) -> Vec<&str> {
        self.cli_calls
            .iter()
            .filter(|line| line.starts_with(subcommand))
            .map(String::as_str)
            .collect()
    }

    pub fn provider_status(&self, provider: &str) -> Option<String> {
        let report = self.report.as_ref()?;
        report["providers"]
            .as_array()?
            .iter()
            .find(|entry| entry["provider"] == provider)
            .and_then(|entry| entry["status"].as_str())
            .map(str::to_string)
    }
}

impl TestFixture {
    /// Fixture with a fake proxy that reports healthy.
    pub fn healthy() -> Self {
        let addr = spawn_healthy_proxy();
        Self::with_base_url(format!("http://{addr}"))
    }

    /// Fixture whose base URL points at a closed port.
    pub fn unreachable() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind probe port");
        let addr = listener.local_addr().expect("local addr");
        drop(listener);
        Self::with_base_url(format!("http://{addr}"))
    }

    fn with_base_url(base_url: String) -> Self {
        let dir = TempDir::new().expect("tempdir");
        let cli = dir.path().join("llm-proxy");
        fs::write(&cli, MOCK_CLI).expect("write mock cli");
        fs::set_permissions(&cli, fs::Permissions::from_mode(0o755)).expect("chmod mock cli");
        Self {
            dir,
            base_url,
            env: Vec::new(),
        }
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.env.push((key.to_string(), value.to_string()));
        self
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn demos_dir(&self) -> PathBuf {
        let dir = self.path().join("demos");
        fs::create_dir_all(&dir).expect("create demos dir");
        dir
    }

    fn log_path(&self) -> PathBuf {
        self.path().join("cli.log")
    }

    /// Run `quickstart --json` with the mock CLI and any extra flags.
    pub fn run(&self, extra: &[&str]) -> RunResult {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_quickstart"));
        cmd.current_dir(self.path())
            .arg("--json")
            .arg("--no-color")
            .arg("--cli")
            .arg(self.path().join("llm-proxy"))
            .arg("--base-url")
            .arg(&self.base_url)
            .args(extra)
            .env("MOCK_CLI_LOG", self.log_path());
        for var in PROVIDER_VARS {
            cmd.env_remove(var);
        }
        for (key, value) in &self.env {
            cmd.env(key, value);
        }

        let output: Output = cmd.output().expect("run quickstart");
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        if env::var("QUICKSTART_TEST_VERBOSE").is_ok() {
            eprintln!("--- stderr ---\n{stderr}");
        }
        let cli_calls = fs::read_to_string(self.log_path())
            .map(|log| log.lines().map(str::to_string).collect())
            .unwrap_or_default();

        RunResult {
            success: output.status.success(),
            report: serde_json::from_str(&stdout).ok(),
            stderr,
            cli_calls,
        }
    }
}

/// Accept connections forever, answering each with `200 OK`.
fn spawn_healthy_proxy() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind fake proxy");
    let addr = listener.local_addr().expect("local addr");
    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { continue };
            let mut request = Vec::new();
            let mut buf = [0u8; 512];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                match stream.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => request.extend_from_slice(&buf[..n]),
                }
            }
            let _ = stream.write_all(
                b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok",
            );
        }
    });
    addr
}
