//! Playwright driver subprocess
//!
//! Browser automation runs in a long-lived Node child executing an embedded
//! Playwright driver script. The flow clear -> type -> wait -> read needs
//! control to return to Rust between steps, so instead of one generated
//! script per scenario the driver speaks a line protocol on stdio: one
//! `{"execute": .., "id": .., "arguments": ..}` command per line, answered
//! by one `{"id": .., "return": ..}` or `{"id": .., "error": {class, desc}}`
//! line. The id echo lets the client discard a reply that arrives after its
//! command's budget already expired, keeping the stream in sync. The driver
//! emits a greeting line once the browser is up and may interleave
//! `{"event": ..}` lines (forwarded page console messages), which the
//! client traces and skips.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command as TokioCommand};
use tokio::sync::Mutex;
use tracing::{debug, trace, warn};

use crate::error::{E2eError, E2eResult};

/// Budget for commands that carry no timeout of their own.
pub const DEFAULT_COMMAND_BUDGET_MS: u64 = 10_000;

/// Slack added on top of a command's own timeout before the client declares
/// the driver hung.
const COMMAND_SLACK_MS: u64 = 5_000;

/// Node-side driver source, materialized to a temp dir at launch.
const DRIVER_SOURCE: &str = r#"// Line-protocol Playwright driver.
// One JSON command per stdin line, one JSON reply per stdout line.
// stdout carries only protocol lines; free-form logging goes to stderr.
const readline = require('readline');
const { chromium, firefox, webkit } = require('playwright');

const config = JSON.parse(process.argv[2] || '{}');
const engines = { chromium, firefox, webkit };

let browser = null;
let context = null;
let page = null;

function reply(obj) {
  process.stdout.write(JSON.stringify(obj) + '\n');
}

function ok(id, result) {
  reply({ id, return: result === undefined ? {} : result });
}

function fail(id, cls, err) {
  reply({ id, error: { class: cls, desc: String((err && err.message) || err) } });
}

async function openPage(args) {
  if (context) {
    await context.close().catch(() => {});
    context = null;
    page = null;
  }
  context = await browser.newContext({
    viewport: {
      width: config.viewport_width || 1280,
      height: config.viewport_height || 720,
    },
  });
  page = await context.newPage();
  page.on('console', (msg) =>
    reply({ event: 'console', kind: msg.type(), text: msg.text() })
  );
  await page.goto(args.url, {
    waitUntil: 'domcontentloaded',
    timeout: args.timeout_ms,
  });
  await page.waitForSelector(args.wait_for, {
    state: 'visible',
    timeout: args.selector_timeout_ms,
  });
  return {};
}

async function waitSettled(args) {
  try {
    await page.waitForFunction(
      ({ selector, minChars }) => {
        const field = document.querySelector(selector);
        if (!field) return false;
        const value = (field.value || '').trim();
        if (!value) return false;
        return value.length >= minChars && /[\u0D80-\u0DFF]/.test(value);
      },
      { selector: args.selector, minChars: args.min_chars },
      { timeout: args.timeout_ms }
    );
    return { settled: true };
  } catch (err) {
    return { settled: false };
  }
}

const handlers = {
  open_page: openPage,
  clear: async (a) => {
    await page.locator(a.selector).clear();
    return {};
  },
  fill: async (a) => {
    await page.locator(a.selector).fill(a.value);
    return {};
  },
  press_sequentially: async (a) => {
    const field = page.locator(a.selector);
    await field.clear();
    await field.pressSequentially(a.text, { delay: a.delay_ms });
    return {};
  },
  input_value: async (a) => ({
    value: await page.locator(a.selector).inputValue(),
  }),
  is_visible: async (a) => ({
    visible: await page.locator(a.selector).isVisible(),
  }),
  wait_settled: waitSettled,
  screenshot: async (a) => {
    await page.screenshot({ path: a.path, fullPage: !!a.full_page });
    return {};
  },
  close: async () => ({}),
};

async function main() {
  browser = await engines[config.browser || 'chromium'].launch({
    headless: config.headless !== false,
  });
  reply({ ready: { browser: config.browser || 'chromium', version: browser.version() } });

  const rl = readline.createInterface({ input: process.stdin });
  for await (const line of rl) {
    const text = line.trim();
    if (!text) continue;
    let cmd;
    try {
      cmd = JSON.parse(text);
    } catch (err) {
      fail(undefined, 'BadCommand', err);
      continue;
    }
    const handler = handlers[cmd.execute];
    if (!handler) {
      fail(cmd.id, 'UnknownCommand', 'no such command: ' + cmd.execute);
      continue;
    }
    try {
      ok(cmd.id, await handler(cmd.arguments || {}));
    } catch (err) {
      fail(cmd.id, 'CommandFailed', err);
    }
    if (cmd.execute === 'close') break;
  }
  rl.close();

  if (context) await context.close().catch(() => {});
  if (browser) await browser.close().catch(() => {});
  process.exit(0);
}

main().catch((err) => {
  fail(undefined, 'Fatal', err);
  process.exit(1);
});
"#;

#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

/// Configuration for the driver child process
#[derive(Debug, Clone, Serialize)]
pub struct DriverConfig {
    pub browser: Browser,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,

    /// Node binary to run the driver with.
    #[serde(skip)]
    pub node_command: String,

    /// Directory whose `node_modules` resolves the playwright package; set
    /// as NODE_PATH for the child. None leaves resolution to the
    /// environment.
    #[serde(skip)]
    pub node_path: Option<PathBuf>,

    /// Budget for browser launch and the greeting line.
    #[serde(skip)]
    pub launch_timeout: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            browser: Browser::Chromium,
            headless: true,
            viewport_width: 1280,
            viewport_height: 720,
            node_command: "node".to_string(),
            node_path: None,
            launch_timeout: Duration::from_secs(30),
        }
    }
}

struct DriverIo {
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

/// Handle to the running driver. One browser per handle; one current page,
/// replaced wholesale by each `open_page`.
pub struct PlaywrightDriver {
    child: Child,
    io: Mutex<DriverIo>,
    seq: AtomicU64,
    stopped: bool,
    // Holds the materialized driver script for the child's lifetime.
    _workdir: TempDir,
}

impl PlaywrightDriver {
    /// Check that Node and the playwright package are present. Entrypoints
    /// use this to skip cleanly instead of failing the run.
    pub fn available(config: &DriverConfig) -> bool {
        Self::ensure_available(config).is_ok()
    }

    /// Like [`Self::available`], with the reason on failure.
    pub fn ensure_available(config: &DriverConfig) -> E2eResult<()> {
        let node = std::process::Command::new(&config.node_command)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        match node {
            Ok(status) if status.success() => {}
            _ => {
                return Err(E2eError::DriverUnavailable(format!(
                    "{} not found",
                    config.node_command
                )))
            }
        }

        let mut check = std::process::Command::new(&config.node_command);
        check
            .arg("-e")
            .arg("require('playwright')")
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        if let Some(node_path) = resolve_node_path(config) {
            check.env("NODE_PATH", node_path);
        }
        match check.status() {
            Ok(status) if status.success() => Ok(()),
            _ => Err(E2eError::DriverUnavailable(
                "playwright package not resolvable".to_string(),
            )),
        }
    }

    /// Launch the browser and wait for the driver's greeting.
    pub async fn launch(config: DriverConfig) -> E2eResult<Self> {
        Self::ensure_available(&config)?;

        let workdir = TempDir::new()?;
        let script_path = workdir.path().join("driver.js");
        tokio::fs::write(&script_path, DRIVER_SOURCE).await?;

        debug!("launching driver: {}", script_path.display());

        let mut cmd = TokioCommand::new(&config.node_command);
        cmd.arg(&script_path)
            .arg(serde_json::to_string(&config)?)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(node_path) = resolve_node_path(&config) {
            cmd.env("NODE_PATH", node_path);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| E2eError::Driver(format!("failed to spawn {}: {}", config.node_command, e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| E2eError::Driver("driver stdin not captured".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| E2eError::Driver("driver stdout not captured".to_string()))?;
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!("driver stderr: {}", line);
                }
            });
        }

        let mut io = DriverIo {
            stdin,
            stdout: BufReader::new(stdout),
        };

        // Read greeting
        let greeting_line = tokio::time::timeout(config.launch_timeout, async {
            read_protocol_line(&mut io.stdout).await
        })
        .await
        .map_err(|_| E2eError::CommandTimeout {
            command: "launch".to_string(),
            ms: config.launch_timeout.as_millis() as u64,
        })??;

        let greeting: Greeting = serde_json::from_str(&greeting_line)
            .map_err(|e| E2eError::Protocol(format!("invalid greeting: {}", e)))?;
        let ready = greeting
            .ready
            .ok_or_else(|| E2eError::Protocol("driver greeting missing ready".to_string()))?;

        debug!("driver ready: {} {}", ready.browser, ready.version);

        Ok(Self {
            child,
            io: Mutex::new(io),
            seq: AtomicU64::new(0),
            stopped: false,
            _workdir: workdir,
        })
    }

    /// Execute a driver command and parse its reply. Replies carrying a
    /// different id belong to a command whose budget already expired and are
    /// discarded.
    async fn execute<A: Serialize, R: DeserializeOwned>(
        &self,
        command: &str,
        arguments: Option<A>,
        budget: Duration,
    ) -> E2eResult<R> {
        let id = self.seq.fetch_add(1, Ordering::Relaxed);

        let mut guard = self.io.lock().await;
        let io = &mut *guard;

        let cmd = DriverCommand {
            execute: command.to_string(),
            id,
            arguments,
        };
        let cmd_str = serde_json::to_string(&cmd)?;
        trace!("driver command: {}", cmd_str);

        let exchange = async {
            io.stdin.write_all(cmd_str.as_bytes()).await?;
            io.stdin.write_all(b"\n").await?;
            io.stdin.flush().await?;

            loop {
                let line = read_protocol_line(&mut io.stdout).await?;
                trace!("driver reply: {}", line);

                let reply: DriverReply = serde_json::from_str(&line).map_err(|e| {
                    E2eError::Protocol(format!("invalid reply to {}: {}", command, e))
                })?;

                if reply.id != Some(id) {
                    trace!("discarding stale reply (id {:?})", reply.id);
                    continue;
                }

                if let Some(fault) = reply.error {
                    return Err(E2eError::Driver(format!("{}: {}", fault.class, fault.desc)));
                }
                let value = reply.result.ok_or_else(|| {
                    E2eError::Protocol(format!("no return value for {}", command))
                })?;
                return serde_json::from_value(value).map_err(|e| {
                    E2eError::Protocol(format!("malformed return value for {}: {}", command, e))
                });
            }
        };

        tokio::time::timeout(budget, exchange)
            .await
            .map_err(|_| E2eError::CommandTimeout {
                command: command.to_string(),
                ms: budget.as_millis() as u64,
            })?
    }

    /// Open a fresh isolated context, navigate, and wait for the given
    /// selector to be visible. Replaces any previous page.
    pub async fn open_page(
        &self,
        url: &str,
        wait_for: &str,
        nav_timeout: Duration,
        selector_timeout: Duration,
    ) -> E2eResult<()> {
        #[derive(Serialize)]
        struct Args<'a> {
            url: &'a str,
            wait_for: &'a str,
            timeout_ms: u64,
            selector_timeout_ms: u64,
        }

        let budget = nav_timeout + selector_timeout + Duration::from_millis(COMMAND_SLACK_MS);
        let result: E2eResult<Empty> = self
            .execute(
                "open_page",
                Some(Args {
                    url,
                    wait_for,
                    timeout_ms: nav_timeout.as_millis() as u64,
                    selector_timeout_ms: selector_timeout.as_millis() as u64,
                }),
                budget,
            )
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(E2eError::Driver(reason)) => Err(E2eError::Navigation {
                url: url.to_string(),
                reason,
            }),
            Err(other) => Err(other),
        }
    }

    /// Clear a field's content.
    pub async fn clear(&self, selector: &str) -> E2eResult<()> {
        #[derive(Serialize)]
        struct Args<'a> {
            selector: &'a str,
        }

        let _: Empty = self
            .execute("clear", Some(Args { selector }), default_budget())
            .await?;
        Ok(())
    }

    /// Set a field's content in one shot.
    pub async fn fill(&self, selector: &str, value: &str) -> E2eResult<()> {
        #[derive(Serialize)]
        struct Args<'a> {
            selector: &'a str,
            value: &'a str,
        }

        let _: Empty = self
            .execute("fill", Some(Args { selector, value }), default_budget())
            .await?;
        Ok(())
    }

    /// Clear, then type text key by key with a fixed inter-key delay.
    pub async fn press_sequentially(
        &self,
        selector: &str,
        text: &str,
        delay: Duration,
    ) -> E2eResult<()> {
        #[derive(Serialize)]
        struct Args<'a> {
            selector: &'a str,
            text: &'a str,
            delay_ms: u64,
        }

        let keys = text.chars().count() as u64;
        let budget = delay * (keys as u32).max(1) + Duration::from_millis(DEFAULT_COMMAND_BUDGET_MS);
        let _: Empty = self
            .execute(
                "press_sequentially",
                Some(Args {
                    selector,
                    text,
                    delay_ms: delay.as_millis() as u64,
                }),
                budget,
            )
            .await?;
        Ok(())
    }

    /// Read a field's current value.
    pub async fn input_value(&self, selector: &str) -> E2eResult<String> {
        #[derive(Serialize)]
        struct Args<'a> {
            selector: &'a str,
        }

        #[derive(Deserialize)]
        struct Value {
            value: String,
        }

        let reply: Value = self
            .execute("input_value", Some(Args { selector }), default_budget())
            .await?;
        Ok(reply.value)
    }

    /// Whether an element is currently visible.
    pub async fn is_visible(&self, selector: &str) -> E2eResult<bool> {
        #[derive(Serialize)]
        struct Args<'a> {
            selector: &'a str,
        }

        #[derive(Deserialize)]
        struct Visible {
            visible: bool,
        }

        let reply: Visible = self
            .execute("is_visible", Some(Args { selector }), default_budget())
            .await?;
        Ok(reply.visible)
    }

    /// Browser-side condition wait: resolves true once the field's trimmed
    /// value reaches `min_chars` and contains a Sinhala-block code point,
    /// false if the deadline elapses first. A lapsed deadline is an outcome
    /// here, not an error.
    pub async fn wait_settled(
        &self,
        selector: &str,
        min_chars: usize,
        timeout: Duration,
    ) -> E2eResult<bool> {
        #[derive(Serialize)]
        struct Args<'a> {
            selector: &'a str,
            min_chars: usize,
            timeout_ms: u64,
        }

        #[derive(Deserialize)]
        struct Settled {
            settled: bool,
        }

        let budget = timeout + Duration::from_millis(COMMAND_SLACK_MS);
        let reply: Settled = self
            .execute(
                "wait_settled",
                Some(Args {
                    selector,
                    min_chars,
                    timeout_ms: timeout.as_millis() as u64,
                }),
                budget,
            )
            .await?;
        Ok(reply.settled)
    }

    /// Write a full-page (or viewport) screenshot to `path`.
    pub async fn screenshot(&self, path: &Path, full_page: bool) -> E2eResult<()> {
        #[derive(Serialize)]
        struct Args<'a> {
            path: &'a str,
            full_page: bool,
        }

        let path_str = path.to_string_lossy();
        let _: Empty = self
            .execute(
                "screenshot",
                Some(Args {
                    path: &path_str,
                    full_page,
                }),
                Duration::from_millis(DEFAULT_COMMAND_BUDGET_MS + COMMAND_SLACK_MS),
            )
            .await?;
        Ok(())
    }

    /// Graceful shutdown: ask the driver to close the browser, then wait
    /// for the child to exit on its own. A hung child falls back to
    /// SIGTERM-then-kill.
    pub async fn close(mut self) -> E2eResult<()> {
        let result: E2eResult<Empty> = self
            .execute("close", None::<()>, Duration::from_secs(5))
            .await;
        if let Err(e) = result {
            warn!("driver close command failed: {}", e);
        }

        match tokio::time::timeout(Duration::from_secs(5), self.child.wait()).await {
            Ok(Ok(status)) => {
                debug!("driver exited: {}", status);
                self.stopped = true;
            }
            _ => self.stop(),
        }
        Ok(())
    }

    /// Stop the child: SIGTERM first, then kill.
    fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;

        if let Some(pid) = self.child.id() {
            debug!("stopping driver (pid: {})", pid);

            #[cfg(unix)]
            {
                use nix::sys::signal::{kill, Signal};
                use nix::unistd::Pid;

                if kill(Pid::from_raw(pid as i32), Signal::SIGTERM).is_ok() {
                    std::thread::sleep(Duration::from_millis(250));
                }
            }
        }

        let _ = self.child.start_kill();
    }
}

impl Drop for PlaywrightDriver {
    fn drop(&mut self) {
        self.stop();
    }
}

fn default_budget() -> Duration {
    Duration::from_millis(DEFAULT_COMMAND_BUDGET_MS)
}

/// Resolve the NODE_PATH the child should use. An explicit config path
/// wins; otherwise a `node_modules` next to the current directory is used
/// when present.
fn resolve_node_path(config: &DriverConfig) -> Option<PathBuf> {
    if let Some(path) = &config.node_path {
        return Some(path.clone());
    }
    let local = std::env::current_dir().ok()?.join("node_modules");
    local.is_dir().then_some(local)
}

/// Read the next protocol line, tracing and skipping `event` lines.
async fn read_protocol_line(stdout: &mut BufReader<ChildStdout>) -> E2eResult<String> {
    loop {
        let mut line = String::new();
        let n = stdout.read_line(&mut line).await?;
        if n == 0 {
            return Err(E2eError::Driver("driver closed its stdout".to_string()));
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed.starts_with("{\"event\"") {
            trace!("driver event: {}", trimmed);
            continue;
        }
        return Ok(trimmed.to_string());
    }
}

// Wire types
#[derive(Debug, Serialize)]
struct DriverCommand<A> {
    execute: String,
    id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    arguments: Option<A>,
}

#[derive(Debug, Deserialize)]
struct DriverReply {
    id: Option<u64>,
    #[serde(rename = "return")]
    result: Option<serde_json::Value>,
    error: Option<DriverFault>,
}

#[derive(Debug, Deserialize)]
struct DriverFault {
    class: String,
    desc: String,
}

#[derive(Debug, Deserialize)]
struct Greeting {
    ready: Option<ReadyInfo>,
}

#[derive(Debug, Deserialize)]
struct ReadyInfo {
    browser: String,
    #[serde(default)]
    version: String,
}

#[derive(Debug, Deserialize)]
struct Empty {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_serialization() {
        #[derive(Serialize)]
        struct Args {
            selector: String,
        }

        let cmd = DriverCommand {
            execute: "clear".to_string(),
            id: 7,
            arguments: Some(Args {
                selector: "textarea".to_string(),
            }),
        };

        let json = serde_json::to_string(&cmd).unwrap();
        assert!(json.contains("\"execute\":\"clear\""));
        assert!(json.contains("\"id\":7"));
        assert!(json.contains("\"arguments\""));
    }

    #[test]
    fn command_without_arguments_omits_field() {
        let cmd = DriverCommand {
            execute: "close".to_string(),
            id: 0,
            arguments: None::<()>,
        };
        let json = serde_json::to_string(&cmd).unwrap();
        assert!(!json.contains("arguments"));
    }

    #[test]
    fn reply_parsing() {
        let json = r#"{"id": 3, "return": {"value": "මම ගෙදර යනවා."}}"#;

        #[derive(Deserialize)]
        struct Value {
            value: String,
        }

        let reply: DriverReply = serde_json::from_str(json).unwrap();
        assert_eq!(reply.id, Some(3));

        let value: Value = serde_json::from_value(reply.result.unwrap()).unwrap();
        assert_eq!(value.value, "මම ගෙදර යනවා.");
    }

    #[test]
    fn fault_parsing() {
        let json = r#"{"id": 4, "error": {"class": "CommandFailed", "desc": "no element"}}"#;
        let reply: DriverReply = serde_json::from_str(json).unwrap();
        let fault = reply.error.unwrap();
        assert_eq!(fault.class, "CommandFailed");
        assert_eq!(fault.desc, "no element");
    }

    #[test]
    fn reply_without_id_is_recognizably_stale() {
        // BadCommand faults carry no id; the exchange loop must be able to
        // see that and skip them.
        let json = r#"{"error": {"class": "BadCommand", "desc": "unparseable"}}"#;
        let reply: DriverReply = serde_json::from_str(json).unwrap();
        assert_eq!(reply.id, None);
    }

    #[test]
    fn greeting_parsing() {
        let json = r#"{"ready": {"browser": "chromium", "version": "120.0"}}"#;
        let greeting: Greeting = serde_json::from_str(json).unwrap();
        let ready = greeting.ready.unwrap();
        assert_eq!(ready.browser, "chromium");
        assert_eq!(ready.version, "120.0");
    }

    #[test]
    fn config_serializes_browser_lowercase() {
        let config = DriverConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"browser\":\"chromium\""));
        assert!(json.contains("\"headless\":true"));
    }

    #[test]
    fn driver_source_mirrors_settledness_predicate() {
        // The browser-side predicate must check the same three conditions
        // as convergence::is_settled: trimmed non-empty, min length,
        // Sinhala block presence.
        assert!(DRIVER_SOURCE.contains("value.length >= minChars"));
        assert!(DRIVER_SOURCE.contains("/[\\u0D80-\\u0DFF]/"));
        assert!(DRIVER_SOURCE.contains(".trim()"));
    }
}
