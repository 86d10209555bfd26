//! Playwright browser session
//!
//! A long-lived node process drives one browser page. Requests and responses
//! are JSON lines over the child's stdin/stdout:
//!
//! ```text
//! <- {"ready":true}
//! -> {"id":1,"op":"navigate","url":"https://www.saucedemo.com/"}
//! <- {"id":1,"ok":true,"value":null}
//! -> {"id":2,"op":"visible","element":{"selector":{"by":"css","css":".inventory_list"}}}
//! <- {"id":2,"ok":false,"error":"..."}
//! ```

use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use flowprobe_engine::{ElementRef, FlowError, FlowResult, SessionHandle};
use serde::Deserialize;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command as TokioCommand};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{E2eError, E2eResult};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
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

impl FromStr for Browser {
    type Err = E2eError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chromium" => Ok(Browser::Chromium),
            "firefox" => Ok(Browser::Firefox),
            "webkit" => Ok(Browser::Webkit),
            other => Err(E2eError::Bridge(format!("unknown browser '{}'", other))),
        }
    }
}

/// Configuration for Playwright
#[derive(Debug, Clone)]
pub struct PlaywrightConfig {
    pub browser: Browser,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,

    /// Directory `require('playwright')` resolves from
    pub node_modules: PathBuf,

    /// Playwright's own per-action timeout
    pub action_timeout: Duration,

    /// Upper bound on one bridge round trip, on top of the action timeout
    pub request_timeout: Duration,

    /// Time allowed for the browser to launch
    pub startup_timeout: Duration,
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self {
            browser: Browser::Chromium,
            headless: true,
            viewport_width: 1280,
            viewport_height: 720,
            node_modules: PathBuf::from("node_modules"),
            action_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(30),
            startup_timeout: Duration::from_secs(60),
        }
    }
}

const BRIDGE_SCRIPT: &str = r#"
const readline = require('readline');
const { chromium, firefox, webkit } = require('playwright');

const escapeRegex = (s) => s.replace(/[.*+?^${}()|[\]\\]/g, '\\$&');

(async () => {
  const browserType = { chromium, firefox, webkit }[process.env.FLOWPROBE_BROWSER || 'chromium'];
  const browser = await browserType.launch({ headless: process.env.FLOWPROBE_HEADLESS !== '0' });
  const context = await browser.newContext({
    viewport: {
      width: Number(process.env.FLOWPROBE_VIEWPORT_WIDTH || 1280),
      height: Number(process.env.FLOWPROBE_VIEWPORT_HEIGHT || 720),
    },
  });
  const page = await context.newPage();
  page.setDefaultTimeout(Number(process.env.FLOWPROBE_ACTION_TIMEOUT_MS || 5000));

  const locate = (element) => {
    const s = element.selector;
    let locator;
    switch (s.by) {
      case 'role':
        locator = page.getByRole(s.role, { name: new RegExp('^' + escapeRegex(s.name) + '$', 'i') });
        break;
      case 'placeholder':
        locator = page.getByPlaceholder(s.text, { exact: true });
        break;
      case 'text':
        locator = page.getByText(s.text, { exact: true });
        break;
      case 'css':
        locator = page.locator(s.css);
        break;
      default:
        throw new Error('unknown selector kind: ' + s.by);
    }
    return element.nth === undefined || element.nth === null ? locator : locator.nth(element.nth);
  };

  const handle = async (req) => {
    switch (req.op) {
      case 'navigate':
        await page.goto(req.url);
        return null;
      case 'url':
        return page.url();
      case 'click':
        await locate(req.element).click();
        return null;
      case 'fill':
        await locate(req.element).fill(req.text);
        return null;
      case 'visible':
        return await locate(req.element).first().isVisible();
      case 'text':
        return (await locate(req.element).textContent()) || '';
      case 'count':
        return await locate(req.element).count();
      case 'close':
        return null;
      default:
        throw new Error('unknown op: ' + req.op);
    }
  };

  const send = (msg) => process.stdout.write(JSON.stringify(msg) + '\n');
  send({ ready: true });

  const rl = readline.createInterface({ input: process.stdin });
  for await (const line of rl) {
    if (!line.trim()) continue;
    let req;
    try {
      req = JSON.parse(line);
    } catch (e) {
      console.error('unparseable request: ' + line);
      continue;
    }
    try {
      send({ id: req.id, ok: true, value: await handle(req) });
    } catch (e) {
      send({ id: req.id, ok: false, error: e.message });
    }
    if (req.op === 'close') break;
  }

  await browser.close();
})().catch((e) => {
  console.error(e.stack || String(e));
  process.exit(1);
});
"#;

#[derive(Debug, Deserialize)]
struct BridgeMessage {
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    ready: bool,
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    error: Option<String>,
}

struct Bridge {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    next_id: u64,
}

impl Bridge {
    async fn read_message(&mut self) -> E2eResult<BridgeMessage> {
        loop {
            let line = self
                .stdout
                .next_line()
                .await?
                .ok_or_else(|| E2eError::Bridge("bridge process closed its output".to_string()))?;

            match serde_json::from_str::<BridgeMessage>(&line) {
                Ok(message) => return Ok(message),
                Err(_) => debug!("[bridge stdout] {}", line),
            }
        }
    }

    async fn call(&mut self, mut request: Value) -> E2eResult<Value> {
        self.next_id += 1;
        let id = self.next_id;
        request["id"] = json!(id);

        let mut line = serde_json::to_string(&request)?;
        line.push('\n');
        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.flush().await?;

        loop {
            let message = self.read_message().await?;
            if message.id != Some(id) {
                warn!("Dropping stale bridge response {:?} (waiting for {})", message.id, id);
                continue;
            }
            if message.ok {
                return Ok(message.value);
            }
            return Err(E2eError::Bridge(
                message.error.unwrap_or_else(|| "unknown bridge failure".to_string()),
            ));
        }
    }
}

/// A [`SessionHandle`] backed by a real browser
pub struct PlaywrightSession {
    bridge: Mutex<Bridge>,
    pid: Option<u32>,
    request_timeout: Duration,
    // Holds the bridge script for the lifetime of the child
    _script_dir: TempDir,
}

impl PlaywrightSession {
    /// Write the bridge script, start node and wait for the browser
    pub async fn launch(config: PlaywrightConfig) -> E2eResult<Self> {
        check_playwright_installed()?;

        let script_dir = tempfile::tempdir()?;
        let script_path = script_dir.path().join("bridge.js");
        std::fs::write(&script_path, BRIDGE_SCRIPT)?;

        let node_path = std::fs::canonicalize(&config.node_modules).unwrap_or(config.node_modules.clone());
        info!("Launching {} via Playwright bridge", config.browser.as_str());

        let mut child = TokioCommand::new("node")
            .arg(&script_path)
            .env("NODE_PATH", node_path)
            .env("FLOWPROBE_BROWSER", config.browser.as_str())
            .env("FLOWPROBE_HEADLESS", if config.headless { "1" } else { "0" })
            .env("FLOWPROBE_VIEWPORT_WIDTH", config.viewport_width.to_string())
            .env("FLOWPROBE_VIEWPORT_HEIGHT", config.viewport_height.to_string())
            .env("FLOWPROBE_ACTION_TIMEOUT_MS", config.action_timeout.as_millis().to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| E2eError::Bridge(format!("failed to spawn node: {}", e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| E2eError::Bridge("bridge stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| E2eError::Bridge("bridge stdout unavailable".to_string()))?;
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    warn!("[bridge] {}", line);
                }
            });
        }

        let pid = child.id();
        let mut bridge = Bridge {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
            next_id: 0,
        };

        let ready = tokio::time::timeout(config.startup_timeout, bridge.read_message())
            .await
            .map_err(|_| E2eError::Timeout("browser launch".to_string()))??;
        if !ready.ready {
            return Err(E2eError::Bridge(format!("unexpected first message: {:?}", ready)));
        }

        info!("Browser ready (pid: {:?})", pid);
        Ok(Self {
            bridge: Mutex::new(bridge),
            pid,
            request_timeout: config.request_timeout + config.action_timeout,
            _script_dir: script_dir,
        })
    }

    async fn request(&self, request: Value) -> E2eResult<Value> {
        let op = request["op"].as_str().unwrap_or_default().to_string();
        let mut bridge = self.bridge.lock().await;
        tokio::time::timeout(self.request_timeout, bridge.call(request))
            .await
            .map_err(|_| E2eError::Timeout(format!("bridge op '{}'", op)))?
    }

    async fn element_request(&self, op: &str, element: &ElementRef) -> FlowResult<Value> {
        Ok(self.request(json!({ "op": op, "element": element })).await?)
    }

    /// Ask the bridge to close the browser, then make sure the child is gone
    pub async fn close(&self) -> E2eResult<()> {
        info!("Closing browser (pid: {:?})", self.pid);
        if let Err(e) = self.request(json!({ "op": "close" })).await {
            debug!("Bridge close request failed: {}", e);
        }

        let mut bridge = self.bridge.lock().await;
        if tokio::time::timeout(Duration::from_secs(5), bridge.child.wait())
            .await
            .is_ok()
        {
            return Ok(());
        }

        #[cfg(unix)]
        if let Some(pid) = self.pid {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            if kill(Pid::from_raw(pid as i32), Signal::SIGTERM).is_ok()
                && tokio::time::timeout(Duration::from_millis(500), bridge.child.wait())
                    .await
                    .is_ok()
            {
                return Ok(());
            }
        }

        bridge.child.kill().await?;
        Ok(())
    }
}

#[async_trait]
impl SessionHandle for PlaywrightSession {
    async fn navigate_to(&self, url: &str) -> FlowResult<()> {
        self.request(json!({ "op": "navigate", "url": url })).await?;
        Ok(())
    }

    async fn current_url(&self) -> FlowResult<String> {
        let value = self.request(json!({ "op": "url" })).await?;
        as_string(value)
    }

    async fn click(&self, element: &ElementRef) -> FlowResult<()> {
        self.element_request("click", element).await?;
        Ok(())
    }

    async fn fill(&self, element: &ElementRef, text: &str) -> FlowResult<()> {
        self.request(json!({ "op": "fill", "element": element, "text": text }))
            .await?;
        Ok(())
    }

    async fn is_visible(&self, element: &ElementRef) -> FlowResult<bool> {
        let value = self.element_request("visible", element).await?;
        value
            .as_bool()
            .ok_or_else(|| FlowError::Driver(format!("visible returned {}", value)))
    }

    async fn text_content(&self, element: &ElementRef) -> FlowResult<String> {
        let value = self.element_request("text", element).await?;
        as_string(value)
    }

    async fn count(&self, element: &ElementRef) -> FlowResult<usize> {
        let value = self.element_request("count", element).await?;
        value
            .as_u64()
            .map(|n| n as usize)
            .ok_or_else(|| FlowError::Driver(format!("count returned {}", value)))
    }
}

fn as_string(value: Value) -> FlowResult<String> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(FlowError::Driver(format!("expected a string, got {}", other))),
    }
}

/// Check if Playwright is installed
pub fn check_playwright_installed() -> E2eResult<()> {
    let output = Command::new("npx")
        .args(["playwright", "--version"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();

    match output {
        Ok(status) if status.success() => Ok(()),
        _ => Err(E2eError::PlaywrightNotFound),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowprobe_engine::Selector;
    use test_case::test_case;

    #[test_case("chromium", Browser::Chromium)]
    #[test_case("firefox", Browser::Firefox)]
    #[test_case("webkit", Browser::Webkit)]
    fn test_browser_names(name: &str, browser: Browser) {
        assert_eq!(name.parse::<Browser>().unwrap(), browser);
        assert_eq!(browser.as_str(), name);
    }

    #[test]
    fn test_unknown_browser() {
        assert!("netscape".parse::<Browser>().is_err());
    }

    #[test]
    fn test_element_request_shape() {
        let element = ElementRef::new(Selector::button("Add to cart")).first();
        let request = json!({ "op": "click", "element": element });
        assert_eq!(
            request,
            json!({
                "op": "click",
                "element": {
                    "selector": { "by": "role", "role": "button", "name": "Add to cart" },
                    "nth": 0
                }
            })
        );
    }

    #[test]
    fn test_bridge_messages_parse() {
        let ready: BridgeMessage = serde_json::from_str(r#"{"ready":true}"#).unwrap();
        assert!(ready.ready && ready.id.is_none());

        let failed: BridgeMessage =
            serde_json::from_str(r#"{"id":3,"ok":false,"error":"Timeout 5000ms exceeded"}"#).unwrap();
        assert_eq!(failed.id, Some(3));
        assert!(!failed.ok);
        assert_eq!(failed.error.as_deref(), Some("Timeout 5000ms exceeded"));
    }

    #[test]
    fn test_bridge_script_covers_every_op() {
        for op in ["navigate", "url", "click", "fill", "visible", "text", "count", "close"] {
            assert!(BRIDGE_SCRIPT.contains(&format!("case '{}'", op)), "missing op {}", op);
        }
    }
}
