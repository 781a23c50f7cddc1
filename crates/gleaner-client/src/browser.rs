use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chromiumoxide::auth::Credentials;
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::element::Element;
use chromiumoxide::layout::Point;
use chromiumoxide::{BrowserConfig, Page as CdpPage};
use futures::StreamExt;
use gleaner_core::connection::ConnectionPath;
use gleaner_core::error::AppError;
use gleaner_core::traits::{Browser, BoundingBox, Page, WaitUntil};
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

const WINDOW: (u32, u32) = (1366, 768);
const SELECTOR_POLL: Duration = Duration::from_millis(100);

/// Hides the usual automation fingerprints before any page script runs.
const STEALTH_SCRIPT: &str = r#"
Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
Object.defineProperty(navigator, 'languages', { get: () => ['en-US', 'en'] });
Object.defineProperty(navigator, 'plugins', { get: () => [1, 2, 3] });
window.chrome = window.chrome || { runtime: {} };
const originalQuery = window.navigator.permissions.query;
window.navigator.permissions.query = (parameters) => (
    parameters.name === 'notifications'
        ? Promise.resolve({ state: Notification.permission })
        : originalQuery(parameters)
);
"#;

/// How to launch Chromium.
#[derive(Debug, Clone, Default)]
pub struct LaunchOptions {
    /// Headed by default; some sites challenge headless sessions on sight.
    pub headless: bool,
    pub connection: ConnectionPath,
    /// Explicit binary, otherwise [`find_chrome_binary`] then chromiumoxide's lookup.
    pub chrome_bin: Option<PathBuf>,
}

/// One Chromium process driven over the DevTools protocol.
///
/// Clones share the process. Each [`Browser::new_page`] opens a tab with
/// the stealth script installed and, on an authenticated relay, the
/// relay credentials.
#[derive(Clone)]
pub struct ChromeBrowser {
    browser: Arc<Mutex<chromiumoxide::Browser>>,
    handler: Arc<JoinHandle<()>>,
    credentials: Option<(String, String)>,
}

impl ChromeBrowser {
    pub async fn launch(options: &LaunchOptions) -> Result<Self, AppError> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .disable_default_args()
            .window_size(WINDOW.0, WINDOW.1);

        if let Some(bin) = options.chrome_bin.clone().or_else(find_chrome_binary) {
            tracing::info!(binary = %bin.display(), "Using Chrome binary");
            builder = builder.chrome_executable(bin);
        }

        if options.headless {
            builder = builder.arg("--headless=new");
        } else {
            builder = builder.with_head();
        }

        if let Some(server) = options.connection.server() {
            builder = builder.arg(format!("--proxy-server={server}"));
        }

        let config = builder
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-popup-blocking")
            .arg("--disable-translate")
            .arg("--no-first-run")
            .arg("--lang=en-US")
            .build()
            .map_err(|e| AppError::BrowserError(format!("Browser config error: {e}")))?;

        let (browser, mut handler) = chromiumoxide::Browser::launch(config)
            .await
            .map_err(|e| AppError::BrowserError(format!("Failed to launch browser: {e}")))?;

        // The CDP handler must be polled continuously for the connection to work.
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::warn!(error = %e, "Browser CDP handler error");
                    break;
                }
            }
        });

        tracing::info!(
            headless = options.headless,
            connection = %options.connection,
            "Browser launched"
        );

        Ok(Self {
            browser: Arc::new(Mutex::new(browser)),
            handler: Arc::new(handler),
            credentials: options
                .connection
                .credentials()
                .map(|(u, p)| (u.to_string(), p.to_string())),
        })
    }

    async fn prepare(&self, page: &CdpPage) -> Result<(), AppError> {
        page.execute(AddScriptToEvaluateOnNewDocumentParams::new(STEALTH_SCRIPT))
            .await
            .map_err(automation)?;

        if let Some((username, password)) = &self.credentials {
            page.authenticate(Credentials {
                username: username.clone(),
                password: password.clone(),
            })
            .await
            .map_err(|e| AppError::BrowserError(format!("Relay authentication failed: {e}")))?;
        }
        Ok(())
    }
}

impl Browser for ChromeBrowser {
    type Page = ChromePage;

    async fn new_page(&self) -> Result<ChromePage, AppError> {
        let page = {
            let browser = self.browser.lock().await;
            browser
                .new_page("about:blank")
                .await
                .map_err(|e| AppError::BrowserError(format!("Failed to open page: {e}")))?
        };

        if let Err(e) = self.prepare(&page).await {
            let _ = page.close().await;
            return Err(e);
        }
        Ok(ChromePage { page })
    }

    async fn shutdown(&self) -> Result<(), AppError> {
        let mut browser = self.browser.lock().await;
        browser
            .close()
            .await
            .map_err(|e| AppError::BrowserError(format!("Failed to close browser: {e}")))?;
        if let Err(e) = browser.wait().await {
            tracing::warn!(error = %e, "Browser process did not exit cleanly");
        }
        self.handler.abort();
        tracing::info!("Browser shut down");
        Ok(())
    }
}

/// A Chromium tab. Queries run as page scripts with locators embedded as
/// JSON string literals.
pub struct ChromePage {
    page: CdpPage,
}

impl ChromePage {
    async fn eval(&self, script: String) -> Result<Value, AppError> {
        let result = self.page.evaluate(script).await.map_err(automation)?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    async fn eval_as<T: serde::de::DeserializeOwned>(&self, script: String) -> Result<T, AppError> {
        Ok(serde_json::from_value(self.eval(script).await?)?)
    }

    async fn element(&self, locator: &str) -> Result<Element, AppError> {
        self.page
            .find_element(locator)
            .await
            .map_err(|_| AppError::ElementNotFound(locator.to_string()))
    }

    async fn matches(&self, locator: &str, visible: bool) -> Result<bool, AppError> {
        self.eval_as(format!(
            "(() => {{ const el = document.querySelector({sel}); \
             if (!el) return false; if (!{visible}) return true; \
             const r = el.getBoundingClientRect(); const s = getComputedStyle(el); \
             return r.width > 0 && r.height > 0 \
             && s.visibility !== 'hidden' && s.display !== 'none'; }})()",
            sel = literal(locator),
        ))
        .await
    }
}

impl Page for ChromePage {
    async fn goto(&self, url: &str, wait: WaitUntil, timeout: Duration) -> Result<(), AppError> {
        let navigation = async {
            self.page
                .goto(url)
                .await
                .map_err(|e| AppError::NavigationError(format!("{url}: {e}")))?;
            if wait == WaitUntil::Load {
                self.page
                    .wait_for_navigation()
                    .await
                    .map_err(|e| AppError::NavigationError(format!("{url}: {e}")))?;
            }
            Ok(())
        };
        match tokio::time::timeout(timeout, navigation).await {
            Ok(result) => result,
            Err(_) => Err(AppError::Timeout(timeout.as_millis() as u64)),
        }
    }

    async fn url(&self) -> Result<String, AppError> {
        Ok(self.page.url().await.map_err(automation)?.unwrap_or_default())
    }

    async fn content(&self) -> Result<String, AppError> {
        self.page.content().await.map_err(automation)
    }

    async fn evaluate(&self, script: &str) -> Result<Value, AppError> {
        self.eval(script.to_string()).await
    }

    async fn count(&self, locator: &str) -> Result<usize, AppError> {
        self.eval_as(format!("document.querySelectorAll({}).length", literal(locator)))
            .await
    }

    async fn text(&self, locator: &str) -> Result<Option<String>, AppError> {
        self.eval_as(format!(
            "(() => {{ const el = document.querySelector({}); \
             return el ? el.innerText : null; }})()",
            literal(locator)
        ))
        .await
    }

    async fn texts(&self, locator: &str) -> Result<Vec<String>, AppError> {
        self.eval_as(format!(
            "Array.from(document.querySelectorAll({}), el => el.textContent || '')",
            literal(locator)
        ))
        .await
    }

    async fn attribute(&self, locator: &str, name: &str) -> Result<Option<String>, AppError> {
        self.eval_as(format!(
            "(() => {{ const el = document.querySelector({}); \
             return el ? el.getAttribute({}) : null; }})()",
            literal(locator),
            literal(name)
        ))
        .await
    }

    async fn outer_html_all(&self, locator: &str) -> Result<Vec<String>, AppError> {
        self.eval_as(format!(
            "Array.from(document.querySelectorAll({}), el => el.outerHTML)",
            literal(locator)
        ))
        .await
    }

    async fn bounding_box(&self, locator: &str) -> Result<Option<BoundingBox>, AppError> {
        self.eval_as(format!(
            "(() => {{ const el = document.querySelector({}); if (!el) return null; \
             const r = el.getBoundingClientRect(); \
             if (r.width === 0 && r.height === 0) return null; \
             return {{ x: r.x, y: r.y, width: r.width, height: r.height }}; }})()",
            literal(locator)
        ))
        .await
    }

    async fn viewport(&self) -> Result<(f64, f64), AppError> {
        self.eval_as("[window.innerWidth, window.innerHeight]".to_string())
            .await
    }

    async fn mouse_move(&self, x: f64, y: f64) -> Result<(), AppError> {
        self.page
            .move_mouse(Point::new(x, y))
            .await
            .map_err(automation)?;
        Ok(())
    }

    async fn mouse_click(&self, x: f64, y: f64) -> Result<(), AppError> {
        self.page.click(Point::new(x, y)).await.map_err(automation)?;
        Ok(())
    }

    async fn focus(&self, locator: &str) -> Result<(), AppError> {
        self.element(locator).await?.focus().await.map_err(automation)?;
        Ok(())
    }

    async fn type_text(&self, locator: &str, text: &str) -> Result<(), AppError> {
        self.element(locator)
            .await?
            .type_str(text)
            .await
            .map_err(automation)?;
        Ok(())
    }

    async fn press_key(&self, locator: &str, key: &str) -> Result<(), AppError> {
        self.element(locator)
            .await?
            .press_key(key)
            .await
            .map_err(automation)?;
        Ok(())
    }

    async fn wait_for_selector(
        &self,
        locator: &str,
        timeout: Duration,
        visible: bool,
    ) -> Result<(), AppError> {
        let poll = async {
            loop {
                if self.matches(locator, visible).await? {
                    return Ok(());
                }
                tokio::time::sleep(SELECTOR_POLL).await;
            }
        };
        match tokio::time::timeout(timeout, poll).await {
            Ok(result) => result,
            Err(_) => Err(AppError::Timeout(timeout.as_millis() as u64)),
        }
    }

    async fn close(self) -> Result<(), AppError> {
        self.page.close().await.map_err(automation)
    }
}

fn automation(e: chromiumoxide::error::CdpError) -> AppError {
    AppError::AutomationError(e.to_string())
}

/// Embeds `s` in a script as a string literal.
fn literal(s: &str) -> String {
    Value::from(s).to_string()
}

/// Tries to locate the real Chrome/Chromium binary.
///
/// The snap wrapper at `/snap/bin/chromium` strips unknown CLI flags, so the
/// real binary inside the snap is preferred. `CHROME_BIN` overrides
/// everything. `None` leaves the lookup to chromiumoxide.
pub fn find_chrome_binary() -> Option<PathBuf> {
    if let Ok(p) = std::env::var("CHROME_BIN") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
        tracing::warn!(path = %p, "CHROME_BIN does not exist, searching default locations");
    }

    [
        "/snap/chromium/current/usr/lib/chromium-browser/chrome",
        "/var/lib/flatpak/exports/bin/org.chromium.Chromium",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/google-chrome",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    ]
    .iter()
    .map(PathBuf::from)
    .find(|p| p.exists())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_escapes_quotes() {
        assert_eq!(literal(r#"a[data-testid="x"]"#), r#""a[data-testid=\"x\"]""#);
        assert_eq!(literal("it's"), r#""it's""#);
    }

    #[test]
    fn default_launch_is_headed_and_direct() {
        let options = LaunchOptions::default();
        assert!(!options.headless);
        assert_eq!(options.connection, ConnectionPath::Direct);
    }

    #[tokio::test]
    #[ignore] // Requires Chromium to be installed
    async fn reads_text_from_data_url() {
        let browser = ChromeBrowser::launch(&LaunchOptions {
            headless: true,
            ..LaunchOptions::default()
        })
        .await
        .unwrap();
        let page = browser.new_page().await.unwrap();
        page.goto(
            "data:text/html,<h1 id='t'>Hello</h1><p>a</p><p>b</p>",
            WaitUntil::Load,
            Duration::from_secs(10),
        )
        .await
        .unwrap();

        assert_eq!(page.text("#t").await.unwrap().as_deref(), Some("Hello"));
        assert_eq!(page.count("p").await.unwrap(), 2);
        assert!(page.bounding_box("#t").await.unwrap().is_some());
        assert_eq!(page.text("#missing").await.unwrap(), None);

        page.close().await.unwrap();
        browser.shutdown().await.unwrap();
    }
}
