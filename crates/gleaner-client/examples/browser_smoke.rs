/// Smoke-test for `ChromeBrowser`.
///
/// Launches a headless Chromium, opens <https://example.com>, and checks the
/// page through the same query surface the extractors use.
///
/// Run with:
///   cargo run --example browser_smoke --features browser
use std::time::Duration;

use gleaner_client::{ChromeBrowser, LaunchOptions};
use gleaner_core::traits::{Browser, Page, WaitUntil};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("info")
        .init();

    println!("Launching headless browser…");
    let browser = ChromeBrowser::launch(&LaunchOptions {
        headless: true,
        ..LaunchOptions::default()
    })
    .await?;

    let page = browser.new_page().await?;
    let url = "https://example.com";
    println!("Opening {url} …");
    page.goto(url, WaitUntil::Load, Duration::from_secs(30)).await?;

    let heading = page.text("h1").await?;
    assert_eq!(heading.as_deref(), Some("Example Domain"));

    let links = page.count("a").await?;
    assert!(links >= 1, "Expected at least one link, found {links}");

    let webdriver = page.evaluate("navigator.webdriver === undefined").await?;
    assert_eq!(webdriver, serde_json::Value::Bool(true), "webdriver flag still visible");

    let html = page.content().await?;
    println!("OK: got {} bytes of rendered HTML, {links} link(s)", html.len());

    page.close().await?;
    browser.shutdown().await?;
    Ok(())
}
