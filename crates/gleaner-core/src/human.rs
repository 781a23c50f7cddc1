//! Human-like pointer movement and typing.
//!
//! Pointer paths are cubic Bézier curves from a random point in the
//! viewport to the target's center, with control points jittered off the
//! straight line. Typing goes one character at a time with random pauses.
//! Nothing here retries; a missing element propagates as
//! [`AppError::ElementNotFound`].

use std::time::Duration;

use rand::Rng;

use crate::error::AppError;
use crate::traits::Page;

/// Distance kept from the viewport edges when picking a start point.
const VIEWPORT_MARGIN: f64 = 50.0;
/// Maximum offset of a control point off the chord.
const CONTROL_JITTER: f64 = 80.0;
const MIN_WAYPOINTS: usize = 20;
const MAX_WAYPOINTS: usize = 35;

/// Samples `n` points (n >= 2) along a jittered cubic Bézier from `start`
/// to `end`. The first point is `start`, the last is `end`.
pub fn cursor_path<R: Rng>(
    start: (f64, f64),
    end: (f64, f64),
    n: usize,
    rng: &mut R,
) -> Vec<(f64, f64)> {
    let n = n.max(2);
    let (dx, dy) = (end.0 - start.0, end.1 - start.1);
    let length = (dx * dx + dy * dy).sqrt();
    // Unit normal to the chord; axis-aligned jitter for a zero-length move.
    let (nx, ny) = if length > f64::EPSILON {
        (-dy / length, dx / length)
    } else {
        (0.0, 1.0)
    };

    let mut control = |lo: f64, hi: f64| {
        let t = rng.gen_range(lo..hi);
        let offset = rng.gen_range(-CONTROL_JITTER..=CONTROL_JITTER);
        (
            start.0 + dx * t + nx * offset,
            start.1 + dy * t + ny * offset,
        )
    };
    let c1 = control(0.2, 0.4);
    let c2 = control(0.6, 0.8);

    (0..n)
        .map(|i| {
            if i == 0 {
                return start;
            }
            if i == n - 1 {
                return end;
            }
            let t = i as f64 / (n - 1) as f64;
            let u = 1.0 - t;
            let (a, b, c, d) = (u * u * u, 3.0 * u * u * t, 3.0 * u * t * t, t * t * t);
            (
                a * start.0 + b * c1.0 + c * c2.0 + d * end.0,
                a * start.1 + b * c1.1 + c * c2.1 + d * end.1,
            )
        })
        .collect()
}

/// Moves the pointer along a curved path to the element's center and
/// clicks it.
pub async fn move_and_click<P: Page>(page: &P, locator: &str) -> Result<(), AppError> {
    let target = page
        .bounding_box(locator)
        .await?
        .ok_or_else(|| AppError::ElementNotFound(locator.to_string()))?;
    let (width, height) = page.viewport().await?;

    // ThreadRng is not Send; finish with it before the first await.
    let (path, pauses) = {
        let mut rng = rand::thread_rng();
        let start = (
            random_coordinate(&mut rng, width),
            random_coordinate(&mut rng, height),
        );
        let n = rng.gen_range(MIN_WAYPOINTS..=MAX_WAYPOINTS);
        let path = cursor_path(start, target.center(), n, &mut rng);
        let pauses: Vec<u64> = (0..path.len()).map(|_| rng.gen_range(5..=25)).collect();
        (path, pauses)
    };

    for (&(x, y), &pause) in path.iter().zip(&pauses) {
        page.mouse_move(x, y).await?;
        tokio::time::sleep(Duration::from_millis(pause)).await;
    }

    let (x, y) = target.center();
    page.mouse_click(x, y).await?;
    tracing::debug!(locator, waypoints = path.len(), "Clicked along pointer path");
    Ok(())
}

/// Clears the field and types `text` one character at a time.
pub async fn human_type<P: Page>(page: &P, locator: &str, text: &str) -> Result<(), AppError> {
    page.focus(locator).await?;
    let selector = serde_json::to_string(locator)?;
    page.evaluate(&format!(
        "(() => {{ const el = document.querySelector({selector}); \
         if (el && el.select) el.select(); return true; }})()"
    ))
    .await?;
    page.press_key(locator, "Backspace").await?;

    let pauses: Vec<u64> = {
        let mut rng = rand::thread_rng();
        text.chars().map(|_| rng.gen_range(50..=250)).collect()
    };
    let mut buf = [0u8; 4];
    for (ch, pause) in text.chars().zip(pauses) {
        page.type_text(locator, ch.encode_utf8(&mut buf)).await?;
        tokio::time::sleep(Duration::from_millis(pause)).await;
    }
    tracing::debug!(locator, chars = text.chars().count(), "Typed input");
    Ok(())
}

fn random_coordinate<R: Rng>(rng: &mut R, extent: f64) -> f64 {
    if extent > 2.0 * VIEWPORT_MARGIN {
        rng.gen_range(VIEWPORT_MARGIN..extent - VIEWPORT_MARGIN)
    } else {
        extent / 2.0
    }
}
