use crate::output::TestResult;
use crate::sse_client::{parse_frames, Connection};
use anyhow::Result;
use colored::*;
use reqwest::{StatusCode, Url};
use serde_json::{json, Value};
use std::time::{Duration, Instant};

const PATCH_ELEMENTS: &str = "datastar-patch-elements";
const PATCH_SIGNALS: &str = "datastar-patch-signals";

/// Builds `{base_url}{path}?datastar=<json>`.
fn signals_url(base_url: &str, path: &str, signals: &Value) -> Result<String> {
    let url = Url::parse_with_params(
        &format!("{base_url}{path}"),
        &[("datastar", signals.to_string())],
    )?;
    Ok(url.to_string())
}

async fn post_signals(
    client: &reqwest::Client,
    url: &str,
    body: String,
) -> Result<(StatusCode, String)> {
    let response = client
        .post(url)
        .header("datastar-request", "true")
        .header("content-type", "application/json")
        .body(body)
        .send()
        .await?;
    let status = response.status();
    Ok((status, response.text().await?))
}

fn finish(name: &str, start: Instant, outcome: Result<()>) -> TestResult {
    match outcome {
        Ok(()) => {
            println!("{} {}", "✓".green(), name);
            TestResult::pass(name, start.elapsed())
        }
        Err(e) => {
            println!("{} {}: {}", "✗".red(), name, e);
            TestResult::fail(name, e.to_string(), start.elapsed())
        }
    }
}

pub async fn test_health(client: &reqwest::Client, base_url: &str) -> Result<TestResult> {
    let start = Instant::now();
    let outcome = async {
        let response = client.get(format!("{base_url}/health")).send().await?;
        anyhow::ensure!(
            response.status() == StatusCode::OK,
            "unexpected status {}",
            response.status()
        );
        Ok::<_, anyhow::Error>(())
    }
    .await;
    Ok(finish("Health check", start, outcome))
}

pub async fn test_hello(base_url: &str, timeout: Duration) -> Result<TestResult> {
    let start = Instant::now();
    let outcome = async {
        let url = signals_url(base_url, "/hello", &json!({ "delay": 0 }))?;
        let mut connection = Connection::establish(&url, "hello".to_string()).await?;
        let events = connection.collect_until_closed(timeout).await?;

        let patches: Vec<_> = events
            .iter()
            .filter(|event| event.event_type == PATCH_ELEMENTS)
            .collect();
        anyhow::ensure!(!patches.is_empty(), "no element patches received");

        let last = patches[patches.len() - 1];
        anyhow::ensure!(
            last.data_lines()
                .any(|line| line == "elements <div id=\"message\">Hello, world!</div>"),
            "final patch did not carry the full message: {:?}",
            last.data
        );
        Ok::<_, anyhow::Error>(())
    }
    .await;
    Ok(finish("Hello stream", start, outcome))
}

pub async fn test_signals_get(base_url: &str, timeout: Duration) -> Result<TestResult> {
    let start = Instant::now();
    let outcome = async {
        let url = signals_url(base_url, "/signals", &json!({ "count": 42 }))?;
        let mut connection = Connection::establish(&url, "signals".to_string()).await?;
        let event = connection.wait_for_event(PATCH_SIGNALS, timeout).await?;

        anyhow::ensure!(
            event.data == "signals {\"count\":42}",
            "unexpected signals payload: {:?}",
            event.data
        );
        Ok::<_, anyhow::Error>(())
    }
    .await;
    Ok(finish("Signals echo (GET)", start, outcome))
}

pub async fn test_signals_post(client: &reqwest::Client, base_url: &str) -> Result<TestResult> {
    let start = Instant::now();
    let outcome = async {
        let body = json!({ "name": "ada", "tags": ["a", "b"] }).to_string();
        let (status, text) = post_signals(client, &format!("{base_url}/signals"), body).await?;
        anyhow::ensure!(status == StatusCode::OK, "unexpected status {status}");

        let frames = parse_frames(&text);
        let signals = frames
            .iter()
            .find(|frame| frame.event.as_deref() == Some(PATCH_SIGNALS))
            .ok_or_else(|| anyhow::anyhow!("no patch-signals frame in {text:?}"))?;
        anyhow::ensure!(
            signals.data == vec!["signals {\"name\":\"ada\",\"tags\":[\"a\",\"b\"]}"],
            "unexpected data lines: {:?}",
            signals.data
        );
        Ok::<_, anyhow::Error>(())
    }
    .await;
    Ok(finish("Signals echo (POST)", start, outcome))
}

pub async fn test_malformed_signals(client: &reqwest::Client, base_url: &str) -> Result<TestResult> {
    let start = Instant::now();
    let outcome = async {
        let (status, text) =
            post_signals(client, &format!("{base_url}/signals"), "not-json".to_string()).await?;
        anyhow::ensure!(
            status == StatusCode::BAD_REQUEST,
            "expected 400, got {status}"
        );
        anyhow::ensure!(!text.is_empty(), "400 response carried no parse message");
        Ok::<_, anyhow::Error>(())
    }
    .await;
    Ok(finish("Malformed signals", start, outcome))
}

pub async fn test_conformance(client: &reqwest::Client, base_url: &str) -> Result<TestResult> {
    let start = Instant::now();
    let outcome = async {
        let batch = json!({
            "events": [
                {"type": "patchElements", "elements": "<div>hi</div>", "selector": "#c", "mode": "append"},
                {"type": "unknownKind"},
                {"type": "patchSignals", "signals-raw": "{\"a\":1}\n{\"b\":2}", "onlyIfMissing": true},
                {"type": "executeScript", "script": "console.log(1)", "attributes": {"type": "module"}}
            ]
        });
        let (status, text) =
            post_signals(client, &format!("{base_url}/test"), batch.to_string()).await?;
        anyhow::ensure!(status == StatusCode::OK, "unexpected status {status}");

        let frames = parse_frames(&text);
        anyhow::ensure!(frames.len() == 4, "expected preamble + 3 frames, got {frames:?}");
        anyhow::ensure!(frames[0].retry.is_some(), "missing retry preamble");
        anyhow::ensure!(
            frames[1].data == vec!["mode append", "selector #c", "elements <div>hi</div>"],
            "unexpected element patch {:?}",
            frames[1].data
        );
        anyhow::ensure!(
            frames[2].data == vec!["onlyIfMissing true", "signals {\"a\":1}", "signals {\"b\":2}"],
            "unexpected signals patch {:?}",
            frames[2].data
        );
        anyhow::ensure!(
            frames[3].data.last().map(String::as_str)
                == Some("elements <script type=\"module\" data-effect=\"el.remove()\">console.log(1)</script>"),
            "unexpected script patch {:?}",
            frames[3].data
        );
        Ok::<_, anyhow::Error>(())
    }
    .await;
    Ok(finish("Conformance batch", start, outcome))
}

pub async fn test_ticks(base_url: &str, timeout: Duration) -> Result<TestResult> {
    let start = Instant::now();
    let outcome = async {
        let mut connection =
            Connection::establish(&format!("{base_url}/ticks"), "ticks".to_string()).await?;
        let first = connection.wait_for_event(PATCH_SIGNALS, timeout).await?;
        let second = connection.wait_for_event(PATCH_SIGNALS, timeout).await?;

        anyhow::ensure!(
            first.data == "signals {\"ticks\":0}" && second.data == "signals {\"ticks\":1}",
            "unexpected ticks {:?} then {:?}",
            first.data,
            second.data
        );
        anyhow::ensure!(
            second.timestamp > first.timestamp,
            "ticks arrived out of order"
        );
        Ok::<_, anyhow::Error>(())
    }
    .await;
    Ok(finish("Ticker stream", start, outcome))
}
