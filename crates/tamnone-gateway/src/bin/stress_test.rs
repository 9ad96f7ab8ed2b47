//! Concurrency check for the shared transcript.
//! Resets the gateway, fires concurrent /analyze requests from several speakers, then
//! verifies /history holds exactly one line per successful analysis (no lost appends).
//! Run with the gateway up: cargo run -p tamnone-gateway --bin stress_test

use reqwest::Client;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000";
const CONCURRENT_SPEAKERS: usize = 8;
const UTTERANCES_PER_SPEAKER: usize = 4;

const LINES: &[&str] = &[
    "오늘 정말 기분이 좋아요.",
    "왜 아무도 내 말을 안 들어주지?",
    "시험 결과가 너무 걱정돼.",
    "드디어 끝났다!",
    "그 소식 듣고 깜짝 놀랐어.",
    "괜찮아, 다음에 잘하면 돼.",
];

#[tokio::main]
async fn main() {
    let base_url = std::env::var("TAMNONE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
    println!(
        "[STRESS TEST] {} speakers × {} utterances = {} requests against {}",
        CONCURRENT_SPEAKERS,
        UTTERANCES_PER_SPEAKER,
        CONCURRENT_SPEAKERS * UTTERANCES_PER_SPEAKER,
        base_url
    );

    let client = Client::new();
    if let Err(e) = client.post(format!("{}/reset", base_url)).send().await {
        eprintln!("[STRESS TEST] Gateway unreachable: {}", e);
        std::process::exit(1);
    }

    let success = Arc::new(AtomicU32::new(0));
    let failure = Arc::new(AtomicU32::new(0));
    let latencies: Arc<RwLock<Vec<f64>>> = Arc::new(RwLock::new(Vec::new()));

    let mut handles = Vec::new();
    for speaker_id in 0..CONCURRENT_SPEAKERS {
        let client = client.clone();
        let base_url = base_url.clone();
        let success = Arc::clone(&success);
        let failure = Arc::clone(&failure);
        let latencies = Arc::clone(&latencies);

        handles.push(tokio::spawn(async move {
            for n in 0..UTTERANCES_PER_SPEAKER {
                let body = json!({
                    "speaker": format!("화자{}", speaker_id + 1),
                    "text": LINES[(speaker_id + n) % LINES.len()],
                });
                let start = Instant::now();
                let res = client
                    .post(format!("{}/analyze", base_url))
                    .json(&body)
                    .send()
                    .await;
                let elapsed = start.elapsed().as_secs_f64();

                match res {
                    Ok(resp) if resp.status().is_success() => {
                        success.fetch_add(1, Ordering::Relaxed);
                        latencies.write().await.push(elapsed);
                    }
                    _ => {
                        failure.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
        }));
    }

    for h in handles {
        let _ = h.await;
    }

    let s = success.load(Ordering::Relaxed);
    let f = failure.load(Ordering::Relaxed);
    let latencies = latencies.read().await;
    let avg = if latencies.is_empty() {
        0.0
    } else {
        latencies.iter().sum::<f64>() / latencies.len() as f64
    };
    println!(
        "[STRESS TEST] Success: {} | Failure: {} | Average round trip: {:.2}s",
        s, f, avg
    );

    let history = match client.get(format!("{}/history", base_url)).send().await {
        Ok(resp) => resp.json::<Value>().await.ok(),
        Err(_) => None,
    };
    let lines = history
        .as_ref()
        .and_then(|h| h.get("history"))
        .and_then(Value::as_array)
        .map(|a| a.len())
        .unwrap_or(0);
    if lines == s as usize {
        println!("[STRESS TEST] History consistent: {} committed utterances.", lines);
    } else {
        println!(
            "[STRESS TEST] History MISMATCH: {} lines for {} successful analyses.",
            lines, s
        );
        std::process::exit(2);
    }
}
