//! Upload stage

use crate::error::{AppError, Result};
use crate::models::TransferSample;
use futures::StreamExt;
use rand::distr::Alphanumeric;
use rand::Rng;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Size of the body pieces handed to the connection
const UPLOAD_CHUNK: usize = 64 * 1024;

/// How often the stall watchdog looks at the progress clock
const STALL_CHECK: Duration = Duration::from_millis(100);

/// Random ASCII letters and digits
pub fn generate_payload(size: usize) -> Vec<u8> {
    rand::rng().sample_iter(Alphanumeric).take(size).collect()
}

/// Milliseconds since `started` at which the exchange last made progress
#[derive(Debug, Clone)]
struct ProgressClock {
    started: Instant,
    last_ms: Arc<AtomicU64>,
}

impl ProgressClock {
    fn start() -> Self {
        Self {
            started: Instant::now(),
            last_ms: Arc::new(AtomicU64::new(0)),
        }
    }

    fn tick(&self) {
        let now = self.started.elapsed().as_millis() as u64;
        self.last_ms.store(now, Ordering::Relaxed);
    }

    fn idle(&self) -> Duration {
        let last = Duration::from_millis(self.last_ms.load(Ordering::Relaxed));
        self.started.elapsed().saturating_sub(last)
    }
}

/// Drive `exchange` to completion unless it goes `stall_timeout` without a tick
async fn until_stalled<F: Future>(exchange: F, clock: &ProgressClock, stall_timeout: Duration) -> Result<F::Output> {
    tokio::pin!(exchange);
    let mut check = tokio::time::interval(STALL_CHECK.min(stall_timeout));
    loop {
        tokio::select! {
            output = &mut exchange => return Ok(output),
            _ = check.tick() => {
                if clock.idle() >= stall_timeout {
                    return Err(AppError::timeout(format!("upload stalled for {:?}", stall_timeout)));
                }
            }
        }
    }
}

/// POST `payload` to one candidate; any status below 400 is a success and
/// the rate covers the whole exchange.
///
/// The body is streamed in pieces and `stall_timeout` is measured from the
/// last piece the connection accepted, so a slow uplink that keeps moving is
/// never cut off. Waiting for the response counts as idle time.
pub async fn upload_sample(
    client: &reqwest::Client,
    url: &str,
    payload: &[u8],
    stall_timeout: Duration,
) -> Result<TransferSample> {
    let clock = ProgressClock::start();
    let pieces: Vec<Vec<u8>> = payload.chunks(UPLOAD_CHUNK).map(<[u8]>::to_vec).collect();
    let body_clock = clock.clone();
    let body = futures::stream::iter(pieces).map(move |piece| {
        body_clock.tick();
        Ok::<_, std::io::Error>(piece)
    });

    let started = Instant::now();
    let request = client
        .post(url)
        .header(CONTENT_TYPE, "application/octet-stream")
        .header(CONTENT_LENGTH, payload.len())
        .body(reqwest::Body::wrap_stream(body))
        .send();
    let response = until_stalled(request, &clock, stall_timeout).await??;

    let status = response.status().as_u16();
    if status >= 400 {
        return Err(AppError::http_request(format!("HTTP {}", status)));
    }

    Ok(TransferSample {
        url: url.to_string(),
        bytes: payload.len() as u64,
        elapsed: started.elapsed(),
    })
}
