//! Streaming download stage

use super::SpeedTestPlan;
use crate::error::{AppError, Result};
use crate::models::{metrics::mbps, TransferSample};
use crate::types::ProgressSender;
use futures::StreamExt;
use std::time::Instant;
use tokio::time::timeout;

/// Progress percentage used for live download rate updates
pub const LIVE_PROGRESS: f64 = 30.0;

/// Download from one candidate and return the measured sample.
///
/// The clock starts once response headers arrive. `transfer_timeout` bounds
/// the wait for the headers and for each body chunk, not the whole transfer,
/// so a slow link that keeps delivering is still measured.
///
/// Reading stops at the first chunk that brings the total to
/// `early_stop_bytes`; the rest of the body is never pulled. Chunk sizes are
/// whatever the transport delivers, so the total may overshoot the threshold
/// by up to one frame. A sample is rejected when it is too small or too fast
/// to trust, or when the stream broke before `min_bytes_after_error`.
pub async fn download_sample(
    client: &reqwest::Client,
    url: &str,
    plan: &SpeedTestPlan,
    progress: &ProgressSender,
) -> Result<TransferSample> {
    let response = timeout(plan.transfer_timeout, client.get(url).send())
        .await
        .map_err(|_| {
            AppError::timeout(format!("no response from {} within {:?}", url, plan.transfer_timeout))
        })??;

    let status = response.status();
    if status != reqwest::StatusCode::OK {
        return Err(AppError::http_request(format!("HTTP {}", status.as_u16())));
    }

    let started = Instant::now();
    let mut received: u64 = 0;
    let mut stream = response.bytes_stream();

    loop {
        let next = match timeout(plan.transfer_timeout, stream.next()).await {
            Ok(Some(next)) => next.map_err(|e| e.to_string()),
            Ok(None) => break,
            Err(_) => Err(format!("stalled for {:?}", plan.transfer_timeout)),
        };
        match next {
            Ok(bytes) => {
                received += bytes.len() as u64;
                let rate = mbps(received, started.elapsed());
                if rate > 0.0 {
                    progress.status(LIVE_PROGRESS, format!("Download speed: {:.2} Mbps", rate));
                }
                if received >= plan.early_stop_bytes {
                    break;
                }
            }
            Err(e) => {
                if received < plan.min_bytes_after_error {
                    return Err(AppError::network(format!(
                        "stream failed after {} bytes: {}",
                        received, e
                    )));
                }
                break;
            }
        }
    }
    drop(stream);

    let elapsed = started.elapsed();
    if received < plan.min_bytes || elapsed < plan.min_elapsed {
        return Err(AppError::test_execution(format!(
            "sample too small or too fast: {} bytes in {:.2}s",
            received,
            elapsed.as_secs_f64()
        )));
    }

    Ok(TransferSample {
        url: url.to_string(),
        bytes: received,
        elapsed,
    })
}
