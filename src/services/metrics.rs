// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

use crate::infrastructure::network::pool::EndpointPool;
use crate::services::dispatch::context::RunContext;
use crate::services::dispatch::engine::RunSummary;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Serves run counters as Prometheus text on `/` and as JSON on `/summary`.
pub async fn spawn_metrics_server(
    port: u16,
    ctx: Arc<RunContext>,
    pool: Arc<EndpointPool>,
) -> Option<SocketAddr> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = match TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::warn!(target: "metrics", "Metrics server failed to bind: {}", e);
            return None;
        }
    };

    let local = listener.local_addr().ok();
    if let Some(addr) = local {
        tracing::info!(target: "metrics", "Metrics server listening on {}", addr);
    }

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let mut buf = [0u8; 1024];
                    let n = socket.read(&mut buf).await.unwrap_or(0);
                    let req = String::from_utf8_lossy(&buf[..n]).to_string();
                    let path = req
                        .lines()
                        .next()
                        .and_then(|l| l.split_whitespace().nth(1))
                        .unwrap_or("/");

                    let (content_type, body) = if path.starts_with("/summary") {
                        ("application/json", render_summary_json(&ctx, &pool))
                    } else {
                        ("text/plain", render_metrics(&ctx, &pool))
                    };
                    let response = format!(
                        "HTTP/1.1 200 OK\r\nContent-Type: {}\r\nContent-Length: {}\r\n\r\n{}",
                        content_type,
                        body.len(),
                        body
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                }
                Err(e) => {
                    tracing::warn!(target: "metrics", "Metrics accept error: {}", e);
                    continue;
                }
            }
        }
    });

    local
}

fn render_metrics(ctx: &RunContext, pool: &EndpointPool) -> String {
    let counters = ctx.snapshot();
    let summary = RunSummary::from_context(ctx);
    let mut body = format!(
        concat!(
            "# TYPE loadgen_dispatched counter\nloadgen_dispatched {}\n",
            "# TYPE loadgen_submitted counter\nloadgen_submitted {}\n",
            "# TYPE loadgen_failed_dispatches counter\nloadgen_failed_dispatches {}\n",
            "# TYPE loadgen_confirmed counter\nloadgen_confirmed {}\n",
            "# TYPE loadgen_reverted counter\nloadgen_reverted {}\n",
            "# TYPE loadgen_watch_errors counter\nloadgen_watch_errors {}\n",
            "# TYPE loadgen_timeouts counter\nloadgen_timeouts {}\n",
            "# TYPE loadgen_in_flight gauge\nloadgen_in_flight {}\n",
            "# TYPE loadgen_fees_paid_wei counter\nloadgen_fees_paid_wei {}\n",
            "# TYPE loadgen_endpoints_good gauge\nloadgen_endpoints_good {}\n",
            "# TYPE loadgen_endpoints_total gauge\nloadgen_endpoints_total {}\n"
        ),
        summary.dispatched,
        summary.submitted,
        summary.failed_dispatches,
        summary.confirmed,
        summary.reverted,
        summary.watch_errors,
        summary.timeouts,
        counters.in_flight,
        summary.fees_paid,
        pool.good_count(),
        pool.len(),
    );
    if let Some(free) = ctx.gate().available() {
        body.push_str(&format!(
            "# TYPE loadgen_admission_free gauge\nloadgen_admission_free {}\n",
            free
        ));
    }
    body
}

fn render_summary_json(ctx: &RunContext, pool: &EndpointPool) -> String {
    let counters = ctx.snapshot();
    let summary = RunSummary::from_context(ctx);
    json!({
        "dispatched": summary.dispatched,
        "submitted": summary.submitted,
        "inFlight": counters.in_flight,
        "failedDispatches": summary.failed_dispatches,
        "confirmed": summary.confirmed,
        "reverted": summary.reverted,
        "watchErrors": summary.watch_errors,
        "timeouts": summary.timeouts,
        "feesPaidWei": summary.fees_paid.to_string(),
        "elapsedMs": summary.elapsed.as_millis() as u64,
        "endpoints": pool.good_names(),
        "aborted": ctx.fatal().is_raised(),
    })
    .to_string()
}
