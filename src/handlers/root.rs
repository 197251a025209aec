//! Root endpoint handler for the landing page.
//!
//! Shows observer state, the observed limits and the available endpoints.

use axum::{
    extract::State,
    response::{Html, IntoResponse},
};
use std::fmt::Write as FmtWrite;
use tracing::{debug, instrument};

use crate::handlers::health::FOOTER_TEXT;
use crate::state::SharedState;

/// Escapes text for HTML element content.
fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Handler for the root `/` endpoint.
#[instrument(skip(state))]
pub async fn root_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing / request");

    let version = env!("CARGO_PKG_VERSION");
    let status = state.observer.status().await;

    let uptime_secs = state.start_time.elapsed().as_secs();
    let uptime_str = format!(
        "{}h {}m {}s",
        uptime_secs / 3600,
        (uptime_secs % 3600) / 60,
        uptime_secs % 60
    );
    let observer_str = if status.running { "running" } else { "stopped" };

    let mut rows = String::new();
    for limit in &status.limits {
        writeln!(
            rows,
            "        <tr><td><code>{}</code></td><td>{}</td><td>{} {:.1}</td><td>{} / {}</td><td class=\"state-{}\">{}</td></tr>",
            escape_html(&limit.key),
            escape_html(&limit.display_name),
            limit.comparison,
            limit.threshold,
            limit.badness,
            limit.badness_threshold,
            limit.state,
            limit.state
        )
        .ok();
    }

    let html = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Herakles Limit Notifier</title>
    <style>
        body {{ font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; margin: 0; padding: 20px; background: #f5f5f5; line-height: 1.6; }}
        .container {{ max-width: 900px; margin: 0 auto; background: white; padding: 40px; border-radius: 8px; box-shadow: 0 2px 8px rgba(0,0,0,0.1); }}
        h1 {{ color: #333; border-bottom: 3px solid #007bff; padding-bottom: 15px; margin-bottom: 10px; }}
        h2 {{ color: #555; margin-top: 35px; margin-bottom: 15px; }}
        .info {{ background: #e9ecef; padding: 15px; border-radius: 4px; margin: 20px 0; display: flex; justify-content: space-around; flex-wrap: wrap; }}
        .info-label {{ font-weight: 600; color: #555; display: block; font-size: 0.9em; }}
        .info-value {{ font-size: 1.2em; color: #007bff; }}
        table {{ border-collapse: collapse; width: 100%; }}
        th, td {{ text-align: left; padding: 6px 10px; border-bottom: 1px solid #ddd; }}
        .state-normal {{ color: #28a745; }}
        .state-accumulating {{ color: #fd7e14; }}
        .state-notified {{ color: #dc3545; font-weight: 600; }}
        .endpoint-list {{ list-style: none; padding: 0; }}
        .endpoint-list li {{ margin: 12px 0; padding: 10px 15px; background: #f8f9fa; border-left: 4px solid #007bff; border-radius: 4px; }}
        .footer {{ margin-top: 40px; padding-top: 20px; border-top: 1px solid #ddd; color: #666; font-size: 0.9em; text-align: center; }}
        code {{ background: #e9ecef; padding: 2px 6px; border-radius: 3px; font-family: 'Courier New', monospace; }}
    </style>
</head>
<body>
<div class="container">
    <h1>Herakles Limit Notifier</h1>
    <p>Observed host: <code>{hostname}</code></p>

    <div class="info">
        <div><span class="info-label">Version</span><span class="info-value">{version}</span></div>
        <div><span class="info-label">Uptime</span><span class="info-value">{uptime}</span></div>
        <div><span class="info-label">Observer</span><span class="info-value">{observer}</span></div>
        <div><span class="info-label">Next check in</span><span class="info-value">{next_check}</span></div>
    </div>

    <h2>Limits</h2>
    <table>
        <tr><th>Key</th><th>Name</th><th>Healthy while</th><th>Badness</th><th>State</th></tr>
{rows}    </table>

    <h2>Available Endpoints</h2>
    <ul class="endpoint-list">
        <li><a href="/observer/status">GET /observer/status</a> - observer state, statistics and limits (JSON)</li>
        <li><a href="/health">GET /health</a> - liveness and run statistics (text)</li>
        <li><a href="/info">GET /info</a> - system information message (text)</li>
        <li><a href="/metrics">GET /metrics</a> - Prometheus metrics</li>
        <li><code>POST /observer/start</code>, <code>/stop</code>, <code>/restart</code> - control the observer loop</li>
        <li><code>POST /observer/check</code> - run one check now</li>
        <li><code>POST /observer/reset</code> - clear badness and notification state</li>
        <li><code>POST /observer/reset-stats</code> - zero the run statistics</li>
    </ul>

    <div class="footer">
        <p>{footer}</p>
    </div>
</div>
</body>
</html>"#,
        hostname = escape_html(&state.hostname),
        version = version,
        uptime = uptime_str,
        observer = observer_str,
        next_check = status.next_check_in,
        rows = rows,
        footer = FOOTER_TEXT
    );

    Html(html)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html("<b>\"/data\" & co</b>"),
            "&lt;b&gt;&quot;/data&quot; &amp; co&lt;/b&gt;"
        );
    }
}
