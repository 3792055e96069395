//! Polling metrics transport: one "connection" per observed project that
//! fetches the project's Prometheus-format metrics endpoint on the
//! configured cadence and converts each exposition line into a
//! [`MetricSample`] batch.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use confmig_core::stream::{MetricsConnection, MetricsTransport, TransportError};
use confmig_protocol::MetricSample;
use reqwest::StatusCode;
use tracing::debug;

pub struct PollingMetricsTransport {
    client: reqwest::Client,
    token: Option<String>,
    refresh: Duration,
}

impl PollingMetricsTransport {
    pub fn new(token: Option<String>, refresh: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            token,
            refresh,
        }
    }
}

#[async_trait]
impl MetricsTransport for PollingMetricsTransport {
    async fn connect(
        &self,
        project_ref: &str,
    ) -> Result<Box<dyn MetricsConnection>, TransportError> {
        let token = self
            .token
            .clone()
            .ok_or_else(|| TransportError::Connect("no management API token configured".into()))?;
        let url = format!("https://{project_ref}.supabase.co/customer/v1/privileged/metrics");
        let conn = PollingConnection {
            client: self.client.clone(),
            url,
            token,
            refresh: self.refresh,
            first_poll: true,
        };
        Ok(Box::new(conn))
    }
}

struct PollingConnection {
    client: reqwest::Client,
    url: String,
    token: String,
    refresh: Duration,
    first_poll: bool,
}

#[async_trait]
impl MetricsConnection for PollingConnection {
    async fn next_batch(&mut self) -> Result<Vec<MetricSample>, TransportError> {
        if self.first_poll {
            self.first_poll = false;
        } else {
            tokio::time::sleep(self.refresh).await;
        }
        let response = self
            .client
            .get(&self.url)
            .basic_auth("service_role", Some(&self.token))
            .send()
            .await
            .map_err(|e| TransportError::Closed(e.to_string()))?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(TransportError::Protocol(format!("HTTP {status}")));
        }
        if !status.is_success() {
            return Err(TransportError::Closed(format!("HTTP {status}")));
        }
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Closed(e.to_string()))?;
        let samples = parse_exposition(&body);
        debug!(url = %self.url, count = samples.len(), "metrics poll complete");
        Ok(samples)
    }
}

/// Parse Prometheus text exposition into samples. Comment and blank lines
/// are skipped; a line is `name{labels} value [timestamp]`. Labels stay
/// an opaque string; malformed lines are dropped rather than failing the
/// whole batch.
pub fn parse_exposition(body: &str) -> Vec<MetricSample> {
    let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    body.lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                return None;
            }
            let (series, rest) = if line.contains('{') {
                // The closing brace must be found outside quoted label
                // values; an unterminated label set drops the line.
                let end = closing_brace(line)?;
                let (series, rest) = line.split_at(end + 1);
                (series, rest.trim())
            } else {
                let mut parts = line.splitn(2, ' ');
                (parts.next()?, parts.next()?.trim())
            };
            let value = rest.split_whitespace().next()?;
            let (name, labels) = match series.find('{') {
                Some(open) => (&series[..open], &series[open..]),
                None => (series, ""),
            };
            if name.is_empty() {
                return None;
            }
            Some(MetricSample {
                timestamp: now.clone(),
                metric_name: name.to_string(),
                labels: labels.to_string(),
                value: value.to_string(),
            })
        })
        .collect()
}

/// Index of the first `}` that sits outside a quoted label value,
/// honoring `\"` escapes inside quotes.
fn closing_brace(line: &str) -> Option<usize> {
    let mut in_quotes = false;
    let mut escaped = false;
    for (idx, ch) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            '}' if !in_quotes => return Some(idx),
            _ => {}
        }
    }
    None
}
