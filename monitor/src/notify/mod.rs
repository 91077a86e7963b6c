//! Notification channel adapters
//!
//! Each adapter owns its wire format and transport. The dispatcher only hands
//! over a rendered [`Notification`] and learns whether delivery succeeded.

pub mod discord;
pub mod pushover;
pub mod telegram;

use crate::constants::http;
use crate::errors::NotifyError;
use crate::health::{AlertCategory, AlertEvent, Severity};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use tokio::time::timeout;
use tracing::debug;

pub use discord::DiscordNotifier;
pub use pushover::PushoverNotifier;
pub use telegram::TelegramNotifier;

/// Channel-neutral message
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub severity: Severity,
    /// `None` for operational notices
    pub category: Option<AlertCategory>,
    pub validator: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    pub fn from_event(event: &AlertEvent) -> Self {
        let mut lines = vec![event.summary.clone()];

        if let Some(report) = &event.report {
            lines.push(String::new());
            lines.push(format!(
                "Checks: {} ({} healthy, {} failed)",
                report.checks, report.healthy_checks, report.failed_checks
            ));
            if let Some(pct) = report.availability_percent {
                lines.push(format!("Availability: {:.2}%", pct));
            }
            lines.push(format!("Down episodes: {}", report.down_episodes));
            lines.push(format!("Current state: {}", report.verdict));
            if let Some(active) = report.in_active_set {
                lines.push(format!("Active set: {}", if active { "yes" } else { "no" }));
            }
            if let Some(uptime) = &report.uptime {
                if let Some(finalized) = uptime.finalized_count {
                    lines.push(format!("Finalized: {}", finalized));
                }
                if let Some(timeouts) = uptime.timeout_count {
                    lines.push(format!("Timeouts: {}", timeouts));
                }
            }
            for (name, value) in [
                ("CPU", report.resources.cpu_pct),
                ("RAM", report.resources.mem_pct),
                ("Disk", report.resources.disk_pct),
            ] {
                if let Some(value) = value {
                    lines.push(format!("{}: {:.1}%", name, value));
                }
            }
        }

        let mut details = Vec::new();
        if let Some(height) = event.height {
            details.push(format!("Height: {}", height));
        }
        if let Some(peers) = event.peers {
            details.push(format!("Peers: {}", peers));
        }
        if let Some(uptime) = event.uptime_percent {
            details.push(format!("Uptime: {:.2}%", uptime));
        }
        if let Some(threshold) = &event.threshold_crossed {
            details.push(format!("Threshold: {}", threshold));
        }
        if !details.is_empty() {
            lines.push(String::new());
            lines.extend(details);
        }

        Self {
            title: format!(
                "{} {} {}",
                severity_marker(event.severity, Some(event.category)),
                title_for(event.category),
                event.validator
            ),
            body: lines.join("\n"),
            severity: event.severity,
            category: Some(event.category),
            validator: Some(event.validator.clone()),
            timestamp: event.timestamp,
        }
    }

    pub fn notice(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: format!("{} {}", severity_marker(Severity::Info, None), title.into()),
            body: body.into(),
            severity: Severity::Info,
            category: None,
            validator: None,
            timestamp: Utc::now(),
        }
    }
}

fn title_for(category: AlertCategory) -> &'static str {
    match category {
        AlertCategory::Down => "DOWN",
        AlertCategory::Recovery => "RECOVERED",
        AlertCategory::Resource => "RESOURCES",
        AlertCategory::ActiveSet => "ACTIVE SET",
        AlertCategory::ConsensusTimeout => "CONSENSUS TIMEOUT",
        AlertCategory::ExtendedReport => "REPORT",
    }
}

fn severity_marker(severity: Severity, category: Option<AlertCategory>) -> &'static str {
    match (severity, category) {
        (_, Some(AlertCategory::Recovery)) => "✅",
        (_, Some(AlertCategory::ExtendedReport)) => "📊",
        (Severity::Critical, _) => "🔴",
        (Severity::Warning, _) => "🟡",
        (Severity::Info, _) => "ℹ️",
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// POST a JSON body; non-2xx and timeouts are delivery failures
pub(crate) async fn post_json<T: Serialize + ?Sized>(
    client: &Client,
    url: &str,
    body: &T,
    channel: &str,
) -> Result<(), NotifyError> {
    match timeout(http::NOTIFY_TIMEOUT, client.post(url).json(body).send()).await {
        Ok(Ok(response)) => {
            if response.status().is_success() {
                debug!("{} accepted notification", channel);
                Ok(())
            } else {
                Err(NotifyError::Rejected {
                    channel: channel.to_string(),
                    status: response.status().as_u16(),
                })
            }
        }
        Ok(Err(e)) => Err(NotifyError::Delivery {
            channel: channel.to_string(),
            reason: e.to_string(),
        }),
        Err(_) => Err(NotifyError::Timeout {
            channel: channel.to_string(),
        }),
    }
}
