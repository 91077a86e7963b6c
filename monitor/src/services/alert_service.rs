// File: monitor/src/services/alert_service.rs
//! Alert dispatcher
//!
//! Decides per channel whether an event goes out, sends it, and records
//! successful deliveries in the validator's alert ledger:
//!
//! - primary and secondary channels get every event, at most once per
//!   (validator, category) within the cooldown; extended reports skip the
//!   cooldown, and neither reports nor critical events take a token from the
//!   channel bucket
//! - the emergency channel gets critical events only, once per validator per
//!   emergency cooldown, independent of the primary channel and never rate limited
//!
//! A failure on one channel never stops delivery on the others. Critical
//! events that failed on a channel stay in the ledger and are resent on later
//! dispatches until delivered, superseded by a recovery, or older than the
//! retry window.

use super::rate_limiter::TokenBucket;
use crate::config::Config;
use crate::constants::alerts;
use crate::health::{AlertCategory, AlertEvent, AlertLedger, ChannelKind, Severity};
use crate::notify::{DiscordNotifier, Notification, Notifier, PushoverNotifier, TelegramNotifier};
use chrono::{Duration, Utc};
use futures::future::join_all;
use reqwest::Client;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

struct ChannelSlot {
    kind: ChannelKind,
    notifier: Arc<dyn Notifier>,
    bucket: Option<Mutex<TokenBucket>>,
}

impl ChannelSlot {
    fn new(kind: ChannelKind, notifier: Arc<dyn Notifier>, per_minute: Option<u32>) -> Self {
        Self {
            kind,
            notifier,
            bucket: per_minute.map(|n| Mutex::new(TokenBucket::per_minute(n))),
        }
    }

    async fn take_token(&self) -> bool {
        match &self.bucket {
            Some(bucket) => bucket.lock().await.try_acquire(),
            None => true,
        }
    }
}

/// Outcome of one dispatch call, per (channel, category)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchReport {
    pub delivered: Vec<(ChannelKind, AlertCategory)>,
    pub suppressed: Vec<(ChannelKind, AlertCategory)>,
    pub failed: Vec<(ChannelKind, AlertCategory)>,
    /// Earlier failed critical alerts delivered now; also listed in `delivered`
    pub retried: Vec<(ChannelKind, AlertCategory)>,
}

impl DispatchReport {
    pub fn delivered_to(&self, kind: ChannelKind) -> usize {
        self.delivered.iter().filter(|(k, _)| *k == kind).count()
    }
}

pub struct AlertService {
    primary: Option<ChannelSlot>,
    emergency: Option<ChannelSlot>,
    secondary: Option<ChannelSlot>,
    cooldown: Duration,
    emergency_cooldown: Duration,
}

impl AlertService {
    pub fn new(cooldown: Duration, emergency_cooldown: Duration) -> Self {
        Self {
            primary: None,
            emergency: None,
            secondary: None,
            cooldown,
            emergency_cooldown,
        }
    }

    pub fn from_config(config: &Config, client: Client) -> Self {
        let mut service = Self::new(config.alert_cooldown(), config.emergency_cooldown());

        if config.telegram.enabled {
            service = service.with_primary(
                Arc::new(TelegramNotifier::new(client.clone(), config.telegram.clone())),
                alerts::TELEGRAM_MESSAGES_PER_MINUTE,
            );
        }
        if config.pushover.enabled {
            service = service.with_emergency(Arc::new(PushoverNotifier::new(
                client.clone(),
                config.pushover.clone(),
            )));
        }
        if config.discord.enabled {
            service = service.with_secondary(
                Arc::new(DiscordNotifier::new(client, config.discord.clone())),
                alerts::DISCORD_MESSAGES_PER_MINUTE,
            );
        }

        info!(
            "Alert channels: primary={}, emergency={}, secondary={}",
            service.primary.is_some(),
            service.emergency.is_some(),
            service.secondary.is_some()
        );
        service
    }

    pub fn with_primary(mut self, notifier: Arc<dyn Notifier>, per_minute: u32) -> Self {
        self.primary = Some(ChannelSlot::new(ChannelKind::Primary, notifier, Some(per_minute)));
        self
    }

    /// Emergency channel; carries critical events only, so it has no token bucket
    pub fn with_emergency(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.emergency = Some(ChannelSlot::new(ChannelKind::Emergency, notifier, None));
        self
    }

    pub fn with_secondary(mut self, notifier: Arc<dyn Notifier>, per_minute: u32) -> Self {
        self.secondary = Some(ChannelSlot::new(ChannelKind::Secondary, notifier, Some(per_minute)));
        self
    }

    fn slot(&self, kind: ChannelKind) -> Option<&ChannelSlot> {
        match kind {
            ChannelKind::Primary => self.primary.as_ref(),
            ChannelKind::Emergency => self.emergency.as_ref(),
            ChannelKind::Secondary => self.secondary.as_ref(),
        }
    }

    pub fn has_channels(&self) -> bool {
        self.primary.is_some() || self.emergency.is_some() || self.secondary.is_some()
    }

    /// Resend queued critical alerts, then deliver the tick's events and
    /// update the ledger with successful sends
    pub async fn dispatch(&self, events: &[AlertEvent], ledger: &mut AlertLedger) -> DispatchReport {
        let mut report = DispatchReport::default();

        let recovered = events.iter().any(|e| e.category == AlertCategory::Recovery);
        self.retry_pending(ledger, recovered, &mut report).await;

        for event in events {
            let notification = Notification::from_event(event);
            let mut targets: Vec<&ChannelSlot> = Vec::new();

            for slot in [&self.primary, &self.secondary].into_iter().flatten() {
                if self.allow_broadcast(slot, event, ledger).await {
                    targets.push(slot);
                } else {
                    report.suppressed.push((slot.kind, event.category));
                }
            }

            if let Some(slot) = &self.emergency {
                if event.severity == Severity::Critical {
                    if self.allow_emergency(event, ledger) {
                        targets.push(slot);
                    } else {
                        report.suppressed.push((slot.kind, event.category));
                    }
                }
            }

            let rendered = &notification;
            let results = join_all(targets.iter().map(|slot| async move {
                (slot.kind, slot.notifier.name(), slot.notifier.send(rendered).await)
            }))
            .await;

            for (kind, channel, result) in results {
                match result {
                    Ok(()) => {
                        info!(
                            "{} alert for {} delivered via {}",
                            event.category, event.validator, channel
                        );
                        ledger.record(kind, event.category, event.timestamp);
                        if kind == ChannelKind::Emergency {
                            ledger.last_emergency = Some(event.timestamp);
                        }
                        report.delivered.push((kind, event.category));
                    }
                    Err(e) => {
                        warn!(
                            "{} alert for {} not delivered: {}",
                            event.category, event.validator, e
                        );
                        if event.severity == Severity::Critical {
                            ledger.queue_retry(kind, event, Utc::now());
                        }
                        report.failed.push((kind, event.category));
                    }
                }
            }

            if event.category == AlertCategory::Recovery && ledger.last_emergency.take().is_some() {
                debug!("Emergency cooldown reset for {}", event.validator);
            }
        }

        report
    }

    /// Resend critical alerts whose delivery failed on an earlier dispatch.
    /// Cooldowns and token buckets do not apply to them.
    async fn retry_pending(&self, ledger: &mut AlertLedger, recovered: bool, report: &mut DispatchReport) {
        if ledger.pending.is_empty() {
            return;
        }
        let now = Utc::now();
        let window = Duration::seconds(alerts::CRITICAL_RETRY_WINDOW_SECONDS);

        for mut pending in std::mem::take(&mut ledger.pending) {
            let event = &pending.event;
            if recovered {
                info!(
                    "Dropping undelivered {} alert for {}, validator recovered",
                    event.category, event.validator
                );
                continue;
            }
            if now - pending.first_failed_at > window {
                warn!(
                    "Giving up on {} alert for {} via {} after {} attempt(s)",
                    event.category, event.validator, pending.channel, pending.attempts
                );
                continue;
            }
            let Some(slot) = self.slot(pending.channel) else {
                continue;
            };

            match slot.notifier.send(&Notification::from_event(event)).await {
                Ok(()) => {
                    info!(
                        "{} alert for {} delivered via {} on retry {}",
                        event.category,
                        event.validator,
                        slot.notifier.name(),
                        pending.attempts
                    );
                    ledger.record(pending.channel, event.category, event.timestamp);
                    if pending.channel == ChannelKind::Emergency {
                        ledger.last_emergency = Some(event.timestamp);
                    }
                    report.delivered.push((pending.channel, event.category));
                    report.retried.push((pending.channel, event.category));
                }
                Err(e) => {
                    debug!(
                        "Retry of {} alert for {} via {} failed: {}",
                        event.category,
                        event.validator,
                        slot.notifier.name(),
                        e
                    );
                    pending.attempts += 1;
                    ledger.pending.push(pending);
                }
            }
        }
    }

    async fn allow_broadcast(&self, slot: &ChannelSlot, event: &AlertEvent, ledger: &AlertLedger) -> bool {
        if event.category != AlertCategory::ExtendedReport {
            if let Some(last) = ledger.last_sent_at(slot.kind, event.category) {
                if event.timestamp - last < self.cooldown {
                    debug!(
                        "{} {} alert for {} in cooldown",
                        slot.kind, event.category, event.validator
                    );
                    return false;
                }
            }
        }

        let exempt = event.severity == Severity::Critical || event.category == AlertCategory::ExtendedReport;
        if !exempt && !slot.take_token().await {
            warn!(
                "{} rate limit exceeded, dropping {} alert for {}",
                slot.notifier.name(),
                event.category,
                event.validator
            );
            return false;
        }
        true
    }

    fn allow_emergency(&self, event: &AlertEvent, ledger: &AlertLedger) -> bool {
        if let Some(last) = ledger.last_emergency {
            let elapsed = event.timestamp - last;
            if elapsed < self.emergency_cooldown {
                info!(
                    "Emergency alert for {} in cooldown ({}s remaining)",
                    event.validator,
                    (self.emergency_cooldown - elapsed).num_seconds()
                );
                return false;
            }
        }
        true
    }

    /// Startup and shutdown notices to the primary and secondary channels; returns deliveries
    pub async fn broadcast_notice(&self, notification: &Notification) -> usize {
        let mut targets = Vec::new();
        for slot in [&self.primary, &self.secondary].into_iter().flatten() {
            if slot.take_token().await {
                targets.push(slot);
            }
        }

        let results = join_all(targets.iter().map(|slot| slot.notifier.send(notification))).await;

        let mut delivered = 0;
        for (slot, result) in targets.iter().zip(results) {
            match result {
                Ok(()) => delivered += 1,
                Err(e) => warn!("Notice via {} not delivered: {}", slot.notifier.name(), e),
            }
        }
        delivered
    }
}
