use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::domain::{
    Alert, AlertChannel, AlertPriority, ChannelStates, DeliveryStatus, DispatchReport,
    DispatchedAlert, Recipient,
};
use crate::ports::AlertTransport;
use crate::resilience::{Backoff, CircuitBreaker};

#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Non-critical deliveries admitted per rolling minute.
    pub rate_limit_per_minute: usize,
    /// Repeat dedup keys inside this TTL deliver nothing.
    pub dedup_ttl: chrono::Duration,
    pub transport_timeout: Duration,
    /// One retry on transport failure.
    pub max_attempts: u32,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            rate_limit_per_minute: 10,
            dedup_ttl: chrono::Duration::minutes(10),
            transport_timeout: Duration::from_secs(5),
            max_attempts: 2,
        }
    }
}

/// Alert Dispatcher service. The rate limiter, dedup ledger, and per-channel
/// circuit breakers are process-lived; per-batch state stays in the call.
pub struct AlertDispatcher {
    transport: Arc<dyn AlertTransport>,
    config: DispatchConfig,
    rate: Mutex<super::rate_limit::RollingRateLimiter>,
    dedup: Mutex<HashMap<String, DateTime<Utc>>>,
    breakers: HashMap<AlertChannel, CircuitBreaker>,
}

impl AlertDispatcher {
    pub fn new(transport: Arc<dyn AlertTransport>, config: DispatchConfig) -> Self {
        let rate = Mutex::new(super::rate_limit::RollingRateLimiter::new(
            config.rate_limit_per_minute,
            chrono::Duration::seconds(60),
        ));
        let breakers = [
            AlertChannel::Sms,
            AlertChannel::Voice,
            AlertChannel::Email,
            AlertChannel::Push,
        ]
        .into_iter()
        .map(|c| (c, CircuitBreaker::default()))
        .collect();
        Self {
            transport,
            config,
            rate,
            dedup: Mutex::new(HashMap::new()),
            breakers,
        }
    }

    /// Dispatch a batch of alerts.
    ///
    /// Under stated overload only critical and high alerts are processed;
    /// the rest are deferred in priority order. Non-critical alerts are
    /// subject to the rolling rate limit; critical alerts bypass it but are
    /// still recorded against it.
    pub async fn dispatch(
        &self,
        alerts: Vec<Alert>,
        recipients: &[Recipient],
        channel_states: &ChannelStates,
        overload: bool,
        now: DateTime<Utc>,
    ) -> DispatchReport {
        let preference: HashMap<u64, AlertChannel> = recipients
            .iter()
            .map(|r| (r.id, r.preferred_channel))
            .collect();

        let mut report = DispatchReport::default();

        let mut pending = alerts;
        if overload {
            // Priority queue semantics: critical > high > medium > low.
            pending.sort_by(|a, b| b.priority.cmp(&a.priority));
            let (process, defer): (Vec<Alert>, Vec<Alert>) = pending
                .into_iter()
                .partition(|a| a.priority >= AlertPriority::High);
            report.deferred = defer;
            pending = process;
        }

        for alert in pending {
            if self.is_duplicate(&alert, now) {
                report.deduped.push(alert);
                continue;
            }

            if alert.priority == AlertPriority::Critical {
                self.rate
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .record(now);
            } else {
                let admitted = self
                    .rate
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .try_acquire(now);
                if let Err(next_allowed) = admitted {
                    report.dropped.push(DispatchedAlert {
                        channel_used: alert.channel,
                        alert,
                        status: DeliveryStatus::Dropped,
                        attempts: 0,
                        next_allowed_time: Some(next_allowed),
                    });
                    continue;
                }
            }

            let channel = self.select_channel(&alert, &preference, channel_states);
            let dispatched = self.deliver(alert, channel).await;
            match dispatched.status {
                DeliveryStatus::Delivered => {
                    self.remember(&dispatched.alert, now);
                    report.delivered.push(dispatched);
                }
                _ => report.failed.push(dispatched),
            }
        }

        report
    }

    fn is_duplicate(&self, alert: &Alert, now: DateTime<Utc>) -> bool {
        let mut dedup = self.dedup.lock().unwrap_or_else(|e| e.into_inner());
        dedup.retain(|_, seen| now - *seen < self.config.dedup_ttl);
        dedup.contains_key(&alert.dedup_key)
    }

    fn remember(&self, alert: &Alert, now: DateTime<Utc>) {
        let mut dedup = self.dedup.lock().unwrap_or_else(|e| e.into_inner());
        dedup.insert(alert.dedup_key.clone(), now);
    }

    /// Recipient preference first, then the fallback map while the chosen
    /// channel is marked unavailable.
    fn select_channel(
        &self,
        alert: &Alert,
        preference: &HashMap<u64, AlertChannel>,
        channel_states: &ChannelStates,
    ) -> AlertChannel {
        let primary = preference
            .get(&alert.recipient_id)
            .copied()
            .unwrap_or(alert.channel);
        let available = |c: AlertChannel| channel_states.get(&c).copied().unwrap_or(true);
        if available(primary) {
            return primary;
        }
        let fallback = primary.fallback();
        if available(fallback) {
            return fallback;
        }
        // Both down: keep the fallback and let the transport surface the
        // failure.
        fallback
    }

    async fn deliver(&self, alert: Alert, channel: AlertChannel) -> DispatchedAlert {
        let breaker = &self.breakers[&channel];
        let mut backoff = Backoff::default();
        let mut attempts = 0;

        while attempts < self.config.max_attempts {
            if !breaker.try_acquire() {
                tracing::warn!(channel = channel.as_str(), "alert channel circuit open");
                break;
            }
            attempts += 1;

            let sent = tokio::time::timeout(
                self.config.transport_timeout,
                self.transport.send(channel, alert.recipient_id, &alert.payload),
            )
            .await;

            match sent {
                Ok(Ok(result)) if result.accepted => {
                    breaker.record_success();
                    return DispatchedAlert {
                        alert,
                        status: DeliveryStatus::Delivered,
                        attempts,
                        next_allowed_time: None,
                        channel_used: channel,
                    };
                }
                Ok(Ok(_)) | Ok(Err(_)) | Err(_) => {
                    breaker.record_failure();
                    if attempts < self.config.max_attempts {
                        tokio::time::sleep(backoff.next_delay()).await;
                    }
                }
            }
        }

        DispatchedAlert {
            alert,
            status: DeliveryStatus::Failed,
            attempts,
            next_allowed_time: None,
            channel_used: channel,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::alert_transport::MockAlertTransport;
    use crate::ports::DeliveryResult;

    fn alert(id: u64, priority: AlertPriority, key: &str) -> Alert {
        Alert {
            recipient_id: id,
            channel: AlertChannel::Sms,
            priority,
            payload: format!("alert for {id}"),
            created_at: Utc::now(),
            dedup_key: key.to_string(),
        }
    }

    fn accepting_transport() -> MockAlertTransport {
        let mut transport = MockAlertTransport::new();
        transport.expect_send().returning(|_, _, _| {
            Ok(DeliveryResult {
                accepted: true,
                provider_message_id: Some("msg-1".to_string()),
            })
        });
        transport
    }

    fn recipients(n: u64) -> Vec<Recipient> {
        (1..=n)
            .map(|id| Recipient {
                id,
                preferred_channel: AlertChannel::Sms,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_rate_limit_drops_excess_non_critical() {
        let dispatcher =
            AlertDispatcher::new(Arc::new(accepting_transport()), DispatchConfig::default());
        let alerts: Vec<Alert> = (1..=15)
            .map(|i| alert(i, AlertPriority::Medium, &format!("k{i}")))
            .collect();
        let now = Utc::now();

        let report = dispatcher
            .dispatch(alerts, &recipients(15), &ChannelStates::new(), false, now)
            .await;

        assert_eq!(report.delivered.len(), 10);
        assert_eq!(report.dropped.len(), 5);
        for dropped in &report.dropped {
            assert_eq!(dropped.status, DeliveryStatus::Dropped);
            assert!(dropped.next_allowed_time.is_some());
        }
    }

    #[tokio::test]
    async fn test_critical_bypasses_rate_limit() {
        let dispatcher =
            AlertDispatcher::new(Arc::new(accepting_transport()), DispatchConfig::default());
        let mut alerts: Vec<Alert> = (1..=12)
            .map(|i| alert(i, AlertPriority::Medium, &format!("k{i}")))
            .collect();
        alerts.push(alert(99, AlertPriority::Critical, "crit"));
        let now = Utc::now();

        let report = dispatcher
            .dispatch(alerts, &recipients(99), &ChannelStates::new(), false, now)
            .await;

        assert!(report
            .delivered
            .iter()
            .any(|d| d.alert.priority == AlertPriority::Critical));
        // 10 medium delivered, 2 dropped, critical delivered on top.
        assert_eq!(report.delivered.len(), 11);
        assert_eq!(report.dropped.len(), 2);
    }

    #[tokio::test]
    async fn test_overload_defers_low_priority() {
        let dispatcher =
            AlertDispatcher::new(Arc::new(accepting_transport()), DispatchConfig::default());
        let alerts = vec![
            alert(1, AlertPriority::Low, "a"),
            alert(2, AlertPriority::Critical, "b"),
            alert(3, AlertPriority::Medium, "c"),
            alert(4, AlertPriority::High, "d"),
        ];

        let report = dispatcher
            .dispatch(alerts, &recipients(4), &ChannelStates::new(), true, Utc::now())
            .await;

        assert_eq!(report.delivered.len(), 2);
        assert_eq!(report.deferred.len(), 2);
        // Critical processed ahead of high.
        assert_eq!(report.delivered[0].alert.priority, AlertPriority::Critical);
        assert!(report
            .deferred
            .iter()
            .all(|a| a.priority < AlertPriority::High));
    }

    #[tokio::test]
    async fn test_dedup_key_suppresses_repeat() {
        let dispatcher =
            AlertDispatcher::new(Arc::new(accepting_transport()), DispatchConfig::default());
        let now = Utc::now();

        let first = dispatcher
            .dispatch(
                vec![alert(1, AlertPriority::Medium, "same-key")],
                &recipients(1),
                &ChannelStates::new(),
                false,
                now,
            )
            .await;
        assert_eq!(first.delivered.len(), 1);

        let second = dispatcher
            .dispatch(
                vec![alert(1, AlertPriority::Medium, "same-key")],
                &recipients(1),
                &ChannelStates::new(),
                false,
                now + chrono::Duration::seconds(5),
            )
            .await;
        assert!(second.delivered.is_empty());
        assert_eq!(second.deduped.len(), 1);
    }

    #[tokio::test]
    async fn test_unavailable_channel_falls_back() {
        let mut transport = MockAlertTransport::new();
        transport
            .expect_send()
            .withf(|channel, _, _| *channel == AlertChannel::Voice)
            .returning(|_, _, _| {
                Ok(DeliveryResult {
                    accepted: true,
                    provider_message_id: None,
                })
            });
        let dispatcher = AlertDispatcher::new(Arc::new(transport), DispatchConfig::default());

        let mut states = ChannelStates::new();
        states.insert(AlertChannel::Sms, false);

        let report = dispatcher
            .dispatch(
                vec![alert(1, AlertPriority::Medium, "k")],
                &recipients(1),
                &states,
                false,
                Utc::now(),
            )
            .await;

        assert_eq!(report.delivered.len(), 1);
        assert_eq!(report.delivered[0].channel_used, AlertChannel::Voice);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_send_retries_once_then_fails() {
        let mut transport = MockAlertTransport::new();
        transport
            .expect_send()
            .times(2)
            .returning(|_, _, _| Err(anyhow::anyhow!("gateway down")));
        let dispatcher = AlertDispatcher::new(Arc::new(transport), DispatchConfig::default());

        let report = dispatcher
            .dispatch(
                vec![alert(1, AlertPriority::Medium, "k")],
                &recipients(1),
                &ChannelStates::new(),
                false,
                Utc::now(),
            )
            .await;

        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].attempts, 2);
        assert_eq!(report.failed[0].status, DeliveryStatus::Failed);
    }
}
