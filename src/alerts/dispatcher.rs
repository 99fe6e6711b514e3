//! Breach Alert Dispatcher
//!
//! Long-lived consumer of published reports. Each report passes through
//! `MONITORING -> EVALUATING -> (ALERTING ->) MONITORING`; non-compliant
//! reports produce exactly one alert keyed by report identity, so redelivered
//! events are recognised and dropped.
//!
//! Only marking and classification happen under the dispatcher lock; webhook
//! delivery runs after it is released (see [`dispatch`]).

use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::report::{ComplianceReport, ReportId, ReportUpdated};
use crate::reserve::{BREACH_RATIO_BPS, StablecoinSymbol};

use super::webhook::{AlertLevel, AlertPayload, DeliveryStatus, WebhookSender, deliver};

/// Source label on alert webhooks
pub const ALERT_SOURCE: &str = "StableGuard Breach Monitor";

/// Report identities remembered for duplicate suppression
pub const DEFAULT_SEEN_CAPACITY: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DispatcherState {
    Monitoring,
    Evaluating,
    Alerting,
}

/// Alert emitted for one non-compliant report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub level: AlertLevel,
    pub stablecoin: String,
    pub ratio_bps: u16,
    pub message: String,
    pub timestamp: u64,
    pub source_report: ReportId,
    pub tx_hash: String,
}

impl Alert {
    fn to_payload(&self, compliant: bool) -> AlertPayload {
        let mut payload = AlertPayload::new(
            self.level,
            self.message.clone(),
            self.timestamp.to_string(),
            ALERT_SOURCE,
        );
        payload.stablecoin = Some(self.stablecoin.clone());
        payload.ratio = Some(self.ratio_bps);
        payload.compliant = Some(compliant);
        payload.tx_hash = Some(self.tx_hash.clone());
        payload.report_id = Some(self.source_report.to_string());
        payload
    }
}

/// Alert classified under the lock and awaiting delivery
#[derive(Debug, Clone)]
pub struct PendingAlert {
    pub alert: Alert,
    pub payload: AlertPayload,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Report compliant
    NoAlert,
    Dispatched(Alert),
    /// Report identity already handled
    Duplicate,
    /// Alert built but the channel was unreachable; not retried
    DeliveryFailed(Alert),
}

impl DispatchOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchOutcome::NoAlert => "no_alert",
            DispatchOutcome::Dispatched(_) => "alert_dispatched",
            DispatchOutcome::Duplicate => "duplicate",
            DispatchOutcome::DeliveryFailed(_) => "alert_delivery_failed",
        }
    }
}

/// Severity for a report, `None` when compliant
pub fn classify(report: &ComplianceReport) -> Option<AlertLevel> {
    if report.compliant {
        None
    } else if report.ratio_bps < BREACH_RATIO_BPS {
        Some(AlertLevel::Emergency)
    } else {
        Some(AlertLevel::Critical)
    }
}

fn alert_message(report: &ComplianceReport, level: AlertLevel) -> String {
    let findings: Vec<&str> = report
        .failed_checks()
        .iter()
        .map(|reason| reason.description())
        .collect();

    match level {
        AlertLevel::Emergency => format!(
            "{} reserve ratio {}% is below 100% backing ({})",
            report.symbol,
            report.ratio_percent(),
            report.status_tier()
        ),
        _ => format!(
            "{} is non-compliant at {}% ({}): {}",
            report.symbol,
            report.ratio_percent(),
            report.status_tier(),
            findings.join("; ")
        ),
    }
}

pub struct BreachAlertDispatcher {
    state: DispatcherState,
    seen: HashSet<ReportId>,
    seen_order: VecDeque<ReportId>,
    capacity: usize,
    /// Newest timestamp per symbol evicted from the seen-set
    evicted_through: HashMap<StablecoinSymbol, u64>,
    alerts_sent: u64,
}

impl BreachAlertDispatcher {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: DispatcherState::Monitoring,
            seen: HashSet::new(),
            seen_order: VecDeque::new(),
            capacity: capacity.max(1),
            evicted_through: HashMap::new(),
            alerts_sent: 0,
        }
    }

    pub fn state(&self) -> DispatcherState {
        self.state
    }

    pub fn alerts_sent(&self) -> u64 {
        self.alerts_sent
    }

    pub fn has_seen(&self, id: &ReportId) -> bool {
        self.seen.contains(id)
    }

    /// Handle one decoded `ReportUpdated` event, delivering inline
    pub async fn handle(
        &mut self,
        event: &ReportUpdated,
        sender: &dyn WebhookSender,
    ) -> DispatchOutcome {
        match self.prepare(event) {
            Ok(pending) => {
                let status = deliver(sender, &pending.payload).await;
                self.complete(pending.alert, status)
            }
            Err(outcome) => outcome,
        }
    }

    /// Mark the report handled and classify it. `Ok` carries an alert that
    /// still has to be delivered and passed to [`Self::complete`].
    pub fn prepare(&mut self, event: &ReportUpdated) -> Result<PendingAlert, DispatchOutcome> {
        let report = &event.report;
        let id = report.id();

        if !self.remember(id) {
            debug!(report = %id, "Report already handled, no alert");
            return Err(DispatchOutcome::Duplicate);
        }

        self.state = DispatcherState::Evaluating;
        let Some(level) = classify(report) else {
            info!(report = %id, ratio_bps = report.ratio_bps, "Report compliant, no alert");
            self.state = DispatcherState::Monitoring;
            return Err(DispatchOutcome::NoAlert);
        };

        self.state = DispatcherState::Alerting;
        let alert = Alert {
            level,
            stablecoin: report.symbol.to_string(),
            ratio_bps: report.ratio_bps,
            message: alert_message(report, level),
            timestamp: report.timestamp,
            source_report: id,
            tx_hash: event.tx_hash.clone(),
        };
        let payload = alert.to_payload(report.compliant);

        Ok(PendingAlert { alert, payload })
    }

    /// Record the delivery result of a prepared alert
    pub fn complete(&mut self, alert: Alert, status: DeliveryStatus) -> DispatchOutcome {
        self.state = DispatcherState::Monitoring;
        self.alerts_sent += 1;

        match status {
            DeliveryStatus::Delivered => {
                info!(
                    report = %alert.source_report,
                    level = alert.level.as_str(),
                    "Alert dispatched: {}", alert.message
                );
                DispatchOutcome::Dispatched(alert)
            }
            DeliveryStatus::Failed(reason) => {
                warn!(
                    report = %alert.source_report,
                    "Alert delivery failed, not retried: {}", reason
                );
                DispatchOutcome::DeliveryFailed(alert)
            }
        }
    }

    /// Record an identity; false if it was already known or falls at or
    /// below the eviction watermark of its symbol
    fn remember(&mut self, id: ReportId) -> bool {
        if self
            .evicted_through
            .get(&id.symbol)
            .is_some_and(|through| id.timestamp <= *through)
        {
            return false;
        }
        if !self.seen.insert(id) {
            return false;
        }
        self.seen_order.push_back(id);
        while self.seen_order.len() > self.capacity {
            if let Some(oldest) = self.seen_order.pop_front() {
                self.seen.remove(&oldest);
                let through = self.evicted_through.entry(oldest.symbol).or_insert(0);
                *through = (*through).max(oldest.timestamp);
            }
        }
        true
    }
}

impl Default for BreachAlertDispatcher {
    fn default() -> Self {
        Self::new(DEFAULT_SEEN_CAPACITY)
    }
}

/// Run one event through a shared dispatcher. The lock is held to mark and
/// classify and again to record the result, never across the webhook call.
pub async fn dispatch(
    dispatcher: &RwLock<BreachAlertDispatcher>,
    event: &ReportUpdated,
    sender: &dyn WebhookSender,
) -> DispatchOutcome {
    let prepared = dispatcher.write().await.prepare(event);
    match prepared {
        Ok(pending) => {
            let status = deliver(sender, &pending.payload).await;
            dispatcher.write().await.complete(pending.alert, status)
        }
        Err(outcome) => outcome,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::ProofHash;
    use crate::reserve::{StablecoinSymbol, whole_tokens};
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Recorder(Mutex<Vec<Value>>);

    #[async_trait]
    impl WebhookSender for Recorder {
        async fn send(&self, payload: &Value) -> anyhow::Result<()> {
            self.0.lock().unwrap().push(payload.clone());
            Ok(())
        }
    }

    struct Unreachable;

    #[async_trait]
    impl WebhookSender for Unreachable {
        async fn send(&self, _payload: &Value) -> anyhow::Result<()> {
            Err(anyhow::anyhow!("timeout"))
        }
    }

    fn event(ratio_bps: u16, compliant: bool, timestamp: u64) -> ReportUpdated {
        ReportUpdated {
            report: ComplianceReport {
                timestamp,
                total_reserves: whole_tokens(ratio_bps as u64),
                total_supply: whole_tokens(10_000),
                ratio_bps,
                compliant,
                proof_hash: ProofHash::UNATTESTED,
                symbol: StablecoinSymbol::parse("USDT").unwrap(),
                permitted_assets_only: compliant,
                no_rehypothecation: true,
                last_audit_timestamp: 0,
            },
            tx_hash: "0xfeed".to_string(),
        }
    }

    #[test]
    fn test_severity_mapping() {
        assert_eq!(classify(&event(10_300, true, 1).report), None);
        assert_eq!(
            classify(&event(9_999, false, 1).report),
            Some(AlertLevel::Emergency)
        );
        assert_eq!(
            classify(&event(10_000, false, 1).report),
            Some(AlertLevel::Critical)
        );
        assert_eq!(
            classify(&event(10_300, false, 1).report),
            Some(AlertLevel::Critical)
        );
    }

    #[tokio::test]
    async fn test_same_report_alerts_once() {
        let recorder = Recorder::default();
        let mut dispatcher = BreachAlertDispatcher::default();
        let breach = event(9_500, false, 1_760_000_000);

        let first = dispatcher.handle(&breach, &recorder).await;
        let second = dispatcher.handle(&breach, &recorder).await;

        assert!(matches!(first, DispatchOutcome::Dispatched(_)));
        assert_eq!(second, DispatchOutcome::Duplicate);
        assert_eq!(recorder.0.lock().unwrap().len(), 1);
        assert_eq!(dispatcher.state(), DispatcherState::Monitoring);

        let sent = recorder.0.lock().unwrap()[0].clone();
        assert_eq!(sent["level"], "EMERGENCY");
        assert_eq!(sent["ratio"], 9_500);
        assert_eq!(sent["compliant"], false);
        assert_eq!(sent["txHash"], "0xfeed");
    }

    #[tokio::test]
    async fn test_compliant_report_no_alert() {
        let recorder = Recorder::default();
        let mut dispatcher = BreachAlertDispatcher::default();

        let outcome = dispatcher.handle(&event(10_300, true, 5), &recorder).await;
        assert_eq!(outcome, DispatchOutcome::NoAlert);
        assert!(recorder.0.lock().unwrap().is_empty());
        assert_eq!(dispatcher.alerts_sent(), 0);
    }

    #[tokio::test]
    async fn test_delivery_failure_is_swallowed_and_not_retried() {
        let mut dispatcher = BreachAlertDispatcher::default();
        let breach = event(10_020, false, 7);

        let outcome = dispatcher.handle(&breach, &Unreachable).await;
        assert!(matches!(outcome, DispatchOutcome::DeliveryFailed(_)));
        assert_eq!(dispatcher.state(), DispatcherState::Monitoring);

        let again = dispatcher.handle(&breach, &Unreachable).await;
        assert_eq!(again, DispatchOutcome::Duplicate);
    }

    #[tokio::test]
    async fn test_distinct_reports_each_alert() {
        let recorder = Recorder::default();
        let mut dispatcher = BreachAlertDispatcher::default();

        dispatcher.handle(&event(9_000, false, 1), &recorder).await;
        dispatcher.handle(&event(9_000, false, 2), &recorder).await;
        assert_eq!(recorder.0.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_seen_set_is_bounded() {
        let recorder = Recorder::default();
        let mut dispatcher = BreachAlertDispatcher::new(2);

        for ts in 1..=3 {
            dispatcher.handle(&event(10_300, true, ts), &recorder).await;
        }
        let first = event(10_300, true, 1).report.id();
        let last = event(10_300, true, 3).report.id();
        assert!(!dispatcher.has_seen(&first));
        assert!(dispatcher.has_seen(&last));
    }

    #[tokio::test]
    async fn test_evicted_report_still_alerts_once() {
        let recorder = Recorder::default();
        let mut dispatcher = BreachAlertDispatcher::new(2);

        for ts in 1..=3 {
            dispatcher.handle(&event(9_000, false, ts), &recorder).await;
        }
        // Report 1 left the seen-set but is below the watermark
        let redelivered = dispatcher.handle(&event(9_000, false, 1), &recorder).await;
        assert_eq!(redelivered, DispatchOutcome::Duplicate);
        assert_eq!(recorder.0.lock().unwrap().len(), 3);
        assert_eq!(dispatcher.alerts_sent(), 3);

        // A newer report is unaffected
        let newer = dispatcher.handle(&event(9_000, false, 4), &recorder).await;
        assert!(matches!(newer, DispatchOutcome::Dispatched(_)));
    }

    #[tokio::test]
    async fn test_out_of_order_report_inside_window_alerts() {
        let recorder = Recorder::default();
        let mut dispatcher = BreachAlertDispatcher::new(4);

        dispatcher.handle(&event(9_000, false, 5), &recorder).await;
        let older = dispatcher.handle(&event(9_000, false, 4), &recorder).await;
        assert!(matches!(older, DispatchOutcome::Dispatched(_)));
    }

    /// Records whether the dispatcher lock was free while sending
    struct LockObserver {
        dispatcher: Arc<RwLock<BreachAlertDispatcher>>,
        lock_free: Mutex<Vec<bool>>,
    }

    #[async_trait]
    impl WebhookSender for LockObserver {
        async fn send(&self, _payload: &Value) -> anyhow::Result<()> {
            let free = self.dispatcher.try_read().is_ok();
            self.lock_free.lock().unwrap().push(free);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_lock_released_during_delivery() {
        let dispatcher = Arc::new(RwLock::new(BreachAlertDispatcher::default()));
        let observer = LockObserver {
            dispatcher: dispatcher.clone(),
            lock_free: Mutex::new(Vec::new()),
        };
        let breach = event(9_500, false, 42);

        let outcome = dispatch(&dispatcher, &breach, &observer).await;
        assert!(matches!(outcome, DispatchOutcome::Dispatched(_)));
        assert_eq!(*observer.lock_free.lock().unwrap(), vec![true]);

        let guard = dispatcher.read().await;
        assert_eq!(guard.alerts_sent(), 1);
        assert_eq!(guard.state(), DispatcherState::Monitoring);
        drop(guard);

        let again = dispatch(&dispatcher, &breach, &observer).await;
        assert_eq!(again, DispatchOutcome::Duplicate);
        assert_eq!(observer.lock_free.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_prepare_builds_payload_without_sending() {
        let mut dispatcher = BreachAlertDispatcher::default();
        let pending = dispatcher.prepare(&event(10_020, false, 9)).unwrap();

        assert_eq!(pending.alert.level, AlertLevel::Critical);
        assert_eq!(pending.payload.ratio, Some(10_020));
        assert_eq!(dispatcher.state(), DispatcherState::Alerting);
        assert_eq!(dispatcher.alerts_sent(), 0);

        let outcome = dispatcher.complete(pending.alert, DeliveryStatus::Delivered);
        assert!(matches!(outcome, DispatchOutcome::Dispatched(_)));
        assert_eq!(dispatcher.alerts_sent(), 1);
    }
}
