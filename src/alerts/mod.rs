//! Breach alerting and the webhook notification channel

pub mod dispatcher;
pub mod webhook;

pub use dispatcher::{
    ALERT_SOURCE, Alert, BreachAlertDispatcher, DispatchOutcome, DispatcherState, PendingAlert,
    classify, dispatch,
};
pub use webhook::{
    AlertLevel, AlertPayload, AttestationPayload, DeliveryStatus, HttpWebhookSender,
    WebhookSender, deliver,
};
