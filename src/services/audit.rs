//! Audit event emission.
//!
//! The orchestrator reports security-relevant transitions to a sink; a sink
//! failure never fails the operation being audited. [`TracingAuditSink`] is
//! the default production sink, [`MemoryAuditSink`] backs assertions in
//! tests.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::models::AuditEvent;

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, event: AuditEvent);
}

/// Emits each event as a structured log line.
#[derive(Debug, Default, Clone)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, event: AuditEvent) {
        if event.success {
            tracing::info!(
                event_type = event.event_type.as_str(),
                category = %event.event_category,
                tenant_id = ?event.tenant_id,
                user_id = ?event.user_id,
                application_id = ?event.application_id,
                ip = ?event.ip_address,
                "audit"
            );
        } else {
            tracing::warn!(
                event_type = event.event_type.as_str(),
                category = %event.event_category,
                tenant_id = ?event.tenant_id,
                user_id = ?event.user_id,
                application_id = ?event.application_id,
                ip = ?event.ip_address,
                error = ?event.error_message,
                "audit"
            );
        }
    }
}

/// Collects events in memory for inspection.
#[derive(Debug, Default, Clone)]
pub struct MemoryAuditSink {
    events: Arc<Mutex<Vec<AuditEvent>>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn record(&self, event: AuditEvent) {
        self.events.lock().await.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AuditEventType;

    #[tokio::test]
    async fn memory_sink_preserves_order() {
        let sink = MemoryAuditSink::new();
        sink.record(AuditEvent::success(AuditEventType::Login)).await;
        sink.record(AuditEvent::failure(AuditEventType::LoginFailed, "bad password"))
            .await;

        let events = sink.events().await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, AuditEventType::Login);
        assert!(events[0].success);
        assert_eq!(events[1].event_type, AuditEventType::LoginFailed);
        assert_eq!(events[1].error_message.as_deref(), Some("bad password"));
    }
}
