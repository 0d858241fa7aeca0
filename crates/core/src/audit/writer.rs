use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info};

use super::{AuditEventEnvelope, AuditHandle, AuditRecord, AuditStore};
use crate::metrics::AUDIT_EVENTS_DROPPED;

/// Most events written in one store transaction.
const MAX_BATCH: usize = 64;

/// Drains the audit channel into an `AuditStore`.
///
/// Whatever has queued up while the previous batch was written goes into the
/// next one, so a burst such as a close-all sweep costs one transaction.
pub struct AuditWriter {
    rx: mpsc::Receiver<AuditEventEnvelope>,
    store: Arc<dyn AuditStore>,
}

impl AuditWriter {
    pub fn new(rx: mpsc::Receiver<AuditEventEnvelope>, store: Arc<dyn AuditStore>) -> Self {
        Self { rx, store }
    }

    /// Run until every `AuditHandle` is dropped and the channel is empty.
    pub async fn run(mut self) {
        info!("Audit writer started");

        let mut batch = Vec::with_capacity(MAX_BATCH);
        while let Some(first) = self.rx.recv().await {
            batch.push(record(first));
            while batch.len() < MAX_BATCH {
                match self.rx.try_recv() {
                    Ok(next) => batch.push(record(next)),
                    Err(_) => break,
                }
            }
            self.flush(&mut batch);
        }

        info!("Audit writer stopped");
    }

    fn flush(&self, batch: &mut Vec<AuditRecord>) {
        match self.store.append(batch) {
            Ok(written) => debug!("Stored {} audit events", written),
            Err(e) => {
                error!("Failed to store {} audit events: {}", batch.len(), e);
                AUDIT_EVENTS_DROPPED
                    .with_label_values(&["write_failed"])
                    .inc_by(batch.len() as u64);
            }
        }
        batch.clear();
    }
}

fn record(envelope: AuditEventEnvelope) -> AuditRecord {
    AuditRecord::new(envelope.timestamp, envelope.event)
}

/// Build a handle and the writer that serves it.
///
/// Spawn the writer with `tokio::spawn(writer.run())`; it finishes after the
/// last handle clone is dropped.
pub fn create_audit_system(
    store: Arc<dyn AuditStore>,
    buffer_size: usize,
) -> (AuditHandle, AuditWriter) {
    let (tx, rx) = mpsc::channel(buffer_size);
    (AuditHandle::new(tx), AuditWriter::new(rx, store))
}
