//! Ingress gate
//!
//! Request handlers hand content to the pipeline through the gate. The gate
//! never blocks: when the extraction queue is full the item is shed.

use std::sync::{Arc, RwLock};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

use super::stats::{bump, PipelineStats};
use crate::types::Ugc;

/// Outcome of a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Queued for extraction
    Admitted,
    /// Queue full, item dropped
    Shed,
    /// Pipeline shutting down, item dropped
    Closed,
}

struct GateInner {
    tx: RwLock<Option<mpsc::Sender<Ugc>>>,
    stats: Arc<PipelineStats>,
}

/// Cloneable handle for submitting content
#[derive(Clone)]
pub struct IngressGate {
    inner: Arc<GateInner>,
}

impl IngressGate {
    pub(crate) fn new(tx: mpsc::Sender<Ugc>, stats: Arc<PipelineStats>) -> Self {
        Self {
            inner: Arc::new(GateInner {
                tx: RwLock::new(Some(tx)),
                stats,
            }),
        }
    }

    /// Try to enqueue `ugc` without waiting
    pub fn submit(&self, ugc: Ugc) -> Admission {
        let guard = match self.inner.tx.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let Some(tx) = guard.as_ref() else {
            debug!("Gate closed, discarding ugc {}", ugc.id);
            bump(&self.inner.stats.rejected_closed);
            return Admission::Closed;
        };

        match tx.try_send(ugc) {
            Ok(()) => {
                bump(&self.inner.stats.admitted);
                Admission::Admitted
            }
            Err(TrySendError::Full(ugc)) => {
                warn!(
                    "Extraction queue full, abandon ugc {} (area: {}, sender: {})",
                    ugc.id, ugc.area, ugc.sender_id
                );
                bump(&self.inner.stats.shed);
                Admission::Shed
            }
            Err(TrySendError::Closed(ugc)) => {
                debug!("Extraction stage gone, discarding ugc {}", ugc.id);
                bump(&self.inner.stats.rejected_closed);
                Admission::Closed
            }
        }
    }

    /// Refuse further admissions; already queued items keep flowing
    pub fn close(&self) {
        let mut guard = match self.inner.tx.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if guard.take().is_some() {
            debug!("Ingress gate closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        match self.inner.tx.read() {
            Ok(guard) => guard.is_none(),
            Err(poisoned) => poisoned.into_inner().is_none(),
        }
    }
}
