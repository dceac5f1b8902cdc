use super::queue::IntakeQueue;
use crate::diagnostics::Diagnostics;
use crate::domain::NotificationRecord;
use std::sync::Arc;
use tracing::warn;

/// Cloneable producer handle onto the intake queue.
///
/// This is what notification sources hold. Publishing never blocks; the
/// boolean result is the only feedback a producer gets.
#[derive(Clone, Debug)]
pub struct Publisher {
    queue: Arc<IntakeQueue>,
    diagnostics: Arc<Diagnostics>,
    filter_bad_status: bool,
}

impl Publisher {
    pub fn new(queue: Arc<IntakeQueue>, diagnostics: Arc<Diagnostics>) -> Self {
        Self {
            queue,
            diagnostics,
            filter_bad_status: true,
        }
    }

    /// Forward data changes with a bad status code instead of filtering them.
    pub fn with_bad_status_filter(mut self, enabled: bool) -> Self {
        self.filter_bad_status = enabled;
        self
    }

    /// Hand a record to the pipeline. Returns `false` if it was not accepted.
    pub fn publish(&self, record: NotificationRecord) -> bool {
        if self.filter_bad_status && record.has_bad_status() {
            warn!(
                node = %record.header().expanded_node_id,
                "Filtered notification with bad status code"
            );
            self.diagnostics.record_filtered();
            return false;
        }

        self.queue.try_push(record)
    }

    pub fn queue(&self) -> &Arc<IntakeQueue> {
        &self.queue
    }
}
