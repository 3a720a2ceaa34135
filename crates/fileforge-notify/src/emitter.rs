use std::sync::Arc;

use fileforge_common::types::{Utility, WorkItemResult};
use tracing::debug;

use crate::{
    system::ProgressSink,
    types::{
        CompletePayload, ErrorPayload, EventPayload, ProgressEvent, ProgressPayload, StartPayload,
        percentage,
    },
};

/// Emits the four lifecycle events of one utility namespace. Fire-and-forget.
#[derive(Clone)]
pub struct JobEmitter {
    sink: Arc<dyn ProgressSink>,
    utility: Utility,
}

impl JobEmitter {
    pub fn new(sink: Arc<dyn ProgressSink>, utility: Utility) -> Self {
        Self { sink, utility }
    }

    pub fn utility(&self) -> Utility {
        self.utility
    }

    pub fn emit_start(&self, job_id: &str, total: usize) {
        self.emit(
            job_id,
            EventPayload::Start(StartPayload {
                job_id: job_id.to_string(),
                total,
            }),
        );
    }

    pub fn emit_item_progress(
        &self,
        job_id: &str,
        completed: usize,
        total: usize,
        result: WorkItemResult,
    ) {
        self.emit(
            job_id,
            EventPayload::Progress(ProgressPayload {
                job_id: job_id.to_string(),
                completed,
                total,
                percentage: percentage(completed, total),
                result,
            }),
        );
    }

    pub fn emit_complete(&self, job_id: &str, payload: CompletePayload) {
        self.emit(job_id, EventPayload::Complete(payload));
    }

    pub fn emit_error(&self, job_id: &str, error: impl Into<String>) {
        self.emit(
            job_id,
            EventPayload::Error(ErrorPayload {
                job_id: job_id.to_string(),
                error: error.into(),
            }),
        );
    }

    fn emit(&self, job_id: &str, payload: EventPayload) {
        let event = ProgressEvent::new(self.utility, job_id, payload);
        debug!(job_id = %job_id, event = %event.name(), "emitting progress event");
        self.sink.publish(event);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::types::EventKind;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<ProgressEvent>>);

    impl ProgressSink for Recorder {
        fn publish(&self, event: ProgressEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    #[test]
    fn progress_payload_carries_percentage_and_result() {
        let recorder = Arc::new(Recorder::default());
        let emitter = JobEmitter::new(recorder.clone(), Utility::Resize);

        emitter.emit_start("job", 4);
        emitter.emit_item_progress("job", 1, 4, WorkItemResult::skipped("photo.png", "no data"));
        emitter.emit_error("job", "archive write failed");

        let events = recorder.0.lock().unwrap();
        let kinds: Vec<EventKind> = events.iter().map(ProgressEvent::kind).collect();
        assert_eq!(kinds, vec![EventKind::Start, EventKind::Progress, EventKind::Error]);
        assert_eq!(events[1].name(), "resize-bulk:progress");
        let EventPayload::Progress(progress) = &events[1].payload else {
            panic!("expected progress payload");
        };
        assert_eq!(progress.percentage, 25);
        assert_eq!(progress.result.identity, "photo.png");
    }
}
