//! Fans a single [`LoopEvent`] out to any number of sinks — typically the
//! interactive console/progress sink plus a [`conductor_infrastructure::JsonlProgressLog`].
//! Events are `Clone`, so each sink gets its own copy in registration order.

use conductor_application::ports::event_sink::{EventSink, LoopEvent};
use std::sync::Arc;

pub struct CompositeEventSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl CompositeEventSink {
    pub fn new(sinks: Vec<Arc<dyn EventSink>>) -> Self {
        Self { sinks }
    }
}

impl EventSink for CompositeEventSink {
    fn emit(&self, event: LoopEvent) {
        for sink in &self.sinks {
            sink.emit(event.clone());
        }
    }
}
