pub mod emitter;
pub mod system;
pub mod types;

pub use emitter::JobEmitter;
pub use system::{DeliveryMode, ProgressHub, ProgressSink, SubscriberId, Subscription};
pub use types::{
    CompletePayload, ErrorPayload, EventKind, EventPayload, ProgressEvent, ProgressPayload,
    StartPayload, percentage,
};
