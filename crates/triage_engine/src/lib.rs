//! Triage engine: transport, live subscriptions and the serialized store loop.
mod coordinator;
mod decode;
mod service;
mod sse;
mod store;
mod subscription;
mod types;

pub use coordinator::Coordinator;
pub use decode::{decode_email_text, DecodeError, DecodedEmail};
pub use service::{HttpJobService, JobEventSink, JobService, NewJobSink, ServiceSettings};
pub use sse::{SseDecoder, SseFrame};
pub use store::StoreHandle;
pub use subscription::{Subscription, SubscriptionSet};
pub use types::{FailureKind, ServiceError};
