//! Real-time event routing between connections and rooms

pub mod connections;
pub mod dispatch;

pub use connections::{ConnectionRegistry, EventSender, EventSink};
pub use dispatch::EventRouter;
