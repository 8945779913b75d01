// Switchyard - job queue and realtime client notifier
//
// Producers submit job ids to a Redis-backed queue, workers consume them,
// and results are fanned out to connected WebSocket clients.

// Re-export member crates
#[cfg(feature = "queue")]
pub use switchyard_queue as queue;

#[cfg(feature = "notifier")]
pub use switchyard_notifier as notifier;

// Prelude for common imports
pub mod prelude {
    #[cfg(feature = "queue")]
    pub use switchyard_queue::prelude::*;

    #[cfg(feature = "notifier")]
    pub use switchyard_notifier::{
        BroadcastReport, ClientConnection, ClientLifetime, ConnectionState, Delivery, Envelope,
        JobMessage, Notifier, NotifierConfig, NotifierError, NotifierResult, SendOutcome,
        WsConnection,
    };
}
