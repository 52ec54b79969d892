//! Change feed for version lifecycle events
//!
//! Events are published after an operation commits, for observers that only
//! need to know what happened. Cancelling or substituting records is done
//! through [`VersionHooks`](crate::versioning::VersionHooks) instead.

mod bus;
mod event;

pub use bus::{EventBus, EventSubscriber, DEFAULT_CAPACITY};
pub use event::{
    SnapshotCreatedEvent, VersionLifecycleEvent, VersionReplacedEvent, VersionsTrimmedEvent,
};
