use std::any::{Any, TypeId};
use std::sync::Arc;
use parking_lot::Mutex;
use ahash::AHashMap;

type BoxedHandler = Box<dyn FnMut(&dyn Any) + Send + Sync>;

/// System-wide event bus
///
/// Handlers are keyed by event type and receive the concrete payload.
/// Publishing from inside a handler is not supported.
pub struct EventBus {
    handlers: Arc<Mutex<AHashMap<TypeId, Vec<BoxedHandler>>>>,
}

/// Event trait that all events must implement
pub trait Event: Send + Sync + 'static {}

/// Common system events
pub mod events {
    use super::Event;
    use crate::model::{FileId, ViewId, ZoomId};

    /// The setup wizard finished and a view should be plotted
    #[derive(Debug, Clone, PartialEq)]
    pub struct SetupFinished {
        pub view_id: ViewId,
        pub file_id: Option<FileId>,
    }

    /// The user asked to pick a different file or view
    #[derive(Debug, Clone, PartialEq)]
    pub struct SetupNeeded;

    /// A zoom was persisted
    #[derive(Debug, Clone, PartialEq)]
    pub struct ZoomSaved {
        pub zoom_id: ZoomId,
    }

    /// A zoom was removed
    #[derive(Debug, Clone, PartialEq)]
    pub struct ZoomDeleted {
        pub zoom_id: ZoomId,
    }

    /// The chart is now showing a saved zoom
    #[derive(Debug, Clone, PartialEq)]
    pub struct ActiveZoomChanged {
        pub zoom_id: Option<ZoomId>,
    }

    /// Severity of a user notification
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum NotificationLevel {
        Info,
        Success,
        Danger,
    }

    /// Transient message for the user
    #[derive(Debug, Clone, PartialEq)]
    pub struct Notification {
        pub level: NotificationLevel,
        pub message: String,
    }

    impl Notification {
        pub fn danger(message: impl Into<String>) -> Self {
            Self {
                level: NotificationLevel::Danger,
                message: message.into(),
            }
        }
    }

    // Implement Event trait for all event types
    macro_rules! impl_event {
        ($($t:ty),*) => {
            $(
                impl Event for $t {}
            )*
        }
    }

    impl_event!(
        SetupFinished,
        SetupNeeded,
        ZoomSaved,
        ZoomDeleted,
        ActiveZoomChanged,
        Notification
    );
}

impl EventBus {
    /// Create a new event bus
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(Mutex::new(AHashMap::new())),
        }
    }

    /// Subscribe to events of a specific type
    pub fn subscribe<E, F>(&self, mut handler: F)
    where
        E: Event,
        F: FnMut(&E) + Send + Sync + 'static,
    {
        let boxed: BoxedHandler = Box::new(move |event: &dyn Any| {
            if let Some(event) = event.downcast_ref::<E>() {
                handler(event);
            }
        });
        let mut handlers = self.handlers.lock();
        handlers.entry(TypeId::of::<E>()).or_default().push(boxed);
    }

    /// Publish an event
    pub fn publish<E: Event>(&self, event: E) {
        let type_id = TypeId::of::<E>();
        let mut handlers = self.handlers.lock();

        if let Some(event_handlers) = handlers.get_mut(&type_id) {
            for handler in event_handlers.iter_mut() {
                handler(&event);
            }
        }
    }

    /// Number of handlers registered for an event type
    pub fn handler_count<E: Event>(&self) -> usize {
        self.handlers
            .lock()
            .get(&TypeId::of::<E>())
            .map(Vec::len)
            .unwrap_or(0)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
