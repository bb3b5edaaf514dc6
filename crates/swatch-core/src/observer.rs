//! Push-based size notifications.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::geometry::Size;

/// What a size notification measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SizeTarget {
    /// The element hosting the stripe.
    Container,
    /// One rendered tile.
    Tile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

pub type SizeCallback = Box<dyn FnMut(Size)>;

/// Delivers `{width, height}` for a handle whenever it changes. No cadence
/// is promised; repeated values are allowed.
pub trait SizeObserver {
    type Handle;

    fn subscribe(&self, handle: &Self::Handle, callback: SizeCallback) -> SubscriptionId;

    fn unsubscribe(&self, id: SubscriptionId);
}

struct Subscriber {
    id: SubscriptionId,
    target: SizeTarget,
    callback: Rc<RefCell<SizeCallback>>,
}

/// In-process observer fed by whoever does the measuring.
#[derive(Default)]
pub struct SizeBroadcaster {
    next_id: Cell<u64>,
    subscribers: RefCell<Vec<Subscriber>>,
}

impl std::fmt::Debug for SizeBroadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SizeBroadcaster")
            .field("subscribers", &self.subscriber_count())
            .finish_non_exhaustive()
    }
}

impl SizeBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes `size` to every subscriber of `target`.
    pub fn notify(&self, target: SizeTarget, size: Size) {
        // Snapshot so callbacks may (un)subscribe while being notified.
        let callbacks: Vec<_> = self
            .subscribers
            .borrow()
            .iter()
            .filter(|s| s.target == target)
            .map(|s| Rc::clone(&s.callback))
            .collect();
        for callback in callbacks {
            match callback.try_borrow_mut() {
                Ok(mut cb) => cb(size),
                Err(_) => tracing::warn!(?target, "re-entrant size notification dropped"),
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.borrow().len()
    }
}

impl SizeObserver for SizeBroadcaster {
    type Handle = SizeTarget;

    fn subscribe(&self, handle: &SizeTarget, callback: SizeCallback) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.subscribers.borrow_mut().push(Subscriber {
            id,
            target: *handle,
            callback: Rc::new(RefCell::new(callback)),
        });
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.subscribers.borrow_mut().retain(|s| s.id != id);
    }
}
