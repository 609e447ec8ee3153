//! Handler lists for host-delivered events.

/// Token returned by a subscription, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Ordered list of boxed handlers of type `H` (usually a `dyn FnMut`).
pub struct Subscribers<H: ?Sized> {
    next_id: u64,
    handlers: Vec<(SubscriptionId, Box<H>)>,
}

impl<H: ?Sized> Default for Subscribers<H> {
    fn default() -> Self {
        Self {
            next_id: 0,
            handlers: Vec::new(),
        }
    }
}

impl<H: ?Sized> Subscribers<H> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, handler: Box<H>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.handlers.push((id, handler));
        id
    }

    /// Returns `false` when `id` was not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(h, _)| *h != id);
        self.handlers.len() != before
    }

    /// Handlers in subscription order.
    pub fn handlers_mut(&mut self) -> impl Iterator<Item = &mut Box<H>> {
        self.handlers.iter_mut().map(|(_, h)| h)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
