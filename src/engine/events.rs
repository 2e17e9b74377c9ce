use std::collections::BTreeMap;

/// Listener kinds the controller can hold on its surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SubscriptionKind {
    Resize,
    /// Feature picking; only live while a tiled overlay is mounted.
    Click,
    /// Pointer gestures routed to the box-draw interaction.
    DrawInteraction,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionKey(u64);

/// Registry of live event subscriptions. Events are only dispatched to a
/// component while a subscription of the matching kind is live.
#[derive(Debug, Default)]
pub struct Subscriptions {
    next: u64,
    live: BTreeMap<SubscriptionKey, SubscriptionKind>,
}

impl Subscriptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, kind: SubscriptionKind) -> SubscriptionKey {
        self.next += 1;
        let key = SubscriptionKey(self.next);
        self.live.insert(key, kind);
        tracing::trace!("subscribed {:?} as {:?}", kind, key);
        key
    }

    /// Releases `key`. Returns false when it was already released.
    pub fn unsubscribe(&mut self, key: SubscriptionKey) -> bool {
        let removed = self.live.remove(&key).is_some();
        if removed {
            tracing::trace!("released {:?}", key);
        }
        removed
    }

    pub fn is_live(&self, key: SubscriptionKey) -> bool {
        self.live.contains_key(&key)
    }

    pub fn has(&self, kind: SubscriptionKind) -> bool {
        self.live.values().any(|live| *live == kind)
    }

    pub fn count(&self, kind: SubscriptionKind) -> usize {
        self.live.values().filter(|live| **live == kind).count()
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    pub fn clear(&mut self) {
        self.live.clear();
    }
}
