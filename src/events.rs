// src/events.rs
//! Change notifications for whoever renders the vault

use std::fmt;

/// Something that changed the stored data
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VaultEvent {
    Saved { id: i64 },
    Updated { id: i64 },
    Deleted { id: i64 },
    Cleared { removed: usize },
    ImportProgress { done: usize, total: usize },
    Imported { count: usize },
    Restored,
    PassphraseChanged,
}

/// Receives every `VaultEvent`.
///
/// Change events arrive once the change is committed. `ImportProgress` is
/// reported while the import transaction is still open, so it may be
/// followed by a failed import instead of `Imported`.
pub trait ChangeListener: Send {
    fn on_event(&self, event: &VaultEvent);
}

impl<F> ChangeListener for F
where
    F: Fn(&VaultEvent) + Send,
{
    fn on_event(&self, event: &VaultEvent) {
        self(event)
    }
}

#[derive(Default)]
pub(crate) struct Listeners {
    inner: Vec<Box<dyn ChangeListener>>,
}

impl Listeners {
    pub(crate) fn push(&mut self, listener: Box<dyn ChangeListener>) {
        self.inner.push(listener);
    }

    pub(crate) fn emit(&self, event: VaultEvent) {
        for listener in &self.inner {
            listener.on_event(&event);
        }
    }
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("count", &self.inner.len())
            .finish()
    }
}
