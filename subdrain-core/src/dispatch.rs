//! Consumer callback slot and dispatch.
//!
//! A connection delivers to at most one callback. Registering a new callback
//! replaces the old one (last write wins), including from inside the callback
//! itself. With no callback registered, messages are dropped and their frames
//! released on the spot.

use crate::message::Message;
use std::cell::{Cell, RefCell};
use std::fmt;
use tracing::{trace, warn};

/// Boxed consumer callback.
pub type MessageCallback = Box<dyn FnMut(Message)>;

/// Outcome of one dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The callback received the message.
    Delivered,
    /// No callback was registered; the message was released undelivered.
    Dropped { frames: usize },
}

/// Replaceable single-callback slot.
#[derive(Default)]
pub struct CallbackSlot {
    callback: RefCell<Option<MessageCallback>>,
    /// Bumped on every set/clear so a dispatch can tell if it was replaced mid-call.
    generation: Cell<u64>,
    /// Generation of the callback currently running, if any.
    active: Cell<Option<u64>>,
}

impl CallbackSlot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `callback`, replacing any previous one.
    pub fn set<F>(&self, callback: F)
    where
        F: FnMut(Message) + 'static,
    {
        self.bump();
        *self.callback.borrow_mut() = Some(Box::new(callback));
    }

    /// Remove the callback. Returns true if one was registered.
    pub fn clear(&self) -> bool {
        let was_set = self.is_set();
        self.bump();
        self.callback.borrow_mut().take();
        was_set
    }

    /// True when a callback is registered (or currently running).
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.callback.borrow().is_some() || self.in_flight()
    }

    /// Hand `message` to the registered callback.
    ///
    /// The callback is taken out of the slot for the duration of the call so
    /// it may replace or clear the slot without a borrow conflict. It is put
    /// back afterwards only if nobody touched the slot in the meantime.
    pub fn dispatch(&self, message: Message) -> Delivery {
        let taken = self.callback.borrow_mut().take();
        let Some(mut callback) = taken else {
            let frames = message.len();
            warn!(frames, "[SUB] No message callback registered, dropping message");
            drop(message);
            return Delivery::Dropped { frames };
        };

        let generation = self.generation.get();
        self.active.set(Some(generation));
        trace!(frames = message.len(), "[SUB] Dispatching message");
        callback(message);
        self.active.set(None);

        if self.generation.get() == generation {
            *self.callback.borrow_mut() = Some(callback);
        }
        Delivery::Delivered
    }

    fn bump(&self) {
        self.generation.set(self.generation.get().wrapping_add(1));
    }

    fn in_flight(&self) -> bool {
        self.active.get() == Some(self.generation.get())
    }
}

impl fmt::Debug for CallbackSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackSlot")
            .field("set", &self.is_set())
            .field("generation", &self.generation.get())
            .finish()
    }
}
