//! Multipart message assembly.
//!
//! Frames arrive one at a time together with the transport's "more frames
//! follow" flag. The assembler appends them in arrival order and emits the
//! accumulated [`Message`] exactly when a frame without the flag arrives.

use crate::frame::Frame;
use crate::message::{FrameVec, Message};
use smallvec::SmallVec;
use std::mem;

/// Ordered accumulator for the frames of one logical message.
#[derive(Debug, Default)]
pub struct Assembler {
    frames: FrameVec,
}

impl Assembler {
    #[must_use]
    pub fn new() -> Self {
        Self {
            frames: SmallVec::new(),
        }
    }

    /// Append a frame. Returns the completed message when `more` is false.
    ///
    /// The accumulator is empty again immediately after a message is emitted.
    pub fn push(&mut self, frame: Frame, more: bool) -> Option<Message> {
        self.frames.push(frame);
        if more {
            return None;
        }
        Some(Message::from_vec(mem::take(&mut self.frames)))
    }

    /// Number of frames collected for the message in progress.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.frames.len()
    }

    /// True when no message is in progress.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.frames.is_empty()
    }

    /// Drop the message in progress, releasing its frames.
    ///
    /// Returns how many frames were discarded.
    pub fn discard(&mut self) -> usize {
        let n = self.frames.len();
        self.frames.clear();
        n
    }
}
