//! Assembled multipart messages.
//!
//! A [`Message`] is the ordered sequence of frames a peer sent as one logical
//! unit. Frame order is reception order. Messages produced by the drain loop
//! always hold at least one frame.

use crate::frame::Frame;
use bytes::Bytes;
use smallvec::SmallVec;
use std::io;
use std::ops::Index;

/// Inline capacity for frames; most pub/sub traffic is topic + payload.
pub(crate) type FrameVec = SmallVec<[Frame; 4]>;

/// A complete multipart message handed to the consumer callback.
///
/// # Examples
///
/// ```
/// use subdrain_core::frame::Frame;
/// use subdrain_core::message::Message;
///
/// let msg = Message::from_frames(vec![Frame::from("topic"), Frame::from("data")]);
/// assert_eq!(msg.len(), 2);
/// assert_eq!(msg.parse_frame_str(0).unwrap(), "topic");
/// ```
#[derive(Debug, PartialEq, Eq)]
pub struct Message {
    frames: FrameVec,
}

impl Message {
    pub(crate) const fn from_vec(frames: FrameVec) -> Self {
        Self { frames }
    }

    /// Create a message from existing frames.
    #[must_use]
    pub fn from_frames(frames: Vec<Frame>) -> Self {
        Self {
            frames: SmallVec::from_vec(frames),
        }
    }

    /// Get the number of frames.
    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Check if the message has no frames.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Get a reference to the frames.
    #[must_use]
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Frame> {
        self.frames.iter()
    }

    /// Consume the message and take ownership of its frames.
    ///
    /// Each frame still releases its storage when dropped.
    #[must_use]
    pub fn into_frames(self) -> Vec<Frame> {
        self.frames.into_vec()
    }

    /// Copy every frame into `Bytes`.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<Bytes> {
        self.frames.iter().map(Frame::to_bytes).collect()
    }

    /// Try to parse a frame as a UTF-8 string.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame doesn't exist or isn't valid UTF-8.
    pub fn parse_frame_str(&self, index: usize) -> io::Result<&str> {
        let frame = self
            .frames
            .get(index)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "Frame index out of bounds"))?;

        std::str::from_utf8(frame).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

impl Index<usize> for Message {
    type Output = Frame;

    fn index(&self, index: usize) -> &Frame {
        &self.frames[index]
    }
}

impl<'a> IntoIterator for &'a Message {
    type Item = &'a Frame;
    type IntoIter = std::slice::Iter<'a, Frame>;

    fn into_iter(self) -> Self::IntoIter {
        self.frames.iter()
    }
}

impl IntoIterator for Message {
    type Item = Frame;
    type IntoIter = smallvec::IntoIter<[Frame; 4]>;

    fn into_iter(self) -> Self::IntoIter {
        self.frames.into_iter()
    }
}
