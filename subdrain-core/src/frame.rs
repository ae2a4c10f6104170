//! Frame buffers with deferred release.
//!
//! A [`Frame`] owns storage produced by the transport (for libzmq, a received
//! `zmq_msg_t`) and hands it to the consumer by value. The storage's release
//! hook runs exactly once, when the last owner drops the frame. Consumers may
//! keep frames around for as long as they like; the transport storage stays
//! alive until then.

use bytes::Bytes;
use std::fmt;
use std::ops::Deref;

/// Storage behind a [`Frame`].
///
/// `release` consumes the storage, so the type system guarantees it runs at
/// most once; [`Frame`]'s `Drop` guarantees it runs at least once.
pub trait FrameStorage: 'static {
    /// The frame payload.
    fn as_bytes(&self) -> &[u8];

    /// Return the storage to whoever allocated it.
    fn release(self: Box<Self>);
}

impl FrameStorage for Vec<u8> {
    fn as_bytes(&self) -> &[u8] {
        self
    }

    fn release(self: Box<Self>) {}
}

impl FrameStorage for Bytes {
    fn as_bytes(&self) -> &[u8] {
        self
    }

    fn release(self: Box<Self>) {}
}

impl FrameStorage for &'static [u8] {
    fn as_bytes(&self) -> &[u8] {
        self
    }

    fn release(self: Box<Self>) {}
}

/// Storage paired with an explicit release hook.
struct Hooked<T, F> {
    data: T,
    hook: F,
}

impl<T, F> FrameStorage for Hooked<T, F>
where
    T: AsRef<[u8]> + 'static,
    F: FnOnce(T) + 'static,
{
    fn as_bytes(&self) -> &[u8] {
        self.data.as_ref()
    }

    fn release(self: Box<Self>) {
        let Hooked { data, hook } = *self;
        hook(data);
    }
}

/// One frame of a multipart message.
///
/// Dereferences to its payload bytes.
///
/// # Examples
///
/// ```
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use subdrain_core::frame::Frame;
///
/// let released = Rc::new(Cell::new(false));
/// let flag = released.clone();
/// let frame = Frame::with_release(vec![1u8, 2, 3], move |_storage| flag.set(true));
///
/// assert_eq!(&frame[..], &[1, 2, 3]);
/// assert!(!released.get());
/// drop(frame);
/// assert!(released.get());
/// ```
pub struct Frame {
    storage: Option<Box<dyn FrameStorage>>,
}

impl Frame {
    /// Wrap transport-owned storage.
    #[must_use]
    pub fn new(storage: impl FrameStorage) -> Self {
        Self {
            storage: Some(Box::new(storage)),
        }
    }

    /// Wrap storage and run `hook` with it once the frame is dropped.
    #[must_use]
    pub fn with_release<T, F>(data: T, hook: F) -> Self
    where
        T: AsRef<[u8]> + 'static,
        F: FnOnce(T) + 'static,
    {
        Self::new(Hooked { data, hook })
    }

    #[must_use]
    pub fn from_vec(data: Vec<u8>) -> Self {
        Self::new(data)
    }

    #[must_use]
    pub fn from_static(data: &'static [u8]) -> Self {
        Self::new(data)
    }

    /// Payload bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match &self.storage {
            Some(storage) => storage.as_bytes(),
            None => &[],
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }

    /// Copy the payload into a refcounted buffer that outlives the frame.
    #[must_use]
    pub fn to_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(self.as_bytes())
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        if let Some(storage) = self.storage.take() {
            storage.release();
        }
    }
}

impl Deref for Frame {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("len", &self.len())
            .field("data", &Bytes::copy_from_slice(self.as_bytes()))
            .finish()
    }
}

impl PartialEq for Frame {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for Frame {}

impl PartialEq<[u8]> for Frame {
    fn eq(&self, other: &[u8]) -> bool {
        self.as_bytes() == other
    }
}

impl PartialEq<&[u8]> for Frame {
    fn eq(&self, other: &&[u8]) -> bool {
        self.as_bytes() == *other
    }
}

impl PartialEq<str> for Frame {
    fn eq(&self, other: &str) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl PartialEq<&str> for Frame {
    fn eq(&self, other: &&str) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl From<Vec<u8>> for Frame {
    fn from(data: Vec<u8>) -> Self {
        Self::from_vec(data)
    }
}

impl From<Bytes> for Frame {
    fn from(data: Bytes) -> Self {
        Self::new(data)
    }
}

impl From<&'static str> for Frame {
    fn from(data: &'static str) -> Self {
        Self::from_static(data.as_bytes())
    }
}
