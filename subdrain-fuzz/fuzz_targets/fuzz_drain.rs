#![no_main]

use std::cell::RefCell;
use std::collections::VecDeque;

use libfuzzer_sys::fuzz_target;
use subdrain_core::drain::drain_pass;
use subdrain_core::error::{ConnectionError, TransportError};
use subdrain_core::frame::Frame;
use subdrain_core::message::Message;
use subdrain_core::transport::{RawFd, Transport};

// Each input byte is one recv outcome:
//   0x00..=0x0f  interrupted
//   0x10..=0x13  fatal failure
//   otherwise    a frame of (byte & 0x3f) bytes, "more" when bit 6 is set
struct Replay {
    outcomes: VecDeque<u8>,
    more: bool,
    frames: usize,
}

impl Transport for Replay {
    fn connect(&mut self, _: &str) -> Result<(), TransportError> {
        Ok(())
    }

    fn subscribe(&mut self, _: &[u8]) -> Result<(), TransportError> {
        Ok(())
    }

    fn recv_frame(&mut self) -> Result<Frame, TransportError> {
        match self.outcomes.pop_front() {
            None => Err(TransportError::WouldBlock),
            Some(0x00..=0x0f) => Err(TransportError::Interrupted),
            Some(0x10..=0x13) => Err(TransportError::failed(156_384_765, "fuzz failure")),
            Some(b) => {
                self.more = b & 0x40 != 0;
                self.frames += 1;
                Ok(Frame::from_vec(vec![b; usize::from(b & 0x3f)]))
            }
        }
    }

    fn has_more(&mut self) -> Result<bool, TransportError> {
        Ok(self.more)
    }

    fn readiness_fd(&mut self) -> Result<RawFd, TransportError> {
        Ok(0)
    }

    fn close_socket(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    fn terminate(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

fuzz_target!(|data: &[u8]| {
    let transport = RefCell::new(Some(Replay {
        outcomes: data.iter().copied().collect(),
        more: false,
        frames: 0,
    }));

    let mut delivered: Vec<Message> = Vec::new();
    loop {
        match drain_pass(&transport, &mut delivered) {
            Ok(_) => break,
            Err(ConnectionError::Transport { .. } | ConnectionError::PartialMessage { .. }) => {
                // A failed pass never delivers a half-assembled message; keep
                // draining what is left.
                if transport.borrow().as_ref().map_or(true, |t| t.outcomes.is_empty()) {
                    break;
                }
            }
            Err(e) => panic!("unexpected drain error: {e}"),
        }
    }

    let received = transport.borrow().as_ref().map_or(0, |t| t.frames);
    let total: usize = delivered.iter().map(Message::len).sum();
    assert!(delivered.iter().all(|m| !m.is_empty()));
    assert!(total <= received);
});
