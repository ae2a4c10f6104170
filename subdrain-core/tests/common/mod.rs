//! Test doubles: a scripted transport and a manually fired reactor.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::io;
use std::rc::Rc;

use subdrain_core::bridge::{Reactor, ReadyHandler, Token};
use subdrain_core::connection::Connection;
use subdrain_core::error::TransportError;
use subdrain_core::frame::Frame;
use subdrain_core::options::ConnectOptions;
use subdrain_core::transport::{FnFactory, RawFd, Transport};

pub const FD: RawFd = 42;

/// One outcome of a `recv_frame` call.
#[derive(Debug, Clone)]
pub enum Step {
    Frame(Vec<u8>, bool),
    Interrupted,
    Fail(i32, &'static str),
}

/// Shared script driving every transport a factory hands out.
#[derive(Debug, Default)]
pub struct Script {
    pub steps: VecDeque<Step>,
    pub more_interrupts: usize,
    pub more_errors: VecDeque<TransportError>,
    pub connect_errors: VecDeque<TransportError>,
    pub subscribe_errors: VecDeque<TransportError>,
    pub close_errors: VecDeque<TransportError>,
    pub terminate_errors: VecDeque<TransportError>,
    pub fail_open: Option<TransportError>,
    pub fail_fd: Option<TransportError>,
    pub calls: Vec<String>,
    pub last_more: bool,
    pub opened: usize,
    pub dropped: usize,
    pub frames_released: usize,
    pub recv_calls: usize,
}

pub type ScriptHandle = Rc<RefCell<Script>>;

pub fn script() -> ScriptHandle {
    Rc::new(RefCell::new(Script::default()))
}

/// Queue one logical message, one frame per element.
pub fn publish(script: &ScriptHandle, frames: &[&str]) {
    let mut s = script.borrow_mut();
    for (i, frame) in frames.iter().enumerate() {
        let more = i + 1 < frames.len();
        s.steps.push_back(Step::Frame(frame.as_bytes().to_vec(), more));
    }
}

pub fn push_step(script: &ScriptHandle, step: Step) {
    script.borrow_mut().steps.push_back(step);
}

pub struct ScriptedTransport {
    script: ScriptHandle,
}

impl Transport for ScriptedTransport {
    fn connect(&mut self, endpoint: &str) -> Result<(), TransportError> {
        let mut s = self.script.borrow_mut();
        s.calls.push(format!("connect {endpoint}"));
        match s.connect_errors.pop_front() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn subscribe(&mut self, prefix: &[u8]) -> Result<(), TransportError> {
        let mut s = self.script.borrow_mut();
        s.calls.push(format!("subscribe {prefix:?}"));
        match s.subscribe_errors.pop_front() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn recv_frame(&mut self) -> Result<Frame, TransportError> {
        let mut s = self.script.borrow_mut();
        s.recv_calls += 1;
        match s.steps.pop_front() {
            None => Err(TransportError::WouldBlock),
            Some(Step::Interrupted) => Err(TransportError::Interrupted),
            Some(Step::Fail(code, message)) => Err(TransportError::failed(code, message)),
            Some(Step::Frame(data, more)) => {
                s.last_more = more;
                let script = self.script.clone();
                Ok(Frame::with_release(data, move |_| {
                    script.borrow_mut().frames_released += 1;
                }))
            }
        }
    }

    fn has_more(&mut self) -> Result<bool, TransportError> {
        let mut s = self.script.borrow_mut();
        if s.more_interrupts > 0 {
            s.more_interrupts -= 1;
            return Err(TransportError::Interrupted);
        }
        if let Some(e) = s.more_errors.pop_front() {
            return Err(e);
        }
        Ok(s.last_more)
    }

    fn readiness_fd(&mut self) -> Result<RawFd, TransportError> {
        match self.script.borrow_mut().fail_fd.take() {
            Some(e) => Err(e),
            None => Ok(FD),
        }
    }

    fn close_socket(&mut self) -> Result<(), TransportError> {
        let mut s = self.script.borrow_mut();
        s.calls.push("close_socket".into());
        match s.close_errors.pop_front() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn terminate(&mut self) -> Result<(), TransportError> {
        let mut s = self.script.borrow_mut();
        s.calls.push("terminate".into());
        match s.terminate_errors.pop_front() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Drop for ScriptedTransport {
    fn drop(&mut self) {
        self.script.borrow_mut().dropped += 1;
    }
}

pub type ScriptedFactory =
    FnFactory<Box<dyn FnMut(&ConnectOptions) -> Result<ScriptedTransport, TransportError>>>;

pub fn factory(script: &ScriptHandle) -> ScriptedFactory {
    let script = script.clone();
    let open: Box<dyn FnMut(&ConnectOptions) -> Result<ScriptedTransport, TransportError>> =
        Box::new(move |_opts: &ConnectOptions| {
            let mut s = script.borrow_mut();
            if let Some(e) = s.fail_open.take() {
                return Err(e);
            }
            s.opened += 1;
            drop(s);
            Ok(ScriptedTransport {
                script: script.clone(),
            })
        });
    FnFactory(open)
}

/// Reactor whose notifications are fired by the test.
#[derive(Default)]
pub struct ManualReactor {
    next: Cell<u64>,
    handlers: RefCell<HashMap<u64, (RawFd, Option<ReadyHandler>)>>,
    pub fail_register: Cell<bool>,
    pub fail_deregister: Cell<bool>,
    pub deregistered: RefCell<Vec<Token>>,
    on_deregister: RefCell<Option<Box<dyn FnMut()>>>,
}

impl ManualReactor {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Run `hook` on every deregistration, before it takes effect.
    pub fn set_on_deregister(&self, hook: impl FnMut() + 'static) {
        *self.on_deregister.borrow_mut() = Some(Box::new(hook));
    }

    pub fn registered(&self) -> usize {
        self.handlers.borrow().len()
    }

    /// Notify every handler watching `fd`. Returns how many ran.
    pub fn fire(&self, fd: RawFd) -> usize {
        let tokens: Vec<u64> = self
            .handlers
            .borrow()
            .iter()
            .filter(|(_, (f, _))| *f == fd)
            .map(|(t, _)| *t)
            .collect();

        let mut ran = 0;
        for token in tokens {
            let taken = self
                .handlers
                .borrow_mut()
                .get_mut(&token)
                .and_then(|(_, h)| h.take());
            let Some(mut handler) = taken else { continue };
            handler();
            ran += 1;
            if let Some((_, slot)) = self.handlers.borrow_mut().get_mut(&token) {
                *slot = Some(handler);
            }
        }
        ran
    }
}

impl Reactor for ManualReactor {
    fn register(&self, fd: RawFd, handler: ReadyHandler) -> io::Result<Token> {
        if self.fail_register.get() {
            return Err(io::Error::new(io::ErrorKind::Other, "register refused"));
        }
        let token = self.next.get() + 1;
        self.next.set(token);
        self.handlers.borrow_mut().insert(token, (fd, Some(handler)));
        Ok(Token(token))
    }

    fn deregister(&self, token: Token) -> io::Result<()> {
        if let Some(hook) = self.on_deregister.borrow_mut().as_mut() {
            hook();
        }
        self.deregistered.borrow_mut().push(token);
        self.handlers.borrow_mut().remove(&token.0);
        if self.fail_deregister.get() {
            return Err(io::Error::new(io::ErrorKind::Other, "deregister refused"));
        }
        Ok(())
    }
}

pub type TestConnection = Connection<ScriptedFactory, Rc<ManualReactor>>;

pub fn connection(script: &ScriptHandle, reactor: &Rc<ManualReactor>) -> TestConnection {
    Connection::new(factory(script), reactor.clone())
}

/// Callback collecting every message as a list of strings.
pub fn collector() -> (Rc<RefCell<Vec<Vec<String>>>>, impl FnMut(subdrain_core::message::Message)) {
    let received = Rc::new(RefCell::new(Vec::new()));
    let sink = received.clone();
    let callback = move |msg: subdrain_core::message::Message| {
        let frames = msg
            .iter()
            .map(|f| String::from_utf8_lossy(f).into_owned())
            .collect();
        sink.borrow_mut().push(frames);
    };
    (received, callback)
}
