//! libzmq PUB -> subdrain SUB
//!
//! A libzmq publisher thread emits a few two-frame messages; the main thread
//! receives them through a `SubConnection` driven by a `PollReactor`.
//!
//! Run this example:
//! ```bash
//! RUST_LOG=debug cargo run --example subscribe_libzmq --features zmq
//! ```

use std::cell::Cell;
use std::rc::Rc;
use std::thread;
use std::time::Duration;

use subdrain::zmq::prelude::*;

const ENDPOINT: &str = "tcp://127.0.0.1:5562";
const COUNT: usize = 3;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    subdrain::dev_tracing::init_tracing();
    println!("=== libzmq PUB -> subdrain SUB ===\n");

    let publisher = thread::spawn(|| {
        let ctx = zmq::Context::new();
        let publisher = ctx.socket(zmq::PUB).unwrap();
        publisher.bind(ENDPOINT).unwrap();
        println!("[libzmq PUB] Bound to {ENDPOINT}");

        // Give the subscriber time to connect and subscribe.
        thread::sleep(Duration::from_millis(300));

        for i in 1..=COUNT {
            let body = format!("event {i}");
            publisher.send_multipart(["topic", body.as_str()], 0).unwrap();
            println!("[libzmq PUB] Published: {body}");
            thread::sleep(Duration::from_millis(10));
        }
    });

    let reactor = Rc::new(PollReactor::new());
    let sub = SubConnection::open(&reactor, ENDPOINT)?;
    println!("[subdrain SUB] Connected to {ENDPOINT}");

    let received = Rc::new(Cell::new(0usize));
    let counter = Rc::clone(&received);
    sub.on_message(move |msg: Message| {
        let frames: Vec<_> = msg.iter().map(|f| String::from_utf8_lossy(f)).collect();
        println!("[subdrain SUB] Received: {frames:?}");
        counter.set(counter.get() + 1);
    });

    let done = reactor.run_until(Duration::from_secs(5), || received.get() >= COUNT)?;
    sub.close()?;
    publisher.join().map_err(|_| "publisher thread panicked")?;

    if done {
        println!("\nReceived all {COUNT} messages");
    } else {
        println!("\nTimed out after {} message(s)", received.get());
    }
    Ok(())
}
