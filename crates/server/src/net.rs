//! TCP accept loop, per-connection request handling and frame streaming.
//!
//! Every connection owns one simulation context: engine, work queue,
//! worker thread and outbound frame ring. The request thread scans the
//! byte stream for envelopes and replies in order; a separate sender
//! thread drains the ring into unsolicited frame messages whenever the
//! worker signals a published frame.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;

use anyhow::{Context, Result};
use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use physics::{worker, FrameSink, Scalar, SharedFrameRing};

use crate::handler::{ActionHandler, Outcome, SimulationContext};
use crate::protocol::{encode_frame_message, encode_reply, MessageDecoder};

/// Binds the listener and serves connections until the process exits.
pub fn run(address: &str, port: u16, frame_capacity: u16) -> Result<()> {
    let listener = TcpListener::bind((address, port))
        .with_context(|| format!("failed to bind {address}:{port}"))?;
    tracing::info!(address, port, "server listening");
    serve(&listener, frame_capacity)
}

/// Serves connections on an already bound listener.
pub fn serve(listener: &TcpListener, frame_capacity: u16) -> Result<()> {
    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                std::thread::spawn(move || {
                    let peer = stream
                        .peer_addr()
                        .map_or_else(|_| "unknown".into(), |addr| addr.to_string());
                    tracing::info!(%peer, "client connected");
                    if let Err(error) = serve_connection(stream, frame_capacity) {
                        tracing::warn!(%peer, %error, "connection ended with error");
                    } else {
                        tracing::info!(%peer, "client disconnected");
                    }
                });
            }
            Err(error) => tracing::warn!(%error, "failed to accept connection"),
        }
    }
    Ok(())
}

fn serve_connection(stream: TcpStream, frame_capacity: u16) -> Result<()> {
    stream.set_nodelay(true).ok();
    let context = SimulationContext::new(frame_capacity);
    let (notify, frames) = crossbeam_channel::bounded(usize::from(frame_capacity));
    let worker_handle = worker::spawn(
        Arc::clone(&context.sim),
        Arc::clone(&context.queue),
        Some(FrameSink {
            ring: Arc::clone(&context.ring),
            notify,
        }),
    );

    let writer = Arc::new(Mutex::new(stream.try_clone().context("stream clone")?));
    let frame_thread = {
        let ring = Arc::clone(&context.ring);
        let writer = Arc::clone(&writer);
        std::thread::spawn(move || stream_frames(&frames, &ring, &writer))
    };

    let handler = ActionHandler::new(&context);
    let result = request_loop(stream, &handler, &writer);

    // Tear down: stop the worker first so the notify sender disconnects and
    // the frame thread drains out.
    context.queue.stop_simulation();
    worker_handle.stop();
    let _ = frame_thread.join();
    result
}

fn request_loop(
    mut stream: TcpStream,
    handler: &ActionHandler,
    writer: &Arc<Mutex<TcpStream>>,
) -> Result<()> {
    let mut decoder = MessageDecoder::new();
    let mut buffer = [0u8; 4096];
    loop {
        let read = stream.read(&mut buffer).context("socket read")?;
        if read == 0 {
            return Ok(());
        }
        decoder.push(&buffer[..read]);
        while let Some(message) = decoder.next_message() {
            match handler.handle(&message) {
                Outcome::Reply(payload) => {
                    writer
                        .lock()
                        .write_all(&encode_reply(&payload))
                        .context("socket write")?;
                }
                Outcome::Terminate => {
                    writer
                        .lock()
                        .write_all(&encode_reply(&[]))
                        .context("socket write")?;
                    tracing::info!("terminate requested, shutting down");
                    std::process::exit(0);
                }
            }
        }
    }
}

fn stream_frames(frames: &Receiver<()>, ring: &SharedFrameRing, writer: &Arc<Mutex<TcpStream>>) {
    while frames.recv().is_ok() {
        loop {
            let words = {
                let mut ring = ring.lock();
                if ring.used() == 0 {
                    break;
                }
                let mut words: Vec<Scalar> =
                    Vec::with_capacity(usize::from(ring.elements_per_frame()));
                while ring.has_elements() {
                    words.push(ring.pop_element());
                }
                ring.pop_frame();
                words
            };
            if writer.lock().write_all(&encode_frame_message(&words)).is_err() {
                return;
            }
        }
    }
}
