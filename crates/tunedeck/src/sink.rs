//! Playback sink interface and the HTTP-backed default sink
//!
//! The engine never decodes audio. It drives whatever media output the host
//! provides through `PlaybackSink` and observes ready/error signals; probing
//! uses short-lived sinks created by a `SinkFactory`.

use crate::config::network::{CONNECT_TIMEOUT_SECS, USER_AGENT};
use crate::error::Result;
use crossbeam_channel::{unbounded, Receiver, Sender};
use log::debug;
use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Signals emitted by a sink while loading a source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    /// Enough data has arrived to begin playback
    CanPlay,
    /// Loading the source failed
    Error(String),
}

/// A media output the engine can attach a URL to.
///
/// `load` and `play` never complete synchronously; outcomes arrive on the
/// `events` channel. `clear_source` must stop any background download.
pub trait PlaybackSink {
    fn set_source(&mut self, url: &str);
    fn clear_source(&mut self);
    fn load(&mut self);
    fn play(&mut self);
    fn pause(&mut self);
    fn is_paused(&self) -> bool;
    fn events(&self) -> &Receiver<SinkEvent>;
}

/// Creates disposable sinks for availability probing
pub trait SinkFactory {
    type Sink: PlaybackSink;

    fn create(&self) -> Self::Sink;
}

// =============================================================================
// HttpSink - default sink backed by a streaming GET
// =============================================================================

/// How long a paused worker sleeps between flag checks
const PAUSE_POLL_MS: u64 = 50;

/// Worker read chunk size
const CHUNK_SIZE: usize = 8 * 1024;

/// Default sink: a worker thread GETs the source and signals `CanPlay` on
/// the first audio bytes. It performs no decoding; "playing" means the
/// download keeps draining, "paused" means it idles. Detaching the source
/// stops the download entirely.
pub struct HttpSink {
    client: reqwest::blocking::Client,
    src: Option<String>,
    paused: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
    event_tx: Sender<SinkEvent>,
    event_rx: Receiver<SinkEvent>,
}

impl HttpSink {
    fn with_client(client: reqwest::blocking::Client) -> Self {
        let (event_tx, event_rx) = unbounded();
        Self {
            client,
            src: None,
            paused: Arc::new(AtomicBool::new(true)),
            stop: Arc::new(AtomicBool::new(false)),
            event_tx,
            event_rx,
        }
    }

    fn stop_worker(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        // Fresh flag so the next load isn't already stopped
        self.stop = Arc::new(AtomicBool::new(false));
    }
}

impl PlaybackSink for HttpSink {
    fn set_source(&mut self, url: &str) {
        self.stop_worker();
        self.src = Some(url.to_string());
    }

    fn clear_source(&mut self) {
        self.stop_worker();
        self.src = None;
    }

    fn load(&mut self) {
        let url = match &self.src {
            Some(url) => url.clone(),
            None => return,
        };
        self.stop_worker();

        let client = self.client.clone();
        let stop = Arc::clone(&self.stop);
        let paused = Arc::clone(&self.paused);
        let tx = self.event_tx.clone();

        std::thread::Builder::new()
            .name("sink-load".into())
            .spawn(move || stream_worker(client, &url, &stop, &paused, &tx))
            .expect("Failed to spawn sink-load thread");
    }

    fn play(&mut self) {
        self.paused.store(false, Ordering::Relaxed);
    }

    fn pause(&mut self) {
        self.paused.store(true, Ordering::Relaxed);
    }

    fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    fn events(&self) -> &Receiver<SinkEvent> {
        &self.event_rx
    }
}

impl Drop for HttpSink {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

fn stream_worker(
    client: reqwest::blocking::Client,
    url: &str,
    stop: &AtomicBool,
    paused: &AtomicBool,
    tx: &Sender<SinkEvent>,
) {
    let mut response = match client.get(url).send() {
        Ok(response) => response,
        Err(e) => {
            let _ = tx.send(SinkEvent::Error(e.to_string()));
            return;
        }
    };

    if !response.status().is_success() {
        let _ = tx.send(SinkEvent::Error(format!("HTTP {}", response.status())));
        return;
    }

    // Shoutcast-style servers answer some URL shapes with an HTML status
    // page; that is a redirect trap, not a stream.
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_lowercase();
    if content_type.starts_with("text/html") {
        let _ = tx.send(SinkEvent::Error(format!(
            "Not a stream (content-type {content_type})"
        )));
        return;
    }

    let mut buf = [0u8; CHUNK_SIZE];
    let mut announced = false;
    loop {
        if stop.load(Ordering::Relaxed) {
            debug!("sink worker detached from {url}");
            return;
        }
        // Buffer until ready is announced; after that, a paused sink idles
        // instead of draining the connection.
        if announced && paused.load(Ordering::Relaxed) {
            std::thread::sleep(Duration::from_millis(PAUSE_POLL_MS));
            continue;
        }
        match response.read(&mut buf) {
            Ok(0) => {
                if !announced {
                    let _ = tx.send(SinkEvent::Error("Stream ended before any data".into()));
                }
                return;
            }
            Ok(_) => {
                if !announced {
                    announced = true;
                    let _ = tx.send(SinkEvent::CanPlay);
                }
            }
            Err(e) => {
                if !announced {
                    let _ = tx.send(SinkEvent::Error(e.to_string()));
                }
                return;
            }
        }
    }
}

// =============================================================================
// HttpSinkFactory
// =============================================================================

/// Builds `HttpSink`s sharing one HTTP client. No total read timeout is set:
/// live streams never end, and probe timeouts are enforced by the caller.
#[derive(Clone)]
pub struct HttpSinkFactory {
    client: reqwest::blocking::Client,
}

impl HttpSinkFactory {
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()?;
        Ok(Self { client })
    }
}

impl SinkFactory for HttpSinkFactory {
    type Sink = HttpSink;

    fn create(&self) -> HttpSink {
        HttpSink::with_client(self.client.clone())
    }
}
