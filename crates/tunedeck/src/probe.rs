//! Stream availability probing
//!
//! A probe attaches a candidate URL to a throwaway sink and waits a bounded
//! time for the ready signal. No probe outlives its timeout, so resolving a
//! registry of dead streams stays bounded.

use crate::sink::{PlaybackSink, SinkEvent, SinkFactory};
use log::debug;
use std::time::Duration;

/// Probes candidate URLs using sinks from a factory
pub struct StreamProber<F: SinkFactory> {
    factory: F,
}

impl<F: SinkFactory> StreamProber<F> {
    pub fn new(factory: F) -> Self {
        Self { factory }
    }

    /// Returns true when the sink reports ready within `timeout`. An error
    /// event, a timeout, or a dropped sink all count as failure. The source
    /// is always detached before returning.
    pub fn probe(&self, url: &str, timeout: Duration) -> bool {
        let mut sink = self.factory.create();
        sink.set_source(url);
        sink.load();

        let outcome = sink.events().recv_timeout(timeout);
        let playable = match outcome {
            Ok(SinkEvent::CanPlay) => true,
            Ok(SinkEvent::Error(reason)) => {
                debug!("probe failed for {url}: {reason}");
                false
            }
            Err(_) => {
                debug!("probe timed out for {url}");
                false
            }
        };
        sink.clear_source();
        playable
    }
}
