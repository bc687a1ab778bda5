//! Live playback session
//!
//! Coordinates the sink with persisted playback state so a restart lands
//! back on the same stream. Live streams have no seekable buffer, so pause
//! detaches the source entirely and resume reattaches it fresh.

use crate::config::playback::READY_FALLBACK_MS;
use crate::error::Result;
use crate::sink::{PlaybackSink, SinkEvent};
use crate::storage::Storage;
use crate::types::Stream;
use log::{info, warn};
use std::time::Duration;

/// Storage key for the live stream URL
const LIVE_URL_KEY: &str = "liveStreamUrl";

/// Storage key for the live display text
const LIVE_TEXT_KEY: &str = "liveDisplayText";

/// Storage key for whether playback was active at shutdown
const WAS_PLAYING_KEY: &str = "wasPlaying";

/// Storage key owned by on-demand playback; entering live mode clears it
const NOW_PLAYING_MIX_KEY: &str = "nowPlayingMix";

/// Drives one playback sink and mirrors its live state into storage.
pub struct LiveSession<S: Storage, K: PlaybackSink> {
    storage: S,
    sink: K,
    is_live: bool,
    live_url: Option<String>,
    live_display_text: Option<String>,
    is_restoring: bool,
    ready_fallback: Duration,
}

impl<S: Storage, K: PlaybackSink> LiveSession<S, K> {
    pub fn new(storage: S, sink: K) -> Self {
        Self {
            storage,
            sink,
            is_live: false,
            live_url: None,
            live_display_text: None,
            is_restoring: false,
            ready_fallback: Duration::from_millis(READY_FALLBACK_MS),
        }
    }

    /// Override the ready-signal wait used before force-starting playback
    pub fn with_ready_fallback(mut self, fallback: Duration) -> Self {
        self.ready_fallback = fallback;
        self
    }

    pub fn is_live(&self) -> bool {
        self.is_live
    }

    pub fn is_paused(&self) -> bool {
        self.sink.is_paused()
    }

    pub fn live_url(&self) -> Option<&str> {
        self.live_url.as_deref()
    }

    pub fn live_display_text(&self) -> Option<&str> {
        self.live_display_text.as_deref()
    }

    /// Enter live mode on `url` and persist it as the current stream
    pub fn start_live(&mut self, url: &str, display_text: &str, autoplay: bool) -> Result<()> {
        info!("going live: {display_text} ({url})");
        self.is_live = true;
        self.live_url = Some(url.to_string());
        self.live_display_text = Some(display_text.to_string());

        self.storage.set(LIVE_URL_KEY, url)?;
        self.storage.set(LIVE_TEXT_KEY, display_text)?;
        // Live mode and on-demand playback are mutually exclusive
        self.storage.remove(NOW_PLAYING_MIX_KEY)?;

        self.drain_sink_events();
        self.sink.set_source(url);
        self.sink.load();
        if autoplay {
            self.begin_when_ready();
        }
        Ok(())
    }

    /// Discard queued events from earlier loads so the next wait only sees
    /// the load it belongs to. A failed load that was never played leaves
    /// its `Error` queued otherwise.
    fn drain_sink_events(&self) {
        while self.sink.events().try_recv().is_ok() {}
    }

    /// Start playback once the sink reports ready. If no signal arrives
    /// within the fallback window, start anyway; some sinks buffer without
    /// ever announcing.
    fn begin_when_ready(&mut self) {
        match self.sink.events().recv_timeout(self.ready_fallback) {
            Ok(SinkEvent::CanPlay) => self.sink.play(),
            Ok(SinkEvent::Error(reason)) => {
                warn!("live stream failed to load: {reason}");
            }
            Err(_) => self.sink.play(),
        }
    }

    /// Pause live playback by detaching the source, dropping the dead
    /// buffer and the network connection with it.
    pub fn pause_live(&mut self) -> Result<()> {
        self.sink.pause();
        self.sink.clear_source();
        self.sink.load();
        self.save_was_playing(false)
    }

    /// Resume by reattaching the live URL at the current broadcast point
    pub fn resume_live(&mut self) -> Result<()> {
        let Some(url) = self.live_url.clone() else {
            return Ok(());
        };
        self.drain_sink_events();
        self.sink.set_source(&url);
        self.sink.load();
        self.begin_when_ready();
        self.save_was_playing(true)
    }

    /// Pause if playing, resume if paused
    pub fn toggle(&mut self) -> Result<()> {
        if !self.is_live {
            return Ok(());
        }
        if self.sink.is_paused() {
            self.resume_live()
        } else {
            self.pause_live()
        }
    }

    /// Stop live playback and leave live mode
    pub fn stop_live(&mut self) -> Result<()> {
        if !self.is_live {
            return Ok(());
        }
        self.pause_live()?;
        self.exit_live_mode()
    }

    /// Leave live mode, clearing persisted live state
    pub fn exit_live_mode(&mut self) -> Result<()> {
        self.is_live = false;
        self.live_url = None;
        self.live_display_text = None;
        self.storage.remove(LIVE_URL_KEY)?;
        self.storage.remove(LIVE_TEXT_KEY)
    }

    /// Play a non-live source, leaving live mode if active
    pub fn play_on_demand(&mut self, url: &str) -> Result<()> {
        self.sink.pause();
        if self.is_live {
            self.exit_live_mode()?;
        }
        self.sink.set_source(url);
        self.sink.load();
        self.sink.play();
        Ok(())
    }

    /// Play a resolved stream. Returns Ok(false) when the stream is not
    /// available.
    pub fn play_stream(&mut self, stream: &Stream) -> Result<bool> {
        let (true, Some(url)) = (stream.available, stream.resolved_url.as_deref()) else {
            return Ok(false);
        };
        self.storage.set_bool(WAS_PLAYING_KEY, true)?;
        self.start_live(url, &format!("Live from {}", stream.name), true)?;
        Ok(true)
    }

    /// Restore the previous session from storage. Returns Ok(true) when a
    /// live stream was restored. Playback resumes only if it was active at
    /// shutdown; the restore itself never flips the stored flag.
    pub fn restore(&mut self) -> Result<bool> {
        let (Some(url), Some(text)) = (
            self.storage.get(LIVE_URL_KEY),
            self.storage.get(LIVE_TEXT_KEY),
        ) else {
            return Ok(false);
        };
        let was_playing = self.storage.get_bool(WAS_PLAYING_KEY, false);
        info!("restoring live session: {text} (was_playing: {was_playing})");

        self.is_restoring = true;
        let outcome = self.start_live(&url, &text, was_playing);
        self.is_restoring = false;
        outcome?;
        Ok(true)
    }

    fn save_was_playing(&self, playing: bool) -> Result<()> {
        // A restore replays pause/play transitions; recording those would
        // clobber the state being restored.
        if self.is_restoring {
            return Ok(());
        }
        self.storage.set_bool(WAS_PLAYING_KEY, playing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use crossbeam_channel::{unbounded, Receiver, Sender};
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        SetSource(String),
        ClearSource,
        Load,
        Play,
        Pause,
    }

    struct RecordingSink {
        calls: Arc<Mutex<Vec<Call>>>,
        paused: bool,
        tx: Sender<SinkEvent>,
        rx: Receiver<SinkEvent>,
        ready_on_load: bool,
        /// Events emitted one per `load`, ahead of the default behavior
        scripted: VecDeque<SinkEvent>,
    }

    impl RecordingSink {
        fn new(ready_on_load: bool) -> (Self, Arc<Mutex<Vec<Call>>>) {
            let calls = Arc::new(Mutex::new(Vec::new()));
            let (tx, rx) = unbounded();
            (
                Self {
                    calls: Arc::clone(&calls),
                    paused: true,
                    tx,
                    rx,
                    ready_on_load,
                    scripted: VecDeque::new(),
                },
                calls,
            )
        }

        fn with_load_outcomes(
            outcomes: impl IntoIterator<Item = SinkEvent>,
        ) -> (Self, Arc<Mutex<Vec<Call>>>) {
            let (mut sink, calls) = Self::new(false);
            sink.scripted = outcomes.into_iter().collect();
            (sink, calls)
        }
    }

    impl PlaybackSink for RecordingSink {
        fn set_source(&mut self, url: &str) {
            self.calls.lock().unwrap().push(Call::SetSource(url.to_string()));
        }

        fn clear_source(&mut self) {
            self.calls.lock().unwrap().push(Call::ClearSource);
        }

        fn load(&mut self) {
            self.calls.lock().unwrap().push(Call::Load);
            if let Some(event) = self.scripted.pop_front() {
                self.tx.send(event).unwrap();
            } else if self.ready_on_load {
                self.tx.send(SinkEvent::CanPlay).unwrap();
            }
        }

        fn play(&mut self) {
            self.paused = false;
            self.calls.lock().unwrap().push(Call::Play);
        }

        fn pause(&mut self) {
            self.paused = true;
            self.calls.lock().unwrap().push(Call::Pause);
        }

        fn is_paused(&self) -> bool {
            self.paused
        }

        fn events(&self) -> &Receiver<SinkEvent> {
            &self.rx
        }
    }

    fn session(ready_on_load: bool) -> (LiveSession<MemoryStorage, RecordingSink>, Arc<Mutex<Vec<Call>>>) {
        let (sink, calls) = RecordingSink::new(ready_on_load);
        let session = LiveSession::new(MemoryStorage::new(), sink)
            .with_ready_fallback(Duration::from_millis(20));
        (session, calls)
    }

    fn stream(available: bool) -> Stream {
        Stream {
            source_playlist_url: "http://a/list.m3u".to_string(),
            resolved_url: available.then(|| "http://a/stream".to_string()),
            name: "My Station".to_string(),
            genre: None,
            available,
            reason: (!available).then(|| "No working stream found".to_string()),
        }
    }

    #[test]
    fn start_live_persists_state_and_plays_when_ready() {
        let (mut session, calls) = session(true);

        session.start_live("http://a/stream", "Live from A", true).unwrap();
        assert!(session.is_live());
        assert_eq!(session.storage.get(LIVE_URL_KEY).as_deref(), Some("http://a/stream"));
        assert_eq!(session.storage.get(LIVE_TEXT_KEY).as_deref(), Some("Live from A"));
        assert_eq!(
            *calls.lock().unwrap(),
            vec![Call::SetSource("http://a/stream".to_string()), Call::Load, Call::Play]
        );
    }

    #[test]
    fn start_live_clears_on_demand_pointer() {
        let (mut session, _) = session(true);
        session.storage.set(NOW_PLAYING_MIX_KEY, "mix-7").unwrap();

        session.start_live("http://a/stream", "Live", false).unwrap();
        assert_eq!(session.storage.get(NOW_PLAYING_MIX_KEY), None);
    }

    #[test]
    fn silent_sink_gets_force_played_after_fallback() {
        let (mut session, calls) = session(false);

        session.start_live("http://a/stream", "Live", true).unwrap();
        assert_eq!(calls.lock().unwrap().last(), Some(&Call::Play));
    }

    #[test]
    fn load_error_does_not_start_playback() {
        let (sink, calls) = RecordingSink::with_load_outcomes([SinkEvent::Error("boom".into())]);
        let mut session = LiveSession::new(MemoryStorage::new(), sink)
            .with_ready_fallback(Duration::from_millis(20));

        session.start_live("http://a/stream", "Live", true).unwrap();
        assert!(!calls.lock().unwrap().contains(&Call::Play));
    }

    #[test]
    fn stale_load_error_does_not_block_resume() {
        // First load fails while autoplay is off, so nothing consumes the
        // Error; the retry must not mistake it for its own outcome.
        let (sink, calls) = RecordingSink::with_load_outcomes([
            SinkEvent::Error("boom".into()),
            SinkEvent::CanPlay,
        ]);
        let mut session = LiveSession::new(MemoryStorage::new(), sink)
            .with_ready_fallback(Duration::from_millis(20));

        session.start_live("http://a/stream", "Live", false).unwrap();
        assert!(!calls.lock().unwrap().contains(&Call::Play));

        session.resume_live().unwrap();
        assert!(calls.lock().unwrap().contains(&Call::Play));
        assert!(session.storage.get_bool(WAS_PLAYING_KEY, false));
    }

    #[test]
    fn pause_live_detaches_source() {
        let (mut session, calls) = session(true);
        session.start_live("http://a/stream", "Live", true).unwrap();
        calls.lock().unwrap().clear();

        session.pause_live().unwrap();
        assert_eq!(
            *calls.lock().unwrap(),
            vec![Call::Pause, Call::ClearSource, Call::Load]
        );
        assert!(!session.storage.get_bool(WAS_PLAYING_KEY, true));
    }

    #[test]
    fn resume_live_reattaches_and_plays() {
        let (mut session, calls) = session(true);
        session.start_live("http://a/stream", "Live", true).unwrap();
        session.pause_live().unwrap();
        calls.lock().unwrap().clear();

        session.resume_live().unwrap();
        assert_eq!(
            *calls.lock().unwrap(),
            vec![Call::SetSource("http://a/stream".to_string()), Call::Load, Call::Play]
        );
        assert!(session.storage.get_bool(WAS_PLAYING_KEY, false));
    }

    #[test]
    fn toggle_alternates_pause_and_resume() {
        let (mut session, calls) = session(true);
        session.start_live("http://a/stream", "Live", true).unwrap();

        calls.lock().unwrap().clear();
        session.toggle().unwrap();
        assert!(calls.lock().unwrap().contains(&Call::ClearSource));

        calls.lock().unwrap().clear();
        session.toggle().unwrap();
        assert!(calls.lock().unwrap().contains(&Call::Play));
    }

    #[test]
    fn stop_live_clears_persisted_state() {
        let (mut session, _) = session(true);
        session.start_live("http://a/stream", "Live", true).unwrap();

        session.stop_live().unwrap();
        assert!(!session.is_live());
        assert_eq!(session.storage.get(LIVE_URL_KEY), None);
        assert_eq!(session.storage.get(LIVE_TEXT_KEY), None);
    }

    #[test]
    fn play_on_demand_exits_live_mode() {
        let (mut session, calls) = session(true);
        session.start_live("http://a/stream", "Live", true).unwrap();
        calls.lock().unwrap().clear();

        session.play_on_demand("http://a/mix.mp3").unwrap();
        assert!(!session.is_live());
        assert_eq!(session.storage.get(LIVE_URL_KEY), None);
        assert_eq!(
            *calls.lock().unwrap(),
            vec![
                Call::Pause,
                Call::SetSource("http://a/mix.mp3".to_string()),
                Call::Load,
                Call::Play,
            ]
        );
    }

    #[test]
    fn play_stream_requires_availability() {
        let (mut session, _) = session(true);

        assert!(!session.play_stream(&stream(false)).unwrap());
        assert!(!session.is_live());

        assert!(session.play_stream(&stream(true)).unwrap());
        assert!(session.is_live());
        assert_eq!(
            session.live_display_text(),
            Some("Live from My Station")
        );
        assert!(session.storage.get_bool(WAS_PLAYING_KEY, false));
    }

    #[test]
    fn restore_resumes_playback_when_it_was_active() {
        let storage = MemoryStorage::new();
        storage.set(LIVE_URL_KEY, "http://a/stream").unwrap();
        storage.set(LIVE_TEXT_KEY, "Live from A").unwrap();
        storage.set_bool(WAS_PLAYING_KEY, true).unwrap();

        let (sink, calls) = RecordingSink::new(true);
        let mut session =
            LiveSession::new(storage, sink).with_ready_fallback(Duration::from_millis(20));

        assert!(session.restore().unwrap());
        assert!(session.is_live());
        assert_eq!(session.live_url(), Some("http://a/stream"));
        assert!(calls.lock().unwrap().contains(&Call::Play));
    }

    #[test]
    fn restore_stays_paused_when_it_was_paused() {
        let storage = MemoryStorage::new();
        storage.set(LIVE_URL_KEY, "http://a/stream").unwrap();
        storage.set(LIVE_TEXT_KEY, "Live from A").unwrap();
        storage.set_bool(WAS_PLAYING_KEY, false).unwrap();

        let (sink, calls) = RecordingSink::new(true);
        let mut session =
            LiveSession::new(storage, sink).with_ready_fallback(Duration::from_millis(20));

        assert!(session.restore().unwrap());
        assert!(session.is_live());
        assert!(!calls.lock().unwrap().contains(&Call::Play));
        // The stored flag survives the restore untouched
        assert!(!session.storage.get_bool(WAS_PLAYING_KEY, true));
    }

    #[test]
    fn restore_without_saved_session_is_a_noop() {
        let (mut session, calls) = session(true);
        assert!(!session.restore().unwrap());
        assert!(!session.is_live());
        assert!(calls.lock().unwrap().is_empty());
    }
}
