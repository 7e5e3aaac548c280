//! Sequential playback driven by completion signals.
//!
//! The sequencer owns the loaded tracks and a cursor to the next one. Each
//! [`Sequencer::step`] drains completion signals from the audio layer and, once the
//! current track has finished, starts the next. Signals travel over a channel, so a
//! signal sent from the audio thread happens-before the cursor advance that observes it.
//!
//! After the last track finishes the sequencer is [`SequencerState::Finished`] and
//! stays there: further signals are ignored and nothing past the end is started.

use anyhow::Result;
use crossbeam_channel::{Receiver, Sender};

/// The audio layer as seen by the sequencer.
pub trait PlaybackBackend<T> {
    /// Start `track`, replacing whatever is playing.
    fn start(&mut self, track: &T) -> Result<()>;
    fn pause(&mut self);
    fn resume(&mut self);
    fn is_paused(&self) -> bool;
    /// Stop playback. No completion signal follows.
    fn halt(&mut self);
    /// A failure the backend hit on its own since the last call, such as a lost device.
    fn take_error(&mut self) -> Option<anyhow::Error> {
        None
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SequencerState {
    Playing,
    Finished,
}

/// Sending half of the completion channel; hand one to the audio layer.
#[derive(Clone, Debug)]
pub struct CompletionSignal {
    tx: Sender<()>,
}

impl CompletionSignal {
    /// Report that the current track played to its end.
    pub fn notify(&self) {
        // The sequencer may already be gone during teardown.
        let _ = self.tx.send(());
    }
}

#[derive(Debug)]
pub struct Sequencer<T> {
    tracks: Vec<T>,
    cursor: usize,
    advance_pending: bool,
    finished: bool,
    signal_tx: Sender<()>,
    signal_rx: Receiver<()>,
}

impl<T> Sequencer<T> {
    pub fn new(tracks: Vec<T>) -> Self {
        let (signal_tx, signal_rx) = crossbeam_channel::unbounded();
        Self {
            tracks,
            cursor: 0,
            advance_pending: false,
            finished: false,
            signal_tx,
            signal_rx,
        }
    }

    pub fn completion_signal(&self) -> CompletionSignal {
        CompletionSignal {
            tx: self.signal_tx.clone(),
        }
    }

    /// Index of the next track to start.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Whether a started track has not yet signalled completion.
    pub fn is_pending(&self) -> bool {
        self.advance_pending
    }

    /// The most recently started track.
    pub fn current(&self) -> Option<&T> {
        self.cursor.checked_sub(1).and_then(|i| self.tracks.get(i))
    }

    pub fn state(&self) -> SequencerState {
        if self.finished {
            SequencerState::Finished
        } else {
            SequencerState::Playing
        }
    }

    /// Apply pending completion signals and start the next track if nothing is playing.
    pub fn step<B: PlaybackBackend<T>>(&mut self, backend: &mut B) -> Result<SequencerState> {
        while self.signal_rx.try_recv().is_ok() {
            self.on_completion();
        }
        if self.finished {
            return Ok(SequencerState::Finished);
        }
        if !self.advance_pending {
            let Some(track) = self.tracks.get(self.cursor) else {
                // Empty playlist.
                self.finished = true;
                return Ok(SequencerState::Finished);
            };
            backend.start(track)?;
            self.cursor += 1;
            self.advance_pending = true;
            tracing::debug!(cursor = self.cursor, total = self.tracks.len(), "track started");
        }
        Ok(SequencerState::Playing)
    }

    pub fn pause<B: PlaybackBackend<T>>(&self, backend: &mut B) {
        backend.pause();
    }

    pub fn resume<B: PlaybackBackend<T>>(&self, backend: &mut B) {
        backend.resume();
    }

    pub fn toggle_pause<B: PlaybackBackend<T>>(&self, backend: &mut B) {
        if backend.is_paused() {
            backend.resume();
        } else {
            backend.pause();
        }
    }

    /// Halt the backend and release every track.
    pub fn teardown<B: PlaybackBackend<T>>(self, backend: &mut B) {
        backend.halt();
        tracing::debug!(tracks = self.tracks.len(), "released tracks");
        drop(self.tracks);
    }

    fn on_completion(&mut self) {
        if self.finished || !self.advance_pending {
            tracing::debug!(cursor = self.cursor, "ignoring completion signal");
            return;
        }
        self.advance_pending = false;
        if self.cursor == self.tracks.len() {
            self.finished = true;
            tracing::debug!("last track finished");
        }
    }
}
