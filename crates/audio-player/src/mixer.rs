//! Track-at-a-time playback service.
//!
//! [`Mixer::load`] probes a file and hands back a [`Track`] handle. [`Mixer::play`]
//! starts a session thread that decodes the track and plays it on the output device.
//! One session is active at a time; starting another halts the current one first.
//!
//! When a session plays its track to the end, the callback registered with
//! [`Mixer::on_finished`] runs once, on the session thread. Halted sessions do not call
//! it. A session that fails (no device, stream error) records the error for
//! [`Mixer::take_error`] instead.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};
use cpal::traits::DeviceTrait;

use crate::config::PlaybackConfig;
use crate::decode::{self, SourceInfo};
use crate::device;
use crate::pipeline::OutputSession;

type FinishedCallback = Arc<dyn Fn() + Send + Sync>;

/// A loaded, playable track.
#[derive(Clone, Debug)]
pub struct Track {
    path: PathBuf,
    info: SourceInfo,
}

impl Track {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn info(&self) -> &SourceInfo {
        &self.info
    }

    /// File name for display, falling back to the full path.
    pub fn title(&self) -> String {
        self.path
            .file_name()
            .unwrap_or(self.path.as_os_str())
            .to_string_lossy()
            .into_owned()
    }
}

struct Session {
    cancel: Arc<AtomicBool>,
    paused: Arc<AtomicBool>,
    join: JoinHandle<()>,
}

pub struct Mixer {
    device: Option<String>,
    playback: PlaybackConfig,
    on_finished: Option<FinishedCallback>,
    failure: Arc<Mutex<Option<anyhow::Error>>>,
    session: Option<Session>,
}

impl Mixer {
    /// `device` selects an output by name substring; `None` uses the default output.
    pub fn new(device: Option<String>, playback: PlaybackConfig) -> Self {
        Self {
            device,
            playback,
            on_finished: None,
            failure: Arc::new(Mutex::new(None)),
            session: None,
        }
    }

    /// Register the completion callback. Applies to sessions started afterwards.
    pub fn on_finished(&mut self, callback: impl Fn() + Send + Sync + 'static) {
        self.on_finished = Some(Arc::new(callback));
    }

    /// Probe `path` and return a handle if it can be decoded.
    pub fn load(&self, path: &Path) -> Result<Track> {
        let info = decode::probe_file(path)?;
        tracing::debug!(
            path = %path.display(),
            rate_hz = info.rate,
            channels = info.channels,
            codec = info.codec.as_deref().unwrap_or("?"),
            "track loaded"
        );
        Ok(Track {
            path: path.to_path_buf(),
            info,
        })
    }

    /// Halt whatever is playing and start `track`.
    pub fn play(&mut self, track: &Track) -> Result<()> {
        self.halt();

        let cancel = Arc::new(AtomicBool::new(false));
        let paused = Arc::new(AtomicBool::new(false));
        let job = SessionJob {
            track: track.clone(),
            device: self.device.clone(),
            playback: self.playback.clone(),
            cancel: cancel.clone(),
            paused: paused.clone(),
            on_finished: self.on_finished.clone(),
            failure: self.failure.clone(),
        };
        let join = thread::Builder::new()
            .name("mixer-session".into())
            .spawn(move || job.run())
            .context("[Audio] spawn playback session")?;

        self.session = Some(Session {
            cancel,
            paused,
            join,
        });
        Ok(())
    }

    pub fn pause(&self) {
        if let Some(sess) = &self.session {
            sess.paused.store(true, Ordering::Relaxed);
            tracing::info!("paused");
        }
    }

    pub fn resume(&self) {
        if let Some(sess) = &self.session {
            sess.paused.store(false, Ordering::Relaxed);
            tracing::info!("resumed");
        }
    }

    pub fn is_paused(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.paused.load(Ordering::Relaxed))
    }

    /// Stop the active session, if any, and wait for its thread.
    pub fn halt(&mut self) {
        if let Some(sess) = self.session.take() {
            sess.cancel.store(true, Ordering::Relaxed);
            if sess.join.join().is_err() {
                tracing::warn!("playback session panicked");
            }
        }
    }

    /// The first session failure since the last call, if any.
    pub fn take_error(&self) -> Option<anyhow::Error> {
        self.failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

impl Drop for Mixer {
    fn drop(&mut self) {
        self.halt();
    }
}

/// Everything a session thread owns.
struct SessionJob {
    track: Track,
    device: Option<String>,
    playback: PlaybackConfig,
    cancel: Arc<AtomicBool>,
    paused: Arc<AtomicBool>,
    on_finished: Option<FinishedCallback>,
    failure: Arc<Mutex<Option<anyhow::Error>>>,
}

impl SessionJob {
    fn run(self) {
        match self.play_to_end() {
            Ok(true) => {
                if let Some(cb) = &self.on_finished {
                    cb();
                }
            }
            Ok(false) => tracing::debug!(track = %self.track.title(), "session halted"),
            Err(e) => {
                // The owner reports it through take_error.
                tracing::debug!(track = %self.track.title(), "[Audio] playback failed: {e:#}");
                let mut slot = self.failure.lock().unwrap_or_else(PoisonError::into_inner);
                slot.get_or_insert(e);
            }
        }
    }

    /// `Ok(true)` if the track played to its end, `Ok(false)` if halted.
    fn play_to_end(&self) -> Result<bool> {
        let host = cpal::default_host();
        let device = device::pick_device(&host, self.device.as_deref())?;
        let (info, queue) =
            decode::start_streaming_decode(&self.track.path, self.playback.buffer_seconds)?;
        tracing::debug!(
            device = %device.description().map(|d| d.to_string()).unwrap_or_default(),
            rate_hz = info.rate,
            "session output"
        );

        let session = OutputSession::start(
            &device,
            &self.playback,
            info.rate,
            queue,
            self.paused.clone(),
        )?;
        let finished = session.wait_or_cancel(&self.cancel);
        tracing::debug!(
            track = %self.track.title(),
            elapsed_ms = session.elapsed_ms(),
            finished,
            "session ended"
        );
        Ok(finished && !self.cancel.load(Ordering::Relaxed))
    }
}
