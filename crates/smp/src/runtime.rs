//! Player runtime: load the playlist, then poll input and step the sequencer until
//! the list ends or the user quits.

use std::io;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use sv::Sv;

use audio_player::device;
use audio_player::mixer::{Mixer, Track};

use crate::config::PlayerConfig;
use crate::input::{self, InputEvent, RawModeGuard};
use crate::path_buf::PathBuffer;
use crate::playlist::{self, PlaylistError};
use crate::sequencer::{PlaybackBackend, Sequencer, SequencerState};

/// How long each loop iteration waits for a key.
const INPUT_POLL: Duration = Duration::from_millis(50);

impl PlaybackBackend<Track> for Mixer {
    fn start(&mut self, track: &Track) -> Result<()> {
        self.play(track)
            .with_context(|| format!("[Audio] could not play '{}'", track.path().display()))
    }

    fn pause(&mut self) {
        Mixer::pause(self);
    }

    fn resume(&mut self) {
        Mixer::resume(self);
    }

    fn is_paused(&self) -> bool {
        Mixer::is_paused(self)
    }

    fn halt(&mut self) {
        Mixer::halt(self);
    }

    fn take_error(&mut self) -> Option<anyhow::Error> {
        Mixer::take_error(self)
    }
}

pub fn list_devices() -> Result<()> {
    let host = cpal::default_host();
    device::list_devices(&host).context("[Audio] list output devices")
}

/// Print the playlist names in `config`, one per line.
pub fn list_playlists(config: &PlayerConfig) -> Result<()> {
    let text = config.read_config_text()?;
    for name in playlist::list_playlists(Sv::new(&text)) {
        println!("{name}");
    }
    Ok(())
}

pub fn run_player(config: PlayerConfig, name: &str) -> Result<()> {
    let text = config.read_config_text()?;
    let mut mixer = Mixer::new(config.device.clone(), config.playback.clone());
    let home = Sv::new(config.home.as_os_str().as_encoded_bytes());
    let tracks = load_tracks(&config.config_path, home, &text, name, |path| mixer.load(path))?;
    tracing::info!(playlist = name, tracks = tracks.len(), "playlist loaded");

    let sequencer = Sequencer::new(tracks);
    let signal = sequencer.completion_signal();
    mixer.on_finished(move || signal.notify());

    let quit = Arc::new(AtomicBool::new(false));
    {
        let quit = quit.clone();
        ctrlc::set_handler(move || quit.store(true, Ordering::Relaxed))
            .context("install Ctrl-C handler")?;
    }

    let guard = RawModeGuard::enable()?;
    input::print_keys(&mut io::stdout()).ok();
    let result = play_all(
        sequencer,
        &mut mixer,
        &quit,
        || input::poll_input(INPUT_POLL),
        |number, total, track: &Track| {
            input::announce(
                &mut io::stdout(),
                number,
                total,
                &track.title(),
                track.info().duration_ms,
            )
            .ok();
        },
    );
    drop(guard);
    result
}

/// Resolve playlist `name` from the config text, loading each track with `load`.
///
/// A missing playlist is reported along with the names that do exist.
fn load_tracks<T>(
    config_path: &Path,
    home: Sv<'_>,
    text: &[u8],
    name: &str,
    load: impl FnMut(&Path) -> Result<T>,
) -> Result<Vec<T>> {
    let config_text = Sv::new(text);
    let mut buf = PathBuffer::new();

    match playlist::load_playlist(config_text, Sv::from_text(name), home, &mut buf, load) {
        Ok(tracks) => Ok(tracks),
        Err(PlaylistError::NotFound { name }) => {
            let available = playlist::list_playlists(config_text);
            if available.is_empty() {
                bail!(
                    "playlist '{name}' not found: no playlists in '{}'",
                    config_path.display()
                );
            }
            let available: Vec<String> = available.iter().map(|s| s.to_string()).collect();
            bail!(
                "playlist '{name}' not found (available: {})",
                available.join(", ")
            )
        }
        Err(e) => Err(e.into()),
    }
}

/// Run the playlist to its end or until quit, then release everything.
fn play_all<T, B: PlaybackBackend<T>>(
    mut sequencer: Sequencer<T>,
    backend: &mut B,
    quit: &AtomicBool,
    next_input: impl FnMut() -> Result<Option<InputEvent>>,
    on_start: impl FnMut(usize, usize, &T),
) -> Result<()> {
    let result = drive(&mut sequencer, backend, quit, next_input, on_start);
    sequencer.teardown(backend);
    result
}

fn drive<T, B: PlaybackBackend<T>>(
    sequencer: &mut Sequencer<T>,
    backend: &mut B,
    quit: &AtomicBool,
    mut next_input: impl FnMut() -> Result<Option<InputEvent>>,
    mut on_start: impl FnMut(usize, usize, &T),
) -> Result<()> {
    let mut announced = 0;
    while !quit.load(Ordering::Relaxed) {
        if let Some(e) = backend.take_error() {
            return Err(e);
        }
        if sequencer.step(backend)? == SequencerState::Finished {
            tracing::info!("playlist finished");
            return Ok(());
        }
        if sequencer.cursor() != announced {
            announced = sequencer.cursor();
            if let Some(track) = sequencer.current() {
                on_start(announced, sequencer.len(), track);
            }
        }

        match next_input()? {
            Some(InputEvent::Pause) => sequencer.pause(backend),
            Some(InputEvent::Resume) => sequencer.resume(backend),
            Some(InputEvent::TogglePause) => sequencer.toggle_pause(backend),
            Some(InputEvent::Quit) => break,
            None => {}
        }
    }
    tracing::info!("quit");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequencer::fake::{Call, FakeBackend};
    use anyhow::anyhow;

    fn scripted(events: Vec<InputEvent>) -> impl FnMut() -> Result<Option<InputEvent>> {
        let mut events = events.into_iter();
        move || Ok(events.next())
    }

    #[test]
    fn quit_key_stops_after_current_track_and_halts() {
        let mut backend = FakeBackend::default();
        let quit = AtomicBool::new(false);
        play_all(
            Sequencer::new(vec!["a", "b"]),
            &mut backend,
            &quit,
            scripted(vec![InputEvent::Quit]),
            |_, _, _| {},
        )
        .unwrap();
        assert_eq!(backend.calls, [Call::Start("a"), Call::Halt]);
    }

    #[test]
    fn quit_flag_set_before_start_plays_nothing() {
        let mut backend = FakeBackend::default();
        let quit = AtomicBool::new(true);
        play_all(
            Sequencer::new(vec!["a"]),
            &mut backend,
            &quit,
            scripted(Vec::new()),
            |_, _, _| {},
        )
        .unwrap();
        assert_eq!(backend.calls, [Call::Halt]);
    }

    #[test]
    fn backend_failure_is_returned_and_backend_still_halted() {
        let mut backend = FakeBackend {
            error: Some(anyhow!("output device lost")),
            ..Default::default()
        };
        let quit = AtomicBool::new(false);
        let err = play_all(
            Sequencer::new(vec!["a"]),
            &mut backend,
            &quit,
            scripted(Vec::new()),
            |_, _, _| {},
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "output device lost");
        assert_eq!(backend.calls, [Call::Halt]);
    }

    #[test]
    fn completions_play_every_track_and_announce_each() {
        let sequencer = Sequencer::new(vec!["a", "b", "c"]);
        let signal = sequencer.completion_signal();
        let mut backend = FakeBackend::default();
        let quit = AtomicBool::new(false);
        let mut announced = Vec::new();

        play_all(
            sequencer,
            &mut backend,
            &quit,
            || {
                signal.notify();
                Ok(None)
            },
            |number, total, track| announced.push((number, total, *track)),
        )
        .unwrap();

        assert_eq!(announced, [(1, 3, "a"), (2, 3, "b"), (3, 3, "c")]);
        assert_eq!(backend.started(), ["a", "b", "c"]);
        assert_eq!(backend.calls.last(), Some(&Call::Halt));
    }

    #[test]
    fn pause_keys_reach_backend() {
        let mut backend = FakeBackend::default();
        let quit = AtomicBool::new(false);
        play_all(
            Sequencer::new(vec!["a"]),
            &mut backend,
            &quit,
            scripted(vec![
                InputEvent::Pause,
                InputEvent::TogglePause,
                InputEvent::TogglePause,
                InputEvent::Resume,
                InputEvent::Quit,
            ]),
            |_, _, _| {},
        )
        .unwrap();
        assert_eq!(
            backend.calls,
            [
                Call::Start("a"),
                Call::Pause,
                Call::Resume,
                Call::Pause,
                Call::Resume,
                Call::Halt
            ]
        );
    }

    #[test]
    fn missing_playlist_lists_available_names() {
        let text = b"# rock\n/a.flac\n\n# pop\n/b.flac\n";
        let err = load_tracks(
            Path::new("/home/u/.config/smp.conf"),
            Sv::from_text("/home/u"),
            text,
            "jazz",
            |path| Ok(path.to_path_buf()),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "playlist 'jazz' not found (available: rock, pop)");
    }

    #[test]
    fn missing_playlist_in_empty_config_names_the_file() {
        let err = load_tracks(
            Path::new("/home/u/.config/smp.conf"),
            Sv::from_text("/home/u"),
            b"\n\n",
            "jazz",
            |path| Ok(path.to_path_buf()),
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "playlist 'jazz' not found: no playlists in '/home/u/.config/smp.conf'"
        );
    }

    #[test]
    fn found_playlist_resolves_home_paths() {
        let tracks = load_tracks(
            Path::new("/home/u/.config/smp.conf"),
            Sv::from_text("/home/u"),
            b"# rock\n~/a.flac\n/srv/b.flac\n",
            "rock",
            |path| Ok(path.to_path_buf()),
        )
        .unwrap();
        assert_eq!(
            tracks,
            [
                std::path::PathBuf::from("/home/u/a.flac"),
                std::path::PathBuf::from("/srv/b.flac")
            ]
        );
    }
}
