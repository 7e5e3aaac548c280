//! Playlist config parsing.
//!
//! The config file is a list of sections. A line starting with `#` opens a section
//! named by the rest of the line; the non-empty lines under it are track paths. A path
//! starting with `~` is relative to the home directory.
//!
//! ```text
//! # rock
//! ~/music/a.flac
//! /srv/music/b.mp3
//!
//! # pop
//! c.wav
//! ```

use std::path::{Path, PathBuf};

use sv::Sv;
use thiserror::Error;

use crate::path_buf::{PathBuffer, PathBufferError};

#[derive(Debug, Error)]
pub enum PlaylistError {
    #[error("playlist '{name}' not found")]
    NotFound { name: String },
    #[error(transparent)]
    Path(#[from] PathBufferError),
    #[error("could not load '{}'", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },
}

/// Collect the tracks of playlist `name`, resolving each path and handing it to `load`.
///
/// Only the first section called `name` is read; scanning stops at the next header.
/// A section with no track lines yields an empty list.
pub fn load_playlist<T>(
    config: Sv<'_>,
    name: Sv<'_>,
    home: Sv<'_>,
    buf: &mut PathBuffer,
    mut load: impl FnMut(&Path) -> anyhow::Result<T>,
) -> Result<Vec<T>, PlaylistError> {
    let mut collecting = false;
    let mut tracks = Vec::new();

    for line in config.lines() {
        let line = line.trim_space();
        if line.is_empty() {
            continue;
        }
        if let Some(section) = section_name(line) {
            if collecting {
                break;
            }
            collecting = section == name;
            continue;
        }
        if !collecting {
            continue;
        }

        let path = resolve_track(line, home, buf)?;
        tracing::debug!(path = %path.display(), "track");
        let track = load(path).map_err(|source| PlaylistError::Load {
            path: path.to_path_buf(),
            source,
        })?;
        tracks.push(track);
    }

    if !collecting {
        return Err(PlaylistError::NotFound {
            name: name.to_string(),
        });
    }
    tracing::debug!(playlist = %name, tracks = tracks.len(), "playlist parsed");
    Ok(tracks)
}

/// [`load_playlist`] without a loader: just the resolved paths.
pub fn resolve_playlist(
    config: Sv<'_>,
    name: Sv<'_>,
    home: Sv<'_>,
    buf: &mut PathBuffer,
) -> Result<Vec<PathBuf>, PlaylistError> {
    load_playlist(config, name, home, buf, |path| Ok(path.to_path_buf()))
}

/// Section names in file order, duplicates included.
pub fn list_playlists(config: Sv<'_>) -> Vec<Sv<'_>> {
    config
        .lines()
        .filter_map(|line| section_name(line.trim_space()))
        .collect()
}

/// The name of a trimmed header line, or `None` for any other line.
fn section_name(line: Sv<'_>) -> Option<Sv<'_>> {
    if !line.starts_with("#") {
        return None;
    }
    let mut name = line;
    name.advance(1);
    Some(name.trim_space())
}

fn resolve_track<'b>(
    line: Sv<'_>,
    home: Sv<'_>,
    buf: &'b mut PathBuffer,
) -> Result<&'b Path, PathBufferError> {
    buf.rewind();
    let mut rest = line;
    if rest.starts_with("~") {
        rest.advance(1);
        buf.push(home)?;
    }
    buf.push(rest)?;
    buf.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;

    const HOME: Sv<'static> = Sv::from_text("/home/me");

    fn resolve(config: &str, name: &str) -> Result<Vec<PathBuf>, PlaylistError> {
        resolve_playlist(
            Sv::from_text(config),
            Sv::from_text(name),
            HOME,
            &mut PathBuffer::new(),
        )
    }

    fn paths(list: &[&str]) -> Vec<PathBuf> {
        list.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn collects_section_until_next_header() {
        let config = "# rock\n~/a.mp3\nb.mp3\n# pop\nc.mp3\n";
        assert_eq!(
            resolve(config, "rock").unwrap(),
            paths(&["/home/me/a.mp3", "b.mp3"])
        );
        assert_eq!(resolve(config, "pop").unwrap(), paths(&["c.mp3"]));
    }

    #[test]
    fn empty_section_is_found() {
        assert!(resolve("# a\n# b\nx\n", "a").unwrap().is_empty());
        assert!(resolve("x\n# a\n", "a").unwrap().is_empty());
    }

    #[test]
    fn missing_playlist_names_it() {
        let err = resolve("# rock\na.mp3\n", "jazz").unwrap_err();
        assert!(matches!(&err, PlaylistError::NotFound { name } if name == "jazz"));
        assert_eq!(err.to_string(), "playlist 'jazz' not found");
    }

    #[test]
    fn names_are_case_sensitive() {
        assert!(matches!(
            resolve("# Rock\na.mp3\n", "rock"),
            Err(PlaylistError::NotFound { .. })
        ));
    }

    #[test]
    fn whitespace_is_trimmed_and_blank_lines_skipped() {
        let config = "  #   rock  \r\n\n   \t\n  a.mp3  \r\n\n\t~/b.mp3\n  \n# pop\n";
        assert_eq!(
            resolve(config, "rock").unwrap(),
            paths(&["a.mp3", "/home/me/b.mp3"])
        );
    }

    #[test]
    fn lines_before_first_header_are_ignored() {
        let config = "stray.mp3\n# rock\na.mp3";
        assert_eq!(resolve(config, "rock").unwrap(), paths(&["a.mp3"]));
    }

    #[test]
    fn duplicate_section_reads_first_only() {
        let config = "# rock\na.mp3\n# rock\nb.mp3\n";
        assert_eq!(resolve(config, "rock").unwrap(), paths(&["a.mp3"]));
    }

    #[test]
    fn tilde_only_expands_at_line_start() {
        let config = "# rock\nmusic/~a.mp3\n~\n";
        assert_eq!(
            resolve(config, "rock").unwrap(),
            paths(&["music/~a.mp3", "/home/me"])
        );
    }

    #[test]
    fn overlong_path_is_an_error() {
        let mut buf = PathBuffer::with_capacity(8);
        let err = resolve_playlist(
            Sv::from_text("# rock\n~/a.mp3\n"),
            Sv::from_text("rock"),
            HOME,
            &mut buf,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            PlaylistError::Path(PathBufferError::CapacityExceeded { capacity: 8, .. })
        ));
    }

    #[test]
    fn loader_failure_carries_path() {
        let err = load_playlist(
            Sv::from_text("# rock\na.mp3\nbad.mp3\nc.mp3\n"),
            Sv::from_text("rock"),
            HOME,
            &mut PathBuffer::new(),
            |path| {
                if path == Path::new("bad.mp3") {
                    bail!("not audio");
                }
                Ok(path.to_path_buf())
            },
        )
        .unwrap_err();
        match err {
            PlaylistError::Load { path, source } => {
                assert_eq!(path, PathBuf::from("bad.mp3"));
                assert_eq!(source.to_string(), "not audio");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn loader_sees_tracks_in_order() {
        let mut seen = Vec::new();
        let tracks = load_playlist(
            Sv::from_text("# rock\nz.mp3\na.mp3\n"),
            Sv::from_text("rock"),
            HOME,
            &mut PathBuffer::new(),
            |path| {
                seen.push(path.to_path_buf());
                Ok(seen.len())
            },
        )
        .unwrap();
        assert_eq!(tracks, vec![1, 2]);
        assert_eq!(seen, paths(&["z.mp3", "a.mp3"]));
    }

    #[test]
    fn lists_sections_in_order() {
        let config = "# rock\na\n  #pop \n\n# rock\n";
        let names: Vec<String> = list_playlists(Sv::from_text(config))
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(names, ["rock", "pop", "rock"]);
    }
}
