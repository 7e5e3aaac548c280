//! Playlist player.
//!
//! Reads `~/.config/smp.conf`, resolves the tracks of one playlist and plays them in
//! order, with p / r / space / q on the keyboard.

pub mod cli;
pub mod config;
pub mod input;
pub mod path_buf;
pub mod playlist;
pub mod runtime;
pub mod sequencer;
