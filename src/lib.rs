//! pageview: a virtualized viewer for paged documents.
//!
//! [`viewer`] holds the rendering-agnostic core. [`document`], [`render`]
//! and [`world`] back it with Typst, and [`tty`] is a terminal frontend
//! speaking the Kitty graphics protocol.

pub mod config;
pub mod document;
pub mod render;
pub mod tty;
pub mod viewer;
pub mod watch;
pub mod world;
