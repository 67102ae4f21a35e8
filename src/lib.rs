//! Render a weather report card: current conditions (and optionally today's
//! high/low) for a list of locations, drawn as one PNG.

pub mod canvas;
pub mod config;
pub mod icon;
pub mod layout;
pub mod locale;
pub mod util;
pub mod weather;
