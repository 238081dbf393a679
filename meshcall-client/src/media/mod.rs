mod media_controller;
mod media_source;
mod media_track;

pub use media_controller::*;
pub use media_source::*;
pub use media_track::*;
