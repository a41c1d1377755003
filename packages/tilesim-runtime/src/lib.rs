//! Wall-clock pacing for the tilesim tick queue.

mod pacer;

pub use pacer::{FrameFn, FrameInfo, Pacer};
