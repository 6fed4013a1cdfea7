// Library root for the play-by-play analysis core.
//
// `plays -> (player stats, zone stats) -> insights`, with no I/O. The app
// crate owns fetching, persistence and scheduling.

pub mod insights;
pub mod keywords;
pub mod names;
pub mod pipeline;
pub mod play;
pub mod stats;
pub mod zones;

pub use pipeline::{analyze_game, GameAnalysis};
pub use play::{Coordinate, Play};
