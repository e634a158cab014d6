//! Lesson playback: the session task driving a `PlaybackTracker` against a
//! real player, plus the player and router seams it talks to.

mod navigator;
mod player;
mod session;

pub use navigator::{ChannelNavigator, NavigationRequest, Navigator};
pub use player::VideoPlayer;
pub use session::{LessonPlaybackSession, PlaybackSnapshot, SessionCollaborators};
