/// Embedded video player as seen by a playback session.
///
/// Calls are expected to be cheap and non-blocking; a player that has not
/// loaded its media yet reports `is_ready() == false`.
///
/// Sessions confirm positions from zero, even for a lesson with a stored
/// position. A player must start the media at the beginning: resuming at a
/// saved position reads as a forward skip and is sought back to zero.
pub trait VideoPlayer: Send + Sync {
    fn is_ready(&self) -> bool;

    /// Current position in seconds, if the player can report one.
    fn current_time(&self) -> Option<f64>;

    /// Media duration in seconds, if known.
    fn duration(&self) -> Option<f64>;

    fn seek_to(&self, seconds: f64);
}
