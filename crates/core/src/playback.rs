//! Anti-skip watch tracking for required training videos.
//!
//! [`PlaybackTracker`] is a pure state machine: the caller feeds it player
//! state changes and periodic position samples, and acts on what it returns
//! (seek the player back, persist completion, schedule the next lesson).

use std::time::Duration;

use thiserror::Error;

use crate::model::LessonProgress;

//
// ─── SETTINGS ──────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum TrackerSettingsError {
    #[error("skip tolerance must be finite and > 0, got {0}")]
    InvalidSkipTolerance(f64),

    #[error("completion percent must be in (0, 100], got {0}")]
    InvalidCompletionPercent(f64),

    #[error("sample period must be > 0")]
    InvalidSamplePeriod,
}

/// Tunables for the watch tracker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackerSettings {
    skip_tolerance_secs: f64,
    completion_percent: f64,
    sample_period: Duration,
    auto_advance_delay: Duration,
}

impl TrackerSettings {
    /// Defaults used for mandatory training content:
    /// - forward jumps above 5 s between samples count as skips
    /// - 95 % watched completes the lesson
    /// - one sample per second
    /// - next lesson opens 2 s after completion
    #[must_use]
    pub fn default_for_training() -> Self {
        Self {
            skip_tolerance_secs: 5.0,
            completion_percent: 95.0,
            sample_period: Duration::from_secs(1),
            auto_advance_delay: Duration::from_secs(2),
        }
    }

    /// Creates custom tracker settings.
    ///
    /// # Errors
    ///
    /// Returns `TrackerSettingsError` if the tolerance or percent is out of
    /// range, or the sample period is zero.
    pub fn new(
        skip_tolerance_secs: f64,
        completion_percent: f64,
        sample_period: Duration,
        auto_advance_delay: Duration,
    ) -> Result<Self, TrackerSettingsError> {
        if !skip_tolerance_secs.is_finite() || skip_tolerance_secs <= 0.0 {
            return Err(TrackerSettingsError::InvalidSkipTolerance(
                skip_tolerance_secs,
            ));
        }
        if !completion_percent.is_finite()
            || completion_percent <= 0.0
            || completion_percent > 100.0
        {
            return Err(TrackerSettingsError::InvalidCompletionPercent(
                completion_percent,
            ));
        }
        if sample_period.is_zero() {
            return Err(TrackerSettingsError::InvalidSamplePeriod);
        }
        Ok(Self {
            skip_tolerance_secs,
            completion_percent,
            sample_period,
            auto_advance_delay,
        })
    }

    #[must_use]
    pub fn skip_tolerance_secs(&self) -> f64 {
        self.skip_tolerance_secs
    }

    #[must_use]
    pub fn completion_percent(&self) -> f64 {
        self.completion_percent
    }

    #[must_use]
    pub fn sample_period(&self) -> Duration {
        self.sample_period
    }

    #[must_use]
    pub fn auto_advance_delay(&self) -> Duration {
        self.auto_advance_delay
    }

    /// # Errors
    ///
    /// Returns `TrackerSettingsError::InvalidSkipTolerance` for a bad value.
    pub fn with_skip_tolerance(self, secs: f64) -> Result<Self, TrackerSettingsError> {
        Self::new(
            secs,
            self.completion_percent,
            self.sample_period,
            self.auto_advance_delay,
        )
    }

    /// # Errors
    ///
    /// Returns `TrackerSettingsError::InvalidCompletionPercent` for a bad value.
    pub fn with_completion_percent(self, percent: f64) -> Result<Self, TrackerSettingsError> {
        Self::new(
            self.skip_tolerance_secs,
            percent,
            self.sample_period,
            self.auto_advance_delay,
        )
    }

    #[must_use]
    pub fn with_auto_advance_delay(mut self, delay: Duration) -> Self {
        self.auto_advance_delay = delay;
        self
    }
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self::default_for_training()
    }
}

//
// ─── PLAYER STATE ──────────────────────────────────────────────────────────────
//

/// Discrete states reported by the embedded video player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    Unstarted,
    Playing,
    Paused,
    Buffering,
    Cued,
    Ended,
}

/// What the driver should do after a state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChange {
    /// Whether the periodic sampler should be running.
    pub sampling: bool,
    /// True only on the call that completed the lesson.
    pub completed_now: bool,
}

/// Result of feeding one position sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleOutcome {
    /// Sample was unusable (non-finite or negative position).
    Ignored,
    Accepted {
        watched_percent: Option<f64>,
        completed_now: bool,
    },
    /// Forward jump beyond the tolerance; the player must seek back to `seek_to`.
    SkipBlocked { seek_to: f64, attempted: f64 },
}

//
// ─── TRACKER ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone)]
pub struct PlaybackTracker {
    settings: TrackerSettings,
    progress: LessonProgress,
    last_confirmed: f64,
    sampling: bool,
    started: bool,
    skip_blocked: bool,
}

impl PlaybackTracker {
    /// Track `progress`, which may already be completed from an earlier visit.
    ///
    /// Playback always restarts from the beginning, so the confirmed position
    /// starts at zero.
    #[must_use]
    pub fn new(settings: TrackerSettings, progress: LessonProgress) -> Self {
        Self {
            settings,
            progress,
            last_confirmed: 0.0,
            sampling: false,
            started: false,
            skip_blocked: false,
        }
    }

    #[must_use]
    pub fn settings(&self) -> &TrackerSettings {
        &self.settings
    }

    #[must_use]
    pub fn progress(&self) -> &LessonProgress {
        &self.progress
    }

    #[must_use]
    pub fn last_confirmed(&self) -> f64 {
        self.last_confirmed
    }

    #[must_use]
    pub fn watched_percent(&self) -> Option<f64> {
        self.progress.watched_percent()
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.progress.is_completed()
    }

    #[must_use]
    pub fn is_sampling(&self) -> bool {
        self.sampling
    }

    #[must_use]
    pub fn has_started(&self) -> bool {
        self.started
    }

    /// Set by a blocked skip, cleared by the next accepted sample.
    #[must_use]
    pub fn skip_blocked(&self) -> bool {
        self.skip_blocked
    }

    pub fn on_state_changed(&mut self, state: PlayerState) -> StateChange {
        let mut completed_now = false;
        match state {
            PlayerState::Playing => {
                self.started = true;
                self.sampling = true;
            }
            PlayerState::Paused
            | PlayerState::Buffering
            | PlayerState::Cued
            | PlayerState::Unstarted => {
                self.sampling = false;
            }
            PlayerState::Ended => {
                self.sampling = false;
                completed_now = self.complete();
            }
        }
        StateChange {
            sampling: self.sampling,
            completed_now,
        }
    }

    /// Feed the player's position and, if known, the media duration.
    ///
    /// Backward jumps are accepted; only forward jumps beyond the tolerance
    /// are blocked.
    pub fn on_sample(&mut self, current_time: f64, duration: Option<f64>) -> SampleOutcome {
        if !current_time.is_finite() || current_time < 0.0 {
            return SampleOutcome::Ignored;
        }
        self.progress.set_duration(duration);

        let delta = current_time - self.last_confirmed;
        if delta > self.settings.skip_tolerance_secs {
            self.skip_blocked = true;
            return SampleOutcome::SkipBlocked {
                seek_to: self.last_confirmed,
                attempted: current_time,
            };
        }

        self.skip_blocked = false;
        self.last_confirmed = current_time;
        self.progress.set_watched_seconds(current_time);

        let completed_now = self.reached_threshold(current_time) && self.complete();
        SampleOutcome::Accepted {
            watched_percent: self.progress.watched_percent(),
            completed_now,
        }
    }

    /// Mark the lesson complete. Returns `true` only on the first call.
    pub fn complete(&mut self) -> bool {
        if self.progress.is_completed() {
            return false;
        }
        self.progress.mark_completed();
        true
    }

    // Compared as `t * 100 >= p * d` so exact thresholds (2565 of 2700 s) are not
    // lost to division rounding.
    fn reached_threshold(&self, current_time: f64) -> bool {
        self.progress
            .duration_seconds()
            .is_some_and(|d| current_time * 100.0 >= self.settings.completion_percent * d)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LessonLocation;
    use crate::model::ids::{CourseId, LessonId, ModuleId};
    use crate::time::fixed_now;

    fn tracker() -> PlaybackTracker {
        let location =
            LessonLocation::new(CourseId::new("1"), ModuleId::new("1"), LessonId::new("1"));
        PlaybackTracker::new(
            TrackerSettings::default_for_training(),
            LessonProgress::new(location, fixed_now()),
        )
    }

    #[test]
    fn settings_reject_invalid_values() {
        let one = Duration::from_secs(1);
        assert_eq!(
            TrackerSettings::new(0.0, 95.0, one, one).unwrap_err(),
            TrackerSettingsError::InvalidSkipTolerance(0.0)
        );
        assert_eq!(
            TrackerSettings::new(5.0, 101.0, one, one).unwrap_err(),
            TrackerSettingsError::InvalidCompletionPercent(101.0)
        );
        assert_eq!(
            TrackerSettings::new(5.0, 95.0, Duration::ZERO, one).unwrap_err(),
            TrackerSettingsError::InvalidSamplePeriod
        );
    }

    #[test]
    fn small_forward_steps_are_confirmed() {
        let mut t = tracker();
        t.on_state_changed(PlayerState::Playing);
        let mut previous = t.last_confirmed();
        for step in [1.0, 2.5, 7.0, 12.0, 13.0] {
            let outcome = t.on_sample(step, Some(600.0));
            assert!(matches!(outcome, SampleOutcome::Accepted { .. }));
            assert!(t.last_confirmed() >= previous);
            assert_eq!(t.last_confirmed(), step);
            previous = t.last_confirmed();
        }
        assert!(!t.skip_blocked());
    }

    #[test]
    fn forward_skip_is_blocked_and_not_recorded() {
        let mut t = tracker();
        t.on_state_changed(PlayerState::Playing);
        for step in [5.0, 10.0, 14.0] {
            assert!(matches!(
                t.on_sample(step, Some(600.0)),
                SampleOutcome::Accepted { .. }
            ));
        }

        let outcome = t.on_sample(300.0, Some(600.0));

        assert_eq!(
            outcome,
            SampleOutcome::SkipBlocked {
                seek_to: 14.0,
                attempted: 300.0
            }
        );
        assert!(t.skip_blocked());
        assert_eq!(t.last_confirmed(), 14.0);
        assert_eq!(t.progress().watched_seconds(), 14.0);

        // player was sought back; the next natural tick clears the flag
        t.on_sample(15.0, Some(600.0));
        assert!(!t.skip_blocked());
        assert_eq!(t.last_confirmed(), 15.0);
    }

    #[test]
    fn stored_position_does_not_move_the_starting_point() {
        let location =
            LessonLocation::new(CourseId::new("1"), ModuleId::new("1"), LessonId::new("1"));
        let stored =
            LessonProgress::from_persisted(location, 300.0, Some(600.0), false, fixed_now())
                .unwrap();
        let mut t = PlaybackTracker::new(TrackerSettings::default_for_training(), stored);
        assert_eq!(t.last_confirmed(), 0.0);

        t.on_state_changed(PlayerState::Playing);
        assert_eq!(
            t.on_sample(300.0, Some(600.0)),
            SampleOutcome::SkipBlocked {
                seek_to: 0.0,
                attempted: 300.0
            }
        );
        assert!(matches!(
            t.on_sample(1.0, Some(600.0)),
            SampleOutcome::Accepted { .. }
        ));
    }

    #[test]
    fn skip_exactly_at_tolerance_is_allowed() {
        let mut t = tracker();
        let outcome = t.on_sample(5.0, Some(600.0));
        assert!(matches!(outcome, SampleOutcome::Accepted { .. }));
    }

    #[test]
    fn backward_seek_is_accepted() {
        let mut t = tracker();
        t.on_sample(4.0, Some(600.0));
        t.on_sample(8.0, Some(600.0));
        t.on_sample(2.0, Some(600.0));
        assert_eq!(t.last_confirmed(), 2.0);
    }

    #[test]
    fn forty_five_minute_lesson_completes_once_at_ninety_five_percent() {
        let mut t = tracker();
        t.on_state_changed(PlayerState::Playing);
        let mut completions = Vec::new();

        for second in 0..=2700_u32 {
            let outcome = t.on_sample(f64::from(second), Some(2700.0));
            if let SampleOutcome::Accepted {
                completed_now: true,
                ..
            } = outcome
            {
                completions.push(second);
            }
        }

        assert_eq!(completions, vec![2565]);
        assert!(t.is_completed());
        assert_eq!(t.watched_percent(), Some(100.0));
    }

    #[test]
    fn ended_completes_short_video_below_threshold() {
        let mut t = tracker();
        t.on_state_changed(PlayerState::Playing);
        for second in 0..=9_u32 {
            t.on_sample(f64::from(second), Some(10.0));
        }
        assert!(!t.is_completed());

        let change = t.on_state_changed(PlayerState::Ended);

        assert!(change.completed_now);
        assert!(!change.sampling);
        assert!(t.is_completed());

        assert!(!t.on_state_changed(PlayerState::Ended).completed_now);
    }

    #[test]
    fn unknown_duration_never_completes_by_percentage() {
        let mut t = tracker();
        for second in 0..=100_u32 {
            t.on_sample(f64::from(second), None);
        }
        t.on_sample(101.0, Some(0.0));
        assert_eq!(t.watched_percent(), None);
        assert!(!t.is_completed());
        assert!(t.on_state_changed(PlayerState::Ended).completed_now);
    }

    #[test]
    fn pause_and_buffering_stop_sampling() {
        let mut t = tracker();
        assert!(t.on_state_changed(PlayerState::Playing).sampling);
        assert!(!t.on_state_changed(PlayerState::Buffering).sampling);
        assert!(t.on_state_changed(PlayerState::Playing).sampling);
        assert!(!t.on_state_changed(PlayerState::Paused).sampling);
        assert!(t.has_started());
    }

    #[test]
    fn non_finite_samples_are_ignored() {
        let mut t = tracker();
        assert_eq!(t.on_sample(f64::NAN, Some(60.0)), SampleOutcome::Ignored);
        assert_eq!(t.on_sample(-3.0, Some(60.0)), SampleOutcome::Ignored);
        assert_eq!(t.last_confirmed(), 0.0);
    }

    #[test]
    fn custom_tolerance_is_honoured() {
        let settings = TrackerSettings::default_for_training()
            .with_skip_tolerance(10.0)
            .unwrap();
        let location =
            LessonLocation::new(CourseId::new("1"), ModuleId::new("1"), LessonId::new("1"));
        let mut t = PlaybackTracker::new(settings, LessonProgress::new(location, fixed_now()));
        assert!(matches!(
            t.on_sample(8.0, Some(60.0)),
            SampleOutcome::Accepted { .. }
        ));
    }
}
