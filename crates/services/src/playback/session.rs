use std::future;
use std::pin::Pin;
use std::sync::Arc;

use ead_core::model::{CourseId, LessonId, LessonLocation, LessonProgress, UserId};
use ead_core::playback::{PlaybackTracker, PlayerState, SampleOutcome, TrackerSettings};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, Interval, MissedTickBehavior, Sleep};
use tracing::{debug, info, warn};

use super::navigator::{NavigationRequest, Navigator};
use super::player::VideoPlayer;
use crate::error::PlaybackError;
use crate::progress_service::{CompletionRecorder, ProgressService};

/// Observable state of a running lesson session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaybackSnapshot {
    pub location: LessonLocation,
    pub last_confirmed: f64,
    pub watched_percent: Option<f64>,
    pub completed: bool,
    pub skip_blocked: bool,
    pub sampling: bool,
    /// Last attempt to record progress failed; local state is still authoritative.
    pub sync_failed: bool,
    pub next_lesson: Option<LessonLocation>,
    pub auto_advance_pending: bool,
}

/// External parties a session talks to.
#[derive(Clone)]
pub struct SessionCollaborators {
    pub player: Arc<dyn VideoPlayer>,
    pub recorder: Arc<dyn CompletionRecorder>,
    pub navigator: Arc<dyn Navigator>,
}

enum Command {
    StateChanged(PlayerState),
    Close(oneshot::Sender<LessonProgress>),
}

/// Handle to the task that watches one lesson for one learner.
///
/// Progress is written by a separate writer task, so a slow recorder never
/// holds up sampling, commands or the auto-advance timer.
///
/// Dropping the handle aborts the task, which cancels the sampler and any
/// pending auto-advance without recording; writes already queued still
/// finish. Use [`close`](Self::close) to record the final position first.
pub struct LessonPlaybackSession {
    commands: mpsc::UnboundedSender<Command>,
    snapshot: watch::Receiver<PlaybackSnapshot>,
    task: Option<JoinHandle<()>>,
}

impl LessonPlaybackSession {
    /// Spawn a session task on the current tokio runtime.
    #[must_use]
    pub fn start(
        user: UserId,
        settings: TrackerSettings,
        progress: LessonProgress,
        next_lesson: Option<LessonLocation>,
        collaborators: SessionCollaborators,
    ) -> Self {
        let tracker = PlaybackTracker::new(settings, progress);
        let initial = snapshot_of(&tracker, next_lesson.as_ref(), false, false);
        let (snapshot_tx, snapshot_rx) = watch::channel(initial);
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (writes_tx, writes_rx) = mpsc::unbounded_channel();
        let (outcomes_tx, outcomes_rx) = mpsc::unbounded_channel();

        let writer = tokio::spawn(write_progress(
            user.clone(),
            Arc::clone(&collaborators.recorder),
            writes_rx,
            outcomes_tx,
        ));
        let actor = SessionActor {
            tracker,
            next_lesson,
            collaborators,
            snapshot: snapshot_tx,
            sampler: None,
            auto_advance: None,
            writes: Some(writes_tx),
            writer: Some(writer),
            sync_failed: false,
            user,
        };
        let task = tokio::spawn(actor.run(commands_rx, outcomes_rx));

        Self {
            commands: commands_tx,
            snapshot: snapshot_rx,
            task: Some(task),
        }
    }

    /// Load the learner's progress for `lesson` and start watching it.
    ///
    /// Progress is recorded through `progress` itself and the auto-advance
    /// target is the next lesson in course order.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackError::Progress` for unknown lessons or storage failures.
    pub async fn open(
        progress: &ProgressService,
        user: UserId,
        course: &CourseId,
        lesson: &LessonId,
        settings: TrackerSettings,
        player: Arc<dyn VideoPlayer>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, PlaybackError> {
        let current = progress.lesson_progress(&user, course, lesson).await?;
        let next_lesson = progress
            .catalog()
            .lesson_navigation(course, lesson)
            .and_then(|nav| nav.next);

        Ok(Self::start(
            user,
            settings,
            current,
            next_lesson,
            SessionCollaborators {
                player,
                recorder: Arc::new(progress.clone()),
                navigator,
            },
        ))
    }

    /// Forward a state change reported by the player.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackError::SessionClosed` if the task has stopped.
    pub fn player_state_changed(&self, state: PlayerState) -> Result<(), PlaybackError> {
        self.commands
            .send(Command::StateChanged(state))
            .map_err(|_| PlaybackError::SessionClosed)
    }

    #[must_use]
    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.snapshot.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<PlaybackSnapshot> {
        self.snapshot.clone()
    }

    /// Stop the timers, record the last position and end the task.
    ///
    /// Waits until every queued progress write has been attempted.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackError::SessionClosed` if the task had already stopped.
    pub async fn close(mut self) -> Result<LessonProgress, PlaybackError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(Command::Close(reply_tx))
            .map_err(|_| PlaybackError::SessionClosed)?;
        let progress = reply_rx.await.map_err(|_| PlaybackError::SessionClosed)?;
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        Ok(progress)
    }
}

impl Drop for LessonPlaybackSession {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

//
// ─── ACTOR ─────────────────────────────────────────────────────────────────────
//

struct SessionActor {
    user: UserId,
    tracker: PlaybackTracker,
    next_lesson: Option<LessonLocation>,
    collaborators: SessionCollaborators,
    snapshot: watch::Sender<PlaybackSnapshot>,
    sampler: Option<Interval>,
    auto_advance: Option<Pin<Box<Sleep>>>,
    writes: Option<mpsc::UnboundedSender<LessonProgress>>,
    writer: Option<JoinHandle<()>>,
    sync_failed: bool,
}

impl SessionActor {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut outcomes: mpsc::UnboundedReceiver<bool>,
    ) {
        loop {
            tokio::select! {
                biased;

                command = commands.recv() => match command {
                    Some(Command::StateChanged(state)) => self.on_state_changed(state),
                    Some(Command::Close(reply)) => {
                        self.shutdown(&mut outcomes).await;
                        let _ = reply.send(self.tracker.progress().clone());
                        return;
                    }
                    None => {
                        self.shutdown(&mut outcomes).await;
                        return;
                    }
                },
                Some(recorded) = outcomes.recv() => {
                    self.sync_failed = !recorded;
                    self.publish();
                }
                () = next_tick(&mut self.sampler) => self.on_tick(),
                () = deadline(&mut self.auto_advance) => self.on_auto_advance(),
            }
        }
    }

    fn on_state_changed(&mut self, state: PlayerState) {
        let change = self.tracker.on_state_changed(state);
        if change.sampling {
            if self.sampler.is_none() {
                self.sampler = Some(self.new_sampler());
            }
        } else {
            self.sampler = None;
        }

        if change.completed_now {
            self.on_completed();
        } else if state == PlayerState::Paused {
            self.record();
        }
        self.publish();
    }

    fn on_tick(&mut self) {
        let player = Arc::clone(&self.collaborators.player);
        if !player.is_ready() {
            return;
        }
        let Some(current) = player.current_time() else {
            return;
        };

        match self.tracker.on_sample(current, player.duration()) {
            SampleOutcome::Ignored => return,
            SampleOutcome::Accepted { completed_now, .. } => {
                if completed_now {
                    self.on_completed();
                }
            }
            SampleOutcome::SkipBlocked { seek_to, attempted } => {
                debug!(
                    lesson = %self.tracker.progress().location().lesson_id,
                    attempted,
                    seek_to,
                    "forward skip blocked"
                );
                player.seek_to(seek_to);
            }
        }
        self.publish();
    }

    fn on_completed(&mut self) {
        let location = self.tracker.progress().location();
        info!(
            user = %self.user,
            course = %location.course_id,
            lesson = %location.lesson_id,
            "lesson watched to completion"
        );
        if self.next_lesson.is_some() {
            let delay = self.tracker.settings().auto_advance_delay();
            self.auto_advance = Some(Box::pin(time::sleep(delay)));
        }
        self.record();
    }

    fn on_auto_advance(&mut self) {
        self.auto_advance = None;
        if let Some(next) = self.next_lesson.clone() {
            self.collaborators
                .navigator
                .navigate(NavigationRequest::Lesson(next));
        }
        self.publish();
    }

    async fn shutdown(&mut self, outcomes: &mut mpsc::UnboundedReceiver<bool>) {
        self.sampler = None;
        self.auto_advance = None;
        if self.tracker.has_started() {
            self.record();
        }

        // closing the queue lets the writer drain it and stop
        self.writes = None;
        if let Some(writer) = self.writer.take() {
            let _ = writer.await;
        }
        while let Ok(recorded) = outcomes.try_recv() {
            self.sync_failed = !recorded;
        }
        self.publish();
    }

    /// Queue the current progress for the writer task.
    fn record(&self) {
        let Some(writes) = &self.writes else {
            return;
        };
        if writes.send(self.tracker.progress().clone()).is_err() {
            debug!(user = %self.user, "progress writer stopped; dropping write");
        }
    }

    fn new_sampler(&self) -> Interval {
        let period = self.tracker.settings().sample_period();
        let mut interval = time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    }

    fn publish(&self) {
        let next = snapshot_of(
            &self.tracker,
            self.next_lesson.as_ref(),
            self.sync_failed,
            self.auto_advance.is_some(),
        );
        self.snapshot.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
    }
}

fn snapshot_of(
    tracker: &PlaybackTracker,
    next_lesson: Option<&LessonLocation>,
    sync_failed: bool,
    auto_advance_pending: bool,
) -> PlaybackSnapshot {
    PlaybackSnapshot {
        location: tracker.progress().location().clone(),
        last_confirmed: tracker.last_confirmed(),
        watched_percent: tracker.watched_percent(),
        completed: tracker.is_completed(),
        skip_blocked: tracker.skip_blocked(),
        sampling: tracker.is_sampling(),
        sync_failed,
        next_lesson: next_lesson.cloned(),
        auto_advance_pending,
    }
}

async fn next_tick(sampler: &mut Option<Interval>) {
    match sampler {
        Some(interval) => {
            interval.tick().await;
        }
        None => future::pending().await,
    }
}

async fn deadline(sleep: &mut Option<Pin<Box<Sleep>>>) {
    match sleep {
        Some(sleep) => sleep.as_mut().await,
        None => future::pending().await,
    }
}

/// Writes queued progress in order and reports whether each write succeeded.
async fn write_progress(
    user: UserId,
    recorder: Arc<dyn CompletionRecorder>,
    mut writes: mpsc::UnboundedReceiver<LessonProgress>,
    outcomes: mpsc::UnboundedSender<bool>,
) {
    while let Some(progress) = writes.recv().await {
        let recorded = match recorder.record_progress(&user, &progress).await {
            Ok(()) => true,
            Err(err) => {
                warn!(
                    user = %user,
                    lesson = %progress.location().lesson_id,
                    error = %err,
                    "failed to record lesson progress"
                );
                false
            }
        };
        let _ = outcomes.send(recorded);
    }
}
