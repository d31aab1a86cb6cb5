//! Sleep timer engine.
//!
//! The engine is a single-owner state machine. It does not use internal
//! threads: every transition is triggered by one serialized stream of calls
//! (ticks from the 1 Hz scheduler, chapter boundaries, shakes and user
//! actions), so no locking is needed.
//!
//! ## State Transitions
//!
//! ```text
//! Off -> Armed(Preset | Custom | Chapters) -> Expired -> Off (+ prompt)
//!          ^                                              |
//!          +------------------ extend / shake -----------+
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = SleepTimerEngine::new(deps);
//! engine.arm(TimerSelection::Preset { secs: 900 });
//! // Once per second, with the token handed to the scheduler:
//! engine.tick(token);
//! ```

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info};

use super::auto_arm::AutoArmScheduler;
use super::fade::{clamp_volume, fade_volume};
use super::prompt::TimerExpiredPrompt;
use super::selection::{TimerSelection, TimerState};
use crate::collaborators::{Clock, PreferencesStore, ShakeSource, TickScheduler, TickToken, Transport};
use crate::events::{ArmReason, Event};
use crate::progress::{sanitize_speed, ChapterTable, ProgressCalculator, ProgressSnapshot};

/// Collaborators injected into the engine.
pub struct EngineDeps {
    pub transport: Box<dyn Transport>,
    pub shake: Box<dyn ShakeSource>,
    pub ticker: Box<dyn TickScheduler>,
    pub clock: Arc<dyn Clock>,
    pub preferences: Arc<dyn PreferencesStore>,
}

/// What is playing: the chapter table, book length and speed used for progress.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackContext {
    pub chapters: ChapterTable,
    /// Book length at 1x; `None` until loaded.
    pub total_duration: Option<f64>,
    pub speed: f64,
}

impl Default for PlaybackContext {
    fn default() -> Self {
        Self {
            chapters: ChapterTable::empty(),
            total_duration: None,
            speed: 1.0,
        }
    }
}

/// Sleep timer state machine.
pub struct SleepTimerEngine {
    state: TimerState,
    /// Original request, kept so extend and shake reset can restore it.
    requested: TimerSelection,
    prompt: Option<TimerExpiredPrompt>,
    last_chapter_index: Option<usize>,
    tick_token: Option<TickToken>,
    next_token: u64,
    monitoring_shake: bool,
    /// Volume has been lowered by the fade-out.
    ducked: bool,
    /// Auto-arm is suppressed for the window occurrence that opened on this date.
    auto_arm_suppressed: Option<NaiveDate>,
    context: PlaybackContext,
    progress: ProgressSnapshot,
    outbox: Vec<Event>,
    transport: Box<dyn Transport>,
    shake: Box<dyn ShakeSource>,
    ticker: Box<dyn TickScheduler>,
    clock: Arc<dyn Clock>,
    preferences: Arc<dyn PreferencesStore>,
}

impl SleepTimerEngine {
    pub fn new(deps: EngineDeps) -> Self {
        Self {
            state: TimerState::Off,
            requested: TimerSelection::Off,
            prompt: None,
            last_chapter_index: None,
            tick_token: None,
            next_token: 0,
            monitoring_shake: false,
            ducked: false,
            auto_arm_suppressed: None,
            context: PlaybackContext::default(),
            progress: ProgressSnapshot::zeroed(),
            outbox: Vec::new(),
            transport: deps.transport,
            shake: deps.shake,
            ticker: deps.ticker,
            clock: deps.clock,
            preferences: deps.preferences,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn requested(&self) -> TimerSelection {
        self.requested
    }

    pub fn progress(&self) -> ProgressSnapshot {
        self.progress
    }

    pub fn context(&self) -> &PlaybackContext {
        &self.context
    }

    /// The open recovery prompt, if it is still within its validity window.
    pub fn prompt(&self) -> Option<&TimerExpiredPrompt> {
        let now = self.clock.now();
        self.prompt.as_ref().filter(|p| !p.is_expired(now))
    }

    pub fn is_monitoring_shake(&self) -> bool {
        self.monitoring_shake
    }

    /// Token of the live 1 Hz loop.
    pub fn active_tick(&self) -> Option<TickToken> {
        self.tick_token
    }

    pub fn last_chapter_index(&self) -> Option<usize> {
        self.last_chapter_index
    }

    /// Estimated wall-clock seconds until the timer fires. Chapter timers
    /// are estimated from the chapter table and playback speed.
    pub fn estimated_remaining_secs(&self) -> Option<f64> {
        match self.state {
            TimerState::Off => None,
            TimerState::Preset { remaining_secs } | TimerState::Custom { remaining_secs } => {
                Some(remaining_secs as f64)
            }
            TimerState::Chapters { remaining } => {
                let position = self.transport.current_position();
                self.context
                    .chapters
                    .time_until_end_of(position, remaining)
                    .map(|secs| secs / sanitize_speed(self.context.speed))
            }
        }
    }

    /// Build a full state snapshot event.
    pub fn snapshot(&self) -> Event {
        Event::StateSnapshot {
            state: self.state,
            requested: self.requested,
            progress: self.progress,
            prompt: self.prompt().cloned(),
            volume: self.transport.volume(),
            at: self.clock.now(),
        }
    }

    /// Take every event produced since the last drain, oldest first.
    pub fn drain_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.outbox)
    }

    // ── Playback context ─────────────────────────────────────────────

    pub fn set_context(&mut self, context: PlaybackContext) {
        self.context = context;
        self.refresh_progress();
    }

    pub fn set_speed(&mut self, speed: f64) {
        self.context.speed = sanitize_speed(speed);
        self.refresh_progress();
    }

    /// Recompute progress from the transport's current position.
    ///
    /// Also sweeps a lapsed prompt, so position updates tear down the
    /// shake listener once the prompt is gone.
    pub fn refresh_progress(&mut self) -> ProgressSnapshot {
        self.sweep_prompt();
        let calculator = ProgressCalculator::new(
            self.preferences.apply_speed_to_elapsed(),
            self.preferences.apply_speed_to_total_remaining(),
        );
        self.progress = calculator.compute(
            self.transport.current_position(),
            &self.context.chapters,
            self.context.total_duration,
            self.context.speed,
        );
        self.progress
    }

    /// Move the playhead. A seek is not a boundary crossing: chapter timers
    /// re-baseline on the chapter the seek lands in.
    pub fn seek(&mut self, to_secs: f64) -> ProgressSnapshot {
        self.transport.seek(to_secs);
        if self.state.remaining_chapters().is_some() {
            self.last_chapter_index = self.context.chapters.index_at(self.transport.current_position());
        }
        self.refresh_progress()
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Arm with a user selection. `Off` (or a zero payload) disarms.
    pub fn arm(&mut self, selection: TimerSelection) -> Option<Event> {
        let selection = selection.normalized();
        if selection.is_off() {
            return self.disarm();
        }
        self.start_countdown(selection);
        info!(%selection, "sleep timer armed");
        self.emit(Event::TimerArmed {
            selection,
            reason: ArmReason::User,
            at: self.clock.now(),
        })
    }

    /// Explicit "Off": cancel everything, from any state.
    pub fn disarm(&mut self) -> Option<Event> {
        self.sweep_prompt();
        self.cancel_tick();
        self.restore_volume();
        self.prompt = None;
        self.state = TimerState::Off;
        self.requested = TimerSelection::Off;
        self.last_chapter_index = None;
        self.stop_shake_monitoring();

        let scheduler = self.auto_scheduler();
        let local = self.clock.local_now();
        if scheduler.mode.selection().is_some() {
            if let Some(occurrence) = scheduler.window.occurrence(&local) {
                debug!(%occurrence, "auto-arm suppressed for current window");
                self.auto_arm_suppressed = Some(occurrence);
            }
        }

        info!("sleep timer disarmed");
        self.emit(Event::TimerDisarmed { at: self.clock.now() })
    }

    /// One beat of the 1 Hz loop identified by `token`.
    ///
    /// Ticks from a cancelled loop are ignored. Duration timers count down
    /// and fade out; chapter timers only refresh progress.
    pub fn tick(&mut self, token: TickToken) -> Option<Event> {
        if self.tick_token != Some(token) {
            debug!(?token, live = ?self.tick_token, "ignoring stale tick");
            return None;
        }
        self.refresh_progress();

        let remaining = self.state.remaining_secs()?;
        if remaining > 1 {
            let remaining = remaining - 1;
            self.state = self.state.with_remaining_secs(remaining);
            self.apply_fade(remaining);
            None
        } else {
            self.state = self.state.with_remaining_secs(0);
            self.expire()
        }
    }

    /// A chapter boundary was crossed during playback, landing in `new_index`.
    ///
    /// Only forward crossings count. `new_index >= total_chapters` means the
    /// book ran out and expires a chapter timer outright.
    pub fn on_chapter_boundary_crossed(
        &mut self,
        new_index: usize,
        total_chapters: usize,
    ) -> Option<Event> {
        let remaining = self.state.remaining_chapters()?;

        if new_index >= total_chapters {
            info!(new_index, total_chapters, "book ended under chapter timer");
            self.state = TimerState::Chapters { remaining: 0 };
            return self.expire();
        }

        // Backward or repeated indices leave the baseline alone; only seeks move it back.
        let forward = self.last_chapter_index.map_or(true, |last| new_index > last);
        if !forward {
            debug!(new_index, last = ?self.last_chapter_index, "ignoring non-forward chapter crossing");
            return None;
        }

        self.last_chapter_index = Some(new_index);
        let remaining = remaining.saturating_sub(1);
        self.state = TimerState::Chapters { remaining };
        if remaining == 0 {
            return self.expire();
        }

        debug!(new_index, remaining, "chapter counted");
        self.emit(Event::ChapterCounted {
            chapter_index: new_index,
            remaining,
            at: self.clock.now(),
        })
    }

    /// A shake gesture was detected.
    ///
    /// With a recovery prompt open this extends the timer; while a duration
    /// timer is running it restores the full requested duration. Anything
    /// else is a no-op.
    pub fn on_shake_detected(&mut self) -> Option<Event> {
        self.sweep_prompt();

        if self.prompt.is_some() && self.preferences.shake_recovery_enabled() {
            info!("shake while prompt open, extending");
            return self.extend();
        }

        let original = self.requested.duration_secs()?;
        self.state.remaining_secs()?;
        self.state = self.state.with_remaining_secs(original);
        self.apply_fade(original);
        info!(remaining_secs = original, "shake reset sleep timer");
        self.emit(Event::TimerShakeReset {
            remaining_secs: original,
            at: self.clock.now(),
        })
    }

    /// Prompt action: re-arm with the original selection and resume playback.
    /// No-op without a live prompt.
    pub fn extend(&mut self) -> Option<Event> {
        self.sweep_prompt();
        let prompt = self.prompt.take()?;
        let selection = prompt.extension;

        self.start_countdown(selection);
        self.transport.play();
        info!(%selection, "sleep timer extended");
        self.emit(Event::TimerExtended {
            selection,
            at: self.clock.now(),
        })
    }

    /// Prompt action: discard the prompt and stay off without resuming.
    /// No-op without a live prompt.
    pub fn reset(&mut self) -> Option<Event> {
        self.sweep_prompt();
        self.prompt.take()?;
        self.requested = TimerSelection::Off;
        self.stop_shake_monitoring();
        info!("sleep timer prompt dismissed");
        self.emit(Event::PromptDismissed { at: self.clock.now() })
    }

    /// Drop the prompt if its validity window has passed.
    pub fn sweep_prompt(&mut self) -> Option<Event> {
        let now = self.clock.now();
        let created_at = self.prompt.as_ref().filter(|p| p.is_expired(now))?.created_at;
        self.prompt = None;
        if !self.state.is_active() {
            self.requested = TimerSelection::Off;
            self.stop_shake_monitoring();
        }
        debug!(%created_at, "sleep timer prompt lapsed");
        self.emit(Event::PromptLapsed { created_at, at: now })
    }

    /// Arm from the configured auto timer if now is inside its window.
    ///
    /// Call once per player open. Never overrides an armed timer, and does
    /// nothing in a window occurrence where the user explicitly disarmed.
    pub fn maybe_auto_arm(&mut self) -> Option<Event> {
        self.sweep_prompt();
        if self.state.is_active() {
            debug!("auto-arm skipped, timer already armed");
            return None;
        }
        let scheduler = self.auto_scheduler();
        let local = self.clock.local_now();
        let selection = scheduler.decide(&local)?;

        let occurrence = scheduler.window.occurrence(&local);
        if occurrence.is_some() && occurrence == self.auto_arm_suppressed {
            debug!("auto-arm skipped, user disarmed in this window");
            return None;
        }

        self.start_countdown(selection);
        info!(%selection, "sleep timer auto-armed");
        self.emit(Event::TimerArmed {
            selection,
            reason: ArmReason::AutoWindow,
            at: self.clock.now(),
        })
    }

    // ── Internal ─────────────────────────────────────────────────────

    /// Enter `Armed(selection)`: supersede any prompt, replace the tick loop
    /// and listen for shakes.
    fn start_countdown(&mut self, selection: TimerSelection) {
        if self.prompt.take().is_some() {
            debug!("open prompt superseded by new timer");
        }
        self.cancel_tick();
        self.restore_volume();

        self.requested = selection;
        self.state = selection.initial_state();
        self.last_chapter_index = match self.state {
            TimerState::Chapters { .. } => self
                .context
                .chapters
                .index_at(self.transport.current_position()),
            _ => None,
        };

        self.next_token += 1;
        let token = TickToken(self.next_token);
        self.tick_token = Some(token);
        self.ticker.schedule(token);
        self.start_shake_monitoring();
        self.refresh_progress();
        if let Some(remaining) = self.state.remaining_secs() {
            self.apply_fade(remaining);
        }
    }

    fn expire(&mut self) -> Option<Event> {
        self.cancel_tick();
        self.transport.pause();
        self.transport
            .set_volume(clamp_volume(self.preferences.base_volume_level()));
        self.ducked = false;
        self.state = TimerState::Off;
        self.last_chapter_index = None;

        let selection = self.requested;
        let now = self.clock.now();
        info!(%selection, "sleep timer expired, playback paused");
        let expired = self.emit(Event::TimerExpired { selection, at: now });

        if self.preferences.shake_recovery_enabled() {
            let prompt = TimerExpiredPrompt::new(selection, now);
            self.prompt = Some(prompt.clone());
            self.emit(Event::PromptOpened { prompt, at: now });
        } else {
            self.requested = TimerSelection::Off;
            self.stop_shake_monitoring();
        }
        expired
    }

    fn apply_fade(&mut self, remaining: u64) {
        let window = self.preferences.fade_out_window_secs();
        let base = self.preferences.base_volume_level();
        match fade_volume(remaining, window, base) {
            Some(volume) => {
                debug!(remaining, volume, "fading out");
                self.transport.set_volume(volume);
                self.ducked = true;
            }
            None => self.restore_volume(),
        }
    }

    fn restore_volume(&mut self) {
        if self.ducked {
            self.transport
                .set_volume(clamp_volume(self.preferences.base_volume_level()));
            self.ducked = false;
        }
    }

    fn cancel_tick(&mut self) {
        if let Some(token) = self.tick_token.take() {
            self.ticker.cancel(token);
        }
    }

    fn start_shake_monitoring(&mut self) {
        if !self.monitoring_shake {
            self.shake.start_monitoring();
            self.monitoring_shake = true;
        }
    }

    fn stop_shake_monitoring(&mut self) {
        if self.monitoring_shake {
            self.shake.stop_monitoring();
            self.monitoring_shake = false;
        }
    }

    fn auto_scheduler(&self) -> AutoArmScheduler {
        AutoArmScheduler::new(
            self.preferences.auto_timer_mode(),
            self.preferences.auto_timer_window(),
        )
    }

    fn emit(&mut self, event: Event) -> Option<Event> {
        self.outbox.push(event.clone());
        Some(event)
    }
}
