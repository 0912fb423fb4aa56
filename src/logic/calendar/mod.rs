// The day-by-day calendar that drives every competition forward.
pub mod action;
pub mod handlers;
pub mod notify;
pub mod outcome;

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use log::{debug, error, info};
use rand::{rngs::StdRng, SeedableRng};
use time::Date;

use crate::logic::{
    calendar::{
        action::{ActionPayload, ActionQueueEntry, ActionType},
        handlers::{DayContext, HandlerTable, Resolution},
        notify::{Notification, NotificationSink},
        outcome::MatchOutcomeGenerator,
    },
    config::EngineConfig,
    error::{EngineError, EngineResult},
    storage::Storage,
    types::{ActionId, Score},
};

// Lets another task ask a running simulation to stop after the current day.
#[derive(Debug, Clone, Default)]
pub struct HaltHandle(Arc<AtomicBool>);

impl HaltHandle {
    pub fn halt(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_halted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DayOutcome {
    // Every due entry was resolved and the calendar moved on to the given date.
    Advanced { date: Date, dispatched: usize },

    // The player has matches to play before the day can end.
    AwaitingUser { date: Date, pending: Vec<ActionId> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    IterationLimit,
    Halted,
    AwaitingUser,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub days_advanced: u32,
    pub dispatched: usize,
    pub today: Date,
    pub stop_reason: StopReason,

    // Entries waiting for the player, if that is why the run stopped.
    pub pending: Vec<ActionId>,
}

pub struct CalendarScheduler {
    storage: Arc<dyn Storage>,
    handlers: HandlerTable,
    outcome: Arc<dyn MatchOutcomeGenerator>,
    notifier: Arc<dyn NotificationSink>,
    config: EngineConfig,
    rng: StdRng,
    halt: HaltHandle,
}

// Basics.
impl CalendarScheduler {
    pub fn new(storage: Arc<dyn Storage>, handlers: HandlerTable, outcome: Arc<dyn MatchOutcomeGenerator>, notifier: Arc<dyn NotificationSink>, config: EngineConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        CalendarScheduler {
            storage,
            handlers,
            outcome,
            notifier,
            config,
            rng,
            halt: HaltHandle::default(),
        }
    }

    pub fn halt_handle(&self) -> HaltHandle {
        self.halt.clone()
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

// Functional.
impl CalendarScheduler {
    // Add an entry to the queue. Returns its ID.
    pub async fn enqueue(&self, entry: ActionQueueEntry) -> EngineResult<ActionId> {
        entry.validate()?;
        let ids = self.storage.insert_actions(std::slice::from_ref(&entry)).await?;
        return ids.first().copied()
            .ok_or_else(|| EngineError::InvalidState("storage gave no ID to a new action".to_string()));
    }

    // Resolve everything due today, and move to the next day if nothing is left waiting.
    // A failing handler stops the day: what was resolved before it is kept,
    // and the date stays where it was so the rest is retried.
    // Everything the day changes is written at once, so a failed write leaves the whole day to be run again.
    pub async fn step_day(&mut self) -> EngineResult<DayOutcome> {
        let today = self.storage.today().await?;
        let due = self.storage.due_actions(today).await?;
        debug!("{today}: {} actions due", due.len());

        let mut ctx = DayContext::build(today, self.storage.as_ref(), self.outcome.as_ref(), &self.config, &mut self.rng);
        let mut resolved: Vec<ActionId> = Vec::new();
        let mut pending: Vec<ActionId> = Vec::new();
        let mut failure: Option<EngineError> = None;

        for entry in due.iter() {
            let Some(handler) = self.handlers.get(entry.action_type) else {
                failure = Some(EngineError::NoHandler(entry.action_type));
                break;
            };

            match handler.handle(&mut ctx, entry).await {
                Ok(Resolution::Resolved) => {
                    ctx.finish_entry();
                    resolved.push(entry.id);
                },
                Ok(Resolution::AwaitingUser) => {
                    ctx.finish_entry();
                    pending.push(entry.id);
                },
                Err(e) => {
                    ctx.discard_entry();
                    error!("Action {} ({:?}) failed on {today}: {e}", entry.id, entry.action_type);
                    failure = Some(e);
                    break;
                },
            }
        }

        let next_day = match failure.is_none() && pending.is_empty() {
            true => Some(today.next_day().ok_or_else(|| EngineError::InvalidState(format!("no day after {today}")))?),
            false => None,
        };
        let dispatched = resolved.len();
        let (changes, notifications) = ctx.into_changes(resolved, next_day);
        self.storage.commit_changes(changes).await?;

        if let Some(e) = failure {
            return Err(EngineError::DayFailed { date: today, source: Box::new(e) });
        }

        for notification in notifications {
            self.notifier.notify(notification);
        }

        let Some(tomorrow) = next_day else {
            info!("{today}: waiting for the player on {} matches", pending.len());
            self.notifier.notify(Notification::ProfileChanged { date: today });
            return Ok(DayOutcome::AwaitingUser { date: today, pending });
        };

        self.notifier.notify(Notification::ProfileChanged { date: tomorrow });
        return Ok(DayOutcome::Advanced { date: tomorrow, dispatched });
    }

    // Advance day by day until the iteration limit, a halt, or a match the player has to play.
    pub async fn run(&mut self) -> EngineResult<RunSummary> {
        let mut days_advanced = 0;
        let mut dispatched = 0;
        let mut pending = Vec::new();

        let stop_reason = loop {
            if self.halt.is_halted() {
                break StopReason::Halted;
            }
            if days_advanced >= self.config.max_iterations {
                break StopReason::IterationLimit;
            }

            match self.step_day().await? {
                DayOutcome::Advanced { dispatched: n, .. } => {
                    days_advanced += 1;
                    dispatched += n;
                },
                DayOutcome::AwaitingUser { pending: p, .. } => {
                    pending = p;
                    break StopReason::AwaitingUser;
                },
            }
        };

        let today = self.storage.today().await?;
        info!("Simulated {days_advanced} days to {today}, stopped by {stop_reason:?}");
        return Ok(RunSummary { days_advanced, dispatched, today, stop_reason, pending });
    }

    // Record the result of a match the player played, and complete its entry.
    pub async fn complete_user_matchday(&mut self, entry_id: ActionId, score: Score) -> EngineResult<()> {
        let entry = self.storage.action(entry_id).await?;
        let invalid = |reason: &str| EngineError::InvalidAction { id: entry_id, reason: reason.to_string() };
        if entry.action_type != ActionType::MatchdayUser {
            return Err(invalid("not a matchday of the player"));
        }
        if entry.completed {
            return Err(invalid("already completed"));
        }
        let ActionPayload::Matchday(payload) = &entry.payload else {
            return Err(invalid("no match in the payload"));
        };

        let today = self.storage.today().await?;
        let mut ctx = DayContext::build(today, self.storage.as_ref(), self.outcome.as_ref(), &self.config, &mut self.rng);
        let mut competition = ctx.competition(payload.competition_id).await?;
        competition.score(&payload.location(), payload.match_id, score)?;
        handlers::follow_up(&mut ctx, &competition, payload)?;
        ctx.save_competition(competition);
        ctx.finish_entry();

        // The result, what follows from it and the completed entry are written together.
        let (changes, notifications) = ctx.into_changes(vec![entry_id], None);
        self.storage.commit_changes(changes).await?;
        for notification in notifications {
            self.notifier.notify(notification);
        }
        self.notifier.notify(Notification::ProfileChanged { date: today });
        return Ok(());
    }
}
