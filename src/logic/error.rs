// Error types of the engine.
use thiserror::Error;
use time::Date;

use crate::logic::{
    calendar::action::ActionType,
    competition::{division::DivisionPhase, MatchId},
    types::{ActionId, CompetitorId},
};

// Violations of scheduling rules.
// Operations that return one of these leave the scheduler untouched.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScheduleError {
    #[error("no match {0}")]
    NoSuchMatch(MatchId),

    #[error("match {0} has already been scored")]
    AlreadyScored(MatchId),

    #[error("match {0} does not have both participants yet")]
    NotReady(MatchId),

    #[error("match {0} cannot end in a draw")]
    DrawNotAllowed(MatchId),

    #[error("cannot schedule {0} competitors")]
    TooFewCompetitors(usize),

    #[error("invalid options: {0}")]
    InvalidOptions(String),

    #[error("{name} cannot {operation} in phase {phase:?}")]
    WrongPhase { name: String, operation: &'static str, phase: DivisionPhase },

    #[error("the group stage of {0} is not done")]
    GroupStageNotDone(String),

    #[error("the post-season of {0} is not done")]
    PostSeasonNotDone(String),

    #[error("competitor {0} is not registered")]
    UnknownCompetitor(CompetitorId),

    #[error("competitor {0} is already registered")]
    DuplicateCompetitor(CompetitorId),

    #[error("the schedule has already started")]
    AlreadyStarted,

    #[error("the schedule has not started")]
    NotStarted,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("serialisation error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: u32 },

    #[error("no handler registered for {0:?}")]
    NoHandler(ActionType),

    #[error("invalid action {id}: {reason}")]
    InvalidAction { id: ActionId, reason: String },

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("match outcome could not be generated: {0}")]
    Outcome(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("simulating {date} failed: {source}")]
    DayFailed {
        date: Date,
        #[source]
        source: Box<EngineError>,
    },
}

pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    pub fn not_found(kind: &'static str, id: u32) -> Self {
        Self::NotFound { kind, id }
    }
}
