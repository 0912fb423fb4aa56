// Dated entries of the action queue.
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::Date;

use crate::logic::{
    competition::{division::ConferenceId, MatchId, MatchLocation},
    error::{EngineError, EngineResult},
    time::iso_date_format,
    transfer::OfferResponse,
    types::{ActionId, CompetitionId, EmailId, OfferId},
};

// Every kind of action the calendar knows how to resolve.
#[derive(Debug, Clone, Copy)]
#[derive(PartialEq, Eq, Hash)]
#[derive(Serialize, Deserialize)]
#[derive(sqlx::Type)]
pub enum ActionType {
    CompetitionStart,
    MatchdayUser,
    MatchdayNpc,
    EmailDelivery,
    TransferOfferResponse,
    TransferFinalize,
    SeasonCheck,
}

// Where a match is and which one it is.
#[derive(Debug, Clone, PartialEq, Eq)]
#[derive(Serialize, Deserialize)]
pub struct MatchdayPayload {
    pub competition_id: CompetitionId,
    #[serde(default)]
    pub division_name: Option<String>,
    #[serde(default)]
    pub conference_id: Option<ConferenceId>,
    pub match_id: MatchId,
}

impl MatchdayPayload {
    pub fn location(&self) -> MatchLocation {
        MatchLocation {
            division_name: self.division_name.clone(),
            conference_id: self.conference_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[derive(Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ActionPayload {
    CompetitionStart { competition_id: CompetitionId },
    Matchday(MatchdayPayload),
    Email { email_id: EmailId },
    TransferOfferResponse {
        offer_id: OfferId,

        // None lets the other team decide.
        #[serde(default)]
        response: Option<OfferResponse>,
    },
    TransferFinalize { offer_id: OfferId },
    SeasonCheck { competition_id: CompetitionId },
}

impl ActionPayload {
    // Check whether the payload belongs to an action type.
    pub fn fits(&self, action_type: ActionType) -> bool {
        match self {
            ActionPayload::CompetitionStart { .. } => action_type == ActionType::CompetitionStart,
            ActionPayload::Matchday(_) => matches!(action_type, ActionType::MatchdayUser | ActionType::MatchdayNpc),
            ActionPayload::Email { .. } => action_type == ActionType::EmailDelivery,
            ActionPayload::TransferOfferResponse { .. } => action_type == ActionType::TransferOfferResponse,
            ActionPayload::TransferFinalize { .. } => action_type == ActionType::TransferFinalize,
            ActionPayload::SeasonCheck { .. } => action_type == ActionType::SeasonCheck,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[derive(Serialize, Deserialize)]
#[derive(FromRow)]
pub struct ActionQueueEntry {
    pub id: ActionId,
    pub action_type: ActionType,
    #[serde(with = "iso_date_format")]
    pub action_date: Date,
    #[sqlx(json)]
    pub payload: ActionPayload,
    pub completed: bool,
}

impl ActionQueueEntry {
    // Build an entry. The ID is given when it is stored.
    pub fn build(action_type: ActionType, action_date: Date, payload: ActionPayload) -> EngineResult<Self> {
        let entry = ActionQueueEntry { id: 0, action_type, action_date, payload, completed: false };
        entry.validate()?;
        return Ok(entry);
    }

    pub fn competition_start(competition_id: CompetitionId, action_date: Date) -> Self {
        Self::unchecked(ActionType::CompetitionStart, action_date, ActionPayload::CompetitionStart { competition_id })
    }

    pub fn season_check(competition_id: CompetitionId, action_date: Date) -> Self {
        Self::unchecked(ActionType::SeasonCheck, action_date, ActionPayload::SeasonCheck { competition_id })
    }

    pub fn matchday(user: bool, action_date: Date, payload: MatchdayPayload) -> Self {
        let action_type = if user { ActionType::MatchdayUser } else { ActionType::MatchdayNpc };
        Self::unchecked(action_type, action_date, ActionPayload::Matchday(payload))
    }

    pub fn email(email_id: EmailId, action_date: Date) -> Self {
        Self::unchecked(ActionType::EmailDelivery, action_date, ActionPayload::Email { email_id })
    }

    pub fn offer_response(offer_id: OfferId, response: Option<OfferResponse>, action_date: Date) -> Self {
        Self::unchecked(ActionType::TransferOfferResponse, action_date, ActionPayload::TransferOfferResponse { offer_id, response })
    }

    pub fn transfer_finalize(offer_id: OfferId, action_date: Date) -> Self {
        Self::unchecked(ActionType::TransferFinalize, action_date, ActionPayload::TransferFinalize { offer_id })
    }

    // For the constructors above, whose payload always fits.
    fn unchecked(action_type: ActionType, action_date: Date, payload: ActionPayload) -> Self {
        ActionQueueEntry { id: 0, action_type, action_date, payload, completed: false }
    }

    pub fn is_due(&self, today: Date) -> bool {
        !self.completed && self.action_date <= today
    }

    pub fn validate(&self) -> EngineResult<()> {
        if !self.payload.fits(self.action_type) {
            return Err(EngineError::InvalidAction {
                id: self.id,
                reason: format!("{:?} payload for a {:?} action", self.payload, self.action_type),
            });
        }
        return Ok(());
    }

    // Rebuild an entry from a snapshot, rejecting mismatched payloads.
    pub fn restore(value: serde_json::Value) -> EngineResult<Self> {
        let entry: Self = serde_json::from_value(value)?;
        entry.validate()?;
        return Ok(entry);
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use time::macros::date;

    use super::*;

    #[test]
    fn payload_must_fit_the_type() {
        let payload = ActionPayload::Email { email_id: 1 };
        assert!(ActionQueueEntry::build(ActionType::EmailDelivery, date!(2025-07-01), payload.clone()).is_ok());
        assert!(ActionQueueEntry::build(ActionType::SeasonCheck, date!(2025-07-01), payload).is_err());
    }

    #[test]
    fn restore_from_json() {
        let value = json!({
            "id": 4,
            "action_type": "MatchdayNpc",
            "action_date": "2025-07-05",
            "payload": {
                "kind": "Matchday",
                "competition_id": 1,
                "division_name": "Premier",
                "conference_id": {"kind": "Group", "id": 1},
                "match_id": {"stage": 1, "round": 1, "game": 2}
            },
            "completed": false
        });
        let entry = ActionQueueEntry::restore(value.clone()).unwrap();
        assert_eq!(entry.action_date, date!(2025-07-05));
        assert!(entry.is_due(date!(2025-07-05)));
        assert!(!entry.is_due(date!(2025-07-04)));
        assert_eq!(serde_json::to_value(&entry).unwrap(), value);

        let mut wrong = value;
        wrong["action_type"] = json!("EmailDelivery");
        assert!(ActionQueueEntry::restore(wrong).is_err());
    }
}
