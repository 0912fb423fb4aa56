// Transfer offers between teams.
use rand::Rng;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::logic::{
    error::{EngineError, EngineResult},
    types::{CompetitorId, OfferId, PlayerId},
};

// Below this share of the asking fee an offer is never accepted.
const LOWBALL_RATIO: f64 = 0.8;

#[derive(Debug, Clone, PartialEq)]
#[derive(Serialize, Deserialize)]
#[derive(FromRow)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub team_id: Option<CompetitorId>,

    // What the current team wants for the player.
    pub asking_fee: u32,
}

impl Player {
    pub fn build(name: &str, team_id: Option<CompetitorId>, asking_fee: u32) -> Self {
        Player { id: 0, name: name.to_string(), team_id, asking_fee }
    }
}

#[derive(Debug, Clone, Copy)]
#[derive(PartialEq, Eq)]
#[derive(Serialize, Deserialize)]
#[derive(sqlx::Type)]
pub enum OfferStatus {
    Pending,
    Accepted,
    Rejected,
    Finalized,
}

#[derive(Debug, Clone, Copy)]
#[derive(PartialEq, Eq)]
#[derive(Serialize, Deserialize)]
pub enum OfferResponse {
    Accept,
    Reject,
}

#[derive(Debug, Clone, PartialEq)]
#[derive(Serialize, Deserialize)]
#[derive(FromRow)]
pub struct TransferOffer {
    pub id: OfferId,
    pub player_id: PlayerId,
    pub from_team: Option<CompetitorId>,
    pub to_team: CompetitorId,
    pub fee: u32,
    pub status: OfferStatus,
}

impl TransferOffer {
    pub fn build(player: &Player, to_team: CompetitorId, fee: u32) -> Self {
        TransferOffer {
            id: 0,
            player_id: player.id,
            from_team: player.team_id,
            to_team,
            fee,
            status: OfferStatus::Pending,
        }
    }

    // Decide on an offer the way a computer-controlled team would.
    // Full asking price is always accepted, lowballs never, anything between by chance.
    pub fn evaluate<R: Rng + ?Sized>(&self, player: &Player, rng: &mut R) -> OfferResponse {
        if self.fee >= player.asking_fee {
            return OfferResponse::Accept;
        }

        let ratio = f64::from(self.fee) / f64::from(player.asking_fee);
        if ratio < LOWBALL_RATIO {
            return OfferResponse::Reject;
        }

        let chance = (ratio - LOWBALL_RATIO) / (1.0 - LOWBALL_RATIO);
        match rng.random_bool(chance.clamp(0.0, 1.0)) {
            true => OfferResponse::Accept,
            false => OfferResponse::Reject,
        }
    }

    // Apply a response to a pending offer.
    pub fn respond(&mut self, response: OfferResponse) -> EngineResult<()> {
        if self.status != OfferStatus::Pending {
            return Err(EngineError::InvalidState(format!("offer {} is {:?}, not pending", self.id, self.status)));
        }

        self.status = match response {
            OfferResponse::Accept => OfferStatus::Accepted,
            OfferResponse::Reject => OfferStatus::Rejected,
        };
        return Ok(());
    }

    // Move the player to the new team.
    pub fn finalize(&mut self, player: &mut Player) -> EngineResult<()> {
        if self.status != OfferStatus::Accepted {
            return Err(EngineError::InvalidState(format!("offer {} is {:?}, not accepted", self.id, self.status)));
        }
        if player.id != self.player_id {
            return Err(EngineError::InvalidState(format!("offer {} is not for player {}", self.id, player.id)));
        }

        player.team_id = Some(self.to_team);
        self.status = OfferStatus::Finalized;
        return Ok(());
    }
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    fn player() -> Player {
        let mut player = Player::build("Striker", Some(1), 1000);
        player.id = 7;
        player
    }

    #[test]
    fn evaluation_thresholds() {
        let player = player();
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(TransferOffer::build(&player, 2, 1000).evaluate(&player, &mut rng), OfferResponse::Accept);
        assert_eq!(TransferOffer::build(&player, 2, 1500).evaluate(&player, &mut rng), OfferResponse::Accept);
        assert_eq!(TransferOffer::build(&player, 2, 799).evaluate(&player, &mut rng), OfferResponse::Reject);
        assert_eq!(TransferOffer::build(&player, 2, 800).evaluate(&player, &mut rng), OfferResponse::Reject);
    }

    #[test]
    fn accepted_offer_moves_the_player() {
        let mut player = player();
        let mut offer = TransferOffer::build(&player, 2, 1000);
        assert_eq!(offer.from_team, Some(1));
        assert!(offer.finalize(&mut player).is_err());

        offer.respond(OfferResponse::Accept).unwrap();
        assert!(offer.respond(OfferResponse::Reject).is_err());
        offer.finalize(&mut player).unwrap();
        assert_eq!(player.team_id, Some(2));
        assert_eq!(offer.status, OfferStatus::Finalized);
        assert!(offer.finalize(&mut player).is_err());
    }

    #[test]
    fn rejected_offer_cannot_be_finalized() {
        let mut player = player();
        let mut offer = TransferOffer::build(&player, 3, 10);
        offer.respond(OfferResponse::Reject).unwrap();
        assert!(offer.finalize(&mut player).is_err());
        assert_eq!(player.team_id, Some(1));
    }
}
