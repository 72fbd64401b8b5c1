use chrono::{DateTime, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{check_non_negative, check_percentage, DomainError};
use crate::offer::{CounterOffer, Offer, OfferStatus, PartyRole};

/// Whose move it is, or how the negotiation ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NegotiationState {
    #[display(fmt = "not_started")]
    NotStarted,
    /// MSME opening offer drafted, buyer has not answered yet.
    #[display(fmt = "initial_offer_pending")]
    InitialOfferPending,
    /// Buyer has the last word on the table.
    #[display(fmt = "buyer_response_pending")]
    BuyerResponsePending,
    /// MSME has the last word on the table.
    #[display(fmt = "msme_response_pending")]
    MsmeResponsePending,
    #[display(fmt = "settlement_reached")]
    SettlementReached,
    #[display(fmt = "negotiation_failed")]
    NegotiationFailed,
    #[display(fmt = "expired")]
    Expired,
}

impl NegotiationState {
    pub fn can_transition_to(self, next: NegotiationState) -> bool {
        use NegotiationState::*;
        match (self, next) {
            (NotStarted, InitialOfferPending) => true,
            (InitialOfferPending, BuyerResponsePending) => true,
            (BuyerResponsePending, MsmeResponsePending) => true,
            (MsmeResponsePending, BuyerResponsePending) => true,
            // Any live exchange can settle, fail or time out.
            (InitialOfferPending, SettlementReached)
            | (InitialOfferPending, NegotiationFailed)
            | (InitialOfferPending, Expired)
            | (BuyerResponsePending, SettlementReached)
            | (BuyerResponsePending, NegotiationFailed)
            | (BuyerResponsePending, Expired)
            | (MsmeResponsePending, SettlementReached)
            | (MsmeResponsePending, NegotiationFailed)
            | (MsmeResponsePending, Expired) => true,
            _ => false,
        }
    }

    pub fn is_terminal(self) -> bool {
        use NegotiationState::*;
        matches!(self, SettlementReached | NegotiationFailed | Expired)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    #[display(fmt = "offer")]
    Offer,
    #[display(fmt = "counteroffer")]
    #[serde(rename = "counteroffer")]
    CounterOffer,
}

/// One entry of the merged offer/counteroffer timeline.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NegotiationEvent {
    pub kind: EventKind,
    pub id: String,
    pub amount: f64,
    pub by: PartyRole,
    pub status: OfferStatus,
    pub timestamp: DateTime<Utc>,
    pub is_ai_suggested: bool,
}

/// Full negotiation state for one dispute: rounds, both offer ledgers,
/// settlement bounds and the outcome.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Negotiation {
    pub negotiation_id: String,
    pub dispute_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub state: NegotiationState,
    pub current_round: u32,
    pub max_rounds: u32,
    #[serde(default)]
    pub offers: Vec<Offer>,
    #[serde(default)]
    pub counteroffers: Vec<CounterOffer>,
    pub final_settlement_amount: Option<f64>,
    pub final_settlement_percentage: Option<f64>,
    pub settlement_agreed_at: Option<DateTime<Utc>>,
    pub settlement_terms: Option<String>,
    /// Lower bound every recorded amount must respect (policy floor).
    pub min_settlement_amount: f64,
    /// Upper bound, normally the disputed amount itself.
    pub max_settlement_amount: f64,
    pub min_settlement_percentage: f64,
    pub max_settlement_percentage: f64,
    pub last_activity_at: Option<DateTime<Utc>>,
    pub msme_last_response_at: Option<DateTime<Utc>>,
    pub buyer_last_response_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub ai_suggestions_count: u32,
    pub ai_suggestions_accepted: u32,
    pub ai_suggestions_rejected: u32,
}

impl Negotiation {
    /// Opens a negotiation with the settlement corridor computed by the
    /// policy engine. Bounds are fixed for the whole negotiation.
    pub fn open(
        dispute_id: impl ToString,
        min_amount: f64,
        max_amount: f64,
        max_rounds: u32,
        at: DateTime<Utc>,
    ) -> Result<Negotiation, DomainError> {
        check_non_negative("min_settlement_amount", min_amount)?;
        check_non_negative("max_settlement_amount", max_amount)?;
        if min_amount > max_amount {
            return Err(DomainError::InvalidSettlementBounds {
                min: min_amount,
                max: max_amount,
            });
        }
        Ok(Negotiation {
            negotiation_id: Uuid::new_v4().to_string(),
            dispute_id: dispute_id.to_string(),
            created_at: at,
            updated_at: at,
            state: NegotiationState::NotStarted,
            current_round: 0,
            max_rounds,
            offers: vec![],
            counteroffers: vec![],
            final_settlement_amount: None,
            final_settlement_percentage: None,
            settlement_agreed_at: None,
            settlement_terms: None,
            min_settlement_amount: min_amount,
            max_settlement_amount: max_amount,
            min_settlement_percentage: 50.0,
            max_settlement_percentage: 100.0,
            last_activity_at: None,
            msme_last_response_at: None,
            buyer_last_response_at: None,
            expires_at: None,
            ai_suggestions_count: 0,
            ai_suggestions_accepted: 0,
            ai_suggestions_rejected: 0,
        })
    }

    pub fn with_percentage_bounds(mut self, min: f64, max: f64) -> Result<Negotiation, DomainError> {
        check_percentage("min_settlement_percentage", min)?;
        check_percentage("max_settlement_percentage", max)?;
        if min > max {
            return Err(DomainError::InvalidSettlementBounds { min, max });
        }
        self.min_settlement_percentage = min;
        self.max_settlement_percentage = max;
        Ok(self)
    }

    pub fn expiring_at(mut self, at: DateTime<Utc>) -> Negotiation {
        self.expires_at = Some(at);
        self
    }

    pub fn transition_to(
        &mut self,
        next: NegotiationState,
        at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if !self.state.can_transition_to(next) {
            return Err(DomainError::InvalidNegotiationTransition {
                from: self.state,
                to: next,
            });
        }
        log::debug!(
            "Negotiation [{}] moved from '{}' to '{}'.",
            self.negotiation_id,
            self.state,
            next
        );
        self.state = next;
        self.updated_at = at;
        Ok(())
    }

    fn check_open(&self) -> Result<(), DomainError> {
        if self.state.is_terminal() {
            return Err(DomainError::NegotiationClosed { state: self.state });
        }
        Ok(())
    }

    fn check_bounds(&self, amount: f64) -> Result<(), DomainError> {
        if amount < self.min_settlement_amount || amount > self.max_settlement_amount {
            return Err(DomainError::OfferOutOfBounds {
                amount,
                min: self.min_settlement_amount,
                max: self.max_settlement_amount,
            });
        }
        Ok(())
    }

    fn note_activity(&mut self, by: PartyRole, at: DateTime<Utc>) {
        match by {
            PartyRole::Msme => self.msme_last_response_at = Some(at),
            PartyRole::Buyer => self.buyer_last_response_at = Some(at),
        }
        self.last_activity_at = Some(at);
        self.updated_at = at;
    }

    /// Appends an offer to the ledger. The amount must sit inside the
    /// settlement corridor.
    pub fn record_offer(&mut self, offer: Offer) -> Result<(), DomainError> {
        self.check_open()?;
        self.check_bounds(offer.offered_amount)?;
        self.note_activity(offer.offered_by, offer.created_at);
        if offer.is_ai_suggested {
            self.ai_suggestions_count += 1;
        }
        self.offers.push(offer);
        Ok(())
    }

    pub fn record_counteroffer(&mut self, counter: CounterOffer) -> Result<(), DomainError> {
        self.check_open()?;
        self.check_bounds(counter.counter_amount)?;
        self.note_activity(counter.offered_by, counter.created_at);
        if counter.is_ai_suggested {
            self.ai_suggestions_count += 1;
        }
        self.counteroffers.push(counter);
        Ok(())
    }

    /// Bumps the round counter, refusing to pass `max_rounds`.
    pub fn advance_round(&mut self) -> Result<u32, DomainError> {
        self.check_open()?;
        if self.current_round >= self.max_rounds {
            return Err(DomainError::RoundLimitReached {
                max_rounds: self.max_rounds,
            });
        }
        self.current_round += 1;
        Ok(self.current_round)
    }

    pub fn rounds_remaining(&self) -> u32 {
        self.max_rounds.saturating_sub(self.current_round)
    }

    pub fn can_make_new_offer(&self) -> bool {
        !self.state.is_terminal() && self.current_round < self.max_rounds
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(deadline) if now > deadline)
    }

    pub fn offer_mut(&mut self, offer_id: &str) -> Option<&mut Offer> {
        self.offers
            .iter_mut()
            .find(|offer| offer.offer_id == offer_id)
    }

    pub fn counteroffer_mut(&mut self, counteroffer_id: &str) -> Option<&mut CounterOffer> {
        self.counteroffers
            .iter_mut()
            .find(|counter| counter.counteroffer_id == counteroffer_id)
    }

    /// Most recent offer still waiting for a response or approval.
    pub fn current_offer(&self) -> Option<&Offer> {
        self.offers.iter().rev().find(|offer| {
            matches!(
                offer.status,
                OfferStatus::Sent | OfferStatus::PendingApproval
            )
        })
    }

    /// Records the agreed settlement and closes the negotiation.
    pub fn mark_settled(
        &mut self,
        amount: f64,
        percentage: f64,
        terms: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        self.check_bounds(amount)?;
        check_percentage("final_settlement_percentage", percentage)?;
        self.transition_to(NegotiationState::SettlementReached, at)?;
        self.final_settlement_amount = Some(amount);
        self.final_settlement_percentage = Some(percentage);
        self.settlement_agreed_at = Some(at);
        self.settlement_terms = terms;
        log::info!(
            "Negotiation [{}] settled at {:.2} ({:.2}% of the disputed amount).",
            self.negotiation_id,
            amount,
            percentage
        );
        Ok(())
    }

    pub fn record_suggestion_decision(&mut self, accepted: bool) {
        if accepted {
            self.ai_suggestions_accepted += 1;
        } else {
            self.ai_suggestions_rejected += 1;
        }
    }

    /// Offers and counteroffers merged into one timeline, ordered by
    /// creation time. Ordering is stable, so an offer and its immediate
    /// counter with the same timestamp keep offer-first order.
    pub fn history(&self) -> Vec<NegotiationEvent> {
        let mut events: Vec<NegotiationEvent> = self
            .offers
            .iter()
            .map(|offer| NegotiationEvent {
                kind: EventKind::Offer,
                id: offer.offer_id.clone(),
                amount: offer.offered_amount,
                by: offer.offered_by,
                status: offer.status,
                timestamp: offer.created_at,
                is_ai_suggested: offer.is_ai_suggested,
            })
            .chain(self.counteroffers.iter().map(|counter| NegotiationEvent {
                kind: EventKind::CounterOffer,
                id: counter.counteroffer_id.clone(),
                amount: counter.counter_amount,
                by: counter.offered_by,
                status: counter.status,
                timestamp: counter.created_at,
                is_ai_suggested: counter.is_ai_suggested,
            }))
            .collect();
        events.sort_by_key(|event| event.timestamp);
        events
    }

    /// Amounts from the merged timeline in chronological order. This is
    /// the sequence convergence analysis works on.
    pub fn amount_trail(&self) -> Vec<f64> {
        self.history().into_iter().map(|event| event.amount).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use test_case::test_case;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap()
    }

    fn negotiation() -> Negotiation {
        Negotiation::open("dispute-1", 125_000.0, 250_000.0, 5, now()).unwrap()
    }

    fn offer_at(amount: f64, by: PartyRole, at: DateTime<Utc>) -> Offer {
        Offer::received("dispute-1", amount, amount / 2_500.0, by, at).unwrap()
    }

    #[test_case(NegotiationState::NotStarted, NegotiationState::InitialOfferPending => true)]
    #[test_case(NegotiationState::InitialOfferPending, NegotiationState::BuyerResponsePending => true)]
    #[test_case(NegotiationState::BuyerResponsePending, NegotiationState::MsmeResponsePending => true)]
    #[test_case(NegotiationState::MsmeResponsePending, NegotiationState::BuyerResponsePending => true)]
    #[test_case(NegotiationState::BuyerResponsePending, NegotiationState::SettlementReached => true)]
    #[test_case(NegotiationState::MsmeResponsePending, NegotiationState::Expired => true)]
    #[test_case(NegotiationState::NotStarted, NegotiationState::SettlementReached => false)]
    #[test_case(NegotiationState::SettlementReached, NegotiationState::BuyerResponsePending => false)]
    #[test_case(NegotiationState::Expired, NegotiationState::NotStarted => false)]
    fn negotiation_transition_table(from: NegotiationState, to: NegotiationState) -> bool {
        from.can_transition_to(to)
    }

    #[test]
    fn inverted_bounds_are_rejected() {
        let result = Negotiation::open("dispute-1", 250_000.0, 125_000.0, 5, now());
        assert!(matches!(
            result,
            Err(DomainError::InvalidSettlementBounds { .. })
        ));
    }

    #[test]
    fn offers_outside_corridor_are_rejected() {
        let mut negotiation = negotiation();

        let low = offer_at(100_000.0, PartyRole::Buyer, now());
        let high = offer_at(250_001.0, PartyRole::Msme, now());
        let boundary = offer_at(125_000.0, PartyRole::Buyer, now());

        assert!(matches!(
            negotiation.record_offer(low),
            Err(DomainError::OfferOutOfBounds { .. })
        ));
        assert!(negotiation.record_offer(high).is_err());
        assert!(negotiation.record_offer(boundary).is_ok());
    }

    #[test]
    fn round_counter_stops_at_limit() {
        let mut negotiation = negotiation();
        for round in 1..=5 {
            assert_eq!(negotiation.advance_round().unwrap(), round);
        }

        assert!(matches!(
            negotiation.advance_round(),
            Err(DomainError::RoundLimitReached { max_rounds: 5 })
        ));
        assert_eq!(negotiation.rounds_remaining(), 0);
        assert!(!negotiation.can_make_new_offer());
    }

    #[test]
    fn closed_negotiation_refuses_new_offers() {
        let mut negotiation = negotiation();
        negotiation
            .transition_to(NegotiationState::InitialOfferPending, now())
            .unwrap();
        negotiation
            .mark_settled(200_000.0, 80.0, Some("30 days".to_string()), now())
            .unwrap();

        let offer = offer_at(150_000.0, PartyRole::Buyer, now());
        assert!(matches!(
            negotiation.record_offer(offer),
            Err(DomainError::NegotiationClosed { .. })
        ));
    }

    #[test]
    fn history_is_chronological_across_ledgers() {
        let mut negotiation = negotiation();

        let first = offer_at(250_000.0, PartyRole::Msme, now());
        let second = offer_at(150_000.0, PartyRole::Buyer, now() + Duration::hours(2));
        let counter = CounterOffer::suggested(
            &first.offer_id,
            200_000.0,
            80.0,
            PartyRole::Msme,
            now() + Duration::hours(1),
        )
        .unwrap();

        negotiation.record_offer(first).unwrap();
        negotiation.record_offer(second).unwrap();
        negotiation.record_counteroffer(counter).unwrap();

        let amounts = negotiation.amount_trail();
        assert_eq!(amounts, vec![250_000.0, 200_000.0, 150_000.0]);

        let kinds: Vec<EventKind> = negotiation.history().iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![EventKind::Offer, EventKind::CounterOffer, EventKind::Offer]
        );
    }

    #[test]
    fn activity_stamps_follow_the_acting_party() {
        let mut negotiation = negotiation();
        let at = now() + Duration::hours(3);

        negotiation
            .record_offer(offer_at(180_000.0, PartyRole::Buyer, at))
            .unwrap();

        assert_eq!(negotiation.buyer_last_response_at, Some(at));
        assert_eq!(negotiation.msme_last_response_at, None);
        assert_eq!(negotiation.last_activity_at, Some(at));
    }

    #[test]
    fn ai_suggestions_are_counted() {
        let mut negotiation = negotiation();
        let suggested =
            Offer::suggested("dispute-1", 200_000.0, 80.0, PartyRole::Msme, now()).unwrap();
        let received = offer_at(150_000.0, PartyRole::Buyer, now());

        negotiation.record_offer(suggested).unwrap();
        negotiation.record_offer(received).unwrap();
        negotiation.record_suggestion_decision(true);

        assert_eq!(negotiation.ai_suggestions_count, 1);
        assert_eq!(negotiation.ai_suggestions_accepted, 1);
    }

    #[test]
    fn current_offer_skips_answered_offers() {
        let mut negotiation = negotiation();

        let mut answered = offer_at(250_000.0, PartyRole::Msme, now());
        answered
            .record_response(OfferStatus::RejectedByOther, now(), None)
            .unwrap();
        let open = offer_at(150_000.0, PartyRole::Buyer, now() + Duration::hours(1));
        let open_id = open.offer_id.clone();

        negotiation.record_offer(answered).unwrap();
        negotiation.record_offer(open).unwrap();

        assert_eq!(negotiation.current_offer().unwrap().offer_id, open_id);
    }

    #[test]
    fn expiry_is_a_strict_deadline() {
        let negotiation = negotiation().expiring_at(now());

        assert!(!negotiation.is_expired(now()));
        assert!(negotiation.is_expired(now() + Duration::seconds(1)));
    }
}
