use anyhow::anyhow;
use chrono::Duration;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use samadhaan_dispute_model::{Dispute, EventKind, Negotiation, Offer, OfferStatus, PartyRole};
use samadhaan_mediator::{
    CounterSuggestion, NegotiationMediator, OfferSuggestion, SettlementAnalysis,
};
use samadhaan_policy_engine::{Clock, FixedClock, PolicyEngine, PolicyPaths};

use crate::fixtures;
use crate::test_directory::prepare_test_dir;

/// One step of a scripted negotiation, kept for the traceback printed
/// when a test fails.
#[derive(Clone, Debug, Display, Serialize, Deserialize)]
pub enum Stage {
    #[display(fmt = "negotiation [{}] opened", _0)]
    Opened(String),
    #[display(fmt = "{} suggested ₹{:.2}", party, amount)]
    Suggested { party: PartyRole, amount: f64 },
    #[display(fmt = "[{}] approved by {}", id, by)]
    Approved { id: String, by: String },
    #[display(fmt = "[{}] sent", _0)]
    Sent(String),
    #[display(fmt = "{} offered ₹{:.2}", party, amount)]
    Received { party: PartyRole, amount: f64 },
    #[display(fmt = "round advanced to {}", _0)]
    RoundAdvanced(u32),
    #[display(fmt = "offer [{}] accepted", _0)]
    Accepted(String),
    #[display(fmt = "escalated: {}", _0)]
    Escalated(String),
}

#[derive(thiserror::Error)]
#[error("{error}\nNegotiation traceback:\n\n{traceback}")]
pub struct HarnessError {
    error: anyhow::Error,
    traceback: String,
}

impl fmt::Debug for HarnessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

/// Drives a scripted negotiation through a real mediator with a fixed
/// clock. Every step is recorded, so a failing assertion prints the
/// whole exchange up to that point.
pub struct NegotiationHarness {
    pub mediator: Arc<NegotiationMediator>,
    pub clock: Arc<FixedClock>,
    pub dispute: Dispute,
    pub negotiation: Negotiation,
    pub test_dir: PathBuf,
    trace: Vec<Stage>,
}

impl NegotiationHarness {
    /// Default policy, the 250 000 / 120-day sample dispute, and an
    /// already opened negotiation.
    pub fn start(test_name: &str) -> anyhow::Result<NegotiationHarness> {
        Self::start_with(test_name, fixtures::copy_policy_assets)
    }

    /// Strict-policy variant: narrow corridor, three rounds.
    pub fn start_strict(test_name: &str) -> anyhow::Result<NegotiationHarness> {
        Self::start_with(test_name, fixtures::copy_strict_policy_assets)
    }

    fn start_with(
        test_name: &str,
        provision: fn(&Path) -> anyhow::Result<PolicyPaths>,
    ) -> anyhow::Result<NegotiationHarness> {
        let _ = env_logger::builder().try_init();

        let test_dir = prepare_test_dir(test_name)?;
        let paths = provision(&test_dir)?;
        let clock = fixtures::fixed_clock();
        let engine = PolicyEngine::load(paths, clock.now())?;
        let mediator = Arc::new(NegotiationMediator::with_clock(
            Arc::new(engine),
            clock.clone(),
        ));

        let dispute = fixtures::sample_dispute(clock.now())?;
        let negotiation = mediator.open_negotiation(&dispute)?;
        let opened = Stage::Opened(negotiation.negotiation_id.clone());
        Ok(NegotiationHarness {
            mediator,
            clock,
            dispute,
            negotiation,
            test_dir,
            trace: vec![opened],
        })
    }

    /// Mediator suggests the opening offer; `approver` signs it off
    /// and it goes on the wire.
    pub fn msme_opens(&mut self, approver: &str) -> Result<OfferSuggestion, HarnessError> {
        let result = self
            .mediator
            .suggest_initial_offer(&self.dispute, &self.negotiation);
        let suggestion = self.step(result)?;
        self.trace.push(Stage::Suggested {
            party: PartyRole::Msme,
            amount: suggestion.offer.offered_amount,
        });

        let offer_id = suggestion.offer.offer_id.clone();
        let result = self.negotiation.record_offer(suggestion.offer.clone());
        self.step(result)?;
        let result = self
            .mediator
            .approve_offer(&mut self.negotiation, &offer_id, approver);
        self.step(result)?;
        self.trace.push(Stage::Approved {
            id: offer_id.clone(),
            by: approver.to_string(),
        });
        let result = self.mediator.send_offer(&mut self.negotiation, &offer_id);
        self.step(result)?;
        self.trace.push(Stage::Sent(offer_id));
        Ok(suggestion)
    }

    /// Buyer answers the current offer with a plain amount, arriving
    /// already on the wire.
    pub fn buyer_offers(&mut self, amount: f64) -> Result<String, HarnessError> {
        self.wire_offer(PartyRole::Buyer, amount)
    }

    /// MSME restates a position on the wire without going through the
    /// mediator's suggestion path.
    pub fn msme_reoffers(&mut self, amount: f64) -> Result<String, HarnessError> {
        self.wire_offer(PartyRole::Msme, amount)
    }

    fn wire_offer(&mut self, party: PartyRole, amount: f64) -> Result<String, HarnessError> {
        let dispute_amount = self.dispute.dispute_amount.unwrap_or(0.0);
        let percentage = if dispute_amount > 0.0 {
            ((amount / dispute_amount * 100.0) * 100.0).round() / 100.0
        } else {
            0.0
        };
        let offer = Offer::received(
            &self.negotiation.dispute_id,
            amount,
            percentage,
            party,
            self.clock.now(),
        );
        let offer = self.step(offer)?;
        let offer_id = offer.offer_id.clone();
        let result = self.mediator.receive_offer(&mut self.negotiation, offer);
        self.step(result)?;
        self.trace.push(Stage::Received { party, amount });
        Ok(offer_id)
    }

    /// Mediator computes the MSME's counter to the current offer; it
    /// is approved, sent and recorded.
    pub fn msme_counters(&mut self, approver: &str) -> Result<CounterSuggestion, HarnessError> {
        let current = match self.negotiation.current_offer() {
            Some(offer) => offer.clone(),
            None => return Err(self.fail(anyhow!("no current offer to counter"))),
        };
        let result = self
            .mediator
            .suggest_counter_offer(&self.dispute, &self.negotiation, &current);
        let suggestion = self.step(result)?;
        self.trace.push(Stage::Suggested {
            party: suggestion.counter.offered_by,
            amount: suggestion.counter.counter_amount,
        });

        let counteroffer_id = suggestion.counter.counteroffer_id.clone();
        let result = self
            .negotiation
            .record_counteroffer(suggestion.counter.clone());
        self.step(result)?;
        let result =
            self.mediator
                .approve_counteroffer(&mut self.negotiation, &counteroffer_id, approver);
        self.step(result)?;
        self.trace.push(Stage::Approved {
            id: counteroffer_id.clone(),
            by: approver.to_string(),
        });
        let result = self
            .mediator
            .send_counteroffer(&mut self.negotiation, &counteroffer_id);
        self.step(result)?;
        self.trace.push(Stage::Sent(counteroffer_id));
        Ok(suggestion)
    }

    /// The receiving party accepts the latest amount on the wire,
    /// offer or counteroffer, settling the negotiation.
    pub fn accept_current(&mut self) -> Result<(), HarnessError> {
        let event = match self
            .negotiation
            .history()
            .into_iter()
            .rev()
            .find(|event| event.status == OfferStatus::Sent)
        {
            Some(event) => event,
            None => return Err(self.fail(anyhow!("nothing on the wire to accept"))),
        };
        let result = match event.kind {
            EventKind::Offer => self.mediator.accept_offer(&mut self.negotiation, &event.id),
            EventKind::CounterOffer => self
                .mediator
                .accept_counteroffer(&mut self.negotiation, &event.id),
        };
        self.step(result)?;
        self.trace.push(Stage::Accepted(event.id));
        Ok(())
    }

    pub fn escalate(&mut self, reason: &str) -> Result<(), HarnessError> {
        let result = self.mediator.escalate(&mut self.negotiation, reason);
        self.step(result)?;
        self.trace.push(Stage::Escalated(reason.to_string()));
        Ok(())
    }

    pub fn next_round(&mut self) -> Result<u32, HarnessError> {
        let result = self.negotiation.advance_round();
        let round = self.step(result)?;
        self.trace.push(Stage::RoundAdvanced(round));
        Ok(round)
    }

    pub fn analyze(&self) -> Result<SettlementAnalysis, HarnessError> {
        let result = self.mediator.analyze_settlement_probability(&self.negotiation);
        self.step(result)
    }

    /// Moves the shared clock forward, e.g. between rounds.
    pub fn advance_days(&self, days: i64) {
        self.clock.advance(Duration::days(days));
    }

    pub fn trace(&self) -> &[Stage] {
        &self.trace
    }

    pub fn traceback(&self) -> String {
        self.trace
            .iter()
            .enumerate()
            .map(|(step, stage)| format!("{:>2}. {}\n", step + 1, stage))
            .collect()
    }

    fn step<T, E: Into<anyhow::Error>>(&self, result: Result<T, E>) -> Result<T, HarnessError> {
        result.map_err(|error| self.fail(error.into()))
    }

    fn fail(&self, error: anyhow::Error) -> HarnessError {
        HarnessError {
            error,
            traceback: self.traceback(),
        }
    }
}
