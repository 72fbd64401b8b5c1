use std::sync::Arc;

use chrono::Duration;
use samadhaan_mediator::{
    Clock, CounterStrategy, Dispute, DisputeType, FixedClock, MediatorError, NegotiationMediator,
    Offer, OfferStatus, PartyRole,
};
use samadhaan_testing::fixtures;

fn mediator() -> (Arc<FixedClock>, NegotiationMediator) {
    let clock = fixtures::fixed_clock();
    let engine = fixtures::test_policy_engine(clock.as_ref()).unwrap();
    (clock.clone(), NegotiationMediator::with_clock(engine, clock))
}

#[test]
fn test_strong_case_opens_near_the_top() {
    let (clock, mediator) = mediator();
    let dispute = fixtures::sample_dispute(clock.now()).unwrap();
    let negotiation = mediator.open_negotiation(&dispute).unwrap();

    let suggestion = mediator
        .suggest_initial_offer(&dispute, &negotiation)
        .unwrap();

    // 120 days at 18% on 250,000 accrues 14,794.52 of interest; the
    // case-strength score puts the opening at 87.78%.
    assert_eq!(suggestion.basis.interest_amount, 14_794.52);
    assert_eq!(suggestion.offer.offered_amount, 219_438.36);
    assert_eq!(suggestion.offer.offered_percentage, 87.78);
    assert_eq!(suggestion.offer.ai_confidence, Some(0.8));
    assert_eq!(suggestion.offer.offered_by, PartyRole::Msme);
    assert_eq!(suggestion.offer.status, OfferStatus::PendingApproval);
    assert!(suggestion.offer.is_ai_suggested);
    assert!(!suggestion.basis.clamped);

    let reasoning = suggestion.offer.ai_reasoning.unwrap();
    assert!(reasoning.contains("Section 16"));
    assert!(reasoning.contains("₹14,794.52"));
    assert!(reasoning.contains("Your documentation is complete"));
}

#[test]
fn test_delay_only_case_starts_lower() {
    let (clock, mediator) = mediator();
    // No invoice on file: no due date, so no accrued interest.
    let dispute = Dispute::draft(clock.now())
        .with_id("dispute-2")
        .with_type(DisputeType::PaymentDelay)
        .with_amounts(100_000.0, 100_000.0)
        .unwrap()
        .with_delay(30);
    let negotiation = mediator.open_negotiation(&dispute).unwrap();

    let suggestion = mediator
        .suggest_initial_offer(&dispute, &negotiation)
        .unwrap();

    assert_eq!(suggestion.basis.interest_amount, 0.0);
    assert_eq!(suggestion.offer.offered_amount, 81_500.0);
    assert_eq!(suggestion.offer.offered_percentage, 81.5);
    assert_eq!(suggestion.offer.ai_confidence, Some(0.72));
    assert!(!suggestion.offer.ai_reasoning.unwrap().contains("Section 16"));
}

#[test]
fn test_first_counter_shades_the_midpoint() {
    let (clock, mediator) = mediator();
    let dispute = fixtures::sample_dispute(clock.now()).unwrap();
    let mut negotiation = mediator.open_negotiation(&dispute).unwrap();

    let offer = Offer::received(
        &negotiation.dispute_id,
        240_000.0,
        96.0,
        PartyRole::Msme,
        clock.now(),
    )
    .unwrap();
    mediator.receive_offer(&mut negotiation, offer.clone()).unwrap();

    let suggestion = mediator
        .suggest_counter_offer(&dispute, &negotiation, &offer)
        .unwrap();

    // Midpoint of 240,000 and the 250,000 ceiling, shaded by 5%.
    assert_eq!(suggestion.counter.counter_amount, 232_750.0);
    assert_eq!(suggestion.counter.offered_by, PartyRole::Buyer);
    assert_eq!(suggestion.basis.strategy, CounterStrategy::MidpointOpening);
    assert_eq!(suggestion.basis.reference_amount, None);
    assert_eq!(suggestion.basis.history_len, 1);
    assert_eq!(suggestion.counter.ai_confidence, Some(0.65));
}

#[test]
fn test_counter_splits_the_difference_with_history() {
    let (clock, mediator) = mediator();
    let dispute = fixtures::dispute_with(100_000.0, 60, clock.now()).unwrap();
    let mut negotiation = mediator.open_negotiation(&dispute).unwrap();

    let msme_offer = Offer::received(
        &negotiation.dispute_id,
        90_000.0,
        90.0,
        PartyRole::Msme,
        clock.now(),
    )
    .unwrap();
    mediator.receive_offer(&mut negotiation, msme_offer).unwrap();

    clock.advance(Duration::hours(6));
    let buyer_offer = Offer::received(
        &negotiation.dispute_id,
        70_000.0,
        70.0,
        PartyRole::Buyer,
        clock.now(),
    )
    .unwrap();
    mediator
        .receive_offer(&mut negotiation, buyer_offer.clone())
        .unwrap();

    let suggestion = mediator
        .suggest_counter_offer(&dispute, &negotiation, &buyer_offer)
        .unwrap();

    // Halfway back from the MSME's own 90,000 toward the buyer's 70,000.
    assert_eq!(suggestion.counter.counter_amount, 80_000.0);
    assert_eq!(suggestion.counter.counter_percentage, 80.0);
    assert_eq!(suggestion.counter.offered_by, PartyRole::Msme);
    assert_eq!(
        suggestion.basis.strategy,
        CounterStrategy::HalfwayConvergence
    );
    assert_eq!(suggestion.basis.reference_amount, Some(90_000.0));
    assert_eq!(suggestion.basis.history_len, 2);
    assert_eq!(suggestion.counter.ai_confidence, Some(0.74));
    assert!(70_000.0 < suggestion.counter.counter_amount);
    assert!(suggestion.counter.counter_amount < 90_000.0);
}

#[test]
fn test_counter_lands_inside_the_corridor() {
    let (clock, mediator) = mediator();
    let dispute = fixtures::sample_dispute(clock.now()).unwrap();
    let mut negotiation = mediator.open_negotiation(&dispute).unwrap();

    // Buyer sits right at the corridor floor.
    let msme_offer = Offer::received(
        &negotiation.dispute_id,
        230_000.0,
        92.0,
        PartyRole::Msme,
        clock.now(),
    )
    .unwrap();
    mediator.receive_offer(&mut negotiation, msme_offer).unwrap();
    clock.advance(Duration::hours(6));
    let buyer_offer = Offer::received(
        &negotiation.dispute_id,
        125_000.0,
        50.0,
        PartyRole::Buyer,
        clock.now(),
    )
    .unwrap();
    mediator
        .receive_offer(&mut negotiation, buyer_offer.clone())
        .unwrap();

    let suggestion = mediator
        .suggest_counter_offer(&dispute, &negotiation, &buyer_offer)
        .unwrap();

    assert!(suggestion.counter.counter_amount >= negotiation.min_settlement_amount);
    assert!(suggestion.counter.counter_amount <= negotiation.max_settlement_amount);
    assert!(!suggestion.basis.clamped);
}

#[test]
fn test_suggestion_requires_a_dispute_amount() {
    let (clock, mediator) = mediator();
    let dispute = fixtures::sample_dispute(clock.now()).unwrap();
    let negotiation = mediator.open_negotiation(&dispute).unwrap();

    let mut incomplete = dispute.clone();
    incomplete.dispute_amount = None;

    let error = mediator
        .suggest_initial_offer(&incomplete, &negotiation)
        .unwrap_err();
    assert!(matches!(error, MediatorError::MissingDisputeAmount));
    assert_eq!(error.to_string(), "Dispute amount is required to mediate");
}

#[test]
fn test_open_negotiation_requires_an_id() {
    let (clock, mediator) = mediator();
    let dispute = Dispute::draft(clock.now())
        .with_amounts(100_000.0, 100_000.0)
        .unwrap();

    let error = mediator.open_negotiation(&dispute).unwrap_err();
    assert!(matches!(error, MediatorError::MissingDisputeId));
}
