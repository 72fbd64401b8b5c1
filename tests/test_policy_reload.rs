use std::fs;

use samadhaan_mediator::AuditAction;
use samadhaan_testing::NegotiationHarness;

const WIDER_CORRIDOR_RULES: &str = r#"
version: "1.1.0"
negotiation:
    min_settlement_percentage: 40.0
    max_settlement_percentage: 100.0
    max_negotiation_rounds: 6
"#;

#[test]
fn test_reload_swaps_the_snapshot_atomically() {
    let harness = NegotiationHarness::start("test_reload_swaps_the_snapshot_atomically").unwrap();
    let engine = harness.mediator.engine();
    let before = engine.snapshot();
    assert_eq!(before.version(), "1.0.0");
    assert_eq!(before.settlement_range(250_000.0).min, 125_000.0);

    fs::write(
        harness.test_dir.join("policy_rules.yaml"),
        WIDER_CORRIDOR_RULES,
    )
    .unwrap();
    harness.mediator.reload_policies().unwrap();

    // The handle taken before the reload keeps serving what it was
    // loaded with.
    assert_eq!(before.version(), "1.0.0");
    assert_eq!(before.settlement_range(250_000.0).min, 125_000.0);

    let after = engine.snapshot();
    assert_eq!(after.version(), "1.1.0");
    assert_eq!(after.settlement_range(250_000.0).min, 100_000.0);
    assert_eq!(after.max_negotiation_rounds(), 6);

    let records = harness.mediator.audit().records();
    let update = records
        .iter()
        .find(|record| record.action == AuditAction::PolicyUpdated)
        .unwrap();
    assert_eq!(update.policy_version.as_deref(), Some("1.1.0"));
}

#[test]
fn test_new_negotiations_pick_up_the_reloaded_corridor() {
    let harness =
        NegotiationHarness::start("test_new_negotiations_pick_up_the_reloaded_corridor").unwrap();
    // Opened before the reload, bound to the old corridor.
    assert_eq!(harness.negotiation.min_settlement_amount, 125_000.0);
    assert_eq!(harness.negotiation.max_rounds, 5);

    fs::write(
        harness.test_dir.join("policy_rules.yaml"),
        WIDER_CORRIDOR_RULES,
    )
    .unwrap();
    harness.mediator.reload_policies().unwrap();

    let reopened = harness.mediator.open_negotiation(&harness.dispute).unwrap();
    assert_eq!(reopened.min_settlement_amount, 100_000.0);
    assert_eq!(reopened.max_rounds, 6);
    // The earlier negotiation keeps the bounds it was opened with.
    assert_eq!(harness.negotiation.min_settlement_amount, 125_000.0);
}

#[test]
fn test_failed_reload_keeps_the_previous_policy() {
    let harness =
        NegotiationHarness::start("test_failed_reload_keeps_the_previous_policy").unwrap();

    fs::write(
        harness.test_dir.join("policy_rules.yaml"),
        "negotiation:\n    max_negotiation_rounds: 0\n",
    )
    .unwrap();
    assert!(harness.mediator.reload_policies().is_err());

    // Still serving the last validated snapshot.
    let snapshot = harness.mediator.engine().snapshot();
    assert_eq!(snapshot.version(), "1.0.0");
    assert_eq!(snapshot.max_negotiation_rounds(), 5);

    // A failed reload must not leave a PolicyUpdated mark.
    let records = harness.mediator.audit().records();
    assert!(records
        .iter()
        .all(|record| record.action != AuditAction::PolicyUpdated));
}

#[test]
fn test_unparseable_rules_fail_the_reload() {
    let harness = NegotiationHarness::start("test_unparseable_rules_fail_the_reload").unwrap();

    fs::write(
        harness.test_dir.join("policy_rules.yaml"),
        "negotiation: [not, a, mapping\n",
    )
    .unwrap();
    assert!(harness.mediator.reload_policies().is_err());
    assert_eq!(harness.mediator.engine().snapshot().version(), "1.0.0");
}
