//! Integration tests for the supervision policy and restart budget.

use std::time::{Duration, Instant};

use tail_supervisor::config::RestartConfig;
use tail_supervisor::supervisor::{decide, FailureKind, RestartBudget, SupervisionDecision};

fn default_budget() -> RestartBudget {
    RestartBudget::from_config(&RestartConfig::default())
}

#[test]
fn eleventh_transient_failure_in_window_stops() {
    let mut budget = default_budget();
    let start = Instant::now();

    for i in 0..10 {
        let now = start + Duration::from_millis(i * 100);
        let decision = budget.check(decide(FailureKind::Transient), now);
        assert_eq!(decision, SupervisionDecision::Restart, "failure {i}");
    }

    let decision = budget.check(
        decide(FailureKind::Transient),
        start + Duration::from_secs(2),
    );
    assert_eq!(decision, SupervisionDecision::Stop);
}

#[test]
fn failures_spread_beyond_window_keep_restarting() {
    let mut budget = default_budget();
    let start = Instant::now();

    for i in 0..10 {
        let decision = budget.check(SupervisionDecision::Restart, start);
        assert_eq!(decision, SupervisionDecision::Restart, "failure {i}");
    }

    // The first ten have aged out of the 30 second window
    let later = start + Duration::from_secs(31);
    assert_eq!(
        budget.check(SupervisionDecision::Restart, later),
        SupervisionDecision::Restart
    );
    assert_eq!(budget.recent(later), 1);
}

#[test]
fn one_restart_every_four_seconds_never_stops() {
    let mut budget = default_budget();
    let start = Instant::now();

    for i in 0..50 {
        let now = start + Duration::from_secs(i * 4);
        assert_eq!(
            budget.check(decide(FailureKind::Recoverable), now),
            SupervisionDecision::Restart,
            "failure {i}"
        );
    }
}

#[test]
fn resume_and_stop_do_not_consume_budget() {
    let mut budget = RestartBudget::new(1, Duration::from_secs(30));
    let now = Instant::now();

    for _ in 0..5 {
        assert_eq!(
            budget.check(decide(FailureKind::Benign), now),
            SupervisionDecision::Resume
        );
        assert_eq!(
            budget.check(decide(FailureKind::Unsupported), now),
            SupervisionDecision::Stop
        );
    }
    assert_eq!(budget.recent(now), 0);
    assert_eq!(
        budget.check(SupervisionDecision::Restart, now),
        SupervisionDecision::Restart
    );
}

#[test]
fn custom_restart_config_is_honoured() {
    let config = RestartConfig {
        max_restarts: 2,
        window_secs: 5,
        ..RestartConfig::default()
    };
    let mut budget = RestartBudget::from_config(&config);
    let start = Instant::now();

    assert!(budget.try_record(start));
    assert!(budget.try_record(start + Duration::from_secs(1)));
    assert!(!budget.try_record(start + Duration::from_secs(2)));
    assert!(budget.try_record(start + Duration::from_secs(6)));
}

#[test]
fn failure_kind_serialization() {
    #[derive(serde::Serialize, serde::Deserialize)]
    struct Wrapper {
        kind: FailureKind,
        decision: SupervisionDecision,
    }

    let text = toml::to_string(&Wrapper {
        kind: FailureKind::Recoverable,
        decision: SupervisionDecision::Restart,
    })
    .expect("Should serialize");
    assert!(text.contains("kind = \"recoverable\""));
    assert!(text.contains("decision = \"restart\""));

    let parsed: Wrapper = toml::from_str(&text).expect("Should deserialize");
    assert_eq!(parsed.kind, FailureKind::Recoverable);
    assert_eq!(parsed.decision, SupervisionDecision::Restart);
}
