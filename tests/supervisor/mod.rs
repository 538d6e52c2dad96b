//! Supervisor module tests.

mod policy_test;

/// Verify all public supervisor types are exported from the library.
#[test]
fn test_all_supervisor_types_exported() {
    use tail_supervisor::supervisor::{
        decide, CoordinatorError, Decider, FailureKind, RestartBudget, SupervisionDecision,
        TailOutcome, WorkerState, WorkerStateMachine,
    };

    let _ = RestartBudget::new(10, std::time::Duration::from_secs(30));
    let _ = WorkerStateMachine::new();
    let _: Decider = decide;

    let _: fn() -> CoordinatorError = || CoordinatorError::NotRunning;

    let _ = FailureKind::Transient;
    let _ = SupervisionDecision::Resume;
    let _ = TailOutcome::Stopped;
    let _ = WorkerState::Created;
}
