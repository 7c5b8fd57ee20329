//! FSM unit tests

use imgdeploy::pipeline::fsm::{PipelineEvent, PipelineFsm, PipelineState};

#[test]
fn test_fsm_initial_state() {
    let fsm = PipelineFsm::new();
    assert_eq!(fsm.state(), &PipelineState::Start);
    assert!(fsm.error().is_none());
    assert_eq!(fsm.update_attempts(), 0);
}

#[test]
fn test_fsm_happy_path() {
    let mut fsm = PipelineFsm::new();

    // Start -> Updating
    fsm.process(PipelineEvent::StartUpdate).unwrap();
    assert_eq!(fsm.state(), &PipelineState::Updating);
    assert_eq!(fsm.update_attempts(), 1);

    // Updating -> Diffing -> Versioning -> AwaitingInstall -> Done
    fsm.process(PipelineEvent::UpdateSucceeded).unwrap();
    fsm.process(PipelineEvent::DiffSucceeded).unwrap();
    fsm.process(PipelineEvent::VersionSucceeded).unwrap();
    assert_eq!(fsm.state(), &PipelineState::AwaitingInstall);

    fsm.process(PipelineEvent::InstallsComplete).unwrap();
    assert_eq!(fsm.state(), &PipelineState::Done);
}

#[test]
fn test_fsm_allows_exactly_one_lock_retry() {
    let mut fsm = PipelineFsm::new();
    fsm.process(PipelineEvent::StartUpdate).unwrap();

    assert!(fsm.can_retry_update());
    fsm.process(PipelineEvent::LockRecovered).unwrap();
    assert_eq!(fsm.state(), &PipelineState::Updating);
    assert_eq!(fsm.update_attempts(), 2);

    assert!(!fsm.can_retry_update());
    assert!(fsm.process(PipelineEvent::LockRecovered).is_err());
}

#[test]
fn test_fsm_failure_is_terminal() {
    let mut fsm = PipelineFsm::new();
    fsm.process(PipelineEvent::StartUpdate).unwrap();
    fsm.process(PipelineEvent::UpdateSucceeded).unwrap();
    fsm.process(PipelineEvent::Fail("diff failed".to_string())).unwrap();

    assert_eq!(fsm.state(), &PipelineState::FailedFatally);
    assert_eq!(fsm.error(), Some("diff failed"));
    assert!(fsm.process(PipelineEvent::DiffSucceeded).is_err());
    assert!(fsm.process(PipelineEvent::Fail("again".to_string())).is_err());
}

#[test]
fn test_fsm_invalid_transition() {
    let mut fsm = PipelineFsm::new();

    // Cannot diff before updating
    let result = fsm.process(PipelineEvent::UpdateSucceeded);
    assert!(result.is_err());

    // Cannot version before the diff succeeded
    fsm.process(PipelineEvent::StartUpdate).unwrap();
    assert!(fsm.process(PipelineEvent::VersionSucceeded).is_err());
}
