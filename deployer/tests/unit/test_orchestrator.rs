//! Pipeline orchestration tests against a scripted backend

use tokio_test::{assert_err, assert_ok};

use imgdeploy::errors::DeployError;
use imgdeploy::models::deployment::VersionJobParams;
use imgdeploy::models::job::{Job, JobState, Stage};
use imgdeploy::pipeline::fsm::PipelineState;

use crate::support::{diff_complete, failed, job, orchestrator, request, Call, ScriptedClient};

const LOCKED: &str = "image locked by diffid: 218595";

fn successful_update() -> (Job, Vec<Job>) {
    (
        job(Stage::Update, "u1", JobState::Created),
        vec![
            job(Stage::Update, "u1", JobState::Running),
            job(Stage::Update, "u1", JobState::Complete),
        ],
    )
}

/// Backend where every stage after the update succeeds
fn after_update(client: ScriptedClient, diff: Job) -> ScriptedClient {
    client
        .diff(job(Stage::Diff, "77", JobState::Created), vec![diff])
        .version(
            job(Stage::Version, "555", JobState::Created),
            vec![
                job(Stage::Version, "555", JobState::Queued),
                job(Stage::Version, "555", JobState::Complete),
            ],
        )
        .installs(vec![0])
}

#[tokio::test]
async fn test_pipeline_happy_path() {
    let (created, statuses) = successful_update();
    let client = after_update(
        ScriptedClient::new().update(created, statuses),
        diff_complete("77", &[], &["server.exe"], &[]),
    );
    let (orchestrator, client, reporter) = orchestrator(client);

    let result = assert_ok!(orchestrator.run(&request(false)).await);

    assert_eq!(result.image_version_id, "555");
    assert!(result.success);
    assert!(!result.full_build);
    assert_eq!(orchestrator.state().await, PipelineState::Done);
    assert_eq!(orchestrator.update_attempts().await, 1);

    let params = client.version_params().unwrap();
    assert_eq!(
        params,
        VersionJobParams {
            account_id: "1234".to_string(),
            diff_id: "77".to_string(),
            game_build: "1.2.3".to_string(),
            full: false,
            restart: true,
            install_at: "NOW()".to_string(),
            force: true,
        }
    );

    assert_eq!(*reporter.summary.lock().unwrap(), vec!["* server.exe".to_string()]);
    assert_eq!(
        *reporter.completed.lock().unwrap(),
        vec![Stage::Update, Stage::Diff, Stage::Version]
    );
    assert_eq!(client.count(|c| matches!(c, Call::RejectDiff { .. })), 0);
}

#[tokio::test]
async fn test_stages_run_strictly_in_order() {
    let (created, statuses) = successful_update();
    let client = after_update(
        ScriptedClient::new().update(created, statuses),
        diff_complete("77", &["a.txt"], &[], &[]),
    );
    let (orchestrator, client, _) = orchestrator(client);

    assert_ok!(orchestrator.run(&request(false)).await);

    let calls = client.calls();
    let position = |wanted: fn(&Call) -> bool| calls.iter().position(wanted).unwrap();
    let last_update_fetch = calls
        .iter()
        .rposition(|c| matches!(c, Call::FetchUpdate(_)))
        .unwrap();
    let last_version_fetch = calls
        .iter()
        .rposition(|c| matches!(c, Call::FetchVersion(_)))
        .unwrap();

    assert!(last_update_fetch < position(|c| matches!(c, Call::CreateDiff)));
    assert!(position(|c| matches!(c, Call::FetchDiff(_))) < position(|c| matches!(c, Call::CreateVersion(_))));
    assert!(last_version_fetch < position(|c| matches!(c, Call::FetchInstalls)));
    assert_eq!(calls.last(), Some(&Call::FetchInstalls));
}

#[tokio::test]
async fn test_status_polls_use_created_ids() {
    let (created, statuses) = successful_update();
    let client = after_update(
        ScriptedClient::new().update(created, statuses),
        diff_complete("77", &[], &["server.exe"], &[]),
    );
    let (orchestrator, client, _) = orchestrator(client);

    assert_ok!(orchestrator.run(&request(false)).await);

    let calls = client.calls();
    assert!(calls.contains(&Call::FetchUpdate("u1".to_string())));
    assert!(calls.contains(&Call::FetchDiff("77".to_string())));
    assert!(calls.contains(&Call::FetchVersion("555".to_string())));
}

#[tokio::test]
async fn test_lock_conflict_rejects_diff_and_retries_once() {
    let (created, statuses) = successful_update();
    let client = after_update(
        ScriptedClient::new()
            .update(failed(Stage::Update, "", LOCKED), vec![])
            .update(created, statuses),
        diff_complete("77", &[], &["server.exe"], &[]),
    );
    let (orchestrator, client, _) = orchestrator(client);

    let result = assert_ok!(orchestrator.run(&request(false)).await);
    assert_eq!(result.image_version_id, "555");

    assert_eq!(client.count(|c| matches!(c, Call::CreateUpdate)), 2);
    assert_eq!(
        client
            .calls()
            .into_iter()
            .filter(|c| matches!(c, Call::RejectDiff { .. }))
            .collect::<Vec<_>>(),
        vec![Call::RejectDiff {
            diff_id: "218595".to_string(),
            reinstall: false,
        }]
    );
    assert_eq!(orchestrator.update_attempts().await, 2);
    assert_eq!(orchestrator.state().await, PipelineState::Done);
}

#[tokio::test]
async fn test_lock_conflict_after_polling_is_recovered() {
    let client = after_update(
        ScriptedClient::new()
            .update(
                job(Stage::Update, "u1", JobState::Created),
                vec![failed(Stage::Update, "u1", LOCKED)],
            )
            .update(
                job(Stage::Update, "u2", JobState::Created),
                vec![job(Stage::Update, "u2", JobState::Complete)],
            ),
        diff_complete("77", &[], &["server.exe"], &[]),
    );
    let (orchestrator, client, _) = orchestrator(client);

    assert_ok!(orchestrator.run(&request(false)).await);
    assert!(client.calls().contains(&Call::FetchUpdate("u2".to_string())));
    assert_eq!(client.count(|c| matches!(c, Call::RejectDiff { .. })), 1);
}

#[tokio::test]
async fn test_second_lock_conflict_is_fatal() {
    let client = ScriptedClient::new()
        .update(failed(Stage::Update, "", LOCKED), vec![])
        .update(failed(Stage::Update, "", "image locked by diffid: 218596"), vec![])
        .update(job(Stage::Update, "u3", JobState::Complete), vec![]);
    let (orchestrator, client, _) = orchestrator(client);

    let err = assert_err!(orchestrator.run(&request(false)).await);
    assert!(matches!(err, DeployError::LockConflict { ref diff_id } if diff_id == "218596"));

    assert_eq!(client.count(|c| matches!(c, Call::CreateUpdate)), 2);
    assert_eq!(client.count(|c| matches!(c, Call::RejectDiff { .. })), 1);
    assert_eq!(client.count(|c| matches!(c, Call::CreateDiff)), 0);
    assert_eq!(orchestrator.state().await, PipelineState::FailedFatally);
}

#[tokio::test]
async fn test_retry_failing_otherwise_reports_job_failure() {
    let client = ScriptedClient::new()
        .update(failed(Stage::Update, "", LOCKED), vec![])
        .update(failed(Stage::Update, "", "disk full"), vec![]);
    let (orchestrator, _, _) = orchestrator(client);

    let err = assert_err!(orchestrator.run(&request(false)).await);
    assert!(matches!(
        err,
        DeployError::JobFailed { stage: Stage::Update, ref message } if message == "disk full"
    ));
}

#[tokio::test]
async fn test_other_update_failure_aborts_without_reject() {
    let client = ScriptedClient::new().update(
        job(Stage::Update, "u1", JobState::Created),
        vec![failed(Stage::Update, "u1", "disk full")],
    );
    let (orchestrator, client, _) = orchestrator(client);

    let err = assert_err!(orchestrator.run(&request(false)).await);
    assert!(matches!(
        err,
        DeployError::JobFailed { stage: Stage::Update, ref message } if message == "disk full"
    ));

    assert_eq!(client.count(|c| matches!(c, Call::RejectDiff { .. })), 0);
    assert_eq!(client.count(|c| matches!(c, Call::CreateUpdate)), 1);
    assert_eq!(client.count(|c| matches!(c, Call::CreateDiff)), 0);
    assert_eq!(orchestrator.state().await, PipelineState::FailedFatally);
}

#[tokio::test]
async fn test_job_error_wins_over_lock_message() {
    let mut locked = failed(Stage::Update, "", LOCKED);
    locked.job_error = Some("worker crashed".to_string());
    let client = ScriptedClient::new().update(locked, vec![]);
    let (orchestrator, client, _) = orchestrator(client);

    let err = assert_err!(orchestrator.run(&request(false)).await);
    assert!(matches!(err, DeployError::JobFailed { ref message, .. } if message == "worker crashed"));
    assert_eq!(client.count(|c| matches!(c, Call::RejectDiff { .. })), 0);
}

#[tokio::test]
async fn test_reject_transport_error_propagates() {
    let client = ScriptedClient::new()
        .update(failed(Stage::Update, "", LOCKED), vec![])
        .failing_reject(DeployError::Transport {
            operation: "reject diff".to_string(),
            status: http::StatusCode::BAD_GATEWAY,
            body: "upstream unavailable".to_string(),
        });
    let (orchestrator, client, _) = orchestrator(client);

    let err = assert_err!(orchestrator.run(&request(false)).await);
    assert!(err.is_transport());
    assert_eq!(client.count(|c| matches!(c, Call::CreateUpdate)), 1);
    assert_eq!(orchestrator.state().await, PipelineState::FailedFatally);
}

#[tokio::test]
async fn test_empty_diff_forces_full_version() {
    let (created, statuses) = successful_update();
    let client = after_update(
        ScriptedClient::new().update(created, statuses),
        diff_complete("77", &[], &[], &[]),
    );
    let (orchestrator, client, reporter) = orchestrator(client);

    let result = assert_ok!(orchestrator.run(&request(false)).await);

    assert!(result.full_build);
    assert!(client.version_params().unwrap().full);
    assert!(reporter.summary.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_full_deploy_flag_overrides_diff() {
    let (created, statuses) = successful_update();
    let client = after_update(
        ScriptedClient::new().update(created, statuses),
        diff_complete("77", &["new.pak"], &["server.exe"], &["old.pak"]),
    );
    let (orchestrator, client, _) = orchestrator(client);

    let result = assert_ok!(orchestrator.run(&request(true)).await);

    assert!(result.full_build);
    assert!(client.version_params().unwrap().full);
}

#[tokio::test]
async fn test_diff_summary_is_grouped_and_sorted() {
    let (created, statuses) = successful_update();
    let client = after_update(
        ScriptedClient::new().update(created, statuses),
        diff_complete("77", &["b.txt", "a.txt"], &["server.exe"], &["old.pak"]),
    );
    let (orchestrator, _, reporter) = orchestrator(client);

    let result = assert_ok!(orchestrator.run(&request(false)).await);

    let expected = vec!["+ a.txt", "+ b.txt", "* server.exe", "- old.pak"];
    assert_eq!(*reporter.summary.lock().unwrap(), expected);
    let rendered: Vec<String> = result.diff_summary.iter().map(ToString::to_string).collect();
    assert_eq!(rendered, expected);
}

#[tokio::test]
async fn test_diff_failure_is_fatal() {
    let (created, statuses) = successful_update();
    let client = ScriptedClient::new().update(created, statuses).diff(
        job(Stage::Diff, "77", JobState::Created),
        vec![failed(Stage::Diff, "77", "diff exploded")],
    );
    let (orchestrator, client, _) = orchestrator(client);

    let err = assert_err!(orchestrator.run(&request(false)).await);
    assert!(matches!(
        err,
        DeployError::JobFailed { stage: Stage::Diff, ref message } if message == "diff exploded"
    ));

    assert_eq!(client.count(|c| matches!(c, Call::CreateDiff)), 1);
    assert_eq!(client.count(|c| matches!(c, Call::CreateVersion(_))), 0);
    assert_eq!(orchestrator.state().await, PipelineState::FailedFatally);
}

#[tokio::test]
async fn test_squashed_version_is_fatal() {
    let (created, statuses) = successful_update();
    let client = ScriptedClient::new()
        .update(created, statuses)
        .diff(
            job(Stage::Diff, "77", JobState::Created),
            vec![diff_complete("77", &[], &["server.exe"], &[])],
        )
        .version(
            job(Stage::Version, "555", JobState::Created),
            vec![job(Stage::Version, "555", JobState::Squashed)],
        );
    let (orchestrator, client, _) = orchestrator(client);

    let err = assert_err!(orchestrator.run(&request(false)).await);
    assert!(matches!(err, DeployError::JobFailed { stage: Stage::Version, .. }));
    assert_eq!(client.count(|c| matches!(c, Call::FetchInstalls)), 0);
}

#[tokio::test]
async fn test_install_wait_polls_until_drained() {
    let (created, statuses) = successful_update();
    let client = ScriptedClient::new()
        .update(created, statuses)
        .diff(
            job(Stage::Diff, "77", JobState::Created),
            vec![diff_complete("77", &[], &["server.exe"], &[])],
        )
        .version(
            job(Stage::Version, "555", JobState::Created),
            vec![job(Stage::Version, "555", JobState::Complete)],
        )
        .installs(vec![3, 1, 0]);
    let (orchestrator, client, _) = orchestrator(client);

    assert_ok!(orchestrator.run(&request(false)).await);
    assert_eq!(client.count(|c| matches!(c, Call::FetchInstalls)), 3);
}

#[tokio::test]
async fn test_poll_error_aborts_pipeline() {
    // Update statuses run out, which the scripted backend reports as an error
    let client = ScriptedClient::new().update(
        job(Stage::Update, "u1", JobState::Created),
        vec![job(Stage::Update, "u1", JobState::Running)],
    );
    let (orchestrator, client, _) = orchestrator(client);

    let err = assert_err!(orchestrator.run(&request(false)).await);
    assert!(matches!(err, DeployError::InvalidResponse(_)));
    assert_eq!(client.count(|c| matches!(c, Call::FetchUpdate(_))), 2);
    assert_eq!(client.count(|c| matches!(c, Call::RejectDiff { .. })), 0);
}

#[tokio::test]
async fn test_version_id_from_creation_survives_bare_snapshot() {
    let (created, statuses) = successful_update();
    let client = ScriptedClient::new()
        .update(created, statuses)
        .diff(
            job(Stage::Diff, "77", JobState::Created),
            vec![diff_complete("77", &[], &["server.exe"], &[])],
        )
        .version(
            job(Stage::Version, "555", JobState::Created),
            vec![job(Stage::Version, "", JobState::Complete)],
        )
        .installs(vec![0]);
    let (orchestrator, _, _) = orchestrator(client);

    let result = assert_ok!(orchestrator.run(&request(false)).await);
    assert_eq!(result.image_version_id, "555");
}
