//! Lock conflict recovery tests

use tokio_test::{assert_err, assert_ok};

use imgdeploy::errors::DeployError;
use imgdeploy::models::job::{JobState, Stage};
use imgdeploy::pipeline::conflict::{ConflictResolver, Recovery};

use crate::support::{failed, job, Call, ScriptedClient};

#[tokio::test]
async fn test_resolver_rejects_blocking_diff() {
    let client = ScriptedClient::new();
    let resolver = ConflictResolver::new(&client);

    let job = failed(Stage::Update, "", "image locked by diffid: 218595");
    let recovery = assert_ok!(resolver.resolve("1234", &job).await);

    assert_eq!(
        recovery,
        Recovery::Recovered {
            rejected_diff_id: "218595".to_string()
        }
    );
    assert_eq!(
        client.calls(),
        vec![Call::RejectDiff {
            diff_id: "218595".to_string(),
            reinstall: false,
        }]
    );
}

#[tokio::test]
async fn test_resolver_refuses_successful_job() {
    let client = ScriptedClient::new();
    let resolver = ConflictResolver::new(&client);

    let err = assert_err!(resolver.resolve("1234", &job(Stage::Update, "u1", JobState::Complete)).await);
    assert!(matches!(err, DeployError::PipelineInvariant(_)));
    assert!(client.calls().is_empty());
}

#[tokio::test]
async fn test_resolver_refuses_running_job() {
    let client = ScriptedClient::new();
    let resolver = ConflictResolver::new(&client);

    let err = assert_err!(resolver.resolve("1234", &job(Stage::Update, "u1", JobState::Running)).await);
    assert!(matches!(err, DeployError::PipelineInvariant(_)));
}

#[tokio::test]
async fn test_resolver_keeps_backend_message_for_fatal_failures() {
    let client = ScriptedClient::new();
    let resolver = ConflictResolver::new(&client);

    let err = assert_err!(resolver.resolve("1234", &failed(Stage::Update, "u1", "disk full")).await);
    assert_eq!(err.to_string(), "Image update job failed: disk full");
    assert!(client.calls().is_empty());
}

#[tokio::test]
async fn test_malformed_lock_message_is_fatal() {
    let client = ScriptedClient::new();
    let resolver = ConflictResolver::new(&client);

    let err = assert_err!(resolver.resolve("1234", &failed(Stage::Update, "", "image locked by diffid:")).await);
    assert!(matches!(err, DeployError::JobFailed { stage: Stage::Update, .. }));
    assert!(client.calls().is_empty());
}
