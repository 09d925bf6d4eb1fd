mod common;

use axum::http::StatusCode;
use sea_orm::ConnectionTrait;
use serde_json::{json, Value};

use caseflow::repositories::{ApiRepository, CaseRepository, Repository};
use caseflow::services::SyncService;
use common::{Factory, TestApp};

#[tokio::test]
async fn test_sync_scenario() {
    let app = TestApp::new().await;
    let factory = Factory::new(&app.state);
    let alice = factory.create_user("alice");
    let bob = factory.create_user("bob");

    let mut project = factory.create_project(&alice.username).await;
    while project.id < 7 {
        project = factory.create_project(&alice.username).await;
    }
    assert_eq!(project.id, 7);

    let response = app
        .server
        .post("/api/apis")
        .add_header("Authorization", alice.auth_header())
        .json(&json!({"name": "get user", "url": "/api/user", "method": "GET", "project": 7}))
        .await;
    response.assert_status(StatusCode::OK);
    let api_id = response.json::<Value>()["id"].as_i64().unwrap() as i32;

    let case = factory
        .create_case(project.id, &alice.username, "user flow", &[api_id])
        .await;
    assert_eq!(case.steps.len(), 1);
    assert_eq!(case.steps[0].url, "/api/user");

    app.server
        .put(&format!("/api/apis/{}", api_id))
        .add_header("Authorization", alice.auth_header())
        .json(&json!({"name": "get user by id", "url": "/api/user/{id}", "method": "POST", "project": 7}))
        .await
        .assert_status(StatusCode::OK);

    // Editing the definition alone leaves the snapshot untouched
    let steps = CaseRepository::list_steps(&app.state.db, case.case.id).await.unwrap();
    assert_eq!(steps[0].url, "/api/user");

    let response = app
        .server
        .patch(&format!("/api/apis/{}/sync", api_id))
        .add_header("Authorization", bob.auth_header())
        .await;
    response.assert_status(StatusCode::OK);

    let body: Value = response.json();
    assert_eq!(body["api_id"], api_id);
    assert_eq!(body["affected_steps"], 1);
    assert_eq!(body["touched_cases"], 1);

    let detail: Value = app
        .server
        .get(&format!("/api/cases/{}", case.case.id))
        .add_header("Authorization", alice.auth_header())
        .await
        .json();
    assert_eq!(detail["updater"], "bob");
    assert_eq!(detail["steps"][0]["name"], "get user by id");
    assert_eq!(detail["steps"][0]["url"], "/api/user/{id}");
    assert_eq!(detail["steps"][0]["method"], "POST");
    assert_eq!(detail["steps"][0]["updater"], "bob");
}

#[tokio::test]
async fn test_sync_invariants() {
    let app = TestApp::new().await;
    let factory = Factory::new(&app.state);
    let project = factory.create_project("alice").await;

    let shared = factory
        .create_api(project.id, "alice", "login", "/api/login")
        .await;
    let other = factory
        .create_api(project.id, "alice", "logout", "/api/logout")
        .await;

    let first = factory
        .create_case(project.id, "alice", "twice", &[shared.id, other.id, shared.id])
        .await;
    let second = factory
        .create_case(project.id, "alice", "once", &[shared.id])
        .await;
    let untouched = factory
        .create_case(project.id, "alice", "unrelated", &[other.id])
        .await;

    factory
        .corrupt_api_body(shared.id, "{\"version\":1}")
        .await;

    let outcome = SyncService::sync_case(&app.state.db, shared.id, "carol")
        .await
        .unwrap();
    assert_eq!(outcome.affected_steps, 3);
    assert_eq!(outcome.touched_cases, 2);

    // Sync copies the stored text verbatim
    let source = ApiRepository::find_by_id(&app.state.db, shared.id).await.unwrap();
    for step in CaseRepository::list_steps_by_source(&app.state.db, shared.id)
        .await
        .unwrap()
    {
        assert_eq!(step.name, source.name);
        assert_eq!(step.body, source.body);
        assert_eq!(step.url, source.url);
        assert_eq!(step.method, source.method);
        assert_eq!(step.updater.as_deref(), Some("carol"));
    }

    for case_id in [first.case.id, second.case.id] {
        let case = CaseRepository::find_by_id(&app.state.db, case_id).await.unwrap();
        assert!(case.updated_at >= outcome.synced_at);
        assert_eq!(case.updater.as_deref(), Some("carol"));
    }

    let steps = CaseRepository::list_steps(&app.state.db, first.case.id).await.unwrap();
    assert_eq!(steps[1].source_api_id, Some(other.id));
    assert_eq!(steps[1].updater, None);

    let unrelated = CaseRepository::find_by_id(&app.state.db, untouched.case.id)
        .await
        .unwrap();
    assert_eq!(unrelated.updater, None);
    assert_eq!(unrelated.updated_at, untouched.case.updated_at);
}

#[tokio::test]
async fn test_sync_is_idempotent() {
    let app = TestApp::new().await;
    let factory = Factory::new(&app.state);
    let project = factory.create_project("alice").await;
    let api = factory
        .create_api(project.id, "alice", "get user", "/api/user")
        .await;
    let case = factory
        .create_case(project.id, "alice", "flow", &[api.id, api.id])
        .await;

    let first = SyncService::sync_case(&app.state.db, api.id, "alice").await.unwrap();
    let after_first = CaseRepository::list_steps(&app.state.db, case.case.id).await.unwrap();

    let second = SyncService::sync_case(&app.state.db, api.id, "alice").await.unwrap();
    let after_second = CaseRepository::list_steps(&app.state.db, case.case.id).await.unwrap();

    assert_eq!(first.affected_steps, second.affected_steps);
    assert_eq!(first.touched_cases, second.touched_cases);
    for (a, b) in after_first.iter().zip(after_second.iter()) {
        assert_eq!(a.name, b.name);
        assert_eq!(a.body, b.body);
        assert_eq!(a.url, b.url);
        assert_eq!(a.method, b.method);
    }
}

#[tokio::test]
async fn test_sync_without_dependents() {
    let app = TestApp::new().await;
    let factory = Factory::new(&app.state);
    let auth = factory.create_user("alice");
    let project = factory.create_project(&auth.username).await;
    let api = factory
        .create_api(project.id, &auth.username, "lonely", "/api/lonely")
        .await;

    let response = app
        .server
        .patch(&format!("/api/apis/{}/sync", api.id))
        .add_header("Authorization", auth.auth_header())
        .await;

    response.assert_status(StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["affected_steps"], 0);
    assert_eq!(body["touched_cases"], 0);
}

#[tokio::test]
async fn test_sync_unknown_api() {
    let app = TestApp::new().await;
    let factory = Factory::new(&app.state);
    let auth = factory.create_user("alice");

    let response = app
        .server
        .patch("/api/apis/9999/sync")
        .add_header("Authorization", auth.auth_header())
        .await;

    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_sync_rolls_back_when_a_case_update_fails() {
    let app = TestApp::new().await;
    let factory = Factory::new(&app.state);
    let auth = factory.create_user("alice");
    let project = factory.create_project(&auth.username).await;
    let api = factory
        .create_api(project.id, &auth.username, "get user", "/api/user")
        .await;
    let case = factory
        .create_case(project.id, &auth.username, "flow", &[api.id, api.id])
        .await;

    app.server
        .put(&format!("/api/apis/{}", api.id))
        .add_header("Authorization", auth.auth_header())
        .json(&json!({"name": "get member", "url": "/api/member", "method": "POST", "project": project.id}))
        .await
        .assert_status(StatusCode::OK);

    // Steps are written first; the owning case update then aborts
    app.state
        .db
        .execute_unprepared(
            "CREATE TRIGGER block_case_update BEFORE UPDATE ON test_cases \
             BEGIN SELECT RAISE(ABORT, 'case update blocked'); END;",
        )
        .await
        .unwrap();

    let result = SyncService::sync_case(&app.state.db, api.id, "bob").await;
    assert!(result.is_err());

    let steps = CaseRepository::list_steps(&app.state.db, case.case.id).await.unwrap();
    assert_eq!(steps.len(), 2);
    for (before, after) in case.steps.iter().zip(steps.iter()) {
        assert_eq!(after.name, "get user");
        assert_eq!(after.url, "/api/user");
        assert_eq!(after.method, "GET");
        assert_eq!(after.body, before.body);
        assert_eq!(after.updater, None);
        assert_eq!(after.updated_at, before.updated_at);
    }

    let stored = CaseRepository::find_by_id(&app.state.db, case.case.id).await.unwrap();
    assert_eq!(stored.updater, None);
}
