mod common;

use common::{FakeTaskBackend, TOKEN, api_client, config_for, logged_in_session};
use serde_json::json;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use taskboard_client::{
    Category, CategoryFilter, ClientError, GuardDecision, InMemoryTokenStore, Route, RouteGuard,
    Session, StatusFilter, SyncStatus, TaskDraft, TaskFilter, TaskGateway, TaskPatch,
    TaskSyncController,
};
use wiremock::matchers::{any, method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn controller_with_backend() -> (MockServer, FakeTaskBackend, TaskSyncController) {
    let server = MockServer::start().await;
    let backend = FakeTaskBackend::new();
    backend.mount(&server).await;
    let session = logged_in_session(&server).await;
    let controller = TaskSyncController::new(session, &config_for(&server));
    (server, backend, controller)
}

fn ids(controller: &TaskSyncController) -> BTreeSet<String> {
    controller.tasks().into_iter().map(|task| task.id).collect()
}

#[tokio::test]
async fn test_filters_select_matching_tasks() {
    let (_server, backend, controller) = controller_with_backend().await;
    let a = backend.seed("A", "Work", false);
    let b = backend.seed("B", "Personal", true);

    controller.refresh().await.unwrap();
    assert_eq!(ids(&controller), BTreeSet::from([a.clone(), b.clone()]));
    assert_eq!(controller.status(), SyncStatus::Loaded);

    controller
        .set_status_filter(StatusFilter::Completed)
        .await
        .unwrap();
    assert_eq!(ids(&controller), BTreeSet::from([b]));

    controller.set_status_filter(StatusFilter::All).await.unwrap();
    controller
        .set_category_filter(CategoryFilter::Only(Category::Work))
        .await
        .unwrap();
    assert_eq!(ids(&controller), BTreeSet::from([a]));
}

#[tokio::test]
async fn test_every_filter_combination_is_an_exact_subset() {
    let (_server, backend, controller) = controller_with_backend().await;

    let seeded: Vec<(String, Category, bool)> = [
        ("Report", Category::Work, false),
        ("Standup", Category::Work, true),
        ("Call mum", Category::Personal, false),
        ("Groceries", Category::Shopping, true),
        ("Dentist", Category::Health, false),
        ("Misc", Category::Other, true),
    ]
    .into_iter()
    .map(|(title, category, completed)| {
        (backend.seed(title, category.as_str(), completed), category, completed)
    })
    .collect();

    let categories = std::iter::once(CategoryFilter::All)
        .chain(Category::ALL.into_iter().map(CategoryFilter::Only));

    for category in categories {
        for status in [StatusFilter::All, StatusFilter::Completed, StatusFilter::Pending] {
            let filter = TaskFilter::new(status, category);
            controller.set_filter(filter).await.unwrap();

            let expected: BTreeSet<String> = seeded
                .iter()
                .filter(|(_, cat, completed)| {
                    let status_ok = match status {
                        StatusFilter::All => true,
                        StatusFilter::Completed => *completed,
                        StatusFilter::Pending => !*completed,
                    };
                    let category_ok = match category {
                        CategoryFilter::All => true,
                        CategoryFilter::Only(only) => *cat == only,
                    };
                    status_ok && category_ok
                })
                .map(|(id, _, _)| id.clone())
                .collect();

            assert_eq!(ids(&controller), expected, "filter {status}/{category}");
        }
    }
}

#[tokio::test]
async fn test_added_task_is_listed_once() {
    let (_server, backend, controller) = controller_with_backend().await;
    backend.seed("Existing", "Other", false);
    controller.refresh().await.unwrap();

    let created = controller
        .add_task(TaskDraft::new("Write report").with_category(Category::Work))
        .await
        .unwrap();

    let listed: Vec<_> = controller
        .tasks()
        .into_iter()
        .filter(|task| task.id == created.id)
        .collect();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].category_kind(), Category::Work);
    assert!(!listed[0].completed);
    assert_eq!(
        controller
            .notifications()
            .current_success()
            .map(|notice| notice.message),
        Some("Task added successfully".to_string())
    );
}

#[tokio::test]
async fn test_invalid_draft_sends_nothing() {
    let (_server, backend, controller) = controller_with_backend().await;
    controller.refresh().await.unwrap();
    let calls = backend.list_calls();

    let err = controller.add_task(TaskDraft::new("  ")).await.unwrap_err();

    assert!(matches!(err, ClientError::Validation(_)));
    assert_eq!(backend.len(), 0);
    assert_eq!(backend.list_calls(), calls);
    assert_eq!(
        controller
            .notifications()
            .current_error()
            .map(|notice| notice.message),
        Some("A task needs a title or a description".to_string())
    );
}

#[tokio::test]
async fn test_double_toggle_restores_completion() {
    let (_server, backend, controller) = controller_with_backend().await;
    let id = backend.seed("Toggle me", "Personal", false);
    controller.refresh().await.unwrap();

    let updated = controller.toggle_complete(&id).await.unwrap();
    assert!(updated.completed);
    assert!(controller.tasks()[0].completed);

    let updated = controller.toggle_complete(&id).await.unwrap();
    assert!(!updated.completed);
    assert!(!controller.tasks()[0].completed);
}

#[tokio::test]
async fn test_toggled_task_leaves_pending_view() {
    let (_server, backend, controller) = controller_with_backend().await;
    let id = backend.seed("Finish me", "Work", false);
    controller
        .set_status_filter(StatusFilter::Pending)
        .await
        .unwrap();
    assert_eq!(ids(&controller), BTreeSet::from([id.clone()]));

    controller.toggle_complete(&id).await.unwrap();
    assert!(controller.tasks().is_empty());
}

#[tokio::test]
async fn test_toggle_unknown_task_fails_locally() {
    let (_server, backend, controller) = controller_with_backend().await;
    controller.refresh().await.unwrap();
    let calls = backend.list_calls();

    let err = controller.toggle_complete("missing").await.unwrap_err();
    assert!(matches!(err, ClientError::NotFound(_)));
    assert_eq!(backend.list_calls(), calls);
    assert!(controller.notifications().current_error().is_some());
}

#[tokio::test]
async fn test_deleted_task_is_gone_from_every_filter() {
    let (_server, backend, controller) = controller_with_backend().await;
    let doomed = backend.seed("Doomed", "Shopping", true);
    backend.seed("Survivor", "Shopping", false);
    controller.refresh().await.unwrap();

    controller.delete_task(&doomed).await.unwrap();
    assert_eq!(
        controller
            .notifications()
            .current_success()
            .map(|notice| notice.message),
        Some("Task deleted successfully".to_string())
    );

    for status in [StatusFilter::All, StatusFilter::Completed, StatusFilter::Pending] {
        for category in [CategoryFilter::All, CategoryFilter::Only(Category::Shopping)] {
            controller
                .set_filter(TaskFilter::new(status, category))
                .await
                .unwrap();
            assert!(!ids(&controller).contains(&doomed));
        }
    }
}

#[tokio::test]
async fn test_each_mutation_triggers_one_resync() {
    let (_server, backend, controller) = controller_with_backend().await;
    let first = backend.seed("First", "Work", false);
    let second = backend.seed("Second", "Work", false);
    controller.refresh().await.unwrap();
    assert_eq!(backend.list_calls(), 1);

    let (a, b) = tokio::join!(
        controller.toggle_complete(&first),
        controller.toggle_complete(&second)
    );
    a.unwrap();
    b.unwrap();

    assert_eq!(backend.list_calls(), 3);
    assert!(controller.tasks().iter().all(|task| task.completed));
}

#[tokio::test]
async fn test_stale_list_response_is_discarded() {
    let server = MockServer::start().await;
    let session = logged_in_session(&server).await;

    Mock::given(method("GET"))
        .and(path("/tasks"))
        .and(query_param("completed", "true"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{"_id": "done", "title": "Done", "completed": true}]))
                .set_delay(Duration::from_millis(400)),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/tasks"))
        .and(query_param("completed", "false"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{"_id": "open", "title": "Open", "completed": false}])),
        )
        .mount(&server)
        .await;

    let controller = TaskSyncController::new(session, &config_for(&server));

    let (slow, fast) = tokio::join!(
        controller.set_status_filter(StatusFilter::Completed),
        async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            controller.set_status_filter(StatusFilter::Pending).await
        }
    );
    slow.unwrap();
    fast.unwrap();

    assert_eq!(ids(&controller), BTreeSet::from(["open".to_string()]));
    assert_eq!(controller.filter().status, StatusFilter::Pending);
    assert_eq!(controller.status(), SyncStatus::Loaded);
}

#[tokio::test]
async fn test_load_failure_keeps_previous_tasks() {
    let server = MockServer::start().await;
    let session = logged_in_session(&server).await;

    Mock::given(method("GET"))
        .and(path("/tasks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"_id": "t1", "title": "Kept"}])))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/tasks"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let controller = TaskSyncController::new(session.clone(), &config_for(&server));
    controller.refresh().await.unwrap();

    let err = controller.refresh().await.unwrap_err();
    assert_eq!(err.status(), Some(500));
    assert_eq!(controller.status(), SyncStatus::Error);
    assert_eq!(ids(&controller), BTreeSet::from(["t1".to_string()]));
    assert_eq!(
        controller
            .notifications()
            .current_error()
            .map(|notice| notice.message),
        Some("Failed to load tasks".to_string())
    );
    // Only 401 ends the session
    assert!(session.is_authenticated());
}

#[tokio::test]
async fn test_unauthorized_response_logs_out() {
    let server = MockServer::start().await;
    let session = logged_in_session(&server).await;

    Mock::given(method("GET"))
        .and(path("/tasks"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": "Please authenticate."})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/users/logout"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let controller = TaskSyncController::new(session.clone(), &config_for(&server));
    let err = controller.refresh().await.unwrap_err();

    assert!(err.is_unauthorized());
    assert!(!session.is_authenticated());
    assert_eq!(session.token().await.unwrap(), None);
    assert_eq!(
        RouteGuard::new(session).evaluate(),
        GuardDecision::Redirect(Route::Login)
    );
}

#[tokio::test]
async fn test_unauthorized_logout_can_be_disabled() {
    let server = MockServer::start().await;
    let session = logged_in_session(&server).await;

    Mock::given(method("GET"))
        .and(path("/tasks"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let config = taskboard_client::ClientConfig::builder()
        .api_url(server.uri())
        .logout_on_unauthorized(false)
        .build();
    let controller = TaskSyncController::new(session.clone(), &config);

    assert!(controller.refresh().await.is_err());
    assert!(session.is_authenticated());
}

#[tokio::test]
async fn test_unsafe_task_ids_never_reach_the_backend() {
    let server = MockServer::start().await;

    Mock::given(any())
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let tokens = Arc::new(InMemoryTokenStore::with_token(TOKEN));
    let gateway = TaskGateway::new(api_client(&server, tokens));

    for id in ["..", ".", "%2e%2e", "../users/me", "a\\b", " "] {
        let err = gateway.delete_task(id).await.unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)), "{id:?}");

        let err = gateway
            .update_task(id, &TaskPatch::completed(true))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)), "{id:?}");
    }
}

#[tokio::test]
async fn test_delete_with_dot_segment_fails_locally() {
    let (_server, backend, controller) = controller_with_backend().await;
    backend.seed("Keep me", "Work", false);
    controller.refresh().await.unwrap();

    let err = controller.delete_task("..").await.unwrap_err();

    assert!(matches!(err, ClientError::Validation(_)));
    assert_eq!(backend.len(), 1);
    assert_eq!(backend.list_calls(), 1);
    assert_eq!(
        controller
            .notifications()
            .current_error()
            .map(|notice| notice.message),
        Some("Failed to delete task".to_string())
    );
}

#[tokio::test]
async fn test_list_tolerates_duplicate_id_keys_and_null_completion() {
    let server = MockServer::start().await;
    let session = logged_in_session(&server).await;

    Mock::given(method("GET"))
        .and(path("/tasks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"_id": "a1", "id": "a1", "title": "Virtuals on", "completed": null},
            {"_id": "b2", "title": "Plain", "completed": true}
        ])))
        .mount(&server)
        .await;

    let controller = TaskSyncController::new(session, &config_for(&server));
    controller.refresh().await.unwrap();

    let tasks = controller.tasks();
    assert_eq!(controller.status(), SyncStatus::Loaded);
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0].id, "a1");
    assert!(!tasks[0].completed);
}

async fn reject_mutations(server: &MockServer, verb: &str) {
    Mock::given(method(verb))
        .and(path_regex(r"^/tasks/[^/]+$"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": "Please authenticate."})))
        .with_priority(1)
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/users/logout"))
        .respond_with(ResponseTemplate::new(200))
        .mount(server)
        .await;
}

async fn seeded_view(server: &MockServer) -> (FakeTaskBackend, Session, TaskSyncController, String) {
    let backend = FakeTaskBackend::new();
    backend.mount(server).await;
    let session = logged_in_session(server).await;
    let controller = TaskSyncController::new(session.clone(), &config_for(server));

    let id = backend.seed("Protected", "Work", false);
    controller.refresh().await.unwrap();
    (backend, session, controller, id)
}

#[tokio::test]
async fn test_unauthorized_delete_logs_out() {
    let server = MockServer::start().await;
    let (backend, session, controller, id) = seeded_view(&server).await;
    reject_mutations(&server, "DELETE").await;

    let err = controller.delete_task(&id).await.unwrap_err();

    assert!(err.is_unauthorized());
    assert!(!session.is_authenticated());
    assert_eq!(session.token().await.unwrap(), None);
    assert_eq!(
        RouteGuard::new(session).evaluate(),
        GuardDecision::Redirect(Route::Login)
    );
    // No resync after a failed mutation
    assert_eq!(backend.len(), 1);
    assert_eq!(backend.list_calls(), 1);
    assert_eq!(ids(&controller), BTreeSet::from([id]));
    assert_eq!(
        controller
            .notifications()
            .current_error()
            .map(|notice| notice.message),
        Some("Failed to delete task".to_string())
    );
}

#[tokio::test]
async fn test_unauthorized_toggle_logs_out() {
    let server = MockServer::start().await;
    let (_backend, session, controller, id) = seeded_view(&server).await;
    reject_mutations(&server, "PATCH").await;

    let err = controller.toggle_complete(&id).await.unwrap_err();

    assert!(err.is_unauthorized());
    assert!(!session.is_authenticated());
    assert_eq!(
        RouteGuard::new(session).evaluate(),
        GuardDecision::Redirect(Route::Login)
    );
    assert!(!controller.tasks()[0].completed);
    assert_eq!(
        controller
            .notifications()
            .current_error()
            .map(|notice| notice.message),
        Some("Failed to update task".to_string())
    );
}
