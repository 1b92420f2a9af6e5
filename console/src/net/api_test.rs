use std::io::Write;

use records::{ProfileUpdate, ResourceKind, TaskStatus, TrainArgs, TrainRequest};

use super::*;
use crate::net::fake_backend::{FakeBackend, IMAGE_BYTES, PASSWORD, VALID_TOKEN, client_for};
use crate::state::session::SessionStore;

fn stale_session() -> Session {
    Session { token: "stale-token".to_owned(), user_id: Id::from(7) }
}

// =============================================================================
// account
// =============================================================================

#[tokio::test]
async fn login_persists_session_and_routes_to_dashboard() {
    let backend = FakeBackend::spawn().await;
    let (client, store, navigator) = client_for(&backend, None);
    navigator.redirect_to_login();

    let reply = client.login("ada", PASSWORD).await.unwrap();

    assert_eq!(reply.token, VALID_TOKEN);
    let session = store.load().unwrap().unwrap();
    assert_eq!(session.token, VALID_TOKEN);
    assert_eq!(session.user_id, Id::from(7));
    assert_eq!(navigator.current(), Route::Dashboard);

    let sent: serde_json::Value = serde_json::from_slice(&backend.last_hit().body).unwrap();
    assert_eq!(sent, serde_json::json!({ "account": "ada", "password": PASSWORD }));
}

#[tokio::test]
async fn logout_clears_session() {
    let backend = FakeBackend::spawn().await;
    let (client, store, navigator) = client_for(&backend, Some(VALID_TOKEN));

    client.logout().unwrap();

    assert_eq!(store.load().unwrap(), None);
    assert_eq!(navigator.current(), Route::Login);
    assert!(backend.hits().is_empty());
}

#[tokio::test]
async fn profile_calls_carry_user_id_query() {
    let backend = FakeBackend::spawn().await;
    let (client, _, _) = client_for(&backend, Some(VALID_TOKEN));

    let profile = client.profile().await.unwrap();
    assert_eq!(profile.username, "ada");
    assert_eq!(backend.last_hit().query.as_deref(), Some("id=7"));

    let update = ProfileUpdate { email: Some("new@example.test".to_owned()), ..ProfileUpdate::default() };
    let notice = client.update_profile(&update).await.unwrap();
    assert_eq!(notice.message.as_deref(), Some("profile updated"));

    let hits = backend.hits();
    let read = &hits[hits.len() - 2];
    assert_eq!((read.method.as_str(), read.path.as_str()), ("GET", "/api/profile"));

    let hit = backend.last_hit();
    assert_eq!(hit.method, "PUT");
    assert_eq!(hit.query.as_deref(), Some("id=7"));
    let sent: serde_json::Value = serde_json::from_slice(&hit.body).unwrap();
    assert_eq!(
        sent,
        serde_json::json!({ "username": "ada", "phone": "13800000000", "email": "new@example.test" })
    );
}

#[tokio::test]
async fn register_and_reset_return_to_login() {
    let backend = FakeBackend::spawn().await;
    let (client, _, navigator) = client_for(&backend, None);

    navigator.navigate(Route::Register, false);
    let request = RegisterRequest {
        phone: "13800000000".to_owned(),
        email: "ada@example.test".to_owned(),
        password: PASSWORD.to_owned(),
    };
    client.register(&request).await.unwrap();
    assert_eq!(navigator.current(), Route::Login);

    navigator.navigate(Route::ForgetPassword, false);
    let request = ResetPasswordRequest {
        phone: "13800000000".to_owned(),
        email: "ada@example.test".to_owned(),
        new_password: "fresh".to_owned(),
    };
    client.reset_password(&request).await.unwrap();
    assert_eq!(navigator.current(), Route::Login);
    let sent: serde_json::Value = serde_json::from_slice(&backend.last_hit().body).unwrap();
    assert_eq!(sent["newPassword"], "fresh");
}

// =============================================================================
// models and tasks
// =============================================================================

#[tokio::test]
async fn list_models_decodes_accuracy() {
    let backend = FakeBackend::spawn().await;
    let (client, _, _) = client_for(&backend, Some(VALID_TOKEN));

    let models = client.list_models().await.unwrap();

    assert_eq!(models.len(), 1);
    assert_eq!(models[0].model_name, "er");
    assert_eq!(models[0].accuracy.get(records::Protocol::TaskIl), Some(&[90.0, 80.0][..]));
}

#[tokio::test]
async fn predict_sends_image_and_model_id() {
    let backend = FakeBackend::spawn().await;
    let (client, _, _) = client_for(&backend, Some(VALID_TOKEN));

    let image = ImageSource::Bytes { name: "cat.png".to_owned(), bytes: IMAGE_BYTES.to_vec() };
    let prediction = client.predict(&Id::from(1), image).await.unwrap();

    assert_eq!(prediction.result, "cat");
    let body = backend.last_hit().body_text();
    assert!(body.contains("name=\"image\"; filename=\"cat.png\""));
    assert!(body.contains("name=\"model_id\""));
}

#[tokio::test]
async fn task_calls_round_trip() {
    let backend = FakeBackend::spawn().await;
    let (client, _, _) = client_for(&backend, Some(VALID_TOKEN));

    let tasks = client.list_tasks().await.unwrap();
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0].status, TaskStatus::Running);

    assert!(!client.task_info(&Id::from(1)).await.unwrap().is_terminal());
    assert!(client.task_info(&Id::from(2)).await.unwrap().is_terminal());
    let failed = client.task_info(&Id::from(3)).await.unwrap();
    assert_eq!(failed.error(), Some("boom"));

    client.stop_task(&Id::from(1)).await.unwrap();
    assert_eq!(backend.last_hit().path, "/api/task/stop/1");
}

#[tokio::test]
async fn submit_training_returns_task_id() {
    let backend = FakeBackend::spawn().await;
    let (client, _, _) = client_for(&backend, Some(VALID_TOKEN));

    let request = TrainRequest {
        model_name: "er".to_owned(),
        args: TrainArgs {
            dataset: "seq-cifar10".to_owned(),
            lr: 0.03,
            batch_size: 64,
            buffer_size: 200,
            epochs: 200,
            others: std::collections::BTreeMap::new(),
        },
    };
    let accepted = client.submit_training(&request).await.unwrap();

    assert_eq!(accepted.task_id, Id::from(11));
    let sent: serde_json::Value = serde_json::from_slice(&backend.last_hit().body).unwrap();
    assert_eq!(sent["args"]["dataset"], "seq-cifar10");
    assert_eq!(sent["args"]["batch_size"], 64);
}

// =============================================================================
// resources
// =============================================================================

#[tokio::test]
async fn resource_scope_selects_endpoint() {
    let backend = FakeBackend::spawn().await;
    let (client, _, _) = client_for(&backend, Some(VALID_TOKEN));

    assert_eq!(client.list_resources(ResourceScope::All).await.unwrap().len(), 3);

    let datasets = client.list_resources(ResourceScope::Dataset).await.unwrap();
    assert_eq!(backend.last_hit().path, "/api/resource/list/dataset");
    assert_eq!(datasets.len(), 1);
    assert_eq!(datasets[0].kind, ResourceKind::Dataset);

    let images = client.list_resources(ResourceScope::Image).await.unwrap();
    assert_eq!(images[0].name, "cat.png");
}

#[tokio::test]
async fn dashboard_and_image_bytes() {
    let backend = FakeBackend::spawn().await;
    let (client, _, _) = client_for(&backend, Some(VALID_TOKEN));

    let usage = client.resource_dashboard().await.unwrap();
    assert_eq!(usage.dataset.file_count, 1);
    assert!((usage.dataset.total_size - 170.0).abs() < f64::EPSILON);

    let bytes = client.fetch_image(&Id::from(1)).await.unwrap();
    assert_eq!(bytes, IMAGE_BYTES);
}

#[tokio::test]
async fn upload_sends_multipart_fields() {
    let backend = FakeBackend::spawn().await;
    let (client, _, _) = client_for(&backend, Some(VALID_TOKEN));
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cifar.zip");
    std::fs::File::create(&path).unwrap().write_all(b"zip bytes").unwrap();

    let upload = UploadRequest {
        path,
        kind: ResourceKind::Dataset,
        name: "cifar".to_owned(),
        description: "training split".to_owned(),
    };
    client.upload_resource(&upload).await.unwrap();

    let hit = backend.last_hit();
    assert_eq!(hit.path, "/api/resource/upload");
    let body = hit.body_text();
    for field in ["user_id", "save_type", "type", "name", "description"] {
        assert!(body.contains(&format!("name=\"{field}\"")), "missing field {field}");
    }
    assert!(body.contains("persistent"));
    assert!(body.contains("training split"));
    assert!(body.contains("filename=\"cifar.zip\""));
    assert!(body.contains("zip bytes"));
}

#[tokio::test]
async fn oversize_upload_is_rejected_before_sending() {
    let backend = FakeBackend::spawn().await;
    let (client, _, _) = client_for(&backend, Some(VALID_TOKEN));
    let file = tempfile::NamedTempFile::new().unwrap();
    file.as_file().set_len(MAX_UPLOAD_BYTES + 1).unwrap();

    let upload = UploadRequest {
        path: file.path().to_path_buf(),
        kind: ResourceKind::Others,
        name: "huge".to_owned(),
        description: String::new(),
    };
    let err = client.upload_resource(&upload).await.unwrap_err();

    assert!(matches!(err, ApiError::FileTooLarge { size, .. } if size == MAX_UPLOAD_BYTES + 1));
    assert!(backend.hits().is_empty());
}

#[tokio::test]
async fn missing_upload_file_is_file_error() {
    let backend = FakeBackend::spawn().await;
    let (client, _, _) = client_for(&backend, Some(VALID_TOKEN));

    let upload = UploadRequest {
        path: PathBuf::from("/definitely/not/here.bin"),
        kind: ResourceKind::Others,
        name: "gone".to_owned(),
        description: String::new(),
    };
    let err = client.upload_resource(&upload).await.unwrap_err();

    assert!(matches!(err, ApiError::File { .. }));
    assert!(backend.hits().is_empty());
}

// =============================================================================
// unauthorized sweep
// =============================================================================

#[tokio::test]
async fn every_protected_call_expires_rejected_session() {
    let backend = FakeBackend::spawn().await;
    let (client, store, navigator) = client_for(&backend, None);
    let dir = tempfile::tempdir().unwrap();
    let upload_path = dir.path().join("a.txt");
    std::fs::write(&upload_path, b"a").unwrap();
    let upload = UploadRequest {
        path: upload_path,
        kind: ResourceKind::Others,
        name: "a".to_owned(),
        description: String::new(),
    };
    let id = Id::from(1);

    for case in 0..13 {
        store.save(&stale_session()).unwrap();
        navigator.navigate(Route::Dashboard, true);

        let result = match case {
            0 => client.profile().await.map(drop),
            1 => client.update_profile(&ProfileUpdate::default()).await.map(drop),
            2 => client.list_models().await.map(drop),
            3 => client.delete_model(&id).await.map(drop),
            4 => {
                let image = ImageSource::Bytes { name: "x.png".to_owned(), bytes: vec![1] };
                client.predict(&id, image).await.map(drop)
            }
            5 => client.list_tasks().await.map(drop),
            6 => client.task_info(&id).await.map(drop),
            7 => client.stop_task(&id).await.map(drop),
            8 => client.list_resources(ResourceScope::All).await.map(drop),
            9 => client.resource_dashboard().await.map(drop),
            10 => client.fetch_image(&id).await.map(drop),
            11 => client.upload_resource(&upload).await.map(drop),
            _ => client.delete_resource(&id).await.map(drop),
        };

        let err = result.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized), "case {case}: {err:?}");
        assert_eq!(store.load().unwrap(), None, "case {case}");
        assert_eq!(navigator.current(), Route::Login, "case {case}");
    }
    assert_eq!(backend.hits().len(), 13);
}
