//! Typed calls for every backend endpoint the console uses.

use std::path::{Path, PathBuf};

use records::{
    Id, LoginReply, LoginRequest, Model, ModelList, Notice, Prediction, ProfileUpdate, RegisterRequest,
    ResetPasswordRequest, Resource, ResourceDashboard, ResourceKind, ResourceList, ResourceUsage, Task, TaskInfo,
    TaskList, TrainAccepted, TrainRequest, UserProfile,
};
use reqwest::Method;
use reqwest::multipart::{Form, Part};
use tracing::info;

use super::dispatch::{ApiError, Dispatcher};
use crate::state::route::Route;
use crate::state::session::Session;

/// Largest file the upload endpoint accepts (5 GiB).
pub const MAX_UPLOAD_BYTES: u64 = 5 * 1024 * 1024 * 1024;

/// Which resource listing endpoint to read.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ResourceScope {
    #[default]
    All,
    Dataset,
    Image,
}

impl ResourceScope {
    fn path(self) -> &'static str {
        match self {
            Self::All => "/api/resource/list/all",
            Self::Dataset => "/api/resource/list/dataset",
            Self::Image => "/api/resource/list/image",
        }
    }
}

/// Metadata and local file for `POST /api/resource/upload`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadRequest {
    pub path: PathBuf,
    pub kind: ResourceKind,
    pub name: String,
    pub description: String,
}

/// Image to classify: a local file or bytes already fetched from the backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImageSource {
    File(PathBuf),
    Bytes { name: String, bytes: Vec<u8> },
}

#[derive(Clone)]
pub struct ApiClient {
    dispatcher: Dispatcher,
}

impl ApiClient {
    #[must_use]
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }

    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    // =========================================================================
    // ACCOUNT
    // =========================================================================

    /// Authenticate, persist the session, and route to the dashboard.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`]; the server's rejection message is kept.
    pub async fn login(&self, account: &str, password: &str) -> Result<LoginReply, ApiError> {
        let body = LoginRequest { account: account.to_owned(), password: password.to_owned() };
        let prepared = self.dispatcher.public(Method::POST, "/api/login").with(|r| r.json(&body));
        let reply: LoginReply = self.dispatcher.json(prepared).await?;

        let session = Session { token: reply.token.clone(), user_id: reply.user_id.clone() };
        self.dispatcher.sessions().save(&session)?;
        self.dispatcher.navigate(Route::Dashboard);
        info!(user_id = %reply.user_id, "signed in");
        Ok(reply)
    }

    /// Forget the session locally and return to login.
    ///
    /// # Errors
    ///
    /// Returns an error if the session store cannot be cleared.
    pub fn logout(&self) -> Result<(), ApiError> {
        self.dispatcher.sessions().clear()?;
        self.dispatcher.navigator().redirect_to_login();
        info!("signed out");
        Ok(())
    }

    /// Create an account, then return to login.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`].
    pub async fn register(&self, request: &RegisterRequest) -> Result<Notice, ApiError> {
        let prepared = self.dispatcher.public(Method::POST, "/api/register").with(|r| r.json(request));
        let notice = self.dispatcher.json(prepared).await?;
        self.dispatcher.navigator().redirect_to_login();
        Ok(notice)
    }

    /// Set a new password, then return to login.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`].
    pub async fn reset_password(&self, request: &ResetPasswordRequest) -> Result<Notice, ApiError> {
        let prepared = self.dispatcher.public(Method::POST, "/api/reset-password").with(|r| r.json(request));
        let notice = self.dispatcher.json(prepared).await?;
        self.dispatcher.navigator().redirect_to_login();
        Ok(notice)
    }

    /// Profile of the signed-in user.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`].
    pub async fn profile(&self) -> Result<UserProfile, ApiError> {
        let user_id = self.dispatcher.session()?.user_id;
        let prepared = self
            .dispatcher
            .protected(Method::GET, "/api/profile")?
            .with(|r| r.query(&[("id", user_id.as_str())]));
        self.dispatcher.json(prepared).await
    }

    /// Apply `update` over the current profile and save the full form.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`] from reading or writing the profile.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<Notice, ApiError> {
        let current = self.profile().await?;
        let form = update.apply_to(&current);
        let user_id = self.dispatcher.session()?.user_id;
        let prepared = self
            .dispatcher
            .protected(Method::PUT, "/api/profile")?
            .with(|r| r.query(&[("id", user_id.as_str())]).json(&form));
        let notice = self.dispatcher.json(prepared).await?;
        info!(%user_id, "profile updated");
        Ok(notice)
    }

    // =========================================================================
    // MODELS
    // =========================================================================

    /// # Errors
    ///
    /// Any [`ApiError`].
    pub async fn list_models(&self) -> Result<Vec<Model>, ApiError> {
        let prepared = self.dispatcher.protected(Method::GET, "/api/model/list")?;
        let list: ModelList = self.dispatcher.json(prepared).await?;
        Ok(list.models)
    }

    /// # Errors
    ///
    /// Any [`ApiError`].
    pub async fn delete_model(&self, model_id: &Id) -> Result<Notice, ApiError> {
        let path = format!("/api/model/delete/{model_id}");
        let prepared = self.dispatcher.protected(Method::DELETE, &path)?;
        let notice = self.dispatcher.json(prepared).await?;
        info!(%model_id, "model deleted");
        Ok(notice)
    }

    /// Classify one image with a trained model.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`]; [`ApiError::File`] if a local image cannot be read.
    pub async fn predict(&self, model_id: &Id, image: ImageSource) -> Result<Prediction, ApiError> {
        let (name, bytes) = match image {
            ImageSource::File(path) => {
                let bytes = tokio::fs::read(&path).await.map_err(|source| ApiError::File { path: path.clone(), source })?;
                (file_name(&path), bytes)
            }
            ImageSource::Bytes { name, bytes } => (name, bytes),
        };
        let form = Form::new()
            .part("image", Part::bytes(bytes).file_name(name))
            .text("model_id", model_id.to_string());
        let prepared = self
            .dispatcher
            .protected_transfer(Method::POST, "/api/model/predict")?
            .with(|r| r.multipart(form));
        self.dispatcher.json(prepared).await
    }

    // =========================================================================
    // TASKS
    // =========================================================================

    /// # Errors
    ///
    /// Any [`ApiError`].
    pub async fn list_tasks(&self) -> Result<Vec<Task>, ApiError> {
        let prepared = self.dispatcher.protected(Method::GET, "/api/task/list")?;
        let list: TaskList = self.dispatcher.json(prepared).await?;
        Ok(list.tasks)
    }

    /// # Errors
    ///
    /// Any [`ApiError`].
    pub async fn task_info(&self, task_id: &Id) -> Result<TaskInfo, ApiError> {
        let path = format!("/api/task/info/{task_id}");
        let prepared = self.dispatcher.protected(Method::GET, &path)?;
        self.dispatcher.json(prepared).await
    }

    /// # Errors
    ///
    /// Any [`ApiError`].
    pub async fn submit_training(&self, request: &TrainRequest) -> Result<TrainAccepted, ApiError> {
        let prepared = self.dispatcher.protected(Method::POST, "/api/task/train")?.with(|r| r.json(request));
        let accepted: TrainAccepted = self.dispatcher.json(prepared).await?;
        info!(
            task_id = %accepted.task_id,
            model_name = %request.model_name,
            dataset = %request.args.dataset,
            "training submitted"
        );
        Ok(accepted)
    }

    /// # Errors
    ///
    /// Any [`ApiError`].
    pub async fn stop_task(&self, task_id: &Id) -> Result<Notice, ApiError> {
        let path = format!("/api/task/stop/{task_id}");
        let prepared = self.dispatcher.protected(Method::DELETE, &path)?;
        let notice = self.dispatcher.json(prepared).await?;
        info!(%task_id, "task stopped");
        Ok(notice)
    }

    // =========================================================================
    // RESOURCES
    // =========================================================================

    /// # Errors
    ///
    /// Any [`ApiError`].
    pub async fn list_resources(&self, scope: ResourceScope) -> Result<Vec<Resource>, ApiError> {
        let prepared = self.dispatcher.protected(Method::GET, scope.path())?;
        let list: ResourceList = self.dispatcher.json(prepared).await?;
        Ok(list.resources)
    }

    /// # Errors
    ///
    /// Any [`ApiError`].
    pub async fn resource_dashboard(&self) -> Result<ResourceUsage, ApiError> {
        let prepared = self.dispatcher.protected(Method::GET, "/api/resource/dashboard")?;
        let dashboard: ResourceDashboard = self.dispatcher.json(prepared).await?;
        Ok(dashboard.resources)
    }

    /// Raw bytes of an image resource.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`].
    pub async fn fetch_image(&self, resource_id: &Id) -> Result<Vec<u8>, ApiError> {
        let path = format!("/api/resource/image/{resource_id}");
        let prepared = self.dispatcher.protected_transfer(Method::GET, &path)?;
        self.dispatcher.bytes(prepared).await
    }

    /// Stream a local file to the backend as a persistent resource.
    ///
    /// # Errors
    ///
    /// [`ApiError::FileTooLarge`] above [`MAX_UPLOAD_BYTES`] (checked before
    /// anything is sent), [`ApiError::File`] if the file cannot be read, or
    /// any other [`ApiError`].
    pub async fn upload_resource(&self, upload: &UploadRequest) -> Result<Notice, ApiError> {
        let session = self.dispatcher.session()?;
        let file_error = |source: std::io::Error| ApiError::File { path: upload.path.clone(), source };

        let size = tokio::fs::metadata(&upload.path).await.map_err(file_error)?.len();
        if size > MAX_UPLOAD_BYTES {
            return Err(ApiError::FileTooLarge { size, limit: MAX_UPLOAD_BYTES });
        }
        let file = tokio::fs::File::open(&upload.path).await.map_err(file_error)?;

        let part = Part::stream_with_length(reqwest::Body::from(file), size).file_name(file_name(&upload.path));
        let form = Form::new()
            .text("user_id", session.user_id.to_string())
            .text("save_type", "persistent")
            .text("type", upload.kind.as_str())
            .text("name", upload.name.clone())
            .text("description", upload.description.clone())
            .part("image", part);

        let prepared = self
            .dispatcher
            .protected_transfer(Method::POST, "/api/resource/upload")?
            .with(|r| r.multipart(form));
        let notice = self.dispatcher.json(prepared).await?;
        info!(name = %upload.name, kind = %upload.kind, size, "resource uploaded");
        Ok(notice)
    }

    /// # Errors
    ///
    /// Any [`ApiError`].
    pub async fn delete_resource(&self, resource_id: &Id) -> Result<Notice, ApiError> {
        let path = format!("/api/resource/delete/{resource_id}");
        let prepared = self.dispatcher.protected(Method::DELETE, &path)?;
        let notice = self.dispatcher.json(prepared).await?;
        info!(%resource_id, "resource deleted");
        Ok(notice)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| "upload".to_owned(), |name| name.to_string_lossy().into_owned())
}

#[cfg(test)]
#[path = "api_test.rs"]
mod tests;
