use async_trait::async_trait;
use reqwest::{multipart::Form, Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::{
    domain::{models::VersionScope, traits::Gateway, value_objects::TaskId},
    dto::{
        containers::{ContainerAction, ContainerInfo, UpdateContainerRequest},
        images::ImageInfo,
        progress::ProgressEnvelope,
        version::VersionEnvelope,
        ApiEnvelope,
    },
    error::AppError,
    infra::{config::AppConfig, session::SessionStore},
};

/// Typed client for the container host REST API.
#[derive(Clone)]
pub struct CopilotClient {
    base_url: String,
    http: Client,
    session: SessionStore,
}

impl CopilotClient {
    pub fn new_from_config(cfg: &AppConfig, session: SessionStore) -> Result<Self, AppError> {
        let http = Client::builder()
            .user_agent("copilot-panel/rest-client")
            .timeout(cfg.http_timeout)
            .build()
            .map_err(|err| AppError::Config(format!("cannot build http client: {err}")))?;

        Ok(Self {
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            http,
            session,
        })
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        what: &str,
    ) -> Result<ApiEnvelope<T>, AppError> {
        let request = match self.session.token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request
            .send()
            .await
            .map_err(|err| AppError::Transport(format!("{what} request failed: {err}")))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            self.session.invalidate();
            return Err(AppError::Unauthorized);
        }
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<empty>".to_string());
            warn!(%status, endpoint = what, "backend returned http failure");
            return Err(AppError::Transport(format!(
                "{what} request failed ({status}): {body}"
            )));
        }

        let envelope: ApiEnvelope<T> = response
            .json()
            .await
            .map_err(|err| AppError::Transport(format!("invalid {what} payload: {err}")))?;
        debug!(endpoint = what, code = envelope.code, "backend responded");
        Ok(envelope)
    }

    // --- auth ---

    /// `POST /api/auth`. The caller decides what to store from the returned data.
    pub async fn login(&self, secret_key: &str) -> Result<ApiEnvelope<Value>, AppError> {
        if secret_key.is_empty() {
            return Err(AppError::Validation("secret key cannot be empty".into()));
        }
        let form = Form::new().text("secretKey", secret_key.to_string());
        self.send(self.http.post(self.url("/api/auth")).multipart(form), "login")
            .await
    }

    // --- version / program ---

    pub async fn get_version(&self, scope: VersionScope) -> Result<VersionEnvelope, AppError> {
        let mut request = self.http.get(self.url("/api/version"));
        if let Some(kind) = scope.query_value() {
            request = request.query(&[("type", kind)]);
        }
        self.send(request, "version").await
    }

    pub async fn update_program(&self) -> Result<ApiEnvelope<Value>, AppError> {
        self.send(self.http.put(self.url("/api/program")), "program update")
            .await
    }

    // --- progress ---

    pub async fn get_progress(&self, task_id: &TaskId) -> Result<ProgressEnvelope, AppError> {
        let url = self.url(&format!("/api/progress/{}", task_id.as_str()));
        self.send(self.http.get(url), "progress").await
    }

    // --- containers ---

    pub async fn list_containers(&self) -> Result<ApiEnvelope<Vec<ContainerInfo>>, AppError> {
        self.send(self.http.get(self.url("/api/containers")), "containers")
            .await
    }

    pub async fn container_action(
        &self,
        id: &str,
        action: ContainerAction,
    ) -> Result<ApiEnvelope<Value>, AppError> {
        let id = non_empty(id, "container id")?;
        let url = self.url(&format!("/api/container/{id}/{}", action.as_path()));
        self.send(self.http.post(url), action.as_path()).await
    }

    pub async fn start_container(&self, id: &str) -> Result<ApiEnvelope<Value>, AppError> {
        self.container_action(id, ContainerAction::Start).await
    }

    pub async fn stop_container(&self, id: &str) -> Result<ApiEnvelope<Value>, AppError> {
        self.container_action(id, ContainerAction::Stop).await
    }

    pub async fn restart_container(&self, id: &str) -> Result<ApiEnvelope<Value>, AppError> {
        self.container_action(id, ContainerAction::Restart).await
    }

    pub async fn rename_container(
        &self,
        id: &str,
        new_name: &str,
    ) -> Result<ApiEnvelope<Value>, AppError> {
        let id = non_empty(id, "container id")?;
        let new_name = non_empty(new_name, "new name")?;
        let form = Form::new().text("newName", new_name.to_string());
        let url = self.url(&format!("/api/container/{id}/rename"));
        self.send(self.http.post(url).multipart(form), "rename").await
    }

    /// Starts an image pull + recreate on the backend; the returned data usually carries the
    /// task id to hand to a progress monitor.
    pub async fn update_container(
        &self,
        id: &str,
        req: &UpdateContainerRequest,
    ) -> Result<ApiEnvelope<Value>, AppError> {
        let id = non_empty(id, "container id")?;
        let form = Form::new()
            .text("imageNameAndTag", req.image_name_and_tag.clone())
            .text("containerName", req.container_name.clone())
            .text("delOldContainer", req.del_old_container.to_string());
        let url = self.url(&format!("/api/container/{id}/update"));
        self.send(self.http.post(url).multipart(form), "container update")
            .await
    }

    // --- backups ---

    pub async fn backup_containers(&self) -> Result<ApiEnvelope<Value>, AppError> {
        self.send(self.http.get(self.url("/api/container/backup")), "backup")
            .await
    }

    pub async fn list_backups(&self) -> Result<ApiEnvelope<Vec<String>>, AppError> {
        self.send(
            self.http.get(self.url("/api/container/listBackups")),
            "backups",
        )
        .await
    }

    pub async fn restore_backup(&self, filename: &str) -> Result<ApiEnvelope<Value>, AppError> {
        let filename = non_empty(filename, "backup filename")?;
        let form = Form::new().text("filename", filename.to_string());
        self.send(
            self.http
                .post(self.url("/api/container/backups/restore"))
                .multipart(form),
            "restore",
        )
        .await
    }

    pub async fn delete_backup(&self, filename: &str) -> Result<ApiEnvelope<Value>, AppError> {
        let filename = non_empty(filename, "backup filename")?;
        self.send(
            self.http
                .delete(self.url("/api/container/backups"))
                .query(&[("filename", filename)]),
            "delete backup",
        )
        .await
    }

    pub async fn backup_to_compose(&self) -> Result<ApiEnvelope<Value>, AppError> {
        self.send(
            self.http.get(self.url("/api/container/backup2compose")),
            "backup to compose",
        )
        .await
    }

    // --- images ---

    pub async fn list_images(&self) -> Result<ApiEnvelope<Vec<ImageInfo>>, AppError> {
        self.send(self.http.get(self.url("/api/images")), "images")
            .await
    }

    pub async fn delete_image(&self, id: &str, force: bool) -> Result<ApiEnvelope<Value>, AppError> {
        let id = non_empty(id, "image id")?;
        self.send(
            self.http
                .delete(self.url(&format!("/api/image/{id}")))
                .query(&[("force", force)]),
            "delete image",
        )
        .await
    }
}

fn non_empty<'a>(value: &'a str, what: &str) -> Result<&'a str, AppError> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{what} cannot be empty")));
    }
    Ok(value)
}

#[async_trait]
impl Gateway for CopilotClient {
    async fn get_progress(&self, task_id: &TaskId) -> Result<ProgressEnvelope, AppError> {
        CopilotClient::get_progress(self, task_id).await
    }

    async fn get_version(&self, scope: VersionScope) -> Result<VersionEnvelope, AppError> {
        CopilotClient::get_version(self, scope).await
    }

    async fn trigger_update(&self) -> Result<ApiEnvelope<Value>, AppError> {
        self.update_program().await
    }
}
