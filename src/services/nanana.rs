// nanana.rs - AI Image Editor Client (nanana.app)
// Implements the image-to-image flow: sign in with an emailed OTP, upload the
// source image, create an edit job and poll it until the edited image is ready.
//
// Key Features:
// - Session bootstrap through a OneTimeCodeSource (disposable mailbox)
// - Multipart upload of a staged file
// - Job submission and bounded status polling
// - Terminal payload validation (at least one result image)
//
// Used by: commands/editimg.rs

use crate::error::FlowError;
use crate::mailbox::OneTimeCodeSource;
use crate::poller::{poll_until_done, JobStatus, PollPolicy};
use crate::session::{base_headers, join_set_cookies, Session};
use log::{debug, info};
use reqwest::header::SET_COOKIE;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct EditedImage {
    pub job_id: String,
    pub image_url: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreateJobResponse {
    request_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JobResultResponse {
    #[serde(default)]
    completed: bool,
    status: Option<String>,
    error: Option<String>,
    message: Option<String>,
    data: Option<JobResultData>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct JobResultData {
    #[serde(default)]
    pub images: Vec<ResultImage>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ResultImage {
    pub url: String,
}

impl JobResultResponse {
    fn into_status(self) -> JobStatus<JobResultData> {
        if self.completed {
            return JobStatus::Completed(self.data.unwrap_or_default());
        }

        let failed_status = matches!(self.status.as_deref(), Some("failed") | Some("error"));
        let error = self.error.filter(|e| !e.is_empty());
        if failed_status || error.is_some() {
            let reason = error
                .or(self.message)
                .unwrap_or_else(|| "Image edit failed".to_string());
            return JobStatus::Failed(reason);
        }

        JobStatus::Pending
    }
}

pub struct NananaClient {
    http: Client,
    base_url: String,
    mailbox: Arc<dyn OneTimeCodeSource>,
    policy: PollPolicy,
}

impl NananaClient {
    pub fn new(http: Client, base_url: &str, mailbox: Arc<dyn OneTimeCodeSource>, policy: PollPolicy) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            mailbox,
            policy,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Sign in with a fresh disposable address and return the session headers.
    pub async fn authenticate(&self) -> Result<Session, FlowError> {
        let base = base_headers(&self.base_url);
        let email = self.mailbox.new_address();
        info!("[EDITIMG] Requesting OTP for {}", email);

        self.http
            .post(self.endpoint("/api/auth/email-otp/send-verification-otp"))
            .headers(base.clone())
            .json(&json!({ "email": email, "type": "sign-in" }))
            .send()
            .await?
            .error_for_status()?;

        let otp = self.mailbox.request_code(&email).await?;
        debug!("[EDITIMG] OTP received, signing in");

        let response = self
            .http
            .post(self.endpoint("/api/auth/sign-in/email-otp"))
            .headers(base.clone())
            .json(&json!({ "email": email, "otp": otp }))
            .send()
            .await?
            .error_for_status()?;

        let cookie = join_set_cookies(
            response
                .headers()
                .get_all(SET_COOKIE)
                .iter()
                .filter_map(|v| v.to_str().ok()),
        );
        let session = Session::new(base, &cookie);
        debug!("[EDITIMG] Signed in (cookie: {}, fingerprint: {})",
               session.cookie().is_some(), session.fingerprint().is_some());

        Ok(session)
    }

    /// Upload the staged file and return the URL the service assigned to it.
    pub async fn upload_image(&self, session: &Session, file: &Path, content_type: &str) -> Result<String, FlowError> {
        let bytes = tokio::fs::read(file).await?;
        let file_name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image.jpg".to_string());

        let part = Part::bytes(bytes).file_name(file_name).mime_str(content_type)?;
        let form = Form::new().part("image", part);

        let uploaded: UploadResponse = self
            .http
            .post(self.endpoint("/api/upload-img"))
            .headers(session.headers().clone())
            .multipart(form)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        uploaded
            .url
            .filter(|u| !u.is_empty())
            .ok_or_else(|| FlowError::upstream("Upload failed: no URL returned"))
    }

    pub async fn create_job(&self, session: &Session, image_url: &str, prompt: &str) -> Result<String, FlowError> {
        let created: CreateJobResponse = self
            .http
            .post(self.endpoint("/api/image-to-image"))
            .headers(session.headers().clone())
            .json(&json!({ "prompt": prompt, "image_urls": [image_url] }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        created
            .request_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| FlowError::upstream("Job creation failed: no request id returned"))
    }

    pub async fn check_job(&self, session: &Session, job_id: &str) -> Result<JobStatus<JobResultData>, FlowError> {
        let response: JobResultResponse = self
            .http
            .post(self.endpoint("/api/get-result"))
            .headers(session.headers().clone())
            .json(&json!({ "requestId": job_id, "type": "image-to-image" }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(response.into_status())
    }

    /// Full flow: auth, upload, submit, poll, extract.
    pub async fn edit_image(&self, file: &Path, content_type: &str, prompt: &str) -> Result<EditedImage, FlowError> {
        let session = self.authenticate().await?;
        let uploaded_url = self.upload_image(&session, file, content_type).await?;
        info!("[EDITIMG] Image uploaded: {}", uploaded_url);

        let job_id = self.create_job(&session, &uploaded_url, prompt).await?;
        info!("[EDITIMG] Job created: {}", job_id);

        let (session_ref, job_ref) = (&session, job_id.as_str());
        let data = poll_until_done("Job", &self.policy, |_| self.check_job(session_ref, job_ref)).await?;

        extract_edited_image(job_id, data)
    }
}

fn extract_edited_image(job_id: String, data: JobResultData) -> Result<EditedImage, FlowError> {
    let image_url = data
        .images
        .into_iter()
        .next()
        .map(|img| img.url)
        .ok_or_else(|| FlowError::upstream("No image result found"))?;

    Ok(EditedImage { job_id, image_url })
}
