use crate::domain::ports::{ApiResponse, TargetApi};
use crate::utils::error::{MigrateError, Result};
use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::Value;
use std::time::Duration;

/// Mealie REST 客戶端：base URL 與 bearer token 在建構時綁定
#[derive(Debug, Clone)]
pub struct MealieClient {
    client: Client,
    base_url: String,
    token: String,
    retry_attempts: u32,
    retry_delay: Duration,
}

impl MealieClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            retry_attempts: 2,
            retry_delay: Duration::from_secs(1),
        }
    }

    pub fn with_retry(mut self, attempts: u32, delay: Duration) -> Self {
        self.retry_attempts = attempts;
        self.retry_delay = delay;
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// 只有暫時性的傳輸失敗（連線、逾時）值得重試
    fn is_transient(err: &reqwest::Error) -> bool {
        err.is_connect() || err.is_timeout()
    }

    async fn send_with_retry(
        &self,
        build: impl Fn() -> reqwest::RequestBuilder,
    ) -> Result<reqwest::Response> {
        let mut attempt = 0;
        loop {
            match build().send().await {
                Ok(resp) => return Ok(resp),
                Err(e) if Self::is_transient(&e) && attempt < self.retry_attempts => {
                    attempt += 1;
                    tracing::warn!(
                        "Transient transport failure ({}), retry {}/{}",
                        e,
                        attempt,
                        self.retry_attempts
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(e) => return Err(MigrateError::ApiError(e)),
            }
        }
    }

    async fn into_response(resp: reqwest::Response) -> Result<ApiResponse> {
        let status = resp.status().as_u16();
        let text = resp.text().await?;
        // 錯誤回應不一定是 JSON，退化成純文字保留原文
        let body = serde_json::from_str(&text).unwrap_or(Value::String(text));
        Ok(ApiResponse { status, body })
    }
}

#[async_trait]
impl TargetApi for MealieClient {
    async fn invoke(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<ApiResponse> {
        let url = self.endpoint(path);
        tracing::debug!("{} {}", method, url);

        let resp = self
            .send_with_retry(|| {
                let mut req = self
                    .client
                    .request(method.clone(), url.as_str())
                    .bearer_auth(&self.token)
                    .header("Accept", "application/json");
                if let Some(body) = &body {
                    req = req.json(body);
                }
                req
            })
            .await?;

        Self::into_response(resp).await
    }

    async fn upload_image(
        &self,
        slug: &str,
        extension: &str,
        bytes: Vec<u8>,
    ) -> Result<ApiResponse> {
        let url = self.endpoint(&format!("/api/recipes/{}/image", slug));
        tracing::debug!("PUT {} ({} bytes, .{})", url, bytes.len(), extension);

        // multipart 的 body 無法重建重送，因此不走 send_with_retry
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(format!("recipe.{}", extension))
            .mime_str(&format!("image/{}", extension))?;
        let form = reqwest::multipart::Form::new()
            .part("image", part)
            .text("extension", extension.to_string());

        let resp = self
            .client
            .put(url.as_str())
            .bearer_auth(&self.token)
            .multipart(form)
            .send()
            .await?;

        Self::into_response(resp).await
    }
}
