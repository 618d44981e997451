use crate::utils::error::Result;
use async_trait::async_trait;
use serde_json::Value;

/// 目標端一次呼叫的結果：狀態碼加上已解析的 JSON body
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// 目標端 REST 能力：base URL 與 bearer 憑證已在實作端綁定
#[async_trait]
pub trait TargetApi: Send + Sync {
    /// 泛用 JSON 呼叫
    async fn invoke(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<ApiResponse>;

    /// 影像上傳走 multipart，與 JSON invoke 分開
    async fn upload_image(
        &self,
        slug: &str,
        extension: &str,
        bytes: Vec<u8>,
    ) -> Result<ApiResponse>;
}

/// 核心只透過這個介面取得執行設定
pub trait ConfigProvider: Send + Sync {
    fn export_path(&self) -> &str;
    fn base_url(&self) -> &str;
    fn dry_run(&self) -> bool;
    fn skip_images(&self) -> bool;
}
