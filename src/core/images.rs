use crate::domain::model::{ImageOutcome, RecipeHandle, SourceRecipe};
use crate::domain::ports::TargetApi;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

/// 解碼後的影像資料與探測出的容器格式
#[derive(Debug, Clone)]
pub struct ImageBlob {
    pub bytes: Vec<u8>,
    pub extension: &'static str,
}

impl ImageBlob {
    /// base64 直到這裡才還原成位元組，批次期間不把所有影像留在記憶體
    pub fn from_base64(encoded: &str) -> Result<Self, base64::DecodeError> {
        let bytes = BASE64.decode(encoded.trim())?;
        let extension = sniff_extension(&bytes);
        Ok(Self { bytes, extension })
    }
}

/// 從位元組簽名判斷容器格式；簽名認不得的一律當 jpg 送出
pub fn sniff_extension(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        "png"
    } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        "webp"
    } else {
        "jpg"
    }
}

/// 上傳第一張內嵌影像（Mealie 只有一張主圖）。
/// 沒有影像不是錯誤；上傳失敗只降級結果，食譜本身已經匯入成功
pub async fn upload_first_image<A: TargetApi>(
    api: &A,
    handle: &RecipeHandle,
    source: &SourceRecipe,
) -> ImageOutcome {
    let Some(encoded) = source.images.first() else {
        return ImageOutcome::NoImage;
    };

    let blob = match ImageBlob::from_base64(encoded) {
        Ok(blob) => blob,
        Err(e) => {
            tracing::warn!("⚠ Failed to decode image for '{}': {}", source.identity(), e);
            return ImageOutcome::Failed(format!("image decode failed: {}", e));
        }
    };

    match api.upload_image(&handle.slug, blob.extension, blob.bytes).await {
        Ok(resp) if resp.status == 200 => ImageOutcome::Uploaded,
        Ok(resp) => {
            tracing::warn!("⚠ Image upload for '{}' returned HTTP {}", handle.slug, resp.status);
            ImageOutcome::Failed(format!("upload returned HTTP {}", resp.status))
        }
        Err(e) => ImageOutcome::Failed(e.to_string()),
    }
}
