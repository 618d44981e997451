use crate::utils::error::{MigrateError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// mela2mealie.toml 的內容；所有欄位皆可省略，缺的由 CLI 參數補足
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileConfig {
    pub mealie: Option<MealieSection>,
    pub http: Option<HttpSection>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MealieSection {
    pub url: Option<String>,
    pub api_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpSection {
    pub retry_attempts: Option<u32>,
    pub retry_delay_seconds: Option<u64>,
}

impl FileConfig {
    /// 從 TOML 檔案載入配置；檔案不存在時回傳空預設
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        if !path.as_ref().exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path).map_err(MigrateError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed = Self::substitute_env_vars(content);

        toml::from_str(&processed).map_err(|e| MigrateError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${MEALIE_TOKEN})
    fn substitute_env_vars(content: &str) -> String {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").unwrap();

        re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        })
        .to_string()
    }

    pub fn retry_attempts(&self) -> u32 {
        self.http
            .as_ref()
            .and_then(|h| h.retry_attempts)
            .unwrap_or(2)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(
            self.http
                .as_ref()
                .and_then(|h| h.retry_delay_seconds)
                .unwrap_or(1),
        )
    }
}
