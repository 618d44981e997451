pub mod file;

use crate::domain::ports::ConfigProvider;
use crate::utils::error::{MigrateError, Result};
use crate::utils::validation::{self, Validate};
use clap::Parser;
use file::FileConfig;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "mela2mealie.toml";

#[derive(Debug, Clone, Parser)]
#[command(name = "mela2mealie")]
#[command(about = "Migrate recipes from a Mela export into a Mealie instance")]
pub struct CliConfig {
    /// Path to the .melarecipes (bulk) or .melarecipe (single recipe) export
    pub export: String,

    /// Mealie base URL (overrides the config file)
    #[arg(long)]
    pub url: Option<String>,

    /// Mealie API token (overrides the config file)
    #[arg(long)]
    pub token: Option<String>,

    /// Path to a TOML config file (default: mela2mealie.toml)
    #[arg(long)]
    pub config: Option<String>,

    /// Preview the migration without writing to the target
    #[arg(long)]
    pub dry_run: bool,

    /// Skip image uploads entirely
    #[arg(long)]
    pub skip_images: bool,

    /// Print the final report as JSON instead of the summary block
    #[arg(long)]
    pub json: bool,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,
}

/// CLI 與設定檔合併、驗證後的執行設定，是核心唯一的進入點
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    pub export_path: String,
    pub base_url: String,
    pub api_token: String,
    pub dry_run: bool,
    pub skip_images: bool,
    pub retry_attempts: u32,
    pub retry_delay: Duration,
}

impl MigrationConfig {
    /// 命令列參數優先於設定檔的值
    pub fn resolve(cli: &CliConfig) -> Result<Self> {
        let file = match &cli.config {
            Some(path) => {
                // 明確指定的設定檔不存在是錯誤，預設路徑則可缺
                if !std::path::Path::new(path).exists() {
                    return Err(MigrateError::InvalidConfigValueError {
                        field: "config".to_string(),
                        value: path.clone(),
                        reason: "config file not found".to_string(),
                    });
                }
                FileConfig::load(path)?
            }
            None => FileConfig::load(DEFAULT_CONFIG_PATH)?,
        };

        let mealie = file.mealie.clone().unwrap_or_default();
        let url = cli.url.clone().or(mealie.url);
        let token = cli.token.clone().or(mealie.api_token);

        let base_url =
            validation::validate_required_field("mealie url (--url or [mealie].url)", &url)?
                .trim_end_matches('/')
                .to_string();
        let api_token =
            validation::validate_required_field("api token (--token or [mealie].api_token)", &token)?
                .clone();

        let config = Self {
            export_path: cli.export.clone(),
            base_url,
            api_token,
            dry_run: cli.dry_run,
            skip_images: cli.skip_images,
            retry_attempts: file.retry_attempts(),
            retry_delay: file.retry_delay(),
        };
        config.validate()?;
        Ok(config)
    }
}

impl Validate for MigrationConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_url("mealie.url", &self.base_url)?;
        validation::validate_path("export", &self.export_path)?;
        validation::validate_file_extension(
            "export",
            &self.export_path,
            &["melarecipes", "melarecipe"],
        )?;
        validation::validate_non_empty_string("mealie.api_token", &self.api_token)?;
        Ok(())
    }
}

impl ConfigProvider for MigrationConfig {
    fn export_path(&self) -> &str {
        &self.export_path
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn dry_run(&self) -> bool {
        self.dry_run
    }

    fn skip_images(&self) -> bool {
        self.skip_images
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(export: &str) -> CliConfig {
        CliConfig {
            export: export.to_string(),
            url: Some("http://localhost:9925/".to_string()),
            token: Some("test-token".to_string()),
            config: None,
            dry_run: false,
            skip_images: false,
            json: false,
            verbose: false,
        }
    }

    #[test]
    fn test_resolve_from_cli_args() {
        let config = MigrationConfig::resolve(&cli("Recipes.melarecipes")).unwrap();
        assert_eq!(config.export_path, "Recipes.melarecipes");
        // 結尾斜線要去掉，路徑拼接才不會出現雙斜線
        assert_eq!(config.base_url, "http://localhost:9925");
        assert_eq!(config.api_token, "test-token");
        assert_eq!(config.retry_attempts, 2);
    }

    #[test]
    fn test_resolve_requires_url_and_token() {
        let mut missing_token = cli("Recipes.melarecipes");
        missing_token.token = None;
        assert!(matches!(
            MigrationConfig::resolve(&missing_token),
            Err(MigrateError::MissingConfigError { .. })
        ));

        let mut missing_url = cli("Recipes.melarecipes");
        missing_url.url = None;
        assert!(matches!(
            MigrationConfig::resolve(&missing_url),
            Err(MigrateError::MissingConfigError { .. })
        ));
    }

    #[test]
    fn test_resolve_rejects_unknown_export_extension() {
        assert!(MigrationConfig::resolve(&cli("recipes.zip")).is_err());
    }

    #[test]
    fn test_resolve_accepts_single_recipe_export() {
        assert!(MigrationConfig::resolve(&cli("Lasagna.melarecipe")).is_ok());
    }

    #[test]
    fn test_explicit_missing_config_file_is_an_error() {
        let mut with_config = cli("Recipes.melarecipes");
        with_config.config = Some("/nope/never.toml".to_string());
        assert!(MigrationConfig::resolve(&with_config).is_err());
    }

    #[test]
    fn test_cli_overrides_config_file() {
        let mut temp = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(
            &mut temp,
            br#"
[mealie]
url = "http://from-file:9925"
api_token = "file-token"
"#,
        )
        .unwrap();

        let mut args = cli("Recipes.melarecipes");
        args.config = Some(temp.path().to_str().unwrap().to_string());
        args.url = Some("http://from-cli:9925".to_string());
        args.token = None;

        let config = MigrationConfig::resolve(&args).unwrap();
        assert_eq!(config.base_url, "http://from-cli:9925");
        assert_eq!(config.api_token, "file-token");
    }
}
