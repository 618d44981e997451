use crate::core::organizers::{self, OrganizerTable};
use crate::core::sync::RecipeSynchronizer;
use crate::core::{decoder, images, mapper};
use crate::domain::model::{MigrationReport, RecipeDraft, SourceRecipe};
use crate::domain::ports::{ConfigProvider, TargetApi};
use crate::utils::error::{MigrateError, Result};
use reqwest::Method;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// 對目標 API 的禮貌間隔，逐筆寫入之間停一下
const WRITE_DELAY: Duration = Duration::from_millis(300);

/// 遷移協調器：Decoding → ResolvingOrganizers → SyncingRecipes → Reporting，
/// 線性推進、不回頭。單筆失敗記錄後繼續，只有前置條件失敗才中止整個執行
pub struct MigrationEngine<A: TargetApi, C: ConfigProvider> {
    api: A,
    config: C,
    interrupt: Option<Arc<AtomicBool>>,
}

impl<A: TargetApi, C: ConfigProvider> MigrationEngine<A, C> {
    pub fn new(api: A, config: C) -> Self {
        Self {
            api,
            config,
            interrupt: None,
        }
    }

    /// 中斷旗標只在食譜邊界檢查，進行中的那筆會跑到完成或失敗
    pub fn with_interrupt(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupt = Some(flag);
        self
    }

    pub async fn run(&self) -> Result<MigrationReport> {
        let dry_run = self.config.dry_run();

        tracing::info!("Decoding export: {}", self.config.export_path());
        let batch = self.decode_batch()?;
        tracing::info!("✓ Found {} recipe(s) to migrate", batch.len());

        if !dry_run {
            self.check_target().await?;
        }

        let (category_names, tag_names) = collect_organizer_names(&batch);
        let organizers =
            organizers::resolve(&self.api, &category_names, &tag_names, dry_run).await?;

        tracing::info!("Syncing recipes...");
        let report = self.migrate_batch(&batch, &organizers).await;

        tracing::info!(
            "Migration complete: {} created, {} renamed, {} skipped (dry run), {} failed",
            report.created(),
            report.renamed(),
            report.skipped(),
            report.failed()
        );
        Ok(report)
    }

    /// Decoding 階段：展開容器、逐筆映射。壞記錄略過，全空則致命
    fn decode_batch(&self) -> Result<Vec<(SourceRecipe, RecipeDraft)>> {
        let stream = decoder::decode(self.config.export_path())?;
        let mut batch = Vec::new();
        for item in stream {
            match item {
                Ok(source) => {
                    let draft = mapper::map_recipe(&source);
                    batch.push((source, draft));
                }
                Err(e) => tracing::warn!("⚠ Skipping unreadable entry: {}", e),
            }
        }
        if batch.is_empty() {
            return Err(MigrateError::FormatError {
                message: format!("no recipe records found in {}", self.config.export_path()),
            });
        }
        Ok(batch)
    }

    /// 前置條件：目標可達且憑證有效，否則在任何寫入前中止
    async fn check_target(&self) -> Result<()> {
        let resp = self.api.invoke(Method::GET, "/api/app/about", None).await?;
        if resp.status != 200 {
            return Err(MigrateError::TransportError {
                message: format!(
                    "cannot reach target at {} (HTTP {})",
                    self.config.base_url(),
                    resp.status
                ),
            });
        }
        let version = resp
            .body
            .get("version")
            .and_then(|v| v.as_str())
            .unwrap_or("?");
        tracing::info!("✓ Connected to Mealie {} at {}", version, self.config.base_url());
        Ok(())
    }

    /// 每筆食譜依序跑完 stub → patch → 影像，才輪到下一筆
    async fn migrate_batch(
        &self,
        batch: &[(SourceRecipe, RecipeDraft)],
        organizers: &OrganizerTable,
    ) -> MigrationReport {
        let dry_run = self.config.dry_run();
        let mut syncer = RecipeSynchronizer::new();
        let mut report = MigrationReport::default();
        let total = batch.len();

        for (index, (source, draft)) in batch.iter().enumerate() {
            if self.interrupted() {
                tracing::warn!(
                    "Interrupt received, stopping at recipe boundary ({}/{} processed)",
                    index,
                    total
                );
                break;
            }

            tracing::info!("[{}/{}] {}", index + 1, total, draft.name);
            let (handle, mut outcome) = syncer.sync(&self.api, draft, organizers, dry_run).await;

            if !dry_run && !self.config.skip_images() && outcome.is_created() {
                if let Some(handle) = &handle {
                    outcome.set_image(images::upload_first_image(&self.api, handle, source).await);
                }
            }

            tracing::info!("  {}", outcome.describe());
            report.record(draft.name.clone(), outcome);

            if !dry_run && index + 1 < total {
                tokio::time::sleep(WRITE_DELAY).await;
            }
        }

        report
    }

    fn interrupted(&self) -> bool {
        self.interrupt
            .as_ref()
            .map(|flag| flag.load(Ordering::Relaxed))
            .unwrap_or(false)
    }
}

/// 收集整批草稿引用到的分類/標籤名稱：去重、維持首見順序
fn collect_organizer_names(batch: &[(SourceRecipe, RecipeDraft)]) -> (Vec<String>, Vec<String>) {
    let mut categories = Vec::new();
    let mut tags = Vec::new();
    let mut seen_categories = std::collections::HashSet::new();
    let mut seen_tags = std::collections::HashSet::new();

    for (_, draft) in batch {
        for name in &draft.categories {
            if seen_categories.insert(name.clone()) {
                categories.push(name.clone());
            }
        }
        for name in &draft.tags {
            if seen_tags.insert(name.clone()) {
                tags.push(name.clone());
            }
        }
    }

    (categories, tags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::mapper::IMPORT_TAG;

    fn batch_entry(title: &str, categories: &[&str]) -> (SourceRecipe, RecipeDraft) {
        let source = SourceRecipe {
            title: Some(title.to_string()),
            categories: categories.iter().map(|c| c.to_string()).collect(),
            ..Default::default()
        };
        let draft = mapper::map_recipe(&source);
        (source, draft)
    }

    #[test]
    fn test_collect_organizer_names_dedups_across_recipes() {
        let batch = vec![
            batch_entry("Lasagna", &["Dinner", "Italian"]),
            batch_entry("Pizza", &["Italian", "Quick"]),
        ];

        let (categories, tags) = collect_organizer_names(&batch);

        assert_eq!(categories, vec!["Dinner", "Italian", "Quick"]);
        // 兩筆食譜共用的固定匯入標記只出現一次
        assert_eq!(tags, vec![IMPORT_TAG.to_string()]);
    }
}
