use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// 來源端（Mela）的單筆食譜記錄，對應一個 .melarecipe JSON 檔
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SourceRecipe {
    pub id: Option<String>,
    pub title: Option<String>,
    pub text: Option<String>,
    #[serde(rename = "yield")]
    pub recipe_yield: Option<String>,
    pub prep_time: Option<String>,
    pub cook_time: Option<String>,
    pub total_time: Option<String>,
    pub link: Option<String>,
    /// NSDate：自 2001-01-01 UTC 起算的秒數
    pub date: Option<f64>,
    pub ingredients: Option<String>,
    pub instructions: Option<String>,
    pub notes: Option<String>,
    pub nutrition: Option<String>,
    pub categories: Vec<String>,
    pub tags: Vec<String>,
    pub favorite: bool,
    pub want_to_cook: bool,
    /// base64 影像資料，保持編碼狀態直到上傳階段才解碼
    pub images: Vec<String>,
}

impl SourceRecipe {
    pub fn identity(&self) -> &str {
        self.id
            .as_deref()
            .or(self.title.as_deref())
            .unwrap_or("untitled")
    }
}

/// 目標端（Mealie）形狀的草稿，由 mapper 從 SourceRecipe 導出，
/// 尚未發出任何網路寫入
#[derive(Debug, Clone, PartialEq)]
pub struct RecipeDraft {
    pub name: String,
    pub description: Option<String>,
    pub recipe_yield: Option<String>,
    pub prep_time: Option<String>,
    pub perform_time: Option<String>,
    pub total_time: Option<String>,
    pub org_url: Option<String>,
    pub date_added: Option<String>,
    pub created_at: Option<String>,
    pub ingredients: Vec<DraftIngredient>,
    pub instructions: Vec<DraftStep>,
    pub notes: Vec<DraftNote>,
    /// 去重後的分類名稱，順序保留；patch 前必須全部解析成 OrganizerRef
    pub categories: Vec<String>,
    /// 含固定匯入標記與條件式 favorite/want-to-cook 標籤
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DraftIngredient {
    /// 段落標題，只出現在該段第一列食材上（Mealie 的分組慣例）
    pub title: Option<String>,
    pub note: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DraftStep {
    pub title: String,
    pub summary: String,
    pub text: String,
    pub ingredient_references: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DraftNote {
    pub title: String,
    pub text: String,
}

/// 在 patch 裡引用分類/標籤的唯一合法形狀
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrganizerRef {
    pub id: String,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrganizerKind {
    Category,
    Tag,
}

impl OrganizerKind {
    /// Mealie organizer 端點的路徑片段
    pub fn api_path(&self) -> &'static str {
        match self {
            Self::Category => "categories",
            Self::Tag => "tags",
        }
    }
}

impl fmt::Display for OrganizerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Category => "category",
            Self::Tag => "tag",
        })
    }
}

/// stub 建立後目標端配發的識別；Mealie 後續一律以 slug 定址
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecipeHandle {
    pub slug: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageOutcome {
    Uploaded,
    NoImage,
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Stub,
    Patch,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Stub => "stub",
            Self::Patch => "patch",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    #[error("duplicate name still colliding after {attempts} attempts")]
    DuplicateUnresolved { attempts: u32 },

    #[error("{kind} '{name}' was never resolved on the target")]
    MissingOrganizer { kind: OrganizerKind, name: String },

    #[error("target returned HTTP {status}: {detail}")]
    Http { status: u16, detail: String },

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// 單筆食譜的遷移結果；失敗以值傳遞，不用例外中斷批次
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationOutcome {
    Created {
        slug: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        image: Option<ImageOutcome>,
    },
    CreatedWithRename {
        original_name: String,
        final_name: String,
        slug: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        image: Option<ImageOutcome>,
    },
    SkippedDryRun,
    Failed {
        stage: FailureStage,
        reason: FailureReason,
    },
}

impl MigrationOutcome {
    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created { .. } | Self::CreatedWithRename { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// 影像階段的結果只降級，不改變 Created/Renamed 的本質
    pub fn set_image(&mut self, outcome: ImageOutcome) {
        match self {
            Self::Created { image, .. } | Self::CreatedWithRename { image, .. } => {
                *image = Some(outcome);
            }
            _ => {}
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Created { slug, image } => match image {
                Some(ImageOutcome::Uploaded) => format!("✓ Created with image → /recipe/{}", slug),
                Some(ImageOutcome::Failed(_)) => {
                    format!("✓ Created (image upload failed) → /recipe/{}", slug)
                }
                _ => format!("✓ Created → /recipe/{}", slug),
            },
            Self::CreatedWithRename {
                final_name, slug, ..
            } => format!("✓ Created as '{}' → /recipe/{}", final_name, slug),
            Self::SkippedDryRun => "⊘ Skipped (dry run)".to_string(),
            Self::Failed { stage, reason } => format!("✗ Failed at {} stage: {}", stage, reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecipeEntry {
    pub name: String,
    pub outcome: MigrationOutcome,
}

/// 整批的有序結果；報告永遠逐筆列出，不默默丟掉任何一筆
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MigrationReport {
    pub entries: Vec<RecipeEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    pub total: usize,
    pub created: usize,
    pub renamed: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl MigrationReport {
    pub fn record(&mut self, name: impl Into<String>, outcome: MigrationOutcome) {
        self.entries.push(RecipeEntry {
            name: name.into(),
            outcome,
        });
    }

    pub fn created(&self) -> usize {
        self.count(|o| matches!(o, MigrationOutcome::Created { .. }))
    }

    pub fn renamed(&self) -> usize {
        self.count(|o| matches!(o, MigrationOutcome::CreatedWithRename { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, MigrationOutcome::SkippedDryRun))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| o.is_failed())
    }

    pub fn summary(&self) -> ReportSummary {
        ReportSummary {
            total: self.entries.len(),
            created: self.created(),
            renamed: self.renamed(),
            skipped: self.skipped(),
            failed: self.failed(),
        }
    }

    fn count(&self, predicate: impl Fn(&MigrationOutcome) -> bool) -> usize {
        self.entries.iter().filter(|e| predicate(&e.outcome)).count()
    }
}
