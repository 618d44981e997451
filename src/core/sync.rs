use crate::core::organizers::OrganizerTable;
use crate::domain::model::{
    FailureReason, FailureStage, MigrationOutcome, OrganizerKind, OrganizerRef, RecipeDraft,
    RecipeHandle,
};
use crate::domain::ports::TargetApi;
use crate::utils::slug::slugify;
use reqwest::Method;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use uuid::Uuid;

/// 同名重試上限；超過即回報 DuplicateUnresolved，不無限迴圈
const MAX_RENAME_ATTEMPTS: u32 = 5;

/// 逐筆把草稿寫進目標端。持有本次執行已佔用的 slug 集合，
/// 單筆失敗以 MigrationOutcome 回報，絕不中斷批次
#[derive(Debug, Default)]
pub struct RecipeSynchronizer {
    claimed_slugs: HashSet<String>,
}

impl RecipeSynchronizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sync<A: TargetApi>(
        &mut self,
        api: &A,
        draft: &RecipeDraft,
        organizers: &OrganizerTable,
        dry_run: bool,
    ) -> (Option<RecipeHandle>, MigrationOutcome) {
        if dry_run {
            // 模擬模式：slug 在本地合成，沿用同一套防撞規則，零網路呼叫
            let slug = self.claim_local_slug(&draft.name);
            return (Some(RecipeHandle { slug }), MigrationOutcome::SkippedDryRun);
        }

        // 子階段一：建立 stub 取得 slug，名稱衝突時加數字後綴重試
        let (handle, rename) = match self.create_stub(api, draft).await {
            Ok(created) => created,
            Err(outcome) => return (None, outcome),
        };

        // 子階段二：patch 完整內容，分類/標籤一律以 OrganizerRef 引用
        let payload = match build_patch(draft, rename.as_deref(), organizers) {
            Ok(payload) => payload,
            Err(reason) => {
                return (
                    Some(handle),
                    MigrationOutcome::Failed {
                        stage: FailureStage::Patch,
                        reason,
                    },
                )
            }
        };

        let path = format!("/api/recipes/{}", handle.slug);
        let resp = match api.invoke(Method::PATCH, &path, Some(payload)).await {
            Ok(resp) => resp,
            Err(e) => {
                return (
                    Some(handle),
                    MigrationOutcome::Failed {
                        stage: FailureStage::Patch,
                        reason: FailureReason::Transport(e.to_string()),
                    },
                )
            }
        };
        if resp.status != 200 {
            return (
                Some(handle),
                MigrationOutcome::Failed {
                    stage: FailureStage::Patch,
                    reason: FailureReason::Http {
                        status: resp.status,
                        detail: truncate_body(&resp.body),
                    },
                },
            );
        }

        let outcome = match rename {
            Some(final_name) => MigrationOutcome::CreatedWithRename {
                original_name: draft.name.clone(),
                final_name,
                slug: handle.slug.clone(),
                image: None,
            },
            None => MigrationOutcome::Created {
                slug: handle.slug.clone(),
                image: None,
            },
        };
        (Some(handle), outcome)
    }

    /// 成功時回傳 (handle, 改名後的標題)；Err 內含 stub 階段的失敗結果
    async fn create_stub<A: TargetApi>(
        &mut self,
        api: &A,
        draft: &RecipeDraft,
    ) -> std::result::Result<(RecipeHandle, Option<String>), MigrationOutcome> {
        let mut attempt: u32 = 1;
        loop {
            let title = if attempt == 1 {
                draft.name.clone()
            } else {
                format!("{} ({})", draft.name, attempt)
            };

            let resp = match api
                .invoke(Method::POST, "/api/recipes", Some(json!({ "name": title })))
                .await
            {
                Ok(resp) => resp,
                Err(e) => {
                    return Err(MigrationOutcome::Failed {
                        stage: FailureStage::Stub,
                        reason: FailureReason::Transport(e.to_string()),
                    })
                }
            };

            match resp.status {
                200 | 201 => {
                    let slug = match resp.body.as_str() {
                        Some(slug) if !slug.is_empty() => slug.to_string(),
                        _ => {
                            return Err(MigrationOutcome::Failed {
                                stage: FailureStage::Stub,
                                reason: FailureReason::Internal(
                                    "stub response carried no slug".to_string(),
                                ),
                            })
                        }
                    };
                    if self.claimed_slugs.insert(slug.clone()) {
                        let rename = (attempt > 1).then_some(title);
                        return Ok((RecipeHandle { slug }, rename));
                    }
                    // 本次執行已佔用此 slug，視同名稱衝突再試
                    tracing::warn!(
                        "⚠ Slug '{}' already claimed this run, retrying with suffix",
                        slug
                    );
                }
                409 => {
                    tracing::warn!("⚠ Recipe '{}' already exists, retrying with suffix", title);
                }
                status => {
                    return Err(MigrationOutcome::Failed {
                        stage: FailureStage::Stub,
                        reason: FailureReason::Http {
                            status,
                            detail: truncate_body(&resp.body),
                        },
                    })
                }
            }

            attempt += 1;
            if attempt > MAX_RENAME_ATTEMPTS {
                return Err(MigrationOutcome::Failed {
                    stage: FailureStage::Stub,
                    reason: FailureReason::DuplicateUnresolved {
                        attempts: MAX_RENAME_ATTEMPTS,
                    },
                });
            }
        }
    }

    fn claim_local_slug(&mut self, name: &str) -> String {
        let base = slugify(name);
        let base = if base.is_empty() {
            "untitled".to_string()
        } else {
            base
        };
        if self.claimed_slugs.insert(base.clone()) {
            return base;
        }
        let mut n = 2;
        loop {
            let candidate = format!("{}-{}", base, n);
            if self.claimed_slugs.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RecipePatch<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    recipe_yield: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    prep_time: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    perform_time: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    total_time: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    org_url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    date_added: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    created_at: Option<&'a str>,
    recipe_ingredient: Vec<IngredientPayload<'a>>,
    recipe_instructions: Vec<StepPayload<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    notes: Vec<NotePayload<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    recipe_category: Vec<&'a OrganizerRef>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tags: Vec<&'a OrganizerRef>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct IngredientPayload<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<&'a str>,
    note: &'a str,
    /// 目標端要求每列食材帶一個全新的 referenceId
    reference_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StepPayload<'a> {
    id: String,
    title: &'a str,
    summary: &'a str,
    text: &'a str,
    ingredient_references: &'a [String],
}

#[derive(Debug, Serialize)]
struct NotePayload<'a> {
    title: &'a str,
    text: &'a str,
}

/// 把草稿組成 PATCH payload。任何引用名稱不在表裡就讓這筆食譜
/// 以 MissingOrganizer 失敗，其他食譜不受影響
fn build_patch(
    draft: &RecipeDraft,
    final_name: Option<&str>,
    organizers: &OrganizerTable,
) -> std::result::Result<Value, FailureReason> {
    let mut recipe_category = Vec::with_capacity(draft.categories.len());
    for name in &draft.categories {
        match organizers.category(name) {
            Some(reference) => recipe_category.push(reference),
            None => {
                return Err(FailureReason::MissingOrganizer {
                    kind: OrganizerKind::Category,
                    name: name.clone(),
                })
            }
        }
    }

    let mut tags = Vec::with_capacity(draft.tags.len());
    for name in &draft.tags {
        match organizers.tag(name) {
            Some(reference) => tags.push(reference),
            None => {
                return Err(FailureReason::MissingOrganizer {
                    kind: OrganizerKind::Tag,
                    name: name.clone(),
                })
            }
        }
    }

    let patch = RecipePatch {
        name: final_name.unwrap_or(&draft.name),
        description: draft.description.as_deref(),
        recipe_yield: draft.recipe_yield.as_deref(),
        prep_time: draft.prep_time.as_deref(),
        perform_time: draft.perform_time.as_deref(),
        total_time: draft.total_time.as_deref(),
        org_url: draft.org_url.as_deref(),
        date_added: draft.date_added.as_deref(),
        created_at: draft.created_at.as_deref(),
        recipe_ingredient: draft
            .ingredients
            .iter()
            .map(|row| IngredientPayload {
                title: row.title.as_deref(),
                note: &row.note,
                reference_id: Uuid::new_v4().to_string(),
            })
            .collect(),
        recipe_instructions: draft
            .instructions
            .iter()
            .map(|step| StepPayload {
                id: Uuid::new_v4().to_string(),
                title: &step.title,
                summary: &step.summary,
                text: &step.text,
                ingredient_references: &step.ingredient_references,
            })
            .collect(),
        notes: draft
            .notes
            .iter()
            .map(|note| NotePayload {
                title: &note.title,
                text: &note.text,
            })
            .collect(),
        recipe_category,
        tags,
    };

    serde_json::to_value(&patch)
        .map_err(|e| FailureReason::Internal(format!("failed to encode patch payload: {}", e)))
}

fn truncate_body(body: &Value) -> String {
    let text = match body {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    text.chars().take(200).collect()
}
