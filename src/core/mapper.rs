use crate::domain::model::{DraftIngredient, DraftNote, DraftStep, RecipeDraft, SourceRecipe};
use regex::Regex;
use std::collections::HashSet;

/// 所有匯入的食譜都掛這個固定標籤，方便在目標端一次找到
pub const IMPORT_TAG: &str = "mela-import";
pub const FAVORITE_TAG: &str = "favorite";
pub const WANT_TO_COOK_TAG: &str = "want-to-cook";

/// NSDate 紀元（2001-01-01 UTC）相對 Unix 紀元的偏移秒數
const NSDATE_UNIX_OFFSET: i64 = 978_307_200;

const FALLBACK_TITLE: &str = "Untitled";

/// 純轉換：Mela 記錄 → Mealie 形狀的草稿。不碰網路，
/// 壞欄位降級成空值，整筆食譜永遠不會被拒絕
pub fn map_recipe(source: &SourceRecipe) -> RecipeDraft {
    let name = source
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(FALLBACK_TITLE)
        .to_string();

    let mut notes = Vec::new();
    if let Some(text) = non_empty(&source.notes) {
        notes.push(DraftNote {
            title: "Notes".to_string(),
            text,
        });
    }
    if let Some(text) = non_empty(&source.nutrition) {
        notes.push(DraftNote {
            title: "Nutrition".to_string(),
            text,
        });
    }

    let mut tags = vec![IMPORT_TAG.to_string()];
    if source.favorite {
        tags.push(FAVORITE_TAG.to_string());
    }
    if source.want_to_cook {
        tags.push(WANT_TO_COOK_TAG.to_string());
    }
    tags.extend(source.tags.iter().filter(|t| !t.trim().is_empty()).cloned());

    let (date_added, created_at) = match source.date.and_then(nsdate_to_dates) {
        Some((added, created)) => (Some(added), Some(created)),
        None => (None, None),
    };

    RecipeDraft {
        name,
        description: non_empty(&source.text),
        recipe_yield: non_empty(&source.recipe_yield),
        prep_time: source.prep_time.as_deref().and_then(parse_time_to_iso),
        perform_time: source.cook_time.as_deref().and_then(parse_time_to_iso),
        total_time: source.total_time.as_deref().and_then(parse_time_to_iso),
        org_url: non_empty(&source.link),
        date_added,
        created_at,
        ingredients: parse_ingredients(source.ingredients.as_deref().unwrap_or_default()),
        instructions: parse_instructions(source.instructions.as_deref().unwrap_or_default()),
        notes,
        categories: dedup_preserving_order(
            source
                .categories
                .iter()
                .filter(|c| !c.trim().is_empty())
                .cloned(),
        ),
        tags: dedup_preserving_order(tags),
    }
}

/// Mela 的時間欄位是自由字串（"30 min"、"1 hour 15 minutes"、"45 Minuten"…）。
/// 能解析的轉成 ISO 8601 期間，解析不了的原樣傳遞，Mealie 也接受自由格式
pub fn parse_time_to_iso(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lower = trimmed.to_lowercase();

    // 已經是 PT 格式
    if lower.starts_with("pt") {
        return Some(lower.to_uppercase());
    }

    let hour_re = Regex::new(r"(\d+)\s*(?:h(?:ours?|r)?|stunden?)").unwrap();
    let minute_re = Regex::new(r"(\d+)\s*(?:m(?:in(?:ute[ns]?)?)?|minuten?)").unwrap();

    let hours: u64 = hour_re
        .captures(&lower)
        .and_then(|c| c[1].parse().ok())
        .unwrap_or(0);
    let mut minutes: u64 = minute_re
        .captures(&lower)
        .and_then(|c| c[1].parse().ok())
        .unwrap_or(0);

    if hours == 0 && minutes == 0 {
        // 純數字視為分鐘
        match lower.parse::<u64>() {
            Ok(bare) if bare > 0 => minutes = bare,
            // 解析不了或為零：原樣傳遞
            _ => return Some(trimmed.to_string()),
        }
    }

    let mut iso = String::from("PT");
    if hours > 0 {
        iso.push_str(&format!("{}H", hours));
    }
    if minutes > 0 {
        iso.push_str(&format!("{}M", minutes));
    }
    Some(iso)
}

/// Mela 以換行分隔食材、`#` 開頭為段落標題。
/// Mealie 的段落標題掛在該段第一列食材的 title 欄位上
pub fn parse_ingredients(raw: &str) -> Vec<DraftIngredient> {
    let mut rows = Vec::new();
    let mut pending_title: Option<String> = None;

    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(header) = line.strip_prefix('#') {
            pending_title = Some(header.trim_start_matches('#').trim().to_string());
        } else {
            rows.push(DraftIngredient {
                title: pending_title.take(),
                note: line.to_string(),
            });
        }
    }

    rows
}

/// 每一行變成一個步驟；`#` 開頭的行變成只有標題的步驟。
/// Mealie 要求 title/summary/text/ingredientReferences 四個欄位都在
pub fn parse_instructions(raw: &str) -> Vec<DraftStep> {
    let mut steps = Vec::new();

    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut step = DraftStep::default();
        if let Some(header) = line.strip_prefix('#') {
            step.title = header.trim_start_matches('#').trim().to_string();
        } else {
            step.text = line.to_string();
        }
        steps.push(step);
    }

    steps
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn nsdate_to_dates(secs: f64) -> Option<(String, String)> {
    let dt = chrono::DateTime::from_timestamp(NSDATE_UNIX_OFFSET + secs as i64, 0)?;
    Some((dt.format("%Y-%m-%d").to_string(), dt.to_rfc3339()))
}

fn dedup_preserving_order<I: IntoIterator<Item = String>>(names: I) -> Vec<String> {
    let mut seen = HashSet::new();
    names.into_iter().filter(|n| seen.insert(n.clone())).collect()
}
