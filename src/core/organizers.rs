use crate::domain::model::{OrganizerKind, OrganizerRef};
use crate::domain::ports::{ApiResponse, TargetApi};
use crate::utils::error::{MigrateError, Result};
use crate::utils::slug::slugify;
use reqwest::Method;
use serde_json::{json, Value};
use std::collections::HashMap;

/// 名稱 → OrganizerRef 的查表。分類與標籤是獨立命名空間，
/// 同名也不會互相污染。只存活於單次執行，不跨行程快取
#[derive(Debug, Clone, Default)]
pub struct OrganizerTable {
    categories: HashMap<String, OrganizerRef>,
    tags: HashMap<String, OrganizerRef>,
}

impl OrganizerTable {
    pub fn category(&self, name: &str) -> Option<&OrganizerRef> {
        self.categories.get(name)
    }

    pub fn tag(&self, name: &str) -> Option<&OrganizerRef> {
        self.tags.get(name)
    }

    pub fn get(&self, kind: OrganizerKind, name: &str) -> Option<&OrganizerRef> {
        self.map(kind).get(name)
    }

    pub fn insert(&mut self, kind: OrganizerKind, name: String, reference: OrganizerRef) {
        self.map_mut(kind).insert(name, reference);
    }

    pub fn len(&self, kind: OrganizerKind) -> usize {
        self.map(kind).len()
    }

    fn map(&self, kind: OrganizerKind) -> &HashMap<String, OrganizerRef> {
        match kind {
            OrganizerKind::Category => &self.categories,
            OrganizerKind::Tag => &self.tags,
        }
    }

    fn map_mut(&mut self, kind: OrganizerKind) -> &mut HashMap<String, OrganizerRef> {
        match kind {
            OrganizerKind::Category => &mut self.categories,
            OrganizerKind::Tag => &mut self.tags,
        }
    }
}

/// 批次裡每個不同名稱都在任何 patch 引用前解析完畢。
/// 個別名稱失敗只記錄，不中斷其他名稱的解析
pub async fn resolve<A: TargetApi>(
    api: &A,
    category_names: &[String],
    tag_names: &[String],
    dry_run: bool,
) -> Result<OrganizerTable> {
    let mut table = OrganizerTable::default();
    let batches = [
        (OrganizerKind::Category, category_names),
        (OrganizerKind::Tag, tag_names),
    ];

    if dry_run {
        // 模擬模式：本地合成佔位引用，零網路呼叫
        for (kind, names) in batches {
            for name in names {
                if table.get(kind, name).is_none() {
                    let reference = OrganizerRef {
                        id: uuid::Uuid::new_v4().to_string(),
                        name: name.clone(),
                        slug: slugify(name),
                    };
                    table.insert(kind, name.clone(), reference);
                }
            }
        }
        return Ok(table);
    }

    for (kind, names) in batches {
        if names.is_empty() {
            continue;
        }
        tracing::info!("Resolving {} {}(s)...", names.len(), kind);
        for name in names {
            // 同批次內已解析過的名稱不再查詢
            if table.get(kind, name).is_some() {
                continue;
            }
            match fetch_or_create(api, kind, name).await? {
                Some(reference) => table.insert(kind, name.clone(), reference),
                None => tracing::warn!(
                    "⚠ Failed to resolve {} '{}', dependent recipes will fail at patch time",
                    kind,
                    name
                ),
            }
        }
    }

    tracing::info!(
        "✓ {} categories, {} tags ready",
        table.len(OrganizerKind::Category),
        table.len(OrganizerKind::Tag)
    );
    Ok(table)
}

/// 先查後建：目標端可能已有同名 organizer，絕不重複建立。
/// 回傳 None 表示此名稱解析失敗（已記錄），不影響其他名稱
async fn fetch_or_create<A: TargetApi>(
    api: &A,
    kind: OrganizerKind,
    name: &str,
) -> Result<Option<OrganizerRef>> {
    let slug = slugify(name);
    let base = format!("/api/organizers/{}", kind.api_path());
    let by_slug = format!("{}/slug/{}", base, slug);

    let resp = api.invoke(Method::GET, &by_slug, None).await?;
    fail_on_auth(&resp)?;
    if resp.status == 200 {
        return Ok(parse_ref(&resp.body));
    }

    let resp = api
        .invoke(Method::POST, &base, Some(json!({ "name": name })))
        .await?;
    fail_on_auth(&resp)?;
    match resp.status {
        200 | 201 => Ok(parse_ref(&resp.body)),
        409 => {
            // 建立競態：對方剛好先建好了，重查一次
            let resp = api.invoke(Method::GET, &by_slug, None).await?;
            if resp.status == 200 {
                Ok(parse_ref(&resp.body))
            } else {
                Ok(None)
            }
        }
        status => {
            tracing::warn!("⚠ Create {} '{}' returned HTTP {}", kind, name, status);
            Ok(None)
        }
    }
}

/// 解析期間認證被拒是致命錯誤，後續所有寫入都不可能成功
fn fail_on_auth(resp: &ApiResponse) -> Result<()> {
    if resp.status == 401 || resp.status == 403 {
        return Err(MigrateError::TransportError {
            message: format!("authentication rejected by target (HTTP {})", resp.status),
        });
    }
    Ok(())
}

fn parse_ref(body: &Value) -> Option<OrganizerRef> {
    let id = match body.get("id")? {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    Some(OrganizerRef {
        id,
        name: body.get("name")?.as_str()?.to_string(),
        slug: body.get("slug")?.as_str()?.to_string(),
    })
}
