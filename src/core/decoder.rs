use crate::domain::model::SourceRecipe;
use crate::utils::error::{MigrateError, Result};
use std::fs::File;
use std::io::{Cursor, Read, Seek};
use std::path::Path;
use zip::ZipArchive;

/// 開啟 Mela 匯出檔並回傳單趟的食譜串流。
/// 重新解碼需要重新呼叫（串流不可重置）。
pub fn decode<P: AsRef<Path>>(path: P) -> Result<RecipeStream> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(MigrateError::FormatError {
            message: format!("file not found: {}", path.display()),
        });
    }

    match path.extension().and_then(|e| e.to_str()) {
        Some("melarecipes") => {
            let archive = ZipArchive::new(File::open(path)?)?;
            Ok(RecipeStream {
                single: None,
                archive: Some(ArchiveEntries {
                    outer: archive,
                    outer_index: 0,
                    inner: None,
                }),
            })
        }
        Some("melarecipe") => {
            let raw = std::fs::read_to_string(path)?;
            let recipe: SourceRecipe = serde_json::from_str(&raw)?;
            Ok(RecipeStream {
                single: Some(recipe),
                archive: None,
            })
        }
        other => Err(MigrateError::FormatError {
            message: format!(
                "unknown file type '{}', expected .melarecipes (bulk export) or .melarecipe (single recipe)",
                other.unwrap_or("")
            ),
        }),
    }
}

/// 惰性的 SourceRecipe 迭代器；影像維持 base64 形式附在記錄上
pub struct RecipeStream {
    single: Option<SourceRecipe>,
    archive: Option<ArchiveEntries>,
}

impl Iterator for RecipeStream {
    type Item = Result<SourceRecipe>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(recipe) = self.single.take() {
            return Some(Ok(recipe));
        }
        self.archive.as_mut()?.next_recipe()
    }
}

struct ArchiveEntries {
    outer: ZipArchive<File>,
    outer_index: usize,
    inner: Option<NestedEntries>,
}

struct NestedEntries {
    archive: ZipArchive<Cursor<Vec<u8>>>,
    index: usize,
}

impl ArchiveEntries {
    fn next_recipe(&mut self) -> Option<Result<SourceRecipe>> {
        loop {
            // 巢狀封存檔的項目先耗盡
            if let Some(nested) = self.inner.as_mut() {
                match nested.next_recipe() {
                    Some(item) => return Some(item),
                    None => self.inner = None,
                }
            }

            if self.outer_index >= self.outer.len() {
                return None;
            }
            let index = self.outer_index;
            self.outer_index += 1;

            let (name, data) = match read_entry(&mut self.outer, index) {
                Ok(entry) => entry,
                Err(e) => return Some(Err(e)),
            };

            if name.ends_with(".melarecipe") {
                return Some(parse_record(&name, &data));
            }
            if name.ends_with(".melarecipes") {
                // Mela 偶爾會把匯出再包一層，只解開一層
                match ZipArchive::new(Cursor::new(data)) {
                    Ok(archive) => self.inner = Some(NestedEntries { archive, index: 0 }),
                    Err(e) => return Some(Err(MigrateError::ZipError(e))),
                }
            }
            // 其他項目（目錄、中繼檔）跳過
        }
    }
}

impl NestedEntries {
    fn next_recipe(&mut self) -> Option<Result<SourceRecipe>> {
        while self.index < self.archive.len() {
            let index = self.index;
            self.index += 1;

            let (name, data) = match read_entry(&mut self.archive, index) {
                Ok(entry) => entry,
                Err(e) => return Some(Err(e)),
            };
            if name.ends_with(".melarecipe") {
                return Some(parse_record(&name, &data));
            }
        }
        None
    }
}

fn read_entry<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    index: usize,
) -> Result<(String, Vec<u8>)> {
    let mut entry = archive.by_index(index)?;
    let name = entry.name().to_string();
    let mut data = Vec::with_capacity(entry.size() as usize);
    entry.read_to_end(&mut data)?;
    Ok((name, data))
}

fn parse_record(name: &str, data: &[u8]) -> Result<SourceRecipe> {
    serde_json::from_slice(data).map_err(|e| MigrateError::FormatError {
        message: format!("invalid JSON in {}: {}", name, e),
    })
}
