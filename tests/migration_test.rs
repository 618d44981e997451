use httpmock::prelude::*;
use httpmock::Method::{PATCH, PUT};
use mela2mealie::domain::model::{
    FailureReason, FailureStage, ImageOutcome, MigrationOutcome, OrganizerKind,
};
use mela2mealie::{MealieClient, MigrateError, MigrationConfig, MigrationEngine};
use serde_json::json;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use zip::write::{FileOptions, ZipWriter};

fn build_export(dir: &TempDir, entries: &[(&str, String)]) -> PathBuf {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in entries {
        zip.start_file::<_, ()>(*name, FileOptions::default())
            .unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    let bytes = zip.finish().unwrap().into_inner();
    let path = dir.path().join("Recipes.melarecipes");
    std::fs::write(&path, bytes).unwrap();
    path
}

fn test_config(export: &Path, server: &MockServer, skip_images: bool) -> MigrationConfig {
    MigrationConfig {
        export_path: export.to_str().unwrap().to_string(),
        base_url: server.url(""),
        api_token: "test-token".to_string(),
        dry_run: false,
        skip_images,
        retry_attempts: 0,
        retry_delay: Duration::ZERO,
    }
}

fn engine_for(
    export: &Path,
    server: &MockServer,
    skip_images: bool,
) -> MigrationEngine<MealieClient, MigrationConfig> {
    let config = test_config(export, server, skip_images);
    let client =
        MealieClient::new(&config.base_url, &config.api_token).with_retry(0, Duration::ZERO);
    MigrationEngine::new(client, config)
}

fn mock_about(server: &MockServer) {
    server.mock(|when, then| {
        when.method(GET).path("/api/app/about");
        then.status(200).json_body(json!({"version": "v1.5.0"}));
    });
}

fn mock_import_tag(server: &MockServer) {
    server.mock(|when, then| {
        when.method(POST)
            .path("/api/organizers/tags")
            .json_body(json!({"name": "mela-import"}));
        then.status(201).json_body(json!({
            "id": "t1", "name": "mela-import", "slug": "mela-import"
        }));
    });
}

fn mock_category(server: &MockServer, name: &str, id: u64, slug: &str) {
    server.mock(|when, then| {
        when.method(POST)
            .path("/api/organizers/categories")
            .json_body(json!({ "name": name }));
        then.status(201)
            .json_body(json!({ "id": id, "name": name, "slug": slug }));
    });
}

fn mock_stub(server: &MockServer, title: &str, slug: &str) {
    server.mock(|when, then| {
        when.method(POST)
            .path("/api/recipes")
            .json_body(json!({ "name": title }));
        then.status(201).json_body(json!(slug));
    });
}

fn mock_patch(server: &MockServer, slug: &str) {
    server.mock(|when, then| {
        when.method(PATCH).path(format!("/api/recipes/{}", slug));
        then.status(200).json_body(json!({}));
    });
}

#[tokio::test]
async fn test_single_failure_never_blocks_siblings() {
    let dir = TempDir::new().unwrap();
    let export = build_export(
        &dir,
        &[
            (
                "Lasagna.melarecipe",
                json!({"title": "Lasagna", "categories": ["Dinner"]}).to_string(),
            ),
            (
                "Broken Soup.melarecipe",
                json!({"title": "Broken Soup", "categories": ["Cursed"]}).to_string(),
            ),
            (
                "Pancakes.melarecipe",
                json!({"title": "Pancakes", "categories": ["Breakfast"]}).to_string(),
            ),
        ],
    );

    let server = MockServer::start();
    mock_about(&server);
    mock_import_tag(&server);
    mock_category(&server, "Dinner", 1, "dinner");
    mock_category(&server, "Breakfast", 2, "breakfast");
    // "Cursed" 建立失敗：這個名稱解析不出來，但不致命
    server.mock(|when, then| {
        when.method(POST)
            .path("/api/organizers/categories")
            .json_body(json!({"name": "Cursed"}));
        then.status(500).body("boom");
    });
    mock_stub(&server, "Lasagna", "lasagna");
    mock_stub(&server, "Broken Soup", "broken-soup");
    mock_stub(&server, "Pancakes", "pancakes");
    mock_patch(&server, "lasagna");
    mock_patch(&server, "pancakes");

    let report = engine_for(&export, &server, true).run().await.unwrap();

    let names: Vec<_> = report.entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["Lasagna", "Broken Soup", "Pancakes"]);

    assert_eq!(
        report.entries[0].outcome,
        MigrationOutcome::Created {
            slug: "lasagna".to_string(),
            image: None,
        }
    );
    assert_eq!(
        report.entries[1].outcome,
        MigrationOutcome::Failed {
            stage: FailureStage::Patch,
            reason: FailureReason::MissingOrganizer {
                kind: OrganizerKind::Category,
                name: "Cursed".to_string(),
            },
        }
    );
    assert_eq!(
        report.entries[2].outcome,
        MigrationOutcome::Created {
            slug: "pancakes".to_string(),
            image: None,
        }
    );

    let summary = report.summary();
    assert_eq!(summary.total, 3);
    assert_eq!(summary.created, 2);
    assert_eq!(summary.failed, 1);
}

#[tokio::test]
async fn test_duplicate_titles_create_both_with_rename() {
    let dir = TempDir::new().unwrap();
    let export = build_export(
        &dir,
        &[
            ("Tacos-1.melarecipe", json!({"title": "Tacos"}).to_string()),
            ("Tacos-2.melarecipe", json!({"title": "Tacos"}).to_string()),
        ],
    );

    let server = MockServer::start();
    mock_about(&server);
    mock_import_tag(&server);
    // 兩筆同名：stub 端點對同一個名字回同一個 slug
    mock_stub(&server, "Tacos", "tacos");
    mock_stub(&server, "Tacos (2)", "tacos-2");
    mock_patch(&server, "tacos");
    mock_patch(&server, "tacos-2");

    let report = engine_for(&export, &server, true).run().await.unwrap();

    assert_eq!(report.entries.len(), 2);
    assert_eq!(
        report.entries[0].outcome,
        MigrationOutcome::Created {
            slug: "tacos".to_string(),
            image: None,
        }
    );
    assert_eq!(
        report.entries[1].outcome,
        MigrationOutcome::CreatedWithRename {
            original_name: "Tacos".to_string(),
            final_name: "Tacos (2)".to_string(),
            slug: "tacos-2".to_string(),
            image: None,
        }
    );
    assert_eq!(report.summary().created, 1);
    assert_eq!(report.summary().renamed, 1);
}

#[tokio::test]
async fn test_image_upload_and_downgrade() {
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine as _;

    let png = {
        let mut bytes = b"\x89PNG\r\n\x1a\n".to_vec();
        bytes.extend_from_slice(b"fake pixels");
        bytes
    };

    let dir = TempDir::new().unwrap();
    let export = build_export(
        &dir,
        &[
            (
                "Lasagna.melarecipe",
                json!({"title": "Lasagna", "images": [BASE64.encode(&png)]}).to_string(),
            ),
            (
                "Pancakes.melarecipe",
                json!({"title": "Pancakes", "images": [BASE64.encode(&png)]}).to_string(),
            ),
        ],
    );

    let server = MockServer::start();
    mock_about(&server);
    mock_import_tag(&server);
    mock_stub(&server, "Lasagna", "lasagna");
    mock_stub(&server, "Pancakes", "pancakes");
    mock_patch(&server, "lasagna");
    mock_patch(&server, "pancakes");
    server.mock(|when, then| {
        when.method(PUT).path("/api/recipes/lasagna/image");
        then.status(200).json_body(json!({}));
    });
    // 第二筆的影像上傳失敗：只降級，不算整筆失敗
    server.mock(|when, then| {
        when.method(PUT).path("/api/recipes/pancakes/image");
        then.status(500).body("disk full");
    });

    let report = engine_for(&export, &server, false).run().await.unwrap();

    assert_eq!(
        report.entries[0].outcome,
        MigrationOutcome::Created {
            slug: "lasagna".to_string(),
            image: Some(ImageOutcome::Uploaded),
        }
    );
    match &report.entries[1].outcome {
        MigrationOutcome::Created {
            slug,
            image: Some(ImageOutcome::Failed(_)),
        } => assert_eq!(slug, "pancakes"),
        other => panic!("expected a downgraded Created outcome, got {:?}", other),
    }
    assert_eq!(report.summary().created, 2);
    assert_eq!(report.summary().failed, 0);
}

#[tokio::test]
async fn test_nested_export_is_unwrapped() {
    let dir = TempDir::new().unwrap();

    // 內層 zip 再包進外層（Mela 偶爾會雙層打包）
    let inner = {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file::<_, ()>("Soup.melarecipe", FileOptions::default())
            .unwrap();
        zip.write_all(json!({"title": "Soup"}).to_string().as_bytes())
            .unwrap();
        zip.finish().unwrap().into_inner()
    };
    let outer = {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file::<_, ()>("batch.melarecipes", FileOptions::default())
            .unwrap();
        zip.write_all(&inner).unwrap();
        zip.finish().unwrap().into_inner()
    };
    let export = dir.path().join("Recipes.melarecipes");
    std::fs::write(&export, outer).unwrap();

    let server = MockServer::start();
    mock_about(&server);
    mock_import_tag(&server);
    mock_stub(&server, "Soup", "soup");
    mock_patch(&server, "soup");

    let report = engine_for(&export, &server, true).run().await.unwrap();

    assert_eq!(report.entries.len(), 1);
    assert_eq!(report.entries[0].name, "Soup");
    assert!(report.entries[0].outcome.is_created());
}

#[tokio::test]
async fn test_empty_export_aborts_before_any_write() {
    let dir = TempDir::new().unwrap();
    let export = build_export(&dir, &[("readme.txt", "not a recipe".to_string())]);

    let server = MockServer::start();
    let any_write = server.mock(|when, then| {
        when.method(POST).path_contains("/api");
        then.status(201);
    });

    let result = engine_for(&export, &server, true).run().await;

    any_write.assert_hits(0);
    assert!(matches!(result, Err(MigrateError::FormatError { .. })));
}

#[tokio::test]
async fn test_unreachable_target_aborts_the_run() {
    let dir = TempDir::new().unwrap();
    let export = build_export(
        &dir,
        &[("Toast.melarecipe", json!({"title": "Toast"}).to_string())],
    );

    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/api/app/about");
        then.status(502).body("bad gateway");
    });
    let any_write = server.mock(|when, then| {
        when.method(POST).path_contains("/api");
        then.status(201);
    });

    let result = engine_for(&export, &server, true).run().await;

    any_write.assert_hits(0);
    assert!(matches!(result, Err(MigrateError::TransportError { .. })));
}
