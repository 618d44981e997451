use clap::Parser;
use mela2mealie::core::mapper::IMPORT_TAG;
use mela2mealie::utils::logger;
use mela2mealie::{CliConfig, MealieClient, MigrationConfig, MigrationEngine, MigrationReport};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    // 初始化日誌
    logger::init_cli_logger(cli.verbose);

    tracing::info!("Starting mela2mealie");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    // 合併設定檔與命令列參數並驗證
    let config = match MigrationConfig::resolve(&cli) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("❌ Configuration validation failed: {}", e);
            eprintln!("❌ {}", e);
            eprintln!("💡 Copy mela2mealie.toml.dist to mela2mealie.toml, or pass --url and --token");
            std::process::exit(2);
        }
    };

    if config.dry_run {
        tracing::info!("🔍 Dry run: nothing will be written to the target");
    }

    // Ctrl-C 只在食譜邊界生效，進行中的那筆會跑完
    let interrupt = Arc::new(AtomicBool::new(false));
    {
        let flag = interrupt.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt requested, finishing the current recipe...");
                flag.store(true, Ordering::Relaxed);
            }
        });
    }

    let client = MealieClient::new(&config.base_url, &config.api_token)
        .with_retry(config.retry_attempts, config.retry_delay);
    let engine = MigrationEngine::new(client, config.clone()).with_interrupt(interrupt);

    match engine.run().await {
        Ok(report) => {
            if cli.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "summary": report.summary(),
                        "recipes": report.entries,
                    }))?
                );
            } else {
                print_report(&report, &config);
            }
            Ok(())
        }
        Err(e) => {
            tracing::error!("❌ Migration aborted: {}", e);
            eprintln!("❌ {}", e);
            std::process::exit(1);
        }
    }
}

fn print_report(report: &MigrationReport, config: &MigrationConfig) {
    println!("\n{}", "═".repeat(50));
    println!("Migration complete:");
    println!("  ✓ {} created", report.created());
    if report.renamed() > 0 {
        println!("  ✎ {} created with a new name", report.renamed());
    }
    if report.skipped() > 0 {
        println!("  ⊘ {} skipped (dry run)", report.skipped());
    }
    if report.failed() > 0 {
        println!("  ✗ {} failed", report.failed());
        for entry in report.entries.iter().filter(|e| e.outcome.is_failed()) {
            println!("      {} — {}", entry.name, entry.outcome.describe());
        }
    }
    if !config.dry_run {
        println!("\nAll imported recipes are tagged '{}'", IMPORT_TAG);
        println!("View them at: {}/g/home?tag={}", config.base_url, IMPORT_TAG);
    }
}
