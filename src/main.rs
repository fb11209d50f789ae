use anyhow::Context;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use photo_inspect::inference::{DirectInspector, GeminiClient, Inspector, ServiceClient};
use photo_inspect::inspection::{InspectionOrchestrator, InspectionReport};
use photo_inspect::sheet::XlsxSheet;
use photo_inspect::{cli, config, scanner, server};
use photo_inspect_common::DEFAULT_SHEET_PROMPT;
use cli::{Cli, Commands};
use config::Config;
use std::path::{Path, PathBuf};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    let config = Config::load()?;

    match cli.command {
        Commands::Inspect { path, sheet, output, service_url, prompt } => {
            println!("📸 photo-inspect - 写真帳点検\n");

            let sheet_name = sheet.unwrap_or_else(|| config.sheet_name.clone());
            let prompt = prompt.unwrap_or_else(|| DEFAULT_SHEET_PROMPT.to_string());

            println!("[1/2] ブックを検索中...");
            let workbooks = scanner::find_workbooks(&path)?;
            println!("✔ {}件のブックを検出\n", workbooks.len());

            if workbooks.is_empty() {
                println!("対象のブックがありません: {}", path.display());
                return Ok(());
            }

            println!("[2/2] 点検中...");
            match service_url.or_else(|| config.service_url.clone()) {
                Some(url) => {
                    println!("- 推論サービス: {}", url);
                    let inspector = ServiceClient::new(&url, config.service_timeout_seconds)?;
                    inspect_workbooks(&inspector, &workbooks, &sheet_name, output.as_deref(), &prompt).await?;
                }
                None => {
                    println!("- モデル: {}", config.model);
                    let inspector = DirectInspector::new(GeminiClient::new(&config)?);
                    inspect_workbooks(&inspector, &workbooks, &sheet_name, output.as_deref(), &prompt).await?;
                }
            }

            println!("\n✅ 点検完了");
        }

        Commands::Serve { bind, echo_raw } => {
            let client = GeminiClient::new(&config)
                .context("推論サービスにはAPIキーが必要です")?;
            let state = server::AppState {
                model: client.model().to_string(),
                inspector: DirectInspector::new(client),
                has_api_key: true,
                echo_raw,
            };
            server::serve(bind, state).await?;
        }

        Commands::Config { set_api_key, model, show } => {
            let mut config = config;

            if let Some(key) = set_api_key {
                config.set_api_key(key)?;
                println!("✔ APIキーを設定しました");
            }

            if let Some(model) = model {
                config.model = model;
                config.save()?;
                println!("✔ モデルを設定しました: {}", config.model);
            }

            if show {
                println!("設定:");
                println!("  モデル: {}", config.model);
                println!("  APIエンドポイント: {}", config.api_base);
                println!("  タイムアウト: {}秒", config.timeout_seconds);
                println!("  推論サービス: {}", config.service_url.as_deref().unwrap_or("未設定"));
                println!("  シート名: {}", config.sheet_name);
                println!("  APIキー: {}", if config.has_api_key() { "設定済み" } else { "未設定" });
            }
        }
    }

    Ok(())
}

async fn inspect_workbooks<I: Inspector>(
    inspector: &I,
    workbooks: &[PathBuf],
    sheet_name: &str,
    output: Option<&Path>,
    prompt: &str,
) -> anyhow::Result<()> {
    let orchestrator = InspectionOrchestrator::new(inspector, prompt);
    // 複数ブックを1つのファイル名に出力しない
    let output = output.filter(|o| workbooks.len() == 1 || o.is_dir() || o.extension().is_none());

    for workbook in workbooks {
        println!("\n- {}", workbook.display());

        let mut sheet = match XlsxSheet::open(workbook, sheet_name) {
            Ok(sheet) => sheet,
            Err(e) => {
                println!("  ✗ 開けません: {}", e);
                continue;
            }
        };

        let total = orchestrator.count_photos(&sheet);
        if total == 0 {
            println!("  画像が見つかりませんでした");
            continue;
        }

        let pb = ProgressBar::new(total as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("  [{bar:30.cyan/blue}] {pos}/{len} {msg}")
                .context("progress template")?
                .progress_chars("█▓░"),
        );

        let report = orchestrator
            .run_with(&mut sheet, |result| {
                pb.set_message(result.shape_name.clone());
                pb.inc(1);
            })
            .await?;
        pb.finish_and_clear();

        print_report(&report);

        let out_path = scanner::output_path_for(workbook, output);
        sheet.save(&out_path)?;
        println!("  ✔ 出力: {}", out_path.display());
    }

    Ok(())
}

fn print_report(report: &InspectionReport) {
    for result in &report.results {
        let marker = if result.is_failure() {
            "✗"
        } else if result.is_abnormal() {
            "⚠"
        } else {
            "✔"
        };
        println!(
            "  {} 行{:>4}{} → {}: {}",
            marker,
            result.anchor_row,
            if result.estimated { "(推定)" } else { "" },
            result.comment.range_ref(),
            result.note
        );
    }
    println!(
        "  {}枚 / 異常 {}枚 / エラー {}枚",
        report.len(),
        report.abnormal(),
        report.failures()
    );
}
