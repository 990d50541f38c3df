use cc3m_prep::app::convert::convert_tsv_to_jsonl;
use cc3m_prep::app::dataset::{find_variant, Split};
use cc3m_prep::app::runner::{download_images, inspect_records, translate_captions};
use cc3m_prep::config::cli::{Cli, Command};
use cc3m_prep::utils::error::{ErrorSeverity, PrepError};
use cc3m_prep::utils::{logger, validation::Validate};
use cc3m_prep::RunSummary;
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 初始化日誌
    logger::init_cli_logger(cli.verbose, cli.log_file.as_deref())?;

    tracing::info!("Starting cc3m-prep");
    if cli.monitor {
        tracing::info!("🔍 System monitoring enabled");
    }

    if let Err(e) = run(cli).await {
        // 記錄詳細錯誤信息
        tracing::error!(
            "❌ Run failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 建議: {}", e.recovery_suggestion());

        // 根據錯誤嚴重程度決定退出碼
        let exit_code = match e.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        };
        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }

    Ok(())
}

async fn run(cli: Cli) -> Result<(), PrepError> {
    let config = cli.load_config()?;
    tracing::debug!("Effective config: {:?}", config);

    match &cli.command {
        Command::Convert { input, output } => {
            let count = convert_tsv_to_jsonl(input, output)?;
            println!("✅ Converted {} rows into {}", count, output.display());
        }
        Command::Download(_) => {
            config.download.validate()?;
            let summary = download_images(&config.download, cli.monitor).await?;
            report(&summary);
        }
        Command::Translate(_) => {
            config.translate.validate()?;
            if let Some(upload) = &config.upload {
                upload.validate()?;
            }
            let summary =
                translate_captions(&config.translate, config.upload.as_ref(), cli.monitor).await?;
            report(&summary);
            println!("📁 Output saved to: {}", config.translate.output_path().display());
        }
        Command::Inspect { input, limit } => {
            for record in inspect_records(input, *limit)? {
                println!("{}", serde_json::to_string_pretty(&record)?);
            }
        }
        Command::Dataset {
            variant,
            split,
            data_dir,
            limit,
        } => {
            let variant = find_variant(variant)?;
            let split: Split = split.parse()?;
            for example in variant.examples(data_dir, split)?.take(*limit) {
                println!("{}", serde_json::to_string_pretty(&example?)?);
            }
        }
    }

    Ok(())
}

fn report(summary: &RunSummary) {
    println!("✅ Run completed");
    println!(
        "   read {} | already done {} | completed {} | failed {} | batches {}",
        summary.read, summary.already_processed, summary.completed, summary.failed, summary.batches
    );
    if summary.resumed > 0 {
        println!("   {} partial records resubmitted", summary.resumed);
    }
    if summary.flushes > 0 {
        println!("   {} lines written in {} flushes", summary.written, summary.flushes);
    }
}
