use anyhow::Context;
use clap::Parser;
use modcar_provision::config::cli::{load_config, memory_provisioner};
use modcar_provision::domain::model::ActorId;
use modcar_provision::domain::ports::InventorySystem;
use modcar_provision::utils::error::ErrorSeverity;
use modcar_provision::utils::{logger, validation::Validate};
use modcar_provision::CliConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    // 初始化日誌
    if cli.json_logs {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting modcar CLI");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    // 驗證參數
    if let Err(e) = cli.validate() {
        tracing::error!("❌ Argument validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e);
        std::process::exit(1);
    }

    let config = load_config(&cli).context("failed to load provisioner config")?;
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e);
        std::process::exit(3);
    }

    let request = cli
        .request(&config)
        .context("failed to build provisioning request")?;
    let mut provisioner = memory_provisioner(&cli, config);

    match provisioner.provision(ActorId(cli.actor), request).await {
        Ok(provisioned) => {
            let sockets = provisioner.world().sockets(provisioned.handle)?;
            tracing::info!("✅ Vehicle {:?} provisioned", provisioned.handle);
            let summary = serde_json::json!({
                "vehicle": provisioned,
                "sockets": sockets,
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Err(e) => {
            tracing::error!(
                "❌ Provisioning failed: {} (Severity: {:?})",
                e,
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("❌ {}", e);
            eprintln!("💡 建議: {}", e.recovery_suggestion());

            // 根據錯誤嚴重程度決定退出碼
            let exit_code = match e.severity() {
                ErrorSeverity::Low => 4,      // 可重試
                ErrorSeverity::Medium => 2,   // 請求被拒絕
                ErrorSeverity::High => 1,     // 處理錯誤
                ErrorSeverity::Critical => 3, // 設定錯誤
            };
            std::process::exit(exit_code);
        }
    }

    Ok(())
}
