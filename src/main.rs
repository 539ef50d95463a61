use clap::Parser;
use std::time::Duration;
use visa_exhibit_generator::config::cli::{BuildArgs, Command};
use visa_exhibit_generator::core::compress::{format_bytes, verify_ghostscript};
use visa_exhibit_generator::utils::error::{ErrorSeverity, ExhibitError};
use visa_exhibit_generator::utils::{logger, validation::Validate};
use visa_exhibit_generator::{server, AppConfig, CliConfig, PackageService};

fn exit_code(e: &ExhibitError) -> i32 {
    match e.severity() {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    }
}

fn report_failure(context: &str, e: &ExhibitError) -> ! {
    tracing::error!(
        "❌ {} failed: {} (Category: {:?}, Severity: {:?})",
        context,
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());
    // Low 嚴重度視為警告
    std::process::exit(exit_code(e));
}

async fn run_build(service: PackageService, args: &BuildArgs) -> Result<(), ExhibitError> {
    let options = args.package_options(service.config())?;
    service.prepare().await?;

    let report = service.build_from_paths(args.inputs.clone(), options).await?;

    println!("✅ Exhibit package ready ({})", report.visa_type);
    println!("📁 Output: {}", report.output_file.display());
    println!("📁 Manifest: {}", report.manifest_file.display());
    println!(
        "📊 {} exhibits, {} pages, {} -> {} ({:.1}% smaller)",
        report.exhibits.len(),
        report.total_pages,
        format_bytes(report.original_size),
        format_bytes(report.compressed_size),
        report.average_reduction()
    );
    for exhibit in &report.exhibits {
        println!(
            "   Exhibit {}: {} ({} pages)",
            exhibit.label, exhibit.title, exhibit.page_count
        );
    }
    for skipped in &report.skipped {
        println!("⚠️ Skipped {}: {}", skipped.file, skipped.reason);
    }
    if report.partial {
        println!("⚠️ Time limit reached, the package is partial");
    }
    Ok(())
}

async fn run_doctor(config: &AppConfig) -> anyhow::Result<()> {
    let check = verify_ghostscript(&config.processing.ghostscript_bin).await;
    if check.available {
        println!("✅ {}", check.message);
    } else {
        println!("⚠️ {}", check.message);
    }
    println!("{}", serde_json::to_string_pretty(&config.public_summary())?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    let mut config = match AppConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());
            std::process::exit(exit_code(&e).max(1));
        }
    };
    cli.apply_overrides(&mut config);

    logger::init_logger(&config.logging.format, config.logging.verbose);
    if config.logging.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        report_failure("Configuration", &e);
    }

    if cli.monitor {
        tracing::info!("🔍 System monitoring enabled");
    }

    match cli.command.clone().unwrap_or(Command::Serve {
        address: None,
        port: None,
    }) {
        Command::Serve { .. } => {
            tracing::info!("Starting {} v{}", config.app_name, config.app_version);
            let service = PackageService::new(config).with_monitoring(cli.monitor);
            if let Err(e) = server::serve(service).await {
                report_failure("Server", &e);
            }
        }
        Command::Build(args) => {
            let service = PackageService::new(config).with_monitoring(cli.monitor);
            if let Err(e) = run_build(service, &args).await {
                report_failure("Package generation", &e);
            }
        }
        Command::Healthcheck { url, timeout_secs } => {
            if let Err(e) = server::probe_health(&url, Duration::from_secs(timeout_secs)).await {
                eprintln!("❌ Health check failed: {}", e);
                std::process::exit(1);
            }
            println!("ok");
        }
        Command::Doctor => run_doctor(&config).await?,
    }

    Ok(())
}
