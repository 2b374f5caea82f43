use anyhow::Context;
use clap::Parser;
use job_tracker::adapters::ConfiguredRepository;
use job_tracker::utils::{logger, validation::Validate};
use job_tracker::{
    HttpListingSource, Orchestrator, RetentionManager, RunSummary, TrackerConfig, Worklist,
};
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(name = "job-tracker")]
#[command(about = "Score new job listings, store the unseen ones and retire old ones")]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "job-tracker.toml")]
    config: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON log lines regardless of the config file
    #[arg(long)]
    json_logs: bool,

    /// Show the worklist and rule sets without contacting anything
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = match TrackerConfig::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load config file '{}': {}", args.config, e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };

    if args.json_logs || config.json_logs() {
        logger::init_json_logger(args.verbose);
    } else {
        logger::init_cli_logger(args.verbose);
    }

    tracing::info!("🚀 Starting job-tracker '{}'", config.pipeline.name);

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    let worklist = config.worklist();
    let scorer = config.scoring.build_scorer()?;

    if args.dry_run {
        print_dry_run(&config, &worklist)?;
        return Ok(());
    }

    let source = HttpListingSource::new(config.source.clone())
        .context("building the listing source")?;
    let repository = ConfiguredRepository::from_config(&config.repository)
        .await
        .context("opening the listing repository")?;
    tracing::info!("📦 Using {}", repository.describe());

    let orchestrator = Orchestrator::new(
        source,
        repository,
        scorer,
        RetentionManager::new(config.retention.max_age()),
    );

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("⏹️ Interrupt received, finishing the current step");
            on_signal.cancel();
        }
    });

    match orchestrator.run(&worklist, &cancel).await {
        Ok(summary) => {
            print_summary(&summary);
            Ok(())
        }
        Err(e) => {
            tracing::error!(
                "❌ Run failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());

            std::process::exit(e.severity().exit_code());
        }
    }
}

fn print_dry_run(config: &TrackerConfig, worklist: &Worklist) -> anyhow::Result<()> {
    let (content, locality) = config.scoring.rule_specs()?;

    println!("🔍 Dry run for '{}'", config.pipeline.name);
    println!("Query pairs ({}):", worklist.len());
    for (term, location) in worklist.pairs() {
        println!("  - {} @ {}", term, location);
    }
    println!("Content rules ({}):", content.len());
    for rule in &content {
        println!("  - {:<22} {}", rule.label, rule.pattern);
    }
    println!("Locality rules ({}):", locality.len());
    for rule in &locality {
        println!("  - {:<22} {}", rule.label, rule.pattern);
    }
    println!("Retention: {} day(s)", config.retention.max_age_days);
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    if summary.cancelled {
        println!("⏹️ Run cancelled; work done so far is kept");
    } else {
        println!("✅ Run completed");
    }
    println!(
        "fetched={} scored={} repeated={} new={} inserted={} archived={}/{}",
        summary.fetched,
        summary.scored,
        summary.repeated,
        summary.new,
        summary.inserted,
        summary.archived,
        summary.archive_candidates
    );
    if !summary.skipped.is_empty() {
        println!("Skipped ({}):", summary.skipped_count());
        for item in &summary.skipped {
            println!("  - {}", item);
        }
    }
}
