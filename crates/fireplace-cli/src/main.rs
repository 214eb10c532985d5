use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use fireplace_client::llm::DEFAULT_BASE_URL;
use fireplace_client::{HtmlLinkExtractor, OpenAiGenerator, ReqwestCrawler, insight_generators};
use fireplace_core::prompt::CHECKLIST_SYSTEM_PROMPT;
use fireplace_core::{
    DiscoveryConfig, DiscoveryService, InMemoryPlanStore, InsightService, PlanRecord, RetryPolicy,
};

type Service =
    InsightService<OpenAiGenerator, ReqwestCrawler, HtmlLinkExtractor, InMemoryPlanStore>;

#[derive(Parser)]
#[command(
    name = "fireplace",
    version,
    about = "Task suggestions and learning resources for a plan"
)]
struct Cli {
    #[command(flatten)]
    llm: LlmArgs,

    #[command(flatten)]
    crawl: CrawlArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct LlmArgs {
    /// API key (reads from FIREPLACE_API_KEY env var if not provided)
    #[arg(short, long, env = "FIREPLACE_API_KEY", global = true, hide_env_values = true)]
    api_key: Option<String>,

    /// LLM model to use (e.g., "gpt-4o-mini", "gemini-2.5-flash")
    #[arg(short, long, env = "FIREPLACE_MODEL", default_value = "gpt-4o", global = true)]
    model: String,

    /// OpenAI-compatible API base URL
    #[arg(short, long, env = "FIREPLACE_BASE_URL", default_value = DEFAULT_BASE_URL, global = true)]
    base_url: String,

    /// LLM request timeout in seconds
    #[arg(long, default_value_t = 60, global = true)]
    timeout_secs: u64,
}

#[derive(Args)]
struct CrawlArgs {
    /// Search endpoint; each term is appended to it
    #[arg(
        short,
        long,
        env = "FIREPLACE_SEARCH_URL",
        default_value = "https://www.youtube.com/results?search_query=",
        global = true
    )]
    search_url: String,

    /// Number of search pages crawled at the same time
    #[arg(long, default_value_t = 4, global = true)]
    max_parallel: usize,

    /// Allow crawling private and loopback addresses (local testing only)
    #[arg(long, default_value_t = false, global = true)]
    allow_private: bool,
}

#[derive(Args)]
struct PlanArgs {
    /// Path to the plan JSON file ({"focus": ..., "checklist": [...]})
    #[arg(short, long)]
    plan: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Suggest one next task for the plan
    Suggest(PlanArgs),

    /// Suggest three distinct tasks for today
    Daily(PlanArgs),

    /// Complete a partially typed task
    Autocomplete {
        #[command(flatten)]
        plan: PlanArgs,

        /// The text typed so far
        #[arg(short, long)]
        text: String,
    },

    /// Generate web search terms for the plan's focus
    SearchTerms(PlanArgs),

    /// Discover videos and websites for the plan's focus
    Resources(PlanArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Setup tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("fireplace=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let cancel = CancellationToken::new();
    spawn_ctrl_c(cancel.clone());

    match cli.command {
        Commands::Suggest(args) => {
            let (service, plan_id) = build_service(&cli.llm, &cli.crawl, &args.plan)?;
            let suggestion = service
                .generate_suggestion(&cancel, plan_id)
                .await
                .context("Failed to generate suggestion")?;
            print_json(&serde_json::json!({ "suggestion": suggestion }))?;
        }
        Commands::Daily(args) => {
            let (service, plan_id) = build_service(&cli.llm, &cli.crawl, &args.plan)?;
            let suggestions = service
                .generate_daily_suggestions(&cancel, plan_id)
                .await
                .context("Failed to generate daily suggestions")?;
            print_json(&serde_json::json!({ "suggestions": suggestions }))?;
        }
        Commands::Autocomplete { plan, text } => {
            let (service, plan_id) = build_service(&cli.llm, &cli.crawl, &plan.plan)?;
            let suggestion = service
                .autocomplete_suggestion(&cancel, plan_id, &text)
                .await
                .context("Failed to autocomplete task")?;
            print_json(&serde_json::json!({ "suggestion": suggestion }))?;
        }
        Commands::SearchTerms(args) => {
            let (service, plan_id) = build_service(&cli.llm, &cli.crawl, &args.plan)?;
            let terms = service
                .generate_search_terms(&cancel, plan_id)
                .await
                .context("Failed to generate search terms")?;
            print_json(&serde_json::json!({ "terms": terms }))?;
        }
        Commands::Resources(args) => {
            let (service, plan_id) = build_service(&cli.llm, &cli.crawl, &args.plan)?;
            let report = service
                .generate_suggested_resources(&cancel, plan_id)
                .await
                .context("Failed to discover resources")?;

            if report.is_partial() {
                for failure in &report.failed {
                    tracing::warn!(
                        term = %failure.term,
                        error = %failure.error,
                        "Search term failed"
                    );
                }
            }
            print_json(&report)?;
        }
    }

    Ok(())
}

/// Cancel in-flight work on the first Ctrl-C.
fn spawn_ctrl_c(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling");
            cancel.cancel();
        }
    });
}

/// Load the plan file and wire the insight service around it.
fn build_service(llm: &LlmArgs, crawl: &CrawlArgs, plan_path: &Path) -> Result<(Service, Uuid)> {
    let plan = PlanRecord::from_file(plan_path)
        .with_context(|| format!("Failed to load plan file: {}", plan_path.display()))?;
    let store = InMemoryPlanStore::new();
    let plan_id = store.insert(plan);

    let api_key = llm
        .api_key
        .as_deref()
        .context("API key missing: pass --api-key or set FIREPLACE_API_KEY")?;
    let retry_policy = RetryPolicy::from_env().context("Invalid retry configuration")?;

    let template = OpenAiGenerator::new(api_key, CHECKLIST_SYSTEM_PROMPT)?
        .with_model(llm.model.as_str())
        .with_base_url(&llm.base_url)
        .with_timeout(Duration::from_secs(llm.timeout_secs))?
        .with_retry_policy(retry_policy);

    tracing::info!(
        model = %llm.model,
        max_attempts = retry_policy.max_attempts(),
        "Configured generator"
    );

    let mut crawler = ReqwestCrawler::new(&crawl.search_url).context("Invalid search URL")?;
    if crawl.allow_private {
        crawler = crawler.allow_private_urls()?;
    }
    let config = DiscoveryConfig {
        max_parallel: crawl.max_parallel.max(1),
        ..DiscoveryConfig::default()
    };
    let discovery = DiscoveryService::new(crawler, HtmlLinkExtractor::new()).with_config(config);

    let service = InsightService::new(insight_generators(&template), discovery, store);
    Ok((service, plan_id))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
