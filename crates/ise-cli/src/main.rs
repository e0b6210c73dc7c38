//! ISE CLI - Iterative set expansion
//!
//! Usage:
//!   ise "bill gates microsoft" -r 2 -t 0.7 -k 10 --spanbert
//!   ise "sundar pichai google" -r 2 -t 0 -k 5 --gpt3 --json

mod accumulator;
mod driver;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use tracing::info;
use tracing_subscriber::EnvFilter;

use ise_clients::{
    create_completion_client, GoogleSearchClient, HttpPageFetcher, HttpSpanPairModel, HttpTagger,
};
use ise_core::{AppConfig, ConfigError, EntityTagger, LoggingConfig, NerConfig, RelationTable};
use ise_extractor::{Extractor, GazetteerTagger, PromptOptions, RuleSegmenter};

use crate::driver::{Driver, RunParams, RunSummary, StopReason};

#[derive(Parser, Debug)]
#[command(name = "ise")]
#[command(about = "Iterative set expansion: grow a set of relation triples from a seed query")]
#[command(version)]
#[command(group(ArgGroup::new("strategy").required(true).args(["spanbert", "gpt3"])))]
struct Cli {
    /// Seed query, e.g. "bill gates microsoft"
    query: String,

    /// Relation to extract (1 Schools_Attended, 2 Work_For, 3 Live_In, 4 Top_Member_Employees)
    #[arg(short = 'r', value_parser = parse_relation)]
    relation: u8,

    /// Confidence threshold in [0, 1]; ignored by --gpt3
    #[arg(short = 't', value_parser = parse_threshold)]
    threshold: f32,

    /// Number of triples requested
    #[arg(short = 'k', value_parser = parse_count)]
    k: usize,

    /// Classify with the span-pair model
    #[arg(long)]
    spanbert: bool,

    /// Classify with prompted completions
    #[arg(long)]
    gpt3: bool,

    /// TOML configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[arg(long)]
    google_api_key: Option<String>,

    #[arg(long)]
    google_engine_id: Option<String>,

    #[arg(long)]
    openai_api_key: Option<String>,

    /// Upper bound on search iterations
    #[arg(long)]
    max_iterations: Option<usize>,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,
}

fn parse_relation(s: &str) -> Result<u8, String> {
    let value: u8 = s
        .parse()
        .map_err(|_| format!("'{s}' is not a relation number"))?;
    if value == 0 {
        return Err("relation number starts at 1".to_string());
    }
    Ok(value)
}

fn parse_threshold(s: &str) -> Result<f32, String> {
    let value: f32 = s.parse().map_err(|_| format!("'{s}' is not a number"))?;
    if !(0.0..=1.0).contains(&value) {
        return Err("threshold must be between 0 and 1".to_string());
    }
    Ok(value)
}

fn parse_count(s: &str) -> Result<usize, String> {
    let value: usize = s.parse().map_err(|_| format!("'{s}' is not a count"))?;
    if value == 0 {
        return Err("k must be greater than 0".to_string());
    }
    Ok(value)
}

/// Defaults, then the config file, then the environment, then flags
fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::from_file(path.clone())?.with_env_override()?,
        None => AppConfig::from_env()?,
    };

    if let Some(key) = &cli.google_api_key {
        config.search.api_key = Some(key.clone());
    }
    if let Some(id) = &cli.google_engine_id {
        config.search.engine_id = Some(id.clone());
    }
    if let Some(key) = &cli.openai_api_key {
        config.llm.openai_api_key = Some(key.clone());
    }
    if let Some(n) = cli.max_iterations {
        config.extraction.max_iterations = n;
    }
    Ok(config)
}

fn init_tracing(config: &LoggingConfig) {
    let level = &config.level;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "ise={level},ise_core={level},ise_extractor={level},ise_clients={level}"
        ))
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if config.json_format {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn mask(secret: Option<&str>) -> String {
    match secret {
        None => "(not set)".to_string(),
        Some(s) if s.chars().count() <= 8 => "****".to_string(),
        Some(s) => format!("{}****", s.chars().take(4).collect::<String>()),
    }
}

fn print_parameters(cli: &Cli, config: &AppConfig, table: &RelationTable) -> Result<()> {
    let spec = table.spec(cli.relation)?;
    println!("===== Keys =====");
    println!("google_api_key:   {}", mask(config.search.api_key.as_deref()));
    println!("google_engine_id: {}", mask(config.search.engine_id.as_deref()));
    println!("openai_api_key:   {}", mask(config.llm.openai_api_key.as_deref()));
    println!("===== Parameters =====");
    println!("q: {}", cli.query);
    println!("r: {}, {}", cli.relation, spec.name);
    println!("t: {}", cli.threshold);
    println!("k: {}", cli.k);
    println!("strategy: {}", if cli.spanbert { "span-pair" } else { "prompted" });
    println!("======================");
    Ok(())
}

fn print_summary(summary: &RunSummary, k: usize) {
    println!();
    println!(
        "===== ALL RELATIONS for {} ({}) =====",
        summary.relation,
        summary.relations.len()
    );
    for relation in &summary.relations {
        match relation.confidence {
            Some(confidence) => println!(
                "Confidence: {confidence:.4}\t| Subject: {}\t| Object: {}",
                relation.subj, relation.obj
            ),
            None => println!("Subject: {}\t| Object: {}", relation.subj, relation.obj),
        }
    }
    println!("Total # of iterations = {}", summary.iterations.len());

    match summary.stop {
        StopReason::Reached => {}
        StopReason::Stalled => println!(
            "Stopped early: no unused triple left to query ({} of {k} found)",
            summary.relations.len()
        ),
        StopReason::IterationLimit => println!(
            "Stopped at the iteration limit ({} of {k} found)",
            summary.relations.len()
        ),
    }
}

fn build_tagger(config: &NerConfig) -> Result<Arc<dyn EntityTagger>> {
    if config.endpoint.is_some() {
        return Ok(Arc::new(HttpTagger::from_config(config)?));
    }
    if let Some(path) = &config.gazetteer_path {
        let tagger = GazetteerTagger::from_file(path)
            .with_context(|| format!("loading gazetteer {}", path.display()))?;
        info!(terms = tagger.len(), "Gazetteer loaded");
        return Ok(Arc::new(tagger));
    }
    Err(ConfigError::MissingRequired("NER_URL or GAZETTEER_PATH".to_string()).into())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    init_tracing(&config.logging);

    let table = config.relation_table()?;
    if !cli.json {
        print_parameters(&cli, &config, &table)?;
    }

    let search = Arc::new(GoogleSearchClient::from_config(&config.search)?);
    let fetcher = Arc::new(HttpPageFetcher::from_config(&config.extraction)?);
    let tagger = build_tagger(&config.ner)?;

    let extractor = if cli.spanbert {
        let model = HttpSpanPairModel::connect(&config.inference).await?;
        Extractor::span_pair(
            &table,
            cli.relation,
            Box::new(RuleSegmenter::new()),
            tagger,
            Box::new(model),
        )?
    } else {
        let client = create_completion_client(&config.llm)?;
        Extractor::prompted(
            &table,
            cli.relation,
            Box::new(RuleSegmenter::new()),
            tagger,
            client,
            PromptOptions::from(&config.llm),
        )?
    };

    let params = RunParams {
        k: cli.k,
        results_per_query: config.search.results_per_query,
        max_iterations: config.extraction.max_iterations,
    };
    let mut driver = Driver::new(search, fetcher, extractor, params);
    let summary = driver.run(&cli.query, cli.threshold).await?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary, cli.k);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_strategy_is_exclusive_and_required() {
        let base = ["ise", "bill gates microsoft", "-r", "2", "-t", "0.7", "-k", "10"];

        assert!(Cli::try_parse_from(base).is_err());
        assert!(Cli::try_parse_from(base.iter().chain(&["--spanbert", "--gpt3"])).is_err());

        let cli = Cli::try_parse_from(base.iter().chain(&["--gpt3"])).unwrap();
        assert!(cli.gpt3 && !cli.spanbert);
        assert_eq!(cli.relation, 2);
        assert_eq!(cli.k, 10);
    }

    #[test]
    fn test_argument_ranges() {
        assert!(parse_threshold("1.5").is_err());
        assert!(parse_threshold("-0.1").is_err());
        assert_eq!(parse_threshold("0").unwrap(), 0.0);
        assert!(parse_count("0").is_err());
        assert!(parse_relation("0").is_err());
        assert!(parse_relation("x").is_err());
        assert_eq!(parse_relation("4").unwrap(), 4);
    }

    #[test]
    fn test_mask() {
        assert_eq!(mask(None), "(not set)");
        assert_eq!(mask(Some("short")), "****");
        assert_eq!(mask(Some("sk-abcdefghijkl")), "sk-a****");
    }

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::try_parse_from([
            "ise",
            "q",
            "-r",
            "1",
            "-t",
            "0.5",
            "-k",
            "3",
            "--spanbert",
            "--google-engine-id",
            "engine-from-flag",
            "--max-iterations",
            "7",
        ])
        .unwrap();
        let config = load_config(&cli).unwrap();
        assert_eq!(config.search.engine_id.as_deref(), Some("engine-from-flag"));
        assert_eq!(config.extraction.max_iterations, 7);
    }

    #[test]
    fn test_tagger_requires_source() {
        assert!(build_tagger(&NerConfig::default()).is_err());
    }
}
