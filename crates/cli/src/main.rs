use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand, ValueEnum};
use owo_colors::OwoColorize;
use tanapaste_core::{
    ConfigLoader, DeliveryGate, Document, ExportOutcome, JsonConfig, PageVariant, PipelineConfig, StrategyRegistry,
    TextConfig, TracingSink, content_from_json, convert_to_text, detect_with_config, fetch_file, fetch_input,
    fetch_stdin, format, paste_from_json, set_event_sink, to_json,
};
use tracing_subscriber::EnvFilter;
use url::Url;

mod delivery;
mod echo;

use delivery::{FileDelivery, StdoutDelivery};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Page URL assumed when a saved snapshot is given without `--url`
const DEFAULT_URL: &str = "https://www.perplexity.ai/search/local";

/// Variant selection for extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum VariantArg {
    /// Detect from the page URL and its markers
    Auto,
    Search,
    Deepresearch,
    Labs,
}

/// Output format for extracted content
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Text,
}

/// Export answer pages as Tana Paste outlines
#[derive(Parser, Debug)]
#[command(name = "tanapaste")]
#[command(author = "TanaPaste Contributors")]
#[command(version)]
#[command(about = "Export answer pages as Tana Paste outlines", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Configuration file (default: <config dir>/tanapaste/config.json)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Citation candidates examined per page (0 = no limit)
    #[arg(long, global = true, value_name = "NUM")]
    scan_limit: Option<usize>,

    /// Maximum number of citations kept
    #[arg(long, global = true, value_name = "NUM")]
    max_citations: Option<usize>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract the query, answer, citations and media from a saved page
    Extract {
        /// Local HTML file, or "-" for stdin
        #[arg(value_name = "INPUT")]
        input: String,

        /// URL the page was captured from
        #[arg(long, value_name = "URL")]
        url: Option<String>,

        /// Page variant (auto detects it)
        #[arg(long, value_enum, default_value_t = VariantArg::Auto)]
        variant: VariantArg,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Json, value_name = "FORMAT")]
        format: OutputFormat,

        /// Output file (default: stdout)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// Format extracted content JSON as an outline
    Format {
        /// Extracted content JSON (default: stdin)
        #[arg(long, value_name = "FILE")]
        input: Option<PathBuf>,

        /// Output file (default: stdout)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// Deliver a paste to a file
    Export {
        /// Paste JSON or raw outline text (default: stdin)
        #[arg(long, value_name = "FILE")]
        input: Option<PathBuf>,

        /// Target file
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },
    /// Extract, format and deliver a saved page
    Run {
        /// Local HTML file, or "-" for stdin
        #[arg(value_name = "INPUT")]
        input: String,

        /// URL the page was captured from
        #[arg(long, value_name = "URL")]
        url: Option<String>,

        /// Target file (default: stdout)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
}

fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tanapaste=debug,tanapaste_core=debug"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
    set_event_sink(Arc::new(TracingSink));
}

fn load_config(cli: &Cli) -> anyhow::Result<PipelineConfig> {
    let loader = match &cli.config {
        Some(path) => ConfigLoader::with_path(path),
        None => ConfigLoader::new(),
    };
    if cli.verbose
        && let Some(path) = loader.path()
    {
        echo::print_field("Config", &path.display().to_string());
    }

    let mut config = loader.load().context("Failed to load configuration")?;
    if let Some(limit) = cli.scan_limit {
        config.extract.citation_scan_limit = (limit > 0).then_some(limit);
    }
    if let Some(max) = cli.max_citations {
        config.extract.max_citations = max;
    }
    Ok(config)
}

fn read_source(input: &str) -> anyhow::Result<String> {
    fetch_input(input).with_context(|| match input {
        "-" => "Failed to read from stdin".to_string(),
        path => format!("Failed to read file: {}", path),
    })
}

fn read_optional(input: Option<&Path>) -> anyhow::Result<String> {
    match input {
        Some(path) => fetch_file(path).with_context(|| format!("Failed to read file: {}", path.display())),
        None => fetch_stdin().context("Failed to read from stdin"),
    }
}

fn write_output(output: Option<&Path>, text: &str) -> anyhow::Result<()> {
    match output {
        Some(path) => {
            fs::write(path, text).with_context(|| format!("Failed to write to file: {}", path.display()))?;
            echo::print_success(&format!("Output written to {}", path.display().bright_white()));
        }
        None => println!("{}", text),
    }
    Ok(())
}

/// Parses a saved page and settles its variant.
fn load_page(
    input: &str, url: Option<&str>, variant: VariantArg, config: &PipelineConfig, verbose: bool,
) -> anyhow::Result<(Document, PageVariant)> {
    if verbose {
        echo::print_step(1, 3, "Reading page snapshot");
    }
    let html = read_source(input)?;
    if verbose {
        echo::print_field("Size", &echo::format_size(html.len()));
    }

    let url = url.unwrap_or(DEFAULT_URL);
    let url = Url::parse(url).with_context(|| format!("Invalid page URL: {}", url))?;
    let doc = Document::parse_with_preprocessing(&html, Some(url)).context("Failed to parse HTML")?;

    let variant = match variant {
        VariantArg::Auto => detect_with_config(&doc, &config.detect).context("Failed to detect page variant")?,
        VariantArg::Search => PageVariant::Search,
        VariantArg::Deepresearch => PageVariant::DeepResearch,
        VariantArg::Labs => PageVariant::Labs,
    };
    if verbose {
        echo::print_step(2, 3, "Detecting page variant");
        echo::print_field("Variant", variant.as_str());
    }

    Ok((doc, variant))
}

fn finish(outcome: ExportOutcome, print_json: bool) -> anyhow::Result<()> {
    if print_json {
        println!("{}", to_json(&outcome, &JsonConfig { pretty: true })?);
    }
    echo::print_outcome(&outcome);
    outcome.into_result().context("Export failed")?;
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        echo::print_banner();
        init_logging();
        echo::print_info("Debug logging enabled");
        eprintln!();
    }

    let config = load_config(&cli)?;
    let verbose = cli.verbose;

    match cli.command {
        Command::Extract { input, url, variant, format: output_format, output } => {
            let (doc, variant) = load_page(&input, url.as_deref(), variant, &config, verbose)?;
            if variant == PageVariant::Unknown {
                bail!("Unsupported page: pass --url or --variant for saved snapshots");
            }

            let registry = StrategyRegistry::with_defaults(&config.extract).context("Invalid extraction markers")?;
            let content = registry.extract(&doc, variant).context("Failed to extract content")?;
            if verbose {
                echo::print_step(3, 3, "Writing output");
                echo::print_extraction_details(&content);
            }

            let text = match output_format {
                OutputFormat::Json => to_json(&content, &JsonConfig { pretty: true })?,
                OutputFormat::Text => convert_to_text(&content, &TextConfig::default()),
            };
            write_output(output.as_deref(), &text)?;
        }
        Command::Format { input, output } => {
            let json = read_optional(input.as_deref())?;
            let content = content_from_json(&json).context("Failed to read extracted content")?;
            let paste = format(&content).context("Failed to format outline")?;

            write_output(output.as_deref(), &paste.content)?;
            if output.is_some() {
                echo::print_paste_details(&paste.metadata);
            }
        }
        Command::Export { input, output } => {
            let raw = read_optional(input.as_deref())?;
            let text = match paste_from_json(&raw) {
                Ok(paste) => paste.content,
                Err(err) => {
                    tracing::debug!(error = %err, "input is not a paste document, exporting it as outline text");
                    raw.trim_end().to_string()
                }
            };

            let gate = DeliveryGate::new(FileDelivery::new(&output), FileDelivery::new(&output));
            tracing::debug!(path = %gate.primary().target().display(), "exporting paste");
            let outcome = gate.deliver_text(&text).await;
            finish(outcome, true)?;
        }
        Command::Run { input, url, output } => {
            let (doc, variant) = load_page(&input, url.as_deref(), VariantArg::Auto, &config, verbose)?;
            let registry = StrategyRegistry::with_defaults(&config.extract).context("Invalid extraction markers")?;
            if verbose {
                echo::print_step(3, 3, "Delivering outline");
            }

            match output {
                Some(path) => {
                    let gate = DeliveryGate::new(FileDelivery::new(&path), FileDelivery::new(&path));
                    let outcome = tanapaste_core::run(&doc, variant, &registry, &gate).await;
                    finish(outcome, true)?;
                }
                None => {
                    let gate = DeliveryGate::primary_only(StdoutDelivery);
                    let outcome = tanapaste_core::run(&doc, variant, &registry, &gate).await;
                    finish(outcome, false)?;
                }
            }
        }
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
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["tanapaste", "extract", "page.html", "--max-citations", "5", "-v"]);
        assert!(cli.verbose);
        assert_eq!(cli.max_citations, Some(5));
        assert!(matches!(cli.command, Command::Extract { variant: VariantArg::Auto, format: OutputFormat::Json, .. }));
    }

    #[test]
    fn test_missing_explicit_config_fails() {
        let cli = Cli::parse_from(["tanapaste", "--scan-limit", "0", "--config", "/nonexistent/tanapaste.json", "format"]);
        assert_eq!(cli.scan_limit, Some(0));
        assert!(load_config(&cli).is_err());
    }

    #[test]
    fn test_variant_values() {
        let cli = Cli::parse_from(["tanapaste", "extract", "-", "--variant", "deepresearch", "-f", "text"]);
        assert!(matches!(
            cli.command,
            Command::Extract { variant: VariantArg::Deepresearch, format: OutputFormat::Text, .. }
        ));
    }
}
