use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};

use refstyle_core::config_file::{self, ConfigFile};
use refstyle_core::{Analysis, Document, HostRateLimiters, HttpResolver, LinkCheck, PdfBackend};
use refstyle_parsing::{ParsingConfig, ParsingConfigBuilder, ReferenceAnalyzer};
use refstyle_pdf_mupdf::MupdfBackend;
use refstyle_reporting::{ExportFormat, ReportOptions, export_report, render_report};

mod output;

use output::ColorMode;

const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Citation style analyzer - classify and validate the reference lists of academic papers
#[derive(Parser, Debug)]
#[command(name = "refstyle", version, about, long_about = None)]
struct Cli {
    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze the reference list of a PDF or text file
    Analyze {
        /// Path to the PDF or .txt file
        file_path: PathBuf,

        /// Report format: text, markdown or json
        #[arg(long)]
        format: Option<String>,

        /// Write the report to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,

        /// Look up DOIs and URLs over the network
        #[arg(long)]
        verify_links: bool,

        /// Per-request timeout for link lookups, in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Confidence below which an entry's style is reported as Unknown
        #[arg(long)]
        min_confidence: Option<f64>,

        /// Add a Google Scholar search link to every entry
        #[arg(long)]
        scholar_links: bool,
    },

    /// Dry run: show the detected reference section and split entries
    Segment {
        /// Path to the PDF or .txt file
        file_path: PathBuf,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,
    },

    /// Normalize and verify DOIs or URLs
    CheckLinks {
        /// DOIs (10.xxxx/..., doi:...) or URLs
        #[arg(required = true)]
        links: Vec<String>,

        /// Per-request timeout, in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,
    },

    /// Show the config file location or the effective config
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the platform config file path
    Path,
    /// Print the merged configuration as TOML
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Analyze {
            file_path,
            format,
            output,
            no_color,
            verify_links,
            timeout,
            min_confidence,
            scholar_links,
        } => {
            let config = config_file::load_config();
            let settings = Settings::resolve(
                &config,
                SettingsFlags {
                    format,
                    timeout,
                    min_confidence,
                    verify_links,
                },
            )?;
            analyze(
                &file_path,
                &config,
                &settings,
                output,
                no_color,
                scholar_links,
            )
            .await
        }
        Command::Segment {
            file_path,
            no_color,
        } => segment(&file_path, no_color),
        Command::CheckLinks {
            links,
            timeout,
            no_color,
        } => check_links(&links, timeout, no_color).await,
        Command::Config { action } => show_config(action),
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level.as_str()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Flags that override the environment and config file.
struct SettingsFlags {
    format: Option<String>,
    timeout: Option<u64>,
    min_confidence: Option<f64>,
    verify_links: bool,
}

/// Effective settings: CLI flag > env var > config file > default.
#[derive(Debug, Clone, PartialEq)]
struct Settings {
    format: ExportFormat,
    timeout: Duration,
    /// `None` keeps the analyzer's built-in threshold.
    min_confidence: Option<f64>,
    verify_links: bool,
    color: bool,
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    let value = std::env::var(name).ok()?;
    match value.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!("ignoring unparseable {}={:?}", name, value);
            None
        }
    }
}

impl Settings {
    fn resolve(config: &ConfigFile, flags: SettingsFlags) -> anyhow::Result<Self> {
        Self::resolve_with_env(
            config,
            flags,
            env_parse("REFSTYLE_TIMEOUT"),
            env_parse("REFSTYLE_MIN_CONFIDENCE"),
        )
    }

    fn resolve_with_env(
        config: &ConfigFile,
        flags: SettingsFlags,
        env_timeout: Option<u64>,
        env_min_confidence: Option<f64>,
    ) -> anyhow::Result<Self> {
        let format = match flags.format.as_deref().or(config.report_format()) {
            Some(name) => ExportFormat::from_str(name).map_err(anyhow::Error::msg)?,
            None => ExportFormat::default(),
        };

        let timeout_secs = flags
            .timeout
            .or(env_timeout)
            .or(config.timeout_secs())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let min_confidence = flags
            .min_confidence
            .or(env_min_confidence)
            .or(config.min_confidence());
        if let Some(t) = min_confidence
            && !(0.0..=1.0).contains(&t)
        {
            anyhow::bail!("--min-confidence must be between 0 and 1, got {}", t);
        }

        Ok(Self {
            format,
            timeout: Duration::from_secs(timeout_secs.max(1)),
            min_confidence,
            verify_links: flags.verify_links || config.verify_links().unwrap_or(false),
            color: config.color().unwrap_or(true),
        })
    }
}

/// Parsing config from the `[analysis]` section plus a threshold override.
fn parsing_config(
    config: &ConfigFile,
    min_confidence: Option<f64>,
) -> Result<ParsingConfig, regex::Error> {
    let mut builder = ParsingConfigBuilder::new();
    if let Some(t) = min_confidence {
        builder = builder.min_confidence(t);
    }
    if let Some(analysis) = &config.analysis {
        for word in analysis.extra_headers.iter().flatten() {
            builder = builder.add_header_word(word.clone());
        }
        for phrase in analysis.extra_noise_phrases.iter().flatten() {
            builder = builder.add_noise_phrase(phrase.clone());
        }
    }
    builder.build()
}

/// Read a document: `.txt`/`.text` files as plain text (with optional
/// `--- Page N ---` delimiters), anything else as PDF.
fn load_document(file_path: &Path) -> anyhow::Result<Document> {
    if !file_path.exists() {
        anyhow::bail!("File not found: {}", file_path.display());
    }
    let is_text = file_path
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("txt") || e.eq_ignore_ascii_case("text"));

    if is_text {
        let text = std::fs::read_to_string(file_path)
            .with_context(|| format!("Failed to read {}", file_path.display()))?;
        Ok(Document::from_text(&text))
    } else {
        MupdfBackend::new()
            .extract_document(file_path)
            .with_context(|| format!("PDF extraction failed for {}", file_path.display()))
    }
}

fn display_name(file_path: &Path) -> String {
    file_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| file_path.display().to_string())
}

async fn analyze(
    file_path: &Path,
    config: &ConfigFile,
    settings: &Settings,
    output: Option<PathBuf>,
    no_color: bool,
    scholar_links: bool,
) -> anyhow::Result<()> {
    let color = ColorMode(!no_color && output.is_none() && settings.color);

    let parsing = parsing_config(config, settings.min_confidence)
        .context("Invalid [analysis] patterns in config")?;
    let analyzer = ReferenceAnalyzer::with_config(parsing);

    let document = load_document(file_path)?;
    let mut analysis = analyzer
        .analyze(&document)
        .with_context(|| format!("Failed to analyze {}", file_path.display()))?;

    if settings.verify_links {
        let limiters = config.rate_limiters();
        verify_analysis_links(&mut analysis, &limiters, settings.timeout).await?;
    }

    let file_name = display_name(file_path);
    let options = ReportOptions::new(file_name.clone()).with_scholar_links(scholar_links);

    match output {
        Some(path) => {
            export_report(&analysis, &options, settings.format, &path)
                .map_err(anyhow::Error::msg)?;
            eprintln!("Report written to {}", path.display());
        }
        None if settings.format == ExportFormat::Text => {
            let mut writer = std::io::stdout();
            output::print_report(&mut writer, &file_name, &analysis, scholar_links, color)?;
        }
        None => {
            let mut writer = std::io::stdout();
            writer.write_all(render_report(&analysis, &options, settings.format).as_bytes())?;
        }
    }
    Ok(())
}

/// Look up every well-formed link in `analysis`, showing a progress bar.
async fn verify_analysis_links(
    analysis: &mut Analysis,
    limiters: &HostRateLimiters,
    timeout: Duration,
) -> anyhow::Result<()> {
    use indicatif::{ProgressBar, ProgressStyle};

    let total = analysis.links().filter(|l| l.is_well_formed()).count();
    if total == 0 {
        return Ok(());
    }

    let resolver = HttpResolver::new().context("Failed to build HTTP client")?;
    let bar = ProgressBar::new(total as u64);
    bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.cyan} Verifying links [{bar:40.cyan/dim}] {pos}/{len} {wide_msg}",
        )?
        .progress_chars("=> "),
    );
    bar.enable_steady_tick(Duration::from_millis(120));

    for link in analysis.links_mut().filter(|l| l.is_well_formed()) {
        bar.set_message(link.normalized.clone().unwrap_or_default());
        let status = refstyle_core::verify_link(link, &resolver, limiters, timeout).await;
        link.status = status;
        bar.inc(1);
    }
    bar.finish_and_clear();
    Ok(())
}

fn segment(file_path: &Path, no_color: bool) -> anyhow::Result<()> {
    let color = ColorMode(!no_color);
    let config = config_file::load_config();
    let analyzer = ReferenceAnalyzer::with_config(
        parsing_config(&config, None).context("Invalid [analysis] patterns in config")?,
    );

    let document = load_document(file_path)?;
    let mut writer: Box<dyn Write> = Box::new(std::io::stdout());
    let file_name = display_name(file_path);

    let outcome = analyzer.find_references_section(&document);
    let Some(section) = outcome.section() else {
        output::print_no_references(&mut writer, &file_name, color)?;
        return Ok(());
    };
    let split = analyzer.split_references(&section.text);
    output::print_segmentation(&mut writer, &file_name, section, &split, color)?;
    Ok(())
}

async fn check_links(links: &[String], timeout: Option<u64>, no_color: bool) -> anyhow::Result<()> {
    let color = ColorMode(!no_color);
    let config = config_file::load_config();
    let timeout_secs = timeout
        .or(env_parse("REFSTYLE_TIMEOUT"))
        .or(config.timeout_secs())
        .unwrap_or(DEFAULT_TIMEOUT_SECS);
    let timeout = Duration::from_secs(timeout_secs.max(1));

    let resolver = HttpResolver::new().context("Failed to build HTTP client")?;
    let limiters = config.rate_limiters();
    let mut writer: Box<dyn Write> = Box::new(std::io::stdout());

    for raw in links {
        let mut check = LinkCheck::parse(raw);
        check.status = refstyle_core::verify_link(&check, &resolver, &limiters, timeout).await;
        output::print_link_check(&mut writer, &check, color)?;
    }
    Ok(())
}

fn show_config(action: ConfigAction) -> anyhow::Result<()> {
    match action {
        ConfigAction::Path => {
            match config_file::config_path() {
                Some(path) => println!("{}", path.display()),
                None => println!("(no platform config directory)"),
            }
            println!("./.refstyle.toml (overrides the platform file)");
        }
        ConfigAction::Show => {
            let config = config_file::load_config();
            let text =
                toml::to_string_pretty(&config).context("Failed to serialize configuration")?;
            print!("{}", text);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags() -> SettingsFlags {
        SettingsFlags {
            format: None,
            timeout: None,
            min_confidence: None,
            verify_links: false,
        }
    }

    fn config(toml_str: &str) -> ConfigFile {
        toml::from_str(toml_str).unwrap()
    }

    #[test]
    fn defaults_without_any_source() {
        let s = Settings::resolve_with_env(&ConfigFile::default(), flags(), None, None).unwrap();
        assert_eq!(s.format, ExportFormat::Text);
        assert_eq!(s.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert_eq!(s.min_confidence, None);
        assert!(!s.verify_links);
        assert!(s.color);
    }

    #[test]
    fn flag_beats_env_beats_config() {
        let cfg = config(
            "[analysis]\nmin_confidence = 0.5\n\n[network]\ntimeout_secs = 30\n\n[report]\nformat = \"json\"\n",
        );

        let s = Settings::resolve_with_env(&cfg, flags(), None, None).unwrap();
        assert_eq!(s.timeout, Duration::from_secs(30));
        assert_eq!(s.min_confidence, Some(0.5));
        assert_eq!(s.format, ExportFormat::Json);

        let s = Settings::resolve_with_env(&cfg, flags(), Some(7), Some(0.4)).unwrap();
        assert_eq!(s.timeout, Duration::from_secs(7));
        assert_eq!(s.min_confidence, Some(0.4));

        let f = SettingsFlags {
            format: Some("markdown".into()),
            timeout: Some(2),
            min_confidence: Some(0.6),
            verify_links: true,
        };
        let s = Settings::resolve_with_env(&cfg, f, Some(7), Some(0.4)).unwrap();
        assert_eq!(s.timeout, Duration::from_secs(2));
        assert_eq!(s.min_confidence, Some(0.6));
        assert_eq!(s.format, ExportFormat::Markdown);
        assert!(s.verify_links);
    }

    #[test]
    fn bad_format_and_threshold_are_errors() {
        let f = SettingsFlags {
            format: Some("csv".into()),
            ..flags()
        };
        assert!(Settings::resolve_with_env(&ConfigFile::default(), f, None, None).is_err());

        let f = SettingsFlags {
            min_confidence: Some(1.5),
            ..flags()
        };
        assert!(Settings::resolve_with_env(&ConfigFile::default(), f, None, None).is_err());
    }

    #[test]
    fn config_extends_parsing_vocabulary() {
        let cfg = config("[analysis]\nextra_headers = [\"Quellen\"]\n");
        let parsing = parsing_config(&cfg, Some(0.5)).unwrap();
        assert_eq!(parsing.min_confidence(), 0.5);

        let analysis = ReferenceAnalyzer::with_config(parsing)
            .analyze_text(
                "Body text.\nQuellen\n[1] A. Smith, \"Deep Learning Basics,\" IEEE Trans. Neural Netw., vol. 12, pp. 45-60, 2021.",
            )
            .unwrap();
        assert_eq!(analysis.entries.len(), 1);
    }

    #[test]
    fn text_files_load_without_pdf_backend() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("paper.txt");
        std::fs::write(&path, "--- Page 1 ---\nIntro\n--- Page 2 ---\nReferences\n").unwrap();
        let doc = load_document(&path).unwrap();
        assert_eq!(doc.page_count(), 2);
        assert_eq!(display_name(&path), "paper.txt");
    }

    #[test]
    fn missing_file_is_reported() {
        let err = load_document(Path::new("/nonexistent/refstyle.txt")).unwrap_err();
        assert!(err.to_string().contains("File not found"));
    }

    #[test]
    fn cli_parses_analyze_flags() {
        let cli = Cli::try_parse_from([
            "refstyle",
            "-v",
            "analyze",
            "paper.pdf",
            "--format",
            "json",
            "--verify-links",
            "--timeout",
            "3",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Command::Analyze {
                format,
                verify_links,
                timeout,
                ..
            } => {
                assert_eq!(format.as_deref(), Some("json"));
                assert!(verify_links);
                assert_eq!(timeout, Some(3));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn check_links_requires_an_argument() {
        assert!(Cli::try_parse_from(["refstyle", "check-links"]).is_err());
    }
}
