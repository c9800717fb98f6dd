//! `blackout` command line: redact personal data from a PDF.

use anyhow::{bail, Context};
use blackout_classify::OpenAiClassifier;
use blackout_core::{
    build_system_prompt, expected_fields, Category, EntityClassifier, PipelineOptions,
    RedactionPipeline, RunSummary,
};
use blackout_pdf::{PdfDocument, TextBackend};
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

pub mod config;

use config::AppConfig;

pub const NO_CATEGORY_MESSAGE: &str = "Please select at least one redaction option.";
pub const VISUAL_ONLY_NOTICE: &str = "Note: redaction is visual only. The covered text is still \
present in the file and can be copied or extracted.";

const DEFAULT_CATEGORIES: [Category; 3] = [Category::Name, Category::Email, Category::PhoneNumber];

#[derive(Debug, Parser)]
#[command(name = "blackout", version, about = "Black out names, emails, addresses and phone numbers in a PDF")]
pub struct Args {
    /// PDF file to redact
    pub input: Option<PathBuf>,

    /// Category to redact: Name, Email, Address or "Phone Number" (repeatable)
    #[arg(short = 'c', long = "category", value_name = "CATEGORY")]
    pub categories: Vec<String>,

    /// Output path [default: <input dir>/<input stem>_redacted.pdf]
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Write per-page word lists and redact sets to this directory
    #[arg(long, value_name = "DIR")]
    pub diagnostics_dir: Option<PathBuf>,

    /// Number of pages classified concurrently
    #[arg(long, value_name = "N")]
    pub concurrency: Option<usize>,

    /// Text extraction: auto (pdfium when available), pdfium or lopdf
    #[arg(long, value_name = "BACKEND")]
    pub text_backend: Option<TextBackend>,

    /// Chat model used for classification
    #[arg(long)]
    pub model: Option<String>,

    /// Config file [default: $XDG_CONFIG_HOME/blackout/config.json]
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Save the effective settings to PATH (the API key only if it came from the config file)
    #[arg(long, value_name = "PATH")]
    pub write_config: Option<PathBuf>,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

pub fn run() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);
    load_dotenv();
    execute(args)
}

/// Loads `.env` from the working directory or a parent, if there is one.
/// Variables already set in the environment win.
fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => log::debug!("[Config] loaded {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => log::warn!("[Config] ignoring .env: {}", e),
    }
}

fn default_filter(verbose: u8) -> String {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => return "trace".to_string(),
    };
    ["blackout_cli", "blackout_core", "blackout_pdf", "blackout_classify"]
        .iter()
        .fold("warn".to_string(), |acc, target| format!("{acc},{target}={level}"))
}

fn init_logging(verbose: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));
    // log records from the library crates come through tracing-log
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// `<stem>_redacted.pdf` next to the input.
pub fn output_file_name(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    input.with_file_name(format!("{stem}_redacted.pdf"))
}

/// Categories from the command line, else the config file, else the
/// defaults. Blank entries are ignored, so `-c ""` selects nothing.
pub fn resolve_categories(cli: &[String], config: &AppConfig) -> anyhow::Result<Vec<Category>> {
    let raw: Vec<&str> = if !cli.is_empty() {
        cli.iter().map(String::as_str).collect()
    } else if let Some(from_config) = &config.categories {
        from_config.iter().map(String::as_str).collect()
    } else {
        return Ok(DEFAULT_CATEGORIES.to_vec());
    };

    let mut categories = Vec::new();
    for name in raw.into_iter().filter(|n| !n.trim().is_empty()) {
        let category: Category = name.parse()?;
        if !categories.contains(&category) {
            categories.push(category);
        }
    }
    Ok(categories)
}

/// Config file, then environment, then command line flags.
fn effective_config(args: &Args) -> anyhow::Result<(AppConfig, AppConfig)> {
    let from_file = config::load_config(args.config.as_deref())?;
    let mut config = from_file.clone();
    config.apply_env()?;

    if let Some(model) = &args.model {
        config.model = Some(model.clone());
    }
    if let Some(n) = args.concurrency {
        config.concurrency = Some(n.max(1));
    }
    if let Some(dir) = &args.diagnostics_dir {
        config.diagnostics_dir = Some(dir.clone());
    }
    if let Some(backend) = args.text_backend {
        config.text_backend = Some(backend);
    }
    if !args.categories.is_empty() {
        config.categories = Some(args.categories.clone());
    }
    Ok((from_file, config))
}

pub fn execute(args: Args) -> anyhow::Result<()> {
    let (from_file, config) = effective_config(&args)?;

    if let Some(path) = &args.write_config {
        let to_save = AppConfig {
            api_key: from_file.api_key.clone(),
            ..config.clone()
        };
        config::save_config(path, &to_save)?;
        println!("Config written to {}", path.display());
        if args.input.is_none() {
            return Ok(());
        }
    }

    let Some(input) = args.input.as_deref() else {
        bail!("no input PDF given (see --help)");
    };

    let categories = resolve_categories(&args.categories, &config)?;
    if categories.is_empty() {
        bail!(NO_CATEGORY_MESSAGE);
    }

    let classifier = OpenAiClassifier::new(config.classifier_config())?;
    let output = args.output.clone().unwrap_or_else(|| output_file_name(input));
    let options = PipelineOptions {
        diagnostics_dir: config.diagnostics_dir.clone(),
        concurrency: config.concurrency.unwrap_or(1),
        ..PipelineOptions::default()
    };

    let backend = config.text_backend.unwrap_or_default();
    let summary = redact_file(input, &output, &categories, classifier, backend, options)?;
    print!("{summary}");
    println!("Redacted PDF written to {}", output.display());
    println!("{VISUAL_ONLY_NOTICE}");
    Ok(())
}

/// Loads `input`, redacts the selected categories and writes `output`.
pub fn redact_file<C: EntityClassifier>(
    input: &Path,
    output: &Path,
    categories: &[Category],
    classifier: C,
    backend: TextBackend,
    options: PipelineOptions,
) -> anyhow::Result<RunSummary> {
    if categories.is_empty() {
        bail!(NO_CATEGORY_MESSAGE);
    }
    let labels: Vec<&str> = categories.iter().map(Category::label).collect();
    log::info!("[CLI] redacting {} ({})", input.display(), labels.join(", "));

    let instruction = build_system_prompt(categories);
    let options = PipelineOptions {
        expected_fields: Some(
            expected_fields(categories)
                .into_iter()
                .map(String::from)
                .collect(),
        ),
        ..options
    };
    let mut doc = PdfDocument::load_with(input, backend)?;
    let result = RedactionPipeline::with_options(classifier, options).run(&mut doc, &instruction)?;

    std::fs::write(output, &result.pdf)
        .with_context(|| format!("failed to write {}", output.display()))?;
    log::info!("[CLI] wrote {} ({} bytes)", output.display(), result.pdf.len());
    Ok(result.summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use blackout_core::{ClassifyError, EntityRecord};

    struct Unreachable;

    impl EntityClassifier for Unreachable {
        fn classify(&self, _: u32, _: &str, _: &str) -> Result<EntityRecord, ClassifyError> {
            Err(ClassifyError::Transport("not expected in tests".into()))
        }
    }

    fn args(list: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("blackout").chain(list.iter().copied())).unwrap()
    }

    #[test]
    fn output_name_sits_next_to_input() {
        assert_eq!(
            output_file_name(Path::new("/tmp/in/report.v2.pdf")),
            PathBuf::from("/tmp/in/report.v2_redacted.pdf")
        );
        assert_eq!(output_file_name(Path::new("scan.pdf")), PathBuf::from("scan_redacted.pdf"));
    }

    #[test]
    fn parses_repeated_categories() {
        let parsed = args(&["in.pdf", "-c", "Name", "--category", "Phone Number", "-vv"]);
        assert_eq!(parsed.categories, vec!["Name", "Phone Number"]);
        assert_eq!(parsed.verbose, 2);
        assert_eq!(parsed.input, Some(PathBuf::from("in.pdf")));
    }

    #[test]
    fn categories_fall_back_to_config_then_defaults() {
        let empty = AppConfig::default();
        assert_eq!(resolve_categories(&[], &empty).unwrap(), DEFAULT_CATEGORIES.to_vec());

        let config = AppConfig {
            categories: Some(vec!["address".into()]),
            ..AppConfig::default()
        };
        assert_eq!(resolve_categories(&[], &config).unwrap(), vec![Category::Address]);

        let cli = vec!["Email".to_string(), "email".to_string()];
        assert_eq!(resolve_categories(&cli, &config).unwrap(), vec![Category::Email]);
    }

    #[test]
    fn unknown_category_is_rejected() {
        let cli = vec!["Passport".to_string()];
        assert!(resolve_categories(&cli, &AppConfig::default()).is_err());
    }

    #[test]
    fn empty_selection_is_refused_before_reading_input() {
        let config = AppConfig {
            categories: Some(Vec::new()),
            ..AppConfig::default()
        };
        assert!(resolve_categories(&[], &config).unwrap().is_empty());

        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.pdf");
        let err = redact_file(
            &dir.path().join("does-not-exist.pdf"),
            &output,
            &[],
            Unreachable,
            TextBackend::Lopdf,
            PipelineOptions::default(),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), NO_CATEGORY_MESSAGE);
        assert!(!output.exists());
    }

    #[test]
    fn unreadable_input_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.pdf");
        let err = redact_file(
            &dir.path().join("missing.pdf"),
            &output,
            &[Category::Name],
            Unreachable,
            TextBackend::Lopdf,
            PipelineOptions::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("missing.pdf"), "{err}");
        assert!(!output.exists());
    }

    #[test]
    fn text_backend_flag_overrides_config() {
        let parsed = args(&["in.pdf", "--text-backend", "lopdf"]);
        assert_eq!(parsed.text_backend, Some(TextBackend::Lopdf));
        assert!(Args::try_parse_from(["blackout", "in.pdf", "--text-backend", "ocr"]).is_err());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"textBackend": "pdfium"}"#).unwrap();
        let path_arg = path.to_string_lossy().into_owned();

        let (_, config) = effective_config(&args(&["--config", &path_arg])).unwrap();
        assert_eq!(config.text_backend, Some(TextBackend::Pdfium));
        let (_, config) =
            effective_config(&args(&["--config", &path_arg, "--text-backend", "lopdf"])).unwrap();
        assert_eq!(config.text_backend, Some(TextBackend::Lopdf));
    }

    #[test]
    fn dotenv_file_fills_unset_variables() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(
            &path,
            "BLACKOUT_CLI_DOTENV_FRESH=from-file\nBLACKOUT_CLI_DOTENV_SET=from-file\n",
        )
        .unwrap();
        std::env::set_var("BLACKOUT_CLI_DOTENV_SET", "from-env");

        dotenvy::from_path(&path).unwrap();

        assert_eq!(std::env::var("BLACKOUT_CLI_DOTENV_FRESH").unwrap(), "from-file");
        assert_eq!(std::env::var("BLACKOUT_CLI_DOTENV_SET").unwrap(), "from-env");

        // a missing file is the quiet case in load_dotenv
        let err = dotenvy::from_path(dir.path().join("absent.env")).unwrap_err();
        assert!(err.not_found());
    }

    #[test]
    fn default_filter_scopes_to_workspace_crates() {
        assert!(default_filter(0).starts_with("warn,"));
        assert!(default_filter(0).contains("blackout_core=info"));
        assert!(default_filter(1).contains("blackout_pdf=debug"));
        assert_eq!(default_filter(5), "trace");
    }
}
