//! The `lens analyze` command: run the pipeline on local files.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use clap::Args;
use lens_core::pipeline::{discover, DiscoveredFile};
use lens_core::{
    AnalysisResponse, AnalyzeOptions, Analyzer, Capability, Config, EnrichmentKind,
    ModelRegistry, SummaryStyle,
};

/// Arguments for the `analyze` command.
#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Image file or directory to analyze
    pub path: PathBuf,

    /// Comma-separated capabilities (caption, detection, ocr)
    #[arg(short, long, value_parser = parse_capabilities)]
    pub capabilities: Option<CapabilityList>,

    /// Enrichment to run on the caption (none, search, summary)
    #[arg(short, long)]
    pub enrichment: Option<EnrichmentKind>,

    /// Detection confidence threshold (0.0 - 1.0)
    #[arg(long, value_parser = parse_confidence)]
    pub confidence: Option<f32>,

    /// Summary style (descriptive, technical, creative, concise)
    #[arg(long)]
    pub style: Option<SummaryStyle>,
}

/// Parsed `--capabilities` value.
#[derive(Debug, Clone)]
pub struct CapabilityList(pub Vec<Capability>);

fn parse_capabilities(value: &str) -> Result<CapabilityList, String> {
    Capability::parse_list(value).map(CapabilityList)
}

impl AnalyzeArgs {
    fn options(&self, defaults: AnalyzeOptions) -> AnalyzeOptions {
        let mut options = defaults;
        if let Some(CapabilityList(capabilities)) = &self.capabilities {
            options.capabilities = capabilities.clone();
        }
        if let Some(enrichment) = self.enrichment {
            options.enrichment = enrichment;
        }
        if let Some(style) = self.style {
            options.summary_style = style;
        }
        options.detection_threshold = self.confidence;
        options
    }
}

fn parse_confidence(value: &str) -> Result<f32, String> {
    let v: f32 = value.parse().map_err(|e| format!("{e}"))?;
    if (0.0..=1.0).contains(&v) {
        Ok(v)
    } else {
        Err(format!("must be between 0 and 1, got {v}"))
    }
}

/// Analyze one file or every image under a directory.
///
/// One file prints pretty JSON; several print one JSON object per line.
pub async fn execute(args: AnalyzeArgs, config: Config) -> anyhow::Result<()> {
    if !args.path.exists() {
        anyhow::bail!("Path does not exist: {}", args.path.display());
    }
    let files = discover(&args.path);
    if files.is_empty() {
        anyhow::bail!("No supported images found at {}", args.path.display());
    }

    let load_config = config.clone();
    let models = tokio::task::spawn_blocking(move || ModelRegistry::load(&load_config)).await?;
    let analyzer = Analyzer::new(&config, Arc::new(models));
    let options = args.options(analyzer.default_options());

    if let [file] = files.as_slice() {
        let response = analyze_file(&analyzer, file, &options).await?;
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    let start = Instant::now();
    let progress = create_progress_bar(files.len() as u64);
    let mut failed = 0usize;
    for file in &files {
        progress.set_message(file_name(file));
        match analyze_file(&analyzer, file, &options).await {
            Ok(response) => {
                let line = serde_json::json!({
                    "path": file.path.display().to_string(),
                    "response": response,
                });
                progress.suspend(|| println!("{line}"));
            }
            Err(e) => {
                failed += 1;
                progress.suspend(|| {
                    tracing::warn!("Failed to analyze {}: {e}", file.path.display())
                });
            }
        }
        progress.inc(1);
    }
    progress.finish_with_message("done");

    tracing::info!(
        "Analyzed {} files ({} failed) in {:.1}s",
        files.len(),
        failed,
        start.elapsed().as_secs_f64()
    );
    if failed == files.len() {
        anyhow::bail!("Every file failed to analyze");
    }
    Ok(())
}

async fn analyze_file(
    analyzer: &Analyzer,
    file: &DiscoveredFile,
    options: &AnalyzeOptions,
) -> anyhow::Result<AnalysisResponse> {
    let bytes = tokio::fs::read(&file.path).await?;
    Ok(analyzer.analyze(bytes, file.content_type, options).await?)
}

fn file_name(file: &DiscoveredFile) -> String {
    file.path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn create_progress_bar(total: u64) -> indicatif::ProgressBar {
    use indicatif::{ProgressBar, ProgressStyle};

    let pb = ProgressBar::new(total);
    let style = ProgressStyle::default_bar()
        .template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] \
             {pos}/{len} ({percent}%) {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");
    pb.set_style(style);
    pb.set_message("starting...");
    pb
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: AnalyzeArgs,
    }

    #[test]
    fn test_args_overlay_defaults() {
        let cli = TestCli::try_parse_from([
            "lens",
            "photo.jpg",
            "--capabilities",
            "ocr,caption",
            "--enrichment",
            "summary",
            "--confidence",
            "0.4",
        ])
        .unwrap();
        let options = cli.args.options(AnalyzeOptions::default());
        assert_eq!(options.capabilities, vec![Capability::Ocr, Capability::Caption]);
        assert_eq!(options.enrichment, EnrichmentKind::Summary);
        assert_eq!(options.detection_threshold, Some(0.4));
    }

    #[test]
    fn test_args_reject_bad_values() {
        assert!(TestCli::try_parse_from(["lens", "a.jpg", "--confidence", "2"]).is_err());
        assert!(TestCli::try_parse_from(["lens", "a.jpg", "--capabilities", "faces"]).is_err());
        assert!(TestCli::try_parse_from(["lens", "a.jpg", "--enrichment", "poem"]).is_err());
    }
}
