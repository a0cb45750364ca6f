//! The `lens models` command for managing model files.

use std::path::Path;

use clap::{Args, Subcommand};
use lens_core::models::{manifest, ModelFile};
use lens_core::pipeline::file_hash;
use lens_core::Config;

/// Arguments for the `models` command.
#[derive(Args, Debug)]
pub struct ModelsArgs {
    #[command(subcommand)]
    pub command: ModelsCommand,
}

/// Subcommands for model management.
#[derive(Subcommand, Debug)]
pub enum ModelsCommand {
    /// Download every configured model file that is missing
    Download {
        /// Re-download files that already exist
        #[arg(long)]
        force: bool,
    },

    /// List model files and whether they are installed
    List,

    /// Show model directory path
    Path,
}

/// Execute the models command.
pub async fn execute(args: ModelsArgs, config: Config) -> anyhow::Result<()> {
    match args.command {
        ModelsCommand::Download { force } => {
            let client = reqwest::Client::new();
            let mut skipped = 0usize;
            for file in manifest(&config) {
                if file.path.exists() && !force {
                    tracing::info!("{} already exists at {:?}", file.name, file.path);
                    continue;
                }
                let Some(url) = &file.url else {
                    tracing::warn!(
                        capability = %file.capability,
                        "No source_url configured for {}, place it at {:?} by hand",
                        file.name,
                        file.path
                    );
                    skipped += 1;
                    continue;
                };
                if let Some(parent) = file.path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                tracing::info!("Downloading {} ({})...", file.name, file.capability);
                tracing::info!("  Source: {}", url);
                download_file(&client, url, &file.path, file.blake3.as_deref()).await?;
            }
            if skipped > 0 {
                tracing::warn!("{skipped} file(s) had no download source");
            } else {
                tracing::info!("All downloads complete.");
            }
        }

        ModelsCommand::List => {
            let model_dir = config.model_dir();
            println!("Model files:");
            println!("  Directory: {}\n", model_dir.display());
            for file in manifest(&config) {
                println!(
                    "  - {:10} {:32} {}",
                    file.capability.as_str(),
                    display_path(&file, &model_dir),
                    install_status(&file)
                );
            }
            println!("\nRun `lens models download` to fetch missing files.");
        }

        ModelsCommand::Path => {
            println!("{}", config.model_dir().display());
        }
    }

    Ok(())
}

fn display_path(file: &ModelFile, model_dir: &Path) -> String {
    file.path
        .strip_prefix(model_dir)
        .unwrap_or(&file.path)
        .display()
        .to_string()
}

fn install_status(file: &ModelFile) -> &'static str {
    match (file.path.exists(), file.required) {
        (true, _) => "ready",
        (false, true) => "missing",
        (false, false) => "missing (optional)",
    }
}

/// Stream a file to disk with a progress bar, then verify its checksum.
async fn download_file(
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
    expected_blake3: Option<&str>,
) -> anyhow::Result<()> {
    use futures_util::StreamExt;
    use indicatif::{ProgressBar, ProgressStyle};
    use tokio::io::AsyncWriteExt;

    let response = client
        .get(url)
        .send()
        .await?
        .error_for_status()
        .map_err(|e| anyhow::anyhow!("Download failed: {e}"))?;

    let progress = match response.content_length() {
        Some(total) => {
            let pb = ProgressBar::new(total);
            let style = ProgressStyle::default_bar()
                .template("  [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("##-");
            pb.set_style(style);
            pb
        }
        None => ProgressBar::new_spinner(),
    };

    let mut file = tokio::fs::File::create(dest).await?;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        progress.inc(chunk.len() as u64);
    }
    file.flush().await?;
    progress.finish_and_clear();

    let size = std::fs::metadata(dest)?.len();
    tracing::info!("  Complete ({:.1} MB)", size as f64 / (1024.0 * 1024.0));

    if let Some(expected) = expected_blake3 {
        verify_blake3(dest, expected)?;
    }
    Ok(())
}

/// Verify a downloaded file's BLAKE3 checksum.
///
/// On mismatch, removes the corrupt file so the next run re-downloads.
fn verify_blake3(path: &Path, expected: &str) -> anyhow::Result<()> {
    let actual = file_hash(path)
        .map_err(|e| anyhow::anyhow!("Checksum computation failed for {}: {e}", path.display()))?;

    if !actual.eq_ignore_ascii_case(expected) {
        let _ = std::fs::remove_file(path);
        anyhow::bail!(
            "Checksum mismatch for {}:\n  expected: {}\n  actual:   {}\n\
             Corrupt file removed, try downloading again.",
            path.display(),
            expected,
            actual
        );
    }

    tracing::debug!("  Checksum verified: {}", actual);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_blake3_correct_hash() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ok.onnx");
        std::fs::write(&path, b"hello lens").unwrap();
        let expected = file_hash(&path).unwrap();

        assert!(verify_blake3(&path, &expected).is_ok());
        assert!(path.exists());
    }

    #[test]
    fn verify_blake3_wrong_hash_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.onnx");
        std::fs::write(&path, b"hello lens").unwrap();

        let err = verify_blake3(&path, &"0".repeat(64)).unwrap_err().to_string();
        assert!(err.contains("Checksum mismatch"), "{err}");
        assert!(err.contains("Corrupt file removed"), "{err}");
        assert!(!path.exists());
    }

    #[test]
    fn verify_blake3_missing_file() {
        assert!(verify_blake3(Path::new("/nonexistent/file.onnx"), &"0".repeat(64)).is_err());
    }

    #[test]
    fn test_install_status() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = ModelFile {
            capability: lens_core::Capability::Ocr,
            name: "charset.txt",
            path: dir.path().join("charset.txt"),
            url: None,
            blake3: None,
            required: false,
        };
        assert_eq!(install_status(&file), "missing (optional)");
        file.required = true;
        assert_eq!(install_status(&file), "missing");
        std::fs::write(&file.path, "abc").unwrap();
        assert_eq!(install_status(&file), "ready");
    }
}
