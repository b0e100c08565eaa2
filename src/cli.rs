//! CLI definitions using clap, plus batch manifest loading.
//!
//! The binary is a thin driver around [`crate::pack::Packager`]: the
//! word list, dictionary lookups, and audio downloads all happen
//! upstream; this surface only reads a prepared batch manifest and
//! reports what the engine did with it.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::factory::WordEntry;
use crate::merge::BatchReport;

/// Build and incrementally update flashcard containers.
#[derive(Parser, Debug)]
#[command(name = "wordpack", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output the batch report as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build a new container from a batch manifest
    Create {
        /// JSON manifest: [{"word": .., "definition": .., "audio": <path>}]
        manifest: PathBuf,

        /// Where to write the container
        #[arg(short, long)]
        output: PathBuf,

        /// Deck name the notes target
        #[arg(long, default_value = "Spelling Words", env = "WORDPACK_DECK")]
        deck: String,
    },

    /// Merge a batch manifest into an existing container
    Update {
        /// JSON manifest: [{"word": .., "definition": .., "audio": <path>}]
        manifest: PathBuf,

        /// Existing container to merge into
        #[arg(short, long)]
        container: PathBuf,

        /// Where to write the result (defaults to the container path)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Deck name, used only if the container carries no cards
        #[arg(long, default_value = "Spelling Words", env = "WORDPACK_DECK")]
        deck: String,
    },
}

/// One manifest line: word, definition, and a path to the fetched audio.
#[derive(Debug, Deserialize)]
struct ManifestItem {
    word: String,
    definition: String,
    audio: PathBuf,
}

/// Load a batch manifest and read each referenced audio file.
///
/// # Errors
///
/// Fails if the manifest is not valid JSON or an audio file cannot be
/// read. Per-word content problems are left for the engine to report.
pub fn load_manifest(path: &Path) -> Result<Vec<WordEntry>> {
    let text = fs::read_to_string(path)?;
    let items: Vec<ManifestItem> = serde_json::from_str(&text)?;

    items
        .into_iter()
        .map(|item| {
            let filename = item
                .audio
                .file_name()
                .and_then(|name| name.to_str())
                .ok_or_else(|| Error::Validation {
                    field: "media_filename",
                    reason: format!("'{}' has no usable file name", item.audio.display()),
                })?
                .to_string();
            let bytes = fs::read(&item.audio)?;
            Ok(WordEntry::new(item.word, item.definition, filename, bytes))
        })
        .collect()
}

/// Print a batch report, as text or JSON.
pub fn print_report(report: &BatchReport, container: &Path, json: bool) {
    if json {
        let value = serde_json::json!({
            "container": container.display().to_string(),
            "accepted": report.accepted.len(),
            "skipped_duplicates": report.skipped_duplicates.len(),
            "rejected": report.rejected.len(),
            "report": report,
        });
        println!("{value}");
        return;
    }

    println!(
        "{}: {} accepted, {} skipped duplicates, {} rejected",
        container.display(),
        report.accepted.len(),
        report.skipped_duplicates.len(),
        report.rejected.len(),
    );
    for rejected in &report.rejected {
        println!("  rejected '{}': {}", rejected.word, rejected.reason);
    }
}
