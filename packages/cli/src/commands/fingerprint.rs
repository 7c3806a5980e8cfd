use crate::chapter_file::{chapter_ref, read_blocks};
use crate::config::Config;
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;
use storyloom_editor::{fingerprint as chapter_fingerprint, fingerprint_paragraph, Block, ChapterRef, Document};

#[derive(Debug, Args)]
pub struct FingerprintArgs {
    /// Chapter file
    pub input: PathBuf,

    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
pub struct ParagraphFingerprint {
    pub key_id: String,
    pub fingerprint: String,
    pub preview: String,
}

#[derive(Debug, Serialize)]
pub struct ChapterFingerprint {
    pub fingerprint: String,
    pub paragraphs: Vec<ParagraphFingerprint>,
}

pub fn fingerprint_chapter(chapter: ChapterRef, blocks: &[Block]) -> ChapterFingerprint {
    let document = Document::from_blocks(chapter, blocks);
    let tree = document.tree();
    ChapterFingerprint {
        fingerprint: chapter_fingerprint(tree).to_string(),
        paragraphs: tree
            .paragraphs
            .iter()
            .map(|p| ParagraphFingerprint {
                key_id: p.key_id().to_string(),
                fingerprint: fingerprint_paragraph(p).to_string(),
                preview: p.text_content().chars().take(40).collect(),
            })
            .collect(),
    }
}

pub fn fingerprint(args: FingerprintArgs, cwd: &str) -> Result<()> {
    let config = Config::load(cwd)?;
    let blocks = read_blocks(&args.input)?;
    let result = fingerprint_chapter(chapter_ref(&config.story_id, &args.input), &blocks);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!("{} {}", "Chapter".bold(), result.fingerprint.bright_white());
    for paragraph in &result.paragraphs {
        println!(
            "  {:<24} {:<10} {}",
            paragraph.key_id.cyan(),
            paragraph.fingerprint,
            paragraph.preview.dimmed()
        );
    }
    Ok(())
}
