use crate::chapter_file::{chapter_ref, find_chapter_files, read_blocks, write_blocks};
use crate::config::Config;
use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;
use storyloom_editor::{Block, Catalog, ChapterRef, Document, ScanReport, Scanner};
use tracing::warn;

#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Chapter file or directory (defaults to the configured chapters dir)
    pub input: Option<PathBuf>,

    /// Catalog file (defaults to the configured catalog path)
    #[arg(short, long)]
    pub catalog: Option<PathBuf>,

    /// Report what would change without writing; fails if anything would
    #[arg(long)]
    pub check: bool,
}

#[derive(Debug)]
pub struct ScannedChapter {
    pub blocks: Vec<Block>,
    pub report: ScanReport,
    pub references: usize,
    /// Input blocks that could not be loaded or written back
    pub skipped: usize,
}

/// Decorate one chapter's blocks, keeping their places
pub fn scan_chapter(chapter: ChapterRef, blocks: &[Block], scanner: &Scanner) -> ScannedChapter {
    let document = Document::from_blocks(chapter, blocks);
    let mut tree = document.tree().clone();
    let report = scanner.scan(&mut tree);

    let references = tree.paragraphs.iter().map(|p| p.references().count()).sum();
    let scanned: Vec<Block> = tree
        .paragraphs
        .iter()
        .filter_map(|p| match Block::from_paragraph(p, document.place(p.key_id()).cloned()) {
            Ok(block) => Some(block),
            Err(e) => {
                warn!(key_id = %p.key_id(), error = %e, "Cannot serialize paragraph");
                None
            }
        })
        .collect();

    ScannedChapter {
        skipped: blocks.len().saturating_sub(scanned.len()),
        blocks: scanned,
        report,
        references,
    }
}

pub fn scan(args: ScanArgs, cwd: &str) -> Result<()> {
    let config = Config::load(cwd)?;

    let catalog_path = args
        .catalog
        .clone()
        .unwrap_or_else(|| config.get_catalog_path(cwd));
    let catalog_json = std::fs::read_to_string(&catalog_path)
        .with_context(|| format!("cannot read catalog {}", catalog_path.display()))?;
    let catalog = Catalog::from_json(&catalog_json)?;
    let scanner = Scanner::with_options(catalog, config.scanner_options());

    let input = args.input.clone().unwrap_or_else(|| config.get_chapters_dir(cwd));
    let files = find_chapter_files(&input)?;

    println!(
        "{} {} chapter(s) against {} entities",
        "🔎 Scanning".bright_blue().bold(),
        files.len(),
        scanner.catalog().len()
    );

    let mut stale = 0;
    for file in &files {
        let blocks = read_blocks(file)?;
        let scanned = scan_chapter(chapter_ref(&config.story_id, file), &blocks, &scanner);
        let report = scanned.report;

        if !report.changed() {
            println!("  {} {} ({} references)", "✓".green(), file.display(), scanned.references);
            continue;
        }
        stale += 1;

        let summary = format!(
            "+{} decorated, -{} reverted, ~{} refreshed",
            report.decorated, report.reverted, report.refreshed
        );
        if args.check {
            println!("  {} {} {}", "✗".red(), file.display(), summary.dimmed());
        } else if scanned.skipped > 0 {
            println!(
                "  {} {} has {} unreadable block(s), left untouched",
                "⚠️".yellow(),
                file.display(),
                scanned.skipped
            );
        } else {
            write_blocks(file, &scanned.blocks)?;
            println!("  {} {} {}", "✎".cyan(), file.display(), summary.dimmed());
        }
    }

    if args.check && stale > 0 {
        anyhow::bail!("{} chapter(s) have stale decorations", stale);
    }
    println!();
    println!("✨ {}", "Done".green().bold());
    Ok(())
}
