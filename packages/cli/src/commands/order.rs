use crate::chapter_file::{chapter_ref, find_chapter_files, read_blocks, write_blocks};
use crate::config::Config;
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;
use storyloom_editor::{Block, ChapterRef, Document};

#[derive(Debug, Args)]
pub struct OrderArgs {
    /// Chapter file or directory (defaults to the configured chapters dir)
    pub input: Option<PathBuf>,

    /// Renumber even when places are already consistent
    #[arg(short, long)]
    pub force: bool,

    /// Report only; fails if any chapter needs renumbering
    #[arg(long)]
    pub check: bool,
}

/// Renumbered blocks, or `None` when the chapter is already ordered
pub fn reorder_chapter(chapter: ChapterRef, blocks: &[Block], force: bool) -> Option<Vec<Block>> {
    let mut document = Document::from_blocks(chapter, blocks);
    if document.is_ordered() && !force {
        return None;
    }
    document.resequence();
    Some(document.to_blocks())
}

pub fn order(args: OrderArgs, cwd: &str) -> Result<()> {
    let config = Config::load(cwd)?;
    let input = args.input.clone().unwrap_or_else(|| config.get_chapters_dir(cwd));
    let files = find_chapter_files(&input)?;

    let mut unordered = 0;
    for file in &files {
        let blocks = read_blocks(file)?;
        let Some(reordered) = reorder_chapter(chapter_ref(&config.story_id, file), &blocks, args.force) else {
            println!("  {} {}", "✓".green(), file.display());
            continue;
        };
        unordered += 1;

        if args.check {
            println!("  {} {} needs renumbering", "✗".red(), file.display());
        } else if reordered.len() < blocks.len() {
            println!(
                "  {} {} has unreadable blocks, left untouched",
                "⚠️".yellow(),
                file.display()
            );
        } else {
            write_blocks(file, &reordered)?;
            println!("  {} {} ({} places)", "✎".cyan(), file.display(), reordered.len());
        }
    }

    if args.check && unordered > 0 {
        anyhow::bail!("{} chapter(s) need renumbering", unordered);
    }
    Ok(())
}
