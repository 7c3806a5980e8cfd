use crate::chapter_file::write_blocks;
use crate::config::{Config, DEFAULT_CONFIG_NAME};
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::fs;
use std::path::PathBuf;
use storyloom_editor::{Block, ParagraphNode, Place};

#[derive(Debug, Args)]
pub struct InitArgs {
    /// Story id for the local chapter files
    #[arg(long, default_value = "local")]
    pub story_id: String,

    /// Chapters directory
    #[arg(short, long, default_value = "chapters")]
    pub chapters_dir: String,

    /// Force overwrite existing config
    #[arg(short, long)]
    pub force: bool,
}

const EXAMPLE_CATALOG: &str = r#"[
  {
    "association_id": "1",
    "association_name": "Aria",
    "association_type": "character",
    "short_description": "A courier who never reads the letters",
    "details": { "aliases": "Ari", "case_sensitive": false }
  },
  {
    "association_id": "2",
    "association_name": "Harrow Bridge",
    "association_type": "location",
    "short_description": "The only crossing for forty miles"
  }
]
"#;

pub fn init(args: InitArgs, cwd: &str) -> Result<()> {
    let config_path = PathBuf::from(cwd).join(DEFAULT_CONFIG_NAME);

    if config_path.exists() && !args.force {
        println!(
            "{} {} already exists",
            "⚠️".yellow(),
            DEFAULT_CONFIG_NAME.bright_white()
        );
        println!("Use --force to overwrite");
        return Ok(());
    }

    println!("{}", "📝 Initializing Storyloom project...".bright_blue().bold());

    let config = Config {
        story_id: args.story_id.clone(),
        chapters_dir: args.chapters_dir.clone(),
        ..Config::default()
    };

    let chapters_dir = config.get_chapters_dir(cwd);
    if !chapters_dir.exists() {
        fs::create_dir_all(&chapters_dir)?;
        println!("  {} Created {}/", "✓".green(), args.chapters_dir);
    }

    let example_chapter = chapters_dir.join("chapter-1.json");
    if !example_chapter.exists() {
        let texts = [
            "Aria reached Harrow Bridge an hour after dark.",
            "Ari, the keeper called, you're late again.",
        ];
        let blocks = texts
            .iter()
            .enumerate()
            .zip(Place::sequence(texts.len()))
            .map(|((i, text), place)| {
                Block::from_paragraph(&ParagraphNode::new(format!("{}", i + 1)).with_text(*text), Some(place))
            })
            .collect::<Result<Vec<_>, _>>()?;
        write_blocks(&example_chapter, &blocks)?;
        println!("  {} Created chapter-1.json", "✓".green());
    }

    let catalog_path = config.get_catalog_path(cwd);
    if !catalog_path.exists() {
        fs::write(&catalog_path, EXAMPLE_CATALOG)?;
        println!("  {} Created {}", "✓".green(), config.catalog_path);
    }

    let config_json = serde_json::to_string_pretty(&config)?;
    fs::write(&config_path, config_json)?;

    println!("  {} Created {}", "✓".green(), DEFAULT_CONFIG_NAME);
    println!();
    println!("{}", "✅ Project initialized!".green().bold());
    println!();
    println!("Next steps:");
    println!("  1. Add entities to {}", config.catalog_path);
    println!("  2. Run: storyloom scan");
    println!("  3. Run: storyloom serve");

    Ok(())
}
