//! Chapter files on disk: one JSON array of blocks per chapter, named
//! `<chapter_id>.json`.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use storyloom_editor::{Block, ChapterRef};

pub fn read_blocks(path: &Path) -> Result<Vec<Block>> {
    let content =
        fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("{} is not a block list", path.display()))
}

pub fn write_blocks(path: &Path, blocks: &[Block]) -> Result<()> {
    let json = serde_json::to_string_pretty(blocks)?;
    fs::write(path, json).with_context(|| format!("cannot write {}", path.display()))
}

/// Chapter id taken from the file stem
pub fn chapter_ref(story_id: &str, path: &Path) -> ChapterRef {
    let chapter_id = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_default();
    ChapterRef::new(story_id, chapter_id)
}

/// A single file, or every `.json` file under a directory, sorted
pub fn find_chapter_files(input: &Path) -> Result<Vec<PathBuf>> {
    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }
    if !input.is_dir() {
        anyhow::bail!("Input path does not exist: {}", input.display());
    }

    let mut files = Vec::new();
    collect(input, &mut files)?;
    files.sort();
    Ok(files)
}

fn collect(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|e| e == "json") {
            files.push(path);
        } else if path.is_dir() {
            collect(&path, files)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use storyloom_editor::{ParagraphNode, Place};

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("storyloom-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(dir.join("part-1")).unwrap();
        dir
    }

    #[test]
    fn test_round_trip_and_discovery() {
        let dir = scratch("chapter-files");
        let block = Block::from_paragraph(
            &ParagraphNode::new("p1").with_text("Hello"),
            Some(Place::sequence(1).remove(0)),
        )
        .unwrap();

        write_blocks(&dir.join("part-1/ch-02.json"), &[block.clone()]).unwrap();
        write_blocks(&dir.join("ch-01.json"), &[]).unwrap();
        fs::write(dir.join("notes.txt"), "ignored").unwrap();

        let files = find_chapter_files(&dir).unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(read_blocks(&dir.join("part-1/ch-02.json")).unwrap(), vec![block]);
        assert_eq!(chapter_ref("s", &files[0]).chapter_id, "ch-01");

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_missing_input() {
        assert!(find_chapter_files(Path::new("/nonexistent/storyloom")).is_err());
    }
}
