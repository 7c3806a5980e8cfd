use crc32fast::Hasher;

use crate::nodes::{ChapterRef, KeyId};

/// Prefix marking ids minted on the client before the first save
pub const PROVISIONAL_PREFIX: &str = "draft-";

/// Generate a chapter seed from its identity using CRC32
pub fn get_chapter_seed(chapter: &ChapterRef) -> String {
    let mut hasher = Hasher::new();
    hasher.update(chapter.story_id.as_bytes());
    hasher.update(b"/");
    hasher.update(chapter.chapter_id.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Sequential key generator for paragraphs created within a chapter.
///
/// The store keeps provisional keys as aliases of the ids it assigned, so a
/// key must never be minted twice, not even by a later open of the same
/// chapter. Each generator therefore appends a random nonce to the chapter
/// seed.
#[derive(Debug, Clone)]
pub struct IdGenerator {
    seed: String,
    count: u64,
}

impl IdGenerator {
    pub fn new(chapter: &ChapterRef) -> Self {
        let nonce: u32 = rand::random();
        Self::from_seed(format!("{}{:08x}", get_chapter_seed(chapter), nonce))
    }

    pub fn from_seed(seed: String) -> Self {
        Self { seed, count: 0 }
    }

    /// Advance past every id this generator could have minted already, so a
    /// reloaded chapter never hands out an existing key again.
    pub fn resume<'a>(mut self, existing: impl IntoIterator<Item = &'a KeyId>) -> Self {
        let prefix = format!("{}{}-", PROVISIONAL_PREFIX, self.seed);
        for key in existing {
            if let Some(n) = key
                .as_str()
                .strip_prefix(&prefix)
                .and_then(|rest| rest.parse::<u64>().ok())
            {
                self.count = self.count.max(n);
            }
        }
        self
    }

    /// Generate next sequential key
    pub fn new_id(&mut self) -> KeyId {
        self.count += 1;
        KeyId::new(format!("{}{}-{}", PROVISIONAL_PREFIX, self.seed, self.count))
    }

    /// Get chapter seed
    pub fn seed(&self) -> &str {
        &self.seed
    }
}
