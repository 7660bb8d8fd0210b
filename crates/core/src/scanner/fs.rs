//! Filesystem chapter scanner.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashSet};
use std::io::ErrorKind;
use std::path::Path;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex_lite::Regex;
use tracing::{debug, warn};

use crate::config::ScannerConfig;

use super::{ChapterScanner, LocalChapter, ScanError};

/// `[0012] Something.cbz`
static BRACKET_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\[(\d+)\]").unwrap());

/// `Vol.2 Chapter 12.cbz`, `Ch. 12.cbz`, `ch12.cbz`
static CHAPTER_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:chapter|ch\.?)\s*(\d+)").unwrap());

static FIRST_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)").unwrap());

/// Scans a title directory for chapter archives.
pub struct FsChapterScanner {
    extensions: HashSet<String>,
}

impl FsChapterScanner {
    /// Create a scanner accepting the given extensions (case-insensitive, no dot).
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .map(|e| e.as_ref().trim_start_matches('.').to_lowercase())
                .collect(),
        }
    }

    pub fn from_config(config: &ScannerConfig) -> Self {
        Self::new(&config.extensions)
    }

    fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| self.extensions.contains(&e.to_lowercase()))
            .unwrap_or(false)
    }
}

/// Parse a chapter index from a filename.
///
/// Tried in order: a leading `[N]`, a `Chapter N` / `Ch. N` marker, the
/// first integer anywhere in the name.
pub fn parse_chapter_index(filename: &str) -> Option<u32> {
    let stem = Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(filename);

    [&*BRACKET_PREFIX, &*CHAPTER_WORD, &*FIRST_NUMBER]
        .iter()
        .find_map(|re| re.captures(stem))
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

#[async_trait]
impl ChapterScanner for FsChapterScanner {
    async fn list_local_chapters(&self, dir: &Path) -> Result<Vec<LocalChapter>, ScanError> {
        let io_err = |source| ScanError::Io {
            path: dir.to_path_buf(),
            source,
        };

        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(dir = %dir.display(), "Title directory does not exist yet");
                return Ok(Vec::new());
            }
            Err(e) => return Err(io_err(e)),
        };

        let mut by_index: BTreeMap<u32, String> = BTreeMap::new();

        while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
            let file_type = entry.file_type().await.map_err(io_err)?;
            if !file_type.is_file() {
                continue;
            }

            let path = entry.path();
            if !self.accepts(&path) {
                continue;
            }

            let Some(filename) = path.file_name().and_then(|n| n.to_str()).map(String::from)
            else {
                continue;
            };

            let Some(index) = parse_chapter_index(&filename) else {
                debug!(filename = %filename, "Skipping file without chapter index");
                continue;
            };

            // Directory order is unspecified; keep the lexicographically first name
            match by_index.entry(index) {
                Entry::Vacant(slot) => {
                    slot.insert(filename);
                }
                Entry::Occupied(mut slot) => {
                    warn!(
                        index,
                        kept = %slot.get().min(&filename),
                        "Multiple files share one chapter index"
                    );
                    if filename < *slot.get() {
                        slot.insert(filename);
                    }
                }
            }
        }

        Ok(by_index
            .into_iter()
            .map(|(index, filename)| LocalChapter { index, filename })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn scanner() -> FsChapterScanner {
        FsChapterScanner::from_config(&ScannerConfig::default())
    }

    fn touch(dir: &TempDir, name: &str) {
        std::fs::write(dir.path().join(name), b"x").unwrap();
    }

    #[test]
    fn test_parse_bracket_prefix() {
        assert_eq!(parse_chapter_index("[0012] Alpha - Vol 3.cbz"), Some(12));
    }

    #[test]
    fn test_parse_chapter_word() {
        assert_eq!(parse_chapter_index("Alpha Vol.2 Chapter 15.cbz"), Some(15));
        assert_eq!(parse_chapter_index("Alpha v2 Ch. 7.cbz"), Some(7));
        assert_eq!(parse_chapter_index("alpha ch42.cbz"), Some(42));
    }

    #[test]
    fn test_parse_first_number() {
        assert_eq!(parse_chapter_index("Alpha 003.cbz"), Some(3));
    }

    #[test]
    fn test_parse_no_number() {
        assert_eq!(parse_chapter_index("cover.cbz"), None);
    }

    #[tokio::test]
    async fn test_missing_directory_is_empty() {
        let dir = TempDir::new().unwrap();
        let chapters = scanner()
            .list_local_chapters(&dir.path().join("nope"))
            .await
            .unwrap();
        assert!(chapters.is_empty());
    }

    #[tokio::test]
    async fn test_lists_archives_ordered_by_index() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "[0010] Alpha.cbz");
        touch(&dir, "[0002] Alpha.CBZ");
        touch(&dir, "Alpha Chapter 5.pdf");
        touch(&dir, "notes.txt");
        touch(&dir, "cover.cbz");
        std::fs::create_dir(dir.path().join("[0003] extras.cbz")).unwrap();

        let chapters = scanner().list_local_chapters(dir.path()).await.unwrap();

        assert_eq!(
            chapters,
            vec![
                LocalChapter::new(2, "[0002] Alpha.CBZ"),
                LocalChapter::new(5, "Alpha Chapter 5.pdf"),
                LocalChapter::new(10, "[0010] Alpha.cbz"),
            ]
        );
    }

    #[tokio::test]
    async fn test_duplicate_index_keeps_first_name() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "b [1].cbz");
        touch(&dir, "[1] a.cbz");

        let chapters = scanner().list_local_chapters(dir.path()).await.unwrap();
        assert_eq!(chapters, vec![LocalChapter::new(1, "[1] a.cbz")]);
    }

    #[tokio::test]
    async fn test_custom_extensions() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "1.cbz");
        touch(&dir, "2.mobi");

        let chapters = FsChapterScanner::new([".MOBI"])
            .list_local_chapters(dir.path())
            .await
            .unwrap();
        assert_eq!(chapters, vec![LocalChapter::new(2, "2.mobi")]);
    }
}
