//! Knowledge-base scanning.
//!
//! Reads the text files of the knowledge-base directory into [`Document`]s.
//! Files are matched against `include_globs` by their path relative to the
//! directory; only the top level is read unless `recursive` is set.
//!
//! # Failure policy
//!
//! A missing or unreadable directory fails the whole scan with
//! [`RagError::Ingestion`]. A single file that cannot be read or is not
//! valid UTF-8 is skipped with a warning and the scan carries on. Empty
//! files are skipped silently.

use std::path::Path;

use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::{debug, warn};
use walkdir::WalkDir;

use petcare_rag_core::models::Document;
use petcare_rag_core::{RagError, Result};

use crate::config::KnowledgeBaseConfig;

pub fn scan(kb: &KnowledgeBaseConfig) -> Result<Vec<Document>> {
    let root = &kb.directory;
    if !root.is_dir() {
        return Err(RagError::ingestion(
            root,
            "knowledge base directory does not exist",
        ));
    }

    let include_set =
        build_globset(&kb.include_globs).map_err(|e| RagError::ingestion(root, e))?;

    let mut walker = WalkDir::new(root).min_depth(1);
    if !kb.recursive {
        walker = walker.max_depth(1);
    }

    let mut docs = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => return Err(RagError::ingestion(root, e)),
            Err(e) => {
                warn!(error = %e, "skipping unreadable knowledge base entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let source = source_id(relative);
        if !include_set.is_match(&source) {
            continue;
        }

        match read_text(path) {
            Ok(content) if content.trim().is_empty() => {
                debug!(source = %source, "skipping empty file");
            }
            Ok(content) => docs.push(Document::new(source, content)),
            Err(reason) => {
                warn!(path = %path.display(), %reason, "skipping file");
            }
        }
    }

    // Sort for deterministic ordering
    docs.sort_by(|a, b| a.source.cmp(&b.source));
    debug!(directory = %root.display(), documents = docs.len(), "scanned knowledge base");
    Ok(docs)
}

/// Relative path with `/` separators on every platform.
fn source_id(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn read_text(path: &Path) -> std::result::Result<String, String> {
    let bytes = std::fs::read(path).map_err(|e| e.to_string())?;
    String::from_utf8(bytes).map_err(|e| format!("not valid UTF-8: {}", e))
}

fn build_globset(patterns: &[String]) -> std::result::Result<GlobSet, globset::Error> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn kb(dir: &Path, recursive: bool) -> KnowledgeBaseConfig {
        KnowledgeBaseConfig {
            directory: dir.to_path_buf(),
            include_globs: vec!["*.txt".to_string()],
            recursive,
        }
    }

    fn setup() -> TempDir {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::write(root.join("dogs.txt"), "Dogs need daily walks and fresh water.").unwrap();
        fs::write(root.join("birds.txt"), "Birds enjoy seeds and fresh fruit.").unwrap();
        fs::write(root.join("notes.md"), "Not a knowledge base file.").unwrap();
        fs::write(root.join("empty.txt"), "   \n").unwrap();
        fs::write(root.join("broken.txt"), [0xff, 0xfe, 0x00, 0x9f]).unwrap();
        fs::create_dir_all(root.join("reptiles")).unwrap();
        fs::write(root.join("reptiles/turtles.txt"), "Turtles need UV light.").unwrap();
        tmp
    }

    #[test]
    fn test_scan_top_level_txt_only() {
        let tmp = setup();
        let docs = scan(&kb(tmp.path(), false)).unwrap();
        let sources: Vec<&str> = docs.iter().map(|d| d.source.as_str()).collect();
        assert_eq!(sources, vec!["birds.txt", "dogs.txt"]);
        assert_eq!(docs[1].content, "Dogs need daily walks and fresh water.");
    }

    #[test]
    fn test_scan_recursive() {
        let tmp = setup();
        let mut config = kb(tmp.path(), true);
        config.include_globs = vec!["**/*.txt".to_string()];
        let docs = scan(&config).unwrap();
        let sources: Vec<&str> = docs.iter().map(|d| d.source.as_str()).collect();
        assert_eq!(sources, vec!["birds.txt", "dogs.txt", "reptiles/turtles.txt"]);
    }

    #[test]
    fn test_missing_directory_is_ingestion_error() {
        let err = scan(&kb(&PathBuf::from("/definitely/not/here"), false)).unwrap_err();
        assert!(matches!(err, RagError::Ingestion { .. }));
    }

    #[test]
    fn test_invalid_glob_is_ingestion_error() {
        let tmp = setup();
        let mut config = kb(tmp.path(), false);
        config.include_globs = vec!["[".to_string()];
        assert!(matches!(scan(&config), Err(RagError::Ingestion { .. })));
    }
}
