//! Filesystem import collaborator.
//!
//! The engine proper never touches the filesystem: it receives text content
//! and media descriptors (§ external interfaces). This module is the
//! built-in collaborator that produces those inputs from an exported folder:
//! it discovers `.txt` sources, scopes each source's media to the files
//! co-located under its directory, derives a conversation title from the
//! file path, and wraps every media file in a lazy, memoizing accessor.
//!
//! A source that cannot be read (missing permissions, not UTF-8) is skipped
//! with a warning; one bad export never aborts the batch.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::error::Result;
use crate::media::{file_basename, ContentAccessor, MediaDescriptor, MediaIndex};
use crate::parser::{ParseSession, ParsedConversation};
use crate::text::clean_invisible_marks;

/// `WhatsApp Chat with NAME` export filename stem.
static CHAT_WITH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^WhatsApp Chat with\s+(.+)$").unwrap());

/// One discovered file, relative to the import root.
#[derive(Debug, Clone)]
struct FileEntry {
    rel_path: String,
    abs_path: PathBuf,
    size: u64,
}

/// Returns `true` for text-export entries.
fn is_text_entry(path: &str) -> bool {
    path.to_lowercase().ends_with(".txt")
}

/// Directory part of a slash-separated relative path; empty at the root.
fn directory_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(pos) => &path[..pos],
        None => "",
    }
}

/// Whether `path` is co-located with a source whose directory is `directory`:
/// at the import root that means no separator at all, otherwise the same
/// directory or anything below it.
fn is_under_directory(path: &str, directory: &str) -> bool {
    if directory.is_empty() {
        return !path.contains('/');
    }
    path == directory || path.starts_with(&format!("{directory}/"))
}

/// Derives a conversation title from an export's relative path.
///
/// Android exports are named `WhatsApp Chat with NAME.txt`; iOS packs name
/// the file `_chat.txt` and put the chat name on the enclosing folder.
///
/// # Example
///
/// ```
/// use chatweave::import::derive_title;
///
/// assert_eq!(derive_title("WhatsApp Chat with Alice.txt"), "Alice");
/// assert_eq!(derive_title("Trip Planning/_chat.txt"), "Trip Planning");
/// assert_eq!(derive_title("notes.txt"), "notes");
/// assert_eq!(derive_title(".txt"), "Untitled Chat");
/// ```
pub fn derive_title(path: &str) -> String {
    let base = file_basename(path);
    let stem = match base.len().checked_sub(4).and_then(|start| base.get(start..)) {
        Some(tail) if tail.eq_ignore_ascii_case(".txt") => &base[..base.len() - 4],
        _ => base.as_str(),
    };
    let cleaned = clean_invisible_marks(stem).trim().to_string();

    if let Some(caps) = CHAT_WITH.captures(&cleaned) {
        return caps[1].trim().to_string();
    }

    if cleaned == "_chat" {
        let directory = directory_of(path);
        if !directory.is_empty() {
            return file_basename(directory);
        }
    }

    if cleaned.is_empty() {
        "Untitled Chat".to_string()
    } else {
        cleaned
    }
}

/// Recursively collects files under `root`, sorted by name at each level so
/// descriptor order — and with it every resolver tie-break — is stable
/// across platforms.
fn collect_files(root: &Path) -> std::io::Result<Vec<FileEntry>> {
    fn walk(dir: &Path, root: &Path, out: &mut Vec<FileEntry>) -> std::io::Result<()> {
        let mut entries: Vec<_> = fs::read_dir(dir)?.collect::<std::io::Result<_>>()?;
        entries.sort_by_key(|entry| entry.file_name());

        for entry in entries {
            let path = entry.path();
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                walk(&path, root, out)?;
            } else if file_type.is_file() {
                let rel_path = path
                    .strip_prefix(root)
                    .unwrap_or(&path)
                    .to_string_lossy()
                    .replace('\\', "/");
                let size = entry.metadata()?.len();
                out.push(FileEntry {
                    rel_path,
                    abs_path: path,
                    size,
                });
            }
        }
        Ok(())
    }

    let mut files = Vec::new();
    walk(root, root, &mut files)?;
    Ok(files)
}

/// Builds a lazy file-backed descriptor for one media entry.
fn media_descriptor(entry: &FileEntry) -> MediaDescriptor {
    let abs_path = entry.abs_path.clone();
    MediaDescriptor::new(
        entry.rel_path.clone(),
        ContentAccessor::new(move || fs::read(&abs_path)),
    )
    .with_size_hint(entry.size)
}

/// Parses one discovered text source together with its co-located media.
fn parse_entry(
    session: &ParseSession,
    text_entry: &FileEntry,
    files: &[FileEntry],
) -> Option<ParsedConversation> {
    let content = match fs::read_to_string(&text_entry.abs_path) {
        Ok(content) => content,
        Err(err) => {
            eprintln!(
                "Warning: skipping unreadable export {}: {}",
                text_entry.abs_path.display(),
                err
            );
            return None;
        }
    };

    let directory = directory_of(&text_entry.rel_path);
    let mut media = MediaIndex::build(
        files
            .iter()
            .filter(|file| {
                !is_text_entry(&file.rel_path) && is_under_directory(&file.rel_path, directory)
            })
            .map(media_descriptor),
    );

    let title = derive_title(&text_entry.rel_path);
    session.parse_source(&content, &title, &mut media)
}

/// Imports every text export found under a directory.
///
/// Returns one [`ParsedConversation`] per parseable source; sources with no
/// recognizable messages are silently omitted, unreadable ones are skipped
/// with a warning.
pub fn import_dir(session: &ParseSession, root: &Path) -> Result<Vec<ParsedConversation>> {
    let files = collect_files(root)?;
    let parsed = files
        .iter()
        .filter(|file| is_text_entry(&file.rel_path))
        .filter_map(|text_entry| parse_entry(session, text_entry, &files))
        .collect();
    Ok(parsed)
}

/// Imports a single text export, scoping media to its parent directory.
pub fn import_file(session: &ParseSession, path: &Path) -> Result<Vec<ParsedConversation>> {
    let root = path.parent().unwrap_or_else(|| Path::new("."));
    let files = collect_files(root)?;

    let target = path.file_name().map(|name| name.to_string_lossy().replace('\\', "/"));
    let parsed = files
        .iter()
        .filter(|file| Some(&file.rel_path) == target.as_ref())
        .filter_map(|text_entry| parse_entry(session, text_entry, &files))
        .collect();
    Ok(parsed)
}

/// Imports a path that may be a directory or a single `.txt` export.
pub fn import_path(session: &ParseSession, path: &Path) -> Result<Vec<ParsedConversation>> {
    if path.is_dir() {
        import_dir(session, path)
    } else {
        import_file(session, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_derive_title_variants() {
        assert_eq!(derive_title("WhatsApp Chat with Alice.txt"), "Alice");
        assert_eq!(derive_title("exports/WhatsApp Chat with Bob.txt"), "Bob");
        assert_eq!(derive_title("whatsapp chat with carol.txt"), "carol");
        assert_eq!(derive_title("Trip Planning/_chat.txt"), "Trip Planning");
        assert_eq!(derive_title("_chat.txt"), "_chat");
        assert_eq!(derive_title("random notes.txt"), "random notes");
        assert_eq!(derive_title(".txt"), "Untitled Chat");
    }

    #[test]
    fn test_is_under_directory() {
        assert!(is_under_directory("a.jpg", ""));
        assert!(!is_under_directory("sub/a.jpg", ""));
        assert!(is_under_directory("sub/a.jpg", "sub"));
        assert!(is_under_directory("sub/deep/a.jpg", "sub"));
        assert!(!is_under_directory("subx/a.jpg", "sub"));
    }

    #[test]
    fn test_import_dir_end_to_end() {
        let dir = tempdir().unwrap();
        let chat_dir = dir.path().join("Holiday");
        fs::create_dir(&chat_dir).unwrap();

        let mut export = File::create(chat_dir.join("_chat.txt")).unwrap();
        writeln!(export, "1/2/2023, 9:00 AM - Alice: Hi").unwrap();
        writeln!(export, "1/2/2023, 9:01 AM - Bob: <attached: beach.jpg>").unwrap();
        fs::write(chat_dir.join("beach.jpg"), [0xFF, 0xD8, 0xFF]).unwrap();

        let session = ParseSession::new();
        let parsed = import_dir(&session, dir.path()).unwrap();

        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].title, "Holiday");
        assert_eq!(parsed[0].messages.len(), 2);

        let attachment = parsed[0].messages[1].attachment.as_ref().unwrap();
        assert!(!attachment.missing);
        assert_eq!(attachment.display_name, "beach.jpg");
        let bytes = attachment.accessor.as_ref().unwrap().resolve().unwrap();
        assert_eq!(bytes.as_slice(), &[0xFF, 0xD8, 0xFF]);
    }

    #[test]
    fn test_media_scoped_to_source_directory() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("ChatA");
        let b = dir.path().join("ChatB");
        fs::create_dir(&a).unwrap();
        fs::create_dir(&b).unwrap();

        fs::write(a.join("_chat.txt"), "1/2/2023, 9:00 AM - X: <attached: pic.jpg>").unwrap();
        // The only pic.jpg lives in the *other* chat's folder.
        fs::write(b.join("pic.jpg"), [1, 2, 3]).unwrap();
        fs::write(b.join("_chat.txt"), "1/2/2023, 9:00 AM - Y: hello").unwrap();

        let session = ParseSession::new();
        let parsed = import_dir(&session, dir.path()).unwrap();
        assert_eq!(parsed.len(), 2);

        let chat_a = parsed.iter().find(|c| c.title == "ChatA").unwrap();
        let attachment = chat_a.messages[0].attachment.as_ref().unwrap();
        assert!(attachment.missing);
    }

    #[test]
    fn test_import_single_file() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("WhatsApp Chat with Alice.txt"),
            "1/2/2023, 9:00 AM - Alice: Hi",
        )
        .unwrap();
        fs::write(dir.path().join("other.txt"), "1/2/2023, 9:00 AM - B: ignored").unwrap();

        let session = ParseSession::new();
        let parsed =
            import_file(&session, &dir.path().join("WhatsApp Chat with Alice.txt")).unwrap();

        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].title, "Alice");
    }

    #[test]
    fn test_unparseable_source_omitted() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("notes.txt"), "no message starts here").unwrap();

        let session = ParseSession::new();
        let parsed = import_dir(&session, dir.path()).unwrap();
        assert!(parsed.is_empty());
    }
}
