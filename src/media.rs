//! Media descriptors, the per-source media index, and attachment resolution.
//!
//! A source's co-located media files arrive as [`MediaDescriptor`]s: a path,
//! optional size and content-type hints, and an opaque byte loader. The
//! engine never touches bytes during parsing — [`ContentAccessor`] is a
//! memoizing capability handed through to the presentation layer.
//!
//! [`MediaIndex`] is built once per source and is read-only afterwards
//! except for the per-record `used_count`, which the resolver bumps to
//! spread repeated identical filenames (several senders all exporting an
//! `IMG-0001.jpg`) across distinct physical files.

use std::collections::HashMap;
use std::io;
use std::sync::{Arc, LazyLock, Mutex};

use regex::Regex;

use crate::extract::OmittedKind;
use crate::message::MediaKind;
use crate::text::clean_invisible_marks;

/// Characters dropped when computing the normalized filename key.
static NON_KEY_CHARS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w.\-]+").unwrap());

/// Immutable byte payload produced by a content accessor.
pub type MediaBytes = Arc<Vec<u8>>;

type Loader = Box<dyn Fn() -> io::Result<Vec<u8>> + Send + Sync>;

struct AccessorInner {
    loader: Loader,
    cache: Mutex<Option<MediaBytes>>,
}

/// Memoizing capability that resolves a media descriptor to its bytes.
///
/// The first successful [`resolve`](Self::resolve) invokes the underlying
/// loader; later calls return the cached bytes without re-invoking it. A
/// failed load is not cached, so a transient error can be retried.
///
/// # Example
///
/// ```
/// use chatweave::media::ContentAccessor;
///
/// let accessor = ContentAccessor::from_bytes(vec![1, 2, 3]);
/// let first = accessor.resolve().unwrap();
/// let second = accessor.resolve().unwrap();
/// assert_eq!(first, second);
/// ```
#[derive(Clone)]
pub struct ContentAccessor {
    inner: Arc<AccessorInner>,
}

impl ContentAccessor {
    /// Creates an accessor around an idempotent byte loader.
    pub fn new(loader: impl Fn() -> io::Result<Vec<u8>> + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(AccessorInner {
                loader: Box::new(loader),
                cache: Mutex::new(None),
            }),
        }
    }

    /// Creates an accessor over bytes already in memory.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let bytes: MediaBytes = Arc::new(bytes);
        Self {
            inner: Arc::new(AccessorInner {
                loader: Box::new(move || Ok((*bytes).clone())),
                cache: Mutex::new(None),
            }),
        }
    }

    /// Resolves to a stable byte handle, loading at most once on success.
    pub fn resolve(&self) -> io::Result<MediaBytes> {
        let mut cache = self.inner.cache.lock().expect("accessor cache poisoned");
        if let Some(bytes) = cache.as_ref() {
            return Ok(bytes.clone());
        }
        let bytes: MediaBytes = Arc::new((self.inner.loader)()?);
        *cache = Some(bytes.clone());
        Ok(bytes)
    }
}

impl std::fmt::Debug for ContentAccessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cached = self
            .inner
            .cache
            .lock()
            .map(|cache| cache.is_some())
            .unwrap_or(false);
        f.debug_struct("ContentAccessor").field("cached", &cached).finish()
    }
}

/// One media file co-located with a text source.
///
/// # Example
///
/// ```
/// use chatweave::media::{ContentAccessor, MediaDescriptor};
///
/// let descriptor = MediaDescriptor::new(
///     "exports/IMG-0001.jpg",
///     ContentAccessor::from_bytes(vec![0xFF, 0xD8]),
/// )
/// .with_declared_content_type("image/jpeg");
/// ```
#[derive(Debug, Clone)]
pub struct MediaDescriptor {
    /// Path of the file, relative to its import root
    pub path: String,
    /// Size in bytes, when the collaborator knows it cheaply
    pub size_hint: Option<u64>,
    /// Content type declared by the collaborator, preferred over guessing
    pub declared_content_type: Option<String>,
    /// Capability to load the bytes
    pub accessor: ContentAccessor,
}

impl MediaDescriptor {
    /// Creates a descriptor from a path and a content accessor.
    pub fn new(path: impl Into<String>, accessor: ContentAccessor) -> Self {
        Self {
            path: path.into(),
            size_hint: None,
            declared_content_type: None,
            accessor,
        }
    }

    /// Sets the size hint.
    #[must_use]
    pub fn with_size_hint(mut self, size: u64) -> Self {
        self.size_hint = Some(size);
        self
    }

    /// Sets the declared content type.
    #[must_use]
    pub fn with_declared_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.declared_content_type = Some(content_type.into());
        self
    }
}

/// Final path component, with backslash separators tolerated.
pub fn file_basename(path: &str) -> String {
    let normalized = path.replace('\\', "/");
    match normalized.rfind('/') {
        Some(pos) => normalized[pos + 1..].to_string(),
        None => normalized,
    }
}

/// Lowercased extension of the basename; empty when there is none.
fn file_extension(file_name: &str) -> String {
    let base = file_basename(file_name);
    match base.rfind('.') {
        Some(pos) if pos + 1 < base.len() => base[pos + 1..].to_lowercase(),
        _ => String::new(),
    }
}

/// Reduces a filename to its fuzzy-match key: basename, invisible marks
/// stripped, everything but word/dot/hyphen characters removed, lowercased.
pub fn normalize_file_key(file_name: &str) -> String {
    let base = clean_invisible_marks(&file_basename(file_name));
    NON_KEY_CHARS.replace_all(&base, "").to_lowercase()
}

/// Classifies a media kind from the filename.
///
/// Two overrides apply before the extension tables: a `gif-` prefix forces
/// gif (exports store converted gifs as mp4 under that prefix), and a
/// `stk-*.webp` name is a sticker rather than a plain webp image.
pub fn detect_media_kind(file_name: &str) -> MediaKind {
    let extension = file_extension(file_name);
    let lower_name = file_name.to_lowercase();

    if lower_name.starts_with("gif-") {
        return MediaKind::Gif;
    }
    match extension.as_str() {
        "gif" => MediaKind::Gif,
        "jpg" | "jpeg" | "png" | "heic" | "bmp" => MediaKind::Image,
        "webp" if lower_name.starts_with("stk-") => MediaKind::Sticker,
        "webp" => MediaKind::Image,
        "mp4" | "mov" | "webm" | "mkv" | "3gp" => MediaKind::Video,
        "opus" | "ogg" | "aac" | "m4a" | "mp3" | "wav" => MediaKind::Audio,
        _ => MediaKind::Document,
    }
}

/// Guesses a MIME type from the extension table, falling back to a
/// `kind/*` wildcard and finally `application/octet-stream`.
pub fn guess_mime_type(file_name: &str, kind: MediaKind) -> String {
    let mime = match file_extension(file_name).as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "bmp" => "image/bmp",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "3gp" => "video/3gpp",
        "opus" | "ogg" => "audio/ogg",
        "aac" => "audio/aac",
        "m4a" => "audio/mp4",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "vcf" => "text/vcard",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        _ => "",
    };
    if !mime.is_empty() {
        return mime.to_string();
    }

    match kind {
        MediaKind::Image | MediaKind::Sticker => "image/*".to_string(),
        MediaKind::Video => "video/*".to_string(),
        MediaKind::Gif => "image/gif".to_string(),
        MediaKind::Audio => "audio/*".to_string(),
        MediaKind::Document | MediaKind::Missing => "application/octet-stream".to_string(),
    }
}

/// One physical media file candidate inside a [`MediaIndex`].
#[derive(Debug, Clone)]
pub struct MediaRecord {
    /// Basename shown to the user
    pub display_name: String,
    /// Normalized filename key
    pub lookup_key: String,
    /// Classified kind
    pub kind: MediaKind,
    /// Declared or guessed MIME type
    pub mime_type: String,
    /// Capability to load the bytes
    pub accessor: ContentAccessor,
    /// Times this record has been handed out by the resolver
    pub used_count: u32,
}

/// The fields of a resolved attachment, cloned out of a [`MediaRecord`].
#[derive(Debug, Clone)]
pub struct ResolvedMedia {
    pub display_name: String,
    pub kind: MediaKind,
    pub mime_type: String,
    pub lookup_key: String,
    pub accessor: ContentAccessor,
}

/// Multimap preserving both per-key insertion order of values and
/// first-seen order of keys, so lookup and scan tie-breaks stay
/// deterministic.
#[derive(Debug, Default)]
struct MultiMap {
    entries: HashMap<String, Vec<usize>>,
    key_order: Vec<String>,
}

impl MultiMap {
    fn insert(&mut self, key: String, index: usize) {
        let slot = self.entries.entry(key.clone()).or_default();
        if slot.is_empty() {
            self.key_order.push(key);
        }
        slot.push(index);
    }

    fn get(&self, key: &str) -> Option<&[usize]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    fn iter(&self) -> impl Iterator<Item = (&str, &[usize])> {
        self.key_order
            .iter()
            .map(|key| (key.as_str(), self.entries[key].as_slice()))
    }
}

/// Exact and fuzzy filename lookup over one source's media files.
///
/// Built once from the descriptors co-located with a text source; read-only
/// afterwards except for `used_count` mutation during resolution.
#[derive(Debug, Default)]
pub struct MediaIndex {
    exact: MultiMap,
    normalized: MultiMap,
    records: Vec<MediaRecord>,
    /// Record indices ordered by display name, used by omitted-media
    /// inference; ties keep descriptor order.
    scan_order: Vec<usize>,
}

impl MediaIndex {
    /// Builds an index from a source's co-located media descriptors.
    pub fn build(descriptors: impl IntoIterator<Item = MediaDescriptor>) -> Self {
        let mut index = Self::default();

        for descriptor in descriptors {
            let display_name = file_basename(&descriptor.path);
            let lookup_key = normalize_file_key(&display_name);
            let exact_key = display_name.to_lowercase();
            let kind = detect_media_kind(&display_name);
            let mime_type = descriptor
                .declared_content_type
                .as_deref()
                .filter(|declared| !declared.is_empty())
                .map_or_else(|| guess_mime_type(&display_name, kind), str::to_string);

            let record_index = index.records.len();
            index.exact.insert(exact_key, record_index);
            index.normalized.insert(lookup_key.clone(), record_index);
            index.records.push(MediaRecord {
                display_name,
                lookup_key,
                kind,
                mime_type,
                accessor: descriptor.accessor,
                used_count: 0,
            });
        }

        let mut scan_order: Vec<usize> = (0..index.records.len()).collect();
        scan_order.sort_by(|&a, &b| index.records[a].display_name.cmp(&index.records[b].display_name));
        index.scan_order = scan_order;

        index
    }

    /// Returns `true` if the index holds no media records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of media records in the index.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Resolves an extracted filename to a media record.
    ///
    /// Fallback chain: exact lowercased-basename lookup, then normalized-key
    /// lookup, then a scan of all normalized keys for suffix containment in
    /// either direction. Each step yields a candidate set; the least-used
    /// candidate wins (first on tie) and its `used_count` is incremented.
    pub fn resolve(&mut self, requested_name: &str) -> Option<ResolvedMedia> {
        let clean_name = clean_invisible_marks(requested_name).trim().to_string();
        if clean_name.is_empty() {
            return None;
        }

        let exact_key = file_basename(&clean_name).to_lowercase();
        let normalized_key = normalize_file_key(&clean_name);

        let candidates = self
            .exact
            .get(&exact_key)
            .or_else(|| self.normalized.get(&normalized_key))
            .or_else(|| {
                self.normalized
                    .iter()
                    .find(|(key, _)| key.ends_with(&normalized_key) || normalized_key.ends_with(key))
                    .map(|(_, indices)| indices)
            })?
            .to_vec();

        Some(self.take_least_used(&candidates))
    }

    /// Best-effort mapping of a filename-less "omitted" placeholder.
    ///
    /// Scans not-yet-used records in display-name order, preferring one
    /// whose kind matches the hint (a gif hint also accepts video records,
    /// matching the gif-as-video-file export convention), falling back to
    /// the first unused record.
    pub fn resolve_omitted(&mut self, hint: OmittedKind) -> Option<ResolvedMedia> {
        let mut fallback = None;

        for &record_index in &self.scan_order.clone() {
            if self.records[record_index].used_count > 0 {
                continue;
            }
            if fallback.is_none() {
                fallback = Some(record_index);
            }
            if hint.accepts(self.records[record_index].kind) {
                return Some(self.take_least_used(&[record_index]));
            }
        }

        fallback.map(|record_index| self.take_least_used(&[record_index]))
    }

    /// Picks the least-used record among candidates (first wins on ties),
    /// increments its use count, and clones out the attachment fields.
    fn take_least_used(&mut self, candidates: &[usize]) -> ResolvedMedia {
        let mut best = candidates[0];
        for &candidate in candidates {
            if self.records[candidate].used_count < self.records[best].used_count {
                best = candidate;
            }
        }
        self.records[best].used_count += 1;

        let record = &self.records[best];
        ResolvedMedia {
            display_name: record.display_name.clone(),
            kind: record.kind,
            mime_type: record.mime_type.clone(),
            lookup_key: record.lookup_key.clone(),
            accessor: record.accessor.clone(),
        }
    }
}
