/// File classification by extension, with user overrides and glob rules.
///
/// The [`Classifier`] starts from a static table of well-known extensions
/// (see [`Category`]) and can be extended or overridden with custom
/// extension and glob mappings loaded from a rules file.
///
/// # Examples
///
/// ```
/// use sortbox::file_category::Classifier;
///
/// let classifier = Classifier::default();
/// assert_eq!(classifier.classify("JPG"), "Images");
/// assert_eq!(classifier.classify(".pdf"), "Documents");
/// assert_eq!(classifier.classify("xyz"), "Other");
/// ```
use glob::{MatchOptions, Pattern};
use std::collections::HashMap;
use std::path::Path;

/// Label of the fallback category for unmatched files.
pub const OTHER_LABEL: &str = "Other";

/// Built-in categories of the default table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Photos and graphics (JPG, PNG, SVG, ...)
    Images,
    /// Text documents and e-books (PDF, DOCX, TXT, ...)
    Documents,
    /// Spreadsheets and tabular data (XLSX, CSV, ...)
    Spreadsheets,
    /// Slide decks (PPTX, ODP, ...)
    Presentations,
    /// Audio files (MP3, FLAC, ...)
    Audio,
    /// Video files (MP4, MKV, ...)
    Video,
    /// Compressed archives (ZIP, 7Z, ...)
    Archives,
    /// Source code and structured text (RS, PY, JSON, ...)
    Code,
    /// Font files (TTF, OTF, WOFF, ...)
    Fonts,
    /// Anything the table does not know.
    Other,
}

impl Category {
    /// Every built-in category, in table order.
    pub const ALL: [Category; 10] = [
        Category::Images,
        Category::Documents,
        Category::Spreadsheets,
        Category::Presentations,
        Category::Audio,
        Category::Video,
        Category::Archives,
        Category::Code,
        Category::Fonts,
        Category::Other,
    ];

    /// Returns the label of this category, which is also its folder name.
    ///
    /// ```
    /// use sortbox::file_category::Category;
    ///
    /// assert_eq!(Category::Images.label(), "Images");
    /// assert_eq!(Category::Other.label(), "Other");
    /// ```
    pub fn label(&self) -> &'static str {
        match self {
            Category::Images => "Images",
            Category::Documents => "Documents",
            Category::Spreadsheets => "Spreadsheets",
            Category::Presentations => "Presentations",
            Category::Audio => "Audio",
            Category::Video => "Video",
            Category::Archives => "Archives",
            Category::Code => "Code",
            Category::Fonts => "Fonts",
            Category::Other => OTHER_LABEL,
        }
    }

    /// Returns the extensions (lowercase, without dot) mapped to this category
    /// by the default table.
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Category::Images => &[
                "jpg", "jpeg", "png", "gif", "bmp", "tiff", "tif", "webp", "svg", "ico", "heic",
                "heif", "raw", "cr2",
            ],
            Category::Documents => &[
                "pdf", "doc", "docx", "txt", "rtf", "odt", "md", "tex", "epub", "mobi",
            ],
            Category::Spreadsheets => &["xls", "xlsx", "csv", "ods", "tsv"],
            Category::Presentations => &["ppt", "pptx", "odp", "key"],
            Category::Audio => &["mp3", "wav", "aac", "flac", "ogg", "m4a", "wma", "opus"],
            Category::Video => &["mp4", "mov", "avi", "mkv", "wmv", "flv", "webm", "m4v", "3gp"],
            Category::Archives => &["zip", "rar", "7z", "tar", "gz", "bz2", "xz", "tgz"],
            Category::Code => &[
                "py", "js", "ts", "rs", "go", "c", "cpp", "h", "hpp", "java", "kt", "swift", "sh",
                "rb", "php", "lua", "html", "css", "json", "xml", "yaml", "yml", "toml", "ipynb",
            ],
            Category::Fonts => &["ttf", "otf", "woff", "woff2", "eot"],
            Category::Other => &[],
        }
    }
}

/// Looks up an extension in the default table only.
///
/// The extension is matched case-insensitively, with or without a leading dot.
pub fn default_category(ext: &str) -> Option<Category> {
    let ext = normalize_extension(ext);
    Category::ALL
        .into_iter()
        .find(|category| category.extensions().contains(&ext.as_str()))
}

/// Lowercases an extension and strips one leading dot.
pub fn normalize_extension(ext: &str) -> String {
    ext.strip_prefix('.').unwrap_or(ext).to_lowercase()
}

/// Maps files to category labels.
///
/// Lookups go through a single extension table seeded with the defaults;
/// custom mappings overwrite entries in place, so the last mapping added for
/// an extension wins. Glob rules are consulted before the extension table.
#[derive(Debug, Clone)]
pub struct Classifier {
    extension_map: HashMap<String, String>,
    glob_rules: Vec<(Pattern, String)>,
    mime_map: HashMap<String, Category>,
}

impl Classifier {
    /// Creates a classifier holding only the default table.
    pub fn new() -> Self {
        let mut classifier = Self {
            extension_map: HashMap::new(),
            glob_rules: Vec::new(),
            mime_map: HashMap::new(),
        };
        classifier.populate_standard_mappings();
        classifier
    }

    fn populate_standard_mappings(&mut self) {
        for category in Category::ALL {
            for ext in category.extensions() {
                self.add_extension_mapping(ext, category.label());
            }
        }

        // Content types that `infer` reports without an image/audio/video/font prefix
        self.add_mime_mapping("application/pdf", Category::Documents);
        self.add_mime_mapping("application/rtf", Category::Documents);
        self.add_mime_mapping("application/epub+zip", Category::Documents);
        self.add_mime_mapping("application/msword", Category::Documents);
        self.add_mime_mapping(
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            Category::Documents,
        );
        self.add_mime_mapping(
            "application/vnd.oasis.opendocument.text",
            Category::Documents,
        );
        self.add_mime_mapping("application/vnd.ms-excel", Category::Spreadsheets);
        self.add_mime_mapping(
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            Category::Spreadsheets,
        );
        self.add_mime_mapping("application/vnd.ms-powerpoint", Category::Presentations);
        self.add_mime_mapping(
            "application/vnd.openxmlformats-officedocument.presentationml.presentation",
            Category::Presentations,
        );
        self.add_mime_mapping("application/zip", Category::Archives);
        self.add_mime_mapping("application/vnd.rar", Category::Archives);
        self.add_mime_mapping("application/x-7z-compressed", Category::Archives);
        self.add_mime_mapping("application/x-tar", Category::Archives);
        self.add_mime_mapping("application/gzip", Category::Archives);
        self.add_mime_mapping("application/x-bzip2", Category::Archives);
        self.add_mime_mapping("application/x-xz", Category::Archives);
        self.add_mime_mapping("application/wasm", Category::Code);
    }

    /// Adds a MIME type to category mapping used by content sniffing.
    pub fn add_mime_mapping(&mut self, mime: &str, category: Category) {
        self.mime_map.insert(mime.to_lowercase(), category);
    }

    /// Maps an extension to a category label, replacing any previous mapping.
    pub fn add_extension_mapping(&mut self, ext: &str, label: &str) {
        self.extension_map
            .insert(normalize_extension(ext), label.to_string());
    }

    /// Adds a glob rule matched against file names.
    ///
    /// A rule with the same pattern text (ignoring case) replaces the earlier one.
    pub fn add_glob_mapping(&mut self, pattern: Pattern, label: &str) {
        let key = pattern.as_str().to_lowercase();
        self.glob_rules
            .retain(|(existing, _)| existing.as_str().to_lowercase() != key);
        self.glob_rules.push((pattern, label.to_string()));
    }

    /// Returns the number of glob rules.
    pub fn glob_rule_count(&self) -> usize {
        self.glob_rules.len()
    }

    /// Maps an extension to a category label.
    ///
    /// Case-insensitive, tolerant of a leading dot; unmatched (including empty)
    /// extensions map to [`OTHER_LABEL`].
    ///
    /// ```
    /// use sortbox::file_category::Classifier;
    ///
    /// let mut classifier = Classifier::default();
    /// classifier.add_extension_mapping(".PSD", "Design");
    /// assert_eq!(classifier.classify("psd"), "Design");
    /// assert_eq!(classifier.classify(""), "Other");
    /// ```
    pub fn classify(&self, ext: &str) -> &str {
        self.extension_map
            .get(&normalize_extension(ext))
            .map(String::as_str)
            .unwrap_or(OTHER_LABEL)
    }

    /// Maps a file to a category label using glob rules first, then its extension.
    ///
    /// When several glob rules match, the one added last wins.
    pub fn classify_file(&self, file_name: &str, ext: &str) -> &str {
        let options = MatchOptions {
            case_sensitive: false,
            require_literal_separator: false,
            require_literal_leading_dot: false,
        };

        if let Some((_, label)) = self
            .glob_rules
            .iter()
            .rev()
            .find(|(pattern, _)| pattern.matches_with(file_name, options))
        {
            return label;
        }

        self.classify(ext)
    }

    /// Maps a MIME type to a built-in category.
    ///
    /// Exact entries are checked first, then the top-level type.
    pub fn mime_to_category(&self, mime_type: &str) -> Option<Category> {
        let mime_type = mime_type.to_lowercase();
        if let Some(category) = self.mime_map.get(&mime_type) {
            return Some(*category);
        }

        match mime_type.split('/').next() {
            Some("image") => Some(Category::Images),
            Some("audio") => Some(Category::Audio),
            Some("video") => Some(Category::Video),
            Some("font") => Some(Category::Fonts),
            _ => None,
        }
    }

    /// Detects a category from the file header.
    ///
    /// Returns `None` when the content is unrecognized or unreadable.
    pub fn sniff(&self, path: &Path) -> Option<Category> {
        let kind = infer::get_from_path(path).ok()??;
        self.mime_to_category(kind.mime_type())
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new()
    }
}
