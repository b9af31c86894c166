/// Category labels and the built-in extension table.
///
/// A category is the name of the subfolder a file is moved into. The five
/// built-in categories own a fixed set of extensions; custom rules may
/// introduce any other label.
///
/// # Examples
///
/// ```
/// use filesorter::file_category::{Category, ExtensionTable};
///
/// let table = ExtensionTable::default();
/// assert_eq!(table.lookup("png"), Some(Category::Images));
/// assert_eq!(table.lookup("MP3"), Some(Category::Media));
/// assert_eq!(table.lookup("xyz"), None);
/// ```
use std::collections::HashMap;
use std::fmt;

/// Folder name of the quarantine category.
pub const DUPLICATES_LABEL: &str = "Duplicates";

/// Folder name of the catch-all category.
pub const MISCELLANEOUS_LABEL: &str = "Miscellaneous";

/// Destination category of a file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Category {
    /// pdf, docx, txt, ...
    Documents,
    /// jpg, png, webp, ...
    Images,
    /// Audio and video: mp4, mov, mp3, ...
    Media,
    /// zip, rar, 7z, tar, ...
    Archives,
    /// py, js, html, css, json, ...
    Code,
    /// Label introduced by a custom rule.
    Custom(String),
    /// Nothing matched.
    Miscellaneous,
    /// Reserved quarantine folder for content duplicates.
    Duplicates,
}

impl Category {
    /// The built-in categories that own entries in the extension table.
    pub const BUILTIN: [Category; 5] = [
        Category::Documents,
        Category::Images,
        Category::Media,
        Category::Archives,
        Category::Code,
    ];

    /// Resolves a label to a category. Built-in names map to their variant,
    /// anything else becomes [`Category::Custom`].
    ///
    /// ```
    /// use filesorter::file_category::Category;
    ///
    /// assert_eq!(Category::from_label("Images"), Category::Images);
    /// assert_eq!(Category::from_label("Finance"), Category::Custom("Finance".into()));
    /// ```
    pub fn from_label(label: &str) -> Self {
        match label {
            "Documents" => Category::Documents,
            "Images" => Category::Images,
            "Media" => Category::Media,
            "Archives" => Category::Archives,
            "Code" => Category::Code,
            MISCELLANEOUS_LABEL => Category::Miscellaneous,
            DUPLICATES_LABEL => Category::Duplicates,
            other => Category::Custom(other.to_string()),
        }
    }

    /// Returns the directory name for this category.
    ///
    /// ```
    /// use filesorter::file_category::Category;
    ///
    /// assert_eq!(Category::Documents.dir_name(), "Documents");
    /// assert_eq!(Category::Custom("Finance".into()).dir_name(), "Finance");
    /// ```
    pub fn dir_name(&self) -> &str {
        match self {
            Category::Documents => "Documents",
            Category::Images => "Images",
            Category::Media => "Media",
            Category::Archives => "Archives",
            Category::Code => "Code",
            Category::Custom(label) => label,
            Category::Miscellaneous => MISCELLANEOUS_LABEL,
            Category::Duplicates => DUPLICATES_LABEL,
        }
    }

    pub fn is_quarantine(&self) -> bool {
        matches!(self, Category::Duplicates)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Maps lowercased file extensions to built-in categories.
#[derive(Debug, Clone)]
pub struct ExtensionTable {
    extension_map: HashMap<String, Category>,
}

impl ExtensionTable {
    /// Creates a table holding the standard extension mappings.
    pub fn new() -> Self {
        let mut table = Self {
            extension_map: HashMap::new(),
        };
        table.populate_standard_mappings();
        table
    }

    fn populate_standard_mappings(&mut self) {
        const DOCUMENTS: &[&str] = &[
            "pdf", "docx", "doc", "txt", "xlsx", "xls", "pptx", "ppt", "md", "rtf", "odt", "csv",
        ];
        const IMAGES: &[&str] = &[
            "jpg", "jpeg", "png", "webp", "gif", "svg", "bmp", "tiff", "heic", "ico",
        ];
        const MEDIA: &[&str] = &[
            "mp4", "mov", "avi", "mkv", "mp3", "wav", "flac", "m4a", "ogg", "webm",
        ];
        const ARCHIVES: &[&str] = &["zip", "rar", "7z", "tar", "gz", "bz2", "xz"];
        const CODE: &[&str] = &[
            "py", "js", "html", "css", "json", "rs", "ts", "sh", "toml", "yaml", "yml",
        ];

        for (extensions, category) in [
            (DOCUMENTS, Category::Documents),
            (IMAGES, Category::Images),
            (MEDIA, Category::Media),
            (ARCHIVES, Category::Archives),
            (CODE, Category::Code),
        ] {
            for ext in extensions {
                self.add_extension_mapping(ext, category.clone());
            }
        }
    }

    /// Adds or replaces an extension mapping. A leading dot is ignored.
    pub fn add_extension_mapping(&mut self, ext: &str, category: Category) {
        let ext = ext.trim_start_matches('.').to_lowercase();
        self.extension_map.insert(ext, category);
    }

    /// Looks up an extension, case-insensitively.
    pub fn lookup(&self, ext: &str) -> Option<Category> {
        self.extension_map
            .get(&ext.trim_start_matches('.').to_lowercase())
            .cloned()
    }

    /// Extensions owned by `category`, sorted.
    pub fn extensions_for(&self, category: &Category) -> Vec<&str> {
        let mut exts: Vec<&str> = self
            .extension_map
            .iter()
            .filter(|(_, c)| *c == category)
            .map(|(e, _)| e.as_str())
            .collect();
        exts.sort_unstable();
        exts
    }
}

impl Default for ExtensionTable {
    fn default() -> Self {
        Self::new()
    }
}
