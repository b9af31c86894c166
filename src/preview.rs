//! Quick-look previews written to a scratch directory.
//!
//! Images become a PNG thumbnail no larger than 200x200, text files an
//! excerpt of their first 500 bytes and PDFs an excerpt of their first 500
//! bytes of extracted text. Anything that can't be previewed, or
//! fails along the way, is reported as [`Preview::Unavailable`].

use image::{ImageFormat, ImageReader};
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const THUMBNAIL_SIZE: u32 = 200;
pub const TEXT_EXCERPT_BYTES: u64 = 500;

const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Preview {
    /// Thumbnail written to this path.
    Image(PathBuf),
    /// Excerpt, also written to `path`.
    Text { path: PathBuf, excerpt: String },
    Unavailable,
}

#[derive(Debug, Clone)]
pub struct PreviewGenerator {
    dir: PathBuf,
}

impl PreviewGenerator {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Where the preview of `file` is stored.
    pub fn preview_path(&self, file: &Path) -> Option<PathBuf> {
        let name = file.file_name()?.to_string_lossy();
        Some(self.dir.join(format!("preview_{}", name)))
    }

    pub fn generate(&self, file: &Path) -> Preview {
        let Some(dest) = self.preview_path(file) else {
            return Preview::Unavailable;
        };
        let ext = file
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        let result = if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            self.image_preview(file, &dest)
        } else if ext == "txt" {
            self.text_preview(file, &dest)
        } else if ext == "pdf" {
            self.pdf_preview(file, &dest)
        } else {
            debug!("no preview for {}", file.display());
            return Preview::Unavailable;
        };

        result.unwrap_or_else(|e| {
            warn!("preview of {} failed: {}", file.display(), e);
            Preview::Unavailable
        })
    }

    fn image_preview(&self, src: &Path, dest: &Path) -> Result<Preview, Box<dyn std::error::Error>> {
        let looks_like_image = infer::get_from_path(src)?
            .is_some_and(|kind| kind.matcher_type() == infer::MatcherType::Image);
        if !looks_like_image {
            debug!("{} is not an image by content", src.display());
            return Ok(Preview::Unavailable);
        }

        let img = ImageReader::open(src)?.with_guessed_format()?.decode()?;
        fs::create_dir_all(&self.dir)?;
        img.thumbnail(THUMBNAIL_SIZE, THUMBNAIL_SIZE)
            .save_with_format(dest, ImageFormat::Png)?;
        Ok(Preview::Image(dest.to_path_buf()))
    }

    fn text_preview(&self, src: &Path, dest: &Path) -> Result<Preview, Box<dyn std::error::Error>> {
        let excerpt = read_excerpt(src)?;
        fs::create_dir_all(&self.dir)?;
        fs::write(dest, &excerpt)?;
        Ok(Preview::Text {
            path: dest.to_path_buf(),
            excerpt,
        })
    }

    fn pdf_preview(&self, src: &Path, dest: &Path) -> Result<Preview, Box<dyn std::error::Error>> {
        let bytes = fs::read(src)?;
        if infer::get(&bytes).map(|kind| kind.mime_type()) != Some("application/pdf") {
            debug!("{} is not a PDF by content", src.display());
            return Ok(Preview::Unavailable);
        }

        // pdf-extract panics on some malformed documents
        let text = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(&bytes))
            .map_err(|_| "PDF text extraction panicked")?
            .map_err(|e| e.to_string())?;
        let excerpt = truncate_at_char_boundary(text.trim_start(), TEXT_EXCERPT_BYTES as usize);
        if excerpt.is_empty() {
            debug!("{} has no extractable text", src.display());
            return Ok(Preview::Unavailable);
        }

        fs::create_dir_all(&self.dir)?;
        fs::write(dest, excerpt)?;
        Ok(Preview::Text {
            path: dest.to_path_buf(),
            excerpt: excerpt.to_string(),
        })
    }
}

/// Longest prefix of `text` that fits in `max` bytes without splitting a char.
fn truncate_at_char_boundary(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

fn read_excerpt(path: &Path) -> io::Result<String> {
    let mut buf = Vec::new();
    File::open(path)?.take(TEXT_EXCERPT_BYTES).read_to_end(&mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
