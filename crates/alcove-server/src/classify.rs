//! Content-kind detection from MIME type and filename. A heuristic front
//! door for the content store — the store itself only consumes the result.

use alcove_types::ContentKind;

const CODE_EXTENSIONS: &[&str] = &[
    "rs", "py", "js", "ts", "jsx", "tsx", "go", "c", "h", "cpp", "hpp", "java", "kt", "rb",
    "sh", "sql", "html", "css", "json", "yaml", "yml", "toml", "xml",
];

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "svg", "bmp", "ico"];

pub fn classify(mime_type: Option<&str>, filename: Option<&str>) -> ContentKind {
    if let Some(mime) = mime_type {
        let mime = mime.split(';').next().unwrap_or(mime).trim();
        if mime.starts_with("image/") {
            return ContentKind::Image;
        }
        if mime == "application/pdf" {
            return ContentKind::Pdf;
        }
        if mime.starts_with("text/") {
            return if extension(filename).is_some_and(|e| CODE_EXTENSIONS.contains(&e.as_str())) {
                ContentKind::Code
            } else {
                ContentKind::Text
            };
        }
    }

    match extension(filename) {
        Some(ext) if ext == "pdf" => ContentKind::Pdf,
        Some(ext) if IMAGE_EXTENSIONS.contains(&ext.as_str()) => ContentKind::Image,
        Some(ext) if CODE_EXTENSIONS.contains(&ext.as_str()) => ContentKind::Code,
        Some(ext) if ext == "txt" || ext == "md" => ContentKind::Text,
        _ => ContentKind::FileBlob,
    }
}

fn extension(filename: Option<&str>) -> Option<String> {
    filename?
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_takes_precedence() {
        assert_eq!(classify(Some("image/png"), Some("odd.txt")), ContentKind::Image);
        assert_eq!(classify(Some("application/pdf"), None), ContentKind::Pdf);
        assert_eq!(
            classify(Some("text/plain; charset=utf-8"), Some("notes.txt")),
            ContentKind::Text
        );
        assert_eq!(classify(Some("text/x-rust"), Some("main.rs")), ContentKind::Code);
    }

    #[test]
    fn falls_back_to_extension() {
        assert_eq!(classify(None, Some("photo.JPG")), ContentKind::Image);
        assert_eq!(classify(None, Some("script.py")), ContentKind::Code);
        assert_eq!(classify(None, Some("readme.md")), ContentKind::Text);
        assert_eq!(classify(None, Some("archive.tar.gz")), ContentKind::FileBlob);
        assert_eq!(classify(None, None), ContentKind::FileBlob);
    }
}
