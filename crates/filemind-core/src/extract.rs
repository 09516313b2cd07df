use std::fs;
use std::io::Read;
use std::path::Path;

use crate::error::ExtractError;
use crate::traits::TextExtractor;

const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "md", "markdown", "rst", "org", "csv", "tsv", "json", "jsonl", "yaml", "yml", "toml",
    "ini", "cfg", "conf", "log", "xml", "html", "htm", "css", "tex", "rs", "py", "js", "ts", "tsx",
    "jsx", "go", "java", "kt", "c", "h", "cpp", "hpp", "cs", "rb", "php", "sh", "sql", "swift",
];

const SNIFF_BYTES: usize = 8 * 1024;

/// Reads text-like files directly from disk.
///
/// Known text extensions and extension-less files are accepted; anything
/// whose first 8 KiB contain a NUL byte is rejected as binary. Non-UTF-8
/// content is decoded lossily.
#[derive(Debug, Clone, Default)]
pub struct PlainTextExtractor;

impl PlainTextExtractor {
    pub fn new() -> Self {
        Self
    }

    fn accepts(path: &Path) -> Result<(), ExtractError> {
        match path.extension().and_then(|e| e.to_str()) {
            None => Ok(()),
            Some(ext) if TEXT_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()) => Ok(()),
            Some(ext) => Err(ExtractError::Unsupported(ext.to_string())),
        }
    }
}

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        Self::accepts(path)?;
        let mut head = Vec::with_capacity(SNIFF_BYTES);
        fs::File::open(path)?.take(SNIFF_BYTES as u64).read_to_end(&mut head)?;
        if head.contains(&0) {
            return Err(ExtractError::Binary(path.to_path_buf()));
        }
        match fs::read_to_string(path) {
            Ok(content) => Ok(content),
            Err(_) => Ok(String::from_utf8_lossy(&fs::read(path)?).to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_text_and_rejects_binary_or_unknown() {
        let tmp = tempfile::TempDir::new().unwrap();
        let text = tmp.path().join("notes.md");
        fs::write(&text, "# Title\nbody").unwrap();
        let bin = tmp.path().join("blob.txt");
        fs::write(&bin, [0x50u8, 0x00, 0x01]).unwrap();
        let pdf = tmp.path().join("paper.pdf");
        fs::write(&pdf, "%PDF-1.7").unwrap();

        let extractor = PlainTextExtractor::new();
        assert_eq!(extractor.extract(&text).unwrap(), "# Title\nbody");
        assert!(matches!(extractor.extract(&bin), Err(ExtractError::Binary(_))));
        assert!(matches!(extractor.extract(&pdf), Err(ExtractError::Unsupported(ext)) if ext == "pdf"));
    }

    #[test]
    fn invalid_utf8_is_decoded_lossily() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("latin1.txt");
        fs::write(&path, [b'c', b'a', b'f', 0xE9]).unwrap();
        let text = PlainTextExtractor::new().extract(&path).unwrap();
        assert!(text.starts_with("caf"));
    }
}
