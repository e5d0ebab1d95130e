// Course-material corpus loader.
//
// Reads every recognized file in the corpus directory and concatenates the
// extracted text into one blob, each part prefixed with a tag naming the
// source file and type. A file that fails to read or parse contributes an
// empty string; the load never aborts as a whole.

use std::fs;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

pub struct CorpusLoader {
    corpus_dir: PathBuf,
}

impl CorpusLoader {
    pub fn new(corpus_dir: impl Into<PathBuf>) -> Self {
        CorpusLoader {
            corpus_dir: corpus_dir.into(),
        }
    }

    /// Load the whole corpus. If the directory is missing it is created
    /// empty and an empty blob returned.
    pub fn load(&self) -> String {
        if !self.corpus_dir.exists() {
            tracing::info!("Creating corpus directory: {}", self.corpus_dir.display());
            if let Err(e) = fs::create_dir_all(&self.corpus_dir) {
                tracing::warn!("Failed to create corpus directory: {}", e);
            }
            return String::new();
        }

        let mut parts = Vec::new();

        for path in self.files_with_extension("txt") {
            tracing::info!("Loading TXT: {}", file_name(&path));
            parts.push(self.read_txt(&path));
        }
        for path in self.files_with_extension("pdf") {
            tracing::info!("Loading PDF: {}", file_name(&path));
            parts.push(self.read_pdf(&path));
        }
        for path in self.files_with_extension("docx") {
            tracing::info!("Loading DOCX: {}", file_name(&path));
            parts.push(self.read_docx(&path));
        }
        for path in self.files_with_extension("mp4") {
            tracing::info!("Loading MP4 metadata: {}", file_name(&path));
            parts.push(self.read_mp4_info(&path));
        }

        let corpus = parts.join("\n\n");
        if corpus.trim().is_empty() {
            tracing::info!("No corpus files found.");
        } else {
            tracing::info!("Corpus loaded successfully! ({} files)", parts.len());
        }
        corpus
    }

    fn files_with_extension(&self, ext: &str) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = match fs::read_dir(&self.corpus_dir) {
            Ok(entries) => entries
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.path())
                .filter(|path| {
                    path.is_file()
                        && path
                            .extension()
                            .and_then(|e| e.to_str())
                            .map(|e| e.eq_ignore_ascii_case(ext))
                            .unwrap_or(false)
                })
                .collect(),
            Err(e) => {
                tracing::warn!("Failed to read corpus directory: {}", e);
                Vec::new()
            }
        };
        files.sort();
        files
    }

    fn read_txt(&self, path: &Path) -> String {
        match fs::read_to_string(path) {
            Ok(text) => format!("[TXT: {}]\n{}", file_name(path), text),
            Err(e) => {
                tracing::warn!("Error reading {}: {}", file_name(path), e);
                String::new()
            }
        }
    }

    fn read_pdf(&self, path: &Path) -> String {
        match pdf_extract::extract_text(path) {
            Ok(text) => format!("[PDF: {}]\n{}", file_name(path), text),
            Err(e) => {
                tracing::warn!("Error reading {}: {}", file_name(path), e);
                String::new()
            }
        }
    }

    fn read_docx(&self, path: &Path) -> String {
        match extract_docx_text(path) {
            Ok(text) => format!("[DOCX: {}]\n{}", file_name(path), text),
            Err(e) => {
                tracing::warn!("Error reading {}: {}", file_name(path), e);
                String::new()
            }
        }
    }

    /// Only a duration placeholder is extracted for video lectures, no
    /// transcript content.
    fn read_mp4_info(&self, path: &Path) -> String {
        match probe_mp4_duration(path) {
            Ok(seconds) => format!(
                "[VIDEO: {}]\nDuration: {:.2} seconds\nNote: This is a video lecture file.",
                file_name(path),
                seconds
            ),
            Err(e) => {
                tracing::warn!("Error reading {}: {}", file_name(path), e);
                format!(
                    "[VIDEO: {}]\nNote: Video file present but metadata unavailable.",
                    file_name(path)
                )
            }
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string()
}

/// A .docx file is a zip archive; the document body lives in
/// word/document.xml with one `<w:p>` element per paragraph.
fn extract_docx_text(path: &Path) -> std::io::Result<String> {
    let file = fs::File::open(path)?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    let mut document = archive
        .by_name("word/document.xml")
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::NotFound, e))?;
    let mut xml = String::new();
    document.read_to_string(&mut xml)?;

    let paragraphs: Vec<String> = xml
        .split("</w:p>")
        .map(strip_xml_tags)
        .map(|p| decode_xml_entities(&p))
        .filter(|p| !p.trim().is_empty())
        .collect();

    Ok(paragraphs.join("\n"))
}

fn strip_xml_tags(fragment: &str) -> String {
    let mut result = String::new();
    let mut in_tag = false;
    for ch in fragment.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => result.push(ch),
            _ => {}
        }
    }
    result
}

fn decode_xml_entities(text: &str) -> String {
    text.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
}

fn probe_mp4_duration(path: &Path) -> std::io::Result<f64> {
    let file = fs::File::open(path)?;
    let size = file.metadata()?.len();
    let reader = BufReader::new(file);
    let parsed = mp4::Mp4Reader::read_header(reader, size)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    Ok(parsed.duration().as_secs_f64())
}
