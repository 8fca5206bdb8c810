//! HTML → PDF rendering.
//!
//! [`ChromiumRenderer`] drives a headless Chromium through its command line.
//! [`TextRenderer`] needs no external program: it lays the text content of
//! the HTML out on fixed-size Courier pages with lopdf.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::LazyLock;
use std::time::{Duration, Instant};

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream, StringFormat};
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::error::RenderError;
use crate::config::{RendererConfig, RendererKind};
use crate::error::ConfigError;

/// Renders substituted template HTML to PDF bytes.
pub trait TemplateRenderer: Send + Sync {
    fn render(&self, html: &str) -> Result<Vec<u8>, RenderError>;

    fn page_format(&self) -> PageFormat;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PageFormat {
    #[default]
    A4,
    Letter,
}

impl PageFormat {
    /// Width and height in PDF points.
    pub fn size_points(&self) -> (f32, f32) {
        match self {
            PageFormat::A4 => (595.0, 842.0),
            PageFormat::Letter => (612.0, 792.0),
        }
    }

    fn css_size(&self) -> &'static str {
        match self {
            PageFormat::A4 => "A4",
            PageFormat::Letter => "letter",
        }
    }
}

/// Builds the renderer selected in the configuration.
pub fn from_config(config: &RendererConfig) -> Result<Box<dyn TemplateRenderer>, ConfigError> {
    match config.kind {
        RendererKind::Text => Ok(Box::new(TextRenderer::new(config.page_format))),
        RendererKind::Chromium => {
            let binary = config
                .chromium_path
                .as_deref()
                .ok_or_else(|| ConfigError::Validation {
                    message: "renderer.chromium_path is required for the chromium renderer"
                        .to_string(),
                })?;
            Ok(Box::new(ChromiumRenderer::new(
                binary,
                config.page_format,
                Duration::from_secs(config.timeout_secs),
            )))
        }
    }
}

// ─── Chromium ───────────────────────────────────────────────────────────────

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Longest stderr excerpt carried in a [`RenderError::Failed`].
const MAX_STDERR_BYTES: usize = 4096;

pub struct ChromiumRenderer {
    binary: PathBuf,
    page_format: PageFormat,
    timeout: Duration,
    work_root: PathBuf,
}

impl ChromiumRenderer {
    pub fn new<P: AsRef<Path>>(binary: P, page_format: PageFormat, timeout: Duration) -> Self {
        Self {
            binary: binary.as_ref().to_path_buf(),
            page_format,
            timeout,
            work_root: std::env::temp_dir(),
        }
    }

    /// Directory that holds the per-render scratch directories. Defaults to
    /// the system temp directory.
    pub fn with_work_root<P: AsRef<Path>>(mut self, root: P) -> Self {
        self.work_root = root.as_ref().to_path_buf();
        self
    }

    /// Runs the browser and waits for it, killing it once `timeout` passes.
    fn run(&self, html_path: &Path, pdf_path: &Path, stderr_path: &Path) -> Result<(), RenderError> {
        let stderr_file = File::create(stderr_path).map_err(|e| RenderError::Io {
            path: stderr_path.to_path_buf(),
            source: e,
        })?;

        let start = Instant::now();
        let mut child = Command::new(&self.binary)
            .args([
                "--headless",
                "--disable-gpu",
                "--no-sandbox",
                "--no-pdf-header-footer",
            ])
            .arg(format!("--print-to-pdf={}", pdf_path.display()))
            .arg(format!("file://{}", html_path.display()))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::from(stderr_file))
            .spawn()
            .map_err(|e| RenderError::Spawn {
                program: self.binary.clone(),
                source: e,
            })?;

        loop {
            let polled = child.try_wait().map_err(|e| RenderError::Io {
                path: self.binary.clone(),
                source: e,
            })?;
            if let Some(status) = polled {
                if status.success() {
                    return Ok(());
                }
                let stderr = std::fs::read(stderr_path).unwrap_or_default();
                let tail = &stderr[stderr.len().saturating_sub(MAX_STDERR_BYTES)..];
                return Err(RenderError::Failed {
                    status: status.to_string(),
                    stderr: String::from_utf8_lossy(tail).trim().to_string(),
                });
            }
            if start.elapsed() > self.timeout {
                let _ = child.kill();
                let _ = child.wait();
                return Err(RenderError::Timeout {
                    secs: self.timeout.as_secs(),
                });
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }
}

impl TemplateRenderer for ChromiumRenderer {
    fn render(&self, html: &str) -> Result<Vec<u8>, RenderError> {
        let _span = tracing::info_span!("renderer.chromium").entered();

        // Removed with everything in it when dropped, on every exit path.
        let work_dir = tempfile::Builder::new()
            .prefix("contractflow_render_")
            .tempdir_in(&self.work_root)
            .map_err(|e| RenderError::Io {
                path: self.work_root.clone(),
                source: e,
            })?;
        let html_path = work_dir.path().join("contract.html");
        let pdf_path = work_dir.path().join("contract.pdf");
        let stderr_path = work_dir.path().join("chromium.log");

        std::fs::write(&html_path, with_page_rule(html, self.page_format)).map_err(|e| {
            RenderError::Io {
                path: html_path.clone(),
                source: e,
            }
        })?;

        self.run(&html_path, &pdf_path, &stderr_path)?;

        let bytes = std::fs::read(&pdf_path).map_err(|e| RenderError::Io {
            path: pdf_path.clone(),
            source: e,
        })?;

        Document::load_mem(&bytes).map_err(|e| RenderError::InvalidOutput(e.to_string()))?;
        Ok(bytes)
    }

    fn page_format(&self) -> PageFormat {
        self.page_format
    }
}

/// Adds an `@page` size rule so the browser prints at the configured format.
fn with_page_rule(html: &str, format: PageFormat) -> String {
    let style = format!("<style>@page {{ size: {}; }}</style>", format.css_size());
    match html.to_ascii_lowercase().find("<head>") {
        Some(pos) => {
            let insert_at = pos + "<head>".len();
            format!("{}{}{}", &html[..insert_at], style, &html[insert_at..])
        }
        None => format!("{}{}", style, html),
    }
}

// ─── Text ───────────────────────────────────────────────────────────────────

const MARGIN: f32 = 56.0;
const FONT_SIZE: f32 = 11.0;
const LEADING: f32 = 14.0;
/// Courier advance width as a fraction of the font size.
const COURIER_ADVANCE: f32 = 0.6;

pub struct TextRenderer {
    page_format: PageFormat,
}

impl TextRenderer {
    pub fn new(page_format: PageFormat) -> Self {
        Self { page_format }
    }

    pub fn lines_per_page(&self) -> usize {
        let (_, height) = self.page_format.size_points();
        (((height - 2.0 * MARGIN) / LEADING).floor() as usize).max(1)
    }

    pub fn chars_per_line(&self) -> usize {
        let (width, _) = self.page_format.size_points();
        (((width - 2.0 * MARGIN) / (FONT_SIZE * COURIER_ADVANCE)).floor() as usize).max(1)
    }

    fn build_pdf(&self, lines: &[String]) -> Result<Vec<u8>, RenderError> {
        let (width, height) = self.page_format.size_points();
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
            "Encoding" => "WinAnsiEncoding",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                "F1" => font_id,
            },
        });

        let mut chunks: Vec<&[String]> = lines.chunks(self.lines_per_page()).collect();
        if chunks.is_empty() {
            chunks.push(&[]);
        }

        let mut kids: Vec<Object> = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let mut operations = vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), FONT_SIZE.into()]),
                Operation::new("TL", vec![LEADING.into()]),
                Operation::new("Td", vec![MARGIN.into(), (height - MARGIN - FONT_SIZE).into()]),
            ];
            for line in chunk {
                operations.push(Operation::new(
                    "Tj",
                    vec![Object::String(win_ansi(line), StringFormat::Literal)],
                ));
                operations.push(Operation::new("T*", vec![]));
            }
            operations.push(Operation::new("ET", vec![]));

            let content = Content { operations }
                .encode()
                .map_err(|e| RenderError::Pdf(e.to_string()))?;
            let content_id = doc.add_object(Stream::new(dictionary! {}, content));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), width.into(), height.into()],
                "Resources" => resources_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes)
            .map_err(|e| RenderError::Pdf(e.to_string()))?;
        Ok(bytes)
    }
}

impl TemplateRenderer for TextRenderer {
    fn render(&self, html: &str) -> Result<Vec<u8>, RenderError> {
        let _span = tracing::info_span!("renderer.text").entered();

        let text = html_to_text(html);
        let lines = wrap_lines(&text, self.chars_per_line());
        tracing::debug!(lines = lines.len(), "Laying out text pages");
        self.build_pdf(&lines)
    }

    fn page_format(&self) -> PageFormat {
        self.page_format
    }
}

static RE_HIDDEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(script|style|head)\b[^>]*>.*?</(script|style|head)>").unwrap()
});
static RE_LINE_BREAK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>").unwrap());
static RE_BLOCK_END: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)</(p|div|h[1-6]|li|tr|table|section|article|header|footer|ul|ol|blockquote|pre)\s*>",
    )
    .unwrap()
});
static RE_LIST_ITEM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<li\b[^>]*>").unwrap());
static RE_CELL_END: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)</t[dh]\s*>").unwrap());
static RE_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());
static RE_SPACES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t\r\x0C]+").unwrap());

/// Reduces HTML to its text content, one line per block element.
pub fn html_to_text(html: &str) -> String {
    let text = RE_HIDDEN.replace_all(html, "");
    let text = RE_LINE_BREAK.replace_all(&text, "\n");
    let text = RE_BLOCK_END.replace_all(&text, "\n");
    let text = RE_LIST_ITEM.replace_all(&text, "- ");
    let text = RE_CELL_END.replace_all(&text, "  ");
    let text = RE_TAG.replace_all(&text, "");
    let text = decode_entities(&text);

    let mut lines: Vec<String> = Vec::new();
    for raw in text.lines() {
        let line = RE_SPACES.replace_all(raw, " ").trim().to_string();
        let previous_blank = lines.last().map(|l| l.is_empty()).unwrap_or(true);
        if line.is_empty() && previous_blank {
            continue;
        }
        lines.push(line);
    }
    while lines.last().map(|l| l.is_empty()).unwrap_or(false) {
        lines.pop();
    }
    lines.join("\n")
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Encodes a line for a standard font declared with `WinAnsiEncoding`.
/// Characters the encoding has no code for become `?`.
fn win_ansi(line: &str) -> Vec<u8> {
    line.chars()
        .map(|c| match c as u32 {
            0x20..=0x7E | 0xA0..=0xFF => c as u8,
            _ => win_ansi_extra(c).unwrap_or(b'?'),
        })
        .collect()
}

/// Codes 0x80..=0x9F, where WinAnsi departs from Latin-1.
fn win_ansi_extra(c: char) -> Option<u8> {
    let code = match c {
        '€' => 0x80,
        '‚' => 0x82,
        'ƒ' => 0x83,
        '„' => 0x84,
        '…' => 0x85,
        '†' => 0x86,
        '‡' => 0x87,
        'ˆ' => 0x88,
        '‰' => 0x89,
        'Š' => 0x8A,
        '‹' => 0x8B,
        'Œ' => 0x8C,
        'Ž' => 0x8E,
        '\u{2018}' => 0x91,
        '\u{2019}' => 0x92,
        '\u{201C}' => 0x93,
        '\u{201D}' => 0x94,
        '•' => 0x95,
        '\u{2013}' => 0x96,
        '\u{2014}' => 0x97,
        '˜' => 0x98,
        '™' => 0x99,
        'š' => 0x9A,
        '›' => 0x9B,
        'œ' => 0x9C,
        'ž' => 0x9E,
        'Ÿ' => 0x9F,
        _ => return None,
    };
    Some(code)
}

/// Word-wraps each line to at most `width` characters. Words longer than a
/// line are split.
fn wrap_lines(text: &str, width: usize) -> Vec<String> {
    let mut out = Vec::new();
    for line in text.lines() {
        if line.is_empty() {
            out.push(String::new());
            continue;
        }
        let mut current = String::new();
        for word in line.split(' ') {
            let mut word: Vec<char> = word.chars().collect();
            while word.len() > width {
                if !current.is_empty() {
                    out.push(std::mem::take(&mut current));
                }
                out.push(word.drain(..width).collect());
            }
            let word: String = word.into_iter().collect();
            let needed = if current.is_empty() {
                word.chars().count()
            } else {
                current.chars().count() + 1 + word.chars().count()
            };
            if needed > width && !current.is_empty() {
                out.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(&word);
        }
        if !current.is_empty() {
            out.push(current);
        }
    }
    out
}
