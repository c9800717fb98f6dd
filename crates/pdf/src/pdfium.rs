//! Word extraction through the pdfium library.
//!
//! pdfium lays out text the way viewers do (font programs, encodings, forms,
//! annotations' appearance streams), so it is preferred when the shared
//! library can be found. Its per-character boxes are grouped into words by
//! the same `WordCollector` the content-stream reader uses.

use blackout_core::BBox;
use pdfium_render::prelude::*;
use std::path::PathBuf;

use crate::words::{PageLayout, Pen, WordCollector};

/// Where a bundled pdfium library may sit, most specific first.
fn pdfium_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Some(dir) = std::env::var_os("PDFIUM_DYNAMIC_LIB_PATH") {
        paths.push(PathBuf::from(dir));
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            paths.push(exe_dir.join("libs"));
            paths.push(exe_dir.to_path_buf());

            #[cfg(target_os = "macos")]
            {
                if let Some(contents_dir) = exe_dir.parent() {
                    paths.push(contents_dir.join("Resources").join("libs"));
                    paths.push(contents_dir.join("Resources"));
                }
            }

            #[cfg(target_os = "linux")]
            {
                if let Ok(appdir) = std::env::var("APPDIR") {
                    let appdir = PathBuf::from(appdir);
                    paths.push(appdir.join("usr").join("lib").join("libs"));
                    paths.push(appdir.join("usr").join("lib"));
                }
            }
        }
    }

    paths.push(PathBuf::from("libs"));
    paths.push(PathBuf::from("./"));
    paths
}

/// Binds the first pdfium library found, falling back to the system one.
pub fn bind_pdfium() -> Result<Pdfium, String> {
    for path in pdfium_search_paths() {
        let lib_path = Pdfium::pdfium_platform_library_name_at_path(&path);
        log::debug!("[Pdfium] trying {:?}", lib_path);
        if let Ok(bindings) = Pdfium::bind_to_library(&lib_path) {
            log::info!("[Pdfium] loaded from {:?}", path);
            return Ok(Pdfium::new(bindings));
        }
    }

    log::debug!("[Pdfium] trying the system library");
    Pdfium::bind_to_system_library()
        .map(Pdfium::new)
        .map_err(|e| format!("pdfium library unavailable: {}", e))
}

/// One character as pdfium reports it, in PDF user space.
#[derive(Debug, Clone)]
pub(crate) struct CharBox {
    pub ch: char,
    pub bbox: BBox,
}

/// Text and words of every page of `bytes`.
pub fn extract_layouts(bytes: &[u8]) -> Result<Vec<PageLayout>, String> {
    let pdfium = bind_pdfium()?;
    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| format!("pdfium could not open the document: {}", e))?;

    let mut layouts = Vec::new();
    for (index, page) in document.pages().iter().enumerate() {
        let text = page
            .text()
            .map_err(|e| format!("page {}: text unavailable: {}", index + 1, e))?;

        let chars: Vec<CharBox> = text
            .chars()
            .iter()
            .filter_map(|c| {
                let ch = c.unicode_char()?;
                let bbox = match c.loose_bounds() {
                    Ok(rect) => BBox::from_corners(
                        rect.left().value,
                        rect.bottom().value,
                        rect.right().value,
                        rect.top().value,
                    ),
                    // generated separators carry no box; they only break words
                    Err(_) if ch.is_whitespace() => BBox::default(),
                    Err(_) => return None,
                };
                Some(CharBox { ch, bbox })
            })
            .collect();

        let layout = layout_from_chars(&chars);
        log::debug!(
            "[Pdfium] page {}: {} char(s), {} word(s)",
            index + 1,
            chars.len(),
            layout.words.len()
        );
        layouts.push(layout);
    }
    Ok(layouts)
}

/// Groups characters into words and lines. Each character box stands for a
/// glyph drawn left to right on the baseline at its bottom edge.
pub(crate) fn layout_from_chars(chars: &[CharBox]) -> PageLayout {
    let mut collector = WordCollector::default();
    collector.begin_block();

    let mut buf = [0u8; 4];
    for c in chars {
        let text: &str = c.ch.encode_utf8(&mut buf);
        collector.push_glyph(text, c.bbox, pen_at(c.bbox.x0, &c.bbox), pen_at(c.bbox.x1, &c.bbox));
    }
    collector.finish()
}

fn pen_at(x: f32, bbox: &BBox) -> Pen {
    Pen {
        x,
        y: bbox.y0,
        dir: (1.0, 0.0),
        size: (bbox.y1 - bbox.y0).max(0.01),
    }
}
