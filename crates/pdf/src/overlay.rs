//! Black rectangle overlays.
//!
//! The original page content is never decoded and re-encoded. Instead the
//! page's `/Contents` is wrapped: a `q` stream in front, the original streams
//! untouched, and an overlay stream at the end that restores the graphics
//! state before filling. The fills therefore land in default user space no
//! matter what the page content does to the CTM.

use blackout_core::BBox;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};

/// Encodes the overlay stream for `rects`.
pub fn overlay_content(rects: &[BBox]) -> Result<Vec<u8>, String> {
    let mut operations = vec![
        // close the `q` opened in front of the page content
        Operation::new("Q", vec![]),
        Operation::new("q", vec![]),
        Operation::new(
            "rg",
            vec![Object::Real(0.0), Object::Real(0.0), Object::Real(0.0)],
        ),
        Operation::new(
            "RG",
            vec![Object::Real(0.0), Object::Real(0.0), Object::Real(0.0)],
        ),
    ];

    for rect in rects {
        log::debug!(
            "[Overlay] fill: x={}, y={}, w={}, h={}",
            rect.x0,
            rect.y0,
            rect.width(),
            rect.height()
        );
        operations.push(Operation::new(
            "re",
            vec![
                Object::Real(rect.x0),
                Object::Real(rect.y0),
                Object::Real(rect.width()),
                Object::Real(rect.height()),
            ],
        ));
        operations.push(Operation::new("f", vec![]));
    }

    operations.push(Operation::new("Q", vec![]));

    Content { operations }.encode().map_err(|e| e.to_string())
}

/// References to the streams currently making up a page's content.
fn content_refs(doc: &mut Document, page_id: ObjectId) -> Result<Vec<Object>, String> {
    let page = doc.get_dictionary(page_id).map_err(|e| e.to_string())?;
    let contents = match page.get(b"Contents") {
        Ok(contents) => contents.clone(),
        Err(_) => return Ok(Vec::new()),
    };

    match contents {
        Object::Reference(id) => match doc.get_object(id).map_err(|e| e.to_string())? {
            Object::Stream(_) => Ok(vec![Object::Reference(id)]),
            Object::Array(items) => Ok(items.clone()),
            _ => Err(format!("page {:?}: /Contents {:?} is not a stream", page_id, id)),
        },
        Object::Array(items) => Ok(items),
        Object::Stream(stream) => Ok(vec![Object::Reference(doc.add_object(stream))]),
        _ => Err(format!("page {:?} has unreadable /Contents", page_id)),
    }
}

/// Fills `rects` black on top of everything drawn by the page.
pub fn append_overlay(doc: &mut Document, page_id: ObjectId, rects: &[BBox]) -> Result<(), String> {
    let rects: Vec<BBox> = rects
        .iter()
        .copied()
        .filter(|r| {
            let finite = [r.x0, r.y0, r.x1, r.y1].iter().all(|v| v.is_finite());
            if !finite {
                log::warn!("[Overlay] skipping non-finite box {:?}", r);
            }
            finite
        })
        .collect();
    if rects.is_empty() {
        return Ok(());
    }

    let mut contents = content_refs(doc, page_id)?;
    let overlay = overlay_content(&rects)?;

    let save_id = doc.add_object(Stream::new(dictionary! {}, b"q\n".to_vec()));
    let overlay_id = doc.add_object(Stream::new(dictionary! {}, overlay));

    contents.insert(0, Object::Reference(save_id));
    contents.push(Object::Reference(overlay_id));

    let page = doc
        .get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(|e| e.to_string())?;
    page.set("Contents", Object::Array(contents));

    log::info!("[Overlay] page {:?}: {} box(es) drawn", page_id, rects.len());
    Ok(())
}
