use blackout_core::{
    build_system_prompt, Category, ClassifyError, EntityClassifier, EntityRecord,
    RedactableDocument, RedactionPipeline,
};
use blackout_pdf::{PdfDocument, TextBackend};
use lopdf::content::Content;
use lopdf::{dictionary, Document, Object, Stream};
use std::collections::BTreeMap;

/// Answers from a fixed table, failing on pages it has no answer for.
struct FixedClassifier {
    answers: BTreeMap<u32, &'static str>,
}

impl EntityClassifier for FixedClassifier {
    fn classify(
        &self,
        page: u32,
        _page_text: &str,
        _instruction: &str,
    ) -> Result<EntityRecord, ClassifyError> {
        match self.answers.get(&page) {
            Some(json) => EntityRecord::parse(json),
            None => Err(ClassifyError::Status {
                status: 503,
                body: "unavailable".into(),
            }),
        }
    }
}

fn courier_pdf(pages: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });

    let mut kids = Vec::new();
    for line in pages {
        let content = format!("BT /F1 12 Tf 72 700 Td ({}) Tj ET", line);
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            },
        });
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}

/// Operands of every `re` drawn on a page, in order.
fn drawn_rects(doc: &Document, page_number: u32) -> Vec<Vec<f32>> {
    let page_id = doc.get_pages()[&page_number];
    let mut rects = Vec::new();
    for content_id in doc.get_page_contents(page_id) {
        let stream = doc.get_object(content_id).unwrap().as_stream().unwrap();
        let data = stream.decompressed_content().unwrap_or_else(|_| stream.content.clone());
        let content = Content::decode(&data).unwrap();
        for op in content.operations.iter().filter(|op| op.operator == "re") {
            rects.push(op.operands.iter().map(|o| o.as_float().unwrap()).collect());
        }
    }
    rects
}

#[test]
fn redacts_name_and_email_on_a_real_pdf() {
    let input = courier_pdf(&["Contact John Doe at john@x.com."]);
    let mut pdf = PdfDocument::load_from_bytes_with(&input, TextBackend::Lopdf).unwrap();

    let classifier = FixedClassifier {
        answers: BTreeMap::from([(
            1,
            r#"{"1": {"Name": "John Doe", "Email": "john@x.com"}}"#,
        )]),
    };
    let instruction = build_system_prompt(&[Category::Name, Category::Email]);
    let output = RedactionPipeline::new(classifier)
        .run(&mut pdf, &instruction)
        .unwrap();

    assert_eq!(output.summary.boxes_drawn(), 3);
    assert!(output.summary.is_complete());

    let redacted = Document::load_mem(&output.pdf).unwrap();
    let rects = drawn_rects(&redacted, 1);
    assert_eq!(rects.len(), 3);

    // "John" starts after "Contact " (8 Courier glyphs of 7.2pt)
    let john = &rects[0];
    assert!((john[0] - 129.6).abs() < 0.01, "{:?}", john);
    assert!((john[1] - 697.6).abs() < 0.01, "{:?}", john);
    assert!((john[2] - 28.8).abs() < 0.01, "{:?}", john);
    assert!((john[3] - 12.0).abs() < 0.01, "{:?}", john);

    // trailing period stays in the drawn box: the word box is not trimmed
    let email = &rects[2];
    assert!((email[2] - 11.0 * 7.2).abs() < 0.01, "{:?}", email);
}

#[test]
fn failed_page_is_left_untouched_and_reported() {
    let input = courier_pdf(&["Jane Roe", "Jane Roe again"]);
    let mut pdf = PdfDocument::load_from_bytes(&input).unwrap();

    let classifier = FixedClassifier {
        answers: BTreeMap::from([(2, r#"{"1": {"Name": "Jane Roe"}}"#)]),
    };
    let instruction = build_system_prompt(&[Category::Name]);
    let output = RedactionPipeline::new(classifier)
        .run(&mut pdf, &instruction)
        .unwrap();

    assert!(!output.summary.is_complete());
    let failed: Vec<u32> = output.summary.failed_pages().map(|p| p.page).collect();
    assert_eq!(failed, vec![1]);

    let redacted = PdfDocument::load_from_bytes(&output.pdf).unwrap();
    assert_eq!(redacted.page_count(), 2);
    assert!(drawn_rects(redacted.document(), 1).is_empty());
    assert_eq!(drawn_rects(redacted.document(), 2).len(), 2);
    assert!(output.summary.to_string().contains("page 1 NOT redacted"));
}

#[test]
fn nothing_detected_still_writes_a_document() {
    let input = courier_pdf(&["Quarterly figures"]);
    let mut pdf = PdfDocument::load_from_bytes(&input).unwrap();

    let classifier = FixedClassifier {
        answers: BTreeMap::from([(1, "{}")]),
    };
    let output = RedactionPipeline::new(classifier)
        .run(&mut pdf, &build_system_prompt(&[Category::Email]))
        .unwrap();

    assert_eq!(output.summary.boxes_drawn(), 0);
    let reloaded = PdfDocument::load_from_bytes(&output.pdf).unwrap();
    assert_eq!(reloaded.page_text(0).unwrap(), "Quarterly figures");
}
