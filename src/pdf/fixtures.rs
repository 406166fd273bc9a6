//! In-memory PDF fixtures for tests

use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};

/// A flat PDF with `pages` pages; page `i` (0-based) is `100 + i` points wide
pub fn sample_pdf(pages: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let kids: Vec<Object> = (0..pages)
        .map(|i| add_page(&mut doc, pages_id, Some(100 + i as i64)).into())
        .collect();

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages as i64,
        }),
    );

    finish(doc, pages_id)
}

/// Two pages under an intermediate node that carries the MediaBox (300 wide)
pub fn nested_pdf() -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let root_id = doc.new_object_id();
    let branch_id = doc.new_object_id();

    let kids: Vec<Object> = (0..2)
        .map(|_| add_page(&mut doc, branch_id, None).into())
        .collect();

    doc.objects.insert(
        branch_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Parent" => root_id,
            "Kids" => kids,
            "Count" => 2i64,
            "MediaBox" => media_box(300, 400),
        }),
    );
    doc.objects.insert(
        root_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(branch_id)],
            "Count" => 2i64,
        }),
    );

    finish(doc, root_id)
}

/// Widths of every page's MediaBox, in page order
pub fn page_widths(data: &[u8]) -> Vec<i64> {
    let doc = Document::load_mem(data).unwrap();
    doc.get_pages()
        .into_values()
        .map(|id| {
            let page = doc.get_dictionary(id).unwrap();
            let media_box = page.get(b"MediaBox").unwrap().as_array().unwrap();
            media_box[2].as_i64().unwrap()
        })
        .collect()
}

fn add_page(doc: &mut Document, parent: ObjectId, width: Option<i64>) -> ObjectId {
    let content_id = doc.add_object(Stream::new(Dictionary::new(), Vec::new()));
    let mut page = dictionary! {
        "Type" => "Page",
        "Parent" => parent,
        "Contents" => content_id,
    };
    if let Some(width) = width {
        page.set("MediaBox", media_box(width, 200));
    }
    doc.add_object(page)
}

fn media_box(width: i64, height: i64) -> Object {
    Object::Array(vec![
        Object::Integer(0),
        Object::Integer(0),
        Object::Integer(width),
        Object::Integer(height),
    ])
}

fn finish(mut doc: Document, pages_id: ObjectId) -> Vec<u8> {
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}
