//! Tiny PDF builder for parser tests, using lopdf directly.

use lopdf::dictionary;
use lopdf::{Document, Object, ObjectId, Stream};

/// A line of text placed at (x, y) in PDF points with a 12pt Helvetica font.
pub(crate) type Placed<'a> = (i64, i64, &'a str);

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('(', "\\(")
        .replace(')', "\\)")
}

/// Content stream drawing each item in its own text object.
pub(crate) fn content_for(items: &[Placed<'_>]) -> Vec<u8> {
    items
        .iter()
        .map(|(x, y, text)| format!("BT /F1 12 Tf {x} {y} Td ({}) Tj ET\n", escape(text)))
        .collect::<String>()
        .into_bytes()
}

/// Build a PDF with one page per raw content stream.
pub(crate) fn make_pdf_from_contents(contents: &[Vec<u8>], info: Option<&[(&str, &str)]>) -> Vec<u8> {
    let mut doc = Document::with_version("1.4");

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let pages_id = doc.new_object_id();
    let mut kids: Vec<Object> = Vec::new();

    for content in contents {
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.clone()));
        let page_id: ObjectId = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => dictionary! {
                    "F1" => font_id,
                },
            },
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

    if let Some(entries) = info {
        let mut dict = lopdf::Dictionary::new();
        for (key, value) in entries {
            dict.set(key.as_bytes().to_vec(), Object::string_literal(*value));
        }
        let info_id = doc.add_object(dict);
        doc.trailer.set("Info", info_id);
    }

    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}

/// Build a PDF with one page per item list.
pub(crate) fn make_pdf(pages: &[Vec<Placed<'_>>]) -> Vec<u8> {
    let contents: Vec<Vec<u8>> = pages.iter().map(|items| content_for(items)).collect();
    make_pdf_from_contents(&contents, None)
}

/// Single page, single line of text.
pub(crate) fn make_text_pdf(text: &str) -> Vec<u8> {
    make_pdf(&[vec![(72, 700, text)]])
}

/// Single page drawn with a Type0 / Identity-H font. Each character of
/// `text` gets its own two-byte code (1, 2, ...) mapped back through a
/// `/ToUnicode` CMap, the way word processors embed subset fonts.
pub(crate) fn make_identity_h_pdf(text: &str) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");

    let bfchars: String = text
        .encode_utf16()
        .enumerate()
        .map(|(i, unit)| format!("<{:04X}> <{:04X}>\n", i + 1, unit))
        .collect();
    let cmap = format!(
        "/CIDInit /ProcSet findresource begin\n\
         12 dict begin\n\
         begincmap\n\
         /CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n\
         /CMapName /Adobe-Identity-UCS def\n\
         /CMapType 2 def\n\
         1 begincodespacerange\n\
         <0000> <FFFF>\n\
         endcodespacerange\n\
         {} beginbfchar\n\
         {bfchars}\
         endbfchar\n\
         endcmap\n\
         CMapName currentdict /CMap defineresource pop\n\
         end\n\
         end\n",
        text.encode_utf16().count()
    );
    let to_unicode_id = doc.add_object(Stream::new(dictionary! {}, cmap.into_bytes()));

    let descendant_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "CIDFontType2",
        "BaseFont" => "ABCDEF+Calibri",
        "CIDSystemInfo" => dictionary! {
            "Registry" => Object::string_literal("Adobe"),
            "Ordering" => Object::string_literal("Identity"),
            "Supplement" => 0i64,
        },
    });
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type0",
        "BaseFont" => "ABCDEF+Calibri",
        "Encoding" => "Identity-H",
        "DescendantFonts" => vec![descendant_id.into()],
        "ToUnicode" => to_unicode_id,
    });

    let codes: String = (1..=text.encode_utf16().count())
        .map(|code| format!("{code:04X}"))
        .collect();
    let content = format!("BT /F1 12 Tf 72 700 Td <{codes}> Tj ET\n");
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));

    let pages_id = doc.new_object_id();
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        "Contents" => content_id,
        "Resources" => dictionary! {
            "Font" => dictionary! {
                "F1" => font_id,
            },
        },
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}
