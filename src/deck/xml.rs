//! XML for the generated parts of a package.

use super::parts::*;
use super::{DeckError, SlideImage};
use crate::slide::Slide;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

pub const EMU_PER_INCH: i64 = 914_400;

pub const SLIDE_WIDTH: i64 = 10 * EMU_PER_INCH;
pub const SLIDE_HEIGHT: i64 = 7 * EMU_PER_INCH + EMU_PER_INCH / 2;

const TEXT_BOX_LEFT: i64 = EMU_PER_INCH;
const TEXT_BOX_TOP: i64 = EMU_PER_INCH * 3 / 2;
const TEXT_BOX_WIDTH: i64 = EMU_PER_INCH * 11 / 2;
const TEXT_BOX_HEIGHT: i64 = 4 * EMU_PER_INCH;

const IMAGE_LEFT: i64 = EMU_PER_INCH * 13 / 2;
const IMAGE_TOP: i64 = 2 * EMU_PER_INCH;
pub const IMAGE_HEIGHT: i64 = 3 * EMU_PER_INCH;

// Font sizes and spacing in hundredths of a point
const TITLE_SIZE: &str = "2400";
const BULLET_SIZE: &str = "1800";
const BULLET_SPACE_AFTER: &str = "1000";
const BULLET_COLOR: &str = "000000";

/// Thin wrapper over the quick-xml writer for flat, attribute-heavy markup.
pub struct XmlWriter {
    inner: Writer<Vec<u8>>,
}

impl XmlWriter {
    pub fn new() -> Result<Self, DeckError> {
        let mut inner = Writer::new(Vec::new());
        inner.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
        Ok(Self { inner })
    }

    pub fn start(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<(), DeckError> {
        let element = BytesStart::new(name).with_attributes(attrs.iter().copied());
        self.inner.write_event(Event::Start(element))?;
        Ok(())
    }

    pub fn end(&mut self, name: &str) -> Result<(), DeckError> {
        self.inner.write_event(Event::End(BytesEnd::new(name)))?;
        Ok(())
    }

    pub fn empty(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<(), DeckError> {
        let element = BytesStart::new(name).with_attributes(attrs.iter().copied());
        self.inner.write_event(Event::Empty(element))?;
        Ok(())
    }

    pub fn text(&mut self, text: &str) -> Result<(), DeckError> {
        self.inner.write_event(Event::Text(BytesText::new(text)))?;
        Ok(())
    }

    /// `<name attrs>text</name>`
    pub fn element(&mut self, name: &str, attrs: &[(&str, &str)], text: &str) -> Result<(), DeckError> {
        self.start(name, attrs)?;
        self.text(text)?;
        self.end(name)
    }

    pub fn finish(self) -> Vec<u8> {
        self.inner.into_inner()
    }
}

/// A relationship entry: id, type URI, target
pub type Relationship<'a> = (&'a str, &'a str, &'a str);

pub fn relationships(rels: &[Relationship<'_>]) -> Result<Vec<u8>, DeckError> {
    let mut xml = XmlWriter::new()?;
    xml.start("Relationships", &[("xmlns", NS_RELS)])?;
    for &(id, kind, target) in rels {
        xml.empty(
            "Relationship",
            &[("Id", id), ("Type", kind), ("Target", target)],
        )?;
    }
    xml.end("Relationships")?;
    Ok(xml.finish())
}

/// `[Content_Types].xml` for `slide_count` slides and the given image
/// extensions with their content types.
pub fn content_types(slide_count: usize, images: &[(&str, &str)]) -> Result<Vec<u8>, DeckError> {
    let mut xml = XmlWriter::new()?;
    xml.start("Types", &[("xmlns", NS_CONTENT_TYPES)])?;
    xml.empty("Default", &[("Extension", "rels"), ("ContentType", CT_RELS)])?;
    xml.empty("Default", &[("Extension", "xml"), ("ContentType", CT_XML)])?;
    for &(extension, content_type) in images {
        xml.empty(
            "Default",
            &[("Extension", extension), ("ContentType", content_type)],
        )?;
    }

    let fixed = [
        (PRESENTATION_PATH, CT_PRESENTATION),
        (MASTER_PATH, CT_SLIDE_MASTER),
        (LAYOUT_PATH, CT_SLIDE_LAYOUT),
        (THEME_PATH, CT_THEME),
        (PRES_PROPS_PATH, CT_PRES_PROPS),
        (CORE_PATH, CT_CORE_PROPERTIES),
        (APP_PATH, CT_EXTENDED_PROPERTIES),
    ];
    for (path, content_type) in fixed {
        let part = format!("/{path}");
        xml.empty("Override", &[("PartName", part.as_str()), ("ContentType", content_type)])?;
    }
    for n in 1..=slide_count {
        let part = format!("/ppt/slides/slide{n}.xml");
        xml.empty("Override", &[("PartName", part.as_str()), ("ContentType", CT_SLIDE)])?;
    }

    xml.end("Types")?;
    Ok(xml.finish())
}

/// `ppt/presentation.xml`. Relationship ids follow the layout of
/// [`presentation_rels`]: rId1 master, rId2 theme, rId3 properties, then slides.
pub fn presentation(slide_count: usize) -> Result<Vec<u8>, DeckError> {
    let mut xml = XmlWriter::new()?;
    xml.start(
        "p:presentation",
        &[("xmlns:a", NS_A), ("xmlns:r", NS_R), ("xmlns:p", NS_P), ("saveSubsetFonts", "1")],
    )?;

    xml.start("p:sldMasterIdLst", &[])?;
    xml.empty("p:sldMasterId", &[("id", MASTER_ID), ("r:id", "rId1")])?;
    xml.end("p:sldMasterIdLst")?;

    if slide_count > 0 {
        xml.start("p:sldIdLst", &[])?;
        for n in 0..slide_count {
            let id = (256 + n).to_string();
            let rel = format!("rId{}", n + 4);
            xml.empty("p:sldId", &[("id", id.as_str()), ("r:id", rel.as_str())])?;
        }
        xml.end("p:sldIdLst")?;
    }

    let (cx, cy) = (SLIDE_WIDTH.to_string(), SLIDE_HEIGHT.to_string());
    xml.empty("p:sldSz", &[("cx", cx.as_str()), ("cy", cy.as_str()), ("type", "screen4x3")])?;
    xml.empty("p:notesSz", &[("cx", cy.as_str()), ("cy", cx.as_str())])?;
    xml.end("p:presentation")?;
    Ok(xml.finish())
}

pub fn presentation_rels(slide_count: usize) -> Result<Vec<u8>, DeckError> {
    let slide_ids: Vec<String> = (0..slide_count).map(|n| format!("rId{}", n + 4)).collect();
    let slide_targets: Vec<String> = (1..=slide_count).map(|n| format!("slides/slide{n}.xml")).collect();

    let mut rels: Vec<Relationship<'_>> = vec![
        ("rId1", REL_SLIDE_MASTER, "slideMasters/slideMaster1.xml"),
        ("rId2", REL_THEME, "theme/theme1.xml"),
        ("rId3", REL_PRES_PROPS, "presProps.xml"),
    ];
    rels.extend(
        slide_ids
            .iter()
            .zip(&slide_targets)
            .map(|(id, target)| (id.as_str(), REL_SLIDE, target.as_str())),
    );
    relationships(&rels)
}

/// `docProps/core.xml`
pub fn core_properties(title: &str, created: &str) -> Result<Vec<u8>, DeckError> {
    let mut xml = XmlWriter::new()?;
    xml.start(
        "cp:coreProperties",
        &[
            ("xmlns:cp", "http://schemas.openxmlformats.org/package/2006/metadata/core-properties"),
            ("xmlns:dc", "http://purl.org/dc/elements/1.1/"),
            ("xmlns:dcterms", "http://purl.org/dc/terms/"),
            ("xmlns:dcmitype", "http://purl.org/dc/dcmitype/"),
            ("xmlns:xsi", "http://www.w3.org/2001/XMLSchema-instance"),
        ],
    )?;
    xml.element("dc:title", &[], title)?;
    xml.element("dc:creator", &[], "slidesmith")?;
    xml.element("dcterms:created", &[("xsi:type", "dcterms:W3CDTF")], created)?;
    xml.element("dcterms:modified", &[("xsi:type", "dcterms:W3CDTF")], created)?;
    xml.end("cp:coreProperties")?;
    Ok(xml.finish())
}

/// `docProps/app.xml`
pub fn app_properties(slide_count: usize) -> Result<Vec<u8>, DeckError> {
    let mut xml = XmlWriter::new()?;
    xml.start(
        "Properties",
        &[
            ("xmlns", "http://schemas.openxmlformats.org/officeDocument/2006/extended-properties"),
            ("xmlns:vt", "http://schemas.openxmlformats.org/officeDocument/2006/docPropsVTypes"),
        ],
    )?;
    xml.element("Application", &[], "slidesmith")?;
    xml.element("Slides", &[], &slide_count.to_string())?;
    xml.end("Properties")?;
    Ok(xml.finish())
}

/// One slide: title placeholder, bullet text box, and the optional picture
/// referenced through relationship `rId2`.
pub fn slide(slide: &Slide, image: Option<&SlideImage>) -> Result<Vec<u8>, DeckError> {
    let mut xml = XmlWriter::new()?;
    xml.start("p:sld", &[("xmlns:a", NS_A), ("xmlns:r", NS_R), ("xmlns:p", NS_P)])?;
    xml.start("p:cSld", &[])?;
    xml.start("p:spTree", &[])?;

    xml.start("p:nvGrpSpPr", &[])?;
    xml.empty("p:cNvPr", &[("id", "1"), ("name", "")])?;
    xml.empty("p:cNvGrpSpPr", &[])?;
    xml.empty("p:nvPr", &[])?;
    xml.end("p:nvGrpSpPr")?;
    xml.start("p:grpSpPr", &[])?;
    xml.start("a:xfrm", &[])?;
    xml.empty("a:off", &[("x", "0"), ("y", "0")])?;
    xml.empty("a:ext", &[("cx", "0"), ("cy", "0")])?;
    xml.empty("a:chOff", &[("x", "0"), ("y", "0")])?;
    xml.empty("a:chExt", &[("cx", "0"), ("cy", "0")])?;
    xml.end("a:xfrm")?;
    xml.end("p:grpSpPr")?;

    write_title(&mut xml, &slide.title)?;
    write_points(&mut xml, &slide.points)?;
    if let Some(image) = image {
        write_picture(&mut xml, image)?;
    }

    xml.end("p:spTree")?;
    xml.end("p:cSld")?;
    xml.start("p:clrMapOvr", &[])?;
    xml.empty("a:masterClrMapping", &[])?;
    xml.end("p:clrMapOvr")?;
    xml.end("p:sld")?;
    Ok(xml.finish())
}

fn write_title(xml: &mut XmlWriter, title: &str) -> Result<(), DeckError> {
    xml.start("p:sp", &[])?;
    xml.start("p:nvSpPr", &[])?;
    xml.empty("p:cNvPr", &[("id", "2"), ("name", "Title 1")])?;
    xml.start("p:cNvSpPr", &[])?;
    xml.empty("a:spLocks", &[("noGrp", "1")])?;
    xml.end("p:cNvSpPr")?;
    xml.start("p:nvPr", &[])?;
    xml.empty("p:ph", &[("type", "title")])?;
    xml.end("p:nvPr")?;
    xml.end("p:nvSpPr")?;
    xml.empty("p:spPr", &[])?;

    xml.start("p:txBody", &[])?;
    xml.empty("a:bodyPr", &[])?;
    xml.empty("a:lstStyle", &[])?;
    xml.start("a:p", &[])?;
    xml.start("a:r", &[])?;
    xml.empty("a:rPr", &[("lang", "en-US"), ("sz", TITLE_SIZE), ("b", "1"), ("dirty", "0")])?;
    xml.element("a:t", &[], title)?;
    xml.end("a:r")?;
    xml.end("a:p")?;
    xml.end("p:txBody")?;
    xml.end("p:sp")
}

fn write_points(xml: &mut XmlWriter, points: &[String]) -> Result<(), DeckError> {
    xml.start("p:sp", &[])?;
    xml.start("p:nvSpPr", &[])?;
    xml.empty("p:cNvPr", &[("id", "3"), ("name", "TextBox 2")])?;
    xml.empty("p:cNvSpPr", &[("txBox", "1")])?;
    xml.empty("p:nvPr", &[])?;
    xml.end("p:nvSpPr")?;

    xml.start("p:spPr", &[])?;
    write_xfrm(xml, TEXT_BOX_LEFT, TEXT_BOX_TOP, TEXT_BOX_WIDTH, TEXT_BOX_HEIGHT)?;
    write_rect_geometry(xml)?;
    xml.empty("a:noFill", &[])?;
    xml.end("p:spPr")?;

    xml.start("p:txBody", &[])?;
    xml.empty("a:bodyPr", &[("wrap", "square")])?;
    xml.empty("a:lstStyle", &[])?;
    if points.is_empty() {
        // A text body needs at least one paragraph
        xml.empty("a:p", &[])?;
    }
    for point in points {
        xml.start("a:p", &[])?;
        xml.start("a:pPr", &[("algn", "l")])?;
        xml.start("a:spcAft", &[])?;
        xml.empty("a:spcPts", &[("val", BULLET_SPACE_AFTER)])?;
        xml.end("a:spcAft")?;
        xml.end("a:pPr")?;
        xml.start("a:r", &[])?;
        xml.start("a:rPr", &[("lang", "en-US"), ("sz", BULLET_SIZE), ("dirty", "0")])?;
        xml.start("a:solidFill", &[])?;
        xml.empty("a:srgbClr", &[("val", BULLET_COLOR)])?;
        xml.end("a:solidFill")?;
        xml.end("a:rPr")?;
        xml.element("a:t", &[], point)?;
        xml.end("a:r")?;
        xml.end("a:p")?;
    }
    xml.end("p:txBody")?;
    xml.end("p:sp")
}

fn write_picture(xml: &mut XmlWriter, image: &SlideImage) -> Result<(), DeckError> {
    xml.start("p:pic", &[])?;
    xml.start("p:nvPicPr", &[])?;
    xml.empty("p:cNvPr", &[("id", "4"), ("name", "Picture 3")])?;
    xml.start("p:cNvPicPr", &[])?;
    xml.empty("a:picLocks", &[("noChangeAspect", "1")])?;
    xml.end("p:cNvPicPr")?;
    xml.empty("p:nvPr", &[])?;
    xml.end("p:nvPicPr")?;

    xml.start("p:blipFill", &[])?;
    xml.empty("a:blip", &[("r:embed", "rId2")])?;
    xml.start("a:stretch", &[])?;
    xml.empty("a:fillRect", &[])?;
    xml.end("a:stretch")?;
    xml.end("p:blipFill")?;

    xml.start("p:spPr", &[])?;
    write_xfrm(xml, IMAGE_LEFT, IMAGE_TOP, image.scaled_width(IMAGE_HEIGHT), IMAGE_HEIGHT)?;
    write_rect_geometry(xml)?;
    xml.end("p:spPr")?;
    xml.end("p:pic")
}

fn write_xfrm(xml: &mut XmlWriter, x: i64, y: i64, cx: i64, cy: i64) -> Result<(), DeckError> {
    let (x, y, cx, cy) = (x.to_string(), y.to_string(), cx.to_string(), cy.to_string());
    xml.start("a:xfrm", &[])?;
    xml.empty("a:off", &[("x", x.as_str()), ("y", y.as_str())])?;
    xml.empty("a:ext", &[("cx", cx.as_str()), ("cy", cy.as_str())])?;
    xml.end("a:xfrm")
}

fn write_rect_geometry(xml: &mut XmlWriter) -> Result<(), DeckError> {
    xml.start("a:prstGeom", &[("prst", "rect")])?;
    xml.empty("a:avLst", &[])?;
    xml.end("a:prstGeom")
}
