//! PPTX assembly.
//!
//! Writes an Office Open XML presentation with zip and quick-xml: one
//! "Title Only" slide per outline entry, a bullet text box, and the slide
//! photo when it can be downloaded. A photo that fails to download or decode
//! is logged and left out; the slide itself is always written.

mod parts;
mod xml;

use crate::slide::Slide;
use chrono::{SecondsFormat, Utc};
use image::{ImageFormat, ImageReader};
use parts::*;
use reqwest::Client;
use std::collections::BTreeMap;
use std::io::{Cursor, Write};
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// MIME type of the generated document
pub const PPTX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.presentation";

/// File name offered to clients downloading the document
pub const DOWNLOAD_NAME: &str = "presentation.pptx";

#[derive(Error, Debug)]
pub enum DeckError {
    #[error("failed to write package: {0}")]
    ZipError(#[from] zip::result::ZipError),
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("failed to download image: {0}")]
    FetchError(#[from] reqwest::Error),
    #[error("failed to read image: {0}")]
    ImageError(#[from] image::ImageError),
    #[error("unsupported image format: {0}")]
    UnsupportedImage(String),
}

/// A downloaded slide photo with its pixel size.
#[derive(Debug, Clone)]
pub struct SlideImage {
    bytes: Vec<u8>,
    extension: &'static str,
    content_type: &'static str,
    width: u32,
    height: u32,
}

impl SlideImage {
    /// Identify the format and pixel size of raw image bytes.
    pub fn decode(bytes: Vec<u8>) -> Result<Self, DeckError> {
        let format = image::guess_format(&bytes)?;
        let (extension, content_type) = match format {
            ImageFormat::Png => ("png", "image/png"),
            ImageFormat::Jpeg => ("jpeg", "image/jpeg"),
            ImageFormat::Gif => ("gif", "image/gif"),
            ImageFormat::Bmp => ("bmp", "image/bmp"),
            ImageFormat::Tiff => ("tiff", "image/tiff"),
            other => return Err(DeckError::UnsupportedImage(format!("{other:?}"))),
        };

        let (width, height) = ImageReader::with_format(Cursor::new(&bytes), format).into_dimensions()?;
        if width == 0 || height == 0 {
            return Err(DeckError::UnsupportedImage("zero-sized image".to_string()));
        }

        Ok(Self {
            bytes,
            extension,
            content_type,
            width,
            height,
        })
    }

    /// Width that keeps the aspect ratio at the given height
    pub fn scaled_width(&self, height: i64) -> i64 {
        height * i64::from(self.width) / i64::from(self.height)
    }
}

/// Download and decode the image at `url`
pub async fn fetch_image(client: &Client, url: &str) -> Result<SlideImage, DeckError> {
    let response = client.get(url).send().await?.error_for_status()?;
    let bytes = response.bytes().await?;
    SlideImage::decode(bytes.to_vec())
}

/// Build the document for `slides`, downloading each slide's photo.
pub async fn assemble(client: &Client, slides: &[Slide]) -> Result<Vec<u8>, DeckError> {
    let mut images = Vec::with_capacity(slides.len());
    for slide in slides {
        let image = match slide.image_url.as_deref().filter(|url| !url.is_empty()) {
            Some(url) => match fetch_image(client, url).await {
                Ok(image) => Some(image),
                Err(e) => {
                    tracing::warn!(slide = slide.id, url, error = %e, "failed to download or add image");
                    None
                }
            },
            None => None,
        };
        images.push(image);
    }

    write_pptx(slides, &images)
}

/// Write the package. `images[i]` is the photo for `slides[i]`.
pub fn write_pptx(slides: &[Slide], images: &[Option<SlideImage>]) -> Result<Vec<u8>, DeckError> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

    let count = slides.len();
    let image_for = |i: usize| images.get(i).and_then(Option::as_ref);

    let mut image_types: BTreeMap<&str, &str> = BTreeMap::new();
    for image in images.iter().flatten() {
        image_types.insert(image.extension, image.content_type);
    }
    let image_types: Vec<(&str, &str)> = image_types.into_iter().collect();

    let mut put = |path: &str, data: &[u8], options: SimpleFileOptions| -> Result<(), DeckError> {
        zip.start_file(path, options)?;
        zip.write_all(data)?;
        Ok(())
    };

    put("[Content_Types].xml", &xml::content_types(count, &image_types)?, deflated)?;
    put(
        "_rels/.rels",
        &xml::relationships(&[
            ("rId1", REL_OFFICE_DOCUMENT, PRESENTATION_PATH),
            ("rId2", REL_CORE_PROPERTIES, CORE_PATH),
            ("rId3", REL_EXTENDED_PROPERTIES, APP_PATH),
        ])?,
        deflated,
    )?;

    let title = slides.first().map(|s| s.title.as_str()).unwrap_or_default();
    let created = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
    put(CORE_PATH, &xml::core_properties(title, &created)?, deflated)?;
    put(APP_PATH, &xml::app_properties(count)?, deflated)?;

    put(PRESENTATION_PATH, &xml::presentation(count)?, deflated)?;
    put(
        "ppt/_rels/presentation.xml.rels",
        &xml::presentation_rels(count)?,
        deflated,
    )?;
    put(PRES_PROPS_PATH, PRES_PROPS_XML.as_bytes(), deflated)?;
    put(THEME_PATH, THEME_XML.as_bytes(), deflated)?;
    put(MASTER_PATH, MASTER_XML.as_bytes(), deflated)?;
    put(
        MASTER_RELS_PATH,
        &xml::relationships(&[
            ("rId1", REL_SLIDE_LAYOUT, "../slideLayouts/slideLayout1.xml"),
            ("rId2", REL_THEME, "../theme/theme1.xml"),
        ])?,
        deflated,
    )?;
    put(LAYOUT_PATH, LAYOUT_XML.as_bytes(), deflated)?;
    put(
        LAYOUT_RELS_PATH,
        &xml::relationships(&[("rId1", REL_SLIDE_MASTER, "../slideMasters/slideMaster1.xml")])?,
        deflated,
    )?;

    for (i, slide) in slides.iter().enumerate() {
        let n = i + 1;
        let image = image_for(i);

        let layout_rel = ("rId1", REL_SLIDE_LAYOUT, "../slideLayouts/slideLayout1.xml");
        let rels = match image {
            Some(image) => {
                let media = format!("media/image{n}.{}", image.extension);
                put(&format!("ppt/{media}"), &image.bytes, stored)?;
                let target = format!("../{media}");
                xml::relationships(&[layout_rel, ("rId2", REL_IMAGE, target.as_str())])?
            }
            None => xml::relationships(&[layout_rel])?,
        };

        put(&format!("ppt/slides/slide{n}.xml"), &xml::slide(slide, image)?, deflated)?;
        put(&format!("ppt/slides/_rels/slide{n}.xml.rels"), &rels, deflated)?;
    }

    let cursor = zip.finish()?;
    tracing::info!(slides = count, "presentation written");
    Ok(cursor.into_inner())
}
