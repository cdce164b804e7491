//! # PDF Serializer
//!
//! Takes composed frames and writes a valid PDF file.
//!
//! This is a from-scratch PDF 1.7 writer. The subset a report needs is
//! small: two standard fonts, filled and stroked rectangles, text, and
//! image XObjects. Every frame element becomes a handful of content stream
//! operators at the coordinates the composer gave it. Nothing is moved.
//!
//! ## PDF Structure (simplified)
//!
//! ```text
//! %PDF-1.7            <- header
//! 1 0 obj ... endobj  <- objects (fonts, pages, content streams, etc.)
//! 2 0 obj ... endobj
//! ...
//! xref                <- cross-reference table (byte offsets of each object)
//! trailer             <- points to the root object
//! %%EOF
//! ```
//!
//! ## Fonts
//!
//! Only the standard Helvetica and Helvetica-Bold Type1 fonts are used,
//! with WinAnsiEncoding. Nothing is embedded, which keeps exports small and
//! makes the advance widths in [`crate::text`] exact.

use std::collections::{BTreeMap, BTreeSet};
use std::convert::Infallible;
use std::fmt::Write as FmtWrite; // for write! on String
use std::io::Write as IoWrite; // for write! on Vec<u8>

use miniz_oxide::deflate::compress_to_vec_zlib;

use crate::image_loader::{ImageCache, ImagePixelData, JpegColorSpace, LoadedImage};
use crate::model::Metadata;
use crate::render::{
    ElementContent, Frame, FrameElement, RenderSummary, BODY_SIZE, CAPTION_HEIGHT, HEADER_SIZE,
    TITLE_SIZE,
};
use crate::text::{measure_width, truncate_to_width, FontFace};

/// Horizontal padding inside table cells.
const CELL_PAD: f64 = 4.0;

pub struct PdfWriter;

/// The written document plus what was drawn.
#[derive(Debug, Clone)]
pub struct PdfOutput {
    pub bytes: Vec<u8>,
    pub summary: RenderSummary,
    /// Photo element ids drawn as grey placeholders.
    pub placeholders: Vec<String>,
}

/// Tracks allocated PDF objects during writing.
struct PdfBuilder {
    objects: Vec<PdfObject>,
    /// Embedded images by photo source.
    image_objects: BTreeMap<String, RegisteredImage>,
}

/// An image XObject, referenced as `/Im{index}`.
struct RegisteredImage {
    index: usize,
    obj_id: usize,
    width_px: u32,
    height_px: u32,
}

struct PdfObject {
    data: Vec<u8>,
}

impl PdfBuilder {
    fn push(&mut self, data: Vec<u8>) -> usize {
        let id = self.objects.len();
        self.objects.push(PdfObject { data });
        id
    }
}

impl Default for PdfWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfWriter {
    pub fn new() -> Self {
        Self
    }

    /// Write frames to a PDF byte vector.
    pub fn write(&self, frames: &[Frame], metadata: &Metadata, images: &ImageCache) -> PdfOutput {
        match self.write_checked(frames, metadata, images, |_| Ok::<(), Infallible>(())) {
            Ok(output) => output,
            Err(never) => match never {},
        }
    }

    /// Write frames, calling `check` with the number of pages written before
    /// each page. An error from `check` aborts the export.
    pub fn write_checked<F, E>(
        &self,
        frames: &[Frame],
        metadata: &Metadata,
        images: &ImageCache,
        mut check: F,
    ) -> Result<PdfOutput, E>
    where
        F: FnMut(usize) -> Result<(), E>,
    {
        let mut builder = PdfBuilder {
            objects: Vec::new(),
            image_objects: BTreeMap::new(),
        };

        // Reserve object IDs:
        // 0 = placeholder (PDF objects are 1-indexed)
        // 1 = Catalog
        // 2 = Pages (page tree root)
        // 3, 4 = Helvetica, Helvetica-Bold
        builder.push(Vec::new());
        builder.push(Vec::new());
        builder.push(Vec::new());
        for face in [FontFace::Regular, FontFace::Bold] {
            builder.push(
                format!(
                    "<< /Type /Font /Subtype /Type1 /BaseFont /{} /Encoding /WinAnsiEncoding >>",
                    face.pdf_name()
                )
                .into_bytes(),
            );
        }

        self.register_images(&mut builder, frames, images);

        let mut summary = RenderSummary::default();
        let mut placeholders = Vec::new();
        let mut page_obj_ids: Vec<usize> = Vec::new();

        for (written, frame) in frames.iter().enumerate() {
            check(written)?;
            summary.begin_page(frame.page_number);

            let mut stream = String::new();
            let mut used_images: BTreeSet<usize> = BTreeSet::new();
            for element in &frame.elements {
                match self.write_element(&mut stream, element, frame.height, &builder) {
                    Some(img_idx) => {
                        used_images.insert(img_idx);
                    }
                    None => {
                        if matches!(element.content, ElementContent::Photo { .. }) {
                            placeholders.push(element.id.clone());
                        }
                    }
                }
                summary.record(&element.id);
            }

            let compressed = compress_to_vec_zlib(stream.as_bytes(), 6);
            let mut content_data: Vec<u8> = Vec::new();
            let _ = write!(
                content_data,
                "<< /Length {} /Filter /FlateDecode >>\nstream\n",
                compressed.len()
            );
            content_data.extend_from_slice(&compressed);
            content_data.extend_from_slice(b"\nendstream");
            let content_obj_id = builder.push(content_data);

            let xobjects = Self::build_xobject_resource_dict(&used_images, &builder);
            let resources = if xobjects.is_empty() {
                "/Font << /F0 3 0 R /F1 4 0 R >>".to_string()
            } else {
                format!("/Font << /F0 3 0 R /F1 4 0 R >> /XObject << {} >>", xobjects)
            };
            let page_dict = format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {:.2} {:.2}] \
                 /Contents {} 0 R /Resources << {} >> >>",
                frame.width, frame.height, content_obj_id, resources
            );
            page_obj_ids.push(builder.push(page_dict.into_bytes()));
        }

        builder.objects[1].data = b"<< /Type /Catalog /Pages 2 0 R >>".to_vec();

        let kids: String = page_obj_ids
            .iter()
            .map(|id| format!("{} 0 R", id))
            .collect::<Vec<_>>()
            .join(" ");
        builder.objects[2].data = format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            kids,
            page_obj_ids.len()
        )
        .into_bytes();

        let info_obj_id = Self::write_info(&mut builder, metadata);

        Ok(PdfOutput {
            bytes: self.serialize(&builder, info_obj_id),
            summary,
            placeholders,
        })
    }

    fn write_info(builder: &mut PdfBuilder, metadata: &Metadata) -> Option<usize> {
        if metadata.title.is_none() && metadata.author.is_none() && metadata.subject.is_none() {
            return None;
        }
        let mut info = String::from("<< ");
        if let Some(ref title) = metadata.title {
            let _ = write!(info, "/Title ({}) ", Self::escape_pdf_string(title));
        }
        if let Some(ref author) = metadata.author {
            let _ = write!(info, "/Author ({}) ", Self::escape_pdf_string(author));
        }
        if let Some(ref subject) = metadata.subject {
            let _ = write!(info, "/Subject ({}) ", Self::escape_pdf_string(subject));
        }
        info.push_str("/Producer (Folio 0.1) /Creator (Folio) >>");
        Some(builder.push(info.into_bytes()))
    }

    /// Write a single frame element as PDF operators. Returns the image
    /// index if a photo was drawn from an embedded image.
    fn write_element(
        &self,
        stream: &mut String,
        element: &FrameElement,
        page_height: f64,
        builder: &PdfBuilder,
    ) -> Option<usize> {
        let x = element.x;
        let w = element.width;
        let h = element.height;
        // PDF origin is bottom-left
        let pdf_y = page_height - element.y - h;

        match &element.content {
            ElementContent::CoverBlock {
                project_name,
                report_period,
                subtitle,
                prepared_by,
            } => {
                let mut baseline = element.y + TITLE_SIZE;
                Self::write_text(
                    stream,
                    FontFace::Bold,
                    TITLE_SIZE,
                    x,
                    baseline,
                    page_height,
                    project_name,
                    w,
                );
                baseline += TITLE_SIZE * 0.9;
                Self::write_text(
                    stream,
                    FontFace::Regular,
                    HEADER_SIZE + 3.0,
                    x,
                    baseline,
                    page_height,
                    report_period,
                    w,
                );
                if let Some(subtitle) = subtitle {
                    baseline += HEADER_SIZE * 1.6;
                    Self::write_text(
                        stream,
                        FontFace::Regular,
                        HEADER_SIZE,
                        x,
                        baseline,
                        page_height,
                        subtitle,
                        w,
                    );
                }
                if let Some(by) = prepared_by {
                    baseline += HEADER_SIZE * 1.6;
                    let text = format!("Prepared by {}", by);
                    Self::write_text(
                        stream,
                        FontFace::Regular,
                        BODY_SIZE,
                        x,
                        baseline,
                        page_height,
                        &text,
                        w,
                    );
                }
            }

            ElementContent::RunningHeader { text } => {
                let baseline = Self::centered_baseline(element, BODY_SIZE);
                let _ = write!(stream, "q\n0.4 0.4 0.4 rg\n");
                Self::write_text(
                    stream,
                    FontFace::Regular,
                    BODY_SIZE,
                    x,
                    baseline,
                    page_height,
                    text,
                    w,
                );
                let _ = write!(stream, "Q\n");
                Self::write_rule(stream, x, pdf_y, w, 0.5, 0.6);
            }

            ElementContent::PageFooter { text } => {
                let baseline = Self::centered_baseline(element, BODY_SIZE);
                let tw = measure_width(text, FontFace::Regular, BODY_SIZE);
                let _ = write!(stream, "q\n0.4 0.4 0.4 rg\n");
                Self::write_text(
                    stream,
                    FontFace::Regular,
                    BODY_SIZE,
                    x + (w - tw) / 2.0,
                    baseline,
                    page_height,
                    text,
                    w,
                );
                let _ = write!(stream, "Q\n");
            }

            ElementContent::SectionHeader { text, .. } => {
                let baseline = Self::centered_baseline(element, HEADER_SIZE);
                Self::write_text(
                    stream,
                    FontFace::Bold,
                    HEADER_SIZE,
                    x,
                    baseline,
                    page_height,
                    text,
                    w,
                );
                Self::write_rule(stream, x, pdf_y + 2.0, w, 1.0, 0.2);
            }

            ElementContent::ColumnHeader { cells } => {
                let _ = write!(
                    stream,
                    "q\n0.94 0.94 0.94 rg\n{:.2} {:.2} {:.2} {:.2} re\nf\nQ\n",
                    x, pdf_y, w, h
                );
                Self::write_cells(stream, element, cells, FontFace::Bold, page_height);
            }

            ElementContent::Row { cells, .. } => {
                Self::write_cells(stream, element, cells, FontFace::Regular, page_height);
                Self::write_rule(stream, x, pdf_y, w, 0.5, 0.87);
            }

            ElementContent::Totals { cells } => {
                Self::write_rule(stream, x, pdf_y + h, w, 1.0, 0.2);
                Self::write_cells(stream, element, cells, FontFace::Bold, page_height);
            }

            ElementContent::Paragraph { lines, line_height } => {
                let mut baseline = element.y + (line_height + BODY_SIZE * 0.7) / 2.0;
                for line in lines {
                    Self::write_text(
                        stream,
                        FontFace::Regular,
                        BODY_SIZE,
                        x,
                        baseline,
                        page_height,
                        line,
                        w,
                    );
                    baseline += line_height;
                }
            }

            ElementContent::Photo { src, caption, .. } => {
                let box_h = (h - CAPTION_HEIGHT).max(0.0);
                let box_y = page_height - element.y - box_h;
                let drawn = match builder.image_objects.get(src) {
                    Some(image) => {
                        let img_idx = image.index;
                        // Fit inside the cell, keeping the aspect ratio
                        let iw = image.width_px.max(1) as f64;
                        let ih = image.height_px.max(1) as f64;
                        let scale = (w / iw).min(box_h / ih);
                        let (dw, dh) = (iw * scale, ih * scale);
                        let dx = x + (w - dw) / 2.0;
                        let dy = box_y + (box_h - dh) / 2.0;
                        let _ = write!(
                            stream,
                            "q\n{:.4} 0 0 {:.4} {:.2} {:.2} cm\n/Im{} Do\nQ\n",
                            dw, dh, dx, dy, img_idx
                        );
                        Some(img_idx)
                    }
                    None => {
                        let _ = write!(
                            stream,
                            "q\n0.9 0.9 0.9 rg\n{:.2} {:.2} {:.2} {:.2} re\nf\nQ\n",
                            x, box_y, w, box_h
                        );
                        None
                    }
                };
                let baseline = element.y + box_h + CAPTION_HEIGHT * 0.75;
                Self::write_text(
                    stream,
                    FontFace::Regular,
                    BODY_SIZE - 1.0,
                    x,
                    baseline,
                    page_height,
                    caption,
                    w,
                );
                return drawn;
            }

            ElementContent::Empty { text } => {
                let baseline = Self::centered_baseline(element, BODY_SIZE);
                let _ = write!(stream, "q\n0.53 0.53 0.53 rg\n");
                Self::write_text(
                    stream,
                    FontFace::Regular,
                    BODY_SIZE,
                    x + CELL_PAD,
                    baseline,
                    page_height,
                    text,
                    w,
                );
                let _ = write!(stream, "Q\n");
            }
        }

        None
    }

    /// Baseline (from the page top) that vertically centres one line of
    /// text in an element.
    fn centered_baseline(element: &FrameElement, font_size: f64) -> f64 {
        element.y + (element.height + font_size * 0.7) / 2.0
    }

    /// Cells split the element width evenly.
    fn write_cells(
        stream: &mut String,
        element: &FrameElement,
        cells: &[String],
        face: FontFace,
        page_height: f64,
    ) {
        if cells.is_empty() {
            return;
        }
        let col_w = element.width / cells.len() as f64;
        let baseline = Self::centered_baseline(element, BODY_SIZE);
        for (i, cell) in cells.iter().enumerate() {
            let cx = element.x + i as f64 * col_w + CELL_PAD;
            Self::write_text(
                stream,
                face,
                BODY_SIZE,
                cx,
                baseline,
                page_height,
                cell,
                col_w - 2.0 * CELL_PAD,
            );
        }
    }

    /// Horizontal rule at PDF y `y`.
    fn write_rule(stream: &mut String, x: f64, y: f64, w: f64, line_width: f64, grey: f64) {
        let _ = write!(
            stream,
            "q\n{:.3} G\n{:.2} w\n{:.2} {:.2} m\n{:.2} {:.2} l\nS\nQ\n",
            grey,
            line_width,
            x,
            y,
            x + w,
            y
        );
    }

    /// One line of text, truncated with an ellipsis to `max_width`.
    #[allow(clippy::too_many_arguments)]
    fn write_text(
        stream: &mut String,
        face: FontFace,
        font_size: f64,
        x: f64,
        baseline: f64,
        page_height: f64,
        text: &str,
        max_width: f64,
    ) {
        if text.is_empty() {
            return;
        }
        let fitted = truncate_to_width(text, face, font_size, max_width);
        let font_name = match face {
            FontFace::Regular => "F0",
            FontFace::Bold => "F1",
        };
        let mut text_str = String::new();
        for ch in fitted.chars() {
            let b = Self::unicode_to_winansi(ch).unwrap_or(b'?');
            match b {
                b'\\' => text_str.push_str("\\\\"),
                b'(' => text_str.push_str("\\("),
                b')' => text_str.push_str("\\)"),
                0x20..=0x7E => text_str.push(b as char),
                _ => {
                    // Octal escape outside printable ASCII
                    let _ = write!(text_str, "\\{:03o}", b);
                }
            }
        }
        let _ = write!(
            stream,
            "BT\n/{} {:.1} Tf\n{:.2} {:.2} Td\n({}) Tj\nET\n",
            font_name,
            font_size,
            x,
            page_height - baseline,
            text_str
        );
    }

    /// Create one XObject per distinct loaded photo source.
    fn register_images(&self, builder: &mut PdfBuilder, frames: &[Frame], images: &ImageCache) {
        for element in frames.iter().flat_map(|f| &f.elements) {
            let ElementContent::Photo { src, .. } = &element.content else {
                continue;
            };
            if builder.image_objects.contains_key(src) {
                continue;
            }
            if let Some(image) = images.get(src) {
                let index = builder.image_objects.len();
                let obj_id = Self::write_image_xobject(builder, image);
                builder.image_objects.insert(
                    src.clone(),
                    RegisteredImage {
                        index,
                        obj_id,
                        width_px: image.width_px,
                        height_px: image.height_px,
                    },
                );
            }
        }
    }

    /// Write a single image as one or two XObject PDF objects.
    /// Returns the main XObject ID.
    fn write_image_xobject(builder: &mut PdfBuilder, image: &LoadedImage) -> usize {
        match &image.pixel_data {
            ImagePixelData::Jpeg { data, color_space } => {
                let color_space_str = match color_space {
                    JpegColorSpace::DeviceRGB => "/DeviceRGB",
                    JpegColorSpace::DeviceGray => "/DeviceGray",
                };

                let mut obj_data: Vec<u8> = Vec::new();
                let _ = write!(
                    obj_data,
                    "<< /Type /XObject /Subtype /Image \
                     /Width {} /Height {} \
                     /ColorSpace {} \
                     /BitsPerComponent 8 \
                     /Filter /DCTDecode \
                     /Length {} >>\nstream\n",
                    image.width_px,
                    image.height_px,
                    color_space_str,
                    data.len()
                );
                obj_data.extend_from_slice(data);
                obj_data.extend_from_slice(b"\nendstream");
                builder.push(obj_data)
            }

            ImagePixelData::Decoded { rgb, alpha } => {
                let smask_id = alpha.as_ref().map(|alpha_data| {
                    let compressed_alpha = compress_to_vec_zlib(alpha_data, 6);
                    let mut smask_data: Vec<u8> = Vec::new();
                    let _ = write!(
                        smask_data,
                        "<< /Type /XObject /Subtype /Image \
                         /Width {} /Height {} \
                         /ColorSpace /DeviceGray \
                         /BitsPerComponent 8 \
                         /Filter /FlateDecode \
                         /Length {} >>\nstream\n",
                        image.width_px,
                        image.height_px,
                        compressed_alpha.len()
                    );
                    smask_data.extend_from_slice(&compressed_alpha);
                    smask_data.extend_from_slice(b"\nendstream");
                    builder.push(smask_data)
                });

                let compressed_rgb = compress_to_vec_zlib(rgb, 6);
                let smask_ref = smask_id
                    .map(|id| format!(" /SMask {} 0 R", id))
                    .unwrap_or_default();

                let mut obj_data: Vec<u8> = Vec::new();
                let _ = write!(
                    obj_data,
                    "<< /Type /XObject /Subtype /Image \
                     /Width {} /Height {} \
                     /ColorSpace /DeviceRGB \
                     /BitsPerComponent 8 \
                     /Filter /FlateDecode \
                     /Length {}{} >>\nstream\n",
                    image.width_px,
                    image.height_px,
                    compressed_rgb.len(),
                    smask_ref
                );
                obj_data.extend_from_slice(&compressed_rgb);
                obj_data.extend_from_slice(b"\nendstream");
                builder.push(obj_data)
            }
        }
    }

    /// Build the /XObject resource dict entries for a page.
    fn build_xobject_resource_dict(used: &BTreeSet<usize>, builder: &PdfBuilder) -> String {
        let mut entries: Vec<&RegisteredImage> = builder
            .image_objects
            .values()
            .filter(|image| used.contains(&image.index))
            .collect();
        entries.sort_by_key(|image| image.index);
        entries
            .iter()
            .map(|image| format!("/Im{} {} 0 R", image.index, image.obj_id))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Escape special characters in a PDF string.
    fn escape_pdf_string(s: &str) -> String {
        s.replace('\\', "\\\\")
            .replace('(', "\\(")
            .replace(')', "\\)")
    }

    /// Map a Unicode codepoint to a WinAnsiEncoding byte value.
    ///
    /// WinAnsiEncoding is based on Windows-1252. Most codepoints in
    /// 0x20..=0x7E and 0xA0..=0xFF map directly. The 0x80..=0x9F range
    /// contains special mappings for smart quotes, bullets, dashes, etc.
    fn unicode_to_winansi(ch: char) -> Option<u8> {
        let cp = ch as u32;
        if (0x20..=0x7E).contains(&cp) || (0xA0..=0xFF).contains(&cp) {
            return Some(cp as u8);
        }
        match cp {
            0x20AC => Some(0x80), // Euro sign
            0x201A => Some(0x82), // Single low-9 quotation mark
            0x0192 => Some(0x83), // Latin small letter f with hook
            0x201E => Some(0x84), // Double low-9 quotation mark
            0x2026 => Some(0x85), // Horizontal ellipsis
            0x2020 => Some(0x86), // Dagger
            0x2021 => Some(0x87), // Double dagger
            0x02C6 => Some(0x88), // Modifier letter circumflex accent
            0x2030 => Some(0x89), // Per mille sign
            0x0160 => Some(0x8A), // Latin capital letter S with caron
            0x2039 => Some(0x8B), // Single left-pointing angle quotation
            0x0152 => Some(0x8C), // Latin capital ligature OE
            0x017D => Some(0x8E), // Latin capital letter Z with caron
            0x2018 => Some(0x91), // Left single quotation mark
            0x2019 => Some(0x92), // Right single quotation mark
            0x201C => Some(0x93), // Left double quotation mark
            0x201D => Some(0x94), // Right double quotation mark
            0x2022 => Some(0x95), // Bullet
            0x2013 => Some(0x96), // En dash
            0x2014 => Some(0x97), // Em dash
            0x02DC => Some(0x98), // Small tilde
            0x2122 => Some(0x99), // Trade mark sign
            0x0161 => Some(0x9A), // Latin small letter s with caron
            0x203A => Some(0x9B), // Single right-pointing angle quotation
            0x0153 => Some(0x9C), // Latin small ligature oe
            0x017E => Some(0x9E), // Latin small letter z with caron
            0x0178 => Some(0x9F), // Latin capital letter Y with diaeresis
            _ => None,
        }
    }

    /// Serialize all objects into the final PDF byte stream.
    fn serialize(&self, builder: &PdfBuilder, info_obj_id: Option<usize>) -> Vec<u8> {
        let mut output: Vec<u8> = Vec::new();
        let mut offsets: Vec<usize> = vec![0; builder.objects.len()];

        output.extend_from_slice(b"%PDF-1.7\n");
        output.extend_from_slice(b"%\xe2\xe3\xcf\xd3\n");

        for (i, obj) in builder.objects.iter().enumerate().skip(1) {
            offsets[i] = output.len();
            let header = format!("{} 0 obj\n", i);
            output.extend_from_slice(header.as_bytes());
            output.extend_from_slice(&obj.data);
            output.extend_from_slice(b"\nendobj\n\n");
        }

        let xref_offset = output.len();
        let _ = write!(output, "xref\n0 {}\n", builder.objects.len());
        let _ = write!(output, "0000000000 65535 f \n");
        for offset in offsets.iter().skip(1) {
            let _ = write!(output, "{:010} 00000 n \n", offset);
        }

        let _ = write!(output, "trailer\n<< /Size {} /Root 1 0 R", builder.objects.len());
        if let Some(info_id) = info_obj_id {
            let _ = write!(output, " /Info {} 0 R", info_id);
        }
        let _ = write!(output, " >>\nstartxref\n{}\n%%EOF\n", xref_offset);

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExportError;

    fn page(elements: Vec<FrameElement>) -> Frame {
        Frame {
            page_number: 1,
            is_cover: false,
            width: 612.0,
            height: 792.0,
            content_left: 36.0,
            content_top: 36.0,
            content_width: 540.0,
            content_bottom: 738.0,
            elements,
        }
    }

    fn photo(src: &str) -> FrameElement {
        FrameElement {
            id: "photos:photo:p1".into(),
            section_id: Some("photos".into()),
            x: 36.0,
            y: 36.0,
            width: 264.0,
            height: 190.0,
            content: ElementContent::Photo {
                photo_id: "p1".into(),
                src: src.into(),
                caption: "North elevation".into(),
            },
        }
    }

    fn contains(bytes: &[u8], needle: &[u8]) -> bool {
        bytes.windows(needle.len()).any(|w| w == needle)
    }

    #[test]
    fn test_escape_pdf_string() {
        assert_eq!(
            PdfWriter::escape_pdf_string("Hello (World)"),
            "Hello \\(World\\)"
        );
        assert_eq!(
            PdfWriter::escape_pdf_string("back\\slash"),
            "back\\\\slash"
        );
    }

    #[test]
    fn test_empty_document_produces_valid_pdf() {
        let output = PdfWriter::new().write(
            &[page(vec![])],
            &Metadata::default(),
            &ImageCache::new(),
        );
        let bytes = &output.bytes;

        assert!(bytes.starts_with(b"%PDF-1.7"));
        assert!(contains(bytes, b"%%EOF"));
        assert!(contains(bytes, b"xref"));
        assert!(contains(bytes, b"trailer"));
        assert!(contains(bytes, b"/Count 1"));
        assert!(contains(bytes, b"/BaseFont /Helvetica-Bold"));
        assert_eq!(output.summary.page_count(), 1);
    }

    #[test]
    fn test_metadata_in_pdf() {
        let metadata = Metadata {
            title: Some("Weekly Report".to_string()),
            author: Some("Site Office".to_string()),
            subject: None,
        };
        let output = PdfWriter::new().write(&[page(vec![])], &metadata, &ImageCache::new());
        let text = String::from_utf8_lossy(&output.bytes);

        assert!(text.contains("/Title (Weekly Report)"));
        assert!(text.contains("/Author (Site Office)"));
        assert!(!text.contains("/Subject"));
    }

    #[test]
    fn test_winansi_mapping() {
        assert_eq!(PdfWriter::unicode_to_winansi('A'), Some(b'A'));
        assert_eq!(PdfWriter::unicode_to_winansi('\u{2014}'), Some(0x97));
        assert_eq!(PdfWriter::unicode_to_winansi('\u{4E2D}'), None);
    }

    #[test]
    fn test_missing_photo_draws_placeholder() {
        let mut images = ImageCache::new();
        images.load("./missing/photo.jpg");
        let output = PdfWriter::new().write(
            &[page(vec![photo("./missing/photo.jpg")])],
            &Metadata::default(),
            &images,
        );
        assert_eq!(output.placeholders, vec!["photos:photo:p1".to_string()]);
        assert!(!contains(&output.bytes, b"/XObject"));
        assert_eq!(output.summary.pages[0].element_ids, vec!["photos:photo:p1"]);
    }

    #[test]
    fn test_loaded_photo_embeds_xobject() {
        let img = image::RgbImage::from_fn(2, 2, |_, _| image::Rgb([200, 120, 40]));
        let mut buf = Vec::new();
        let encoder = image::codecs::jpeg::JpegEncoder::new(&mut buf);
        image::ImageEncoder::write_image(encoder, img.as_raw(), 2, 2, image::ColorType::Rgb8)
            .unwrap();
        use base64::Engine;
        let src = format!(
            "data:image/jpeg;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(&buf)
        );

        let frames = vec![page(vec![photo(&src)])];
        let images = ImageCache::for_frames(&frames);
        let output = PdfWriter::new().write(&frames, &Metadata::default(), &images);
        assert!(output.placeholders.is_empty());
        assert!(contains(&output.bytes, b"/Filter /DCTDecode"));
        assert!(contains(&output.bytes, b"/XObject << /Im0"));
    }

    #[test]
    fn test_check_aborts_between_pages() {
        let frames = vec![page(vec![]), page(vec![]), page(vec![])];
        let result = PdfWriter::new().write_checked(
            &frames,
            &Metadata::default(),
            &ImageCache::new(),
            |written| {
                if written == 2 {
                    Err(ExportError::TimedOut)
                } else {
                    Ok(())
                }
            },
        );
        assert_eq!(result.unwrap_err(), ExportError::TimedOut);
    }
}
