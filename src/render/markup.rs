//! # Markup Preview
//!
//! Renders composed frames as a self-contained HTML document for the
//! interactive editor. Every element is an absolutely positioned `div` at
//! the same coordinates the PDF writer uses, tagged with `data-element-id`
//! and `data-section-id` so clicks and drags can be mapped back to config
//! edits.
//!
//! Selection state is passed in through [`PreviewContext`]; the renderer
//! keeps none of its own.

use std::fmt::Write as FmtWrite;

use serde::{Deserialize, Serialize};

use super::{ElementContent, Frame, FrameElement, RenderSummary, BODY_SIZE, HEADER_SIZE, TITLE_SIZE};
use crate::model::SectionId;

/// What the editor currently has selected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PreviewContext {
    /// Element id under the cursor or last clicked.
    pub selected: Option<String>,
    pub highlighted_section: Option<SectionId>,
}

const STYLE: &str = "\
body{margin:0;background:#e5e5e5;font-family:Helvetica,Arial,sans-serif}\
.page{position:relative;margin:16px auto;background:#fff;\
box-shadow:0 1px 4px rgba(0,0,0,.3);overflow:hidden}\
.el{position:absolute;box-sizing:border-box;overflow:hidden}\
.section-header{font-weight:bold;border-bottom:1px solid #333}\
.column-header{font-weight:bold;background:#f0f0f0;display:flex}\
.row,.totals{display:flex;border-bottom:1px solid #ddd}\
.totals{font-weight:bold}\
.cell{flex:1;padding:0 4px;white-space:nowrap;overflow:hidden;text-overflow:ellipsis}\
.photo .img{background:#e6e6e6}\
.running-header,.page-footer{color:#666}\
.page-footer{text-align:center}\
.empty{color:#888;font-style:italic}\
.selected{outline:2px solid #1a73e8}\
.highlighted{background-color:rgba(26,115,232,.08)}";

/// Render frames to HTML. Returns the document and what was drawn.
pub fn render_preview(frames: &[Frame], context: &PreviewContext) -> (String, RenderSummary) {
    let mut html = String::new();
    let mut summary = RenderSummary::default();

    let _ = write!(
        html,
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><style>{}</style></head><body>\n",
        STYLE
    );

    for frame in frames {
        summary.begin_page(frame.page_number);
        let _ = write!(
            html,
            "<section class=\"page{}\" data-page=\"{}\" style=\"width:{:.2}pt;height:{:.2}pt\">\n",
            if frame.is_cover { " cover" } else { "" },
            frame.page_number,
            frame.width,
            frame.height
        );
        for element in &frame.elements {
            write_element(&mut html, element, context);
            summary.record(&element.id);
        }
        html.push_str("</section>\n");
    }

    html.push_str("</body></html>\n");
    (html, summary)
}

fn class_name(content: &ElementContent) -> &'static str {
    match content {
        ElementContent::CoverBlock { .. } => "cover-block",
        ElementContent::RunningHeader { .. } => "running-header",
        ElementContent::PageFooter { .. } => "page-footer",
        ElementContent::SectionHeader { .. } => "section-header",
        ElementContent::ColumnHeader { .. } => "column-header",
        ElementContent::Row { .. } => "row",
        ElementContent::Totals { .. } => "totals",
        ElementContent::Paragraph { .. } => "paragraph",
        ElementContent::Photo { .. } => "photo",
        ElementContent::Empty { .. } => "empty",
    }
}

fn write_element(html: &mut String, element: &FrameElement, context: &PreviewContext) {
    let mut classes = format!("el {}", class_name(&element.content));
    if context.selected.as_deref() == Some(element.id.as_str()) {
        classes.push_str(" selected");
    }
    if element.section_id.is_some() && context.highlighted_section == element.section_id {
        classes.push_str(" highlighted");
    }

    let _ = write!(
        html,
        "<div class=\"{}\" data-element-id=\"{}\"",
        classes,
        escape_html(&element.id)
    );
    if let Some(section) = &element.section_id {
        let _ = write!(html, " data-section-id=\"{}\"", escape_html(section));
    }
    if let ElementContent::Row { index, .. } = &element.content {
        let _ = write!(html, " data-row=\"{}\"", index);
    }
    let _ = write!(
        html,
        " style=\"left:{:.2}pt;top:{:.2}pt;width:{:.2}pt;height:{:.2}pt;font-size:{:.1}pt\">",
        element.x,
        element.y,
        element.width,
        element.height,
        font_size(&element.content)
    );

    match &element.content {
        ElementContent::CoverBlock {
            project_name,
            report_period,
            subtitle,
            prepared_by,
        } => {
            let _ = write!(html, "<h1>{}</h1>", escape_html(project_name));
            let _ = write!(html, "<h2>{}</h2>", escape_html(report_period));
            if let Some(subtitle) = subtitle {
                let _ = write!(html, "<p>{}</p>", escape_html(subtitle));
            }
            if let Some(by) = prepared_by {
                let _ = write!(html, "<p>Prepared by {}</p>", escape_html(by));
            }
        }
        ElementContent::RunningHeader { text }
        | ElementContent::PageFooter { text }
        | ElementContent::SectionHeader { text, .. }
        | ElementContent::Empty { text } => {
            html.push_str(&escape_html(text));
        }
        ElementContent::ColumnHeader { cells }
        | ElementContent::Row { cells, .. }
        | ElementContent::Totals { cells } => {
            for cell in cells {
                let _ = write!(html, "<span class=\"cell\">{}</span>", escape_html(cell));
            }
        }
        ElementContent::Paragraph { lines, line_height } => {
            for line in lines {
                let _ = write!(
                    html,
                    "<div style=\"height:{:.2}pt\">{}</div>",
                    line_height,
                    escape_html(line)
                );
            }
        }
        ElementContent::Photo { src, caption, .. } => {
            let _ = write!(
                html,
                "<div class=\"img\" style=\"height:calc(100% - {:.0}pt);\
                 background-image:url('{}');background-size:cover\"></div>\
                 <div class=\"caption\">{}</div>",
                super::CAPTION_HEIGHT,
                escape_html(src),
                escape_html(caption)
            );
        }
    }

    html.push_str("</div>\n");
}

fn font_size(content: &ElementContent) -> f64 {
    match content {
        ElementContent::CoverBlock { .. } => TITLE_SIZE,
        ElementContent::SectionHeader { .. } => HEADER_SIZE,
        _ => BODY_SIZE,
    }
}

/// Escape text for use in element content and quoted attributes.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}
