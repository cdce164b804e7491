//! # Page Composition
//!
//! Walks a [`PageMap`] once and positions everything each page shows. The
//! result is a list of [`Frame`]s, one per page, holding absolutely
//! positioned elements with stable ids.
//!
//! Both renderers interpret these frames and nothing else: the markup
//! preview ([`markup`]) and the PDF writer ([`crate::pdf`]). Neither one
//! decides where a section goes or where a table is cut, which is what keeps
//! the preview and the exported document in agreement.
//!
//! Coordinates are in points, origin at the top-left corner of the page,
//! y growing downward.

pub mod markup;

use serde::Serialize;

use crate::error::RenderError;
use crate::height::{DensityScale, HeightModel, SectionLayout};
use crate::layout::{LayoutInput, PageMap, PagePlacement};
use crate::model::{CoverData, SectionData, SectionDescriptor, SectionId, SectionKind};
use crate::text::{break_into_lines, FontFace};

/// Body text size for rows, paragraphs and captions.
pub const BODY_SIZE: f64 = 9.0;
pub const HEADER_SIZE: f64 = 11.0;
pub const TITLE_SIZE: f64 = 24.0;
/// Space between narrative columns and photo cells.
pub const GUTTER: f64 = 12.0;
pub const CAPTION_HEIGHT: f64 = 12.0;

/// One composed page.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Frame {
    pub page_number: usize,
    pub is_cover: bool,
    pub width: f64,
    pub height: f64,
    pub content_left: f64,
    pub content_top: f64,
    pub content_width: f64,
    /// Lowest y section content may reach.
    pub content_bottom: f64,
    pub elements: Vec<FrameElement>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameElement {
    pub id: String,
    /// `None` for page chrome (running header, page number).
    pub section_id: Option<SectionId>,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub content: ElementContent,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ElementContent {
    CoverBlock {
        project_name: String,
        report_period: String,
        subtitle: Option<String>,
        prepared_by: Option<String>,
    },
    RunningHeader {
        text: String,
    },
    PageFooter {
        text: String,
    },
    SectionHeader {
        text: String,
        continued: bool,
    },
    ColumnHeader {
        cells: Vec<String>,
    },
    Row {
        index: usize,
        cells: Vec<String>,
    },
    Totals {
        cells: Vec<String>,
    },
    Paragraph {
        lines: Vec<String>,
        line_height: f64,
    },
    Photo {
        photo_id: String,
        src: String,
        caption: String,
    },
    Empty {
        text: String,
    },
}

impl ElementContent {
    pub fn is_header(&self) -> bool {
        matches!(
            self,
            ElementContent::SectionHeader { .. } | ElementContent::ColumnHeader { .. }
        )
    }
}

/// Text of a section header, with the continuation marker.
pub fn header_text(title: &str, continued: bool) -> String {
    if continued {
        format!("{} (Continued)", title)
    } else {
        title.to_string()
    }
}

/// Compose every page of a page map.
pub fn compose(page_map: &PageMap, input: &LayoutInput, model: &HeightModel) -> Vec<Frame> {
    let running_title = running_title(input);
    let mut frames = Vec::with_capacity(page_map.pages.len());
    let mut first_content_page = true;

    for page in &page_map.pages {
        if page.is_first_page {
            frames.push(cover_frame(page.page_number, input));
            continue;
        }

        let first = std::mem::replace(&mut first_content_page, false);
        let mut composer = PageComposer::new(page.page_number, first, input, model);
        composer.chrome(&running_title, page_map.total_pages);
        for placement in &page.sections {
            composer.placement(placement);
        }
        frames.push(composer.finish());
    }

    frames
}

fn cover_data<'a>(
    input: &LayoutInput<'a>,
) -> Option<(&'a SectionDescriptor, Option<&'a CoverData>)> {
    let cover = input
        .config
        .included_sections()
        .into_iter()
        .find(|s| s.kind == SectionKind::Cover)?;
    let data = match input.report.get(&cover.id) {
        Some(SectionData::Cover(data)) => Some(data),
        _ => None,
    };
    Some((cover, data))
}

fn running_title(input: &LayoutInput) -> String {
    let data = input
        .report
        .sections
        .values()
        .find_map(|d| match d {
            SectionData::Cover(c) => Some(c),
            _ => None,
        });
    match data {
        Some(c) if !c.report_period.is_empty() => {
            format!("{} | {}", c.project_name, c.report_period)
        }
        Some(c) => c.project_name.clone(),
        None => input.config.project_id.clone(),
    }
}

fn cover_frame(page_number: usize, input: &LayoutInput) -> Frame {
    let geometry = input.geometry;
    let (width, height) = geometry.size.dimensions();
    let profile = geometry.profile(true);
    let content_top = profile.margin.top;
    let content_bottom = height - profile.margin.bottom;
    let content_width = geometry.content_width(true);

    let (id, content) = match cover_data(input) {
        Some((section, data)) => {
            let data = data.cloned().unwrap_or_else(|| CoverData {
                project_name: section.title.clone(),
                ..Default::default()
            });
            (
                section.id.clone(),
                ElementContent::CoverBlock {
                    project_name: data.project_name,
                    report_period: data.report_period,
                    subtitle: data.subtitle,
                    prepared_by: data.prepared_by,
                },
            )
        }
        None => (
            "cover".to_string(),
            ElementContent::CoverBlock {
                project_name: input.config.project_id.clone(),
                report_period: input.config.period_id.clone(),
                subtitle: None,
                prepared_by: None,
            },
        ),
    };

    // Title block sits a third of the way down the page
    let block_height = TITLE_SIZE * 4.0;
    let element = FrameElement {
        id: format!("{}:cover", id),
        section_id: Some(id),
        x: profile.margin.left,
        y: content_top + (content_bottom - content_top) / 3.0,
        width: content_width,
        height: block_height,
        content,
    };

    Frame {
        page_number,
        is_cover: true,
        width,
        height,
        content_left: profile.margin.left,
        content_top,
        content_width,
        content_bottom,
        elements: vec![element],
    }
}

/// Places elements on one page, top to bottom.
struct PageComposer<'a> {
    frame: Frame,
    first: bool,
    cursor_y: f64,
    input: &'a LayoutInput<'a>,
    model: &'a HeightModel,
}

impl<'a> PageComposer<'a> {
    fn new(
        page_number: usize,
        first: bool,
        input: &'a LayoutInput<'a>,
        model: &'a HeightModel,
    ) -> Self {
        let geometry = input.geometry;
        let (width, height) = geometry.size.dimensions();
        let profile = geometry.profile(first);
        let content_top = profile.margin.top + profile.header_band;
        let content_bottom = content_top + geometry.usable_height(first);

        Self {
            frame: Frame {
                page_number,
                is_cover: false,
                width,
                height,
                content_left: profile.margin.left,
                content_top,
                content_width: geometry.content_width(first),
                content_bottom,
                elements: Vec::new(),
            },
            first,
            cursor_y: content_top,
            input,
            model,
        }
    }

    /// Running header and page number, drawn in the profile's bands.
    fn chrome(&mut self, running_title: &str, total_pages: usize) {
        let page_number = self.frame.page_number;
        let profile = *self.input.geometry.profile(self.first);
        let left = self.frame.content_left;
        let width = self.frame.content_width;

        if profile.header_band > 0.0 {
            self.frame.elements.push(FrameElement {
                id: format!("page:{}:header", page_number),
                section_id: None,
                x: left,
                y: profile.margin.top,
                width,
                height: profile.header_band,
                content: ElementContent::RunningHeader {
                    text: running_title.to_string(),
                },
            });
        }
        if profile.footer_band > 0.0 {
            self.frame.elements.push(FrameElement {
                id: format!("page:{}:footer", page_number),
                section_id: None,
                x: left,
                y: self.frame.content_bottom,
                width,
                height: profile.footer_band,
                content: ElementContent::PageFooter {
                    text: format!("Page {} of {}", page_number, total_pages),
                },
            });
        }
    }

    fn push(&mut self, id: String, section_id: &str, height: f64, content: ElementContent) {
        let (x, width) = (self.frame.content_left, self.frame.content_width);
        self.push_at(id, section_id, x, width, height, content);
        self.cursor_y += height;
    }

    fn push_at(
        &mut self,
        id: String,
        section_id: &str,
        x: f64,
        width: f64,
        height: f64,
        content: ElementContent,
    ) {
        self.frame.elements.push(FrameElement {
            id,
            section_id: Some(section_id.to_string()),
            x,
            y: self.cursor_y,
            width,
            height,
            content,
        });
    }

    fn placement(&mut self, placement: &PagePlacement) {
        let input = self.input;
        let profile = self.model.profile();
        let id = placement.section_id.as_str();
        let Some(section) = input.config.section(id) else {
            log::warn!("page map references unknown section '{}'", id);
            return;
        };
        // Unknown kinds are budgeted at zero height, so they draw nothing
        if section.kind == SectionKind::Unknown {
            return;
        }
        let layout = input.config.section_layout(id);
        let scale = profile.scale(layout.density);
        let page = self.frame.page_number;

        if placement.render_config.show_header {
            self.push(
                format!("{}:header:{}", id, page),
                id,
                profile.section_header * scale.fixed,
                ElementContent::SectionHeader {
                    text: header_text(&section.title, placement.continues_from_previous),
                    continued: placement.continues_from_previous,
                },
            );
        }

        match (section.kind, input.report.get(id)) {
            (SectionKind::Table, Some(SectionData::Table(table))) => {
                self.push(
                    format!("{}:columns:{}", id, page),
                    id,
                    profile.column_header * scale.fixed,
                    ElementContent::ColumnHeader {
                        cells: table.columns.clone(),
                    },
                );
                let range = placement.data_range.map(|r| r.as_range()).unwrap_or(0..0);
                if table.rows.is_empty() {
                    self.empty(id, "No entries this period", scale);
                }
                for index in range {
                    let Some(cells) = table.rows.get(index) else {
                        break;
                    };
                    self.push(
                        format!("{}:row:{}", id, index),
                        id,
                        profile.table_row * scale.per_row,
                        ElementContent::Row {
                            index,
                            cells: cells.clone(),
                        },
                    );
                }
                if placement.render_config.show_footer {
                    if let Some(totals) = &table.totals {
                        self.push(
                            format!("{}:totals", id),
                            id,
                            profile.table_footer * scale.fixed,
                            ElementContent::Totals {
                                cells: totals.clone(),
                            },
                        );
                    }
                }
            }
            (SectionKind::Narrative, Some(SectionData::Narrative { text })) => {
                self.narrative(id, text, &layout, scale);
            }
            (SectionKind::PhotoGrid, Some(SectionData::Photos { photos })) => {
                let chosen: Vec<_> = if layout.selected_photos.is_empty() {
                    photos.iter().collect()
                } else {
                    layout
                        .selected_photos
                        .iter()
                        .filter_map(|pid| photos.iter().find(|p| &p.id == pid))
                        .collect()
                };
                let columns = layout.columns.max(1);
                let cell_width = self.column_width(columns);
                let row_height = profile.photo_row * scale.per_row;
                for row in chosen.chunks(columns) {
                    for (c, photo) in row.iter().enumerate() {
                        let x = self.frame.content_left + c as f64 * (cell_width + GUTTER);
                        self.push_at(
                            format!("{}:photo:{}", id, photo.id),
                            id,
                            x,
                            cell_width,
                            row_height,
                            ElementContent::Photo {
                                photo_id: photo.id.clone(),
                                src: photo.src.clone(),
                                caption: photo.caption.clone(),
                            },
                        );
                    }
                    self.cursor_y += row_height;
                }
            }
            _ => self.empty(id, "No data available", scale),
        }

        if placement.render_config.show_footer {
            self.cursor_y += profile.section_spacing * scale.fixed;
        }
    }

    fn column_width(&self, columns: usize) -> f64 {
        let gutters = GUTTER * (columns.saturating_sub(1)) as f64;
        ((self.frame.content_width - gutters) / columns as f64).max(0.0)
    }

    fn narrative(&mut self, id: &str, text: &str, layout: &SectionLayout, scale: DensityScale) {
        let columns = layout.columns.max(1);
        let width = self.column_width(columns);
        let line_height = self.model.profile().narrative_line * scale.per_row;
        let lines: Vec<String> = if text.trim().is_empty() {
            Vec::new()
        } else {
            break_into_lines(text, width, FontFace::Regular, BODY_SIZE)
                .into_iter()
                .map(|l| l.text)
                .collect()
        };
        if lines.is_empty() {
            return;
        }

        // Fill columns top to bottom, left to right
        let per_column = lines.len().div_ceil(columns);
        let mut tallest = 0.0f64;
        for (c, chunk) in lines.chunks(per_column).enumerate() {
            let height = chunk.len() as f64 * line_height;
            tallest = tallest.max(height);
            let x = self.frame.content_left + c as f64 * (width + GUTTER);
            self.push_at(
                format!("{}:text:{}", id, c),
                id,
                x,
                width,
                height,
                ElementContent::Paragraph {
                    lines: chunk.to_vec(),
                    line_height,
                },
            );
        }
        self.cursor_y += tallest;
    }

    fn empty(&mut self, id: &str, text: &str, scale: DensityScale) {
        self.push(
            format!("{}:empty", id),
            id,
            self.model.profile().table_row * scale.per_row,
            ElementContent::Empty {
                text: text.to_string(),
            },
        );
    }

    fn finish(self) -> Frame {
        self.frame
    }
}

// ── Render summaries ────────────────────────────────────────────

/// What one renderer actually drew: element ids per page, in draw order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderSummary {
    pub pages: Vec<PageSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSummary {
    pub page_number: usize,
    pub element_ids: Vec<String>,
}

impl RenderSummary {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn begin_page(&mut self, page_number: usize) {
        self.pages.push(PageSummary {
            page_number,
            element_ids: Vec::new(),
        });
    }

    /// Record an element on the most recently begun page.
    pub fn record(&mut self, element_id: &str) {
        if let Some(page) = self.pages.last_mut() {
            page.element_ids.push(element_id.to_string());
        }
    }
}

/// Check that two renderers drew the same pages with the same elements.
pub fn ensure_consistent(left: &RenderSummary, right: &RenderSummary) -> Result<(), RenderError> {
    if left.page_count() != right.page_count() {
        return Err(RenderError::PageCountMismatch {
            left: left.page_count(),
            right: right.page_count(),
        });
    }
    for (a, b) in left.pages.iter().zip(&right.pages) {
        if a != b {
            return Err(RenderError::PageMismatch {
                page: a.page_number,
            });
        }
    }
    Ok(())
}
