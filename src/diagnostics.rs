//! # Layout Diagnostics
//!
//! Advisory findings about a laid-out report. Two sources feed the same
//! list: the packer reports sections it could not estimate or could not fit,
//! and [`inspect`] looks at the composed frames after the fact for overflow,
//! near-empty pages, stranded headers and unusually long reports.
//!
//! Nothing here changes the layout. A diagnostic is something for the user
//! to look at, not an instruction to the packer.

use serde::{Deserialize, Serialize};

use crate::error::EstimateError;
use crate::layout::page_break::EPSILON;
use crate::render::{ElementContent, Frame, FrameElement};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DiagnosticKind {
    /// Content runs past the bottom of its page.
    Overflow,
    /// A page with almost nothing on it.
    BlankPage,
    /// A header with none of its section's content beneath it.
    OrphanHeader,
    HighPageCount,
    UnknownSection,
    MissingData,
    /// A section taller than an entire page.
    OversizedSection,
    /// A table cut that could not keep the orphan guard on both sides.
    OrphanGuardRelaxed,
}

impl DiagnosticKind {
    pub fn name(&self) -> &'static str {
        match self {
            DiagnosticKind::Overflow => "overflow",
            DiagnosticKind::BlankPage => "blankPage",
            DiagnosticKind::OrphanHeader => "orphanHeader",
            DiagnosticKind::HighPageCount => "highPageCount",
            DiagnosticKind::UnknownSection => "unknownSection",
            DiagnosticKind::MissingData => "missingData",
            DiagnosticKind::OversizedSection => "oversizedSection",
            DiagnosticKind::OrphanGuardRelaxed => "orphanGuardRelaxed",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            DiagnosticKind::Overflow => Severity::Error,
            DiagnosticKind::HighPageCount => Severity::Info,
            _ => Severity::Warning,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    /// Stable for the same input, so a UI can key on it.
    pub id: String,
    #[serde(rename = "type")]
    pub kind: DiagnosticKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_number: Option<usize>,
    pub message: String,
    pub severity: Severity,
}

impl Diagnostic {
    pub fn new(
        kind: DiagnosticKind,
        subject: &str,
        page_number: Option<usize>,
        message: String,
    ) -> Self {
        let id = match page_number {
            Some(page) => format!("{}:{}:{}", kind.name(), page, subject),
            None => format!("{}:{}", kind.name(), subject),
        };
        Self {
            id,
            kind,
            page_number,
            message,
            severity: kind.severity(),
        }
    }

    pub fn from_estimate(err: &EstimateError) -> Self {
        match err {
            EstimateError::UnknownKind(section) => {
                Self::new(DiagnosticKind::UnknownSection, section, None, err.to_string())
            }
            EstimateError::MissingData { section, .. } => {
                Self::new(DiagnosticKind::MissingData, section, None, err.to_string())
            }
        }
    }

    pub fn oversized(section: &str, height: f64, capacity: f64) -> Self {
        Self::new(
            DiagnosticKind::OversizedSection,
            section,
            None,
            format!(
                "section '{}' needs {:.0}pt but a page holds {:.0}pt; \
                 it was placed on a page of its own",
                section, height, capacity
            ),
        )
    }

    pub fn guard_relaxed(
        section: &str,
        page_number: usize,
        rows_here: usize,
        rows_after: usize,
        guard: usize,
    ) -> Self {
        Self::new(
            DiagnosticKind::OrphanGuardRelaxed,
            section,
            Some(page_number),
            format!(
                "section '{}' was split {} + {} rows; a page cannot keep {} rows on both sides",
                section, rows_here, rows_after, guard
            ),
        )
    }
}

/// Thresholds for the post-render checks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DiagnosticThresholds {
    /// A non-cover page filled below this fraction is reported as blank.
    pub blank_page_ratio: f64,
    /// Distance from the content bottom, in points, where a header with no
    /// content after it counts as orphaned.
    pub orphan_zone: f64,
    pub max_pages: usize,
}

impl Default for DiagnosticThresholds {
    fn default() -> Self {
        Self {
            blank_page_ratio: 0.05,
            orphan_zone: 48.0,
            max_pages: 20,
        }
    }
}

/// Inspect composed frames.
pub fn inspect(frames: &[Frame], thresholds: &DiagnosticThresholds) -> Vec<Diagnostic> {
    let mut out = Vec::new();

    for frame in frames.iter().filter(|f| !f.is_cover) {
        let body: Vec<&FrameElement> = frame
            .elements
            .iter()
            .filter(|e| e.section_id.is_some())
            .collect();

        for element in &body {
            let bottom = element.y + element.height;
            if bottom > frame.content_bottom + EPSILON {
                out.push(Diagnostic::new(
                    DiagnosticKind::Overflow,
                    &element.id,
                    Some(frame.page_number),
                    format!(
                        "'{}' extends {:.0}pt below the bottom of page {}",
                        element.id,
                        bottom - frame.content_bottom,
                        frame.page_number
                    ),
                ));
            }
        }

        let capacity = frame.content_bottom - frame.content_top;
        let used = body
            .iter()
            .map(|e| e.y + e.height)
            .fold(frame.content_top, f64::max)
            - frame.content_top;
        if capacity > 0.0 && used / capacity < thresholds.blank_page_ratio {
            out.push(Diagnostic::new(
                DiagnosticKind::BlankPage,
                "page",
                Some(frame.page_number),
                format!(
                    "page {} is {:.0}% filled",
                    frame.page_number,
                    used / capacity * 100.0
                ),
            ));
        }

        check_orphans(frame, &body, thresholds, &mut out);
    }

    if frames.len() > thresholds.max_pages {
        out.push(Diagnostic::new(
            DiagnosticKind::HighPageCount,
            "report",
            None,
            format!(
                "report has {} pages (more than {})",
                frames.len(),
                thresholds.max_pages
            ),
        ));
    }

    out
}

fn check_orphans(
    frame: &Frame,
    body: &[&FrameElement],
    thresholds: &DiagnosticThresholds,
    out: &mut Vec<Diagnostic>,
) {
    for (i, element) in body.iter().enumerate() {
        if !element.content.is_header() {
            continue;
        }
        // Only the first header of a header chain
        let prev = i.checked_sub(1).map(|j| body[j]);
        if prev.map_or(false, |p| p.content.is_header() && p.section_id == element.section_id) {
            continue;
        }

        let next = body[i + 1..]
            .iter()
            .find(|e| !(e.content.is_header() && e.section_id == element.section_id));
        let followed = next.map_or(false, |n| n.section_id == element.section_id);
        if followed {
            continue;
        }

        let gap = frame.content_bottom - (element.y + element.height);
        let near_bottom = gap <= thresholds.orphan_zone;
        if next.is_none() || near_bottom {
            let title = match &element.content {
                ElementContent::SectionHeader { text, .. } => text.as_str(),
                _ => element.section_id.as_deref().unwrap_or_default(),
            };
            out.push(Diagnostic::new(
                DiagnosticKind::OrphanHeader,
                &element.id,
                Some(frame.page_number),
                format!(
                    "header '{}' on page {} has no content beneath it",
                    title, frame.page_number
                ),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(
        id: &str,
        section: &str,
        y: f64,
        height: f64,
        content: ElementContent,
    ) -> FrameElement {
        FrameElement {
            id: id.to_string(),
            section_id: Some(section.to_string()),
            x: 0.0,
            y,
            width: 100.0,
            height,
            content,
        }
    }

    fn header(id: &str, section: &str, y: f64) -> FrameElement {
        element(
            id,
            section,
            y,
            20.0,
            ElementContent::SectionHeader {
                text: section.to_string(),
                continued: false,
            },
        )
    }

    fn row(id: &str, section: &str, y: f64) -> FrameElement {
        element(
            id,
            section,
            y,
            10.0,
            ElementContent::Row {
                index: 0,
                cells: vec!["x".into()],
            },
        )
    }

    fn frame(page_number: usize, elements: Vec<FrameElement>) -> Frame {
        Frame {
            page_number,
            is_cover: false,
            width: 200.0,
            height: 300.0,
            content_left: 0.0,
            content_top: 0.0,
            content_width: 200.0,
            content_bottom: 200.0,
            elements,
        }
    }

    fn kinds(diags: &[Diagnostic]) -> Vec<DiagnosticKind> {
        diags.iter().map(|d| d.kind).collect()
    }

    #[test]
    fn healthy_page_has_no_findings() {
        let frames = vec![frame(1, vec![header("h", "a", 0.0), row("r", "a", 20.0)])];
        assert!(inspect(&frames, &DiagnosticThresholds::default()).is_empty());
    }

    #[test]
    fn flags_overflow_as_error() {
        let frames = vec![frame(
            1,
            vec![header("h", "a", 0.0), row("r0", "a", 20.0), row("r1", "a", 195.0)],
        )];
        let diags = inspect(&frames, &DiagnosticThresholds::default());
        assert_eq!(kinds(&diags), vec![DiagnosticKind::Overflow]);
        assert_eq!(diags[0].severity, Severity::Error);
        assert_eq!(diags[0].page_number, Some(1));
    }

    #[test]
    fn flags_blank_page() {
        let frames = vec![frame(2, vec![])];
        let diags = inspect(&frames, &DiagnosticThresholds::default());
        assert_eq!(kinds(&diags), vec![DiagnosticKind::BlankPage]);
        assert_eq!(diags[0].id, "blankPage:2:page");
    }

    #[test]
    fn flags_header_at_page_bottom() {
        let frames = vec![frame(
            1,
            vec![header("ha", "a", 0.0), row("ra", "a", 20.0), header("hb", "b", 170.0)],
        )];
        let diags = inspect(&frames, &DiagnosticThresholds::default());
        assert_eq!(kinds(&diags), vec![DiagnosticKind::OrphanHeader]);
        assert_eq!(diags[0].severity, Severity::Warning);
    }

    #[test]
    fn header_followed_by_other_section_far_from_bottom_is_fine() {
        let frames = vec![frame(
            1,
            vec![header("ha", "a", 0.0), header("hb", "b", 20.0), row("rb", "b", 40.0)],
        )];
        let diags = inspect(&frames, &DiagnosticThresholds::default());
        assert!(diags.is_empty());
    }

    #[test]
    fn high_page_count_is_info() {
        let frames: Vec<Frame> = (1..=3)
            .map(|n| frame(n, vec![header("h", "a", 0.0), row("r", "a", 20.0)]))
            .collect();
        let thresholds = DiagnosticThresholds {
            max_pages: 2,
            ..Default::default()
        };
        let diags = inspect(&frames, &thresholds);
        assert_eq!(kinds(&diags), vec![DiagnosticKind::HighPageCount]);
        assert_eq!(diags[0].severity, Severity::Info);
    }

    #[test]
    fn serializes_with_type_key() {
        let d = Diagnostic::oversized("photos", 900.0, 700.0);
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["type"], "oversizedSection");
        assert_eq!(json["severity"], "warning");
        assert!(json.get("pageNumber").is_none());
    }
}
