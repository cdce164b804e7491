//! # Report Model
//!
//! The input representation for the pagination engine: the sections a weekly
//! progress report is made of, the data backing each section, and the page
//! geometry the report is packed into.
//!
//! Sections are identified by a stable string id. The *intent* about which
//! sections appear and in what order lives in the config store
//! ([`crate::config`]); this module only describes what a section is and
//! what data it carries.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Stable identifier of a report section.
pub type SectionId = String;

/// What kind of content a section holds. The kind decides how the section
/// is estimated and whether it can be split across pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SectionKind {
    /// The report cover. Always rendered alone on page 1.
    Cover,
    /// A block of free text (summary, remarks, weather notes).
    Narrative,
    /// Tabular data (manpower, equipment, materials, issues, invoices).
    Table,
    /// A grid of site photos.
    PhotoGrid,
    /// Anything the engine does not recognise. Estimated as zero height.
    #[serde(other)]
    Unknown,
}

impl SectionKind {
    /// Tables are the only content that may be cut between rows.
    pub fn is_splittable(&self) -> bool {
        matches!(self, SectionKind::Table)
    }

    pub fn name(&self) -> &'static str {
        match self {
            SectionKind::Cover => "cover",
            SectionKind::Narrative => "narrative",
            SectionKind::Table => "table",
            SectionKind::PhotoGrid => "photoGrid",
            SectionKind::Unknown => "unknown",
        }
    }
}

/// One entry in the ordered section list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionDescriptor {
    pub id: SectionId,
    pub kind: SectionKind,
    /// Human-readable title used in the section header bar.
    #[serde(default)]
    pub title: String,
    #[serde(default = "default_true")]
    pub included: bool,
    #[serde(default)]
    pub order: i32,
}

impl SectionDescriptor {
    pub fn new(id: &str, kind: SectionKind, title: &str) -> Self {
        Self {
            id: id.to_string(),
            kind,
            title: title.to_string(),
            included: true,
            order: 0,
        }
    }
}

fn default_true() -> bool {
    true
}

/// The report record being laid out, keyed by section id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportData {
    #[serde(default)]
    pub sections: BTreeMap<SectionId, SectionData>,
}

impl ReportData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_section(mut self, id: &str, data: SectionData) -> Self {
        self.sections.insert(id.to_string(), data);
        self
    }

    pub fn get(&self, id: &str) -> Option<&SectionData> {
        self.sections.get(id)
    }

    /// Row count of a table section, or `None` if the section has no
    /// tabular data.
    pub fn row_count(&self, id: &str) -> Option<usize> {
        match self.sections.get(id) {
            Some(SectionData::Table(table)) => Some(table.rows.len()),
            _ => None,
        }
    }
}

/// Content backing a single section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SectionData {
    Cover(CoverData),
    Narrative {
        #[serde(default)]
        text: String,
    },
    Table(TableData),
    Photos {
        #[serde(default)]
        photos: Vec<Photo>,
    },
}

/// Fields printed on the cover page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverData {
    #[serde(default)]
    pub project_name: String,
    #[serde(default)]
    pub report_period: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prepared_by: Option<String>,
}

/// A table section's rows. Row order is significant and preserved verbatim
/// across any page split.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableData {
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub rows: Vec<Vec<String>>,
    /// Totals row rendered under the last fragment of the table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub totals: Option<Vec<String>>,
}

impl TableData {
    pub fn new(columns: &[&str]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
            totals: None,
        }
    }

    pub fn with_rows(mut self, rows: Vec<Vec<String>>) -> Self {
        self.rows = rows;
        self
    }
}

/// A site photo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Photo {
    pub id: String,
    /// Base64 data, a data URI, or a file path.
    pub src: String,
    #[serde(default)]
    pub caption: String,
}

// ── Page geometry ───────────────────────────────────────────────

/// Page size plus the two margin profiles used by the packer.
///
/// The first content page and continuation pages are budgeted separately:
/// continuation pages repeat a running header and footer that eat into the
/// usable height.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageGeometry {
    #[serde(default)]
    pub size: PageSize,
    #[serde(default = "MarginProfile::first_page")]
    pub first_page: MarginProfile,
    #[serde(default = "MarginProfile::continuation")]
    pub continuation: MarginProfile,
}

impl Default for PageGeometry {
    fn default() -> Self {
        Self {
            size: PageSize::Letter,
            first_page: MarginProfile::first_page(),
            continuation: MarginProfile::continuation(),
        }
    }
}

impl PageGeometry {
    /// Vertical space available for section content on a page.
    pub fn usable_height(&self, first: bool) -> f64 {
        let (_, page_h) = self.size.dimensions();
        self.profile(first).usable_height(page_h)
    }

    pub fn profile(&self, first: bool) -> &MarginProfile {
        if first {
            &self.first_page
        } else {
            &self.continuation
        }
    }

    pub fn content_width(&self, first: bool) -> f64 {
        let (page_w, _) = self.size.dimensions();
        (page_w - self.profile(first).margin.horizontal()).max(0.0)
    }
}

/// Margins plus the bands reserved for a running header and footer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarginProfile {
    #[serde(default)]
    pub margin: Edges,
    #[serde(default)]
    pub header_band: f64,
    #[serde(default)]
    pub footer_band: f64,
}

impl MarginProfile {
    pub fn first_page() -> Self {
        Self {
            margin: Edges::uniform(36.0),
            header_band: 0.0,
            footer_band: 18.0,
        }
    }

    pub fn continuation() -> Self {
        Self {
            margin: Edges::uniform(36.0),
            header_band: 24.0,
            footer_band: 18.0,
        }
    }

    pub fn usable_height(&self, page_height: f64) -> f64 {
        (page_height - self.margin.vertical() - self.header_band - self.footer_band).max(0.0)
    }
}

/// Standard page sizes in points.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub enum PageSize {
    A4,
    A3,
    #[default]
    Letter,
    Legal,
    Tabloid,
    Custom {
        width: f64,
        height: f64,
    },
}

impl PageSize {
    /// Returns (width, height) in points.
    pub fn dimensions(&self) -> (f64, f64) {
        match self {
            PageSize::A4 => (595.28, 841.89),
            PageSize::A3 => (841.89, 1190.55),
            PageSize::Letter => (612.0, 792.0),
            PageSize::Legal => (612.0, 1008.0),
            PageSize::Tabloid => (792.0, 1224.0),
            PageSize::Custom { width, height } => (*width, *height),
        }
    }
}

/// Edge values (top, right, bottom, left) used for margins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Edges {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl Edges {
    pub fn uniform(v: f64) -> Self {
        Self {
            top: v,
            right: v,
            bottom: v,
            left: v,
        }
    }

    pub fn symmetric(vertical: f64, horizontal: f64) -> Self {
        Self {
            top: vertical,
            right: horizontal,
            bottom: vertical,
            left: horizontal,
        }
    }

    pub fn horizontal(&self) -> f64 {
        self.left + self.right
    }

    pub fn vertical(&self) -> f64 {
        self.top + self.bottom
    }
}

/// Document metadata embedded in the exported PDF.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
}
