//! # Height Model
//!
//! Declarative height estimation for report sections.
//!
//! The packer never measures rendered output: two different renderers would
//! measure two different things, and the page map has to be the same for
//! both. Instead every section kind has a fixed chrome height (header bar,
//! column header, spacing) and a per-row height, both scaled by the density
//! profile. All constants live in [`HeightProfile`] so they can be tuned
//! from configuration rather than baked into the algorithm.

use serde::{Deserialize, Serialize};

use crate::error::EstimateError;
use crate::model::{SectionData, SectionDescriptor, SectionKind};

/// Named spacing profile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Density {
    Compact,
    #[default]
    Standard,
    Relaxed,
}

/// Multipliers a density applies to fixed chrome and to row heights.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DensityScale {
    pub fixed: f64,
    pub per_row: f64,
}

impl DensityScale {
    pub const IDENTITY: DensityScale = DensityScale {
        fixed: 1.0,
        per_row: 1.0,
    };
}

/// Tunable constants for the height model, in points at standard density.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HeightProfile {
    /// Section title bar.
    pub section_header: f64,
    /// Space between consecutive sections on a page.
    pub section_spacing: f64,
    /// Repeating column header of a table.
    pub column_header: f64,
    pub table_row: f64,
    /// Totals row under the last fragment of a table.
    pub table_footer: f64,
    pub narrative_line: f64,
    /// Characters per line of a single-column narrative block.
    pub chars_per_line: usize,
    /// One row of photos including captions.
    pub photo_row: f64,
    pub compact: DensityScale,
    pub standard: DensityScale,
    pub relaxed: DensityScale,
}

impl Default for HeightProfile {
    fn default() -> Self {
        Self {
            section_header: 28.0,
            section_spacing: 12.0,
            column_header: 20.0,
            table_row: 18.0,
            table_footer: 18.0,
            narrative_line: 14.0,
            chars_per_line: 95,
            photo_row: 190.0,
            compact: DensityScale {
                fixed: 0.8,
                per_row: 0.85,
            },
            standard: DensityScale::IDENTITY,
            relaxed: DensityScale {
                fixed: 1.2,
                per_row: 1.15,
            },
        }
    }
}

impl HeightProfile {
    pub fn scale(&self, density: Density) -> DensityScale {
        match density {
            Density::Compact => self.compact,
            Density::Standard => self.standard,
            Density::Relaxed => self.relaxed,
        }
    }
}

/// Resolved per-section settings the estimate depends on.
///
/// Produced by [`crate::config::ConfigStore::section_layout`], which folds
/// the store-wide density into per-section overrides.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionLayout {
    pub density: Density,
    /// Narrative columns or photos per grid row. Always at least 1.
    pub columns: usize,
    pub show_header: bool,
    /// Photo ids to print, in slot order. Empty means every photo.
    pub selected_photos: Vec<String>,
}

impl Default for SectionLayout {
    fn default() -> Self {
        Self {
            density: Density::Standard,
            columns: 1,
            show_header: true,
            selected_photos: Vec::new(),
        }
    }
}

/// Estimated vertical extent of a section.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeightEstimate {
    /// Non-repeating chrome: header bar, column header, spacing.
    pub fixed_height: f64,
    /// Height of one row of content.
    pub per_row_height: f64,
    /// How many items share one row (photos per grid row, narrative columns).
    pub items_per_row: usize,
}

impl HeightEstimate {
    pub const ZERO: HeightEstimate = HeightEstimate {
        fixed_height: 0.0,
        per_row_height: 0.0,
        items_per_row: 1,
    };

    pub fn rows(&self, item_count: usize) -> usize {
        item_count.div_ceil(self.items_per_row.max(1))
    }

    /// Height of the whole section holding `item_count` items.
    pub fn total(&self, item_count: usize) -> f64 {
        self.fixed_height + self.per_row_height * self.rows(item_count) as f64
    }
}

/// The height model: a profile plus the estimation rules.
#[derive(Debug, Clone, Default)]
pub struct HeightModel {
    profile: HeightProfile,
}

impl HeightModel {
    pub fn new(profile: HeightProfile) -> Self {
        Self { profile }
    }

    pub fn profile(&self) -> &HeightProfile {
        &self.profile
    }

    /// Estimate chrome and per-row heights for a section kind.
    pub fn estimate(
        &self,
        kind: SectionKind,
        layout: &SectionLayout,
        item_count: usize,
    ) -> HeightEstimate {
        let p = &self.profile;
        let scale = p.scale(layout.density);
        let header = if layout.show_header {
            p.section_header
        } else {
            0.0
        };
        let columns = layout.columns.max(1);

        match kind {
            // The cover owns page 1 and is never budgeted against other content.
            SectionKind::Cover => HeightEstimate::ZERO,
            SectionKind::Narrative => HeightEstimate {
                fixed_height: (header + p.section_spacing) * scale.fixed,
                per_row_height: p.narrative_line * scale.per_row,
                items_per_row: columns,
            },
            SectionKind::Table => HeightEstimate {
                fixed_height: (header + p.column_header + p.section_spacing) * scale.fixed,
                per_row_height: p.table_row * scale.per_row,
                items_per_row: 1,
            },
            SectionKind::PhotoGrid => {
                if item_count == 0 {
                    log::debug!("photo grid with no photos, estimating header only");
                }
                HeightEstimate {
                    fixed_height: (header + p.section_spacing) * scale.fixed,
                    per_row_height: p.photo_row * scale.per_row,
                    items_per_row: columns,
                }
            }
            SectionKind::Unknown => {
                log::warn!("unknown section kind, estimating zero height");
                HeightEstimate::ZERO
            }
        }
    }

    /// Height of the totals row printed under a table's last fragment.
    /// Zero unless the table actually carries totals.
    pub fn footer_height(
        &self,
        kind: SectionKind,
        data: Option<&SectionData>,
        layout: &SectionLayout,
    ) -> f64 {
        match (kind, data) {
            (SectionKind::Table, Some(SectionData::Table(table))) if table.totals.is_some() => {
                self.profile.table_footer * self.profile.scale(layout.density).fixed
            }
            _ => 0.0,
        }
    }

    /// The "no entries" line drawn for an empty table or a section with
    /// no data.
    pub fn empty_state_height(&self, layout: &SectionLayout) -> f64 {
        self.profile.table_row * self.profile.scale(layout.density).per_row
    }

    /// Count the estimation units of a section's data: table rows,
    /// narrative lines, or photos.
    pub fn item_count(
        &self,
        section: &SectionDescriptor,
        data: Option<&SectionData>,
        layout: &SectionLayout,
    ) -> Result<usize, EstimateError> {
        match (section.kind, data) {
            (SectionKind::Cover, _) => Ok(0),
            (SectionKind::Unknown, _) => Err(EstimateError::UnknownKind(section.id.clone())),
            (SectionKind::Table, Some(SectionData::Table(table))) => Ok(table.rows.len()),
            (SectionKind::Narrative, Some(SectionData::Narrative { text })) => {
                Ok(self.narrative_lines(text, layout.columns))
            }
            (SectionKind::PhotoGrid, Some(SectionData::Photos { photos })) => {
                if layout.selected_photos.is_empty() {
                    Ok(photos.len())
                } else {
                    Ok(photos
                        .iter()
                        .filter(|p| layout.selected_photos.contains(&p.id))
                        .count())
                }
            }
            (kind, _) => Err(EstimateError::MissingData {
                section: section.id.clone(),
                expected: kind.name(),
            }),
        }
    }

    /// Estimated line count of a narrative block split into `columns`
    /// columns. Each paragraph takes at least one line.
    pub fn narrative_lines(&self, text: &str, columns: usize) -> usize {
        let per_column = (self.profile.chars_per_line / columns.max(1)).max(1);
        if text.trim().is_empty() {
            return 0;
        }
        text.split('\n')
            .map(|para| para.chars().count().div_ceil(per_column).max(1))
            .sum()
    }
}
