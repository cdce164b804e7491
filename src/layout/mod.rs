//! # Page Packing
//!
//! Turns layout intent (the config store), report data, and page geometry
//! into a [`PageMap`]: which section lands on which page, and for tables,
//! which rows.
//!
//! ## The algorithm
//!
//! A single greedy pass over the included sections, in order:
//!
//! 1. The cover, if included, takes page 1 alone.
//! 2. Open a page with the first-page budget.
//! 3. Narrative and photo sections are atomic. If one doesn't fit and the
//!    page already holds content, close the page and place it on the next.
//!    A section taller than a whole page gets a page to itself.
//! 4. Tables are cut between rows. Each fragment repeats the header and the
//!    column header; the cut point comes from [`page_break::decide_split`],
//!    which applies the orphan guard and user breaks.
//! 5. Continuation pages use the continuation budget, which is smaller
//!    because of the running header and footer.
//!
//! The result is a pure function of the inputs. It is never patched, only
//! regenerated, so it cannot drift from what produced it. Renderers consume
//! it as-is and never re-decide a break.

pub mod page_break;
pub mod snapshot;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::ConfigStore;
use crate::diagnostics::Diagnostic;
use crate::error::{EstimateError, LayoutError};
use crate::height::{HeightEstimate, HeightModel, SectionLayout};
use crate::model::{PageGeometry, ReportData, SectionDescriptor, SectionId, SectionKind};

use page_break::{decide_split, BreakDecision, SplitRequest, EPSILON};

/// Half-open range of row indices into a table section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataRange {
    pub start: usize,
    pub end: usize,
}

impl DataRange {
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_range(&self) -> std::ops::Range<usize> {
        self.start..self.end
    }
}

/// What chrome a renderer draws around a placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderConfig {
    pub show_header: bool,
    /// Only the last fragment of a section draws its footer.
    pub show_footer: bool,
}

/// One section (or section fragment) on one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PagePlacement {
    pub section_id: SectionId,
    pub continues_from_previous: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_range: Option<DataRange>,
    pub render_config: RenderConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub page_number: usize,
    /// The cover page. Rendered from its own template, holds no placements.
    pub is_first_page: bool,
    pub sections: Vec<PagePlacement>,
}

/// The computed, immutable layout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMap {
    pub total_pages: usize,
    pub pages: Vec<Page>,
}

impl PageMap {
    fn from_pages(mut pages: Vec<Page>) -> Self {
        for (i, page) in pages.iter_mut().enumerate() {
            page.page_number = i + 1;
        }
        PageMap {
            total_pages: pages.len(),
            pages,
        }
    }

    /// Every placement of a section, with the page number it sits on.
    pub fn placements_for(&self, section_id: &str) -> Vec<(usize, &PagePlacement)> {
        self.pages
            .iter()
            .flat_map(|page| {
                page.sections
                    .iter()
                    .filter(move |p| p.section_id == section_id)
                    .map(move |p| (page.page_number, p))
            })
            .collect()
    }

    /// Page number of a section's first appearance.
    pub fn first_page_of(&self, section_id: &str) -> Option<usize> {
        self.placements_for(section_id)
            .into_iter()
            .find(|(_, p)| !p.continues_from_previous)
            .map(|(n, _)| n)
    }

    /// Check the structural invariants against the report the map was
    /// packed from.
    pub fn validate(&self, report: &ReportData) -> Result<(), LayoutError> {
        if self.total_pages != self.pages.len() {
            return Err(LayoutError::PageCount {
                declared: self.total_pages,
                actual: self.pages.len(),
            });
        }

        for (i, page) in self.pages.iter().enumerate() {
            if page.page_number != i + 1 {
                return Err(LayoutError::PageNumbering {
                    index: i,
                    number: page.page_number,
                });
            }
            if page.is_first_page && (i != 0 || !page.sections.is_empty()) {
                return Err(LayoutError::CoverPage);
            }
        }

        // Section id -> (first placements, next expected row)
        let mut seen: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
        for placement in self.pages.iter().flat_map(|p| &p.sections) {
            let entry = seen.entry(placement.section_id.as_str()).or_insert((0, 0));
            if !placement.continues_from_previous {
                entry.0 += 1;
            }
            if let Some(range) = placement.data_range {
                if range.start != entry.1 || range.end < range.start {
                    return Err(LayoutError::RowGap {
                        section: placement.section_id.clone(),
                        expected: entry.1,
                        at: range.start,
                    });
                }
                entry.1 = range.end;
            }
        }

        for (section, (firsts, end)) in seen {
            if firsts != 1 {
                return Err(LayoutError::FirstPlacement {
                    section: section.to_string(),
                    count: firsts,
                });
            }
            if let Some(rows) = report.row_count(section) {
                if end != rows {
                    return Err(LayoutError::RowCount {
                        section: section.to_string(),
                        end,
                        rows,
                    });
                }
            }
        }

        Ok(())
    }
}

/// Everything the packer reads.
#[derive(Debug, Clone, Copy)]
pub struct LayoutInput<'a> {
    pub config: &'a ConfigStore,
    pub report: &'a ReportData,
    pub geometry: &'a PageGeometry,
}

/// A page map plus the diagnostics raised while packing it.
#[derive(Debug, Clone, PartialEq)]
pub struct PackOutcome {
    pub page_map: PageMap,
    pub diagnostics: Vec<Diagnostic>,
}

/// Tracks where we are on the current page during packing.
#[derive(Debug)]
struct PageCursor {
    capacity: f64,
    used: f64,
    placements: Vec<PagePlacement>,
    /// Set after an oversized section or a trailing user break: the next
    /// section must start on a new page.
    sealed: bool,
}

impl PageCursor {
    fn new(geometry: &PageGeometry, first: bool) -> Self {
        Self {
            capacity: geometry.usable_height(first),
            used: 0.0,
            placements: Vec::new(),
            sealed: false,
        }
    }

    fn remaining(&self) -> f64 {
        if self.sealed {
            0.0
        } else {
            (self.capacity - self.used).max(0.0)
        }
    }

    fn is_empty(&self) -> bool {
        self.used <= EPSILON
    }

    fn place(&mut self, placement: PagePlacement, height: f64) {
        self.used += height;
        self.placements.push(placement);
    }

    fn finalize(self) -> Page {
        Page {
            page_number: 0,
            is_first_page: false,
            sections: self.placements,
        }
    }
}

/// The packer.
#[derive(Debug, Clone, Default)]
pub struct LayoutEngine {
    model: HeightModel,
}

/// Per-section values computed once before packing it.
struct SectionPlan<'a> {
    section: &'a SectionDescriptor,
    layout: SectionLayout,
    estimate: HeightEstimate,
    items: usize,
    /// Totals row under the last fragment.
    footer: f64,
    /// "No data" line drawn when the section has nothing to show.
    empty_state: f64,
}

impl LayoutEngine {
    pub fn new(model: HeightModel) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &HeightModel {
        &self.model
    }

    /// Pack the report and return only the page map.
    pub fn paginate(&self, input: &LayoutInput) -> PageMap {
        self.pack(input).page_map
    }

    /// Pack the report into pages.
    pub fn pack(&self, input: &LayoutInput) -> PackOutcome {
        let mut pages: Vec<Page> = Vec::new();
        let mut diagnostics: Vec<Diagnostic> = Vec::new();
        let sections = input.config.included_sections();

        if sections.iter().any(|s| s.kind == SectionKind::Cover) {
            pages.push(Page {
                page_number: 1,
                is_first_page: true,
                sections: Vec::new(),
            });
        }

        let mut cursor = PageCursor::new(input.geometry, true);

        for section in sections
            .iter()
            .copied()
            .filter(|s| s.kind != SectionKind::Cover)
        {
            let layout = input.config.section_layout(&section.id);
            let data = input.report.get(&section.id);
            let (items, missing) = match self.model.item_count(section, data, &layout) {
                Ok(n) => (n, false),
                Err(e) => {
                    log::warn!("{}", e);
                    diagnostics.push(Diagnostic::from_estimate(&e));
                    (0, matches!(e, EstimateError::MissingData { .. }))
                }
            };
            let plan = SectionPlan {
                section,
                estimate: self.model.estimate(section.kind, &layout, items),
                footer: self.model.footer_height(section.kind, data, &layout),
                empty_state: if missing || (section.kind.is_splittable() && items == 0) {
                    self.model.empty_state_height(&layout)
                } else {
                    0.0
                },
                layout,
                items,
            };

            if plan.section.kind.is_splittable() {
                self.pack_table(&plan, input, &mut cursor, &mut pages, &mut diagnostics);
            } else {
                self.pack_block(&plan, input, &mut cursor, &mut pages, &mut diagnostics);
            }
        }

        if !cursor.placements.is_empty() {
            pages.push(cursor.finalize());
        }

        let page_map = PageMap::from_pages(pages);
        log::debug!(
            "packed {} sections into {} pages",
            sections.len(),
            page_map.total_pages
        );
        PackOutcome {
            page_map,
            diagnostics,
        }
    }

    /// Place an atomic section: whole, on this page or the next.
    fn pack_block(
        &self,
        plan: &SectionPlan,
        input: &LayoutInput,
        cursor: &mut PageCursor,
        pages: &mut Vec<Page>,
        diagnostics: &mut Vec<Diagnostic>,
    ) {
        let height = plan.estimate.total(plan.items) + plan.empty_state;

        if cursor.sealed || (height > cursor.remaining() + EPSILON && !cursor.is_empty()) {
            Self::next_page(cursor, pages, input.geometry);
        }

        let oversized = height > cursor.capacity + EPSILON;
        if oversized {
            log::warn!(
                "section '{}' ({:.0}pt) is taller than a page ({:.0}pt)",
                plan.section.id,
                height,
                cursor.capacity
            );
            diagnostics.push(Diagnostic::oversized(
                &plan.section.id,
                height,
                cursor.capacity,
            ));
        }

        cursor.place(
            PagePlacement {
                section_id: plan.section.id.clone(),
                continues_from_previous: false,
                data_range: None,
                render_config: RenderConfig {
                    show_header: plan.layout.show_header,
                    show_footer: true,
                },
            },
            height,
        );
        if oversized {
            cursor.sealed = true;
        }
    }

    /// Place a table, cutting it between rows across as many pages as needed.
    fn pack_table(
        &self,
        plan: &SectionPlan,
        input: &LayoutInput,
        cursor: &mut PageCursor,
        pages: &mut Vec<Page>,
        diagnostics: &mut Vec<Diagnostic>,
    ) {
        let id = &plan.section.id;
        let rows = plan.items;
        let fixed = plan.estimate.fixed_height;
        let per_row = plan.estimate.per_row_height;
        let footer = plan.footer;
        let breaks = input.config.breaks_for(id);
        let guard = input.config.orphan_guard_for(id);

        if rows == 0 {
            let height = fixed + plan.empty_state + footer;
            if cursor.sealed || (height > cursor.remaining() + EPSILON && !cursor.is_empty()) {
                Self::next_page(cursor, pages, input.geometry);
            }
            cursor.place(
                Self::table_placement(plan, DataRange { start: 0, end: 0 }, false, true),
                height,
            );
            return;
        }

        let mut start = 0;
        loop {
            let remaining_rows = rows - start;
            let forced_cut = breaks
                .iter()
                .map(|b| b + 1)
                .find(|&cut| cut > start && cut < rows)
                .map(|cut| cut - start);

            let decision = decide_split(&SplitRequest {
                remaining_height: cursor.remaining(),
                fixed_height: fixed,
                per_row_height: per_row,
                footer_height: footer,
                remaining_rows,
                orphan_guard: guard,
                page_is_empty: cursor.is_empty(),
                forced_cut,
            });

            let (count, forced) = match decision {
                BreakDecision::MoveToNextPage => {
                    log::debug!("deferring '{}' from row {} to the next page", id, start);
                    Self::next_page(cursor, pages, input.geometry);
                    continue;
                }
                BreakDecision::Place => (remaining_rows, false),
                BreakDecision::Split {
                    rows_on_current_page,
                    forced,
                } => {
                    if forced {
                        log::debug!(
                            "user break in '{}' after row {}",
                            id,
                            start + rows_on_current_page - 1
                        );
                    }
                    (rows_on_current_page, forced)
                }
            };

            let end = start + count;
            let is_last = end == rows;
            // Reached only when the page or the table is too short to keep
            // `guard` rows on both sides of the cut.
            if !is_last && !forced && (count < guard || rows - end < guard) {
                let page = pages.len() + 1;
                log::warn!(
                    "table '{}' split {}/{} on page {} despite an orphan guard of {}",
                    id,
                    count,
                    rows - end,
                    page,
                    guard
                );
                diagnostics.push(Diagnostic::guard_relaxed(id, page, count, rows - end, guard));
            }
            let height = fixed + per_row * count as f64 + if is_last { footer } else { 0.0 };
            if cursor.is_empty() && height > cursor.remaining() + EPSILON {
                log::warn!("table '{}' rows {}..{} overflow an empty page", id, start, end);
                diagnostics.push(Diagnostic::oversized(id, height, cursor.capacity));
            }

            cursor.place(
                Self::table_placement(plan, DataRange { start, end }, start > 0, is_last),
                height,
            );

            if is_last {
                if breaks.contains(&(rows - 1)) {
                    cursor.sealed = true;
                }
                return;
            }

            Self::next_page(cursor, pages, input.geometry);
            start = end;
        }
    }

    fn table_placement(
        plan: &SectionPlan,
        range: DataRange,
        continues: bool,
        is_last: bool,
    ) -> PagePlacement {
        PagePlacement {
            section_id: plan.section.id.clone(),
            continues_from_previous: continues,
            data_range: Some(range),
            render_config: RenderConfig {
                show_header: plan.layout.show_header,
                show_footer: is_last,
            },
        }
    }

    /// Close the current page and open a continuation page.
    fn next_page(cursor: &mut PageCursor, pages: &mut Vec<Page>, geometry: &PageGeometry) {
        let finished = std::mem::replace(cursor, PageCursor::new(geometry, false));
        pages.push(finished.finalize());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{DiagnosticKind, Severity};
    use crate::height::HeightProfile;
    use crate::model::{Edges, MarginProfile, PageSize, SectionData, TableData};

    /// Pages with exactly `height` points of usable space.
    fn geometry(height: f64) -> PageGeometry {
        let profile = MarginProfile {
            margin: Edges::uniform(0.0),
            header_band: 0.0,
            footer_band: 0.0,
        };
        PageGeometry {
            size: PageSize::Custom {
                width: 400.0,
                height,
            },
            first_page: profile,
            continuation: profile,
        }
    }

    /// Header 30, column header 20, rows 10, no spacing or footer.
    fn engine() -> LayoutEngine {
        LayoutEngine::new(HeightModel::new(HeightProfile {
            section_header: 30.0,
            section_spacing: 0.0,
            column_header: 20.0,
            table_row: 10.0,
            table_footer: 0.0,
            narrative_line: 10.0,
            chars_per_line: 50,
            photo_row: 100.0,
            ..Default::default()
        }))
    }

    fn table(rows: usize) -> SectionData {
        SectionData::Table(
            TableData::new(&["Item", "Qty"])
                .with_rows((0..rows).map(|i| vec![format!("r{}", i), "1".into()]).collect()),
        )
    }

    fn ranges(map: &PageMap, id: &str) -> Vec<(usize, usize, usize)> {
        map.placements_for(id)
            .into_iter()
            .map(|(page, p)| {
                let r = p.data_range.unwrap();
                (page, r.start, r.end)
            })
            .collect()
    }

    #[test]
    fn table_splits_on_row_boundaries() {
        let config = ConfigStore::with_sections(vec![SectionDescriptor::new(
            "equipment",
            SectionKind::Table,
            "Equipment",
        )]);
        let report = ReportData::new().with_section("equipment", table(40));
        let geometry = geometry(330.0);
        let map = engine().paginate(&LayoutInput {
            config: &config,
            report: &report,
            geometry: &geometry,
        });
        assert_eq!(ranges(&map, "equipment"), vec![(1, 0, 28), (2, 28, 40)]);
        map.validate(&report).unwrap();
    }

    #[test]
    fn trailing_break_pushes_next_section() {
        let mut config = ConfigStore::with_sections(vec![
            SectionDescriptor::new("manpower", SectionKind::Table, "Manpower"),
            SectionDescriptor::new("notes", SectionKind::Narrative, "Notes"),
        ]);
        config.set_manual_break("manpower", 4).unwrap();
        let report = ReportData::new()
            .with_section("manpower", table(5))
            .with_section(
                "notes",
                SectionData::Narrative {
                    text: "Short note".into(),
                },
            );
        let geometry = geometry(500.0);
        let map = engine().paginate(&LayoutInput {
            config: &config,
            report: &report,
            geometry: &geometry,
        });
        assert_eq!(map.total_pages, 2);
        assert_eq!(map.first_page_of("notes"), Some(2));
    }

    #[test]
    fn oversized_block_gets_its_own_page() {
        let config = ConfigStore::with_sections(vec![
            SectionDescriptor::new("a", SectionKind::Narrative, "A"),
            SectionDescriptor::new("b", SectionKind::Narrative, "B"),
            SectionDescriptor::new("c", SectionKind::Narrative, "C"),
        ]);
        let long = "x".repeat(50 * 40); // 40 lines = 400pt
        let report = ReportData::new()
            .with_section("a", SectionData::Narrative { text: "one".into() })
            .with_section("b", SectionData::Narrative { text: long })
            .with_section("c", SectionData::Narrative { text: "two".into() });
        let geometry = geometry(300.0);
        let outcome = engine().pack(&LayoutInput {
            config: &config,
            report: &report,
            geometry: &geometry,
        });
        let map = &outcome.page_map;
        assert_eq!(map.first_page_of("a"), Some(1));
        assert_eq!(map.first_page_of("b"), Some(2));
        assert_eq!(map.first_page_of("c"), Some(3));
        assert_eq!(map.pages[1].sections.len(), 1);
        assert!(outcome
            .diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::OversizedSection
                && d.severity == Severity::Warning));
    }

    #[test]
    fn sealed_page_takes_no_zero_height_section() {
        let config = ConfigStore::with_sections(vec![
            SectionDescriptor::new("b", SectionKind::Narrative, "B"),
            SectionDescriptor::new("mystery", SectionKind::Unknown, "Mystery"),
        ]);
        let long = "x".repeat(50 * 40);
        let report = ReportData::new().with_section("b", SectionData::Narrative { text: long });
        let geometry = geometry(300.0);
        let map = engine().paginate(&LayoutInput {
            config: &config,
            report: &report,
            geometry: &geometry,
        });
        assert_eq!(map.first_page_of("b"), Some(1));
        assert_eq!(map.first_page_of("mystery"), Some(2));
    }

    #[test]
    fn table_without_totals_fits_exactly() {
        let config = ConfigStore::with_sections(vec![SectionDescriptor::new(
            "equipment",
            SectionKind::Table,
            "Equipment",
        )]);
        // Default profile: 28 + 20 + 12 fixed, 18 per row
        let plain = ReportData::new().with_section("equipment", table(10));
        let geometry = geometry(245.0);
        let engine = LayoutEngine::default();
        let map = engine.paginate(&LayoutInput {
            config: &config,
            report: &plain,
            geometry: &geometry,
        });
        assert_eq!(ranges(&map, "equipment"), vec![(1, 0, 10)]);

        let mut data = TableData::new(&["Item", "Qty"])
            .with_rows((0..10).map(|i| vec![format!("r{}", i), "1".into()]).collect());
        data.totals = Some(vec!["Total".into(), "10".into()]);
        let with_totals = ReportData::new().with_section("equipment", SectionData::Table(data));
        let map = engine.paginate(&LayoutInput {
            config: &config,
            report: &with_totals,
            geometry: &geometry,
        });
        assert_eq!(map.placements_for("equipment").len(), 2);
        map.validate(&with_totals).unwrap();
    }

    #[test]
    fn short_table_on_short_page_reports_relaxed_guard() {
        let config = ConfigStore::with_sections(vec![SectionDescriptor::new(
            "issues",
            SectionKind::Table,
            "Issues",
        )]);
        let report = ReportData::new().with_section("issues", table(3));
        // Room for the header and two rows
        let geometry = geometry(70.0);
        let outcome = engine().pack(&LayoutInput {
            config: &config,
            report: &report,
            geometry: &geometry,
        });
        assert_eq!(ranges(&outcome.page_map, "issues"), vec![(1, 0, 2), (2, 2, 3)]);
        let relaxed: Vec<_> = outcome
            .diagnostics
            .iter()
            .filter(|d| d.kind == DiagnosticKind::OrphanGuardRelaxed)
            .collect();
        assert_eq!(relaxed.len(), 1);
        assert_eq!(relaxed[0].page_number, Some(1));
    }

    #[test]
    fn long_table_keeps_guard_on_short_pages() {
        let config = ConfigStore::with_sections(vec![SectionDescriptor::new(
            "issues",
            SectionKind::Table,
            "Issues",
        )]);
        let report = ReportData::new().with_section("issues", table(4));
        let geometry = geometry(80.0);
        let outcome = engine().pack(&LayoutInput {
            config: &config,
            report: &report,
            geometry: &geometry,
        });
        // Three fit per page; pulling one back leaves two on each side
        assert_eq!(ranges(&outcome.page_map, "issues"), vec![(1, 0, 2), (2, 2, 4)]);
        assert!(outcome.diagnostics.is_empty());
    }

    #[test]
    fn missing_data_does_not_block_layout() {
        let config = ConfigStore::with_sections(vec![
            SectionDescriptor::new("issues", SectionKind::Table, "Issues"),
            SectionDescriptor::new("mystery", SectionKind::Unknown, "Mystery"),
            SectionDescriptor::new("equipment", SectionKind::Table, "Equipment"),
        ]);
        let report = ReportData::new().with_section("equipment", table(3));
        let geometry = geometry(330.0);
        let outcome = engine().pack(&LayoutInput {
            config: &config,
            report: &report,
            geometry: &geometry,
        });
        assert_eq!(outcome.page_map.total_pages, 1);
        assert_eq!(ranges(&outcome.page_map, "issues"), vec![(1, 0, 0)]);
        assert_eq!(ranges(&outcome.page_map, "equipment"), vec![(1, 0, 3)]);
        let kinds: Vec<DiagnosticKind> = outcome.diagnostics.iter().map(|d| d.kind).collect();
        assert_eq!(
            kinds,
            vec![DiagnosticKind::MissingData, DiagnosticKind::UnknownSection]
        );
    }

    #[test]
    fn empty_config_produces_no_pages() {
        let config = ConfigStore::default();
        let report = ReportData::new();
        let geometry = PageGeometry::default();
        let map = engine().paginate(&LayoutInput {
            config: &config,
            report: &report,
            geometry: &geometry,
        });
        assert_eq!(map.total_pages, 0);
        map.validate(&report).unwrap();
    }

    #[test]
    fn validate_catches_gaps() {
        let report = ReportData::new().with_section("t", table(10));
        let placement = |start, end, continues| PagePlacement {
            section_id: "t".into(),
            continues_from_previous: continues,
            data_range: Some(DataRange { start, end }),
            render_config: RenderConfig {
                show_header: true,
                show_footer: false,
            },
        };
        let map = PageMap::from_pages(vec![
            Page {
                page_number: 0,
                is_first_page: false,
                sections: vec![placement(0, 4, false)],
            },
            Page {
                page_number: 0,
                is_first_page: false,
                sections: vec![placement(5, 10, true)],
            },
        ]);
        assert!(matches!(
            map.validate(&report),
            Err(LayoutError::RowGap { expected: 4, at: 5, .. })
        ));
    }
}
