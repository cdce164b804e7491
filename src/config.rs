//! # Config Store
//!
//! The single source of layout *intent*: which sections are printed, in
//! what order, at which density, and where the user forced page breaks.
//!
//! Every mutation is a plain state transition. Nothing here triggers
//! packing; the packer reads a snapshot of the store whenever a new page
//! map is needed. The store serializes to a flat, versioned JSON record
//! keyed by project and report period, and loading falls back to the
//! documented defaults instead of failing report loading.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::height::{Density, SectionLayout};
use crate::model::{SectionDescriptor, SectionId, SectionKind};

/// Current schema version of the persisted record.
pub const CONFIG_VERSION: u32 = 2;

/// Default minimum number of rows that must sit beneath a table header.
pub const DEFAULT_ORPHAN_GUARD: usize = 2;

/// Storage key for a project's report period.
pub fn storage_key(project_id: &str, period_id: &str) -> String {
    format!("print-studio:{}:{}", project_id, period_id)
}

/// Per-section settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SectionConfig {
    /// Overrides the store-wide density when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub density: Option<Density>,
    pub columns: usize,
    pub show_header: bool,
    /// Overrides the store-wide orphan guard when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orphan_guard: Option<usize>,
}

impl Default for SectionConfig {
    fn default() -> Self {
        Self {
            density: None,
            columns: 1,
            show_header: true,
            orphan_guard: None,
        }
    }
}

/// A forced page cut immediately after a data row.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualBreak {
    pub section_id: SectionId,
    pub after_row_index: usize,
}

/// Which photos a photo section prints and in which slots.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PhotoSelection {
    pub selected: Vec<String>,
    /// Slot index per photo id. Unpositioned photos follow in selection order.
    pub positions: BTreeMap<String, usize>,
}

impl PhotoSelection {
    /// Selected photo ids ordered by slot.
    pub fn ordered(&self) -> Vec<String> {
        let mut ids: Vec<(usize, usize, &String)> = self
            .selected
            .iter()
            .enumerate()
            .map(|(i, id)| (self.positions.get(id).copied().unwrap_or(usize::MAX), i, id))
            .collect();
        ids.sort();
        ids.into_iter().map(|(_, _, id)| id.clone()).collect()
    }
}

/// A single edit to the store. Edits are how the interactive preview feeds
/// selections and drag reorders back into the layout intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ConfigEdit {
    ToggleSection { section_id: SectionId },
    SetIncluded { section_id: SectionId, included: bool },
    MoveSection { section_id: SectionId, to_index: usize },
    SetDensity { density: Density },
    SetSectionDensity {
        section_id: SectionId,
        density: Option<Density>,
    },
    SetColumns { section_id: SectionId, columns: usize },
    SetManualBreak {
        section_id: SectionId,
        after_row_index: usize,
    },
    ClearManualBreaks { section_id: SectionId },
    ToggleRowBreak { section_id: SectionId, row_index: usize },
    SetPhotoSelection {
        section_id: SectionId,
        photo_ids: Vec<String>,
    },
    SetPhotoPosition {
        section_id: SectionId,
        photo_id: String,
        slot: usize,
    },
    SetOrphanGuard { rows: usize },
}

/// The print-studio configuration for one report period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigStore {
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub period_id: String,
    #[serde(default)]
    pub sections: Vec<SectionDescriptor>,
    #[serde(default)]
    pub density: Density,
    #[serde(default = "default_orphan_guard")]
    pub orphan_guard: usize,
    #[serde(default)]
    pub section_settings: BTreeMap<SectionId, SectionConfig>,
    #[serde(default)]
    pub manual_breaks: Vec<ManualBreak>,
    #[serde(default)]
    pub row_breaks: BTreeMap<SectionId, BTreeSet<usize>>,
    #[serde(default)]
    pub photo_selections: BTreeMap<SectionId, PhotoSelection>,
}

fn default_orphan_guard() -> usize {
    DEFAULT_ORPHAN_GUARD
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::with_sections(Vec::new())
    }
}

impl ConfigStore {
    /// A store over the given sections, in list order.
    pub fn with_sections(sections: Vec<SectionDescriptor>) -> Self {
        let mut store = Self {
            version: CONFIG_VERSION,
            project_id: String::new(),
            period_id: String::new(),
            sections,
            density: Density::Standard,
            orphan_guard: DEFAULT_ORPHAN_GUARD,
            section_settings: BTreeMap::new(),
            manual_breaks: Vec::new(),
            row_breaks: BTreeMap::new(),
            photo_selections: BTreeMap::new(),
        };
        store.renumber();
        store
    }

    /// The documented default layout of a weekly progress report.
    pub fn weekly_report_defaults(project_id: &str, period_id: &str) -> Self {
        let mut store = Self::with_sections(vec![
            SectionDescriptor::new("cover", SectionKind::Cover, "Cover"),
            SectionDescriptor::new("summary", SectionKind::Narrative, "Executive Summary"),
            SectionDescriptor::new("manpower", SectionKind::Table, "Manpower"),
            SectionDescriptor::new("equipment", SectionKind::Table, "Equipment"),
            SectionDescriptor::new("materials", SectionKind::Table, "Materials"),
            SectionDescriptor::new("issues", SectionKind::Table, "Issues"),
            SectionDescriptor::new("invoices", SectionKind::Table, "Invoices"),
            SectionDescriptor::new("photos", SectionKind::PhotoGrid, "Site Photos"),
        ]);
        store.project_id = project_id.to_string();
        store.period_id = period_id.to_string();
        store
            .section_settings
            .insert("photos".to_string(), SectionConfig {
                columns: 2,
                ..Default::default()
            });
        store
    }

    pub fn storage_key(&self) -> String {
        storage_key(&self.project_id, &self.period_id)
    }

    // ── Reads ───────────────────────────────────────────────────

    pub fn section(&self, id: &str) -> Option<&SectionDescriptor> {
        self.sections.iter().find(|s| s.id == id)
    }

    /// Included sections in their total order: by `order`, ties broken by
    /// list position.
    pub fn included_sections(&self) -> Vec<&SectionDescriptor> {
        let mut included: Vec<(usize, &SectionDescriptor)> = self
            .sections
            .iter()
            .enumerate()
            .filter(|(_, s)| s.included)
            .collect();
        included.sort_by_key(|(i, s)| (s.order, *i));
        included.into_iter().map(|(_, s)| s).collect()
    }

    pub fn section_config(&self, id: &str) -> SectionConfig {
        self.section_settings.get(id).cloned().unwrap_or_default()
    }

    /// Resolved settings the height model and renderers work from.
    pub fn section_layout(&self, id: &str) -> SectionLayout {
        let config = self.section_config(id);
        SectionLayout {
            density: config.density.unwrap_or(self.density),
            columns: config.columns.max(1),
            show_header: config.show_header,
            selected_photos: self
                .photo_selections
                .get(id)
                .map(PhotoSelection::ordered)
                .unwrap_or_default(),
        }
    }

    pub fn orphan_guard_for(&self, id: &str) -> usize {
        self.section_config(id)
            .orphan_guard
            .unwrap_or(self.orphan_guard)
            .max(1)
    }

    /// Sorted, de-duplicated row indices after which a page must break:
    /// manual breaks and row toggles combined.
    pub fn breaks_for(&self, id: &str) -> Vec<usize> {
        let mut rows: BTreeSet<usize> = self
            .manual_breaks
            .iter()
            .filter(|b| b.section_id == id)
            .map(|b| b.after_row_index)
            .collect();
        if let Some(toggled) = self.row_breaks.get(id) {
            rows.extend(toggled.iter().copied());
        }
        rows.into_iter().collect()
    }

    // ── Mutations ───────────────────────────────────────────────

    /// Apply a single edit.
    pub fn apply(&mut self, edit: ConfigEdit) -> Result<(), ConfigError> {
        match edit {
            ConfigEdit::ToggleSection { section_id } => {
                let section = self.section_mut(&section_id)?;
                section.included = !section.included;
            }
            ConfigEdit::SetIncluded {
                section_id,
                included,
            } => {
                self.section_mut(&section_id)?.included = included;
            }
            ConfigEdit::MoveSection {
                section_id,
                to_index,
            } => {
                let from = self.index_of(&section_id)?;
                let section = self.sections.remove(from);
                let to = to_index.min(self.sections.len());
                self.sections.insert(to, section);
                self.renumber();
            }
            ConfigEdit::SetDensity { density } => {
                self.density = density;
            }
            ConfigEdit::SetSectionDensity {
                section_id,
                density,
            } => {
                self.settings_mut(&section_id)?.density = density;
            }
            ConfigEdit::SetColumns {
                section_id,
                columns,
            } => {
                if columns == 0 {
                    return Err(ConfigError::InvalidColumns(section_id));
                }
                self.settings_mut(&section_id)?.columns = columns;
            }
            ConfigEdit::SetManualBreak {
                section_id,
                after_row_index,
            } => {
                self.index_of(&section_id)?;
                let brk = ManualBreak {
                    section_id,
                    after_row_index,
                };
                if !self.manual_breaks.contains(&brk) {
                    self.manual_breaks.push(brk);
                    self.manual_breaks.sort();
                }
            }
            ConfigEdit::ClearManualBreaks { section_id } => {
                self.index_of(&section_id)?;
                self.manual_breaks.retain(|b| b.section_id != section_id);
            }
            ConfigEdit::ToggleRowBreak {
                section_id,
                row_index,
            } => {
                self.index_of(&section_id)?;
                let rows = self.row_breaks.entry(section_id.clone()).or_default();
                if !rows.remove(&row_index) {
                    rows.insert(row_index);
                }
                if rows.is_empty() {
                    self.row_breaks.remove(&section_id);
                }
            }
            ConfigEdit::SetPhotoSelection {
                section_id,
                photo_ids,
            } => {
                self.index_of(&section_id)?;
                let selection = self.photo_selections.entry(section_id).or_default();
                selection.positions.retain(|id, _| photo_ids.contains(id));
                selection.selected = photo_ids;
            }
            ConfigEdit::SetPhotoPosition {
                section_id,
                photo_id,
                slot,
            } => {
                self.index_of(&section_id)?;
                let selection = self.photo_selections.entry(section_id).or_default();
                if !selection.selected.contains(&photo_id) {
                    selection.selected.push(photo_id.clone());
                }
                selection.positions.insert(photo_id, slot);
            }
            ConfigEdit::SetOrphanGuard { rows } => {
                if rows == 0 {
                    return Err(ConfigError::InvalidOrphanGuard);
                }
                self.orphan_guard = rows;
            }
        }
        Ok(())
    }

    pub fn toggle_section(&mut self, id: &str) -> Result<(), ConfigError> {
        self.apply(ConfigEdit::ToggleSection {
            section_id: id.to_string(),
        })
    }

    pub fn set_included(&mut self, id: &str, included: bool) -> Result<(), ConfigError> {
        self.apply(ConfigEdit::SetIncluded {
            section_id: id.to_string(),
            included,
        })
    }

    pub fn move_section(&mut self, id: &str, to_index: usize) -> Result<(), ConfigError> {
        self.apply(ConfigEdit::MoveSection {
            section_id: id.to_string(),
            to_index,
        })
    }

    pub fn set_density(&mut self, density: Density) {
        self.density = density;
    }

    pub fn set_section_density(
        &mut self,
        id: &str,
        density: Option<Density>,
    ) -> Result<(), ConfigError> {
        self.apply(ConfigEdit::SetSectionDensity {
            section_id: id.to_string(),
            density,
        })
    }

    pub fn set_columns(&mut self, id: &str, columns: usize) -> Result<(), ConfigError> {
        self.apply(ConfigEdit::SetColumns {
            section_id: id.to_string(),
            columns,
        })
    }

    pub fn set_manual_break(
        &mut self,
        id: &str,
        after_row_index: usize,
    ) -> Result<(), ConfigError> {
        self.apply(ConfigEdit::SetManualBreak {
            section_id: id.to_string(),
            after_row_index,
        })
    }

    pub fn clear_manual_breaks(&mut self, id: &str) -> Result<(), ConfigError> {
        self.apply(ConfigEdit::ClearManualBreaks {
            section_id: id.to_string(),
        })
    }

    /// Flip the break after `row_index`; returns whether a break is now set.
    pub fn toggle_row_break(&mut self, id: &str, row_index: usize) -> Result<bool, ConfigError> {
        self.apply(ConfigEdit::ToggleRowBreak {
            section_id: id.to_string(),
            row_index,
        })?;
        Ok(self
            .row_breaks
            .get(id)
            .is_some_and(|rows| rows.contains(&row_index)))
    }

    pub fn set_photo_selection(
        &mut self,
        id: &str,
        photo_ids: Vec<String>,
    ) -> Result<(), ConfigError> {
        self.apply(ConfigEdit::SetPhotoSelection {
            section_id: id.to_string(),
            photo_ids,
        })
    }

    pub fn set_photo_position(
        &mut self,
        id: &str,
        photo_id: &str,
        slot: usize,
    ) -> Result<(), ConfigError> {
        self.apply(ConfigEdit::SetPhotoPosition {
            section_id: id.to_string(),
            photo_id: photo_id.to_string(),
            slot,
        })
    }

    pub fn set_orphan_guard(&mut self, rows: usize) -> Result<(), ConfigError> {
        self.apply(ConfigEdit::SetOrphanGuard { rows })
    }

    fn index_of(&self, id: &str) -> Result<usize, ConfigError> {
        self.sections
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| ConfigError::UnknownSection(id.to_string()))
    }

    fn section_mut(&mut self, id: &str) -> Result<&mut SectionDescriptor, ConfigError> {
        let idx = self.index_of(id)?;
        Ok(&mut self.sections[idx])
    }

    fn settings_mut(&mut self, id: &str) -> Result<&mut SectionConfig, ConfigError> {
        self.index_of(id)?;
        Ok(self.section_settings.entry(id.to_string()).or_default())
    }

    fn renumber(&mut self) {
        for (i, section) in self.sections.iter_mut().enumerate() {
            section.order = i as i32;
        }
    }

    // ── Persistence format ──────────────────────────────────────

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Load a persisted record, falling back to the weekly report defaults
    /// for the given project/period when the record is missing, malformed,
    /// or written by a newer schema.
    pub fn load_or_default(record: Option<&str>, project_id: &str, period_id: &str) -> Self {
        let Some(json) = record else {
            log::debug!("no saved print config for {}:{}, using defaults", project_id, period_id);
            return Self::weekly_report_defaults(project_id, period_id);
        };

        match serde_json::from_str::<ConfigStore>(json) {
            Ok(store) if store.version > CONFIG_VERSION => {
                log::warn!(
                    "print config version {} is newer than supported {}, using defaults",
                    store.version,
                    CONFIG_VERSION
                );
                Self::weekly_report_defaults(project_id, period_id)
            }
            Ok(store) if store.sections.is_empty() => {
                log::warn!("print config has no sections, using defaults");
                Self::weekly_report_defaults(project_id, period_id)
            }
            Ok(mut store) => {
                store.version = CONFIG_VERSION;
                store.project_id = project_id.to_string();
                store.period_id = period_id.to_string();
                store
            }
            Err(e) => {
                log::warn!("malformed print config ({}), using defaults", e);
                Self::weekly_report_defaults(project_id, period_id)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> ConfigStore {
        ConfigStore::weekly_report_defaults("p1", "2026-W42")
    }

    fn ids(store: &ConfigStore) -> Vec<&str> {
        store
            .included_sections()
            .iter()
            .map(|s| s.id.as_str())
            .collect()
    }

    #[test]
    fn toggle_excludes_section() {
        let mut s = store();
        s.toggle_section("equipment").unwrap();
        assert!(!ids(&s).contains(&"equipment"));
        s.toggle_section("equipment").unwrap();
        assert!(ids(&s).contains(&"equipment"));
    }

    #[test]
    fn unknown_section_is_rejected() {
        let mut s = store();
        assert_eq!(
            s.toggle_section("gantt"),
            Err(ConfigError::UnknownSection("gantt".to_string()))
        );
        assert!(s.set_manual_break("gantt", 3).is_err());
    }

    #[test]
    fn move_section_renumbers_order() {
        let mut s = store();
        s.move_section("photos", 1).unwrap();
        assert_eq!(&ids(&s)[..3], &["cover", "photos", "summary"]);
        for (i, section) in s.sections.iter().enumerate() {
            assert_eq!(section.order, i as i32);
        }
        // Past the end clamps to the last slot
        s.move_section("cover", 99).unwrap();
        assert_eq!(*ids(&s).last().unwrap(), "cover");
    }

    #[test]
    fn disabled_sections_skip_in_order() {
        let mut s = store();
        s.set_included("summary", false).unwrap();
        s.move_section("summary", 0).unwrap();
        assert_eq!(ids(&s)[0], "cover");
    }

    #[test]
    fn breaks_merge_manual_and_row_toggles() {
        let mut s = store();
        s.set_manual_break("manpower", 9).unwrap();
        s.set_manual_break("manpower", 9).unwrap();
        s.set_manual_break("manpower", 3).unwrap();
        assert!(s.toggle_row_break("manpower", 5).unwrap());
        assert!(s.toggle_row_break("manpower", 9).unwrap());
        assert_eq!(s.breaks_for("manpower"), vec![3, 5, 9]);
        assert!(s.breaks_for("equipment").is_empty());

        assert!(!s.toggle_row_break("manpower", 5).unwrap());
        s.clear_manual_breaks("manpower").unwrap();
        // The row toggle survives clearing manual breaks
        assert_eq!(s.breaks_for("manpower"), vec![9]);
    }

    #[test]
    fn section_density_overrides_store_density() {
        let mut s = store();
        s.set_density(Density::Compact);
        s.set_section_density("issues", Some(Density::Relaxed)).unwrap();
        assert_eq!(s.section_layout("issues").density, Density::Relaxed);
        assert_eq!(s.section_layout("equipment").density, Density::Compact);
        s.set_section_density("issues", None).unwrap();
        assert_eq!(s.section_layout("issues").density, Density::Compact);
    }

    #[test]
    fn zero_columns_rejected() {
        let mut s = store();
        assert_eq!(
            s.set_columns("photos", 0),
            Err(ConfigError::InvalidColumns("photos".to_string()))
        );
        s.set_columns("photos", 3).unwrap();
        assert_eq!(s.section_layout("photos").columns, 3);
    }

    #[test]
    fn photo_positions_order_selection() {
        let mut s = store();
        s.set_photo_selection("photos", vec!["a".into(), "b".into(), "c".into()])
            .unwrap();
        s.set_photo_position("photos", "c", 0).unwrap();
        s.set_photo_position("photos", "a", 1).unwrap();
        assert_eq!(s.section_layout("photos").selected_photos, vec!["c", "a", "b"]);

        // Re-selecting drops positions of deselected photos
        s.set_photo_selection("photos", vec!["a".into(), "b".into()])
            .unwrap();
        assert_eq!(s.section_layout("photos").selected_photos, vec!["a", "b"]);
    }

    #[test]
    fn orphan_guard_override() {
        let mut s = store();
        assert_eq!(s.orphan_guard_for("equipment"), 2);
        assert_eq!(s.set_orphan_guard(0), Err(ConfigError::InvalidOrphanGuard));
        s.set_orphan_guard(3).unwrap();
        s.section_settings.insert(
            "issues".to_string(),
            SectionConfig {
                orphan_guard: Some(1),
                ..Default::default()
            },
        );
        assert_eq!(s.orphan_guard_for("equipment"), 3);
        assert_eq!(s.orphan_guard_for("issues"), 1);
    }

    #[test]
    fn edit_json_shape() {
        let edit: ConfigEdit = serde_json::from_str(
            r#"{ "op": "moveSection", "sectionId": "photos", "toIndex": 2 }"#,
        )
        .unwrap();
        let mut s = store();
        s.apply(edit).unwrap();
        assert_eq!(ids(&s)[2], "photos");
    }

    #[test]
    fn persisted_record_round_trips() {
        let mut s = store();
        s.set_manual_break("equipment", 12).unwrap();
        s.toggle_row_break("issues", 4).unwrap();
        let json = s.to_json().unwrap();
        assert!(json.contains("\"manualBreaks\""));
        let loaded = ConfigStore::load_or_default(Some(&json), "p1", "2026-W42");
        assert_eq!(loaded, s);
    }

    #[test]
    fn missing_or_malformed_record_falls_back() {
        let defaults = store();
        assert_eq!(ConfigStore::load_or_default(None, "p1", "2026-W42"), defaults);
        assert_eq!(
            ConfigStore::load_or_default(Some("{ not json"), "p1", "2026-W42"),
            defaults
        );
        assert_eq!(
            ConfigStore::load_or_default(
                Some(r#"{ "version": 99, "sections": [] }"#),
                "p1",
                "2026-W42"
            ),
            defaults
        );
    }

    #[test]
    fn older_record_loads_with_defaults_for_new_fields() {
        let v1 = r#"{
            "version": 1,
            "sections": [
                { "id": "summary", "kind": "narrative", "title": "Summary" },
                { "id": "equipment", "kind": "table", "title": "Equipment", "included": false }
            ],
            "density": "compact",
            "manualBreaks": [{ "sectionId": "equipment", "afterRowIndex": 4 }]
        }"#;
        let loaded = ConfigStore::load_or_default(Some(v1), "p1", "w1");
        assert_eq!(loaded.version, CONFIG_VERSION);
        assert_eq!(loaded.orphan_guard, DEFAULT_ORPHAN_GUARD);
        assert!(loaded.row_breaks.is_empty());
        assert_eq!(loaded.density, Density::Compact);
        assert_eq!(loaded.included_sections().len(), 1);
        assert_eq!(loaded.breaks_for("equipment"), vec![4]);
    }

    #[test]
    fn storage_key_includes_project_and_period() {
        assert_eq!(store().storage_key(), "print-studio:p1:2026-W42");
    }
}
