//! # Folio
//!
//! A page-packing engine for weekly construction progress reports.
//!
//! A report is an ordered list of sections (cover, narrative, tables, photo
//! grids) backed by data of any length. Folio decides, once, which section
//! lands on which page and where each table is cut. That decision is the
//! [`layout::PageMap`]. Both outputs, the interactive HTML preview and the
//! exported PDF, are drawn from the same map, so they always show the same
//! pages.
//!
//! ## Architecture
//!
//! ```text
//! Input (JSON job / API)
//!       ↓
//!   [config]       Section order, inclusion, density, manual breaks
//!   [model]        Report data and page geometry
//!       ↓
//!   [height]       Estimated section heights (never measured)
//!       ↓
//!   [layout]       Greedy page packing → PageMap
//!       ↓
//!   [render]       PageMap → positioned frames
//!       ↓                 ↓
//!   [render::markup]   [pdf] / [export]
//!       ↓
//!   [diagnostics]  Overflow, blank pages, orphaned headers
//! ```
//!
//! [`persist`] holds the debounce and retry policy for saving the config
//! store; the storage itself is the caller's.

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod export;
pub mod height;
pub mod image_loader;
pub mod layout;
pub mod model;
pub mod pdf;
pub mod persist;
pub mod render;
pub mod text;

#[cfg(feature = "wasm")]
pub mod wasm;

use serde::{Deserialize, Serialize};

use config::ConfigStore;
use diagnostics::{Diagnostic, DiagnosticThresholds};
use error::FolioError;
use export::{ExportOptions, ExportedDocument};
use height::{HeightModel, HeightProfile};
use layout::{LayoutEngine, LayoutInput, PageMap};
use model::{Metadata, PageGeometry, ReportData};
use render::markup::PreviewContext;
use render::{Frame, RenderSummary};

/// Everything needed to lay out and render one report.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    #[serde(default)]
    pub geometry: PageGeometry,
    #[serde(default)]
    pub height_profile: HeightProfile,
    #[serde(default)]
    pub thresholds: DiagnosticThresholds,
    /// Falls back to the default weekly report sections when absent.
    #[serde(default)]
    pub config: Option<ConfigStore>,
    #[serde(default)]
    pub report: ReportData,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Job {
    pub fn from_json(json: &str) -> Result<Self, FolioError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Pack, compose and inspect.
    pub fn prepare(&self) -> Prepared {
        let default_config;
        let config = match &self.config {
            Some(config) => config,
            None => {
                default_config = ConfigStore::weekly_report_defaults("report", "current");
                &default_config
            }
        };
        let input = LayoutInput {
            config,
            report: &self.report,
            geometry: &self.geometry,
        };
        let engine = LayoutEngine::new(HeightModel::new(self.height_profile.clone()));
        let outcome = engine.pack(&input);
        let frames = render::compose(&outcome.page_map, &input, engine.model());

        let mut diagnostics = outcome.diagnostics;
        diagnostics.extend(diagnostics::inspect(&frames, &self.thresholds));

        Prepared {
            page_map: outcome.page_map,
            frames,
            diagnostics,
        }
    }
}

/// A packed and composed report, ready for either renderer.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub page_map: PageMap,
    pub frames: Vec<Frame>,
    /// Packing diagnostics followed by post-render findings.
    pub diagnostics: Vec<Diagnostic>,
}

impl Prepared {
    pub fn render_preview(&self, context: &PreviewContext) -> (String, RenderSummary) {
        render::markup::render_preview(&self.frames, context)
    }

    pub fn export_pdf(&self, options: &ExportOptions) -> Result<ExportedDocument, FolioError> {
        Ok(export::export_pdf(&self.frames, options)?)
    }

    /// Render both outputs and check that they agree.
    pub fn render_both(
        &self,
        context: &PreviewContext,
        options: &ExportOptions,
    ) -> Result<(String, ExportedDocument), FolioError> {
        let (html, preview) = self.render_preview(context);
        let document = self.export_pdf(options)?;
        render::ensure_consistent(&preview, &document.summary)?;
        Ok((html, document))
    }
}

/// Pack a report with the default height model.
pub fn paginate(config: &ConfigStore, report: &ReportData, geometry: &PageGeometry) -> PageMap {
    LayoutEngine::default().paginate(&LayoutInput {
        config,
        report,
        geometry,
    })
}

/// Lay out a JSON job and return its page map as JSON.
pub fn page_map_json(json: &str) -> Result<String, FolioError> {
    let prepared = Job::from_json(json)?.prepare();
    Ok(serde_json::to_string_pretty(&prepared.page_map)?)
}

/// Lay out a JSON job and export it to PDF bytes.
pub fn render_pdf_json(json: &str) -> Result<Vec<u8>, FolioError> {
    let job = Job::from_json(json)?;
    let options = ExportOptions {
        metadata: job.metadata.clone(),
        ..Default::default()
    };
    Ok(job.prepare().export_pdf(&options)?.bytes)
}
