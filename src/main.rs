//! # Folio CLI
//!
//! Usage:
//!   folio job.json -o report.pdf
//!   folio job.json --preview report.html
//!   folio job.json --page-map
//!   echo '{ ... }' | folio -o report.pdf
//!   folio --example > job.json
//!
//! Set `RUST_LOG=debug` to see packing decisions.

use std::env;
use std::fs;
use std::io::{self, Read};

use folio::config::ConfigStore;
use folio::diagnostics::Severity;
use folio::export::ExportOptions;
use folio::model::{CoverData, Metadata, Photo, ReportData, SectionData, TableData};
use folio::render::markup::PreviewContext;
use folio::Job;

fn main() {
    env_logger::init();
    let args: Vec<String> = env::args().collect();

    if args.iter().any(|a| a == "--example") {
        match serde_json::to_string_pretty(&example_job()) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("✗ Failed to build example: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    if let Err(e) = run(&args) {
        eprintln!("✗ {}", e);
        std::process::exit(1);
    }
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn run(args: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let input = if args.len() > 1 && !args[1].starts_with('-') {
        fs::read_to_string(&args[1])
            .map_err(|e| format!("Failed to read input file '{}': {}", args[1], e))?
    } else {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        buf
    };

    let job = Job::from_json(&input)?;
    let prepared = job.prepare();

    for d in &prepared.diagnostics {
        let marker = match d.severity {
            Severity::Error => "✗",
            Severity::Warning => "!",
            Severity::Info => "i",
        };
        eprintln!("{} {}", marker, d.message);
    }

    if args.iter().any(|a| a == "--page-map") {
        println!("{}", serde_json::to_string_pretty(&prepared.page_map)?);
        return Ok(());
    }

    if let Some(path) = flag_value(args, "--preview") {
        let (html, summary) = prepared.render_preview(&PreviewContext::default());
        fs::write(path, &html)?;
        eprintln!(
            "✓ Written {} preview pages to {}",
            summary.page_count(),
            path
        );
        if flag_value(args, "-o").is_none() {
            return Ok(());
        }
    }

    let output_path = flag_value(args, "-o").unwrap_or("report.pdf");
    let options = ExportOptions {
        metadata: job.metadata.clone(),
        ..Default::default()
    };
    let document = prepared.export_pdf(&options)?;
    for fallback in &document.fallbacks {
        eprintln!(
            "! Photo '{}' on page {} drawn as a placeholder: {}",
            fallback.element_id, fallback.page_number, fallback.reason
        );
    }
    fs::write(output_path, &document.bytes)?;
    eprintln!(
        "✓ Written {} pages ({} bytes) to {}",
        document.summary.page_count(),
        document.bytes.len(),
        output_path
    );
    Ok(())
}

fn table(columns: &[&str], rows: Vec<Vec<String>>, totals: Option<Vec<&str>>) -> SectionData {
    let mut data = TableData::new(columns).with_rows(rows);
    data.totals = totals.map(|t| t.into_iter().map(String::from).collect());
    SectionData::Table(data)
}

fn example_job() -> Job {
    let trades = ["Concrete", "Steel", "Electrical", "Plumbing", "Carpentry", "Glazing"];
    let manpower = trades
        .iter()
        .enumerate()
        .map(|(i, t)| {
            let workers = 4 + i * 3;
            vec![t.to_string(), workers.to_string(), (workers * 40).to_string()]
        })
        .collect();
    let equipment = (0..40)
        .map(|i| {
            vec![
                format!("EQ-{:03}", i + 1),
                ["Excavator", "Tower crane", "Concrete pump", "Scissor lift"][i % 4].to_string(),
                format!("{}", 20 + (i * 7) % 30),
            ]
        })
        .collect();
    let invoices = (0..8)
        .map(|i| {
            vec![
                format!("INV-{:04}", 1040 + i),
                ["Harbor Concrete", "Northside Steel", "Bright Electric"][i % 3].to_string(),
                format!("${},{:03}.00", 12 + i * 3, (i * 250) % 1000),
            ]
        })
        .collect();

    let report = ReportData::new()
        .with_section(
            "cover",
            SectionData::Cover(CoverData {
                project_name: "Harbor Tower".into(),
                report_period: "Week 42, 2026".into(),
                subtitle: Some("Weekly Progress Report".into()),
                prepared_by: Some("Site Engineering".into()),
            }),
        )
        .with_section(
            "summary",
            SectionData::Narrative {
                text: "Level 14 slab poured on schedule. \
                       Curtain wall installation started on the north face.\n\
                       Crane downtime on Tuesday due to high winds; \
                       no impact on the critical path."
                    .into(),
            },
        )
        .with_section(
            "manpower",
            table(
                &["Trade", "Workers", "Hours"],
                manpower,
                Some(vec!["Total", "75", "3000"]),
            ),
        )
        .with_section("equipment", table(&["Tag", "Equipment", "Hours"], equipment, None))
        .with_section(
            "materials",
            table(&["Material", "Delivered", "Unit"], Vec::new(), None),
        )
        .with_section(
            "issues",
            table(
                &["Issue", "Owner", "Status"],
                vec![vec!["Late rebar delivery".into(), "Procurement".into(), "Open".into()]],
                None,
            ),
        )
        .with_section("invoices", table(&["Invoice", "Vendor", "Amount"], invoices, None))
        .with_section(
            "photos",
            SectionData::Photos {
                photos: vec![
                    Photo {
                        id: "north".into(),
                        src: "./photos/north-face.jpg".into(),
                        caption: "North face curtain wall".into(),
                    },
                    Photo {
                        id: "slab".into(),
                        src: "./photos/level-14.jpg".into(),
                        caption: "Level 14 slab".into(),
                    },
                ],
            },
        );

    let mut config = ConfigStore::weekly_report_defaults("harbor-tower", "2026-W42");
    // Start a fresh page after the 30th equipment row
    let _ = config.set_manual_break("equipment", 29);

    Job {
        geometry: Default::default(),
        height_profile: Default::default(),
        thresholds: Default::default(),
        config: Some(config),
        report,
        metadata: Metadata {
            title: Some("Harbor Tower, Week 42".into()),
            author: Some("Site Engineering".into()),
            subject: None,
        },
    }
}
