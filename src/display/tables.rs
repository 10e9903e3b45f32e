//! Table formatting utilities for structured output.

use crate::corpus::RecomputeReport;
use crate::types::{Document, EdgeKind, SimilarityEdge, Visualization};
use comfy_table::{
    Attribute, Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL,
};

/// Longest title shown before truncation.
const TITLE_WIDTH: usize = 48;

fn new_table() -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.apply_modifier(UTF8_ROUND_CORNERS);
    table
}

fn bold_cells(headers: &[&str]) -> Vec<Cell> {
    headers
        .iter()
        .map(|h| Cell::new(h).add_attribute(Attribute::Bold))
        .collect()
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        text.to_string()
    } else {
        let head: String = text.chars().take(width.saturating_sub(1)).collect();
        format!("{head}…")
    }
}

/// Parse `#rrggbb` into a table color.
fn palette_color(hex: &str) -> Option<Color> {
    let hex = hex.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
    Some(Color::Rgb {
        r: channel(0)?,
        g: channel(2)?,
        b: channel(4)?,
    })
}

/// One row per document: id, title, topic, confidence, position.
pub fn create_documents_table(documents: &[Document]) -> String {
    let mut table = new_table();
    table.set_header(bold_cells(&["ID", "Title", "Topic", "Confidence", "Position"]));

    for doc in documents {
        let title = if doc.title.is_empty() {
            &doc.display_title
        } else {
            &doc.title
        };
        let mut topic = Cell::new(&doc.field);
        if let Some(color) = palette_color(&doc.color) {
            topic = topic.fg(color);
        }

        table.add_row(vec![
            Cell::new(doc.id.as_str()),
            Cell::new(truncate(title, TITLE_WIDTH)),
            topic,
            Cell::new(format!("{:.2}", doc.confidence)),
            Cell::new(format!(
                "({:.2}, {:.2}, {:.2})",
                doc.position.x, doc.position.y, doc.position.z
            )),
        ]);
    }

    table.to_string()
}

/// Per-topic document counts.
pub fn create_topics_table(visualization: &Visualization) -> String {
    let mut table = new_table();
    table.set_header(bold_cells(&["Topic", "Documents"]));
    for field in &visualization.fields {
        table.add_row(vec![Cell::new(&field.name), Cell::new(field.count)]);
    }
    table.to_string()
}

/// Similarity edges, strongest first.
pub fn create_edges_table(edges: &[SimilarityEdge]) -> String {
    let mut sorted: Vec<&SimilarityEdge> = edges.iter().collect();
    sorted.sort_by(|a, b| b.weight.total_cmp(&a.weight));

    let mut table = new_table();
    table.set_header(bold_cells(&["Source", "Target", "Weight", "Type"]));
    for edge in sorted {
        let kind = match edge.kind {
            EdgeKind::Intra => Cell::new("intra").fg(Color::Green),
            EdgeKind::Bridge => Cell::new("bridge").fg(Color::Yellow),
        };
        table.add_row(vec![
            Cell::new(edge.source.as_str()),
            Cell::new(edge.target.as_str()),
            Cell::new(format!("{:.3}", edge.weight)),
            kind,
        ]);
    }
    table.to_string()
}

/// Summary of a recompute.
pub fn create_recompute_table(report: &RecomputeReport) -> String {
    let mut table = new_table();
    table.set_header(bold_cells(&["Metric", "Value"]));

    table.add_row(vec!["Documents".to_string(), report.documents.to_string()]);
    table.add_row(vec!["Topics".to_string(), report.clusters.to_string()]);
    table.add_row(vec![
        "Re-embedded".to_string(),
        if report.reembedded { "yes" } else { "no" }.to_string(),
    ]);
    if let Some(selection) = &report.selection {
        table.add_row(vec!["Cluster selection".to_string(), format!("{selection:?}")]);
    }
    if let Some(projection) = &report.projection {
        table.add_row(vec!["Projection".to_string(), format!("{projection:?}")]);
    }
    table.add_row(vec!["Time".to_string(), format!("{:.2?}", report.elapsed)]);

    let saved = if report.persisted {
        Cell::new("✓ saved").fg(Color::Green)
    } else {
        Cell::new("⚠ not saved").fg(Color::Yellow)
    };
    table.add_row(vec![Cell::new("Snapshot"), saved.add_attribute(Attribute::Bold)]);

    table.to_string()
}
