//! Output formatting for CLI

use clap::ValueEnum;
use colored::{Color as TermColor, Colorize};
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use runwatch_common::ansi::{self, Color, Segment};
use runwatch_common::{LifecycleState, StatusSnapshot};
use serde::Serialize;

/// Output format
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
    /// YAML format
    Yaml,
    /// Plain text format
    Plain,
}

/// Trait for items that can be displayed in a table
pub trait TableDisplay {
    fn headers() -> Vec<&'static str>;
    fn row(&self) -> Vec<String>;
}

/// Final report for one execution
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub id: String,
    pub state: LifecycleState,
    pub total: Option<u32>,
    pub passed: Option<u32>,
    pub failed: Option<u32>,
    pub skipped: Option<u32>,
    pub duration_ms: Option<u64>,
    pub artifacts: usize,
    pub failure: Option<String>,
}

impl From<&StatusSnapshot> for JobReport {
    fn from(snapshot: &StatusSnapshot) -> Self {
        let summary = snapshot.summary.as_ref();
        Self {
            id: snapshot.id.clone(),
            state: snapshot.lifecycle_state,
            total: summary.map(|s| s.total),
            passed: summary.map(|s| s.passed),
            failed: summary.map(|s| s.failed),
            skipped: summary.map(|s| s.skipped),
            duration_ms: summary.map(|s| s.duration_ms),
            artifacts: snapshot.auxiliary_artifacts.len(),
            failure: snapshot.failure_detail.clone(),
        }
    }
}

fn count(value: Option<impl ToString>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

impl TableDisplay for JobReport {
    fn headers() -> Vec<&'static str> {
        vec![
            "ID", "STATE", "TOTAL", "PASSED", "FAILED", "SKIPPED", "DURATION", "ARTIFACTS", "FAILURE",
        ]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.state.to_string(),
            count(self.total),
            count(self.passed),
            count(self.failed),
            count(self.skipped),
            self.duration_ms
                .map(|ms| format!("{:.1}s", ms as f64 / 1000.0))
                .unwrap_or_else(|| "-".to_string()),
            self.artifacts.to_string(),
            self.failure.clone().unwrap_or_default(),
        ]
    }
}

/// Print a list of items
pub fn print_list<T: Serialize + TableDisplay>(items: &[T], format: OutputFormat) {
    if items.is_empty() {
        println!("No items found.");
        return;
    }

    match format {
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic);

            table.set_header(T::headers());
            for item in items {
                table.add_row(item.row());
            }

            println!("{table}");
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(items).unwrap_or_default());
        }
        OutputFormat::Yaml => {
            println!("{}", serde_yaml::to_string(items).unwrap_or_default());
        }
        OutputFormat::Plain => {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    println!("---");
                }
                let row = item.row();
                for (header, value) in T::headers().iter().zip(row.iter()) {
                    println!("{}: {}", header, value);
                }
            }
        }
    }
}

/// Print success message
pub fn print_success(message: &str) {
    println!("✅ {}", message);
}

/// Print error message
pub fn print_error(message: &str) {
    eprintln!("❌ {}", message);
}

fn term_color(color: Color) -> TermColor {
    match color {
        Color::Red => TermColor::Red,
        Color::Green => TermColor::Green,
        Color::Yellow => TermColor::Yellow,
        Color::Blue => TermColor::Blue,
        Color::Magenta => TermColor::Magenta,
        Color::Cyan => TermColor::Cyan,
        Color::BrightRed => TermColor::BrightRed,
        Color::BrightGreen => TermColor::BrightGreen,
        Color::BrightYellow => TermColor::BrightYellow,
        Color::BrightBlue => TermColor::BrightBlue,
        Color::BrightMagenta => TermColor::BrightMagenta,
        Color::BrightCyan => TermColor::BrightCyan,
    }
}

fn render_segment(segment: &Segment) -> String {
    let mut text = segment.text.as_str().normal();
    if let Some(color) = segment.style.color {
        text = text.color(term_color(color));
    }
    if segment.style.bold {
        text = text.bold();
    }
    if segment.style.dim {
        text = text.dimmed();
    }
    text.to_string()
}

/// Re-render one captured console line for this terminal.
///
/// Only the styles the decoder understands survive; `plain` drops styling
/// altogether.
pub fn render_line(line: &str, plain: bool) -> String {
    if plain {
        return ansi::strip(line);
    }
    ansi::decode(line).iter().map(render_segment).collect()
}
