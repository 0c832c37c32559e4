//! Output formatting: table, JSON, YAML, plain.
//!
//! Renders data in the format selected by `--output`. Table uses `tabled`,
//! structured formats use serde, plain emits one identifier per line.

use std::io::{self, IsTerminal, Write};
use std::time::Duration;

use bytesize::ByteSize;
use owo_colors::OwoColorize;
use tabled::{Table, Tabled, settings::Style};

use crate::cli::{ColorMode, OutputFormat};
use crate::error::CliError;

// ── Color helpers ────────────────────────────────────────────────────

pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

/// Latency cell: green under 50 ms, yellow under 150 ms, red above,
/// dimmed dash when unmeasured.
pub fn paint_latency(latency_ms: Option<u64>, color: bool) -> String {
    let Some(ms) = latency_ms else {
        return if color {
            "-".dimmed().to_string()
        } else {
            "-".into()
        };
    };
    let text = format!("{ms} ms");
    if !color {
        return text;
    }
    match ms {
        0..50 => text.green().to_string(),
        50..150 => text.yellow().to_string(),
        _ => text.red().to_string(),
    }
}

pub fn paint_heading(text: &str, color: bool) -> String {
    if color {
        text.bold().cyan().to_string()
    } else {
        text.to_owned()
    }
}

// ── Value formatters ─────────────────────────────────────────────────

pub fn fmt_bytes(bytes: u64) -> String {
    ByteSize(bytes).to_string()
}

/// Bytes-per-second rate, rounded down to whole bytes.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::as_conversions)]
pub fn fmt_speed(bytes_per_sec: f64) -> String {
    let whole = if bytes_per_sec.is_finite() && bytes_per_sec > 0.0 {
        bytes_per_sec as u64
    } else {
        0
    };
    format!("{}/s", ByteSize(whole))
}

pub fn fmt_duration(secs: u64) -> String {
    humantime::format_duration(Duration::from_secs(secs)).to_string()
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render a list of serde-serializable + tabled items in the chosen format.
///
/// - `table`: uses the `Tabled` derive to build a pretty table
/// - `json` / `json-compact`: serializes the original data via serde
/// - `yaml`: serializes via serde_yaml
/// - `plain`: calls `id_fn` on each item to emit one identifier per line
pub fn render_list<T, R>(
    format: OutputFormat,
    data: &[T],
    to_row: impl Fn(&T) -> R,
    id_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: serde::Serialize,
    R: Tabled,
{
    match format {
        OutputFormat::Table => {
            let rows: Vec<R> = data.iter().map(to_row).collect();
            Ok(render_table(&rows))
        }
        OutputFormat::Json => render_json(data, false),
        OutputFormat::JsonCompact => render_json(data, true),
        OutputFormat::Yaml => render_yaml(data),
        OutputFormat::Plain => Ok(data.iter().map(&id_fn).collect::<Vec<_>>().join("\n")),
    }
}

/// Render a single serde-serializable item in the chosen format.
///
/// Table rendering uses `detail_fn`, since single-item views are key/value
/// blocks rather than tables.
pub fn render_single<T>(
    format: OutputFormat,
    data: &T,
    detail_fn: impl Fn(&T) -> String,
    id_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: serde::Serialize,
{
    match format {
        OutputFormat::Table => Ok(detail_fn(data)),
        OutputFormat::Json => render_json(data, false),
        OutputFormat::JsonCompact => render_json(data, true),
        OutputFormat::Yaml => render_yaml(data),
        OutputFormat::Plain => Ok(id_fn(data)),
    }
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

// ── Format-specific renderers ────────────────────────────────────────

fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

fn render_json<T: serde::Serialize + ?Sized>(data: &T, compact: bool) -> Result<String, CliError> {
    let rendered = if compact {
        serde_json::to_string(data)
    } else {
        serde_json::to_string_pretty(data)
    };
    rendered.map_err(|e| CliError::Render(e.to_string()))
}

fn render_yaml<T: serde::Serialize + ?Sized>(data: &T) -> Result<String, CliError> {
    serde_yaml::to_string(data).map_err(|e| CliError::Render(e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[derive(serde::Serialize)]
    struct Item {
        id: &'static str,
        bytes: u64,
    }

    #[derive(Tabled)]
    struct ItemRow {
        #[tabled(rename = "ID")]
        id: String,
    }

    fn items() -> Vec<Item> {
        vec![Item { id: "a", bytes: 1 }, Item { id: "b", bytes: 2 }]
    }

    #[test]
    fn plain_lists_one_id_per_line() {
        let out = render_list(
            OutputFormat::Plain,
            &items(),
            |i| ItemRow { id: i.id.into() },
            |i| i.id.into(),
        )
        .unwrap();
        assert_eq!(out, "a\nb");
    }

    #[test]
    fn compact_json_is_single_line() {
        let out = render_list(
            OutputFormat::JsonCompact,
            &items(),
            |i| ItemRow { id: i.id.into() },
            |i| i.id.into(),
        )
        .unwrap();
        assert_eq!(out, r#"[{"id":"a","bytes":1},{"id":"b","bytes":2}]"#);
    }

    #[test]
    fn table_has_headers() {
        let out = render_list(
            OutputFormat::Table,
            &items(),
            |i| ItemRow { id: i.id.into() },
            |i| i.id.into(),
        )
        .unwrap();
        assert!(out.contains("ID"));
        assert!(out.contains('b'));
    }

    #[test]
    fn speeds_clamp_negative_and_nan() {
        assert_eq!(fmt_speed(-5.0), fmt_speed(0.0));
        assert_eq!(fmt_speed(f64::NAN), fmt_speed(0.0));
        assert!(fmt_speed(2048.7).ends_with("/s"));
    }

    #[test]
    fn durations_are_human_readable() {
        assert_eq!(fmt_duration(3_725), "1h 2m 5s");
    }

    #[test]
    fn latency_without_color() {
        assert_eq!(paint_latency(Some(42), false), "42 ms");
        assert_eq!(paint_latency(None, false), "-");
    }
}
