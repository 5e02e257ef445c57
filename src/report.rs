//! HTML report rendering.
//!
//! One section per report heading: a spec table followed by the figures recorded
//! under that heading, each with its axis labels, legend and info. Figure links are
//! made relative to the report's folder so a run directory can be moved as a whole.

use crate::metadata::DUTInfo;
use crate::results::{ReportEntry, ResultsHold};
use serde_json::Value;
use std::fmt::Write as _;
use std::path::Path;

/// Renders the report to a string. `base_dir` is the folder the report will live in.
pub fn render_report(dut: &DUTInfo, results: &ResultsHold, base_dir: &Path) -> String {
    let mut html = String::new();
    let title = format!("Test report: {}", dut.serial_number);

    let _ = writeln!(html, "<!DOCTYPE html>");
    let _ = writeln!(html, "<html><head><meta charset=\"utf-8\"><title>{}</title>", escape(&title));
    let _ = writeln!(
        html,
        "<style>body{{font-family:sans-serif}}table{{border-collapse:collapse}}\
         td,th{{border:1px solid #999;padding:2px 8px}}</style></head><body>"
    );
    let _ = writeln!(html, "<h1>{}</h1>", escape(&title));

    let _ = writeln!(html, "<table class=\"dut\">");
    let _ = writeln!(html, "<tr><th>Serial number</th><td>{}</td></tr>", escape(&dut.serial_number));
    let _ = writeln!(html, "<tr><th>Part number</th><td>{}</td></tr>", escape(&dut.part_number));
    for (key, value) in &dut.extra {
        let _ = writeln!(html, "<tr><th>{}</th><td>{}</td></tr>", escape(key), escape(&value_text(value)));
    }
    let _ = writeln!(html, "<tr><th>Software version</th><td>{}</td></tr>", escape(&dut.software_version));
    let _ = writeln!(html, "</table>");

    for heading in results.headings() {
        let _ = writeln!(html, "<h2>{}</h2>", escape(heading));

        let specs = results.specs(heading);
        if !specs.is_empty() {
            let _ = writeln!(html, "<table class=\"specs\"><tr><th>Spec</th><th>Value</th><th>Unit</th></tr>");
            for spec in specs {
                let _ = writeln!(
                    html,
                    "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
                    escape(&spec.name),
                    spec.value,
                    escape(&spec.unit)
                );
            }
            let _ = writeln!(html, "</table>");
        }

        for entry in results.entries(heading) {
            render_entry(&mut html, entry, base_dir);
        }
    }

    let _ = writeln!(html, "</body></html>");
    html
}

fn render_entry(html: &mut String, entry: &ReportEntry, base_dir: &Path) {
    let src = entry
        .figure
        .strip_prefix(base_dir)
        .unwrap_or(&entry.figure)
        .to_string_lossy()
        .replace('\\', "/");
    let summary = &entry.summary;

    let _ = writeln!(html, "<figure>");
    let _ = writeln!(html, "<img src=\"{}\" alt=\"{}\">", escape(&src), escape(&src));
    let mut caption = Vec::new();
    if let Some(title) = &summary.title {
        caption.push(escape(title));
    }
    if let Some(x) = &summary.xlabel {
        caption.push(format!("x: {}", escape(x)));
    }
    if let Some(y) = &summary.ylabel {
        caption.push(format!("y: {}", escape(y)));
    }
    if !summary.legend.is_empty() {
        let names: Vec<_> = summary.legend.iter().map(|l| escape(l.as_str())).collect();
        caption.push(format!("legend: {}", names.join(", ")));
    }
    if !caption.is_empty() {
        let _ = writeln!(html, "<figcaption>{}</figcaption>", caption.join("; "));
    }
    let _ = writeln!(html, "</figure>");

    if !entry.info.is_empty() {
        let _ = writeln!(html, "<table class=\"info\">");
        for (key, value) in &entry.info {
            let _ = writeln!(html, "<tr><th>{}</th><td>{}</td></tr>", escape(key), escape(&value_text(value)));
        }
        let _ = writeln!(html, "</table>");
    }
}

/// Strings render bare, everything else as JSON.
fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Renders the report and writes it to `path`.
pub fn write_report<P: AsRef<Path>>(path: P, dut: &DUTInfo, results: &ResultsHold) -> std::io::Result<()> {
    let path = path.as_ref();
    let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
    std::fs::write(path, render_report(dut, results, base_dir))?;
    tracing::info!(path = %path.display(), "Report written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::figure::FigureSummary;
    use indexmap::IndexMap;
    use serde_json::json;
    use std::path::PathBuf;

    fn results(base: &Path) -> ResultsHold {
        let mut results = ResultsHold::new();
        results.add_spec("IV <sweep>", "resist_i0", "ohm", 10.0);
        results.add_report_entry(
            "IV <sweep>",
            ReportEntry {
                figure: base.join("0_virtual").join("iv.png"),
                summary: FigureSummary {
                    xlabel: Some("Voltage (V)".to_string()),
                    legend: vec!["i0".to_string()],
                    ..FigureSummary::default()
                },
                info: IndexMap::from([("a".to_string(), json!("hello world"))]),
            },
        );
        results
    }

    #[test]
    fn test_render_contains_specs_figures_and_escapes() {
        let base = PathBuf::from("/runs/SN1/20240101_000000");
        let html = render_report(&DUTInfo::new("SN1"), &results(&base), &base);

        assert!(html.contains("<h2>IV &lt;sweep&gt;</h2>"));
        assert!(html.contains("<td>resist_i0</td><td>10</td><td>ohm</td>"));
        assert!(html.contains("src=\"0_virtual/iv.png\""));
        assert!(html.contains("x: Voltage (V)"));
        assert!(html.contains("<td>hello world</td>"));
    }

    #[test]
    fn test_figure_outside_base_keeps_full_path() {
        let base = PathBuf::from("/elsewhere");
        let html = render_report(&DUTInfo::new("SN1"), &results(Path::new("/runs")), &base);
        assert!(html.contains("/runs/0_virtual/iv.png"));
    }

    #[test]
    fn test_write_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.html");
        write_report(&path, &DUTInfo::new("SN1"), &ResultsHold::new()).unwrap();
        let html = std::fs::read_to_string(&path).unwrap();
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("Test report: SN1"));
    }
}
