//! JSONL report document plus the console progress readout.
//!
//! Each line is one JSON object: `{"type":"log",...}` for narration,
//! `{"type":"figure",...}` for a recorded figure. The log lines are echoed
//! to stdout so a run is readable without opening the document.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use das_traits::{Figure, FigureKind, HwResult, ProgressSink, ReportSink};
use eyre::{Context, Result};
use serde_json::json;
use tracing::info;

#[derive(Debug)]
pub struct JsonlReport {
    path: PathBuf,
    writer: BufWriter<File>,
    deferred: Option<std::io::Error>,
}

impl JsonlReport {
    /// Create the document. A document that already exists is treated as
    /// open elsewhere; the run is refused rather than overwriting it.
    pub fn create(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .wrap_err_with(|| {
                format!("report document {} is busy or not writable", path.display())
            })?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            deferred: None,
        })
    }

    fn write_value(&mut self, value: &serde_json::Value) -> std::io::Result<()> {
        serde_json::to_writer(&mut self.writer, value)?;
        self.writer.write_all(b"\n")
    }
}

impl ReportSink for JsonlReport {
    fn log_line(&mut self, line: &str) {
        println!("{line}");
        // hold write failures until close; narration must not abort a run
        if self.deferred.is_none()
            && let Err(err) = self.write_value(&json!({ "type": "log", "line": line }))
        {
            self.deferred = Some(err);
        }
    }

    fn append_figure(&mut self, figure: &Figure) -> HwResult<()> {
        self.write_value(&figure_json(figure))?;
        Ok(())
    }

    fn close(&mut self) -> HwResult<()> {
        self.writer.flush()?;
        if let Some(err) = self.deferred.take() {
            return Err(err.into());
        }
        info!(path = %self.path.display(), "report document written");
        Ok(())
    }
}

fn figure_json(figure: &Figure) -> serde_json::Value {
    json!({
        "type": "figure",
        "title": figure.title,
        "x_label": figure.x_label,
        "y_label": figure.y_label,
        "kind": match figure.kind {
            FigureKind::Line => "line",
            FigureKind::Histogram => "histogram",
        },
        "series": figure.series.iter().map(|s| json!({
            "label": s.label,
            "x": s.x,
            "y": s.y,
        })).collect::<Vec<_>>(),
        "annotations": figure.annotations.iter().map(|a| json!({
            "label": a.label,
            "x": a.x,
            "y": a.y,
        })).collect::<Vec<_>>(),
    })
}

/// Logs a line per completed decile instead of driving a widget.
#[derive(Default)]
pub struct ConsoleProgress {
    last_decile: u32,
}

impl ProgressSink for ConsoleProgress {
    fn update(&mut self, fraction: f64) {
        let decile = (fraction.clamp(0.0, 1.0) * 10.0) as u32;
        if decile > self.last_decile {
            self.last_decile = decile;
            info!("{}% done", decile * 10);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use das_traits::Figure;
    use tempfile::tempdir;

    #[test]
    fn lines_and_figures_come_out_as_json_objects() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("report.jsonl");
        let mut report = JsonlReport::create(&path).unwrap();
        report.log_line("hello");
        let figure = Figure::line("Sweep", "mA", "RMS")
            .with_series("unit 1", vec![1.0, 2.0], vec![0.1, 0.2])
            .annotate("peak", 2.0, 0.2);
        report.append_figure(&figure).unwrap();
        report.close().unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines[0]["type"], "log");
        assert_eq!(lines[0]["line"], "hello");
        assert_eq!(lines[1]["type"], "figure");
        assert_eq!(lines[1]["kind"], "line");
        assert_eq!(lines[1]["annotations"][0]["label"], "peak");
    }

    #[test]
    fn an_existing_document_refuses_the_run() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("report.jsonl");
        std::fs::write(&path, "left over").unwrap();
        let err = JsonlReport::create(&path).unwrap_err();
        assert!(err.to_string().contains("busy"));
    }
}
