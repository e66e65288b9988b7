//! Plain-data figure description handed to a [`ReportSink`].
//!
//! The core records search trajectories and spectra as data; rendering (PDF,
//! terminal, JSON) is the sink's business.
//!
//! [`ReportSink`]: crate::ReportSink

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FigureKind {
    Line,
    Histogram,
}

#[derive(Debug, Clone)]
pub struct Series {
    pub label: String,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

/// A single highlighted point, e.g. the chosen operating point of a search.
#[derive(Debug, Clone)]
pub struct Annotation {
    pub label: String,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone)]
pub struct Figure {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub kind: FigureKind,
    pub series: Vec<Series>,
    pub annotations: Vec<Annotation>,
}

impl Figure {
    pub fn line(title: impl Into<String>, x_label: impl Into<String>, y_label: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            x_label: x_label.into(),
            y_label: y_label.into(),
            kind: FigureKind::Line,
            series: Vec::new(),
            annotations: Vec::new(),
        }
    }

    pub fn histogram(title: impl Into<String>, x_label: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            x_label: x_label.into(),
            y_label: String::new(),
            kind: FigureKind::Histogram,
            series: Vec::new(),
            annotations: Vec::new(),
        }
    }

    pub fn with_series(mut self, label: impl Into<String>, x: Vec<f64>, y: Vec<f64>) -> Self {
        self.series.push(Series {
            label: label.into(),
            x,
            y,
        });
        self
    }

    pub fn annotate(mut self, label: impl Into<String>, x: f64, y: f64) -> Self {
        self.annotations.push(Annotation {
            label: label.into(),
            x,
            y,
        });
        self
    }
}
