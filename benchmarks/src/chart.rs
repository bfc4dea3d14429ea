//! Comparison charts
//!
//! A [`ComparisonChart`] is plain data: a title and one bar per
//! implementation. Turning it into an image is the job of a
//! [`ChartRenderer`], so aggregation can be exercised without a font stack.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use plotters::coord::Shift;
use plotters::prelude::*;
use serde::Serialize;
use thiserror::Error;

use crate::Operation;

/// File extension of rendered charts
#[cfg(not(feature = "png"))]
pub const CHART_EXTENSION: &str = "svg";
#[cfg(feature = "png")]
pub const CHART_EXTENSION: &str = "png";

const CHART_SIZE: (u32, u32) = (800, 600);
const BAR_COLORS: [RGBColor; 3] = [BLUE, GREEN, RED];

#[derive(Error, Debug)]
#[error("{reason}")]
pub struct RenderError {
    pub reason: String,
}

impl RenderError {
    fn new(reason: impl ToString) -> Self {
        Self {
            reason: reason.to_string(),
        }
    }
}

/// One bar of a comparison chart
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bar {
    pub implementation: String,
    pub elapsed_ms: f64,
}

/// Elapsed time per implementation for one operation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonChart {
    pub operation: Operation,
    /// May span several lines
    pub title: String,
    /// In the order implementations were requested
    pub bars: Vec<Bar>,
    /// Size of the reference dataset, if it could be measured
    pub dataset_size_bytes: Option<u64>,
}

impl ComparisonChart {
    /// `<stem>.<ext>`, e.g. `readIndex.svg`
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.operation.file_stem(), CHART_EXTENSION)
    }

    pub fn labels(&self) -> Vec<&str> {
        self.bars.iter().map(|b| b.implementation.as_str()).collect()
    }
}

/// Something that can persist a chart as an image
pub trait ChartRenderer {
    fn render(&self, chart: &ComparisonChart, path: &Path) -> Result<(), RenderError>;
}

/// Bar charts drawn with plotters
#[derive(Debug, Default, Clone, Copy)]
pub struct PlottersRenderer;

impl ChartRenderer for PlottersRenderer {
    #[cfg(not(feature = "png"))]
    fn render(&self, chart: &ComparisonChart, path: &Path) -> Result<(), RenderError> {
        let root = SVGBackend::new(path, CHART_SIZE).into_drawing_area();
        draw(root, chart).map_err(RenderError::new)
    }

    #[cfg(feature = "png")]
    fn render(&self, chart: &ComparisonChart, path: &Path) -> Result<(), RenderError> {
        let root = BitMapBackend::new(path, CHART_SIZE).into_drawing_area();
        draw(root, chart).map_err(RenderError::new)
    }
}

fn draw<DB: DrawingBackend>(
    root: DrawingArea<DB, Shift>,
    chart: &ComparisonChart,
) -> Result<(), DrawingAreaErrorKind<DB::ErrorType>> {
    root.fill(&WHITE)?;

    let mut area = root.clone();
    for (i, line) in chart.title.lines().enumerate() {
        let size = if i == 0 { 22 } else { 16 };
        area = area.titled(line, ("sans-serif", size))?;
    }

    let count = chart.bars.len() as u32;
    let peak = chart
        .bars
        .iter()
        .map(|b| b.elapsed_ms)
        .fold(0.0f64, f64::max);
    let y_max = if peak > 0.0 { peak * 1.1 } else { 1.0 };

    let labels = chart.labels();
    let mut plot = ChartBuilder::on(&area)
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d((0u32..count).into_segmented(), 0f64..y_max)?;

    plot.configure_mesh()
        .disable_x_mesh()
        .x_desc("Interfaces")
        .y_desc("Time (ms)")
        .x_labels(labels.len().max(1))
        .x_label_formatter(&|value| match value {
            SegmentValue::CenterOf(i) => labels
                .get(*i as usize)
                .map(|l| l.to_string())
                .unwrap_or_default(),
            _ => String::new(),
        })
        .draw()?;

    plot.draw_series(chart.bars.iter().enumerate().map(|(i, bar)| {
        let i = i as u32;
        let color = BAR_COLORS[i as usize % BAR_COLORS.len()];
        Rectangle::new(
            [
                (SegmentValue::Exact(i), 0.0),
                (SegmentValue::Exact(i + 1), bar.elapsed_ms),
            ],
            color.filled(),
        )
    }))?;

    root.present()?;
    Ok(())
}

/// Keeps every chart it is asked to render in memory instead of drawing it.
#[derive(Debug, Default)]
pub struct RecordingRenderer {
    rendered: Mutex<Vec<(ComparisonChart, PathBuf)>>,
    fail_on: Option<Operation>,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A renderer that refuses to render charts for `operation`
    pub fn failing_on(operation: Operation) -> Self {
        Self {
            fail_on: Some(operation),
            ..Self::default()
        }
    }

    pub fn rendered(&self) -> Vec<(ComparisonChart, PathBuf)> {
        self.rendered
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl ChartRenderer for RecordingRenderer {
    fn render(&self, chart: &ComparisonChart, path: &Path) -> Result<(), RenderError> {
        if self.fail_on == Some(chart.operation) {
            return Err(RenderError::new("renderer configured to fail"));
        }
        self.rendered
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((chart.clone(), path.to_path_buf()));
        Ok(())
    }
}
