//! Chart rendering for the rolling-average series.

use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use deathwatch_common::{DeathwatchError, Result, Series};
use deathwatch_config::GraphConfig;
use plotters::prelude::*;
use std::path::Path;
use tracing::{info, instrument};

/// Caption font family.
const FONT_FAMILY: &str = "sans-serif";

/// Trait for renderers that draw the averaged series to an image file.
#[async_trait]
pub trait ChartRenderer: Send + Sync {
    /// Draws the series to `path`, replacing any existing file.
    async fn render_to_file(&self, series: &Series, average_label: &str, path: &Path) -> Result<()>;

    /// Gets the name of this chart type.
    fn name(&self) -> &'static str;
}

/// Chart title for the given average.
pub fn chart_title(average_label: &str) -> String {
    format!("COVID-19 7-Day Average Deaths within 28-Days for England - {average_label}")
}

/// Parses a `#rrggbb` colour.
pub fn parse_color(color: &str) -> Result<RGBColor> {
    let invalid = || DeathwatchError::graph(format!("invalid colour '{color}'"));
    let hex = color.strip_prefix('#').ok_or_else(invalid)?;
    if hex.len() != 6 || !hex.is_ascii() {
        return Err(invalid());
    }
    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&hex[range], 16).map_err(|_| invalid())
    };
    Ok(RGBColor(channel(0..2)?, channel(2..4)?, channel(4..6)?))
}

/// Axis ranges covering every averaged row.
///
/// A single point gets a one-day x range; the y range starts at zero and
/// leaves 10% headroom above the highest average.
pub fn plot_bounds(series: &Series) -> Option<((NaiveDate, NaiveDate), (f64, f64))> {
    let mut points = series.averages();
    let (first_date, first_value) = points.next()?;
    let (last_date, y_max) = points.fold((first_date, first_value), |(_, max), (date, value)| {
        (date, max.max(value))
    });

    let x_end = if last_date > first_date {
        last_date
    } else {
        first_date + Duration::days(1)
    };
    let y_end = if y_max > 0.0 { y_max * 1.1 } else { 1.0 };
    Some(((first_date, x_end), (0.0, y_end)))
}

fn plot_error<E>(err: E) -> DeathwatchError
where
    E: std::error::Error + Send + Sync + 'static,
{
    DeathwatchError::graph_with_source("Failed to draw chart", err)
}

/// Line chart of the 7-day average, one point per day.
#[derive(Debug, Clone)]
pub struct AverageLineChart {
    width: u32,
    height: u32,
    line_color: RGBColor,
    background_color: RGBColor,
}

impl AverageLineChart {
    /// Creates a renderer from the chart configuration.
    pub fn new(config: &GraphConfig) -> Result<Self> {
        Ok(Self {
            width: config.width,
            height: config.height,
            line_color: parse_color(&config.line_color)?,
            background_color: parse_color(&config.background_color)?,
        })
    }

    /// Draws the chart into an RGB buffer of `width * height * 3` bytes.
    fn draw(&self, series: &Series, title: &str, buffer: &mut [u8]) -> Result<()> {
        let ((x_start, x_end), (y_start, y_end)) = plot_bounds(series)
            .ok_or_else(|| DeathwatchError::graph("series has no averaged rows to plot"))?;

        let root =
            BitMapBackend::with_buffer(buffer, (self.width, self.height)).into_drawing_area();
        root.fill(&self.background_color).map_err(plot_error)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(title, (FONT_FAMILY, 16))
            .margin(12)
            .x_label_area_size(56)
            .y_label_area_size(48)
            .build_cartesian_2d(x_start..x_end, y_start..y_end)
            .map_err(plot_error)?;

        let label_style = (FONT_FAMILY, 11).into_font();
        chart
            .configure_mesh()
            .disable_mesh()
            .axis_style(BLACK.stroke_width(1))
            .x_labels(12)
            .x_label_formatter(&|date: &NaiveDate| date.format("%b-%y").to_string())
            .x_label_style(label_style.clone().transform(FontTransform::Rotate90))
            .y_label_style(label_style)
            .y_label_formatter(&|value: &f64| format!("{value:.0}"))
            .draw()
            .map_err(plot_error)?;

        chart
            .draw_series(LineSeries::new(
                series.averages(),
                self.line_color.stroke_width(2),
            ))
            .map_err(plot_error)?;

        root.present().map_err(plot_error)?;
        Ok(())
    }

    /// Renders the chart and writes it to `path` as PNG, whatever the
    /// file extension.
    fn render_png(&self, series: &Series, title: &str, path: &Path) -> Result<()> {
        let mut buffer = vec![0u8; self.width as usize * self.height as usize * 3];
        self.draw(series, title, &mut buffer)?;

        image::save_buffer_with_format(
            path,
            &buffer,
            self.width,
            self.height,
            image::ColorType::Rgb8,
            image::ImageFormat::Png,
        )
        .map_err(|e| DeathwatchError::graph_with_source("Failed to encode chart", e))
    }
}

#[async_trait]
impl ChartRenderer for AverageLineChart {
    #[instrument(skip(self, series), fields(rows = series.len()))]
    async fn render_to_file(
        &self,
        series: &Series,
        average_label: &str,
        path: &Path,
    ) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        self.render_png(series, &chart_title(average_label), path)?;

        info!("Rendered chart to {}", path.display());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "seven_day_average"
    }
}
