use std::{f64::consts::TAU, ops::Range, path::Path};

use common::{
    error::RenderError,
    plot::{ChartPlan, Renderer, X_LABEL, Y_LABEL},
    style::{DashPattern, Marker, Rgb, SeriesStyle},
};
use eyre::{ContextCompat, Result};
use plotters::{element::DashedPathElement, prelude::*};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Draws PNG line charts in-process with `plotters`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlottersLine {
    pub width: u32,
    pub height: u32,
    pub font: String,
    pub font_size: u32,
    pub line_width: u32,
    pub marker_size: u32,
}

impl Default for PlottersLine {
    fn default() -> Self {
        Self {
            width: 1600,
            height: 960,
            font: "sans-serif".to_owned(),
            font_size: 28,
            line_width: 4,
            marker_size: 8,
        }
    }
}

#[typetag::serde]
impl Renderer for PlottersLine {
    fn name(&self) -> &'static str {
        "plotters"
    }

    fn render(&self, chart: &ChartPlan, output: &Path) -> Result<(), RenderError> {
        self.draw(chart, output)
            .map_err(|err| RenderError::Drawing(format!("{err:#}")))
    }
}

/// Rank range padded by one power of two on each side, so a single rank
/// count still spans a visible log axis.
fn rank_range(chart: &ChartPlan) -> Option<Range<f64>> {
    let (min, max) = chart.rank_bounds()?;
    Some(f64::from(min) / 2.0..f64::from(max) * 2.0)
}

fn elapsed_range(chart: &ChartPlan) -> Option<Range<f64>> {
    let max = chart.max_elapsed()?;
    Some(0.0..if max > 0.0 { max * 1.1 } else { 1.0 })
}

fn color(rgb: Rgb) -> RGBColor {
    RGBColor(rgb.0, rgb.1, rgb.2)
}

/// Half the length of the line sample in a legend entry, in pixels
const LEGEND_HALF_WIDTH: i32 = 20;

/// Dash and gap lengths of the legend's line sample, a solid line is one long dash
fn legend_dash(dash: DashPattern) -> (u32, u32) {
    match *dash.segments() {
        [size, spacing, ..] => (size, spacing),
        _ => (LEGEND_HALF_WIDTH as u32 * 2, 0),
    }
}

/// Filled outline of `marker` centred on the origin
fn marker_outline(marker: Marker, size: i32) -> Vec<(i32, i32)> {
    let s = size;
    match marker {
        Marker::Circle => (0..16)
            .map(|i| {
                let angle = f64::from(i) * TAU / 16.0;
                let r = f64::from(s);
                ((r * angle.cos()).round() as i32, (r * angle.sin()).round() as i32)
            })
            .collect(),
        Marker::Square => vec![(-s, -s), (s, -s), (s, s), (-s, s)],
        Marker::Triangle => vec![(0, -s), (s, s), (-s, s)],
        Marker::Cross => {
            let w = (s / 4).max(1);
            vec![
                (-s, -s + w),
                (-s + w, -s),
                (0, -w),
                (s - w, -s),
                (s, -s + w),
                (w, 0),
                (s, s - w),
                (s - w, s),
                (0, w),
                (-s + w, s),
                (-s, s - w),
                (-w, 0),
            ]
        }
    }
}

impl PlottersLine {
    fn draw(&self, chart: &ChartPlan, output: &Path) -> Result<()> {
        let x_range = rank_range(chart).context("Chart has no samples")?;
        let y_range = elapsed_range(chart).context("Chart has no samples")?;
        let font = self.font.as_str();
        let small = self.font_size * 3 / 4;

        let root = BitMapBackend::new(output, (self.width, self.height)).into_drawing_area();
        root.fill(&WHITE)?;

        let mut ctx = ChartBuilder::on(&root)
            .caption(&chart.title, (font, self.font_size))
            .margin(30)
            .set_label_area_size(LabelAreaPosition::Left, self.font_size * 4)
            .set_label_area_size(LabelAreaPosition::Bottom, self.font_size * 3)
            .build_cartesian_2d(x_range.log_scale().base(2.0), y_range)?;

        ctx.configure_mesh()
            .x_desc(X_LABEL)
            .y_desc(Y_LABEL)
            .x_label_formatter(&|x| format!("{x:.0}"))
            .label_style((font, small))
            .axis_desc_style((font, self.font_size))
            .draw()?;

        for series in &chart.series {
            debug!("Drawing {} with {:?}", series.label, series.style);
            let points = series.points().collect::<Vec<_>>();
            let SeriesStyle { marker, dash, .. } = series.style;
            let rgb = color(series.style.color);
            let line = rgb.stroke_width(self.line_width);
            let fill = rgb.filled();

            let anno = match *dash.segments() {
                [size, spacing, ..] => ctx.draw_series(DashedLineSeries::new(
                    points.iter().copied(),
                    size,
                    spacing,
                    line,
                ))?,
                _ => ctx.draw_series(LineSeries::new(points.iter().copied(), line))?,
            };
            let size = self.marker_size as i32;
            let (dash_size, dash_spacing) = legend_dash(dash);
            let outline = marker_outline(marker, size);
            anno.label(&series.label).legend(move |(x, y)| {
                EmptyElement::at((x, y))
                    + DashedPathElement::new(
                        vec![(-LEGEND_HALF_WIDTH, 0), (LEGEND_HALF_WIDTH, 0)],
                        dash_size,
                        dash_spacing,
                        line,
                    )
                    + Polygon::new(outline.clone(), fill)
            });

            match marker {
                Marker::Circle => {
                    ctx.draw_series(points.iter().map(|&p| Circle::new(p, size, fill)))?;
                }
                Marker::Square => {
                    ctx.draw_series(points.iter().map(|&p| {
                        EmptyElement::at(p) + Rectangle::new([(-size, -size), (size, size)], fill)
                    }))?;
                }
                Marker::Triangle => {
                    ctx.draw_series(points.iter().map(|&p| TriangleMarker::new(p, size, fill)))?;
                }
                Marker::Cross => {
                    ctx.draw_series(points.iter().map(|&p| Cross::new(p, size, line)))?;
                }
            }
        }

        ctx.configure_series_labels()
            .position(SeriesLabelPosition::UpperLeft)
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .label_font((font, small))
            .draw()?;

        root.present()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use common::{
        group::{Dataset, LoadOptions, Sample},
        plot::{ChartKey, ChartLayout, SeriesPlan, plan_charts},
        style::{SeriesStyle, StyleCycle},
    };

    use super::*;

    fn chart(samples: &[(u32, f64)]) -> ChartPlan {
        ChartPlan {
            key: ChartKey {
                metric_id: "t1".to_owned(),
                filter_key: Some("f1".to_owned()),
            },
            title: "T1 | F1".to_owned(),
            series: vec![SeriesPlan {
                series_id: "A".to_owned(),
                label: "A Io1".to_owned(),
                samples: samples
                    .iter()
                    .map(|&(rank_count, elapsed_seconds)| Sample {
                        rank_count,
                        elapsed_seconds,
                    })
                    .collect(),
                style: SeriesStyle::from_indices(0, 0),
            }],
        }
    }

    #[test]
    fn ranges_pad_the_rank_axis() {
        let c = chart(&[(4, 1.5), (8, 2.5)]);
        assert_eq!(rank_range(&c), Some(2.0..16.0));
        let y = elapsed_range(&c).unwrap();
        assert_eq!(y.start, 0.0);
        assert!((y.end - 2.75).abs() < 1e-9);
    }

    #[test]
    fn single_rank_and_zero_time() {
        let c = chart(&[(1, 0.0)]);
        assert_eq!(rank_range(&c), Some(0.5..2.0));
        assert_eq!(elapsed_range(&c), Some(0.0..1.0));
    }

    #[test]
    fn empty_chart_is_a_render_error() {
        let path = std::env::temp_dir().join("plotters-line-empty.png");
        let err = PlottersLine::default()
            .render(&chart(&[]), &path)
            .unwrap_err();
        assert!(matches!(err, RenderError::Drawing(msg) if msg.contains("no samples")));
        assert!(!path.exists());
    }

    #[test]
    fn options_default_from_yaml() {
        let renderer: Box<dyn Renderer> =
            serde_yml::from_str("type: PlottersLine\nwidth: 800\n").unwrap();
        assert_eq!(renderer.name(), "plotters");
        assert_eq!(renderer.extension(), "png");
    }

    #[test]
    fn renders_every_style_to_png() {
        let input = "header\n\
            A,x,1,t1,0.5,y,io1,f1\nA,x,4,t1,1.5,y,io1,f1\nA,x,16,t1,3.0,y,io2,f1\n\
            B,x,2,t1,1.0,y,io1,f1\nC,x,8,t1,2.0,y,io1,f1\nD,x,16,t1,2.5,y,all,f1\n";
        let data =
            Dataset::from_reader(input.as_bytes(), Path::new("memory.csv"), &LoadOptions::default())
                .unwrap();
        let charts = plan_charts(&data, ChartLayout::MetricAndFilter, StyleCycle::PerLeaf);
        assert_eq!(charts[0].series.len(), 5);

        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("t1_f1.png");
        PlottersLine::default().render(&charts[0], &output).unwrap();
        assert!(fs::metadata(&output).unwrap().len() > 0);
    }

    #[test]
    fn legend_samples() {
        assert_eq!(legend_dash(DashPattern::Solid), (40, 0));
        assert_eq!(legend_dash(DashPattern::DashDot), (15, 5));
        assert_eq!(marker_outline(Marker::Square, 4).len(), 4);
        assert_eq!(marker_outline(Marker::Triangle, 4), vec![(0, -4), (4, 4), (-4, 4)]);
        let circle = marker_outline(Marker::Circle, 8);
        assert_eq!(circle.len(), 16);
        assert!(circle.iter().all(|&(x, y)| (x * x + y * y - 64).abs() <= 16));
    }
}
