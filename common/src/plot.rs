use core::fmt::Debug;
use std::{
    collections::HashMap,
    fmt, fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use dyn_clone::{DynClone, clone_trait_object};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::{
    config::Settings,
    error::{PlotError, RenderError},
    group::{Dataset, Group, GroupKey, Sample},
    style::{SeriesStyle, StyleCycle, assign_styles},
};

pub const X_LABEL: &str = "Number of Ranks";
pub const Y_LABEL: &str = "Elapsed Time (s)";

/// Which group fields select the chart a series lands on
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChartLayout {
    /// One chart per metric and filter
    #[default]
    MetricAndFilter,
    /// One chart per metric, the filter becomes part of each series
    Metric,
}

impl FromStr for ChartLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "metric-and-filter" => Ok(Self::MetricAndFilter),
            "metric" => Ok(Self::Metric),
            _ => Err(format!(
                "Unknown chart layout {s}, expected metric-and-filter or metric"
            )),
        }
    }
}

#[typetag::serde(tag = "type")]
pub trait Renderer: Debug + DynClone + Send + Sync {
    /// Name of the backend, for logs
    fn name(&self) -> &'static str;
    /// Image file extension, without the dot
    fn extension(&self) -> &'static str {
        "png"
    }
    /// Draws the chart into `output`, replacing any existing file
    ///
    /// Arguments:
    /// * `chart` - Series to draw, each with its points sorted by rank count
    /// * `output` - The image path, ie. `res/<metric>_<filter>.png`
    fn render(&self, chart: &ChartPlan, output: &Path) -> Result<(), RenderError>;
}
clone_trait_object!(Renderer);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChartKey {
    pub metric_id: String,
    pub filter_key: Option<String>,
}

impl ChartKey {
    pub fn new(key: &GroupKey, layout: ChartLayout) -> Self {
        Self {
            metric_id: key.metric_id.clone(),
            filter_key: match layout {
                ChartLayout::MetricAndFilter => Some(key.filter_key.clone()),
                ChartLayout::Metric => None,
            },
        }
    }

    pub fn file_stem(&self) -> String {
        match &self.filter_key {
            Some(filter) => format!("{}_{}", self.metric_id, filter),
            None => self.metric_id.clone(),
        }
        .replace(' ', "_")
    }

    pub fn title(&self) -> String {
        let metric = title_case(&self.metric_id.replace('_', " "));
        match &self.filter_key {
            Some(filter) => format!("{metric} | {}", title_case(&filter.replace('_', " "))),
            None => metric,
        }
    }
}

impl fmt::Display for ChartKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.filter_key {
            Some(filter) => write!(f, "metric={} filter={}", self.metric_id, filter),
            None => write!(f, "metric={}", self.metric_id),
        }
    }
}

/// One line of a chart
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesPlan {
    pub series_id: String,
    pub label: String,
    pub samples: Vec<Sample>,
    pub style: SeriesStyle,
}

impl SeriesPlan {
    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.samples
            .iter()
            .map(|s| (f64::from(s.rank_count), s.elapsed_seconds))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartPlan {
    pub key: ChartKey,
    pub title: String,
    pub series: Vec<SeriesPlan>,
}

impl ChartPlan {
    pub fn has_data(&self) -> bool {
        self.series.iter().any(|s| !s.samples.is_empty())
    }

    pub fn rank_bounds(&self) -> Option<(u32, u32)> {
        self.series
            .iter()
            .flat_map(|s| s.samples.iter().map(|x| x.rank_count))
            .minmax()
            .into_option()
    }

    pub fn max_elapsed(&self) -> Option<f64> {
        self.series
            .iter()
            .flat_map(|s| s.samples.iter().map(|x| x.elapsed_seconds))
            .reduce(f64::max)
    }
}

/// Upper-cases the first letter of every alphabetic run and lower-cases the rest
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_cased = false;
    for c in s.chars() {
        if prev_cased {
            out.extend(c.to_lowercase());
        } else {
            out.extend(c.to_uppercase());
        }
        prev_cased = c.is_alphabetic();
    }
    out
}

fn leaf_label(key: &GroupKey, layout: ChartLayout) -> String {
    match layout {
        ChartLayout::MetricAndFilter => {
            format!("{} {}", key.series_id, title_case(&key.sub_series_id))
        }
        ChartLayout::Metric => format!(
            "{} {} {}",
            key.series_id,
            title_case(&key.sub_series_id),
            key.filter_key
        ),
    }
}

/// Splits the dataset into charts, in the order their keys first appear.
///
/// Leaves of the same series id are drawn next to each other so the style
/// cycle sees them as one block. Samples are sorted by rank count.
pub fn plan_charts(dataset: &Dataset, layout: ChartLayout, cycle: StyleCycle) -> Vec<ChartPlan> {
    let mut charts: Vec<(ChartKey, Vec<&Group>)> = Vec::new();
    let mut index = HashMap::new();
    for group in dataset.groups() {
        let key = ChartKey::new(group.key(), layout);
        let idx = *index.entry(key.clone()).or_insert_with(|| {
            charts.push((key, Vec::new()));
            charts.len() - 1
        });
        charts[idx].1.push(group);
    }

    charts
        .into_iter()
        .map(|(key, mut leaves)| {
            let series_order = leaves
                .iter()
                .map(|g| g.key().series_id.clone())
                .unique()
                .collect::<Vec<_>>();
            leaves.sort_by_key(|g| series_order.iter().position(|id| *id == g.key().series_id));

            let ids = leaves
                .iter()
                .map(|g| g.key().series_id.as_str())
                .collect::<Vec<_>>();
            let series = leaves
                .iter()
                .zip(assign_styles(cycle, &ids))
                .map(|(group, style)| {
                    let mut group = (*group).clone();
                    group.sort_by_rank();
                    SeriesPlan {
                        series_id: group.key().series_id.clone(),
                        label: leaf_label(group.key(), layout),
                        samples: group.samples().to_vec(),
                        style,
                    }
                })
                .collect();

            ChartPlan {
                title: key.title(),
                key,
                series,
            }
        })
        .collect()
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub rows_read: usize,
    pub rows_skipped: usize,
    pub written: Vec<PathBuf>,
    /// Charts without a single sample
    pub empty: Vec<ChartKey>,
    pub failed: Vec<(ChartKey, RenderError)>,
}

pub fn ensure_output_dir(dir: &Path) -> Result<(), PlotError> {
    fs::create_dir_all(dir).map_err(|source| PlotError::OutputDir {
        path: dir.to_owned(),
        source,
    })
}

/// Renders every chart with data. A failing chart is logged and recorded, the
/// remaining charts are still attempted.
pub fn render_charts(
    charts: &[ChartPlan],
    renderer: &dyn Renderer,
    output_dir: &Path,
) -> Result<RunSummary, PlotError> {
    ensure_output_dir(output_dir)?;

    let mut summary = RunSummary::default();
    for chart in charts {
        if !chart.has_data() {
            info!("No data to plot for {}", chart.key);
            summary.empty.push(chart.key.clone());
            continue;
        }

        let output = output_dir.join(format!(
            "{}.{}",
            chart.key.file_stem(),
            renderer.extension()
        ));
        // Distinct keys can share a file name once spaces become underscores
        if summary.written.contains(&output) {
            error!(
                "Not plotting {}, {} is taken by an earlier chart",
                chart.key,
                output.display()
            );
            summary
                .failed
                .push((chart.key.clone(), RenderError::DuplicateOutput(output)));
            continue;
        }
        debug!(
            "Plotting chart for {} with {} series",
            chart.key,
            chart.series.len()
        );
        match renderer.render(chart, &output) {
            Ok(()) => {
                info!("Wrote {}", output.display());
                summary.written.push(output);
            }
            Err(err) => {
                error!(
                    "Failed to render {} with {}: {err}",
                    chart.key,
                    renderer.name()
                );
                summary.failed.push((chart.key.clone(), err));
            }
        }
    }
    Ok(summary)
}

/// Reads `settings.input` and renders one image per chart into `settings.output_dir`.
///
/// Nothing is written when the input cannot be read.
pub fn generate(settings: &Settings, renderer: &dyn Renderer) -> Result<RunSummary, PlotError> {
    let options = settings.load_options()?;
    let dataset = Dataset::load(&settings.input, &options)?;
    let charts = plan_charts(&dataset, settings.layout, settings.style_cycle);
    debug!("Planned {} charts", charts.len());

    let mut summary = render_charts(&charts, renderer, &settings.output_dir)?;
    summary.rows_read = dataset.rows_read();
    summary.rows_skipped = dataset.rows_skipped();
    Ok(summary)
}
