use std::path::PathBuf;

use clap::Parser;
use common::{
    config::Settings,
    group::ParsePolicy,
    plot::{ChartLayout, RunSummary, generate},
    style::StyleCycle,
};
use default_plots::Backend;
use eyre::{Context, Result, bail};
use tracing::{debug, error, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter,
    fmt::{layer, time::ChronoLocal},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

const MODULES: &[&str] = &["common", "default_plots", "plotters_line", "gnuplot_line"];

/// Render per-metric rank scaling charts from benchmark CSV results
#[derive(Parser)]
#[command(version)]
struct Cli {
    /// Benchmark results, defaults to ./build/output.csv
    #[arg(short, long)]
    input: Option<PathBuf>,
    /// Directory for the images, defaults to ./res
    #[arg(short, long)]
    output_dir: Option<PathBuf>,
    /// YAML settings file, command line flags take precedence
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// plotters or gnuplot
    #[arg(long)]
    backend: Option<Backend>,
    /// metric-and-filter or metric
    #[arg(long)]
    layout: Option<ChartLayout>,
    /// per-series or per-leaf
    #[arg(long)]
    style_cycle: Option<StyleCycle>,
    /// Abort on the first malformed row instead of skipping it
    #[arg(long, default_value_t = false)]
    strict: bool,
    /// Only plot metrics matching this regex
    #[arg(long)]
    metric: Option<String>,
    /// Extra tracing directives, ie. `common=debug`
    #[arg(short, long)]
    log: Vec<String>,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    let _guard = init_tracing(&args.log)?;

    let settings = resolve_settings(&args)?;
    debug!("{settings:#?}");
    let renderer = settings
        .renderer
        .clone()
        .unwrap_or_else(|| Backend::default().renderer());

    let summary = match generate(&settings, &*renderer) {
        Ok(summary) => summary,
        Err(err) => {
            error!("{err}");
            return Err(err).context(format!("Plotting {}", settings.input.display()));
        }
    };
    report(&summary, &settings);

    if !summary.failed.is_empty() {
        bail!(
            "{} of {} charts failed to render with {}",
            summary.failed.len(),
            summary.failed.len() + summary.written.len(),
            renderer.name()
        );
    }
    Ok(())
}

fn init_tracing(directives: &[String]) -> Result<WorkerGuard> {
    let log_level = std::env::var("RUST_LOG").unwrap_or("warn".to_owned());
    let file_appender = tracing_appender::rolling::never(".", "log.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let mut env_filter = EnvFilter::new(format!("rank_plots={log_level}"));
    for log in directives {
        env_filter = env_filter.add_directive(log.parse()?);
    }
    for module in MODULES {
        if !directives.iter().any(|x| x.starts_with(module)) {
            env_filter = env_filter.add_directive(format!("{module}={log_level}").parse()?);
        }
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            layer()
                .with_timer(ChronoLocal::new("%v %k:%M:%S %z".to_owned()))
                .with_writer(std::io::stderr)
                .compact(),
        )
        .with(layer().with_ansi(false).with_writer(non_blocking))
        .init();
    Ok(guard)
}

fn resolve_settings(args: &Cli) -> Result<Settings> {
    let mut settings = match &args.config {
        Some(path) => Settings::from_yaml_file(path)?,
        None => Settings::default(),
    };

    if let Some(input) = &args.input {
        settings.input = input.clone();
    }
    if let Some(output_dir) = &args.output_dir {
        settings.output_dir = output_dir.clone();
    }
    if let Some(layout) = args.layout {
        settings.layout = layout;
    }
    if let Some(style_cycle) = args.style_cycle {
        settings.style_cycle = style_cycle;
    }
    if args.strict {
        settings.parse_policy = ParsePolicy::Abort;
    }
    if let Some(metric) = &args.metric {
        settings.metric_filter = Some(metric.clone());
    }
    if let Some(backend) = args.backend {
        settings.renderer = Some(backend.renderer());
    }
    Ok(settings)
}

fn report(summary: &RunSummary, settings: &Settings) {
    if summary.rows_skipped > 0 {
        warn!(
            "Skipped {} malformed rows of {}",
            summary.rows_skipped,
            summary.rows_read + summary.rows_skipped
        );
    }
    for key in &summary.empty {
        debug!("No data for {key}");
    }
    println!(
        "Wrote {} charts to {}",
        summary.written.len(),
        settings.output_dir.display()
    );
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use clap::CommandFactory;

    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("rank-plots").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults_without_flags() {
        let settings = resolve_settings(&parse(&[])).unwrap();
        assert_eq!(settings.input, Path::new("./build/output.csv"));
        assert_eq!(settings.output_dir, Path::new("./res"));
        assert_eq!(settings.parse_policy, ParsePolicy::Skip);
        assert!(settings.renderer.is_none());
    }

    #[test]
    fn flags_override() {
        let settings = resolve_settings(&parse(&[
            "-i",
            "data.csv",
            "-o",
            "charts",
            "--backend",
            "gnuplot",
            "--layout",
            "metric",
            "--style-cycle",
            "per-leaf",
            "--strict",
            "--metric",
            "^write",
        ]))
        .unwrap();
        assert_eq!(settings.input, Path::new("data.csv"));
        assert_eq!(settings.output_dir, Path::new("charts"));
        assert_eq!(settings.layout, ChartLayout::Metric);
        assert_eq!(settings.style_cycle, StyleCycle::PerLeaf);
        assert_eq!(settings.parse_policy, ParsePolicy::Abort);
        assert_eq!(settings.metric_filter.as_deref(), Some("^write"));
        assert_eq!(settings.renderer.unwrap().name(), "gnuplot");
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let parsed = Cli::try_parse_from(["rank-plots", "--backend", "svg"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn missing_config_file() {
        let err = resolve_settings(&parse(&["-c", "/nonexistent/plots.yaml"])).unwrap_err();
        assert!(err.to_string().contains("plots.yaml"), "{err}");
    }
}
