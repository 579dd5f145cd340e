use std::{
    io::{self, Write},
    path::Path,
    process::{Command, Stdio},
};

use common::{
    error::RenderError,
    plot::{ChartPlan, Renderer, SeriesPlan, X_LABEL, Y_LABEL},
    style::{DashPattern, Marker},
};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::debug;

/// Renders through an external `gnuplot` process with the `pngcairo` terminal
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GnuplotLine {
    pub program: String,
    pub width: u32,
    pub height: u32,
    pub font: String,
    pub line_width: u32,
    pub point_size: u32,
}

impl Default for GnuplotLine {
    fn default() -> Self {
        Self {
            program: "gnuplot".to_owned(),
            width: 1600,
            height: 1600,
            font: "Consolas,28".to_owned(),
            line_width: 6,
            point_size: 3,
        }
    }
}

#[typetag::serde]
impl Renderer for GnuplotLine {
    fn name(&self) -> &'static str {
        "gnuplot"
    }

    fn render(&self, chart: &ChartPlan, output: &Path) -> Result<(), RenderError> {
        // Removed from disk when dropped at the end of this call
        let data_files = chart
            .series
            .iter()
            .map(write_data_file)
            .collect::<io::Result<Vec<_>>>()?;
        let paths = data_files.iter().map(|f| f.path()).collect::<Vec<_>>();
        let script = self.script(chart, output, &paths);
        debug!("gnuplot script for {}:\n{script}", chart.key);

        let mut child = Command::new(&self.program)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;
        // A process that exits early closes its stdin, its exit status says why
        if let Some(mut stdin) = child.stdin.take()
            && let Err(err) = stdin.write_all(script.as_bytes())
            && err.kind() != io::ErrorKind::BrokenPipe
        {
            return Err(err.into());
        }
        let result = child.wait_with_output()?;
        if !result.status.success() {
            return Err(RenderError::Process {
                program: self.program.clone(),
                status: result.status,
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_owned(),
            });
        }
        Ok(())
    }
}

/// One `x y` pair per line
fn write_data_file(series: &SeriesPlan) -> io::Result<NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("rank-plots-")
        .suffix(".dat")
        .tempfile()?;
    for (x, y) in series.points() {
        writeln!(file, "{x} {y}")?;
    }
    file.flush()?;
    debug!("{} written to {}", series.label, file.path().display());
    Ok(file)
}

fn point_type(marker: Marker) -> u8 {
    match marker {
        Marker::Circle => 7,
        Marker::Square => 5,
        Marker::Triangle => 9,
        Marker::Cross => 2,
    }
}

fn dash_type(dash: DashPattern) -> String {
    match dash.segments() {
        [] => "solid".to_owned(),
        segments => format!("({})", segments.iter().join(",")),
    }
}

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

impl GnuplotLine {
    /// `data_files[i]` holds the points of `chart.series[i]`
    pub fn script(&self, chart: &ChartPlan, output: &Path, data_files: &[&Path]) -> String {
        let plots = chart
            .series
            .iter()
            .zip(data_files)
            .map(|(series, data)| {
                format!(
                    "{} with linespoints title {} pt {} ps {} lw {} dashtype {} lc rgb {}",
                    quote(&data.to_string_lossy()),
                    quote(&series.label),
                    point_type(series.style.marker),
                    self.point_size,
                    self.line_width,
                    dash_type(series.style.dash),
                    quote(&series.style.color.hex()),
                )
            })
            .join(", ");

        [
            format!(
                "set terminal pngcairo size {},{} font {} crop",
                self.width,
                self.height,
                quote(&self.font)
            ),
            format!("set output {}", quote(&output.to_string_lossy())),
            format!("set title {}", quote(&chart.title)),
            format!("set xlabel {}", quote(X_LABEL)),
            format!("set ylabel {}", quote(Y_LABEL)),
            r##"set style line 101 lt rgb "#444444" dashtype (30,30) lw 3"##.to_owned(),
            r#"set style line 200 lw 4 lc rgb "black""#.to_owned(),
            "set border ls 200".to_owned(),
            "set key Left top left reverse box vertical".to_owned(),
            "set grid xtics ytics mxtics mytics ls 101".to_owned(),
            "set size ratio 0.6".to_owned(),
            "set logscale x 2".to_owned(),
            format!("plot {plots}"),
        ]
        .join("\n")
            + "\n"
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use common::{
        group::Sample,
        plot::ChartKey,
        style::{COLORS, SeriesStyle},
    };

    use super::*;

    fn series(label: &str, style: SeriesStyle, samples: &[(u32, f64)]) -> SeriesPlan {
        SeriesPlan {
            series_id: label.split(' ').next().unwrap().to_owned(),
            label: label.to_owned(),
            samples: samples
                .iter()
                .map(|&(rank_count, elapsed_seconds)| Sample {
                    rank_count,
                    elapsed_seconds,
                })
                .collect(),
            style,
        }
    }

    fn chart() -> ChartPlan {
        ChartPlan {
            key: ChartKey {
                metric_id: "t1".to_owned(),
                filter_key: Some("f1".to_owned()),
            },
            title: "T1 | F1".to_owned(),
            series: vec![
                series("A Io1", SeriesStyle::from_indices(0, 0), &[(4, 1.5), (8, 2.5)]),
                series("B \"Io1\"", SeriesStyle::from_indices(1, 1), &[(4, 1.0)]),
            ],
        }
    }

    #[test]
    fn script_plots_every_series() {
        let renderer = GnuplotLine::default();
        let script = renderer.script(
            &chart(),
            Path::new("res/t1_f1.png"),
            &[Path::new("/tmp/a.dat"), Path::new("/tmp/b.dat")],
        );
        let lines = script.lines().collect::<Vec<_>>();
        assert_eq!(
            lines[0],
            r#"set terminal pngcairo size 1600,1600 font "Consolas,28" crop"#
        );
        assert_eq!(lines[1], r#"set output "res/t1_f1.png""#);
        assert_eq!(lines[2], r#"set title "T1 | F1""#);
        assert!(lines.contains(&"set logscale x 2"));
        assert_eq!(
            *lines.last().unwrap(),
            format!(
                r#"plot "/tmp/a.dat" with linespoints title "A Io1" pt 7 ps 3 lw 6 dashtype solid lc rgb "{}", "/tmp/b.dat" with linespoints title "B \"Io1\"" pt 5 ps 3 lw 6 dashtype (10,5) lc rgb "{}""#,
                COLORS[0].hex(),
                COLORS[1].hex()
            )
        );
    }

    #[test]
    fn data_file_holds_points_and_is_removed() {
        let plan = chart();
        let file = write_data_file(&plan.series[0]).unwrap();
        let path = file.path().to_owned();
        assert_eq!(fs::read_to_string(&path).unwrap(), "4 1.5\n8 2.5\n");
        assert!(path.extension().is_some_and(|ext| ext == "dat"));
        drop(file);
        assert!(!path.exists());
    }

    #[test]
    fn dash_types() {
        assert_eq!(dash_type(DashPattern::Solid), "solid");
        assert_eq!(dash_type(DashPattern::DashDot), "(15,5,2,5)");
    }

    #[test]
    fn succeeds_when_program_exits_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = GnuplotLine {
            program: "cat".to_owned(),
            ..Default::default()
        };
        renderer
            .render(&chart(), &dir.path().join("t1_f1.png"))
            .unwrap();
    }

    #[test]
    fn failing_program_is_a_process_error() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = GnuplotLine {
            program: "false".to_owned(),
            ..Default::default()
        };
        let err = renderer
            .render(&chart(), &dir.path().join("t1_f1.png"))
            .unwrap_err();
        assert!(
            matches!(err, RenderError::Process { ref program, .. } if program == "false"),
            "{err:?}"
        );
    }

    #[test]
    fn missing_program_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = GnuplotLine {
            program: "rank-plots-no-such-gnuplot".to_owned(),
            ..Default::default()
        };
        let err = renderer
            .render(&chart(), &dir.path().join("t1_f1.png"))
            .unwrap_err();
        assert!(matches!(err, RenderError::IoError(_)), "{err:?}");
    }
}
