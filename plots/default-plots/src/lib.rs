use std::{fmt, str::FromStr};

use common::plot::Renderer;
pub use gnuplot_line::GnuplotLine;
pub use plotters_line::PlottersLine;

/// Renderer backends compiled into the binary
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    #[default]
    Plotters,
    Gnuplot,
}

impl Backend {
    /// The backend with its default options
    pub fn renderer(self) -> Box<dyn Renderer> {
        match self {
            Backend::Plotters => Box::new(PlottersLine::default()),
            Backend::Gnuplot => Box::new(GnuplotLine::default()),
        }
    }
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "plotters" => Ok(Self::Plotters),
            "gnuplot" => Ok(Self::Gnuplot),
            _ => Err(format!("Unknown backend {s}, expected plotters or gnuplot")),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.renderer().name())
    }
}
