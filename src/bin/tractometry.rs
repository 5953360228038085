//! Command line application computing the metrics of a tractogram.

use clap::Parser;
use log::{error, LevelFilter};
use simple_logger::SimpleLogger;
use std::path::PathBuf;
use std::process;
use std::time::Instant;
use tractometry::pipeline::{run, PipelineOptions};

#[derive(Parser, Debug)]
#[command(name = "tractometry", version)]
#[command(about = "Shape and diffusion metrics of a tractography bundle")]
struct Args {
    /// Input tractogram (tck, trk, vtk, vtp or xml)
    tractogram: PathBuf,

    /// Output statistics file (txt)
    output: PathBuf,

    /// Fractional anisotropy image (nii or nii.gz)
    #[arg(long)]
    fa: Option<PathBuf>,

    /// b-zero image (nii or nii.gz)
    #[arg(long)]
    bzero: Option<PathBuf>,

    /// Mean diffusivity image (nii or nii.gz)
    #[arg(long)]
    md: Option<PathBuf>,

    /// First line of the text report, the output path by default
    #[arg(long = "header")]
    header: Option<String>,

    /// Also save the report as a CSV file
    #[arg(long)]
    csv: bool,

    /// Also save the report as a table, one metric per row
    #[arg(long)]
    table: bool,

    /// Also save the behavior profiles of the scalar maps
    #[arg(long)]
    profiles: bool,

    /// Resample the streamlines to this percentage of their points, in (0, 100]
    #[arg(short, long)]
    resample: Option<f64>,

    /// Remove near-collinear points from the streamlines
    #[arg(long)]
    compress: bool,

    /// Only log warnings and errors
    #[arg(short, long)]
    quiet: bool,
}

impl Args {
    fn options(&self) -> PipelineOptions {
        let mut options = PipelineOptions::new(&self.tractogram, &self.output)
            .csv(self.csv)
            .table(self.table)
            .profiles(self.profiles)
            .compress(self.compress);
        if let Some(fa) = &self.fa {
            options = options.fa(fa);
        }
        if let Some(bzero) = &self.bzero {
            options = options.bzero(bzero);
        }
        if let Some(md) = &self.md {
            options = options.md(md);
        }
        if let Some(header) = &self.header {
            options = options.header(header.as_str());
        }
        if let Some(percent) = self.resample {
            options = options.resample(percent);
        }
        options
    }
}

fn main() {
    let args = Args::parse();
    let level = if args.quiet {
        LevelFilter::Warn
    } else {
        LevelFilter::Info
    };
    if let Err(e) = SimpleLogger::new().with_level(level).init() {
        eprintln!("Could not set up logging: {}", e);
    }

    let start = Instant::now();
    if let Err(e) = run(&args.options()) {
        error!("{}", e);
        process::exit(1);
    }
    println!("Execution time: {:.2} s", start.elapsed().as_secs_f64());
}
