use clap::{Parser, Subcommand};
use photomark::{config, output, pipeline};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "photomark")]
#[command(about = "Turn a folder of photos into a geotagged KMZ map and a QA report")]
#[command(long_about = "\
Turn a folder of photos into a geotagged KMZ map and a QA report

Every photo with GPS coordinates becomes a placemark in the KMZ, numbered
p1, p2, ... from oldest to newest. Every file in the folder gets a row in the
CSV report with its capture time, coordinates and status.

Input:

  photos/
  ├── config.toml          # Optional settings (see 'photomark gen-config')
  ├── IMG_0001.jpg         # GPS + capture time  → placemark, status OK
  ├── IMG_0002.HEIC        # Converted to JPEG first (magick or ffmpeg)
  ├── IMG_0003.png         # No GPS              → status NO_GPS
  └── trip/clip.mov        # Not a photo         → status NON_IMAGE

Output (next to the .kmz):

  images.kmz               # doc.kml + files/<photo>
  images_report.csv        # slno,filename,datetime,lat,long,status
  files_geo/               # Copies of geotagged photos
  files_nongeo/            # Copies of photos without GPS
  files_nonimg/            # Copies of everything else

Set RUST_LOG=info (or debug) for progress and per-file details.")]
#[command(version)]
struct Cli {
    /// Photo directory
    #[arg(long, default_value = "photos", global = true)]
    source: PathBuf,

    /// KMZ file to write; the report and bucket folders go next to it
    #[arg(long, default_value = "images.kmz", global = true)]
    output: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build the KMZ, the CSV report and the bucket folders
    Build {
        /// Do not copy files into the per-bucket folders
        #[arg(long)]
        no_copy: bool,
    },
    /// Classify the photo directory without writing anything
    Scan {
        /// Print the classified batch as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    match cli.command {
        Command::Build { no_copy } => {
            let mut run_config = config::load_config(&cli.source)?;
            if no_copy {
                run_config.output.copy_buckets = false;
            }
            init_thread_pool(&run_config.processing);

            println!("==> Building {} from {}", cli.output.display(), cli.source.display());
            let summary = pipeline::build(&cli.source, &cli.output, &run_config)?;
            output::print_build_output(&summary);
        }
        Command::Scan { json } => {
            let run_config = config::load_config(&cli.source)?;
            init_thread_pool(&run_config.processing);

            let batch = pipeline::scan_batch(&cli.source, &run_config)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&batch)?);
            } else {
                output::print_scan_output(&batch, &cli.source);
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores; the config can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
