use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use colored::Colorize;
use serde_json::json;
use thumbq::{Engine, EngineConfig, FfmpegTool, MediaTool, Outcome};

const CLI_AFTER_HELP: &str = "Examples:\n  thumbq probe input.mkv --json\n  thumbq generate *.mkv --out thumbs -j 8\n  thumbq generate poster.png --out thumbs --budget 200000";

#[derive(Debug, Parser)]
#[command(
    name = "thumbq",
    version,
    about = "Generate representative thumbnails for media files",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Parser, Clone, Default)]
struct GlobalOptions {
    /// Path to the ffmpeg binary.
    #[arg(long, default_value = "ffmpeg")]
    ffmpeg: PathBuf,

    /// Path to the ffprobe binary.
    #[arg(long, default_value = "ffprobe")]
    ffprobe: PathBuf,
}

#[derive(Debug, Parser)]
enum Commands {
    /// Probe a media file and print its first video stream.
    #[command(after_help = "Examples:\n  thumbq probe input.mkv\n  thumbq probe input.mkv --json")]
    Probe {
        /// Input media path or URL.
        input: String,

        /// Output as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Generate thumbnails for the given inputs through the full engine.
    #[command(
        after_help = "Examples:\n  thumbq generate a.mkv b.mkv --out thumbs\n  thumbq generate /films/*.mkv --out thumbs -j 8"
    )]
    Generate {
        /// Input media paths or URLs, in priority order.
        #[arg(required = true)]
        inputs: Vec<String>,

        /// Output directory for the generated JPEG thumbnails.
        #[arg(long, default_value = "thumbs")]
        out: PathBuf,

        /// Number of worker threads.
        #[arg(short = 'j', long, default_value_t = 4)]
        workers: usize,

        /// Output pixel budget (width x height).
        #[arg(long, default_value_t = 100_000)]
        budget: u64,
    },
}

fn main() {
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Probe { input, json } => probe(&cli.global, &input, json),
        Commands::Generate { inputs, out, workers, budget } => {
            generate(&cli.global, inputs, &out, workers, budget)
        }
    };

    if let Err(message) = result {
        eprintln!("{} {message}", "error:".red().bold());
        std::process::exit(1);
    }
}

fn probe(global: &GlobalOptions, input: &str, as_json: bool) -> Result<(), String> {
    let tool = FfmpegTool::new(global.ffmpeg.clone(), global.ffprobe.clone());
    let report = tool.probe(input).map_err(|error| error.to_string())?;

    if as_json {
        let value = json!({
            "codec_name": report.codec_name,
            "pixel_format": report.pixel_format,
            "duration": report.duration,
        });
        println!("{value}");
    } else {
        println!("{}     {}", "codec:".bold(), report.codec_name);
        println!("{} {}", "pixel fmt:".bold(), report.pixel_format);
        match report.duration {
            Some(seconds) => println!("{}  {seconds:.3}s", "duration:".bold()),
            None => println!("{}  unknown", "duration:".bold()),
        }
    }
    Ok(())
}

fn generate(
    global: &GlobalOptions,
    inputs: Vec<String>,
    out: &PathBuf,
    workers: usize,
    budget: u64,
) -> Result<(), String> {
    fs::create_dir_all(out).map_err(|error| error.to_string())?;

    let config = EngineConfig::new()
        .with_workers(workers)
        .with_pixel_budget(budget)
        .with_ffmpeg(global.ffmpeg.clone())
        .with_ffprobe(global.ffprobe.clone());
    let engine = Engine::start(config).map_err(|error| error.to_string())?;

    engine.submit_missing(inputs.clone());

    // Poll until every input has an outcome; a missing entry means the key
    // is still queued or in flight.
    let mut done = vec![false; inputs.len()];
    let mut generated = 0usize;
    let mut failed = 0usize;
    while done.iter().any(|finished| !finished) {
        for (input, finished) in inputs.iter().zip(done.iter_mut()) {
            if *finished {
                continue;
            }
            match engine.outcome(input) {
                Some(Outcome::Ready(thumbnail)) => {
                    *finished = true;
                    generated += 1;
                    let target = out.join(output_name(input));
                    fs::write(&target, &thumbnail.bytes).map_err(|error| error.to_string())?;
                    println!("{} {input} -> {}", "ok".green().bold(), target.display());
                }
                Some(Outcome::Failed) => {
                    *finished = true;
                    failed += 1;
                    println!("{} {input}", "failed".red().bold());
                }
                None => {}
            }
        }
        std::thread::sleep(Duration::from_millis(50));
    }

    engine.shutdown();
    println!(
        "{} {generated} generated, {failed} failed",
        "done:".bold()
    );
    Ok(())
}

/// Flatten an input path or URL into a safe output file name.
fn output_name(input: &str) -> String {
    let name = input.rsplit('/').next().unwrap_or(input);
    let stem = name.rsplit_once('.').map_or(name, |(stem, _)| stem);
    format!("{stem}.jpg")
}
