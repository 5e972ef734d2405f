use clap::Parser;
use mcdenoise::image::io::{load_luma_png, save_luma_png};
use mcdenoise::{
    denoise_stream, ChromaSubsampling, Denoiser, DenoiserConfig, FrameGeometry, Interlace,
    SearchConfig, Threading, YuvFrame,
};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

const SCHEMA_JSON: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/config.schema.json"));
const EXAMPLE_JSON: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/config.example.json"));

#[derive(Parser, Debug)]
#[command(author, version, about = "mcdenoise CLI (JSON config driven)")]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(short, long, value_name = "FILE", default_value = "config.json")]
    config: PathBuf,
    /// Print the JSON schema and exit.
    #[arg(long)]
    print_schema: bool,
    /// Print an example config and exit.
    #[arg(long)]
    print_example: bool,
    /// Enable tracing output with per-frame statistics.
    #[arg(long)]
    trace: bool,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
enum FormatConfig {
    /// Headerless planar frames.
    #[default]
    Raw,
    /// Directory of grayscale PNG frames.
    PngSequence,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
enum SubsamplingConfig {
    Mono,
    #[default]
    Yuv420,
    Yuv422,
    Yuv444,
}

impl From<SubsamplingConfig> for ChromaSubsampling {
    fn from(value: SubsamplingConfig) -> Self {
        match value {
            SubsamplingConfig::Mono => ChromaSubsampling::Mono,
            SubsamplingConfig::Yuv420 => ChromaSubsampling::Yuv420,
            SubsamplingConfig::Yuv422 => ChromaSubsampling::Yuv422,
            SubsamplingConfig::Yuv444 => ChromaSubsampling::Yuv444,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
enum InterlaceConfig {
    #[default]
    Progressive,
    TopFieldFirst,
    BottomFieldFirst,
}

impl From<InterlaceConfig> for Interlace {
    fn from(value: InterlaceConfig) -> Self {
        match value {
            InterlaceConfig::Progressive => Interlace::Progressive,
            InterlaceConfig::TopFieldFirst => Interlace::TopFieldFirst,
            InterlaceConfig::BottomFieldFirst => Interlace::BottomFieldFirst,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
struct SearchConfigJson {
    frames: usize,
    radius_x: usize,
    radius_y: usize,
    zero_tolerance: u32,
    tolerance: u32,
    match_count_throttle: usize,
    match_size_throttle: usize,
    min_zero_motion_run: usize,
    prefer_shorter_vectors: bool,
    expand_existing_regions: bool,
    region_node_capacity: usize,
}

impl Default for SearchConfigJson {
    fn default() -> Self {
        let cfg = SearchConfig::default();
        Self {
            frames: cfg.frames,
            radius_x: cfg.radius_x,
            radius_y: cfg.radius_y,
            zero_tolerance: cfg.zero_tolerance,
            tolerance: cfg.tolerance,
            match_count_throttle: cfg.match_count_throttle,
            match_size_throttle: cfg.match_size_throttle,
            min_zero_motion_run: cfg.min_zero_motion_run,
            prefer_shorter_vectors: cfg.prefer_shorter_vectors,
            expand_existing_regions: cfg.expand_existing_regions,
            region_node_capacity: cfg.region_node_capacity,
        }
    }
}

impl From<&SearchConfigJson> for SearchConfig {
    fn from(value: &SearchConfigJson) -> Self {
        Self {
            frames: value.frames,
            radius_x: value.radius_x,
            radius_y: value.radius_y,
            zero_tolerance: value.zero_tolerance,
            tolerance: value.tolerance,
            match_count_throttle: value.match_count_throttle,
            match_size_throttle: value.match_size_throttle,
            min_zero_motion_run: value.min_zero_motion_run,
            prefer_shorter_vectors: value.prefer_shorter_vectors,
            expand_existing_regions: value.expand_existing_regions,
            region_node_capacity: value.region_node_capacity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
struct Config {
    input_path: String,
    output_path: String,
    format: FormatConfig,
    /// Frame size; required for raw input, read from the first PNG otherwise.
    width: usize,
    height: usize,
    subsampling: SubsamplingConfig,
    interlace: InterlaceConfig,
    /// 0 synchronous, 1 chroma worker, 2 chroma worker plus I/O threads.
    threads: usize,
    luma_only: bool,
    purge_interval: usize,
    parallel: bool,
    luma: SearchConfigJson,
    chroma: SearchConfigJson,
}

impl Default for Config {
    fn default() -> Self {
        let cfg = DenoiserConfig::default();
        Self {
            input_path: String::new(),
            output_path: String::new(),
            format: FormatConfig::Raw,
            width: 0,
            height: 0,
            subsampling: SubsamplingConfig::Yuv420,
            interlace: InterlaceConfig::Progressive,
            threads: 0,
            luma_only: cfg.luma_only,
            purge_interval: cfg.purge_interval,
            parallel: cfg.parallel,
            luma: SearchConfigJson::default(),
            chroma: SearchConfigJson::default(),
        }
    }
}

impl Config {
    fn denoiser_config(&self) -> DenoiserConfig {
        DenoiserConfig {
            luma: (&self.luma).into(),
            chroma: (&self.chroma).into(),
            interlace: self.interlace.into(),
            luma_only: self.luma_only,
            purge_interval: self.purge_interval,
            parallel: self.parallel,
        }
    }
}

#[derive(Debug, Serialize)]
struct Output {
    frames_written: u64,
    width: usize,
    height: usize,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.trace {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env().add_directive("mcdenoise=info".parse()?))
            .with_target(false)
            .init();
    }

    if cli.print_schema {
        println!("{SCHEMA_JSON}");
        return Ok(());
    }
    if cli.print_example {
        println!("{EXAMPLE_JSON}");
        return Ok(());
    }

    let config_text = fs::read_to_string(&cli.config)?;
    let config: Config = serde_json::from_str(&config_text)?;
    if config.input_path.is_empty() || config.output_path.is_empty() {
        return Err("input_path and output_path must be set in the config".into());
    }

    let output = match config.format {
        FormatConfig::Raw => run_raw(&config)?,
        FormatConfig::PngSequence => run_png_sequence(&config)?,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn run_raw(config: &Config) -> Result<Output, Box<dyn std::error::Error>> {
    if config.width == 0 || config.height == 0 {
        return Err("width and height must be set for raw input".into());
    }
    let geometry = FrameGeometry::new(config.width, config.height, config.subsampling.into())?;
    let reader = BufReader::new(File::open(&config.input_path)?);
    let writer = BufWriter::new(File::create(&config.output_path)?);
    let frames_written = denoise_stream(
        reader,
        writer,
        config.denoiser_config(),
        geometry,
        Threading::from_threads(config.threads),
    )?;
    Ok(Output {
        frames_written,
        width: geometry.width,
        height: geometry.height,
    })
}

fn run_png_sequence(config: &Config) -> Result<Output, Box<dyn std::error::Error>> {
    let mut inputs = fs::read_dir(&config.input_path)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()?;
    inputs.retain(|path| path.extension().is_some_and(|ext| ext == "png"));
    inputs.sort();
    let Some(first) = inputs.first() else {
        return Err("no PNG frames found in input_path".into());
    };
    let first = load_luma_png(first)?;
    let geometry = FrameGeometry::new(first.width(), first.height(), ChromaSubsampling::Mono)?;
    fs::create_dir_all(&config.output_path)?;

    let mut denoiser = Denoiser::new(config.denoiser_config(), geometry)?;
    let out_dir = Path::new(&config.output_path);
    let mut frames_written = 0u64;
    let mut save = |frame: YuvFrame| -> Result<(), Box<dyn std::error::Error>> {
        let path = out_dir.join(format!("frame_{frames_written:05}.png"));
        save_luma_png(path, frame.luma())?;
        frames_written += 1;
        Ok(())
    };
    for path in &inputs {
        let luma = load_luma_png(path)?;
        let frame = YuvFrame::from_planes(geometry, luma, None)?;
        if let Some(out) = denoiser.denoise_frame(&frame)? {
            save(out)?;
        }
    }
    while let Some(out) = denoiser.flush()? {
        save(out)?;
    }
    Ok(Output {
        frames_written,
        width: geometry.width,
        height: geometry.height,
    })
}

#[cfg(test)]
mod tests {
    use super::{Config, FormatConfig, SearchConfigJson, EXAMPLE_JSON};
    use mcdenoise::{DenoiserConfig, SearchConfig};

    #[test]
    fn empty_config_uses_library_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.format, FormatConfig::Raw);
        let denoiser = config.denoiser_config();
        assert_eq!(denoiser.luma, SearchConfig::default());
        assert_eq!(denoiser.purge_interval, DenoiserConfig::default().purge_interval);
    }

    #[test]
    fn example_config_round_trips() {
        let config: Config = serde_json::from_str(EXAMPLE_JSON).unwrap();
        assert_eq!(config.luma.radius_x, 16);
        assert_eq!(config.threads, 2);
        let text = serde_json::to_string(&config).unwrap();
        let again: Config = serde_json::from_str(&text).unwrap();
        assert_eq!(again, config);
    }

    #[test]
    fn partial_search_config_keeps_other_defaults() {
        let json: SearchConfigJson = serde_json::from_str(r#"{"tolerance": 5}"#).unwrap();
        let search = SearchConfig::from(&json);
        assert_eq!(search.tolerance, 5);
        assert_eq!(search.frames, SearchConfig::default().frames);
    }
}
