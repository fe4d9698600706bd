//! narrate - Convert plain text into a chaptered M4B audiobook using Piper TTS

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use env_logger::Env;
use indicatif::{ProgressBar, ProgressStyle};
use narrate_core::audio::{self, Degradation};
use narrate_core::{
    AudioAssembler, ChapterPolicy, Document, FfmpegTools, MetadataRecord, NarrateConfig,
    NarrateError, Pipeline, PiperVoice, Speed, VoiceModel, VoiceSynthesizer,
};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "narrate")]
#[command(about = "Convert plain text into a chaptered M4B audiobook using Piper TTS", long_about = None)]
#[command(version)]
struct Args {
    /// Text file to read, or '-' for stdin
    input: Option<PathBuf>,

    /// Output file path (default: <input-name>.m4b)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Piper voice model (.onnx)
    #[arg(short, long)]
    model: Option<PathBuf>,

    /// Speech speed multiplier (0.5-2.0)
    #[arg(short, long)]
    speed: Option<f32>,

    /// Book title (default: input file name)
    #[arg(long)]
    title: Option<String>,

    /// Book author
    #[arg(long)]
    author: Option<String>,

    /// Album tag
    #[arg(long)]
    album: Option<String>,

    /// Genre tag
    #[arg(long)]
    genre: Option<String>,

    /// Release year
    #[arg(long)]
    year: Option<String>,

    /// Free-form comment
    #[arg(long)]
    comment: Option<String>,

    /// Cover image to embed
    #[arg(long)]
    cover: Option<PathBuf>,

    /// How chapters are derived
    #[arg(long, value_enum, default_value_t = ChapterMode::Sections)]
    chapters: ChapterMode,

    /// Segments to synthesize at once (default from config)
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Enable debug output
    #[arg(short, long, default_value_t = false)]
    debug: bool,

    /// Subcommands
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum ChapterMode {
    /// No chapters
    None,
    /// One chapter per form-feed separated section
    Sections,
    /// One chapter per synthesized segment
    Segments,
}

impl From<ChapterMode> for ChapterPolicy {
    fn from(mode: ChapterMode) -> Self {
        match mode {
            ChapterMode::None => ChapterPolicy::None,
            ChapterMode::Sections => ChapterPolicy::PerSection,
            ChapterMode::Segments => ChapterPolicy::PerSegment,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Set default voice model
    SetModel {
        /// Path to a Piper .onnx model
        path: PathBuf,
    },
    /// Set default speed
    SetSpeed {
        /// Value (0.5-2.0)
        value: f32,
    },
    /// Set default bitrate
    SetBitrate {
        /// ffmpeg bitrate, e.g. 64k
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();

    if let Some(Commands::Config { action }) = &args.command {
        return handle_config_command(action);
    }

    let input = args
        .input
        .clone()
        .ok_or_else(|| anyhow::anyhow!("Input file is required. Run 'narrate --help' for usage."))?;

    let config = NarrateConfig::load().context("Failed to load configuration")?;

    let output_path = args.output.clone().unwrap_or_else(|| default_output(&input));

    let tools = FfmpegTools::locate(config.ffmpeg_path.as_deref(), config.ffprobe_path.as_deref())
        .context("FFmpeg is required to build audiobooks")?;
    if !tools.is_ffmpeg_available().await {
        anyhow::bail!("ffmpeg at {} does not run", tools.ffmpeg.display());
    }

    let model_path = args.model.clone().or(config.voice_model.clone()).ok_or_else(|| {
        anyhow::anyhow!(
            "No voice model given.\n\n\
             Pass one with --model, or set a default:\n\
             \x20 narrate config set-model /path/to/en_US-lessac-medium.onnx"
        )
    })?;

    let text = read_input(&input)?;
    let document = Document::from_text(&text);

    let mut options = config.pipeline_options()?;
    if let Some(speed) = args.speed {
        options.speed = Speed::new(speed);
    }
    if let Some(jobs) = args.jobs {
        options.concurrency = jobs.max(1);
    }
    options.chapter_policy = args.chapters.into();

    let mut settings = config.encode_settings();
    settings.cover_image = args.cover.clone();

    let metadata = build_metadata(&args, &config, &input);

    if args.debug {
        eprintln!("Input: {}", input.display());
        eprintln!("Output: {}", output_path.display());
        eprintln!("Model: {}", model_path.display());
        eprintln!("Speed: {}", options.speed.value());
        eprintln!("Jobs: {}", options.concurrency);
        eprintln!("Chapters: {:?}", options.chapter_policy);
    }

    let voice = PiperVoice::load(&model_path, config.piper_path.as_deref())
        .context("Failed to load voice model")?;
    eprintln!("Voice: {} ({} Hz)", voice.name(), voice.sample_rate());

    let pipeline = Pipeline::new(
        VoiceSynthesizer::new(Arc::new(voice)),
        AudioAssembler::new(tools.clone(), settings),
        options,
    );

    let total = pipeline.prepare(&document)?.segments.len();
    eprintln!("Processing {} chunks...", total);

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
            .context("Invalid progress bar template")?
            .progress_chars("#>-"),
    );

    let pipeline = pipeline.with_progress({
        let pb = pb.clone();
        move |done, total| {
            pb.set_position(done as u64);
            if done == total {
                pb.set_message("encoding");
            }
        }
    });

    let artifact = tokio::select! {
        result = pipeline.run(&document, &metadata, &output_path) => {
            match result {
                Ok(artifact) => artifact,
                Err(e) => {
                    pb.abandon_with_message("failed");
                    return Err(e).context("Conversion failed");
                }
            }
        }
        _ = tokio::signal::ctrl_c() => {
            pb.abandon_with_message("cancelled");
            return Err(NarrateError::Cancelled.into());
        }
    };
    pb.finish_with_message("done");

    for degradation in &artifact.degradations {
        match degradation {
            Degradation::ChaptersDropped { reason } => {
                eprintln!("Warning: written without chapters ({})", reason)
            }
            Degradation::TaggingSkipped { reason } => {
                eprintln!("Warning: tagging pass skipped ({})", reason)
            }
        }
    }

    print_summary(&tools, &artifact.path, artifact.duration_secs, artifact.chapters.len()).await?;

    Ok(())
}

fn default_output(input: &Path) -> PathBuf {
    if input.as_os_str() == "-" {
        return PathBuf::from("output.m4b");
    }
    input.with_extension("m4b")
}

fn read_input(input: &Path) -> Result<String> {
    if input.as_os_str() == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read stdin")?;
        return Ok(text);
    }

    if !input.exists() {
        anyhow::bail!("Input file not found: {}", input.display());
    }
    std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))
}

fn build_metadata(args: &Args, config: &NarrateConfig, input: &Path) -> MetadataRecord {
    let mut metadata = config.base_metadata();

    metadata.title = args.title.clone().or_else(|| {
        if input.as_os_str() == "-" {
            None
        } else {
            input
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
        }
    });
    metadata.author = args.author.clone();
    if let Some(ref album) = args.album {
        metadata.album = Some(album.clone());
    }
    if let Some(ref genre) = args.genre {
        metadata.genre = Some(genre.clone());
    }
    metadata.year = args.year.clone();
    metadata.comment = args.comment.clone();
    metadata
}

async fn print_summary(
    tools: &FfmpegTools,
    path: &Path,
    duration_secs: f64,
    chapters: usize,
) -> Result<()> {
    let size = std::fs::metadata(path)?.len();
    let size_mb = size as f64 / (1024.0 * 1024.0);

    eprintln!(
        "Output: {} ({:.1} MB, {}, {} chapter(s))",
        path.display(),
        size_mb,
        format_duration(duration_secs),
        chapters
    );

    match audio::probe(tools, path).await {
        Ok(report) => {
            if let Some(title) = report.tag("title") {
                eprintln!("Title: {}", title);
            }
            if let Some(artist) = report.tag("artist") {
                eprintln!("Author: {}", artist);
            }
        }
        Err(e) => log::warn!("Could not read back tags: {}", e),
    }

    Ok(())
}

fn format_duration(secs: f64) -> String {
    let total = secs.round() as u64;
    format!("{}:{:02}:{:02}", total / 3600, (total / 60) % 60, total % 60)
}

fn handle_config_command(action: &ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = NarrateConfig::load()?;
            println!("Configuration file: {:?}", NarrateConfig::config_path()?);
            println!();
            match &config.voice_model {
                Some(model) => println!("voice_model = \"{}\"", model.display()),
                None => println!("voice_model = (none)"),
            }
            match &config.piper_path {
                Some(path) => println!("piper_path = \"{}\"", path.display()),
                None => println!("piper_path = (search PATH)"),
            }
            match &config.ffmpeg_path {
                Some(path) => println!("ffmpeg_path = \"{}\"", path.display()),
                None => println!("ffmpeg_path = (search PATH)"),
            }
            println!("speed = {}", config.speed);
            println!("max_chunk_length = {}", config.max_chunk_length);
            println!("min_chunk_length = {}", config.min_chunk_length);
            println!("codec = \"{}\"", config.codec);
            println!("bitrate = \"{}\"", config.bitrate);
            println!("concurrency = {}", config.concurrency);
            println!("chapter_title_template = \"{}\"", config.chapter_title_template);
            println!("album = \"{}\"", config.album);
            println!("genre = \"{}\"", config.genre);
        }
        ConfigAction::SetModel { path } => {
            let mut config = NarrateConfig::load()?;
            config.voice_model = Some(path.clone());
            config.save()?;
            println!("Default voice model set to: {}", path.display());
        }
        ConfigAction::SetSpeed { value } => {
            let mut config = NarrateConfig::load()?;
            config.speed = Speed::new(*value).value();
            config.save()?;
            println!("Default speed set to: {}", config.speed);
        }
        ConfigAction::SetBitrate { value } => {
            let mut config = NarrateConfig::load()?;
            config.bitrate = value.clone();
            config.save()?;
            println!("Default bitrate set to: {}", config.bitrate);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_output() {
        assert_eq!(default_output(Path::new("book.txt")), PathBuf::from("book.m4b"));
        assert_eq!(default_output(Path::new("-")), PathBuf::from("output.m4b"));
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0.0), "0:00:00");
        assert_eq!(format_duration(3725.4), "1:02:05");
    }

    #[test]
    fn test_chapter_mode_mapping() {
        assert_eq!(ChapterPolicy::from(ChapterMode::None), ChapterPolicy::None);
        assert_eq!(ChapterPolicy::from(ChapterMode::Sections), ChapterPolicy::PerSection);
        assert_eq!(ChapterPolicy::from(ChapterMode::Segments), ChapterPolicy::PerSegment);
    }

    #[test]
    fn test_args_parse() {
        let args = Args::parse_from([
            "narrate",
            "book.txt",
            "--speed",
            "1.5",
            "--chapters",
            "segments",
            "--author",
            "Author",
        ]);
        assert_eq!(args.input, Some(PathBuf::from("book.txt")));
        assert_eq!(args.speed, Some(1.5));
        assert_eq!(args.chapters, ChapterMode::Segments);

        let config = NarrateConfig::default();
        let metadata = build_metadata(&args, &config, Path::new("book.txt"));
        assert_eq!(metadata.title.as_deref(), Some("book"));
        assert_eq!(metadata.author.as_deref(), Some("Author"));
        assert_eq!(metadata.album.as_deref(), Some("Audiobook"));
    }
}
