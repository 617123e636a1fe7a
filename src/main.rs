use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use studio_pipeline::analysis::{get_compatible_keys, AudioAnalyzer};
use studio_pipeline::config::{AppConfig, CliConfig, FileConfig};
use studio_pipeline::filter_graph::{mastering_presets, stem_types};
use studio_pipeline::mixdown::{MixJob, MixdownEngine};
use studio_pipeline::stems::StemExporter;
use studio_pipeline::tool::{check_tools_available, probe_audio_file, ExternalTool};
use studio_pipeline::track_store::{RecordType, SqliteTrackStore, TrackStore};
use studio_pipeline::AudioAsset;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    if path_buf.is_absolute() {
        return Ok(path_buf);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(path_buf))
}

/// `name=path`
fn parse_named_track(s: &str) -> Result<(String, PathBuf)> {
    let (name, path) = s
        .split_once('=')
        .with_context(|| format!("Expected NAME=PATH, got {:?}", s))?;
    if name.is_empty() {
        bail!("Track name must not be empty in {:?}", s);
    }
    Ok((name.to_string(), parse_path(path)?))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to a TOML config file. Values in it override the flags below.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Root directory for masters and stem bundles.
    #[clap(long, value_parser = parse_path)]
    pub exports_dir: Option<PathBuf>,

    /// ffmpeg binary to run.
    #[clap(long)]
    pub ffmpeg_path: Option<PathBuf>,

    /// ffprobe binary to run.
    #[clap(long)]
    pub ffprobe_path: Option<PathBuf>,

    /// Upper bound in seconds for a single ffmpeg/ffprobe invocation.
    #[clap(long, default_value_t = 600)]
    pub tool_timeout_secs: u64,

    /// Path to the SQLite track database.
    #[clap(long, value_parser = parse_path)]
    pub track_db: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Mix up to three takes and master them.
    Mixdown {
        #[clap(long, value_parser = parse_path)]
        beat: Option<PathBuf>,
        #[clap(long, value_parser = parse_path)]
        vocal: Option<PathBuf>,
        #[clap(long, value_parser = parse_path)]
        fx: Option<PathBuf>,
        /// Mastering preset id.
        #[clap(long, default_value = "standard")]
        preset: String,
        #[clap(long)]
        name: String,
    },
    /// Split one track into frequency-band stems.
    Stems {
        #[clap(value_parser = parse_path)]
        input: PathBuf,
        /// Comma separated stem ids; defaults to vocals,instrumental,bass,highs.
        #[clap(long, value_delimiter = ',')]
        stems: Vec<String>,
        #[clap(long)]
        name: String,
    },
    /// Bundle separately recorded tracks as stems.
    StemsFromTracks {
        /// Repeatable NAME=PATH.
        #[clap(long = "track", value_parser = parse_named_track, required = true)]
        tracks: Vec<(String, PathBuf)>,
        #[clap(long)]
        name: String,
    },
    /// Estimate key, tempo, loudness and duration.
    Analyze {
        #[clap(value_parser = parse_path, required = true)]
        paths: Vec<PathBuf>,
        /// Give up after the configured quick timeout.
        #[clap(long)]
        quick: bool,
        /// Files analysed at once; defaults to the configured batch concurrency.
        #[clap(long)]
        concurrency: Option<usize>,
    },
    /// Add a track to the track database or repoint it.
    RegisterTrack {
        record_type: String,
        record_id: String,
        #[clap(value_parser = parse_path)]
        path: PathBuf,
    },
    /// Analyse a stored track and write the figures back.
    AnalyzeRecord {
        record_type: String,
        record_id: String,
    },
    /// Camelot wheel neighbours of a key, e.g. "C minor".
    CompatibleKeys { key: String },
    /// List mastering presets.
    Presets,
    /// List stem types.
    StemTypes,
    /// Print stream metadata of an audio file.
    Probe {
        #[clap(value_parser = parse_path)]
        path: PathBuf,
    },
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn open_track_store(config: &AppConfig) -> Result<SqliteTrackStore> {
    let path = config
        .track_db_path
        .as_ref()
        .context("track_db must be specified via --track-db or in config file")?;
    info!("Opening track database at {:?}...", path);
    SqliteTrackStore::new(path)
}

async fn ready_tool(config: &AppConfig) -> Result<Arc<dyn ExternalTool>> {
    let tool: Arc<dyn ExternalTool> = Arc::new(config.ffmpeg_tool());
    check_tools_available(tool.as_ref())
        .await
        .context("ffmpeg/ffprobe are not usable")?;
    Ok(tool)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialise logging")?;

    let file_config = match &cli_args.config {
        Some(path) => Some(FileConfig::load(path)?),
        None => None,
    };
    let cli_config = CliConfig {
        exports_dir: cli_args.exports_dir.clone(),
        ffmpeg_path: cli_args.ffmpeg_path.clone(),
        ffprobe_path: cli_args.ffprobe_path.clone(),
        tool_timeout_secs: cli_args.tool_timeout_secs,
        track_db_path: cli_args.track_db.clone(),
    };
    let config = AppConfig::resolve(&cli_config, file_config)?;

    match cli_args.command {
        Command::Mixdown {
            beat,
            vocal,
            fx,
            preset,
            name,
        } => {
            let tool = ready_tool(&config).await?;
            let engine = MixdownEngine::new(tool, config.exports_dir.clone());
            let job = MixJob::from_tracks(
                beat.map(AudioAsset::from_path),
                vocal.map(AudioAsset::from_path),
                fx.map(AudioAsset::from_path),
                &preset,
                &name,
            );
            let result = engine.mixdown(&job).await?;
            print_json(&result)?;
        }
        Command::Stems {
            input,
            stems,
            name,
        } => {
            let tool = ready_tool(&config).await?;
            let exporter = StemExporter::new(tool, config.exports_dir.clone());
            let result = exporter
                .export_stems(&AudioAsset::from_path(input), &stems, &name)
                .await?;
            print_json(&result)?;
        }
        Command::StemsFromTracks { tracks, name } => {
            let tool = ready_tool(&config).await?;
            let exporter = StemExporter::new(tool, config.exports_dir.clone());
            let tracks: Vec<(String, AudioAsset)> = tracks
                .into_iter()
                .map(|(track_name, path)| (track_name, AudioAsset::from_path(path)))
                .collect();
            let result = exporter.export_stems_from_tracks(&tracks, &name).await?;
            print_json(&result)?;
        }
        Command::Analyze {
            paths,
            quick,
            concurrency,
        } => {
            let tool = ready_tool(&config).await?;
            let analyzer = AudioAnalyzer::new(tool, config.analyzer_settings());
            let results = if quick {
                let timeout = analyzer.settings().quick_timeout;
                let mut results = Vec::with_capacity(paths.len());
                for path in &paths {
                    results.push(analyzer.quick_analyze(path, timeout).await);
                }
                results
            } else {
                let concurrency =
                    concurrency.unwrap_or(analyzer.settings().batch_concurrency);
                analyzer.analyze_batch(&paths, concurrency).await
            };
            print_json(&results)?;
        }
        Command::RegisterTrack {
            record_type,
            record_id,
            path,
        } => {
            let record_type: RecordType = record_type.parse()?;
            let store = open_track_store(&config)?;
            store.register_track(record_type, &record_id, &path)?;
            print_json(&store.get_track(record_type, &record_id)?)?;
        }
        Command::AnalyzeRecord {
            record_type,
            record_id,
        } => {
            let parsed: RecordType = record_type.parse()?;
            let store = Arc::new(open_track_store(&config)?);
            let path = store
                .resolve_path(parsed, &record_id)?
                .with_context(|| format!("No track stored for {}:{}", parsed, record_id))?;

            let tool = ready_tool(&config).await?;
            let analyzer = AudioAnalyzer::new(tool, config.analyzer_settings());
            let status = analyzer
                .analyze_in_background(path, &record_id, &record_type, store.clone())
                .await
                .context("Background analysis task panicked")?;
            info!("Background analysis finished: {}", status);
            print_json(&store.get_track(parsed, &record_id)?)?;
        }
        Command::CompatibleKeys { key } => {
            print_json(&get_compatible_keys(&key))?;
        }
        Command::Presets => {
            print_json(&mastering_presets())?;
        }
        Command::StemTypes => {
            print_json(&stem_types())?;
        }
        Command::Probe { path } => {
            let tool = config.ffmpeg_tool();
            let asset = probe_audio_file(&tool, &path).await?;
            print_json(&asset)?;
        }
    }

    Ok(())
}
