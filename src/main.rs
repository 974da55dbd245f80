mod cli;
mod config;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::{Duration, Instant};

use beatframe::audio::{decode_audio, AudioData, LiveSpectrum, Timeline};
use beatframe::encode::{EncoderOptions, FfmpegEncoder};
use beatframe::export::{BatchExporter, ExportSequencer};
use beatframe::live::{LiveScheduler, DISPLAY_REFRESH_HZ};
use beatframe::render::{RasterSurface, RasterSurfaceFactory, StyleRegistry, Surface};
use beatframe::settings::{ExportSettings, FrameFormat, VisualSettings};
use beatframe::templates::{FrameLayout, Platform};

use cli::{AnalyzeArgs, BatchArgs, Cli, Command, EncoderArgs, ExportArgs, PreviewArgs, RenderArgs, VisualArgs};
use config::Config;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    if cli.list_platforms {
        println!("Available platforms:");
        for platform in Platform::ALL {
            let template = platform.template();
            println!(
                "  {:<10} {:<18} {}x{}",
                platform.to_string(),
                platform.display_name(),
                template.width,
                template.height
            );
        }
        return Ok(());
    }

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    let config = match config::find_config(cli.config.as_deref()) {
        Some(path) => match config::load_config(&path) {
            Some(cfg) => {
                log::info!("Loaded config from {}", path.display());
                cfg
            }
            None => {
                log::warn!("Failed to load config from {}", path.display());
                Config::default()
            }
        },
        None => Config::default(),
    };

    match command {
        Command::Export(args) => run_export(args, config),
        Command::Batch(args) => run_batch(args, config),
        Command::Preview(args) => run_preview(args, config),
        Command::Analyze(args) => run_analyze(args),
    }
}

fn run_export(args: ExportArgs, config: Config) -> Result<()> {
    let (visual, mut settings, options) =
        resolve(&config, &args.visual, &args.render, &args.encoder);
    if let Some(platform) = args.platform {
        settings.platform = platform;
    }

    let audio = load_audio(&args.input)?;
    ensure_ffmpeg()?;

    let layout = FrameLayout::new(settings.platform, settings.resolution);
    log::info!("Output: {}", args.output.display());
    log::info!(
        "Platform: {} at {}x{} @ {}fps, style {:?}",
        settings.platform.display_name(),
        layout.width,
        layout.height,
        settings.frame_rate,
        visual.waveform_style
    );

    let mut encoder = FfmpegEncoder::new(options)?;
    let surfaces = RasterSurfaceFactory;
    let styles = StyleRegistry::builtin();
    let pb = progress_bar()?;

    let video = ExportSequencer::new(&mut encoder, &surfaces, &styles)
        .export(&audio, &args.input, &visual, &settings, &mut |percent, status| {
            pb.set_position(percent as u64);
            pb.set_message(status.to_string());
        })
        .context("Export failed")?;
    pb.finish_with_message("Rendering complete");

    std::fs::write(&args.output, &video)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;
    log::info!("Done! Output: {} ({} bytes)", args.output.display(), video.len());
    Ok(())
}

fn run_batch(args: BatchArgs, config: Config) -> Result<()> {
    let (visual, settings, options) = resolve(&config, &args.visual, &args.render, &args.encoder);
    let platforms = if args.platforms.is_empty() {
        Platform::ALL.to_vec()
    } else {
        args.platforms.clone()
    };

    let audio = load_audio(&args.input)?;
    ensure_ffmpeg()?;

    let names: Vec<String> = platforms.iter().map(|p| p.to_string()).collect();
    log::info!("Batch: {} -> {}", names.join(", "), args.output.display());

    let mut encoder = FfmpegEncoder::new(options)?;
    let surfaces = RasterSurfaceFactory;
    let styles = StyleRegistry::builtin();
    let pb = progress_bar()?;

    let archive = BatchExporter::new(ExportSequencer::new(&mut encoder, &surfaces, &styles))
        .export(&audio, &args.input, &visual, &settings, &platforms, &mut |percent, status| {
            pb.set_position(percent as u64);
            pb.set_message(status.to_string());
        })
        .context("Batch export failed")?;
    pb.finish_with_message("Batch complete");

    std::fs::write(&args.output, &archive)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;
    log::info!("Done! Archive: {} ({} bytes)", args.output.display(), archive.len());
    Ok(())
}

fn run_preview(args: PreviewArgs, config: Config) -> Result<()> {
    let mut visual = config.visual;
    args.visual.apply(&mut visual);
    let platform = args.platform.unwrap_or(config.export.platform);

    let audio = load_audio(&args.input)?;
    let layout = FrameLayout::new(platform, args.resolution);
    let mut surface = RasterSurface::new(layout.width, layout.height)?;
    let styles = StyleRegistry::builtin();
    let mut live = LiveScheduler::new(LiveSpectrum::new(audio.sample_rate), visual, layout);

    let limit = match args.seconds {
        Some(seconds) => ((seconds.max(0.0) * audio.sample_rate as f64) as usize).min(audio.frames()),
        None => audio.frames(),
    };
    let samples_per_tick = (audio.sample_rate as f64 / DISPLAY_REFRESH_HZ).round().max(1.0) as usize;
    let tick_ms = 1000.0 / DISPLAY_REFRESH_HZ;
    let (left, right) = (audio.left(), audio.right());

    log::info!(
        "Preview: {} at {}x{}, {:.1}s of audio",
        platform.display_name(),
        layout.width,
        layout.height,
        limit as f64 / audio.sample_rate as f64
    );

    let started = Instant::now();
    let mut cursor = 0;
    let mut ticks = 0u64;
    let mut beats = 0u64;
    live.play();
    while cursor < limit {
        let end = (cursor + samples_per_tick).min(limit);
        live.source_mut().push(&left[cursor..end], &right[cursor..end]);
        cursor = end;

        if let Some(analysis) = live.tick(&mut surface, &styles, tick_ms) {
            if analysis.beat.is_beat() {
                beats += 1;
                log::debug!(
                    "Beat at {:.2}s (kick={}, bass={}, snare={:.2})",
                    live.position_ms() / 1000.0,
                    analysis.beat.kick,
                    analysis.beat.bass,
                    analysis.beat.snare
                );
            }
        }
        ticks += 1;

        if args.realtime {
            let due = Duration::from_secs_f64(ticks as f64 / DISPLAY_REFRESH_HZ);
            if let Some(wait) = due.checked_sub(started.elapsed()) {
                std::thread::sleep(wait);
            }
        }
    }
    live.pause();

    log::info!(
        "Preview finished: {} frames, {} beats in {:.2}s",
        ticks,
        beats,
        started.elapsed().as_secs_f64()
    );

    if let Some(path) = args.snapshot {
        let png = surface.encode(FrameFormat::Png)?;
        std::fs::write(&path, png)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        log::info!("Snapshot: {}", path.display());
    }
    Ok(())
}

fn run_analyze(args: AnalyzeArgs) -> Result<()> {
    let audio = load_audio(&args.input)?;
    let timeline = Timeline::build(&audio).context("Analysis failed")?;
    log::info!(
        "Timeline: {} entries, {} bins, {:.1}s",
        timeline.len(),
        timeline.bin_count(),
        timeline.duration()
    );

    let json = if args.pretty {
        serde_json::to_string_pretty(&timeline)?
    } else {
        serde_json::to_string(&timeline)?
    };
    match args.output {
        Some(path) => std::fs::write(&path, json)
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => println!("{json}"),
    }
    Ok(())
}

/// Config values overlaid with whatever flags were given.
fn resolve(
    config: &Config,
    visual_args: &VisualArgs,
    render_args: &RenderArgs,
    encoder_args: &EncoderArgs,
) -> (VisualSettings, ExportSettings, EncoderOptions) {
    let mut visual = config.visual.clone();
    visual_args.apply(&mut visual);
    let mut settings = config.export.clone();
    render_args.apply(&mut settings);
    let mut options = config.encoder.clone();
    encoder_args.apply(&mut options);
    (visual, settings, options)
}

fn load_audio(input: &Path) -> Result<AudioData> {
    if !input.exists() {
        anyhow::bail!("Input file not found: {}", input.display());
    }
    log::info!("Decoding {}...", input.display());
    let audio = decode_audio(input)
        .with_context(|| format!("Failed to decode {}", input.display()))?;
    log::info!(
        "Decoded {:.1}s, {} channel(s) @ {}Hz",
        audio.duration(),
        audio.channel_count(),
        audio.sample_rate
    );
    Ok(audio)
}

fn ensure_ffmpeg() -> Result<()> {
    if !FfmpegEncoder::is_available() {
        anyhow::bail!("ffmpeg not found on PATH; install it to export video");
    }
    Ok(())
}

fn progress_bar() -> Result<ProgressBar> {
    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos:>3}% {msg}")?
            .progress_chars("=>-"),
    );
    Ok(pb)
}
