use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use beatframe::encode::EncoderOptions;
use beatframe::settings::{
    Color, ExportSettings, FrameFormat, ResolutionTier, RotationDirection, VisualSettings,
    WaveformStyle,
};
use beatframe::templates::Platform;

#[derive(Parser, Debug)]
#[command(
    name = "beatframe",
    version,
    about = "Audio-reactive waveform visualizer and social video exporter"
)]
pub struct Cli {
    /// Config file (default: ./beatframe.toml, then the user config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// List platform templates and exit
    #[arg(long)]
    pub list_platforms: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Render one platform video
    Export(ExportArgs),
    /// Render several platforms and pack them into a zip archive
    Batch(BatchArgs),
    /// Run the live pipeline over a track, optionally in real time
    Preview(PreviewArgs),
    /// Dump the offline spectral timeline as JSON
    Analyze(AnalyzeArgs),
}

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Input audio file (WAV, MP3, FLAC, OGG)
    pub input: PathBuf,

    /// Output video file
    #[arg(short, long, default_value = "output.mp4")]
    pub output: PathBuf,

    /// Target platform
    #[arg(short, long, value_enum)]
    pub platform: Option<Platform>,

    #[command(flatten)]
    pub render: RenderArgs,

    #[command(flatten)]
    pub visual: VisualArgs,

    #[command(flatten)]
    pub encoder: EncoderArgs,
}

#[derive(Args, Debug)]
pub struct BatchArgs {
    /// Input audio file (WAV, MP3, FLAC, OGG)
    pub input: PathBuf,

    /// Output zip archive
    #[arg(short, long, default_value = "visualizers.zip")]
    pub output: PathBuf,

    /// Platforms to render (comma-separated); all when omitted
    #[arg(long, value_enum, value_delimiter = ',')]
    pub platforms: Vec<Platform>,

    #[command(flatten)]
    pub render: RenderArgs,

    #[command(flatten)]
    pub visual: VisualArgs,

    #[command(flatten)]
    pub encoder: EncoderArgs,
}

#[derive(Args, Debug)]
pub struct PreviewArgs {
    /// Input audio file (WAV, MP3, FLAC, OGG)
    pub input: PathBuf,

    #[arg(short, long, value_enum)]
    pub platform: Option<Platform>,

    /// Preview resolution
    #[arg(long, value_enum, default_value = "720p")]
    pub resolution: ResolutionTier,

    /// Stop after this many seconds of audio
    #[arg(long)]
    pub seconds: Option<f64>,

    /// Pace ticks to the wall clock instead of running flat out
    #[arg(long)]
    pub realtime: bool,

    /// Write the last drawn frame to this PNG
    #[arg(long)]
    pub snapshot: Option<PathBuf>,

    #[command(flatten)]
    pub visual: VisualArgs,
}

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Input audio file (WAV, MP3, FLAC, OGG)
    pub input: PathBuf,

    /// Output JSON file (stdout when omitted)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Pretty-print the JSON
    #[arg(long)]
    pub pretty: bool,
}

/// Output geometry and timing.
#[derive(Args, Debug, Default)]
pub struct RenderArgs {
    /// Resolution tier
    #[arg(long, value_enum)]
    pub resolution: Option<ResolutionTier>,

    /// Frames per second (24, 30 or 60)
    #[arg(long)]
    pub fps: Option<u32>,

    /// Seconds to render; 0 renders the whole track
    #[arg(short, long)]
    pub duration: Option<f64>,

    /// Intermediate still format
    #[arg(long, value_enum)]
    pub frame_format: Option<FrameFormat>,
}

impl RenderArgs {
    pub fn apply(&self, settings: &mut ExportSettings) {
        if let Some(resolution) = self.resolution {
            settings.resolution = resolution;
        }
        if let Some(fps) = self.fps {
            settings.frame_rate = fps;
        }
        if let Some(duration) = self.duration {
            settings.duration = duration;
        }
        if let Some(format) = self.frame_format {
            settings.frame_format = format;
        }
    }
}

#[derive(Args, Debug, Default)]
pub struct VisualArgs {
    /// Waveform style
    #[arg(short, long, value_enum)]
    pub style: Option<WaveformStyle>,

    /// Primary colour (#RRGGBB)
    #[arg(long)]
    pub primary: Option<Color>,

    /// Secondary colour (#RRGGBB)
    #[arg(long)]
    pub secondary: Option<Color>,

    /// Background colour (#RRGGBB)
    #[arg(long)]
    pub background: Option<Color>,

    /// Number of bars
    #[arg(long)]
    pub bar_count: Option<usize>,

    /// Bar height multiplier
    #[arg(long)]
    pub sensitivity: Option<f32>,

    /// Smoothing decay (0.0-1.0); also sets how long the beat glow lingers
    #[arg(long)]
    pub decay: Option<f32>,

    /// Waveform echo layers (1-4)
    #[arg(long)]
    pub layers: Option<usize>,

    /// Waveform size multiplier
    #[arg(long)]
    pub scale: Option<f32>,

    /// Horizontal offset in percent of frame width
    #[arg(long, allow_hyphen_values = true)]
    pub offset_x: Option<f32>,

    /// Vertical offset in percent of frame height
    #[arg(long, allow_hyphen_values = true)]
    pub offset_y: Option<f32>,

    /// Draw left and right channels side by side
    #[arg(long)]
    pub stereo: bool,

    /// Mirror bars around the waveform centre line
    #[arg(long)]
    pub mirror: bool,

    /// Disable the beat glow halo
    #[arg(long)]
    pub no_glow: bool,

    /// Throw particles on strong beats
    #[arg(long)]
    pub particles: bool,

    /// Disable rotation of the circular style
    #[arg(long)]
    pub no_rotation: bool,

    /// Circular rotation speed (degrees per 60 Hz tick)
    #[arg(long)]
    pub rotation_speed: Option<f32>,

    #[arg(long, value_enum)]
    pub rotation_direction: Option<RotationDirection>,
}

impl VisualArgs {
    pub fn apply(&self, settings: &mut VisualSettings) {
        if let Some(style) = self.style {
            settings.waveform_style = style;
        }
        if let Some(color) = self.primary {
            settings.primary_color = color;
        }
        if let Some(color) = self.secondary {
            settings.secondary_color = color;
        }
        if let Some(color) = self.background {
            settings.background_color = color;
        }
        if let Some(count) = self.bar_count {
            settings.bar_count = count;
        }
        if let Some(sensitivity) = self.sensitivity {
            settings.sensitivity = sensitivity;
        }
        if let Some(decay) = self.decay {
            settings.decay_time = decay;
        }
        if let Some(layers) = self.layers {
            settings.multiple_waveforms = layers;
        }
        if let Some(scale) = self.scale {
            settings.waveform_scale = scale;
        }
        if let Some(x) = self.offset_x {
            settings.waveform_offset_x = x;
        }
        if let Some(y) = self.offset_y {
            settings.waveform_offset_y = y;
        }
        if let Some(speed) = self.rotation_speed {
            settings.rotation_speed = speed;
        }
        if let Some(direction) = self.rotation_direction {
            settings.rotation_direction = direction;
        }
        settings.stereo_mode |= self.stereo;
        settings.mirror |= self.mirror;
        settings.particles |= self.particles;
        if self.no_glow {
            settings.glow = false;
        }
        if self.no_rotation {
            settings.circular_rotation = false;
        }
    }
}

#[derive(Args, Debug, Default)]
pub struct EncoderArgs {
    /// H.264 CRF quality (0-51, lower = better). Ignored when --bitrate is set.
    #[arg(long)]
    pub crf: Option<u32>,

    /// Video bitrate (e.g. 2400k, 5M). When set, uses -b:v instead of -crf.
    #[arg(short, long)]
    pub bitrate: Option<String>,

    /// FFmpeg video codec
    #[arg(long)]
    pub codec: Option<String>,

    /// FFmpeg pixel format
    #[arg(long)]
    pub pix_fmt: Option<String>,
}

impl EncoderArgs {
    pub fn apply(&self, options: &mut EncoderOptions) {
        if let Some(crf) = self.crf {
            options.crf = crf;
        }
        if let Some(ref bitrate) = self.bitrate {
            options.bitrate = Some(bitrate.clone());
        }
        if let Some(ref codec) = self.codec {
            options.codec = codec.clone();
        }
        if let Some(ref pix_fmt) = self.pix_fmt {
            options.pix_fmt = pix_fmt.clone();
        }
    }
}
