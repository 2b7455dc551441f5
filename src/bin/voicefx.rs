//! Runs a mono 16-bit WAV file through a voice pipeline, frame by frame.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use voicefx::{
    pcm, PipelineConfig, PitchMode, RuntimeStatsHandle, SourceId, VoiceParams, VoicePipeline,
    SAMPLE_RATE,
};

#[derive(Parser, Debug)]
#[command(name = "voicefx")]
#[command(about = "Apply voice effects to a mono 16-bit WAV file")]
#[command(version)]
struct Args {
    /// Input WAV (mono, 16-bit PCM)
    input: PathBuf,

    /// Output WAV
    output: PathBuf,

    /// Linear gain
    #[arg(long, default_value_t = 1.0)]
    volume: f32,

    /// Pitch shift in semitones (or -10..10 with --linear-pitch)
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    pitch: f32,

    /// Playback speed ratio
    #[arg(long, default_value_t = 1.0)]
    speed: f32,

    /// Enable reverb
    #[arg(long)]
    reverb: bool,

    #[arg(long, default_value_t = 0.7)]
    room_size: f32,

    #[arg(long, default_value_t = 0.3)]
    wet_mix: f32,

    /// Frame length in milliseconds
    #[arg(long, default_value_t = 20)]
    frame_ms: u32,

    /// Interpret --pitch as the legacy linear varispeed parameter
    #[arg(long)]
    linear_pitch: bool,

    /// Pipeline configuration file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "voicefx=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            PipelineConfig::from_toml_str(&text)?
        }
        None => PipelineConfig::default(),
    };
    if args.linear_pitch {
        config.pitch_mode = PitchMode::Linear;
    }

    let mut reader = hound::WavReader::open(&args.input)
        .with_context(|| format!("Failed to open {}", args.input.display()))?;
    let spec = reader.spec();
    if spec.channels != 1
        || spec.bits_per_sample != 16
        || spec.sample_format != hound::SampleFormat::Int
    {
        bail!(
            "Expected mono 16-bit PCM, got {} channel(s) at {} bits",
            spec.channels,
            spec.bits_per_sample
        );
    }
    if spec.sample_rate != SAMPLE_RATE {
        warn!("Input is {} Hz; processing as {} Hz", spec.sample_rate, SAMPLE_RATE);
    }

    let samples = reader
        .samples::<i16>()
        .collect::<std::result::Result<Vec<_>, _>>()
        .context("Failed to read samples")?;

    let params = VoiceParams {
        volume: args.volume,
        pitch: args.pitch,
        speed: args.speed,
        reverb_enabled: args.reverb,
        room_size: args.room_size,
        wet_mix: args.wet_mix,
    };
    let frame_len = (SAMPLE_RATE / 1000 * args.frame_ms.max(1)) as usize;
    info!(
        frames = samples.len().div_ceil(frame_len),
        frame_len,
        ?params,
        mode = ?config.pitch_mode,
        "Processing {}",
        args.input.display()
    );

    let stats = RuntimeStatsHandle::new();
    let mut pipeline = VoicePipeline::new(SourceId(0), config, stats.clone());
    let mut writer = hound::WavWriter::create(&args.output, spec)
        .with_context(|| format!("Failed to create {}", args.output.display()))?;

    let mut loudness_sum = 0.0;
    let mut loudness_peak = 0.0_f64;
    let mut frames = 0_u64;
    for chunk in samples.chunks(frame_len) {
        let out = pipeline.process_frame_with_policy(&pcm::i16_to_bytes(chunk), &params)?;
        for sample in pcm::bytes_to_i16(&out.bytes) {
            writer.write_sample(sample)?;
        }
        let score = voicefx::loudness::normalize_score(out.loudness);
        loudness_sum += score;
        loudness_peak = loudness_peak.max(score);
        frames += 1;
    }
    writer.finalize().context("Failed to finalize output")?;

    let snap = stats.snapshot();
    info!(
        mean_loudness = if frames > 0 { loudness_sum / frames as f64 } else { 0.0 },
        peak_loudness = loudness_peak,
        avg_frame_ms = snap.total_frame.avg_ms(),
        max_frame_ms = snap.total_frame.max_ms(),
        passed_through = snap.frames_passed_through,
        "Wrote {}",
        args.output.display()
    );

    Ok(())
}
