//! spuverb - offline renderer for the SPU reverb.
//!
//! Decodes an audio file, runs it through one effect instance block by
//! block, and writes the result as a 16-bit stereo WAV.

mod loader;

use std::path::PathBuf;

use anyhow::{bail, Context};
use spuverb_fx::EffectInstance;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Frames per processing block handed to the effect.
const BLOCK_FRAMES: usize = 4096;

struct Args {
    input: PathBuf,
    output: PathBuf,
    params: Vec<(String, String)>,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut input = None;
    let mut output = None;
    let mut params = Vec::new();

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--preset" | "--decay" | "--mix" | "--input-gain" | "--reverb-level" => {
                let key = arg.trim_start_matches("--").replace('-', "_");
                let value = args
                    .next()
                    .with_context(|| format!("{arg} needs a value"))?;
                params.push((key, value));
            }
            "--help" | "-h" => {
                bail!(
                    "usage: spuverb [--preset 0..5] [--decay X] [--mix X] \
                     [--input-gain X] [--reverb-level X] <input> <output.wav>"
                );
            }
            _ if input.is_none() => input = Some(PathBuf::from(arg)),
            _ if output.is_none() => output = Some(PathBuf::from(arg)),
            _ => bail!("unexpected argument: {arg}"),
        }
    }

    Ok(Args {
        input: input.context("missing input file (try --help)")?,
        output: output.context("missing output file (try --help)")?,
        params,
    })
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = parse_args()?;

    let mut samples = loader::load_stereo(&args.input)
        .with_context(|| format!("failed to load {}", args.input.display()))?;
    info!(
        frames = samples.len() / 2,
        input = %args.input.display(),
        "decoded input"
    );

    let mut fx = EffectInstance::new();
    for (key, value) in &args.params {
        fx.set_param(key, value);
    }
    info!(
        preset = %fx.get_param("preset_name").unwrap_or_default(),
        "rendering"
    );

    for block in samples.chunks_mut(BLOCK_FRAMES * 2) {
        fx.process_block(block);
    }

    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: loader::ENGINE_SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&args.output, spec)
        .with_context(|| format!("failed to create {}", args.output.display()))?;
    for &sample in &samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;

    info!(output = %args.output.display(), "done");
    Ok(())
}
