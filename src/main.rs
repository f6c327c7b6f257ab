use std::env;
use std::fs;

use anyhow::{anyhow, Context, Result};

use shader_playground::{run_headless, DemoConfig, HeadlessOptions};

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {}

fn run() -> Result<()> {
    let options = CliOptions::parse()?;
    let xml = fs::read_to_string(&options.path)
        .with_context(|| format!("failed to read manifest {}", options.path))?;
    let config = DemoConfig::from_xml(&xml).context("failed to parse demo manifest")?;

    println!(
        "Loaded demo {} ({} uniform(s), {:?} mode)",
        config.name,
        config.uniforms.len(),
        config.mode
    );
    if !options.summary_only {
        for uniform in &config.uniforms {
            println!(" - {} = {:?}", uniform.name, uniform.value);
        }
    }

    let summary = run_headless(
        config,
        &HeadlessOptions {
            frames: options.frames,
            device_pixel_ratio: options.device_pixel_ratio,
            ..HeadlessOptions::default()
        },
    )?;
    println!("{summary}");
    Ok(())
}

const USAGE: &str =
    "Usage: shader-playground <demo.xml> [--frames N] [--device-pixel-ratio X] [--summary-only]";

struct CliOptions {
    path: String,
    frames: u32,
    device_pixel_ratio: f32,
    summary_only: bool,
}

impl CliOptions {
    fn parse() -> Result<Self> {
        let mut args = env::args().skip(1);
        let Some(path) = args.next() else {
            return Err(anyhow!(USAGE));
        };
        let mut frames = 1;
        let mut device_pixel_ratio = 1.0;
        let mut summary_only = false;
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--frames" => {
                    let value = args.next().ok_or_else(|| anyhow!("--frames needs a value"))?;
                    frames = value
                        .parse()
                        .with_context(|| format!("invalid frame count {value:?}"))?;
                }
                "--device-pixel-ratio" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow!("--device-pixel-ratio needs a value"))?;
                    device_pixel_ratio = value
                        .parse()
                        .with_context(|| format!("invalid device pixel ratio {value:?}"))?;
                }
                "--summary-only" => summary_only = true,
                other => {
                    return Err(anyhow!("Unknown argument: {other}. {USAGE}"));
                }
            }
        }
        Ok(Self {
            path,
            frames,
            device_pixel_ratio,
            summary_only,
        })
    }
}
