use ascii_codec::cli::{Cli, Command, EncodeArgs, PlayArgs};
use ascii_codec::container::{self, ContainerInfo, ContainerReader, ValidationMode};
use ascii_codec::renderer::{calculate_frame_delay, Renderer};
use ascii_codec::{
    parse_resolution, utils, CleanupConfig, ClipEncoder, CodecConfig, FrameSource, Polarity,
    SourceConfig,
};

use anyhow::{bail, Context, Result};
use clap::Parser;
use crossterm::event::{self, Event, KeyCode, KeyModifiers};
use log::{debug, error, info};
use std::time::Duration;
use tokio::time::sleep;

/// Application state for playback control
#[derive(Debug, Clone)]
struct PlaybackState {
    paused: bool,
    speed: f64,
    loop_enabled: bool,
    quit_requested: bool,
    show_help: bool,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            paused: false,
            speed: 1.0,
            loop_enabled: false,
            quit_requested: false,
            show_help: false,
        }
    }
}

/// Frame index after seeking `offset` frames, clamped to the clip
fn seek(current: usize, offset: i64, frame_count: usize) -> usize {
    let target = current as i64 + offset;
    target.clamp(0, frame_count.saturating_sub(1) as i64) as usize
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    // Validate CLI arguments
    if let Err(e) = cli.validate() {
        error!("Invalid arguments: {}", e);
        std::process::exit(1);
    }

    match &cli.command {
        Command::Encode(args) => encode(args, cli.verbose),
        Command::Info { file } => {
            let info = ContainerInfo::inspect(file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            println!("Container: {}", file.display());
            println!("{}", info);
            Ok(())
        }
        Command::Validate { file, full } => {
            let mode = if *full {
                ValidationMode::Full
            } else {
                ValidationMode::Quick
            };
            match container::validate(file, mode) {
                Ok(report) => {
                    println!(
                        "{}: valid ({} frames indexed, {} decoded)",
                        file.display(),
                        report.frames_indexed,
                        report.frames_decoded
                    );
                    for warning in &report.warnings {
                        println!("  warning: {}", warning);
                    }
                    Ok(())
                }
                Err(e) if e.is_foreign_format() => {
                    bail!("{} is not a .txv container", file.display())
                }
                Err(e) => Err(e).with_context(|| format!("{} is invalid", file.display())),
            }
        }
        Command::Dump { file, frame } => {
            let mut reader = ContainerReader::open(file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let grid = reader.decode_frame(*frame)?;
            println!("{}", grid);
            Ok(())
        }
        Command::Play(args) => play(args).await,
        Command::InitConfig { output, preset } => {
            CodecConfig::from_preset(*preset).to_json_file(output)?;
            println!("Wrote {:?} configuration to {}", preset, output.display());
            Ok(())
        }
    }
}

fn encode(args: &EncodeArgs, verbose: bool) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => CodecConfig::from_json_file(path)
            .with_context(|| format!("Failed to load configuration {}", path.display()))?,
        None => CodecConfig::from_preset(args.preset),
    };
    if args.light_background {
        config.alphabet.polarity = Polarity::Light;
    }
    if let Some(format) = args.format {
        config.compression.format = format;
    }
    if let Some(level) = args.level {
        config.compression.level = level;
    }
    if args.no_cleanup {
        config.cleanup = CleanupConfig::disabled();
    }
    config.cleanup.verbose |= verbose;

    let (width, height) = match &args.resolution {
        Some(resolution) => {
            let (w, h) = parse_resolution(resolution)?;
            (Some(w), Some(h))
        }
        None => (args.width, None),
    };
    let source_config = SourceConfig {
        width,
        height,
        brightness: args.brightness,
        contrast: args.contrast,
        max_frames: args.max_frames,
        ..Default::default()
    };

    info!("Starting ASCII Codec v{}", env!("CARGO_PKG_VERSION"));
    let source = FrameSource::open(&args.input, source_config)?;
    let frames = source.load_all()?;

    let name = args
        .input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| args.input.display().to_string());
    let encoder = ClipEncoder::new(config)?.with_original_file(name);
    let encoded = encoder.encode(&frames, args.fps)?;

    let output = args.output_path();
    encoded.container.write_file(&output)?;

    if verbose {
        println!("Cleanup:\n{}", encoded.cleanup);
    }
    println!("{}", encoded.statistics);
    println!(
        "Rating:          {}",
        encoded.statistics.rating(&encoder.config().compression)
    );
    println!("Written to {}", output.display());
    Ok(())
}

async fn play(args: &PlayArgs) -> Result<()> {
    if !atty::is(atty::Stream::Stdout) {
        bail!("play needs an interactive terminal");
    }

    let mut reader = ContainerReader::open(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let metadata = reader.metadata().clone();
    let frame_count = reader.frame_count();
    if frame_count == 0 {
        bail!("{} contains no frames", args.file.display());
    }

    let filename = args
        .file
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("unknown")
        .to_string();

    info!(
        "Playing {}: {}x{}, {:.2} FPS, {} frames",
        filename, metadata.width, metadata.height, metadata.fps, frame_count
    );

    let mut state = PlaybackState {
        speed: args.speed,
        loop_enabled: args.loop_playback,
        ..Default::default()
    };

    let mut renderer = Renderer::new()?;
    renderer.init()?;

    // Seek distance for the arrow keys: one second of frames
    let seek_step = metadata.fps.round().max(1.0) as i64;
    let mut position = args.start_frame.min(frame_count - 1);

    loop {
        // Handle input events
        if event::poll(Duration::from_millis(1))? {
            match event::read()? {
                Event::Key(key_event) => match key_event.code {
                    KeyCode::Char('q') | KeyCode::Esc => {
                        info!("Quit requested by user");
                        state.quit_requested = true;
                    }
                    KeyCode::Char('c') if key_event.modifiers.contains(KeyModifiers::CONTROL) => {
                        info!("Ctrl+C pressed, exiting");
                        state.quit_requested = true;
                    }
                    KeyCode::Char(' ') => {
                        state.paused = !state.paused;
                        info!("Playback {}", if state.paused { "paused" } else { "resumed" });
                    }
                    KeyCode::Char('+') | KeyCode::Char('=') => {
                        state.speed = (state.speed * 1.25).min(4.0);
                        info!("Speed increased to {:.2}x", state.speed);
                    }
                    KeyCode::Char('-') => {
                        state.speed = (state.speed / 1.25).max(0.25);
                        info!("Speed decreased to {:.2}x", state.speed);
                    }
                    KeyCode::Char('l') => {
                        state.loop_enabled = !state.loop_enabled;
                        info!("Loop {}", if state.loop_enabled { "enabled" } else { "disabled" });
                    }
                    KeyCode::Char('h') => {
                        state.show_help = !state.show_help;
                    }
                    KeyCode::Char('r') => {
                        info!("Restarting from the first frame");
                        position = 0;
                    }
                    KeyCode::Left => position = seek(position, -seek_step, frame_count),
                    KeyCode::Right => position = seek(position, seek_step, frame_count),
                    _ => {}
                },
                Event::Resize(width, height) => {
                    debug!("Terminal resized to {}x{}", width, height);
                    renderer.update_dimensions()?;
                }
                _ => {}
            }
        }

        if state.quit_requested {
            break;
        }

        // Show help if requested
        if state.show_help {
            let help_text = r#"ASCII Codec Player Controls:

SPACE  - Pause/Resume
Q/ESC  - Quit
+/=    - Increase speed
-      - Decrease speed
<-/->  - Seek one second
L      - Toggle loop
R      - Restart
H      - Toggle this help

Press H again to hide this help."#;

            renderer.display_message(help_text)?;
            sleep(Duration::from_millis(50)).await;
            continue;
        }

        // Skip frame processing if paused
        if state.paused {
            sleep(Duration::from_millis(50)).await;
            continue;
        }

        if position >= frame_count {
            if state.loop_enabled {
                info!("Clip ended, restarting loop");
                position = 0;
            } else {
                info!("Playback completed");
                break;
            }
        }

        let grid = reader.decode_frame(position)?;
        let timestamp = reader.timestamp(position)?;
        let status = format!(
            "{} | Frame: {}/{} | Time: {}/{} | Speed: {:.2}x",
            filename,
            position + 1,
            frame_count,
            utils::format_duration(timestamp),
            utils::format_duration(metadata.duration_seconds),
            state.speed
        );
        renderer.render_grid_with_status(&grid, &status)?;

        position += 1;
        sleep(calculate_frame_delay(metadata.fps, state.speed)).await;
    }

    // Cleanup
    renderer.cleanup()?;
    info!("Playback finished at frame {}", position);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_playback_state_default() {
        let state = PlaybackState::default();
        assert!(!state.paused);
        assert_eq!(state.speed, 1.0);
        assert!(!state.loop_enabled);
        assert!(!state.quit_requested);
        assert!(!state.show_help);
    }

    #[test]
    fn test_seek_clamps_to_clip() {
        assert_eq!(seek(10, 24, 100), 34);
        assert_eq!(seek(10, -24, 100), 0);
        assert_eq!(seek(90, 24, 100), 99);
    }
}
