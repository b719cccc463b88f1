use clap::{Args, Parser, Subcommand};
use crate::config::{PayloadFormat, MAX_COMPRESSION_LEVEL};
pub use crate::config::Preset;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Encode a directory of image frames into a .txv container
    Encode(EncodeArgs),

    /// Show container information without decoding frames
    Info {
        /// Path to the .txv file
        file: PathBuf,
    },

    /// Check a container's structure
    Validate {
        /// Path to the .txv file
        file: PathBuf,

        /// Also decode every frame
        #[arg(long)]
        full: bool,
    },

    /// Print one decoded frame as text
    Dump {
        /// Path to the .txv file
        file: PathBuf,

        /// Frame index to print
        #[arg(short, long, default_value_t = 0)]
        frame: usize,
    },

    /// Play a container in the terminal
    Play(PlayArgs),

    /// Write a configuration file to start from
    InitConfig {
        /// Where to write the JSON configuration
        output: PathBuf,

        /// Preset to write
        #[arg(short, long, value_enum, default_value_t = Preset::Default)]
        preset: Preset,
    },
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Directory of image frames, played in file name order
    pub input: PathBuf,

    /// Output file (defaults to the input name with a .txv extension)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Frame rate of the clip
    #[arg(short, long, default_value_t = 24.0)]
    pub fps: f64,

    /// Output grid size as WIDTHxHEIGHT, e.g. 120x40
    #[arg(short, long)]
    pub resolution: Option<String>,

    /// Output width in characters; height follows the image aspect
    #[arg(short, long, conflicts_with = "resolution")]
    pub width: Option<u32>,

    /// Tuning preset
    #[arg(short, long, value_enum, default_value_t = Preset::Default)]
    pub preset: Preset,

    /// JSON configuration file (overrides --preset)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Payload compression format
    #[arg(long, value_enum)]
    pub format: Option<PayloadFormat>,

    /// Compression level for the lzma and xz formats (0-9)
    #[arg(long)]
    pub level: Option<u32>,

    /// Only encode the first N frames
    #[arg(long)]
    pub max_frames: Option<usize>,

    /// Draw dark symbols on a light background
    #[arg(long)]
    pub light_background: bool,

    /// Skip the symbol cleanup stages
    #[arg(long)]
    pub no_cleanup: bool,

    /// Brightness adjustment (-1.0 to 1.0)
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    pub brightness: f64,

    /// Contrast adjustment (0.0 to 2.0)
    #[arg(long, default_value_t = 1.0)]
    pub contrast: f64,
}

impl EncodeArgs {
    /// Explicit output path, or `<input name>.txv` in the current directory
    pub fn output_path(&self) -> PathBuf {
        self.output.clone().unwrap_or_else(|| {
            let name = self
                .input
                .file_name()
                .map(Path::new)
                .unwrap_or_else(|| Path::new("clip"));
            name.with_extension(crate::container::FILE_EXTENSION)
        })
    }
}

#[derive(Args, Debug)]
pub struct PlayArgs {
    /// Path to the .txv file
    pub file: PathBuf,

    /// Loop the playback
    #[arg(short, long = "loop")]
    pub loop_playback: bool,

    /// Set playback speed factor
    #[arg(short, long, default_value_t = 1.0)]
    pub speed: f64,

    /// Frame to start from
    #[arg(long, default_value_t = 0)]
    pub start_frame: usize,
}

impl Cli {
    /// Validate command line arguments
    pub fn validate(&self) -> Result<(), String> {
        match &self.command {
            Command::Encode(args) => {
                if !args.input.is_dir() {
                    return Err(format!(
                        "Input directory does not exist: {}",
                        args.input.display()
                    ));
                }
                if !(args.fps.is_finite() && args.fps > 0.0) {
                    return Err("FPS must be greater than 0".to_string());
                }
                if args.width == Some(0) {
                    return Err("Width must be greater than 0".to_string());
                }
                if let Some(level) = args.level {
                    if level > MAX_COMPRESSION_LEVEL {
                        return Err(format!(
                            "Compression level must be between 0 and {}",
                            MAX_COMPRESSION_LEVEL
                        ));
                    }
                }
                if args.max_frames == Some(0) {
                    return Err("Max frames must be greater than 0".to_string());
                }
                if let Some(config) = &args.config {
                    if !config.exists() {
                        return Err(format!(
                            "Configuration file does not exist: {}",
                            config.display()
                        ));
                    }
                }
            }
            Command::Info { file } | Command::Validate { file, .. } | Command::Dump { file, .. } => {
                check_file(file)?;
            }
            Command::Play(args) => {
                check_file(&args.file)?;
                if !(args.speed.is_finite() && args.speed > 0.0) {
                    return Err("Speed factor must be greater than 0".to_string());
                }
            }
            Command::InitConfig { .. } => {}
        }
        Ok(())
    }
}

fn check_file(path: &Path) -> Result<(), String> {
    if path.is_file() {
        Ok(())
    } else {
        Err(format!("File does not exist: {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_encode() {
        let cli = Cli::try_parse_from([
            "ascii-codec",
            "encode",
            "frames",
            "--fps",
            "12",
            "--resolution",
            "80x24",
            "--preset",
            "high-compression",
            "--brightness",
            "-0.2",
        ])
        .unwrap();

        match cli.command {
            Command::Encode(args) => {
                assert_eq!(args.fps, 12.0);
                assert_eq!(args.resolution.as_deref(), Some("80x24"));
                assert_eq!(args.preset, Preset::HighCompression);
                assert_eq!(args.brightness, -0.2);
                assert_eq!(args.output_path(), PathBuf::from("frames.txv"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_resolution_conflicts_with_width() {
        let result = Cli::try_parse_from([
            "ascii-codec",
            "encode",
            "frames",
            "--resolution",
            "80x24",
            "--width",
            "80",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_missing_files() {
        let cli = Cli::try_parse_from(["ascii-codec", "info", "/nonexistent/clip.txv"]).unwrap();
        assert!(cli.validate().is_err());

        let cli = Cli::try_parse_from(["ascii-codec", "encode", "/nonexistent/frames"]).unwrap();
        assert!(cli.validate().is_err());
    }

    #[test]
    fn test_parse_format_and_level() {
        let cli = Cli::try_parse_from([
            "ascii-codec", "encode", "frames", "--format", "xz", "--level", "9",
        ])
        .unwrap();
        match &cli.command {
            Command::Encode(args) => {
                assert_eq!(args.format, Some(PayloadFormat::Xz));
                assert_eq!(args.level, Some(9));
            }
            other => panic!("unexpected command {:?}", other),
        }

        let dir = tempfile::tempdir().unwrap();
        let frames = dir.path().to_str().unwrap();
        let cli = Cli::try_parse_from(["ascii-codec", "encode", frames, "--level", "12"]).unwrap();
        assert!(cli.validate().unwrap_err().contains("Compression level"));
    }

    #[test]
    fn test_play_loop_flag() {
        let cli = Cli::try_parse_from(["ascii-codec", "play", "clip.txv", "--loop", "-s", "2"]).unwrap();
        match cli.command {
            Command::Play(args) => {
                assert!(args.loop_playback);
                assert_eq!(args.speed, 2.0);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
