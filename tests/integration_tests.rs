use ascii_codec::prelude::*;
use assert_cmd::Command;
use image::{GrayImage, Luma};
use predicates::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::{tempdir, TempDir};

/// Helper function to write a short gradient clip as PNG frames
fn create_test_frames(count: usize) -> TempDir {
    let dir = tempdir().unwrap();
    for t in 0..count {
        let image = GrayImage::from_fn(64, 40, |x, y| {
            let value = (x * 4 + y + t as u32 * 8) % 256;
            Luma([value as u8])
        });
        image
            .save(dir.path().join(format!("frame_{:04}.png", t)))
            .unwrap();
    }
    dir
}

/// Encode `frames` into `out` through the binary
fn encode_clip(frames: &Path, out: &Path) {
    Command::cargo_bin("ascii-codec")
        .unwrap()
        .arg("encode")
        .arg(frames)
        .arg("-o")
        .arg(out)
        .args(["--resolution", "32x10", "--fps", "10"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Written to"));
}

fn encoded_clip() -> (TempDir, PathBuf) {
    let frames = create_test_frames(6);
    let out_dir = tempdir().unwrap();
    let out = out_dir.path().join("clip.txv");
    encode_clip(frames.path(), &out);
    (out_dir, out)
}

#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("ascii-codec").unwrap();
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("ASCII video codec"));
}

#[test]
fn test_cli_version() {
    let mut cmd = Command::cargo_bin("ascii-codec").unwrap();
    cmd.arg("--version");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_cli_missing_file() {
    let mut cmd = Command::cargo_bin("ascii-codec").unwrap();
    cmd.args(["info", "nonexistent.txv"]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn test_cli_invalid_speed() {
    let (_dir, clip) = encoded_clip();

    let mut cmd = Command::cargo_bin("ascii-codec").unwrap();
    cmd.arg("play").arg(&clip).args(["--speed", "0"]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Speed factor must be greater than 0"));
}

#[test]
fn test_encode_validate_info_dump() {
    let (_dir, clip) = encoded_clip();
    assert!(clip.exists());

    Command::cargo_bin("ascii-codec")
        .unwrap()
        .arg("validate")
        .arg(&clip)
        .arg("--full")
        .assert()
        .success()
        .stdout(predicate::str::contains("valid (6 frames indexed, 6 decoded)"));

    Command::cargo_bin("ascii-codec")
        .unwrap()
        .arg("info")
        .arg(&clip)
        .assert()
        .success()
        .stdout(predicate::str::contains("32x10"))
        .stdout(predicate::str::contains("rle-lz4"));

    let output = Command::cargo_bin("ascii-codec")
        .unwrap()
        .arg("dump")
        .arg(&clip)
        .args(["--frame", "5"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let text = String::from_utf8(output.stdout).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 10);
    assert!(lines.iter().all(|l| l.chars().count() == 32));
}

#[test]
fn test_dump_out_of_range() {
    let (_dir, clip) = encoded_clip();

    Command::cargo_bin("ascii-codec")
        .unwrap()
        .arg("dump")
        .arg(&clip)
        .args(["--frame", "99"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Frame 99 not found"));
}

#[test]
fn test_invalid_resolution() {
    let frames = create_test_frames(2);
    let out = frames.path().join("out.txv");

    Command::cargo_bin("ascii-codec")
        .unwrap()
        .arg("encode")
        .arg(frames.path())
        .arg("-o")
        .arg(&out)
        .args(["--resolution", "32by10"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid resolution"));
    assert!(!out.exists());
}

#[test]
fn test_empty_input_directory() {
    let frames = tempdir().unwrap();
    let out_dir = tempdir().unwrap();

    Command::cargo_bin("ascii-codec")
        .unwrap()
        .arg("encode")
        .arg(frames.path())
        .arg("-o")
        .arg(out_dir.path().join("out.txv"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("no image frames"));
}

#[test]
fn test_validate_rejects_damage() {
    let (dir, clip) = encoded_clip();
    let bytes = std::fs::read(&clip).unwrap();

    let foreign = dir.path().join("foreign.txv");
    let mut flipped = bytes.clone();
    flipped[0] ^= 0xFF;
    std::fs::write(&foreign, &flipped).unwrap();
    Command::cargo_bin("ascii-codec")
        .unwrap()
        .arg("validate")
        .arg(&foreign)
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a .txv container"));

    let future = dir.path().join("future.txv");
    let mut bumped = bytes.clone();
    bumped[8..12].copy_from_slice(&2u32.to_le_bytes());
    std::fs::write(&future, &bumped).unwrap();
    Command::cargo_bin("ascii-codec")
        .unwrap()
        .arg("validate")
        .arg(&future)
        .assert()
        .failure()
        .stderr(predicate::str::contains("unsupported format version 2"));

    let truncated = dir.path().join("truncated.txv");
    std::fs::write(&truncated, &bytes[..bytes.len() - 10]).unwrap();
    Command::cargo_bin("ascii-codec")
        .unwrap()
        .arg("validate")
        .arg(&truncated)
        .assert()
        .failure()
        .stderr(predicate::str::contains("truncated"));

    // validation never rewrites what it reads
    assert_eq!(std::fs::read(&truncated).unwrap(), &bytes[..bytes.len() - 10]);
}

#[test]
fn test_init_config_then_encode_with_it() {
    let frames = create_test_frames(3);
    let work = tempdir().unwrap();
    let config = work.path().join("codec.json");
    let out = work.path().join("clip.txv");

    Command::cargo_bin("ascii-codec")
        .unwrap()
        .arg("init-config")
        .arg(&config)
        .args(["--preset", "high-compression"])
        .assert()
        .success();

    let loaded = CodecConfig::from_json_file(&config).unwrap();
    assert_eq!(loaded, CodecConfig::from_preset(ascii_codec::Preset::HighCompression));

    Command::cargo_bin("ascii-codec")
        .unwrap()
        .arg("encode")
        .arg(frames.path())
        .arg("-o")
        .arg(&out)
        .arg("--config")
        .arg(&config)
        .args(["--width", "40", "--light-background"])
        .assert()
        .success();

    let container = Container::read_file(&out).unwrap();
    assert_eq!(container.width(), 40);
    assert_eq!(container.frame_count(), 3);
    assert_eq!(container.metadata().alphabet.as_deref(), Some("@%#*+=-:. "));
}

#[test]
fn test_encode_with_lzma_level() {
    let frames = create_test_frames(4);
    let work = tempdir().unwrap();
    let out = work.path().join("clip.txv");

    Command::cargo_bin("ascii-codec")
        .unwrap()
        .arg("encode")
        .arg(frames.path())
        .arg("-o")
        .arg(&out)
        .args(["--resolution", "32x10", "--format", "lzma", "--level", "9"])
        .assert()
        .success();

    Command::cargo_bin("ascii-codec")
        .unwrap()
        .arg("validate")
        .arg(&out)
        .arg("--full")
        .assert()
        .success()
        .stdout(predicate::str::contains("valid (4 frames indexed, 4 decoded)"));

    let container = Container::read_file(&out).unwrap();
    assert_eq!(container.metadata().compression_algorithm, "rle-lzma");
}

mod library_tests {
    use super::*;
    use std::io::Cursor;

    fn synthetic_frames() -> Vec<IntensityFrame> {
        (0..8)
            .map(|t| {
                let data = (0..48 * 16)
                    .map(|i| {
                        let (x, y) = (i % 48, i / 48);
                        if (x + t) % 16 < 8 && y > 3 {
                            220
                        } else {
                            30
                        }
                    })
                    .collect();
                IntensityFrame::new(48, 16, data).unwrap()
            })
            .collect()
    }

    #[test]
    fn test_container_roundtrip() {
        let encoder = ClipEncoder::new(CodecConfig::default()).unwrap();
        let encoded = encoder.encode(&synthetic_frames(), 12.5).unwrap();
        let expected = encoded.container.decode_all().unwrap();

        let dir = tempdir().unwrap();
        let path = dir.path().join("clip.txv");
        encoded.container.write_file(&path).unwrap();

        let read = Container::read_file(&path).unwrap();
        assert_eq!(read.frame_count(), 8);
        assert_eq!(read.width(), 48);
        assert_eq!(read.height(), 16);
        assert!((read.metadata().fps - 12.5).abs() < 1e-6);
        assert_eq!(read.decode_all().unwrap(), expected);

        let mut reader = ContainerReader::open(&path).unwrap();
        for index in (0..8).rev() {
            assert_eq!(reader.decode_frame(index).unwrap(), expected[index]);
        }
    }

    #[test]
    fn test_blocky_clip_compresses_well() {
        let encoder = ClipEncoder::new(CodecConfig::default()).unwrap();
        let encoded = encoder.encode(&synthetic_frames(), 24.0).unwrap();
        assert!(
            encoded.statistics.overall_ratio > 5.0,
            "ratio {}",
            encoded.statistics.overall_ratio
        );
    }

    #[test]
    fn test_in_memory_container_rejects_trailing_garbage() {
        let encoder = ClipEncoder::new(CodecConfig::default()).unwrap();
        let encoded = encoder.encode(&synthetic_frames(), 24.0).unwrap();
        let mut bytes = Vec::new();
        encoded.container.write_to(&mut bytes).unwrap();
        bytes.extend_from_slice(b"junk");

        let err = Container::read_from(&mut Cursor::new(&bytes)).unwrap_err();
        assert!(err.is_damaged_container());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0.0), "0:00");
        assert_eq!(format_duration(30.0), "0:30");
        assert_eq!(format_duration(90.0), "1:30");
        assert_eq!(format_duration(3661.0), "1:01:01");
    }

    #[test]
    fn test_ratio() {
        assert_eq!(ratio(100, 0), 0.0);
        assert_eq!(ratio(100, 10), 10.0);
    }
}
