// src/engine/frames.rs
//
// Video as a sequence of still frames.
// An external tool splits a video into numbered JPEG frames and joins them
// back; in between, frames are corrupted in contiguous groups like a batch.

use crate::engine::config::CorruptionConfig;
use crate::engine::io::{ensure_dir, Source};
use crate::engine::pool;
use crate::engine::tasks::{assign_groups, CorruptTask};
use crate::error::CrungeError;
use crate::ops::AlgorithmSpec;
use rayon::prelude::*;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

type FrameResult<T> = std::result::Result<T, CrungeError>;

pub const FRAME_PREFIX: &str = "frame";
pub const FRAME_EXTENSION: &str = "jpg";
const FRAMES_DIR_SUFFIX: &str = "__frames";
const CORRUPTED_DIR_SUFFIX: &str = "__corrupted";

/// Splits videos into frames and joins frames into videos.
pub trait FrameTool: Send + Sync {
    /// Write the frames of `video` into `dir` at `fps` frames per second.
    fn extract(&self, video: &Path, dir: &Path, fps: u32) -> FrameResult<()>;

    /// Join the numbered frames in `dir` into `output` at `fps`.
    fn assemble(&self, dir: &Path, fps: u32, output: &Path) -> FrameResult<()>;
}

/// `ffmpeg` on the PATH (or at an explicit location).
#[derive(Clone, Debug)]
pub struct Ffmpeg {
    pub binary: PathBuf,
}

impl Default for Ffmpeg {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("ffmpeg"),
        }
    }
}

impl Ffmpeg {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn base_command(&self) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.args(["-hide_banner", "-loglevel", "error", "-y"]);
        cmd
    }

    pub fn extract_command(&self, video: &Path, dir: &Path, fps: u32) -> Command {
        let mut cmd = self.base_command();
        cmd.arg("-i")
            .arg(video)
            .arg("-vf")
            .arg(format!("fps={fps}"))
            .args(["-q:v", "2"])
            .arg(dir.join(frame_pattern(5)));
        cmd
    }

    /// Frames are expected as written by [`corrupt_frames`]: zero padded to a
    /// common width, numbered from 0.
    pub fn assemble_command(&self, dir: &Path, width: usize, fps: u32, output: &Path) -> Command {
        let mut cmd = self.base_command();
        cmd.arg("-framerate")
            .arg(fps.to_string())
            .arg("-i")
            .arg(dir.join(frame_pattern(width)))
            .args(["-c:v", "libx264", "-pix_fmt", "yuv420p"])
            .arg(output);
        cmd
    }

    fn run(&self, mut cmd: Command) -> FrameResult<()> {
        let tool = self.binary.display().to_string();
        info!(target: "crunge::frames", command = ?cmd, "running frame tool");
        let output = cmd.output().map_err(|e| {
            CrungeError::external_tool_failed(tool.clone(), format!("failed to start: {e}"))
        })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CrungeError::external_tool_failed(
                tool,
                format!("{}: {}", output.status, stderr.trim()),
            ));
        }
        Ok(())
    }
}

impl FrameTool for Ffmpeg {
    fn extract(&self, video: &Path, dir: &Path, fps: u32) -> FrameResult<()> {
        ensure_dir(dir)?;
        self.run(self.extract_command(video, dir, fps))
    }

    fn assemble(&self, dir: &Path, fps: u32, output: &Path) -> FrameResult<()> {
        let frames = list_frames(dir, FRAME_EXTENSION)?;
        let width = index_width(frames.len().saturating_sub(1));
        self.run(self.assemble_command(dir, width, fps, output))
    }
}

fn index_width(max_index: usize) -> usize {
    max_index.to_string().len()
}

/// printf-style pattern understood by the frame tool.
fn frame_pattern(width: usize) -> String {
    format!("{FRAME_PREFIX}%0{width}d.{FRAME_EXTENSION}")
}

/// `frame<index>.<ext>`, zero padded to the width of `max_index`.
pub fn frame_file_name(index: usize, max_index: usize, ext: &str) -> String {
    let width = index_width(max_index.max(index));
    format!("{FRAME_PREFIX}{index:0width$}.{ext}")
}

/// Trailing frame number of a file called `<non-digits><digits>.<ext>`.
fn frame_index(path: &Path, ext: &str) -> Option<u64> {
    let name = path.file_name()?.to_str()?;
    let stem = name.strip_suffix(ext)?.strip_suffix('.')?;
    let prefix = stem.trim_end_matches(|c: char| c.is_ascii_digit());
    let digits = &stem[prefix.len()..];
    if digits.is_empty() || prefix.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Frame files in `dir`, sorted by frame number.
pub fn list_frames(dir: &Path, ext: &str) -> FrameResult<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| CrungeError::file_read_failed(dir.display().to_string(), e))?;

    let mut frames = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| CrungeError::file_read_failed(dir.display().to_string(), e))?;
        let path = entry.path();
        if let Some(index) = frame_index(&path, ext) {
            frames.push((index, path));
        }
    }
    frames.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
    Ok(frames.into_iter().map(|(_, path)| path).collect())
}

/// `<dir>/<stem><suffix>` next to `video`.
fn sibling_dir(video: &Path, suffix: &str) -> FrameResult<PathBuf> {
    let stem = video.file_stem().ok_or_else(|| {
        CrungeError::invalid_argument("video", video.display().to_string(), "no file name")
    })?;
    let mut name = OsString::from(stem);
    name.push(suffix);
    Ok(video.parent().unwrap_or_else(|| Path::new("")).join(name))
}

/// Where extracted frames of `video` go.
pub fn frame_directory(video: &Path) -> FrameResult<PathBuf> {
    sibling_dir(video, FRAMES_DIR_SUFFIX)
}

/// Corrupt `frames` into `out_dir`, one algorithm per contiguous group.
///
/// Output files are renumbered from 0 with [`frame_file_name`]. Any failing
/// frame fails the whole run, since a video with holes cannot be assembled.
pub fn corrupt_frames(
    frames: &[PathBuf],
    out_dir: &Path,
    chain: &[AlgorithmSpec],
    config: &CorruptionConfig,
) -> FrameResult<Vec<PathBuf>> {
    if chain.is_empty() {
        return Err(CrungeError::empty_chain());
    }
    ensure_dir(out_dir)?;

    let groups = assign_groups(frames.len(), chain.len());
    let max_index = frames.len().saturating_sub(1);

    let process_one =
        |(index, (frame, group)): (usize, (&PathBuf, &usize))| -> FrameResult<PathBuf> {
            let output = out_dir.join(frame_file_name(index, max_index, FRAME_EXTENSION));
            let mut config = config.clone();
            config.seed = config.seed.map(|s| s.wrapping_add(index as u64));
            CorruptTask::new(Source::open_mapped(frame)?, vec![chain[*group].clone()])
                .with_config(config)
                .write_to(&output)?;
            debug!(
                target: "crunge::frames",
                frame = %frame.display(),
                algorithm = chain[*group].name(),
                "frame corrupted"
            );
            Ok(output)
        };

    let jobs: Vec<_> = frames.iter().zip(groups.iter()).enumerate().collect();
    match pool::get_pool() {
        Some(pool) => pool.install(|| jobs.into_par_iter().map(process_one).collect()),
        None => jobs.into_iter().map(process_one).collect(),
    }
}

/// Extract, corrupt and reassemble a video.
pub fn corrupt_video(
    tool: &dyn FrameTool,
    video: &Path,
    output: &Path,
    fps: u32,
    chain: &[AlgorithmSpec],
    config: &CorruptionConfig,
) -> FrameResult<()> {
    if fps == 0 {
        return Err(CrungeError::invalid_argument("fps", "0", "frame rate must be at least 1"));
    }
    let frames_dir = frame_directory(video)?;
    let corrupted_dir = sibling_dir(video, CORRUPTED_DIR_SUFFIX)?;

    info!(
        target: "crunge::frames",
        video = %video.display(),
        dir = %frames_dir.display(),
        "extracting frames"
    );
    tool.extract(video, &frames_dir, fps)?;

    let frames = list_frames(&frames_dir, FRAME_EXTENSION)?;
    info!(target: "crunge::frames", frames = frames.len(), "corrupting frames");
    corrupt_frames(&frames, &corrupted_dir, chain, config)?;

    info!(target: "crunge::frames", output = %output.display(), "assembling video");
    tool.assemble(&corrupted_dir, fps, output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::parse_chain;
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn minimal_jpeg(fill: u8) -> Vec<u8> {
        let mut data = vec![0xFF, 0xD8, 0xFF, 0xDA];
        data.extend((0..19u8).map(|i| i + 1));
        data.extend_from_slice(&[fill; 16]);
        data.extend_from_slice(&[0xFF, 0xD9]);
        data
    }

    #[test]
    fn frame_names_pad_to_largest_index() {
        assert_eq!(frame_file_name(3, 9, "jpg"), "frame3.jpg");
        assert_eq!(frame_file_name(3, 10, "jpg"), "frame03.jpg");
        assert_eq!(frame_file_name(42, 1200, "bmp"), "frame0042.bmp");
        assert_eq!(frame_file_name(0, 0, "jpg"), "frame0.jpg");
    }

    #[test]
    fn frame_index_needs_digits_before_extension() {
        assert_eq!(frame_index(Path::new("frame00012.jpg"), "jpg"), Some(12));
        assert_eq!(frame_index(Path::new("/x/shot_7.jpg"), "jpg"), Some(7));
        assert_eq!(frame_index(Path::new("frame.jpg"), "jpg"), None);
        assert_eq!(frame_index(Path::new("frame12.png"), "jpg"), None);
        assert_eq!(frame_index(Path::new("f2rame12.jpg"), "jpg"), None);
        assert_eq!(frame_index(Path::new("frame12xjpg"), "jpg"), None);
    }

    #[test]
    fn list_frames_sorts_numerically() {
        let dir = TempDir::new().unwrap();
        for name in ["frame10.jpg", "frame2.jpg", "frame1.jpg", "notes.txt", "cover.jpg"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        let names: Vec<String> = list_frames(dir.path(), "jpg")
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["frame1.jpg", "frame2.jpg", "frame10.jpg"]);
    }

    #[test]
    fn frame_directory_sits_next_to_video() {
        assert_eq!(
            frame_directory(Path::new("/videos/clip.mp4")).unwrap(),
            PathBuf::from("/videos/clip__frames")
        );
    }

    #[test]
    fn ffmpeg_commands() {
        let ffmpeg = Ffmpeg::default();
        let cmd = ffmpeg.extract_command(Path::new("in.mp4"), Path::new("frames"), 24);
        let args: Vec<String> = cmd.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert!(args.contains(&"fps=24".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("frames/frame%05d.jpg"));

        let cmd = ffmpeg.assemble_command(Path::new("out"), 3, 30, Path::new("out.mp4"));
        let args: Vec<String> = cmd.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert!(args.contains(&"out/frame%03d.jpg".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("out.mp4"));
    }

    #[test]
    fn missing_tool_is_a_codec_error() {
        let dir = TempDir::new().unwrap();
        let tool = Ffmpeg::new(dir.path().join("no-such-ffmpeg"));
        let err = tool
            .extract(Path::new("in.mp4"), &dir.path().join("frames"), 1)
            .unwrap_err();
        assert!(matches!(err, CrungeError::ExternalToolFailed { .. }));
    }

    #[test]
    fn corrupt_frames_groups_and_renumbers() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        std::fs::create_dir(&src).unwrap();
        let frames: Vec<PathBuf> = (1..=11)
            .map(|i| {
                let p = src.join(format!("frame{i:05}.jpg"));
                std::fs::write(&p, minimal_jpeg(100)).unwrap();
                p
            })
            .collect();

        let out = dir.path().join("out");
        let chain = parse_chain("less_noise, first_n_bytes 0 1").unwrap();
        let config = CorruptionConfig::default().with_seed(8);
        let written = corrupt_frames(&frames, &out, &chain, &config).unwrap();

        assert_eq!(written.len(), 11);
        assert_eq!(written[0], out.join("frame00.jpg"));
        assert_eq!(written[10], out.join("frame10.jpg"));
        // first five frames get less_noise, the remaining six pass through
        let original = minimal_jpeg(100);
        for (i, path) in written.iter().enumerate() {
            let bytes = std::fs::read(path).unwrap();
            assert_eq!(bytes.len(), original.len());
            if i < 5 {
                assert!(bytes[23..39].iter().all(|b| (100..=109).contains(b)));
            } else {
                assert_eq!(bytes, original);
            }
        }
    }

    /// Writes fake frames instead of calling a real tool.
    struct FakeTool {
        assembled: Mutex<Option<(PathBuf, usize)>>,
    }

    impl FrameTool for FakeTool {
        fn extract(&self, _video: &Path, dir: &Path, _fps: u32) -> FrameResult<()> {
            ensure_dir(dir)?;
            for i in 1..=4 {
                std::fs::write(dir.join(format!("frame{i:05}.jpg")), minimal_jpeg(50)).unwrap();
            }
            Ok(())
        }

        fn assemble(&self, dir: &Path, _fps: u32, _output: &Path) -> FrameResult<()> {
            let count = list_frames(dir, FRAME_EXTENSION)?.len();
            *self.assembled.lock().unwrap() = Some((dir.to_path_buf(), count));
            Ok(())
        }
    }

    #[test]
    fn corrupt_video_round_trip_with_fake_tool() {
        let dir = TempDir::new().unwrap();
        let video = dir.path().join("clip.mp4");
        let tool = FakeTool {
            assembled: Mutex::new(None),
        };
        corrupt_video(
            &tool,
            &video,
            &dir.path().join("clip.out.mp4"),
            12,
            &parse_chain("noise").unwrap(),
            &CorruptionConfig::default(),
        )
        .unwrap();

        let (assembled_dir, count) = tool.assembled.lock().unwrap().clone().unwrap();
        assert_eq!(assembled_dir, dir.path().join("clip__corrupted"));
        assert_eq!(count, 4);
    }

    #[test]
    fn zero_fps_rejected() {
        let tool = Ffmpeg::default();
        let chain = parse_chain("noise").unwrap();
        let err = corrupt_video(
            &tool,
            Path::new("a.mp4"),
            Path::new("b.mp4"),
            0,
            &chain,
            &CorruptionConfig::default(),
        )
        .unwrap_err();
        assert!(err.is_configuration_error());
    }
}
