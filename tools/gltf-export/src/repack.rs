//! gltfpack post-process
//!
//! Runs the external `gltfpack` optimizer over an already written artifact.
//! The output lands in a `gltfpacked/` directory next to the input, with the
//! same file name. Every failure is returned as a [`RepackError`] for the
//! caller to log; none of them invalidate the primary artifact.

use serde::Deserialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use std::time::{Duration, Instant};

/// Name of the directory receiving repacked files
pub const REPACK_DIR: &str = "gltfpacked";

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Vertex position encoding passed to gltfpack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PositionEncoding {
    #[default]
    Integer,
    Normalized,
    Float,
}

impl PositionEncoding {
    pub fn flag(&self) -> &'static str {
        match self {
            PositionEncoding::Integer => "-vpi",
            PositionEncoding::Normalized => "-vpn",
            PositionEncoding::Float => "-vpf",
        }
    }
}

/// gltfpack knobs, translated 1:1 into command line flags
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RepackOptions {
    /// Directory containing the gltfpack binary (PATH lookup when unset)
    pub tool_dir: Option<PathBuf>,
    /// `-tc`: convert textures to KTX2 with BasisU supercompression
    pub texture_compression: bool,
    /// `-tq`: texture quality, 1..=10
    pub texture_quality: u8,
    /// `-si`: mesh simplification ratio
    pub simplify_ratio: f32,
    /// `-sa`: aggressive simplification
    pub simplify_aggressive: bool,
    /// `-slb`: lock border vertices while simplifying
    pub simplify_lock_borders: bool,
    /// `-vp`: position quantization bits
    pub position_bits: u8,
    /// `-vt`: texture coordinate quantization bits
    pub texcoord_bits: u8,
    /// `-vn`: normal and tangent quantization bits
    pub normal_bits: u8,
    /// `-vc`: color quantization bits
    pub color_bits: u8,
    pub position_encoding: PositionEncoding,
    /// `-noq`: disable quantization
    pub no_quantization: bool,
    /// Upper bound on the gltfpack run
    pub timeout_secs: u64,
}

impl Default for RepackOptions {
    fn default() -> Self {
        Self {
            tool_dir: None,
            texture_compression: false,
            texture_quality: 8,
            simplify_ratio: 1.0,
            simplify_aggressive: false,
            simplify_lock_borders: false,
            position_bits: 14,
            texcoord_bits: 12,
            normal_bits: 8,
            color_bits: 8,
            position_encoding: PositionEncoding::Integer,
            no_quantization: false,
            timeout_secs: 120,
        }
    }
}

impl RepackOptions {
    /// Tool flags in gltfpack order, without `-i`/`-o`
    pub fn tool_flags(&self) -> Vec<String> {
        let mut options = Vec::new();

        if self.texture_compression {
            options.push("-tc".to_string());
        }

        options.push("-tq".to_string());
        options.push(self.texture_quality.to_string());

        options.push("-si".to_string());
        options.push(self.simplify_ratio.to_string());

        if self.simplify_aggressive {
            options.push("-sa".to_string());
        }

        if self.simplify_lock_borders {
            options.push("-slb".to_string());
        }

        for (flag, bits) in [
            ("-vp", self.position_bits),
            ("-vt", self.texcoord_bits),
            ("-vn", self.normal_bits),
            ("-vc", self.color_bits),
        ] {
            options.push(flag.to_string());
            options.push(bits.to_string());
        }

        options.push(self.position_encoding.flag().to_string());

        if self.no_quantization {
            options.push("-noq".to_string());
        }

        options
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Reasons a repack did not produce output
#[derive(Debug, thiserror::Error)]
pub enum RepackError {
    #[error("gltfpack not found ({0})")]
    ToolNotFound(String),

    #[error("Failed to prepare {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to launch {}: {source}", tool.display())]
    Launch {
        tool: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("gltfpack exited with {0}")]
    Failed(ExitStatus),

    #[error("gltfpack did not finish within {0:?}")]
    Timeout(Duration),
}

/// Output directory and file for a primary artifact
pub fn repack_paths(input: &Path) -> (PathBuf, PathBuf) {
    let directory = input
        .parent()
        .unwrap_or(Path::new(""))
        .join(REPACK_DIR);
    let file_name = input.file_name().map(OsString::from).unwrap_or_default();
    let output = directory.join(file_name);
    (directory, output)
}

/// Full gltfpack argument list: tool flags, then `-i <input> -o <output>`
pub fn command_arguments(options: &RepackOptions, input: &Path, output: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = options.tool_flags().into_iter().map(OsString::from).collect();
    args.push("-i".into());
    args.push(input.as_os_str().to_owned());
    args.push("-o".into());
    args.push(output.as_os_str().to_owned());
    args
}

/// Locate the gltfpack executable
pub fn find_tool(options: &RepackOptions) -> Result<PathBuf, RepackError> {
    let exe_name = format!("gltfpack{}", std::env::consts::EXE_SUFFIX);

    if let Some(dir) = &options.tool_dir {
        let candidate = dir.join(&exe_name);
        return if candidate.exists() {
            Ok(candidate)
        } else {
            Err(RepackError::ToolNotFound(candidate.display().to_string()))
        };
    }

    which::which("gltfpack").map_err(|e| RepackError::ToolNotFound(e.to_string()))
}

/// Run gltfpack over `input`, returning the repacked file path
pub fn repack(input: &Path, options: &RepackOptions) -> Result<PathBuf, RepackError> {
    let tool = find_tool(options)?;

    let (directory, output) = repack_paths(input);
    std::fs::create_dir_all(&directory).map_err(|source| RepackError::Io {
        path: directory.clone(),
        source,
    })?;

    let args = command_arguments(options, input, &output);
    tracing::debug!("Running {} {:?}", tool.display(), args);

    let mut child = Command::new(&tool)
        .args(&args)
        .spawn()
        .map_err(|source| RepackError::Launch {
            tool: tool.clone(),
            source,
        })?;

    let timeout = options.timeout();
    let started = Instant::now();
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if started.elapsed() >= timeout => {
                // Best effort; the child may have exited in between
                let _ = child.kill();
                let _ = child.wait();
                return Err(RepackError::Timeout(timeout));
            }
            Ok(None) => std::thread::sleep(POLL_INTERVAL),
            Err(source) => {
                return Err(RepackError::Launch {
                    tool: tool.clone(),
                    source,
                });
            }
        }
    };

    if !status.success() {
        return Err(RepackError::Failed(status));
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_flags() {
        let flags = RepackOptions::default().tool_flags();
        assert_eq!(
            flags,
            vec![
                "-tq", "8", "-si", "1", "-vp", "14", "-vt", "12", "-vn", "8", "-vc", "8", "-vpi"
            ]
        );
    }

    #[test]
    fn test_all_toggles_enabled() {
        let options = RepackOptions {
            texture_compression: true,
            simplify_ratio: 0.5,
            simplify_aggressive: true,
            simplify_lock_borders: true,
            position_encoding: PositionEncoding::Float,
            no_quantization: true,
            ..Default::default()
        };
        let flags = options.tool_flags();
        assert_eq!(flags.first().map(String::as_str), Some("-tc"));
        assert_eq!(flags.last().map(String::as_str), Some("-noq"));

        let si = flags.iter().position(|f| f == "-si").unwrap();
        assert_eq!(flags[si + 1], "0.5");
        assert_eq!(flags[si + 2], "-sa");
        assert_eq!(flags[si + 3], "-slb");
        assert!(flags.contains(&"-vpf".to_string()));
        assert!(!flags.contains(&"-vpi".to_string()));
    }

    #[test]
    fn test_position_encoding_is_exclusive() {
        for (encoding, flag) in [
            (PositionEncoding::Integer, "-vpi"),
            (PositionEncoding::Normalized, "-vpn"),
            (PositionEncoding::Float, "-vpf"),
        ] {
            let options = RepackOptions {
                position_encoding: encoding,
                ..Default::default()
            };
            let flags = options.tool_flags();
            let encodings: Vec<_> = flags
                .iter()
                .filter(|f| ["-vpi", "-vpn", "-vpf"].contains(&f.as_str()))
                .collect();
            assert_eq!(encodings, vec![flag]);
        }
    }

    #[test]
    fn test_repack_paths() {
        let (dir, out) = repack_paths(Path::new("/tmp/export/scene.glb"));
        assert_eq!(dir, PathBuf::from("/tmp/export/gltfpacked"));
        assert_eq!(out, PathBuf::from("/tmp/export/gltfpacked/scene.glb"));
    }

    #[test]
    fn test_input_and_output_come_last() {
        let args = command_arguments(
            &RepackOptions::default(),
            Path::new("a.gltf"),
            Path::new("gltfpacked/a.gltf"),
        );
        let tail: Vec<_> = args[args.len() - 4..]
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(tail, vec!["-i", "a.gltf", "-o", "gltfpacked/a.gltf"]);
    }

    #[test]
    fn test_missing_tool_dir() {
        let dir = tempfile::tempdir().unwrap();
        let options = RepackOptions {
            tool_dir: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        let err = repack(&dir.path().join("scene.glb"), &options).unwrap_err();
        assert!(matches!(err, RepackError::ToolNotFound(_)));
        assert!(!dir.path().join(REPACK_DIR).exists());
    }

    #[cfg(unix)]
    fn install_fake_tool(dir: &Path, script: &str) {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("gltfpack");
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_fake_tool_receives_arguments() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("args.txt");
        install_fake_tool(
            dir.path(),
            &format!("#!/bin/sh\necho \"$@\" > '{}'\n", log.display()),
        );

        let input = dir.path().join("scene.glb");
        std::fs::write(&input, b"glTF").unwrap();
        let options = RepackOptions {
            tool_dir: Some(dir.path().to_path_buf()),
            ..Default::default()
        };

        let output = repack(&input, &options).unwrap();
        assert_eq!(output, dir.path().join("gltfpacked/scene.glb"));
        assert!(dir.path().join(REPACK_DIR).is_dir());

        let logged = std::fs::read_to_string(&log).unwrap();
        assert!(logged.starts_with("-tq 8 -si 1 -vp 14"));
        assert!(logged.trim_end().ends_with(&format!(
            "-i {} -o {}",
            input.display(),
            output.display()
        )));
    }

    #[cfg(unix)]
    #[test]
    fn test_nonzero_exit_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        install_fake_tool(dir.path(), "#!/bin/sh\nexit 3\n");

        let options = RepackOptions {
            tool_dir: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        let err = repack(&dir.path().join("scene.glb"), &options).unwrap_err();
        match err {
            RepackError::Failed(status) => assert_eq!(status.code(), Some(3)),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_hung_tool_times_out() {
        let dir = tempfile::tempdir().unwrap();
        install_fake_tool(dir.path(), "#!/bin/sh\nexec sleep 30\n");

        let options = RepackOptions {
            tool_dir: Some(dir.path().to_path_buf()),
            timeout_secs: 1,
            ..Default::default()
        };
        let err = repack(&dir.path().join("scene.glb"), &options).unwrap_err();
        assert!(matches!(err, RepackError::Timeout(_)));
    }
}
