//! Test fixtures for pipeline tests
//!
//! [`TestEnvironment`] owns a temporary artifact directory and one recording mock
//! per collaborator. Script the mocks, then call [`TestEnvironment::pipeline`].

#![allow(dead_code)]

use crate::mocks::{CallLog, MockExtractor, MockFetcher, MockResolver, MockTranscoder, MockUploader};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Once};
use tempfile::TempDir;
use tunecore::download::pipeline::MediaPipelineBuilder;
use tunecore::storage::FileIdStore;
use tunecore::{MediaPipeline, PipelineConfig};

/// Comfortably above the audio threshold
pub const MIN_AUDIO_OK: usize = 2 * 1024 * 1024;
/// Comfortably above the video threshold
pub const MIN_VIDEO_OK: usize = 3 * 1024 * 1024;

static LOGGER: Once = Once::new();

/// Routes `log` output to the test harness once per binary.
pub fn init_test_logging() {
    LOGGER.call_once(|| {
        let _ = simplelog::TestLogger::init(simplelog::LevelFilter::Debug, simplelog::Config::default());
    });
}

pub struct TestEnvironment {
    pub dir: TempDir,
    pub log: CallLog,
    pub resolver: Arc<MockResolver>,
    pub transcoder: Arc<MockTranscoder>,
    pub fetcher: Arc<MockFetcher>,
    pub extractor: Arc<MockExtractor>,
    pub uploader: Arc<MockUploader>,
    pub file_ids: Arc<FileIdStore>,
}

impl TestEnvironment {
    pub fn new() -> Self {
        init_test_logging();
        let dir = TempDir::new().unwrap();
        let log = CallLog::default();
        Self {
            file_ids: Arc::new(FileIdStore::new(dir.path().join("file_ids.json"))),
            resolver: Arc::new(MockResolver::new(log.clone())),
            transcoder: Arc::new(MockTranscoder::new(log.clone())),
            fetcher: Arc::new(MockFetcher::new(log.clone())),
            extractor: Arc::new(MockExtractor::new(log.clone())),
            uploader: Arc::new(MockUploader::new(log.clone())),
            log,
            dir,
        }
    }

    pub fn config(&self) -> PipelineConfig {
        PipelineConfig::default().with_download_dir(self.dir.path())
    }

    /// Builder with every collaborator mocked; override any of them before `build()`.
    pub fn builder(&self, config: PipelineConfig) -> MediaPipelineBuilder {
        MediaPipeline::builder(config)
            .resolver(self.resolver.clone())
            .transcoder(self.transcoder.clone())
            .fetcher(self.fetcher.clone())
            .extractor(self.extractor.clone())
            .uploader(self.uploader.clone())
            .file_ids(self.file_ids.clone())
    }

    pub fn pipeline(&self) -> MediaPipeline {
        self.builder(self.config()).build()
    }

    /// Config with an upload channel, so `download()` fetches track details first.
    pub fn config_with_upload(&self) -> PipelineConfig {
        self.config().with_upload("http://127.0.0.1:9", "123:abc", "-100123")
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Drops a file of `size` bytes into the artifact directory.
    pub fn write_file(&self, name: &str, size: usize) -> PathBuf {
        let path = self.path(name);
        std::fs::write(&path, vec![0u8; size]).unwrap();
        path
    }

    /// Files in the artifact directory, excluding the upload cache.
    /// Hidden scratch directories are listed too.
    pub fn artifacts(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.dir.path())
            .unwrap()
            .flatten()
            .map(|e| e.file_name().to_string_lossy().to_string())
            .filter(|name| name != "file_ids.json")
            .collect();
        names.sort();
        names
    }
}

/// Shell stand-in for yt-dlp: every call writes `size` bytes to the `-o` template
/// with `ext` substituted, prints that path and exits with `code`.
#[cfg(unix)]
pub fn scripted_ytdlp(dir: &Path, ext: &str, size: usize, code: i32) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let script = dir.join("yt-dlp");
    let body = format!(
        "#!/bin/sh\n\
         out=\"\"\n\
         while [ $# -gt 0 ]; do\n\
         [ \"$1\" = \"-o\" ] && out=\"$2\"\n\
         shift\n\
         done\n\
         [ -n \"$out\" ] || {{ echo 'ERROR: Sign in to confirm you are not a bot' >&2; exit 1; }}\n\
         file=$(printf '%s' \"$out\" | sed 's/%(ext)s/{ext}/')\n\
         head -c {size} /dev/zero > \"$file\"\n\
         printf '%s\\n' \"$file\"\n\
         echo 'ERROR: Postprocessing: ffprobe and ffmpeg not found' >&2\n\
         exit {code}\n"
    );
    std::fs::write(&script, body).unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
    script
}
