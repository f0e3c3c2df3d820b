//! Configuration types for media-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Download behavior configuration (directories, concurrency, output format)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Default destination directory for jobs built from an input table (default: "./downloads")
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Number of worker slots (default: 10)
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_downloads: usize,

    /// Container extension of final artifacts (default: "mp4")
    #[serde(default = "default_output_extension")]
    pub output_extension: String,

    /// Format selector handed to the fetcher (default: "bestvideo+bestaudio/best")
    #[serde(default = "default_format")]
    pub format: String,

    /// Ask the fetcher to continue partial files instead of starting over (default: true)
    ///
    /// Only affects first attempts. A task resumed after a pause always
    /// continues from its partial file.
    #[serde(default = "default_true")]
    pub resumable: bool,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            max_concurrent_downloads: default_max_concurrent(),
            output_extension: default_output_extension(),
            format: default_format(),
            resumable: true,
        }
    }
}

/// External tool paths (yt-dlp, ffmpeg) and their limits
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Path to the yt-dlp executable (auto-detected if None)
    #[serde(default)]
    pub fetcher_path: Option<PathBuf>,

    /// Path to the ffmpeg executable (auto-detected if None)
    #[serde(default)]
    pub tagger_path: Option<PathBuf>,

    /// Whether to search PATH for external binaries if explicit paths not set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,

    /// Upper bound for a single tagging run (default: 300 seconds)
    #[serde(default = "default_tag_timeout", with = "duration_serde")]
    pub tag_timeout: Duration,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            fetcher_path: None,
            tagger_path: None,
            search_path: true,
            tag_timeout: default_tag_timeout(),
        }
    }
}

/// Column names of the input table
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InputConfig {
    /// Display title column (default: "Title - Verses")
    #[serde(default = "default_title_column")]
    pub title_column: String,

    /// ISO date column, only the year is used (default: "Date")
    #[serde(default = "default_date_column")]
    pub date_column: String,

    /// Speaker column, tagged as artist (default: "Speaker")
    #[serde(default = "default_speaker_column")]
    pub speaker_column: String,

    /// Series column, tagged as album (default: "Sermon Series")
    #[serde(default = "default_series_column")]
    pub series_column: String,

    /// Source URL column (default: "Sermon URL")
    #[serde(default = "default_url_column")]
    pub url_column: String,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            title_column: default_title_column(),
            date_column: default_date_column(),
            speaker_column: default_speaker_column(),
            series_column: default_series_column(),
            url_column: default_url_column(),
        }
    }
}

impl InputConfig {
    /// All required column names in table order
    pub fn required_columns(&self) -> [&str; 5] {
        [
            &self.title_column,
            &self.date_column,
            &self.speaker_column,
            &self.series_column,
            &self.url_column,
        ]
    }
}

/// Main configuration for [`MediaDownloader`](crate::MediaDownloader)
///
/// Fields are organized into logical sub-configs:
/// - [`download`](DownloadConfig) - directories, concurrency, output format
/// - [`tools`](ToolsConfig) - external binary paths and the tagging timeout
/// - [`input`](InputConfig) - input table column names
///
/// All sub-config fields are flattened, so the JSON format has no nesting.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Download behavior settings
    #[serde(flatten)]
    pub download: DownloadConfig,

    /// External tool paths
    #[serde(flatten)]
    pub tools: ToolsConfig,

    /// Input table columns
    #[serde(flatten)]
    pub input: InputConfig,

    /// How long shutdown waits for workers to unwind (default: 30 seconds)
    #[serde(default = "default_shutdown_timeout", with = "duration_serde")]
    pub shutdown_timeout: Duration,
}

impl Config {
    /// Load a configuration from a JSON file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read config file '{}': {}", path.display(), e),
            ))
        })?;
        let config: Config = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that serde cannot express
    pub fn validate(&self) -> Result<()> {
        if self.download.max_concurrent_downloads == 0 {
            return Err(Error::Config {
                message: "max_concurrent_downloads must be at least 1".to_string(),
                key: Some("max_concurrent_downloads".to_string()),
            });
        }
        if self.download.output_extension.trim().is_empty() {
            return Err(Error::Config {
                message: "output_extension must not be empty".to_string(),
                key: Some("output_extension".to_string()),
            });
        }
        Ok(())
    }

    /// Destination directory for jobs built from an input table
    pub fn download_dir(&self) -> &PathBuf {
        &self.download.download_dir
    }
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("./downloads")
}

fn default_max_concurrent() -> usize {
    10
}

fn default_output_extension() -> String {
    "mp4".to_string()
}

fn default_format() -> String {
    "bestvideo+bestaudio/best".to_string()
}

fn default_true() -> bool {
    true
}

fn default_tag_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_title_column() -> String {
    "Title - Verses".to_string()
}

fn default_date_column() -> String {
    "Date".to_string()
}

fn default_speaker_column() -> String {
    "Speaker".to_string()
}

fn default_series_column() -> String {
    "Sermon Series".to_string()
}

fn default_url_column() -> String {
    "Sermon URL".to_string()
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
