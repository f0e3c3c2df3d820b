//! Job descriptors and admission checks.

use crate::utils::sanitize_filename;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Metadata written into the finished artifact
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagAttributes {
    /// Tagged as `artist`
    pub speaker: Option<String>,
    /// Tagged as `album`
    pub series: Option<String>,
    /// Tagged as `date`
    pub year: Option<i32>,
}

impl TagAttributes {
    /// Key/value pairs for the tagger, skipping empty values
    ///
    /// ```
    /// use media_dl::TagAttributes;
    ///
    /// let attrs = TagAttributes {
    ///     speaker: Some("J. Doe".into()),
    ///     series: None,
    ///     year: Some(2024),
    /// };
    /// let tags = attrs.to_tags("Romans 8");
    /// assert_eq!(tags, vec![
    ///     ("title".to_string(), "Romans 8".to_string()),
    ///     ("artist".to_string(), "J. Doe".to_string()),
    ///     ("date".to_string(), "2024".to_string()),
    /// ]);
    /// ```
    pub fn to_tags(&self, title: &str) -> Vec<(String, String)> {
        let mut tags = Vec::with_capacity(4);
        let mut push = |key: &str, value: Option<&str>| {
            if let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) {
                tags.push((key.to_string(), value.to_string()));
            }
        };
        push("title", Some(title));
        push("artist", self.speaker.as_deref());
        push("album", self.series.as_deref());
        let year = self.year.map(|y| y.to_string());
        push("date", year.as_deref());
        tags
    }
}

/// Immutable description of one download + tag unit of work
///
/// Once enqueued a descriptor is shared behind an `Arc` and never changes;
/// pausing and resuming reuse the same descriptor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDescriptor {
    /// Stable ordering key (row index of the input)
    pub sequence: usize,
    /// Source URL
    pub locator: String,
    /// Directory that receives the final artifact
    pub destination: PathBuf,
    /// Display title, also the basis of the artifact name
    pub title: String,
    /// Tagging attributes
    pub attributes: TagAttributes,
}

impl JobDescriptor {
    /// Create a descriptor without tagging attributes
    pub fn new(
        sequence: usize,
        locator: impl Into<String>,
        destination: impl Into<PathBuf>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            sequence,
            locator: locator.into(),
            destination: destination.into(),
            title: title.into(),
            attributes: TagAttributes::default(),
        }
    }

    /// Attach tagging attributes
    #[must_use]
    pub fn with_attributes(mut self, attributes: TagAttributes) -> Self {
        self.attributes = attributes;
        self
    }

    /// Sanitized file stem of the artifact
    pub fn file_stem(&self) -> String {
        sanitize_filename(&self.title)
    }

    /// Why this descriptor cannot be scheduled, if anything
    pub fn validate(&self) -> Result<(), String> {
        if self.locator.trim().is_empty() {
            return Err("source locator is empty".to_string());
        }
        if self.destination.as_os_str().is_empty() {
            return Err("destination is empty".to_string());
        }
        if self.file_stem().is_empty() {
            return Err(format!(
                "title {:?} is empty after sanitization",
                self.title
            ));
        }
        Ok(())
    }
}

/// A descriptor refused at admission
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedJob {
    /// Sequence index of the refused job
    pub sequence: usize,
    /// Why it was refused
    pub reason: String,
}

/// Result of [`enumerate`]
#[derive(Clone, Debug, Default)]
pub struct Admission {
    /// Valid descriptors, input order preserved
    pub accepted: Vec<JobDescriptor>,
    /// Malformed descriptors, reported individually
    pub rejected: Vec<RejectedJob>,
}

/// Split a batch into schedulable and malformed descriptors
///
/// Malformed rows never abort the batch; they are logged and returned in
/// [`Admission::rejected`].
pub fn enumerate(jobs: Vec<JobDescriptor>) -> Admission {
    let mut admission = Admission {
        accepted: Vec::with_capacity(jobs.len()),
        rejected: Vec::new(),
    };
    for job in jobs {
        match job.validate() {
            Ok(()) => admission.accepted.push(job),
            Err(reason) => {
                tracing::warn!(sequence = job.sequence, %reason, "Rejecting malformed job");
                admission.rejected.push(RejectedJob {
                    sequence: job.sequence,
                    reason,
                });
            }
        }
    }
    admission
}
