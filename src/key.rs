//! Object key convention of the content bucket.
//!
//! ```text
//! private/<ownerId>/<jobId>/upload/<filenameFull>
//! private/<ownerId>/<jobId>/output/.write_access_check_file.temp
//! private/<ownerId>/<jobId>/output/<runId>/details/<lang>.auxiliary-translation-details.json
//! private/<ownerId>/<jobId>/output/<runId>/<lang>.<filenameFull>
//! 0      / 1       / 2     / 3    / 4      / 5     / 6
//! ```

use crate::error::{PipelineError, PipelineResult};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Access-control prefix owning every job object.
pub const PRIVATE_SCOPE: &str = "private";

/// Probe object written by the translation service before it writes output.
pub const WRITE_ACCESS_CHECK_FILE: &str = ".write_access_check_file.temp";

/// Folder name holding auxiliary translation details.
pub const DETAILS_FOLDER: &str = "details";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Upload,
    Output,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Subtype {
    Upload,
    Temp,
    Details,
    Output,
}

/// The four recognised key shapes, borrowed from the key being parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyShape<'a> {
    Upload { filename: &'a str },
    Temp,
    Details { filename: &'a str },
    Output { filename: &'a str },
}

impl KeyShape<'_> {
    pub fn stage(&self) -> Stage {
        match self {
            KeyShape::Upload { .. } => Stage::Upload,
            _ => Stage::Output,
        }
    }

    pub fn subtype(&self) -> Subtype {
        match self {
            KeyShape::Upload { .. } => Subtype::Upload,
            KeyShape::Temp => Subtype::Temp,
            KeyShape::Details { .. } => Subtype::Details,
            KeyShape::Output { .. } => Subtype::Output,
        }
    }

    pub fn filename(&self) -> &str {
        match self {
            KeyShape::Upload { filename }
            | KeyShape::Details { filename }
            | KeyShape::Output { filename } => filename,
            KeyShape::Temp => WRITE_ACCESS_CHECK_FILE,
        }
    }
}

/// Structured view of one content-bucket object key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageKey {
    pub permission_scope: String,
    #[serde(rename = "cognitoId")]
    pub owner_id: String,
    pub job_id: String,
    pub stage: Stage,
    #[serde(rename = "type")]
    pub subtype: Subtype,
    pub filename_full: String,
    #[serde(rename = "language", default, skip_serializing_if = "Option::is_none")]
    pub language_code: Option<String>,
}

/// Leading dot-segment of a translated file name, e.g. `fr` in `fr.report.docx`.
pub fn language_code(filename: &str) -> Option<&str> {
    filename.split('.').next().filter(|lang| !lang.is_empty())
}

/// Classify a key into one of the four shapes.
///
/// Guards are evaluated in order, so a key matching several shapes resolves to
/// the first one. Returns the scope, owner and job segments alongside the shape.
pub fn classify(key: &str) -> Option<(&str, &str, &str, KeyShape<'_>)> {
    let segments: Vec<&str> = key.split('/').collect();

    let (scope, owner, job, shape) = match segments.as_slice() {
        [scope, owner, job, "upload", filename] => {
            (*scope, *owner, *job, KeyShape::Upload { filename: *filename })
        }
        [scope, owner, job, "output", WRITE_ACCESS_CHECK_FILE, ..] => {
            (*scope, *owner, *job, KeyShape::Temp)
        }
        [scope, owner, job, "output", _run, DETAILS_FOLDER, filename] => {
            (*scope, *owner, *job, KeyShape::Details { filename: *filename })
        }
        [scope, owner, job, "output", _run, filename] if *filename != DETAILS_FOLDER => {
            (*scope, *owner, *job, KeyShape::Output { filename: *filename })
        }
        _ => return None,
    };

    if scope != PRIVATE_SCOPE || owner.is_empty() || job.is_empty() || shape.filename().is_empty() {
        return None;
    }

    Some((scope, owner, job, shape))
}

/// Parse a content-bucket object key.
///
/// Keys outside the four recognised shapes fail with
/// [`PipelineError::InvalidKeyStructure`]; no partial result is returned.
pub fn parse_storage_key(key: &str) -> PipelineResult<StorageKey> {
    let invalid = || PipelineError::InvalidKeyStructure(key.to_string());
    let (scope, owner, job, shape) = classify(key).ok_or_else(invalid)?;

    let language = match shape {
        KeyShape::Details { filename } | KeyShape::Output { filename } => {
            Some(language_code(filename).ok_or_else(invalid)?.to_string())
        }
        KeyShape::Upload { .. } | KeyShape::Temp => None,
    };

    let parsed = StorageKey {
        permission_scope: scope.to_string(),
        owner_id: owner.to_string(),
        job_id: job.to_string(),
        stage: shape.stage(),
        subtype: shape.subtype(),
        filename_full: shape.filename().to_string(),
        language_code: language,
    };

    debug!(
        job_id = %parsed.job_id,
        subtype = ?parsed.subtype,
        language = ?parsed.language_code,
        "Parsed storage key"
    );

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_key() {
        let key = parse_storage_key("private/owner/job-1/upload/Document+name.docx").unwrap();
        assert_eq!(key.stage, Stage::Upload);
        assert_eq!(key.subtype, Subtype::Upload);
        assert_eq!(key.filename_full, "Document+name.docx");
        assert_eq!(key.language_code, None);
    }

    #[test]
    fn test_upload_key_with_dotted_name_has_no_language() {
        let key = parse_storage_key("private/owner/job-1/upload/fr.report.docx").unwrap();
        assert_eq!(key.subtype, Subtype::Upload);
        assert_eq!(key.language_code, None);
    }

    #[test]
    fn test_upload_requires_exactly_five_segments() {
        assert!(parse_storage_key("private/owner/job-1/upload").is_err());
        assert!(parse_storage_key("private/owner/job-1/upload/dir/file.docx").is_err());
    }

    #[test]
    fn test_temp_marker_ignores_owner_and_job() {
        for (owner, job) in [("a", "b"), ("us-east-1:1234", "0c9e-44"), ("x_y", "z")] {
            let key = format!("private/{}/{}/output/.write_access_check_file.temp", owner, job);
            let parsed = parse_storage_key(&key).unwrap();
            assert_eq!(parsed.subtype, Subtype::Temp);
            assert_eq!(parsed.filename_full, WRITE_ACCESS_CHECK_FILE);
            assert_eq!(parsed.language_code, None);
        }
    }

    #[test]
    fn test_details_key() {
        let parsed = parse_storage_key(
            "private/owner/job/output/123-TranslateText-abc/details/ar.auxiliary-translation-details.json",
        )
        .unwrap();
        assert_eq!(parsed.subtype, Subtype::Details);
        assert_eq!(parsed.filename_full, "ar.auxiliary-translation-details.json");
        assert_eq!(parsed.language_code.as_deref(), Some("ar"));
    }

    #[test]
    fn test_output_key_uses_first_dot_segment() {
        let parsed =
            parse_storage_key("private/owner/job/output/123-TranslateText-abc/zh-TW.my.report.docx")
                .unwrap();
        assert_eq!(parsed.subtype, Subtype::Output);
        assert_eq!(parsed.filename_full, "zh-TW.my.report.docx");
        assert_eq!(parsed.language_code.as_deref(), Some("zh-TW"));
    }

    #[test]
    fn test_output_without_file_segment_is_rejected() {
        assert!(parse_storage_key("private/owner/job/output/run").is_err());
        assert!(parse_storage_key("private/owner/job/output/run/details").is_err());
        assert!(parse_storage_key("private/owner/job/output/run/details/").is_err());
    }

    #[test]
    fn test_output_with_empty_language_is_rejected() {
        assert!(parse_storage_key("private/owner/job/output/run/.hidden").is_err());
    }

    #[test]
    fn test_unknown_stage_and_scope_are_rejected() {
        assert!(parse_storage_key("private/owner/job/expired/file.docx").is_err());
        assert!(parse_storage_key("public/owner/job/upload/file.docx").is_err());
        assert!(parse_storage_key("private//job/upload/file.docx").is_err());
    }

    #[test]
    fn test_short_keys_are_rejected() {
        for key in ["", "private", "private/owner", "private/owner/job", "fail/file/key.foobar"] {
            match parse_storage_key(key) {
                Err(PipelineError::InvalidKeyStructure(k)) => assert_eq!(k, key),
                other => panic!("expected InvalidKeyStructure for {:?}, got {:?}", key, other),
            }
        }
    }

    #[test]
    fn test_classify_details_shape() {
        let (_, _, job, shape) = classify("private/o/j/output/run-7/details/de.x.json").unwrap();
        assert_eq!(job, "j");
        assert_eq!(shape, KeyShape::Details { filename: "de.x.json" });
    }
}
