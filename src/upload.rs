use std::path::{Path, PathBuf};
use std::sync::Mutex;
use chrono::{DateTime, SecondsFormat, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use itertools::Itertools;
use log::{error, info};
use s3::{Bucket, Region};
use s3::creds::Credentials;
use crate::config::FileConfig;
use crate::error::{BirdError, Result};

pub const UPLOAD_PREFIX: &str = "upload-files";
const META_HEADER_PREFIX: &str = "x-amz-meta-";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingFile {
    pub path: PathBuf,
    pub name: String,
    pub size: u64,
    pub mime: String,
    pub last_modified: Option<DateTime<Utc>>,
}

impl PendingFile {
    pub async fn from_path(path: &Path) -> Result<Self> {
        let metadata = tokio::fs::metadata(path).await
            .map_err(|e| BirdError::validation(format!("cannot read {}: {}", path.display(), e)))?;
        if !metadata.is_file() {
            return Err(BirdError::validation(format!("{} is not a file", path.display())));
        }
        let name = path.file_name()
            .map(|x| x.to_string_lossy().to_string())
            .filter(|x| !x.is_empty())
            .ok_or_else(|| BirdError::validation(format!("{} has no file name", path.display())))?;
        let mime = mime_guess::from_path(path).first_or_octet_stream().to_string();
        let last_modified = metadata.modified().ok().map(DateTime::<Utc>::from);
        Ok(Self {
            path: path.to_path_buf(),
            name,
            size: metadata.len(),
            mime,
            last_modified,
        })
    }
}

/// `2024-05-01T10:20:30.123Z` becomes `2024-05-01T10-20-30-123Z`.
pub fn key_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true).replace([':', '.'], "-")
}

/// Storage key for an uploaded file: `upload-files/<base>_<user>_<timestamp>.<ext>`.
///
/// `base` is the name up to its first dot, `ext` whatever follows the last one.
/// A name without a dot is used for both.
pub fn object_key(filename: &str, user_sub: &str, at: DateTime<Utc>) -> String {
    let base = filename.split('.').next().unwrap_or_default();
    let ext = filename.rsplit('.').next().unwrap_or_default();
    format!("{}/{}_{}_{}.{}", UPLOAD_PREFIX, base, user_sub, key_timestamp(at), ext)
}

pub fn parse_manual_tags(input: &str) -> Vec<String> {
    input.split(',')
        .map(|x| x.trim())
        .filter(|x| !x.is_empty())
        .map(|x| x.to_string())
        .collect()
}

/// Header-safe form of a metadata value: visible ASCII and tabs pass through,
/// anything else is percent-encoded.
pub fn metadata_header_value(value: &str) -> String {
    if value.chars().all(|c| c == '\t' || c.is_ascii_graphic() || c == ' ') {
        value.to_string()
    } else {
        urlencoding::encode(value).into_owned()
    }
}

pub fn progress_percent(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((completed as f64 / total as f64) * 100.0).round() as u8
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectUpload {
    pub key: String,
    pub content_type: String,
    pub metadata: Vec<(String, String)>,
    pub body: Vec<u8>,
}

pub trait ObjectStore {
    async fn put_object(&self, upload: &ObjectUpload) -> Result<()>;
}

pub struct S3ObjectStore {
    bucket: Box<Bucket>,
}

impl S3ObjectStore {
    pub fn new(conf: &FileConfig) -> Result<Self> {
        if conf.bucket_name.is_empty() {
            return Err(BirdError::validation("bucket name is not configured"));
        }
        let region = match &conf.endpoint {
            Some(endpoint) => Region::Custom { region: conf.region.clone(), endpoint: endpoint.clone() },
            None => conf.region.parse::<Region>().map_err(|e| BirdError::Storage(e.to_string()))?,
        };
        let credentials = Credentials::new(
            Some(conf.aws.access_key_id.as_str()),
            Some(conf.aws.secret_access_key.as_str()),
            None,
            conf.aws.session_token.as_deref(),
            None,
        ).map_err(|e| BirdError::Storage(e.to_string()))?;
        let mut bucket = Bucket::new(conf.bucket_name.as_str(), region, credentials)?;
        if conf.endpoint.is_some() {
            bucket = bucket.with_path_style();
        }
        Ok(Self { bucket })
    }
}

impl ObjectStore for S3ObjectStore {
    async fn put_object(&self, upload: &ObjectUpload) -> Result<()> {
        let mut bucket = self.bucket.clone();
        for (name, value) in &upload.metadata {
            bucket.add_header(&format!("{}{}", META_HEADER_PREFIX, name), &metadata_header_value(value));
        }
        let response = bucket
            .put_object_with_content_type(&upload.key, &upload.body, &upload.content_type)
            .await?;
        let status = response.status_code();
        if !(200..300).contains(&status) {
            return Err(BirdError::Storage(format!("put {} returned {}", upload.key, status)));
        }
        Ok(())
    }
}

/// Keeps uploads in memory. Keys containing a registered fragment are refused.
#[derive(Debug, Default)]
pub struct InMemoryObjectStore {
    objects: Mutex<Vec<ObjectUpload>>,
    failing: Vec<String>,
}

impl InMemoryObjectStore {
    pub fn with_failure_for(mut self, key_fragment: &str) -> Self {
        self.failing.push(key_fragment.to_string());
        self
    }

    pub fn objects(&self) -> Vec<ObjectUpload> {
        self.objects.lock().map(|x| x.clone()).unwrap_or_default()
    }
}

impl ObjectStore for InMemoryObjectStore {
    async fn put_object(&self, upload: &ObjectUpload) -> Result<()> {
        if self.failing.iter().any(|x| upload.key.contains(x.as_str())) {
            return Err(BirdError::Storage(format!("refused {}", upload.key)));
        }
        let mut objects = self.objects.lock()
            .map_err(|_| BirdError::Storage("object store lock poisoned".to_string()))?;
        objects.push(upload.clone());
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub name: String,
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedUpload {
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub succeeded: Vec<UploadedFile>,
    pub failed: Vec<FailedUpload>,
}

pub struct Uploader<O: ObjectStore> {
    store: O,
}

impl<O: ObjectStore> Uploader<O> {
    pub fn new(store: O) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &O {
        &self.store
    }

    async fn upload_one(&self, file: &PendingFile, user_sub: &str, manual_tags: &[String]) -> Result<String> {
        let body = tokio::fs::read(&file.path).await
            .map_err(|e| BirdError::validation(format!("cannot read {}: {}", file.name, e)))?;
        let now = Utc::now();
        let key = object_key(&file.name, user_sub, now);
        let mut metadata = vec![
            ("original-name".to_string(), file.name.clone()),
            ("upload-date".to_string(), now.to_rfc3339_opts(SecondsFormat::Millis, true)),
            ("user-sub".to_string(), user_sub.to_string()),
        ];
        if !manual_tags.is_empty() {
            metadata.push(("manual-tags".to_string(), manual_tags.iter().join(",")));
        }
        let upload = ObjectUpload { key, content_type: file.mime.clone(), metadata, body };
        self.store.put_object(&upload).await?;
        info!("uploaded {} as {}", file.name, upload.key);
        Ok(upload.key)
    }

    /// Uploads every file concurrently and fails on the first error.
    ///
    /// Files still in flight are abandoned and files already stored stay
    /// stored. Returns keys in the order of `files`.
    pub async fn upload_all(
        &self,
        files: &[PendingFile],
        user_sub: &str,
        manual_tags: &[String],
        mut on_progress: impl FnMut(u8),
    ) -> Result<Vec<String>> {
        let total = files.len();
        let mut pending = files.iter()
            .enumerate()
            .map(|(index, file)| async move { (index, self.upload_one(file, user_sub, manual_tags).await) })
            .collect::<FuturesUnordered<_>>();
        let mut keys = vec![String::new(); total];
        let mut completed = 0;
        while let Some((index, result)) = pending.next().await {
            match result {
                Ok(key) => {
                    keys[index] = key;
                    completed += 1;
                    on_progress(progress_percent(completed, total));
                }
                Err(e) => {
                    error!("failed to upload {}: {}", files[index].name, e);
                    return Err(e);
                }
            }
        }
        Ok(keys)
    }

    /// Uploads every file concurrently and reports each outcome separately.
    pub async fn upload_each(&self, files: &[PendingFile], user_sub: &str, manual_tags: &[String]) -> BatchReport {
        let mut pending = files.iter()
            .map(|file| async move { (file, self.upload_one(file, user_sub, manual_tags).await) })
            .collect::<FuturesUnordered<_>>();
        let mut report = BatchReport::default();
        while let Some((file, result)) = pending.next().await {
            match result {
                Ok(key) => report.succeeded.push(UploadedFile { name: file.name.clone(), key }),
                Err(e) => {
                    error!("failed to upload {}: {}", file.name, e);
                    report.failed.push(FailedUpload { name: file.name.clone(), reason: e.to_string() });
                }
            }
        }
        report
    }
}
