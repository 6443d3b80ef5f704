use std::fmt::Write;
use std::path::Path;
use humanize_bytes::humanize_bytes_binary;
use crate::session::{Session, SessionStore};
use crate::upload::{parse_manual_tags, ObjectStore, PendingFile, Uploader};
use crate::views::Toasts;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadBatch {
    pub files: Vec<PendingFile>,
    pub manual_tags: String,
}

impl UploadBatch {
    pub fn clear(&mut self) {
        self.files.clear();
        self.manual_tags.clear();
    }
}

#[derive(Debug, Default)]
pub struct UploadView {
    pub batch: UploadBatch,
    pub progress: u8,
}

impl UploadView {
    pub async fn add_file(&mut self, path: &Path, toasts: &mut Toasts) -> bool {
        match PendingFile::from_path(path).await {
            Ok(file) => {
                self.batch.files.push(file);
                true
            }
            Err(e) => {
                toasts.error(e.to_string());
                false
            }
        }
    }

    pub fn remove_file(&mut self, name: &str) {
        self.batch.files.retain(|x| x.name != name);
    }

    pub fn set_manual_tags(&mut self, tags: &str) {
        self.batch.manual_tags = tags.to_string();
    }

    pub async fn submit<S: SessionStore, O: ObjectStore>(&mut self, uploader: &Uploader<O>, session: &Session<S>, toasts: &mut Toasts) -> bool {
        if self.batch.files.is_empty() {
            toasts.error("Select at least one file to upload");
            return false;
        }
        let user_sub = match session.user_sub() {
            Ok(x) => x,
            Err(e) => {
                toasts.error(format!("Upload failed: {}", e));
                return false;
            }
        };
        let tags = parse_manual_tags(&self.batch.manual_tags);
        self.progress = 0;
        let progress = &mut self.progress;
        let result = uploader.upload_all(&self.batch.files, &user_sub, &tags, |x| *progress = x).await;
        match result {
            Ok(keys) => {
                toasts.success(format!("Uploaded {} file(s)", keys.len()));
                self.batch.clear();
                true
            }
            Err(e) => {
                toasts.error(format!("Upload failed: {}", e));
                false
            }
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for file in &self.batch.files {
            let _ = writeln!(out, "{}  {}  {}", file.name, file.mime, humanize_bytes_binary!(file.size));
        }
        let tags = parse_manual_tags(&self.batch.manual_tags);
        if !tags.is_empty() {
            let _ = writeln!(out, "tags: {}", tags.join(", "));
        }
        let _ = writeln!(out, "progress: {}%", self.progress);
        out
    }
}
