use crate::core::Storage;
use crate::utils::error::Result;
use crate::utils::validation::{sanitize_file_name, validate_job_id};
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }
}

impl Storage for LocalStorage {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let full_path = self.base_path.join(path);
        let data = tokio::fs::read(full_path).await?;
        Ok(data)
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let full_path = self.base_path.join(path);

        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(full_path, data).await?;
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(tokio::fs::try_exists(self.base_path.join(path)).await?)
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.base_path.join(path)
    }
}

/// 上傳與輸出的暫存目錄
#[derive(Debug, Clone)]
pub struct Workspace {
    upload_dir: PathBuf,
    output_dir: PathBuf,
}

/// 單一工作的目錄
#[derive(Debug, Clone)]
pub struct JobDirs {
    pub id: Uuid,
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl JobDirs {
    pub fn input_storage(&self) -> LocalStorage {
        LocalStorage::new(&self.input_dir)
    }

    pub fn output_storage(&self) -> LocalStorage {
        LocalStorage::new(&self.output_dir)
    }
}

impl Workspace {
    pub fn new(upload_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            output_dir: output_dir.into(),
        }
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// 啟動時建立暫存目錄
    pub async fn prepare(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.upload_dir).await?;
        tokio::fs::create_dir_all(&self.output_dir).await?;
        tracing::info!(
            "📁 Workspace ready (uploads: {}, outputs: {})",
            self.upload_dir.display(),
            self.output_dir.display()
        );
        Ok(())
    }

    pub async fn create_job(&self) -> Result<JobDirs> {
        let id = Uuid::new_v4();
        let dirs = self.job_dirs(id);
        tokio::fs::create_dir_all(&dirs.input_dir).await?;
        tokio::fs::create_dir_all(&dirs.output_dir).await?;
        tracing::debug!("Created job directories for {}", id);
        Ok(dirs)
    }

    pub fn job_dirs(&self, id: Uuid) -> JobDirs {
        let key = id.to_string();
        JobDirs {
            id,
            input_dir: self.upload_dir.join(&key),
            output_dir: self.output_dir.join(&key),
        }
    }

    /// 由字串 id 取得目錄，非 UUID 直接拒絕
    pub fn lookup_job(&self, raw_id: &str) -> Result<JobDirs> {
        let id = validate_job_id(raw_id)?;
        Ok(self.job_dirs(id))
    }

    /// 把上傳內容寫入工作目錄，回傳實際路徑
    pub async fn store_upload(&self, job: &JobDirs, file_name: &str, data: &[u8]) -> Result<PathBuf> {
        let safe_name = sanitize_file_name(file_name)?;
        let storage = job.input_storage();

        let mut candidate = safe_name.clone();
        let mut counter = 1;
        while tokio::fs::try_exists(storage.resolve(&candidate)).await? {
            candidate = dedupe_name(&safe_name, counter);
            counter += 1;
        }

        storage.write_file(&candidate, data).await?;
        Ok(storage.resolve(&candidate))
    }

    pub async fn remove_job_inputs(&self, job: &JobDirs) -> Result<()> {
        if tokio::fs::try_exists(&job.input_dir).await? {
            tokio::fs::remove_dir_all(&job.input_dir).await?;
        }
        Ok(())
    }

    /// 失敗的工作連同輸出一併移除
    pub async fn remove_job(&self, job: &JobDirs) -> Result<()> {
        self.remove_job_inputs(job).await?;
        if tokio::fs::try_exists(&job.output_dir).await? {
            tokio::fs::remove_dir_all(&job.output_dir).await?;
        }
        Ok(())
    }
}

fn dedupe_name(name: &str, counter: usize) -> String {
    let path = Path::new(name);
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or(name);
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{}_{}.{}", stem, counter, ext),
        None => format!("{}_{}", stem, counter),
    }
}
