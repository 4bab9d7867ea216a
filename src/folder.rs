// Bulk upload of the files sitting directly in a directory, minus the ones
// matched by its `.colander_ignore`.

use crate::api::{Artifact, ColanderClient};
use crate::artifact::{ArtifactCollector, ProgressSink, TypeChoice, TypeResolver};
use crate::error::{Error, Result};
use crate::ignore::IgnoreFile;
use serde_json::Map;
use std::path::{Path, PathBuf};
use tracing::info;

pub struct FolderCollector<'a> {
    client: &'a dyn ColanderClient,
    folder_path: PathBuf,
    case_id: String,
    ignore: IgnoreFile,
}

impl<'a> FolderCollector<'a> {
    pub fn new(client: &'a dyn ColanderClient, folder_path: &Path, case_id: &str) -> Result<Self> {
        if !folder_path.is_dir() {
            return Err(Error::InvalidInput(format!(
                "the folder {} does not exist",
                folder_path.display()
            )));
        }
        let folder_path = folder_path.canonicalize()?;
        let ignore = IgnoreFile::load(&folder_path)?;
        Ok(FolderCollector {
            client,
            folder_path,
            case_id: case_id.to_string(),
            ignore,
        })
    }

    /// Files that would be uploaded, sorted by name.
    pub fn candidates(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.folder_path)? {
            let path = entry?.path();
            if path.is_file() && !self.ignore.is_ignored(&path) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    pub fn collect(
        &self,
        resolver: &dyn TypeResolver,
        progress: &mut dyn ProgressSink,
    ) -> Result<Vec<Artifact>> {
        info!(folder = %self.folder_path.display(), "listing files");
        let mut artifacts = Vec::new();
        for path in self.candidates()? {
            let collector = ArtifactCollector::new(
                self.client,
                path,
                &self.case_id,
                TypeChoice::Ask(resolver),
                Map::new(),
            )?;
            artifacts.push(collector.collect(progress)?);
        }
        Ok(artifacts)
    }
}
