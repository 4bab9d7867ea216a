// Upload of a single file as a Colander artifact.
//
// The artifact type is either named by the caller or picked through a
// `TypeResolver` (the terminal prompt in `ui`, or a fixed answer in
// scripts and tests). Attributes from a `<file>.metadata.json` sidecar are
// merged under the caller-provided ones.

use crate::api::{Artifact, ArtifactType, ColanderClient};
use crate::error::{Error, Result};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const SIDECAR_SUFFIX: &str = ".metadata.json";

/// Chooses an artifact type short name for a file.
pub trait TypeResolver {
    fn resolve(&self, path: &Path, types: &[ArtifactType]) -> Result<String>;
}

/// Always answers with the same short name.
pub struct FixedType(pub String);

impl TypeResolver for FixedType {
    fn resolve(&self, _path: &Path, _types: &[ArtifactType]) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// Interpret `input` as an index into `types`.
pub fn choose_type<'t>(types: &'t [ArtifactType], input: &str) -> Result<&'t ArtifactType> {
    let index: usize = input
        .trim()
        .parse()
        .map_err(|_| Error::InvalidChoice(format!("{:?} is not a number", input.trim())))?;
    types.get(index).ok_or_else(|| {
        Error::InvalidChoice(format!(
            "{} is out of range (0-{})",
            index,
            types.len().saturating_sub(1)
        ))
    })
}

/// Receives upload progress as `(phase, percent_delta, status)`.
pub trait ProgressSink {
    fn update(&mut self, phase: &str, percent_delta: f64, status: &str);

    /// Called once the upload of one artifact is complete.
    fn finish(&mut self) {}
}

/// Discards progress updates.
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn update(&mut self, _phase: &str, _percent_delta: f64, _status: &str) {}
}

/// How the artifact type gets decided.
#[derive(Clone, Copy)]
pub enum TypeChoice<'r> {
    Named(&'r str),
    Ask(&'r dyn TypeResolver),
}

pub fn sidecar_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{}{}", name, SIDECAR_SUFFIX))
}

/// Sidecar attributes form the base; keys already in `attributes` win.
pub fn merge_sidecar(path: &Path, attributes: Map<String, Value>) -> Result<Map<String, Value>> {
    let sidecar = sidecar_path(path);
    if !sidecar.is_file() {
        return Ok(attributes);
    }
    debug!(sidecar = %sidecar.display(), "merging sidecar metadata");
    let data = std::fs::read_to_string(&sidecar)?;
    let mut merged: Map<String, Value> = serde_json::from_str(&data)?;
    merged.extend(attributes);
    Ok(merged)
}

pub struct ArtifactCollector<'a> {
    client: &'a dyn ColanderClient,
    artifact_path: PathBuf,
    case_id: String,
    artifact_type: ArtifactType,
    attributes: Map<String, Value>,
}

impl<'a> ArtifactCollector<'a> {
    /// Validate the file and resolve its type. No upload happens here.
    pub fn new(
        client: &'a dyn ColanderClient,
        artifact_path: impl Into<PathBuf>,
        case_id: &str,
        choice: TypeChoice<'_>,
        attributes: Map<String, Value>,
    ) -> Result<Self> {
        let artifact_path = artifact_path.into();
        if !artifact_path.is_file() {
            return Err(Error::InvalidInput(format!(
                "{} is not a file",
                artifact_path.display()
            )));
        }
        let attributes = merge_sidecar(&artifact_path, attributes)?;

        let short_name = match choice {
            TypeChoice::Named(name) => name.to_string(),
            TypeChoice::Ask(resolver) => {
                let types = client.get_artifact_types()?;
                resolver.resolve(&artifact_path, &types)?
            }
        };
        let artifact_type = client
            .get_artifact_type_by_short_name(&short_name)?
            .ok_or(Error::UnknownArtifactType(short_name))?;

        Ok(ArtifactCollector {
            client,
            artifact_path,
            case_id: case_id.to_string(),
            artifact_type,
            attributes,
        })
    }

    pub fn artifact_type(&self) -> &ArtifactType {
        &self.artifact_type
    }

    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }

    /// Upload the file. On success the sink has received exactly 100 percent.
    pub fn collect(&self, progress: &mut dyn ProgressSink) -> Result<Artifact> {
        info!(
            path = %self.artifact_path.display(),
            artifact_type = %self.artifact_type.short_name,
            "start the upload"
        );
        let case = self.client.get_case(&self.case_id)?;

        let mut done = 0.0_f64;
        let mut forward = |phase: &str, delta: f64, status: &str| {
            let delta = delta.max(0.0).min(100.0 - done);
            done += delta;
            progress.update(phase, delta, status);
        };
        let uploaded = self.client.upload_artifact(
            &self.artifact_path,
            &case,
            &self.artifact_type,
            &mut forward,
            &self.attributes,
        );
        let artifact = match uploaded {
            Ok(artifact) => artifact,
            Err(e) => {
                // release the sink so the next upload starts a fresh bar
                progress.finish();
                return Err(e);
            }
        };
        if done < 100.0 {
            progress.update("upload", 100.0 - done, "done");
        }
        progress.finish();

        info!(artifact = %artifact.id, path = %self.artifact_path.display(), "artifact uploaded");
        Ok(artifact)
    }
}
