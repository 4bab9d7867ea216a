// Upload of a whole PiRogue experiment directory.
//
// The directory holds an `experiment.json` manifest mapping a tag to the
// file captured for it:
//
// ```json
// { "network": { "file": "traffic.pcap" }, "device": { "file": "device.json" } }
// ```
//
// Each file is uploaded as an artifact whose type comes from `ROUTES`,
// the `device` entry becomes (or reuses) a device record, and everything is
// tied together in a single experiment record.
//
// Entries are processed in lexical tag order.

use crate::api::{Artifact, Case, ColanderClient, Device, Experiment, NewExperiment};
use crate::artifact::{ArtifactCollector, ProgressSink, TypeChoice, TypeResolver};
use crate::error::{Error, Result};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};

pub const MANIFEST_FILE_NAME: &str = "experiment.json";
pub const DEVICE_TAG: &str = "device";
pub const DEVICE_TYPE: &str = "MOBILE";
/// Artifact type of any tag missing from [`ROUTES`].
pub const OTHER_TYPE: &str = "OTHER";

/// A well-known manifest tag: its artifact type and its experiment slot.
pub struct Route {
    pub tag: &'static str,
    pub artifact_type: &'static str,
    pub slot: fn(&mut NewExperiment) -> &mut Option<Artifact>,
}

pub const ROUTES: &[Route] = &[
    Route {
        tag: "network",
        artifact_type: "PCAP",
        slot: |e| &mut e.pcap,
    },
    Route {
        tag: "socket_traces",
        artifact_type: "SOCKET_T",
        slot: |e| &mut e.socket_trace,
    },
    Route {
        tag: "crypto_traces",
        artifact_type: "CRYPTO_T",
        slot: |e| &mut e.aes_trace,
    },
    Route {
        tag: "sslkeylog",
        artifact_type: "SSLKEYLOG",
        slot: |e| &mut e.sslkeylog,
    },
    Route {
        tag: "screen",
        artifact_type: "VIDEO",
        slot: |e| &mut e.screencast,
    },
];

pub fn artifact_type_for(tag: &str) -> &'static str {
    ROUTES
        .iter()
        .find(|r| r.tag == tag)
        .map(|r| r.artifact_type)
        .unwrap_or(OTHER_TYPE)
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct ManifestEntry {
    /// Path relative to the experiment directory.
    pub file: String,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

pub type Manifest = BTreeMap<String, ManifestEntry>;

pub fn load_manifest(path: &Path) -> Result<Manifest> {
    let data = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&data)?)
}

/// Resolve a manifest `file` inside the experiment directory. Absolute
/// paths and `..` components are rejected.
pub fn entry_path(experiment_path: &Path, file: &str) -> Result<PathBuf> {
    let relative = Path::new(file);
    let escapes = relative.components().any(|c| {
        matches!(
            c,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });
    if file.is_empty() || escapes {
        return Err(Error::InvalidInput(format!(
            "{:?} is not a path inside the experiment directory",
            file
        )));
    }
    Ok(experiment_path.join(relative))
}

/// Create an empty stand-in when a declared file was never captured:
/// `[]` for `.json` files, a single newline otherwise.
pub fn ensure_file(path: &Path) -> Result<()> {
    if !path.exists() {
        let placeholder = if path.to_string_lossy().ends_with(".json") {
            "[]"
        } else {
            "\n"
        };
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(path, placeholder)?;
        debug!(path = %path.display(), "created placeholder");
    }
    if !path.is_file() {
        return Err(Error::InvalidInput(format!("{} not found", path.display())));
    }
    Ok(())
}

/// Anything but a JSON object (e.g. a `[]` placeholder) reads as an empty
/// description.
pub fn read_device_description(path: &Path) -> Result<Map<String, Value>> {
    let data = std::fs::read_to_string(path)?;
    match serde_json::from_str::<Value>(&data)? {
        Value::Object(map) => Ok(map),
        _ => {
            warn!(path = %path.display(), "device description is not an object");
            Ok(Map::new())
        }
    }
}

/// `"{brand} - {model} ({imei})"`.
pub fn device_name(description: &Map<String, Value>) -> String {
    let field = |key: &str, default: &str| match description.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => default.to_string(),
        Some(other) => other.to_string(),
    };
    format!(
        "{} - {} ({})",
        field("brand", "Generic"),
        field("model", "no model"),
        field("imei", "xxx")
    )
}

/// Reuse the first device of `case` with the same name, else create one.
pub fn find_or_create_device(
    client: &dyn ColanderClient,
    case: &Case,
    description: Map<String, Value>,
) -> Result<Device> {
    let name = device_name(&description);
    if let Some(device) = client.get_devices(case, &name)?.into_iter().next() {
        debug!(device = %device.id, name = %name, "reusing existing device");
        return Ok(device);
    }
    let device_type = client
        .get_device_type_by_short_name(DEVICE_TYPE)?
        .ok_or_else(|| Error::UnknownDeviceType(DEVICE_TYPE.to_string()))?;
    let device = client.create_device(&name, case, &device_type, &description)?;
    info!(device = %device.id, name = %name, "device created");
    Ok(device)
}

/// Move the well-known tags into their slots; whatever is left becomes
/// `extra_files`.
pub fn assemble(
    name: &str,
    mut uploaded: BTreeMap<String, Artifact>,
    target_device: Option<Device>,
    target_artifact: Option<Artifact>,
) -> NewExperiment {
    let mut experiment = NewExperiment {
        name: name.to_string(),
        target_device,
        target_artifact,
        ..Default::default()
    };
    for route in ROUTES {
        *(route.slot)(&mut experiment) = uploaded.remove(route.tag);
    }
    experiment.extra_files = uploaded.into_values().collect();
    experiment
}

pub struct ExperimentCollector<'a> {
    client: &'a dyn ColanderClient,
    resolver: &'a dyn TypeResolver,
    experiment_path: PathBuf,
    manifest_path: PathBuf,
    case_id: String,
    experiment_name: String,
    target_artifact_path: Option<PathBuf>,
}

impl<'a> ExperimentCollector<'a> {
    /// Checks the directory and its manifest; nothing is sent to the server.
    pub fn new(
        client: &'a dyn ColanderClient,
        resolver: &'a dyn TypeResolver,
        experiment_path: impl Into<PathBuf>,
        case_id: &str,
        experiment_name: &str,
        target_artifact_path: Option<PathBuf>,
    ) -> Result<Self> {
        let experiment_path = experiment_path.into();
        if !experiment_path.is_dir() {
            return Err(Error::InvalidInput(format!(
                "{} is not a directory",
                experiment_path.display()
            )));
        }
        let manifest_path = experiment_path.join(MANIFEST_FILE_NAME);
        if !manifest_path.is_file() {
            return Err(Error::InvalidInput(format!(
                "{} not found",
                manifest_path.display()
            )));
        }
        Ok(ExperimentCollector {
            client,
            resolver,
            experiment_path,
            manifest_path,
            case_id: case_id.to_string(),
            experiment_name: experiment_name.to_string(),
            target_artifact_path,
        })
    }

    /// Upload every manifest entry and create the experiment. The first
    /// failure aborts; artifacts uploaded before it stay on the server.
    pub fn collect(&self, progress: &mut dyn ProgressSink) -> Result<Experiment> {
        info!(manifest = %self.manifest_path.display(), "reading the experiment details");
        let manifest = load_manifest(&self.manifest_path)?;
        let case = self.client.get_case(&self.case_id)?;

        let target_artifact = match &self.target_artifact_path {
            Some(path) => Some(
                ArtifactCollector::new(
                    self.client,
                    path.clone(),
                    &self.case_id,
                    TypeChoice::Ask(self.resolver),
                    Map::new(),
                )?
                .collect(progress)?,
            ),
            None => None,
        };

        let mut uploaded = BTreeMap::new();
        let mut target_device = None;
        for (tag, entry) in manifest {
            info!(tag = %tag, file = %entry.file, "dispatch collection");
            let path = entry_path(&self.experiment_path, &entry.file)?;
            ensure_file(&path)?;

            if tag == DEVICE_TAG {
                let description = read_device_description(&path)?;
                target_device = Some(find_or_create_device(self.client, &case, description)?);
                continue;
            }
            let artifact = ArtifactCollector::new(
                self.client,
                path,
                &self.case_id,
                TypeChoice::Named(artifact_type_for(&tag)),
                entry.attributes,
            )?
            .collect(progress)?;
            uploaded.insert(tag, artifact);
        }

        let payload = assemble(&self.experiment_name, uploaded, target_device, target_artifact);
        let experiment = self.client.create_pirogue_experiment(&case, &payload)?;
        info!(
            experiment = %experiment.id,
            name = %self.experiment_name,
            "experiment successfully created"
        );
        Ok(experiment)
    }
}
