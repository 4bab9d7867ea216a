//! In-memory Colander server shared by the integration tests.
#![allow(dead_code)]

use pirogue_colander::api::{
    Artifact, ArtifactType, Case, ColanderClient, Device, DeviceType, Experiment, NewExperiment,
};
use pirogue_colander::{Error, ProgressSink, Result};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub struct Upload {
    pub path: PathBuf,
    pub artifact_type: String,
    pub attributes: Map<String, Value>,
    pub artifact: Artifact,
}

pub struct CreatedDevice {
    pub device: Device,
    pub device_type: String,
    pub attributes: Map<String, Value>,
}

#[derive(Default)]
pub struct State {
    pub uploads: Vec<Upload>,
    pub devices: Vec<CreatedDevice>,
    pub experiments: Vec<NewExperiment>,
    pub case_lookups: usize,
    next_id: usize,
}

pub struct MockColander {
    pub artifact_types: Vec<ArtifactType>,
    /// Percent deltas reported by every upload.
    pub progress_steps: Vec<f64>,
    /// Uploads of a file with this name fail.
    pub fail_on: Option<String>,
    pub state: Mutex<State>,
}

impl MockColander {
    pub fn new() -> Self {
        let artifact_types = ["PCAP", "SOCKET_T", "CRYPTO_T", "SSLKEYLOG", "VIDEO", "OTHER", "APK"]
            .iter()
            .enumerate()
            .map(|(i, s)| ArtifactType {
                id: format!("type-{}", i),
                name: s.to_lowercase(),
                short_name: s.to_string(),
            })
            .collect();
        MockColander {
            artifact_types,
            progress_steps: vec![40.0, 40.0],
            fail_on: None,
            state: Mutex::new(State::default()),
        }
    }

    pub fn upload_types(&self) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state.uploads.iter().map(|u| u.artifact_type.clone()).collect()
    }

    fn next_id(state: &mut State, prefix: &str) -> String {
        state.next_id += 1;
        format!("{}-{}", prefix, state.next_id)
    }
}

impl ColanderClient for MockColander {
    fn get_case(&self, id: &str) -> Result<Case> {
        self.state.lock().unwrap().case_lookups += 1;
        Ok(Case {
            id: id.to_string(),
            name: "Investigation".into(),
        })
    }

    fn get_artifact_types(&self) -> Result<Vec<ArtifactType>> {
        Ok(self.artifact_types.clone())
    }

    fn get_device_types(&self) -> Result<Vec<DeviceType>> {
        Ok(vec![DeviceType {
            id: "dt-1".into(),
            name: "Mobile device".into(),
            short_name: "MOBILE".into(),
        }])
    }

    fn get_devices(&self, _case: &Case, name: &str) -> Result<Vec<Device>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .devices
            .iter()
            .filter(|d| d.device.name == name)
            .map(|d| d.device.clone())
            .collect())
    }

    fn create_device(
        &self,
        name: &str,
        _case: &Case,
        device_type: &DeviceType,
        attributes: &Map<String, Value>,
    ) -> Result<Device> {
        let mut state = self.state.lock().unwrap();
        let device = Device {
            id: Self::next_id(&mut state, "device"),
            name: name.to_string(),
            extra: Map::new(),
        };
        state.devices.push(CreatedDevice {
            device: device.clone(),
            device_type: device_type.short_name.clone(),
            attributes: attributes.clone(),
        });
        Ok(device)
    }

    fn upload_artifact(
        &self,
        path: &Path,
        _case: &Case,
        artifact_type: &ArtifactType,
        progress: &mut dyn FnMut(&str, f64, &str),
        attributes: &Map<String, Value>,
    ) -> Result<Artifact> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if self.fail_on.as_deref() == Some(name.as_str()) {
            return Err(Error::Api {
                status: 500,
                body: "upload rejected".into(),
            });
        }
        for step in &self.progress_steps {
            progress("upload", *step, "PROCESSING");
        }
        let mut state = self.state.lock().unwrap();
        let artifact = Artifact {
            id: Self::next_id(&mut state, "artifact"),
            name,
            extra: Map::new(),
        };
        state.uploads.push(Upload {
            path: path.to_path_buf(),
            artifact_type: artifact_type.short_name.clone(),
            attributes: attributes.clone(),
            artifact: artifact.clone(),
        });
        Ok(artifact)
    }

    fn create_pirogue_experiment(
        &self,
        _case: &Case,
        experiment: &NewExperiment,
    ) -> Result<Experiment> {
        let mut state = self.state.lock().unwrap();
        let id = Self::next_id(&mut state, "experiment");
        state.experiments.push(experiment.clone());
        Ok(Experiment {
            id,
            name: experiment.name.clone(),
            extra: Map::new(),
        })
    }
}

/// Remembers every progress update.
#[derive(Default)]
pub struct Recorder {
    pub updates: Vec<(String, f64, String)>,
    pub finished: usize,
}

impl Recorder {
    pub fn total(&self) -> f64 {
        self.updates.iter().map(|(_, d, _)| d).sum()
    }
}

impl ProgressSink for Recorder {
    fn update(&mut self, phase: &str, percent_delta: f64, status: &str) {
        self.updates
            .push((phase.to_string(), percent_delta, status.to_string()));
    }

    fn finish(&mut self) {
        self.finished += 1;
    }
}
