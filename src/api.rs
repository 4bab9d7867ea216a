// API client module: the contract the collectors rely on (`ColanderClient`)
// plus a small blocking HTTP implementation talking to a Colander server.
// The collectors only ever see the trait, so tests can swap in an
// in-memory client.

use crate::error::{Error, Result};
use reqwest::blocking::{multipart, Client, Response};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use tracing::debug;

/// Size of each chunk sent to `upload_requests/{id}/`.
pub const UPLOAD_CHUNK_SIZE: usize = 1024 * 1024;

/// A case: the remote container scoping every artifact and device.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Case {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// One entry of the server-declared artifact type enumeration.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ArtifactType {
    pub id: String,
    pub name: String,
    pub short_name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DeviceType {
    pub id: String,
    pub name: String,
    pub short_name: String,
}

/// Artifact record as assigned by the server after an upload.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Artifact {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Device {
    pub id: String,
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Experiment {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Everything needed to create a PiRogue experiment. Artifact and device
/// slots are sent to the server as identifiers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewExperiment {
    pub name: String,
    pub pcap: Option<Artifact>,
    pub socket_trace: Option<Artifact>,
    pub sslkeylog: Option<Artifact>,
    pub screencast: Option<Artifact>,
    pub aes_trace: Option<Artifact>,
    pub target_device: Option<Device>,
    pub target_artifact: Option<Artifact>,
    /// Uploaded artifacts matching none of the named slots.
    pub extra_files: Vec<Artifact>,
}

impl NewExperiment {
    /// JSON body of the `experiments/` creation request.
    pub fn to_request_body(&self, case: &Case) -> Value {
        let id = |a: &Option<Artifact>| a.as_ref().map(|a| a.id.clone());
        json!({
            "name": self.name,
            "case": case.id,
            "pcap": id(&self.pcap),
            "socket_trace": id(&self.socket_trace),
            "sslkeylog": id(&self.sslkeylog),
            "screencast": id(&self.screencast),
            "aes_trace": id(&self.aes_trace),
            "target_device": self.target_device.as_ref().map(|d| d.id.clone()),
            "target_artifact": id(&self.target_artifact),
            "extra_files": self.extra_files.iter().map(|a| a.id.clone()).collect::<Vec<_>>(),
        })
    }
}

/// Operations the collectors call on the remote case-management server.
///
/// Upload progress is reported through `progress(phase, percent_delta, status)`.
pub trait ColanderClient {
    fn get_case(&self, id: &str) -> Result<Case>;

    fn get_artifact_types(&self) -> Result<Vec<ArtifactType>>;

    fn get_artifact_type_by_short_name(&self, short_name: &str) -> Result<Option<ArtifactType>> {
        Ok(self
            .get_artifact_types()?
            .into_iter()
            .find(|t| t.short_name == short_name))
    }

    fn get_device_types(&self) -> Result<Vec<DeviceType>>;

    fn get_device_type_by_short_name(&self, short_name: &str) -> Result<Option<DeviceType>> {
        Ok(self
            .get_device_types()?
            .into_iter()
            .find(|t| t.short_name == short_name))
    }

    /// Devices of `case` whose name is exactly `name`.
    fn get_devices(&self, case: &Case, name: &str) -> Result<Vec<Device>>;

    fn create_device(
        &self,
        name: &str,
        case: &Case,
        device_type: &DeviceType,
        attributes: &Map<String, Value>,
    ) -> Result<Device>;

    fn upload_artifact(
        &self,
        path: &Path,
        case: &Case,
        artifact_type: &ArtifactType,
        progress: &mut dyn FnMut(&str, f64, &str),
        attributes: &Map<String, Value>,
    ) -> Result<Artifact>;

    fn create_pirogue_experiment(&self, case: &Case, experiment: &NewExperiment)
        -> Result<Experiment>;
}

/// Blocking HTTP client for the Colander REST API.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    api_key: String,
}

/// Server-side state of a chunked upload.
#[derive(Deserialize, Debug)]
struct UploadRequest {
    id: String,
    #[serde(default)]
    next_addr: u64,
    #[serde(default)]
    status: String,
    #[serde(default)]
    eof: bool,
}

impl ApiClient {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self> {
        let client = Client::builder().build()?;
        Ok(ApiClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1/{}", self.base_url, path)
    }

    fn auth_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        let val = HeaderValue::from_str(&format!("Token {}", self.api_key)).map_err(|_| {
            Error::InvalidConfiguration("API key is not a valid header value".into())
        })?;
        headers.insert(AUTHORIZATION, val);
        Ok(headers)
    }

    /// Turn any non-2xx answer into `Error::Api` carrying the body.
    fn check(res: Response) -> Result<Response> {
        if !res.status().is_success() {
            let status = res.status().as_u16();
            let body = res.text().unwrap_or_else(|_| "".into());
            return Err(Error::Api { status, body });
        }
        Ok(res)
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let res = self
            .client
            .get(self.url(path))
            .headers(self.auth_headers()?)
            .query(query)
            .send()?;
        Ok(Self::check(res)?.json()?)
    }

    fn post_json<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T> {
        let res = self
            .client
            .post(self.url(path))
            .headers(self.auth_headers()?)
            .json(body)
            .send()?;
        Ok(Self::check(res)?.json()?)
    }
}

/// Fill `buf` from `reader`, stopping early only at end of file.
fn read_chunk(reader: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

impl ColanderClient for ApiClient {
    fn get_case(&self, id: &str) -> Result<Case> {
        self.get_json(&format!("cases/{}/", id), &[])
    }

    fn get_artifact_types(&self) -> Result<Vec<ArtifactType>> {
        self.get_json("artifact_types/", &[])
    }

    fn get_device_types(&self) -> Result<Vec<DeviceType>> {
        self.get_json("device_types/", &[])
    }

    fn get_devices(&self, case: &Case, name: &str) -> Result<Vec<Device>> {
        let devices: Vec<Device> =
            self.get_json("devices/", &[("case_id", case.id.as_str()), ("name", name)])?;
        // the server filter may be a substring match
        Ok(devices.into_iter().filter(|d| d.name == name).collect())
    }

    fn create_device(
        &self,
        name: &str,
        case: &Case,
        device_type: &DeviceType,
        attributes: &Map<String, Value>,
    ) -> Result<Device> {
        self.post_json(
            "devices/",
            &json!({
                "name": name,
                "case": case.id,
                "type": device_type.id,
                "attributes": attributes,
            }),
        )
    }

    fn upload_artifact(
        &self,
        path: &Path,
        case: &Case,
        artifact_type: &ArtifactType,
        progress: &mut dyn FnMut(&str, f64, &str),
        attributes: &Map<String, Value>,
    ) -> Result<Artifact> {
        let size = std::fs::metadata(path)?.len();
        if size == 0 {
            return Err(Error::InvalidInput(format!(
                "{} is empty, nothing to upload",
                path.display()
            )));
        }
        let file_name = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("artifact")
            .to_string();

        let request: UploadRequest = self.post_json(
            "upload_requests/",
            &json!({ "name": file_name, "size": size }),
        )?;
        debug!(upload_request = %request.id, size, "upload request opened");

        let mut file = File::open(path)?;
        let mut buf = vec![0u8; UPLOAD_CHUNK_SIZE];
        let upload_id = request.id.clone();
        let mut state = request;
        while !state.eof {
            file.seek(SeekFrom::Start(state.next_addr))?;
            let n = read_chunk(&mut file, &mut buf)?;
            if n == 0 {
                // server still expects bytes past the end of the file
                return Err(Error::InvalidInput(format!(
                    "{} ended at byte {} before the upload completed",
                    path.display(),
                    state.next_addr
                )));
            }
            let part = multipart::Part::bytes(buf[..n].to_vec()).file_name(file_name.clone());
            let form = multipart::Form::new()
                .text("addr", state.next_addr.to_string())
                .part("file", part);
            let res = self
                .client
                .put(self.url(&format!("upload_requests/{}/", upload_id)))
                .headers(self.auth_headers()?)
                .multipart(form)
                .send()?;
            state = Self::check(res)?.json()?;
            progress("upload", n as f64 * 100.0 / size as f64, &state.status);
        }

        self.post_json(
            "artifacts/",
            &json!({
                "case": case.id,
                "type": artifact_type.id,
                "upload_request_ref": upload_id,
                "attributes": attributes,
            }),
        )
    }

    fn create_pirogue_experiment(
        &self,
        case: &Case,
        experiment: &NewExperiment,
    ) -> Result<Experiment> {
        self.post_json("experiments/", &experiment.to_request_body(case))
    }
}
