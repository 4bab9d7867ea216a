// Library root
// -----------
// Uploads PiRogue captures to a Colander case. The binary (`main.rs`) parses
// the command line and hands over to these modules.
//
// Module responsibilities:
// - `api`: the `ColanderClient` contract, server records and the blocking
//   HTTP client.
// - `config`: base URL and API key persisted under `~/.config/pirogue`.
// - `ignore`: `.colander_ignore` patterns for folder uploads.
// - `artifact`: upload of one file (type resolution, sidecar metadata,
//   progress).
// - `experiment`: manifest-driven upload of a whole experiment directory.
// - `folder`: upload of every non-ignored file of a directory.
// - `ui`: terminal prompts and progress bars.
//
// Collectors take a `&dyn ColanderClient`, so tests run them against an
// in-memory server.
pub mod api;
pub mod artifact;
pub mod config;
pub mod error;
pub mod experiment;
pub mod folder;
pub mod ignore;
pub mod ui;

pub use api::{ApiClient, ColanderClient};
pub use artifact::{
    ArtifactCollector, FixedType, NoProgress, ProgressSink, TypeChoice, TypeResolver,
};
pub use config::Configuration;
pub use error::{Error, Result};
pub use experiment::ExperimentCollector;
pub use folder::FolderCollector;
pub use ignore::IgnoreFile;
