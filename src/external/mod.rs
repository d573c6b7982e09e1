pub mod job_source;
pub mod nomad;

pub use job_source::{JobSource, RemoteFetchError};
pub use nomad::NomadClient;
