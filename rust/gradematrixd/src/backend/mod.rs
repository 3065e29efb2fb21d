pub mod http;
pub mod local;

use crate::matrix::model::{GradeOption, RawMatrix, SavePayload, SessionKey};

pub use http::HttpBackend;
pub use local::LocalStore;

/// Read side of the school API.
pub trait MatrixSource: Send + Sync {
    fn fetch_matrix(&self, key: &SessionKey) -> anyhow::Result<RawMatrix>;
    fn fetch_grade_catalog(&self, tenant_id: i64) -> anyhow::Result<Vec<GradeOption>>;
}

/// Write side. Success is transport-level only; no response body is read.
pub trait PersistenceSink: Send + Sync {
    fn save_matrix(&self, payload: &SavePayload) -> anyhow::Result<()>;
}

/// Whatever the sidecar is currently connected to.
pub trait Backend: MatrixSource + PersistenceSink {
    fn kind(&self) -> &'static str;
}
