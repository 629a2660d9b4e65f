use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::CursorRow;

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub store_ok: bool,
    pub chains: Vec<String>,
    pub running: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClaimRequest {
    pub chain: String,
    pub tx: String,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CursorResponse {
    pub chain: String,
    pub last_scanned_height: u64,
    pub updated_at: DateTime<Utc>,
}

impl From<CursorRow> for CursorResponse {
    fn from(row: CursorRow) -> Self {
        Self {
            chain: row.chain,
            last_scanned_height: row.last_scanned_height,
            updated_at: row.updated_at,
        }
    }
}
