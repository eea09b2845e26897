//! 작업(job) 감사 로그 레코드.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 작업 종료 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Ok,
    Error,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Ok => "ok",
            JobStatus::Error => "error",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ok" => Ok(JobStatus::Ok),
            "error" => Ok(JobStatus::Error),
            other => Err(format!("Unknown job status: {}", other)),
        }
    }
}

/// `job_logs` 테이블의 한 행.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    /// 작업 이름 (`train`, `ingest`, `backfill`, `apply`, `futures`)
    pub job_name: String,
    pub status: JobStatus,
    pub message: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl JobRecord {
    /// 성공 레코드를 생성합니다.
    pub fn ok(
        job_name: impl Into<String>,
        message: impl Into<String>,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    ) -> Self {
        Self {
            job_name: job_name.into(),
            status: JobStatus::Ok,
            message: message.into(),
            started_at,
            finished_at,
        }
    }

    /// 실패 레코드를 생성합니다.
    pub fn error(
        job_name: impl Into<String>,
        message: impl Into<String>,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    ) -> Self {
        Self {
            status: JobStatus::Error,
            ..Self::ok(job_name, message, started_at, finished_at)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip_str() {
        assert_eq!("ok".parse::<JobStatus>().unwrap(), JobStatus::Ok);
        assert_eq!(JobStatus::Error.to_string(), "error");
        assert!("running".parse::<JobStatus>().is_err());
    }
}
