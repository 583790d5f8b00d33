//! Filesystem certificate scanner (§4.2.4).

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use x509_parser::pem::parse_x509_pem;

/// Conventional locations certificates are found on a Docker/Compose host.
const SCAN_LOCATIONS: &[&str] = &[
    "/etc/letsencrypt/live",
    "/etc/ssl/certs",
    "/etc/nginx/ssl",
    "/etc/traefik/certs",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertStatus {
    Ok,
    Warning,
    Critical,
    Expired,
}

impl std::fmt::Display for CertStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Ok => "OK",
            Self::Warning => "WARNING",
            Self::Critical => "CRITICAL",
            Self::Expired => "EXPIRED",
        };
        write!(f, "{s}")
    }
}

/// Classifies days-until-expiry into a [`CertStatus`], per §4.2.4:
/// EXPIRED ≤ 0, CRITICAL < 7, WARNING < `warn_days`, else OK.
pub fn classify(days_until_expiry: i64, warn_days: i64) -> CertStatus {
    if days_until_expiry <= 0 {
        CertStatus::Expired
    } else if days_until_expiry < 7 {
        CertStatus::Critical
    } else if days_until_expiry < warn_days {
        CertStatus::Warning
    } else {
        CertStatus::Ok
    }
}

#[derive(Debug, Clone)]
pub struct CertFinding {
    pub domain: String,
    pub path: PathBuf,
    pub not_after: DateTime<Utc>,
    pub days_until_expiry: i64,
    pub status: CertStatus,
}

/// Walks `SCAN_LOCATIONS`, parses every `.pem`/`.crt` file found, and
/// deduplicates findings by domain (CN of the leaf certificate).
pub async fn scan_filesystem(warn_days: i64) -> Vec<CertFinding> {
    let mut by_domain: HashMap<String, CertFinding> = HashMap::new();
    for location in SCAN_LOCATIONS {
        scan_dir(Path::new(location), warn_days, &mut by_domain).await;
    }
    let mut findings: Vec<_> = by_domain.into_values().collect();
    findings.sort_by(|a, b| a.domain.cmp(&b.domain));
    findings
}

async fn scan_dir(dir: &Path, warn_days: i64, out: &mut HashMap<String, CertFinding>) {
    let Ok(mut entries) = tokio::fs::read_dir(dir).await else {
        return;
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        if path.is_dir() {
            Box::pin(scan_dir(&path, warn_days, out)).await;
            continue;
        }
        let is_cert_file = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| matches!(e, "pem" | "crt"))
            .unwrap_or(false);
        if !is_cert_file {
            continue;
        }
        if let Ok(bytes) = tokio::fs::read(&path).await {
            if let Some(finding) = parse_cert_file(&path, &bytes, warn_days) {
                out.entry(finding.domain.clone()).or_insert(finding);
            }
        }
    }
}

fn parse_cert_file(path: &Path, bytes: &[u8], warn_days: i64) -> Option<CertFinding> {
    let (_, pem) = parse_x509_pem(bytes).ok()?;
    let cert = pem.parse_x509().ok()?;
    let subject = cert.subject();
    let domain = subject
        .iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| path.display().to_string());

    let not_after = cert.validity().not_after;
    let not_after_utc = DateTime::from_timestamp(not_after.timestamp(), 0)?;
    let days = (not_after_utc - Utc::now()).num_days();

    Some(CertFinding {
        domain,
        path: path.to_path_buf(),
        not_after: not_after_utc,
        days_until_expiry: days,
        status: classify(days, warn_days),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_boundaries() {
        assert_eq!(classify(-1, 30), CertStatus::Expired);
        assert_eq!(classify(0, 30), CertStatus::Expired);
        assert_eq!(classify(6, 30), CertStatus::Critical);
        assert_eq!(classify(15, 30), CertStatus::Warning);
        assert_eq!(classify(60, 30), CertStatus::Ok);
    }
}
