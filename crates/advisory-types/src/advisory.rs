//! CVE Record Format 5.x advisory model.
//!
//! Field names follow the published JSON schema (camelCase). Timestamps in
//! the wild come in two flavors: RFC 3339 with a zone offset, or a bare
//! `YYYY-MM-DDTHH:MM:SS` which is interpreted as UTC; [`flexible_time`]
//! accepts both.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One advisory record as published in the CVE 5.x JSON format.
///
/// The document identity (store/index key) is derived from the source file
/// name and lives outside this struct.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Advisory {
    pub data_type: String,
    pub data_version: String,
    pub cve_metadata: AdvisoryMetadata,
    pub containers: Containers,
}

impl Advisory {
    /// Publish timestamp used for recency ordering.
    ///
    /// Records without a `datePublished` sort as the Unix epoch, before any
    /// realistically dated advisory.
    pub fn published_at(&self) -> DateTime<Utc> {
        self.cve_metadata
            .date_published
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }

    /// First CVSS base severity found in the CNA metrics, if any.
    pub fn severity(&self) -> Option<&str> {
        self.containers.cna.metrics.iter().find_map(|m| {
            [&m.cvss_v4_0, &m.cvss_v3_1, &m.cvss_v3_0]
                .into_iter()
                .flatten()
                .map(|c| c.base_severity.as_str())
                .find(|s| !s.is_empty())
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AdvisoryMetadata {
    pub cve_id: String,
    pub assigner_org_id: String,
    pub state: String,
    pub assigner_short_name: String,
    #[serde(with = "flexible_time")]
    pub date_reserved: Option<DateTime<Utc>>,
    #[serde(with = "flexible_time")]
    pub date_published: Option<DateTime<Utc>>,
    #[serde(with = "flexible_time")]
    pub date_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Containers {
    pub cna: Cna,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Cna {
    pub provider_metadata: ProviderMetadata,
    pub title: String,
    pub problem_types: Vec<ProblemType>,
    pub affected: Vec<Affected>,
    pub descriptions: Vec<LocalizedText>,
    pub metrics: Vec<Metric>,
    pub timeline: Vec<TimelineEntry>,
    pub credits: Vec<Credit>,
    pub references: Vec<Reference>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProviderMetadata {
    pub org_id: String,
    pub short_name: String,
    #[serde(with = "flexible_time")]
    pub date_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProblemType {
    pub descriptions: Vec<ProblemTypeDescription>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProblemTypeDescription {
    #[serde(rename = "type")]
    pub kind: String,
    pub cwe_id: String,
    pub lang: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Affected {
    pub vendor: String,
    pub product: String,
    pub versions: Vec<VersionStatus>,
    pub modules: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VersionStatus {
    pub version: String,
    pub status: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalizedText {
    pub lang: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Metric {
    #[serde(rename = "cvssV4_0", skip_serializing_if = "Option::is_none")]
    pub cvss_v4_0: Option<Cvss>,
    #[serde(rename = "cvssV3_1", skip_serializing_if = "Option::is_none")]
    pub cvss_v3_1: Option<Cvss>,
    #[serde(rename = "cvssV3_0", skip_serializing_if = "Option::is_none")]
    pub cvss_v3_0: Option<Cvss>,
    #[serde(rename = "cvssV2_0", skip_serializing_if = "Option::is_none")]
    pub cvss_v2_0: Option<CvssV2>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Cvss {
    pub version: String,
    pub base_score: f64,
    pub vector_string: String,
    pub base_severity: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CvssV2 {
    pub version: String,
    pub base_score: f64,
    pub vector_string: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineEntry {
    #[serde(with = "flexible_time")]
    pub time: Option<DateTime<Utc>>,
    pub lang: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Credit {
    pub lang: String,
    pub value: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Reference {
    pub url: String,
    pub name: String,
    pub tags: Vec<String>,
}

/// Serde helper accepting RFC 3339 timestamps or timezone-less
/// `YYYY-MM-DDTHH:MM:SS[.fff]` (taken as UTC).
pub mod flexible_time {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    const NAIVE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

    /// Parse a timestamp string in either accepted format.
    pub fn parse(s: &str) -> Option<DateTime<Utc>> {
        if let Ok(t) = DateTime::parse_from_rfc3339(s) {
            return Some(t.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(s, NAIVE_FORMAT)
            .ok()
            .map(|t| t.and_utc())
    }

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, ser: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(t) => ser.serialize_str(&t.to_rfc3339()),
            None => ser.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(de: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(de)? {
            None => Ok(None),
            Some(s) if s.is_empty() => Ok(None),
            Some(s) => parse(&s)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid time format: {s}"))),
        }
    }
}
