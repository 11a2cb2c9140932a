//! Typed analyzer verdicts.
//!
//! The backend tags every verdict with a `kind` string and an opaque `value`. Decoding
//! happens once, when a result is deserialized, so everything past the stream boundary
//! works with [`Verdict`] instead of raw JSON.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use triage_logging::{triage_debug, CLASSIFY_TARGET};

/// Verdict kind discriminators as sent by the backend.
pub mod kind {
    pub const URL: &str = "url";
    pub const DOMAIN: &str = "domain";
    pub const AUTH_DKIM: &str = "auth-dkim";
    pub const AUTH_SPF: &str = "auth-spf";
    pub const AUTH_ARC_CHAIN: &str = "auth-arc-chain";
    pub const AUTH_DMARC: &str = "auth-dmarc";
    pub const NLP_SUMMARY: &str = "nlp-summary";
    pub const ENTITY: &str = "entity";
    pub const ENTITY_INVESTIGATION: &str = "entity-investigation";
    pub const ERROR: &str = "error";
}

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Url(Lookup<UrlReport>),
    Domain(Lookup<DomainReport>),
    AuthDkim(DkimResult),
    AuthSpf(SpfResult),
    AuthArcChain(DkimVerdict),
    AuthDmarc(DmarcResult),
    Summary(String),
    Entity(EntityKey),
    EntityInvestigation {
        entity: EntityKey,
        investigation: Value,
    },
    Error(String),
    /// Unrecognized kind, or a recognized kind whose payload did not decode.
    Unknown { kind: String, value: Value },
}

impl Verdict {
    pub fn decode(kind: &str, value: Value) -> Self {
        match kind {
            kind::URL => Verdict::Url(Lookup::decode(value)),
            kind::DOMAIN => Verdict::Domain(Lookup::decode(value)),
            kind::AUTH_DKIM => decode_payload(kind, value, Verdict::AuthDkim),
            kind::AUTH_SPF => decode_payload(kind, value, Verdict::AuthSpf),
            kind::AUTH_ARC_CHAIN => decode_payload(kind, value, Verdict::AuthArcChain),
            kind::AUTH_DMARC => decode_payload(kind, value, Verdict::AuthDmarc),
            kind::NLP_SUMMARY => match value {
                Value::String(text) => Verdict::Summary(text),
                other => decode_payload(kind, other, |payload: SummaryPayload| {
                    Verdict::Summary(payload.summary)
                }),
            },
            kind::ENTITY => decode_payload(kind, value, Verdict::Entity),
            kind::ENTITY_INVESTIGATION => {
                decode_payload(kind, value, |payload: InvestigationPayload| {
                    Verdict::EntityInvestigation {
                        entity: payload.entity,
                        investigation: payload.investigation,
                    }
                })
            }
            kind::ERROR => match value {
                Value::String(message) => Verdict::Error(message),
                other => Verdict::Error(other.to_string()),
            },
            _ => Verdict::Unknown {
                kind: kind.to_string(),
                value,
            },
        }
    }

    pub fn kind(&self) -> &str {
        match self {
            Verdict::Url(_) => kind::URL,
            Verdict::Domain(_) => kind::DOMAIN,
            Verdict::AuthDkim(_) => kind::AUTH_DKIM,
            Verdict::AuthSpf(_) => kind::AUTH_SPF,
            Verdict::AuthArcChain(_) => kind::AUTH_ARC_CHAIN,
            Verdict::AuthDmarc(_) => kind::AUTH_DMARC,
            Verdict::Summary(_) => kind::NLP_SUMMARY,
            Verdict::Entity(_) => kind::ENTITY,
            Verdict::EntityInvestigation { .. } => kind::ENTITY_INVESTIGATION,
            Verdict::Error(_) => kind::ERROR,
            Verdict::Unknown { kind, .. } => kind,
        }
    }
}

#[derive(Deserialize)]
struct RawVerdict {
    kind: String,
    #[serde(default)]
    value: Value,
}

impl<'de> Deserialize<'de> for Verdict {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = RawVerdict::deserialize(deserializer)?;
        Ok(Verdict::decode(&raw.kind, raw.value))
    }
}

fn decode_payload<T: DeserializeOwned>(
    kind: &str,
    value: Value,
    wrap: impl FnOnce(T) -> Verdict,
) -> Verdict {
    match T::deserialize(&value) {
        Ok(payload) => wrap(payload),
        Err(err) => {
            triage_debug!(target: CLASSIFY_TARGET, "undecodable {kind} verdict kept as unknown: {err}");
            Verdict::Unknown {
                kind: kind.to_string(),
                value,
            }
        }
    }
}

#[derive(Deserialize)]
struct SummaryPayload {
    summary: String,
}

#[derive(Deserialize)]
struct InvestigationPayload {
    #[serde(flatten)]
    entity: EntityKey,
    #[serde(default)]
    investigation: Value,
}

/// Composite identity of an extracted entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
pub struct EntityKey {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
}

impl EntityKey {
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
        }
    }
}

/// Outcome of a reputation lookup: the report, or the error the lookup service returned.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<T> {
    Found(T),
    Failed(LookupError),
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct LookupError {
    pub code: String,
    pub message: String,
}

impl LookupError {
    fn malformed(message: impl Into<String>) -> Self {
        Self {
            code: "MalformedReport".to_string(),
            message: message.into(),
        }
    }
}

#[derive(Deserialize)]
struct Envelope<T> {
    data: Option<T>,
    error: Option<LookupError>,
}

impl<T: DeserializeOwned> Lookup<T> {
    /// Decodes `{"data": ..}` / `{"error": ..}`, given either as an object or as a
    /// JSON-encoded string.
    fn decode(value: Value) -> Self {
        let parsed = match &value {
            Value::String(text) => serde_json::from_str::<Envelope<T>>(text),
            other => Envelope::<T>::deserialize(other),
        };
        match parsed {
            Ok(Envelope {
                data: Some(report), ..
            }) => Lookup::Found(report),
            Ok(Envelope {
                error: Some(error), ..
            }) => Lookup::Failed(error),
            Ok(_) => Lookup::Failed(LookupError::malformed(
                "report carries neither data nor error",
            )),
            Err(err) => Lookup::Failed(LookupError::malformed(err.to_string())),
        }
    }
}

impl<T> Lookup<T> {
    pub fn found(&self) -> Option<&T> {
        match self {
            Lookup::Found(report) => Some(report),
            Lookup::Failed(_) => None,
        }
    }
}

/// Reports that carry a reputation score and labels.
pub trait Reputation {
    fn reputation(&self) -> i64;
    fn tags(&self) -> &[String];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct AnalysisStats {
    pub harmless: u32,
    pub malicious: u32,
    pub suspicious: u32,
    pub timeout: u32,
    pub undetected: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct CommunityVotes {
    pub harmless: u32,
    pub malicious: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct UrlReport {
    pub id: String,
    pub attributes: UrlAttributes,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct UrlAttributes {
    pub url: String,
    pub title: String,
    pub last_final_url: String,
    pub reputation: i64,
    pub times_submitted: u64,
    pub last_analysis_date: i64,
    pub last_analysis_stats: AnalysisStats,
    pub total_votes: CommunityVotes,
    pub categories: BTreeMap<String, String>,
    pub tags: Vec<String>,
    pub redirection_chain: Vec<String>,
    pub targeted_brand: BTreeMap<String, String>,
}

impl Reputation for UrlReport {
    fn reputation(&self) -> i64 {
        self.attributes.reputation
    }

    fn tags(&self) -> &[String] {
        &self.attributes.tags
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct DomainReport {
    pub id: String,
    pub attributes: DomainAttributes,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct DomainAttributes {
    pub registrar: String,
    pub whois: String,
    pub whois_date: i64,
    pub creation_date: i64,
    pub last_analysis_date: i64,
    pub reputation: i64,
    pub last_analysis_stats: AnalysisStats,
    pub total_votes: CommunityVotes,
    pub categories: BTreeMap<String, String>,
    pub tags: Vec<String>,
    pub last_dns_records: Vec<DnsRecord>,
}

impl Reputation for DomainReport {
    fn reputation(&self) -> i64 {
        self.attributes.reputation
    }

    fn tags(&self) -> &[String] {
        &self.attributes.tags
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct DnsRecord {
    #[serde(rename = "type")]
    pub record_type: String,
    pub value: String,
    pub ttl: u64,
}

/// DKIM verdict per signature selector.
pub type DkimResult = BTreeMap<String, DkimVerdict>;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum DkimVerdict {
    Pass,
    #[serde(rename = "None")]
    NoSignature,
    Neutral(String),
    Fail(String),
    PermError(String),
    TempError(String),
}

impl DkimVerdict {
    pub fn is_pass(&self) -> bool {
        matches!(self, DkimVerdict::Pass)
    }

    pub fn label(&self) -> &'static str {
        match self {
            DkimVerdict::Pass => "pass",
            DkimVerdict::NoSignature => "none",
            DkimVerdict::Neutral(_) => "neutral",
            DkimVerdict::Fail(_) => "fail",
            DkimVerdict::PermError(_) => "permerror",
            DkimVerdict::TempError(_) => "temperror",
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            DkimVerdict::Pass | DkimVerdict::NoSignature => None,
            DkimVerdict::Neutral(reason)
            | DkimVerdict::Fail(reason)
            | DkimVerdict::PermError(reason)
            | DkimVerdict::TempError(reason) => Some(reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SpfResult {
    pub domain: String,
    pub result: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DmarcResult {
    pub dkim: String,
    pub spf: String,
}
