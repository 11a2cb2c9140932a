use serde_json::Value;
use triage_logging::{triage_warn, CLASSIFY_TARGET};

use crate::verdict::{
    DkimResult, DkimVerdict, DmarcResult, DomainReport, EntityKey, Lookup, Reputation,
    SpfResult, UrlReport, Verdict,
};
use crate::{AnalysisResult, ResultId};

/// Where a result ends up in a [`ClassifiedReport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Bucket {
    Urls,
    Domains,
    Entities,
    AuthDkim,
    AuthSpf,
    AuthArcChain,
    AuthDmarc,
    Summary,
    Other,
    Error,
}

impl Bucket {
    pub fn of(verdict: &Verdict) -> Self {
        match verdict {
            Verdict::Url(_) => Bucket::Urls,
            Verdict::Domain(_) => Bucket::Domains,
            Verdict::Entity(_) | Verdict::EntityInvestigation { .. } => Bucket::Entities,
            Verdict::AuthDkim(_) => Bucket::AuthDkim,
            Verdict::AuthSpf(_) => Bucket::AuthSpf,
            Verdict::AuthArcChain(_) => Bucket::AuthArcChain,
            Verdict::AuthDmarc(_) => Bucket::AuthDmarc,
            Verdict::Summary(_) => Bucket::Summary,
            Verdict::Error(_) => Bucket::Error,
            Verdict::Unknown { .. } => Bucket::Other,
        }
    }

    /// Error results are kept for diagnostics only.
    pub fn is_displayed(self) -> bool {
        self != Bucket::Error
    }
}

/// A URL or domain lookup together with the result that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Finding<T> {
    pub result_id: ResultId,
    pub analysis_name: String,
    pub lookup: Lookup<T>,
    pub tags: Vec<String>,
}

pub type UrlFinding = Finding<UrlReport>;
pub type DomainFinding = Finding<DomainReport>;

impl<T: Reputation> Finding<T> {
    fn new(result: &AnalysisResult, lookup: &Lookup<T>) -> Self
    where
        T: Clone,
    {
        let tags = lookup
            .found()
            .map(|report| report.tags().to_vec())
            .unwrap_or_default();
        Self {
            result_id: result.id,
            analysis_name: result.analysis_name.clone(),
            lookup: lookup.clone(),
            tags,
        }
    }

    /// `None` for failed lookups.
    pub fn reputation(&self) -> Option<i64> {
        self.lookup.found().map(Reputation::reputation)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub key: EntityKey,
    pub result_id: ResultId,
    pub investigation: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisFailure {
    pub result_id: ResultId,
    pub analysis_name: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// An investigation arrived for an entity that was not discovered before it.
    OrphanInvestigation {
        result_id: ResultId,
        entity: EntityKey,
    },
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClassifiedReport {
    pub urls: Vec<UrlFinding>,
    pub domains: Vec<DomainFinding>,
    pub entities: Vec<Entity>,
    pub dkim: Option<DkimResult>,
    pub spf: Option<SpfResult>,
    pub arc_chain: Option<DkimVerdict>,
    pub dmarc: Option<DmarcResult>,
    pub summary: Option<String>,
    pub other: Vec<AnalysisResult>,
    pub errors: Vec<AnalysisFailure>,
    /// Bucket of every input result, in input order.
    pub placements: Vec<(ResultId, Bucket)>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ClassifiedReport {
    pub fn count_in(&self, bucket: Bucket) -> usize {
        self.placements
            .iter()
            .filter(|(_, placed)| *placed == bucket)
            .count()
    }

    pub fn displayed_count(&self) -> usize {
        self.placements
            .iter()
            .filter(|(_, bucket)| bucket.is_displayed())
            .count()
    }

    pub fn entity(&self, key: &EntityKey) -> Option<&Entity> {
        self.entities.iter().find(|entity| entity.key == *key)
    }
}

/// Classifies results in the order given.
///
/// Pure and recomputed from scratch on every call. Entity investigations only attach to
/// an entity that appeared earlier in `results`.
pub fn classify<'a>(results: impl IntoIterator<Item = &'a AnalysisResult>) -> ClassifiedReport {
    let mut report = ClassifiedReport::default();

    for result in results {
        report
            .placements
            .push((result.id, Bucket::of(&result.verdict)));

        match &result.verdict {
            Verdict::Url(lookup) => report.urls.push(Finding::new(result, lookup)),
            Verdict::Domain(lookup) => report.domains.push(Finding::new(result, lookup)),
            Verdict::AuthDkim(dkim) => report.dkim = Some(dkim.clone()),
            Verdict::AuthSpf(spf) => report.spf = Some(spf.clone()),
            Verdict::AuthArcChain(arc) => report.arc_chain = Some(arc.clone()),
            Verdict::AuthDmarc(dmarc) => report.dmarc = Some(dmarc.clone()),
            Verdict::Summary(summary) => report.summary = Some(summary.clone()),
            Verdict::Entity(key) => report.entities.push(Entity {
                key: key.clone(),
                result_id: result.id,
                investigation: None,
            }),
            Verdict::EntityInvestigation {
                entity,
                investigation,
            } => match report.entities.iter_mut().find(|known| known.key == *entity) {
                Some(known) => known.investigation = Some(investigation.clone()),
                None => {
                    triage_warn!(
                        target: CLASSIFY_TARGET,
                        "dropping investigation {} for unknown entity {}:{}",
                        result.id,
                        entity.kind,
                        entity.name
                    );
                    report.diagnostics.push(Diagnostic::OrphanInvestigation {
                        result_id: result.id,
                        entity: entity.clone(),
                    });
                }
            },
            Verdict::Error(message) => report.errors.push(AnalysisFailure {
                result_id: result.id,
                analysis_name: result.analysis_name.clone(),
                message: message.clone(),
            }),
            Verdict::Unknown { .. } => report.other.push(result.clone()),
        }
    }

    report
}
