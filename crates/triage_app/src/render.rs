//! Plain-text rendering of the view models.

use std::collections::BTreeMap;

use chrono::DateTime;
use triage_core::{
    AppViewModel, AuthLine, CommunityVotes, DomainFinding, JobDetailView, JobRowView, JobStatus,
    Lookup, Tone, UrlFinding,
};

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

pub fn clear_screen() -> &'static str {
    CLEAR_SCREEN
}

pub fn render_dashboard(view: &AppViewModel) -> Vec<String> {
    let mut lines = vec![format!("{} jobs", view.job_count)];
    if view.jobs.is_empty() {
        lines.push("  no jobs yet".to_string());
    }
    for row in &view.jobs {
        lines.push(render_row(row, view.selected == Some(row.job_id)));
    }
    lines
}

fn render_row(row: &JobRowView, selected: bool) -> String {
    let marker = if selected { '>' } else { ' ' };
    let mut line = format!(
        "{marker} #{:<5} {:<8} {:>3}% {:>3}/{:<3} {}",
        row.job_id,
        status_label(row.status),
        row.progress_percent,
        row.result_count,
        row.target_result_count,
        row.subject
    );
    if let Some(error) = &row.error {
        line.push_str(&format!("  error: {error}"));
    }
    if row.warning_count > 0 {
        line.push_str(&format!("  ({} warnings)", row.warning_count));
    }
    line
}

fn status_label(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Running => "running",
        JobStatus::Complete => "done",
        JobStatus::Failed => "failed",
    }
}

pub fn render_detail(detail: &JobDetailView) -> Vec<String> {
    let report = &detail.report.report;
    let mut lines = vec![
        String::new(),
        format!("Job #{}: {}", detail.row.job_id, detail.row.subject),
        format!(
            "Status: {} ({}%)",
            status_label(detail.row.status),
            detail.row.progress_percent
        ),
    ];
    if let Some(error) = &detail.row.error {
        lines.push(format!("Error: {error}"));
    }
    for warning in &detail.warnings {
        lines.push(format!("Warning: {warning}"));
    }

    lines.push("Authentication".to_string());
    lines.push(auth_line("DKIM", &detail.auth.dkim));
    lines.push(auth_line("SPF", &detail.auth.spf));
    lines.push(auth_line("DMARC", &detail.auth.dmarc));
    lines.push(auth_line("ARC", &detail.auth.arc_chain));

    if let Some(summary) = &report.summary {
        lines.push("Summary".to_string());
        lines.extend(summary.lines().map(|line| format!("  {line}")));
    }

    if !report.urls.is_empty() {
        lines.push(format!("URLs ({})", report.urls.len()));
        lines.extend(report.urls.iter().flat_map(url_lines));
    }
    if !report.domains.is_empty() {
        lines.push(format!("Domains ({})", report.domains.len()));
        lines.extend(report.domains.iter().flat_map(domain_lines));
    }
    if !report.entities.is_empty() {
        lines.push(format!("Entities ({})", report.entities.len()));
        for entity in &report.entities {
            let investigated = if entity.investigation.is_some() {
                " (investigated)"
            } else {
                ""
            };
            lines.push(format!(
                "  {}: {}{investigated}",
                entity.key.kind, entity.key.name
            ));
        }
    }
    if !report.other.is_empty() {
        lines.push(format!("Other ({})", report.other.len()));
        for result in &report.other {
            lines.push(format!(
                "  {} [{}]",
                result.analysis_name,
                result.verdict.kind()
            ));
        }
    }

    if let Some(email) = &detail.email_preview {
        lines.push("Email".to_string());
        lines.extend(email.lines().map(|line| format!("  | {line}")));
    }
    lines
}

fn auth_line(label: &str, line: &AuthLine) -> String {
    format!("  {} {label:<6} {}", tone_marker(line.tone), line.text)
}

fn tone_marker(tone: Tone) -> &'static str {
    match tone {
        Tone::Harmless => "[ok]",
        Tone::Suspicious => "[!!]",
        Tone::Neutral => "[..]",
    }
}

const DETAIL_INDENT: &str = "         ";
const WHOIS_LINES: usize = 4;

fn url_lines(finding: &UrlFinding) -> Vec<String> {
    let report = match &finding.lookup {
        Lookup::Found(report) => report,
        Lookup::Failed(error) => return vec![format!("  failed {}: {}", error.code, error.message)],
    };
    let attributes = &report.attributes;
    let stats = &attributes.last_analysis_stats;
    let mut line = format!(
        "  {:>5}  {}  malicious {} suspicious {}",
        attributes.reputation, attributes.url, stats.malicious, stats.suspicious
    );
    push_tags(&mut line, &finding.tags);
    push_date(&mut line, "analysed", attributes.last_analysis_date);

    let mut lines = vec![line];
    if !attributes.title.is_empty() {
        lines.push(format!("{DETAIL_INDENT}title {}", attributes.title));
    }
    if !attributes.last_final_url.is_empty() && attributes.last_final_url != attributes.url {
        lines.push(format!("{DETAIL_INDENT}lands on {}", attributes.last_final_url));
    }
    if !attributes.redirection_chain.is_empty() {
        lines.push(format!(
            "{DETAIL_INDENT}redirects {}",
            attributes.redirection_chain.join(" -> ")
        ));
    }
    if let Some(brands) = joined_values(&attributes.targeted_brand) {
        lines.push(format!("{DETAIL_INDENT}targets {brands}"));
    }
    if let Some(categories) = joined_values(&attributes.categories) {
        lines.push(format!("{DETAIL_INDENT}categories {categories}"));
    }
    push_votes(&mut lines, attributes.total_votes);
    lines
}

fn domain_lines(finding: &DomainFinding) -> Vec<String> {
    let report = match &finding.lookup {
        Lookup::Found(report) => report,
        Lookup::Failed(error) => return vec![format!("  failed {}: {}", error.code, error.message)],
    };
    let attributes = &report.attributes;
    let mut line = format!("  {:>5}  {}", attributes.reputation, report.id);
    if !attributes.registrar.is_empty() {
        line.push_str(&format!("  registrar {}", attributes.registrar));
    }
    push_tags(&mut line, &finding.tags);
    push_date(&mut line, "created", attributes.creation_date);

    let mut lines = vec![line];
    if let Some(categories) = joined_values(&attributes.categories) {
        lines.push(format!("{DETAIL_INDENT}categories {categories}"));
    }
    lines.extend(attributes.last_dns_records.iter().map(|record| {
        format!(
            "{DETAIL_INDENT}{:<5} {}  ttl {}",
            record.record_type, record.value, record.ttl
        )
    }));
    push_votes(&mut lines, attributes.total_votes);

    let whois: Vec<&str> = attributes
        .whois
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    if !whois.is_empty() {
        let mut heading = format!("{DETAIL_INDENT}whois");
        push_date(&mut heading, "as of", attributes.whois_date);
        lines.push(heading);
        lines.extend(
            whois
                .iter()
                .take(WHOIS_LINES)
                .map(|line| format!("{DETAIL_INDENT}  {line}")),
        );
        if whois.len() > WHOIS_LINES {
            lines.push(format!(
                "{DETAIL_INDENT}  ... {} more lines",
                whois.len() - WHOIS_LINES
            ));
        }
    }
    lines
}

/// Distinct values of a per-engine map, in key order.
fn joined_values(by_engine: &BTreeMap<String, String>) -> Option<String> {
    let mut values: Vec<&str> = Vec::new();
    for value in by_engine.values() {
        if !value.is_empty() && !values.contains(&value.as_str()) {
            values.push(value);
        }
    }
    (!values.is_empty()).then(|| values.join(", "))
}

fn push_votes(lines: &mut Vec<String>, votes: CommunityVotes) {
    if votes.harmless > 0 || votes.malicious > 0 {
        lines.push(format!(
            "{DETAIL_INDENT}votes harmless {} malicious {}",
            votes.harmless, votes.malicious
        ));
    }
}

fn push_tags(line: &mut String, tags: &[String]) {
    if !tags.is_empty() {
        line.push_str(&format!("  [{}]", tags.join(", ")));
    }
}

fn push_date(line: &mut String, label: &str, unix_seconds: i64) {
    if let Some(date) = format_unix_date(unix_seconds) {
        line.push_str(&format!("  {label} {date}"));
    }
}

/// `None` for the zero timestamp the backend sends when the date is unknown.
fn format_unix_date(unix_seconds: i64) -> Option<String> {
    if unix_seconds <= 0 {
        return None;
    }
    DateTime::from_timestamp(unix_seconds, 0).map(|date| date.format("%Y-%m-%d").to_string())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use pretty_assertions::assert_eq;
    use triage_core::{
        AppViewModel, CommunityVotes, DnsRecord, DomainAttributes, DomainFinding, DomainReport,
        JobRowView, JobStatus, Lookup, LookupError, UrlAttributes, UrlFinding, UrlReport,
    };

    use super::{domain_lines, format_unix_date, render_dashboard, url_lines};

    fn row(job_id: u64, status: JobStatus, warning_count: usize) -> JobRowView {
        JobRowView {
            job_id,
            subject: format!("Subject {job_id}"),
            result_count: 2,
            target_result_count: 4,
            progress_percent: 50,
            status,
            error: None,
            warning_count,
        }
    }

    #[test]
    fn dashboard_marks_selected_row() {
        let view = AppViewModel {
            jobs: vec![row(1, JobStatus::Running, 0), row(2, JobStatus::Complete, 2)],
            selected: Some(2),
            job_count: 2,
            dirty: false,
        };

        let lines = render_dashboard(&view);

        assert_eq!(lines[0], "2 jobs");
        assert!(lines[1].starts_with("  #1 "));
        assert!(lines[2].starts_with("> #2 "));
        assert!(lines[2].contains("done"));
        assert!(lines[2].ends_with("(2 warnings)"));
    }

    #[test]
    fn empty_dashboard_says_so() {
        let lines = render_dashboard(&AppViewModel::default());
        assert_eq!(lines, vec!["0 jobs".to_string(), "  no jobs yet".to_string()]);
    }

    #[test]
    fn unix_dates_are_formatted() {
        assert_eq!(format_unix_date(1_700_000_000), Some("2023-11-14".to_string()));
        assert_eq!(format_unix_date(0), None);
    }

    #[test]
    fn url_detail_lists_redirects_brand_and_categories() {
        let finding = UrlFinding {
            result_id: 1,
            analysis_name: "url_lookup".to_string(),
            lookup: Lookup::Found(UrlReport {
                id: "u1".to_string(),
                attributes: UrlAttributes {
                    url: "http://short.example/x".to_string(),
                    last_final_url: "http://login.example/".to_string(),
                    reputation: -12,
                    redirection_chain: vec![
                        "http://short.example/x".to_string(),
                        "http://login.example/".to_string(),
                    ],
                    targeted_brand: BTreeMap::from([
                        ("engine-a".to_string(), "Acme Bank".to_string()),
                        ("engine-b".to_string(), "Acme Bank".to_string()),
                    ]),
                    categories: BTreeMap::from([
                        ("engine-a".to_string(), "phishing".to_string()),
                        ("engine-b".to_string(), "malicious".to_string()),
                    ]),
                    total_votes: CommunityVotes {
                        harmless: 0,
                        malicious: 3,
                    },
                    ..UrlAttributes::default()
                },
            }),
            tags: vec!["phishing".to_string()],
        };

        let lines = url_lines(&finding);

        assert_eq!(
            lines[0],
            "    -12  http://short.example/x  malicious 0 suspicious 0  [phishing]"
        );
        assert_eq!(
            lines[1..].to_vec(),
            vec![
                "         lands on http://login.example/".to_string(),
                "         redirects http://short.example/x -> http://login.example/".to_string(),
                "         targets Acme Bank".to_string(),
                "         categories phishing, malicious".to_string(),
                "         votes harmless 0 malicious 3".to_string(),
            ]
        );
    }

    #[test]
    fn domain_detail_lists_dns_and_trimmed_whois() {
        let finding = DomainFinding {
            result_id: 2,
            analysis_name: "domain_lookup".to_string(),
            lookup: Lookup::Found(DomainReport {
                id: "login.example".to_string(),
                attributes: DomainAttributes {
                    registrar: "Registrar Inc".to_string(),
                    whois: "Domain: login.example\n\nRegistrar: Registrar Inc\nA\nB\nC\n"
                        .to_string(),
                    whois_date: 1_700_000_000,
                    categories: BTreeMap::from([("engine-a".to_string(), "parked".to_string())]),
                    last_dns_records: vec![DnsRecord {
                        record_type: "A".to_string(),
                        value: "192.0.2.7".to_string(),
                        ttl: 300,
                    }],
                    ..DomainAttributes::default()
                },
            }),
            tags: Vec::new(),
        };

        let lines = domain_lines(&finding);

        assert_eq!(
            lines,
            vec![
                "      0  login.example  registrar Registrar Inc".to_string(),
                "         categories parked".to_string(),
                "         A     192.0.2.7  ttl 300".to_string(),
                "         whois  as of 2023-11-14".to_string(),
                "           Domain: login.example".to_string(),
                "           Registrar: Registrar Inc".to_string(),
                "           A".to_string(),
                "           B".to_string(),
                "           ... 1 more lines".to_string(),
            ]
        );
    }

    #[test]
    fn failed_lookup_is_one_line() {
        let finding = DomainFinding {
            result_id: 3,
            analysis_name: "domain_lookup".to_string(),
            lookup: Lookup::Failed(LookupError {
                code: "NotFoundError".to_string(),
                message: "unknown domain".to_string(),
            }),
            tags: Vec::new(),
        };
        assert_eq!(
            domain_lines(&finding),
            vec!["  failed NotFoundError: unknown domain".to_string()]
        );
    }
}
