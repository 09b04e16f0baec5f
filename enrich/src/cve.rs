//! CVE identifier extraction.

use std::sync::OnceLock;

use regex::Regex;

use dragnet_types::Finding;

fn cve_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bCVE-\d{4}-\d{4,}\b").expect("valid CVE regex"))
}

/// Collect the distinct CVE ids mentioned in a finding's rule id or
/// references, uppercased, in first-seen order.
#[must_use]
pub fn extract_cves(finding: &Finding) -> Vec<String> {
    let mut seen = Vec::new();
    let mut push = |text: &str| {
        for m in cve_regex().find_iter(text) {
            let id = m.as_str().to_ascii_uppercase();
            if !seen.contains(&id) {
                seen.push(id);
            }
        }
    };
    push(&finding.rule_id);
    for reference in &finding.references {
        push(reference);
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::extract_cves;
    use dragnet_types::{Finding, Location, Priority, Severity, ToolRef};

    fn finding(rule_id: &str, references: Vec<String>) -> Finding {
        Finding {
            schema_version: dragnet_types::SCHEMA_VERSION.to_string(),
            id: "aa".to_string(),
            rule_id: rule_id.to_string(),
            severity: Severity::High,
            tool: ToolRef::new("grype", None),
            location: Location::new("requirements.txt"),
            message: "m".to_string(),
            title: None,
            description: None,
            remediation: None,
            references,
            tags: Vec::new(),
            cvss: None,
            context: None,
            compliance: dragnet_types::Compliance::default(),
            epss: None,
            kev: false,
            kev_due_date: None,
            priority: Priority::default(),
            detected_by: Vec::new(),
            raw: Vec::new(),
        }
    }

    #[test]
    fn rule_id_cve_is_found() {
        let f = finding("CVE-2021-44228", Vec::new());
        assert_eq!(extract_cves(&f), vec!["CVE-2021-44228".to_string()]);
    }

    #[test]
    fn reference_cves_deduplicate_and_uppercase() {
        let f = finding(
            "GHSA-xxxx-yyyy-zzzz",
            vec![
                "https://nvd.nist.gov/vuln/detail/cve-2023-32681".to_string(),
                "see CVE-2023-32681 advisory".to_string(),
            ],
        );
        assert_eq!(extract_cves(&f), vec!["CVE-2023-32681".to_string()]);
    }

    #[test]
    fn non_cve_rules_yield_nothing() {
        let f = finding("B602", Vec::new());
        assert!(extract_cves(&f).is_empty());
    }
}
