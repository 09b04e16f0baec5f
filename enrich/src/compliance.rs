//! Compliance-framework mapping.
//!
//! A rule-to-framework table keyed on rule-id prefix and CWE. Every
//! framework is attempted for every finding; absence of a mapping is not an
//! error. The tables are deliberately coarse - they exist to let a
//! compliance report bucket findings, not to be an authoritative crosswalk.

use dragnet_types::Finding;

/// CWE ids in the 2024 CWE Top 25.
const CWE_TOP_25: [u32; 25] = [
    79, 787, 89, 352, 22, 125, 78, 416, 862, 434, 94, 20, 77, 287, 269, 502, 200, 863, 918, 119,
    476, 798, 190, 400, 306,
];

/// CWE id -> OWASP Top 10 (2021) category.
fn owasp_for_cwe(cwe: u32) -> Option<&'static str> {
    let category = match cwe {
        22 | 284 | 639 | 862 | 863 => "A01:2021 Broken Access Control",
        321 | 326 | 327 | 328 | 759 => "A02:2021 Cryptographic Failures",
        77 | 78 | 79 | 89 | 94 | 95 | 917 => "A03:2021 Injection",
        209 | 256 => "A04:2021 Insecure Design",
        16 | 611 | 1004 => "A05:2021 Security Misconfiguration",
        1104 => "A06:2021 Vulnerable and Outdated Components",
        259 | 287 | 306 | 522 | 798 => "A07:2021 Identification and Authentication Failures",
        502 | 829 => "A08:2021 Software and Data Integrity Failures",
        778 => "A09:2021 Security Logging and Monitoring Failures",
        918 => "A10:2021 Server-Side Request Forgery",
        _ => return None,
    };
    Some(category)
}

/// CWE id -> PCI DSS requirement.
fn pci_for_cwe(cwe: u32) -> Option<&'static str> {
    let requirement = match cwe {
        259 | 522 | 798 => "PCI DSS 8.2 - strong authentication credentials",
        77 | 78 | 79 | 89 | 94 | 95 => "PCI DSS 6.5.1 - injection flaws",
        321 | 326 | 327 | 328 => "PCI DSS 4.1 - strong cryptography in transit",
        200 => "PCI DSS 3.4 - protect stored account data",
        _ => return None,
    };
    Some(requirement)
}

/// CWE id -> NIST CSF subcategory.
fn nist_for_cwe(cwe: u32) -> Option<&'static str> {
    let subcategory = match cwe {
        259 | 522 | 798 => "PR.AC-1 - identities and credentials are managed",
        16 | 1004 => "PR.IP-1 - baseline configuration is maintained",
        _ => return None,
    };
    Some(subcategory)
}

/// CWE id -> MITRE ATT&CK technique.
fn attack_for_cwe(cwe: u32) -> Option<&'static str> {
    let technique = match cwe {
        259 | 522 | 798 => "T1552 - Unsecured Credentials",
        77 | 78 | 94 | 95 => "T1059 - Command and Scripting Interpreter",
        918 => "T1090 - Proxy",
        _ => return None,
    };
    Some(technique)
}

fn cwe_number(id: &str) -> Option<u32> {
    id.trim().strip_prefix("CWE-")?.parse().ok()
}

fn push_unique(list: &mut Vec<String>, entry: &str) {
    if !list.iter().any(|e| e == entry) {
        list.push(entry.to_string());
    }
}

/// Fill in every applicable framework mapping on the finding.
pub fn apply_compliance(finding: &mut Finding) {
    let cwes: Vec<u32> = finding
        .compliance
        .cwe
        .iter()
        .filter_map(|id| cwe_number(id))
        .collect();

    for cwe in &cwes {
        if CWE_TOP_25.contains(cwe) {
            push_unique(&mut finding.compliance.cwe_top25, &format!("CWE-{cwe}"));
        }
        if let Some(category) = owasp_for_cwe(*cwe) {
            push_unique(&mut finding.compliance.owasp_top10, category);
        }
        if let Some(requirement) = pci_for_cwe(*cwe) {
            push_unique(&mut finding.compliance.pci_dss, requirement);
        }
        if let Some(subcategory) = nist_for_cwe(*cwe) {
            push_unique(&mut finding.compliance.nist_csf, subcategory);
        }
        if let Some(technique) = attack_for_cwe(*cwe) {
            push_unique(&mut finding.compliance.mitre_attack, technique);
        }
    }

    // Rule-prefix rules, for tools whose findings carry no CWE.
    let rule = finding.rule_id.as_str();
    if let Some(check) = rule.strip_prefix("CIS-") {
        push_unique(
            &mut finding.compliance.cis,
            &format!("CIS Kubernetes Benchmark {check}"),
        );
        push_unique(
            &mut finding.compliance.nist_csf,
            "PR.IP-1 - baseline configuration is maintained",
        );
    }
    if rule.starts_with("CKV") {
        push_unique(&mut finding.compliance.cis, &format!("CIS control ({rule})"));
        push_unique(
            &mut finding.compliance.nist_csf,
            "PR.IP-1 - baseline configuration is maintained",
        );
        push_unique(
            &mut finding.compliance.pci_dss,
            "PCI DSS 2.2 - secure configuration standards",
        );
    }
    if rule.starts_with("DL") {
        push_unique(&mut finding.compliance.cis, "CIS Docker Benchmark 4 - container images");
    }

    // Known-CVE findings are by definition outdated components.
    let mentions_cve =
        rule.starts_with("CVE-") || finding.references.iter().any(|r| r.contains("CVE-"));
    if mentions_cve {
        push_unique(
            &mut finding.compliance.owasp_top10,
            "A06:2021 Vulnerable and Outdated Components",
        );
        push_unique(
            &mut finding.compliance.pci_dss,
            "PCI DSS 6.2 - patch known vulnerabilities",
        );
        push_unique(
            &mut finding.compliance.nist_csf,
            "ID.RA-1 - asset vulnerabilities are identified",
        );
        push_unique(
            &mut finding.compliance.mitre_attack,
            "T1190 - Exploit Public-Facing Application",
        );
    }
}
