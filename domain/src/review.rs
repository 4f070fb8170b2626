//! Review findings: the data produced by fanning review agents out over a
//! changed-files set, and the severity-threshold rule used to filter them.
//!
//! [`SeverityFilter`] follows the same shape as the teacher's `QuorumRule`:
//! a small enum with `is_satisfied`/`description`/`FromStr`/`Display`, just
//! evaluated over an issue's severity rather than a vote tally.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            _ => Err(format!("unknown severity: {}", s)),
        }
    }
}

/// A single finding reported by one review agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub file: String,
    pub line: Option<u32>,
    pub severity: Severity,
    pub description: String,
    pub agent_name: String,
}

/// One configured review agent's contribution to a review iteration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewResult {
    pub agent_name: String,
    pub issues: Vec<Issue>,
    pub summary: String,
    pub error: Option<String>,
}

/// The merged outcome of one full review iteration, across every configured
/// agent, after the severity filter has been applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    pub passed: bool,
    pub results: Vec<ReviewResult>,
    pub total_issues: usize,
}

impl RunResult {
    /// Count of agents whose invocation itself failed (as opposed to
    /// succeeding and reporting zero issues).
    pub fn agent_error_count(&self) -> usize {
        self.results.iter().filter(|r| r.error.is_some()).count()
    }
}

/// Which issues count toward "review failed": keep everything, or only
/// issues at or above a minimum severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SeverityFilter {
    #[default]
    All,
    MinSeverity(Severity),
}

impl SeverityFilter {
    /// Whether `issue` survives this filter.
    pub fn keeps(&self, issue: &Issue) -> bool {
        match self {
            SeverityFilter::All => true,
            SeverityFilter::MinSeverity(min) => issue.severity >= *min,
        }
    }

    pub fn description(&self) -> String {
        match self {
            SeverityFilter::All => "all severities".to_string(),
            SeverityFilter::MinSeverity(s) => format!("{} and above", s),
        }
    }
}

impl fmt::Display for SeverityFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

impl FromStr for SeverityFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all" => Ok(SeverityFilter::All),
            s if s.starts_with("min:") => {
                let sev = s
                    .split_once(':')
                    .map(|(_, rest)| rest)
                    .ok_or("missing severity after min:")?;
                Ok(SeverityFilter::MinSeverity(Severity::from_str(sev)?))
            }
            _ => Err(format!(
                "unknown severity filter: {}. valid: all, min:<low|medium|high|critical>",
                s
            )),
        }
    }
}

/// Apply `filter` to every agent's issues and compute the merged run result.
/// Agent order is preserved (the caller is responsible for handing results
/// in configured order, not completion order).
pub fn merge_results(mut results: Vec<ReviewResult>, filter: SeverityFilter) -> RunResult {
    for r in &mut results {
        r.issues.retain(|issue| filter.keeps(issue));
    }
    let total_issues: usize = results.iter().map(|r| r.issues.len()).sum();
    RunResult {
        passed: total_issues == 0,
        results,
        total_issues,
    }
}

/// Render review findings as human-readable markdown, grouped by agent then
/// by severity (highest first). This is what gets spliced into the
/// review-fix prompt.
pub fn format_issues_markdown(results: &[ReviewResult]) -> String {
    let mut out = String::new();
    for result in results {
        if result.issues.is_empty() && result.error.is_none() {
            continue;
        }
        out.push_str(&format!("## {}\n\n", result.agent_name));
        if let Some(err) = &result.error {
            out.push_str(&format!("*agent failed: {}*\n\n", err));
            continue;
        }
        let mut sorted = result.issues.clone();
        sorted.sort_by(|a, b| b.severity.cmp(&a.severity));
        for issue in &sorted {
            let location = match issue.line {
                Some(line) => format!("{}:{}", issue.file, line),
                None => issue.file.clone(),
            };
            out.push_str(&format!(
                "- **[{}]** `{}` — {}\n",
                issue.severity, location, issue.description
            ));
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue(sev: Severity) -> Issue {
        Issue {
            file: "src/main.rs".into(),
            line: Some(10),
            severity: sev,
            description: "an issue".into(),
            agent_name: "reviewer-a".into(),
        }
    }

    #[test]
    fn all_filter_keeps_everything() {
        assert!(SeverityFilter::All.keeps(&issue(Severity::Low)));
        assert!(SeverityFilter::All.keeps(&issue(Severity::Critical)));
    }

    #[test]
    fn min_severity_filter_drops_below_threshold() {
        let filter = SeverityFilter::MinSeverity(Severity::High);
        assert!(!filter.keeps(&issue(Severity::Medium)));
        assert!(filter.keeps(&issue(Severity::High)));
        assert!(filter.keeps(&issue(Severity::Critical)));
    }

    #[test]
    fn parses_filter_strings() {
        assert_eq!("all".parse::<SeverityFilter>().unwrap(), SeverityFilter::All);
        assert_eq!(
            "min:high".parse::<SeverityFilter>().unwrap(),
            SeverityFilter::MinSeverity(Severity::High)
        );
        assert!("bogus".parse::<SeverityFilter>().is_err());
    }

    #[test]
    fn merge_results_passes_when_no_issues_survive() {
        let results = vec![ReviewResult {
            agent_name: "a".into(),
            issues: vec![issue(Severity::Low)],
            summary: String::new(),
            error: None,
        }];
        let merged = merge_results(results, SeverityFilter::MinSeverity(Severity::High));
        assert!(merged.passed);
        assert_eq!(merged.total_issues, 0);
    }

    #[test]
    fn merge_results_fails_when_issues_survive() {
        let results = vec![ReviewResult {
            agent_name: "a".into(),
            issues: vec![issue(Severity::Critical)],
            summary: String::new(),
            error: None,
        }];
        let merged = merge_results(results, SeverityFilter::All);
        assert!(!merged.passed);
        assert_eq!(merged.total_issues, 1);
    }

    #[test]
    fn agent_error_count_ignores_successful_agents() {
        let run = RunResult {
            passed: false,
            results: vec![
                ReviewResult {
                    agent_name: "a".into(),
                    error: Some("boom".into()),
                    ..Default::default()
                },
                ReviewResult {
                    agent_name: "b".into(),
                    ..Default::default()
                },
            ],
            total_issues: 0,
        };
        assert_eq!(run.agent_error_count(), 1);
    }

    #[test]
    fn format_issues_markdown_groups_by_severity_desc() {
        let results = vec![ReviewResult {
            agent_name: "reviewer-a".into(),
            issues: vec![issue(Severity::Low), issue(Severity::Critical)],
            summary: String::new(),
            error: None,
        }];
        let md = format_issues_markdown(&results);
        let critical_pos = md.find("[critical]").unwrap();
        let low_pos = md.find("[low]").unwrap();
        assert!(critical_pos < low_pos);
    }
}
