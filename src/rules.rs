use anyhow::Result;
use serde::Serialize;
use std::path::Path;

/// Terms worth matching on even when a rule never names a file or code
/// span explicitly.
const IMPORTANT_TERMS: &[&str] = &[
    "payment",
    "user",
    "auth",
    "database",
    "api",
    "test",
    "security",
    "atomic",
    "transaction",
    "validation",
    "error",
];

#[derive(Debug, Clone, Serialize)]
pub struct Rule {
    pub id: usize,
    pub text: String,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchedRule {
    pub id: usize,
    pub text: String,
    pub score: f64,
}

/// Matches coding rules against affected symbols and files by keyword
/// overlap. The semantic-embedding engine is an external variant of this
/// contract; results carry `engine()` so callers can see which ran.
#[derive(Debug, Default)]
pub struct RuleMatcher {
    rules: Vec<Rule>,
}

impl RuleMatcher {
    pub fn load(path: &Path) -> Result<Self> {
        let content = crate::util::read_to_string(path)?;
        Ok(Self::from_markdown(&content))
    }

    /// Parse numbered (`1. text`) and bulleted (`- text`) rules; plain
    /// lines continue the previous rule, a blank line ends it.
    pub fn from_markdown(content: &str) -> Self {
        let mut rules: Vec<Rule> = Vec::new();
        let mut current: Option<Rule> = None;
        let mut next_id = 0usize;

        for raw in content.lines() {
            let line = raw.trim();
            if line.is_empty() {
                if let Some(rule) = current.take() {
                    rules.push(rule);
                }
                continue;
            }

            if let Some((id, text)) = split_numbered(line) {
                if let Some(rule) = current.take() {
                    rules.push(rule);
                }
                next_id = id;
                current = Some(Rule {
                    id,
                    text: text.to_string(),
                    keywords: extract_keywords(text),
                });
                continue;
            }

            if let Some(text) = line.strip_prefix("- ").or_else(|| line.strip_prefix("* ")) {
                if let Some(rule) = current.take() {
                    rules.push(rule);
                }
                next_id += 1;
                current = Some(Rule {
                    id: next_id,
                    text: text.to_string(),
                    keywords: extract_keywords(text),
                });
                continue;
            }

            if let Some(rule) = current.as_mut() {
                if !line.starts_with('#') {
                    rule.text.push(' ');
                    rule.text.push_str(line);
                    rule.keywords = extract_keywords(&rule.text);
                }
            }
        }
        if let Some(rule) = current {
            rules.push(rule);
        }

        RuleMatcher { rules }
    }

    pub fn engine(&self) -> &'static str {
        "keyword"
    }

    pub fn all_rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Score every rule against the affected-symbol context and return the
    /// best matches, highest score first.
    pub fn match_rules(&self, context: &[String], top_k: usize) -> Vec<MatchedRule> {
        let context_text = context.join(" ").to_lowercase();
        let mut scored: Vec<MatchedRule> = self
            .rules
            .iter()
            .filter_map(|rule| {
                let hits = rule
                    .keywords
                    .iter()
                    .filter(|keyword| context_text.contains(&keyword.to_lowercase()))
                    .count();
                if hits == 0 {
                    return None;
                }
                Some(MatchedRule {
                    id: rule.id,
                    text: rule.text.clone(),
                    score: hits as f64 / rule.keywords.len().max(1) as f64,
                })
            })
            .collect();
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.id.cmp(&b.id))
        });
        scored.truncate(top_k);
        scored
    }
}

fn split_numbered(line: &str) -> Option<(usize, &str)> {
    let dot = line.find(". ")?;
    let id: usize = line[..dot].parse().ok()?;
    Some((id, line[dot + 2..].trim()))
}

fn extract_keywords(text: &str) -> Vec<String> {
    let mut keywords = Vec::new();
    let lower = text.to_lowercase();

    // Referenced source files.
    for token in lower.split(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '.')) {
        if token.len() > 3 && token.ends_with(".py") {
            keywords.push(token.to_string());
        }
    }

    // Inline code spans.
    let mut rest = text;
    while let Some(open) = rest.find('`') {
        let tail = &rest[open + 1..];
        let Some(close) = tail.find('`') else { break };
        let span = tail[..close].trim();
        if !span.is_empty() {
            keywords.push(span.to_string());
        }
        rest = &tail[close + 1..];
    }

    for term in IMPORTANT_TERMS {
        if lower.contains(term) {
            keywords.push((*term).to_string());
        }
    }

    keywords
}
