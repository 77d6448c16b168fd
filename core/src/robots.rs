//! A small robots.txt parser (§4.2.1).
//!
//! We hand-roll this rather than pulling in a third-party `robotstxt`
//! crate: the grammar the spec actually requires (per-agent and wildcard
//! `Disallow`/`Allow`/`Crawl-delay`, longest-prefix-match precedence) is
//! small enough that a direct implementation is both simpler to audit and
//! easier to keep in lock-step with §4.2.1's exact semantics than
//! adapting an external parser's API to this contract.

#[derive(Debug, Clone, Default)]
struct AgentRules {
    disallow: Vec<String>,
    allow: Vec<String>,
    crawl_delay: Option<f64>,
}

/// Parsed robots.txt rules for every user-agent group the file named.
#[derive(Debug, Clone, Default)]
pub struct RobotsRules {
    agents: Vec<(String, AgentRules)>,
    wildcard: Option<AgentRules>,
}

impl RobotsRules {
    /// Parses a robots.txt body. Never fails: an unparseable or empty body
    /// yields empty rules, which `is_allowed` treats as "allow everything"
    /// (§4.2 failure semantics: parser errors are treated as empty rules).
    pub fn parse(body: &str) -> Self {
        let mut rules = RobotsRules::default();
        let mut current_agents: Vec<String> = Vec::new();
        let mut seen_directive_since_agent = true;

        for raw_line in body.lines() {
            let line = strip_comment(raw_line).trim();
            if line.is_empty() {
                continue;
            }
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim().to_ascii_lowercase();
            let value = value.trim();

            match key.as_str() {
                "user-agent" => {
                    if !seen_directive_since_agent {
                        current_agents.clear();
                    }
                    current_agents.push(value.to_ascii_lowercase());
                    seen_directive_since_agent = false;
                }
                "disallow" => {
                    seen_directive_since_agent = true;
                    rules.apply(&current_agents, |a| a.disallow.push(value.to_string()));
                }
                "allow" => {
                    seen_directive_since_agent = true;
                    rules.apply(&current_agents, |a| a.allow.push(value.to_string()));
                }
                "crawl-delay" => {
                    seen_directive_since_agent = true;
                    if let Ok(secs) = value.parse::<f64>() {
                        rules.apply(&current_agents, |a| a.crawl_delay = Some(secs));
                    }
                }
                _ => {}
            }
        }

        rules
    }

    fn apply(&mut self, agents: &[String], mut f: impl FnMut(&mut AgentRules)) {
        if agents.is_empty() {
            return;
        }
        for agent in agents {
            if agent == "*" {
                let entry = self.wildcard.get_or_insert_with(AgentRules::default);
                f(entry);
            } else {
                let entry = match self.agents.iter_mut().find(|(name, _)| name == agent) {
                    Some((_, rules)) => rules,
                    None => {
                        self.agents.push((agent.clone(), AgentRules::default()));
                        &mut self.agents.last_mut().unwrap().1
                    }
                };
                f(entry);
            }
        }
    }

    fn rules_for(&self, agent: &str) -> Option<&AgentRules> {
        let agent_lower = agent.to_ascii_lowercase();
        self.agents
            .iter()
            .find(|(name, _)| agent_lower.contains(name.as_str()))
            .map(|(_, rules)| rules)
            .or(self.wildcard.as_ref())
    }

    /// Whether `path` is allowed for `agent`. Longest matching rule wins;
    /// `Allow` and `Disallow` are compared by matched-prefix length, with
    /// `Allow` winning ties (standard robots.txt semantics).
    pub fn is_allowed(&self, agent: &str, path: &str) -> bool {
        let Some(rules) = self.rules_for(agent) else {
            return true;
        };

        let mut best_len = -1isize;
        let mut best_allowed = true;

        for pattern in &rules.disallow {
            if pattern.is_empty() {
                continue;
            }
            if path.starts_with(pattern.as_str()) {
                let len = pattern.len() as isize;
                if len > best_len {
                    best_len = len;
                    best_allowed = false;
                }
            }
        }
        for pattern in &rules.allow {
            if pattern.is_empty() {
                continue;
            }
            if path.starts_with(pattern.as_str()) {
                let len = pattern.len() as isize;
                if len >= best_len {
                    best_len = len;
                    best_allowed = true;
                }
            }
        }

        best_allowed
    }

    /// Agent-specific `Crawl-delay`, falling back to the wildcard group.
    pub fn crawl_delay(&self, agent: &str) -> Option<f64> {
        let agent_lower = agent.to_ascii_lowercase();
        self.agents
            .iter()
            .find(|(name, _)| agent_lower.contains(name.as_str()))
            .and_then(|(_, r)| r.crawl_delay)
            .or_else(|| self.wildcard.as_ref().and_then(|r| r.crawl_delay))
    }
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(idx) => &line[..idx],
        None => line,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disallow_blocks_matching_prefix() {
        let rules = RobotsRules::parse("User-agent: *\nDisallow: /private\n");
        assert!(!rules.is_allowed("PoliteCrawler", "/private/page"));
        assert!(rules.is_allowed("PoliteCrawler", "/public/page"));
    }

    #[test]
    fn empty_body_allows_everything() {
        let rules = RobotsRules::parse("");
        assert!(rules.is_allowed("PoliteCrawler", "/anything"));
    }

    #[test]
    fn allow_overrides_longer_disallow_tie() {
        let rules = RobotsRules::parse("User-agent: *\nDisallow: /a\nAllow: /a/public\n");
        assert!(rules.is_allowed("bot", "/a/public/page"));
        assert!(!rules.is_allowed("bot", "/a/private"));
    }

    #[test]
    fn crawl_delay_is_parsed_per_agent() {
        let rules = RobotsRules::parse("User-agent: *\nCrawl-delay: 5\n");
        assert_eq!(rules.crawl_delay("anybot"), Some(5.0));
    }

    #[test]
    fn nul_byte_body_is_not_special_cased_here() {
        // NUL handling lives in the acquisition tier (§4.2.1); the parser
        // itself just treats an empty string as "no rules".
        let rules = RobotsRules::parse("");
        assert!(rules.is_allowed("bot", "/x"));
    }
}
