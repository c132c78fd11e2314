//! Content filter: keyword blacklist and allowed task types.

use serde::{Deserialize, Serialize};

use crate::task::{RiskLevel, Task, TaskType};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskFilter {
    /// Case-insensitive substrings that block a task when found in its
    /// title or description.
    pub blacklist_keywords: Vec<String>,
    pub allowed_types: Vec<TaskType>,
}

impl Default for TaskFilter {
    fn default() -> Self {
        Self {
            blacklist_keywords: ["attack", "ddos", "hack", "malware", "virus", "phishing", "spam", "illegal"]
                .into_iter()
                .map(String::from)
                .collect(),
            allowed_types: TaskType::ALL.to_vec(),
        }
    }
}

impl TaskFilter {
    pub fn assess_risk(&self, task: &Task) -> RiskLevel {
        if self.contains_blacklisted(&task.title) || self.contains_blacklisted(&task.description) {
            return RiskLevel::Blocked;
        }
        if !self.allowed_types.contains(&task.task_type) {
            return RiskLevel::Blocked;
        }
        task.risk_level()
    }

    /// `Err(reason)` when the task is blocked.
    pub fn check(&self, task: &Task) -> Result<RiskLevel, String> {
        match self.assess_risk(task) {
            RiskLevel::Blocked => Err("task contains blocked content or type".into()),
            risk => Ok(risk),
        }
    }

    pub fn add_keyword(&mut self, keyword: impl Into<String>) {
        let keyword = keyword.into();
        if !self.blacklist_keywords.contains(&keyword) {
            self.blacklist_keywords.push(keyword);
        }
    }

    pub fn remove_keyword(&mut self, keyword: &str) {
        self.blacklist_keywords.retain(|k| k != keyword);
    }

    fn contains_blacklisted(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        self.blacklist_keywords
            .iter()
            .any(|k| lower.contains(&k.to_lowercase()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(title: &str, ty: TaskType) -> Task {
        Task::new("r", ty, title, 1.0)
    }

    #[test]
    fn risk_follows_type() {
        let f = TaskFilter::default();
        assert_eq!(f.assess_risk(&task("find papers", TaskType::Search)), RiskLevel::Low);
        assert_eq!(f.assess_risk(&task("copy file", TaskType::Transfer)), RiskLevel::Medium);
        assert_eq!(f.assess_risk(&task("render", TaskType::Compute)), RiskLevel::High);
    }

    #[test]
    fn blacklist_is_case_insensitive() {
        let f = TaskFilter::default();
        assert_eq!(f.assess_risk(&task("Launch DDoS", TaskType::Compute)), RiskLevel::Blocked);
        let mut t = task("innocent", TaskType::Search);
        t.description = "contains Malware payload".into();
        assert!(f.check(&t).is_err());
    }

    #[test]
    fn disallowed_type_blocked() {
        let f = TaskFilter {
            allowed_types: vec![TaskType::Search],
            ..TaskFilter::default()
        };
        assert_eq!(f.assess_risk(&task("x", TaskType::Storage)), RiskLevel::Blocked);
    }

    #[test]
    fn keyword_management() {
        let mut f = TaskFilter::default();
        f.add_keyword("scrape");
        f.add_keyword("scrape");
        assert_eq!(f.blacklist_keywords.iter().filter(|k| *k == "scrape").count(), 1);
        assert!(f.check(&task("scrape site", TaskType::Search)).is_err());
        f.remove_keyword("scrape");
        assert!(f.check(&task("scrape site", TaskType::Search)).is_ok());
    }
}
