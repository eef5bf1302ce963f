//! Reference data compiled into the binary: the learning curriculum, the
//! picker lists, and the demo applications shown before login.

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::Deserialize;

use crate::models::Application;

const DSA_TOPICS: &str = include_str!("../data/dsa_topics.json");
const PYTHON_TOPICS: &str = include_str!("../data/python_topics.json");
const REFERENCE: &str = include_str!("../data/reference.json");
const DEMO_APPLICATIONS: &str = include_str!("../data/demo_applications.json");

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Track {
    Dsa,
    Python,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Category {
    pub category: String,
    #[serde(default)]
    pub difficulty: Option<String>,
    pub topics: Vec<Topic>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Topic {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub youtube_id: Option<String>,
    #[serde(default)]
    pub resources: Vec<Resource>,
    #[serde(default)]
    pub key_points: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Resource {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Reference {
    pub countries: Vec<String>,
    pub job_titles: Vec<String>,
    pub job_levels: Vec<String>,
    pub companies: Vec<String>,
}

pub fn curriculum(track: Track) -> Result<Vec<Category>> {
    let raw = match track {
        Track::Dsa => DSA_TOPICS,
        Track::Python => PYTHON_TOPICS,
    };
    serde_json::from_str(raw).with_context(|| format!("Bundled {:?} curriculum is malformed", track))
}

pub fn reference() -> Result<Reference> {
    serde_json::from_str(REFERENCE).context("Bundled reference lists are malformed")
}

pub fn demo_applications() -> Result<Vec<Application>> {
    serde_json::from_str(DEMO_APPLICATIONS).context("Bundled demo applications are malformed")
}

/// Case-insensitive lookup returning the canonical category and topic.
pub fn find_topic<'a>(
    categories: &'a [Category],
    category: &str,
    topic: &str,
) -> Option<(&'a Category, &'a Topic)> {
    let category = categories
        .iter()
        .find(|c| c.category.eq_ignore_ascii_case(category.trim()))?;
    let topic = category
        .topics
        .iter()
        .find(|t| t.name.eq_ignore_ascii_case(topic.trim()))?;
    Some((category, topic))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_dsa_curriculum_loads() {
        let dsa = curriculum(Track::Dsa).unwrap();
        assert_eq!(dsa.len(), 18);
        assert_eq!(dsa[0].category, "Essentials");
        assert_eq!(dsa[0].topics[0].name, "Visualizing Code");
        assert!(dsa.iter().all(|c| !c.topics.is_empty()));
    }

    #[test]
    fn test_topic_keys_are_unique() {
        for track in [Track::Dsa, Track::Python] {
            let categories = curriculum(track).unwrap();
            let mut seen = HashSet::new();
            for c in &categories {
                for t in &c.topics {
                    assert!(seen.insert(format!("{}::{}", c.category, t.name)));
                }
            }
        }
    }

    #[test]
    fn test_python_curriculum_has_difficulty() {
        let python = curriculum(Track::Python).unwrap();
        assert_eq!(python[0].category, "Getting Started");
        assert_eq!(python[0].difficulty.as_deref(), Some("Beginner"));
        assert!(!python[0].topics[0].key_points.is_empty());
    }

    #[test]
    fn test_find_topic_is_case_insensitive() {
        let dsa = curriculum(Track::Dsa).unwrap();
        let (category, topic) = find_topic(&dsa, "pointers", "two pointers").unwrap();
        assert_eq!(category.category, "Pointers");
        assert_eq!(topic.name, "Two Pointers");
        assert!(find_topic(&dsa, "Pointers", "Four Pointers").is_none());
    }

    #[test]
    fn test_reference_lists() {
        let reference = reference().unwrap();
        assert!(reference.companies.iter().any(|c| c == "Google"));
        assert!(reference.countries.iter().any(|c| c == "Ghana"));
        assert!(reference.job_levels.iter().any(|l| l == "New Grad"));
    }

    #[test]
    fn test_demo_applications() {
        let demo = demo_applications().unwrap();
        assert_eq!(demo.len(), 8);
        assert_eq!(demo[1].company_name(), "Microsoft");
    }
}
