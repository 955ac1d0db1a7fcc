//! Saved mission ideas (`<data_dir>/ideas.json`).

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Ideas written on first use.
pub const SEED_IDEAS: [&str; 3] = [
    "Analyze top 3 competitors in the AI chatbot market, focusing on features and pricing.",
    "Create a marketing plan for a new productivity app targeting students.",
    "Generate a technical blog post about the benefits of serverless architecture.",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Idea {
    pub id: u64,
    pub goal: String,
}

/// Lookup of an unknown idea id. Recover with `downcast_ref::<IdeaNotFoundError>()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdeaNotFoundError {
    pub id: u64,
}

impl fmt::Display for IdeaNotFoundError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "idea {} not found", self.id)
    }
}

impl std::error::Error for IdeaNotFoundError {}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct IdeaFile {
    next_id: u64,
    ideas: Vec<Idea>,
}

impl IdeaFile {
    fn seeded() -> Self {
        let mut file = Self {
            next_id: 1,
            ideas: Vec::new(),
        };
        for goal in SEED_IDEAS {
            file.push(goal.to_string());
        }
        file
    }

    fn push(&mut self, goal: String) -> Idea {
        let idea = Idea {
            id: self.next_id,
            goal,
        };
        self.next_id += 1;
        self.ideas.push(idea.clone());
        idea
    }

    fn find_mut(&mut self, id: u64) -> Result<&mut Idea> {
        self.ideas
            .iter_mut()
            .find(|idea| idea.id == id)
            .ok_or_else(|| IdeaNotFoundError { id }.into())
    }
}

/// File-backed idea list. All operations hold one lock across read-modify-write.
#[derive(Debug)]
pub struct IdeaStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl IdeaStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All ideas, newest first.
    pub fn list(&self) -> Result<Vec<Idea>> {
        self.with_file(|file| {
            let mut ideas = file.ideas.clone();
            ideas.sort_by(|a, b| b.id.cmp(&a.id));
            Ok((ideas, false))
        })
    }

    pub fn get(&self, id: u64) -> Result<Idea> {
        self.with_file(|file| Ok((file.find_mut(id)?.clone(), false)))
    }

    /// Add an idea. A goal that is already saved returns the existing idea.
    pub fn create(&self, goal: &str) -> Result<Idea> {
        let goal = normalize_goal(goal)?;
        self.with_file(|file| {
            if let Some(existing) = file.ideas.iter().find(|idea| idea.goal == goal) {
                debug!(id = existing.id, "idea already saved");
                return Ok((existing.clone(), false));
            }
            let idea = file.push(goal);
            info!(id = idea.id, "idea saved");
            Ok((idea, true))
        })
    }

    pub fn update(&self, id: u64, goal: &str) -> Result<Idea> {
        let goal = normalize_goal(goal)?;
        self.with_file(|file| {
            let idea = file.find_mut(id)?;
            idea.goal = goal;
            Ok((idea.clone(), true))
        })
    }

    pub fn delete(&self, id: u64) -> Result<()> {
        self.with_file(|file| {
            let before = file.ideas.len();
            file.ideas.retain(|idea| idea.id != id);
            if file.ideas.len() == before {
                return Err(IdeaNotFoundError { id }.into());
            }
            Ok(((), true))
        })
    }

    /// Run `f` on the current file contents; persist when it reports a change.
    fn with_file<T>(&self, f: impl FnOnce(&mut IdeaFile) -> Result<(T, bool)>) -> Result<T> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| anyhow!("idea store lock poisoned"))?;
        let (mut file, fresh) = self.load()?;
        let (value, changed) = f(&mut file)?;
        if changed || fresh {
            self.write(&file)?;
        }
        Ok(value)
    }

    fn load(&self) -> Result<(IdeaFile, bool)> {
        if !self.path.exists() {
            info!(path = %self.path.display(), "seeding idea list");
            return Ok((IdeaFile::seeded(), true));
        }
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("read ideas {}", self.path.display()))?;
        let mut file: IdeaFile = serde_json::from_str(&contents)
            .with_context(|| format!("parse ideas {}", self.path.display()))?;
        let max_id = file.ideas.iter().map(|idea| idea.id).max().unwrap_or(0);
        file.next_id = file.next_id.max(max_id + 1);
        Ok((file, false))
    }

    fn write(&self, file: &IdeaFile) -> Result<()> {
        let mut buf = serde_json::to_string_pretty(file)?;
        buf.push('\n');
        super::write_atomic(&self.path, &buf)
    }
}

fn normalize_goal(goal: &str) -> Result<String> {
    let goal = goal.trim();
    if goal.is_empty() {
        return Err(anyhow!("idea goal must not be empty"));
    }
    Ok(goal.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, IdeaStore) {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = IdeaStore::new(temp.path().join("ideas.json"));
        (temp, store)
    }

    #[test]
    fn first_use_seeds_three_ideas_newest_first() {
        let (_temp, store) = store();
        let ideas = store.list().expect("list");
        assert_eq!(ideas.len(), 3);
        assert_eq!(ideas[0].goal, SEED_IDEAS[2]);
        assert_eq!(ideas[2].goal, SEED_IDEAS[0]);
        assert!(store.path().exists());
    }

    #[test]
    fn duplicate_goals_are_ignored() {
        let (_temp, store) = store();
        let first = store.create("Plan a team offsite").expect("create");
        let second = store.create("  Plan a team offsite ").expect("create again");
        assert_eq!(first, second);
        assert_eq!(store.list().expect("list").len(), 4);

        let seeded = store.create(SEED_IDEAS[0]).expect("create seeded");
        assert_eq!(seeded.id, 1);
    }

    #[test]
    fn update_and_delete_report_unknown_ids() {
        let (_temp, store) = store();
        let idea = store.create("Draft a newsletter").expect("create");
        let updated = store.update(idea.id, "Draft a weekly newsletter").expect("update");
        assert_eq!(store.get(idea.id).expect("get"), updated);

        store.delete(idea.id).expect("delete");
        let err = store.delete(idea.id).unwrap_err();
        assert_eq!(
            err.downcast_ref::<IdeaNotFoundError>(),
            Some(&IdeaNotFoundError { id: idea.id })
        );
        let err = store.update(999, "x").unwrap_err();
        assert!(err.downcast_ref::<IdeaNotFoundError>().is_some());
    }

    #[test]
    fn ids_are_not_reused_after_delete() {
        let (_temp, store) = store();
        let a = store.create("a").expect("create");
        store.delete(a.id).expect("delete");
        let b = store.create("b").expect("create");
        assert!(b.id > a.id);
    }

    #[test]
    fn blank_goal_is_rejected() {
        let (_temp, store) = store();
        assert!(store.create("   ").is_err());
    }
}
