use dashmap::DashMap;

use super::ProjectStore;
use crate::models::Project;

#[derive(Default)]
pub struct MemoryProjectStore {
    projects: DashMap<String, Project>,
}

impl MemoryProjectStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProjectStore for MemoryProjectStore {
    fn get(&self, id: &str) -> Option<Project> {
        self.projects.get(id).map(|p| p.value().clone())
    }

    fn put(&self, project: Project) {
        self.projects.insert(project.id.clone(), project);
    }

    fn update(&self, id: &str, f: &mut dyn FnMut(&mut Project)) -> Option<Project> {
        let mut entry = self.projects.get_mut(id)?;
        f(entry.value_mut());
        Some(entry.value().clone())
    }

    fn list(&self) -> Vec<Project> {
        let mut projects: Vec<Project> =
            self.projects.iter().map(|p| p.value().clone()).collect();
        projects.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        projects
    }
}
