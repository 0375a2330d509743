//! Project read-access roles. The store's access control is index-scoped, so
//! a project's reading privilege is exactly a deduplicated list of index
//! names, always including the master index.
//!
//! Role updates are read-modify-write with no versioning: two concurrent
//! mutations of the same project are last-writer-wins. Callers operating
//! concurrently on one project must serialize externally.

use crate::{
    engine::error,
    store::{DASHBOARD_ENTRY_INDEX, Role, Store, project_from_role, role_name},
};

pub struct ProjectManager<'a, S> {
    store: &'a S,
}

impl<'a, S: Store> ProjectManager<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// # Errors
    pub async fn exists(&self, name: &str) -> error::Result<bool> {
        Ok(self.store.fetch_role(&role_name(name)).await?.is_some())
    }

    /// Create a project granting read over the master index plus the given
    /// dashboard ids.
    ///
    /// # Errors
    ///
    /// Fails if the project already exists.
    pub async fn create(&self, name: &str, dashboard_ids: &[String]) -> error::Result<()> {
        if self.exists(name).await? {
            return Err(error::Error::ProjectExists {
                name: name.to_string(),
            });
        }

        let mut names = vec![DASHBOARD_ENTRY_INDEX.to_string()];
        for dashboard_id in dashboard_ids {
            if !names.contains(dashboard_id) {
                names.push(dashboard_id.clone());
            }
        }

        self.store
            .put_role(&role_name(name), &Role::read_only(names))
            .await?;
        tracing::info!(project = name, "added new project");

        Ok(())
    }

    /// Enroll a dashboard into each named project. Checks that every project
    /// exists before mutating any of them; enrollment is idempotent per
    /// project.
    ///
    /// # Errors
    pub async fn add_dashboard(
        &self,
        dashboard_id: &str,
        projects: &[String],
    ) -> error::Result<()> {
        for project in projects {
            if !self.exists(project).await? {
                return Err(error::Error::ProjectNotFound {
                    name: project.clone(),
                });
            }
        }

        for project in projects {
            let role_name = role_name(project);
            let Some(role) = self.store.fetch_role(&role_name).await? else {
                return Err(error::Error::ProjectNotFound {
                    name: project.clone(),
                });
            };

            let mut names = role.index_names();
            if names.iter().any(|name| name == dashboard_id) {
                continue;
            }

            tracing::info!(dashboard_id, project, "adding dashboard to project");
            names.push(dashboard_id.to_string());
            self.store
                .put_role(&role_name, &Role::read_only(names))
                .await?;
        }

        Ok(())
    }

    /// Remove a dashboard from the named projects, or from every existing
    /// project when none are named. Removal from a project that does not
    /// hold the dashboard is a no-op.
    ///
    /// # Errors
    pub async fn remove_dashboard(
        &self,
        dashboard_id: &str,
        projects: &[String],
    ) -> error::Result<()> {
        let role_names: Vec<String> = if projects.is_empty() {
            self.store
                .fetch_roles()
                .await?
                .into_keys()
                .filter(|name| project_from_role(name).is_some())
                .collect()
        } else {
            projects.iter().map(|project| role_name(project)).collect()
        };

        tracing::info!(
            dashboard_id,
            projects = role_names.len(),
            "removing dashboard from projects"
        );

        for role_name in role_names {
            let Some(role) = self.store.fetch_role(&role_name).await? else {
                return Err(error::Error::ProjectNotFound {
                    name: project_from_role(&role_name)
                        .unwrap_or(&role_name)
                        .to_string(),
                });
            };

            let mut names = role.index_names();
            let before = names.len();
            names.retain(|name| name != dashboard_id);
            if names.len() == before {
                continue;
            }

            self.store
                .put_role(&role_name, &Role::read_only(names))
                .await?;
        }

        Ok(())
    }

    /// # Errors
    pub async fn list(&self) -> error::Result<Vec<String>> {
        Ok(self
            .store
            .fetch_roles()
            .await?
            .into_keys()
            .filter_map(|role| project_from_role(&role).map(str::to_string))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::engine::test_util::FakeStore;

    async fn store_with_project(name: &str) -> FakeStore {
        let store = FakeStore::new();
        ProjectManager::new(&store).create(name, &[]).await.unwrap();
        store
    }

    #[tokio::test]
    async fn create_includes_master_index_and_dedups() {
        let store = FakeStore::new();
        let projects = ProjectManager::new(&store);

        projects
            .create(
                "fitness",
                &["sc-1".to_string(), "sc-2".to_string(), "sc-1".to_string()],
            )
            .await
            .unwrap();

        let role = store.role("fitness_dashboardReader").unwrap();
        assert_eq!(
            role.index_names(),
            ["dashboard_entries", "sc-1", "sc-2"]
        );
    }

    #[tokio::test]
    async fn create_fails_when_present() {
        let store = store_with_project("DLP").await;

        let err = ProjectManager::new(&store)
            .create("DLP", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, error::Error::ProjectExists { .. }));
    }

    #[tokio::test]
    async fn add_dashboard_is_idempotent() {
        let store = store_with_project("DLP").await;
        let projects = ProjectManager::new(&store);
        let targets = ["DLP".to_string()];

        projects.add_dashboard("SC-1234", &targets).await.unwrap();
        projects.add_dashboard("SC-1234", &targets).await.unwrap();

        let names = store.role("DLP_dashboardReader").unwrap().index_names();
        let occurrences = names.iter().filter(|name| *name == "SC-1234").count();
        assert_eq!(occurrences, 1);
    }

    #[tokio::test]
    async fn add_dashboard_fails_fast_on_missing_project() {
        let store = store_with_project("DLP").await;
        let projects = ProjectManager::new(&store);

        // "nope" is checked before "DLP" is mutated.
        let err = projects
            .add_dashboard("SC-1234", &["nope".to_string(), "DLP".to_string()])
            .await
            .unwrap_err();

        assert!(matches!(err, error::Error::ProjectNotFound { ref name } if name == "nope"));
        let names = store.role("DLP_dashboardReader").unwrap().index_names();
        assert!(!names.contains(&"SC-1234".to_string()));
    }

    #[tokio::test]
    async fn remove_absent_dashboard_is_a_no_op() {
        let store = store_with_project("DLP").await;
        let projects = ProjectManager::new(&store);

        projects
            .remove_dashboard("SC-1234", &["DLP".to_string()])
            .await
            .unwrap();

        assert_eq!(
            store.role("DLP_dashboardReader").unwrap().index_names(),
            ["dashboard_entries"]
        );
    }

    #[tokio::test]
    async fn empty_project_list_removes_from_all() {
        let store = FakeStore::new();
        let projects = ProjectManager::new(&store);
        projects
            .create("DLP", &["SC-1234".to_string()])
            .await
            .unwrap();
        projects
            .create("fitness", &["SC-1234".to_string()])
            .await
            .unwrap();

        projects.remove_dashboard("SC-1234", &[]).await.unwrap();

        for role in ["DLP_dashboardReader", "fitness_dashboardReader"] {
            assert_eq!(
                store.role(role).unwrap().index_names(),
                ["dashboard_entries"]
            );
        }
    }

    #[tokio::test]
    async fn list_strips_the_role_suffix() {
        let store = FakeStore::new();
        let projects = ProjectManager::new(&store);
        projects.create("DLP", &[]).await.unwrap();
        projects.create("fitness", &[]).await.unwrap();

        assert_eq!(projects.list().await.unwrap(), ["DLP", "fitness"]);
    }
}
