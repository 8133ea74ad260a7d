mod common;

use std::sync::Arc;
use std::time::Duration;

use crypto_box::SecretKey;
use crypto_box::aead::OsRng;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use nodesite::config::DeployConfig;
use nodesite::deploy::{BuildError, BuildOrchestrator, repository_name};
use nodesite::github::Provisioner;
use nodesite::lifecycle::{LifecycleError, ProjectLifecycle};
use nodesite::models::{Project, ProjectStatus, ProjectUpdate, TransitionPolicy};

struct Harness {
    notion: MockServer,
    github: MockServer,
    lifecycle: Arc<ProjectLifecycle>,
    builds: BuildOrchestrator,
}

async fn setup(policy: TransitionPolicy) -> Harness {
    let notion = MockServer::start().await;
    let github = MockServer::start().await;

    let lifecycle = Arc::new(common::lifecycle(&notion.uri(), policy));
    let provisioner = Arc::new(Provisioner::new(common::github_config(&github.uri())));
    let builds = BuildOrchestrator::new(
        lifecycle.clone(),
        provisioner,
        DeployConfig {
            delay: Duration::from_millis(50),
            domain: "vercel.app".to_string(),
        },
    );

    Harness {
        notion,
        github,
        lifecycle,
        builds,
    }
}

async fn extracted_project(harness: &Harness) -> Project {
    common::mock_template(&harness.notion).await;
    let project = harness
        .lifecycle
        .create_user_project(common::token_response(Some(common::TEMPLATE_PAGE)))
        .await
        .unwrap();
    assert_eq!(project.status, ProjectStatus::DatabasesExtracted);
    project
}

#[test]
fn repository_name_is_slugged_project_id() {
    assert_eq!(
        repository_name("project_0192ABCdef"),
        "nodesite-project-0192abcdef"
    );
    assert_eq!(repository_name("a.b/c"), "nodesite-a-b-c");
}

#[tokio::test]
async fn build_provisions_repository_then_deploys() {
    let harness = setup(TransitionPolicy::ForwardOnly).await;
    let project = extracted_project(&harness).await;
    let secret_key = SecretKey::generate(&mut OsRng);

    common::mock_generate(&harness.github, "acme", "nodesite-demo").await;
    common::mock_repository(&harness.github, "acme", "nodesite-demo").await;
    common::mock_secrets(
        &harness.github,
        "acme",
        "nodesite-demo",
        secret_key.public_key().as_bytes(),
    )
    .await;

    let started = harness.builds.start_build(&project.id).await.unwrap();
    assert_eq!(started.project_id, project.id);
    assert_eq!(started.repository.name, "nodesite-demo");

    let building = harness.lifecycle.get_user_project(&project.id).unwrap();
    assert_eq!(building.status, ProjectStatus::WebsiteBuilding);
    assert_eq!(
        building.repo_url.as_deref(),
        Some("https://github.com/acme/nodesite-demo")
    );

    // Generated repository is named after the project.
    let requests = harness.github.received_requests().await.unwrap();
    let generate = requests
        .iter()
        .find(|r| r.url.path().ends_with("/generate"))
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&generate.body).unwrap();
    assert_eq!(body["name"], repository_name(&project.id));

    // Secrets carry the tenant's decrypted token and database ids.
    let secrets: Vec<(String, String)> = requests
        .iter()
        .filter(|r| r.method.as_str() == "PUT")
        .map(|r| {
            let name = r.url.path().rsplit('/').next().unwrap().to_string();
            (name, common::unseal(&secret_key, &r.body).1)
        })
        .collect();
    assert_eq!(secrets.len(), 4);
    assert!(secrets.contains(&("NOTION_API_KEY".to_string(), common::TENANT_TOKEN.to_string())));
    assert!(secrets.contains(&("NOTION_CATEGORY_DB_ID".to_string(), common::CATEGORY_DB.to_string())));
    assert!(secrets.contains(&("NOTION_CONTENT_DB_ID".to_string(), common::CONTENT_DB.to_string())));
    assert!(secrets.contains(&("USER_ID".to_string(), "user-1".to_string())));

    tokio::time::sleep(Duration::from_millis(300)).await;

    let deployed = harness.lifecycle.get_user_project(&project.id).unwrap();
    assert_eq!(deployed.status, ProjectStatus::Deployed);
    assert_eq!(
        deployed.site_url.as_deref(),
        Some("https://nodesite-demo.vercel.app")
    );
}

#[tokio::test]
async fn build_requires_extracted_databases() {
    let harness = setup(TransitionPolicy::Overwrite).await;
    let project = harness
        .lifecycle
        .create_user_project(common::token_response(None))
        .await
        .unwrap();

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&harness.github)
        .await;

    let err = harness.builds.start_build(&project.id).await.unwrap_err();
    assert!(matches!(
        err,
        BuildError::Lifecycle(LifecycleError::NotReady {
            status: ProjectStatus::TemplateCopied
        })
    ));
    assert_eq!(
        harness.lifecycle.get_user_project(&project.id).unwrap().status,
        ProjectStatus::TemplateCopied
    );
}

#[tokio::test]
async fn second_build_is_rejected_while_first_runs() {
    let harness = setup(TransitionPolicy::Overwrite).await;
    let project = extracted_project(&harness).await;

    harness.lifecycle.begin_build(&project.id).unwrap();

    let err = harness.builds.start_build(&project.id).await.unwrap_err();
    assert!(matches!(
        err,
        BuildError::Lifecycle(LifecycleError::NotReady {
            status: ProjectStatus::WebsiteBuilding
        })
    ));
}

#[tokio::test]
async fn provisioning_failure_moves_project_to_error() {
    let harness = setup(TransitionPolicy::ForwardOnly).await;
    let project = extracted_project(&harness).await;

    Mock::given(method("POST"))
        .and(path(format!(
            "/repos/{}/{}/generate",
            common::TEMPLATE_OWNER,
            common::TEMPLATE_REPO
        )))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "message": "Resource not accessible by integration",
        })))
        .mount(&harness.github)
        .await;

    let err = harness.builds.start_build(&project.id).await.unwrap_err();
    assert!(matches!(err, BuildError::Provision(_)));

    let failed = harness.lifecycle.get_user_project(&project.id).unwrap();
    assert_eq!(failed.status, ProjectStatus::Error);
    assert!(
        failed
            .error
            .as_deref()
            .is_some_and(|e| e.contains("Resource not accessible"))
    );
    assert!(failed.repo_url.is_none());
}

#[tokio::test]
async fn late_deployment_keeps_admin_error() {
    let harness = setup(TransitionPolicy::ForwardOnly).await;
    let project = extracted_project(&harness).await;
    let secret_key = SecretKey::generate(&mut OsRng);

    common::mock_generate(&harness.github, "acme", "nodesite-demo").await;
    common::mock_repository(&harness.github, "acme", "nodesite-demo").await;
    common::mock_secrets(
        &harness.github,
        "acme",
        "nodesite-demo",
        secret_key.public_key().as_bytes(),
    )
    .await;

    harness.builds.start_build(&project.id).await.unwrap();
    harness
        .lifecycle
        .update_project_status(
            &project.id,
            ProjectStatus::Error,
            ProjectUpdate {
                error: Some("Stopped by admin".to_string()),
                ..Default::default()
            },
        )
        .unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;

    let stopped = harness.lifecycle.get_user_project(&project.id).unwrap();
    assert_eq!(stopped.status, ProjectStatus::Error);
    assert_eq!(stopped.error.as_deref(), Some("Stopped by admin"));
    assert!(stopped.site_url.is_none());
}

#[tokio::test]
async fn failure_after_provisioning_keeps_repository_url() {
    let harness = setup(TransitionPolicy::ForwardOnly).await;
    let project = extracted_project(&harness).await;
    let secret_key = SecretKey::generate(&mut OsRng);

    Mock::given(method("POST"))
        .and(path(format!(
            "/repos/{}/{}/generate",
            common::TEMPLATE_OWNER,
            common::TEMPLATE_REPO
        )))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(common::repo_body("acme", "nodesite-demo"))
                .set_delay(Duration::from_millis(200)),
        )
        .mount(&harness.github)
        .await;
    common::mock_repository(&harness.github, "acme", "nodesite-demo").await;
    common::mock_secrets(
        &harness.github,
        "acme",
        "nodesite-demo",
        secret_key.public_key().as_bytes(),
    )
    .await;

    // The project is failed by an admin while the repository is generated.
    let cancel = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        harness
            .lifecycle
            .update_project_status(
                &project.id,
                ProjectStatus::Error,
                ProjectUpdate {
                    error: Some("Cancelled".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
    };
    let (result, ()) = tokio::join!(harness.builds.start_build(&project.id), cancel);

    assert!(matches!(
        result.unwrap_err(),
        BuildError::Lifecycle(LifecycleError::InvalidTransition {
            from: ProjectStatus::Error,
            to: ProjectStatus::WebsiteBuilding,
        })
    ));

    let failed = harness.lifecycle.get_user_project(&project.id).unwrap();
    assert_eq!(failed.status, ProjectStatus::Error);
    assert_eq!(failed.error.as_deref(), Some("Cancelled"));
    assert_eq!(
        failed.repo_url.as_deref(),
        Some("https://github.com/acme/nodesite-demo")
    );
}

#[tokio::test]
async fn unknown_project_cannot_build() {
    let harness = setup(TransitionPolicy::Overwrite).await;
    let err = harness.builds.start_build("project_missing").await.unwrap_err();
    assert!(matches!(err, BuildError::Lifecycle(LifecycleError::NotFound(_))));
}
