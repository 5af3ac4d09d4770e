//! Batch runs on the local machine.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use stitch::batch::{Artifact, BatchRunner, SiteOperation, SiteStatus};
use stitch::config::{ConfigParser, StitchConfig};
use stitch::error::{Result, StitchError};
use stitch::exec::{Executor, LocalExecutor};
use stitch::resolver::Resolver;
use stitch::session::{SessionBuilder, SessionContext};
use tempfile::TempDir;

fn fleet(root: &str) -> StitchConfig {
    let yaml = format!(
        r"
hosts_defaults:
  virtualenv_dir: {root}/envs
  apache_dir: {root}/apache
  wsgi_dir: {root}/wsgi
  staging_settings: {root}/settings
hosts:
  laptop:
    hostname: localhost
    local: true
sites:
  blog:
    on_hosts: laptop
    project_name: blog
    original_settings: blog.settings
  shop:
    on_hosts: laptop
    project_name: shop
    original_settings: shop.settings
  broken:
    on_hosts: laptop
    project_name: broken
    original_settings: broken.settings
roles: {{}}
"
    );
    ConfigParser::new().parse_yaml(&yaml, None).unwrap()
}

/// Writes a marker file into each site's settings directory.
#[derive(Default)]
struct WriteMarker {
    calls: AtomicUsize,
}

#[async_trait]
impl SiteOperation for WriteMarker {
    fn name(&self) -> &'static str {
        "marker"
    }

    async fn apply(&self, ctx: &SessionContext, exec: &dyn Executor) -> Result<Vec<Artifact>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if ctx.site == "broken" {
            return Err(StitchError::internal("broken site"));
        }
        let path = format!("{}/marker", ctx.settings_dir);
        let content = ctx.site.as_bytes();
        exec.upload(content, &path).await?;
        Ok(vec![Artifact::new(path, content)])
    }
}

fn requested(keys: &[&str]) -> Vec<String> {
    keys.iter().map(ToString::to_string).collect()
}

#[tokio::test]
async fn local_batch_writes_files_and_reloads() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().to_str().unwrap();
    let config = fleet(root);
    let resolver = Resolver::new(&config).unwrap();
    let batch = SessionBuilder::new(&resolver)
        .build_batch("laptop", &requested(&["blog", "shop"]))
        .unwrap();

    let exec = LocalExecutor::new().with_restart_command("true");
    let operation = WriteMarker::default();
    let report = BatchRunner::new(&exec).run(&batch, &operation).await;

    assert!(report.success());
    assert_eq!(report.count(SiteStatus::Succeeded), 2);
    assert!(report.restart.success);

    let marker = dir.path().join("settings/shop/marker");
    assert_eq!(std::fs::read_to_string(marker).unwrap(), "shop");
}

#[tokio::test]
async fn failure_is_aggregated_and_reported() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().to_str().unwrap();
    let config = fleet(root);
    let resolver = Resolver::new(&config).unwrap();
    let batch = SessionBuilder::new(&resolver).build_batch("laptop", &[]).unwrap();
    assert_eq!(batch.site_keys(), vec!["blog", "shop", "broken"]);

    let exec = LocalExecutor::new().with_restart_command("true");
    let operation = WriteMarker::default();
    let report = BatchRunner::new(&exec).run(&batch, &operation).await;

    assert!(!report.success());
    assert_eq!(report.count(SiteStatus::Succeeded), 2);
    assert_eq!(report.count(SiteStatus::Failed), 1);
    assert_eq!(operation.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn failed_reload_fails_the_report() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().to_str().unwrap();
    let config = fleet(root);
    let resolver = Resolver::new(&config).unwrap();
    let batch = SessionBuilder::new(&resolver)
        .build_batch("laptop", &requested(&["blog"]))
        .unwrap();

    let exec = LocalExecutor::new().with_restart_command("false");
    let report = BatchRunner::new(&exec)
        .run(&batch, &WriteMarker::default())
        .await;

    assert_eq!(report.count(SiteStatus::Succeeded), 1);
    assert!(!report.restart.success);
    assert!(!report.success());
}
