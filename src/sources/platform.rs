//! Heroku: dynos that are neither idle nor up.

use super::{FetchSummary, GatherContext, Source};
use crate::metrics::{LiveSnapshot, Metric};
use crate::transport::HttpTransport;
use crate::Result;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

#[derive(Debug, Clone, Deserialize)]
pub struct App {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Dyno {
    #[serde(default)]
    pub state: String,
}

impl Dyno {
    /// `idle` and `up` are healthy; crashed, starting, down and anything unknown are not.
    pub fn is_down(&self) -> bool {
        !matches!(self.state.as_str(), "idle" | "up")
    }
}

pub struct PlatformSource {
    transport: HttpTransport,
    app_prefix: String,
}

impl PlatformSource {
    pub fn new(transport: HttpTransport, app_prefix: impl Into<String>) -> Self {
        Self {
            transport,
            app_prefix: app_prefix.into(),
        }
    }

    async fn apps(&self) -> Result<Vec<App>> {
        let apps: Vec<App> = self.transport.get_path("apps").await?;
        Ok(apps
            .into_iter()
            .filter(|app| app.name.starts_with(&self.app_prefix))
            .collect())
    }

    async fn count_down(&self, app: &App) -> Result<u64> {
        let dynos: Vec<Dyno> = self
            .transport
            .get_path(&format!("apps/{}/dynos", app.name))
            .await?;
        Ok(dynos.iter().filter(|d| d.is_down()).count() as u64)
    }
}

#[async_trait]
impl Source for PlatformSource {
    fn name(&self) -> &'static str {
        "platform"
    }

    fn metrics(&self) -> &'static [Metric] {
        &[Metric::DynosDown]
    }

    async fn fetch(&self, _ctx: &GatherContext, snapshot: &LiveSnapshot) -> Result<FetchSummary> {
        let apps = self.apps().await?;
        debug!(prefix = self.app_prefix.as_str(), apps = apps.len(), "matched apps");

        let mut summary = FetchSummary::default();
        for app in &apps {
            match self.count_down(app).await {
                Ok(n) => {
                    snapshot.increment(Metric::DynosDown, n);
                    summary.count();
                }
                Err(e) => {
                    warn!(app = app.name.as_str(), error = %e, "dyno list unavailable");
                    summary.skip(app.name.clone(), e);
                }
            }
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dyno_states() {
        let dyno = |s: &str| Dyno { state: s.to_string() };
        assert!(!dyno("up").is_down());
        assert!(!dyno("idle").is_down());
        assert!(dyno("crashed").is_down());
        assert!(dyno("starting").is_down());
        assert!(dyno("").is_down());
    }

    #[test]
    fn test_dyno_decodes_with_extra_fields() {
        let dynos: Vec<Dyno> =
            serde_json::from_str(r#"[{"state":"crashed","type":"web","name":"web.1"}]"#).unwrap();
        assert!(dynos[0].is_down());
    }
}
