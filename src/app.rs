//! Explicitly constructed application context.

use crate::api::{CenterApi, EnvelopeClient, ReleaseClient};
use crate::auth::CredentialProvider;
use crate::config::Config;
use crate::error::Result;
use crate::frpc::Installer;
use crate::runner::Supervisor;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Everything a host needs: gateway, installer and supervisor, wired from one
/// [`Config`].
#[derive(Debug)]
pub struct App {
    config: Config,
    center: Arc<CenterApi>,
    installer: Installer,
    supervisor: Supervisor,
}

impl App {
    /// `shutdown` is the host's root token. Cancelling it kills a running
    /// tunnel client.
    pub fn new(
        config: Config,
        credentials: Arc<dyn CredentialProvider>,
        shutdown: CancellationToken,
    ) -> Result<Self> {
        let user_agent = config.user_agent();

        let client = EnvelopeClient::new(
            &config.center_api_base_url,
            user_agent.clone(),
            config.http_timeout(),
        )
        .with_credentials(credentials);
        let center = Arc::new(CenterApi::new(client));

        let releases = ReleaseClient::new(
            &config.release_api_url,
            user_agent,
            config.http_timeout(),
        );
        let installer = Installer::new(releases, config.installer_options())?;
        let supervisor = Supervisor::new(center.clone(), installer.binary_path(), shutdown);

        Ok(Self {
            config,
            center,
            installer,
            supervisor,
        })
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn center(&self) -> &CenterApi {
        &self.center
    }

    #[must_use]
    pub fn installer(&self) -> &Installer {
        &self.installer
    }

    #[must_use]
    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticToken;
    use crate::runner::Phase;
    use tempfile::TempDir;

    #[test]
    fn test_supervisor_uses_installer_binary() {
        let dir = TempDir::new().unwrap();
        let config = Config {
            data_dir: dir.path().to_path_buf(),
            ..Config::default()
        };
        let app = App::new(
            config,
            Arc::new(StaticToken::new("token")),
            CancellationToken::new(),
        )
        .unwrap();

        assert!(app.installer().binary_path().starts_with(dir.path()));
        assert_eq!(app.supervisor().status().phase, Phase::Stopped);
        assert!(format!("{:?}", app.supervisor()).contains(&app.installer().binary_path().display().to_string()));
    }
}
