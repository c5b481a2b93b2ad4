//! Top-level coordinator.
//!
//! A [`Controller`] owns the resolved settings and the process's single
//! interceptor session, and drives stub, unstub and sync sequentially.
//! Running two controllers against the same process-wide hook is not
//! supported.

use crate::config::{Command, Settings};
use crate::error::Result;
use crate::fixtures::FixtureSet;
use crate::interceptor::Interceptor;
use crate::remote::ContentSource;
use crate::sync::Synchronizer;
use crate::transport::TransportHook;
use std::sync::Arc;
use tracing::info;

/// What a [`Controller::run`] call did.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Interception is active with this many fixtures loaded.
    Stubbed { fixtures: usize },
    Unstubbed,
    /// Sync finished and wrote these fixtures.
    Synced(FixtureSet),
}

pub struct Controller {
    settings: Settings,
    interceptor: Interceptor,
    synchronizer: Synchronizer,
}

impl Controller {
    /// Build an inactive controller.
    pub fn new(
        settings: Settings,
        hook: Arc<dyn TransportHook>,
        source: Arc<dyn ContentSource>,
    ) -> Self {
        info!(
            fixture_dir = %settings.fixture_dir.display(),
            preview = settings.preview,
            "Controller initialized"
        );
        Self {
            settings,
            interceptor: Interceptor::new(hook),
            synchronizer: Synchronizer::new(source),
        }
    }

    /// Build a controller and, when `autorun` is set, immediately run the
    /// configured command.
    pub async fn launch(
        settings: Settings,
        hook: Arc<dyn TransportHook>,
        source: Arc<dyn ContentSource>,
    ) -> Result<(Self, Option<RunOutcome>)> {
        let autorun = settings.autorun.then_some(settings.command);
        let mut controller = Self::new(settings, hook, source);
        let outcome = match autorun {
            Some(command) => Some(controller.run(command).await?),
            None => None,
        };
        Ok((controller, outcome))
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn interceptor(&self) -> &Interceptor {
        &self.interceptor
    }

    pub fn is_stubbed(&self) -> bool {
        self.interceptor.is_active()
    }

    /// Load fixtures and start intercepting.
    pub fn stub(&mut self) -> Result<()> {
        self.interceptor.stub(&self.settings.fixture_dir)
    }

    pub fn unstub(&mut self) {
        self.interceptor.unstub();
    }

    /// Refresh the fixture directory from the live API. Leaves interception
    /// off.
    pub async fn sync(&mut self) -> Result<FixtureSet> {
        info!("Setting up contentfaux");
        let config = self.settings.sync_config();
        self.synchronizer.sync(&config, &mut self.interceptor).await
    }

    pub async fn run(&mut self, command: Command) -> Result<RunOutcome> {
        match command {
            Command::Stub => {
                self.stub()?;
                Ok(RunOutcome::Stubbed {
                    fixtures: self.interceptor.fixture_count(),
                })
            }
            Command::Unstub => {
                self.unstub();
                Ok(RunOutcome::Unstubbed)
            }
            Command::Setup => self.sync().await.map(RunOutcome::Synced),
        }
    }
}
