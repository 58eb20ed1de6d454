use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::api;
use crate::config::Config;
use crate::data::{
    AuthService, ChannelService, CommentService, InteractionService, MockAuthService,
    MockChannelService, MockCommentService, MockInteractionService, MockVideoService,
    RestAuthService, RestChannelService, RestCommentService, RestInteractionService,
    RestVideoService, VideoService,
};
use crate::navbar::Navbar;
use crate::session::Session;
use crate::watch::Watch;

/// One bundle of the service implementations both controllers share.
pub struct Services {
    pub videos: Arc<dyn VideoService>,
    pub comments: Arc<dyn CommentService>,
    pub channels: Arc<dyn ChannelService>,
    pub interactions: Arc<dyn InteractionService>,
    pub auth: Arc<dyn AuthService>,
}

impl Services {
    pub fn rest(client: Arc<api::Client>) -> Self {
        Self {
            videos: Arc::new(RestVideoService::new(client.clone())),
            comments: Arc::new(RestCommentService::new(client.clone())),
            channels: Arc::new(RestChannelService::new(client.clone())),
            interactions: Arc::new(RestInteractionService::new(client.clone())),
            auth: Arc::new(RestAuthService::new(client)),
        }
    }

    /// Offline bundle backed by sample data; handy for embedding demos
    /// and tests.
    pub fn mock() -> Self {
        Self {
            videos: Arc::new(MockVideoService::default()),
            comments: Arc::new(MockCommentService::default()),
            channels: Arc::new(MockChannelService::default()),
            interactions: Arc::new(MockInteractionService::default()),
            auth: Arc::new(MockAuthService::default()),
        }
    }
}

/// Composition root. The embedding front-end constructs one `App`,
/// forwards user input to the controllers, and calls `poll()` once per
/// event-loop turn to commit finished fetches.
pub struct App {
    pub session: Arc<Session>,
    pub navbar: Navbar,
    pub watch: Watch,
}

impl App {
    pub fn new(cfg: &Config) -> Result<Self> {
        let client = api::Client::new(api::ClientConfig {
            user_agent: cfg.api.user_agent.clone(),
            base_url: Some(cfg.api.base_url.clone()),
            timeout: Some(cfg.api.timeout),
            http_client: None,
        })
        .context("create api client")?;
        let services = Services::rest(Arc::new(client));
        Ok(Self::with_services(
            services,
            cfg.notifications.poll_interval,
        ))
    }

    pub fn with_services(services: Services, poll_interval: Duration) -> Self {
        let session = Arc::new(Session::new());
        let navbar = Navbar::new(
            session.clone(),
            services.videos.clone(),
            services.comments,
            services.auth,
            poll_interval,
        );
        let watch = Watch::new(
            session.clone(),
            services.videos,
            services.channels,
            services.interactions,
        );
        App {
            session,
            navbar,
            watch,
        }
    }

    pub fn poll(&mut self) {
        self.navbar.tick();
        self.navbar.poll();
        self.watch.poll();
    }
}
