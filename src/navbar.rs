use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::api::Comment;
use crate::data::{AuthService, CommentService, VideoService};
use crate::route::{Route, SearchMode};
use crate::session::Session;

/// Popover state of the navigation bar. One enum instead of two
/// booleans: the account menu and the notification menu can never be
/// open at the same time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MenuState {
    #[default]
    Closed,
    Account,
    Notifications,
}

impl MenuState {
    pub fn toggle_account(self) -> Self {
        match self {
            MenuState::Account => MenuState::Closed,
            _ => MenuState::Account,
        }
    }

    pub fn toggle_notifications(self) -> Self {
        match self {
            MenuState::Notifications => MenuState::Closed,
            _ => MenuState::Notifications,
        }
    }
}

struct PendingNotifications {
    request_id: u64,
    user_id: String,
}

enum NavResponse {
    Notifications {
        request_id: u64,
        user_id: String,
        result: Result<Vec<Comment>>,
    },
    Logout {
        result: Result<()>,
    },
}

/// Navigation-bar controller: search box, account/notification menus,
/// and the polled notification feed (new comments on the signed-in
/// user's own videos).
pub struct Navbar {
    session: Arc<Session>,
    videos: Arc<dyn VideoService>,
    comments: Arc<dyn CommentService>,
    auth: Arc<dyn AuthService>,
    menu: MenuState,
    search_mode: SearchMode,
    notifications: Vec<Comment>,
    pending: Option<PendingNotifications>,
    next_request_id: u64,
    last_user_id: Option<String>,
    last_refresh: Option<Instant>,
    poll_interval: Duration,
    response_tx: Sender<NavResponse>,
    response_rx: Receiver<NavResponse>,
}

impl Navbar {
    pub fn new(
        session: Arc<Session>,
        videos: Arc<dyn VideoService>,
        comments: Arc<dyn CommentService>,
        auth: Arc<dyn AuthService>,
        poll_interval: Duration,
    ) -> Self {
        let (response_tx, response_rx) = unbounded();
        Self {
            session,
            videos,
            comments,
            auth,
            menu: MenuState::default(),
            search_mode: SearchMode::default(),
            notifications: Vec::new(),
            pending: None,
            next_request_id: 1,
            last_user_id: None,
            last_refresh: None,
            poll_interval,
            response_tx,
            response_rx,
        }
    }

    pub fn menu(&self) -> MenuState {
        self.menu
    }

    pub fn search_mode(&self) -> SearchMode {
        self.search_mode
    }

    pub fn notifications(&self) -> &[Comment] {
        &self.notifications
    }

    pub fn toggle_account_menu(&mut self) {
        self.menu = self.menu.toggle_account();
    }

    pub fn toggle_notifications(&mut self) {
        self.menu = self.menu.toggle_notifications();
    }

    pub fn toggle_search_mode(&mut self) {
        self.search_mode = self.search_mode.toggled();
    }

    /// No validation beyond the mode flag: an empty query still
    /// navigates, matching the search box behavior.
    pub fn search(&self, query: &str) -> Route {
        Route::Search {
            query: query.to_string(),
            mode: self.search_mode,
        }
    }

    /// "User Panel" entry of the account menu.
    pub fn user_panel(&self) -> Option<Route> {
        self.session.user_id().map(Route::Panel)
    }

    /// "Your Channel" entry of the account menu.
    pub fn your_channel(&self) -> Option<Route> {
        self.session.user_id().map(Route::Channel)
    }

    /// Re-run the feed refresh when the signed-in user changed or the
    /// poll interval elapsed. Call once per event-loop turn.
    pub fn tick(&mut self) {
        let user_id = self.session.user_id();
        let user_changed = user_id != self.last_user_id;
        let due = self
            .last_refresh
            .map_or(true, |at| at.elapsed() >= self.poll_interval);
        if user_changed || (due && self.pending.is_none()) {
            self.last_user_id = user_id;
            self.refresh_notifications();
        }
    }

    /// Fetch the notification feed on a worker thread. Supersedes any
    /// refresh still in flight; the stale one is discarded on commit.
    pub fn refresh_notifications(&mut self) {
        self.last_refresh = Some(Instant::now());

        let Some(user_id) = self.session.user_id() else {
            self.notifications.clear();
            self.pending = None;
            return;
        };

        let request_id = self.next_request_id;
        self.next_request_id = self.next_request_id.wrapping_add(1);
        self.pending = Some(PendingNotifications {
            request_id,
            user_id: user_id.clone(),
        });

        let videos = self.videos.clone();
        let comments = self.comments.clone();
        let tx = self.response_tx.clone();
        thread::spawn(move || {
            let result = fetch_new_comments(videos.as_ref(), &comments, &user_id);
            let _ = tx.send(NavResponse::Notifications {
                request_id,
                user_id,
                result,
            });
        });
    }

    /// Drain worker responses and commit them. A response that no longer
    /// matches the pending request or the signed-in user is discarded.
    pub fn poll(&mut self) {
        while let Ok(response) = self.response_rx.try_recv() {
            match response {
                NavResponse::Notifications {
                    request_id,
                    user_id,
                    result,
                } => {
                    let matches = self
                        .pending
                        .as_ref()
                        .map_or(false, |p| p.request_id == request_id && p.user_id == user_id);
                    if !matches {
                        log::debug!("navbar: discarding superseded notification refresh");
                        continue;
                    }
                    self.pending = None;
                    if self.session.user_id().as_deref() != Some(user_id.as_str()) {
                        log::debug!("navbar: user changed mid-refresh, feed discarded");
                        continue;
                    }
                    match result {
                        Ok(feed) => self.notifications = feed,
                        // keep the previous list; the next poll retries
                        Err(err) => log::warn!("navbar: notification refresh failed: {err:#}"),
                    }
                }
                NavResponse::Logout { result } => {
                    if let Err(err) = result {
                        log::warn!("navbar: server logout failed: {err:#}");
                    }
                }
            }
        }
    }

    /// Clear local state first, then tell the server. The UI must never
    /// show an authenticated view while the round trip is in flight.
    pub fn logout(&mut self) -> Route {
        self.session.clear();
        self.notifications.clear();
        self.pending = None;
        self.menu = MenuState::Closed;
        self.last_user_id = None;

        let auth = self.auth.clone();
        let tx = self.response_tx.clone();
        thread::spawn(move || {
            let _ = tx.send(NavResponse::Logout {
                result: auth.logout(),
            });
        });

        Route::Home
    }
}

/// All comments on videos owned by `user_id`. The per-video fetches run
/// on parallel threads and are joined before anything is returned, so a
/// partial feed is never committed.
fn fetch_new_comments(
    videos: &dyn VideoService,
    comments: &Arc<dyn CommentService>,
    user_id: &str,
) -> Result<Vec<Comment>> {
    let all = videos.list().context("list videos")?;
    let owned: HashSet<String> = all
        .into_iter()
        .filter(|video| video.user_id == user_id)
        .map(|video| video.id)
        .collect();
    if owned.is_empty() {
        return Ok(Vec::new());
    }

    let mut handles = Vec::with_capacity(owned.len());
    for video_id in &owned {
        let comments = comments.clone();
        let video_id = video_id.clone();
        handles.push(thread::spawn(move || {
            comments
                .for_video(&video_id)
                .with_context(|| format!("fetch comments for {video_id}"))
        }));
    }

    let mut combined = Vec::new();
    for handle in handles {
        match handle.join() {
            Ok(result) => combined.extend(result?),
            Err(_) => bail!("comment fetch worker panicked"),
        }
    }
    combined.retain(|comment| owned.contains(&comment.video_id));
    Ok(combined)
}
