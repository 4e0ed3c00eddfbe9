//! Host-switchable levels.
//!
//! Every mode the window can be in implements [`Level`]: the profile menu,
//! waiting for a join, synchronized play and static info screens. A level
//! never draws by itself; it hands the renderer a [`Frame`] describing what
//! is on screen.

use std::cell::RefCell;
use std::rc::Rc;

use log::{info, warn};
use shared::{PlayerId, BASE_HEIGHT, BASE_WIDTH};

use crate::capture::CapturePointView;
use crate::config::ClientConfig;
use crate::game::{EntityView, SyncClient, TickOutcome};
use crate::input::{Key, KeyEdge, RenderHost};
use crate::session::{Connector, Session, SessionLink};
use crate::world::Scores;

/// How the base resolution maps onto the actual window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Layout {
    pub width: f32,
    pub height: f32,
    pub scale: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

impl Layout {
    pub fn to_screen(&self, x: f32, y: f32) -> (f32, f32) {
        (self.offset_x + x * self.scale, self.offset_y + y * self.scale)
    }
}

/// Uniformly scales the base resolution into the window and centers it.
pub fn fit_layout(outside_width: f32, outside_height: f32) -> Layout {
    let scale = (outside_width / BASE_WIDTH)
        .min(outside_height / BASE_HEIGHT)
        .max(0.0);
    Layout {
        width: outside_width,
        height: outside_height,
        scale,
        offset_x: (outside_width - BASE_WIDTH * scale) / 2.0,
        offset_y: (outside_height - BASE_HEIGHT * scale) / 2.0,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayFrame {
    pub local_id: PlayerId,
    pub entities: Vec<EntityView>,
    pub capture_points: Vec<CapturePointView>,
    pub scores: Scores,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Menu {
        name: String,
        skin: String,
        notice: Option<String>,
    },
    Play(PlayFrame),
    Info {
        title: String,
        lines: Vec<String>,
    },
}

pub enum LevelStep {
    Continue,
    Switch(Box<dyn Level>),
}

pub trait Level {
    fn update(&mut self, host: &dyn RenderHost) -> LevelStep;
    fn render(&self, host: &dyn RenderHost) -> Frame;

    fn layout(&self, outside_width: f32, outside_height: f32) -> Layout {
        fit_layout(outside_width, outside_height)
    }
}

pub type SharedConnector<L> = Rc<RefCell<dyn Connector<Link = L>>>;

/// Everything needed to (re)join the server with a fixed player profile.
pub struct Rejoin<L> {
    connector: SharedConnector<L>,
    config: ClientConfig,
}

impl<L> Clone for Rejoin<L> {
    fn clone(&self) -> Self {
        Self {
            connector: Rc::clone(&self.connector),
            config: self.config.clone(),
        }
    }
}

impl<L: SessionLink + 'static> Rejoin<L> {
    pub fn new(connector: SharedConnector<L>, config: ClientConfig) -> Self {
        Self { connector, config }
    }

    /// Kicks off a join attempt and returns the level that waits for it.
    pub fn start(&self) -> Box<dyn Level> {
        info!(
            "Joining {} as {:?} ({})",
            self.config.server_addr, self.config.player_name, self.config.player_skin
        );
        self.connector.borrow_mut().begin(&self.config);
        Box::new(ConnectingLevel {
            rejoin: self.clone(),
        })
    }
}

pub const SKIN_OPTIONS: [&str; 10] = [
    "01Knight", "02Knight", "03Knight", "04Knight", "05Knight", "06Knight", "07Knight", "08Knight",
    "09Knight", "10Knight",
];

pub const MAX_NAME_LEN: usize = 20;

/// Drops whitespace and keeps at most [`MAX_NAME_LEN`] characters.
pub fn sanitize_name(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace())
        .take(MAX_NAME_LEN)
        .collect()
}

pub fn skin_index(skin: &str) -> Option<usize> {
    SKIN_OPTIONS.iter().position(|option| *option == skin)
}

/// Player profile confirmation before joining.
///
/// The name comes from configuration; Up/Down cycle the skin and Enter joins.
pub struct MenuLevel<L> {
    connector: SharedConnector<L>,
    config: ClientConfig,
    name: String,
    skin_index: usize,
    confirm: KeyEdge,
    up: KeyEdge,
    down: KeyEdge,
    notice: Option<String>,
}

impl<L: SessionLink + 'static> MenuLevel<L> {
    pub fn new(config: ClientConfig, connector: SharedConnector<L>) -> Self {
        let name = sanitize_name(&config.player_name);
        let skin_index = skin_index(&config.player_skin).unwrap_or_else(|| {
            warn!(
                "Unknown skin {:?}, using {}",
                config.player_skin, SKIN_OPTIONS[0]
            );
            0
        });
        let notice = name
            .is_empty()
            .then(|| "Set a player name with --name or in the config file.".to_string());

        Self {
            connector,
            config,
            name,
            skin_index,
            confirm: KeyEdge::new(Key::Confirm),
            up: KeyEdge::new(Key::MenuUp),
            down: KeyEdge::new(Key::MenuDown),
            notice,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn skin(&self) -> &'static str {
        SKIN_OPTIONS[self.skin_index]
    }
}

impl<L: SessionLink + 'static> Level for MenuLevel<L> {
    fn update(&mut self, host: &dyn RenderHost) -> LevelStep {
        if self.up.pressed(host) && self.skin_index > 0 {
            self.skin_index -= 1;
        }
        if self.down.pressed(host) && self.skin_index + 1 < SKIN_OPTIONS.len() {
            self.skin_index += 1;
        }

        if !self.confirm.pressed(host) || self.name.is_empty() {
            return LevelStep::Continue;
        }

        let mut config = self.config.clone();
        config.player_name = self.name.clone();
        config.player_skin = self.skin().to_string();
        LevelStep::Switch(Rejoin::new(Rc::clone(&self.connector), config).start())
    }

    fn render(&self, _host: &dyn RenderHost) -> Frame {
        Frame::Menu {
            name: self.name.clone(),
            skin: self.skin().to_string(),
            notice: self.notice.clone(),
        }
    }
}

/// Waits for a join attempt to finish.
pub struct ConnectingLevel<L> {
    rejoin: Rejoin<L>,
}

impl<L: SessionLink + 'static> Level for ConnectingLevel<L> {
    fn update(&mut self, _host: &dyn RenderHost) -> LevelStep {
        let result = self.rejoin.connector.borrow_mut().poll();
        match result {
            None => LevelStep::Continue,
            Some(Ok(link)) => {
                let client = SyncClient::new(link, &self.rejoin.config);
                LevelStep::Switch(Box::new(
                    PlayLevel::new(client).with_rejoin(self.rejoin.clone()),
                ))
            }
            Some(Err(reason)) => {
                warn!("Could not join the server: {}", reason);
                let rejoin = self.rejoin.clone();
                LevelStep::Switch(Box::new(
                    InfoLevel::new("Could not join", vec![reason])
                        .on_confirm("Press Enter to try again.", move || rejoin.start()),
                ))
            }
        }
    }

    fn render(&self, _host: &dyn RenderHost) -> Frame {
        Frame::Info {
            title: "Connecting".to_string(),
            lines: vec![format!(
                "Joining {} as {}",
                self.rejoin.config.server_addr, self.rejoin.config.player_name
            )],
        }
    }
}

/// Synchronized play against the server.
pub struct PlayLevel<L: SessionLink = Session> {
    client: SyncClient<L>,
    rejoin: Option<Rejoin<L>>,
}

impl<L: SessionLink> PlayLevel<L> {
    pub fn new(client: SyncClient<L>) -> Self {
        Self {
            client,
            rejoin: None,
        }
    }

    /// Offers reconnecting with the same profile once the session ends.
    pub fn with_rejoin(mut self, rejoin: Rejoin<L>) -> Self {
        self.rejoin = Some(rejoin);
        self
    }

    pub fn client(&self) -> &SyncClient<L> {
        &self.client
    }
}

impl<L: SessionLink + 'static> Level for PlayLevel<L> {
    fn update(&mut self, host: &dyn RenderHost) -> LevelStep {
        match self.client.update(host) {
            TickOutcome::Running => LevelStep::Continue,
            TickOutcome::Ended(reason) => {
                self.client.shutdown();
                let info = InfoLevel::disconnected(&reason);
                let info = match self.rejoin.take() {
                    Some(rejoin) => info.on_confirm("Press Enter to reconnect.", move || {
                        rejoin.start()
                    }),
                    None => info.with_line("Restart the client to reconnect."),
                };
                LevelStep::Switch(Box::new(info))
            }
        }
    }

    fn render(&self, host: &dyn RenderHost) -> Frame {
        let now = host.current_time_millis();
        Frame::Play(PlayFrame {
            local_id: self.client.local_id(),
            entities: self.client.entities_for_render(now),
            capture_points: self.client.capture_points_for_render(now),
            scores: self.client.scores(),
        })
    }
}

/// A static screen of text, optionally left with Enter.
pub struct InfoLevel {
    title: String,
    lines: Vec<String>,
    confirm: KeyEdge,
    next: Option<Box<dyn FnMut() -> Box<dyn Level>>>,
}

impl InfoLevel {
    pub fn new(title: impl Into<String>, lines: Vec<String>) -> Self {
        Self {
            title: title.into(),
            lines,
            confirm: KeyEdge::new(Key::Confirm),
            next: None,
        }
    }

    pub fn disconnected(reason: &str) -> Self {
        Self::new(
            "Disconnected",
            vec![format!("The connection to the server was lost: {}", reason)],
        )
    }

    pub fn with_line(mut self, line: impl Into<String>) -> Self {
        self.lines.push(line.into());
        self
    }

    /// Switches to the level built by `next` when Enter is pressed.
    pub fn on_confirm(
        self,
        hint: impl Into<String>,
        next: impl FnMut() -> Box<dyn Level> + 'static,
    ) -> Self {
        let mut level = self.with_line(hint);
        level.next = Some(Box::new(next));
        level
    }
}

impl Level for InfoLevel {
    fn update(&mut self, host: &dyn RenderHost) -> LevelStep {
        let pressed = self.confirm.pressed(host);
        match &mut self.next {
            Some(next) if pressed => LevelStep::Switch(next()),
            _ => LevelStep::Continue,
        }
    }

    fn render(&self, _host: &dyn RenderHost) -> Frame {
        Frame::Info {
            title: self.title.clone(),
            lines: self.lines.clone(),
        }
    }
}

/// Owns the current level and performs the switches it asks for.
pub struct Director {
    current: Box<dyn Level>,
}

impl Director {
    pub fn new(first: Box<dyn Level>) -> Self {
        Self { current: first }
    }

    pub fn update(&mut self, host: &dyn RenderHost) {
        if let LevelStep::Switch(next) = self.current.update(host) {
            info!("Switching level");
            self.current = next;
        }
    }

    pub fn render(&self, host: &dyn RenderHost) -> Frame {
        self.current.render(host)
    }

    pub fn layout(&self, outside_width: f32, outside_height: f32) -> Layout {
        self.current.layout(outside_width, outside_height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::tests::{client, FakeLink, LOCAL};
    use crate::input::tests::FakeHost;
    use crate::session::SessionEvent;
    use assert_approx_eq::assert_approx_eq;
    use shared::PlayerState;
    use std::collections::VecDeque;

    #[derive(Default)]
    struct FakeConnector {
        begun: Vec<ClientConfig>,
        ready: VecDeque<Result<FakeLink, String>>,
    }

    impl Connector for FakeConnector {
        type Link = FakeLink;

        fn begin(&mut self, config: &ClientConfig) {
            self.begun.push(config.clone());
        }

        fn poll(&mut self) -> Option<Result<FakeLink, String>> {
            self.ready.pop_front()
        }
    }

    fn profile(name: &str, skin: &str) -> ClientConfig {
        ClientConfig {
            player_name: name.to_string(),
            player_skin: skin.to_string(),
            ..ClientConfig::default()
        }
    }

    fn menu(config: ClientConfig) -> (Rc<RefCell<FakeConnector>>, Director) {
        let connector = Rc::new(RefCell::new(FakeConnector::default()));
        let shared: SharedConnector<FakeLink> = connector.clone();
        let director = Director::new(Box::new(MenuLevel::new(config, shared)));
        (connector, director)
    }

    /// Taps a key for one update, then lets it go for one update.
    fn tap(director: &mut Director, host: &FakeHost, key: Key) {
        host.press(key);
        director.update(host);
        host.release(key);
        director.update(host);
    }

    fn title_of(frame: Frame) -> String {
        match frame {
            Frame::Info { title, .. } => title,
            Frame::Menu { .. } => "menu".to_string(),
            Frame::Play(_) => "play".to_string(),
        }
    }

    #[test]
    fn test_layout_at_base_resolution() {
        let layout = fit_layout(1600.0, 900.0);
        assert_approx_eq!(layout.scale, 1.0, 1e-6);
        assert_approx_eq!(layout.offset_x, 0.0, 1e-6);
        assert_approx_eq!(layout.offset_y, 0.0, 1e-6);
    }

    #[test]
    fn test_layout_scales_down_uniformly() {
        let layout = fit_layout(800.0, 450.0);
        assert_approx_eq!(layout.scale, 0.5, 1e-6);
        let (x, y) = layout.to_screen(1600.0, 900.0);
        assert_approx_eq!(x, 800.0, 1e-4);
        assert_approx_eq!(y, 450.0, 1e-4);
    }

    #[test]
    fn test_layout_letterboxes_wide_windows() {
        let layout = fit_layout(1920.0, 900.0);
        assert_approx_eq!(layout.scale, 1.0, 1e-6);
        assert_approx_eq!(layout.offset_x, 160.0, 1e-4);
        assert_approx_eq!(layout.offset_y, 0.0, 1e-4);
    }

    #[test]
    fn test_play_level_renders_world() {
        let mut game = client();
        game.link_mut().push_players(vec![PlayerState::new(2, 5.0, 5.0)]);
        let mut level = PlayLevel::new(game);
        let host = FakeHost::at(0);

        assert!(matches!(level.update(&host), LevelStep::Continue));
        match level.render(&host) {
            Frame::Play(frame) => {
                assert_eq!(frame.local_id, LOCAL);
                assert_eq!(frame.entities.len(), 2);
                assert!(frame.capture_points.is_empty());
            }
            other => panic!("unexpected frame {:?}", other),
        }
    }

    #[test]
    fn test_disconnect_switches_to_info() {
        let mut game = client();
        game.link_mut()
            .inbound
            .push_back(SessionEvent::Closed("connection closed by peer".to_string()));
        let host = FakeHost::at(0);
        let mut director = Director::new(Box::new(PlayLevel::new(game)));

        director.update(&host);
        match director.render(&host) {
            Frame::Info { title, lines } => {
                assert_eq!(title, "Disconnected");
                assert!(lines[0].contains("connection closed by peer"));
                assert_eq!(lines[1], "Restart the client to reconnect.");
            }
            other => panic!("unexpected frame {:?}", other),
        }

        host.press(Key::Confirm);
        director.update(&host);
        director.update(&host);
        assert!(matches!(director.render(&host), Frame::Info { .. }));
    }

    #[test]
    fn test_name_drops_whitespace_and_truncates() {
        assert_eq!(sanitize_name(" Sir Lancelot the Brave and Bold "), "SirLancelottheBravea");
        assert_eq!(sanitize_name("bob"), "bob");
        assert_eq!(sanitize_name(" \t "), "");
    }

    #[test]
    fn test_menu_falls_back_to_first_skin() {
        let connector: SharedConnector<FakeLink> =
            Rc::new(RefCell::new(FakeConnector::default()));
        let level = MenuLevel::new(profile("bob", "Wizard"), connector.clone());
        assert_eq!(level.skin(), "01Knight");

        let level = MenuLevel::new(profile("bob", "07Knight"), connector);
        assert_eq!(level.skin(), "07Knight");
        assert_eq!(skin_index("10Knight"), Some(9));
    }

    #[test]
    fn test_menu_skin_selection_stays_in_range() {
        let (_, mut director) = menu(profile("bob", "02Knight"));
        let host = FakeHost::at(0);
        director.update(&host);

        tap(&mut director, &host, Key::MenuUp);
        tap(&mut director, &host, Key::MenuUp);
        match director.render(&host) {
            Frame::Menu { skin, .. } => assert_eq!(skin, "01Knight"),
            other => panic!("unexpected frame {:?}", other),
        }

        for _ in 0..12 {
            tap(&mut director, &host, Key::MenuDown);
        }
        match director.render(&host) {
            Frame::Menu { skin, .. } => assert_eq!(skin, "10Knight"),
            other => panic!("unexpected frame {:?}", other),
        }
    }

    #[test]
    fn test_menu_confirm_joins_and_plays() {
        let (connector, mut director) = menu(profile(" bob smith ", "03Knight"));
        let host = FakeHost::at(0);
        director.update(&host);

        tap(&mut director, &host, Key::MenuDown);
        host.press(Key::Confirm);
        director.update(&host);
        host.release(Key::Confirm);

        {
            let connector = connector.borrow();
            assert_eq!(connector.begun.len(), 1);
            assert_eq!(connector.begun[0].player_name, "bobsmith");
            assert_eq!(connector.begun[0].player_skin, "04Knight");
        }
        assert_eq!(title_of(director.render(&host)), "Connecting");

        director.update(&host);
        assert_eq!(title_of(director.render(&host)), "Connecting");

        connector.borrow_mut().ready.push_back(Ok(FakeLink::default()));
        director.update(&host);
        match director.render(&host) {
            Frame::Play(frame) => assert_eq!(frame.local_id, LOCAL),
            other => panic!("unexpected frame {:?}", other),
        }
    }

    #[test]
    fn test_menu_blocks_empty_name() {
        let (connector, mut director) = menu(profile("   ", "01Knight"));
        let host = FakeHost::at(0);
        director.update(&host);

        match director.render(&host) {
            Frame::Menu { name, notice, .. } => {
                assert!(name.is_empty());
                assert!(notice.is_some());
            }
            other => panic!("unexpected frame {:?}", other),
        }

        tap(&mut director, &host, Key::Confirm);
        assert!(connector.borrow().begun.is_empty());
        assert_eq!(title_of(director.render(&host)), "menu");
    }

    #[test]
    fn test_confirm_held_from_previous_level_is_ignored() {
        let (connector, mut director) = menu(profile("bob", "01Knight"));
        let host = FakeHost::at(0);
        host.press(Key::Confirm);

        director.update(&host);
        director.update(&host);
        assert!(connector.borrow().begun.is_empty());
    }

    #[test]
    fn test_failed_join_offers_retry() {
        let (connector, mut director) = menu(profile("bob", "01Knight"));
        let host = FakeHost::at(0);
        director.update(&host);
        tap(&mut director, &host, Key::Confirm);

        connector
            .borrow_mut()
            .ready
            .push_back(Err("connection refused".to_string()));
        director.update(&host);
        match director.render(&host) {
            Frame::Info { title, lines } => {
                assert_eq!(title, "Could not join");
                assert_eq!(lines[0], "connection refused");
            }
            other => panic!("unexpected frame {:?}", other),
        }

        director.update(&host);
        tap(&mut director, &host, Key::Confirm);
        assert_eq!(connector.borrow().begun.len(), 2);
        assert_eq!(title_of(director.render(&host)), "Connecting");
    }

    #[test]
    fn test_disconnect_offers_reconnect_on_confirm() {
        let (connector, mut director) = menu(profile("bob", "05Knight"));
        let host = FakeHost::at(0);
        director.update(&host);
        tap(&mut director, &host, Key::Confirm);

        let mut link = FakeLink::default();
        link.inbound
            .push_back(SessionEvent::Closed("connection closed by peer".to_string()));
        connector.borrow_mut().ready.push_back(Ok(link));
        director.update(&host);
        assert_eq!(title_of(director.render(&host)), "play");

        director.update(&host);
        match director.render(&host) {
            Frame::Info { title, lines } => {
                assert_eq!(title, "Disconnected");
                assert!(lines[0].contains("connection closed by peer"));
                assert_eq!(lines[1], "Press Enter to reconnect.");
            }
            other => panic!("unexpected frame {:?}", other),
        }

        director.update(&host);
        tap(&mut director, &host, Key::Confirm);
        {
            let connector = connector.borrow();
            assert_eq!(connector.begun.len(), 2);
            assert_eq!(connector.begun[1].player_skin, "05Knight");
        }
        assert_eq!(title_of(director.render(&host)), "Connecting");

        connector.borrow_mut().ready.push_back(Ok(FakeLink::default()));
        director.update(&host);
        assert_eq!(title_of(director.render(&host)), "play");
    }
}
