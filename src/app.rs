use anyhow::{Context, Result};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::task::{JoinError, JoinSet};
use tokio::time::{self, Instant};
use tracing::{debug, error, info, warn};

use crate::augment::{Collaborators, FaviconSummary, GroupAugmenter, PickerRedirect};
use crate::config::Config;
use crate::host::{GroupTree, MutationBatch, UiEvent};
use crate::models::{ColorMap, MenuAction};
use crate::store::ColorStore;
use crate::watcher::TreeWatcher;

/// Owns the host tree and every component that works on it, and runs the
/// single event loop they share.
pub struct TabGroupsApp<H: GroupTree> {
    config: Config,
    host: H,
    store: ColorStore,
    watcher: TreeWatcher,
    augmenter: GroupAugmenter,
    ui_events: UnboundedReceiver<UiEvent>,
    redirects: UnboundedReceiver<PickerRedirect>,
    favicon_jobs: JoinSet<FaviconSummary>,
    loaded: ColorMap,
    resweep_at: Option<Instant>,
    running: bool,
}

impl<H: GroupTree> TabGroupsApp<H> {
    pub fn new(
        config: Config,
        host: H,
        store: ColorStore,
        collaborators: Collaborators,
        ui_events: UnboundedReceiver<UiEvent>,
    ) -> Self {
        let (redirect_tx, redirects) = mpsc::unbounded_channel();
        let augmenter = GroupAugmenter::new(collaborators, &config, redirect_tx);
        Self {
            config,
            host,
            store,
            watcher: TreeWatcher::new(),
            augmenter,
            ui_events,
            redirects,
            favicon_jobs: JoinSet::new(),
            loaded: ColorMap::new(),
            resweep_at: None,
            running: true,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn quit(&mut self) {
        self.running = false;
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    #[allow(dead_code)]
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &ColorStore {
        &self.store
    }

    pub fn augmenter(&self) -> &GroupAugmenter {
        &self.augmenter
    }

    pub fn loaded_colors(&self) -> &ColorMap {
        &self.loaded
    }

    #[allow(dead_code)]
    pub fn pending_favicon_jobs(&self) -> usize {
        self.favicon_jobs.len()
    }

    /// Load colors, start watching, and fit every existing group.
    pub async fn start(&mut self) -> Result<()> {
        self.augmenter.clear_picker_scratch();
        self.loaded = self.store.load().await;

        self.watcher
            .start(&mut self.host)
            .context("Failed to observe the tab group tree")?;
        let augmented = self.watcher.sweep_all(&mut self.host, &mut self.augmenter);
        let applied = self.store.apply_all(&mut self.host, &self.loaded);
        info!(
            "Started: augmented {} groups, applied {} saved colors",
            augmented, applied
        );

        self.resweep_at = Some(Instant::now() + self.config.timing.resweep_delay());
        Ok(())
    }

    /// Second sweep for groups the host renders late; re-reads and
    /// re-applies the saved colors.
    pub async fn resweep(&mut self) {
        self.resweep_at = None;
        self.augmenter.prune(&self.host);
        let augmented = self.watcher.sweep_all(&mut self.host, &mut self.augmenter);
        self.loaded = self.store.load().await;
        let applied = self.store.apply_all(&mut self.host, &self.loaded);
        debug!(
            "Re-sweep augmented {} groups, applied {} colors",
            augmented, applied
        );
    }

    pub async fn run(&mut self) -> Result<()> {
        let save_interval = self.config.timing.save_interval();
        let mut save_tick = time::interval_at(Instant::now() + save_interval, save_interval);

        while self.is_running() {
            let resweep_at = self.resweep_at;
            tokio::select! {
                batch = self.watcher.next_batch() => self.on_batch(batch),
                event = self.ui_events.recv() => match event {
                    Some(event) => self.handle_ui_event(event).await,
                    None => {
                        info!("Host closed the event channel");
                        self.quit();
                    }
                },
                Some(redirect) = self.redirects.recv() => self.on_redirect(redirect).await,
                Some(joined) = self.favicon_jobs.join_next() => self.on_favicon_settled(joined).await,
                _ = time::sleep_until(resweep_at.unwrap_or_else(Instant::now)), if resweep_at.is_some() => {
                    self.resweep().await;
                }
                _ = save_tick.tick() => self.save().await,
            }
        }

        self.shutdown().await;
        Ok(())
    }

    /// Handle everything that is ready right now without waiting.
    pub async fn pump(&mut self) {
        loop {
            let mut progressed = false;

            while let Some(batch) = self.watcher.try_next_batch() {
                self.on_batch(batch);
                progressed = true;
            }
            while let Ok(event) = self.ui_events.try_recv() {
                self.handle_ui_event(event).await;
                progressed = true;
            }
            while let Ok(redirect) = self.redirects.try_recv() {
                self.on_redirect(redirect).await;
                progressed = true;
            }

            if !progressed {
                break;
            }
        }
    }

    /// Pump until no favicon job is left in flight.
    pub async fn settle(&mut self) {
        self.pump().await;
        while let Some(joined) = self.favicon_jobs.join_next().await {
            self.on_favicon_settled(joined).await;
            self.pump().await;
        }
    }

    pub async fn shutdown(&mut self) {
        self.augmenter.release_picker();
        self.augmenter.clear_picker_scratch();
        self.favicon_jobs.abort_all();
        self.watcher.stop(&mut self.host);
        self.save().await;
        self.running = false;
        info!("Shut down");
    }

    pub async fn save(&mut self) {
        match self.store.save_all(&self.host).await {
            Ok(saved) => debug!("Saved {} group colors", saved.len()),
            Err(e) => error!("Failed to save group colors: {}", e),
        }
    }

    fn on_batch(&mut self, batch: MutationBatch) {
        let augmented = self
            .watcher
            .handle_batch(&mut self.host, &mut self.augmenter, &batch);
        if augmented > 0 {
            debug!("Augmented {} inserted groups", augmented);
        }
    }

    pub async fn handle_ui_event(&mut self, event: UiEvent) {
        debug!("UI event: {:?}", event);
        match event {
            UiEvent::CloseClicked { group } => {
                self.augmenter
                    .close(&mut self.host, &self.store, &group)
                    .await
            }
            UiEvent::LabelDoubleClicked { group } => {
                self.augmenter.begin_rename(&mut self.host, &group)
            }
            UiEvent::MenuCommand {
                group,
                action: MenuAction::FaviconColor,
            } => match self.augmenter.favicon_job(&self.host, &group) {
                Ok(job) => {
                    self.favicon_jobs.spawn(job);
                }
                Err(e) => warn!("Cannot derive favicon color for group {}: {}", group, e),
            },
            UiEvent::MenuCommand { group, action } => {
                if let Err(e) = self
                    .augmenter
                    .menu_action(&mut self.host, &self.store, &group, action)
                    .await
                {
                    error!("Menu action {:?} failed on group {}: {}", action, group, e);
                }
            }
            UiEvent::EditorKey { key, value } => {
                self.augmenter.editor_key(&mut self.host, key, &value)
            }
            UiEvent::EditorBlurred => self.augmenter.editor_blurred(&mut self.host),
            UiEvent::PickerClosed => {
                self.augmenter
                    .picker_closed(&mut self.host, &self.store)
                    .await
            }
            UiEvent::Shutdown => self.quit(),
        }
    }

    async fn on_redirect(&mut self, redirect: PickerRedirect) {
        match redirect {
            PickerRedirect::Commit { group } => {
                self.augmenter
                    .picker_committed(&mut self.host, &self.store, &group)
                    .await
            }
        }
    }

    async fn on_favicon_settled(&mut self, joined: Result<FaviconSummary, JoinError>) {
        match joined {
            Ok(summary) => {
                self.augmenter
                    .apply_favicon_color(&mut self.host, &self.store, summary)
                    .await
            }
            Err(e) if e.is_cancelled() => {}
            Err(e) => error!("Favicon job failed: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::augment::mock_decoder::MockDecoder;
    use crate::host::{
        ColorPicker, DotColor, EditorKey, GroupSpec, MemoryFolders, MemoryPicker, MemoryTree,
        NodeSpec,
    };
    use crate::models::{MemberItem, COLOR_PROPERTY};
    use crate::store::mock_backend::MockBackend;
    use crate::store::BackendChain;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc::UnboundedSender;

    struct Harness {
        app: TabGroupsApp<MemoryTree>,
        events: UnboundedSender<UiEvent>,
        primary: MockBackend,
        picker: Arc<MemoryPicker>,
        folders: Arc<MemoryFolders>,
    }

    fn harness(groups: Vec<GroupSpec>, saved: Option<&str>) -> Harness {
        let mut tree = MemoryTree::new("root");
        let root = tree.root();
        tree.seed(
            &root,
            NodeSpec::container("window-1", groups.into_iter().map(NodeSpec::from).collect()),
        )
        .unwrap();

        let primary = match saved {
            Some(text) => MockBackend::new("file").with_content(text),
            None => MockBackend::new("file"),
        };
        let store = ColorStore::new(BackendChain::primary_with_fallback(
            Box::new(primary.clone()),
            Box::new(MockBackend::new("kv")),
        ));
        let picker = Arc::new(MemoryPicker::new(vec![DotColor::new("rgb(9,9,9)", true)]));
        let folders = Arc::new(MemoryFolders::new(None));
        let decoder = Arc::new(MockDecoder::new().with_solid("icon.png", [40, 80, 120, 255]));
        let (events, rx) = mpsc::unbounded_channel();

        let app = TabGroupsApp::new(
            Config::default(),
            tree,
            store,
            Collaborators {
                picker: Some(picker.clone()),
                folders: Some(folders.clone()),
                decoder: Some(decoder),
            },
            rx,
        );
        Harness {
            app,
            events,
            primary,
            picker,
            folders,
        }
    }

    fn id(s: &str) -> String {
        s.to_string()
    }

    #[tokio::test]
    async fn start_augments_and_applies_saved_colors() {
        let mut h = harness(
            vec![GroupSpec::new("g1", "Work"), GroupSpec::new("g2", "Play")],
            Some(r#"{"g1":"rgb(1,2,3)","gone":"red"}"#),
        );

        h.app.start().await.unwrap();

        let tree = h.app.host();
        assert!(tree.is_observed());
        assert_eq!(tree.group("g1").unwrap().close_controls, 1);
        assert_eq!(tree.group("g2").unwrap().close_controls, 1);
        assert_eq!(tree.group("g1").unwrap().color(), Some("rgb(1,2,3)"));
        assert_eq!(h.app.loaded_colors().len(), 2);
    }

    #[tokio::test]
    async fn start_clears_stale_picker_dots() {
        let mut h = harness(vec![], None);
        h.app.start().await.unwrap();
        assert!(h.picker.dots().iter().all(|d| d.value.is_none()));
    }

    #[tokio::test]
    async fn inserted_groups_are_augmented_on_pump() {
        let mut h = harness(vec![], None);
        h.app.start().await.unwrap();

        h.app
            .host_mut()
            .insert(
                &id("window-1"),
                vec![NodeSpec::container(
                    "restored",
                    vec![GroupSpec::new("g3", "Restored").into()],
                )],
            )
            .unwrap();
        h.app.pump().await;

        assert_eq!(h.app.host().group("g3").unwrap().close_controls, 1);
        assert!(h.app.augmenter().registry().is_augmented("g3"));
    }

    #[tokio::test]
    async fn resweep_reapplies_colors_to_late_groups() {
        let mut h = harness(vec![], Some(r#"{"late":"rgb(7,7,7)"}"#));
        h.app.start().await.unwrap();
        h.app.host_mut().disconnect();

        h.app
            .host_mut()
            .seed(&id("window-1"), GroupSpec::new("late", "Late").into())
            .unwrap();
        h.app.resweep().await;

        let late = h.app.host().group("late").unwrap();
        assert_eq!(late.close_controls, 1);
        assert_eq!(late.color(), Some("rgb(7,7,7)"));
    }

    #[tokio::test]
    async fn close_event_removes_group_and_color() {
        let mut h = harness(
            vec![GroupSpec::new("g1", "Work"), GroupSpec::new("g2", "Play")],
            Some(r#"{"g1":"red","g2":"blue"}"#),
        );
        h.app.start().await.unwrap();

        h.events
            .send(UiEvent::CloseClicked { group: id("g1") })
            .unwrap();
        h.app.pump().await;

        assert!(!h.app.host().contains_group(&id("g1")));
        let saved = h.primary.map().unwrap();
        assert!(!saved.contains_key("g1"));
        assert_eq!(saved["g2"], "blue");
    }

    #[tokio::test]
    async fn rename_through_events() {
        let mut h = harness(vec![GroupSpec::new("g1", "Work")], None);
        h.app.start().await.unwrap();

        h.events
            .send(UiEvent::LabelDoubleClicked { group: id("g1") })
            .unwrap();
        h.events
            .send(UiEvent::EditorKey {
                key: EditorKey::Enter,
                value: " Errands ".to_string(),
            })
            .unwrap();
        h.events.send(UiEvent::EditorBlurred).unwrap();
        h.app.pump().await;

        let g1 = h.app.host().group("g1").unwrap();
        assert_eq!(g1.label, "Errands");
        assert!(g1.input.is_none());
        assert!(!h.app.augmenter().edit_session().is_active());
    }

    #[tokio::test]
    async fn favicon_menu_command_settles_into_color() {
        let mut h = harness(
            vec![GroupSpec::new("g1", "Work").with_items(vec![
                MemberItem::new("t1").with_favicon("icon.png"),
                MemberItem::new("t2").with_favicon("broken.png"),
            ])],
            None,
        );
        h.app.start().await.unwrap();

        h.events
            .send(UiEvent::MenuCommand {
                group: id("g1"),
                action: MenuAction::FaviconColor,
            })
            .unwrap();
        h.app.pump().await;
        assert_eq!(h.app.pending_favicon_jobs(), 1);
        h.app.settle().await;

        assert_eq!(h.app.pending_favicon_jobs(), 0);
        assert_eq!(
            h.app.host().style_property(&id("g1"), COLOR_PROPERTY).as_deref(),
            Some("rgb(40,80,120)")
        );
        assert_eq!(h.primary.map().unwrap()["g1"], "rgb(40,80,120)");
    }

    #[tokio::test]
    async fn picker_flow_through_events() {
        let mut h = harness(vec![GroupSpec::new("g1", "Work")], None);
        h.app.start().await.unwrap();
        let before = h.picker.hooks();

        h.events
            .send(UiEvent::MenuCommand {
                group: id("g1"),
                action: MenuAction::SetColor,
            })
            .unwrap();
        h.app.pump().await;
        assert_eq!(h.app.augmenter().leased_group(), Some(id("g1")));

        h.picker.drag_dots(&["#102030"]);
        h.app.pump().await;
        assert_eq!(
            h.app.host().group("g1").unwrap().color(),
            Some("rgb(16,32,48)")
        );

        h.picker.close_panel();
        h.events.send(UiEvent::PickerClosed).unwrap();
        h.app.pump().await;

        assert!(h.app.augmenter().leased_group().is_none());
        assert!(Arc::ptr_eq(&before, &h.picker.hooks()));
        assert_eq!(h.picker.theme().commits(), 0);
    }

    #[tokio::test]
    async fn convert_menu_command_creates_folder() {
        let mut h = harness(
            vec![GroupSpec::new("g1", "Work").with_items(vec![MemberItem::new("t1")])],
            None,
        );
        h.app.start().await.unwrap();

        h.events
            .send(UiEvent::MenuCommand {
                group: id("g1"),
                action: MenuAction::ConvertToFolder,
            })
            .unwrap();
        h.app.pump().await;

        assert_eq!(h.folders.created().len(), 1);
        assert!(!h.app.host().contains_group(&id("g1")));
    }

    #[tokio::test]
    async fn run_exits_on_shutdown_and_saves() {
        let mut h = harness(vec![GroupSpec::new("g1", "Work").with_color("red")], None);
        h.app.start().await.unwrap();

        h.events
            .send(UiEvent::LabelDoubleClicked { group: id("g1") })
            .unwrap();
        h.events.send(UiEvent::Shutdown).unwrap();
        h.app.run().await.unwrap();

        assert!(!h.app.is_running());
        assert!(!h.app.host().is_observed());
        assert!(h.app.augmenter().edit_session().is_active());
        assert_eq!(h.primary.map().unwrap()["g1"], "red");
    }

    #[tokio::test(start_paused = true)]
    async fn run_saves_on_interval_without_shutdown() {
        let Harness {
            mut app,
            events,
            primary,
            ..
        } = harness(vec![GroupSpec::new("g1", "Work")], None);
        app.start().await.unwrap();
        app.host_mut()
            .set_style_property(&id("g1"), COLOR_PROPERTY, "rgb(5,6,7)")
            .unwrap();
        let interval = Config::default().timing.save_interval();

        let observe = async {
            time::sleep(interval - Duration::from_secs(1)).await;
            let before = primary.map();
            time::sleep(Duration::from_secs(2)).await;
            let after = primary.map();
            events.send(UiEvent::Shutdown).unwrap();
            (before, after)
        };
        let (ran, (before, after)) = tokio::join!(app.run(), observe);
        ran.unwrap();

        assert!(before.is_none());
        assert_eq!(after.unwrap()["g1"], "rgb(5,6,7)");
    }

    #[tokio::test(start_paused = true)]
    async fn run_resweeps_after_delay() {
        let delay = Config::default().timing.resweep_delay();

        for (wait, expect_augmented) in [(delay / 2, false), (delay * 2, true)] {
            let Harness {
                mut app, events, ..
            } = harness(vec![], Some(r#"{"late":"rgb(7,7,7)"}"#));
            app.start().await.unwrap();
            app.host_mut()
                .seed(&id("window-1"), GroupSpec::new("late", "Late").into())
                .unwrap();

            let stop = async {
                time::sleep(wait).await;
                events.send(UiEvent::Shutdown).unwrap();
            };
            let (ran, ()) = tokio::join!(app.run(), stop);
            ran.unwrap();

            let late = app.host().group("late").unwrap();
            assert_eq!(late.close_controls == 1, expect_augmented);
            assert_eq!(late.color() == Some("rgb(7,7,7)"), expect_augmented);
        }
    }

    #[tokio::test]
    async fn run_exits_when_host_drops_event_channel() {
        let mut h = harness(vec![], None);
        h.app.start().await.unwrap();

        drop(h.events);
        h.app.run().await.unwrap();

        assert!(!h.app.is_running());
    }
}
