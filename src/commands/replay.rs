use anyhow::{Context, Result};
use clap::Args as ClapArgs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

use crate::app::TabGroupsApp;
use crate::augment::Collaborators;
use crate::config::Config;
use crate::host::{
    ColorPicker, DotColor, EditorKey, FileFaviconDecoder, FolderService, GroupTree, MemoryFolders,
    MemoryPicker, MemoryTree, NodeSpec, UiEvent,
};
use crate::models::{
    ColorMap, GroupId, GroupSummary, MenuAction, NodeId, AUGMENTED_MARKER, COLOR_PROPERTY,
};
use crate::store::ColorStore;

#[derive(ClapArgs)]
pub struct Args {
    /// YAML scenario file
    pub scenario: PathBuf,

    /// Directory for saved colors (defaults to .atg-replay next to the scenario)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PickerSpec {
    #[serde(default)]
    pub dots: Vec<DotSpec>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DotSpec {
    #[serde(default)]
    pub primary: bool,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FolderSpec {
    #[serde(default)]
    pub active_workspace: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Insert {
        parent: NodeId,
        nodes: Vec<NodeSpec>,
    },
    Rerender(GroupId),
    Close(GroupId),
    DoubleClick(GroupId),
    Key {
        key: EditorKey,
        #[serde(default)]
        value: String,
    },
    Blur,
    /// Double-click followed by Enter with `label`.
    Rename {
        group: GroupId,
        label: String,
    },
    Menu {
        group: GroupId,
        action: MenuAction,
    },
    PickColors(Vec<String>),
    ClosePicker,
    Resweep,
    Settle,
    Save,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub tree: Vec<NodeSpec>,
    #[serde(default)]
    pub picker: Option<PickerSpec>,
    #[serde(default)]
    pub folders: Option<FolderSpec>,
    /// Base for relative favicon paths; defaults to the scenario's directory.
    #[serde(default)]
    pub favicon_dir: Option<PathBuf>,
    /// Each step is a bare name (`settle`) or a single-key map (`close: g1`).
    #[serde(default, with = "serde_yaml::with::singleton_map_recursive")]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    pub groups: Vec<GroupSummary>,
    pub saved: ColorMap,
    pub folders: Vec<String>,
}

pub async fn execute(args: Args, config: Config) -> Result<()> {
    let content = std::fs::read_to_string(&args.scenario)
        .with_context(|| format!("Failed to read scenario: {:?}", args.scenario))?;
    let scenario: Scenario = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse scenario: {:?}", args.scenario))?;

    let base_dir = args
        .scenario
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let data_dir = args
        .data_dir
        .unwrap_or_else(|| base_dir.join(".atg-replay"));

    let report = run_scenario(scenario, config.with_data_dir(data_dir), &base_dir).await?;
    print!("{}", serde_yaml::to_string(&report)?);
    Ok(())
}

pub async fn run_scenario(
    scenario: Scenario,
    config: Config,
    base_dir: &Path,
) -> Result<ReplayReport> {
    let mut tree = MemoryTree::new("root");
    let root = tree.root();
    for node in scenario.tree {
        tree.seed(&root, node)
            .context("Failed to build scenario tree")?;
    }

    let picker = scenario.picker.map(|spec| {
        Arc::new(MemoryPicker::new(
            spec.dots
                .into_iter()
                .map(|d| DotColor {
                    value: None,
                    is_primary: d.primary,
                    role: d.role,
                })
                .collect(),
        ))
    });
    let folders = scenario
        .folders
        .map(|spec| Arc::new(MemoryFolders::new(spec.active_workspace)));
    let favicon_dir = match scenario.favicon_dir {
        Some(dir) if dir.is_relative() => base_dir.join(dir),
        Some(dir) => dir,
        None => base_dir.to_path_buf(),
    };

    let collaborators = Collaborators {
        picker: picker.clone().map(|p| p as Arc<dyn ColorPicker>),
        folders: folders.clone().map(|f| f as Arc<dyn FolderService>),
        decoder: Some(Arc::new(
            FileFaviconDecoder::new().with_base_dir(favicon_dir),
        )),
    };

    let (events, ui_events) = mpsc::unbounded_channel();
    let store = ColorStore::from_config(&config);
    let mut app = TabGroupsApp::new(config, tree, store, collaborators, ui_events);
    app.start().await?;

    for (n, step) in scenario.steps.into_iter().enumerate() {
        info!("Step {}: {:?}", n + 1, step);
        match step {
            Step::Insert { parent, nodes } => {
                app.host_mut()
                    .insert(&parent, nodes)
                    .with_context(|| format!("Step {}: insert under {} failed", n + 1, parent))?;
            }
            Step::Rerender(group) => {
                app.host_mut()
                    .rerender_group(&group)
                    .with_context(|| format!("Step {}: rerender of {} failed", n + 1, group))?;
            }
            Step::Close(group) => {
                events.send(UiEvent::CloseClicked { group })?;
            }
            Step::DoubleClick(group) => {
                events.send(UiEvent::LabelDoubleClicked { group })?;
            }
            Step::Key { key, value } => {
                events.send(UiEvent::EditorKey { key, value })?;
            }
            Step::Blur => events.send(UiEvent::EditorBlurred)?,
            Step::Rename { group, label } => {
                events.send(UiEvent::LabelDoubleClicked { group })?;
                events.send(UiEvent::EditorKey {
                    key: EditorKey::Enter,
                    value: label,
                })?;
            }
            Step::Menu { group, action } => {
                events.send(UiEvent::MenuCommand { group, action })?;
            }
            Step::PickColors(colors) => {
                let picker = picker
                    .as_ref()
                    .with_context(|| format!("Step {}: scenario has no picker", n + 1))?;
                let colors: Vec<&str> = colors.iter().map(String::as_str).collect();
                picker.drag_dots(&colors);
            }
            Step::ClosePicker => {
                if let Some(picker) = &picker {
                    picker.close_panel();
                }
                events.send(UiEvent::PickerClosed)?;
            }
            Step::Resweep => app.resweep().await,
            Step::Settle => app.settle().await,
            Step::Save => app.save().await,
        }
        app.pump().await;
    }

    app.settle().await;
    app.shutdown().await;

    Ok(ReplayReport {
        groups: summarize(app.host()),
        saved: app.store().load().await,
        folders: folders
            .map(|f| f.created().into_iter().map(|c| c.id).collect())
            .unwrap_or_default(),
    })
}

/// Every group currently present, as shown in the replay report.
pub fn summarize(tree: &dyn GroupTree) -> Vec<GroupSummary> {
    tree.all_groups()
        .into_iter()
        .map(|id| GroupSummary {
            label: tree.label(&id).unwrap_or_default(),
            collapsed: tree.is_collapsed(&id),
            color: tree.style_property(&id, COLOR_PROPERTY),
            augmented: tree.has_attribute(&id, AUGMENTED_MARKER),
            id,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SCENARIO: &str = r##"
tree:
  - kind: container
    id: window-1
    children:
      - kind: group
        id: work
        label: Work
        items:
          - id: t1
            favicon: icons/red.png
          - id: t2
      - kind: group
        id: folder
        label: Pinned
        folder: true
      - kind: group
        id: research
        label: Research
        workspace: ws-3
        items:
          - id: t3
picker:
  dots:
    - primary: true
    - {}
folders:
  active_workspace: ws-1
steps:
  - menu:
      group: work
      action: favicon_color
  - settle
  - rename:
      group: work
      label: "  Deep Work "
  - insert:
      parent: window-1
      nodes:
        - kind: group
          id: late
          label: Late
  - menu:
      group: late
      action: set_color
  - pick_colors: ["#204060"]
  - close_picker
  - menu:
      group: research
      action: convert_to_folder
  - menu:
      group: late
      action: toggle_collapse
"##;

    fn write_icon(dir: &Path) {
        std::fs::create_dir_all(dir.join("icons")).unwrap();
        image::RgbaImage::from_pixel(8, 8, image::Rgba([200, 40, 40, 255]))
            .save(dir.join("icons/red.png"))
            .unwrap();
    }

    #[tokio::test]
    async fn replay_runs_full_scenario() {
        let temp = TempDir::new().unwrap();
        write_icon(temp.path());
        let scenario: Scenario = serde_yaml::from_str(SCENARIO).unwrap();
        let config = Config::default().with_data_dir(temp.path().join("data"));

        let report = run_scenario(scenario, config, temp.path()).await.unwrap();

        let ids: Vec<&str> = report.groups.iter().map(|g| g.id.as_str()).collect();
        assert_eq!(ids, vec!["work", "folder", "late"]);

        let work = &report.groups[0];
        assert_eq!(work.label, "Deep Work");
        assert_eq!(work.color.as_deref(), Some("rgb(200,40,40)"));
        assert!(work.augmented);

        assert!(!report.groups[1].augmented);

        let late = &report.groups[2];
        assert!(late.augmented);
        assert!(late.collapsed);
        assert_eq!(late.color.as_deref(), Some("rgb(32,64,96)"));

        assert_eq!(report.saved["work"], "rgb(200,40,40)");
        assert_eq!(report.saved["late"], "rgb(32,64,96)");
        assert!(!report.saved.contains_key("research"));
        assert_eq!(report.folders, vec!["folder-1".to_string()]);
    }

    #[tokio::test]
    async fn replay_without_picker_degrades_silently() {
        let temp = TempDir::new().unwrap();
        let scenario: Scenario = serde_yaml::from_str(
            r#"
tree:
  - kind: group
    id: g1
    label: Solo
steps:
  - menu:
      group: g1
      action: set_color
  - close: g1
"#,
        )
        .unwrap();
        let config = Config::default().with_data_dir(temp.path().to_path_buf());

        let report = run_scenario(scenario, config, temp.path()).await.unwrap();

        assert!(report.groups.is_empty());
        assert!(report.saved.is_empty());
    }

    #[test]
    fn scenario_steps_are_single_key_maps() {
        let scenario: Scenario = serde_yaml::from_str(
            r##"
steps:
  - close: g1
  - key:
      key: enter
      value: Renamed
  - menu:
      group: g2
      action: toggle_collapse
  - pick_colors: ["#102030"]
  - settle
  - blur
"##,
        )
        .unwrap();

        assert_eq!(scenario.steps.len(), 6);
        assert!(matches!(&scenario.steps[0], Step::Close(g) if g == "g1"));
        assert!(matches!(
            &scenario.steps[1],
            Step::Key { key: EditorKey::Enter, value } if value == "Renamed"
        ));
        assert!(matches!(
            &scenario.steps[2],
            Step::Menu { action: MenuAction::ToggleCollapse, .. }
        ));
        assert!(matches!(&scenario.steps[3], Step::PickColors(c) if c.len() == 1));
        assert!(matches!(scenario.steps[4], Step::Settle));
        assert!(matches!(scenario.steps[5], Step::Blur));
    }

    #[test]
    fn scenario_rejects_unknown_step() {
        let result: Result<Scenario, _> = serde_yaml::from_str("steps:\n  - teleport: g1\n");
        assert!(result.is_err());
    }
}
