use std::fs;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::graph_utils::connect::ConnectRules;
use crate::graph_utils::layout::LayoutConfig;

/// Behaviour switches carried over from the editor's feature flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Features {
    pub allow_self_loops: bool,
    pub enable_cycle_detection: bool,
    // Re-run layout after a node is collapsed or expanded
    pub auto_layout_on_collapse: bool,
    // Arrow keys move by grid_step instead of arrow_step
    pub snap_to_grid: bool,
}

impl Default for Features {
    fn default() -> Self {
        Self {
            allow_self_loops: false,
            enable_cycle_detection: false,
            auto_layout_on_collapse: true,
            snap_to_grid: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorSettings {
    // Window in which a second click counts as a double click
    pub click_delay_ms: u64,
    // Quiet period after a drag before clicks are honoured again
    pub drag_settle_ms: u64,
    pub search_debounce_ms: u64,
    // World-space margin around the viewport kept rendered
    pub overscan: f64,
    pub layout: LayoutConfig,
    pub features: Features,
    pub grid_step: f64,
    pub arrow_step: f64,
    // When false, double clicks never open editors
    pub interactive: bool,
    // If None, use OS default autosave directory
    pub autosave_override: Option<PathBuf>,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            click_delay_ms: 250,
            drag_settle_ms: 10,
            search_debounce_ms: 300,
            overscan: 500.0,
            layout: LayoutConfig::default(),
            features: Features::default(),
            grid_step: 20.0,
            arrow_step: 10.0,
            interactive: true,
            autosave_override: None,
        }
    }
}

impl EditorSettings {
    fn config_dir() -> PathBuf {
        // Cross-platform user config dir
        #[cfg(target_os = "macos")]
        {
            // ~/Library/Application Support/Flow-Loom
            let home = std::env::var_os("HOME").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("~"));
            return home.join("Library").join("Application Support").join("Flow-Loom");
        }
        #[cfg(target_os = "windows")]
        {
            // %APPDATA%\Flow-Loom
            if let Ok(appdata) = std::env::var("APPDATA") {
                return PathBuf::from(appdata).join("Flow-Loom");
            }
            return PathBuf::from("Flow-Loom");
        }
        #[cfg(all(unix, not(target_os = "macos")))]
        {
            // $XDG_CONFIG_HOME/Flow-Loom or ~/.config/Flow-Loom
            if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
                return PathBuf::from(xdg).join("Flow-Loom");
            }
            let home = std::env::var_os("HOME").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("~"));
            return home.join(".config").join("Flow-Loom");
        }
    }

    fn autosave_default_dir() -> PathBuf {
        #[cfg(target_os = "macos")]
        {
            let tmp = std::env::var_os("TMPDIR").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("/tmp"));
            return tmp.join("Flow-Loom");
        }
        #[cfg(target_os = "windows")]
        {
            // %LOCALAPPDATA%\Flow-Loom\Autosave else TEMP
            if let Ok(local) = std::env::var("LOCALAPPDATA") {
                return PathBuf::from(local).join("Flow-Loom").join("Autosave");
            }
            if let Ok(temp) = std::env::var("TEMP") {
                return PathBuf::from(temp).join("Flow-Loom");
            }
            return PathBuf::from("Flow-Loom");
        }
        #[cfg(all(unix, not(target_os = "macos")))]
        {
            // $XDG_STATE_HOME/flow-loom or ~/.local/state/flow-loom, else /tmp/Flow-Loom
            if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
                return PathBuf::from(xdg).join("flow-loom");
            }
            if let Ok(home) = std::env::var("HOME") {
                return PathBuf::from(home).join(".local").join("state").join("flow-loom");
            }
            return PathBuf::from("/tmp").join("Flow-Loom");
        }
    }

    pub fn load() -> anyhow::Result<Self> {
        let json_path = Self::config_dir().join("settings.json");
        if json_path.exists() {
            let mut f = fs::File::open(json_path)?;
            let mut s = String::new();
            f.read_to_string(&mut s)?;
            return Self::from_json(&s);
        }
        // Migrate from legacy RON if present
        let ron_path = Self::config_dir().join("settings.ron");
        if ron_path.exists() {
            let mut f = fs::File::open(&ron_path)?;
            let mut s = String::new();
            f.read_to_string(&mut s)?;
            let v: Self = ron::from_str(&s)?;
            if let Err(e) = v.save() {
                log::warn!("could not migrate {} to JSON: {}", ron_path.display(), e);
            }
            return Ok(v);
        }
        Ok(Self::default())
    }

    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let dir = Self::config_dir();
        fs::create_dir_all(&dir)?;
        let path = dir.join("settings.json");
        let s = serde_json::to_string_pretty(self)?;
        let mut f = fs::File::create(path)?;
        f.write_all(s.as_bytes())?;
        Ok(())
    }

    /// Directory holding settings.json.
    pub fn settings_dir() -> PathBuf {
        Self::config_dir()
    }

    pub fn autosave_dir(&self) -> PathBuf {
        if let Some(p) = &self.autosave_override { return p.clone(); }
        Self::autosave_default_dir()
    }

    pub fn click_delay(&self) -> Duration {
        Duration::from_millis(self.click_delay_ms)
    }

    pub fn drag_settle(&self) -> Duration {
        Duration::from_millis(self.drag_settle_ms)
    }

    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }

    pub fn connect_rules(&self) -> ConnectRules {
        ConnectRules {
            allow_self_loops: self.features.allow_self_loops,
            detect_cycles: self.features.enable_cycle_detection,
        }
    }

    /// Distance one arrow key press moves the selection.
    pub fn arrow_distance(&self) -> f64 {
        if self.features.snap_to_grid { self.grid_step } else { self.arrow_step }
    }
}
