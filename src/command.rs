use crate::schedule::PlannedCommand;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Palette for group labels; mapped to terminal colors in the ui.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display, Default,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum GroupColor {
    #[default]
    Blue,
    Green,
    Orange,
    Purple,
    Red,
    Yellow,
}

impl GroupColor {
    pub const ALL: [GroupColor; 6] = [
        GroupColor::Blue,
        GroupColor::Green,
        GroupColor::Orange,
        GroupColor::Purple,
        GroupColor::Red,
        GroupColor::Yellow,
    ];

    pub fn next(self) -> Self {
        let idx = Self::ALL.iter().position(|c| *c == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }
}

/// A voice command in the library. `play_count` is the cumulative
/// historical counter; `session_count` is how many times the command
/// appears in one training session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub audio_path: Option<PathBuf>,
    #[serde(default)]
    pub play_count: u64,
    #[serde(default = "default_session_count")]
    pub session_count: u32,
    #[serde(default)]
    pub order: u32,
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub selected: bool,
}

fn default_session_count() -> u32 {
    1
}

impl Command {
    pub fn has_audio(&self) -> bool {
        self.audio_path.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub color: GroupColor,
    #[serde(default)]
    pub order: u32,
}

/// A saved per-command repeat configuration that can be re-applied
/// before a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingPreset {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub session_counts: HashMap<String, u32>,
    pub created_at: DateTime<Local>,
}

/// The whole command library: commands, groups and presets, plus the
/// id counter used for new entries. This is the unit of persistence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Library {
    #[serde(default)]
    pub commands: Vec<Command>,
    #[serde(default)]
    pub groups: Vec<Group>,
    #[serde(default)]
    pub presets: Vec<TrainingPreset>,
    #[serde(default)]
    next_id: u64,
}

impl Library {
    fn fresh_id(&mut self) -> String {
        self.next_id += 1;
        self.next_id.to_string()
    }

    fn next_command_order(&self) -> u32 {
        self.commands.iter().map(|c| c.order + 1).max().unwrap_or(0)
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn add_command(&mut self, name: &str, group_id: Option<String>) -> String {
        let id = self.fresh_id();
        let order = self.next_command_order();
        self.commands.push(Command {
            id: id.clone(),
            name: name.trim().to_string(),
            audio_path: None,
            play_count: 0,
            session_count: 1,
            order,
            group_id,
            selected: false,
        });
        id
    }

    pub fn command(&self, id: &str) -> Option<&Command> {
        self.commands.iter().find(|c| c.id == id)
    }

    pub fn command_mut(&mut self, id: &str) -> Option<&mut Command> {
        self.commands.iter_mut().find(|c| c.id == id)
    }

    pub fn rename_command(&mut self, id: &str, name: &str) {
        if let Some(cmd) = self.command_mut(id) {
            cmd.name = name.trim().to_string();
        }
    }

    pub fn delete_command(&mut self, id: &str) {
        self.commands.retain(|c| c.id != id);
    }

    pub fn set_audio_path(&mut self, id: &str, path: Option<PathBuf>) {
        if let Some(cmd) = self.command_mut(id) {
            cmd.audio_path = path;
        }
    }

    pub fn set_session_count(&mut self, id: &str, count: u32) {
        if let Some(cmd) = self.command_mut(id) {
            cmd.session_count = count;
        }
    }

    pub fn toggle_selected(&mut self, id: &str) {
        if let Some(cmd) = self.command_mut(id) {
            cmd.selected = !cmd.selected;
        }
    }

    /// Select everything, or clear the selection if everything is
    /// already selected.
    pub fn toggle_select_all(&mut self) {
        let all_selected = !self.commands.is_empty() && self.commands.iter().all(|c| c.selected);
        for cmd in &mut self.commands {
            cmd.selected = !all_selected;
        }
    }

    /// Same toggle, scoped to one group's commands.
    pub fn toggle_select_group(&mut self, group_id: &str) {
        let members: Vec<usize> = self
            .commands
            .iter()
            .enumerate()
            .filter(|(_, c)| c.group_id.as_deref() == Some(group_id))
            .map(|(i, _)| i)
            .collect();
        let all_selected = !members.is_empty() && members.iter().all(|&i| self.commands[i].selected);
        for i in members {
            self.commands[i].selected = !all_selected;
        }
    }

    /// Set the session count on every selected command at once.
    pub fn batch_set_session_count(&mut self, count: u32) {
        for cmd in self.commands.iter_mut().filter(|c| c.selected) {
            cmd.session_count = count;
        }
    }

    pub fn assign_group(&mut self, id: &str, group_id: Option<String>) {
        if let Some(cmd) = self.command_mut(id) {
            cmd.group_id = group_id;
        }
    }

    /// Swap a command with its predecessor (`delta < 0`) or successor
    /// in display order.
    pub fn move_command(&mut self, id: &str, delta: i32) {
        let mut order: Vec<usize> = (0..self.commands.len()).collect();
        order.sort_by_key(|&i| self.commands[i].order);

        let Some(pos) = order.iter().position(|&i| self.commands[i].id == id) else {
            return;
        };
        let target = if delta < 0 {
            pos.checked_sub(1)
        } else {
            (pos + 1 < order.len()).then_some(pos + 1)
        };
        if let Some(target) = target {
            let (a, b) = (order[pos], order[target]);
            let tmp = self.commands[a].order;
            self.commands[a].order = self.commands[b].order;
            self.commands[b].order = tmp;
        }
    }

    pub fn record_play(&mut self, id: &str) {
        if let Some(cmd) = self.command_mut(id) {
            cmd.play_count += 1;
        }
    }

    // ── Groups ───────────────────────────────────────────────────────

    pub fn add_group(&mut self, name: &str, color: GroupColor) -> String {
        let id = self.fresh_id();
        let order = self.groups.iter().map(|g| g.order + 1).max().unwrap_or(0);
        self.groups.push(Group {
            id: id.clone(),
            name: name.trim().to_string(),
            color,
            order,
        });
        id
    }

    pub fn group(&self, id: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.id == id)
    }

    pub fn rename_group(&mut self, id: &str, name: &str) {
        if let Some(group) = self.groups.iter_mut().find(|g| g.id == id) {
            group.name = name.trim().to_string();
        }
    }

    /// Remove a group; its commands stay, ungrouped.
    pub fn delete_group(&mut self, id: &str) {
        self.groups.retain(|g| g.id != id);
        for cmd in &mut self.commands {
            if cmd.group_id.as_deref() == Some(id) {
                cmd.group_id = None;
            }
        }
    }

    // ── Presets ──────────────────────────────────────────────────────

    /// Capture the current per-command session counts under a name.
    pub fn save_preset(&mut self, name: &str, description: Option<String>) -> String {
        let session_counts = self
            .commands
            .iter()
            .map(|c| (c.id.clone(), c.session_count))
            .collect();
        let id = self.fresh_id();
        self.presets.push(TrainingPreset {
            id: id.clone(),
            name: name.trim().to_string(),
            description,
            session_counts,
            created_at: Local::now(),
        });
        id
    }

    /// Restore a preset's counts; commands the preset does not know
    /// get a count of zero.
    pub fn apply_preset(&mut self, preset_id: &str) {
        let Some(preset) = self.presets.iter().find(|p| p.id == preset_id) else {
            return;
        };
        let counts = preset.session_counts.clone();
        for cmd in &mut self.commands {
            cmd.session_count = counts.get(&cmd.id).copied().unwrap_or(0);
        }
    }

    pub fn delete_preset(&mut self, preset_id: &str) {
        self.presets.retain(|p| p.id != preset_id);
    }

    // ── Session handoff ──────────────────────────────────────────────

    /// Commands eligible for a session: selected, counted, with audio.
    /// This is the filtered list the scheduler consumes.
    pub fn training_ready(&self) -> Vec<PlannedCommand> {
        self.commands
            .iter()
            .filter(|c| c.selected && c.session_count > 0 && c.has_audio())
            .map(|c| PlannedCommand {
                id: c.id.clone(),
                name: c.name.clone(),
                repeats: c.session_count,
            })
            .collect()
    }

    /// Selected, counted commands that are missing audio and therefore
    /// block the start gate.
    pub fn start_blockers(&self) -> Vec<&Command> {
        self.commands
            .iter()
            .filter(|c| c.selected && c.session_count > 0 && !c.has_audio())
            .collect()
    }

    pub fn can_start(&self) -> bool {
        !self.training_ready().is_empty() && self.start_blockers().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn library_with(names: &[&str]) -> Library {
        let mut lib = Library::default();
        for name in names {
            lib.add_command(name, None);
        }
        lib
    }

    #[test]
    fn add_assigns_unique_ids_and_increasing_order() {
        let lib = library_with(&["jab", "cross", "hook"]);
        let ids: Vec<&str> = lib.commands.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
        let orders: Vec<u32> = lib.commands.iter().map(|c| c.order).collect();
        assert_eq!(orders, vec![0, 1, 2]);
    }

    #[test]
    fn rename_and_delete() {
        let mut lib = library_with(&["jab"]);
        lib.rename_command("1", "  double jab ");
        assert_eq!(lib.command("1").unwrap().name, "double jab");

        lib.delete_command("1");
        assert!(lib.command("1").is_none());
    }

    #[test]
    fn toggle_select_all_flips_both_ways() {
        let mut lib = library_with(&["a", "b"]);
        lib.toggle_select_all();
        assert!(lib.commands.iter().all(|c| c.selected));
        lib.toggle_select_all();
        assert!(lib.commands.iter().all(|c| !c.selected));
    }

    #[test]
    fn group_toggle_only_touches_members() {
        let mut lib = library_with(&["a", "b", "c"]);
        let gid = lib.add_group("footwork", GroupColor::Green);
        lib.assign_group("1", Some(gid.clone()));
        lib.assign_group("2", Some(gid.clone()));

        lib.toggle_select_group(&gid);
        assert!(lib.command("1").unwrap().selected);
        assert!(lib.command("2").unwrap().selected);
        assert!(!lib.command("3").unwrap().selected);
    }

    #[test]
    fn deleting_a_group_detaches_its_commands() {
        let mut lib = library_with(&["a"]);
        let gid = lib.add_group("drills", GroupColor::Blue);
        lib.assign_group("1", Some(gid.clone()));

        lib.delete_group(&gid);
        assert!(lib.groups.is_empty());
        assert_eq!(lib.command("1").unwrap().group_id, None);
    }

    #[test]
    fn batch_count_applies_to_selection_only() {
        let mut lib = library_with(&["a", "b"]);
        lib.toggle_selected("1");
        lib.batch_set_session_count(5);

        assert_eq!(lib.command("1").unwrap().session_count, 5);
        assert_eq!(lib.command("2").unwrap().session_count, 1);
    }

    #[test]
    fn move_command_swaps_display_order() {
        let mut lib = library_with(&["a", "b", "c"]);
        lib.move_command("3", -1);

        let mut sorted: Vec<&Command> = lib.commands.iter().collect();
        sorted.sort_by_key(|c| c.order);
        let names: Vec<&str> = sorted.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["a", "c", "b"]);

        // Moving the first entry up is a no-op
        lib.move_command("1", -1);
        let mut sorted: Vec<&Command> = lib.commands.iter().collect();
        sorted.sort_by_key(|c| c.order);
        assert_eq!(sorted[0].name, "a");
    }

    #[test]
    fn preset_roundtrip_zeroes_unknown_commands() {
        let mut lib = library_with(&["a", "b"]);
        lib.set_session_count("1", 4);
        lib.set_session_count("2", 2);
        let pid = lib.save_preset("heavy", None);

        lib.set_session_count("1", 9);
        let late = lib.add_command("c", None);

        lib.apply_preset(&pid);
        assert_eq!(lib.command("1").unwrap().session_count, 4);
        assert_eq!(lib.command("2").unwrap().session_count, 2);
        assert_eq!(lib.command(&late).unwrap().session_count, 0);
    }

    #[test]
    fn training_ready_requires_selection_count_and_audio() {
        let mut lib = library_with(&["a", "b", "c"]);
        lib.toggle_selected("1");
        lib.toggle_selected("2");
        lib.set_audio_path("1", Some(PathBuf::from("/tmp/a.wav")));
        lib.set_session_count("2", 0);

        let ready = lib.training_ready();
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].id, "1");
        assert_eq!(ready[0].repeats, 1);

        // "b" is deselected-by-count, "c" is unselected: neither blocks
        assert!(lib.start_blockers().is_empty());
        assert!(lib.can_start());
    }

    #[test]
    fn missing_audio_blocks_the_start_gate() {
        let mut lib = library_with(&["a", "b"]);
        lib.toggle_selected("1");
        lib.toggle_selected("2");
        lib.set_audio_path("1", Some(PathBuf::from("/tmp/a.wav")));

        assert_eq!(lib.start_blockers().len(), 1);
        assert!(!lib.can_start());
    }

    #[test]
    fn record_play_bumps_the_historical_counter() {
        let mut lib = library_with(&["a"]);
        lib.record_play("1");
        lib.record_play("1");
        assert_eq!(lib.command("1").unwrap().play_count, 2);
    }

    #[test]
    fn group_color_cycles_through_the_palette() {
        let mut color = GroupColor::Blue;
        for _ in 0..GroupColor::ALL.len() {
            color = color.next();
        }
        assert_eq!(color, GroupColor::Blue);
    }
}
