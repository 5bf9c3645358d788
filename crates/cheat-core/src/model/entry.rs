use bitflags::bitflags;

use crate::api::EntryId;
use crate::decoder::ActionCode;
use crate::encoding::{CodeType, CustomCode, LinkLevel};
use crate::fault::EngineError;
use crate::model::action::{ActionState, CheatAction};
use crate::word::Field;

bitflags! {
    /// Entry classification plus the two runtime bits owned by the engine.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
    pub struct EntryFlags: u16 {
        /// Entry is running.
        const ACTIVE = 1 << 0;
        /// Every executable action is one-shot.
        const ONE_SHOT = 1 << 1;
        /// Every action is a comment.
        const NULL = 1 << 2;
        /// Master is a separator.
        const SEPARATOR = 1 << 3;
        /// Master is a label-select.
        const SELECT = 1 << 4;
        /// Contains a user-chosen value.
        const USER_SELECT = 1 << 5;
        /// Master is a layer marker.
        const LAYER_MARKER = 1 << 6;
        /// Contains an action from a legacy record.
        const OLD_FORMAT = 1 << 7;
        /// Label-select entry without two usable labels.
        const MALFORMED = 1 << 8;
        /// Values restored for a global pause; still active.
        const TEMP_PAUSED = 1 << 9;
    }
}

impl EntryFlags {
    /// Bits written by the engine rather than derived from the actions.
    pub const RUNTIME: Self = Self::ACTIVE.union(Self::TEMP_PAUSED);
}

/// A named, ordered, never-empty group of actions.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct CheatEntry {
    pub(crate) id: EntryId,
    pub(crate) actions: Vec<CheatAction>,
    pub(crate) label_index: Option<Vec<usize>>,
    pub(crate) flags: EntryFlags,
    /// Display name.
    pub name: String,
    /// Free-form comment.
    pub comment: String,
    /// Up to two activation key bindings.
    pub activation_keys: [Option<u32>; 2],
    /// Chosen label of a label-select entry.
    pub selection: usize,
    /// Value chosen by the user for value-select actions.
    pub user_value: u32,
    /// Menu layer this entry belongs to.
    pub layer_index: u32,
}

impl Default for CheatEntry {
    fn default() -> Self {
        Self::new(0)
    }
}

impl CheatEntry {
    /// Entry holding a single placeholder comment.
    #[must_use]
    pub fn new(id: EntryId) -> Self {
        let mut entry = Self {
            id,
            actions: vec![CheatAction::placeholder()],
            label_index: None,
            flags: EntryFlags::empty(),
            name: String::new(),
            comment: String::new(),
            activation_keys: [None, None],
            selection: 0,
            user_value: 0,
            layer_index: 0,
        };
        entry.update_derived_flags();
        entry
    }

    /// Entry built from an action list.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvariantViolation`] for an empty list.
    pub fn with_actions(
        id: EntryId,
        name: impl Into<String>,
        actions: Vec<CheatAction>,
    ) -> Result<Self, EngineError> {
        if actions.is_empty() {
            return Err(EngineError::InvariantViolation("entry needs at least one action"));
        }
        let mut entry = Self::new(id);
        entry.name = name.into();
        entry.actions = actions;
        entry.update_derived_flags();
        Ok(entry)
    }

    /// Identifier assigned by the owning list.
    #[must_use]
    pub const fn id(&self) -> EntryId {
        self.id
    }

    /// Actions in execution order; index 0 is the master.
    #[must_use]
    pub fn actions(&self) -> &[CheatAction] {
        &self.actions
    }

    /// Current flags.
    #[must_use]
    pub const fn flags(&self) -> EntryFlags {
        self.flags
    }

    /// True while the engine runs this entry.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.flags.contains(EntryFlags::ACTIVE)
    }

    /// Positions of label heads, when the entry has a usable index.
    #[must_use]
    pub fn label_index(&self) -> Option<&[usize]> {
        self.label_index.as_deref()
    }

    /// Number of selectable labels.
    #[must_use]
    pub fn label_count(&self) -> usize {
        self.label_index.as_ref().map_or(0, Vec::len)
    }

    /// Display name of label `n`.
    #[must_use]
    pub fn label_name(&self, n: usize) -> Option<&str> {
        let index = *self.label_index.as_ref()?.get(n)?;
        self.actions.get(index).map(|a| a.name.as_str())
    }

    /// Edits one action and recomputes derived flags.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvariantViolation`] when `at` is out of range.
    pub fn update_action<R>(
        &mut self,
        at: usize,
        edit: impl FnOnce(&mut CheatAction) -> R,
    ) -> Result<R, EngineError> {
        let action = self
            .actions
            .get_mut(at)
            .ok_or(EngineError::InvariantViolation("action index out of range"))?;
        let result = edit(action);
        self.update_derived_flags();
        Ok(result)
    }

    /// Grows or shrinks the action list to `len`.
    ///
    /// New actions are linked placeholder comments.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvariantViolation`] for `len == 0` and
    /// [`EngineError::Allocation`] when growth fails; the list is unchanged
    /// in both cases.
    pub fn resize_action_list(&mut self, len: usize) -> Result<(), EngineError> {
        if len == 0 {
            return Err(EngineError::InvariantViolation("entry needs at least one action"));
        }
        if len > self.actions.len() {
            let extra = len - self.actions.len();
            self.actions
                .try_reserve(extra)
                .map_err(|_| EngineError::Allocation { requested: extra })?;
            self.actions.resize_with(len, linked_placeholder);
        } else {
            self.actions.truncate(len);
        }
        self.update_derived_flags();
        Ok(())
    }

    /// Inserts a linked placeholder at `at`, shifting later actions.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvariantViolation`] when `at` is zero (the
    /// master cannot be displaced) or past the end, and
    /// [`EngineError::Allocation`] when growth fails.
    pub fn insert_action(&mut self, at: usize) -> Result<(), EngineError> {
        if at == 0 || at > self.actions.len() {
            return Err(EngineError::InvariantViolation("invalid action insert position"));
        }
        self.actions
            .try_reserve(1)
            .map_err(|_| EngineError::Allocation { requested: 1 })?;
        self.actions.insert(at, linked_placeholder());
        self.update_derived_flags();
        Ok(())
    }

    /// Removes the action at `at`, shifting later actions.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvariantViolation`] for the master action or an
    /// out-of-range index; the entry is unchanged.
    pub fn delete_action(&mut self, at: usize) -> Result<CheatAction, EngineError> {
        if at == 0 {
            return Err(EngineError::InvariantViolation("master action cannot be deleted"));
        }
        if at >= self.actions.len() {
            return Err(EngineError::InvariantViolation("action index out of range"));
        }
        let mut removed = self.actions.remove(at);
        removed.release_backup();
        self.update_derived_flags();
        Ok(removed)
    }

    /// Drops every action's backup.
    pub fn release_backups(&mut self) {
        for action in &mut self.actions {
            action.release_backup();
        }
    }

    /// Recomputes every derived flag from the action list in one pass.
    pub fn update_derived_flags(&mut self) {
        let mut flags = self.flags & EntryFlags::RUNTIME;
        let mut all_comments = true;
        let mut executable = 0usize;
        let mut one_shot = 0usize;

        for (index, action) in self.actions.iter().enumerate() {
            let view = action.view();
            if view.legacy {
                flags |= EntryFlags::OLD_FORMAT;
            }
            if view.word.is_set(Field::ValueSelectEnable) && view.op() != Some(CodeType::Popup) {
                flags |= EntryFlags::USER_SELECT;
            }
            match view.code {
                ActionCode::Custom(CustomCode::Comment) => {}
                ActionCode::Custom(code) => {
                    all_comments = false;
                    if index == 0 {
                        match code {
                            CustomCode::Separator => flags |= EntryFlags::SEPARATOR,
                            CustomCode::LabelSelect => flags |= EntryFlags::SELECT,
                            CustomCode::Layer => flags |= EntryFlags::LAYER_MARKER,
                            CustomCode::Comment => {}
                        }
                    }
                }
                ActionCode::Op(code) => {
                    all_comments = false;
                    executable += 1;
                    if view.word.is_set(Field::OneShot) {
                        one_shot += 1;
                    }
                    if code.is_user_select() {
                        flags |= EntryFlags::USER_SELECT;
                    }
                }
                ActionCode::Invalid => {
                    all_comments = false;
                    executable += 1;
                }
            }
        }

        if all_comments {
            flags |= EntryFlags::NULL;
        }
        if executable > 0 && one_shot == executable {
            flags |= EntryFlags::ONE_SHOT;
        }
        self.flags = flags;

        if flags.contains(EntryFlags::SELECT) {
            let malformed = self.build_label_index().err();
            if let Some(error) = malformed {
                log::debug!("entry {} ({}): {error}", self.id, self.name);
            }
        } else {
            self.label_index = None;
            for action in &mut self.actions {
                action.state.remove(ActionState::IS_LABEL);
            }
        }
    }

    /// Rebuilds the label index of a label-select entry.
    ///
    /// Label heads are the linked actions after the master; each label runs
    /// over the sub-link actions that follow its head.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::MalformedLabels`] when fewer than two labels
    /// exist; the entry is flagged malformed and left without an index.
    pub fn build_label_index(&mut self) -> Result<&[usize], EngineError> {
        let mut heads = Vec::new();
        for (index, action) in self.actions.iter_mut().enumerate() {
            let is_head = index > 0 && action.link() == LinkLevel::Linked;
            action.state.set(ActionState::IS_LABEL, is_head);
            if is_head {
                heads.push(index);
            }
        }

        if heads.len() < 2 {
            self.flags |= EntryFlags::MALFORMED;
            self.label_index = None;
            return Err(EngineError::MalformedLabels {
                labels: heads.len(),
            });
        }

        self.flags.remove(EntryFlags::MALFORMED);
        self.selection = self.selection.min(heads.len() - 1);
        Ok(self.label_index.insert(heads).as_slice())
    }

    /// Action range walked for the current selection of a label-select entry.
    #[must_use]
    pub fn selected_run(&self) -> Option<std::ops::Range<usize>> {
        let start = *self.label_index.as_ref()?.get(self.selection)?;
        let end = self.actions[start + 1..]
            .iter()
            .position(|a| a.link() != LinkLevel::SubLink)
            .map_or(self.actions.len(), |offset| start + 1 + offset);
        Some(start..end)
    }

    pub(crate) fn set_runtime_flag(&mut self, flag: EntryFlags, on: bool) {
        self.flags.set(flag & EntryFlags::RUNTIME, on);
    }
}

fn linked_placeholder() -> CheatAction {
    let mut action = CheatAction::placeholder();
    action.word = action.word.with_link(LinkLevel::Linked);
    action
}

#[cfg(test)]
mod tests {
    use super::{CheatEntry, EntryFlags};
    use crate::api::Location;
    use crate::encoding::{CodeType, CustomCode, LinkLevel};
    use crate::fault::EngineError;
    use crate::legacy::{LegacyCode, LegacyGrammar};
    use crate::model::action::{ActionState, CheatAction};
    use crate::word::{Field, InstructionWord};

    fn write(link: LinkLevel) -> CheatAction {
        CheatAction::new(
            InstructionWord::new(CodeType::Write).with_link(link),
            Location::cpu(0),
            0x10,
            1,
        )
        .with_extend(0xFF)
    }

    fn select_entry(labels: usize) -> CheatEntry {
        let mut actions = vec![CheatAction::new(
            InstructionWord::custom(CustomCode::LabelSelect),
            Location::cpu(0),
            0,
            0,
        )];
        for n in 0..labels {
            actions.push(write(LinkLevel::Linked).with_name(format!("label {n}")));
            actions.push(write(LinkLevel::SubLink));
        }
        CheatEntry::with_actions(1, "select", actions).expect("non-empty")
    }

    #[test]
    fn new_entry_is_a_null_placeholder() {
        let entry = CheatEntry::new(3);
        assert_eq!(entry.actions().len(), 1);
        assert!(entry.flags().contains(EntryFlags::NULL));
        assert_eq!(entry.id(), 3);
    }

    #[test]
    fn deleting_master_is_rejected_and_entry_unchanged() {
        let mut entry =
            CheatEntry::with_actions(0, "x", vec![write(LinkLevel::Master), write(LinkLevel::Linked)])
                .expect("entry");
        let before = entry.clone();
        let err = entry.delete_action(0).expect_err("master delete");
        assert!(matches!(err, EngineError::InvariantViolation(_)));
        assert_eq!(entry, before);
        assert!(entry.delete_action(2).is_err());
        entry.delete_action(1).expect("delete linked");
        assert_eq!(entry.actions().len(), 1);
    }

    #[test]
    fn resize_to_zero_is_rejected() {
        let mut entry = CheatEntry::new(0);
        assert!(entry.resize_action_list(0).is_err());
        entry.resize_action_list(4).expect("grow");
        assert_eq!(entry.actions().len(), 4);
        assert_eq!(entry.actions()[3].link(), LinkLevel::Linked);
        entry.resize_action_list(2).expect("shrink");
        assert_eq!(entry.actions().len(), 2);
    }

    #[test]
    fn insert_action_shifts_followers() {
        let mut entry = CheatEntry::with_actions(
            0,
            "x",
            vec![write(LinkLevel::Master), write(LinkLevel::Linked).with_name("tail")],
        )
        .expect("entry");
        assert!(entry.insert_action(0).is_err());
        assert!(entry.insert_action(3).is_err());
        entry.insert_action(1).expect("insert");
        assert_eq!(entry.actions()[2].name, "tail");
        assert!(entry.actions()[1].is_custom());
    }

    #[test]
    fn flags_follow_the_action_list() {
        let once = |link| {
            let mut a = write(link);
            a.word = a.word.with_flag(Field::OneShot, true);
            a
        };
        let mut entry =
            CheatEntry::with_actions(0, "x", vec![once(LinkLevel::Master), once(LinkLevel::Linked)])
                .expect("entry");
        assert!(entry.flags().contains(EntryFlags::ONE_SHOT));
        entry
            .update_action(1, |a| a.word = a.word.with_flag(Field::OneShot, false))
            .expect("edit");
        assert!(!entry.flags().contains(EntryFlags::ONE_SHOT));

        entry
            .update_action(1, |a| {
                *a = CheatAction::from_legacy(
                    LegacyCode {
                        code: 560,
                        cpu: 0,
                        mask: 0,
                        grammar: LegacyGrammar::Short,
                    },
                    0,
                    9,
                );
            })
            .expect("edit");
        assert!(entry.flags().contains(EntryFlags::OLD_FORMAT));
        assert!(entry.flags().contains(EntryFlags::USER_SELECT));
    }

    #[test]
    fn runtime_flags_survive_recompute() {
        let mut entry = CheatEntry::new(0);
        entry.set_runtime_flag(EntryFlags::ACTIVE, true);
        entry.update_derived_flags();
        assert!(entry.is_active());
        entry.set_runtime_flag(EntryFlags::NULL, false);
        assert!(entry.flags().contains(EntryFlags::NULL));
    }

    #[test]
    fn label_index_lists_heads_and_runs() {
        let mut entry = select_entry(3);
        assert!(entry.flags().contains(EntryFlags::SELECT));
        assert_eq!(entry.label_index(), Some(&[1, 3, 5][..]));
        assert_eq!(entry.label_name(1), Some("label 1"));
        assert!(entry.actions()[3].state.contains(ActionState::IS_LABEL));
        entry.selection = 1;
        assert_eq!(entry.selected_run(), Some(3..5));
        entry.selection = 2;
        assert_eq!(entry.selected_run(), Some(5..7));
    }

    #[test]
    fn single_label_is_malformed_without_panicking() {
        let mut entry = select_entry(1);
        assert!(entry.flags().contains(EntryFlags::MALFORMED));
        assert_eq!(entry.label_index(), None);
        assert_eq!(entry.selected_run(), None);
        let err = entry.build_label_index().expect_err("one label");
        assert!(matches!(err, EngineError::MalformedLabels { labels: 1 }));
    }
}
