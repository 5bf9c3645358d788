//! Per-frame execution of active entries.
//!
//! An entry is walked as a small program: actions run in order, Branch and
//! Loop may jump, and an index visited twice ends the pass for that frame.
//! Operands that fail to resolve turn the operation into a no-op.

#![allow(
    clippy::pedantic,
    clippy::nursery,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    unknown_lints,
    missing_docs
)]

mod condition;
mod helpers;

pub use condition::evaluate;
pub use helpers::{apply_write_mode, to_bcd, user_select_value, Target};

use std::collections::VecDeque;
use std::ops::Range;

use crate::api::{
    variable_slot, AddressSpace, EngineConfig, EntryId, PopupMessage, StepOutcome, WatchInfo,
    VARIABLE_SLOT_COUNT,
};
use crate::decoder::ExecutableView;
use crate::encoding::{CodeType, PopupLayout, Prefill, WriteMode};
use crate::fault::EngineError;
use crate::memory::width_mask;
use crate::model::{ActionState, CheatAction, CheatEntry, CheatList, EntryFlags};
use crate::timing::{delay_threshold, prefill_value};
use crate::word::Field;
use helpers::{
    capture_backup, operand_data, primary_target, read_target, restore_backup, target_span,
    write_target, Variables,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Next,
    Jump(usize),
}

/// Result of running one opcode.
#[derive(Debug, Clone, Copy)]
struct Outcome {
    flow: Flow,
    produced: Option<u32>,
    executed: bool,
}

impl Outcome {
    const SKIP: Self = Self {
        flow: Flow::Next,
        produced: None,
        executed: false,
    };

    const fn ran(produced: Option<u32>) -> Self {
        Self {
            flow: Flow::Next,
            produced,
            executed: true,
        }
    }
}

/// Entry data an action needs while the action itself is borrowed.
struct EntryContext<'a> {
    id: EntryId,
    user_value: u32,
    name: &'a str,
}

/// Owns the variable slots, registered watches and the popup queue, and
/// drives entries through activation, per-frame steps and deactivation.
#[derive(Debug, Clone)]
pub struct Engine {
    config: EngineConfig,
    variables: Variables,
    watches: Vec<WatchInfo>,
    popups: VecDeque<PopupMessage>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Engine {
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            variables: [0; VARIABLE_SLOT_COUNT],
            watches: Vec::new(),
            popups: VecDeque::new(),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub const fn variables(&self) -> &[u32; VARIABLE_SLOT_COUNT] {
        &self.variables
    }

    /// Sets a variable slot; returns false for an unknown slot.
    pub fn set_variable(&mut self, slot: usize, value: u32) -> bool {
        match self.variables.get_mut(slot) {
            Some(v) => {
                *v = value;
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn watches(&self) -> &[WatchInfo] {
        &self.watches
    }

    pub fn register_watch(&mut self, watch: WatchInfo) {
        self.watches.push(watch);
    }

    /// Drops every watch owned by `id`; returns how many were removed.
    pub fn unregister_watches_of(&mut self, id: EntryId) -> usize {
        let before = self.watches.len();
        self.watches.retain(|w| w.owner != Some(id));
        before - self.watches.len()
    }

    /// Hands queued popups to the display layer, oldest first.
    pub fn drain_popups(&mut self) -> Vec<PopupMessage> {
        self.popups.drain(..).collect()
    }

    /// Activates `entry`: captures backups, registers watches, sets ACTIVE.
    ///
    /// Activating an active entry does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Allocation`] when a backup cannot be
    /// allocated; the entry is left untouched.
    pub fn activate<S: AddressSpace + ?Sized>(
        &mut self,
        entry: &mut CheatEntry,
        host: &mut S,
    ) -> Result<(), EngineError> {
        if entry.is_active() {
            return Ok(());
        }
        let reachable = reachable_actions(entry);

        let mut captured = Vec::new();
        for index in reachable.clone() {
            let action = &entry.actions[index];
            if action.backup.is_some() {
                continue;
            }
            let backup = capture_backup(
                &action.view(),
                &self.variables,
                host,
                self.config.max_repeat_backup,
            )?;
            captured.push((index, backup));
        }

        for action in &mut entry.actions {
            action.reset_runtime();
        }
        for (index, backup) in captured {
            entry.actions[index].backup = backup;
        }

        for index in reachable {
            let action = &entry.actions[index];
            let view = action.view();
            if view.op() != Some(CodeType::Watch) {
                continue;
            }
            if let Some(watch) = self.watch_for(entry, action, &view, host) {
                self.watches.push(watch);
            }
        }

        entry.set_runtime_flag(EntryFlags::TEMP_PAUSED, false);
        entry.set_runtime_flag(EntryFlags::ACTIVE, true);
        log::debug!("activated entry {} ({})", entry.id(), entry.name);
        Ok(())
    }

    /// Deactivates `entry`, restoring values for actions that ask for it.
    pub fn deactivate<S: AddressSpace + ?Sized>(&mut self, entry: &mut CheatEntry, host: &mut S) {
        if !entry.is_active() {
            return;
        }
        if !entry.flags().contains(EntryFlags::TEMP_PAUSED) {
            self.restore_entry(entry, host);
        }
        entry.release_backups();
        for action in &mut entry.actions {
            action.reset_runtime();
        }
        self.unregister_watches_of(entry.id());
        entry.set_runtime_flag(EntryFlags::RUNTIME, false);
        log::debug!("deactivated entry {} ({})", entry.id(), entry.name);
    }

    /// Restores values for a global pause; the entry stays active and keeps
    /// its backups.
    pub fn temp_deactivate<S: AddressSpace + ?Sized>(
        &mut self,
        entry: &mut CheatEntry,
        host: &mut S,
    ) {
        if !entry.is_active() || entry.flags().contains(EntryFlags::TEMP_PAUSED) {
            return;
        }
        self.restore_entry(entry, host);
        entry.set_runtime_flag(EntryFlags::TEMP_PAUSED, true);
    }

    /// Ends a global pause.
    pub fn resume(&mut self, entry: &mut CheatEntry) {
        entry.set_runtime_flag(EntryFlags::TEMP_PAUSED, false);
    }

    /// Runs one frame of `entry`.
    pub fn step<S: AddressSpace + ?Sized>(
        &mut self,
        entry: &mut CheatEntry,
        host: &mut S,
    ) -> StepOutcome {
        if !entry.is_active() {
            return StepOutcome::Inactive;
        }
        if entry.flags().contains(EntryFlags::TEMP_PAUSED) {
            return StepOutcome::Paused;
        }

        let run = reachable_actions(entry);
        let mut visited = vec![false; entry.actions.len()];
        let mut executed = 0;
        let mut copied = None;
        let mut pc = run.start;

        while run.contains(&pc) {
            if visited[pc] {
                log::trace!("entry {} revisited action {pc}", entry.id());
                break;
            }
            visited[pc] = true;

            let outcome = self.visit(entry, pc, host, copied);
            if outcome.executed {
                executed += 1;
            }
            if outcome.produced.is_some() {
                copied = outcome.produced;
            }
            pc = match outcome.flow {
                Flow::Next => pc + 1,
                Flow::Jump(target) => target,
            };
        }

        if entry.flags().contains(EntryFlags::ONE_SHOT) {
            let finished = entry
                .actions
                .iter()
                .zip(&visited)
                .filter(|(action, seen)| **seen && runs_each_frame(action))
                .all(|(action, _)| action.state.contains(ActionState::OPERATION_DONE));
            if finished {
                self.deactivate(entry, host);
                return StepOutcome::Deactivated { executed };
            }
        }
        StepOutcome::Ran { executed }
    }

    /// Steps every active entry of `list`; returns how many ran.
    pub fn step_list<S: AddressSpace + ?Sized>(&mut self, list: &mut CheatList, host: &mut S) -> usize {
        let mut ran = 0;
        for entry in list.iter_mut() {
            if matches!(
                self.step(entry, host),
                StepOutcome::Ran { .. } | StepOutcome::Deactivated { .. }
            ) {
                ran += 1;
            }
        }
        ran
    }

    /// Deactivates the entry at `at` and removes it from `list`, so its
    /// restores run and its watches go away with it.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvariantViolation`] when `at` is out of range.
    pub fn delete_entry<S: AddressSpace + ?Sized>(
        &mut self,
        list: &mut CheatList,
        at: usize,
        host: &mut S,
    ) -> Result<CheatEntry, EngineError> {
        if let Some(entry) = list.get_mut(at) {
            self.deactivate(entry, host);
        }
        list.delete_entry(at)
    }

    fn restore_entry<S: AddressSpace + ?Sized>(&mut self, entry: &CheatEntry, host: &mut S) {
        for action in &entry.actions {
            let view = action.view();
            if view.word.is_set(Field::RestoreValue) {
                restore_backup(&view, &mut self.variables, host, action.backup.as_ref());
            }
        }
    }

    fn watch_for<S: AddressSpace + ?Sized>(
        &self,
        entry: &CheatEntry,
        action: &CheatAction,
        view: &ExecutableView,
        host: &mut S,
    ) -> Option<WatchInfo> {
        let Some(Target::Memory { location, address }) =
            primary_target(view, &self.variables, host)
        else {
            log::trace!("watch of entry {} does not resolve to memory", entry.id());
            return None;
        };
        let label = if action.name.is_empty() {
            entry.name.clone()
        } else {
            action.name.clone()
        };
        Some(WatchInfo {
            owner: Some(entry.id()),
            location,
            address,
            element_bytes: view.bytes(),
            count: view.data.max(1),
            label,
            swap: view.word.swapped(),
        })
    }

    fn visit<S: AddressSpace + ?Sized>(
        &mut self,
        entry: &mut CheatEntry,
        index: usize,
        host: &mut S,
        copied: Option<u32>,
    ) -> Outcome {
        let ctx = EntryContext {
            id: entry.id,
            user_value: entry.user_value,
            name: &entry.name,
        };
        let action = &mut entry.actions[index];
        if !runs_each_frame(action) {
            return Outcome::SKIP;
        }
        let view = action.view();
        let Some(code) = view.op() else {
            return Outcome::SKIP;
        };
        let word = view.word;
        let one_shot = word.is_set(Field::OneShot);
        if one_shot && action.state.contains(ActionState::OPERATION_DONE) {
            return Outcome::SKIP;
        }

        if code.is_write()
            && word.prefill() != Prefill::None
            && !action.state.contains(ActionState::PREFILL_DONE)
            && !self.prefill_ready(action, &view, host)
        {
            return Outcome::SKIP;
        }

        if word.is_set(Field::DelayEnable) {
            let threshold = delay_threshold(word.delay_seconds(), self.config.frames_per_second);
            if one_shot && word.is_set(Field::RestoreValue) {
                return self.hold(&ctx, action, &view, code, threshold, host, copied);
            }
            action.frame_timer = action.frame_timer.saturating_add(1);
            if action.frame_timer < threshold {
                return Outcome::SKIP;
            }
            action.frame_timer = 0;
        }

        let outcome = self.run(&ctx, action, &view, code, host, copied);
        if one_shot && outcome.executed {
            action.state.insert(ActionState::OPERATION_DONE);
        }
        outcome
    }

    /// Writes the prefill constant once, then holds the action back until
    /// the live value moves off it.
    fn prefill_ready<S: AddressSpace + ?Sized>(
        &mut self,
        action: &mut CheatAction,
        view: &ExecutableView,
        host: &mut S,
    ) -> bool {
        let bytes = view.bytes();
        let Some(value) = prefill_value(view.word.prefill(), bytes) else {
            return true;
        };
        let Some(target) = primary_target(view, &self.variables, host) else {
            return false;
        };
        let swap = view.word.swapped();

        if !action.state.contains(ActionState::PREFILL_WRITTEN) {
            if write_target(host, &mut self.variables, target, bytes, swap, value) {
                action.state.insert(ActionState::PREFILL_WRITTEN);
            }
            return false;
        }
        match read_target(host, &self.variables, target, bytes, swap) {
            Some(live) if live != value => {
                action.state.insert(ActionState::PREFILL_DONE);
                true
            }
            _ => false,
        }
    }

    /// One-shot hold: the write repeats every frame until the delay expires,
    /// then the original value comes back.
    #[allow(clippy::too_many_arguments)]
    fn hold<S: AddressSpace + ?Sized>(
        &mut self,
        ctx: &EntryContext<'_>,
        action: &mut CheatAction,
        view: &ExecutableView,
        code: CodeType,
        threshold: u32,
        host: &mut S,
        copied: Option<u32>,
    ) -> Outcome {
        if action.state.contains(ActionState::FIRST_HALF) {
            action.frame_timer = action.frame_timer.saturating_add(1);
            if action.frame_timer >= threshold {
                restore_backup(view, &mut self.variables, host, action.backup.as_ref());
                action.release_backup();
                action.state.remove(ActionState::FIRST_HALF);
                action.state.insert(ActionState::OPERATION_DONE);
                return Outcome::SKIP;
            }
        } else {
            action.state.insert(ActionState::FIRST_HALF);
            action.frame_timer = 0;
        }
        self.run(ctx, action, view, code, host, copied)
    }

    fn run<S: AddressSpace + ?Sized>(
        &mut self,
        ctx: &EntryContext<'_>,
        action: &mut CheatAction,
        view: &ExecutableView,
        code: CodeType,
        host: &mut S,
        copied: Option<u32>,
    ) -> Outcome {
        let outcome = self.run_op(ctx, action, view, code, host, copied);
        outcome.unwrap_or_else(|| {
            log::trace!(
                "entry {}: {} at {:#x} did not resolve",
                ctx.id,
                code.mnemonic(),
                view.address
            );
            Outcome::SKIP
        })
    }

    fn run_op<S: AddressSpace + ?Sized>(
        &mut self,
        ctx: &EntryContext<'_>,
        action: &mut CheatAction,
        view: &ExecutableView,
        code: CodeType,
        host: &mut S,
        copied: Option<u32>,
    ) -> Option<Outcome> {
        let bytes = view.bytes();
        let full = width_mask(bytes);
        let word = view.word;

        match code {
            CodeType::Write => {
                let target = primary_target(view, &self.variables, host)?;
                let data = operand_data(view, &self.variables, copied)?;
                let value =
                    self.store(host, view, target, word.write_mode()?, data, view.extend_data)?;
                Some(Outcome::ran(Some(value)))
            }
            CodeType::IndexedWrite => {
                let target = primary_target(view, &self.variables, host)?;
                let data = operand_data(view, &self.variables, copied)?;
                let value = self.store(host, view, target, word.write_mode()?, data, full)?;
                Some(Outcome::ran(Some(value)))
            }
            CodeType::RepeatWrite => {
                let data = operand_data(view, &self.variables, copied)?;
                self.repeat(host, view, data, word.write_mode()?)
            }
            CodeType::ConditionalWrite => {
                let target = primary_target(view, &self.variables, host)?;
                let live = read_target(host, &self.variables, target, bytes, word.swapped());
                let condition = word.condition()?;
                if !evaluate(condition, live, view.extend_data, &mut action.prev_observed, host) {
                    return Some(Outcome::SKIP);
                }
                let data = operand_data(view, &self.variables, copied)?;
                let value = self.store(host, view, target, WriteMode::Merge, data, full)?;
                Some(Outcome::ran(Some(value)))
            }
            CodeType::VariableWrite => {
                let target = primary_target(view, &self.variables, host)?;
                let value = user_select_value(ctx.user_value, view);
                let value = self.store(host, view, target, WriteMode::Merge, value, full)?;
                Some(Outcome::ran(Some(value)))
            }
            CodeType::RepeatVariableWrite => {
                let value = user_select_value(ctx.user_value, view);
                self.repeat(host, view, value, WriteMode::Merge)
            }
            CodeType::PairedWrite => {
                let base = primary_target(view, &self.variables, host)?;
                let data = operand_data(view, &self.variables, copied)?;
                let mode = word.write_mode()?;
                let first = self.store(host, view, base, mode, data, full)?;
                let second = base.offset(1, bytes)?;
                self.store(host, view, second, mode, view.extend_data, full)?;
                Some(Outcome::ran(Some(first)))
            }
            CodeType::Move => {
                let slot = variable_slot(word.get(Field::VariableIndex))?;
                let target = primary_target(view, &self.variables, host)?;
                let live = read_target(host, &self.variables, target, bytes, word.swapped())?;
                let data = operand_data(view, &self.variables, copied)?;
                let value = live.wrapping_add(data);
                self.variables[slot] = value;
                Some(Outcome::ran(Some(value)))
            }
            CodeType::Branch => {
                let condition = word.condition()?;
                let live = if condition.reads_memory() {
                    let target = primary_target(view, &self.variables, host)?;
                    Some(read_target(host, &self.variables, target, bytes, word.swapped())?)
                } else {
                    None
                };
                let taken = evaluate(condition, live, view.data, &mut action.prev_observed, host);
                let flow = if taken {
                    Flow::Jump(usize::try_from(view.extend_data).unwrap_or(usize::MAX))
                } else {
                    Flow::Next
                };
                Some(Outcome {
                    flow,
                    produced: None,
                    executed: true,
                })
            }
            CodeType::Loop => {
                let slot = variable_slot(word.get(Field::VariableIndex))?;
                let remaining = self.variables[slot].saturating_sub(1);
                self.variables[slot] = remaining;
                let flow = if remaining == 0 {
                    Flow::Next
                } else {
                    Flow::Jump(usize::try_from(view.extend_data).unwrap_or(usize::MAX))
                };
                Some(Outcome {
                    flow,
                    produced: None,
                    executed: true,
                })
            }
            CodeType::Popup => {
                let condition = word.condition()?;
                let live = if condition.reads_memory() || word.popup_layout() != PopupLayout::Label
                {
                    let target = primary_target(view, &self.variables, host)?;
                    read_target(host, &self.variables, target, bytes, word.swapped())
                } else {
                    None
                };
                if !evaluate(condition, live, view.data, &mut action.prev_observed, host) {
                    return Some(Outcome::SKIP);
                }
                let label = if action.name.is_empty() {
                    ctx.name
                } else {
                    &action.name
                };
                let value = live.unwrap_or(0);
                let layout = word.popup_layout();
                self.push_popup(PopupMessage {
                    entry: ctx.id,
                    text: popup_text(layout, label, value, bytes),
                    value,
                    layout,
                });
                Some(Outcome::ran(None))
            }
            CodeType::Watch => Some(Outcome::SKIP),
        }
    }

    fn repeat<S: AddressSpace + ?Sized>(
        &mut self,
        host: &mut S,
        view: &ExecutableView,
        data: u32,
        mode: WriteMode,
    ) -> Option<Outcome> {
        let base = primary_target(view, &self.variables, host)?;
        let (count, stride) = target_span(view, usize::MAX);
        let full = width_mask(view.bytes());
        for index in 0..count {
            let target = base.offset(index, stride)?;
            self.store(host, view, target, mode, data, full)?;
        }
        Some(Outcome::ran(Some(data)))
    }

    /// Applies `mode` at `target` and returns the value written.
    fn store<S: AddressSpace + ?Sized>(
        &mut self,
        host: &mut S,
        view: &ExecutableView,
        target: Target,
        mode: WriteMode,
        data: u32,
        mask: u32,
    ) -> Option<u32> {
        let bytes = view.bytes();
        let swap = view.word.swapped();
        let full = width_mask(bytes);
        let value = if mode == WriteMode::Merge && mask & full == full {
            data & full
        } else {
            let old = read_target(host, &self.variables, target, bytes, swap)?;
            apply_write_mode(mode, old, data, mask) & full
        };
        write_target(host, &mut self.variables, target, bytes, swap, value).then_some(value)
    }

    fn push_popup(&mut self, message: PopupMessage) {
        if self.config.popup_queue_capacity == 0 {
            return;
        }
        while self.popups.len() >= self.config.popup_queue_capacity {
            self.popups.pop_front();
        }
        self.popups.push_back(message);
    }
}

/// Action indices an activation may reach.
fn reachable_actions(entry: &CheatEntry) -> Range<usize> {
    if entry.flags().contains(EntryFlags::SELECT) {
        entry.selected_run().unwrap_or(0..0)
    } else {
        0..entry.actions.len()
    }
}

/// True for actions that take part in per-frame execution.
fn runs_each_frame(action: &CheatAction) -> bool {
    action
        .view()
        .op()
        .is_some_and(|code| code != CodeType::Watch)
}

fn popup_text(layout: PopupLayout, label: &str, value: u32, bytes: u32) -> String {
    match layout {
        PopupLayout::Label => label.to_owned(),
        PopupLayout::Value => value.to_string(),
        PopupLayout::LabelAndValue => format!("{label} {value}"),
        PopupLayout::ValueAsText => (0..bytes)
            .rev()
            .map(|i| (value >> (i * 8)) as u8)
            .filter(|b| b.is_ascii_graphic() || *b == b' ')
            .map(char::from)
            .collect(),
    }
}
