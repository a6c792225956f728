//! Scene context
//!
//! Owns the live layer store, its history and the selection coordinator, and
//! exposes the edits that make up one undoable step each.

use crate::history::LayerHistory;
use crate::layer::Layer;
use crate::math::Vec2;
use crate::resource::ResourceHandle;
use crate::selection::{HitTester, SelectionCoordinator};
use crate::settings::CanvasSettings;
use crate::store::{LayerError, LayerStore};

/// Discrete edits on the current selection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EditCommand {
    FlipHorizontal,
    FlipVertical,
    BringToFront,
    SendToBack,
    DeleteSelection,
    Duplicate(Vec2),
    Undo,
    Redo,
}

#[derive(Debug)]
pub struct Scene {
    pub layers: LayerStore,
    pub history: LayerHistory,
    pub selection: SelectionCoordinator,
}

impl Scene {
    pub fn new(settings: &CanvasSettings) -> Self {
        let layers = LayerStore::new(settings.max_layers);
        let mut history = LayerHistory::new(settings.history_depth);
        // Undo can always return to the empty canvas.
        history.push(layers.snapshot());

        Self {
            layers,
            history,
            selection: SelectionCoordinator::new(),
        }
    }

    /// Add a layer on top and make it the only selected one.
    pub fn add_layer(
        &mut self,
        layer: Layer,
        texture: &ResourceHandle,
        mask: &ResourceHandle,
    ) -> Result<(), LayerError> {
        self.layers.add_with_resources(layer, texture, mask)?;
        let top = self.layers.len() - 1;
        self.layers.clear_selection();
        self.layers.change_selection(top, true);

        self.selection.cancel();
        self.selection.request_bbox();
        self.commit();
        Ok(())
    }

    /// Apply `command`. Returns false when it had nothing to act on.
    pub fn apply(&mut self, command: EditCommand) -> bool {
        let center = self.selection.selection_center();
        let has_selection = self.layers.num_selected() > 0;

        match command {
            EditCommand::Undo => return self.undo(),
            EditCommand::Redo => return self.redo(),
            _ if !has_selection => return false,
            EditCommand::FlipHorizontal => self.layers.scale_selection(center, Vec2::new(-1.0, 1.0)),
            EditCommand::FlipVertical => self.layers.scale_selection(center, Vec2::new(1.0, -1.0)),
            EditCommand::BringToFront => self.layers.bring_front_selection(false),
            EditCommand::SendToBack => self.layers.bring_front_selection(true),
            EditCommand::DeleteSelection => self.layers.remove_selection(),
            EditCommand::Duplicate(offset) => {
                if self.layers.duplicate_selection(offset) == 0 {
                    return false;
                }
            }
        }

        tracing::debug!(?command, layers = self.layers.len(), "edit applied");
        self.selection.cancel();
        self.selection.request_bbox();
        self.commit();
        true
    }

    /// Step back one memento. False when already at the oldest.
    pub fn undo(&mut self) -> bool {
        if !self.history.can_undo() {
            return false;
        }
        let Some(memento) = self.history.undo() else {
            return false;
        };
        self.layers.restore_from(memento);
        self.after_time_travel();
        true
    }

    /// Step forward one memento. False when already at the newest.
    pub fn redo(&mut self) -> bool {
        if !self.history.can_redo() {
            return false;
        }
        let Some(memento) = self.history.redo() else {
            return false;
        };
        self.layers.restore_from(memento);
        self.after_time_travel();
        true
    }

    /// Mark the current state as saved.
    pub fn mark_saved(&mut self) {
        self.history.set_checkpoint();
    }

    /// Go back to the saved state, if there is one.
    pub fn revert_to_saved(&mut self) -> bool {
        let Some(memento) = self.history.reset_to_checkpoint() else {
            return false;
        };
        self.layers.restore_from(memento);
        self.after_time_travel();
        true
    }

    /// True when the live state differs from the saved (or initial) state.
    pub fn is_dirty(&self) -> bool {
        !self.history.at_back()
    }

    /// Run one frame of selection work: send pending hit tests and apply results.
    pub fn frame(&mut self, tester: &mut dyn HitTester) -> bool {
        self.selection.dispatch(&self.layers, tester);
        self.selection.poll(&mut self.layers, &mut self.history)
    }

    fn commit(&mut self) {
        self.history.push(self.layers.snapshot());
    }

    fn after_time_travel(&mut self) {
        self.selection.cancel();
        self.selection.request_bbox();
        tracing::debug!(layers = self.layers.len(), selected = self.layers.num_selected(), "history restored");
    }
}
