//! Gesture state machine and hit-test bookkeeping

use super::{
    Corner, GestureState, HitTester, PointerTarget, SelectDispatch, SelectionRequest,
    SelectionResult,
};
use crate::history::LayerHistory;
use crate::math::{Bbox, Vec2};
use crate::store::LayerStore;
use std::sync::mpsc::{channel, Receiver, Sender};

/// Request sent to the hit tester and not answered yet.
#[derive(Debug, Clone, Copy)]
struct InFlight {
    generation: u64,
    dispatch: SelectDispatch,
}

/// Turns pointer input and hit-test results into selection and transform edits.
///
/// All positions are in canvas space.
#[derive(Debug)]
pub struct SelectionCoordinator {
    state: GestureState,
    pointer_down: bool,
    drag_start: Vec2,
    last_pos: Vec2,
    pending: SelectDispatch,
    awaiting: Option<InFlight>,
    generation: u64,
    selection_bbox: Bbox,
    selection_center: Vec2,
    /// A transform edited the store during this gesture.
    geometry_changed: bool,
    /// A hit result flipped selection bits since the last commit.
    selection_changed: bool,
    reply_tx: Sender<SelectionResult>,
    reply_rx: Receiver<SelectionResult>,
}

impl SelectionCoordinator {
    pub fn new() -> Self {
        let (reply_tx, reply_rx) = channel();
        Self {
            state: GestureState::Idle,
            pointer_down: false,
            drag_start: Vec2::ZERO,
            last_pos: Vec2::ZERO,
            pending: SelectDispatch::None,
            awaiting: None,
            generation: 0,
            selection_bbox: Bbox::EMPTY,
            selection_center: Vec2::ZERO,
            geometry_changed: false,
            selection_changed: false,
            reply_tx,
            reply_rx,
        }
    }

    pub fn state(&self) -> GestureState {
        self.state
    }

    pub fn is_pointer_down(&self) -> bool {
        self.pointer_down
    }

    /// The dispatch that will be sent on the next `dispatch` call.
    pub fn pending(&self) -> SelectDispatch {
        self.pending
    }

    /// No hit test is in flight.
    pub fn is_ready(&self) -> bool {
        self.awaiting.is_none()
    }

    /// Generation of the most recently issued request.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn selection_bbox(&self) -> Bbox {
        self.selection_bbox
    }

    pub fn selection_center(&self) -> Vec2 {
        self.selection_center
    }

    /// Sender for hit testers that answer out of band (e.g. GPU readback).
    pub fn reply_sender(&self) -> Sender<SelectionResult> {
        self.reply_tx.clone()
    }

    /// Ask for the selection bounds to be recomputed on the next frame.
    pub fn request_bbox(&mut self) {
        if self.pending == SelectDispatch::None {
            self.pending = SelectDispatch::ComputeBbox;
        }
    }

    /// Forget the in-flight request; its result will be dropped when it arrives.
    pub fn cancel(&mut self) {
        if let Some(in_flight) = self.awaiting.take() {
            tracing::trace!(generation = in_flight.generation, "hit test cancelled");
        }
    }

    /// What a press at `pos` would grab, given the current selection box.
    ///
    /// Handles only exist while something is selected and no hit test is in
    /// flight. The rotate handle sits `rotate_handle_height` above the top
    /// edge; every handle is a disc of `handle_radius`.
    pub fn target_at(&self, pos: Vec2, handle_radius: f32, rotate_handle_height: f32) -> PointerTarget {
        if self.selection_bbox.is_empty() || !self.is_ready() || self.pointer_down {
            return PointerTarget::Canvas;
        }

        let bbox = &self.selection_bbox;
        let rotate_handle = Vec2::new(bbox.center().x, bbox.min.y - rotate_handle_height);
        if pos.distance(rotate_handle) < handle_radius {
            return PointerTarget::RotateHandle;
        }

        for corner in [Corner::BottomRight, Corner::BottomLeft, Corner::TopRight, Corner::TopLeft] {
            if pos.distance(corner.of(bbox)) < handle_radius {
                return PointerTarget::ScaleHandle(corner);
            }
        }

        if bbox.contains(pos) {
            PointerTarget::MoveHandle
        } else {
            PointerTarget::Canvas
        }
    }

    /// Start a gesture at `pos`.
    ///
    /// Requests left over from the previous gesture are dropped, sent or not.
    /// If that gesture already changed the selection but its final result
    /// never arrived, the change is committed here.
    pub fn pointer_down(
        &mut self,
        pos: Vec2,
        target: PointerTarget,
        store: &LayerStore,
        history: &mut LayerHistory,
    ) {
        self.cancel();
        self.pending = SelectDispatch::None;
        if self.selection_changed {
            history.push(store.snapshot());
            tracing::debug!(selected = store.num_selected(), "unfinished selection committed");
        }

        self.state = target.gesture();
        self.pointer_down = true;
        self.drag_start = pos;
        self.last_pos = pos;
        self.geometry_changed = false;
        self.selection_changed = false;
    }

    pub fn pointer_move(&mut self, pos: Vec2, store: &mut LayerStore) {
        let delta = pos - self.last_pos;
        self.last_pos = pos;
        if !self.pointer_down || delta == Vec2::ZERO {
            return;
        }

        match self.state {
            GestureState::Idle => {}
            GestureState::Select => self.pending = SelectDispatch::Box,
            GestureState::Move => {
                store.move_selection(delta);
                self.selection_bbox = Bbox::new(self.selection_bbox.min + delta, self.selection_bbox.max + delta);
                self.selection_center += delta;
                self.geometry_changed |= store.num_selected() > 0;
            }
            GestureState::Rotate => {
                let p1 = pos - self.selection_center;
                let p2 = p1 - delta;
                let angle = p2.perp_dot(p1).atan2(p2.dot(p1));
                if angle != 0.0 {
                    store.rotate_selection(self.selection_center, angle);
                    self.geometry_changed |= store.num_selected() > 0;
                }
            }
            GestureState::Scale(_) => {
                let p1 = pos - self.selection_center;
                let p2 = p1 - delta;
                let (from, to) = (p2.length(), p1.length());
                if from <= f32::EPSILON || to <= f32::EPSILON {
                    return;
                }

                let mut orientation = Vec2::ONE;
                if p1.x * p2.x < 0.0 {
                    orientation.x = -1.0;
                }
                if p1.y * p2.y < 0.0 {
                    orientation.y = -1.0;
                }
                store.scale_selection(self.selection_center, Vec2::splat(to / from) * orientation);
                self.geometry_changed |= store.num_selected() > 0;
            }
        }
    }

    pub fn pointer_up(&mut self, pos: Vec2, store: &LayerStore, history: &mut LayerHistory) {
        self.last_pos = pos;
        let gesture = self.state;

        if gesture.is_transform() && self.geometry_changed {
            history.push(store.snapshot());
            tracing::debug!(?gesture, "transform committed");
        }

        if pos == self.drag_start {
            self.pending = SelectDispatch::Point;
        } else if gesture.is_transform() {
            self.pending = SelectDispatch::ComputeBbox;
        } else if gesture == GestureState::Select {
            self.pending = SelectDispatch::Box;
        }

        self.pointer_down = false;
        self.geometry_changed = false;
        self.state = GestureState::Idle;
    }

    /// Send the pending request, if any, to `tester`. Call once per frame.
    pub fn dispatch(&mut self, store: &LayerStore, tester: &mut dyn HitTester) {
        if self.pending == SelectDispatch::None || self.awaiting.is_some() {
            return;
        }
        if store.is_empty() {
            self.pending = SelectDispatch::None;
            self.selection_bbox = Bbox::EMPTY;
            return;
        }

        self.generation += 1;
        let request = SelectionRequest {
            generation: self.generation,
            dispatch: self.pending,
            cursor: self.last_pos,
            drag_start: self.drag_start,
        };
        self.awaiting = Some(InFlight {
            generation: self.generation,
            dispatch: self.pending,
        });
        self.pending = SelectDispatch::None;

        tracing::trace!(generation = request.generation, dispatch = ?request.dispatch, "hit test dispatched");
        tester.dispatch(store.data(), request, self.reply_tx.clone());
    }

    /// Apply the answer to the awaited request, if it has arrived. Never blocks.
    ///
    /// Returns true when a result was applied.
    pub fn poll(&mut self, store: &mut LayerStore, history: &mut LayerHistory) -> bool {
        let mut applied = false;
        while let Ok(result) = self.reply_rx.try_recv() {
            let Some(in_flight) = self.awaiting.filter(|f| f.generation == result.generation) else {
                tracing::trace!(generation = result.generation, "stale hit test result dropped");
                continue;
            };
            self.awaiting = None;

            if result.hits.len() != store.len() {
                // The store changed shape under the request; ask again.
                tracing::debug!(
                    generation = result.generation,
                    hits = result.hits.len(),
                    layers = store.len(),
                    "hit test result does not match store, retrying"
                );
                if self.pending == SelectDispatch::None {
                    self.pending = in_flight.dispatch;
                }
                continue;
            }

            self.apply(in_flight.dispatch, &result, store);
            applied = true;

            let commits = match in_flight.dispatch {
                SelectDispatch::Point => true,
                SelectDispatch::Box => !self.pointer_down,
                SelectDispatch::ComputeBbox | SelectDispatch::None => false,
            };
            if commits && self.selection_changed {
                history.push(store.snapshot());
                self.selection_changed = false;
                tracing::debug!(selected = store.num_selected(), "selection committed");
            }
        }
        applied
    }

    fn apply(&mut self, dispatch: SelectDispatch, result: &SelectionResult, store: &mut LayerStore) {
        let mut bbox = Bbox::EMPTY;
        let mut changed = false;

        match dispatch {
            SelectDispatch::Box => {
                for (index, hit) in result.hits.iter().enumerate() {
                    changed |= store.change_selection(index, hit.inside);
                    if hit.inside {
                        bbox = bbox.union(hit.bbox);
                    }
                }
            }
            SelectDispatch::Point => {
                // Topmost hit wins.
                let mut picked = false;
                for (index, hit) in result.hits.iter().enumerate().rev() {
                    let select = hit.inside && !picked;
                    changed |= store.change_selection(index, select);
                    if select {
                        picked = true;
                        bbox = hit.bbox;
                    }
                }
            }
            SelectDispatch::ComputeBbox | SelectDispatch::None => {
                for (index, hit) in result.hits.iter().enumerate() {
                    if store.is_selected(index) {
                        bbox = bbox.union(hit.bbox);
                    }
                }
            }
        }

        self.selection_changed |= changed;
        self.selection_bbox = bbox;
        self.selection_center = if bbox.is_empty() { Vec2::ZERO } else { bbox.center() };
    }
}

impl Default for SelectionCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::Layer;
    use crate::math::vec2;
    use crate::selection::{CpuHitTester, LayerHit};

    fn square(center: Vec2, size: f32) -> Layer {
        Layer::quad(center, vec2(size, 0.0), vec2(0.0, size))
    }

    fn scene() -> (LayerStore, LayerHistory, SelectionCoordinator) {
        let mut store = LayerStore::new(8);
        store.add(square(vec2(5.0, 5.0), 4.0)).unwrap();
        store.add(square(vec2(20.0, 5.0), 4.0)).unwrap();
        store.add(square(vec2(6.0, 6.0), 4.0)).unwrap();
        let mut history = LayerHistory::new(16);
        history.push(store.snapshot());
        (store, history, SelectionCoordinator::new())
    }

    fn frame(coord: &mut SelectionCoordinator, store: &mut LayerStore, history: &mut LayerHistory) -> bool {
        let mut tester = CpuHitTester::inline();
        coord.dispatch(store, &mut tester);
        coord.poll(store, history)
    }

    fn click(coord: &mut SelectionCoordinator, store: &mut LayerStore, history: &mut LayerHistory, pos: Vec2) {
        coord.pointer_down(pos, PointerTarget::Canvas, store, history);
        coord.pointer_up(pos, store, history);
        frame(coord, store, history);
    }

    /// Hit tester that records requests and never answers.
    #[derive(Default)]
    struct Recorder {
        requests: Vec<SelectionRequest>,
        replies: Vec<Sender<SelectionResult>>,
    }

    impl HitTester for Recorder {
        fn dispatch(&mut self, _layers: &[Layer], request: SelectionRequest, reply: Sender<SelectionResult>) {
            self.requests.push(request);
            self.replies.push(reply);
        }
    }

    #[test]
    fn click_picks_topmost_and_commits() {
        let (mut store, mut history, mut coord) = scene();
        click(&mut coord, &mut store, &mut history, vec2(5.5, 5.5));

        assert!(store.is_selected(2));
        assert!(!store.is_selected(0));
        assert_eq!(store.num_selected(), 1);
        assert_eq!(history.len(), 2);
        assert_eq!(coord.selection_bbox(), store.data()[2].bbox());
        assert_eq!(coord.selection_center(), vec2(6.0, 6.0));

        // Same click again changes nothing and commits nothing.
        click(&mut coord, &mut store, &mut history, vec2(5.5, 5.5));
        assert_eq!(history.len(), 2);

        // Empty canvas clears the selection.
        click(&mut coord, &mut store, &mut history, vec2(50.0, 50.0));
        assert_eq!(store.num_selected(), 0);
        assert!(coord.selection_bbox().is_empty());
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn box_drag_selects_contained_layers_once() {
        let (mut store, mut history, mut coord) = scene();
        coord.pointer_down(vec2(0.0, 0.0), PointerTarget::Canvas, &store, &mut history);
        coord.pointer_move(vec2(10.0, 10.0), &mut store);
        assert_eq!(coord.pending(), SelectDispatch::Box);

        // Live feedback while dragging, no history entry yet.
        assert!(frame(&mut coord, &mut store, &mut history));
        assert_eq!(store.num_selected(), 2);
        assert_eq!(history.len(), 1);

        coord.pointer_up(vec2(10.0, 10.0), &store, &mut history);
        assert!(frame(&mut coord, &mut store, &mut history));
        assert!(store.is_selected(0) && store.is_selected(2));
        assert!(!store.is_selected(1));
        assert_eq!(history.len(), 2);
        assert_eq!(coord.selection_bbox(), Bbox::new(vec2(3.0, 3.0), vec2(8.0, 8.0)));
    }

    #[test]
    fn stale_results_are_discarded() {
        let (mut store, mut history, mut coord) = scene();
        let mut recorder = Recorder::default();

        coord.pointer_down(vec2(5.5, 5.5), PointerTarget::Canvas, &store, &mut history);
        coord.pointer_up(vec2(5.5, 5.5), &store, &mut history);
        coord.dispatch(&store, &mut recorder);
        assert!(!coord.is_ready());

        // A new gesture supersedes the in-flight pick.
        coord.pointer_down(vec2(20.0, 5.0), PointerTarget::Canvas, &store, &mut history);
        coord.pointer_up(vec2(20.0, 5.0), &store, &mut history);
        assert!(coord.is_ready());
        coord.dispatch(&store, &mut recorder);

        let stale = recorder.requests[0];
        let fresh = recorder.requests[1];
        assert!(fresh.generation > stale.generation);

        // Answer the stale request as if everything were hit.
        let everything = SelectionResult {
            generation: stale.generation,
            hits: store
                .data()
                .iter()
                .map(|l| LayerHit { inside: true, bbox: l.bbox() })
                .collect(),
        };
        recorder.replies[0].send(everything).unwrap();
        assert!(!coord.poll(&mut store, &mut history));
        assert_eq!(store.num_selected(), 0);
        assert!(!coord.is_ready());

        let answer = SelectionResult {
            generation: fresh.generation,
            hits: crate::selection::classify(store.data(), &fresh),
        };
        recorder.replies[1].send(answer).unwrap();
        assert!(coord.poll(&mut store, &mut history));
        assert!(store.is_selected(1));
        assert_eq!(store.num_selected(), 1);
    }

    #[test]
    fn unfinished_box_selection_is_committed_by_next_press() {
        let (mut store, mut history, mut coord) = scene();
        coord.pointer_down(vec2(0.0, 0.0), PointerTarget::Canvas, &store, &mut history);
        coord.pointer_move(vec2(10.0, 10.0), &mut store);
        frame(&mut coord, &mut store, &mut history);
        coord.pointer_up(vec2(10.0, 10.0), &store, &mut history);
        assert_eq!(store.num_selected(), 2);
        assert_eq!(history.len(), 1);
        assert_eq!(coord.pending(), SelectDispatch::Box);

        // Next click lands before the final box request went out.
        click(&mut coord, &mut store, &mut history, vec2(50.0, 50.0));
        assert_eq!(store.num_selected(), 0);
        assert_eq!(history.len(), 3);

        let boxed = history.undo().unwrap();
        assert_eq!(boxed.num_selected(), 2);
        assert!(boxed.is_selected(0) && boxed.is_selected(2));
    }

    #[test]
    fn press_drops_requests_of_previous_gesture() {
        let (mut store, mut history, mut coord) = scene();
        let mut recorder = Recorder::default();
        click(&mut coord, &mut store, &mut history, vec2(20.0, 5.0));
        assert!(store.is_selected(1));
        let committed = history.len();

        // Click empty canvas, then grab the selection before any frame runs.
        coord.pointer_down(vec2(50.0, 50.0), PointerTarget::Canvas, &store, &mut history);
        coord.pointer_up(vec2(50.0, 50.0), &store, &mut history);
        assert_eq!(coord.pending(), SelectDispatch::Point);

        coord.pointer_down(vec2(20.0, 5.0), PointerTarget::MoveHandle, &store, &mut history);
        assert_eq!(coord.pending(), SelectDispatch::None);
        coord.pointer_move(vec2(21.0, 5.0), &mut store);
        coord.dispatch(&store, &mut recorder);
        assert!(recorder.requests.is_empty());

        coord.pointer_up(vec2(21.0, 5.0), &store, &mut history);
        assert!(store.is_selected(1));
        assert_eq!(history.len(), committed + 1);
        assert_eq!(coord.pending(), SelectDispatch::ComputeBbox);
    }

    #[test]
    fn one_request_in_flight_at_a_time() {
        let (mut store, mut history, mut coord) = scene();
        let mut recorder = Recorder::default();

        coord.pointer_down(vec2(0.0, 0.0), PointerTarget::Canvas, &store, &mut history);
        coord.pointer_move(vec2(4.0, 4.0), &mut store);
        coord.dispatch(&store, &mut recorder);
        coord.pointer_move(vec2(8.0, 8.0), &mut store);
        coord.dispatch(&store, &mut recorder);
        assert_eq!(recorder.requests.len(), 1);
        assert_eq!(coord.pending(), SelectDispatch::Box);

        let first = recorder.requests[0];
        recorder.replies[0]
            .send(SelectionResult {
                generation: first.generation,
                hits: crate::selection::classify(store.data(), &first),
            })
            .unwrap();
        coord.poll(&mut store, &mut history);
        coord.dispatch(&store, &mut recorder);
        assert_eq!(recorder.requests.len(), 2);
        assert_eq!(recorder.requests[1].cursor, vec2(8.0, 8.0));
    }

    #[test]
    fn move_gesture_commits_one_memento() {
        let (mut store, mut history, mut coord) = scene();
        click(&mut coord, &mut store, &mut history, vec2(20.0, 5.0));
        assert_eq!(history.len(), 2);

        let target = coord.target_at(vec2(20.0, 5.0), 1.0, 4.0);
        assert_eq!(target, PointerTarget::MoveHandle);

        coord.pointer_down(vec2(20.0, 5.0), target, &store, &mut history);
        for step in 1..=5 {
            coord.pointer_move(vec2(20.0 + step as f32, 5.0), &mut store);
        }
        coord.pointer_up(vec2(25.0, 5.0), &store, &mut history);
        assert_eq!(store.data()[1].offset, vec2(25.0, 5.0));
        assert_eq!(history.len(), 3);
        assert_eq!(coord.pending(), SelectDispatch::ComputeBbox);

        frame(&mut coord, &mut store, &mut history);
        assert_eq!(coord.selection_center(), vec2(25.0, 5.0));
        // Recomputing bounds is not an edit.
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn rotate_gesture_follows_pointer() {
        let (mut store, mut history, mut coord) = scene();
        click(&mut coord, &mut store, &mut history, vec2(20.0, 5.0));

        // Sweep a quarter turn around the centre (20, 5).
        coord.pointer_down(vec2(20.0, -5.0), PointerTarget::RotateHandle, &store, &mut history);
        for step in 1..=10 {
            let angle = std::f32::consts::FRAC_PI_2 * step as f32 / 10.0;
            let pos = vec2(20.0, 5.0) + Vec2::from_angle(angle).rotate(vec2(0.0, -10.0));
            coord.pointer_move(pos, &mut store);
        }
        coord.pointer_up(vec2(30.0, 5.0), &store, &mut history);

        let layer = store.data()[1];
        assert!(layer.basis_a.abs_diff_eq(vec2(0.0, 4.0), 1e-3));
        assert!(layer.offset.abs_diff_eq(vec2(20.0, 5.0), 1e-3));
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn scale_gesture_mirrors_when_crossing_centre() {
        let (mut store, mut history, mut coord) = scene();
        click(&mut coord, &mut store, &mut history, vec2(20.0, 5.0));

        coord.pointer_down(vec2(22.0, 7.0), PointerTarget::ScaleHandle(Corner::BottomRight), &store, &mut history);
        coord.pointer_move(vec2(24.0, 9.0), &mut store);
        assert!(store.data()[1].basis_a.abs_diff_eq(vec2(8.0, 0.0), 1e-4));

        // Cross to the other side of the centre on x only.
        coord.pointer_move(vec2(16.0, 9.0), &mut store);
        let layer = store.data()[1];
        assert!(layer.basis_a.x < 0.0);
        assert!(layer.basis_b.y > 0.0);

        coord.pointer_up(vec2(16.0, 9.0), &store, &mut history);
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn transform_without_selection_commits_nothing() {
        let (mut store, mut history, mut coord) = scene();
        coord.pointer_down(vec2(0.0, 0.0), PointerTarget::MoveHandle, &store, &mut history);
        coord.pointer_move(vec2(3.0, 0.0), &mut store);
        coord.pointer_up(vec2(3.0, 0.0), &store, &mut history);
        assert_eq!(history.len(), 1);
        assert_eq!(store.data()[0].offset, vec2(5.0, 5.0));
    }

    #[test]
    fn handles_sit_on_selection_box() {
        let (mut store, mut history, mut coord) = scene();
        assert_eq!(coord.target_at(vec2(5.0, 5.0), 1.0, 4.0), PointerTarget::Canvas);

        click(&mut coord, &mut store, &mut history, vec2(20.0, 5.0));
        // Selection box is (18, 3)..(22, 7).
        assert_eq!(coord.target_at(vec2(20.0, -1.0), 1.0, 4.0), PointerTarget::RotateHandle);
        assert_eq!(
            coord.target_at(vec2(18.2, 3.2), 1.0, 4.0),
            PointerTarget::ScaleHandle(Corner::TopLeft)
        );
        assert_eq!(
            coord.target_at(vec2(22.0, 7.5), 1.0, 4.0),
            PointerTarget::ScaleHandle(Corner::BottomRight)
        );
        assert_eq!(coord.target_at(vec2(20.0, 5.0), 1.0, 4.0), PointerTarget::MoveHandle);
        assert_eq!(coord.target_at(vec2(40.0, 5.0), 1.0, 4.0), PointerTarget::Canvas);
    }

    #[test]
    fn empty_store_drops_requests() {
        let mut store = LayerStore::new(4);
        let mut history = LayerHistory::new(4);
        let mut coord = SelectionCoordinator::new();
        click(&mut coord, &mut store, &mut history, Vec2::ZERO);
        assert_eq!(coord.pending(), SelectDispatch::None);
        assert!(coord.is_ready());
        assert_eq!(coord.generation(), 0);
    }

    #[test]
    fn mismatched_result_is_retried() {
        let (mut store, mut history, mut coord) = scene();
        let mut recorder = Recorder::default();
        coord.request_bbox();
        coord.dispatch(&store, &mut recorder);

        store.remove(0).unwrap();
        let request = recorder.requests[0];
        recorder.replies[0]
            .send(SelectionResult {
                generation: request.generation,
                hits: Vec::new(),
            })
            .unwrap();
        assert!(!coord.poll(&mut store, &mut history));
        assert!(coord.is_ready());
        assert_eq!(coord.pending(), SelectDispatch::ComputeBbox);
    }
}
