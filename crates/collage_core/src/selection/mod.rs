//! Selection dispatch
//!
//! Pointer gestures turn into selection requests that are answered by a hit
//! tester running somewhere else (the GPU or a worker pool). Results come
//! back over a channel tagged with the generation of the request, and only
//! the result for the most recent request is ever applied.

mod coordinator;
mod hit_test;

pub use coordinator::SelectionCoordinator;
pub use hit_test::{classify, CpuHitTester};

use crate::layer::Layer;
use crate::math::{Bbox, Vec2};
use std::sync::mpsc::Sender;

/// Corner of the selection box, named in canvas space (y grows downward).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Corner {
    TopLeft,
    BottomRight,
    TopRight,
    BottomLeft,
}

impl Corner {
    pub const ALL: [Corner; 4] = [
        Corner::TopLeft,
        Corner::BottomRight,
        Corner::TopRight,
        Corner::BottomLeft,
    ];

    pub fn of(self, bbox: &Bbox) -> Vec2 {
        match self {
            Corner::TopLeft => bbox.min,
            Corner::BottomRight => bbox.max,
            Corner::TopRight => Vec2::new(bbox.max.x, bbox.min.y),
            Corner::BottomLeft => Vec2::new(bbox.min.x, bbox.max.y),
        }
    }
}

/// Pointer gesture in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GestureState {
    #[default]
    Idle,
    Select,
    Move,
    Rotate,
    Scale(Corner),
}

impl GestureState {
    /// Gestures that edit layer geometry.
    pub fn is_transform(self) -> bool {
        matches!(self, Self::Move | Self::Rotate | Self::Scale(_))
    }
}

/// What the pointer went down on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerTarget {
    Canvas,
    MoveHandle,
    RotateHandle,
    ScaleHandle(Corner),
}

impl PointerTarget {
    fn gesture(self) -> GestureState {
        match self {
            Self::Canvas => GestureState::Select,
            Self::MoveHandle => GestureState::Move,
            Self::RotateHandle => GestureState::Rotate,
            Self::ScaleHandle(corner) => GestureState::Scale(corner),
        }
    }
}

/// Kind of hit test to run. The discriminants are shared with the shaders.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectDispatch {
    /// Layers fully inside the rubber-band box.
    Box = 0,
    /// Topmost layer under the cursor.
    Point = 1,
    /// Bounds of the current selection only.
    ComputeBbox = 2,
    #[default]
    None = 3,
}

/// One hit test, in canvas space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectionRequest {
    pub generation: u64,
    pub dispatch: SelectDispatch,
    pub cursor: Vec2,
    pub drag_start: Vec2,
}

impl SelectionRequest {
    /// The rubber-band box spanned by the drag.
    pub fn area(&self) -> Bbox {
        Bbox::from_corners(self.drag_start, self.cursor)
    }
}

/// Per-layer answer of a hit test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerHit {
    /// Inside the box (`Box`) or under the cursor (`Point`).
    pub inside: bool,
    pub bbox: Bbox,
}

/// Hit test answer, one entry per layer in store order.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionResult {
    pub generation: u64,
    pub hits: Vec<LayerHit>,
}

/// Something that can answer selection requests asynchronously.
///
/// Implementations must send exactly one [`SelectionResult`] per request,
/// carrying the request's generation, and may do so from any thread.
pub trait HitTester {
    fn dispatch(
        &mut self,
        layers: &[Layer],
        request: SelectionRequest,
        reply: Sender<SelectionResult>,
    );
}
