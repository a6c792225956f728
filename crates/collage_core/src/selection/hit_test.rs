//! CPU hit tester

use super::{HitTester, LayerHit, SelectDispatch, SelectionRequest, SelectionResult};
use crate::layer::Layer;
use rayon::prelude::*;
use std::sync::mpsc::Sender;

/// Classify every layer against a request. Output order matches `layers`.
pub fn classify(layers: &[Layer], request: &SelectionRequest) -> Vec<LayerHit> {
    let area = request.area();
    layers
        .par_iter()
        .map(|layer| {
            let inside = match request.dispatch {
                SelectDispatch::Box => layer.corners().iter().all(|&c| area.contains(c)),
                SelectDispatch::Point => layer.contains_point(request.cursor),
                SelectDispatch::ComputeBbox | SelectDispatch::None => false,
            };
            LayerHit {
                inside,
                bbox: layer.bbox(),
            }
        })
        .collect()
}

/// Hit tester backed by the rayon pool.
///
/// Inline mode answers before `dispatch` returns; background mode copies
/// the layers and answers from a pool thread.
#[derive(Debug, Default)]
pub struct CpuHitTester {
    background: bool,
}

impl CpuHitTester {
    pub fn inline() -> Self {
        Self { background: false }
    }

    pub fn background() -> Self {
        Self { background: true }
    }
}

impl HitTester for CpuHitTester {
    fn dispatch(
        &mut self,
        layers: &[Layer],
        request: SelectionRequest,
        reply: Sender<SelectionResult>,
    ) {
        if !self.background {
            let hits = classify(layers, &request);
            // The coordinator owns the receiver; a send error means it is gone.
            let _ = reply.send(SelectionResult {
                generation: request.generation,
                hits,
            });
            return;
        }

        let layers = layers.to_vec();
        rayon::spawn(move || {
            let hits = classify(&layers, &request);
            let _ = reply.send(SelectionResult {
                generation: request.generation,
                hits,
            });
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{vec2, Vec2};
    use std::sync::mpsc::channel;
    use std::time::Duration;

    fn square(center: Vec2, size: f32) -> Layer {
        Layer::quad(center, vec2(size, 0.0), vec2(0.0, size))
    }

    fn request(dispatch: SelectDispatch, drag_start: Vec2, cursor: Vec2) -> SelectionRequest {
        SelectionRequest {
            generation: 3,
            dispatch,
            cursor,
            drag_start,
        }
    }

    #[test]
    fn box_needs_full_containment() {
        let layers = [square(vec2(5.0, 5.0), 4.0), square(vec2(9.0, 5.0), 4.0)];
        let hits = classify(
            &layers,
            &request(SelectDispatch::Box, vec2(0.0, 0.0), vec2(10.0, 10.0)),
        );
        assert!(hits[0].inside);
        // Pokes out to x = 11.
        assert!(!hits[1].inside);
    }

    #[test]
    fn point_hits_every_layer_underneath() {
        let layers = [square(vec2(0.0, 0.0), 10.0), square(vec2(2.0, 0.0), 10.0), square(vec2(20.0, 0.0), 2.0)];
        let hits = classify(&layers, &request(SelectDispatch::Point, Vec2::ZERO, vec2(1.0, 1.0)));
        let inside: Vec<bool> = hits.iter().map(|h| h.inside).collect();
        assert_eq!(inside, vec![true, true, false]);
    }

    #[test]
    fn bboxes_are_reported_for_every_mode() {
        let layers = [square(vec2(1.0, 1.0), 2.0)];
        let hits = classify(&layers, &request(SelectDispatch::ComputeBbox, Vec2::ZERO, Vec2::ZERO));
        assert!(!hits[0].inside);
        assert_eq!(hits[0].bbox, layers[0].bbox());
    }

    #[test]
    fn inline_replies_immediately() {
        let (tx, rx) = channel();
        let mut tester = CpuHitTester::inline();
        tester.dispatch(
            &[square(Vec2::ZERO, 1.0)],
            request(SelectDispatch::Point, Vec2::ZERO, Vec2::ZERO),
            tx,
        );
        let result = rx.try_recv().unwrap();
        assert_eq!(result.generation, 3);
        assert!(result.hits[0].inside);
    }

    #[test]
    fn background_replies_from_pool() {
        let (tx, rx) = channel();
        let mut tester = CpuHitTester::background();
        tester.dispatch(
            &[square(Vec2::ZERO, 1.0), square(vec2(5.0, 5.0), 1.0)],
            request(SelectDispatch::Box, vec2(-1.0, -1.0), vec2(1.0, 1.0)),
            tx,
        );
        let result = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(result.hits.len(), 2);
        assert!(result.hits[0].inside);
        assert!(!result.hits[1].inside);
    }
}
