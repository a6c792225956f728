//! Selection readback
//!
//! The selection compute pass writes one [`GpuSelection`] per triangle, in
//! layer order. The result is copied into a mappable staging buffer, mapped
//! asynchronously, and reduced on the CPU to one hit per layer.

use crate::RenderError;
use bytemuck::{Pod, Zeroable};
use collage_core::math::{vec2, Bbox};
use collage_core::selection::{LayerHit, SelectDispatch, SelectionResult};
use collage_core::Layer;
use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};

/// Per-triangle output of the selection pass.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuSelection {
    /// `[max.x, max.y, min.x, min.y]` of the triangle in canvas space.
    pub bbox: [f32; 4],
    pub flags: u32,
    pub _pad: [u32; 3],
}

impl GpuSelection {
    pub const INSIDE_BOX: u32 = 1;
    pub const OUTSIDE_BOX: u32 = 2;

    pub fn bbox(&self) -> Bbox {
        Bbox::new(vec2(self.bbox[2], self.bbox[3]), vec2(self.bbox[0], self.bbox[1]))
    }

    #[inline]
    pub fn is_inside(&self) -> bool {
        self.flags == Self::INSIDE_BOX
    }
}

/// Reduce per-triangle records to per-layer hits.
///
/// `Point` counts a layer as hit when any of its triangles is; every other
/// dispatch needs all of them. Returns `None` when `records` is shorter
/// than the layers' triangle total.
pub fn decode_hits(records: &[GpuSelection], layers: &[Layer], dispatch: SelectDispatch) -> Option<Vec<LayerHit>> {
    let mut offset = 0usize;
    let mut hits = Vec::with_capacity(layers.len());

    for layer in layers {
        let len = layer.mesh_len as usize;
        let triangles = records.get(offset..offset + len)?;
        offset += len;

        let bbox = triangles
            .iter()
            .fold(Bbox::EMPTY, |bbox, triangle| bbox.union(triangle.bbox()));
        let inside = match dispatch {
            SelectDispatch::Point => triangles.iter().any(GpuSelection::is_inside),
            SelectDispatch::Box => !triangles.is_empty() && triangles.iter().all(GpuSelection::is_inside),
            SelectDispatch::ComputeBbox | SelectDispatch::None => false,
        };
        hits.push(LayerHit { inside, bbox });
    }
    Some(hits)
}

type MapResult = Result<(), wgpu::BufferAsyncError>;

struct InFlight {
    generation: u64,
    dispatch: SelectDispatch,
    layers: Vec<Layer>,
    triangles: usize,
    mapped: Receiver<MapResult>,
}

impl InFlight {
    fn byte_len(&self) -> u64 {
        (self.triangles * std::mem::size_of::<GpuSelection>()) as u64
    }

    fn result(&self, records: &[GpuSelection]) -> SelectionResult {
        // Records are sized from the same layers, so decoding cannot run short.
        let hits = decode_hits(records, &self.layers, self.dispatch).unwrap_or_default();
        SelectionResult {
            generation: self.generation,
            hits,
        }
    }
}

/// Readback bookkeeping that does not touch the buffer.
struct ReadbackState {
    capacity: usize,
    in_flight: Option<InFlight>,
}

impl ReadbackState {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            in_flight: None,
        }
    }

    /// Record a new readback and return the sender its map completion goes to.
    fn begin(
        &mut self,
        generation: u64,
        dispatch: SelectDispatch,
        layers: &[Layer],
    ) -> Result<(u64, Sender<MapResult>), RenderError> {
        if self.in_flight.is_some() {
            return Err(RenderError::ReadbackBusy);
        }

        let triangles: usize = layers.iter().map(|l| l.mesh_len as usize).sum();
        if triangles > self.capacity {
            return Err(RenderError::TooManyTriangles {
                count: triangles,
                capacity: self.capacity,
            });
        }

        let (tx, rx) = channel();
        let in_flight = InFlight {
            generation,
            dispatch,
            layers: layers.to_vec(),
            triangles,
            mapped: rx,
        };
        let size = in_flight.byte_len();
        self.in_flight = Some(in_flight);
        Ok((size, tx))
    }

    /// The readback, once its map has completed. Clears the slot whether the
    /// map succeeded or failed.
    fn take_mapped(&mut self) -> Result<Option<InFlight>, RenderError> {
        let Some(in_flight) = self.in_flight.as_ref() else {
            return Ok(None);
        };
        let mapped = match in_flight.mapped.try_recv() {
            Ok(mapped) => mapped,
            Err(TryRecvError::Empty) => return Ok(None),
            Err(TryRecvError::Disconnected) => Err(wgpu::BufferAsyncError),
        };

        let in_flight = self.in_flight.take();
        mapped?;
        Ok(in_flight)
    }
}

/// Staging buffer the selection output is copied into for CPU access.
///
/// Results go to the selection coordinator through [`Self::forward`] with the
/// sender from `SelectionCoordinator::reply_sender`. The generation passed to
/// [`Self::begin`] is the one of the request being answered.
pub struct SelectionReadback {
    buffer: wgpu::Buffer,
    state: ReadbackState,
}

impl SelectionReadback {
    pub fn new(device: &wgpu::Device, max_triangles: usize) -> Self {
        let capacity = max_triangles.max(1);
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Selection Readback"),
            size: (capacity * std::mem::size_of::<GpuSelection>()) as u64,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        Self {
            buffer,
            state: ReadbackState::new(capacity),
        }
    }

    /// Copy destination for the selection pass output.
    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    pub fn is_busy(&self) -> bool {
        self.state.in_flight.is_some()
    }

    /// Start mapping after the copy into [`Self::buffer`] was submitted.
    ///
    /// `layers` must be the layers the pass ran over; they are kept to decode
    /// the result.
    pub fn begin(&mut self, generation: u64, dispatch: SelectDispatch, layers: &[Layer]) -> Result<(), RenderError> {
        let (size, tx) = self.state.begin(generation, dispatch, layers)?;
        if size > 0 {
            self.buffer
                .slice(..size)
                .map_async(wgpu::MapMode::Read, move |result| {
                    let _ = tx.send(result);
                });
        } else {
            let _ = tx.send(Ok(()));
        }

        tracing::trace!(generation, bytes = size, "selection readback started");
        Ok(())
    }

    /// Check for map completion without blocking.
    ///
    /// Returns the decoded result once, after which a new readback can begin.
    pub fn poll(&mut self, device: &wgpu::Device) -> Result<Option<SelectionResult>, RenderError> {
        if !self.is_busy() {
            return Ok(None);
        }

        let _ = device.poll(wgpu::Maintain::Poll);
        let Some(in_flight) = self.state.take_mapped()? else {
            return Ok(None);
        };

        let size = in_flight.byte_len();
        if size == 0 {
            return Ok(Some(in_flight.result(&[])));
        }

        let result = {
            let view = self.buffer.slice(..size).get_mapped_range();
            in_flight.result(bytemuck::cast_slice(&view))
        };
        self.buffer.unmap();
        Ok(Some(result))
    }

    /// [`Self::poll`], sending a finished result to `reply`.
    ///
    /// Returns true when a result was sent. A dropped receiver is not an error.
    pub fn forward(&mut self, device: &wgpu::Device, reply: &Sender<SelectionResult>) -> Result<bool, RenderError> {
        match self.poll(device)? {
            Some(result) => {
                let _ = reply.send(result);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
