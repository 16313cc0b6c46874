//! GPU picking on combined meshes.
//!
//! A pick renders the combined geometry once more with a dedicated program
//! into two float targets: world position plus instance index, and world
//! normal. Only the pixel under the cursor is shaded (a 1x1 scissor) and only
//! that pixel is read back.
//!
//! The picker is a small state machine driven by the frame loop:
//!
//! 1. [`GpuPicker::pick_async`] validates the request, prepares the target and
//!    moves from `Idle` to `Rendering`. It hands out a [`PickTicket`].
//! 2. [`GpuPicker::on_frame`] renders the pick pass. If no draw call ran (the
//!    pipeline is not ready yet) the pick stays in `Rendering` and is retried
//!    next frame. Otherwise the readback starts and the picker is `Reading`.
//! 3. Once the readback completes the ticket resolves and the picker is
//!    `Idle` again.
//!
//! At most one pick is in flight. Requests made meanwhile resolve to `None`
//! right away and leave the running pick alone.

use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use futures::{FutureExt, channel::oneshot};
use log::{debug, info, warn};

use crate::data_structures::instance::InstanceNode;

/// Render size and pixel density of the view being picked in.
///
/// `width` and `height` are in device pixels; pick coordinates are in logical
/// pixels and scaled by `device_pixel_ratio`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    pub device_pixel_ratio: f32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            device_pixel_ratio: 1.0,
        }
    }

    pub fn with_device_pixel_ratio(mut self, device_pixel_ratio: f32) -> Self {
        self.device_pixel_ratio = device_pixel_ratio;
        self
    }
}

/// Where row 0 of a render target is.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TargetOrigin {
    /// wgpu and WebGPU.
    #[default]
    TopLeft,
    /// OpenGL style targets; pick rows are flipped.
    BottomLeft,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScissorRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// The two texels read back for one pick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PickSample {
    /// World position in `xyz`, instance index in `w`.
    pub position_index: [f32; 4],
    /// World normal in `xyz`.
    pub normal: [f32; 4],
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Readback {
    Pending,
    Ready(PickSample),
    Failed,
}

/// The rendering side of the picker.
pub trait PickBackend {
    fn origin(&self) -> TargetOrigin {
        TargetOrigin::TopLeft
    }

    /// Whether any combined geometry is registered for picking.
    fn has_geometry(&self) -> bool;

    /// Make sure a target of this size exists, reusing the current one if the
    /// size matches.
    fn prepare_target(&mut self, width: u32, height: u32);

    /// Run the pick pass clipped to `scissor`. Returns the number of draw
    /// calls that actually executed.
    fn render(&mut self, scissor: ScissorRect) -> u32;

    /// Start copying the texel at `(x, y)` of both targets to the CPU.
    fn begin_readback(&mut self, x: u32, y: u32);

    fn poll_readback(&mut self) -> Readback;
}

#[derive(Clone, Debug, PartialEq)]
pub struct PickResult {
    pub world_position: cgmath::Vector3<f32>,
    pub world_normal: cgmath::Vector3<f32>,
    pub instance_index: u32,
    pub instance: InstanceNode,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PickPhase {
    Idle,
    Rendering,
    Reading,
}

struct PendingPick {
    x: u32,
    y: u32,
    sender: oneshot::Sender<Option<PickResult>>,
}

enum PickState {
    Idle,
    Rendering(PendingPick),
    Reading(PendingPick),
}

/// Future of one pick request.
#[must_use = "a pick ticket does nothing unless awaited or polled"]
pub struct PickTicket {
    receiver: Option<oneshot::Receiver<Option<PickResult>>>,
}

impl PickTicket {
    fn rejected() -> Self {
        Self { receiver: None }
    }

    /// `true` if the request was turned down when it was made.
    pub fn is_rejected(&self) -> bool {
        self.receiver.is_none()
    }
}

impl Future for PickTicket {
    type Output = Option<PickResult>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.receiver.as_mut() {
            None => Poll::Ready(None),
            // a dropped sender means the picker went away
            Some(receiver) => receiver.poll_unpin(cx).map(|r| r.ok().flatten()),
        }
    }
}

pub struct GpuPicker<B> {
    backend: B,
    state: PickState,
    /// Downscale factor of the pick target relative to the viewport.
    pub texture_scale: f32,
    instances: Vec<InstanceNode>,
}

impl<B: PickBackend> GpuPicker<B> {
    /// `instances` must be indexed by instance index.
    pub fn new(backend: B, instances: Vec<InstanceNode>) -> Self {
        Self {
            backend,
            state: PickState::Idle,
            texture_scale: 1.0,
            instances,
        }
    }

    pub fn with_texture_scale(mut self, texture_scale: f32) -> Self {
        self.texture_scale = texture_scale;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn phase(&self) -> PickPhase {
        match self.state {
            PickState::Idle => PickPhase::Idle,
            PickState::Rendering(_) => PickPhase::Rendering,
            PickState::Reading(_) => PickPhase::Reading,
        }
    }

    pub fn instance(&self, index: u32) -> Option<&InstanceNode> {
        self.instances.get(index as usize)
    }

    fn scale(&self) -> f32 {
        if self.texture_scale > 0.0 && self.texture_scale.is_finite() {
            self.texture_scale
        } else {
            warn!("invalid pick texture scale {}, using 1", self.texture_scale);
            1.0
        }
    }

    /// Target size and target pixel for a pick at logical `(x, y)`, or `None`
    /// if the pixel lies outside the target.
    pub fn target_coords(&self, viewport: &Viewport, x: f32, y: f32) -> Option<(u32, u32, u32, u32)> {
        let scale = self.scale();
        let width = (viewport.width as f32 / scale).floor();
        let height = (viewport.height as f32 / scale).floor();
        let tx = (viewport.device_pixel_ratio * x / scale).floor();
        let ty = (viewport.device_pixel_ratio * y / scale).floor();
        if !(tx >= 0.0 && ty >= 0.0 && tx < width && ty < height) {
            return None;
        }
        let (width, height, tx, ty) = (width as u32, height as u32, tx as u32, ty as u32);
        let ty = match self.backend.origin() {
            TargetOrigin::TopLeft => ty,
            TargetOrigin::BottomLeft => height - ty - 1,
        };
        Some((width, height, tx, ty))
    }

    /// Request a pick at logical pixel `(x, y)`.
    pub fn pick_async(&mut self, viewport: &Viewport, x: f32, y: f32) -> PickTicket {
        if !matches!(self.state, PickState::Idle) {
            debug!("pick at ({}, {}) rejected, another pick is in flight", x, y);
            return PickTicket::rejected();
        }
        if !self.backend.has_geometry() {
            debug!("pick rejected, no combined geometry");
            return PickTicket::rejected();
        }
        let Some((width, height, tx, ty)) = self.target_coords(viewport, x, y) else {
            debug!("pick at ({}, {}) is outside the {}x{} viewport", x, y, viewport.width, viewport.height);
            return PickTicket::rejected();
        };
        self.backend.prepare_target(width, height);
        let (sender, receiver) = oneshot::channel();
        self.state = PickState::Rendering(PendingPick {
            x: tx,
            y: ty,
            sender,
        });
        PickTicket {
            receiver: Some(receiver),
        }
    }

    /// Advance the in-flight pick. Call once per frame after the data
    /// textures have been flushed.
    pub fn on_frame(&mut self) {
        match std::mem::replace(&mut self.state, PickState::Idle) {
            PickState::Idle => {}
            PickState::Rendering(pending) => {
                let draws = self.backend.render(ScissorRect {
                    x: pending.x,
                    y: pending.y,
                    width: 1,
                    height: 1,
                });
                if draws == 0 {
                    debug!("pick pass drew nothing, retrying next frame");
                    self.state = PickState::Rendering(pending);
                    return;
                }
                self.backend.begin_readback(pending.x, pending.y);
                self.state = PickState::Reading(pending);
                // the backend may already have the pixel
                self.on_reading();
            }
            reading @ PickState::Reading(_) => {
                self.state = reading;
                self.on_reading();
            }
        }
    }

    fn on_reading(&mut self) {
        let readback = self.backend.poll_readback();
        if readback == Readback::Pending {
            return;
        }
        let PickState::Reading(pending) = std::mem::replace(&mut self.state, PickState::Idle) else {
            return;
        };
        let result = match readback {
            Readback::Ready(sample) => self.decode(&sample),
            _ => {
                warn!("pick readback failed");
                None
            }
        };
        if let Some(result) = &result {
            info!("picked instance {} at {:?}", result.instance_index, result.world_position);
        }
        // a dropped ticket is not an error
        let _ = pending.sender.send(result);
    }

    fn decode(&self, sample: &PickSample) -> Option<PickResult> {
        let index = sample.position_index[3].round();
        if !index.is_finite() || index < 0.0 {
            return None;
        }
        let instance = *self.instances.get(index as usize)?;
        let [px, py, pz, _] = sample.position_index;
        let [nx, ny, nz, _] = sample.normal;
        Some(PickResult {
            world_position: cgmath::Vector3::new(px, py, pz),
            world_normal: cgmath::Vector3::new(nx, ny, nz),
            instance_index: instance.instance_index,
            instance,
        })
    }
}
