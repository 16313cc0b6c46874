//! The pick pass on wgpu: render to two RGBA32F targets clipped to one pixel,
//! then copy that pixel of each target into a small mappable buffer.

use std::{iter, sync::Arc};

use futures::FutureExt;
use futures_intrusive::channel::shared::{OneshotReceiver, oneshot_channel};

use crate::{
    data_structures::{
        model::{DrawMesh, GpuMesh},
        texture::Texture,
    },
    pick::{PickBackend, PickSample, Readback, ScissorRect},
    pipelines::{combined::CombinedLayouts, pick::mk_pick_pipeline},
};

/// Rows of a texture-to-buffer copy must be 256 byte aligned.
const READBACK_ROW: u32 = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;

struct PickTargets {
    size: [u32; 2],
    position_index: Texture,
    normal: Texture,
    depth: Texture,
}

impl PickTargets {
    fn new(device: &wgpu::Device, size: [u32; 2]) -> Self {
        Self {
            size,
            position_index: Texture::create_float_target(device, size, "Pick position texture"),
            normal: Texture::create_float_target(device, size, "Pick normal texture"),
            depth: Texture::create_depth_texture(device, size, "Pick depth texture"),
        }
    }
}

type MapResult = Result<(), wgpu::BufferAsyncError>;

struct PendingTexel {
    buffer: wgpu::Buffer,
    receiver: OneshotReceiver<MapResult>,
    mapped: Option<bool>,
}

impl PendingTexel {
    fn start(buffer: wgpu::Buffer) -> Self {
        // NOTE: map first, then device.poll() before looking at the channel.
        let (tx, rx) = oneshot_channel();
        buffer.slice(..).map_async(wgpu::MapMode::Read, move |result| {
            // the receiver is gone when the backend was dropped mid-read
            let _ = tx.send(result);
        });
        Self {
            buffer,
            receiver: rx,
            mapped: None,
        }
    }

    fn poll(&mut self) -> Option<bool> {
        if self.mapped.is_none() {
            self.mapped = match self.receiver.receive().now_or_never() {
                None => None,
                Some(Some(Ok(()))) => Some(true),
                Some(Some(Err(e))) => {
                    log::error!("mapping the pick readback buffer failed: {}", e);
                    Some(false)
                }
                Some(None) => Some(false),
            };
        }
        self.mapped
    }

    fn read(&self) -> [f32; 4] {
        let data = self.buffer.slice(..).get_mapped_range();
        let texel: [f32; 4] = bytemuck::pod_read_unaligned(&data[..16]);
        drop(data);
        self.buffer.unmap();
        texel
    }
}

pub struct WgpuPickBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipeline: wgpu::RenderPipeline,
    scene_bind_group: wgpu::BindGroup,
    data_bind_group: wgpu::BindGroup,
    meshes: Vec<Arc<GpuMesh>>,
    target: Option<PickTargets>,
    pending: Option<[PendingTexel; 2]>,
}

impl WgpuPickBackend {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layouts: &CombinedLayouts,
        pick_wgsl: &str,
        scene_bind_group: wgpu::BindGroup,
        data_bind_group: wgpu::BindGroup,
        meshes: Vec<Arc<GpuMesh>>,
    ) -> Self {
        Self {
            device: device.clone(),
            queue: queue.clone(),
            pipeline: mk_pick_pipeline(device, layouts, pick_wgsl),
            scene_bind_group,
            data_bind_group,
            meshes,
            target: None,
            pending: None,
        }
    }

    pub fn target_size(&self) -> Option<[u32; 2]> {
        self.target.as_ref().map(|t| t.size)
    }

    fn readback_buffer(&self, label: &str) -> wgpu::Buffer {
        self.device.create_buffer(&wgpu::BufferDescriptor {
            size: READBACK_ROW as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::COPY_DST
                    // this tells wpgu that we want to read this buffer from the cpu
                    | wgpu::BufferUsages::MAP_READ,
            label: Some(label),
            mapped_at_creation: false,
        })
    }
}

fn copy_texel(encoder: &mut wgpu::CommandEncoder, texture: &Texture, buffer: &wgpu::Buffer, x: u32, y: u32) {
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            aspect: wgpu::TextureAspect::All,
            texture: &texture.texture,
            mip_level: 0,
            origin: wgpu::Origin3d { x, y, z: 0 },
        },
        wgpu::TexelCopyBufferInfo {
            buffer,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(READBACK_ROW),
                rows_per_image: Some(1),
            },
        },
        wgpu::Extent3d {
            width: 1,
            height: 1,
            depth_or_array_layers: 1,
        },
    );
}

fn color_attachment(texture: &Texture, clear: wgpu::Color) -> Option<wgpu::RenderPassColorAttachment<'_>> {
    Some(wgpu::RenderPassColorAttachment {
        view: &texture.view,
        resolve_target: None,
        ops: wgpu::Operations {
            load: wgpu::LoadOp::Clear(clear),
            store: wgpu::StoreOp::Store,
        },
        depth_slice: None,
    })
}

impl PickBackend for WgpuPickBackend {
    fn has_geometry(&self) -> bool {
        !self.meshes.is_empty()
    }

    fn prepare_target(&mut self, width: u32, height: u32) {
        if self.target_size() == Some([width, height]) {
            return;
        }
        log::debug!("allocating {}x{} pick target", width, height);
        self.target = Some(PickTargets::new(&self.device, [width, height]));
    }

    fn render(&mut self, scissor: ScissorRect) -> u32 {
        let Some(target) = self.target.as_ref() else {
            return 0;
        };
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Pick Encoder"),
            });
        let mut draws = 0;
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Pick Pass"),
                color_attachments: &[
                    // w = -1 marks "no instance"
                    color_attachment(
                        &target.position_index,
                        wgpu::Color {
                            r: 0.0,
                            g: 0.0,
                            b: 0.0,
                            a: -1.0,
                        },
                    ),
                    color_attachment(&target.normal, wgpu::Color::TRANSPARENT),
                ],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &target.depth.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
                multiview_mask: None,
            });
            render_pass.set_scissor_rect(scissor.x, scissor.y, scissor.width, scissor.height);
            render_pass.set_pipeline(&self.pipeline);
            render_pass.set_bind_group(0, &self.scene_bind_group, &[]);
            render_pass.set_bind_group(1, &self.data_bind_group, &[]);
            for mesh in &self.meshes {
                render_pass.draw_gpu_mesh(mesh);
                draws += 1;
            }
        }
        self.queue.submit(iter::once(encoder.finish()));
        draws
    }

    fn begin_readback(&mut self, x: u32, y: u32) {
        let Some(target) = self.target.as_ref() else {
            return;
        };
        let position = self.readback_buffer("Pick position readback");
        let normal = self.readback_buffer("Pick normal readback");
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Pick Readback Encoder"),
            });
        copy_texel(&mut encoder, &target.position_index, &position, x, y);
        copy_texel(&mut encoder, &target.normal, &normal, x, y);
        self.queue.submit(iter::once(encoder.finish()));
        self.pending = Some([PendingTexel::start(position), PendingTexel::start(normal)]);
    }

    fn poll_readback(&mut self) -> Readback {
        let Some(pending) = self.pending.as_mut() else {
            return Readback::Failed;
        };
        #[cfg(target_arch = "wasm32")]
        let polled = self.device.poll(wgpu::PollType::Poll);
        #[cfg(not(target_arch = "wasm32"))]
        let polled = self.device.poll(wgpu::PollType::Wait {
            submission_index: None,
            timeout: None,
        });
        if let Err(e) = polled {
            log::error!("polling the device for the pick readback failed: {}", e);
        }

        let [position, normal] = pending;
        match (position.poll(), normal.poll()) {
            (Some(true), Some(true)) => {
                let sample = PickSample {
                    position_index: position.read(),
                    normal: normal.read(),
                };
                self.pending = None;
                Readback::Ready(sample)
            }
            (Some(false), _) | (_, Some(false)) => {
                self.pending = None;
                Readback::Failed
            }
            _ => Readback::Pending,
        }
    }
}
