//! wgpu implementation of the kernel-executor contract.

use wgpu::util::DeviceExt;

use super::{GpuError, KernelExecutor, KernelJob};

/// Scalar kernel arguments; layout mirrors the WGSL `Params` struct.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct KernelParams {
    face_size: u32,
    face: u32,
    channels: u32,
    _pad: u32,
}

/// Runs filter kernels on the first enumerated wgpu adapter.
///
/// The executor always works on RGBA words; 3-channel jobs are expanded
/// before upload and repacked after readback.
pub struct WgpuExecutor {
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipeline: Option<wgpu::ComputePipeline>,
}

impl WgpuExecutor {
    /// Enumerate adapters, log them, and open a device on the first one.
    ///
    /// # Errors
    ///
    /// `NoDevice` when enumeration comes back empty;
    /// `DeviceOperationFailed` when the device request fails.
    pub fn new() -> Result<Self, GpuError> {
        let instance = wgpu::Instance::default();
        let adapters = instance.enumerate_adapters(wgpu::Backends::all());
        log::info!("found {} GPU adapter(s)", adapters.len());
        for adapter in &adapters {
            let info = adapter.get_info();
            log::info!(
                "  {} ({:?}, {:?})",
                info.name,
                info.device_type,
                info.backend
            );
        }
        let adapter =
            adapters.into_iter().next().ok_or(GpuError::NoDevice)?;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("irrmap device"),
                ..Default::default()
            },
        ))
        .map_err(|e| GpuError::DeviceOperationFailed(e.to_string()))?;

        Ok(Self {
            device,
            queue,
            pipeline: None,
        })
    }

    /// Compile the kernel under a validation error scope.
    fn build_pipeline(
        &self,
        source: &str,
        entry: &str,
    ) -> Result<wgpu::ComputePipeline, GpuError> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module =
            self.device
                .create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some("irradiance kernel"),
                    source: wgpu::ShaderSource::Wgsl(source.into()),
                });
        let pipeline = self.device.create_compute_pipeline(
            &wgpu::ComputePipelineDescriptor {
                label: Some("irradiance pipeline"),
                layout: None,
                module: &module,
                entry_point: Some(entry),
                compilation_options:
                    wgpu::PipelineCompilationOptions::default(),
                cache: None,
            },
        );
        if let Some(err) =
            pollster::block_on(self.device.pop_error_scope())
        {
            log::error!("kernel build failed:\n{err}");
            return Err(GpuError::KernelBuildFailed(err.to_string()));
        }
        Ok(pipeline)
    }
}

/// Expand a packed image to one RGBA word per texel.
fn to_rgba(bytes: &[u8], channels: usize) -> Vec<u8> {
    if channels == 4 {
        return bytes.to_vec();
    }
    let mut rgba = Vec::with_capacity(bytes.len() / 3 * 4);
    for texel in bytes.chunks_exact(3) {
        rgba.extend_from_slice(texel);
        rgba.push(255);
    }
    rgba
}

impl KernelExecutor for WgpuExecutor {
    fn run_face(&mut self, job: KernelJob<'_>) -> Result<(), GpuError> {
        let pipeline = match self.pipeline.take() {
            Some(p) => p,
            None => self.build_pipeline(job.source, job.entry)?,
        };

        let channels = job.channels as usize;
        let src_rgba = to_rgba(job.src, channels);
        let dst_rgba = to_rgba(job.dst, channels);
        let rgba_len = src_rgba.len() as wgpu::BufferAddress;
        let pixels = src_rgba.len() / 4;

        let src_buf = self.device.create_buffer_init(
            &wgpu::util::BufferInitDescriptor {
                label: Some("irradiance src"),
                contents: &src_rgba,
                usage: wgpu::BufferUsages::STORAGE,
            },
        );
        let dst_buf = self.device.create_buffer_init(
            &wgpu::util::BufferInitDescriptor {
                label: Some("irradiance dst"),
                contents: &dst_rgba,
                usage: wgpu::BufferUsages::STORAGE
                    | wgpu::BufferUsages::COPY_SRC,
            },
        );
        let params = KernelParams {
            face_size: job.face_size,
            face: job.face.index() as u32,
            channels: 4,
            _pad: 0,
        };
        let params_buf = self.device.create_buffer_init(
            &wgpu::util::BufferInitDescriptor {
                label: Some("irradiance params"),
                contents: bytemuck::bytes_of(&params),
                usage: wgpu::BufferUsages::UNIFORM,
            },
        );
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("irradiance staging"),
            size: rgba_len,
            usage: wgpu::BufferUsages::MAP_READ
                | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group =
            self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("irradiance bind group"),
                layout: &pipeline.get_bind_group_layout(0),
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: src_buf.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: dst_buf.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: params_buf.as_entire_binding(),
                    },
                ],
            });

        let mut encoder = self.device.create_command_encoder(
            &wgpu::CommandEncoderDescriptor {
                label: Some("irradiance encoder"),
            },
        );
        {
            let mut pass =
                encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some("irradiance pass"),
                    timestamp_writes: None,
                });
            pass.set_pipeline(&pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            let groups = job.face_size.div_ceil(8);
            pass.dispatch_workgroups(groups, groups, 1);
        }
        encoder.copy_buffer_to_buffer(&dst_buf, 0, &staging, 0, rgba_len);
        let _ = self.queue.submit(Some(encoder.finish()));

        // Blocking readback of the whole destination image.
        let slice = staging.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        let _ = self.device.poll(wgpu::PollType::Wait);
        match receiver.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                return Err(GpuError::DeviceOperationFailed(e.to_string()))
            }
            Err(_) => {
                return Err(GpuError::DeviceOperationFailed(
                    "map callback dropped".into(),
                ))
            }
        }

        {
            let data = slice.get_mapped_range();
            // Only the color channels travel back; alpha is the kernel's
            // constant 1.0, not part of the filter contract.
            for i in 0..pixels {
                let out = &data[i * 4..i * 4 + 3];
                job.dst[i * channels..i * channels + 3]
                    .copy_from_slice(out);
            }
        }
        staging.unmap();

        self.pipeline = Some(pipeline);
        Ok(())
    }
}
