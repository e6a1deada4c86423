//! GPU Fitness Evaluator - nearest-point assignment on the GPU.
//!
//! The pixel-to-point assignment runs as a compute shader; color averaging and
//! the deviation sum reuse the CPU code on the read-back assignment, so scores
//! match the CPU evaluator exactly.

use std::sync::Arc;

use super::GpuError;
use crate::compute::fitness::{FitnessEvaluator, ReconstructionBuffers, nearest_point};
use crate::schema::{Color, Diagram, RgbImage};

const NEAREST_POINT_SHADER: &str = include_str!("shaders/nearest_point.wgsl");

/// Squared distances must fit in a `u32` inside the shader.
const MAX_DIMENSION: usize = 46_340;

const WORKGROUP_SIZE: u32 = 16;

/// Uniform buffer struct for the nearest-point shader.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct AssignParams {
    width: u32,
    height: u32,
    point_count: u32,
    _pad: u32,
}

/// GPU-backed fitness evaluator.
pub struct GpuFitnessEvaluator {
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,

    params_buffer: wgpu::Buffer,
    assignment_buffer: wgpu::Buffer,
    staging_buffer: wgpu::Buffer,
    // Recreated when the point count changes.
    points_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    point_capacity: usize,

    image: Arc<RgbImage>,
    buffers: ReconstructionBuffers,
    evaluations: u64,
}

impl GpuFitnessEvaluator {
    /// Create a GPU evaluator for `image`, sized for `point_count` points.
    pub async fn new(image: Arc<RgbImage>, point_count: usize) -> Result<Self, GpuError> {
        if image.width() > MAX_DIMENSION || image.height() > MAX_DIMENSION {
            return Err(GpuError::ImageTooLarge {
                width: image.width(),
                height: image.height(),
            });
        }

        // 1. Create wgpu instance
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        // 2. Request adapter
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|_| GpuError::NoAdapter)?;

        // 3. Request device and queue
        let (device, queue): (wgpu::Device, wgpu::Queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Voronoi Fitness GPU"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                ..Default::default()
            })
            .await?;

        let assignment_size = (image.pixel_count() * std::mem::size_of::<u32>()) as u64;
        if assignment_size > device.limits().max_storage_buffer_binding_size as u64 {
            return Err(GpuError::ImageTooLarge {
                width: image.width(),
                height: image.height(),
            });
        }

        // 4. Shader, layouts and pipeline
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Nearest Point Shader"),
            source: wgpu::ShaderSource::Wgsl(NEAREST_POINT_SHADER.into()),
        });
        let bind_group_layout = create_assign_bind_group_layout(&device);
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Nearest Point Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            ..Default::default()
        });
        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Nearest Point Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        // 5. Buffers
        let params_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Assign Params"),
            size: std::mem::size_of::<AssignParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let assignment_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Assignment Buffer"),
            size: assignment_size,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let staging_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Staging Buffer"),
            size: assignment_size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let point_capacity = point_count.max(1);
        let points_buffer = create_points_buffer(&device, point_capacity);
        let bind_group = create_assign_bind_group(
            &device,
            &bind_group_layout,
            &params_buffer,
            &points_buffer,
            &assignment_buffer,
        );

        let buffers = ReconstructionBuffers::new(image.pixel_count());

        Ok(Self {
            device,
            queue,
            pipeline,
            bind_group_layout,
            params_buffer,
            assignment_buffer,
            staging_buffer,
            points_buffer,
            bind_group,
            point_capacity,
            image,
            buffers,
            evaluations: 0,
        })
    }

    fn ensure_point_capacity(&mut self, point_count: usize) {
        if point_count <= self.point_capacity {
            return;
        }
        self.points_buffer = create_points_buffer(&self.device, point_count);
        self.bind_group = create_assign_bind_group(
            &self.device,
            &self.bind_group_layout,
            &self.params_buffer,
            &self.points_buffer,
            &self.assignment_buffer,
        );
        self.point_capacity = point_count;
    }

    /// Upload the points, run the shader and copy the assignment to staging.
    fn dispatch(&mut self, diagram: &Diagram) {
        let width = self.image.width() as u32;
        let height = self.image.height() as u32;

        self.ensure_point_capacity(diagram.len());

        let params = AssignParams {
            width,
            height,
            point_count: diagram.len() as u32,
            _pad: 0,
        };
        self.queue
            .write_buffer(&self.params_buffer, 0, bytemuck::bytes_of(&params));

        let coords: Vec<[u32; 2]> = diagram.points().iter().map(|p| [p.x, p.y]).collect();
        self.queue
            .write_buffer(&self.points_buffer, 0, bytemuck::cast_slice(&coords));

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Assign Encoder"),
            });

        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Nearest Point Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &self.bind_group, &[]);
            pass.dispatch_workgroups(
                width.div_ceil(WORKGROUP_SIZE),
                height.div_ceil(WORKGROUP_SIZE),
                1,
            );
        }

        encoder.copy_buffer_to_buffer(
            &self.assignment_buffer,
            0,
            &self.staging_buffer,
            0,
            self.staging_buffer.size(),
        );

        self.queue.submit(std::iter::once(encoder.finish()));
    }

    /// Synchronous readback of the assignment into the host buffers.
    fn read_assignment_back(&mut self) -> Result<(), GpuError> {
        let buffer_slice = self.staging_buffer.slice(..);

        let (tx, rx) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });

        self.device.poll(wgpu::PollType::wait_indefinitely()).ok();
        rx.recv().map_err(|_| GpuError::ReadbackLost)??;

        {
            let data = buffer_slice.get_mapped_range();
            let result: &[u32] = bytemuck::cast_slice(&data);
            self.buffers.assignment.copy_from_slice(result);
        }

        self.staging_buffer.unmap();
        Ok(())
    }

    fn assign_on_cpu(&mut self, diagram: &Diagram) {
        let width = self.image.width();
        for (i, slot) in self.buffers.assignment.iter_mut().enumerate() {
            let (col, row) = (i % width, i / width);
            *slot = nearest_point(diagram.points(), col as u32, row as u32) as u32;
        }
    }
}

impl FitnessEvaluator for GpuFitnessEvaluator {
    fn name(&self) -> &'static str {
        "gpu"
    }

    fn evaluate(&mut self, diagram: &Diagram) -> f64 {
        debug_assert!(diagram.is_sorted(), "diagram points out of position order");
        self.evaluations += 1;

        self.dispatch(diagram);
        if let Err(err) = self.read_assignment_back() {
            log::warn!("GPU readback failed ({err}), assigning pixels on the CPU");
            self.assign_on_cpu(diagram);
        }

        self.buffers.score(&self.image, diagram.len())
    }

    fn evaluations(&self) -> u64 {
        self.evaluations
    }

    fn reset_evaluations(&mut self) {
        self.evaluations = 0;
    }

    fn assignment(&self) -> &[u32] {
        &self.buffers.assignment
    }

    fn colors(&self) -> &[Color] {
        self.buffers.colors()
    }

    fn pixel_counts(&self) -> &[u32] {
        self.buffers.counts()
    }

    fn point_errors(&self) -> &[u64] {
        self.buffers.errors()
    }
}

fn create_points_buffer(device: &wgpu::Device, point_count: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Points Buffer"),
        size: (point_count * std::mem::size_of::<[u32; 2]>()) as u64,
        usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn create_assign_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    params: &wgpu::Buffer,
    points: &wgpu::Buffer,
    assignment: &wgpu::Buffer,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Assign Bind Group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: params.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: points.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: assignment.as_entire_binding(),
            },
        ],
    })
}

fn create_assign_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Assign Bind Group Layout"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Storage { read_only: true },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Storage { read_only: false },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
        ],
    })
}
