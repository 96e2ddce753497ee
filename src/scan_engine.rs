use wgpu::{
    BindGroup, BindGroupLayout, Buffer, BufferAddress, BufferDescriptor, BufferUsages, CommandEncoder,
    ComputePassDescriptor, ComputePipeline, ComputePipelineDescriptor, Device, PipelineLayoutDescriptor, Queue,
    ShaderStages,
};

use crate::dispatch_planner::{storage_binding, uniform_binding_dynamic, DispatchPlanner, ScalarArgs};
use crate::error::EngineError;
use crate::support_resources::SupportResources;
use crate::util::bind_merge::{BindGroupBuilder, BindGroupLayoutBuilder};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanVariant {
    Inclusive,
    Exclusive,
}

enum CountSource<'a> {
    Direct(u32),
    Indirect { buffer: &'a Buffer, byte_offset: BufferAddress },
}

pub struct DirectScanRequest<'a> {
    pub variant: ScanVariant,
    pub count: u32,
    pub input: &'a Buffer,
    pub resources: &'a SupportResources,
}

pub struct IndirectScanRequest<'a> {
    pub variant: ScanVariant,
    pub count_buffer: &'a Buffer,
    pub count_buffer_byte_offset: BufferAddress,
    pub input: &'a Buffer,
    pub resources: &'a SupportResources,
}

// One ScalarArgs slot per level, padded to min_uniform_buffer_offset_alignment.
// queue.write_buffer calls aren't guaranteed to interleave with a
// CommandEncoder's recorded dispatches in submission order, so all slots are
// written once up front and selected per-dispatch via dynamic offset.
struct LevelArgsBuffer {
    buffer: Option<Buffer>,
    stride: BufferAddress,
    slot_capacity: u32,
}

fn align_up(value: BufferAddress, alignment: BufferAddress) -> BufferAddress {
    (value + alignment - 1) / alignment * alignment
}

impl LevelArgsBuffer {
    fn new(device: &Device) -> Self {
        let alignment = device.limits().min_uniform_buffer_offset_alignment as BufferAddress;
        let stride = align_up(std::mem::size_of::<ScalarArgs>() as BufferAddress, alignment);
        Self {
            buffer: None,
            stride,
            slot_capacity: 0,
        }
    }

    fn ensure_capacity(&mut self, device: &Device, slots: u32) {
        if slots <= self.slot_capacity {
            return;
        }

        self.buffer = Some(device.create_buffer(&BufferDescriptor {
            label: Some("scan engine: level args"),
            size: slots as BufferAddress * self.stride,
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        }));
        self.slot_capacity = slots;
    }

    fn offset(&self, level: u32) -> wgpu::DynamicOffset {
        (level as BufferAddress * self.stride) as wgpu::DynamicOffset
    }

    fn buffer(&self) -> &Buffer {
        self.buffer.as_ref().expect("ensure_capacity was called before use")
    }

    fn stage_levels(&self, queue: &Queue, level_count: u32) {
        for slot in 0..level_count {
            queue.write_buffer(
                self.buffer(),
                slot as BufferAddress * self.stride,
                bytemuck::bytes_of(&ScalarArgs {
                    a: 0,
                    b: 0,
                    c: 0,
                    level_k: slot,
                }),
            );
        }
    }
}

struct ScanPipelines {
    bind_group_layout: BindGroupLayout,
    group_scan_inclusive: ComputePipeline,
    group_scan_exclusive: ComputePipeline,
    next_input: ComputePipeline,
    resolve_parent_inclusive: ComputePipeline,
    resolve_parent_exclusive: ComputePipeline,
}

impl ScanPipelines {
    fn init(device: &Device) -> Self {
        let shader = device.create_shader_module(wgpu::include_wgsl!("shaders/scan.wgsl"));

        let mut bgl = BindGroupLayoutBuilder::new();
        bgl.append(ShaderStages::COMPUTE, uniform_binding_dynamic())
            .append(ShaderStages::COMPUTE, storage_binding(false))
            .append(ShaderStages::COMPUTE, storage_binding(true))
            .append(ShaderStages::COMPUTE, storage_binding(false))
            .append(ShaderStages::COMPUTE, storage_binding(false))
            .append(ShaderStages::COMPUTE, storage_binding(true));
        let bind_group_layout = bgl.build(device, Some("scan bgl"));

        let pll = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("scan pll"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let make = |entry_point: &str| {
            device.create_compute_pipeline(&ComputePipelineDescriptor {
                label: Some(entry_point),
                layout: Some(&pll),
                module: &shader,
                entry_point,
            })
        };

        Self {
            group_scan_inclusive: make("group_scan_inclusive"),
            group_scan_exclusive: make("group_scan_exclusive"),
            next_input: make("next_input"),
            resolve_parent_inclusive: make("resolve_parent_inclusive"),
            resolve_parent_exclusive: make("resolve_parent_exclusive"),
            bind_group_layout,
        }
    }

    fn group_scan(&self, variant: ScanVariant) -> &ComputePipeline {
        match variant {
            ScanVariant::Inclusive => &self.group_scan_inclusive,
            ScanVariant::Exclusive => &self.group_scan_exclusive,
        }
    }

    fn resolve_parent(&self, variant: ScanVariant) -> &ComputePipeline {
        match variant {
            ScanVariant::Inclusive => &self.resolve_parent_inclusive,
            ScanVariant::Exclusive => &self.resolve_parent_exclusive,
        }
    }
}

pub struct Engine {
    device: Device,
    planner: Option<DispatchPlanner>,
    scan: Option<ScanPipelines>,
    level_args: LevelArgsBuffer,
}

impl Engine {
    pub fn init(device: Device) -> Self {
        let planner = DispatchPlanner::init(&device);
        let scan = ScanPipelines::init(&device);
        let level_args = LevelArgsBuffer::new(&device);

        Self {
            device,
            planner: Some(planner),
            scan: Some(scan),
            level_args,
        }
    }

    pub fn dispose(&mut self) {
        self.planner = None;
        self.scan = None;
        self.level_args.buffer = None;
        self.level_args.slot_capacity = 0;
    }

    pub fn dispatch_direct(
        &mut self,
        encoder: &mut CommandEncoder,
        queue: &Queue,
        request: DirectScanRequest,
    ) -> Result<(), EngineError> {
        if request.count > request.resources.aligned_element_count() {
            return Err(EngineError::CapacityExceeded {
                requested: request.count,
                capacity: request.resources.aligned_element_count(),
            });
        }

        self.dispatch(
            encoder,
            queue,
            request.variant,
            request.input,
            CountSource::Direct(request.count),
            request.resources,
        )
    }

    pub fn dispatch_indirect(
        &mut self,
        encoder: &mut CommandEncoder,
        queue: &Queue,
        request: IndirectScanRequest,
    ) -> Result<(), EngineError> {
        self.dispatch(
            encoder,
            queue,
            request.variant,
            request.input,
            CountSource::Indirect {
                buffer: request.count_buffer,
                byte_offset: request.count_buffer_byte_offset,
            },
            request.resources,
        )
    }

    fn dispatch(
        &mut self,
        encoder: &mut CommandEncoder,
        queue: &Queue,
        variant: ScanVariant,
        input: &Buffer,
        count_source: CountSource,
        resources: &SupportResources,
    ) -> Result<(), EngineError> {
        let planner = self.planner.as_ref().ok_or(EngineError::KernelNotLoaded)?;
        let scan = self.scan.as_ref().ok_or(EngineError::KernelNotLoaded)?;

        if !resources.is_live() {
            return Err(EngineError::InvalidResources);
        }

        let level_count = resources.max_level_count();
        self.level_args.ensure_capacity(&self.device, level_count);
        self.level_args.stage_levels(queue, level_count);

        match &count_source {
            CountSource::Direct(count) => planner.encode_direct(&self.device, queue, encoder, *count, resources),
            CountSource::Indirect { buffer, byte_offset } => {
                planner.encode_indirect(&self.device, queue, encoder, *buffer, *byte_offset, resources)
            }
        }

        let mut bgb = BindGroupBuilder::new();
        bgb.append_buffer_with_size(self.level_args.buffer(), std::mem::size_of::<ScalarArgs>() as BufferAddress)
            .append_buffer(resources.level_offsets().expect("checked live"))
            .append_buffer(input)
            .append_buffer(resources.prefix_a().expect("checked live"))
            .append_buffer(resources.prefix_b().expect("checked live"))
            .append_buffer(resources.level_count_scalar().expect("checked live"));
        let bind_group = bgb.build(&self.device, Some("scan bind group"), &scan.bind_group_layout);

        let indirect_args = resources.indirect_args().expect("checked live");

        for k in 0..level_count {
            dispatch_indirect_pass(
                encoder,
                scan.group_scan(variant),
                &bind_group,
                &self.level_args,
                k,
                indirect_args,
                SupportResources::indirect_args_offset(k),
            );

            if k + 1 < level_count {
                dispatch_indirect_pass(
                    encoder,
                    &scan.next_input,
                    &bind_group,
                    &self.level_args,
                    k,
                    indirect_args,
                    SupportResources::indirect_args_offset(k + 1),
                );
            }
        }

        for k in (1..level_count).rev() {
            dispatch_indirect_pass(
                encoder,
                scan.resolve_parent(variant),
                &bind_group,
                &self.level_args,
                k - 1,
                indirect_args,
                SupportResources::indirect_args_offset(k - 1),
            );
        }

        Ok(())
    }
}

fn dispatch_indirect_pass(
    encoder: &mut CommandEncoder,
    pipeline: &ComputePipeline,
    bind_group: &BindGroup,
    level_args: &LevelArgsBuffer,
    level_k: u32,
    indirect_args: &Buffer,
    indirect_args_offset: BufferAddress,
) {
    let mut cpass = encoder.begin_compute_pass(&ComputePassDescriptor {
        label: Some("scan pass"),
        timestamp_writes: None,
    });
    cpass.set_pipeline(pipeline);
    cpass.set_bind_group(0, bind_group, &[level_args.offset(level_k)]);
    cpass.dispatch_workgroups_indirect(indirect_args, indirect_args_offset);
}
