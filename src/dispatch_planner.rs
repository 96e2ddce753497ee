use wgpu::{
    BindGroupLayout, BindingType, Buffer, BufferBindingType, BufferUsages, CommandEncoder, ComputePassDescriptor,
    ComputePipeline, ComputePipelineDescriptor, Device, PipelineLayoutDescriptor, ShaderStages,
};

use crate::support_resources::SupportResources;
use crate::util::bind_merge::{BindGroupBuilder, BindGroupLayoutBuilder};

#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub(crate) struct ScalarArgs {
    pub a: u32,
    pub b: u32,
    pub c: u32,
    pub level_k: u32,
}

pub(crate) fn storage_binding(read_only: bool) -> BindingType {
    BindingType::Buffer {
        ty: BufferBindingType::Storage { read_only },
        has_dynamic_offset: false,
        min_binding_size: None,
    }
}

fn uniform_binding() -> BindingType {
    BindingType::Buffer {
        ty: BufferBindingType::Uniform,
        has_dynamic_offset: false,
        min_binding_size: None,
    }
}

pub(crate) fn uniform_binding_dynamic() -> BindingType {
    BindingType::Buffer {
        ty: BufferBindingType::Uniform,
        has_dynamic_offset: true,
        min_binding_size: None,
    }
}

pub(crate) struct DispatchPlanner {
    args: Buffer,
    bind_group_layout_constant: BindGroupLayout,
    bind_group_layout_buffer: BindGroupLayout,
    pipeline_constant: ComputePipeline,
    pipeline_buffer: ComputePipeline,
}

impl DispatchPlanner {
    pub fn init(device: &Device) -> Self {
        let shader = device.create_shader_module(wgpu::include_wgsl!("shaders/planner.wgsl"));

        let mut common = BindGroupLayoutBuilder::new();
        common
            .append(ShaderStages::COMPUTE, uniform_binding())
            .append(ShaderStages::COMPUTE, storage_binding(false))
            .append(ShaderStages::COMPUTE, storage_binding(false))
            .append(ShaderStages::COMPUTE, storage_binding(false));

        let bind_group_layout_constant = common.build(device, Some("planner bgl: constant"));

        let mut buffer_variant = BindGroupLayoutBuilder::new();
        buffer_variant
            .append(ShaderStages::COMPUTE, uniform_binding())
            .append(ShaderStages::COMPUTE, storage_binding(false))
            .append(ShaderStages::COMPUTE, storage_binding(false))
            .append(ShaderStages::COMPUTE, storage_binding(false))
            .append(ShaderStages::COMPUTE, storage_binding(true));

        let bind_group_layout_buffer = buffer_variant.build(device, Some("planner bgl: buffer"));

        let pll_constant = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("planner pll: constant"),
            bind_group_layouts: &[&bind_group_layout_constant],
            push_constant_ranges: &[],
        });
        let pll_buffer = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("planner pll: buffer"),
            bind_group_layouts: &[&bind_group_layout_buffer],
            push_constant_ranges: &[],
        });

        let pipeline_constant = device.create_compute_pipeline(&ComputePipelineDescriptor {
            label: Some("planner pipeline: constant"),
            layout: Some(&pll_constant),
            module: &shader,
            entry_point: "plan_from_constant",
        });
        let pipeline_buffer = device.create_compute_pipeline(&ComputePipelineDescriptor {
            label: Some("planner pipeline: buffer"),
            layout: Some(&pll_buffer),
            module: &shader,
            entry_point: "plan_from_buffer",
        });

        let args = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("planner: scalar args"),
            size: std::mem::size_of::<ScalarArgs>() as wgpu::BufferAddress,
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            args,
            bind_group_layout_constant,
            bind_group_layout_buffer,
            pipeline_constant,
            pipeline_buffer,
        }
    }

    fn dispatch(&self, encoder: &mut CommandEncoder, pipeline: &ComputePipeline, bind_group: &wgpu::BindGroup) {
        let mut cpass = encoder.begin_compute_pass(&ComputePassDescriptor {
            label: Some("planner pass"),
            timestamp_writes: None,
        });
        cpass.set_pipeline(pipeline);
        cpass.set_bind_group(0, bind_group, &[]);
        cpass.dispatch_workgroups(1, 1, 1);
    }

    pub fn encode_direct(
        &self,
        device: &Device,
        queue: &wgpu::Queue,
        encoder: &mut CommandEncoder,
        count: u32,
        resources: &SupportResources,
    ) {
        queue.write_buffer(
            &self.args,
            0,
            bytemuck::bytes_of(&ScalarArgs {
                a: count,
                b: resources.max_level_count(),
                c: 0,
                level_k: 0,
            }),
        );

        let mut bgb = BindGroupBuilder::new();
        bgb.append_buffer(&self.args)
            .append_buffer(resources.level_offsets().expect("resources are live"))
            .append_buffer(resources.level_count_scalar().expect("resources are live"))
            .append_buffer(resources.indirect_args().expect("resources are live"));
        let bind_group = bgb.build(device, Some("planner bind group: constant"), &self.bind_group_layout_constant);

        self.dispatch(encoder, &self.pipeline_constant, &bind_group);
    }

    pub fn encode_indirect(
        &self,
        device: &Device,
        queue: &wgpu::Queue,
        encoder: &mut CommandEncoder,
        count_buffer: &Buffer,
        byte_offset: wgpu::BufferAddress,
        resources: &SupportResources,
    ) {
        queue.write_buffer(
            &self.args,
            0,
            bytemuck::bytes_of(&ScalarArgs {
                a: 0,
                b: resources.max_level_count(),
                c: byte_offset as u32,
                level_k: 0,
            }),
        );

        let mut bgb = BindGroupBuilder::new();
        bgb.append_buffer(&self.args)
            .append_buffer(resources.level_offsets().expect("resources are live"))
            .append_buffer(resources.level_count_scalar().expect("resources are live"))
            .append_buffer(resources.indirect_args().expect("resources are live"))
            .append_buffer(count_buffer);
        let bind_group = bgb.build(device, Some("planner bind group: buffer"), &self.bind_group_layout_buffer);

        self.dispatch(encoder, &self.pipeline_buffer, &bind_group);
    }
}
