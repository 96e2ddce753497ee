use wgpu::{Buffer, BufferDescriptor, BufferUsages, Device};

use crate::error::EngineError;
use crate::level_geometry::{align_up_group, plan};
use crate::util::error_scope::AllocationErrorScope;

#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LevelInfo {
    pub count: u32,
    pub input_offset: u32,
    pub output_offset: u32,
    pub parent_offset: u32,
}

const LEVEL_INFO_SIZE: wgpu::BufferAddress = std::mem::size_of::<LevelInfo>() as wgpu::BufferAddress;
const INDIRECT_ARGS_SLOT_SIZE: wgpu::BufferAddress = 12;

pub struct SupportResources {
    prefix_a: Option<Buffer>,
    prefix_b: Option<Buffer>,
    level_count_scalar: Option<Buffer>,
    level_offsets: Option<Buffer>,
    indirect_args: Option<Buffer>,

    aligned_element_count: u32,
    max_buffer_count: u32,
    max_level_count: u32,
}

impl SupportResources {
    pub fn create(device: &Device, n_max: u32) -> Result<Self, EngineError> {
        let mut this = Self {
            prefix_a: None,
            prefix_b: None,
            level_count_scalar: None,
            level_offsets: None,
            indirect_args: None,
            aligned_element_count: 0,
            max_buffer_count: 0,
            max_level_count: 0,
        };
        this.resize(device, n_max)?;
        Ok(this)
    }

    pub fn resize(&mut self, device: &Device, n_max: u32) -> Result<(), EngineError> {
        let target = n_max.max(1);
        if self.aligned_element_count >= target {
            return Ok(());
        }

        self.dispose();

        let plan = plan(n_max);
        let scope = AllocationErrorScope::new(device);

        self.prefix_a = Some(device.create_buffer(&BufferDescriptor {
            label: Some("prefix scan: prefix_a"),
            size: plan.total_size as wgpu::BufferAddress * 4,
            usage: BufferUsages::STORAGE | BufferUsages::COPY_DST | BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        }));
        self.prefix_b = Some(device.create_buffer(&BufferDescriptor {
            label: Some("prefix scan: prefix_b"),
            size: plan.total_size as wgpu::BufferAddress * 4,
            usage: BufferUsages::STORAGE | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        }));
        self.level_count_scalar = Some(device.create_buffer(&BufferDescriptor {
            label: Some("prefix scan: level_count_scalar"),
            size: 4,
            usage: BufferUsages::STORAGE | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        }));
        self.level_offsets = Some(device.create_buffer(&BufferDescriptor {
            label: Some("prefix scan: level_offsets"),
            size: plan.level_count as wgpu::BufferAddress * LEVEL_INFO_SIZE,
            usage: BufferUsages::STORAGE | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        }));
        self.indirect_args = Some(device.create_buffer(&BufferDescriptor {
            label: Some("prefix scan: indirect_args"),
            size: plan.level_count as wgpu::BufferAddress * INDIRECT_ARGS_SLOT_SIZE,
            usage: BufferUsages::STORAGE | BufferUsages::INDIRECT | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        }));

        if let Err(e) = scope.end() {
            log::warn!("allocation failure while resizing SupportResources, releasing partial state");
            self.dispose();
            return Err(e);
        }

        self.aligned_element_count = align_up_group(n_max.max(1));
        self.max_buffer_count = plan.total_size;
        self.max_level_count = plan.level_count;

        log::debug!(
            "SupportResources resized: aligned_element_count={} max_buffer_count={} max_level_count={}",
            self.aligned_element_count,
            self.max_buffer_count,
            self.max_level_count
        );

        Ok(())
    }

    pub fn dispose(&mut self) {
        self.prefix_a.take();
        self.prefix_b.take();
        self.level_count_scalar.take();
        self.level_offsets.take();
        self.indirect_args.take();
        self.aligned_element_count = 0;
        self.max_buffer_count = 0;
        self.max_level_count = 0;
    }

    pub fn is_live(&self) -> bool {
        self.prefix_a.is_some() && self.prefix_b.is_some()
    }

    pub fn aligned_element_count(&self) -> u32 {
        self.aligned_element_count
    }

    pub fn max_level_count(&self) -> u32 {
        self.max_level_count
    }

    pub fn prefix_a(&self) -> Option<&Buffer> {
        self.prefix_a.as_ref()
    }

    pub fn prefix_b(&self) -> Option<&Buffer> {
        self.prefix_b.as_ref()
    }

    pub fn level_count_scalar(&self) -> Option<&Buffer> {
        self.level_count_scalar.as_ref()
    }

    pub fn level_offsets(&self) -> Option<&Buffer> {
        self.level_offsets.as_ref()
    }

    pub fn indirect_args(&self) -> Option<&Buffer> {
        self.indirect_args.as_ref()
    }

    pub fn indirect_args_offset(level: u32) -> wgpu::BufferAddress {
        level as wgpu::BufferAddress * INDIRECT_ARGS_SLOT_SIZE
    }
}

impl Drop for SupportResources {
    fn drop(&mut self) {
        self.dispose();
    }
}
