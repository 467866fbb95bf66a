use crate::engine::graphics::visual_world::VisualWorld;
use std::sync::Arc;
use winit::window::Window;

mod vulkano_backend {
    use std::collections::HashMap;
    use std::mem::size_of;
    use std::sync::Arc;

    use crate::engine::graphics::mesh::{CpuMesh, CpuVertex};
    use crate::engine::graphics::pipeline_descriptor_set_layouts::PipelineDescriptorSetLayouts;
    use crate::engine::graphics::primitives::MeshHandle;
    use crate::engine::graphics::visual_world::{DrawList, VisualWorld};
    use vulkano::buffer::{Buffer, BufferContents, BufferCreateInfo, BufferUsage, Subbuffer};
    use vulkano::command_buffer::{
        AutoCommandBufferBuilder, CommandBufferUsage, CopyBufferInfo, PrimaryAutoCommandBuffer,
        PrimaryCommandBufferAbstract, RenderPassBeginInfo, SubpassBeginInfo, SubpassEndInfo,
        allocator::StandardCommandBufferAllocator,
    };
    use vulkano::descriptor_set::allocator::StandardDescriptorSetAllocator;
    use vulkano::descriptor_set::{DescriptorSet, WriteDescriptorSet};
    use vulkano::format::{ClearValue, Format};
    use vulkano::image::sampler::{
        BorderColor, Filter, Sampler, SamplerAddressMode, SamplerCreateInfo,
    };
    use vulkano::image::view::ImageView;
    use vulkano::image::{Image, ImageCreateInfo, ImageType, ImageUsage};
    use vulkano::memory::allocator::{AllocationCreateInfo, MemoryTypeFilter};
    use vulkano::pipeline::graphics::GraphicsPipelineCreateInfo;
    use vulkano::pipeline::graphics::color_blend::{ColorBlendAttachmentState, ColorBlendState};
    use vulkano::pipeline::graphics::depth_stencil::{CompareOp, DepthState, DepthStencilState};
    use vulkano::pipeline::graphics::input_assembly::InputAssemblyState;
    use vulkano::pipeline::graphics::multisample::MultisampleState;
    use vulkano::pipeline::graphics::rasterization::RasterizationState;
    use vulkano::pipeline::graphics::subpass::PipelineSubpassType;
    use vulkano::pipeline::graphics::vertex_input::{
        VertexInputAttributeDescription, VertexInputBindingDescription, VertexInputRate,
        VertexInputState,
    };
    use vulkano::pipeline::graphics::viewport::{Scissor, Viewport, ViewportState};
    use vulkano::pipeline::layout::{PipelineLayout, PipelineLayoutCreateInfo};
    use vulkano::pipeline::{
        DynamicState, GraphicsPipeline, Pipeline, PipelineBindPoint, PipelineShaderStageCreateInfo,
    };
    use vulkano::render_pass::{Framebuffer, FramebufferCreateInfo, RenderPass, Subpass};
    use vulkano::shader::ShaderModule;
    use vulkano::swapchain::{self, Surface, Swapchain, SwapchainCreateInfo, SwapchainPresentInfo};
    use vulkano::sync::{self, GpuFuture};
    use vulkano::{DeviceSize, Validated, VulkanError};
    use vulkano_util::context::{VulkanoConfig, VulkanoContext};
    use winit::window::Window;

    mod lit_mesh_vs {
        vulkano_shaders::shader! {
            ty: "vertex",
            path: "assets/shaders/lit-mesh.vert",
        }
    }

    mod lit_mesh_fs {
        vulkano_shaders::shader! {
            ty: "fragment",
            path: "assets/shaders/lit-mesh.frag",
        }
    }

    mod shadow_depth_vs {
        vulkano_shaders::shader! {
            ty: "vertex",
            path: "assets/shaders/shadow-depth.vert",
        }
    }

    mod shadow_depth_fs {
        vulkano_shaders::shader! {
            ty: "fragment",
            path: "assets/shaders/shadow-depth.frag",
        }
    }

    const DEPTH_FORMAT: Format = Format::D16_UNORM;
    const SHADOW_FORMAT: Format = Format::D16_UNORM;

    #[derive(BufferContents, Clone, Copy, Debug, Default)]
    #[repr(C, align(16))]
    struct SceneUBO {
        view: [[f32; 4]; 4],
        proj: [[f32; 4]; 4],
        light_view_proj: [[f32; 4]; 4],
        light_dir: [f32; 4],
        light_color: [f32; 4],
        ambient: [f32; 4],
        // rgb, a = fog enabled
        fog_color: [f32; 4],
        // near, far, shadow texel size, unused
        fog_params: [f32; 4],
        camera_pos: [f32; 4],
    }

    #[derive(BufferContents, Clone, Copy, Debug, Default)]
    #[repr(C, align(16))]
    struct ShadowUBO {
        light_view_proj: [[f32; 4]; 4],
    }

    #[derive(
        BufferContents,
        vulkano::pipeline::graphics::vertex_input::Vertex,
        Clone,
        Copy,
        Debug,
        Default,
    )]
    #[repr(C)]
    pub struct InstanceData {
        #[format(R32G32B32A32_SFLOAT)]
        pub i_model_c0: [f32; 4],
        #[format(R32G32B32A32_SFLOAT)]
        pub i_model_c1: [f32; 4],
        #[format(R32G32B32A32_SFLOAT)]
        pub i_model_c2: [f32; 4],
        #[format(R32G32B32A32_SFLOAT)]
        pub i_model_c3: [f32; 4],
        #[format(R32G32B32A32_SFLOAT)]
        pub i_color: [f32; 4],
        #[format(R32_SFLOAT)]
        pub i_receive_shadow: f32,
    }

    pub struct VulkanoGpuMesh {
        pub vertices: Subbuffer<[CpuVertex]>,
        pub indices: Subbuffer<[u32]>,
        pub index_count: u32,
    }

    struct ShadowTarget {
        size: u32,
        view: Arc<ImageView>,
        framebuffer: Arc<Framebuffer>,
    }

    pub struct VulkanoState {
        context: VulkanoContext,
        window: Arc<Window>,
        swapchain: Arc<Swapchain>,
        render_pass: Arc<RenderPass>,
        framebuffers: Vec<Arc<Framebuffer>>,

        shadow: ShadowTarget,
        shadow_sampler: Arc<Sampler>,

        command_buffer_allocator: Arc<StandardCommandBufferAllocator>,
        descriptor_set_allocator: Arc<StandardDescriptorSetAllocator>,
        set_layouts: PipelineDescriptorSetLayouts,

        meshes: HashMap<MeshHandle, VulkanoGpuMesh>,

        pipeline_lit_mesh: Arc<GraphicsPipeline>,
        pipeline_shadow: Arc<GraphicsPipeline>,

        pub window_resized: bool,
        recreate_swapchain: bool,
        previous_frame_end: Option<Box<dyn GpuFuture>>,
    }

    fn host_buffer_info() -> AllocationCreateInfo {
        AllocationCreateInfo {
            memory_type_filter: MemoryTypeFilter::PREFER_HOST
                | MemoryTypeFilter::HOST_SEQUENTIAL_WRITE,
            ..Default::default()
        }
    }

    fn attribute(binding: u32, format: Format, offset: u32) -> VertexInputAttributeDescription {
        VertexInputAttributeDescription {
            binding,
            format,
            offset,
            ..Default::default()
        }
    }

    /// Binding 0 is per-vertex `CpuVertex`, binding 1 per-instance
    /// `InstanceData`. Model matrix columns occupy locations 1-4.
    fn vertex_input_state(with_shading: bool) -> VertexInputState {
        let mut state = VertexInputState::new()
            .binding(
                0,
                VertexInputBindingDescription {
                    stride: size_of::<CpuVertex>() as u32,
                    input_rate: VertexInputRate::Vertex,
                    ..Default::default()
                },
            )
            .binding(
                1,
                VertexInputBindingDescription {
                    stride: size_of::<InstanceData>() as u32,
                    input_rate: VertexInputRate::Instance { divisor: 1 },
                    ..Default::default()
                },
            )
            .attribute(0, attribute(0, Format::R32G32B32_SFLOAT, 0))
            .attribute(1, attribute(1, Format::R32G32B32A32_SFLOAT, 0))
            .attribute(2, attribute(1, Format::R32G32B32A32_SFLOAT, 16))
            .attribute(3, attribute(1, Format::R32G32B32A32_SFLOAT, 32))
            .attribute(4, attribute(1, Format::R32G32B32A32_SFLOAT, 48));

        if with_shading {
            state = state
                .attribute(5, attribute(0, Format::R32G32B32_SFLOAT, 12))
                .attribute(6, attribute(1, Format::R32G32B32A32_SFLOAT, 64))
                .attribute(7, attribute(1, Format::R32_SFLOAT, 80));
        }
        state
    }

    fn shader_stages(
        vs: Arc<ShaderModule>,
        fs: Arc<ShaderModule>,
        name: &str,
    ) -> Result<Vec<PipelineShaderStageCreateInfo>, Box<dyn std::error::Error>> {
        Ok(vec![
            PipelineShaderStageCreateInfo::new(
                vs.entry_point("main")
                    .ok_or_else(|| format!("missing {name} vertex entry point"))?,
            ),
            PipelineShaderStageCreateInfo::new(
                fs.entry_point("main")
                    .ok_or_else(|| format!("missing {name} fragment entry point"))?,
            ),
        ])
    }

    fn depth_image(
        context: &VulkanoContext,
        format: Format,
        extent: [u32; 2],
        usage: ImageUsage,
    ) -> Result<Arc<ImageView>, Box<dyn std::error::Error>> {
        let image = Image::new(
            context.memory_allocator().clone(),
            ImageCreateInfo {
                image_type: ImageType::Dim2d,
                format,
                extent: [extent[0], extent[1], 1],
                usage,
                ..Default::default()
            },
            AllocationCreateInfo {
                memory_type_filter: MemoryTypeFilter::PREFER_DEVICE,
                ..Default::default()
            },
        )?;
        Ok(ImageView::new_default(image)?)
    }

    fn window_framebuffers(
        context: &VulkanoContext,
        render_pass: &Arc<RenderPass>,
        images: Vec<Arc<Image>>,
        extent: [u32; 2],
    ) -> Result<Vec<Arc<Framebuffer>>, Box<dyn std::error::Error>> {
        let depth = depth_image(
            context,
            DEPTH_FORMAT,
            extent,
            ImageUsage::DEPTH_STENCIL_ATTACHMENT | ImageUsage::TRANSIENT_ATTACHMENT,
        )?;

        images
            .into_iter()
            .map(|image| {
                let view = ImageView::new_default(image)?;
                let framebuffer = Framebuffer::new(
                    render_pass.clone(),
                    FramebufferCreateInfo {
                        attachments: vec![view, depth.clone()],
                        ..Default::default()
                    },
                )?;
                Ok(framebuffer)
            })
            .collect()
    }

    impl VulkanoState {
        pub fn new(
            window: Arc<Window>,
            shadow_size: u32,
        ) -> Result<Self, Box<dyn std::error::Error>> {
            // The helper context enables surface extensions and sets up
            // graphics queues and allocators.
            let context = VulkanoContext::new(VulkanoConfig::default());
            let device = context.device().clone();

            let surface = Surface::from_window(device.instance().clone(), window.clone())?;

            let surface_capabilities = device
                .physical_device()
                .surface_capabilities(&surface, Default::default())?;
            let image_format = device
                .physical_device()
                .surface_formats(&surface, Default::default())?
                .first()
                .ok_or("no supported surface formats")?
                .0;

            let mut min_image_count = 2u32.max(surface_capabilities.min_image_count);
            if let Some(max_image_count) = surface_capabilities.max_image_count {
                min_image_count = min_image_count.min(max_image_count);
            }

            let (swapchain, images) = Swapchain::new(
                device.clone(),
                surface,
                SwapchainCreateInfo {
                    min_image_count,
                    image_format,
                    image_extent: window.inner_size().into(),
                    image_usage: ImageUsage::COLOR_ATTACHMENT,
                    composite_alpha: surface_capabilities
                        .supported_composite_alpha
                        .into_iter()
                        .next()
                        .ok_or("no supported composite alpha")?,
                    ..Default::default()
                },
            )?;

            let render_pass = vulkano::single_pass_renderpass!(
                device.clone(),
                attachments: {
                    color: {
                        format: swapchain.image_format(),
                        samples: 1,
                        load_op: Clear,
                        store_op: Store,
                    },
                    depth: {
                        format: DEPTH_FORMAT,
                        samples: 1,
                        load_op: Clear,
                        store_op: DontCare,
                    },
                },
                pass: {
                    color: [color],
                    depth_stencil: {depth},
                }
            )?;

            let framebuffers =
                window_framebuffers(&context, &render_pass, images, swapchain.image_extent())?;

            let shadow_render_pass = vulkano::single_pass_renderpass!(
                device.clone(),
                attachments: {
                    depth: {
                        format: SHADOW_FORMAT,
                        samples: 1,
                        load_op: Clear,
                        store_op: Store,
                    },
                },
                pass: {
                    color: [],
                    depth_stencil: {depth},
                }
            )?;

            let shadow_size = shadow_size.max(1);
            let shadow_view = depth_image(
                &context,
                SHADOW_FORMAT,
                [shadow_size, shadow_size],
                ImageUsage::DEPTH_STENCIL_ATTACHMENT | ImageUsage::SAMPLED,
            )?;
            let shadow_framebuffer = Framebuffer::new(
                shadow_render_pass.clone(),
                FramebufferCreateInfo {
                    attachments: vec![shadow_view.clone()],
                    ..Default::default()
                },
            )?;

            let shadow_sampler = Sampler::new(
                device.clone(),
                SamplerCreateInfo {
                    mag_filter: Filter::Linear,
                    min_filter: Filter::Linear,
                    address_mode: [SamplerAddressMode::ClampToBorder; 3],
                    border_color: BorderColor::FloatOpaqueWhite,
                    compare: Some(CompareOp::LessOrEqual),
                    ..Default::default()
                },
            )?;

            let set_layouts = PipelineDescriptorSetLayouts::new(device.clone())?;

            // Lit forward pass.
            let stages = shader_stages(
                lit_mesh_vs::load(device.clone())?,
                lit_mesh_fs::load(device.clone())?,
                "lit-mesh",
            )?;
            let layout = PipelineLayout::new(
                device.clone(),
                PipelineLayoutCreateInfo {
                    set_layouts: vec![set_layouts.scene.clone()],
                    ..Default::default()
                },
            )?;
            let subpass = Subpass::from(render_pass.clone(), 0).ok_or("missing subpass 0")?;
            let mut pipeline_ci = GraphicsPipelineCreateInfo::layout(layout);
            pipeline_ci.stages = stages.into();
            pipeline_ci.vertex_input_state = Some(vertex_input_state(true));
            pipeline_ci.input_assembly_state = Some(InputAssemblyState::default());
            pipeline_ci.viewport_state = Some(ViewportState::default());
            pipeline_ci.rasterization_state = Some(RasterizationState::default());
            pipeline_ci.multisample_state = Some(MultisampleState::default());
            pipeline_ci.depth_stencil_state = Some(DepthStencilState {
                depth: Some(DepthState::simple()),
                ..Default::default()
            });
            pipeline_ci.color_blend_state = Some(ColorBlendState::with_attachment_states(
                1,
                ColorBlendAttachmentState::default(),
            ));
            pipeline_ci.dynamic_state = [DynamicState::Viewport, DynamicState::Scissor]
                .into_iter()
                .collect();
            pipeline_ci.subpass = Some(PipelineSubpassType::BeginRenderPass(subpass));
            let pipeline_lit_mesh = GraphicsPipeline::new(device.clone(), None, pipeline_ci)?;

            // Depth-only shadow pass.
            let stages = shader_stages(
                shadow_depth_vs::load(device.clone())?,
                shadow_depth_fs::load(device.clone())?,
                "shadow-depth",
            )?;
            let layout = PipelineLayout::new(
                device.clone(),
                PipelineLayoutCreateInfo {
                    set_layouts: vec![set_layouts.shadow.clone()],
                    ..Default::default()
                },
            )?;
            let subpass =
                Subpass::from(shadow_render_pass.clone(), 0).ok_or("missing shadow subpass 0")?;
            let mut pipeline_ci = GraphicsPipelineCreateInfo::layout(layout);
            pipeline_ci.stages = stages.into();
            pipeline_ci.vertex_input_state = Some(vertex_input_state(false));
            pipeline_ci.input_assembly_state = Some(InputAssemblyState::default());
            pipeline_ci.viewport_state = Some(ViewportState::default());
            pipeline_ci.rasterization_state = Some(RasterizationState::default());
            pipeline_ci.multisample_state = Some(MultisampleState::default());
            pipeline_ci.depth_stencil_state = Some(DepthStencilState {
                depth: Some(DepthState::simple()),
                ..Default::default()
            });
            pipeline_ci.dynamic_state = [DynamicState::Viewport, DynamicState::Scissor]
                .into_iter()
                .collect();
            pipeline_ci.subpass = Some(PipelineSubpassType::BeginRenderPass(subpass));
            let pipeline_shadow = GraphicsPipeline::new(device.clone(), None, pipeline_ci)?;

            let command_buffer_allocator = Arc::new(StandardCommandBufferAllocator::new(
                device.clone(),
                Default::default(),
            ));

            let descriptor_set_allocator = Arc::new(StandardDescriptorSetAllocator::new(
                device.clone(),
                Default::default(),
            ));

            Ok(Self {
                context,
                window,
                swapchain,
                render_pass,
                framebuffers,

                shadow: ShadowTarget {
                    size: shadow_size,
                    view: shadow_view,
                    framebuffer: shadow_framebuffer,
                },
                shadow_sampler,

                command_buffer_allocator,
                descriptor_set_allocator,
                set_layouts,

                meshes: HashMap::new(),

                pipeline_lit_mesh,
                pipeline_shadow,

                window_resized: false,
                recreate_swapchain: false,
                previous_frame_end: Some(sync::now(device).boxed()),
            })
        }

        fn recreate_swapchain_if_needed(&mut self) -> Result<(), Box<dyn std::error::Error>> {
            if !(self.window_resized || self.recreate_swapchain) {
                return Ok(());
            }

            self.recreate_swapchain = false;
            let new_dimensions = self.window.inner_size();
            if new_dimensions.width == 0 || new_dimensions.height == 0 {
                // Avoid recreating with a zero-sized swapchain while minimized.
                return Ok(());
            }

            let (new_swapchain, new_images) = match self.swapchain.recreate(SwapchainCreateInfo {
                image_extent: new_dimensions.into(),
                ..self.swapchain.create_info()
            }) {
                Ok(r) => r,
                Err(e) => {
                    self.recreate_swapchain = true;
                    tracing::warn!("failed to recreate swapchain: {}", Validated::unwrap(e));
                    return Ok(());
                }
            };

            self.swapchain = new_swapchain;
            self.framebuffers = window_framebuffers(
                &self.context,
                &self.render_pass,
                new_images,
                self.swapchain.image_extent(),
            )?;

            self.window_resized = false;
            tracing::debug!(
                width = new_dimensions.width,
                height = new_dimensions.height,
                "swapchain recreated"
            );
            Ok(())
        }

        /// Upload every mesh referenced by `list` that has no GPU copy yet.
        fn upload_missing_meshes(
            &mut self,
            visual_world: &VisualWorld,
            list: &DrawList,
        ) -> Result<(), Box<dyn std::error::Error>> {
            for batch in &list.batches {
                if self.meshes.contains_key(&batch.mesh) {
                    continue;
                }
                let mesh = visual_world
                    .assets()
                    .cpu_mesh(batch.mesh)
                    .ok_or("draw batch references an unknown mesh")?;
                self.upload_mesh(batch.mesh, mesh)?;
            }
            Ok(())
        }

        fn instance_buffer(
            &self,
            visual_world: &VisualWorld,
            list: &DrawList,
        ) -> Result<Option<Subbuffer<[InstanceData]>>, Box<dyn std::error::Error>> {
            if list.is_empty() {
                return Ok(None);
            }

            let data = list.draw_order.iter().filter_map(|&h| {
                let inst = visual_world.instance(h)?;
                let m = inst.transform.model();
                Some(InstanceData {
                    i_model_c0: m[0],
                    i_model_c1: m[1],
                    i_model_c2: m[2],
                    i_model_c3: m[3],
                    i_color: inst.color,
                    i_receive_shadow: if inst.receive_shadow { 1.0 } else { 0.0 },
                })
            }).collect::<Vec<_>>();

            let buffer = Buffer::from_iter(
                self.context.memory_allocator().clone(),
                BufferCreateInfo {
                    usage: BufferUsage::VERTEX_BUFFER,
                    ..Default::default()
                },
                host_buffer_info(),
                data,
            )?;
            Ok(Some(buffer))
        }

        fn record_batches(
            &self,
            cbb: &mut AutoCommandBufferBuilder<PrimaryAutoCommandBuffer>,
            list: &DrawList,
            instances: &Subbuffer<[InstanceData]>,
        ) -> Result<(), Box<dyn std::error::Error>> {
            for batch in &list.batches {
                let Some(mesh) = self.meshes.get(&batch.mesh) else {
                    continue;
                };
                cbb.bind_vertex_buffers(0, (mesh.vertices.clone(), instances.clone()))?;
                cbb.bind_index_buffer(mesh.indices.clone())?;
                unsafe {
                    cbb.draw_indexed(mesh.index_count, batch.count, 0, 0, batch.start)?;
                }
            }
            Ok(())
        }

        pub fn render_visual_world(
            &mut self,
            visual_world: &mut VisualWorld,
        ) -> Result<(), Box<dyn std::error::Error>> {
            self.recreate_swapchain_if_needed()?;

            let device = self.context.device().clone();
            let queue = self.context.graphics_queue().clone();

            if let Some(previous_frame_end) = self.previous_frame_end.as_mut() {
                previous_frame_end.cleanup_finished();
            }

            let (image_i, suboptimal, acquire_future) =
                match swapchain::acquire_next_image(self.swapchain.clone(), None)
                    .map_err(Validated::unwrap)
                {
                    Ok(r) => r,
                    Err(VulkanError::OutOfDate) => {
                        self.recreate_swapchain = true;
                        return Ok(());
                    }
                    Err(e) => return Err(Box::new(e)),
                };

            if suboptimal {
                self.recreate_swapchain = true;
            }

            let extent = self.swapchain.image_extent();
            visual_world.set_viewport([extent[0] as f32, extent[1] as f32]);

            let main_list = visual_world.draw_list(false);
            let shadow_list = visual_world.draw_list(true);
            self.upload_missing_meshes(visual_world, &main_list)?;

            let main_instances = self.instance_buffer(visual_world, &main_list)?;
            let shadow_instances = self.instance_buffer(visual_world, &shadow_list)?;

            let sun = visual_world.sun().copied();
            let light_view_proj = sun.map(|s| s.view_proj()).unwrap_or_default();
            let fog = visual_world.fog().copied();
            let camera = visual_world.camera_position();

            let scene_ubo = SceneUBO {
                view: visual_world.camera_view(),
                proj: visual_world.camera_proj(),
                light_view_proj,
                light_dir: sun
                    .map(|s| {
                        let [x, y, z] = s.direction_to_light();
                        [x, y, z, 0.0]
                    })
                    .unwrap_or([0.0, 1.0, 0.0, 0.0]),
                light_color: sun
                    .map(|s| {
                        let [r, g, b] = s.radiance();
                        [r, g, b, 1.0]
                    })
                    .unwrap_or_default(),
                ambient: {
                    let [r, g, b] = visual_world.ambient().radiance();
                    [r, g, b, 1.0]
                },
                fog_color: match fog {
                    Some(f) => [f.color[0], f.color[1], f.color[2], 1.0],
                    None => [0.0; 4],
                },
                fog_params: [
                    fog.map_or(0.0, |f| f.near),
                    fog.map_or(0.0, |f| f.far),
                    1.0 / self.shadow.size as f32,
                    0.0,
                ],
                camera_pos: [camera[0], camera[1], camera[2], 1.0],
            };

            let scene_buffer: Subbuffer<SceneUBO> = Buffer::from_data(
                self.context.memory_allocator().clone(),
                BufferCreateInfo {
                    usage: BufferUsage::UNIFORM_BUFFER,
                    ..Default::default()
                },
                host_buffer_info(),
                scene_ubo,
            )?;

            let shadow_buffer: Subbuffer<ShadowUBO> = Buffer::from_data(
                self.context.memory_allocator().clone(),
                BufferCreateInfo {
                    usage: BufferUsage::UNIFORM_BUFFER,
                    ..Default::default()
                },
                host_buffer_info(),
                ShadowUBO { light_view_proj },
            )?;

            let scene_set = DescriptorSet::new(
                self.descriptor_set_allocator.clone(),
                self.set_layouts.scene.clone(),
                [
                    WriteDescriptorSet::buffer(0, scene_buffer),
                    WriteDescriptorSet::image_view_sampler(
                        1,
                        self.shadow.view.clone(),
                        self.shadow_sampler.clone(),
                    ),
                ],
                [],
            )?;

            let shadow_set = DescriptorSet::new(
                self.descriptor_set_allocator.clone(),
                self.set_layouts.shadow.clone(),
                [WriteDescriptorSet::buffer(0, shadow_buffer)],
                [],
            )?;

            let mut cbb = AutoCommandBufferBuilder::primary(
                self.command_buffer_allocator.clone(),
                queue.queue_family_index(),
                CommandBufferUsage::OneTimeSubmit,
            )?;

            // Shadow pass. Always cleared so the lit pass samples a valid map.
            let mut shadow_begin = RenderPassBeginInfo::framebuffer(self.shadow.framebuffer.clone());
            shadow_begin.clear_values = vec![Some(ClearValue::Depth(1.0))];
            cbb.begin_render_pass(shadow_begin, SubpassBeginInfo::default())?;

            let size = self.shadow.size;
            cbb.set_viewport(
                0,
                vec![Viewport {
                    offset: [0.0, 0.0],
                    extent: [size as f32, size as f32],
                    depth_range: 0.0..=1.0,
                }]
                .into(),
            )?;
            cbb.set_scissor(
                0,
                vec![Scissor {
                    offset: [0, 0],
                    extent: [size, size],
                }]
                .into(),
            )?;

            if let (Some(_), Some(instances)) = (sun, shadow_instances.as_ref()) {
                cbb.bind_pipeline_graphics(self.pipeline_shadow.clone())?;
                cbb.bind_descriptor_sets(
                    PipelineBindPoint::Graphics,
                    self.pipeline_shadow.layout().clone(),
                    0,
                    shadow_set,
                )?;
                self.record_batches(&mut cbb, &shadow_list, instances)?;
            }
            cbb.end_render_pass(SubpassEndInfo::default())?;

            // Lit pass.
            let [r, g, b] = visual_world.background();
            let framebuffer = self.framebuffers[image_i as usize].clone();
            let mut render_pass_begin = RenderPassBeginInfo::framebuffer(framebuffer);
            render_pass_begin.clear_values = vec![
                Some(ClearValue::from([r, g, b, 1.0])),
                Some(ClearValue::Depth(1.0)),
            ];
            cbb.begin_render_pass(render_pass_begin, SubpassBeginInfo::default())?;

            cbb.set_viewport(
                0,
                vec![Viewport {
                    offset: [0.0, 0.0],
                    extent: [extent[0] as f32, extent[1] as f32],
                    depth_range: 0.0..=1.0,
                }]
                .into(),
            )?;
            cbb.set_scissor(
                0,
                vec![Scissor {
                    offset: [0, 0],
                    extent: [extent[0], extent[1]],
                }]
                .into(),
            )?;

            if let Some(instances) = main_instances.as_ref() {
                cbb.bind_pipeline_graphics(self.pipeline_lit_mesh.clone())?;
                cbb.bind_descriptor_sets(
                    PipelineBindPoint::Graphics,
                    self.pipeline_lit_mesh.layout().clone(),
                    0,
                    scene_set,
                )?;
                self.record_batches(&mut cbb, &main_list, instances)?;
            }

            cbb.end_render_pass(SubpassEndInfo::default())?;

            let cb = cbb.build()?;

            let start_future: Box<dyn GpuFuture> = self
                .previous_frame_end
                .take()
                .unwrap_or_else(|| sync::now(device.clone()).boxed());

            let execution = start_future
                .join(acquire_future)
                .then_execute(queue.clone(), cb)?
                .then_swapchain_present(
                    queue.clone(),
                    SwapchainPresentInfo::swapchain_image_index(self.swapchain.clone(), image_i),
                )
                .then_signal_fence_and_flush();

            match execution.map_err(Validated::unwrap) {
                Ok(future) => {
                    // Keep the future so resources can be cleaned up incrementally.
                    self.previous_frame_end = Some(future.boxed());
                }
                Err(VulkanError::OutOfDate) => {
                    self.recreate_swapchain = true;
                    self.previous_frame_end = Some(sync::now(device).boxed());
                }
                Err(e) => {
                    tracing::warn!("failed to flush future: {e}");
                    self.previous_frame_end = Some(sync::now(device).boxed());
                }
            }

            Ok(())
        }

        pub fn upload_mesh(
            &mut self,
            handle: MeshHandle,
            mesh: &CpuMesh,
        ) -> Result<(), Box<dyn std::error::Error>> {
            if self.meshes.contains_key(&handle) {
                return Ok(());
            }

            if mesh.vertices.is_empty() {
                return Err("mesh has no vertices".into());
            }
            if mesh.indices.is_empty() {
                return Err("mesh has no indices".into());
            }

            let memory_allocator = self.context.memory_allocator().clone();
            let queue = self.context.graphics_queue().clone();

            // Host-visible staging buffers.
            let vertices_src = Buffer::from_iter(
                memory_allocator.clone(),
                BufferCreateInfo {
                    usage: BufferUsage::TRANSFER_SRC,
                    ..Default::default()
                },
                host_buffer_info(),
                mesh.vertices.iter().copied(),
            )?;

            let indices_src = Buffer::from_iter(
                memory_allocator.clone(),
                BufferCreateInfo {
                    usage: BufferUsage::TRANSFER_SRC,
                    ..Default::default()
                },
                host_buffer_info(),
                mesh.indices.iter().copied(),
            )?;

            // Device-local destination buffers.
            let vertices_dst = Buffer::new_slice::<CpuVertex>(
                memory_allocator.clone(),
                BufferCreateInfo {
                    usage: BufferUsage::VERTEX_BUFFER | BufferUsage::TRANSFER_DST,
                    ..Default::default()
                },
                AllocationCreateInfo {
                    memory_type_filter: MemoryTypeFilter::PREFER_DEVICE,
                    ..Default::default()
                },
                mesh.vertices.len() as DeviceSize,
            )?;

            let indices_dst = Buffer::new_slice::<u32>(
                memory_allocator,
                BufferCreateInfo {
                    usage: BufferUsage::INDEX_BUFFER | BufferUsage::TRANSFER_DST,
                    ..Default::default()
                },
                AllocationCreateInfo {
                    memory_type_filter: MemoryTypeFilter::PREFER_DEVICE,
                    ..Default::default()
                },
                mesh.indices.len() as DeviceSize,
            )?;

            // Copy staging -> device-local.
            let mut cbb = AutoCommandBufferBuilder::primary(
                self.command_buffer_allocator.clone(),
                queue.queue_family_index(),
                CommandBufferUsage::OneTimeSubmit,
            )?;

            cbb.copy_buffer(CopyBufferInfo::buffers(vertices_src, vertices_dst.clone()))?;
            cbb.copy_buffer(CopyBufferInfo::buffers(indices_src, indices_dst.clone()))?;

            let cb = cbb.build()?;

            cb.execute(queue)?
                .then_signal_fence_and_flush()?
                .wait(None)?;

            tracing::debug!(?handle, indices = mesh.index_count(), "mesh uploaded");
            self.meshes.insert(
                handle,
                VulkanoGpuMesh {
                    vertices: vertices_dst,
                    indices: indices_dst,
                    index_count: mesh.index_count(),
                },
            );

            Ok(())
        }
    }
}

/// Vulkano-only renderer.
pub struct VulkanoRenderer {
    vulkano: Option<vulkano_backend::VulkanoState>,
    shadow_map_size: u32,
    did_enable_present_loop_log: bool,
}

impl VulkanoRenderer {
    pub fn new(shadow_map_size: u32) -> Self {
        Self {
            vulkano: None,
            shadow_map_size,
            did_enable_present_loop_log: false,
        }
    }

    pub fn init_for_window(
        &mut self,
        window: &Arc<Window>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        if self.vulkano.is_none() {
            self.vulkano = Some(vulkano_backend::VulkanoState::new(
                window.clone(),
                self.shadow_map_size,
            )?);
            tracing::info!(
                shadow_map = self.shadow_map_size,
                "vulkano swapchain/render passes initialized"
            );
        }

        Ok(())
    }

    /// The swapchain is rebuilt from the window's size before the next frame.
    pub fn resize(&mut self, _size: winit::dpi::PhysicalSize<u32>) {
        if let Some(vulkano) = self.vulkano.as_mut() {
            vulkano.window_resized = true;
        }
    }

    pub fn render_visual_world(
        &mut self,
        visual_world: &mut VisualWorld,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let Some(vulkano) = self.vulkano.as_mut() else {
            return Err("VulkanoRenderer not initialized (call init_for_window first)".into());
        };

        if !self.did_enable_present_loop_log {
            self.did_enable_present_loop_log = true;
            tracing::info!("present loop enabled");
        }

        vulkano.render_visual_world(visual_world)
    }
}
