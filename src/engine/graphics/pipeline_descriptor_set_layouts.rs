use std::collections::BTreeMap;
use std::sync::Arc;

use vulkano::descriptor_set::layout::{
    DescriptorSetLayout, DescriptorSetLayoutBinding, DescriptorSetLayoutCreateInfo, DescriptorType,
};
use vulkano::device::Device;
use vulkano::shader::ShaderStages;

pub struct PipelineDescriptorSetLayouts {
    /// Lit pass, set 0: scene UBO + shadow map.
    pub scene: Arc<DescriptorSetLayout>,

    /// Shadow pass, set 0: light matrix UBO.
    pub shadow: Arc<DescriptorSetLayout>,
}

impl PipelineDescriptorSetLayouts {
    pub fn new(device: Arc<Device>) -> Result<Self, Box<dyn std::error::Error>> {
        // Set 0 (scene):
        // - binding 0: uniform buffer (SceneUBO), read by both stages
        // - binding 1: combined image sampler (shadow map, depth compare)
        let mut bindings = BTreeMap::new();

        let mut scene_binding =
            DescriptorSetLayoutBinding::descriptor_type(DescriptorType::UniformBuffer);
        scene_binding.descriptor_count = 1;
        scene_binding.stages = ShaderStages::VERTEX | ShaderStages::FRAGMENT;
        bindings.insert(0, scene_binding);

        let mut shadow_map =
            DescriptorSetLayoutBinding::descriptor_type(DescriptorType::CombinedImageSampler);
        shadow_map.descriptor_count = 1;
        shadow_map.stages = ShaderStages::FRAGMENT;
        bindings.insert(1, shadow_map);

        let scene = DescriptorSetLayout::new(
            device.clone(),
            DescriptorSetLayoutCreateInfo {
                bindings,
                ..Default::default()
            },
        )?;

        let mut shadow_bindings = BTreeMap::new();
        let mut light_matrix =
            DescriptorSetLayoutBinding::descriptor_type(DescriptorType::UniformBuffer);
        light_matrix.descriptor_count = 1;
        light_matrix.stages = ShaderStages::VERTEX;
        shadow_bindings.insert(0, light_matrix);

        let shadow = DescriptorSetLayout::new(
            device,
            DescriptorSetLayoutCreateInfo {
                bindings: shadow_bindings,
                ..Default::default()
            },
        )?;

        Ok(Self { scene, shadow })
    }
}
