//! WGSL generation for the combined and pick programs.
//!
//! Bind groups:
//! - 0: [`SceneUniform`]
//! - 1: transform, instance and material data textures (bindings 0, 1, 2)
//! - 2: texture maps of the group, a texture/sampler pair per declared map
//!
//! Optional maps are compiled in or out; a program never declares a sampler
//! it does not use.

use crate::{
    data_structures::material::{MaterialTextures, TransparencyMode},
    data_texture::{DataTexture, MatrixAndInvTexture},
    pipelines::light::SceneUniform,
};

pub const DATA_TEXTURE_GROUP: u32 = 1;
pub const MAP_GROUP: u32 = 2;

/// Texture maps present in a group.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct MaterialFeatures {
    pub albedo: bool,
    pub bump: bool,
    pub emissive: bool,
    pub ambient_occlusion: bool,
    pub opacity: bool,
}

/// A texture map kind the combined program can sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MapKind {
    Albedo,
    Bump,
    Emissive,
    AmbientOcclusion,
    Opacity,
}

impl MapKind {
    pub fn wgsl_name(self) -> &'static str {
        match self {
            MapKind::Albedo => "albedo",
            MapKind::Bump => "bump",
            MapKind::Emissive => "emissive",
            MapKind::AmbientOcclusion => "ambient",
            MapKind::Opacity => "opacity",
        }
    }

    /// Color maps are sRGB; the others hold linear data.
    pub fn is_linear(self) -> bool {
        !matches!(self, MapKind::Albedo | MapKind::Emissive)
    }
}

impl MaterialFeatures {
    pub fn from_textures(textures: &MaterialTextures) -> Self {
        Self {
            albedo: textures.albedo.is_some(),
            bump: textures.bump.is_some(),
            emissive: textures.emissive.is_some(),
            ambient_occlusion: textures.ambient.is_some(),
            opacity: textures.opacity.is_some(),
        }
    }

    /// Declared maps in binding order. Map `i` uses bindings `2i` (texture)
    /// and `2i + 1` (sampler) of group 2.
    pub fn maps(&self) -> Vec<MapKind> {
        [
            (self.albedo, MapKind::Albedo),
            (self.bump, MapKind::Bump),
            (self.emissive, MapKind::Emissive),
            (self.ambient_occlusion, MapKind::AmbientOcclusion),
            (self.opacity, MapKind::Opacity),
        ]
        .into_iter()
        .filter_map(|(present, kind)| present.then_some(kind))
        .collect()
    }
}

/// The three data textures the programs read from.
pub struct DataTextureLayout<'a> {
    pub transforms: &'a MatrixAndInvTexture,
    pub instances: &'a DataTexture,
    pub materials: &'a DataTexture,
}

impl DataTextureLayout<'_> {
    fn wgsl(&self) -> String {
        self.transforms.wgsl(DATA_TEXTURE_GROUP, 0)
            + &self.instances.wgsl(DATA_TEXTURE_GROUP, 1)
            + &self.materials.wgsl(DATA_TEXTURE_GROUP, 2)
    }
}

const VERTEX_IO: &str = "struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
    @location(3) tag: vec2<u32>,
}

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_position: vec3<f32>,
    @location(1) world_normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
    @location(3) @interpolate(flat) tag: vec2<u32>,
}
";

fn vertex_main(transforms: &MatrixAndInvTexture) -> String {
    let name = transforms.name();
    format!(
        "@vertex
fn vs_main(in: VertexInput) -> VertexOutput {{
    let model = get_{name}_matrix(in.tag.x);
    let normal_matrix = get_{name}_normal_matrix(in.tag.x);
    let world = model * vec4<f32>(in.position, 1.0);
    var out: VertexOutput;
    out.clip_position = scene.view_proj * world;
    out.world_position = world.xyz;
    out.world_normal = (normal_matrix * vec4<f32>(in.normal, 0.0)).xyz;
    out.uv = in.uv;
    out.tag = in.tag;
    return out;
}}
"
    )
}

const BUMP_FUNCTIONS: &str = "fn cotangent_frame(normal: vec3<f32>, dp1: vec3<f32>, dp2: vec3<f32>, duv1: vec2<f32>, duv2: vec2<f32>) -> mat3x3<f32> {
    let dp2perp = cross(dp2, normal);
    let dp1perp = cross(normal, dp1);
    let tangent = dp2perp * duv1.x + dp1perp * duv2.x;
    let bitangent = dp2perp * duv1.y + dp1perp * duv2.y;
    let det = max(dot(tangent, tangent), dot(bitangent, bitangent));
    var inv_max = 0.0;
    if (det > 0.0) {
        inv_max = inverseSqrt(det);
    }
    return mat3x3<f32>(tangent * inv_max, bitangent * inv_max, normal);
}
";

fn map_declarations(maps: &[MapKind]) -> String {
    maps.iter()
        .enumerate()
        .map(|(i, kind)| {
            let name = kind.wgsl_name();
            format!(
                "@group({MAP_GROUP}) @binding({})
var {name}_map: texture_2d<f32>;
@group({MAP_GROUP}) @binding({})
var {name}_sampler: sampler;
",
                i * 2,
                i * 2 + 1
            )
        })
        .collect()
}

fn sample(kind: MapKind) -> String {
    let name = kind.wgsl_name();
    format!("    let {name}_texel = textureSample({name}_map, {name}_sampler, in.uv);\n")
}

/// Combined program for one material group.
pub fn combined_program(
    layout: &DataTextureLayout,
    features: MaterialFeatures,
    transparency: TransparencyMode,
) -> String {
    let maps = features.maps();
    let instances = layout.instances.name();
    let materials = layout.materials.name();

    let mut body = String::new();
    // Derivatives and samples stay in uniform control flow, ahead of any discard.
    if features.bump {
        body += "    let dp1 = dpdx(in.world_position);
    let dp2 = dpdy(in.world_position);
    var bump_uv = in.uv;
    if (!front_facing) {
        bump_uv = -in.uv;
    }
    let duv1 = dpdx(bump_uv);
    let duv2 = dpdy(bump_uv);
";
    }
    for kind in &maps {
        body += &sample(*kind);
    }
    body += &format!(
        "    let instance = get_{instances}_data(in.tag.x);
    if (instance.data1.x < 0.5) {{
        discard;
    }}
    let material = get_{materials}_data(in.tag.y);
    var normal = normalize(in.world_normal);
"
    );
    if features.bump {
        body += "    let tbn = cotangent_frame(normal, dp1, dp2, duv1, duv2);
    normal = normalize(tbn * (bump_texel.xyz * 2.0 - 1.0));
";
    }
    body += "    var albedo = material.data2 * instance.data0;
    var alpha = material.data0.x;
";
    if features.albedo {
        body += "    albedo = albedo * albedo_texel.rgb;
    alpha = alpha * albedo_texel.a;
";
    }
    if features.opacity {
        body += "    alpha = alpha * opacity_texel.a;\n";
    }
    if transparency.alpha_test() {
        body += "    if (alpha < material.data0.y) {
        discard;
    }
";
    }
    body += "    var ao = vec3<f32>(1.0, 1.0, 1.0);\n";
    if features.ambient_occlusion {
        body += "    ao = ambient_texel.rgb;\n";
    }
    body += "    let metallic = material.data1.x;
    let roughness = material.data1.y;
    let emissive_intensity = material.data1.z;
    let light_dir = normalize(-scene.light_direction.xyz);
    let view_dir = normalize(scene.camera_position.xyz - in.world_position);
    let ndl = max(dot(normal, light_dir), 0.0);
    var diffuse = ndl * scene.light_diffuse.rgb;
    let hemi = dot(normal, normalize(scene.hemisphere_up.xyz)) * 0.5 + 0.5;
    diffuse = diffuse + mix(scene.ground_color.rgb, scene.sky_color.rgb, hemi);
    let half_dir = normalize(view_dir + light_dir);
    let gloss = mix(4.0, 128.0, 1.0 - roughness);
    let specular_color = mix(vec3<f32>(0.04, 0.04, 0.04), albedo, metallic);
    let specular = pow(max(dot(normal, half_dir), 0.0), gloss) * (1.0 - roughness) * ndl * specular_color * scene.light_diffuse.rgb;
    var emissive = material.data3 * emissive_intensity;
";
    if features.emissive {
        body += "    emissive = emissive + emissive_texel.rgb * emissive_intensity;\n";
    }
    body += "    let color = clamp(diffuse * albedo * (1.0 - metallic * 0.5), vec3<f32>(0.0), vec3<f32>(1.0)) * ao + specular + emissive;\n";
    if transparency.blends() {
        body += "    return vec4<f32>(color, alpha);\n";
    } else {
        body += "    return vec4<f32>(color, 1.0);\n";
    }

    let mut src = String::new();
    src += SceneUniform::wgsl();
    src += "\n";
    src += &layout.wgsl();
    src += "\n";
    src += &map_declarations(&maps);
    src += "\n";
    src += VERTEX_IO;
    src += "\n";
    if features.bump {
        src += BUMP_FUNCTIONS;
        src += "\n";
    }
    src += &vertex_main(layout.transforms);
    src += &format!(
        "
@fragment
fn fs_main(in: VertexOutput, @builtin(front_facing) front_facing: bool) -> @location(0) vec4<f32> {{
{body}}}
"
    );
    src
}

/// Pick program: world position and instance index to target 0, world normal
/// to target 1. Hidden instances are discarded like in the shaded pass.
pub fn pick_program(layout: &DataTextureLayout) -> String {
    let instances = layout.instances.name();
    let mut src = String::new();
    src += SceneUniform::wgsl();
    src += "\n";
    src += &layout.transforms.wgsl(DATA_TEXTURE_GROUP, 0);
    src += &layout.instances.wgsl(DATA_TEXTURE_GROUP, 1);
    src += "\n";
    src += VERTEX_IO;
    src += "\n";
    src += &vertex_main(layout.transforms);
    src += &format!(
        "
struct PickOutput {{
    @location(0) position_index: vec4<f32>,
    @location(1) normal: vec4<f32>,
}}

@fragment
fn fs_main(in: VertexOutput) -> PickOutput {{
    let instance = get_{instances}_data(in.tag.x);
    if (instance.data1.x < 0.5) {{
        discard;
    }}
    var out: PickOutput;
    out.position_index = vec4<f32>(in.world_position, f32(in.tag.x));
    out.normal = vec4<f32>(normalize(in.world_normal), 1.0);
    return out;
}}
"
    );
    src
}
