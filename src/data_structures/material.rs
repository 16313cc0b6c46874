//! Source materials as authored on the pieces, before deduplication.

use std::sync::Arc;

use log::warn;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TransparencyMode {
    #[default]
    Opaque,
    AlphaTest,
    AlphaBlend,
    AlphaTestAndBlend,
}

impl TransparencyMode {

    pub fn alpha_test(self) -> bool {
        matches!(self, Self::AlphaTest | Self::AlphaTestAndBlend)
    }

    pub fn blends(self) -> bool {
        matches!(self, Self::AlphaBlend | Self::AlphaTestAndBlend)
    }
}

/// Where the image of a texture map comes from.
///
/// Two references show the same image when their URLs match, or, if neither
/// has a URL, when they share the very same byte buffer. Equal bytes in two
/// different buffers are different images.
#[derive(Clone, Debug)]
pub enum TextureRef {
    Url(String),
    Buffer(Arc<[u8]>),
}

impl TextureRef {
    pub fn same_image(&self, other: &TextureRef) -> bool {
        match (self, other) {
            (TextureRef::Url(a), TextureRef::Url(b)) => a == b,
            (TextureRef::Buffer(a), TextureRef::Buffer(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    fn has_identity(&self) -> bool {
        match self {
            TextureRef::Url(url) => !url.is_empty(),
            TextureRef::Buffer(_) => true,
        }
    }
}

fn same_slot(a: &Option<TextureRef>, b: &Option<TextureRef>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a.same_image(b),
        _ => false,
    }
}

/// The texture maps a material may bind.
#[derive(Clone, Debug, Default)]
pub struct MaterialTextures {
    pub albedo: Option<TextureRef>,
    pub bump: Option<TextureRef>,
    pub emissive: Option<TextureRef>,
    pub ambient: Option<TextureRef>,
    pub metallic: Option<TextureRef>,
    pub opacity: Option<TextureRef>,
}

impl MaterialTextures {
    /// Drops references that carry no image identity (an empty URL).
    pub fn sanitized(mut self, material: &str) -> Self {
        for (slot, texture) in [
            ("albedo", &mut self.albedo),
            ("bump", &mut self.bump),
            ("emissive", &mut self.emissive),
            ("ambient", &mut self.ambient),
            ("metallic", &mut self.metallic),
            ("opacity", &mut self.opacity),
        ] {
            if texture.as_ref().is_some_and(|t| !t.has_identity()) {
                warn!("{} texture of material {:?} has no image source, ignoring it", slot, material);
                *texture = None;
            }
        }
        self
    }

    pub fn same_images(&self, other: &MaterialTextures) -> bool {
        same_slot(&self.albedo, &other.albedo)
            && same_slot(&self.bump, &other.bump)
            && same_slot(&self.emissive, &other.emissive)
            && same_slot(&self.ambient, &other.ambient)
            && same_slot(&self.metallic, &other.metallic)
            && same_slot(&self.opacity, &other.opacity)
    }
}

#[derive(Clone, Debug)]
pub struct Material {
    pub name: String,
    pub transparency: TransparencyMode,
    pub alpha: f32,
    pub alpha_cutoff: f32,
    pub metallic: f32,
    pub roughness: f32,
    pub albedo: [f32; 3],
    pub emissive: [f32; 3],
    pub emissive_intensity: f32,
    pub ambient: [f32; 3],
    pub textures: MaterialTextures,
}

impl Material {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transparency: TransparencyMode::Opaque,
            alpha: 1.0,
            alpha_cutoff: 0.4,
            metallic: 0.0,
            roughness: 1.0,
            albedo: [1.0, 1.0, 1.0],
            emissive: [0.0, 0.0, 0.0],
            emissive_intensity: 1.0,
            ambient: [0.0, 0.0, 0.0],
            textures: MaterialTextures::default(),
        }
    }

    /// Material for pieces that reference none.
    pub fn fallback() -> Self {
        Self {
            metallic: 1.0,
            roughness: 1.0,
            ..Self::new("default material")
        }
    }

    pub fn with_textures(mut self, textures: MaterialTextures) -> Self {
        self.textures = textures.sanitized(&self.name);
        self
    }

    /// Whether both materials can be drawn by the same combined program.
    pub fn same_group(&self, other: &Material) -> bool {
        self.transparency == other.transparency && self.textures.same_images(&other.textures)
    }

    /// Row of the material parameter table, as five vec3 slots.
    pub fn parameter_record(&self) -> [f32; MATERIAL_RECORD_LEN] {
        let [ar, ag, ab] = self.albedo;
        let [er, eg, eb] = self.emissive;
        let [mr, mg, mb] = self.ambient;
        [
            self.alpha,
            self.alpha_cutoff,
            0.0,
            self.metallic,
            self.roughness,
            self.emissive_intensity,
            ar,
            ag,
            ab,
            er,
            eg,
            eb,
            mr,
            mg,
            mb,
        ]
    }
}

/// Slots of a material parameter record.
pub const MATERIAL_RECORD_SLOTS: u32 = 5;
pub const MATERIAL_RECORD_LEN: usize = MATERIAL_RECORD_SLOTS as usize * 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialId(pub(crate) usize);

impl MaterialId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// All materials referenced by the pieces of a scene.
#[derive(Clone, Debug, Default)]
pub struct MaterialLibrary {
    materials: Vec<Material>,
}

impl MaterialLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, mut material: Material) -> MaterialId {
        material.textures = std::mem::take(&mut material.textures).sanitized(&material.name);
        self.materials.push(material);
        MaterialId(self.materials.len() - 1)
    }

    pub fn get(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(id.0)
    }

    pub fn get_mut(&mut self, id: MaterialId) -> Option<&mut Material> {
        self.materials.get_mut(id.0)
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }
}
