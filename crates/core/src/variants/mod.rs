pub mod cache;
pub mod filename;
pub mod generation;
pub mod generator;

pub use cache::{Clock, ManualClock, SlugCache, SystemClock, DEFAULT_SLUG_CACHE_TTL};
pub use filename::{compose_filename_stem, FilenameService, DEFAULT_EXTENSION, IMAGE_EXTENSIONS};
pub use generation::{LookupGeneration, LookupTicket};
pub use generator::{
    cartesian_product, image_variant_groups, PreviewSession, VariantGenerationStats,
    VariantGenerator,
};
