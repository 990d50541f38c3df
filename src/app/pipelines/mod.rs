pub mod caption_translate;
pub mod image_fetch;

pub use caption_translate::{is_fully_translated, CaptionTranslator, TranslateSettings};
pub use image_fetch::{ImageFetchSettings, ImageFetcher};
