pub mod factory;
pub mod gemini;
pub mod interface;
pub mod openai_compatible;

pub use factory::TranslatorFactory;
pub use interface::{TranslateInterface, TranslateRequest, TranslateResponse};
