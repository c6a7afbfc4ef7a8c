pub mod openai_generator;
pub mod text_generator;

pub use openai_generator::OpenAiGenerator;
pub use text_generator::{parse_json_response, Prompt, TextGenerator};
