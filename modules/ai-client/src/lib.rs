pub mod error;
pub mod gemini;
pub mod openai;
pub mod traits;
pub mod util;

pub use error::{AiError, AiResult};
pub use gemini::Gemini;
pub use openai::OpenAi;
pub use traits::{EmbedAgent, TextGenerator};
pub use util::{strip_code_blocks, truncate_to_char_boundary};
