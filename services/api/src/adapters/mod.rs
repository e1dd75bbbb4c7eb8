pub mod db;
pub mod llm;
pub mod resume_parser;
pub mod session_cache;

pub use db::DbAdapter;
pub use llm::OpenAiLlmAdapter;
pub use session_cache::MokaChatSessionStore;
