pub mod crawler;
pub mod links;
pub mod llm;

pub use crawler::ReqwestCrawler;
pub use links::HtmlLinkExtractor;
pub use llm::{OpenAiGenerator, insight_generators};
