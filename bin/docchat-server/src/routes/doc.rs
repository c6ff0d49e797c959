use utoipa::OpenApi;

use crate::routes::{chat, health};

#[derive(OpenApi)]
#[openapi(info(
    title = "docchat-server",
    description = "File-grounded, retrieval-augmented chat over server-sent events",
    version = "0.1.0",
    contact(name = "docchat", url = "https://github.com/Cyberhan123/docchat")
))]
pub struct ApiDoc;

pub fn get_docs() -> utoipa::openapi::OpenApi {
    let mut root = ApiDoc::openapi();
    root.merge(health::HealthApi::openapi());
    root.merge(chat::ChatApi::openapi());
    root
}
