use utoipa::OpenApi;

use crate::routes::{health, v1};

#[derive(OpenApi)]
#[openapi(info(
    title = "streamgate",
    description = "OpenAI-compatible streaming gateway API",
    version = "0.1.0"
))]
pub struct ApiDoc;

pub fn get_docs() -> utoipa::openapi::OpenApi {
    let mut root = ApiDoc::openapi();
    root.merge(health::HealthApi::openapi());
    root.merge(v1::api_docs());
    root
}
