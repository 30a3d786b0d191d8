use crate::routes::{chat, health};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(info(
    title = "kiara-server",
    description = "Chat API in front of a llama.cpp-compatible model server"
))]
pub struct ApiDoc;

pub fn get_docs() -> utoipa::openapi::OpenApi {
    let mut root = ApiDoc::openapi();
    root.merge(health::HealthApi::openapi());
    root.merge(chat::ChatApi::openapi());
    root
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = get_docs();
        for path in ["/api/v1/ask", "/api/v1/logs", "/api/v1/health"] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
