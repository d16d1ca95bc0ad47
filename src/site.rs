//! The built-in search site served by the `vein` binary.
//!
//! User input only reaches text content through `html_escape`; attribute
//! values are covered by the renderer's quote escaping.

use axum::http::StatusCode;
use thiserror::Error;
use url::Url;

use crate::config::ServerConfig;
use crate::controller::{callback, Controller};
use crate::html::{Page, StructureError, Tag, TagType};
use crate::routing::Router;

#[derive(Debug, Error)]
pub enum SiteError {
    #[error(transparent)]
    Structure(#[from] StructureError),

    #[error("invalid canonical origin: {0}")]
    Origin(#[from] url::ParseError),
}

/// Search page: the landing view for any path without a form, and
/// results for `/search`.
pub fn search_controller() -> Result<Controller, StructureError> {
    let tree = Tag::new(TagType::Html)
        .attr("lang", "en")
        .child(
            Tag::new(TagType::Head)
                .child(Tag::new(TagType::Meta).attr("charset", "utf-8"))
                .child(Tag::new(TagType::Title).text("vein")),
        )
        .child(
            Tag::new(TagType::Body)
                .child(Tag::new(TagType::H1).attr("id", "heading").text("Search"))
                .child(
                    Tag::new(TagType::Form)
                        .attr("id", "search")
                        .attr("action", "/search")
                        .child(Tag::new(TagType::Input).attr("type", "text").attr("name", "q"))
                        .child(Tag::new(TagType::Button).attr("type", "submit").text("Go")),
                )
                .child(Tag::new(TagType::P).attr("id", "result")),
        );

    let mut controller = Controller::new(tree)?;
    controller.set_default_callback(callback(|page, _, _| {
        page.set_title("vein")?;
        page.set_description("")?;
        // The worker copy outlives the request; drop the last visitor's term.
        if let Some(input) = page.tag_by_name_mut("q") {
            input.attrs_mut().remove("value");
        }
        set_result(page, "");
        Ok(StatusCode::OK)
    }));
    controller.set_form_callback(
        "search",
        callback(|page, url, _| {
            let query = url
                .query_pairs()
                .find(|(key, _)| key == "q")
                .map(|(_, value)| value.into_owned())
                .unwrap_or_default();
            let escaped = html_escape::encode_text(&query);

            page.set_title(format!("{escaped} - vein"))?;
            page.set_description(format!("Results for {query}"))?;
            set_result(page, &format!("No results for {escaped}."));
            Ok(StatusCode::OK)
        }),
    )?;
    Ok(controller)
}

/// Router for the built-in site over the configured public root.
pub fn site_router(config: &ServerConfig) -> Result<Router, SiteError> {
    let mut builder = Router::builder(&config.site.public_root);
    if let Some(origin) = &config.site.canonical_origin {
        builder = builder.canonical_origin(Url::parse(origin)?);
    }
    Ok(builder
        .register_all(["/", "/search"], search_controller()?)
        .build())
}

fn set_result(page: &mut Page, text: &str) {
    if let Some(result) = page.tag_by_id_mut("result") {
        result.set_text(text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::WorkerContext;
    use axum::response::Response;
    use flate2::read::ZlibDecoder;
    use std::io::Read;

    fn url(target: &str) -> Url {
        Url::parse("http://localhost").unwrap().join(target).unwrap()
    }

    async fn html(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let mut out = String::new();
        ZlibDecoder::new(&bytes[..]).read_to_string(&mut out).unwrap();
        out
    }

    #[tokio::test]
    async fn test_search_term_is_escaped() {
        let controller = search_controller().unwrap();
        let mut ctx = WorkerContext::new();

        let response = controller.dispatch(&mut ctx, &url("/search?q=%3Cscript%3Ealert(1)%3C/script%3E"));
        assert_eq!(response.status(), StatusCode::OK);
        let html = html(response).await;

        // Only the quoted `value` and `content` attributes carry the raw term.
        assert_eq!(html.matches("<script>").count(), 2);
        assert!(html.contains(r#"value="<script>alert(1)</script>""#));
        assert!(html.contains("<title>&lt;script&gt;alert(1)&lt;/script&gt; - vein</title>"));
        assert!(html.contains("No results for &lt;script&gt;alert(1)&lt;/script&gt;."));
    }

    #[tokio::test]
    async fn test_landing_page_forgets_previous_search() {
        let controller = search_controller().unwrap();
        let mut ctx = WorkerContext::new();

        let first = html(controller.dispatch(&mut ctx, &url("/search?q=secret"))).await;
        assert!(first.contains(r#"value="secret""#));

        let landing = html(controller.dispatch(&mut ctx, &url("/"))).await;
        assert!(!landing.contains("secret"));
        assert!(landing.contains(r#"<input name="q" type="text">"#));
        assert!(landing.contains("<title>vein</title>"));
        assert!(landing.contains(r#"<p id="result"></p>"#));
    }

    #[test]
    fn test_site_router_registers_both_paths() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ServerConfig::default();
        config.site.public_root = dir.path().to_path_buf();
        config.site.canonical_origin = Some("https://example.com".into());

        let router = site_router(&config).unwrap();
        let root = router.controller("/").unwrap();
        assert_eq!(root.id(), router.controller("/search").unwrap().id());
    }
}
