use crate::{
    catalog::{CatalogItem, Prompt, Tool, prompts_directory, tools_directory},
    config::SiteConfig,
    docs::DocsLibrary,
    filter::{
        DocFilter, Page, PromptFilter, ToolFilter, latest_tools, paginate, prompt_categories, tool_categories,
        tool_tags,
    },
    log,
    store::{DataSource, DirectoryHandle, JsonSource, Lookup, Snapshot},
    utils::{
        feed::{FeedError, load_articles},
        sitemap::{Sitemap, SitemapInput},
        slug::SlugPolicy,
    },
};
use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, get_service},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::{
    net::{IpAddr, SocketAddr},
    str::FromStr,
    sync::Arc,
};
use tokio::net::TcpListener;
use tower_http::services::ServeDir;

pub struct AppState {
    pub config: &'static SiteConfig,
    pub tools: DirectoryHandle<Tool>,
    pub prompts: DirectoryHandle<Prompt>,
    pub docs: Option<DocsLibrary>,
}

type SharedState = Arc<AppState>;

impl AppState {
    /// Subscribes to both collections; they stay live for as long as the state exists.
    pub fn open(config: &'static SiteConfig, source: Arc<dyn DataSource>) -> Result<Self> {
        let tools = tools_directory(Arc::clone(&source), &config.store).subscribe(config.serve.watch)?;
        let prompts = prompts_directory(source, &config.store).subscribe(config.serve.watch)?;
        let docs = config
            .docs
            .path
            .as_deref()
            .map(DocsLibrary::from_path)
            .transpose()
            .context("[serve] failed to load docs")?;

        Ok(Self { config, tools, prompts, docs })
    }
}

#[rustfmt::skip]
pub async fn serve_site(config: &'static SiteConfig) -> Result<()> {
    let source: Arc<dyn DataSource> = Arc::new(JsonSource::new(&config.store.data_dir));
    let state = Arc::new(AppState::open(config, source)?);

    let interface = IpAddr::from_str(&config.serve.interface)?;
    let addr = SocketAddr::new(interface, config.serve.port);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("[serve] Failed to bind to address {addr}"))?;

    log!("serve"; "serving directory on http://{}", addr);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("[serve] failed to start")?;

    Ok(())
}

pub fn router(state: SharedState) -> Router {
    let serve_dir = ServeDir::new(&state.config.build.output)
        .not_found_service(get(handle_404));

    Router::new()
        .route("/api/tools", get(list_tools))
        .route("/api/tools/latest", get(list_latest_tools))
        .route("/api/tools/{slug}", get(tool_by_slug))
        .route("/api/prompts", get(list_prompts))
        .route("/api/prompts/{slug}", get(prompt_by_slug))
        .route("/api/docs", get(list_docs))
        .route("/api/docs/{id}", get(doc_by_id))
        .route("/api/blog", get(list_blog))
        .route("/sitemap.xml", get(sitemap_xml))
        .fallback(get_service(serve_dir))
        .with_state(state)
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

/// Rejects requests against a collection whose initial fetch has not succeeded yet.
fn ensure_loaded<T>(snapshot: &Snapshot<T>, table: &str) -> Result<(), Response> {
    if snapshot.loaded {
        return Ok(());
    }
    Err(match &snapshot.error {
        Some(error) => error_response(StatusCode::BAD_GATEWAY, error.as_str()),
        None => error_response(StatusCode::SERVICE_UNAVAILABLE, format!("`{table}` is still loading")),
    })
}

#[derive(Debug, Serialize)]
struct WithSlug<'a, T> {
    #[serde(flatten)]
    item: &'a T,
    slug: String,
}

fn with_slugs<'a, T: CatalogItem>(items: Vec<&'a T>, collection: &[T], policy: SlugPolicy) -> Vec<WithSlug<'a, T>> {
    items
        .into_iter()
        .map(|item| WithSlug { slug: policy.build(item, collection), item })
        .collect()
}

#[derive(Debug, Serialize)]
struct Listing<'a, T> {
    #[serde(flatten)]
    page: Page<WithSlug<'a, T>>,
    categories: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tags: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ToolsParams {
    q: Option<String>,
    category: Option<String>,
    tag: Option<String>,
    top: bool,
    page: usize,
}

async fn list_tools(State(state): State<SharedState>, Query(params): Query<ToolsParams>) -> Response {
    let snapshot = state.tools.snapshot();
    if let Err(response) = ensure_loaded(&snapshot, state.tools.table()) { return response }

    let filter = ToolFilter { q: params.q, category: params.category, tag: params.tag, top: params.top };
    let tools = &snapshot.items;
    let page = paginate(filter.apply(tools), params.page);
    let page = Page {
        items: with_slugs(page.items, tools, state.config.slug.tools),
        total: page.total,
        has_more: page.has_more,
    };

    Json(Listing { page, categories: tool_categories(tools), tags: Some(tool_tags(tools)) }).into_response()
}

async fn list_latest_tools(State(state): State<SharedState>) -> Response {
    let snapshot = state.tools.snapshot();
    if let Err(response) = ensure_loaded(&snapshot, state.tools.table()) { return response }

    let tools = &snapshot.items;
    Json(with_slugs(latest_tools(tools), tools, state.config.slug.tools)).into_response()
}

/// Resolves and rebuilds the slug against one snapshot, so the returned slug is the one the
/// record was found under even if a refetch re-ranks duplicates meanwhile.
fn detail<T>(snapshot: &Snapshot<T>, table: &str, slug: &str, policy: SlugPolicy) -> Response
where
    T: CatalogItem + Clone + Serialize,
{
    if let Err(response) = ensure_loaded(snapshot, table) { return response }

    match snapshot.resolve(slug, policy) {
        Lookup::Found(item) => {
            let slug = policy.build(&item, &snapshot.items);
            Json(WithSlug { item: &item, slug }).into_response()
        }
        Lookup::NotFound | Lookup::NotLoaded => {
            error_response(StatusCode::NOT_FOUND, format!("nothing at `{slug}` in `{table}`"))
        }
    }
}

async fn tool_by_slug(State(state): State<SharedState>, Path(slug): Path<String>) -> Response {
    detail(&state.tools.snapshot(), state.tools.table(), &slug, state.config.slug.tools)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PromptsParams {
    q: Option<String>,
    category: Option<String>,
    page: usize,
}

async fn list_prompts(State(state): State<SharedState>, Query(params): Query<PromptsParams>) -> Response {
    let snapshot = state.prompts.snapshot();
    if let Err(response) = ensure_loaded(&snapshot, state.prompts.table()) { return response }

    let filter = PromptFilter { q: params.q, category: params.category };
    let prompts = &snapshot.items;
    let page = paginate(filter.apply(prompts), params.page);
    let page = Page {
        items: with_slugs(page.items, prompts, state.config.slug.prompts),
        total: page.total,
        has_more: page.has_more,
    };

    Json(Listing { page, categories: prompt_categories(prompts), tags: None }).into_response()
}

async fn prompt_by_slug(State(state): State<SharedState>, Path(slug): Path<String>) -> Response {
    detail(&state.prompts.snapshot(), state.prompts.table(), &slug, state.config.slug.prompts)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DocsParams {
    q: Option<String>,
    category: Option<String>,

    // comma separated, e.g. `tools=Gemini,n8n`
    tools: Option<String>,
}

async fn list_docs(State(state): State<SharedState>, Query(params): Query<DocsParams>) -> Response {
    let Some(docs) = &state.docs else {
        return Json(json!({ "groups": [], "categories": [], "tools": [] })).into_response();
    };

    let tools = params
        .tools
        .as_deref()
        .map(|tools| tools.split(',').map(str::trim).filter(|t| !t.is_empty()).map(str::to_string).collect())
        .unwrap_or_default();
    let filter = DocFilter { q: params.q, category: params.category, tools };

    let categories: Vec<_> = docs
        .categories
        .iter()
        .map(|c| json!({ "id": c.id, "label": c.label, "count": docs.count_in(&c.id) }))
        .collect();

    Json(json!({
        "groups": docs.grouped(&filter),
        "categories": categories,
        "tools": docs.tools(),
    }))
    .into_response()
}

async fn doc_by_id(State(state): State<SharedState>, Path(id): Path<String>) -> Response {
    match state.docs.as_ref().and_then(|docs| docs.find(&id)) {
        Some(article) => Json(article).into_response(),
        None => error_response(StatusCode::NOT_FOUND, format!("no article at `{id}`")),
    }
}

async fn list_blog(State(state): State<SharedState>) -> Response {
    let config = state.config;
    let loaded = match tokio::task::spawn_blocking(move || load_articles(config)).await {
        Ok(loaded) => loaded,
        Err(err) => {
            log!("error"; "feed task failed: {err}");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "failed to load articles");
        }
    };

    match loaded {
        Ok(articles) => Json(articles).into_response(),
        Err(FeedError::NotConfigured) => error_response(StatusCode::NOT_FOUND, FeedError::NotConfigured.to_string()),
        Err(err) => {
            log!("error"; "{err:?}");
            error_response(StatusCode::BAD_GATEWAY, "failed to load articles")
        }
    }
}

async fn sitemap_xml(State(state): State<SharedState>) -> Response {
    let tools = state.tools.snapshot();
    if let Err(response) = ensure_loaded(&tools, state.tools.table()) { return response }
    let prompts = state.prompts.items();

    let input = SitemapInput {
        tools: &tools.items,
        prompts: &prompts,
        docs: state.docs.as_ref().map(|docs| docs.articles.as_slice()).unwrap_or_default(),
        today: chrono::Utc::now().date_naive(),
    };

    match Sitemap::new(state.config, &input).to_xml() {
        Ok(xml) => ([(header::CONTENT_TYPE, "application/xml")], xml).into_response(),
        Err(err) => error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

async fn handle_404() -> Response {
    error_response(StatusCode::NOT_FOUND, "404 Not Found")
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        log!("error"; "failed to install CTRL+C signal handler: {err}");
        std::future::pending::<()>().await;
    }
    log!("serve"; "shutting down gracefully...");
}
