//! Blog server with incremental regeneration and live reload

mod revalidate;

pub use revalidate::{Decision, Outcome, PageState, Revalidator};

use anyhow::Result;
use axum::{
    body::Body,
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    http::{Request, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::cache::{self, CacheDb};
use crate::generator::{Generator, PageOutcome, RenderedPage};
use crate::helpers::route_for_path;
use crate::Blog;

/// Live reload script injected into HTML pages
const LIVE_RELOAD_SCRIPT: &str = r#"
<script>
(function() {
    var ws = new WebSocket('ws://' + location.host + '/__livereload');
    ws.onmessage = function(msg) {
        if (msg.data === 'reload') {
            location.reload();
        }
    };
})();
</script>
</body>
"#;

/// Server state
struct ServerState {
    blog: Blog,
    generator: Generator,
    revalidator: Revalidator,
    /// Build manifest, kept in step with pages rebuilt on request
    manifest: tokio::sync::Mutex<CacheDb>,
    reload_tx: broadcast::Sender<()>,
    /// Regenerate pages on request; otherwise only serve `public/`
    incremental: bool,
}

/// Start the blog server
pub async fn start(blog: &Blog, ip: &str, port: u16, incremental: bool, open: bool) -> Result<()> {
    let state = Arc::new(build_state(blog, blog.content_source()?, incremental)?);
    let app = router(state);

    // Parse address - handle "localhost" specially
    let bind_ip = if ip == "localhost" { "127.0.0.1" } else { ip };
    let addr: SocketAddr = format!("{}:{}", bind_ip, port).parse()?;

    let url = format!("http://{}:{}", ip, port);
    println!("Server running at {}", url);
    if incremental {
        println!(
            "Pages are regenerated every {}s on request.",
            blog.config.revalidate_interval().as_secs()
        );
    }
    println!("Press Ctrl+C to stop.");

    if open {
        if let Err(e) = open_browser(&url) {
            tracing::warn!("Failed to open browser: {}", e);
        }
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn build_state(
    blog: &Blog,
    source: Arc<dyn crate::cms::ContentSource>,
    incremental: bool,
) -> Result<ServerState> {
    let generator = Generator::new(blog, source)?;
    let cache = CacheDb::load(&blog.base_dir);
    let revalidator = Revalidator::from_manifest(blog.config.revalidate_interval(), &cache);
    let (reload_tx, _) = broadcast::channel::<()>(16);

    Ok(ServerState {
        blog: blog.clone(),
        generator,
        revalidator,
        manifest: tokio::sync::Mutex::new(cache),
        reload_tx,
        incremental,
    })
}

fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/__livereload", get(livereload_handler))
        .fallback(fallback_handler)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// WebSocket handler for live reload
async fn livereload_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServerState>>,
) -> impl IntoResponse {
    let reload_rx = state.reload_tx.subscribe();
    ws.on_upgrade(move |socket| handle_livereload_socket(socket, reload_rx))
}

/// Handle WebSocket connection for live reload
async fn handle_livereload_socket(mut socket: WebSocket, mut reload_rx: broadcast::Receiver<()>) {
    tracing::debug!("Live reload client connected");

    loop {
        tokio::select! {
            result = reload_rx.recv() => {
                match result {
                    Ok(_) => {
                        if socket.send(Message::Text("reload".to_string())).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    _ => {}
                }
            }
        }
    }

    tracing::debug!("Live reload client disconnected");
}

/// Serve generated routes through the revalidator, everything else from disk
async fn fallback_handler(
    State(state): State<Arc<ServerState>>,
    request: Request<Body>,
) -> Response {
    if state.incremental {
        if let Some(route) = route_for_path(&state.blog.config, request.uri().path()) {
            return serve_route(state, route).await;
        }
    }

    let public_dir = &state.blog.public_dir;
    let mut service = ServeDir::new(public_dir)
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new(public_dir.join("404.html")));
    match service.try_call(request).await {
        Ok(response) => response.into_response(),
        Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Server error").into_response(),
    }
}

async fn serve_route(state: Arc<ServerState>, route: String) -> Response {
    let file = match state.generator.output_path(&route) {
        Ok(file) => file,
        Err(_) => return not_found(&state).await,
    };
    let on_disk = tokio::fs::try_exists(&file).await.unwrap_or(false);

    match state.revalidator.check(&route, on_disk).await {
        Decision::Fresh => serve_page(&state, &file).await,
        Decision::Stale { rebuild } => {
            if rebuild {
                spawn_regeneration(state.clone(), route);
            }
            serve_page(&state, &file).await
        }
        Decision::Generating { rebuild } => {
            if rebuild {
                spawn_regeneration(state.clone(), route);
            }
            match state.generator.render_loading() {
                Ok(html) => Html(inject_live_reload(&html)).into_response(),
                Err(e) => {
                    tracing::error!("Failed to render loading page: {}", e);
                    (StatusCode::INTERNAL_SERVER_ERROR, "Server error").into_response()
                }
            }
        }
        Decision::NotFound => not_found(&state).await,
    }
}

fn spawn_regeneration(state: Arc<ServerState>, route: String) {
    tokio::spawn(async move {
        regenerate(&state, &route).await;
    });
}

/// Rebuild one route and record the outcome
async fn regenerate(state: &ServerState, route: &str) -> Outcome {
    let outcome = match state.generator.render_route(route).await {
        Ok(PageOutcome::Rendered(page)) => match state.generator.write(&page) {
            Ok(_) => {
                update_manifest(state, route, Some(&page)).await;
                Outcome::Generated
            }
            Err(e) => {
                tracing::error!("Failed to write {}: {}", route, e);
                Outcome::Failed
            }
        },
        Ok(PageOutcome::NotFound) => {
            if let Err(e) = state.generator.remove(route) {
                tracing::warn!("Failed to remove {}: {}", route, e);
            }
            update_manifest(state, route, None).await;
            Outcome::NotFound
        }
        Err(e) => {
            tracing::error!("Failed to regenerate {}: {}", route, e);
            Outcome::Failed
        }
    };

    state.revalidator.finish(route, outcome).await;
    if outcome == Outcome::Generated {
        tracing::info!("Regenerated {}", route);
        let _ = state.reload_tx.send(());
    }
    outcome
}

/// Record a rebuilt page, or forget a deleted one
async fn update_manifest(state: &ServerState, route: &str, page: Option<&RenderedPage>) {
    let mut manifest = state.manifest.lock().await;
    match page {
        Some(page) => {
            manifest.record(route, cache::hash_content(&page.html), page.uid.as_deref())
        }
        None => {
            if !manifest.forget(route) {
                return;
            }
        }
    }
    if let Err(e) = manifest.save(&state.blog.base_dir) {
        tracing::warn!("Failed to save build manifest: {}", e);
    }
}

async fn serve_page(state: &ServerState, file: &Path) -> Response {
    match tokio::fs::read_to_string(file).await {
        Ok(content) => Html(inject_live_reload(&content)).into_response(),
        Err(_) => not_found(state).await,
    }
}

async fn not_found(state: &ServerState) -> Response {
    let html = match tokio::fs::read_to_string(state.blog.public_dir.join("404.html")).await {
        Ok(html) => html,
        Err(_) => match state.generator.render_not_found() {
            Ok(html) => html,
            Err(_) => "Not found".to_string(),
        },
    };
    (StatusCode::NOT_FOUND, Html(html)).into_response()
}

/// Inject live reload script into HTML content
fn inject_live_reload(html: &str) -> String {
    if html.contains("</body>") {
        html.replace("</body>", LIVE_RELOAD_SCRIPT)
    } else {
        format!("{}{}", html, LIVE_RELOAD_SCRIPT)
    }
}

/// Open a URL in the default browser
fn open_browser(url: &str) -> Result<()> {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open").arg(url).spawn()?;
    }

    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open").arg(url).spawn()?;
    }

    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .args(["/c", "start", url])
            .spawn()?;
    }

    Ok(())
}
