use anyhow::Context;
use pitstop_server::state::AppState;
use std::path::Path;

pub fn run(root: &Path, port: Option<u16>) -> anyhow::Result<()> {
    let (config, store) = super::open_project(root)?;
    for w in config.validate() {
        tracing::warn!("config: {}", w.message);
    }
    let port = port.unwrap_or(config.server.port);
    let name = config.project.name.clone();
    let state = AppState::new(root.to_path_buf(), config, store);

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
            .await
            .with_context(|| format!("failed to bind port {port}"))?;
        let actual_port = listener.local_addr()?.port();
        println!("pitstop API for '{name}' → http://localhost:{actual_port}/api");
        pitstop_server::serve_on(state, listener).await
    })
}
