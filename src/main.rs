use std::sync::Arc;

use log::{error, info, warn};

use dentalsite::auth::{AuthProvider, MemoryAuthProvider, RestAuthProvider};
use dentalsite::config::SiteConfig;
use dentalsite::content::{ContentStore, MemoryStore, RestStore};
use dentalsite::error::Error;
use dentalsite::routes::{build_app, AppState};

/// 設定に応じてバックエンドを選ぶ（未設定ならデモデータ入りのメモリストア）
fn backends(config: &SiteConfig) -> Result<(Arc<dyn ContentStore>, Arc<dyn AuthProvider>), Error> {
    match &config.backend {
        Some(backend) => {
            info!("Using hosted backend at {}", backend.url);
            let store = RestStore::new(backend)?;
            let auth = RestAuthProvider::new(backend)?;
            Ok((Arc::new(store), Arc::new(auth)))
        }
        None => {
            let mut auth = MemoryAuthProvider::new();
            match &config.dev_admin {
                Some((email, password)) => {
                    info!("Local admin account: {}", email);
                    auth = auth.with_account(email, password);
                }
                None => warn!("No DENTAL_DEV_ADMIN_EMAIL/PASSWORD set; the admin area cannot be signed into"),
            }
            Ok((Arc::new(MemoryStore::seeded()), Arc::new(auth)))
        }
    }
}

#[tokio::main]
async fn main() {
    // ロガーの初期化
    env_logger::init();

    let config = match SiteConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let (store, auth) = match backends(&config) {
        Ok(backends) => backends,
        Err(e) => {
            error!("Failed to set up backend clients: {}", e);
            std::process::exit(1);
        }
    };

    let host = config.host.clone();
    let port = config.port;
    let max_body_size = config.max_body_size;
    let trust_proxy = config.trust_proxy;
    info!("Serving {} at {}", config.site_name, config.base_url);

    let state = match AppState::new(config, store, auth) {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to load templates: {}", e);
            std::process::exit(1);
        }
    };
    let app = build_app(Arc::new(state));

    #[cfg(feature = "server")]
    {
        if let Err(e) = dentalsite::server::run_server(app, &host, port, max_body_size, trust_proxy).await {
            error!("HTTP server error: {}", e);
            std::process::exit(1);
        }
    }

    #[cfg(not(feature = "server"))]
    {
        let _ = (app, host, port, max_body_size, trust_proxy);
        eprintln!("Please enable the 'server' feature to run the application.");
        std::process::exit(1);
    }
}
