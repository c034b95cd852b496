use tokio::net::TcpListener;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use zoomoot::app::AppState;
use zoomoot::config::Config;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "zoomoot=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    let pool = zoomoot::create_pool(&config.database_url)
        .expect("Failed to create connection pool");

    // Bring the schema up on boot so a fresh deployment serves immediately.
    {
        let mut conn = pool.get().expect("Failed to check out a connection");
        zoomoot::init_schema(&mut conn).expect("Failed to initialize schema");
    }

    let addr = format!("{}:{}", config.host, config.port);
    let state = AppState::new(pool, config);
    let app = zoomoot::app::router(state);

    let listener = TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| panic!("Failed to bind {addr}: {e}"));
    tracing::info!("Zoomoot score tracker listening on {addr}");
    axum::serve(listener, app).await.expect("server error");
}
