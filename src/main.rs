use clap::Parser;
use propelize::cli::{
    ACCESS_SECRET_ENV, Args, REFRESH_SECRET_ENV, build_config, handle_create_admin, handle_seed,
    init_logging, load_secret, open_database,
};
use propelize::run_server;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    init_logging(&args.log_format);

    let Some(access_secret) =
        load_secret(ACCESS_SECRET_ENV, args.access_token_secret_file.as_deref())
    else {
        std::process::exit(1);
    };

    let Some(refresh_secret) =
        load_secret(REFRESH_SECRET_ENV, args.refresh_token_secret_file.as_deref())
    else {
        std::process::exit(1);
    };

    let Some(db) = open_database(&args.database).await else {
        std::process::exit(1);
    };

    if let Some(email) = args.create_admin.as_deref() {
        handle_create_admin(&db, email, args.bcrypt_cost).await;
    }

    if args.seed {
        if let Err(e) = handle_seed(&db).await {
            error!(error = %e, "Failed to seed vehicle catalog");
            std::process::exit(1);
        }
    }

    let config = build_config(&args, db, access_secret, refresh_secret);

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            error!(address = %addr, error = %e, "Failed to bind");
            std::process::exit(1);
        });

    match listener.local_addr() {
        Ok(local_addr) => info!(address = %local_addr, "Listening"),
        Err(e) => info!(address = %addr, error = %e, "Listening"),
    }

    if let Err(e) = run_server(config, listener).await {
        error!(error = %e, "Server error");
        std::process::exit(1);
    }
}
