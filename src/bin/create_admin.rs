//! `create-admin <email> [name]`: provision a superuser in the configured repository.
//!
//! Without `DATABASE_URL` this edits `DATA_DIR/state.json` directly. Stop the server first,
//! or its next snapshot overwrites the new account.

use school_archive::models::NewUser;
use school_archive::repo::{open_repo, RepoError, UserRepo};
use tracing::Level;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if cfg!(debug_assertions) {
        let _ = dotenv::dotenv();
    }
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    let mut args = std::env::args().skip(1);
    let Some(email) = args.next() else {
        eprintln!("usage: create-admin <email> [name]");
        std::process::exit(2);
    };
    if !validator::validate_email(email.as_str()) {
        anyhow::bail!("'{email}' is not a valid email address");
    }
    let name = args.next().unwrap_or_else(|| "admin".into());

    let database_url = std::env::var("DATABASE_URL").ok().filter(|v| !v.is_empty());
    let data_dir = std::env::var("DATA_DIR").unwrap_or_else(|_| "data".into());
    let repo = open_repo(database_url.as_deref(), std::path::Path::new(&data_dir)).await?;

    if repo.find_user_by_email(&email).await?.is_some() {
        println!("An account for {email} already exists; nothing to do.");
        return Ok(());
    }
    match repo.create_user(NewUser::superuser(&email, &name)).await {
        Ok(user) => println!("Created superuser {} (id {})", user.email, user.id),
        Err(RepoError::Conflict) => println!("An account for {email} already exists; nothing to do."),
        Err(e) => return Err(e.into()),
    }
    Ok(())
}
