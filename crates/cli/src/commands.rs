//! Subcommand implementations. Each returns the JSON document to print.

use anyhow::{Context, Result, bail};
use celi_client::fetch::resolve;
use celi_client::{BackendClient, BackendConfig, Encoding, ProfileUpdate};
use celi_core::cache::hash::compute_entry_key;
use celi_core::{AppConfig, CacheDb, Error};
use serde_json::{Value, json};

use crate::args::{Cli, Command, EntriesArgs, GetArgs, ProfileArgs, PurgeArgs, ServeArgs, SessionArgs};

/// What a command produced.
pub enum Output {
    Json(Value),
    Raw(Vec<u8>),
    None,
}

/// Apply the global flags on top of the loaded configuration.
pub fn apply_overrides(mut config: AppConfig, cli: &Cli) -> AppConfig {
    if let Some(db) = &cli.db {
        config.db_path = db.clone();
    }
    if let Some(name) = &cli.cache_name {
        config.cache_name = name.clone();
    }
    config
}

pub async fn dispatch(cli: Cli, config: AppConfig) -> Result<Output> {
    match cli.cmd {
        Command::Serve(args) => serve(config, args).await.map(|()| Output::None),
        Command::Generations => generations(&config).await.map(Output::Json),
        Command::Entries(args) => entries(&config, &args).await.map(Output::Json),
        Command::Get(args) => get(&config, &args).await,
        Command::Purge(args) => purge(&config, &args).await.map(Output::Json),
        Command::Dashboard(args) => dashboard(&config, &args).await.map(Output::Json),
        Command::Profile(args) => profile(&config, &args).await.map(Output::Json),
    }
}

async fn serve(mut config: AppConfig, args: ServeArgs) -> Result<()> {
    if let Some(listen) = args.listen {
        config.listen_addr = listen;
    }
    if let Some(origin) = args.origin {
        config.origin = origin;
    }
    config.validate()?;
    celi_server::serve(config).await
}

async fn open_db(config: &AppConfig) -> Result<CacheDb> {
    CacheDb::open(&config.db_path)
        .await
        .with_context(|| format!("failed to open cache at {}", config.db_path.display()))
}

pub async fn generations(config: &AppConfig) -> Result<Value> {
    let db = open_db(config).await?;
    let stats = db.bucket_stats().await?;
    let generations: Vec<Value> = stats
        .into_iter()
        .map(|s| {
            let current = s.name == config.cache_name;
            json!({
                "name": s.name,
                "created_at": s.created_at,
                "installed_at": s.installed_at,
                "entries": s.entries,
                "bytes": s.bytes,
                "current": current,
            })
        })
        .collect();
    Ok(json!({ "current": config.cache_name, "generations": generations }))
}

pub async fn entries(config: &AppConfig, args: &EntriesArgs) -> Result<Value> {
    let db = open_db(config).await?;
    let generation = args.generation.as_deref().unwrap_or(&config.cache_name);
    let entries = db.list_entries(generation).await?;
    Ok(json!({ "generation": generation, "entries": entries }))
}

pub async fn get(config: &AppConfig, args: &GetArgs) -> Result<Output> {
    let origin = config.origin_url()?;
    let url = resolve(&args.url, &origin).with_context(|| format!("invalid URL {:?}", args.url))?;
    let generation = args.generation.as_deref().unwrap_or(&config.cache_name);

    let db = open_db(config).await?;
    let Some(entry) = db.match_entry(generation, &compute_entry_key(url.as_str())).await? else {
        return Err(Error::CacheMiss(format!("{url} is not cached in {generation}")).into());
    };

    if args.body {
        return Ok(Output::Raw(entry.body));
    }

    let size = entry.body.len();
    let mut value = serde_json::to_value(&entry)?;
    if let Some(map) = value.as_object_mut() {
        map.insert("size".into(), json!(size));
        map.insert("generation".into(), json!(generation));
    }
    Ok(Output::Json(value))
}

pub async fn purge(config: &AppConfig, args: &PurgeArgs) -> Result<Value> {
    let db = open_db(config).await?;

    let deleted = match (&args.generation, args.stale) {
        (Some(name), _) => {
            if db.delete_bucket(name).await? { vec![name.clone()] } else { Vec::new() }
        }
        (None, true) => db.delete_buckets_except(&config.cache_name).await?,
        (None, false) => bail!("nothing to purge: pass --generation or --stale"),
    };

    tracing::info!(deleted = deleted.len(), "purged cache generations");
    Ok(json!({ "deleted": deleted }))
}

fn backend(config: &AppConfig, session: &SessionArgs) -> Result<BackendClient> {
    let mut backend_config = BackendConfig::from_app_config(config)?;
    if let Some(cookie) = &session.cookie {
        backend_config = backend_config.with_session_cookie(cookie.clone());
    }
    Ok(BackendClient::new(backend_config)?)
}

pub async fn dashboard(config: &AppConfig, args: &SessionArgs) -> Result<Value> {
    let snapshot = backend(config, args)?.dashboard().await?;
    Ok(serde_json::to_value(snapshot)?)
}

pub async fn profile(config: &AppConfig, args: &ProfileArgs) -> Result<Value> {
    let update = ProfileUpdate {
        first_name: args.first_name.clone(),
        last_name: args.last_name.clone(),
        bio: args.bio.clone(),
        aura_color: args.aura_color.clone(),
    };
    let encoding = if args.json { Encoding::Json } else { Encoding::Form };

    let outcome = backend(config, &args.session)?.update_profile(&update, encoding).await?;
    Ok(serde_json::to_value(outcome)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use celi_core::{CachedResponse, ResponseType};

    fn config_in(dir: &tempfile::TempDir) -> AppConfig {
        AppConfig { db_path: dir.path().join("cache.sqlite"), ..Default::default() }
    }

    fn entry(url: &str, body: &[u8]) -> CachedResponse {
        CachedResponse {
            url: url.to_string(),
            final_url: url.to_string(),
            status: 200,
            status_text: "OK".into(),
            headers: vec![("content-type".into(), "text/css".into())],
            body: body.to_vec(),
            response_type: ResponseType::Basic,
            stored_at: "2026-01-01T00:00:00+00:00".into(),
        }
    }

    async fn seed(config: &AppConfig) {
        let db = CacheDb::open(&config.db_path).await.unwrap();
        let url = "http://127.0.0.1:5000/static/css/style.css";
        db.put_entry(&config.cache_name, &compute_entry_key(url), &entry(url, b"body{}")).await.unwrap();
        db.open_bucket("celi-cache-v0").await.unwrap();
    }

    #[tokio::test]
    async fn test_generations_marks_current() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(&dir);
        seed(&config).await;

        let value = generations(&config).await.unwrap();
        let list = value["generations"].as_array().unwrap();
        assert_eq!(list.len(), 2);
        let current = list.iter().find(|g| g["current"] == true).unwrap();
        assert_eq!(current["name"], "celi-cache-v1");
        assert_eq!(current["entries"], 1);
        assert_eq!(current["bytes"], 6);
        assert!(current["installed_at"].is_null());
    }

    #[tokio::test]
    async fn test_get_by_relative_path() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(&dir);
        seed(&config).await;

        let args = GetArgs { url: "/static/css/style.css".into(), generation: None, body: false };
        let Output::Json(value) = get(&config, &args).await.unwrap() else { panic!("expected json") };
        assert_eq!(value["status"], 200);
        assert_eq!(value["size"], 6);

        let args = GetArgs { body: true, ..args };
        let Output::Raw(body) = get(&config, &args).await.unwrap() else { panic!("expected raw body") };
        assert_eq!(body, b"body{}");
    }

    #[tokio::test]
    async fn test_get_missing_entry_errors() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(&dir);

        let args = GetArgs { url: "/static/js/none.js".into(), generation: None, body: false };
        let err = get(&config, &args).await.err().unwrap();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::CacheMiss(_))));
    }

    #[tokio::test]
    async fn test_purge_stale_keeps_current() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(&dir);
        seed(&config).await;

        let value = purge(&config, &PurgeArgs { generation: None, stale: true }).await.unwrap();
        assert_eq!(value["deleted"], json!(["celi-cache-v0"]));

        let value = entries(&config, &EntriesArgs { generation: None }).await.unwrap();
        assert_eq!(value["entries"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_purge_named_generation() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(&dir);
        seed(&config).await;

        let args = PurgeArgs { generation: Some("celi-cache-v1".into()), stale: false };
        let value = purge(&config, &args).await.unwrap();
        assert_eq!(value["deleted"], json!(["celi-cache-v1"]));

        let value = purge(&config, &args).await.unwrap();
        assert_eq!(value["deleted"], json!([]));
    }

    #[test]
    fn test_apply_overrides() {
        use clap::Parser;
        let cli = Cli::try_parse_from(["celi", "generations", "--cache-name", "celi-cache-v7"]).unwrap();
        let config = apply_overrides(AppConfig::default(), &cli);
        assert_eq!(config.cache_name, "celi-cache-v7");
    }
}
